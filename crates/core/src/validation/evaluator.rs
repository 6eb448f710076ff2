//! Field rule evaluator. Pure logic, no store access.

use std::sync::LazyLock;

use regex::Regex;
use validator::ValidateEmail;

use super::rules::RowMessage;
use crate::catalog::FieldId;
use crate::mapping::MappedData;
use crate::normalize::digits_only;

pub const MSG_NAME_REQUIRED: &str = "Nome é obrigatório";
pub const MSG_EMAIL_INVALID: &str = "Email inválido";
pub const MSG_ORG_EMAIL_INVALID: &str = "Email da empresa inválido";
pub const MSG_CPF_INVALID: &str = "CPF inválido";
pub const MSG_CNPJ_INVALID: &str = "CNPJ inválido";
pub const MSG_PHONE_INVALID: &str = "Telefone inválido";
pub const MSG_WHATSAPP_INVALID: &str = "WhatsApp inválido";
pub const MSG_ORG_PHONE_INVALID: &str = "Telefone da empresa inválido";
pub const MSG_AUTOMOTORES_NUMERIC: &str = "Automotores deve ser numérico";
pub const MSG_STATE_INVALID: &str = "UF inválida";
pub const MSG_ZIPCODE_INVALID: &str = "CEP inválido";

const CPF_DIGITS: usize = 11;
const CNPJ_DIGITS: usize = 14;
const ZIPCODE_DIGITS: usize = 8;
const PHONE_MIN_DIGITS: usize = 10;
const PHONE_MAX_DIGITS: usize = 13;

static STATE_CODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z]{2}$").unwrap_or_else(|e| panic!("invalid UF pattern: {e}"))
});

/// Evaluate every field rule against one row's mapped values.
///
/// Messages come out in catalog order so the preview reads consistently.
pub fn validate_mapped(data: &MappedData) -> Vec<RowMessage> {
    FieldId::ALL
        .into_iter()
        .filter_map(|field| evaluate_field(field, data.get(&field).map(String::as_str)))
        .collect()
}

fn evaluate_field(field: FieldId, value: Option<&str>) -> Option<RowMessage> {
    if field.is_required() && value.is_none() {
        return Some(RowMessage::error(field, MSG_NAME_REQUIRED));
    }
    // Remaining rules only check format of values that are present.
    let value = value?;

    match field {
        FieldId::Email => check_email(value).then(|| RowMessage::error(field, MSG_EMAIL_INVALID)),
        FieldId::OrgEmail => {
            check_email(value).then(|| RowMessage::error(field, MSG_ORG_EMAIL_INVALID))
        }
        FieldId::Cpf => (digits_only(value).len() != CPF_DIGITS)
            .then(|| RowMessage::warning(field, MSG_CPF_INVALID)),
        FieldId::Cnpj => (digits_only(value).len() != CNPJ_DIGITS)
            .then(|| RowMessage::warning(field, MSG_CNPJ_INVALID)),
        FieldId::Phone => check_phone(value).then(|| RowMessage::warning(field, MSG_PHONE_INVALID)),
        FieldId::Whatsapp => {
            check_phone(value).then(|| RowMessage::warning(field, MSG_WHATSAPP_INVALID))
        }
        FieldId::OrgPhone => {
            check_phone(value).then(|| RowMessage::warning(field, MSG_ORG_PHONE_INVALID))
        }
        FieldId::Automotores => value
            .parse::<u32>()
            .is_err()
            .then(|| RowMessage::error(field, MSG_AUTOMOTORES_NUMERIC)),
        FieldId::AddressState => {
            (!STATE_CODE.is_match(value)).then(|| RowMessage::warning(field, MSG_STATE_INVALID))
        }
        FieldId::AddressZipcode => (digits_only(value).len() != ZIPCODE_DIGITS)
            .then(|| RowMessage::warning(field, MSG_ZIPCODE_INVALID)),
        FieldId::Name
        | FieldId::JobTitle
        | FieldId::Notes
        | FieldId::Label
        | FieldId::LeadSource
        | FieldId::OrgName
        | FieldId::AddressCity => None,
    }
}

/// `true` when the address is malformed.
fn check_email(value: &str) -> bool {
    !value.validate_email()
}

/// `true` when the number has an implausible digit count.
fn check_phone(value: &str) -> bool {
    let digits = digits_only(value).len();
    !(PHONE_MIN_DIGITS..=PHONE_MAX_DIGITS).contains(&digits)
}
