//! Fixed catalog of import target fields.
//!
//! The catalog is the contract shared by the mapping engine, the validator
//! and the commit executor. Fields are partitioned into a person group and an
//! organization group; exactly one field (`name`) is required.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Field group
// ---------------------------------------------------------------------------

/// Which entity a catalog field belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldGroup {
    Person,
    Organization,
}

impl FieldGroup {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Person => "person",
            Self::Organization => "organization",
        }
    }
}

impl std::fmt::Display for FieldGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Field id
// ---------------------------------------------------------------------------

/// A canonical target field a source column can be mapped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldId {
    Name,
    Email,
    Phone,
    Whatsapp,
    Cpf,
    JobTitle,
    Notes,
    Label,
    LeadSource,
    OrgName,
    Cnpj,
    OrgPhone,
    OrgEmail,
    Automotores,
    AddressCity,
    AddressState,
    AddressZipcode,
}

impl FieldId {
    /// Every field in catalog order. Auto-detection tests synonyms in this order.
    pub const ALL: [FieldId; 17] = [
        Self::Name,
        Self::Email,
        Self::Phone,
        Self::Whatsapp,
        Self::Cpf,
        Self::JobTitle,
        Self::Notes,
        Self::Label,
        Self::LeadSource,
        Self::OrgName,
        Self::Cnpj,
        Self::OrgPhone,
        Self::OrgEmail,
        Self::Automotores,
        Self::AddressCity,
        Self::AddressState,
        Self::AddressZipcode,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Email => "email",
            Self::Phone => "phone",
            Self::Whatsapp => "whatsapp",
            Self::Cpf => "cpf",
            Self::JobTitle => "job_title",
            Self::Notes => "notes",
            Self::Label => "label",
            Self::LeadSource => "lead_source",
            Self::OrgName => "org_name",
            Self::Cnpj => "cnpj",
            Self::OrgPhone => "org_phone",
            Self::OrgEmail => "org_email",
            Self::Automotores => "automotores",
            Self::AddressCity => "address_city",
            Self::AddressState => "address_state",
            Self::AddressZipcode => "address_zipcode",
        }
    }

    /// Parse a field id. Returns `None` for unknown values.
    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.as_str() == s)
    }

    /// Human-readable label shown next to the mapping selector.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Name => "Nome",
            Self::Email => "Email",
            Self::Phone => "Telefone",
            Self::Whatsapp => "WhatsApp",
            Self::Cpf => "CPF",
            Self::JobTitle => "Cargo",
            Self::Notes => "Observações",
            Self::Label => "Etiqueta",
            Self::LeadSource => "Origem do lead",
            Self::OrgName => "Empresa",
            Self::Cnpj => "CNPJ",
            Self::OrgPhone => "Telefone da empresa",
            Self::OrgEmail => "Email da empresa",
            Self::Automotores => "Automotores",
            Self::AddressCity => "Cidade",
            Self::AddressState => "UF",
            Self::AddressZipcode => "CEP",
        }
    }

    pub fn group(&self) -> FieldGroup {
        match self {
            Self::Name
            | Self::Email
            | Self::Phone
            | Self::Whatsapp
            | Self::Cpf
            | Self::JobTitle
            | Self::Notes
            | Self::Label
            | Self::LeadSource => FieldGroup::Person,
            Self::OrgName
            | Self::Cnpj
            | Self::OrgPhone
            | Self::OrgEmail
            | Self::Automotores
            | Self::AddressCity
            | Self::AddressState
            | Self::AddressZipcode => FieldGroup::Organization,
        }
    }

    pub fn is_required(&self) -> bool {
        matches!(self, Self::Name)
    }

    /// Header spellings recognised for this field, already in
    /// [`fold_text`](crate::normalize::fold_text) form.
    pub fn synonyms(&self) -> &'static [&'static str] {
        match self {
            Self::Name => &[
                "nome",
                "name",
                "nome completo",
                "nome do contato",
                "contato",
                "full name",
            ],
            Self::Email => &["email", "e mail", "email do contato", "correio eletronico"],
            Self::Phone => &["telefone", "phone", "fone", "tel", "celular", "telefone do contato"],
            Self::Whatsapp => &["whatsapp", "whats", "wpp", "zap"],
            Self::Cpf => &["cpf", "cpf do contato"],
            Self::JobTitle => &["cargo", "funcao", "job title", "posicao"],
            Self::Notes => &["observacoes", "observacao", "obs", "notas", "notes"],
            Self::Label => &["etiqueta", "label", "tag", "tags"],
            Self::LeadSource => &["origem", "origem do lead", "fonte", "fonte do lead", "lead source"],
            Self::OrgName => &[
                "empresa",
                "razao social",
                "nome da empresa",
                "nome fantasia",
                "organizacao",
                "company",
            ],
            Self::Cnpj => &["cnpj", "cnpj da empresa"],
            Self::OrgPhone => &["telefone da empresa", "telefone empresa", "fone empresa"],
            Self::OrgEmail => &["email da empresa", "email empresa", "e mail da empresa"],
            Self::Automotores => &[
                "automotores",
                "qtd automotores",
                "quantidade de automotores",
                "frota",
                "veiculos",
            ],
            Self::AddressCity => &["cidade", "municipio", "city"],
            Self::AddressState => &["estado", "uf", "state"],
            Self::AddressZipcode => &["cep", "zip", "zipcode", "codigo postal"],
        }
    }
}

impl std::fmt::Display for FieldId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Catalog entries
// ---------------------------------------------------------------------------

/// Serializable description of one catalog field for the mapping UI.
#[derive(Debug, Clone, Serialize)]
pub struct FieldDef {
    pub id: FieldId,
    pub label: &'static str,
    pub group: FieldGroup,
    pub required: bool,
}

/// The whole catalog in display order.
pub fn catalog() -> Vec<FieldDef> {
    FieldId::ALL
        .into_iter()
        .map(|id| FieldDef {
            id,
            label: id.label(),
            group: id.group(),
            required: id.is_required(),
        })
        .collect()
}

/// Fields that must be mapped before the preview step can be entered.
pub fn required_fields() -> impl Iterator<Item = FieldId> {
    FieldId::ALL.into_iter().filter(FieldId::is_required)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::fold_text;

    #[test]
    fn exactly_one_required_field() {
        let required: Vec<FieldId> = required_fields().collect();
        assert_eq!(required, vec![FieldId::Name]);
        assert_eq!(FieldId::Name.group(), FieldGroup::Person);
    }

    #[test]
    fn from_str_round_trip() {
        for field in FieldId::ALL {
            assert_eq!(FieldId::from_str(field.as_str()), Some(field));
        }
        assert_eq!(FieldId::from_str("nickname"), None);
    }

    #[test]
    fn serde_matches_as_str() {
        let json = serde_json::to_string(&FieldId::AddressZipcode).unwrap();
        assert_eq!(json, "\"address_zipcode\"");
    }

    #[test]
    fn synonyms_are_stored_folded() {
        for field in FieldId::ALL {
            for synonym in field.synonyms() {
                assert_eq!(&fold_text(synonym), synonym, "{field}: {synonym}");
            }
        }
    }

    #[test]
    fn synonyms_do_not_overlap() {
        let mut seen = std::collections::HashMap::new();
        for field in FieldId::ALL {
            for synonym in field.synonyms() {
                if let Some(previous) = seen.insert(*synonym, field) {
                    panic!("'{synonym}' claimed by both {previous} and {field}");
                }
            }
        }
    }

    #[test]
    fn groups_partition_catalog() {
        let defs = catalog();
        let people = defs.iter().filter(|d| d.group == FieldGroup::Person).count();
        let orgs = defs
            .iter()
            .filter(|d| d.group == FieldGroup::Organization)
            .count();
        assert_eq!(people, 9);
        assert_eq!(orgs, 8);
    }
}
