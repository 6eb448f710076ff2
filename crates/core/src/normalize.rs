//! Text normalization shared by the mapping engine, the duplicate preview and
//! the commit executor.
//!
//! The same functions are applied to store snapshots and to incoming values,
//! so two spellings compare equal exactly when their normalized forms do.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Fold free text for comparison.
///
/// - Unicode NFD decomposition with combining marks dropped (`ã` -> `a`)
/// - Lowercase conversion
/// - Punctuation replaced by spaces
/// - Whitespace collapsed and trimmed
///
/// ```
/// use rolodex_core::normalize::fold_text;
///
/// assert_eq!(fold_text("  Razão   Social "), "razao social");
/// assert_eq!(fold_text("E-mail"), "e mail");
/// ```
pub fn fold_text(s: &str) -> String {
    let stripped: String = s
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();

    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Keep only ASCII digits. Used for CPF, CNPJ, phone numbers and CEP.
pub fn digits_only(s: &str) -> String {
    s.chars().filter(char::is_ascii_digit).collect()
}

/// Trimmed, lowercased email address.
pub fn normalize_email(s: &str) -> String {
    s.trim().to_lowercase()
}

/// Digit-only tax id, or `None` when nothing numeric remains.
pub fn normalize_tax_id(s: &str) -> Option<String> {
    let digits = digits_only(s);
    if digits.is_empty() {
        None
    } else {
        Some(digits)
    }
}
