//! Internal helpers for input normalization.
//!
//! These utilities are **not** part of the public API.

use unicode_normalization::UnicodeNormalization;

use crate::{EngineError, ResultEngine};

/// Keeps the digits of a phone number and a leading `+`.
///
/// Returns `None` when no digit is left.
pub(crate) fn normalize_phone(value: &str) -> Option<String> {
    let trimmed = value.trim();
    let digits: String = trimmed.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return None;
    }
    if trimmed.starts_with('+') {
        Some(format!("+{digits}"))
    } else {
        Some(digits)
    }
}

/// Trims and NFC-normalizes free text, mapping blanks to `None`.
pub(crate) fn normalize_optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.nfc().collect())
}

pub(crate) fn normalize_required_text(value: &str, label: &str) -> ResultEngine<String> {
    normalize_optional_text(Some(value))
        .ok_or_else(|| EngineError::Validation(format!("{label} must not be empty")))
}

/// Usernames compare case-insensitively.
pub(crate) fn normalize_username(value: &str) -> ResultEngine<String> {
    let name = normalize_required_text(value, "username")?;
    if name.chars().any(char::is_whitespace) {
        return Err(EngineError::Validation(
            "username must not contain spaces".to_string(),
        ));
    }
    Ok(name.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phone_keeps_digits_and_leading_plus() {
        assert_eq!(
            normalize_phone(" +998 (90) 123-45-67 ").as_deref(),
            Some("+998901234567")
        );
        assert_eq!(normalize_phone("90 123 45 67").as_deref(), Some("901234567"));
        assert_eq!(normalize_phone("1+2").as_deref(), Some("12"));
        assert_eq!(normalize_phone(" - "), None);
    }

    #[test]
    fn blank_text_is_none() {
        assert_eq!(normalize_optional_text(Some("   ")), None);
        assert_eq!(normalize_optional_text(None), None);
        assert_eq!(
            normalize_optional_text(Some(" Ali ")).as_deref(),
            Some("Ali")
        );
    }

    #[test]
    fn usernames_are_lowercased() {
        assert_eq!(normalize_username(" Admin ").unwrap(), "admin");
        assert!(normalize_username("a b").is_err());
        assert!(normalize_username("  ").is_err());
    }
}
