//! Channel-value normalization and validation shared by the OTP handlers.

use regex::Regex;

use crate::auth::ChannelKind;

pub(super) fn normalize_email(email: &str) -> String {
    // Lowercasing keeps lookups stable regardless of how the address was typed.
    email.trim().to_lowercase()
}

pub(super) fn valid_email(email_normalized: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email_normalized))
}

pub(super) fn normalize_mobile(mobile: &str) -> String {
    // Strip the separators people paste from their contacts app.
    mobile
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')'))
        .collect()
}

/// E.164: leading `+`, 8 to 15 digits, no leading zero.
pub(super) fn valid_mobile(mobile_normalized: &str) -> bool {
    Regex::new(r"^\+[1-9][0-9]{7,14}$").is_ok_and(|regex| regex.is_match(mobile_normalized))
}

/// Normalize and validate a submitted channel value in one step; `None`
/// means the value could never match a stored principal.
pub(super) fn normalize_destination(channel: ChannelKind, raw: &str) -> Option<String> {
    match channel {
        ChannelKind::Email => {
            let normalized = normalize_email(raw);
            valid_email(&normalized).then_some(normalized)
        }
        ChannelKind::Mobile => {
            let normalized = normalize_mobile(raw);
            valid_mobile(&normalized).then_some(normalized)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_email_trims_and_lowercases() {
        assert_eq!(normalize_email(" Alice@Example.COM "), "alice@example.com");
    }

    #[test]
    fn valid_email_accepts_basic_format() {
        assert!(valid_email("a@example.com"));
        assert!(valid_email("name.surname@example.co"));
    }

    #[test]
    fn valid_email_rejects_missing_parts() {
        assert!(!valid_email("no-at-sign"));
        assert!(!valid_email("a@nodot"));
        assert!(!valid_email("spaces in@example.com"));
    }

    #[test]
    fn normalize_mobile_strips_separators() {
        assert_eq!(normalize_mobile("+46 70-123 45 67"), "+46701234567");
        assert_eq!(normalize_mobile("+1 (415) 555-0100"), "+14155550100");
    }

    #[test]
    fn valid_mobile_requires_e164() {
        assert!(valid_mobile("+46701234567"));
        assert!(!valid_mobile("0701234567"));
        assert!(!valid_mobile("+0701234567"));
        assert!(!valid_mobile("+46"));
    }

    #[test]
    fn normalize_destination_rejects_garbage() {
        assert_eq!(
            normalize_destination(ChannelKind::Email, " Investor@Brix.DEV "),
            Some("investor@brix.dev".to_string())
        );
        assert_eq!(normalize_destination(ChannelKind::Email, "not-an-email"), None);
        assert_eq!(
            normalize_destination(ChannelKind::Mobile, "+46 70 123 45 67"),
            Some("+46701234567".to_string())
        );
        assert_eq!(normalize_destination(ChannelKind::Mobile, "call me"), None);
    }
}
