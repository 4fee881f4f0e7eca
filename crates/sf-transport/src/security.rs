//! Redaction of credentials in server-provided text.

const MAX_LENGTH: usize = 500;

/// Sanitize an error message before it is stored in an error or logged.
///
/// Redacts anything shaped like a Salesforce session id or access token
/// and truncates long bodies.
pub fn sanitize_error_message(message: &str) -> String {
    // Salesforce tokens start with the 15/18-char org id followed by '!'
    let mut sanitized = redact(
        message,
        r"00[A-Za-z0-9]{13,}[!][A-Za-z0-9_.]+",
        "[REDACTED_TOKEN]",
    );
    sanitized = redact(&sanitized, r"sid=[A-Za-z0-9]{20,}", "sid=[REDACTED]");

    if sanitized.len() > MAX_LENGTH {
        let mut cut = MAX_LENGTH;
        while !sanitized.is_char_boundary(cut) {
            cut -= 1;
        }
        sanitized.truncate(cut);
        sanitized.push_str("...[truncated]");
    }

    sanitized
}

fn redact(input: &str, pattern: &str, replacement: &str) -> String {
    match regex_lite::Regex::new(pattern) {
        Ok(re) => re.replace_all(input, replacement).into_owned(),
        Err(_) => input.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redacts_session_token() {
        let msg = "Invalid session 00D5g000004XyZaEAK!AQ4AQFakeTokenValue.abc for request";
        let sanitized = sanitize_error_message(msg);
        assert!(sanitized.contains("[REDACTED_TOKEN]"));
        assert!(!sanitized.contains("FakeTokenValue"));
    }

    #[test]
    fn test_redacts_sid_parameter() {
        let msg = "redirect to /home?sid=ABCDEFGHIJKLMNOPQRSTUVWX";
        assert_eq!(sanitize_error_message(msg), "redirect to /home?sid=[REDACTED]");
    }

    #[test]
    fn test_truncates_long_messages() {
        let sanitized = sanitize_error_message(&"x".repeat(2000));
        assert!(sanitized.ends_with("...[truncated]"));
        assert_eq!(sanitized.len(), 500 + "...[truncated]".len());
    }

    #[test]
    fn test_truncation_respects_char_boundaries() {
        let sanitized = sanitize_error_message(&"é".repeat(400));
        assert!(sanitized.ends_with("...[truncated]"));
    }

    #[test]
    fn test_plain_message_unchanged() {
        let msg = "InvalidBatch : Field name not found : Foo__c";
        assert_eq!(sanitize_error_message(msg), msg);
    }
}
