use crate::codec::DELIMITER;
use crate::errors::{SyncError, SyncResult};

/// Longest identifier accepted as a record key or snapshot file stem.
pub const MAX_IDENTIFIER_LEN: usize = 128;

/// Validate a record key: a username or the user id of a log entry.
///
/// Keys only have to stay on one line and hold no delimiter.
pub fn validate_key(field: &str, value: &str) -> SyncResult<()> {
    if value.trim().is_empty() {
        return Err(SyncError::validation(field, "must not be empty"));
    }
    if value.contains(DELIMITER) {
        return Err(SyncError::invalid_field(
            field,
            "contains the record delimiter '|'",
        ));
    }
    if value.chars().any(char::is_control) {
        return Err(SyncError::invalid_field(field, "contains control characters"));
    }
    Ok(())
}

/// Validate a user id that also names the per-user consent snapshot, so it
/// must never escape the storage root when used as a file stem.
pub fn validate_identifier(field: &str, value: &str) -> SyncResult<()> {
    validate_key(field, value)?;
    if value.chars().count() > MAX_IDENTIFIER_LEN {
        return Err(SyncError::validation(
            field,
            format!("must be at most {MAX_IDENTIFIER_LEN} characters"),
        ));
    }
    if value.contains(['/', '\\']) || value.contains("..") {
        return Err(SyncError::validation(field, "contains a path component"));
    }
    Ok(())
}

/// Validate a plain field that will be stored in a pipe-delimited line.
pub fn validate_field(field: &str, value: &str) -> SyncResult<()> {
    if value.contains(DELIMITER) {
        return Err(SyncError::invalid_field(
            field,
            "contains the record delimiter '|'",
        ));
    }
    if value.contains(['\n', '\r']) {
        return Err(SyncError::invalid_field(field, "contains a line break"));
    }
    Ok(())
}

/// Validate the name of a file requested from the storage root.
pub fn validate_file_name(name: &str) -> SyncResult<()> {
    if name.is_empty() || name == "." {
        return Err(SyncError::validation("file", "must not be empty"));
    }
    if name.contains(['/', '\\']) || name.contains("..") {
        return Err(SyncError::validation("file", "Path traversal attempt detected"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_ordinary_identifiers() {
        assert!(validate_identifier("user_id", "bob").is_ok());
        assert!(validate_identifier("user_id", "user.42@example.com").is_ok());
    }

    #[test]
    fn rejects_empty_and_oversized() {
        assert!(validate_identifier("user_id", "  ").is_err());
        let long = "a".repeat(MAX_IDENTIFIER_LEN + 1);
        assert!(validate_identifier("user_id", &long).is_err());
    }

    #[test]
    fn rejects_delimiter_as_invalid_field() {
        assert!(matches!(
            validate_identifier("username", "a|b"),
            Err(SyncError::InvalidField { .. })
        ));
    }

    #[test]
    fn rejects_path_components() {
        assert!(validate_identifier("user_id", "../etc/passwd").is_err());
        assert!(validate_identifier("user_id", "a\\b").is_err());
        assert!(validate_file_name("../user.txt").is_err());
        assert!(validate_file_name("user.txt").is_ok());
    }

    #[test]
    fn keys_allow_path_like_values() {
        assert!(validate_key("username", "john..doe").is_ok());
        assert!(validate_key("username", "sales/alice").is_ok());
        assert!(validate_key("username", &"a".repeat(MAX_IDENTIFIER_LEN * 2)).is_ok());
        assert!(validate_key("username", "").is_err());
        assert!(validate_key("username", "a|b").is_err());
        assert!(validate_key("username", "a\tb").is_err());
    }

    #[test]
    fn identifier_length_counts_characters() {
        let accented = "\u{e9}".repeat(100);
        assert!(validate_identifier("user_id", &accented).is_ok());
        let too_long = "\u{e9}".repeat(MAX_IDENTIFIER_LEN + 1);
        assert!(validate_identifier("user_id", &too_long).is_err());
    }

    #[test]
    fn field_rules() {
        assert!(validate_field("status", "active").is_ok());
        assert!(validate_field("status", "").is_ok());
        assert!(validate_field("status", "a|b").is_err());
        assert!(validate_field("status", "a\nb").is_err());
    }
}
