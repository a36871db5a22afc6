//! Line record codec for the pipe-delimited flat files.

use crate::errors::{SyncError, SyncResult};

/// Field delimiter used by every pipe-delimited file.
pub const DELIMITER: char = '|';

/// Join `fields` with `|` and terminate the line with `\n`.
///
/// A field containing the delimiter or a line break is rejected; writing it
/// would change the arity of the line on read-back.
pub fn encode<S: AsRef<str>>(fields: &[S]) -> SyncResult<String> {
    let mut line = String::new();
    for (idx, field) in fields.iter().enumerate() {
        let field = field.as_ref();
        if field.contains(DELIMITER) {
            return Err(SyncError::invalid_field(
                format!("field[{idx}]"),
                "contains the record delimiter '|'",
            ));
        }
        if field.contains(['\n', '\r']) {
            return Err(SyncError::invalid_field(
                format!("field[{idx}]"),
                "contains a line break",
            ));
        }
        if idx > 0 {
            line.push(DELIMITER);
        }
        line.push_str(field);
    }
    line.push('\n');
    Ok(line)
}

/// Split a line on `|` after trimming the trailing line terminator.
pub fn decode(line: &str) -> Vec<String> {
    line.trim_end_matches(['\n', '\r'])
        .split(DELIMITER)
        .map(str::to_string)
        .collect()
}

/// Decode a line that must have exactly `arity` fields.
pub fn decode_exact(line: &str, arity: usize) -> SyncResult<Vec<String>> {
    let fields = decode(line);
    if fields.len() != arity {
        return Err(SyncError::decode(line.trim_end(), arity, fields.len()));
    }
    Ok(fields)
}

/// Make free text safe to store as a single field: trims surrounding
/// whitespace, folds line breaks into spaces and replaces `|` with `/`.
pub fn sanitize_free_text(text: &str) -> String {
    text.trim()
        .replace("\r\n", " ")
        .replace(['\n', '\r'], " ")
        .replace(DELIMITER, "/")
}
