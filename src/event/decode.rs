//! Raw line decoding.
//!
//! Turns one NDJSON line into a generic JSON value. Anything that is not a
//! single JSON object is a parse failure; the caller counts it and moves on.

use serde_json::Value;
use snafu::prelude::*;

/// Maximum number of bytes of the offending line kept for diagnostics.
const CONTEXT_BYTES: usize = 256;

/// Why a line could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub))]
pub enum DecodeError {
    /// The line is not valid JSON.
    #[snafu(display("{message}: {context}"))]
    Malformed { message: String, context: String },

    /// The line is valid JSON but not an object.
    #[snafu(display("expected a JSON object, found {found}"))]
    NotAnObject { found: &'static str },
}

/// Decode a raw line into a JSON object value.
pub fn decode(line: &[u8]) -> Result<Value, DecodeError> {
    let value: Value = serde_json::from_slice(line).map_err(|e| DecodeError::Malformed {
        message: e.to_string(),
        context: line_context(line),
    })?;

    ensure!(
        value.is_object(),
        NotAnObjectSnafu {
            found: json_type_name(&value)
        }
    );
    Ok(value)
}

/// Lossy, truncated rendering of a line for error context.
pub fn line_context(line: &[u8]) -> String {
    let end = line.len().min(CONTEXT_BYTES);
    let mut context = String::from_utf8_lossy(&line[..end]).into_owned();
    if line.len() > CONTEXT_BYTES {
        context.push_str("...");
    }
    context
}

/// Name of a JSON value's type, for messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
