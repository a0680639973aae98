//! Optional-aware navigation of nested JSON values.
//!
//! Every nested read in the extractors goes through [`resolve`]. Missing
//! substructure is a normal outcome, never a panic.

use serde_json::Value;

use super::decode::json_type_name;

/// Outcome of walking a path through a value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Resolved<'v> {
    /// A key is missing, an index is out of range, or an intermediate node is null.
    Absent,
    /// The final node exists and is JSON null.
    Null,
    /// An intermediate node is not the container the next segment needs.
    Mismatch {
        /// Index of the segment that could not be applied.
        depth: usize,
        found: &'static str,
    },
    Present(&'v Value),
}

/// Walk `path` through `root`.
///
/// Object nodes are indexed by key and array nodes by a segment that parses
/// as a decimal index.
pub fn resolve<'v>(root: &'v Value, path: &[&str]) -> Resolved<'v> {
    let mut current = root;

    for (depth, segment) in path.iter().enumerate() {
        let next = match current {
            Value::Object(map) => map.get(*segment),
            Value::Array(items) => match segment.parse::<usize>() {
                Ok(index) => items.get(index),
                Err(_) => {
                    return Resolved::Mismatch {
                        depth,
                        found: "array",
                    };
                }
            },
            Value::Null => return Resolved::Absent,
            other => {
                return Resolved::Mismatch {
                    depth,
                    found: json_type_name(other),
                };
            }
        };

        match next {
            Some(value) => current = value,
            None => return Resolved::Absent,
        }
    }

    if current.is_null() {
        Resolved::Null
    } else {
        Resolved::Present(current)
    }
}

/// Dotted rendering of a path, used in error records.
pub fn dotted(path: &[&str]) -> String {
    path.join(".")
}
