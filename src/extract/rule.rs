//! Declarative field rules and their evaluation.
//!
//! A rule maps one output column to a path in the event, says whether the
//! field is structurally required, how to coerce it and what to use when an
//! optional field is missing. Rule sets are static tables, one per kind.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;
use snafu::prelude::*;

use super::row::{Cell, FlatRow, SchemaName};
use crate::event::{Resolved, dotted, json_type_name, resolve};

/// Legacy archive timestamp layout (pre-2015 events).
const LEGACY_TIMESTAMP_FORMAT: &str = "%Y/%m/%d %H:%M:%S %z";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Required,
    Optional,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coercion {
    Text,
    Integer,
    Float,
    Boolean,
    Timestamp,
    /// Pass the nested value through untouched.
    Nested,
}

/// Value used when an optional field is missing or unusable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Fallback {
    Null,
    Text(&'static str),
    Bool(bool),
}

impl Fallback {
    fn cell(&self) -> Cell {
        match self {
            Fallback::Null => Cell::Null,
            Fallback::Text(s) => Cell::Text((*s).to_string()),
            Fallback::Bool(b) => Cell::Bool(*b),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldRule {
    pub column: &'static str,
    pub path: &'static [&'static str],
    pub presence: Presence,
    pub coercion: Coercion,
    pub fallback: Fallback,
}

impl FieldRule {
    pub const fn required(
        column: &'static str,
        path: &'static [&'static str],
        coercion: Coercion,
    ) -> Self {
        Self {
            column,
            path,
            presence: Presence::Required,
            coercion,
            fallback: Fallback::Null,
        }
    }

    pub const fn optional(
        column: &'static str,
        path: &'static [&'static str],
        coercion: Coercion,
    ) -> Self {
        Self {
            column,
            path,
            presence: Presence::Optional,
            coercion,
            fallback: Fallback::Null,
        }
    }

    pub const fn or(self, fallback: Fallback) -> Self {
        Self { fallback, ..self }
    }
}

/// Why a required field could not be read.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub))]
pub enum RowFailure {
    #[snafu(display("field is absent"))]
    Absent,

    #[snafu(display("field is null"))]
    Null,

    #[snafu(display("path crosses a {found}"))]
    Mismatch { found: &'static str },

    #[snafu(display("cannot coerce {found} to {expected:?}"))]
    Uncoercible {
        expected: Coercion,
        found: &'static str,
    },
}

/// A record that could not produce any rows.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(display("{schema}: {path} ({reason})"))]
pub struct RowError {
    pub schema: SchemaName,
    pub path: String,
    pub reason: RowFailure,
}

/// An optional field that was present but did not coerce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldWarning {
    pub schema: SchemaName,
    pub path: String,
    pub detail: String,
}

/// Coerce a present JSON value. Returns `None` when it does not fit.
pub fn coerce(value: &Value, coercion: Coercion) -> Option<Cell> {
    match coercion {
        Coercion::Text => match value {
            Value::String(s) => Some(Cell::Text(s.clone())),
            Value::Number(n) => Some(Cell::Text(n.to_string())),
            Value::Bool(b) => Some(Cell::Text(b.to_string())),
            _ => None,
        },
        Coercion::Integer => match value {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && f.abs() < 9.0e18).map(|f| f as i64))
                .map(Cell::Int),
            Value::String(s) => s.trim().parse::<i64>().ok().map(Cell::Int),
            _ => None,
        },
        Coercion::Float => match value {
            Value::Number(n) => n.as_f64().map(Cell::Float),
            Value::String(s) => s.trim().parse::<f64>().ok().map(Cell::Float),
            _ => None,
        },
        Coercion::Boolean => match value {
            Value::Bool(b) => Some(Cell::Bool(*b)),
            Value::String(s) => match s.as_str() {
                "true" => Some(Cell::Bool(true)),
                "false" => Some(Cell::Bool(false)),
                _ => None,
            },
            _ => None,
        },
        Coercion::Timestamp => match value {
            Value::String(s) => parse_timestamp(s).map(Cell::Timestamp),
            Value::Number(n) => n
                .as_i64()
                .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
                .map(Cell::Timestamp),
            _ => None,
        },
        Coercion::Nested => Some(Cell::Json(value.clone())),
    }
}

/// Parse an archive timestamp into UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = DateTime::parse_from_str(raw, LEGACY_TIMESTAMP_FORMAT) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Apply `rules` in order to `event`, writing into `row`.
///
/// Later rules overwrite earlier ones for the same column only when they
/// produce a real value. Warnings for optional fields that failed to
/// coerce are appended to `warnings`.
pub fn apply_rules(
    rules: &[FieldRule],
    event: &Value,
    row: &mut FlatRow,
    warnings: &mut Vec<FieldWarning>,
) -> Result<(), RowError> {
    for rule in rules {
        let schema = row.schema;
        let failure = match resolve(event, rule.path) {
            Resolved::Present(value) => match coerce(value, rule.coercion) {
                Some(cell) => {
                    row.set(rule.column, cell);
                    continue;
                }
                None => RowFailure::Uncoercible {
                    expected: rule.coercion,
                    found: json_type_name(value),
                },
            },
            Resolved::Absent => RowFailure::Absent,
            Resolved::Null => RowFailure::Null,
            Resolved::Mismatch { found, .. } => RowFailure::Mismatch { found },
        };

        if rule.presence == Presence::Required {
            return Err(RowError {
                schema,
                path: dotted(rule.path),
                reason: failure,
            });
        }

        if let RowFailure::Uncoercible { .. } = failure {
            warnings.push(FieldWarning {
                schema,
                path: dotted(rule.path),
                detail: failure.to_string(),
            });
        }

        if !row.contains(rule.column) {
            row.set(rule.column, rule.fallback.cell());
        }
    }

    Ok(())
}

/// Structural rules shared by every bound kind.
pub mod common {
    use super::{Coercion, FieldRule};

    pub const ID: FieldRule = FieldRule::required("id", &["id"], Coercion::Text);
    pub const TYPE: FieldRule = FieldRule::required("type", &["type"], Coercion::Text);
    pub const CREATED_AT: FieldRule =
        FieldRule::required("created_at", &["created_at"], Coercion::Timestamp);
    pub const ACTOR_ID: FieldRule = FieldRule::required("actor_id", &["actor", "id"], Coercion::Integer);
    pub const ACTOR_LOGIN: FieldRule =
        FieldRule::required("actor_user_name", &["actor", "login"], Coercion::Text);
    pub const REPO_ID: FieldRule = FieldRule::required("repo_id", &["repo", "id"], Coercion::Integer);
    pub const REPO_NAME: FieldRule =
        FieldRule::required("repo_name", &["repo", "name"], Coercion::Text);
    pub const PUBLIC: FieldRule = FieldRule::optional("public", &["public"], Coercion::Boolean);
}
