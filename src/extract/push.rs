//! PushEvent: one PushEvents row plus one Commits row per pushed commit.

use serde_json::Value;

use super::rule::{Coercion, FieldRule, apply_rules, common};
use super::{Cell, Extracted, Extractor, FlatRow, RowError, SchemaName};
use crate::event::{EventKind, Resolved, json_type_name, resolve};
use crate::extract::FieldWarning;

const COMMITS_PATH: &[&str] = &["payload", "commits"];

pub(super) const PUSH_RULES: &[FieldRule] = &[
    common::ID,
    common::TYPE,
    common::ACTOR_ID,
    common::ACTOR_LOGIN,
    common::REPO_ID,
    common::REPO_NAME,
    FieldRule::required("push_id", &["payload", "push_id"], Coercion::Integer),
    FieldRule::optional("push_size", &["payload", "size"], Coercion::Integer),
    FieldRule::optional("push_ref", &["payload", "ref"], Coercion::Text),
    FieldRule::optional("push_head", &["payload", "head"], Coercion::Text),
    FieldRule::optional("push_before", &["payload", "before"], Coercion::Text),
    common::CREATED_AT,
    common::PUBLIC,
];

/// Rules applied to each element of `payload.commits`.
pub(super) const COMMIT_RULES: &[FieldRule] = &[
    FieldRule::optional("sha", &["sha"], Coercion::Text),
    FieldRule::optional("author_name", &["author", "name"], Coercion::Text),
    FieldRule::optional("url", &["url"], Coercion::Text),
    FieldRule::optional("message", &["message"], Coercion::Text),
];

/// Commit columns copied from the parent push row: (commit column, push column).
const INHERITED: &[(&str, &str)] = &[
    ("push_id", "push_id"),
    ("actor_id", "actor_id"),
    ("repo_id", "repo_id"),
    ("repo_name", "repo_name"),
    ("actor_user_name", "actor_user_name"),
    ("push_created_at", "created_at"),
    ("public", "public"),
];

/// Commit columns that do not come from the commit element itself.
#[cfg(test)]
pub(super) const COMMIT_PARENT_COLUMNS: &[&str] = &[
    "type",
    "push_id",
    "actor_id",
    "repo_id",
    "repo_name",
    "actor_user_name",
    "push_created_at",
    "public",
];

const COMMIT_TYPE: &str = "Commit";

#[derive(Debug, Clone, Copy, Default)]
pub struct PushExtractor;

impl PushExtractor {
    fn commit_row(
        parent: &FlatRow,
        index: usize,
        element: &Value,
        warnings: &mut Vec<FieldWarning>,
    ) -> Result<FlatRow, RowError> {
        let capacity = COMMIT_RULES.len() + INHERITED.len() + 1;
        let mut row = FlatRow::with_capacity(SchemaName::Commits, capacity);
        let mut element_warnings = Vec::new();
        apply_rules(COMMIT_RULES, element, &mut row, &mut element_warnings)?;

        warnings.extend(element_warnings.into_iter().map(|mut w| {
            w.path = format!("payload.commits.{index}.{}", w.path);
            w
        }));

        row.set("type", Cell::Text(COMMIT_TYPE.to_string()));
        for &(column, parent_column) in INHERITED {
            row.set(column, parent.cell_or_null(parent_column).clone());
        }
        Ok(row)
    }
}

impl Extractor for PushExtractor {
    fn kind(&self) -> EventKind {
        EventKind::Push
    }

    fn primary_schema(&self) -> SchemaName {
        SchemaName::PushEvents
    }

    fn extract(&self, event: &Value) -> Result<Extracted, RowError> {
        let mut push = FlatRow::with_capacity(SchemaName::PushEvents, PUSH_RULES.len());
        let mut warnings = Vec::new();
        apply_rules(PUSH_RULES, event, &mut push, &mut warnings)?;

        let commits: &[Value] = match resolve(event, COMMITS_PATH) {
            Resolved::Present(Value::Array(items)) => items,
            Resolved::Present(other) => {
                warnings.push(FieldWarning {
                    schema: SchemaName::Commits,
                    path: COMMITS_PATH.join("."),
                    detail: format!("expected array, found {}", json_type_name(other)),
                });
                &[]
            }
            _ => &[],
        };

        let mut rows = Vec::with_capacity(1 + commits.len());
        for (index, element) in commits.iter().enumerate() {
            rows.push(Self::commit_row(&push, index, element, &mut warnings)?);
        }
        rows.insert(0, push);

        Ok(Extracted { rows, warnings })
    }
}
