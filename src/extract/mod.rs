//! Per-kind extractors turning decoded events into flat rows.
//!
//! Each bound event kind has one [`Extractor`]. Most are plain rule tables
//! run by [`RuleExtractor`]; Push fans out into one PushEvents row plus one
//! Commits row per commit.

mod create;
mod delete;
mod fork;
mod issue;
mod member;
mod pull_request;
mod push;
mod row;
mod rule;

use std::collections::HashMap;

use serde_json::Value;

use crate::event::EventKind;

pub use pull_request::STRUCTURAL_COLUMNS as PULL_REQUEST_STRUCTURAL_COLUMNS;
pub use push::PushExtractor;
pub use row::{Cell, FlatRow, SchemaName};
pub use rule::{
    Coercion, Fallback, FieldRule, FieldWarning, Presence, RowError, RowFailure, apply_rules,
    coerce, common, parse_timestamp,
};

/// Rows and warnings produced by one event.
#[derive(Debug, Default)]
pub struct Extracted {
    pub rows: Vec<FlatRow>,
    pub warnings: Vec<FieldWarning>,
}

/// Turns one classified event into rows.
///
/// Implementations are pure: no I/O, no shared state. A `RowError` means
/// the event produced no rows at all.
pub trait Extractor: Send + Sync {
    fn kind(&self) -> EventKind;

    /// Schema that row failures for this kind are counted against.
    fn primary_schema(&self) -> SchemaName;

    fn extract(&self, event: &Value) -> Result<Extracted, RowError>;
}

/// Single-row extractor driven by a static rule table.
#[derive(Debug, Clone, Copy)]
pub struct RuleExtractor {
    pub kind: EventKind,
    pub schema: SchemaName,
    pub rules: &'static [FieldRule],
}

impl Extractor for RuleExtractor {
    fn kind(&self) -> EventKind {
        self.kind
    }

    fn primary_schema(&self) -> SchemaName {
        self.schema
    }

    fn extract(&self, event: &Value) -> Result<Extracted, RowError> {
        let mut row = FlatRow::with_capacity(self.schema, self.rules.len());
        let mut warnings = Vec::new();
        apply_rules(self.rules, event, &mut row, &mut warnings)?;
        Ok(Extracted {
            rows: vec![row],
            warnings,
        })
    }
}

/// Maps event kinds to their extractors.
pub struct ExtractorRegistry {
    extractors: HashMap<EventKind, Box<dyn Extractor>>,
}

impl ExtractorRegistry {
    pub fn empty() -> Self {
        Self {
            extractors: HashMap::new(),
        }
    }

    pub fn register(&mut self, extractor: Box<dyn Extractor>) {
        self.extractors.insert(extractor.kind(), extractor);
    }

    pub fn get(&self, kind: EventKind) -> Option<&dyn Extractor> {
        self.extractors.get(&kind).map(|e| e.as_ref())
    }

    pub fn is_bound(&self, kind: EventKind) -> bool {
        self.extractors.contains_key(&kind)
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(create::extractor()));
        registry.register(Box::new(delete::extractor()));
        registry.register(Box::new(fork::extractor()));
        registry.register(Box::new(issue::extractor()));
        registry.register(Box::new(member::extractor()));
        registry.register(Box::new(PushExtractor));
        registry.register(Box::new(pull_request::extractor()));
        registry
    }
}

impl std::fmt::Debug for ExtractorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<_> = self.extractors.keys().collect();
        kinds.sort();
        f.debug_struct("ExtractorRegistry").field("kinds", &kinds).finish()
    }
}

/// Rule table used for a fixed-schema table, if it is rule-driven.
pub fn rules_for(schema: SchemaName) -> &'static [FieldRule] {
    match schema {
        SchemaName::ForkEvents => fork::RULES,
        SchemaName::PushEvents => push::PUSH_RULES,
        SchemaName::Commits => push::COMMIT_RULES,
        SchemaName::Creates => create::RULES,
        SchemaName::Deletes => delete::RULES,
        SchemaName::Issues => issue::RULES,
        SchemaName::Members => member::RULES,
        SchemaName::PullRequests => pull_request::RULES,
    }
}
