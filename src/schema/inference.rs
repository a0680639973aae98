//! Sampling-based schema commitment for PullRequests.
//!
//! PullRequest payloads are wide and drift over time, so the committed
//! schema is derived from a Bernoulli sample of the run's rows: a column is
//! kept when some sampled row has a value for it, typed by the widest value
//! observed, and columns are ordered by name. The RNG is seeded so reruns
//! over the same input commit the same schema.

use std::collections::{BTreeMap, BTreeSet};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, warn};

use super::{ColumnDef, ColumnType, TableSchema};
use crate::extract::{FlatRow, PULL_REQUEST_STRUCTURAL_COLUMNS, SchemaName};

/// Result of inferring the PullRequests schema.
#[derive(Debug, Clone, PartialEq)]
pub struct InferredSchema {
    pub table: TableSchema,
    /// Number of rows the schema was derived from.
    pub sampled: usize,
    /// Columns seen in the input but never populated in the sample.
    pub omitted: Vec<&'static str>,
}

/// Infer a table schema from a seeded sample of `rows`.
pub fn infer_schema_from_sample(
    rows: &[FlatRow],
    ratio: f64,
    max_rows: usize,
    seed: u64,
) -> InferredSchema {
    if rows.is_empty() {
        return InferredSchema {
            table: structural_schema(),
            sampled: 0,
            omitted: Vec::new(),
        };
    }

    let sample = draw_sample(rows, ratio, max_rows, seed);

    let mut observed: BTreeMap<&'static str, ColumnType> = BTreeMap::new();
    for row in &sample {
        for (&column, cell) in &row.cells {
            let Some(ty) = cell.column_type() else {
                continue;
            };
            observed
                .entry(column)
                .and_modify(|current| *current = widen(*current, ty))
                .or_insert(ty);
        }
    }

    let seen: BTreeSet<&'static str> = rows.iter().flat_map(|r| r.columns()).collect();
    let omitted: Vec<&'static str> = seen
        .into_iter()
        .filter(|c| !observed.contains_key(c))
        .collect();

    if !omitted.is_empty() {
        warn!(
            "SchemaDriftRisk: {} PullRequests columns had no values in a sample of {} rows and were omitted: {}",
            omitted.len(),
            sample.len(),
            omitted.join(", ")
        );
    }

    let columns = observed
        .into_iter()
        .map(|(name, ty)| ColumnDef {
            name,
            ty,
            nullable: true,
        })
        .collect::<Vec<_>>();

    debug!(
        "Committed PullRequests schema with {} columns from {} of {} rows",
        columns.len(),
        sample.len(),
        rows.len()
    );

    InferredSchema {
        table: TableSchema {
            name: SchemaName::PullRequests,
            columns,
        },
        sampled: sample.len(),
        omitted,
    }
}

/// Bernoulli sample in input order, capped at `max_rows`. Never empty for
/// non-empty input.
fn draw_sample(rows: &[FlatRow], ratio: f64, max_rows: usize, seed: u64) -> Vec<&FlatRow> {
    let mut rng = StdRng::seed_from_u64(seed);
    let ratio = ratio.clamp(0.0, 1.0);
    let cap = max_rows.max(1);

    let mut sample = Vec::new();
    for row in rows {
        if sample.len() >= cap {
            break;
        }
        if rng.random_bool(ratio) {
            sample.push(row);
        }
    }

    if sample.is_empty() {
        sample.extend(rows.first());
    }
    sample
}

/// Widest type able to hold both.
fn widen(a: ColumnType, b: ColumnType) -> ColumnType {
    match (a, b) {
        (a, b) if a == b => a,
        (ColumnType::Int64, ColumnType::Float64) | (ColumnType::Float64, ColumnType::Int64) => {
            ColumnType::Float64
        }
        _ => ColumnType::Utf8,
    }
}

/// Schema used when there are no PullRequest rows to sample.
fn structural_schema() -> TableSchema {
    let columns = PULL_REQUEST_STRUCTURAL_COLUMNS
        .iter()
        .map(|&name| ColumnDef {
            name,
            ty: match name {
                "actor_id" | "repo_id" => ColumnType::Int64,
                "created_at" => ColumnType::Timestamp,
                _ => ColumnType::Utf8,
            },
            nullable: true,
        })
        .collect();

    TableSchema {
        name: SchemaName::PullRequests,
        columns,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::Cell;

    fn row(cells: &[(&'static str, Cell)]) -> FlatRow {
        let mut row = FlatRow::new(SchemaName::PullRequests);
        for (column, cell) in cells {
            row.set(column, cell.clone());
        }
        row
    }

    #[test]
    fn test_columns_sorted_and_typed() {
        let rows = vec![row(&[
            ("title", Cell::Text("Fix".into())),
            ("additions", Cell::Int(3)),
            ("merged", Cell::Bool(false)),
        ])];
        let inferred = infer_schema_from_sample(&rows, 1.0, 100, 7);

        assert_eq!(inferred.table.column_names(), vec!["additions", "merged", "title"]);
        assert_eq!(inferred.table.column("additions").unwrap().ty, ColumnType::Int64);
        assert_eq!(inferred.sampled, 1);
        assert!(inferred.omitted.is_empty());
    }

    #[test]
    fn test_all_null_columns_omitted() {
        let rows = vec![
            row(&[("id", Cell::Int(1)), ("milestone", Cell::Null)]),
            row(&[("id", Cell::Int(2)), ("milestone", Cell::Null)]),
        ];
        let inferred = infer_schema_from_sample(&rows, 1.0, 100, 7);

        assert_eq!(inferred.table.column_names(), vec!["id"]);
        assert_eq!(inferred.omitted, vec!["milestone"]);
    }

    #[test]
    fn test_widening() {
        let rows = vec![
            row(&[("a", Cell::Int(1)), ("b", Cell::Int(1))]),
            row(&[("a", Cell::Float(1.5)), ("b", Cell::Text("x".into()))]),
        ];
        let inferred = infer_schema_from_sample(&rows, 1.0, 100, 7);
        assert_eq!(inferred.table.column("a").unwrap().ty, ColumnType::Float64);
        assert_eq!(inferred.table.column("b").unwrap().ty, ColumnType::Utf8);
    }

    #[test]
    fn test_empty_sample_falls_back_to_first_row() {
        let rows = vec![
            row(&[("first", Cell::Int(1))]),
            row(&[("second", Cell::Int(2))]),
        ];
        let inferred = infer_schema_from_sample(&rows, 0.0, 100, 7);
        assert_eq!(inferred.sampled, 1);
        assert_eq!(inferred.table.column_names(), vec!["first"]);
        assert_eq!(inferred.omitted, vec!["second"]);
    }

    #[test]
    fn test_sample_capped() {
        let rows: Vec<FlatRow> = (0..50).map(|i| row(&[("n", Cell::Int(i))])).collect();
        let inferred = infer_schema_from_sample(&rows, 1.0, 10, 7);
        assert_eq!(inferred.sampled, 10);
    }

    #[test]
    fn test_seeded_sampling_is_deterministic() {
        let rows: Vec<FlatRow> = (0..1000)
            .map(|i| {
                if i % 97 == 0 {
                    row(&[("n", Cell::Int(i)), ("rare", Cell::Bool(true))])
                } else {
                    row(&[("n", Cell::Int(i)), ("rare", Cell::Null)])
                }
            })
            .collect();

        let first = infer_schema_from_sample(&rows, 0.05, 1000, 42);
        let second = infer_schema_from_sample(&rows, 0.05, 1000, 42);
        assert_eq!(first, second);
    }

    #[test]
    fn test_no_rows_uses_structural_columns() {
        let inferred = infer_schema_from_sample(&[], 0.01, 100, 7);
        assert_eq!(inferred.sampled, 0);
        assert_eq!(inferred.table.columns.len(), PULL_REQUEST_STRUCTURAL_COLUMNS.len());
        assert_eq!(inferred.table.column("created_at").unwrap().ty, ColumnType::Timestamp);
        assert_eq!(inferred.table.column("id").unwrap().ty, ColumnType::Utf8);
    }
}
