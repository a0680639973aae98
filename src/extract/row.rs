//! Flat rows produced by the extractors.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::schema::ColumnType;

/// Output tables, one Parquet partition each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SchemaName {
    ForkEvents,
    PushEvents,
    Commits,
    Creates,
    Deletes,
    Issues,
    Members,
    PullRequests,
}

impl SchemaName {
    pub const ALL: [SchemaName; 8] = [
        SchemaName::ForkEvents,
        SchemaName::PushEvents,
        SchemaName::Commits,
        SchemaName::Creates,
        SchemaName::Deletes,
        SchemaName::Issues,
        SchemaName::Members,
        SchemaName::PullRequests,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaName::ForkEvents => "ForkEvents",
            SchemaName::PushEvents => "PushEvents",
            SchemaName::Commits => "Commits",
            SchemaName::Creates => "Creates",
            SchemaName::Deletes => "Deletes",
            SchemaName::Issues => "Issues",
            SchemaName::Members => "Members",
            SchemaName::PullRequests => "PullRequests",
        }
    }
}

impl std::fmt::Display for SchemaName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single typed value in a flat row.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
    /// Nested value passed through as-is, stored as serialized JSON text.
    Json(Value),
}

impl Cell {
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    /// Column type this cell would naturally occupy. `None` for nulls.
    pub fn column_type(&self) -> Option<ColumnType> {
        match self {
            Cell::Null => None,
            Cell::Bool(_) => Some(ColumnType::Boolean),
            Cell::Int(_) => Some(ColumnType::Int64),
            Cell::Float(_) => Some(ColumnType::Float64),
            Cell::Text(_) => Some(ColumnType::Utf8),
            Cell::Timestamp(_) => Some(ColumnType::Timestamp),
            Cell::Json(_) => Some(ColumnType::Json),
        }
    }

    /// Convert the cell to fit a column type.
    ///
    /// Lossless widenings are applied (int to float, anything scalar to
    /// text); anything else returns `None` and the caller nulls the cell.
    pub fn fit(&self, ty: ColumnType) -> Option<Cell> {
        match (self, ty) {
            (Cell::Null, _) => Some(Cell::Null),
            (Cell::Bool(_), ColumnType::Boolean)
            | (Cell::Int(_), ColumnType::Int64)
            | (Cell::Float(_), ColumnType::Float64)
            | (Cell::Text(_), ColumnType::Utf8)
            | (Cell::Timestamp(_), ColumnType::Timestamp)
            | (Cell::Json(_), ColumnType::Json) => Some(self.clone()),
            (Cell::Int(i), ColumnType::Float64) => Some(Cell::Float(*i as f64)),
            (_, ColumnType::Utf8) => self.render().map(Cell::Text),
            (Cell::Text(s), ColumnType::Json) => Some(Cell::Json(Value::String(s.clone()))),
            _ => None,
        }
    }

    /// Text rendering of a non-null cell.
    pub fn render(&self) -> Option<String> {
        match self {
            Cell::Null => None,
            Cell::Bool(b) => Some(b.to_string()),
            Cell::Int(i) => Some(i.to_string()),
            Cell::Float(f) => Some(f.to_string()),
            Cell::Text(s) => Some(s.clone()),
            Cell::Timestamp(ts) => Some(ts.to_rfc3339_opts(chrono::SecondsFormat::AutoSi, true)),
            Cell::Json(v) => Some(v.to_string()),
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Cell::Int(value)
    }
}

impl From<bool> for Cell {
    fn from(value: bool) -> Self {
        Cell::Bool(value)
    }
}

/// A schema-tagged row with columns in insertion order.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatRow {
    pub schema: SchemaName,
    pub cells: IndexMap<&'static str, Cell>,
}

impl FlatRow {
    pub fn new(schema: SchemaName) -> Self {
        Self {
            schema,
            cells: IndexMap::new(),
        }
    }

    pub fn with_capacity(schema: SchemaName, capacity: usize) -> Self {
        Self {
            schema,
            cells: IndexMap::with_capacity(capacity),
        }
    }

    /// Set a column, keeping its original position if it already exists.
    pub fn set(&mut self, column: &'static str, cell: Cell) {
        self.cells.insert(column, cell);
    }

    pub fn get(&self, column: &str) -> Option<&Cell> {
        self.cells.get(column)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.cells.contains_key(column)
    }

    /// Value of a column, null when the row does not carry it.
    pub fn cell_or_null(&self, column: &str) -> &Cell {
        self.cells.get(column).unwrap_or(&Cell::Null)
    }

    pub fn columns(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.cells.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_schema_name_order_is_stable() {
        let mut names = SchemaName::ALL.to_vec();
        names.reverse();
        names.sort();
        assert_eq!(names, SchemaName::ALL.to_vec());
        assert_eq!(SchemaName::Commits.to_string(), "Commits");
    }

    #[test]
    fn test_fit_widening() {
        assert_eq!(Cell::Int(3).fit(ColumnType::Float64), Some(Cell::Float(3.0)));
        assert_eq!(Cell::Int(3).fit(ColumnType::Utf8), Some(Cell::Text("3".into())));
        assert_eq!(Cell::Bool(true).fit(ColumnType::Utf8), Some(Cell::Text("true".into())));
        assert_eq!(
            Cell::Json(json!({"a": 1})).fit(ColumnType::Utf8),
            Some(Cell::Text(r#"{"a":1}"#.into()))
        );
        assert_eq!(Cell::Null.fit(ColumnType::Int64), Some(Cell::Null));
    }

    #[test]
    fn test_fit_rejects_narrowing() {
        assert_eq!(Cell::Float(1.5).fit(ColumnType::Int64), None);
        assert_eq!(Cell::Text("x".into()).fit(ColumnType::Boolean), None);
        assert_eq!(Cell::Bool(false).fit(ColumnType::Timestamp), None);
    }

    #[test]
    fn test_set_keeps_position() {
        let mut row = FlatRow::new(SchemaName::PullRequests);
        row.set("id", Cell::from("1"));
        row.set("type", Cell::from("PullRequestEvent"));
        row.set("id", Cell::from("2"));

        assert_eq!(row.columns().collect::<Vec<_>>(), vec!["id", "type"]);
        assert_eq!(row.get("id"), Some(&Cell::Text("2".into())));
        assert_eq!(row.cell_or_null("missing"), &Cell::Null);
    }
}
