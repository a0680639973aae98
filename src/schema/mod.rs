//! Output table definitions.
//!
//! Seven tables have a fixed, declared column list. PullRequests is
//! committed per run from a sample of its rows, see [`inference`].

pub mod inference;

use std::sync::Arc;

use arrow::datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit};

use crate::extract::SchemaName;

pub use inference::{InferredSchema, infer_schema_from_sample};

/// Column value types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ColumnType {
    Utf8,
    Int64,
    Float64,
    Boolean,
    /// UTC, microsecond precision
    Timestamp,
    /// Nested JSON stored as a string
    Json,
}

impl ColumnType {
    pub fn to_arrow(self) -> DataType {
        match self {
            ColumnType::Utf8 => DataType::Utf8,
            ColumnType::Int64 => DataType::Int64,
            ColumnType::Float64 => DataType::Float64,
            ColumnType::Boolean => DataType::Boolean,
            ColumnType::Timestamp => DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into())),
            ColumnType::Json => DataType::Utf8,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::Utf8 => "string",
            ColumnType::Int64 => "int64",
            ColumnType::Float64 => "float64",
            ColumnType::Boolean => "boolean",
            ColumnType::Timestamp => "timestamp",
            ColumnType::Json => "json",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: &'static str,
    pub ty: ColumnType,
    pub nullable: bool,
}

impl ColumnDef {
    const fn required(name: &'static str, ty: ColumnType) -> Self {
        Self {
            name,
            ty,
            nullable: false,
        }
    }

    const fn nullable(name: &'static str, ty: ColumnType) -> Self {
        Self {
            name,
            ty,
            nullable: true,
        }
    }
}

/// A table's committed column list, in output order.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSchema {
    pub name: SchemaName,
    pub columns: Vec<ColumnDef>,
}

impl TableSchema {
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<&'static str> {
        self.columns.iter().map(|c| c.name).collect()
    }

    pub fn to_arrow(&self) -> SchemaRef {
        let fields: Vec<Field> = self
            .columns
            .iter()
            .map(|c| Field::new(c.name, c.ty.to_arrow(), c.nullable))
            .collect();
        Arc::new(Schema::new(fields))
    }
}

use self::ColumnType::{Boolean, Int64, Json, Timestamp, Utf8};

const FORK_EVENTS: &[ColumnDef] = &[
    ColumnDef::required("id", Utf8),
    ColumnDef::required("type", Utf8),
    ColumnDef::required("created_at", Timestamp),
    ColumnDef::required("actor_user_id", Int64),
    ColumnDef::required("actor_user_name", Utf8),
    ColumnDef::nullable("from_org_id", Int64),
    ColumnDef::nullable("from_org_login", Utf8),
    ColumnDef::required("from_repo_id", Int64),
    ColumnDef::required("from_repo_name", Utf8),
    ColumnDef::nullable("to_user_id", Int64),
    ColumnDef::nullable("to_user_name", Utf8),
    ColumnDef::nullable("to_repo_created_at", Timestamp),
    ColumnDef::nullable("to_repo_updated_at", Timestamp),
    ColumnDef::nullable("to_repo_pushed_at", Timestamp),
    ColumnDef::nullable("to_repo_size", Int64),
    ColumnDef::nullable("to_repo_stargazer_count", Int64),
    ColumnDef::nullable("to_repo_watcher_count", Int64),
    ColumnDef::nullable("to_repo_forks_count", Int64),
    ColumnDef::nullable("to_license_key", Utf8),
    ColumnDef::nullable("to_license_name", Utf8),
    ColumnDef::nullable("public", Boolean),
];

const PUSH_EVENTS: &[ColumnDef] = &[
    ColumnDef::required("id", Utf8),
    ColumnDef::required("type", Utf8),
    ColumnDef::required("actor_id", Int64),
    ColumnDef::required("actor_user_name", Utf8),
    ColumnDef::required("repo_id", Int64),
    ColumnDef::required("repo_name", Utf8),
    ColumnDef::required("push_id", Int64),
    ColumnDef::nullable("push_size", Int64),
    ColumnDef::nullable("push_ref", Utf8),
    ColumnDef::nullable("push_head", Utf8),
    ColumnDef::nullable("push_before", Utf8),
    ColumnDef::required("created_at", Timestamp),
    ColumnDef::nullable("public", Boolean),
];

const COMMITS: &[ColumnDef] = &[
    ColumnDef::nullable("sha", Utf8),
    ColumnDef::required("type", Utf8),
    ColumnDef::required("push_id", Int64),
    ColumnDef::required("actor_id", Int64),
    ColumnDef::required("repo_id", Int64),
    ColumnDef::required("repo_name", Utf8),
    ColumnDef::required("actor_user_name", Utf8),
    ColumnDef::nullable("author_name", Utf8),
    ColumnDef::nullable("url", Utf8),
    ColumnDef::nullable("message", Utf8),
    ColumnDef::required("push_created_at", Timestamp),
    ColumnDef::nullable("public", Boolean),
];

const CREATES: &[ColumnDef] = &[
    ColumnDef::required("id", Utf8),
    ColumnDef::required("type", Utf8),
    ColumnDef::required("created_at", Timestamp),
    ColumnDef::required("actor_id", Int64),
    ColumnDef::required("actor_user_name", Utf8),
    ColumnDef::required("repo_id", Int64),
    ColumnDef::required("repo_name", Utf8),
    ColumnDef::nullable("public", Boolean),
];

const DELETES: &[ColumnDef] = &[
    ColumnDef::required("id", Utf8),
    ColumnDef::required("type", Utf8),
    ColumnDef::required("created_at", Timestamp),
    ColumnDef::required("actor_id", Int64),
    ColumnDef::required("actor_user_name", Utf8),
    ColumnDef::required("repo_id", Int64),
    ColumnDef::required("repo_name", Utf8),
    ColumnDef::nullable("org_id", Int64),
    ColumnDef::nullable("org_name", Utf8),
    ColumnDef::nullable("public", Boolean),
];

const ISSUES: &[ColumnDef] = &[
    ColumnDef::required("id", Utf8),
    ColumnDef::required("type", Utf8),
    ColumnDef::required("created_at", Timestamp),
    ColumnDef::nullable("updated_at", Timestamp),
    ColumnDef::nullable("closed_at", Timestamp),
    ColumnDef::required("actor_id", Int64),
    ColumnDef::required("actor_user_name", Utf8),
    ColumnDef::required("repo_id", Int64),
    ColumnDef::required("repo_name", Utf8),
    ColumnDef::nullable("user_id", Int64),
    ColumnDef::nullable("user_name", Utf8),
    ColumnDef::nullable("action", Utf8),
    ColumnDef::nullable("assignee", Json),
    ColumnDef::nullable("assignees", Json),
    ColumnDef::nullable("title", Utf8),
    ColumnDef::nullable("body", Utf8),
    ColumnDef::nullable("comments", Int64),
    ColumnDef::nullable("issue_id", Int64),
    ColumnDef::nullable("labels", Json),
    ColumnDef::nullable("locked", Boolean),
    ColumnDef::nullable("number", Int64),
    ColumnDef::nullable("public", Boolean),
];

const MEMBERS: &[ColumnDef] = &[
    ColumnDef::required("id", Utf8),
    ColumnDef::required("type", Utf8),
    ColumnDef::required("created_at", Timestamp),
    ColumnDef::required("actor_id", Int64),
    ColumnDef::required("actor_user_name", Utf8),
    ColumnDef::nullable("action", Utf8),
    ColumnDef::nullable("member_id", Int64),
    ColumnDef::nullable("member_name", Utf8),
    ColumnDef::nullable("site_admin", Boolean),
    ColumnDef::required("repo_id", Int64),
    ColumnDef::required("repo_name", Utf8),
    ColumnDef::nullable("public", Boolean),
];

/// Declared schema of a fixed table. `None` for PullRequests.
pub fn declared(name: SchemaName) -> Option<TableSchema> {
    let columns = match name {
        SchemaName::ForkEvents => FORK_EVENTS,
        SchemaName::PushEvents => PUSH_EVENTS,
        SchemaName::Commits => COMMITS,
        SchemaName::Creates => CREATES,
        SchemaName::Deletes => DELETES,
        SchemaName::Issues => ISSUES,
        SchemaName::Members => MEMBERS,
        SchemaName::PullRequests => return None,
    };
    Some(TableSchema {
        name,
        columns: columns.to_vec(),
    })
}
