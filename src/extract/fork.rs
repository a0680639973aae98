//! ForkEvent: a repository forked into a new one.

use super::rule::{Coercion, Fallback, FieldRule, common};
use super::{RuleExtractor, SchemaName};
use crate::event::EventKind;

const FORKEE: &str = "forkee";

pub(super) const RULES: &[FieldRule] = &[
    common::ID,
    common::TYPE,
    common::CREATED_AT,
    FieldRule::required("actor_user_id", &["actor", "id"], Coercion::Integer),
    FieldRule::required("actor_user_name", &["actor", "login"], Coercion::Text),
    FieldRule::optional("from_org_id", &["org", "id"], Coercion::Integer),
    FieldRule::optional("from_org_login", &["org", "login"], Coercion::Text).or(Fallback::Text("")),
    FieldRule::required("from_repo_id", &["repo", "id"], Coercion::Integer),
    FieldRule::required("from_repo_name", &["repo", "name"], Coercion::Text),
    FieldRule::optional("to_user_id", &["payload", FORKEE, "owner", "id"], Coercion::Integer),
    FieldRule::optional("to_user_name", &["payload", FORKEE, "owner", "login"], Coercion::Text),
    FieldRule::optional("to_repo_created_at", &["payload", FORKEE, "created_at"], Coercion::Timestamp),
    FieldRule::optional("to_repo_updated_at", &["payload", FORKEE, "updated_at"], Coercion::Timestamp),
    FieldRule::optional("to_repo_pushed_at", &["payload", FORKEE, "pushed_at"], Coercion::Timestamp),
    FieldRule::optional("to_repo_size", &["payload", FORKEE, "size"], Coercion::Integer),
    FieldRule::optional(
        "to_repo_stargazer_count",
        &["payload", FORKEE, "stargazers_count"],
        Coercion::Integer,
    ),
    FieldRule::optional(
        "to_repo_watcher_count",
        &["payload", FORKEE, "watchers_count"],
        Coercion::Integer,
    ),
    FieldRule::optional("to_repo_forks_count", &["payload", FORKEE, "forks_count"], Coercion::Integer),
    FieldRule::optional("to_license_key", &["payload", FORKEE, "license", "key"], Coercion::Text)
        .or(Fallback::Text("")),
    FieldRule::optional("to_license_name", &["payload", FORKEE, "license", "name"], Coercion::Text)
        .or(Fallback::Text("")),
    common::PUBLIC,
];

pub(super) fn extractor() -> RuleExtractor {
    RuleExtractor {
        kind: EventKind::Fork,
        schema: SchemaName::ForkEvents,
        rules: RULES,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{Cell, Extractor, RowFailure};
    use serde_json::{Value, json};

    fn fork_event() -> Value {
        json!({
            "id": "42",
            "type": "ForkEvent",
            "created_at": "2018-04-01T12:30:00Z",
            "actor": {"id": 11, "login": "carol"},
            "repo": {"id": 99, "name": "acme/widget"},
            "org": {"id": 3, "login": "acme"},
            "payload": {
                "forkee": {
                    "owner": {"id": 11, "login": "carol"},
                    "created_at": "2018-04-01T12:30:00Z",
                    "updated_at": "2018-04-01T12:30:00Z",
                    "pushed_at": "2018-03-30T08:00:00Z",
                    "size": 120,
                    "stargazers_count": 0,
                    "watchers_count": 0,
                    "forks_count": 0,
                    "license": {"key": "mit", "name": "MIT License"}
                }
            },
            "public": true
        })
    }

    #[test]
    fn test_full_fork() {
        let row = &extractor().extract(&fork_event()).unwrap().rows[0];
        assert_eq!(row.get("from_org_login"), Some(&Cell::Text("acme".into())));
        assert_eq!(row.get("to_license_key"), Some(&Cell::Text("mit".into())));
        assert_eq!(row.get("to_repo_size"), Some(&Cell::Int(120)));
        assert_eq!(row.get("from_repo_name"), Some(&Cell::Text("acme/widget".into())));
    }

    #[test]
    fn test_license_as_string_defaults() {
        let mut event = fork_event();
        event["payload"]["forkee"]["license"] = json!("MIT");
        event.as_object_mut().unwrap().remove("org");

        let extracted = extractor().extract(&event).unwrap();
        let row = &extracted.rows[0];
        assert_eq!(row.get("to_license_key"), Some(&Cell::Text(String::new())));
        assert_eq!(row.get("to_license_name"), Some(&Cell::Text(String::new())));
        assert_eq!(row.get("from_org_id"), Some(&Cell::Null));
        assert_eq!(row.get("from_org_login"), Some(&Cell::Text(String::new())));
        assert!(extracted.warnings.is_empty());
    }

    #[test]
    fn test_missing_actor_fails() {
        let mut event = fork_event();
        event.as_object_mut().unwrap().remove("actor");

        let err = extractor().extract(&event).unwrap_err();
        assert_eq!(err.schema, SchemaName::ForkEvents);
        assert_eq!(err.path, "actor.id");
        assert_eq!(err.reason, RowFailure::Absent);
    }
}
