//! IssuesEvent: issue opened, closed, edited and so on.

use super::rule::{Coercion, FieldRule, common};
use super::{RuleExtractor, SchemaName};
use crate::event::EventKind;

const ISSUE: &str = "issue";

pub(super) const RULES: &[FieldRule] = &[
    common::ID,
    common::TYPE,
    common::CREATED_AT,
    FieldRule::optional("updated_at", &["payload", ISSUE, "updated_at"], Coercion::Timestamp),
    FieldRule::optional("closed_at", &["payload", ISSUE, "closed_at"], Coercion::Timestamp),
    common::ACTOR_ID,
    common::ACTOR_LOGIN,
    common::REPO_ID,
    common::REPO_NAME,
    FieldRule::optional("user_id", &["payload", ISSUE, "user", "id"], Coercion::Integer),
    FieldRule::optional("user_name", &["payload", ISSUE, "user", "login"], Coercion::Text),
    FieldRule::optional("action", &["payload", "action"], Coercion::Text),
    FieldRule::optional("assignee", &["payload", ISSUE, "assignee"], Coercion::Nested),
    FieldRule::optional("assignees", &["payload", ISSUE, "assignees"], Coercion::Nested),
    FieldRule::optional("title", &["payload", ISSUE, "title"], Coercion::Text),
    FieldRule::optional("body", &["payload", ISSUE, "body"], Coercion::Text),
    FieldRule::optional("comments", &["payload", ISSUE, "comments"], Coercion::Integer),
    FieldRule::optional("issue_id", &["payload", ISSUE, "id"], Coercion::Integer),
    FieldRule::optional("labels", &["payload", ISSUE, "labels"], Coercion::Nested),
    FieldRule::optional("locked", &["payload", ISSUE, "locked"], Coercion::Boolean),
    FieldRule::optional("number", &["payload", ISSUE, "number"], Coercion::Integer),
    common::PUBLIC,
];

pub(super) fn extractor() -> RuleExtractor {
    RuleExtractor {
        kind: EventKind::Issue,
        schema: SchemaName::Issues,
        rules: RULES,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{Cell, Extractor};
    use serde_json::json;

    #[test]
    fn test_open_issue_has_null_closed_at() {
        let event = json!({
            "id": "5",
            "type": "IssuesEvent",
            "created_at": "2018-04-01T00:00:00Z",
            "actor": {"id": 1, "login": "a"},
            "repo": {"id": 2, "name": "a/b"},
            "payload": {
                "action": "opened",
                "issue": {
                    "id": 77,
                    "number": 3,
                    "title": "Crash on start",
                    "user": {"id": 1, "login": "a"},
                    "labels": [{"name": "bug"}],
                    "assignee": null,
                    "assignees": [],
                    "locked": false,
                    "comments": 0,
                    "closed_at": null,
                    "updated_at": "2018-04-01T00:00:00Z",
                    "body": "boom"
                }
            },
            "public": true
        });

        let extracted = extractor().extract(&event).unwrap();
        let row = &extracted.rows[0];
        assert_eq!(row.get("closed_at"), Some(&Cell::Null));
        assert_eq!(row.get("assignee"), Some(&Cell::Null));
        assert_eq!(row.get("labels"), Some(&Cell::Json(json!([{"name": "bug"}]))));
        assert_eq!(row.get("issue_id"), Some(&Cell::Int(77)));
        assert!(extracted.warnings.is_empty());
    }

    #[test]
    fn test_unparsable_closed_at_warns() {
        let event = json!({
            "id": "5",
            "type": "IssuesEvent",
            "created_at": "2018-04-01T00:00:00Z",
            "actor": {"id": 1, "login": "a"},
            "repo": {"id": 2, "name": "a/b"},
            "payload": {"issue": {"closed_at": "not a date"}}
        });

        let extracted = extractor().extract(&event).unwrap();
        assert_eq!(extracted.rows[0].get("closed_at"), Some(&Cell::Null));
        assert_eq!(extracted.warnings.len(), 1);
        assert_eq!(extracted.warnings[0].path, "payload.issue.closed_at");
    }
}
