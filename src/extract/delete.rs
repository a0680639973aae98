//! DeleteEvent: branch or tag deletion.

use super::rule::{Coercion, Fallback, FieldRule, common};
use super::{RuleExtractor, SchemaName};
use crate::event::EventKind;

pub(super) const RULES: &[FieldRule] = &[
    common::ID,
    common::TYPE,
    common::CREATED_AT,
    common::ACTOR_ID,
    common::ACTOR_LOGIN,
    common::REPO_ID,
    common::REPO_NAME,
    FieldRule::optional("org_id", &["org", "id"], Coercion::Integer),
    FieldRule::optional("org_name", &["org", "login"], Coercion::Text).or(Fallback::Text("")),
    common::PUBLIC,
];

pub(super) fn extractor() -> RuleExtractor {
    RuleExtractor {
        kind: EventKind::Delete,
        schema: SchemaName::Deletes,
        rules: RULES,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{Cell, Extractor};
    use serde_json::json;

    #[test]
    fn test_delete_without_org() {
        let event = json!({
            "id": "7",
            "type": "DeleteEvent",
            "created_at": "2018-04-01T00:00:00Z",
            "actor": {"id": 1, "login": "a"},
            "repo": {"id": 2, "name": "a/b"},
            "payload": {"ref": "feature", "ref_type": "branch"},
            "public": true
        });
        let row = &extractor().extract(&event).unwrap().rows[0];
        assert_eq!(row.get("org_id"), Some(&Cell::Null));
        assert_eq!(row.get("org_name"), Some(&Cell::Text(String::new())));
    }
}
