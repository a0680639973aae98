//! MemberEvent: collaborator added to or removed from a repository.

use super::rule::{Coercion, FieldRule, common};
use super::{RuleExtractor, SchemaName};
use crate::event::EventKind;

pub(super) const RULES: &[FieldRule] = &[
    common::ID,
    common::TYPE,
    common::CREATED_AT,
    common::ACTOR_ID,
    common::ACTOR_LOGIN,
    FieldRule::optional("action", &["payload", "action"], Coercion::Text),
    FieldRule::optional("member_id", &["payload", "member", "id"], Coercion::Integer),
    FieldRule::optional("member_name", &["payload", "member", "login"], Coercion::Text),
    FieldRule::optional("site_admin", &["payload", "member", "site_admin"], Coercion::Boolean),
    common::REPO_ID,
    common::REPO_NAME,
    common::PUBLIC,
];

pub(super) fn extractor() -> RuleExtractor {
    RuleExtractor {
        kind: EventKind::Member,
        schema: SchemaName::Members,
        rules: RULES,
    }
}
