//! CreateEvent: branch, tag or repository creation.

use super::rule::{FieldRule, common};
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
    common::PUBLIC,
];

pub(super) fn extractor() -> RuleExtractor {
    RuleExtractor {
        kind: EventKind::Create,
        schema: SchemaName::Creates,
        rules: RULES,
    }
}
