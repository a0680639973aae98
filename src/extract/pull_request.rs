//! PullRequestEvent: the widest kind, with base and head repository detail.
//!
//! Rules run in order and later rules overwrite earlier ones when they
//! resolve, so `id`, `created_at` and `number` end up taken from the embedded
//! pull request whenever it carries them. The head repository is often null
//! (source branch deleted); each `head_repo_*` column resolves on its own.

use super::rule::Coercion::{Boolean, Integer, Nested, Text, Timestamp};
use super::rule::{Fallback, FieldRule, common};
use super::{RuleExtractor, SchemaName};
use crate::event::EventKind;

macro_rules! pr {
    ($($segment:literal),+) => {
        &["payload", "pull_request", $($segment),+]
    };
}

pub(super) const RULES: &[FieldRule] = &[
    common::ID,
    common::TYPE,
    common::CREATED_AT,
    common::PUBLIC,
    common::ACTOR_ID,
    common::ACTOR_LOGIN,
    FieldRule::optional("org_id", &["org", "id"], Integer),
    FieldRule::optional("org_name", &["org", "login"], Text),
    FieldRule::optional("action", &["payload", "action"], Text),
    FieldRule::optional("number", &["payload", "number"], Integer),
    FieldRule::optional("additions", pr!("additions"), Integer),
    FieldRule::optional("assignee", pr!("assignee"), Nested),
    FieldRule::optional("assignees", pr!("assignees"), Nested),
    FieldRule::optional("author_association", pr!("author_association"), Text),
    FieldRule::optional("base_label", pr!("base", "label"), Text),
    FieldRule::optional("base_ref", pr!("base", "ref"), Text),
    FieldRule::optional("base_repo_created_at", pr!("base", "repo", "created_at"), Timestamp),
    FieldRule::optional("base_repo_default_branch", pr!("base", "repo", "default_branch"), Text),
    FieldRule::optional("base_repo_description", pr!("base", "repo", "description"), Text),
    FieldRule::optional("base_repo_fork", pr!("base", "repo", "fork"), Boolean),
    FieldRule::optional("base_repo_forks", pr!("base", "repo", "forks"), Integer),
    FieldRule::optional("base_repo_full_name", pr!("base", "repo", "full_name"), Text),
    FieldRule::optional("base_repo_id", pr!("base", "repo", "id"), Integer),
    FieldRule::optional("base_repo_language", pr!("base", "repo", "language"), Text),
    FieldRule::optional("base_repo_license_key", pr!("base", "repo", "license", "key"), Text),
    FieldRule::optional("base_repo_license_name", pr!("base", "repo", "license", "name"), Text),
    FieldRule::optional("base_repo_name", pr!("base", "repo", "name"), Text),
    FieldRule::optional("base_repo_open_issues", pr!("base", "repo", "open_issues"), Integer),
    FieldRule::optional("base_repo_owner_id", pr!("base", "repo", "owner", "id"), Integer),
    FieldRule::optional("base_repo_owner_user_name", pr!("base", "repo", "owner", "login"), Text),
    FieldRule::optional("base_repo_owner_site_admin", pr!("base", "repo", "owner", "site_admin"), Boolean),
    FieldRule::optional("base_repo_private", pr!("base", "repo", "private"), Boolean),
    FieldRule::optional("base_repo_pushed_at", pr!("base", "repo", "pushed_at"), Timestamp),
    FieldRule::optional("base_repo_size", pr!("base", "repo", "size"), Integer),
    FieldRule::optional("base_repo_stargazers_count", pr!("base", "repo", "stargazers_count"), Integer),
    FieldRule::optional("base_repo_updated_at", pr!("base", "repo", "updated_at"), Timestamp),
    FieldRule::optional("base_repo_watchers", pr!("base", "repo", "watchers"), Integer),
    FieldRule::optional("base_sha", pr!("base", "sha"), Text),
    FieldRule::optional("base_user_id", pr!("base", "user", "id"), Integer),
    FieldRule::optional("base_user_user_name", pr!("base", "user", "login"), Text),
    FieldRule::optional("base_user_site_admin", pr!("base", "user", "site_admin"), Boolean),
    FieldRule::optional("body", pr!("body"), Text),
    FieldRule::optional("changed_files", pr!("changed_files"), Integer),
    FieldRule::optional("closed_at", pr!("closed_at"), Timestamp),
    FieldRule::optional("comments", pr!("comments"), Integer),
    FieldRule::optional("commits", pr!("commits"), Integer),
    FieldRule::optional("created_at", pr!("created_at"), Timestamp),
    FieldRule::optional("deletions", pr!("deletions"), Integer),
    FieldRule::optional("head_label", pr!("head", "label"), Text),
    FieldRule::optional("head_ref", pr!("head", "ref"), Text),
    FieldRule::optional("head_repo_created_at", pr!("head", "repo", "created_at"), Timestamp),
    FieldRule::optional("head_repo_default_branch", pr!("head", "repo", "default_branch"), Text),
    FieldRule::optional("head_repo_description", pr!("head", "repo", "description"), Text),
    FieldRule::optional("head_repo_fork", pr!("head", "repo", "fork"), Boolean),
    FieldRule::optional("head_repo_forks", pr!("head", "repo", "forks"), Integer),
    FieldRule::optional("head_repo_full_name", pr!("head", "repo", "full_name"), Text),
    FieldRule::optional("head_repo_id", pr!("head", "repo", "id"), Integer),
    FieldRule::optional("head_repo_language", pr!("head", "repo", "language"), Text),
    FieldRule::optional("head_repo_languages", pr!("head", "repo", "languages"), Nested)
        .or(Fallback::Text("")),
    FieldRule::optional("head_repo_license_key", pr!("head", "repo", "license", "key"), Text),
    FieldRule::optional("head_repo_license_name", pr!("head", "repo", "license", "name"), Text),
    FieldRule::optional("head_repo_name", pr!("head", "repo", "name"), Text),
    FieldRule::optional("head_repo_open_issues", pr!("head", "repo", "open_issues"), Integer),
    FieldRule::optional("head_repo_owner_id", pr!("head", "repo", "owner", "id"), Integer),
    FieldRule::optional("head_repo_owner_user_name", pr!("head", "repo", "owner", "login"), Text),
    FieldRule::optional("head_repo_owner_site_admin", pr!("head", "repo", "owner", "site_admin"), Boolean),
    FieldRule::optional("head_repo_private", pr!("head", "repo", "private"), Boolean),
    FieldRule::optional("head_repo_pushed_at", pr!("head", "repo", "pushed_at"), Timestamp),
    FieldRule::optional("head_repo_size", pr!("head", "repo", "size"), Integer),
    FieldRule::optional("head_repo_stargazers_count", pr!("head", "repo", "stargazers_count"), Integer),
    FieldRule::optional("head_repo_updated_at", pr!("head", "repo", "updated_at"), Timestamp),
    FieldRule::optional("head_repo_watchers", pr!("head", "repo", "watchers"), Integer),
    FieldRule::optional("head_sha", pr!("head", "sha"), Text),
    FieldRule::optional("head_user_id", pr!("head", "user", "id"), Integer),
    FieldRule::optional("head_user_name", pr!("head", "user", "login"), Text),
    FieldRule::optional("head_user_site_admin", pr!("head", "user", "site_admin"), Boolean),
    FieldRule::optional("id", pr!("id"), Text),
    FieldRule::optional("locked", pr!("locked"), Boolean),
    FieldRule::optional("merge_commit_sha", pr!("merge_commit_sha"), Text),
    FieldRule::optional("mergeable", pr!("mergeable"), Boolean),
    FieldRule::optional("merged", pr!("merged"), Boolean),
    FieldRule::optional("merged_at", pr!("merged_at"), Timestamp),
    FieldRule::optional("merged_by", pr!("merged_by"), Nested),
    FieldRule::optional("milestone", pr!("milestone"), Nested),
    FieldRule::optional("number", pr!("number"), Integer),
    FieldRule::optional("rebaseable", pr!("rebaseable"), Boolean),
    FieldRule::optional("requested_reviewers", pr!("requested_reviewers"), Nested),
    FieldRule::optional("requested_teams", pr!("requested_teams"), Nested),
    FieldRule::optional("review_comments", pr!("review_comments"), Integer),
    FieldRule::optional("state", pr!("state"), Text),
    FieldRule::optional("title", pr!("title"), Text),
    FieldRule::optional("updated_at", pr!("updated_at"), Timestamp),
    FieldRule::optional("user_id", pr!("user", "id"), Integer),
    FieldRule::optional("user_name", pr!("user", "login"), Text),
    FieldRule::optional("user_site_admin", pr!("user", "site_admin"), Boolean),
    common::REPO_ID,
    common::REPO_NAME,
];

/// Columns every PullRequest row carries a value for.
pub const STRUCTURAL_COLUMNS: &[&str] = &[
    "actor_id",
    "actor_user_name",
    "created_at",
    "id",
    "repo_id",
    "repo_name",
    "type",
];

pub(super) fn extractor() -> RuleExtractor {
    RuleExtractor {
        kind: EventKind::PullRequest,
        schema: SchemaName::PullRequests,
        rules: RULES,
    }
}
