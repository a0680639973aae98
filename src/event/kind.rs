//! Event classification by the `type` discriminant.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The fixed set of event kinds this crate recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventKind {
    Create,
    Delete,
    Fork,
    Gist,
    Issue,
    IssueComment,
    Member,
    Push,
    PullRequest,
    Repository,
    Star,
}

impl EventKind {
    /// Every recognized kind.
    pub const ALL: [EventKind; 11] = [
        EventKind::Create,
        EventKind::Delete,
        EventKind::Fork,
        EventKind::Gist,
        EventKind::Issue,
        EventKind::IssueComment,
        EventKind::Member,
        EventKind::Push,
        EventKind::PullRequest,
        EventKind::Repository,
        EventKind::Star,
    ];

    /// Map a `type` discriminant to a kind.
    ///
    /// Stars show up in the archive as `WatchEvent`; `StarEvent` is accepted too.
    pub fn from_discriminant(discriminant: &str) -> Option<Self> {
        let kind = match discriminant {
            "CreateEvent" => EventKind::Create,
            "DeleteEvent" => EventKind::Delete,
            "ForkEvent" => EventKind::Fork,
            "GistEvent" => EventKind::Gist,
            "IssuesEvent" => EventKind::Issue,
            "IssueCommentEvent" => EventKind::IssueComment,
            "MemberEvent" => EventKind::Member,
            "PushEvent" => EventKind::Push,
            "PullRequestEvent" => EventKind::PullRequest,
            "RepositoryEvent" => EventKind::Repository,
            "StarEvent" | "WatchEvent" => EventKind::Star,
            _ => return None,
        };
        Some(kind)
    }

    /// Canonical discriminant, also written to the `type` column.
    pub fn discriminant(&self) -> &'static str {
        match self {
            EventKind::Create => "CreateEvent",
            EventKind::Delete => "DeleteEvent",
            EventKind::Fork => "ForkEvent",
            EventKind::Gist => "GistEvent",
            EventKind::Issue => "IssuesEvent",
            EventKind::IssueComment => "IssueCommentEvent",
            EventKind::Member => "MemberEvent",
            EventKind::Push => "PushEvent",
            EventKind::PullRequest => "PullRequestEvent",
            EventKind::Repository => "RepositoryEvent",
            EventKind::Star => "WatchEvent",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Create => "create",
            EventKind::Delete => "delete",
            EventKind::Fork => "fork",
            EventKind::Gist => "gist",
            EventKind::Issue => "issue",
            EventKind::IssueComment => "issue_comment",
            EventKind::Member => "member",
            EventKind::Push => "push",
            EventKind::PullRequest => "pull_request",
            EventKind::Repository => "repository",
            EventKind::Star => "star",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a decoded record was not handed to an extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum DropReason {
    /// No `type` field, or it is not a string.
    MissingType,
    /// `type` is not one of the recognized discriminants.
    Unrecognized,
    /// Recognized kind without a bound extractor.
    Unimplemented { kind: EventKind },
}

impl DropReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DropReason::MissingType => "missing_type",
            DropReason::Unrecognized => "unrecognized",
            DropReason::Unimplemented { .. } => "unimplemented",
        }
    }
}

impl std::fmt::Display for DropReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DropReason::Unimplemented { kind } => write!(f, "unimplemented ({kind})"),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Outcome of reading the discriminant.
#[derive(Debug)]
pub enum Classified {
    Event(EventKind, Value),
    Dropped(DropReason),
}

/// Read `type` and decide which kind the record is.
///
/// Binding kinds to extractors is the registry's job; this only answers
/// "what is it", so unbound kinds still come back as `Event`.
pub fn classify(value: Value) -> Classified {
    let kind = match value.get("type").and_then(Value::as_str) {
        None => return Classified::Dropped(DropReason::MissingType),
        Some(discriminant) => EventKind::from_discriminant(discriminant),
    };

    match kind {
        Some(kind) => Classified::Event(kind, value),
        None => Classified::Dropped(DropReason::Unrecognized),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_discriminant_roundtrip() {
        for kind in EventKind::ALL {
            assert_eq!(EventKind::from_discriminant(kind.discriminant()), Some(kind));
        }
    }

    #[test]
    fn test_star_aliases() {
        assert_eq!(EventKind::from_discriminant("WatchEvent"), Some(EventKind::Star));
        assert_eq!(EventKind::from_discriminant("StarEvent"), Some(EventKind::Star));
    }

    #[test]
    fn test_classify_known() {
        let value = json!({"type": "ForkEvent", "id": "1"});
        match classify(value) {
            Classified::Event(kind, value) => {
                assert_eq!(kind, EventKind::Fork);
                assert_eq!(value["id"], "1");
            }
            other => panic!("Expected Event, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_missing_or_bad_type() {
        assert!(matches!(
            classify(json!({"id": "1"})),
            Classified::Dropped(DropReason::MissingType)
        ));
        assert!(matches!(
            classify(json!({"type": 7})),
            Classified::Dropped(DropReason::MissingType)
        ));
        assert!(matches!(
            classify(json!({"type": "SponsorshipEvent"})),
            Classified::Dropped(DropReason::Unrecognized)
        ));
    }

    #[test]
    fn test_drop_reason_serialization() {
        let reason = DropReason::Unimplemented {
            kind: EventKind::Repository,
        };
        let json = serde_json::to_string(&reason).unwrap();
        assert!(json.contains("unimplemented"));
        assert!(json.contains("Repository"));
    }
}
