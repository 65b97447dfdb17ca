use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// --- Enums ---

/// How a lead came into existence. Closed set: dispatch over this enum is
/// exhaustively matched, so an unhandled source is a compile error rather
/// than a silent fall-through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadSource {
    #[default]
    Unknown,
    Invitation,
}

impl LeadSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadSource::Unknown => "unknown",
            LeadSource::Invitation => "invitation",
        }
    }

    /// Parse a stored source string. Unrecognized values degrade to
    /// `Unknown` with a warning so old data never fails a read.
    pub fn parse(s: &str) -> Self {
        match s {
            "unknown" | "" => LeadSource::Unknown,
            "invitation" => LeadSource::Invitation,
            other => {
                tracing::warn!(source = other, "unrecognized lead source, treating as unknown");
                LeadSource::Unknown
            }
        }
    }
}

impl std::fmt::Display for LeadSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event types appended under a lead. Append-only log, never mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    ViewedProfile,
    InvitedFriend,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::ViewedProfile => "viewed-profile",
            EventKind::InvitedFriend => "invited-friend",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// --- Nodes ---

/// One position in a referral tree. Owned by exactly one user, optionally
/// a child of another lead. Created once, never updated or deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    /// Shareable referral code, globally unique across root leads; child
    /// leads inherit the hash of the tree they were redeemed into.
    pub hash: String,
    pub source: LeadSource,
    pub motivation: Option<String>,
    pub status: Option<String>,
    pub score: Option<f64>,
    /// Display tag.
    pub color: String,
}

/// A lead annotated with the maximum traversal depth at which it was
/// reached. When duplicate edges give several paths to the same ancestor,
/// the depth is the longest path, not the first found.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadAtDepth {
    pub lead: Lead,
    pub depth: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: Uuid,
    pub kind: EventKind,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reward {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
}

// --- Inputs ---

/// Parameters for creating a lead. `parent` and `user` must already exist;
/// everything else is generated when absent.
#[derive(Debug, Clone, Default)]
pub struct NewLead {
    pub id: Option<Uuid>,
    pub hash: Option<String>,
    pub source: LeadSource,
    pub motivation: Option<String>,
    pub status: Option<String>,
    pub score: Option<f64>,
    pub color: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lead_source_round_trips() {
        assert_eq!(LeadSource::parse("invitation"), LeadSource::Invitation);
        assert_eq!(LeadSource::parse("unknown"), LeadSource::Unknown);
        assert_eq!(LeadSource::parse(LeadSource::Invitation.as_str()), LeadSource::Invitation);
    }

    #[test]
    fn unrecognized_source_degrades_to_unknown() {
        assert_eq!(LeadSource::parse("carrier-pigeon"), LeadSource::Unknown);
        assert_eq!(LeadSource::parse(""), LeadSource::Unknown);
    }

    #[test]
    fn event_kind_strings_match_stored_values() {
        assert_eq!(EventKind::ViewedProfile.as_str(), "viewed-profile");
        assert_eq!(EventKind::InvitedFriend.as_str(), "invited-friend");
    }
}
