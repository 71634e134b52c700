use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of a match request.
///
/// `Completed` is accepted as a stored value but no operation transitions
/// into it; `Accepted` is the practical terminal success state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    Pending,
    Accepted,
    Rejected,
    Completed,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "accepted" => Some(Self::Accepted),
            "rejected" => Some(Self::Rejected),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }

    /// Messaging is only open once the match has been accepted.
    pub fn allows_messaging(&self) -> bool {
        matches!(self, Self::Accepted | Self::Completed)
    }
}

/// The profile columns the scorer reads. Owned by the profile subsystem;
/// this is a read-only view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileSlice {
    pub user_id: Uuid,
    pub conversation_preference: String,
    pub dietary_tags: Vec<String>,
}

/// A restaurant a candidate has previously checked in at.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestaurantRef {
    pub id: Uuid,
    pub name: String,
}

/// Everything the discovery scorer looks at for one side of a pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateProfile {
    pub profile: ProfileSlice,
    pub username: String,
    pub occupation: Option<String>,
    pub photo_verified: bool,
    pub social_verified: bool,
    pub recent_restaurants: Vec<RestaurantRef>,
}
