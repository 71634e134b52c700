//! Database row types; these map directly to SQLite rows.
//! Distinct from the tablemate-types API models to keep the store layer
//! independent; ids and timestamps stay TEXT here and are parsed at the
//! DTO edge.

use tablemate_types::models::ProfileSlice;

use crate::util::parse_uuid;

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub password: String,
    pub conversation_preference: String,
    pub dietary_tags: String,
    pub occupation: Option<String>,
    pub photo_verified: bool,
    pub social_verified: bool,
    pub created_at: String,
}

/// The slice of a user row that presence queries and the scorer consume.
pub struct ProfileRow {
    pub user_id: String,
    pub username: String,
    pub conversation_preference: String,
    pub dietary_tags: String,
    pub occupation: Option<String>,
    pub photo_verified: bool,
    pub social_verified: bool,
}

impl ProfileRow {
    /// dietary_tags is stored as a JSON array; a corrupt value reads as
    /// no tags rather than failing the whole query.
    pub fn tags(&self) -> Vec<String> {
        serde_json::from_str(&self.dietary_tags).unwrap_or_default()
    }

    pub fn slice(&self) -> ProfileSlice {
        ProfileSlice {
            user_id: parse_uuid(&self.user_id),
            conversation_preference: self.conversation_preference.clone(),
            dietary_tags: self.tags(),
        }
    }
}

pub struct RestaurantRow {
    pub id: String,
    pub name: String,
    pub created_at: String,
}

pub struct CheckInRow {
    pub id: String,
    pub user_id: String,
    pub restaurant_id: String,
    pub party_size: u32,
    pub notes: Option<String>,
    pub active: bool,
    pub created_at: String,
}

pub struct MatchRow {
    pub id: String,
    pub requester_id: String,
    pub receiver_id: String,
    pub restaurant_id: String,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

impl MatchRow {
    pub fn other_participant(&self, user_id: &str) -> &str {
        if self.requester_id == user_id {
            &self.receiver_id
        } else {
            &self.requester_id
        }
    }

    pub fn is_participant(&self, user_id: &str) -> bool {
        self.requester_id == user_id || self.receiver_id == user_id
    }
}

pub struct ConversationRow {
    pub id: String,
    pub match_id: String,
}

pub struct MessageRow {
    pub id: String,
    pub conversation_id: String,
    pub match_id: String,
    pub sender_id: String,
    pub text: String,
    pub is_read: bool,
    pub created_at: String,
}

pub struct DeviceTokenRow {
    pub token: String,
    pub user_id: String,
    pub platform: String,
}
