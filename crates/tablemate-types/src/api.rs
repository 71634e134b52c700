use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::MatchStatus;

// -- JWT Claims --

/// JWT claims shared across tablemate-api (REST middleware) and
/// tablemate-gateway (WebSocket identify). Canonical definition lives here
/// to eliminate duplication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    /// Optional profile seed. Everything else about profiles is managed by
    /// the profile subsystem, not this service.
    #[serde(default)]
    pub conversation_preference: Option<String>,
    #[serde(default)]
    pub dietary_tags: Option<Vec<String>>,
    #[serde(default)]
    pub occupation: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user_id: Uuid,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub username: String,
    pub token: String,
}

// -- Check-ins --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CheckInRequest {
    pub restaurant_id: Uuid,
    pub party_size: u32,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckInResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub restaurant_id: Uuid,
    pub party_size: u32,
    pub notes: Option<String>,
    pub active: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Public view of another diner, enough for a client to render a card.
#[derive(Debug, Clone, Serialize)]
pub struct DinerProfile {
    pub user_id: Uuid,
    pub username: String,
    pub conversation_preference: String,
    pub dietary_tags: Vec<String>,
    pub occupation: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ActiveDinerResponse {
    pub check_in: CheckInResponse,
    pub user: DinerProfile,
    pub compatibility_score: u8,
}

#[derive(Debug, Serialize)]
pub struct ActiveCheckInResponse {
    pub checked_in: bool,
    pub check_in: Option<CheckInResponse>,
}

// -- Matches --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MatchRequestBody {
    pub receiver_id: Uuid,
    pub restaurant_id: Uuid,
}

#[derive(Debug, Clone, Serialize)]
pub struct MatchResponse {
    pub id: Uuid,
    pub requester_id: Uuid,
    pub receiver_id: Uuid,
    pub restaurant_id: Uuid,
    pub status: MatchStatus,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// One row of `GET /matches/my`: the match joined with the other
/// participant and ranked by pairwise compatibility.
#[derive(Debug, Serialize)]
pub struct MatchOverview {
    pub id: Uuid,
    pub status: MatchStatus,
    pub restaurant_id: Uuid,
    pub restaurant_name: String,
    pub other_user: DinerProfile,
    pub compatibility_score: u8,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize)]
pub struct SmartMatchCandidate {
    pub user: DinerProfile,
    pub compatibility_score: u8,
    pub reasons: Vec<String>,
}

// -- Messages --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub match_id: Uuid,
    pub message_text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub match_id: Uuid,
    pub sender_id: Uuid,
    pub text: String,
    pub is_read: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

// -- Devices --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeviceRegisterRequest {
    pub token: String,
    pub platform: String,
}
