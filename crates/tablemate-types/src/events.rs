use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::MessageResponse;

/// Events sent over the WebSocket gateway.
///
/// Direct events go to every live connection of one user; room events go to
/// every connection currently joined to the match's chat room.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum GatewayEvent {
    /// Server confirms successful authentication
    Ready { user_id: Uuid, username: String },

    /// A message was posted to a chat room (room broadcast)
    NewMessage(MessageResponse),

    /// A participant started typing (room broadcast, excluding sender)
    UserTyping { match_id: Uuid, user_id: Uuid },

    /// A participant stopped typing (room broadcast, excluding sender)
    UserStopTyping { match_id: Uuid, user_id: Uuid },

    /// The receiver accepted a match request (direct to the requester)
    MatchAccepted {
        match_id: Uuid,
        accepted_by: Uuid,
        restaurant_name: String,
    },

    /// New-message alert for a participant not looking at the room (direct)
    NewMessageNotification {
        match_id: Uuid,
        sender_name: String,
        preview: String,
    },
}

/// Commands sent FROM client TO server over WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum GatewayCommand {
    /// Authenticate the WebSocket connection
    Identify { token: String },

    /// Join a match's chat room. Only valid once the match is accepted.
    JoinChat { match_id: Uuid },

    /// Leave a chat room. Also happens implicitly on disconnect.
    LeaveChat { match_id: Uuid },

    /// Indicate typing in a chat room
    Typing { match_id: Uuid },

    /// Stop the typing indicator
    StopTyping { match_id: Uuid },
}
