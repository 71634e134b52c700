use tracing::warn;
use uuid::Uuid;

use tablemate_types::events::GatewayEvent;

use crate::auth::AppState;

/// Payload for the push fallback.
pub struct PushNote {
    pub title: String,
    pub body: String,
    pub data: serde_json::Value,
}

/// Direct-emit an event to every live connection of `user_id`, and when the
/// user may be offline (no live connections here) fall back to push. The
/// push leg runs detached so the caller never waits on delivery.
pub fn notify_user(state: &AppState, user_id: Uuid, event: GatewayEvent, note: PushNote) {
    state.dispatcher.send_to_user(user_id, event);

    if state.dispatcher.is_online(user_id) || !state.push.is_enabled() {
        return;
    }

    let state = state.clone();
    tokio::spawn(async move {
        push_fallback(state, user_id, note).await;
    });
}

async fn push_fallback(state: AppState, user_id: Uuid, note: PushNote) {
    let tokens = {
        let db = state.db.clone();
        let uid = user_id.to_string();
        match tokio::task::spawn_blocking(move || db.tokens_for_user(&uid)).await {
            Ok(Ok(rows)) => rows.into_iter().map(|r| r.token).collect::<Vec<_>>(),
            Ok(Err(e)) => {
                warn!("Push fallback: token lookup failed for {}: {:#}", user_id, e);
                return;
            }
            Err(e) => {
                warn!("Push fallback: join error: {}", e);
                return;
            }
        }
    };

    if tokens.is_empty() {
        return;
    }

    let invalid = state
        .push
        .send(&tokens, &note.title, &note.body, note.data)
        .await;

    if !invalid.is_empty() {
        let db = state.db.clone();
        let count = invalid.len();
        let result = tokio::task::spawn_blocking(move || db.prune_tokens(&invalid)).await;
        match result {
            Ok(Ok(_)) => warn!("Pruned {} invalid device tokens for {}", count, user_id),
            Ok(Err(e)) => warn!("Token prune failed for {}: {:#}", user_id, e),
            Err(e) => warn!("Token prune join error: {}", e),
        }
    }
}
