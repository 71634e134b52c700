use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use tablemate_db::models::{MatchRow, MessageRow};
use tablemate_db::util::{parse_timestamp, parse_uuid};
use tablemate_types::api::{Claims, MessageResponse, SendMessageRequest};
use tablemate_types::events::GatewayEvent;
use tablemate_types::models::MatchStatus;

use crate::auth::AppState;
use crate::error::ApiError;
use crate::notify::{PushNote, notify_user};

/// Notification previews cap out at this many characters.
const PREVIEW_CHARS: usize = 50;

/// Upper bound on a single message; anything longer is a client bug.
const MAX_MESSAGE_CHARS: usize = 2000;

// -- Handlers --

pub async fn create(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let out = send_message(&state, claims.sub, &claims.username, req).await?;
    Ok((StatusCode::CREATED, Json(out)))
}

pub async fn thread(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(match_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(list_messages(&state, match_id, claims.sub).await?))
}

// -- Service --

/// Moderation-gated send. Valid only while the match is accepted (or
/// completed); the row is persisted before any fan-out and the response
/// never waits on delivery.
pub async fn send_message(
    state: &AppState,
    sender_id: Uuid,
    sender_name: &str,
    req: SendMessageRequest,
) -> Result<MessageResponse, ApiError> {
    let text = req.message_text.trim();
    if text.is_empty() {
        return Err(ApiError::Validation("message text required".into()));
    }
    if text.chars().count() > MAX_MESSAGE_CHARS {
        return Err(ApiError::Validation("message text too long".into()));
    }
    let text = text.to_string();

    let match_id = req.match_id;
    let db = state.db.clone();
    let row = crate::blocking(move || db.get_match(&match_id.to_string()))
        .await?
        .ok_or_else(|| ApiError::NotFound("match not found".into()))?;

    gate_send(&row, sender_id)?;

    // Moderation sits on the primary path: flagged text never persists.
    let allowed = state.moderation.moderate(&text).await?;
    if !allowed {
        return Err(ApiError::ModerationRejected);
    }

    let db = state.db.clone();
    let text_for_insert = text.clone();
    let message = crate::blocking(move || {
        let conversation = db.get_or_create_conversation(&match_id.to_string())?;
        db.insert_message(
            &Uuid::new_v4().to_string(),
            &conversation.id,
            &match_id.to_string(),
            &sender_id.to_string(),
            &text_for_insert,
        )
    })
    .await?;

    let dto = message_response(message);

    // Fire-and-forget fan-out: room first, then a direct nudge (with push
    // fallback) for the other participant.
    state
        .dispatcher
        .broadcast_room(match_id, GatewayEvent::NewMessage(dto.clone()));

    let other = parse_uuid(row.other_participant(&sender_id.to_string()));
    let preview = preview(&text);
    notify_user(
        state,
        other,
        GatewayEvent::NewMessageNotification {
            match_id,
            sender_name: sender_name.to_string(),
            preview: preview.clone(),
        },
        PushNote {
            title: sender_name.to_string(),
            body: preview,
            data: serde_json::json!({ "match_id": match_id }),
        },
    );

    Ok(dto)
}

/// Full thread, oldest first. Fetching is also the read receipt: every
/// unread message from the other party flips to read in bulk.
pub async fn list_messages(
    state: &AppState,
    match_id: Uuid,
    requester_id: Uuid,
) -> Result<Vec<MessageResponse>, ApiError> {
    let db = state.db.clone();
    let row = crate::blocking(move || db.get_match(&match_id.to_string()))
        .await?
        .ok_or_else(|| ApiError::NotFound("match not found".into()))?;

    if !row.is_participant(&requester_id.to_string()) {
        return Err(ApiError::NotFound("match not found".into()));
    }

    let db = state.db.clone();
    let rows = crate::blocking(move || {
        db.mark_messages_read(&match_id.to_string(), &requester_id.to_string())?;
        db.messages_for_match(&match_id.to_string())
    })
    .await?;

    Ok(rows.into_iter().map(message_response).collect())
}

// -- Helpers --

fn gate_send(row: &MatchRow, sender_id: Uuid) -> Result<(), ApiError> {
    if !row.is_participant(&sender_id.to_string()) {
        return Err(ApiError::Validation(
            "sender is not a participant of this match".into(),
        ));
    }
    let open = MatchStatus::parse(&row.status).is_some_and(|s| s.allows_messaging());
    if !open {
        return Err(ApiError::Validation(
            "messaging requires an accepted match".into(),
        ));
    }
    Ok(())
}

/// Truncate to the preview cap on a char boundary, ellipsis-suffixed only
/// when something was cut.
fn preview(text: &str) -> String {
    if text.chars().count() <= PREVIEW_CHARS {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(PREVIEW_CHARS).collect();
    cut.push_str("...");
    cut
}

fn message_response(row: MessageRow) -> MessageResponse {
    MessageResponse {
        id: parse_uuid(&row.id),
        conversation_id: parse_uuid(&row.conversation_id),
        match_id: parse_uuid(&row.match_id),
        sender_id: parse_uuid(&row.sender_id),
        text: row.text,
        is_read: row.is_read,
        created_at: parse_timestamp(&row.created_at),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matches::{accept_match, request_match};
    use crate::moderation::ModerationClient;
    use crate::tests_support::{TestApp, register_user, seed_restaurant};
    use tablemate_types::api::MatchRequestBody;

    async fn accepted_match(app: &TestApp) -> (Uuid, Uuid, Uuid) {
        let ada = register_user(app, "ada", "", &[]);
        let brin = register_user(app, "brin", "", &[]);
        let osteria = seed_restaurant(app, "Osteria");
        let created = request_match(
            &app.state,
            ada,
            MatchRequestBody {
                receiver_id: brin,
                restaurant_id: osteria,
            },
        )
        .await
        .unwrap();
        accept_match(&app.state, created.id, brin, "brin").await.unwrap();
        (created.id, ada, brin)
    }

    fn send(match_id: Uuid, text: &str) -> SendMessageRequest {
        SendMessageRequest {
            match_id,
            message_text: text.into(),
        }
    }

    #[tokio::test]
    async fn pending_match_blocks_messaging() {
        let app = TestApp::new();
        let ada = register_user(&app, "ada", "", &[]);
        let brin = register_user(&app, "brin", "", &[]);
        let osteria = seed_restaurant(&app, "Osteria");
        let created = request_match(
            &app.state,
            ada,
            MatchRequestBody {
                receiver_id: brin,
                restaurant_id: osteria,
            },
        )
        .await
        .unwrap();

        let err = send_message(&app.state, ada, "ada", send(created.id, "hi")).await;
        assert!(matches!(err, Err(ApiError::Validation(_))));
    }

    #[tokio::test]
    async fn moderation_rejection_persists_nothing() {
        let app = TestApp::with_moderation(ModerationClient::with_denylist(vec!["spam".into()]));
        let (match_id, ada, _) = accepted_match(&app).await;

        let err = send_message(&app.state, ada, "ada", send(match_id, "buy my spam")).await;
        assert!(matches!(err, Err(ApiError::ModerationRejected)));

        let thread = list_messages(&app.state, match_id, ada).await.unwrap();
        assert!(thread.is_empty());
    }

    #[tokio::test]
    async fn outsiders_cannot_send_or_read() {
        let app = TestApp::new();
        let (match_id, _, _) = accepted_match(&app).await;
        let stranger = register_user(&app, "cleo", "", &[]);

        let sent = send_message(&app.state, stranger, "cleo", send(match_id, "hi")).await;
        assert!(matches!(sent, Err(ApiError::Validation(_))));

        let read = list_messages(&app.state, match_id, stranger).await;
        assert!(matches!(read, Err(ApiError::NotFound(_))));
    }

    #[tokio::test]
    async fn send_broadcasts_to_the_room_and_nudges_the_recipient() {
        let app = TestApp::new();
        let (match_id, ada, brin) = accepted_match(&app).await;

        let (brin_conn, mut brin_rx) = app.state.dispatcher.register_connection(brin);
        app.state.dispatcher.join_room(match_id, brin, brin_conn);

        send_message(&app.state, ada, "ada", send(match_id, "table for two at 7?"))
            .await
            .unwrap();

        // Room broadcast lands first, then the direct notification.
        match brin_rx.try_recv().unwrap() {
            GatewayEvent::NewMessage(dto) => {
                assert_eq!(dto.match_id, match_id);
                assert_eq!(dto.text, "table for two at 7?");
            }
            other => panic!("unexpected event {:?}", other),
        }
        match brin_rx.try_recv().unwrap() {
            GatewayEvent::NewMessageNotification { sender_name, preview, .. } => {
                assert_eq!(sender_name, "ada");
                assert_eq!(preview, "table for two at 7?");
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn fetching_the_thread_marks_the_backlog_read() {
        let app = TestApp::new();
        let (match_id, ada, brin) = accepted_match(&app).await;

        send_message(&app.state, ada, "ada", send(match_id, "hi")).await.unwrap();
        send_message(&app.state, ada, "ada", send(match_id, "there?")).await.unwrap();

        let seen_by_sender = list_messages(&app.state, match_id, ada).await.unwrap();
        assert!(seen_by_sender.iter().all(|m| !m.is_read));

        let seen_by_brin = list_messages(&app.state, match_id, brin).await.unwrap();
        assert!(seen_by_brin.iter().all(|m| m.is_read));
    }

    #[tokio::test]
    async fn deleted_match_hides_the_thread_from_both_sides() {
        let app = TestApp::new();
        let (match_id, ada, brin) = accepted_match(&app).await;
        send_message(&app.state, ada, "ada", send(match_id, "hi")).await.unwrap();

        crate::matches::delete_match(&app.state, match_id, brin).await.unwrap();

        for user in [ada, brin] {
            let err = list_messages(&app.state, match_id, user).await;
            assert!(matches!(err, Err(ApiError::NotFound(_))));
        }
    }

    #[test]
    fn preview_truncates_on_char_boundaries() {
        let short = "see you at seven";
        assert_eq!(preview(short), short);

        let exactly_fifty = "a".repeat(50);
        assert_eq!(preview(&exactly_fifty), exactly_fifty);

        let long = "a".repeat(51);
        let cut = preview(&long);
        assert_eq!(cut.chars().count(), 53);
        assert!(cut.ends_with("..."));

        let multibyte = "é".repeat(60);
        assert!(preview(&multibyte).starts_with(&"é".repeat(50)));
    }
}
