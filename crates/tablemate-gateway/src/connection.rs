use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tracing::{info, warn};
use uuid::Uuid;

use tablemate_db::Database;
use tablemate_types::events::{GatewayCommand, GatewayEvent};
use tablemate_types::models::MatchStatus;

use crate::dispatcher::Dispatcher;

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// How long a fresh socket gets to present a valid token.
const IDENTIFY_TIMEOUT: Duration = Duration::from_secs(10);

/// Handle a single WebSocket connection: identify handshake, Ready event,
/// then the send/receive loop until either side drops.
pub async fn handle_connection(
    socket: WebSocket,
    dispatcher: Dispatcher,
    db: Arc<Database>,
    jwt_secret: String,
) {
    let (mut sender, mut receiver) = socket.split();

    let (user_id, username) = match wait_for_identify(&mut receiver, &jwt_secret).await {
        Some(id) => id,
        None => {
            warn!("WebSocket client failed to identify, closing");
            return;
        }
    };

    info!("{} ({}) connected to gateway", username, user_id);

    let ready = GatewayEvent::Ready {
        user_id,
        username: username.clone(),
    };
    if sender
        .send(Message::Text(serde_json::to_string(&ready).unwrap().into()))
        .await
        .is_err()
    {
        return;
    }

    let (conn_id, mut user_rx) = dispatcher.register_connection(user_id);

    // Shared flag for heartbeat
    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    // Forward targeted events -> client, with heartbeat
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                result = user_rx.recv() => {
                    let event = match result {
                        Some(event) => event,
                        None => break,
                    };
                    let text = serde_json::to_string(&event).unwrap();
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("Heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Read commands from client
    let dispatcher_recv = dispatcher.clone();
    let db_recv = db.clone();
    let username_recv = username.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<GatewayCommand>(&text) {
                    Ok(cmd) => {
                        handle_command(&dispatcher_recv, &db_recv, user_id, conn_id, cmd).await;
                    }
                    Err(e) => {
                        warn!(
                            "{} ({}) bad command: {} -- raw: {}",
                            username_recv,
                            user_id,
                            e,
                            &text[..text.len().min(200)]
                        );
                    }
                },
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    dispatcher.disconnect(user_id, conn_id);
    info!("{} ({}) disconnected from gateway", username, user_id);
}

async fn wait_for_identify(
    receiver: &mut futures_util::stream::SplitStream<WebSocket>,
    jwt_secret: &str,
) -> Option<(Uuid, String)> {
    use jsonwebtoken::{DecodingKey, Validation, decode};
    use tablemate_types::api::Claims;

    let timeout = tokio::time::timeout(IDENTIFY_TIMEOUT, async {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Text(text) = msg {
                if let Ok(GatewayCommand::Identify { token }) =
                    serde_json::from_str::<GatewayCommand>(&text)
                {
                    let token_data = decode::<Claims>(
                        &token,
                        &DecodingKey::from_secret(jwt_secret.as_bytes()),
                        &Validation::default(),
                    )
                    .ok()?;

                    return Some((token_data.claims.sub, token_data.claims.username));
                }
            }
        }
        None
    });

    timeout.await.ok().flatten()
}

async fn handle_command(
    dispatcher: &Dispatcher,
    db: &Arc<Database>,
    user_id: Uuid,
    conn_id: Uuid,
    cmd: GatewayCommand,
) {
    match cmd {
        GatewayCommand::Identify { .. } => {} // Already handled

        GatewayCommand::JoinChat { match_id } => match room_access(db, match_id, user_id).await {
            Ok(true) => {
                info!("{} joined chat {}", user_id, match_id);
                dispatcher.join_room(match_id, user_id, conn_id);
            }
            Ok(false) => {
                warn!("{} denied joining chat {}", user_id, match_id);
            }
            Err(e) => {
                warn!("join_chat lookup failed for {}: {:#}", match_id, e);
            }
        },

        GatewayCommand::LeaveChat { match_id } => {
            dispatcher.leave_room(match_id, conn_id);
        }

        GatewayCommand::Typing { match_id } => {
            dispatcher.broadcast_room_except(
                match_id,
                user_id,
                GatewayEvent::UserTyping { match_id, user_id },
            );
        }

        GatewayCommand::StopTyping { match_id } => {
            dispatcher.broadcast_room_except(
                match_id,
                user_id,
                GatewayEvent::UserStopTyping { match_id, user_id },
            );
        }
    }
}

/// A chat room is only open to participants of an accepted match.
async fn room_access(db: &Arc<Database>, match_id: Uuid, user_id: Uuid) -> anyhow::Result<bool> {
    let db = db.clone();
    tokio::task::spawn_blocking(move || {
        let Some(row) = db.get_match(&match_id.to_string())? else {
            return Ok(false);
        };
        let open = MatchStatus::parse(&row.status).is_some_and(|s| s.allows_messaging());
        Ok(row.is_participant(&user_id.to_string()) && open)
    })
    .await?
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed_match(db: &Database) -> (Uuid, Uuid, Uuid) {
        let ada = Uuid::new_v4();
        let brin = Uuid::new_v4();
        let restaurant = Uuid::new_v4().to_string();
        db.create_user(&ada.to_string(), "ada", "hash", "", "[]", None)
            .unwrap();
        db.create_user(&brin.to_string(), "brin", "hash", "", "[]", None)
            .unwrap();
        db.create_restaurant(&restaurant, "Osteria").unwrap();
        let match_id = Uuid::new_v4();
        db.create_match(
            &match_id.to_string(),
            &ada.to_string(),
            &brin.to_string(),
            &restaurant,
        )
        .unwrap()
        .unwrap();
        (match_id, ada, brin)
    }

    #[tokio::test]
    async fn rooms_open_only_after_accept() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let (match_id, ada, _) = seed_match(&db);

        assert!(!room_access(&db, match_id, ada).await.unwrap());

        db.update_match_status(&match_id.to_string(), "accepted")
            .unwrap();
        assert!(room_access(&db, match_id, ada).await.unwrap());
    }

    #[tokio::test]
    async fn rooms_stay_closed_to_outsiders() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let (match_id, _, _) = seed_match(&db);
        db.update_match_status(&match_id.to_string(), "accepted")
            .unwrap();

        assert!(!room_access(&db, match_id, Uuid::new_v4()).await.unwrap());
        assert!(!room_access(&db, Uuid::new_v4(), Uuid::new_v4()).await.unwrap());
    }
}
