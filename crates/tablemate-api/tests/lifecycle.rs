//! End-to-end lifecycle: check in -> discover -> match -> accept -> chat,
//! exercised through the service layer with an in-memory store and a live
//! dispatcher.

use std::sync::Arc;

use uuid::Uuid;

use tablemate_api::auth::{AppState, AppStateInner};
use tablemate_api::moderation::ModerationClient;
use tablemate_api::{Windows, checkins, matches, messages};
use tablemate_db::Database;
use tablemate_gateway::dispatcher::Dispatcher;
use tablemate_gateway::push::PushClient;
use tablemate_types::api::{CheckInRequest, MatchRequestBody, SendMessageRequest};
use tablemate_types::events::GatewayEvent;
use tablemate_types::models::MatchStatus;

fn app_state() -> AppState {
    Arc::new(AppStateInner {
        db: Arc::new(Database::open_in_memory().expect("in-memory db")),
        jwt_secret: "test-secret".into(),
        dispatcher: Dispatcher::new(),
        moderation: ModerationClient::new(None),
        push: PushClient::new(None, None),
        windows: Windows::default(),
    })
}

fn seed_user(state: &AppState, name: &str, preference: &str, tags: &[&str]) -> Uuid {
    let id = Uuid::new_v4();
    let tags_json = serde_json::to_string(tags).unwrap();
    state
        .db
        .create_user(&id.to_string(), name, "hash", preference, &tags_json, None)
        .unwrap();
    id
}

fn seed_restaurant(state: &AppState, name: &str) -> Uuid {
    let id = Uuid::new_v4();
    state.db.create_restaurant(&id.to_string(), name).unwrap();
    id
}

#[tokio::test]
async fn full_dining_companion_flow() {
    let state = app_state();
    let ada = seed_user(&state, "ada", "deep talks", &["vegan", "thai"]);
    let brin = seed_user(&state, "brin", "deep talks", &["vegan", "thai"]);
    let osteria = seed_restaurant(&state, "Osteria");

    // Ada and Brin both check in at the same restaurant.
    for (user, party) in [(ada, 2u32), (brin, 3u32)] {
        checkins::check_in(
            &state,
            user,
            CheckInRequest {
                restaurant_id: osteria,
                party_size: party,
                notes: None,
            },
        )
        .await
        .unwrap();
    }

    // Brin's venue listing shows Ada with a bounded compatibility score.
    let diners = checkins::active_diners(&state, brin, osteria).await.unwrap();
    assert_eq!(diners.len(), 1);
    assert_eq!(diners[0].user.username, "ada");
    assert!(diners[0].compatibility_score <= 100);
    assert_eq!(diners[0].compatibility_score, 90);

    // Ada requests a match; it lands pending.
    let created = matches::request_match(
        &state,
        ada,
        MatchRequestBody {
            receiver_id: brin,
            restaurant_id: osteria,
        },
    )
    .await
    .unwrap();
    assert_eq!(created.status, MatchStatus::Pending);

    // Ada is online; Brin accepts and Ada's connection sees match_accepted.
    let (ada_conn, mut ada_rx) = state.dispatcher.register_connection(ada);
    let accepted = matches::accept_match(&state, created.id, brin, "brin")
        .await
        .unwrap();
    assert_eq!(accepted.status, MatchStatus::Accepted);
    match ada_rx.try_recv().unwrap() {
        GatewayEvent::MatchAccepted {
            match_id,
            accepted_by,
            restaurant_name,
        } => {
            assert_eq!(match_id, created.id);
            assert_eq!(accepted_by, brin);
            assert_eq!(restaurant_name, "Osteria");
        }
        other => panic!("unexpected event {:?}", other),
    }

    // Both join the chat room; Ada's message reaches Brin's room connection.
    let (brin_conn, mut brin_rx) = state.dispatcher.register_connection(brin);
    state.dispatcher.join_room(created.id, ada, ada_conn);
    state.dispatcher.join_room(created.id, brin, brin_conn);

    let sent = messages::send_message(
        &state,
        ada,
        "ada",
        SendMessageRequest {
            match_id: created.id,
            message_text: "corner table, 7pm?".into(),
        },
    )
    .await
    .unwrap();
    assert!(!sent.is_read);

    match brin_rx.try_recv().unwrap() {
        GatewayEvent::NewMessage(dto) => assert_eq!(dto.id, sent.id),
        other => panic!("unexpected event {:?}", other),
    }

    // Brin fetches the thread; the backlog flips to read.
    let thread = messages::list_messages(&state, created.id, brin).await.unwrap();
    assert_eq!(thread.len(), 1);
    assert!(thread[0].is_read);

    // Deleting the match cascades the thread away for both parties.
    matches::delete_match(&state, created.id, ada).await.unwrap();
    for user in [ada, brin] {
        assert!(messages::list_messages(&state, created.id, user).await.is_err());
    }
}

#[tokio::test]
async fn immediate_counter_request_conflicts() {
    let state = app_state();
    let ada = seed_user(&state, "ada", "", &[]);
    let brin = seed_user(&state, "brin", "", &[]);
    let osteria = seed_restaurant(&state, "Osteria");

    matches::request_match(
        &state,
        ada,
        MatchRequestBody {
            receiver_id: brin,
            restaurant_id: osteria,
        },
    )
    .await
    .unwrap();

    let counter = matches::request_match(
        &state,
        brin,
        MatchRequestBody {
            receiver_id: ada,
            restaurant_id: osteria,
        },
    )
    .await;
    assert!(counter.is_err());
}
