//! Shared fixtures for the handler-level tests.

use std::sync::Arc;

use uuid::Uuid;

use tablemate_db::Database;
use tablemate_gateway::dispatcher::Dispatcher;
use tablemate_gateway::push::PushClient;

use crate::Windows;
use crate::auth::{AppState, AppStateInner};
use crate::moderation::ModerationClient;

pub(crate) struct TestApp {
    pub state: AppState,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_moderation(ModerationClient::new(None))
    }

    pub fn with_moderation(moderation: ModerationClient) -> Self {
        let db = Arc::new(Database::open_in_memory().expect("in-memory db"));
        let state = Arc::new(AppStateInner {
            db,
            jwt_secret: "test-secret".into(),
            dispatcher: Dispatcher::new(),
            moderation,
            push: PushClient::new(None, None),
            windows: Windows::default(),
        });
        Self { state }
    }
}

pub(crate) fn register_user(app: &TestApp, name: &str, preference: &str, tags: &[&str]) -> Uuid {
    let id = Uuid::new_v4();
    let tags_json = serde_json::to_string(tags).expect("tags serialize");
    app.state
        .db
        .create_user(&id.to_string(), name, "hash", preference, &tags_json, None)
        .expect("create user");
    id
}

pub(crate) fn seed_restaurant(app: &TestApp, name: &str) -> Uuid {
    let id = Uuid::new_v4();
    app.state
        .db
        .create_restaurant(&id.to_string(), name)
        .expect("create restaurant");
    id
}
