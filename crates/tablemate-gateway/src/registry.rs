use std::collections::HashMap;
use std::sync::RwLock;

use tokio::sync::mpsc;
use uuid::Uuid;

use tablemate_types::events::GatewayEvent;

pub type EventSender = mpsc::UnboundedSender<GatewayEvent>;

/// Live-connection registry: user -> set of connection handles. A user may
/// hold several simultaneous connections (phone + tablet).
///
/// The in-memory implementation is process-local; a horizontally scaled
/// deployment swaps in a broker-backed implementation so direct emits reach
/// a user regardless of which instance holds their socket.
pub trait ConnectionRegistry: Send + Sync {
    fn register(&self, user_id: Uuid, conn_id: Uuid, tx: EventSender);
    fn unregister(&self, user_id: Uuid, conn_id: Uuid);
    fn list_by_user(&self, user_id: Uuid) -> Vec<EventSender>;
    fn get(&self, user_id: Uuid, conn_id: Uuid) -> Option<EventSender>;

    fn is_online(&self, user_id: Uuid) -> bool {
        !self.list_by_user(user_id).is_empty()
    }
}

#[derive(Default)]
pub struct InMemoryRegistry {
    users: RwLock<HashMap<Uuid, HashMap<Uuid, EventSender>>>,
}

impl ConnectionRegistry for InMemoryRegistry {
    fn register(&self, user_id: Uuid, conn_id: Uuid, tx: EventSender) {
        self.users
            .write()
            .expect("registry lock poisoned")
            .entry(user_id)
            .or_default()
            .insert(conn_id, tx);
    }

    fn unregister(&self, user_id: Uuid, conn_id: Uuid) {
        let mut users = self.users.write().expect("registry lock poisoned");
        if let Some(conns) = users.get_mut(&user_id) {
            conns.remove(&conn_id);
            if conns.is_empty() {
                users.remove(&user_id);
            }
        }
    }

    fn list_by_user(&self, user_id: Uuid) -> Vec<EventSender> {
        self.users
            .read()
            .expect("registry lock poisoned")
            .get(&user_id)
            .map(|conns| conns.values().cloned().collect())
            .unwrap_or_default()
    }

    fn get(&self, user_id: Uuid, conn_id: Uuid) -> Option<EventSender> {
        self.users
            .read()
            .expect("registry lock poisoned")
            .get(&user_id)
            .and_then(|conns| conns.get(&conn_id))
            .cloned()
    }
}
