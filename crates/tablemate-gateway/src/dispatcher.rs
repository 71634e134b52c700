use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tokio::sync::mpsc;
use uuid::Uuid;

use tablemate_types::events::GatewayEvent;

use crate::registry::{ConnectionRegistry, EventSender, InMemoryRegistry};

struct RoomMember {
    user_id: Uuid,
    tx: EventSender,
}

/// Manages all connected clients: direct per-user emission through the
/// connection registry, and `chat:<match_id>` room broadcast for accepted
/// matches. All emits are fire-and-forget; a closed receiver is a no-op.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    registry: Arc<dyn ConnectionRegistry>,

    /// match_id -> (conn_id -> member). Joined explicitly after accept,
    /// left explicitly or on disconnect.
    rooms: RwLock<HashMap<Uuid, HashMap<Uuid, RoomMember>>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::with_registry(Arc::new(InMemoryRegistry::default()))
    }

    pub fn with_registry(registry: Arc<dyn ConnectionRegistry>) -> Self {
        Self {
            inner: Arc::new(DispatcherInner {
                registry,
                rooms: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Register a new live connection. Returns (conn_id, receiver); the
    /// connection loop drains the receiver into the socket.
    pub fn register_connection(
        &self,
        user_id: Uuid,
    ) -> (Uuid, mpsc::UnboundedReceiver<GatewayEvent>) {
        let conn_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.registry.register(user_id, conn_id, tx);
        (conn_id, rx)
    }

    /// Tear down one connection: out of the registry and out of every room.
    pub fn disconnect(&self, user_id: Uuid, conn_id: Uuid) {
        self.inner.registry.unregister(user_id, conn_id);

        let mut rooms = self.inner.rooms.write().expect("room lock poisoned");
        rooms.retain(|_, members| {
            members.remove(&conn_id);
            !members.is_empty()
        });
    }

    /// Direct emit: every live connection of this user.
    pub fn send_to_user(&self, user_id: Uuid, event: GatewayEvent) {
        for tx in self.inner.registry.list_by_user(user_id) {
            let _ = tx.send(event.clone());
        }
    }

    pub fn is_online(&self, user_id: Uuid) -> bool {
        self.inner.registry.is_online(user_id)
    }

    /// Join a connection to a match's chat room. The caller has already
    /// verified the match is accepted and the user participates.
    pub fn join_room(&self, match_id: Uuid, user_id: Uuid, conn_id: Uuid) {
        let Some(tx) = self.inner.registry.get(user_id, conn_id) else {
            return;
        };
        self.inner
            .rooms
            .write()
            .expect("room lock poisoned")
            .entry(match_id)
            .or_default()
            .insert(conn_id, RoomMember { user_id, tx });
    }

    pub fn leave_room(&self, match_id: Uuid, conn_id: Uuid) {
        let mut rooms = self.inner.rooms.write().expect("room lock poisoned");
        if let Some(members) = rooms.get_mut(&match_id) {
            members.remove(&conn_id);
            if members.is_empty() {
                rooms.remove(&match_id);
            }
        }
    }

    /// Room broadcast: every connection currently joined.
    pub fn broadcast_room(&self, match_id: Uuid, event: GatewayEvent) {
        let rooms = self.inner.rooms.read().expect("room lock poisoned");
        if let Some(members) = rooms.get(&match_id) {
            for member in members.values() {
                let _ = member.tx.send(event.clone());
            }
        }
    }

    /// Room broadcast skipping one user's connections (typing indicators).
    pub fn broadcast_room_except(&self, match_id: Uuid, exclude_user: Uuid, event: GatewayEvent) {
        let rooms = self.inner.rooms.read().expect("room lock poisoned");
        if let Some(members) = rooms.get(&match_id) {
            for member in members.values() {
                if member.user_id != exclude_user {
                    let _ = member.tx.send(event.clone());
                }
            }
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn typing(match_id: Uuid, user_id: Uuid) -> GatewayEvent {
        GatewayEvent::UserTyping { match_id, user_id }
    }

    #[tokio::test]
    async fn direct_emit_reaches_every_device() {
        let dispatcher = Dispatcher::new();
        let user = Uuid::new_v4();
        let (_, mut phone) = dispatcher.register_connection(user);
        let (_, mut tablet) = dispatcher.register_connection(user);

        dispatcher.send_to_user(user, typing(Uuid::new_v4(), user));

        assert!(phone.try_recv().is_ok());
        assert!(tablet.try_recv().is_ok());
    }

    #[tokio::test]
    async fn emitting_to_an_offline_user_is_a_noop() {
        let dispatcher = Dispatcher::new();
        let user = Uuid::new_v4();
        assert!(!dispatcher.is_online(user));
        dispatcher.send_to_user(user, typing(Uuid::new_v4(), user));
    }

    #[tokio::test]
    async fn room_broadcast_skips_connections_that_never_joined() {
        let dispatcher = Dispatcher::new();
        let match_id = Uuid::new_v4();
        let ada = Uuid::new_v4();
        let brin = Uuid::new_v4();

        let (ada_conn, mut ada_rx) = dispatcher.register_connection(ada);
        let (_, mut brin_rx) = dispatcher.register_connection(brin);
        dispatcher.join_room(match_id, ada, ada_conn);

        dispatcher.broadcast_room(match_id, typing(match_id, brin));

        assert!(ada_rx.try_recv().is_ok());
        assert!(brin_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn typing_broadcast_excludes_the_sender() {
        let dispatcher = Dispatcher::new();
        let match_id = Uuid::new_v4();
        let ada = Uuid::new_v4();
        let brin = Uuid::new_v4();

        let (ada_conn, mut ada_rx) = dispatcher.register_connection(ada);
        let (brin_conn, mut brin_rx) = dispatcher.register_connection(brin);
        dispatcher.join_room(match_id, ada, ada_conn);
        dispatcher.join_room(match_id, brin, brin_conn);

        dispatcher.broadcast_room_except(match_id, ada, typing(match_id, ada));

        assert!(ada_rx.try_recv().is_err());
        assert!(brin_rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn disconnect_leaves_all_rooms() {
        let dispatcher = Dispatcher::new();
        let match_id = Uuid::new_v4();
        let ada = Uuid::new_v4();

        let (conn, mut rx) = dispatcher.register_connection(ada);
        dispatcher.join_room(match_id, ada, conn);
        dispatcher.disconnect(ada, conn);

        dispatcher.broadcast_room(match_id, typing(match_id, ada));
        dispatcher.send_to_user(ada, typing(match_id, ada));

        assert!(rx.try_recv().is_err());
        assert!(!dispatcher.is_online(ada));
    }
}
