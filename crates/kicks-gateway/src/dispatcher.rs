use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, broadcast, mpsc};
use tracing::{debug, warn};
use uuid::Uuid;

use kicks_types::events::GatewayEvent;

/// Manages all connected clients and routes events to them.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    /// Feed events: every connection receives them and filters on its own
    /// feed subscription flag.
    feed_tx: broadcast::Sender<GatewayEvent>,

    /// Per-user targeted send channels: user_id -> (conn_id -> sender).
    /// A user may be connected from several devices at once.
    user_channels: RwLock<HashMap<Uuid, HashMap<Uuid, mpsc::UnboundedSender<GatewayEvent>>>>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        let (feed_tx, _) = broadcast::channel(1024);
        Self {
            inner: Arc::new(DispatcherInner {
                feed_tx,
                user_channels: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Subscribe to feed events. Returns a broadcast receiver.
    pub fn subscribe_feed(&self) -> broadcast::Receiver<GatewayEvent> {
        self.inner.feed_tx.subscribe()
    }

    /// Publish a feed event to every connection. User-addressed events are
    /// refused here so they never leak onto the shared feed.
    pub fn publish_feed(&self, event: GatewayEvent) -> bool {
        if !event.is_feed() {
            warn!("Refusing to broadcast a user-addressed event on the feed");
            return false;
        }
        // No receivers just means nobody is connected.
        let _ = self.inner.feed_tx.send(event);
        true
    }

    /// Register a connection for a user. Returns (conn_id, receiver).
    pub async fn register_connection(
        &self,
        user_id: Uuid,
    ) -> (Uuid, mpsc::UnboundedReceiver<GatewayEvent>) {
        let conn_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner
            .user_channels
            .write()
            .await
            .entry(user_id)
            .or_default()
            .insert(conn_id, tx);
        (conn_id, rx)
    }

    /// Drop one connection; the user entry goes away with its last connection.
    pub async fn unregister_connection(&self, user_id: Uuid, conn_id: Uuid) {
        let mut channels = self.inner.user_channels.write().await;
        if let Some(conns) = channels.get_mut(&user_id) {
            conns.remove(&conn_id);
            if conns.is_empty() {
                channels.remove(&user_id);
            }
        }
    }

    /// Send a targeted event to every connection of a user.
    /// Returns how many connections accepted it.
    pub async fn send_to_user(&self, user_id: Uuid, event: GatewayEvent) -> usize {
        let channels = self.inner.user_channels.read().await;
        let Some(conns) = channels.get(&user_id) else {
            return 0;
        };

        let mut delivered = 0;
        for tx in conns.values() {
            if tx.send(event.clone()).is_ok() {
                delivered += 1;
            }
        }
        debug!("Delivered event to {} connection(s) of {}", delivered, user_id);
        delivered
    }

    pub async fn send_to_users(&self, user_ids: &[Uuid], event: GatewayEvent) {
        for &user_id in user_ids {
            self.send_to_user(user_id, event.clone()).await;
        }
    }

    /// Number of live connections for a user.
    pub async fn connection_count(&self, user_id: Uuid) -> usize {
        self.inner
            .user_channels
            .read()
            .await
            .get(&user_id)
            .map_or(0, HashMap::len)
    }
}
