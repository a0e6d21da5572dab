use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Conversation, Listing, Message, Notification};

/// Events sent over the WebSocket gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// Server confirms successful authentication
    Ready { user_id: Uuid },

    /// A listing was posted to the home feed
    ListingCreate { listing: Listing },

    /// A listing was removed by its owner
    ListingDelete { listing_id: Uuid },

    /// A match notification for the receiving user
    NotificationCreate { notification: Notification },

    /// A message was appended to one of the receiving user's conversations
    MessageCreate { message: Message },

    /// A conversation's last-message preview changed
    ConversationUpdate { conversation: Conversation },
}

impl GatewayEvent {
    /// Feed events go only to connections subscribed to the home feed.
    /// Everything else is addressed to specific users.
    pub fn is_feed(&self) -> bool {
        matches!(self, Self::ListingCreate { .. } | Self::ListingDelete { .. })
    }
}

/// Commands sent FROM client TO server over WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayCommand {
    /// Authenticate the WebSocket connection
    Identify { token: String },

    /// Start receiving feed events (home screen mounted)
    SubscribeFeed,

    /// Stop receiving feed events (home screen unmounted)
    UnsubscribeFeed,
}
