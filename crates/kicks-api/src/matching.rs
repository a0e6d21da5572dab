//! Match-and-notify.
//!
//! A new listing is compared against every request with the same normalized
//! (foot, brand, size) triple, and a new request against every listing. Each
//! hit owned by somebody else yields one `match` notification for that owner.
//! There is no deduplication: posting the same thing twice notifies twice.

use anyhow::Result;
use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use kicks_db::Database;
use kicks_gateway::Dispatcher;
use kicks_types::events::GatewayEvent;
use kicks_types::models::{
    FootSide, Listing, Notification, NotificationKind, NotificationSource, SearchRequest,
};

/// Notify owners of matching requests that `listing` is available.
pub fn notify_for_listing(db: &Database, listing: &Listing) -> Result<Vec<Notification>> {
    let key = listing.match_key();
    let matches = db.find_requests_matching(&key, listing.owner_id)?;
    debug!("Listing {} matched {} request(s)", listing.id, matches.len());

    let message = listing_match_message(listing.foot, &listing.brand, listing.model.as_deref(), &listing.size);
    matches
        .iter()
        .map(|request| emit(db, request.owner_id, &message, NotificationSource::Listing(listing.id)))
        .collect()
}

/// Notify owners of matching listings that someone is looking for one.
pub fn notify_for_request(db: &Database, request: &SearchRequest) -> Result<Vec<Notification>> {
    let key = request.match_key();
    let matches = db.find_listings_matching(&key, request.owner_id)?;
    debug!("Request {} matched {} listing(s)", request.id, matches.len());

    let message = request_match_message(request.foot, &request.brand, request.model.as_deref(), &request.size);
    matches
        .iter()
        .map(|listing| emit(db, listing.owner_id, &message, NotificationSource::Request(request.id)))
        .collect()
}

pub fn listing_match_message(foot: FootSide, brand: &str, model: Option<&str>, size: &str) -> String {
    format!(
        "A {} foot {}{} (Size {}) is now available!",
        foot,
        brand,
        model_suffix(model),
        size
    )
}

pub fn request_match_message(foot: FootSide, brand: &str, model: Option<&str>, size: &str) -> String {
    format!(
        "Someone is looking for a {} foot {}{} (Size {})!",
        foot,
        brand,
        model_suffix(model),
        size
    )
}

/// Push freshly created notifications to their recipients' open connections.
pub async fn deliver(dispatcher: &Dispatcher, notifications: Vec<Notification>) {
    for notification in notifications {
        let user_id = notification.user_id;
        dispatcher
            .send_to_user(user_id, GatewayEvent::NotificationCreate { notification })
            .await;
    }
}

fn model_suffix(model: Option<&str>) -> String {
    match model {
        Some(m) if !m.is_empty() => format!(" {}", m),
        _ => String::new(),
    }
}

fn emit(db: &Database, user_id: Uuid, message: &str, source: NotificationSource) -> Result<Notification> {
    let notification = Notification {
        id: Uuid::new_v4(),
        user_id,
        kind: NotificationKind::Match,
        message: message.to_string(),
        source,
        read: false,
        created_at: Utc::now(),
    };
    db.insert_notification(&notification)?;
    Ok(notification)
}
