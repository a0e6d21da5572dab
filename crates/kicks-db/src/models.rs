//! Database row types: these map directly to SQLite rows.
//! Distinct from kicks-types domain models to keep the DB layer independent;
//! the `into_*` conversions are where stored text is validated.

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use kicks_types::models::{
    Conversation, FootSide, Listing, Message, Notification, NotificationKind, NotificationSource,
    SearchRequest, UserProfile, parse_timestamp,
};

pub struct UserRow {
    pub id: String,
    pub email: String,
    pub password: String,
    pub display_name: String,
    pub photo_image_id: Option<String>,
    pub email_verified: bool,
    pub created_at: String,
}

pub struct ImageRow {
    pub id: String,
    pub owner_id: String,
    pub content_type: String,
    pub size: i64,
    pub sha256: String,
    pub created_at: String,
}

pub struct ListingRow {
    pub id: String,
    pub owner_id: String,
    pub owner_display_name: String,
    pub foot: String,
    pub brand: String,
    pub model: Option<String>,
    pub size: String,
    pub condition: String,
    pub created_at: String,
    pub image_ids: Vec<String>,
}

pub struct SearchRequestRow {
    pub id: String,
    pub owner_id: String,
    pub foot: String,
    pub brand: String,
    pub model: Option<String>,
    pub size: String,
    pub created_at: String,
}

pub struct NotificationRow {
    pub id: String,
    pub user_id: String,
    pub kind: String,
    pub message: String,
    pub source_type: String,
    pub source_id: String,
    pub read: bool,
    pub created_at: String,
}

pub struct ConversationRow {
    pub id: String,
    pub participant_a: String,
    pub participant_b: String,
    pub last_message: Option<String>,
    pub last_message_at: Option<String>,
    pub created_at: String,
}

pub struct MessageRow {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub text: String,
    pub created_at: String,
}

fn uuid(field: &str, value: &str) -> Result<Uuid> {
    value
        .parse()
        .with_context(|| format!("corrupt {} '{}'", field, value))
}

fn timestamp(field: &str, value: &str) -> Result<DateTime<Utc>> {
    parse_timestamp(value).ok_or_else(|| anyhow!("corrupt {} '{}'", field, value))
}

fn foot(value: &str) -> Result<FootSide> {
    value
        .parse()
        .with_context(|| format!("corrupt foot '{}'", value))
}

impl UserRow {
    pub fn uuid(&self) -> Result<Uuid> {
        uuid("user id", &self.id)
    }

    pub fn into_profile(self) -> Result<UserProfile> {
        Ok(UserProfile {
            id: uuid("user id", &self.id)?,
            display_name: self.display_name,
            photo_image_id: self
                .photo_image_id
                .as_deref()
                .map(|id| uuid("photo_image_id", id))
                .transpose()?,
            created_at: timestamp("created_at", &self.created_at)?,
        })
    }
}

impl ImageRow {
    pub fn owner_uuid(&self) -> Result<Uuid> {
        uuid("image owner_id", &self.owner_id)
    }
}

impl ListingRow {
    pub fn into_listing(self) -> Result<Listing> {
        Ok(Listing {
            id: uuid("listing id", &self.id)?,
            owner_id: uuid("listing owner_id", &self.owner_id)?,
            owner_display_name: self.owner_display_name,
            foot: foot(&self.foot)?,
            brand: self.brand,
            model: self.model,
            size: self.size,
            condition: self.condition,
            image_ids: self
                .image_ids
                .iter()
                .map(|id| uuid("listing image_id", id))
                .collect::<Result<Vec<_>>>()?,
            created_at: timestamp("listing created_at", &self.created_at)?,
        })
    }
}

impl SearchRequestRow {
    pub fn into_request(self) -> Result<SearchRequest> {
        Ok(SearchRequest {
            id: uuid("request id", &self.id)?,
            owner_id: uuid("request owner_id", &self.owner_id)?,
            foot: foot(&self.foot)?,
            brand: self.brand,
            model: self.model,
            size: self.size,
            created_at: timestamp("request created_at", &self.created_at)?,
        })
    }
}

impl NotificationRow {
    pub fn into_notification(self) -> Result<Notification> {
        let kind = match self.kind.as_str() {
            "match" => NotificationKind::Match,
            other => return Err(anyhow!("corrupt notification kind '{}'", other)),
        };
        let source_id = uuid("notification source_id", &self.source_id)?;
        let source = NotificationSource::from_parts(&self.source_type, source_id)
            .ok_or_else(|| anyhow!("corrupt notification source_type '{}'", self.source_type))?;

        Ok(Notification {
            id: uuid("notification id", &self.id)?,
            user_id: uuid("notification user_id", &self.user_id)?,
            kind,
            message: self.message,
            source,
            read: self.read,
            created_at: timestamp("notification created_at", &self.created_at)?,
        })
    }
}

impl ConversationRow {
    pub fn into_conversation(self) -> Result<Conversation> {
        Ok(Conversation {
            participants: [
                uuid("participant_a", &self.participant_a)?,
                uuid("participant_b", &self.participant_b)?,
            ],
            last_message_at: self
                .last_message_at
                .as_deref()
                .map(|ts| timestamp("last_message_at", ts))
                .transpose()?,
            last_message: self.last_message,
            created_at: timestamp("conversation created_at", &self.created_at)?,
            id: self.id,
        })
    }
}

impl MessageRow {
    pub fn into_message(self) -> Result<Message> {
        Ok(Message {
            id: uuid("message id", &self.id)?,
            sender_id: uuid("message sender_id", &self.sender_id)?,
            text: self.text,
            created_at: timestamp("message created_at", &self.created_at)?,
            conversation_id: self.conversation_id,
        })
    }
}
