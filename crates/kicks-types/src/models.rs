use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// -- Foot side --

/// Which foot a single sneaker fits. Serialized lowercase, parsed
/// case-insensitively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum FootSide {
    Left,
    Right,
}

impl FootSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
        }
    }
}

impl fmt::Display for FootSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown foot side '{0}', expected 'left' or 'right'")]
pub struct ParseFootSideError(String);

impl FromStr for FootSide {
    type Err = ParseFootSideError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left" | "l" => Ok(Self::Left),
            "right" | "r" => Ok(Self::Right),
            _ => Err(ParseFootSideError(s.to_string())),
        }
    }
}

impl TryFrom<String> for FootSide {
    type Error = ParseFootSideError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

// -- Normalization --

/// Trim, collapse inner whitespace and lowercase a brand name.
pub fn normalize_brand(brand: &str) -> String {
    brand
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Sizes are compared as exact strings: "10" and "10.5" stay distinct.
pub fn normalize_size(size: &str) -> String {
    size.trim().to_string()
}

/// Empty or whitespace-only models become `None`.
pub fn normalize_model(model: Option<&str>) -> Option<String> {
    model
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
}

/// The (foot, brand, size) triple listings and requests are matched on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MatchKey {
    pub foot: FootSide,
    pub brand: String,
    pub size: String,
}

impl MatchKey {
    pub fn new(foot: FootSide, brand: &str, size: &str) -> Self {
        Self {
            foot,
            brand: normalize_brand(brand),
            size: normalize_size(size),
        }
    }

    /// Both brand and size must survive normalization for the key to be usable.
    pub fn is_complete(&self) -> bool {
        !self.brand.is_empty() && !self.size.is_empty()
    }
}

// -- Conversation identity --

pub const CONVERSATION_ID_SEPARATOR: char = '_';

/// Canonical id for the conversation between two users.
///
/// The pair is sorted before joining so `conversation_id(a, b) == conversation_id(b, a)`.
/// Uuid ordering is byte ordering, which matches the order of the hyphenated
/// lowercase strings.
pub fn conversation_id(a: Uuid, b: Uuid) -> String {
    let (first, second) = if a <= b { (a, b) } else { (b, a) };
    format!("{}{}{}", first, CONVERSATION_ID_SEPARATOR, second)
}

/// Split a conversation id back into its participants.
pub fn conversation_participants(id: &str) -> Option<(Uuid, Uuid)> {
    let (a, b) = id.split_once(CONVERSATION_ID_SEPARATOR)?;
    let a: Uuid = a.parse().ok()?;
    let b: Uuid = b.parse().ok()?;
    if conversation_id(a, b) != id {
        return None;
    }
    Some((a, b))
}

// -- Timestamps --

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

/// Fixed-width UTC timestamp; lexicographic order equals chronological order.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.with_timezone(&Utc));
    }
    // SQLite `datetime('now')` style, no timezone.
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|ndt| ndt.and_utc())
}

// -- Domain records --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub display_name: String,
    pub photo_image_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// A single sneaker posted for sale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub owner_display_name: String,
    pub foot: FootSide,
    pub brand: String,
    pub model: Option<String>,
    pub size: String,
    pub condition: String,
    pub image_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Listing {
    pub fn match_key(&self) -> MatchKey {
        MatchKey::new(self.foot, &self.brand, &self.size)
    }
}

/// A "looking for" post.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub foot: FootSide,
    pub brand: String,
    pub model: Option<String>,
    pub size: String,
    pub created_at: DateTime<Utc>,
}

impl SearchRequest {
    pub fn match_key(&self) -> MatchKey {
        MatchKey::new(self.foot, &self.brand, &self.size)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Match,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Match => "match",
        }
    }
}

/// The record whose submission produced a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source_type", content = "source_id", rename_all = "lowercase")]
pub enum NotificationSource {
    Listing(Uuid),
    Request(Uuid),
}

impl NotificationSource {
    pub fn kind_str(&self) -> &'static str {
        match self {
            Self::Listing(_) => "listing",
            Self::Request(_) => "request",
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            Self::Listing(id) | Self::Request(id) => *id,
        }
    }

    pub fn from_parts(kind: &str, id: Uuid) -> Option<Self> {
        match kind {
            "listing" => Some(Self::Listing(id)),
            "request" => Some(Self::Request(id)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: NotificationKind,
    pub message: String,
    pub source: NotificationSource,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub participants: [Uuid; 2],
    pub last_message: Option<String>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    pub fn has_participant(&self, user_id: Uuid) -> bool {
        self.participants.contains(&user_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: String,
    pub sender_id: Uuid,
    pub text: String,
    pub created_at: DateTime<Utc>,
}
