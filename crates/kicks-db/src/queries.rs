use std::collections::HashMap;

use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, ErrorCode, Row};
use uuid::Uuid;

use kicks_types::models::{
    Conversation, FootSide, Listing, MatchKey, Message, Notification, SearchRequest,
    conversation_id, format_timestamp,
};

use crate::Database;
use crate::models::{
    ConversationRow, ImageRow, ListingRow, MessageRow, NotificationRow, SearchRequestRow, UserRow,
};

/// Filters for the listing feed. All string filters are exact matches on
/// normalized values.
#[derive(Debug, Clone, Default)]
pub struct ListingFilter {
    pub foot: Option<FootSide>,
    pub brand: Option<String>,
    pub size: Option<String>,
    pub owner_id: Option<Uuid>,
    /// Only listings older than this position in the feed.
    pub before: Option<Cursor>,
    pub limit: u32,
}

/// A page boundary: the `created_at` of the last row already seen, plus its
/// id when known. Rows sharing that timestamp are split by the id's
/// insertion order, so none are skipped or repeated across pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
    pub created_at: String,
    pub id: Option<String>,
}

impl Cursor {
    pub fn at(created_at: impl Into<String>) -> Self {
        Self {
            created_at: created_at.into(),
            id: None,
        }
    }
}

const LISTING_COLUMNS: &str = "l.id, l.owner_id, COALESCE(u.display_name, 'Unknown'), l.foot, l.brand,
     l.model, l.size, l.condition, l.created_at";

const REQUEST_COLUMNS: &str = "id, owner_id, foot, brand, model, size, created_at";

const NOTIFICATION_COLUMNS: &str =
    "id, user_id, kind, message, source_type, source_id, read, created_at";

const CONVERSATION_COLUMNS: &str =
    "id, participant_a, participant_b, last_message, last_message_at, created_at";

impl Database {
    // -- Users --

    /// Returns false when the email is already taken.
    pub fn create_user(
        &self,
        id: &str,
        email: &str,
        password_hash: &str,
        display_name: &str,
        created_at: DateTime<Utc>,
    ) -> Result<bool> {
        self.with_conn_mut(|conn| {
            match conn.execute(
                "INSERT INTO users (id, email, password, display_name, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                (id, email, password_hash, display_name, format_timestamp(created_at)),
            ) {
                Ok(_) => Ok(true),
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == ErrorCode::ConstraintViolation =>
                {
                    Ok(false)
                }
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email", email))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    pub fn update_password(&self, id: &str, password_hash: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE users SET password = ?2 WHERE id = ?1",
                (id, password_hash),
            )?;
            Ok(changed > 0)
        })
    }

    // -- Email verification --

    /// Store the hash of a verification token. Earlier tokens for the same
    /// user stay valid until one of them is used.
    pub fn insert_verification_token(
        &self,
        user_id: &str,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO email_verifications (token_hash, user_id, expires_at)
                 VALUES (?1, ?2, ?3)",
                (token_hash, user_id, format_timestamp(expires_at)),
            )?;
            Ok(())
        })
    }

    /// Mark the token's owner verified and drop all of their tokens.
    /// Returns the user id, or `None` for an unknown or expired token.
    pub fn consume_verification_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<String>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let user_id: Option<String> = tx
                .query_row(
                    "SELECT user_id FROM email_verifications
                     WHERE token_hash = ?1 AND expires_at > ?2",
                    (token_hash, format_timestamp(now)),
                    |row| row.get(0),
                )
                .optional()?;

            if let Some(user_id) = &user_id {
                tx.execute("UPDATE users SET email_verified = 1 WHERE id = ?1", [user_id])?;
                tx.execute("DELETE FROM email_verifications WHERE user_id = ?1", [user_id])?;
            }
            tx.commit()?;
            Ok(user_id)
        })
    }

    /// Drop tokens that expired before `now`.
    pub fn purge_expired_verifications(&self, now: DateTime<Utc>) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let removed = conn.execute(
                "DELETE FROM email_verifications WHERE expires_at <= ?1",
                [format_timestamp(now)],
            )?;
            Ok(removed)
        })
    }

    /// `None` leaves the column untouched.
    pub fn update_profile(
        &self,
        id: &str,
        display_name: Option<&str>,
        photo_image_id: Option<&str>,
    ) -> Result<Option<UserRow>> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE users SET
                    display_name = COALESCE(?2, display_name),
                    photo_image_id = COALESCE(?3, photo_image_id)
                 WHERE id = ?1",
                (id, display_name, photo_image_id),
            )?;
            query_user(conn, "id", id)
        })
    }

    // -- Images --

    pub fn insert_image(&self, image: &ImageRow) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO images (id, owner_id, content_type, size, sha256, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    image.id,
                    image.owner_id,
                    image.content_type,
                    image.size,
                    image.sha256,
                    image.created_at,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_image(&self, id: &str) -> Result<Option<ImageRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, owner_id, content_type, size, sha256, created_at FROM images WHERE id = ?1",
                [id],
                |row| {
                    Ok(ImageRow {
                        id: row.get(0)?,
                        owner_id: row.get(1)?,
                        content_type: row.get(2)?,
                        size: row.get(3)?,
                        sha256: row.get(4)?,
                        created_at: row.get(5)?,
                    })
                },
            )
            .optional()
        })
    }

    // -- Listings --

    /// Insert a listing and its ordered image links in one transaction.
    pub fn insert_listing(&self, listing: &Listing) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let id = listing.id.to_string();
            tx.execute(
                "INSERT INTO listings (id, owner_id, foot, brand, model, size, condition, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                rusqlite::params![
                    id,
                    listing.owner_id.to_string(),
                    listing.foot.as_str(),
                    listing.brand,
                    listing.model,
                    listing.size,
                    listing.condition,
                    format_timestamp(listing.created_at),
                ],
            )?;
            for (position, image_id) in listing.image_ids.iter().enumerate() {
                tx.execute(
                    "INSERT INTO listing_images (listing_id, image_id, position) VALUES (?1, ?2, ?3)",
                    rusqlite::params![id, image_id.to_string(), position as i64],
                )?;
            }
            tx.commit()?;
            Ok(())
        })
    }

    pub fn get_listing(&self, id: &str) -> Result<Option<Listing>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM listings l LEFT JOIN users u ON u.id = l.owner_id WHERE l.id = ?1",
                LISTING_COLUMNS
            );
            let row = conn.query_row(&sql, [id], listing_row).optional()?;
            match row {
                Some(row) => Ok(attach_images(conn, vec![row])?.pop()),
                None => Ok(None),
            }
        })
    }

    /// Listing feed, newest first.
    pub fn list_listings(&self, filter: &ListingFilter) -> Result<Vec<Listing>> {
        self.with_conn(|conn| {
            let mut clauses: Vec<&str> = Vec::new();
            let mut params: Vec<String> = Vec::new();

            if let Some(foot) = filter.foot {
                params.push(foot.as_str().to_string());
                clauses.push("l.foot = ?");
            }
            if let Some(brand) = &filter.brand {
                params.push(brand.clone());
                clauses.push("l.brand = ?");
            }
            if let Some(size) = &filter.size {
                params.push(size.clone());
                clauses.push("l.size = ?");
            }
            if let Some(owner_id) = filter.owner_id {
                params.push(owner_id.to_string());
                clauses.push("l.owner_id = ?");
            }
            if let Some(before) = &filter.before {
                params.push(before.created_at.clone());
                match &before.id {
                    Some(id) => {
                        params.push(before.created_at.clone());
                        params.push(id.clone());
                        clauses.push(
                            "(l.created_at < ? OR (l.created_at = ?
                              AND l.rowid < (SELECT rowid FROM listings WHERE id = ?)))",
                        );
                    }
                    None => clauses.push("l.created_at < ?"),
                }
            }

            let where_sql = if clauses.is_empty() {
                String::new()
            } else {
                format!("WHERE {}", clauses.join(" AND "))
            };
            let sql = format!(
                "SELECT {} FROM listings l LEFT JOIN users u ON u.id = l.owner_id
                 {}
                 ORDER BY l.created_at DESC, l.rowid DESC
                 LIMIT {}",
                LISTING_COLUMNS, where_sql, filter.limit
            );

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(params.iter()), listing_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            attach_images(conn, rows)
        })
    }

    /// Listings with the same (foot, brand, size) owned by someone other than `exclude_owner`.
    pub fn find_listings_matching(&self, key: &MatchKey, exclude_owner: Uuid) -> Result<Vec<Listing>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM listings l LEFT JOIN users u ON u.id = l.owner_id
                 WHERE l.foot = ?1 AND l.brand = ?2 AND l.size = ?3 AND l.owner_id != ?4
                 ORDER BY l.created_at, l.rowid",
                LISTING_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(
                    rusqlite::params![
                        key.foot.as_str(),
                        key.brand,
                        key.size,
                        exclude_owner.to_string()
                    ],
                    listing_row,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            attach_images(conn, rows)
        })
    }

    /// Returns false if no listing had that id.
    pub fn delete_listing(&self, id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let deleted = conn.execute("DELETE FROM listings WHERE id = ?1", [id])?;
            Ok(deleted > 0)
        })
    }

    // -- Search requests --

    pub fn insert_request(&self, request: &SearchRequest) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO search_requests (id, owner_id, foot, brand, model, size, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    request.id.to_string(),
                    request.owner_id.to_string(),
                    request.foot.as_str(),
                    request.brand,
                    request.model,
                    request.size,
                    format_timestamp(request.created_at),
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_request(&self, id: &str) -> Result<Option<SearchRequest>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {} FROM search_requests WHERE id = ?1", REQUEST_COLUMNS);
            conn.query_row(&sql, [id], request_row)
                .optional()?
                .map(SearchRequestRow::into_request)
                .transpose()
        })
    }

    pub fn list_requests_by_owner(&self, owner_id: &str) -> Result<Vec<SearchRequest>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM search_requests WHERE owner_id = ?1
                 ORDER BY created_at DESC, rowid DESC",
                REQUEST_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([owner_id], request_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows.into_iter().map(SearchRequestRow::into_request).collect()
        })
    }

    /// Requests with the same (foot, brand, size) owned by someone other than `exclude_owner`.
    pub fn find_requests_matching(
        &self,
        key: &MatchKey,
        exclude_owner: Uuid,
    ) -> Result<Vec<SearchRequest>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM search_requests
                 WHERE foot = ?1 AND brand = ?2 AND size = ?3 AND owner_id != ?4
                 ORDER BY created_at, rowid",
                REQUEST_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(
                    rusqlite::params![
                        key.foot.as_str(),
                        key.brand,
                        key.size,
                        exclude_owner.to_string()
                    ],
                    request_row,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows.into_iter().map(SearchRequestRow::into_request).collect()
        })
    }

    pub fn delete_request(&self, id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let deleted = conn.execute("DELETE FROM search_requests WHERE id = ?1", [id])?;
            Ok(deleted > 0)
        })
    }

    // -- Notifications --

    pub fn insert_notification(&self, notification: &Notification) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO notifications (id, user_id, kind, message, source_type, source_id, read, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                rusqlite::params![
                    notification.id.to_string(),
                    notification.user_id.to_string(),
                    notification.kind.as_str(),
                    notification.message,
                    notification.source.kind_str(),
                    notification.source.id().to_string(),
                    notification.read,
                    format_timestamp(notification.created_at),
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_notification(&self, id: &str) -> Result<Option<Notification>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {} FROM notifications WHERE id = ?1", NOTIFICATION_COLUMNS);
            conn.query_row(&sql, [id], notification_row)
                .optional()?
                .map(NotificationRow::into_notification)
                .transpose()
        })
    }

    /// Newest first.
    pub fn list_notifications(
        &self,
        user_id: &str,
        unread_only: bool,
        limit: u32,
    ) -> Result<Vec<Notification>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM notifications
                 WHERE user_id = ?1 AND (?2 = 0 OR read = 0)
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT ?3",
                NOTIFICATION_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params![user_id, unread_only, limit], notification_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows.into_iter().map(NotificationRow::into_notification).collect()
        })
    }

    pub fn mark_notification_read(&self, id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute("UPDATE notifications SET read = 1 WHERE id = ?1", [id])?;
            Ok(changed > 0)
        })
    }

    /// Returns how many notifications flipped from unread to read.
    pub fn mark_all_notifications_read(&self, user_id: &str) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE notifications SET read = 1 WHERE user_id = ?1 AND read = 0",
                [user_id],
            )?;
            Ok(changed)
        })
    }

    // -- Conversations --

    /// Get or create the conversation between two users.
    /// Returns (conversation, created). `INSERT OR IGNORE` on the canonical id
    /// keeps creation idempotent under concurrent callers.
    pub fn open_conversation(
        &self,
        a: Uuid,
        b: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(Conversation, bool)> {
        let id = conversation_id(a, b);
        let (first, second) = if a <= b { (a, b) } else { (b, a) };

        self.with_conn_mut(|conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO conversations (id, participant_a, participant_b, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![id, first.to_string(), second.to_string(), format_timestamp(now)],
            )?;
            let conversation = query_conversation(conn, &id)?
                .ok_or_else(|| anyhow::anyhow!("conversation {} vanished after insert", id))?;
            Ok((conversation, inserted == 1))
        })
    }

    pub fn get_conversation(&self, id: &str) -> Result<Option<Conversation>> {
        self.with_conn(|conn| query_conversation(conn, id))
    }

    /// Most recently active first; conversations without messages last.
    pub fn list_conversations_for_user(&self, user_id: &str) -> Result<Vec<Conversation>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM conversations
                 WHERE participant_a = ?1 OR participant_b = ?1
                 ORDER BY last_message_at IS NULL, last_message_at DESC, created_at DESC",
                CONVERSATION_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([user_id], conversation_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows.into_iter().map(ConversationRow::into_conversation).collect()
        })
    }

    // -- Messages --

    /// Append a message and update the conversation preview atomically.
    /// Returns the updated conversation.
    pub fn insert_message(&self, message: &Message) -> Result<Conversation> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let created_at = format_timestamp(message.created_at);
            tx.execute(
                "INSERT INTO messages (id, conversation_id, sender_id, text, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    message.id.to_string(),
                    message.conversation_id,
                    message.sender_id.to_string(),
                    message.text,
                    created_at,
                ],
            )?;
            tx.execute(
                "UPDATE conversations SET last_message = ?2, last_message_at = ?3
                 WHERE id = ?1 AND (last_message_at IS NULL OR last_message_at <= ?3)",
                rusqlite::params![message.conversation_id, message.text, created_at],
            )?;
            let conversation = query_conversation(&tx, &message.conversation_id)?.ok_or_else(|| {
                anyhow::anyhow!("conversation {} not found", message.conversation_id)
            })?;
            tx.commit()?;
            Ok(conversation)
        })
    }

    /// Messages in ascending creation order. `before` pages backwards: the
    /// newest `limit` messages older than the cursor are returned.
    pub fn get_messages(
        &self,
        conversation_id: &str,
        limit: u32,
        before: Option<&Cursor>,
    ) -> Result<Vec<Message>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, conversation_id, sender_id, text, created_at
                 FROM messages
                 WHERE conversation_id = ?1
                   AND (?2 IS NULL
                        OR created_at < ?2
                        OR (created_at = ?2
                            AND rowid < (SELECT rowid FROM messages WHERE id = ?3)))
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT ?4",
            )?;
            let before_at = before.map(|c| c.created_at.as_str());
            let before_id = before.and_then(|c| c.id.as_deref());

            let mut rows = stmt
                .query_map(rusqlite::params![conversation_id, before_at, before_id, limit], |row| {
                    Ok(MessageRow {
                        id: row.get(0)?,
                        conversation_id: row.get(1)?,
                        sender_id: row.get(2)?,
                        text: row.get(3)?,
                        created_at: row.get(4)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            rows.reverse();
            rows.into_iter().map(MessageRow::into_message).collect()
        })
    }
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    let sql = format!(
        "SELECT id, email, password, display_name, photo_image_id, email_verified, created_at
         FROM users WHERE {} = ?1",
        column
    );
    let mut stmt = conn.prepare(&sql)?;

    let row = stmt
        .query_row([value], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                email: row.get(1)?,
                password: row.get(2)?,
                display_name: row.get(3)?,
                photo_image_id: row.get(4)?,
                email_verified: row.get(5)?,
                created_at: row.get(6)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn query_conversation(conn: &Connection, id: &str) -> Result<Option<Conversation>> {
    let sql = format!("SELECT {} FROM conversations WHERE id = ?1", CONVERSATION_COLUMNS);
    conn.query_row(&sql, [id], conversation_row)
        .optional()?
        .map(ConversationRow::into_conversation)
        .transpose()
}

fn listing_row(row: &Row<'_>) -> rusqlite::Result<ListingRow> {
    Ok(ListingRow {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        owner_display_name: row.get(2)?,
        foot: row.get(3)?,
        brand: row.get(4)?,
        model: row.get(5)?,
        size: row.get(6)?,
        condition: row.get(7)?,
        created_at: row.get(8)?,
        image_ids: Vec::new(),
    })
}

fn request_row(row: &Row<'_>) -> rusqlite::Result<SearchRequestRow> {
    Ok(SearchRequestRow {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        foot: row.get(2)?,
        brand: row.get(3)?,
        model: row.get(4)?,
        size: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn notification_row(row: &Row<'_>) -> rusqlite::Result<NotificationRow> {
    Ok(NotificationRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        kind: row.get(2)?,
        message: row.get(3)?,
        source_type: row.get(4)?,
        source_id: row.get(5)?,
        read: row.get(6)?,
        created_at: row.get(7)?,
    })
}

fn conversation_row(row: &Row<'_>) -> rusqlite::Result<ConversationRow> {
    Ok(ConversationRow {
        id: row.get(0)?,
        participant_a: row.get(1)?,
        participant_b: row.get(2)?,
        last_message: row.get(3)?,
        last_message_at: row.get(4)?,
        created_at: row.get(5)?,
    })
}

/// Batch-fetch image ids for a set of listings (eliminates N+1) and convert.
fn attach_images(conn: &Connection, mut rows: Vec<ListingRow>) -> Result<Vec<Listing>> {
    if !rows.is_empty() {
        let placeholders: Vec<String> = (1..=rows.len()).map(|i| format!("?{}", i)).collect();
        let sql = format!(
            "SELECT listing_id, image_id FROM listing_images
             WHERE listing_id IN ({})
             ORDER BY listing_id, position",
            placeholders.join(", ")
        );

        let mut stmt = conn.prepare(&sql)?;
        let links = stmt
            .query_map(
                rusqlite::params_from_iter(rows.iter().map(|r| r.id.as_str())),
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut by_listing: HashMap<String, Vec<String>> = HashMap::new();
        for (listing_id, image_id) in links {
            by_listing.entry(listing_id).or_default().push(image_id);
        }
        for row in &mut rows {
            if let Some(ids) = by_listing.remove(&row.id) {
                row.image_ids = ids;
            }
        }
    }

    rows.into_iter().map(ListingRow::into_listing).collect()
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
