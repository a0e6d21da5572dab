use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id              TEXT PRIMARY KEY,
                email           TEXT NOT NULL UNIQUE,
                password        TEXT NOT NULL,
                display_name    TEXT NOT NULL,
                photo_image_id  TEXT,
                created_at      TEXT NOT NULL
            );

            CREATE TABLE images (
                id              TEXT PRIMARY KEY,
                owner_id        TEXT NOT NULL REFERENCES users(id),
                content_type    TEXT NOT NULL,
                size            INTEGER NOT NULL,
                sha256          TEXT NOT NULL,
                created_at      TEXT NOT NULL
            );

            CREATE TABLE listings (
                id              TEXT PRIMARY KEY,
                owner_id        TEXT NOT NULL REFERENCES users(id),
                foot            TEXT NOT NULL,
                brand           TEXT NOT NULL,
                model           TEXT,
                size            TEXT NOT NULL,
                condition       TEXT NOT NULL,
                created_at      TEXT NOT NULL
            );

            CREATE INDEX idx_listings_match ON listings(foot, brand, size);
            CREATE INDEX idx_listings_owner ON listings(owner_id);
            CREATE INDEX idx_listings_created ON listings(created_at);

            CREATE TABLE listing_images (
                listing_id      TEXT NOT NULL REFERENCES listings(id) ON DELETE CASCADE,
                image_id        TEXT NOT NULL REFERENCES images(id),
                position        INTEGER NOT NULL,
                PRIMARY KEY (listing_id, position)
            );

            CREATE TABLE search_requests (
                id              TEXT PRIMARY KEY,
                owner_id        TEXT NOT NULL REFERENCES users(id),
                foot            TEXT NOT NULL,
                brand           TEXT NOT NULL,
                model           TEXT,
                size            TEXT NOT NULL,
                created_at      TEXT NOT NULL
            );

            CREATE INDEX idx_requests_match ON search_requests(foot, brand, size);
            CREATE INDEX idx_requests_owner ON search_requests(owner_id);

            CREATE TABLE notifications (
                id              TEXT PRIMARY KEY,
                user_id         TEXT NOT NULL REFERENCES users(id),
                kind            TEXT NOT NULL,
                message         TEXT NOT NULL,
                source_type     TEXT NOT NULL,
                source_id       TEXT NOT NULL,
                read            INTEGER NOT NULL DEFAULT 0,
                created_at      TEXT NOT NULL
            );

            CREATE INDEX idx_notifications_user ON notifications(user_id, created_at);

            CREATE TABLE conversations (
                id              TEXT PRIMARY KEY,
                participant_a   TEXT NOT NULL REFERENCES users(id),
                participant_b   TEXT NOT NULL REFERENCES users(id),
                last_message    TEXT,
                last_message_at TEXT,
                created_at      TEXT NOT NULL,
                CHECK (participant_a < participant_b)
            );

            CREATE INDEX idx_conversations_a ON conversations(participant_a);
            CREATE INDEX idx_conversations_b ON conversations(participant_b);

            CREATE TABLE messages (
                id              TEXT PRIMARY KEY,
                conversation_id TEXT NOT NULL REFERENCES conversations(id),
                sender_id       TEXT NOT NULL REFERENCES users(id),
                text            TEXT NOT NULL,
                created_at      TEXT NOT NULL
            );

            CREATE INDEX idx_messages_conversation ON messages(conversation_id, created_at);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    if version < 2 {
        info!("Running migration v2 (email verification)");
        conn.execute_batch(
            "
            ALTER TABLE users ADD COLUMN email_verified INTEGER NOT NULL DEFAULT 0;

            CREATE TABLE email_verifications (
                token_hash      TEXT PRIMARY KEY,
                user_id         TEXT NOT NULL REFERENCES users(id),
                expires_at      TEXT NOT NULL
            );

            CREATE INDEX idx_email_verifications_user ON email_verifications(user_id);

            INSERT INTO schema_version (version) VALUES (2);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
