use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id                      TEXT PRIMARY KEY,
            username                TEXT NOT NULL UNIQUE,
            password                TEXT NOT NULL,
            conversation_preference TEXT NOT NULL DEFAULT '',
            dietary_tags            TEXT NOT NULL DEFAULT '[]',
            occupation              TEXT,
            photo_verified          INTEGER NOT NULL DEFAULT 0,
            social_verified         INTEGER NOT NULL DEFAULT 0,
            created_at              TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS restaurants (
            id          TEXT PRIMARY KEY,
            name        TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS checkins (
            id              TEXT PRIMARY KEY,
            user_id         TEXT NOT NULL REFERENCES users(id),
            restaurant_id   TEXT NOT NULL REFERENCES restaurants(id),
            party_size      INTEGER NOT NULL,
            notes           TEXT,
            active          INTEGER NOT NULL DEFAULT 1,
            created_at      TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- One active dining session per user, enforced by the engine.
        CREATE UNIQUE INDEX IF NOT EXISTS idx_checkins_one_active
            ON checkins(user_id) WHERE active = 1;

        CREATE INDEX IF NOT EXISTS idx_checkins_restaurant
            ON checkins(restaurant_id, created_at);

        CREATE TABLE IF NOT EXISTS matches (
            id              TEXT PRIMARY KEY,
            requester_id    TEXT NOT NULL REFERENCES users(id),
            receiver_id     TEXT NOT NULL REFERENCES users(id),
            restaurant_id   TEXT NOT NULL REFERENCES restaurants(id),
            user_low        TEXT NOT NULL,
            user_high       TEXT NOT NULL,
            status          TEXT NOT NULL DEFAULT 'pending'
                            CHECK (status IN ('pending','accepted','rejected','completed')),
            created_at      TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at      TEXT NOT NULL DEFAULT (datetime('now')),
            -- user_low/user_high are the normalized unordered pair; the
            -- unique index closes the concurrent-request race.
            UNIQUE (user_low, user_high, restaurant_id)
        );

        CREATE INDEX IF NOT EXISTS idx_matches_receiver
            ON matches(receiver_id, status);

        CREATE TABLE IF NOT EXISTS conversations (
            id          TEXT PRIMARY KEY,
            match_id    TEXT NOT NULL UNIQUE REFERENCES matches(id) ON DELETE CASCADE,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS messages (
            id              TEXT PRIMARY KEY,
            conversation_id TEXT NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
            match_id        TEXT NOT NULL REFERENCES matches(id) ON DELETE CASCADE,
            sender_id       TEXT NOT NULL REFERENCES users(id),
            text            TEXT NOT NULL,
            is_read         INTEGER NOT NULL DEFAULT 0,
            created_at      TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_messages_match
            ON messages(match_id, created_at);

        CREATE TABLE IF NOT EXISTS ratings (
            id          TEXT PRIMARY KEY,
            match_id    TEXT NOT NULL REFERENCES matches(id) ON DELETE CASCADE,
            rater_id    TEXT NOT NULL REFERENCES users(id),
            score       INTEGER NOT NULL,
            comment     TEXT,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS device_tokens (
            token       TEXT PRIMARY KEY,
            user_id     TEXT NOT NULL REFERENCES users(id),
            platform    TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_device_tokens_user
            ON device_tokens(user_id);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
