use anyhow::Result;

use crate::models::{ConversationRow, MessageRow};
use crate::{Database, OptionalExt, is_constraint_violation};

impl Database {
    /// Conversations are created lazily on first message; UNIQUE(match_id)
    /// plus the conflict re-read keep concurrent first-senders converging on
    /// one row.
    pub fn get_or_create_conversation(&self, match_id: &str) -> Result<ConversationRow> {
        self.with_conn(|conn| {
            let existing = conn
                .prepare("SELECT id, match_id FROM conversations WHERE match_id = ?1")?
                .query_row([match_id], conversation_from_row)
                .optional()?;
            if let Some(row) = existing {
                return Ok(row);
            }

            let id = uuid::Uuid::new_v4().to_string();
            let inserted = conn.execute(
                "INSERT INTO conversations (id, match_id) VALUES (?1, ?2)",
                (&id, match_id),
            );
            match inserted {
                Ok(_) => {}
                Err(e) if is_constraint_violation(&e) => {}
                Err(e) => return Err(e.into()),
            }

            conn.prepare("SELECT id, match_id FROM conversations WHERE match_id = ?1")?
                .query_row([match_id], conversation_from_row)
                .optional()?
                .ok_or_else(|| anyhow::anyhow!("conversation missing for match {}", match_id))
        })
    }

    pub fn insert_message(
        &self,
        id: &str,
        conversation_id: &str,
        match_id: &str,
        sender_id: &str,
        text: &str,
    ) -> Result<MessageRow> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (id, conversation_id, match_id, sender_id, text)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![id, conversation_id, match_id, sender_id, text],
            )?;

            conn.prepare(
                "SELECT id, conversation_id, match_id, sender_id, text, is_read, created_at
                 FROM messages WHERE id = ?1",
            )?
            .query_row([id], message_from_row)
            .optional()?
            .ok_or_else(|| anyhow::anyhow!("message {} missing after insert", id))
        })
    }

    /// Full thread, ascending by time.
    pub fn messages_for_match(&self, match_id: &str) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, conversation_id, match_id, sender_id, text, is_read, created_at
                 FROM messages
                 WHERE match_id = ?1
                 ORDER BY created_at ASC, rowid ASC",
            )?;
            let rows = stmt
                .query_map([match_id], message_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Bulk read receipt: every unread message in the thread not sent by
    /// the reader flips to read. Returns how many flipped.
    pub fn mark_messages_read(&self, match_id: &str, reader_id: &str) -> Result<usize> {
        self.with_conn(|conn| {
            let affected = conn.execute(
                "UPDATE messages SET is_read = 1
                 WHERE match_id = ?1 AND sender_id != ?2 AND is_read = 0",
                (match_id, reader_id),
            )?;
            Ok(affected)
        })
    }
}

fn conversation_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ConversationRow> {
    Ok(ConversationRow {
        id: row.get(0)?,
        match_id: row.get(1)?,
    })
}

fn message_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        match_id: row.get(2)?,
        sender_id: row.get(3)?,
        text: row.get(4)?,
        is_read: row.get(5)?,
        created_at: row.get(6)?,
    })
}
