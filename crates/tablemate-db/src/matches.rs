use anyhow::Result;
use rusqlite::Connection;

use crate::models::MatchRow;
use crate::{Database, OptionalExt, is_constraint_violation};

impl Database {
    /// Create a pending match request. Returns `Ok(None)` when the
    /// unordered pair already has a match at this restaurant in any status;
    /// the UNIQUE(user_low, user_high, restaurant_id) index makes the check
    /// race-proof.
    pub fn create_match(
        &self,
        id: &str,
        requester_id: &str,
        receiver_id: &str,
        restaurant_id: &str,
    ) -> Result<Option<MatchRow>> {
        let (low, high) = if requester_id <= receiver_id {
            (requester_id, receiver_id)
        } else {
            (receiver_id, requester_id)
        };

        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT INTO matches (id, requester_id, receiver_id, restaurant_id, user_low, user_high)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![id, requester_id, receiver_id, restaurant_id, low, high],
            );
            match inserted {
                Ok(_) => {}
                Err(e) if is_constraint_violation(&e) => return Ok(None),
                Err(e) => return Err(e.into()),
            }

            query_match(conn, id)
        })
    }

    pub fn get_match(&self, id: &str) -> Result<Option<MatchRow>> {
        self.with_conn(|conn| query_match(conn, id))
    }

    pub fn update_match_status(&self, id: &str, status: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE matches SET status = ?2, updated_at = datetime('now') WHERE id = ?1",
                (id, status),
            )?;
            Ok(())
        })
    }

    /// Hard delete. Messages, the conversation, and ratings go with it via
    /// ON DELETE CASCADE. Destructive and irreversible.
    pub fn delete_match(&self, id: &str) -> Result<bool> {
        self.with_tx(|tx| {
            let affected = tx.execute("DELETE FROM matches WHERE id = ?1", [id])?;
            Ok(affected > 0)
        })
    }

    /// All of a user's matches, newest first. The caller re-ranks by
    /// compatibility.
    pub fn matches_for_user(&self, user_id: &str) -> Result<Vec<MatchRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, requester_id, receiver_id, restaurant_id, status, created_at, updated_at
                 FROM matches
                 WHERE requester_id = ?1 OR receiver_id = ?1
                 ORDER BY created_at DESC",
            )?;
            let rows = stmt
                .query_map([user_id], match_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Incoming requests awaiting this user's decision, newest first.
    pub fn pending_received(&self, user_id: &str) -> Result<Vec<MatchRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, requester_id, receiver_id, restaurant_id, status, created_at, updated_at
                 FROM matches
                 WHERE receiver_id = ?1 AND status = 'pending'
                 ORDER BY created_at DESC",
            )?;
            let rows = stmt
                .query_map([user_id], match_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Counterpart ids of every match the user participates in with status
    /// pending, accepted, or rejected. Discovery excludes these pairs.
    pub fn matched_counterparts(&self, user_id: &str) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT CASE WHEN requester_id = ?1 THEN receiver_id ELSE requester_id END
                 FROM matches
                 WHERE (requester_id = ?1 OR receiver_id = ?1)
                   AND status IN ('pending', 'accepted', 'rejected')",
            )?;
            let rows = stmt
                .query_map([user_id], |row| row.get(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Ratings (owned externally; carried for the delete cascade) --

    pub fn add_rating(
        &self,
        id: &str,
        match_id: &str,
        rater_id: &str,
        score: u32,
        comment: Option<&str>,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO ratings (id, match_id, rater_id, score, comment)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![id, match_id, rater_id, score, comment],
            )?;
            Ok(())
        })
    }

    pub fn count_ratings(&self, match_id: &str) -> Result<i64> {
        self.with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT COUNT(*) FROM ratings WHERE match_id = ?1",
                [match_id],
                |row| row.get(0),
            )?)
        })
    }
}

fn match_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MatchRow> {
    Ok(MatchRow {
        id: row.get(0)?,
        requester_id: row.get(1)?,
        receiver_id: row.get(2)?,
        restaurant_id: row.get(3)?,
        status: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

fn query_match(conn: &Connection, id: &str) -> Result<Option<MatchRow>> {
    conn.prepare(
        "SELECT id, requester_id, receiver_id, restaurant_id, status, created_at, updated_at
         FROM matches WHERE id = ?1",
    )?
    .query_row([id], match_from_row)
    .optional()
}
