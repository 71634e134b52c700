use anyhow::Result;
use rusqlite::Connection;

use crate::models::{ProfileRow, UserRow};
use crate::{Database, OptionalExt};

impl Database {
    pub fn create_user(
        &self,
        id: &str,
        username: &str,
        password_hash: &str,
        conversation_preference: &str,
        dietary_tags_json: &str,
        occupation: Option<&str>,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, username, password, conversation_preference, dietary_tags, occupation)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    id,
                    username,
                    password_hash,
                    conversation_preference,
                    dietary_tags_json,
                    occupation
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "username", username))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    pub fn get_profile(&self, user_id: &str) -> Result<Option<ProfileRow>> {
        self.with_conn(|conn| {
            conn.prepare(
                "SELECT id, username, conversation_preference, dietary_tags, occupation,
                        photo_verified, social_verified
                 FROM users WHERE id = ?1",
            )?
            .query_row([user_id], profile_from_row)
            .optional()
        })
    }

    /// Verification flags are owned by the profile subsystem; this setter
    /// exists for its writes and for tests.
    pub fn set_verification(&self, user_id: &str, photo: bool, social: bool) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET photo_verified = ?2, social_verified = ?3 WHERE id = ?1",
                rusqlite::params![user_id, photo, social],
            )?;
            Ok(())
        })
    }
}

pub(crate) fn profile_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ProfileRow> {
    Ok(ProfileRow {
        user_id: row.get(0)?,
        username: row.get(1)?,
        conversation_preference: row.get(2)?,
        dietary_tags: row.get(3)?,
        occupation: row.get(4)?,
        photo_verified: row.get(5)?,
        social_verified: row.get(6)?,
    })
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    let sql = format!(
        "SELECT id, username, password, conversation_preference, dietary_tags, occupation,
                photo_verified, social_verified, created_at
         FROM users WHERE {} = ?1",
        column
    );
    conn.prepare(&sql)?
        .query_row([value], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                username: row.get(1)?,
                password: row.get(2)?,
                conversation_preference: row.get(3)?,
                dietary_tags: row.get(4)?,
                occupation: row.get(5)?,
                photo_verified: row.get(6)?,
                social_verified: row.get(7)?,
                created_at: row.get(8)?,
            })
        })
        .optional()
}
