use anyhow::Result;

use crate::Database;
use crate::models::DeviceTokenRow;

impl Database {
    /// Register (or re-point) a device token. A token handed to a new
    /// account moves with it.
    pub fn upsert_device(&self, token: &str, user_id: &str, platform: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO device_tokens (token, user_id, platform)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(token) DO UPDATE SET
                     user_id = excluded.user_id,
                     platform = excluded.platform",
                (token, user_id, platform),
            )?;
            Ok(())
        })
    }

    /// Owner-scoped unregister.
    pub fn delete_device(&self, token: &str, user_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let affected = conn.execute(
                "DELETE FROM device_tokens WHERE token = ?1 AND user_id = ?2",
                (token, user_id),
            )?;
            Ok(affected > 0)
        })
    }

    pub fn tokens_for_user(&self, user_id: &str) -> Result<Vec<DeviceTokenRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT token, user_id, platform FROM device_tokens WHERE user_id = ?1",
            )?;
            let rows = stmt
                .query_map([user_id], |row| {
                    Ok(DeviceTokenRow {
                        token: row.get(0)?,
                        user_id: row.get(1)?,
                        platform: row.get(2)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Drop tokens the push provider reported as permanently invalid.
    pub fn prune_tokens(&self, tokens: &[String]) -> Result<usize> {
        if tokens.is_empty() {
            return Ok(0);
        }
        self.with_conn(|conn| {
            let mut pruned = 0;
            for token in tokens {
                pruned += conn.execute("DELETE FROM device_tokens WHERE token = ?1", [token])?;
            }
            Ok(pruned)
        })
    }
}
