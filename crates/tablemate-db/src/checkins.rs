use anyhow::Result;
use rusqlite::Transaction;

use crate::models::{CheckInRow, ProfileRow};
use crate::users::profile_from_row;
use crate::util::{cutoff_days, cutoff_hours};
use crate::{Database, OptionalExt, is_constraint_violation};

impl Database {
    /// Start a dining session. Returns `Ok(None)` when the user already has
    /// an active check-in at this restaurant inside the cooldown window (or
    /// lost the insert race); otherwise deactivates every other session for
    /// the user and inserts the new row, all in one transaction.
    pub fn create_check_in(
        &self,
        id: &str,
        user_id: &str,
        restaurant_id: &str,
        party_size: u32,
        notes: Option<&str>,
        cooldown_hours: i64,
    ) -> Result<Option<CheckInRow>> {
        self.with_tx(|tx| {
            let duplicate: Option<String> = tx
                .query_row(
                    "SELECT id FROM checkins
                     WHERE user_id = ?1 AND restaurant_id = ?2 AND active = 1
                       AND created_at >= ?3",
                    rusqlite::params![user_id, restaurant_id, cutoff_hours(cooldown_hours)],
                    |row| row.get(0),
                )
                .optional()?;
            if duplicate.is_some() {
                return Ok(None);
            }

            // Single-location invariant: a new session ends all others.
            tx.execute(
                "UPDATE checkins SET active = 0 WHERE user_id = ?1 AND active = 1",
                [user_id],
            )?;

            let inserted = tx.execute(
                "INSERT INTO checkins (id, user_id, restaurant_id, party_size, notes)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![id, user_id, restaurant_id, party_size, notes],
            );
            match inserted {
                Ok(_) => {}
                Err(e) if is_constraint_violation(&e) => return Ok(None),
                Err(e) => return Err(e.into()),
            }

            let row = query_check_in(tx, id)?
                .ok_or_else(|| anyhow::anyhow!("check-in {} missing after insert", id))?;
            Ok(Some(row))
        })
    }

    /// Other users' sessions at a restaurant inside the trailing window,
    /// newest first, joined with the profile slice the scorer needs. The
    /// caller re-sorts by compatibility, not recency.
    pub fn active_diners_at(
        &self,
        restaurant_id: &str,
        excluding_user_id: &str,
        window_hours: i64,
        limit: u32,
    ) -> Result<Vec<(CheckInRow, ProfileRow)>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT c.id, c.user_id, c.restaurant_id, c.party_size, c.notes, c.active, c.created_at,
                        u.id, u.username, u.conversation_preference, u.dietary_tags, u.occupation,
                        u.photo_verified, u.social_verified
                 FROM checkins c
                 JOIN users u ON u.id = c.user_id
                 WHERE c.restaurant_id = ?1 AND c.user_id != ?2 AND c.active = 1
                   AND c.created_at >= ?3
                 ORDER BY c.created_at DESC
                 LIMIT ?4",
            )?;

            let rows = stmt
                .query_map(
                    rusqlite::params![
                        restaurant_id,
                        excluding_user_id,
                        cutoff_hours(window_hours),
                        limit
                    ],
                    |row| {
                        let check_in = CheckInRow {
                            id: row.get(0)?,
                            user_id: row.get(1)?,
                            restaurant_id: row.get(2)?,
                            party_size: row.get(3)?,
                            notes: row.get(4)?,
                            active: row.get(5)?,
                            created_at: row.get(6)?,
                        };
                        let profile = ProfileRow {
                            user_id: row.get(7)?,
                            username: row.get(8)?,
                            conversation_preference: row.get(9)?,
                            dietary_tags: row.get(10)?,
                            occupation: row.get(11)?,
                            photo_verified: row.get(12)?,
                            social_verified: row.get(13)?,
                        };
                        Ok((check_in, profile))
                    },
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    pub fn active_check_in(
        &self,
        user_id: &str,
        restaurant_id: &str,
        window_hours: i64,
    ) -> Result<Option<CheckInRow>> {
        self.with_conn(|conn| {
            conn.prepare(
                "SELECT id, user_id, restaurant_id, party_size, notes, active, created_at
                 FROM checkins
                 WHERE user_id = ?1 AND restaurant_id = ?2 AND active = 1
                   AND created_at >= ?3
                 ORDER BY created_at DESC
                 LIMIT 1",
            )?
            .query_row(
                rusqlite::params![user_id, restaurant_id, cutoff_hours(window_hours)],
                check_in_from_row,
            )
            .optional()
        })
    }

    /// Owner-only hard delete. Returns false when the row is missing or
    /// belongs to someone else.
    pub fn delete_check_in(&self, check_in_id: &str, owner_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let affected = conn.execute(
                "DELETE FROM checkins WHERE id = ?1 AND user_id = ?2",
                (check_in_id, owner_id),
            )?;
            Ok(affected > 0)
        })
    }

    pub fn get_check_in(&self, id: &str) -> Result<Option<CheckInRow>> {
        self.with_conn(|conn| {
            conn.prepare(
                "SELECT id, user_id, restaurant_id, party_size, notes, active, created_at
                 FROM checkins WHERE id = ?1",
            )?
            .query_row([id], check_in_from_row)
            .optional()
        })
    }

    /// Distinct restaurants the user checked in at over the trailing window,
    /// most recent first. Feeds the discovery scorer's shared-history signal.
    pub fn recent_restaurants_for(
        &self,
        user_id: &str,
        window_days: i64,
    ) -> Result<Vec<(String, String)>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT r.id, r.name, MAX(c.created_at) AS last_visit
                 FROM checkins c
                 JOIN restaurants r ON r.id = c.restaurant_id
                 WHERE c.user_id = ?1 AND c.created_at >= ?2
                 GROUP BY r.id, r.name
                 ORDER BY last_visit DESC",
            )?;
            let rows = stmt
                .query_map(
                    rusqlite::params![user_id, cutoff_days(window_days)],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Distinct users with any check-in inside the trailing window,
    /// excluding the caller, ordered by their latest check-in. The
    /// discovery candidate pool.
    pub fn recent_diners(
        &self,
        excluding_user_id: &str,
        window_days: i64,
    ) -> Result<Vec<ProfileRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT u.id, u.username, u.conversation_preference, u.dietary_tags, u.occupation,
                        u.photo_verified, u.social_verified
                 FROM users u
                 JOIN checkins c ON c.user_id = u.id
                 WHERE u.id != ?1 AND c.created_at >= ?2
                 GROUP BY u.id
                 ORDER BY MAX(c.created_at) DESC",
            )?;
            let rows = stmt
                .query_map(
                    rusqlite::params![excluding_user_id, cutoff_days(window_days)],
                    profile_from_row,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

pub(crate) fn check_in_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<CheckInRow> {
    Ok(CheckInRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        restaurant_id: row.get(2)?,
        party_size: row.get(3)?,
        notes: row.get(4)?,
        active: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn query_check_in(tx: &Transaction, id: &str) -> Result<Option<CheckInRow>> {
    tx.prepare(
        "SELECT id, user_id, restaurant_id, party_size, notes, active, created_at
         FROM checkins WHERE id = ?1",
    )?
    .query_row([id], check_in_from_row)
    .optional()
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn seed(db: &Database) -> (String, String, String) {
        let user_a = Uuid::new_v4().to_string();
        let user_b = Uuid::new_v4().to_string();
        let restaurant = Uuid::new_v4().to_string();
        db.create_user(&user_a, "ada", "hash", "deep talks", "[\"vegan\"]", None)
            .unwrap();
        db.create_user(&user_b, "brin", "hash", "deep talks", "[\"vegan\"]", None)
            .unwrap();
        db.create_restaurant(&restaurant, "Osteria").unwrap();
        (user_a, user_b, restaurant)
    }

    #[test]
    fn at_most_one_active_check_in_per_user() {
        let db = Database::open_in_memory().unwrap();
        let (user, _, restaurant) = seed(&db);
        let other = Uuid::new_v4().to_string();
        db.create_restaurant(&other, "Quince").unwrap();

        db.create_check_in(&Uuid::new_v4().to_string(), &user, &restaurant, 2, None, 3)
            .unwrap()
            .unwrap();
        db.create_check_in(&Uuid::new_v4().to_string(), &user, &other, 4, None, 3)
            .unwrap()
            .unwrap();

        let active: i64 = db
            .with_conn(|conn| {
                Ok(conn.query_row(
                    "SELECT COUNT(*) FROM checkins WHERE user_id = ?1 AND active = 1",
                    [&user],
                    |row| row.get(0),
                )?)
            })
            .unwrap();
        assert_eq!(active, 1);
    }

    #[test]
    fn cooldown_rejects_same_restaurant() {
        let db = Database::open_in_memory().unwrap();
        let (user, _, restaurant) = seed(&db);

        db.create_check_in(&Uuid::new_v4().to_string(), &user, &restaurant, 2, None, 3)
            .unwrap()
            .unwrap();
        let second =
            db.create_check_in(&Uuid::new_v4().to_string(), &user, &restaurant, 2, None, 3);
        assert!(second.unwrap().is_none());
    }

    #[test]
    fn active_diners_excludes_caller_and_joins_profile() {
        let db = Database::open_in_memory().unwrap();
        let (user_a, user_b, restaurant) = seed(&db);

        db.create_check_in(&Uuid::new_v4().to_string(), &user_a, &restaurant, 2, None, 3)
            .unwrap()
            .unwrap();
        db.create_check_in(&Uuid::new_v4().to_string(), &user_b, &restaurant, 3, None, 3)
            .unwrap()
            .unwrap();

        let diners = db.active_diners_at(&restaurant, &user_b, 4, 50).unwrap();
        assert_eq!(diners.len(), 1);
        assert_eq!(diners[0].1.username, "ada");
        assert_eq!(diners[0].1.tags(), vec!["vegan".to_string()]);
    }

    #[test]
    fn delete_is_owner_only() {
        let db = Database::open_in_memory().unwrap();
        let (user_a, user_b, restaurant) = seed(&db);
        let id = Uuid::new_v4().to_string();
        db.create_check_in(&id, &user_a, &restaurant, 2, None, 3)
            .unwrap()
            .unwrap();

        assert!(!db.delete_check_in(&id, &user_b).unwrap());
        assert!(db.delete_check_in(&id, &user_a).unwrap());
    }

    #[test]
    fn recent_diners_skips_the_caller() {
        let db = Database::open_in_memory().unwrap();
        let (user_a, user_b, restaurant) = seed(&db);
        db.create_check_in(&Uuid::new_v4().to_string(), &user_a, &restaurant, 2, None, 3)
            .unwrap()
            .unwrap();
        db.create_check_in(&Uuid::new_v4().to_string(), &user_b, &restaurant, 2, None, 3)
            .unwrap()
            .unwrap();

        let pool = db.recent_diners(&user_a, 30).unwrap();
        assert_eq!(pool.len(), 1);
        assert_eq!(pool[0].username, "brin");
    }
}
