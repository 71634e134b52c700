use anyhow::Result;

use crate::models::RestaurantRow;
use crate::{Database, OptionalExt};

impl Database {
    pub fn create_restaurant(&self, id: &str, name: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO restaurants (id, name) VALUES (?1, ?2)",
                (id, name),
            )?;
            Ok(())
        })
    }

    pub fn get_restaurant(&self, id: &str) -> Result<Option<RestaurantRow>> {
        self.with_conn(|conn| {
            conn.prepare("SELECT id, name, created_at FROM restaurants WHERE id = ?1")?
                .query_row([id], |row| {
                    Ok(RestaurantRow {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        created_at: row.get(2)?,
                    })
                })
                .optional()
        })
    }

    pub fn get_restaurant_name(&self, id: &str) -> Result<Option<String>> {
        self.with_conn(|conn| {
            conn.query_row("SELECT name FROM restaurants WHERE id = ?1", [id], |row| {
                row.get(0)
            })
            .optional()
        })
    }
}
