use std::{env, fmt::Display, str::FromStr};

use tablemate_api::Windows;

/// All runtime configuration, from TABLEMATE_* env vars (a .env file is
/// honored). The presence windows live here instead of as scattered
/// literals at the call sites.
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: String,
    pub jwt_secret: String,
    pub windows: Windows,
    pub moderation_url: Option<String>,
    pub push_url: Option<String>,
    pub push_api_key: Option<String>,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let windows = Windows {
            checkin_cooldown_hours: parsed("TABLEMATE_CHECKIN_COOLDOWN_HOURS", 3)?,
            presence_window_hours: parsed("TABLEMATE_PRESENCE_WINDOW_HOURS", 4)?,
            active_lookup_window_hours: parsed("TABLEMATE_ACTIVE_LOOKUP_HOURS", 12)?,
            discovery_window_days: parsed("TABLEMATE_DISCOVERY_WINDOW_DAYS", 30)?,
            discovery_limit: parsed("TABLEMATE_DISCOVERY_LIMIT", 20)?,
            diner_limit: parsed("TABLEMATE_DINER_LIMIT", 50)?,
        };

        Ok(Self {
            host: var_or("TABLEMATE_HOST", "0.0.0.0"),
            port: parsed("TABLEMATE_PORT", 3000)?,
            db_path: var_or("TABLEMATE_DB_PATH", "tablemate.db"),
            jwt_secret: var_or("TABLEMATE_JWT_SECRET", "dev-secret-change-me"),
            windows,
            moderation_url: env::var("TABLEMATE_MODERATION_URL").ok(),
            push_url: env::var("TABLEMATE_PUSH_URL").ok(),
            push_api_key: env::var("TABLEMATE_PUSH_API_KEY").ok(),
        })
    }
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parsed<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid {}: {}", key, e)),
        Err(_) => Ok(default),
    }
}
