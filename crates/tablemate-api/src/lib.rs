pub mod auth;
pub mod checkins;
pub mod devices;
pub mod error;
pub mod matches;
pub mod messages;
pub mod middleware;
pub mod moderation;
pub mod notify;

#[cfg(test)]
pub(crate) mod tests_support;

use error::ApiError;

/// Trailing-window and limit configuration, injected once instead of
/// living as scattered literals at the call sites.
#[derive(Debug, Clone)]
pub struct Windows {
    /// Same user + same restaurant re-check-in rejection window.
    pub checkin_cooldown_hours: i64,
    /// How far back "who's dining here" looks.
    pub presence_window_hours: i64,
    /// How far back the am-I-checked-in lookup looks.
    pub active_lookup_window_hours: i64,
    /// Discovery candidate pool: users seen dining within this many days.
    pub discovery_window_days: i64,
    /// Discovery results cap, applied after scoring.
    pub discovery_limit: usize,
    /// Active-diner listing cap.
    pub diner_limit: u32,
}

impl Default for Windows {
    fn default() -> Self {
        Self {
            checkin_cooldown_hours: 3,
            presence_window_hours: 4,
            active_lookup_window_hours: 12,
            discovery_window_days: 30,
            discovery_limit: 20,
            diner_limit: 50,
        }
    }
}

/// Run blocking store access off the async runtime (every handler's DB
/// work goes through here).
pub(crate) async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("spawn_blocking join error: {}", e)))?
        .map_err(ApiError::from)
}
