use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Client for the external moderation collaborator. When no endpoint is
/// configured, a local denylist stands in so the gate still functions in
/// dev deployments; an empty denylist allows everything.
pub struct ModerationClient {
    http: reqwest::Client,
    endpoint: Option<String>,
    denylist: Vec<String>,
}

#[derive(Serialize)]
struct ModerationRequest<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct ModerationResponse {
    allowed: bool,
}

impl ModerationClient {
    pub fn new(endpoint: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint,
            denylist: Vec::new(),
        }
    }

    pub fn with_denylist(words: Vec<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: None,
            denylist: words,
        }
    }

    /// True = allowed. A remote moderator outage is an error, not a pass:
    /// the gate sits on the primary message path.
    pub async fn moderate(&self, text: &str) -> Result<bool> {
        if let Some(endpoint) = &self.endpoint {
            let response = self
                .http
                .post(endpoint)
                .json(&ModerationRequest { text })
                .send()
                .await
                .context("moderation service unreachable")?
                .error_for_status()
                .context("moderation service error")?
                .json::<ModerationResponse>()
                .await
                .context("moderation response unreadable")?;
            return Ok(response.allowed);
        }

        let lowered = text.to_lowercase();
        Ok(!self.denylist.iter().any(|word| lowered.contains(word)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_denylist_allows_everything() {
        let gate = ModerationClient::new(None);
        assert!(gate.moderate("see you at seven").await.unwrap());
    }

    #[tokio::test]
    async fn denylist_match_is_case_insensitive() {
        let gate = ModerationClient::with_denylist(vec!["spam".into()]);
        assert!(!gate.moderate("Free SPAM inside").await.unwrap());
        assert!(gate.moderate("sausage is fine").await.unwrap());
    }
}
