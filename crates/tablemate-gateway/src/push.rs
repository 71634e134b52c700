use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Thin client for the push-notification provider. Delivery is best-effort
/// end to end: failures are logged and swallowed, never retried, and never
/// surfaced to the request that triggered the notification.
pub struct PushClient {
    http: reqwest::Client,
    endpoint: Option<String>,
    api_key: Option<String>,
}

#[derive(Serialize)]
struct PushRequest<'a> {
    tokens: &'a [String],
    title: &'a str,
    body: &'a str,
    data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct TokenOutcome {
    pub token: String,
    pub delivered: bool,
    /// Provider says the token is permanently dead (unregistered device).
    #[serde(default)]
    pub invalid: bool,
}

#[derive(Deserialize)]
struct PushResponse {
    results: Vec<TokenOutcome>,
}

impl PushClient {
    /// `endpoint == None` disables push entirely; every send is a no-op.
    pub fn new(endpoint: Option<String>, api_key: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint,
            api_key,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.endpoint.is_some()
    }

    /// Fire a notification at every token. Returns the tokens the provider
    /// reported permanently invalid so the caller can prune them; transport
    /// errors log and return nothing.
    pub async fn send(
        &self,
        tokens: &[String],
        title: &str,
        body: &str,
        data: serde_json::Value,
    ) -> Vec<String> {
        let Some(endpoint) = &self.endpoint else {
            return Vec::new();
        };
        if tokens.is_empty() {
            return Vec::new();
        }

        let mut request = self.http.post(endpoint).json(&PushRequest {
            tokens,
            title,
            body,
            data,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = match request.send().await {
            Ok(resp) => resp,
            Err(e) => {
                warn!("Push provider unreachable: {}", e);
                return Vec::new();
            }
        };

        if !response.status().is_success() {
            warn!("Push provider returned {}", response.status());
            return Vec::new();
        }

        match response.json::<PushResponse>().await {
            Ok(parsed) => {
                let delivered = parsed.results.iter().filter(|r| r.delivered).count();
                debug!("Push: {}/{} tokens delivered", delivered, tokens.len());
                parsed
                    .results
                    .into_iter()
                    .filter(|r| r.invalid)
                    .map(|r| r.token)
                    .collect()
            }
            Err(e) => {
                warn!("Push provider response unreadable: {}", e);
                Vec::new()
            }
        }
    }
}
