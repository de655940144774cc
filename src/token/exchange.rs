use reqwest::Client;
use tracing::{debug, error};

use crate::errors::RefreshError;
use crate::types::{RefreshRequest, RefreshResponse};

use super::CredentialPair;

/// Performs the refresh-token grant against the fixed refresh endpoint.
///
/// Requests sent from here are never decorated and never routed back through
/// the refresh coordinator.
#[derive(Clone)]
pub struct RefreshExchange {
    http_client: Client,
    url: String,
}

impl RefreshExchange {
    pub fn new(http_client: Client, url: impl Into<String>) -> Self {
        Self {
            http_client,
            url: url.into(),
        }
    }

    pub async fn exchange(&self, refresh_token: &str) -> Result<CredentialPair, RefreshError> {
        let resp = self
            .http_client
            .post(&self.url)
            .json(&RefreshRequest { refresh_token })
            .send()
            .await
            .map_err(|e| RefreshError::Transport(e.to_string()))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| RefreshError::Transport(e.to_string()))?;
        if !status.is_success() {
            error!(status = %status, url = %self.url, "refresh exchange rejected");
            return Err(RefreshError::Rejected { status, body });
        }

        let parsed: RefreshResponse =
            serde_json::from_str(&body).map_err(|e| RefreshError::Malformed(e.to_string()))?;
        if parsed.access_token.is_empty() {
            return Err(RefreshError::Malformed("empty accessToken".into()));
        }
        debug!(
            access_token_len = parsed.access_token.len(),
            "refresh exchange accepted"
        );
        Ok(parsed.into())
    }
}
