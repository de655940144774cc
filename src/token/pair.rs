use std::fmt;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use crate::types::RefreshResponse;

/// Access/refresh credentials that are always stored and replaced together.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialPair {
    access_token: String,
    refresh_token: String,
    obtained_at: Timestamp,
}

impl CredentialPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            obtained_at: Timestamp::now(),
        }
    }

    /// Returns the raw access token suitable for Authorization headers.
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn refresh_token(&self) -> &str {
        &self.refresh_token
    }

    pub fn obtained_at(&self) -> Timestamp {
        self.obtained_at
    }
}

impl From<RefreshResponse> for CredentialPair {
    fn from(resp: RefreshResponse) -> Self {
        Self::new(resp.access_token, resp.refresh_token)
    }
}

impl fmt::Debug for CredentialPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialPair")
            .field("access_token_len", &self.access_token.len())
            .field("refresh_token_len", &self.refresh_token.len())
            .field("obtained_at", &self.obtained_at)
            .finish()
    }
}
