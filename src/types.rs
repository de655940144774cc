use serde::{Deserialize, Serialize};

/// Body of the refresh exchange request.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest<'a> {
    pub refresh_token: &'a str,
}

/// Body of a successful refresh exchange.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub access_token: String,
    pub refresh_token: String,
}

/// Error payload returned by the API, `status` arrives as a number or a string.
#[derive(Debug, Deserialize)]
pub struct ApiErrorResponse {
    pub message: String,
    #[serde(default)]
    pub status: Option<serde_json::Value>,
}

impl ApiErrorResponse {
    /// Extracts `message` from an error body, falling back to the raw text.
    pub fn message_or_body(body: &str) -> String {
        serde_json::from_str::<ApiErrorResponse>(body)
            .map(|parsed| parsed.message)
            .unwrap_or_else(|_| body.to_string())
    }
}
