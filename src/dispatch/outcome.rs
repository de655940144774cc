use std::time::Duration;

use reqwest::Method;
use tracing::Level;
use tracing::event;

/// Summary of one logical request, including its replay if there was one.
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    pub method: Method,
    pub url: String,
    pub attempts: u8,
    pub refreshed: bool,
    pub status: Option<u16>,
    pub success: bool,
    pub total_elapsed: Duration,
}

impl DispatchOutcome {
    pub fn log(&self) {
        event!(
            Level::INFO,
            method = %self.method,
            url = %self.url,
            attempts = self.attempts,
            refreshed = self.refreshed,
            status = self.status,
            success = self.success,
            total_elapsed_ms = self.total_elapsed.as_millis() as u64,
            "dispatch.outcome"
        );
    }
}
