use std::sync::Arc;

use reqwest::{Client, Method, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::{Config, ConfigLocation, read_config};
use crate::dispatch::{DispatchOutcome, PendingRequest};
use crate::errors::Error;
use crate::session::SessionTerminator;
use crate::token::{CredentialStore, RefreshCoordinator, RefreshExchange};
use crate::types::ApiErrorResponse;

/// HTTP client that attaches the stored access token and recovers from `401`s.
///
/// Every request gets at most one replay. A `401` on the first attempt sends
/// the caller through the [`RefreshCoordinator`], and the request is sent
/// again with whatever token the refresh cycle produced. A `401` on the
/// replay is returned as [`Error::Auth`].
#[derive(Clone)]
pub struct AuthClient {
    http_client: Client,
    base_url: String,
    coordinator: Arc<RefreshCoordinator>,
    exchange: RefreshExchange,
}

impl AuthClient {
    /// Create a new AuthClient
    /// # Arguments
    /// * `config` - Base URL, refresh endpoint and timeouts
    /// * `store` - Where the access and refresh tokens are read from and saved to
    /// * `terminator` - Notified once whenever a refresh cycle fails
    pub fn new(
        config: &Config,
        store: Arc<dyn CredentialStore>,
        terminator: Arc<dyn SessionTerminator>,
    ) -> Result<Self, Error> {
        let base_url = config.normalized_base_url()?;
        let http_client = Client::builder()
            .timeout(config.request_timeout())
            .user_agent(config.user_agent.as_str())
            .build()?;
        let exchange = RefreshExchange::new(http_client.clone(), config.refresh_url()?);
        let coordinator = RefreshCoordinator::new(store, terminator, config.waiter_timeout());
        Ok(Self {
            http_client,
            base_url,
            coordinator: Arc::new(coordinator),
            exchange,
        })
    }

    pub async fn from_location(
        location: ConfigLocation,
        store: Arc<dyn CredentialStore>,
        terminator: Arc<dyn SessionTerminator>,
    ) -> Result<Self, Error> {
        let config = read_config(location).await?;
        Self::new(&config, store, terminator)
    }

    pub fn coordinator(&self) -> Arc<RefreshCoordinator> {
        Arc::clone(&self.coordinator)
    }

    pub fn store(&self) -> Arc<dyn CredentialStore> {
        self.coordinator.store()
    }

    pub fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{path}", self.base_url)
        } else {
            format!("{}/{path}", self.base_url)
        }
    }

    pub fn request(&self, method: Method, path: &str) -> PendingRequest {
        PendingRequest::new(method, self.url(path))
    }

    pub async fn get(&self, path: &str) -> Result<Response, Error> {
        self.send(self.request(Method::GET, path)).await
    }

    pub async fn post_json<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Response, Error> {
        self.send(self.request(Method::POST, path).json(body)?).await
    }

    pub async fn send_json<T: DeserializeOwned>(&self, req: PendingRequest) -> Result<T, Error> {
        let resp = self.send(req).await?;
        Ok(resp.json().await?)
    }

    /// Sends the request, replaying it once with a refreshed token on `401`.
    pub async fn send(&self, mut req: PendingRequest) -> Result<Response, Error> {
        let start = Instant::now();
        let mut attempts: u8 = 0;
        let mut refreshed = false;
        let mut token = self.coordinator.store().access_token();
        loop {
            attempts += 1;
            let result = self.dispatch(&req, token.as_deref()).await;
            let status = match &result {
                Ok(resp) => Some(resp.status()),
                Err(err) => err.status(),
            };
            let resp = match result {
                Ok(resp) if resp.status() == StatusCode::UNAUTHORIZED => resp,
                other => {
                    outcome(&req, attempts, refreshed, status, other.is_ok(), start).log();
                    return other;
                }
            };

            warn!(
                method = %req.method(),
                url = %req.url(),
                status = 401,
                retried = req.retried(),
                "dispatch.unauthorized"
            );

            if req.retried() {
                let body = resp.text().await.unwrap_or_default();
                outcome(&req, attempts, refreshed, Some(StatusCode::UNAUTHORIZED), false, start)
                    .log();
                return Err(Error::Auth(format!(
                    "401 Unauthorized from {} after credential refresh: {}",
                    req.url(),
                    ApiErrorResponse::message_or_body(&body)
                )));
            }

            req.mark_retried();
            refreshed = true;
            let exchange = &self.exchange;
            let fresh = self
                .coordinator
                .refresh_after_unauthorized(token.as_deref(), |refresh_token| async move {
                    exchange.exchange(&refresh_token).await
                })
                .await;
            match fresh {
                Ok(fresh) => {
                    debug!(url = %req.url(), "replaying with refreshed token");
                    token = Some(fresh);
                }
                Err(err) => {
                    outcome(&req, attempts, refreshed, Some(StatusCode::UNAUTHORIZED), false, start)
                        .log();
                    return Err(Error::Refresh(err));
                }
            }
        }
    }

    /// Sends once; any status other than success or `401` becomes [`Error::Http`].
    async fn dispatch(
        &self,
        req: &PendingRequest,
        access_token: Option<&str>,
    ) -> Result<Response, Error> {
        let resp = req.decorate(&self.http_client, access_token)?.send().await?;
        let status = resp.status();
        if status.is_success() || status == StatusCode::UNAUTHORIZED {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        debug!(status = %status, url = %req.url(), "request failed");
        Err(Error::Http(status, ApiErrorResponse::message_or_body(&body)))
    }
}

fn outcome(
    req: &PendingRequest,
    attempts: u8,
    refreshed: bool,
    status: Option<StatusCode>,
    success: bool,
    start: Instant,
) -> DispatchOutcome {
    DispatchOutcome {
        method: req.method().clone(),
        url: req.url().to_string(),
        attempts,
        refreshed,
        status: status.map(|s| s.as_u16()),
        success,
        total_elapsed: start.elapsed(),
    }
}
