//! Bearer-token HTTP client with single-flight credential refresh.
//!
//! [`AuthClient`] attaches the stored access token to every request. When
//! requests come back `401`, exactly one refresh exchange runs no matter how
//! many requests failed; the rest wait for its outcome and are replayed once
//! with the new token, or all fail together and the session is terminated.

mod client;
pub mod config;
mod dispatch;
mod errors;
pub mod session;
pub mod telemetry;
pub mod token;
mod types;

pub use client::AuthClient;
pub use config::{Config, ConfigLocation};
pub use dispatch::{DispatchOutcome, PendingRequest};
pub use errors::{Error, RefreshError};
pub use session::{SessionEvent, SessionEvents, SessionTerminator};
pub use token::{CredentialPair, CredentialStore, MemoryCredentialStore, RefreshCoordinator};
pub use types::{ApiErrorResponse, RefreshRequest, RefreshResponse};
