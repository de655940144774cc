use std::sync::{PoisonError, RwLock};

use tracing::debug;

use super::CredentialPair;

/// Where the session's access and refresh tokens live.
///
/// Implementations only need atomic reads and writes of the pair; the
/// refresh coordinator is the sole writer while a refresh cycle runs.
pub trait CredentialStore: Send + Sync {
    fn access_token(&self) -> Option<String>;

    fn refresh_token(&self) -> Option<String>;

    /// Replaces both tokens in one step.
    fn save(&self, pair: CredentialPair);

    fn clear(&self);
}

/// Process-local store backed by a single lock around the pair.
#[derive(Default)]
pub struct MemoryCredentialStore {
    pair: RwLock<Option<CredentialPair>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pair(pair: CredentialPair) -> Self {
        Self {
            pair: RwLock::new(Some(pair)),
        }
    }

    pub fn snapshot(&self) -> Option<CredentialPair> {
        self.pair
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn access_token(&self) -> Option<String> {
        self.pair
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|pair| pair.access_token().to_string())
    }

    fn refresh_token(&self) -> Option<String> {
        self.pair
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|pair| pair.refresh_token().to_string())
            .filter(|token| !token.is_empty())
    }

    fn save(&self, pair: CredentialPair) {
        debug!(obtained_at = %pair.obtained_at(), "credentials.saved");
        *self.pair.write().unwrap_or_else(PoisonError::into_inner) = Some(pair);
    }

    fn clear(&self) {
        debug!("credentials.cleared");
        *self.pair.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}
