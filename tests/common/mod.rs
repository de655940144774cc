#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use bearer_refresh::{
    AuthClient, Config, CredentialPair, MemoryCredentialStore, RefreshError, SessionEvent,
    SessionTerminator,
};
use wiremock::MockServer;

pub const REFRESH_PATH: &str = "/api/user/refresh";

#[derive(Default)]
pub struct CountingTerminator {
    calls: AtomicUsize,
    reasons: Mutex<Vec<RefreshError>>,
}

impl CountingTerminator {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn reasons(&self) -> Vec<RefreshError> {
        self.reasons.lock().unwrap().clone()
    }
}

impl SessionTerminator for CountingTerminator {
    fn terminate(&self, event: SessionEvent) {
        let SessionEvent::Terminated { reason, .. } = event;
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.reasons.lock().unwrap().push(reason);
    }
}

pub struct Harness {
    pub client: AuthClient,
    pub store: Arc<MemoryCredentialStore>,
    pub terminator: Arc<CountingTerminator>,
}

pub fn harness(server: &MockServer, access: &str, refresh: &str) -> Harness {
    let store = Arc::new(MemoryCredentialStore::with_pair(CredentialPair::new(
        access, refresh,
    )));
    let terminator = Arc::new(CountingTerminator::default());
    let client = AuthClient::new(
        &Config::from_values(server.uri(), None, Some(10), Some(10)),
        store.clone(),
        terminator.clone(),
    )
    .expect("client builds");
    Harness {
        client,
        store,
        terminator,
    }
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}
