mod coordinator;
mod exchange;
mod pair;
mod store;

pub use coordinator::{RefreshCoordinator, RefreshOutcome};
pub use exchange::RefreshExchange;
pub use pair::CredentialPair;
pub use store::{CredentialStore, MemoryCredentialStore};
