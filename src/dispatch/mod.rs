mod outcome;
mod pending;

pub use outcome::DispatchOutcome;
pub use pending::PendingRequest;
