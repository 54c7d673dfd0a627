//! Session state for one practice run.
//!
//! - [`Session`] - Metronome, pager, pending page turn and tap history
//! - [`SessionManager`] - Shared, lock-guarded access to the session
//!
//! The dispatcher and the scheduled page turn both mutate the session; the
//! manager's mutex is the one place where they are serialised.

mod manager;
mod model;

pub use manager::SessionManager;
pub use model::Session;
