//! Session manager for thread-safe session access.
//!
//! The [`SessionManager`] wraps the [`Session`] in an `Arc<Mutex>`. Both the
//! input loop and the action slot's worker go through it.

use std::sync::{Arc, Mutex, PoisonError};

use super::model::Session;

/// Thread-safe handle to the session.
#[derive(Clone)]
pub struct SessionManager {
    session: Arc<Mutex<Session>>,
}

impl SessionManager {
    pub fn new(session: Session) -> Self {
        Self {
            session: Arc::new(Mutex::new(session)),
        }
    }

    /// Run a closure with exclusive access to the session.
    ///
    /// A panic in an earlier holder does not lock the session out; the
    /// state it left behind is used as is.
    pub fn with_session<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut Session) -> R,
    {
        let mut session = self.session.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut session)
    }

    /// Get the current tempo.
    pub fn bpm(&self) -> u32 {
        self.with_session(|s| s.metronome.current_bpm())
    }

    /// Get the current page, if a PDF is loaded.
    pub fn current_page(&self) -> Option<u32> {
        self.with_session(|s| s.current_page())
    }

    /// Check if the metronome is running.
    pub fn is_metronome_running(&self) -> bool {
        self.with_session(|s| s.metronome.is_running())
    }

    /// Get the session version.
    pub fn version(&self) -> u64 {
        self.with_session(|s| s.version)
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("version", &self.version())
            .finish_non_exhaustive()
    }
}
