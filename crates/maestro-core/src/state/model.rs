//! The session aggregate.

use crate::metronome::Metronome;
use crate::pager::PagerState;
use crate::scheduler::ScheduledAction;
use crate::timing::TapTempo;

/// Everything a practice run mutates.
///
/// Created once at startup and changed only by the dispatcher (and by the
/// scheduled page turn it arms).
#[derive(Debug)]
pub struct Session {
    /// The tempo engine. Owns its running/stopped flag.
    pub metronome: Metronome,
    /// Absent when no PDF was loaded.
    pub pager: Option<PagerState>,
    /// The one pending page turn, mirrored from the action slot.
    pub scheduled: Option<ScheduledAction>,
    /// Recent "tap tempo" utterances.
    pub taps: TapTempo,
    /// Incremented on every mutation.
    pub version: u64,
}

impl Session {
    pub fn new(metronome: Metronome, pager: Option<PagerState>) -> Self {
        Self {
            metronome,
            pager,
            scheduled: None,
            taps: TapTempo::new(),
            version: 0,
        }
    }

    /// Bump the version number (call after mutations).
    pub fn bump_version(&mut self) {
        self.version = self.version.wrapping_add(1);
    }

    pub fn current_page(&self) -> Option<u32> {
        self.pager.as_ref().map(PagerState::current_page)
    }

    /// Whether `id` is the page turn currently pending.
    pub fn is_pending(&self, id: u64) -> bool {
        self.scheduled.as_ref().is_some_and(|s| s.id == id)
    }
}
