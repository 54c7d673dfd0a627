//! Metronome thread.
//!
//! The [`Metronome`] owns a background thread that emits [`Tick`]s while
//! running. Tempo and subdivision live behind an `RwLock` shared with the
//! thread, so changes made by the dispatcher are seen at the next tick
//! boundary. Ticks are delivered on a small bounded channel; when the
//! consumer falls behind, at most [`TICK_BUFFER`] ticks wait in it and the
//! rest are dropped, so a tempo change never has more than a few
//! stale-interval ticks in front of it.

use crate::error::{Error, Result};
use crate::timing::{Subdivision, TempoState};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Longest sleep of the tick thread. Bounds how late start/stop/shutdown
/// are noticed.
pub const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Ticks held for a slow consumer before new ones are dropped.
pub const TICK_BUFFER: usize = 4;

/// Transport state of the metronome.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportState {
    Stopped,
    Running,
}

/// One metronome click.
#[derive(Clone, Copy, Debug)]
pub struct Tick {
    /// 1-based position within a four-beat bar, in subdivision units.
    pub count: u32,
    /// Whether this tick falls on a beat rather than between beats.
    pub on_beat: bool,
    pub bpm: u32,
    pub subdivision: Subdivision,
    pub at: Instant,
}

/// State shared between the handle and the tick thread.
struct Shared {
    tempo: RwLock<TempoState>,
    running: AtomicBool,
    /// Bumped on every start so the thread restarts its bar count.
    epoch: AtomicU64,
    shutdown: AtomicBool,
}

/// The tempo engine.
///
/// Starting and stopping are idempotent: there is exactly one tick thread
/// for the lifetime of the metronome, and `start`/`stop` only flip whether
/// it emits ticks.
pub struct Metronome {
    shared: Arc<Shared>,
    thread: Option<JoinHandle<()>>,
}

impl Metronome {
    /// Spawn the tick thread in the stopped state.
    ///
    /// Returns the metronome and the receiving end of its tick stream.
    pub fn spawn(initial: TempoState) -> Result<(Self, Receiver<Tick>)> {
        let shared = Arc::new(Shared {
            tempo: RwLock::new(initial),
            running: AtomicBool::new(false),
            epoch: AtomicU64::new(0),
            shutdown: AtomicBool::new(false),
        });
        let (tick_tx, tick_rx) = bounded(TICK_BUFFER);

        let thread_shared = shared.clone();
        let thread = thread::Builder::new()
            .name("metronome".to_string())
            .spawn(move || run(thread_shared, tick_tx))
            .map_err(|source| Error::Thread {
                name: "metronome",
                source,
            })?;

        log::debug!(
            "Metronome thread started at {} BPM ({})",
            initial.bpm(),
            initial.subdivision()
        );

        Ok((
            Self {
                shared,
                thread: Some(thread),
            },
            tick_rx,
        ))
    }

    /// Start ticking. Returns `false` if it was already running.
    ///
    /// Callers serialise start/stop through the session lock.
    pub fn start(&self) -> bool {
        if self.shared.running.load(Ordering::SeqCst) {
            return false;
        }
        // Epoch first so the thread never sees a restart with the old count
        self.shared.epoch.fetch_add(1, Ordering::SeqCst);
        self.shared.running.store(true, Ordering::SeqCst);
        log::info!("Metronome started");
        true
    }

    /// Stop ticking. Returns `false` if it was already stopped.
    pub fn stop(&self) -> bool {
        let was_running = self.shared.running.swap(false, Ordering::SeqCst);
        if was_running {
            log::info!("Metronome stopped");
        }
        was_running
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    pub fn transport(&self) -> TransportState {
        if self.is_running() {
            TransportState::Running
        } else {
            TransportState::Stopped
        }
    }

    /// Set the tempo. Out-of-range values are clamped. Returns the stored BPM.
    pub fn set_bpm(&self, bpm: i64) -> u32 {
        let stored = self.write(|tempo| tempo.set_bpm(bpm));
        log::info!("Tempo set to {} BPM", stored);
        stored
    }

    pub fn increase(&self, delta: u32) -> u32 {
        self.set_bpm(self.current_bpm() as i64 + delta as i64)
    }

    pub fn decrease(&self, delta: u32) -> u32 {
        self.set_bpm(self.current_bpm() as i64 - delta as i64)
    }

    pub fn set_subdivision(&self, subdivision: Subdivision) {
        self.write(|tempo| tempo.set_subdivision(subdivision));
        log::info!("Subdivision set to {}", subdivision);
    }

    /// Set the subdivision by its spoken name.
    ///
    /// Unrecognised names change nothing and return `None`.
    pub fn set_subdivision_named(&self, name: &str) -> Option<Subdivision> {
        let subdivision = Subdivision::from_name(name)?;
        self.set_subdivision(subdivision);
        Some(subdivision)
    }

    pub fn current_bpm(&self) -> u32 {
        self.tempo().bpm()
    }

    pub fn subdivision(&self) -> Subdivision {
        self.tempo().subdivision()
    }

    /// Snapshot of the current tempo state.
    pub fn tempo(&self) -> TempoState {
        *self
            .shared
            .tempo
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Stop the tick thread and wait for it to exit.
    pub fn shutdown(&mut self) {
        self.shared.running.store(false, Ordering::SeqCst);
        self.shared.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
            log::debug!("Metronome thread stopped");
        }
    }

    fn write<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut TempoState) -> R,
    {
        let mut tempo = self
            .shared
            .tempo
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        f(&mut tempo)
    }
}

impl Drop for Metronome {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for Metronome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metronome")
            .field("tempo", &self.tempo())
            .field("transport", &self.transport())
            .finish_non_exhaustive()
    }
}

fn run(shared: Arc<Shared>, tick_tx: Sender<Tick>) {
    let mut count = 0u32;
    let mut next_due: Option<Instant> = None;
    let mut seen_epoch = shared.epoch.load(Ordering::SeqCst);

    while !shared.shutdown.load(Ordering::Relaxed) {
        if !shared.running.load(Ordering::SeqCst) {
            next_due = None;
            thread::sleep(POLL_INTERVAL);
            continue;
        }

        let epoch = shared.epoch.load(Ordering::SeqCst);
        if epoch != seen_epoch {
            seen_epoch = epoch;
            count = 0;
            next_due = None;
        }

        let now = Instant::now();
        let due = *next_due.get_or_insert(now);
        if now >= due {
            let tempo = *shared.tempo.read().unwrap_or_else(PoisonError::into_inner);
            let multiplier = tempo.subdivision().multiplier();
            count = count % tempo.ticks_per_bar() + 1;
            let tick = Tick {
                count,
                on_beat: (count - 1) % multiplier == 0,
                bpm: tempo.bpm(),
                subdivision: tempo.subdivision(),
                at: now,
            };
            match tick_tx.try_send(tick) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => log::trace!("Tick {} dropped, consumer behind", count),
                Err(TrySendError::Disconnected(_)) => log::trace!("Tick {} dropped, no consumer", count),
            }
            // Next tick is measured from now, not from the missed deadline
            next_due = Some(now + tempo.tick_interval());
        }

        let wait = next_due
            .map(|due| due.saturating_duration_since(Instant::now()))
            .unwrap_or(POLL_INTERVAL)
            .min(POLL_INTERVAL);
        thread::sleep(wait);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metronome(bpm: i64) -> (Metronome, Receiver<Tick>) {
        Metronome::spawn(TempoState::new(bpm, Subdivision::Quarter)).unwrap()
    }

    #[test]
    fn test_start_stop_idempotent() {
        let (m, _ticks) = metronome(120);
        assert_eq!(m.transport(), TransportState::Stopped);
        assert!(m.start());
        assert!(!m.start());
        assert_eq!(m.transport(), TransportState::Running);
        assert!(m.stop());
        assert!(!m.stop());
        assert_eq!(m.transport(), TransportState::Stopped);
    }

    #[test]
    fn test_bpm_clamped_and_adjusted() {
        let (m, _ticks) = metronome(120);
        assert_eq!(m.increase(5), 125);
        assert_eq!(m.decrease(200), 20);
        assert_eq!(m.set_bpm(1000), 300);
        assert_eq!(m.increase(1), 300);
        assert_eq!(m.current_bpm(), 300);
    }

    #[test]
    fn test_named_subdivision() {
        let (m, _ticks) = metronome(60);
        assert_eq!(m.set_subdivision_named("triplet"), Some(Subdivision::Triplet));
        assert!((m.tempo().tick_interval_seconds() - 1.0 / 3.0).abs() < 1e-9);
        let before = m.tempo();
        assert_eq!(m.set_subdivision_named("dotted"), None);
        assert_eq!(m.tempo(), before);
    }

    #[test]
    fn test_emits_ticks_only_while_running() {
        let (m, ticks) = metronome(300);
        m.set_subdivision(Subdivision::Sixteenth);
        assert!(ticks.recv_timeout(Duration::from_millis(150)).is_err());

        m.start();
        let first = ticks.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(first.count, 1);
        assert!(first.on_beat);
        let second = ticks.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(second.count, 2);
        assert!(!second.on_beat);

        m.stop();
        thread::sleep(POLL_INTERVAL * 3);
        while ticks.try_recv().is_ok() {}
        assert!(ticks.recv_timeout(Duration::from_millis(200)).is_err());
    }

    #[test]
    fn test_restart_resets_bar_count() {
        let (m, ticks) = metronome(300);
        m.start();
        ticks.recv_timeout(Duration::from_secs(1)).unwrap();
        ticks.recv_timeout(Duration::from_secs(1)).unwrap();
        m.stop();
        thread::sleep(POLL_INTERVAL * 3);
        while ticks.try_recv().is_ok() {}

        m.start();
        let tick = ticks.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(tick.count, 1);
    }

    #[test]
    fn test_tempo_change_applies_at_next_tick() {
        let (m, ticks) = metronome(60);
        m.start();
        let first = ticks.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(first.bpm, 60);

        m.set_bpm(300);
        let second = ticks.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(second.bpm, 300);
        // The tick already due at the old tempo still lands on its boundary
        assert!(second.at - first.at >= Duration::from_millis(900));

        let third = ticks.recv_timeout(Duration::from_secs(2)).unwrap();
        let gap = third.at - second.at;
        assert!(
            gap >= Duration::from_millis(150) && gap <= Duration::from_millis(450),
            "gap {gap:?}"
        );
    }

    #[test]
    fn test_subdivision_change_applies_at_next_tick() {
        let (m, ticks) = metronome(120);
        m.start();
        let first = ticks.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(first.subdivision, Subdivision::Quarter);

        m.set_subdivision(Subdivision::Sixteenth);
        let second = ticks.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(second.subdivision, Subdivision::Sixteenth);

        let third = ticks.recv_timeout(Duration::from_secs(2)).unwrap();
        let gap = third.at - second.at;
        assert!(
            gap >= Duration::from_millis(80) && gap <= Duration::from_millis(350),
            "gap {gap:?}"
        );
    }

    #[test]
    fn test_slow_consumer_backlog_is_bounded() {
        let (m, ticks) = metronome(300);
        m.set_subdivision(Subdivision::Sixteenth);
        m.start();
        // 50ms ticks, so a dozen are produced while nobody reads
        thread::sleep(Duration::from_millis(600));
        assert!(ticks.len() <= TICK_BUFFER, "queued {}", ticks.len());

        m.set_bpm(60);
        while ticks.try_recv().is_ok() {}
        let mut next = ticks.recv_timeout(Duration::from_secs(2)).unwrap();
        if next.bpm != 60 {
            // One tick may have been built from the old tempo during the drain
            next = ticks.recv_timeout(Duration::from_secs(2)).unwrap();
        }
        assert_eq!(next.bpm, 60);
    }

    #[test]
    fn test_shutdown_joins_thread() {
        let (mut m, ticks) = metronome(120);
        m.start();
        m.shutdown();
        assert!(!m.is_running());
        thread::sleep(POLL_INTERVAL * 2);
        while ticks.try_recv().is_ok() {}
        assert!(ticks.recv_timeout(Duration::from_millis(100)).is_err());
    }
}
