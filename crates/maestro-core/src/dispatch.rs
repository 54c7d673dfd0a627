//! Applies intents to the session.
//!
//! [`Dispatcher::dispatch`] takes the session lock, performs the side
//! effects an intent calls for and returns the sentence to say back.
//! Missing slots and a missing PDF produce a clarification and leave the
//! session untouched.
//!
//! Scheduled page turns fire on the action slot's worker thread. They take
//! the same session lock, and a turn that was replaced while waiting for
//! the lock is discarded.

use crate::error::Result;
use crate::intent::{Direction, Intent};
use crate::pager::{PagerState, Viewer};
use crate::scheduler::{ActionSlot, DeferredAction, ScheduledAction};
use crate::state::{Session, SessionManager};
use crate::timing::{bars_to_duration, Subdivision};
use crossbeam_channel::{unbounded, Receiver};
use std::sync::Arc;
use std::time::Instant;

/// Tempo change used when "increase/decrease tempo" has no number.
pub const DEFAULT_TEMPO_STEP: u32 = 5;

pub const HELP_TEXT: &str = "Try: start/stop metronome, set tempo to 120, increase tempo by 5, \
     what's the tempo, subdivision eighth, tap tempo, next page, previous page, \
     go to page 5, turn page in 4 bars, quit.";
pub const UNKNOWN_TEXT: &str = "Sorry, I didn't understand. Say 'help' for options.";
pub const NO_PDF_TEXT: &str = "No PDF loaded.";

/// What the input loop should do after a response.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Control {
    Continue,
    Quit,
}

/// A sentence for the user plus the loop control it implies.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Response {
    pub text: String,
    pub control: Control,
}

impl Response {
    pub fn say(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            control: Control::Continue,
        }
    }

    pub fn quit(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            control: Control::Quit,
        }
    }

    pub fn is_quit(&self) -> bool {
        self.control == Control::Quit
    }
}

/// Applies intents to a shared session.
pub struct Dispatcher {
    session: SessionManager,
    slot: ActionSlot,
    viewer: Arc<dyn Viewer>,
}

impl Dispatcher {
    /// Create a dispatcher and its action slot worker.
    ///
    /// The returned receiver yields sentences produced outside of
    /// `dispatch`, i.e. by scheduled page turns when they fire.
    pub fn new(session: SessionManager, viewer: Arc<dyn Viewer>) -> Result<(Self, Receiver<String>)> {
        let (announce_tx, announce_rx) = unbounded();

        let fire_session = session.clone();
        let fire_viewer = viewer.clone();
        let slot = ActionSlot::spawn(move |action| {
            if let Some(text) = fire_scheduled(&fire_session, fire_viewer.as_ref(), &action) {
                let _ = announce_tx.send(text);
            }
        })?;

        Ok((
            Self {
                session,
                slot,
                viewer,
            },
            announce_rx,
        ))
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    /// Apply an intent and return the response.
    pub fn dispatch(&self, intent: &Intent) -> Response {
        self.session.with_session(|session| self.apply(intent, session))
    }

    /// Show the current page, e.g. at startup.
    pub fn show_current_page(&self) -> Option<u32> {
        self.session.with_session(|session| {
            let pager = session.pager.as_ref()?;
            open_page(self.viewer.as_ref(), pager);
            Some(pager.current_page())
        })
    }

    /// Cancel any pending page turn and stop both background threads.
    pub fn shutdown(&mut self) {
        let _ = self.slot.cancel();
        self.slot.shutdown();
        self.session.with_session(|session| {
            session.scheduled = None;
            session.metronome.shutdown();
            session.bump_version();
        });
        log::info!("Session shut down");
    }

    fn apply(&self, intent: &Intent, session: &mut Session) -> Response {
        match intent {
            Intent::StartMetronome => {
                if session.metronome.start() {
                    session.bump_version();
                    Response::say("Metronome started.")
                } else {
                    Response::say("Metronome is already running.")
                }
            }
            Intent::StopMetronome => {
                if session.metronome.stop() {
                    session.bump_version();
                    Response::say("Metronome stopped.")
                } else {
                    Response::say("Metronome is already stopped.")
                }
            }
            Intent::TapTempo => match session.taps.tap(Instant::now()) {
                Some(bpm) => {
                    let bpm = session.metronome.set_bpm(bpm as i64);
                    session.bump_version();
                    tempo_set(bpm)
                }
                None => Response::say("Tap again to set the tempo."),
            },
            Intent::QueryTempo => {
                Response::say(format!("Tempo is {} BPM.", session.metronome.current_bpm()))
            }
            Intent::SetTempo { bpm: Some(bpm) } => {
                reset_taps(session);
                let bpm = session.metronome.set_bpm(*bpm as i64);
                session.bump_version();
                tempo_set(bpm)
            }
            Intent::SetTempo { bpm: None } => {
                Response::say("Say a BPM number, like 'set tempo to 120'.")
            }
            Intent::AdjustTempo { delta, direction } => {
                reset_taps(session);
                let delta = delta.unwrap_or(DEFAULT_TEMPO_STEP);
                let bpm = match direction {
                    Direction::Up => session.metronome.increase(delta),
                    Direction::Down => session.metronome.decrease(delta),
                };
                session.bump_version();
                tempo_set(bpm)
            }
            Intent::SetSubdivision {
                subdivision: Some(subdivision),
            } => {
                session.metronome.set_subdivision(*subdivision);
                session.bump_version();
                Response::say(format!("Subdivision set to {}.", subdivision))
            }
            Intent::SetSubdivision { subdivision: None } => Response::say(format!(
                "Say a subdivision: {}.",
                Subdivision::ALL.map(Subdivision::name).join(", ")
            )),
            Intent::NextPage => self.move_page(session, PagerState::next_page),
            Intent::PrevPage => self.move_page(session, PagerState::prev_page),
            Intent::GotoPage { page: Some(page) } => {
                self.move_page(session, |pager| pager.goto_page(*page))
            }
            Intent::GotoPage { page: None } => {
                no_pdf(session).unwrap_or_else(|| Response::say("Say 'go to page N'."))
            }
            Intent::SchedulePageTurn { bars: Some(bars) } if *bars > 0 => {
                self.schedule_page_turn(*bars, session)
            }
            Intent::SchedulePageTurn { .. } => {
                no_pdf(session).unwrap_or_else(|| Response::say("Say 'turn page in N bars'."))
            }
            Intent::Help => Response::say(HELP_TEXT),
            Intent::Quit => Response::quit("Goodbye."),
            Intent::Unknown => Response::say(UNKNOWN_TEXT),
        }
    }

    /// Apply `step` to the pager and show the resulting page.
    fn move_page<F>(&self, session: &mut Session, step: F) -> Response
    where
        F: FnOnce(&mut PagerState) -> u32,
    {
        let Some(pager) = session.pager.as_mut() else {
            return Response::say(NO_PDF_TEXT);
        };
        step(pager);
        let response = show_page(self.viewer.as_ref(), pager);
        session.bump_version();
        response
    }

    fn schedule_page_turn(&self, bars: u32, session: &mut Session) -> Response {
        if let Some(response) = no_pdf(session) {
            return response;
        }
        let bpm = session.metronome.current_bpm();
        let delay = bars_to_duration(bars, bpm);
        match self.slot.arm(DeferredAction::NextPage, delay, bars) {
            Ok(scheduled) => {
                log::info!(
                    "Page turn in {} bars ({:.2}s at {} BPM)",
                    bars,
                    delay.as_secs_f64(),
                    bpm
                );
                if let Some(previous) = session.scheduled.replace(scheduled) {
                    log::debug!("Replaced pending page turn #{}", previous.id);
                }
                session.bump_version();
                let unit = if bars == 1 { "bar" } else { "bars" };
                Response::say(format!("Okay, turning the page in {} {}.", bars, unit))
            }
            Err(e) => {
                log::error!("Failed to schedule page turn: {}", e);
                Response::say("Sorry, I couldn't schedule that.")
            }
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.slot.shutdown();
    }
}

/// The answer to any page intent when no PDF is loaded.
fn no_pdf(session: &Session) -> Option<Response> {
    session.pager.is_none().then(|| Response::say(NO_PDF_TEXT))
}

/// A spoken tempo ends any tap sequence in progress.
fn reset_taps(session: &mut Session) {
    if !session.taps.is_empty() {
        log::debug!("Discarding {} tempo taps", session.taps.len());
        session.taps.clear();
    }
}

fn tempo_set(bpm: u32) -> Response {
    Response::say(format!("Tempo set to {} BPM.", bpm))
}

fn open_page(viewer: &dyn Viewer, pager: &PagerState) {
    if let Err(e) = viewer.open(pager.pdf_path(), pager.current_page()) {
        log::warn!("Could not open page {}: {}", pager.current_page(), e);
    }
}

fn show_page(viewer: &dyn Viewer, pager: &PagerState) -> Response {
    open_page(viewer, pager);
    Response::say(format!("Page {}.", pager.current_page()))
}

/// Run a fired action under the session lock. Returns the announcement.
fn fire_scheduled(session: &SessionManager, viewer: &dyn Viewer, action: &ScheduledAction) -> Option<String> {
    session.with_session(|session| {
        if !session.is_pending(action.id) {
            log::debug!("Ignoring stale page turn #{}", action.id);
            return None;
        }
        session.scheduled = None;
        match action.action {
            DeferredAction::NextPage => {
                let pager = session.pager.as_mut()?;
                pager.next_page();
                let response = show_page(viewer, pager);
                session.bump_version();
                log::info!("Scheduled page turn: page {}", session.current_page().unwrap_or(1));
                Some(response.text)
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::metronome::Metronome;
    use crate::timing::TempoState;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingViewer {
        opened: Mutex<Vec<(PathBuf, u32)>>,
    }

    impl RecordingViewer {
        fn pages(&self) -> Vec<u32> {
            self.opened.lock().unwrap().iter().map(|(_, p)| *p).collect()
        }
    }

    impl Viewer for RecordingViewer {
        fn open(&self, pdf_path: &Path, page: u32) -> Result<()> {
            self.opened.lock().unwrap().push((pdf_path.to_path_buf(), page));
            Ok(())
        }
    }

    struct FailingViewer;

    impl Viewer for FailingViewer {
        fn open(&self, _pdf_path: &Path, _page: u32) -> Result<()> {
            Err(Error::Viewer("no display".to_string()))
        }
    }

    fn dispatcher_with(
        bpm: i64,
        pager: Option<PagerState>,
        viewer: Arc<dyn Viewer>,
    ) -> (Dispatcher, Receiver<String>) {
        let (metronome, _ticks) = Metronome::spawn(TempoState::new(bpm, Subdivision::Quarter)).unwrap();
        let session = SessionManager::new(Session::new(metronome, pager));
        Dispatcher::new(session, viewer).unwrap()
    }

    fn dispatcher(pager: bool) -> (Dispatcher, Arc<RecordingViewer>, Receiver<String>) {
        let viewer = Arc::new(RecordingViewer::default());
        let pager = pager.then(|| PagerState::new("etude.pdf"));
        let (d, announcements) = dispatcher_with(120, pager, viewer.clone());
        (d, viewer, announcements)
    }

    #[test]
    fn test_set_tempo() {
        let (d, _, _) = dispatcher(false);
        let response = d.dispatch(&Intent::SetTempo { bpm: Some(120) });
        assert_eq!(response.text, "Tempo set to 120 BPM.");
        assert_eq!(d.session().bpm(), 120);

        let response = d.dispatch(&Intent::SetTempo { bpm: Some(999) });
        assert_eq!(response.text, "Tempo set to 300 BPM.");
    }

    #[test]
    fn test_set_tempo_without_number_changes_nothing() {
        let (d, _, _) = dispatcher(false);
        let version = d.session().version();
        let response = d.dispatch(&Intent::SetTempo { bpm: None });
        assert!(response.text.contains("BPM number"));
        assert_eq!(d.session().bpm(), 120);
        assert_eq!(d.session().version(), version);
    }

    #[test]
    fn test_adjust_tempo() {
        let (d, _, _) = dispatcher(false);
        d.dispatch(&Intent::AdjustTempo { delta: Some(5), direction: Direction::Up });
        assert_eq!(d.session().bpm(), 125);
        d.dispatch(&Intent::AdjustTempo { delta: None, direction: Direction::Down });
        assert_eq!(d.session().bpm(), 120);
        d.dispatch(&Intent::AdjustTempo { delta: Some(500), direction: Direction::Down });
        assert_eq!(d.session().bpm(), 20);
    }

    #[test]
    fn test_query_tempo() {
        let (d, _, _) = dispatcher(false);
        assert_eq!(d.dispatch(&Intent::QueryTempo).text, "Tempo is 120 BPM.");
    }

    #[test]
    fn test_metronome_transitions() {
        let (d, _, _) = dispatcher(false);
        assert_eq!(d.dispatch(&Intent::StartMetronome).text, "Metronome started.");
        assert_eq!(d.dispatch(&Intent::StartMetronome).text, "Metronome is already running.");
        assert!(d.session().is_metronome_running());
        assert_eq!(d.dispatch(&Intent::StopMetronome).text, "Metronome stopped.");
        assert_eq!(d.dispatch(&Intent::StopMetronome).text, "Metronome is already stopped.");
        assert!(!d.session().is_metronome_running());
    }

    #[test]
    fn test_subdivision() {
        let (d, _, _) = dispatcher(false);
        let response = d.dispatch(&Intent::SetSubdivision {
            subdivision: Some(Subdivision::Triplet),
        });
        assert_eq!(response.text, "Subdivision set to triplet.");
        let tempo = d.session().with_session(|s| s.metronome.tempo());
        assert_eq!(tempo.subdivision(), Subdivision::Triplet);

        let response = d.dispatch(&Intent::SetSubdivision { subdivision: None });
        assert_eq!(
            response.text,
            "Say a subdivision: quarter, eighth, triplet, sixteenth."
        );
        let after = d.session().with_session(|s| s.metronome.tempo());
        assert_eq!(after, tempo);
    }

    #[test]
    fn test_tap_tempo() {
        let (d, _, _) = dispatcher(false);
        assert_eq!(d.dispatch(&Intent::TapTempo).text, "Tap again to set the tempo.");
        std::thread::sleep(Duration::from_millis(400));
        let response = d.dispatch(&Intent::TapTempo);
        assert!(response.text.starts_with("Tempo set to "));
        // 400ms apart is 150 BPM, allow for scheduling jitter
        let bpm = d.session().bpm();
        assert!((100..=150).contains(&bpm), "bpm {bpm}");
    }

    #[test]
    fn test_spoken_tempo_restarts_tapping() {
        let (d, _, _) = dispatcher(false);
        d.dispatch(&Intent::TapTempo);
        d.dispatch(&Intent::SetTempo { bpm: Some(90) });
        assert!(d.session().with_session(|s| s.taps.is_empty()));
        assert_eq!(d.dispatch(&Intent::TapTempo).text, "Tap again to set the tempo.");
        assert_eq!(d.session().bpm(), 90);

        d.dispatch(&Intent::AdjustTempo { delta: None, direction: Direction::Up });
        assert!(d.session().with_session(|s| s.taps.is_empty()));
    }

    #[test]
    fn test_goto_page_opens_viewer() {
        let (d, viewer, _) = dispatcher(true);
        let response = d.dispatch(&Intent::GotoPage { page: Some(5) });
        assert_eq!(response.text, "Page 5.");
        assert_eq!(d.session().current_page(), Some(5));
        assert_eq!(viewer.pages(), vec![5]);
        let opened = viewer.opened.lock().unwrap();
        assert_eq!(opened[0].0, PathBuf::from("etude.pdf"));
    }

    #[test]
    fn test_goto_page_without_number() {
        let (d, viewer, _) = dispatcher(true);
        let response = d.dispatch(&Intent::GotoPage { page: None });
        assert_eq!(response.text, "Say 'go to page N'.");
        assert_eq!(d.session().current_page(), Some(1));
        assert!(viewer.pages().is_empty());
    }

    #[test]
    fn test_page_intents_without_pdf() {
        let (d, viewer, _) = dispatcher(false);
        for intent in [
            Intent::NextPage,
            Intent::PrevPage,
            Intent::GotoPage { page: Some(3) },
            Intent::GotoPage { page: None },
            Intent::SchedulePageTurn { bars: Some(4) },
            Intent::SchedulePageTurn { bars: Some(0) },
            Intent::SchedulePageTurn { bars: None },
        ] {
            assert_eq!(d.dispatch(&intent).text, NO_PDF_TEXT, "{intent:?}");
        }
        assert!(viewer.pages().is_empty());
        assert!(d.session().with_session(|s| s.scheduled.is_none()));
        assert_eq!(d.session().version(), 0);
    }

    #[test]
    fn test_prev_page_at_one() {
        let (d, viewer, _) = dispatcher(true);
        assert_eq!(d.dispatch(&Intent::PrevPage).text, "Page 1.");
        assert_eq!(d.session().current_page(), Some(1));
        d.dispatch(&Intent::NextPage);
        d.dispatch(&Intent::NextPage);
        d.dispatch(&Intent::PrevPage);
        assert_eq!(viewer.pages(), vec![1, 2, 3, 2]);
    }

    #[test]
    fn test_viewer_failure_keeps_page_change() {
        let (d, _) = dispatcher_with(120, Some(PagerState::new("etude.pdf")), Arc::new(FailingViewer));
        assert_eq!(d.dispatch(&Intent::NextPage).text, "Page 2.");
        assert_eq!(d.session().current_page(), Some(2));
    }

    #[test]
    fn test_schedule_page_turn_delay() {
        let (d, _, _) = dispatcher(true);
        let response = d.dispatch(&Intent::SchedulePageTurn { bars: Some(4) });
        assert_eq!(response.text, "Okay, turning the page in 4 bars.");
        let scheduled = d.session().with_session(|s| s.scheduled.clone()).unwrap();
        assert_eq!(scheduled.delay, Duration::from_secs(8));
        assert_eq!(scheduled.bars, 4);
        assert_eq!(d.session().current_page(), Some(1));
    }

    #[test]
    fn test_schedule_page_turn_needs_bars() {
        let (d, _, _) = dispatcher(true);
        for bars in [None, Some(0)] {
            let response = d.dispatch(&Intent::SchedulePageTurn { bars });
            assert_eq!(response.text, "Say 'turn page in N bars'.");
        }
        assert!(d.session().with_session(|s| s.scheduled.is_none()));
    }

    #[test]
    fn test_rescheduling_replaces_pending_turn() {
        let viewer = Arc::new(RecordingViewer::default());
        // At 300 BPM one bar lasts 0.8s
        let (d, announcements) = dispatcher_with(300, Some(PagerState::new("etude.pdf")), viewer.clone());
        d.dispatch(&Intent::SchedulePageTurn { bars: Some(2) });
        d.dispatch(&Intent::SchedulePageTurn { bars: Some(1) });

        let text = announcements.recv_timeout(Duration::from_secs(3)).unwrap();
        assert_eq!(text, "Page 2.");
        assert_eq!(d.session().current_page(), Some(2));
        assert!(d.session().with_session(|s| s.scheduled.is_none()));

        // The replaced two-bar turn never fires
        assert!(announcements.recv_timeout(Duration::from_millis(1200)).is_err());
        assert_eq!(d.session().current_page(), Some(2));
        assert_eq!(viewer.pages(), vec![2]);
    }

    #[test]
    fn test_shutdown_cancels_pending_turn() {
        let (mut d, _) = dispatcher_with(300, Some(PagerState::new("etude.pdf")), Arc::new(RecordingViewer::default()));
        d.dispatch(&Intent::StartMetronome);
        d.dispatch(&Intent::SchedulePageTurn { bars: Some(1) });
        d.shutdown();
        assert!(!d.session().is_metronome_running());
        assert!(d.session().with_session(|s| s.scheduled.is_none()));
        std::thread::sleep(Duration::from_millis(1000));
        assert_eq!(d.session().current_page(), Some(1));
    }

    #[test]
    fn test_stopping_metronome_keeps_pending_turn() {
        let (d, _, _) = dispatcher(true);
        d.dispatch(&Intent::StartMetronome);
        d.dispatch(&Intent::SchedulePageTurn { bars: Some(4) });
        d.dispatch(&Intent::StopMetronome);
        assert!(d.session().with_session(|s| s.scheduled.is_some()));
    }

    #[test]
    fn test_help_quit_unknown() {
        let (d, _, _) = dispatcher(false);
        assert_eq!(d.dispatch(&Intent::Help).text, HELP_TEXT);
        let quit = d.dispatch(&Intent::Quit);
        assert!(quit.is_quit());
        assert_eq!(quit.text, "Goodbye.");
        let unknown = d.dispatch(&Intent::Unknown);
        assert_eq!(unknown.text, UNKNOWN_TEXT);
        assert_eq!(unknown.control, Control::Continue);
        assert_eq!(d.session().version(), 0);
    }

    #[test]
    fn test_show_current_page() {
        let (d, viewer, _) = dispatcher(true);
        assert_eq!(d.show_current_page(), Some(1));
        assert_eq!(viewer.pages(), vec![1]);

        let (d, _, _) = dispatcher(false);
        assert_eq!(d.show_current_page(), None);
    }
}
