//! Maestro Core - Intent recognition, tempo engine and page turning for a
//! hands-free practice assistant.
//!
//! This crate provides the building blocks behind the `maestro` binary:
//!
//! - **Classifier** - Pattern rules plus an optional TF-IDF / logistic
//!   regression model mapping utterances to intents
//! - **Timing** - Tempo, subdivisions, tap tempo and bar durations
//! - **Metronome** - Background tick thread with live tempo changes
//! - **Scheduler** - Single-slot deferred page turn
//! - **Pager** - Current page of the loaded PDF and the viewer seam
//! - **State** - The shared session
//! - **Dispatch** - Applies intents to the session and produces responses
//!
//! # Architecture
//!
//! Utterances are classified into an [`Intent`] and handed to the
//! [`Dispatcher`], which mutates the [`Session`] under a single lock held by
//! the [`SessionManager`]. The metronome and the action slot run on their own
//! threads; their output reaches the caller over crossbeam channels.
//!
//! ```no_run
//! use maestro_core::{
//!     Classifier, Dispatcher, Metronome, NullViewer, Session, SessionManager, Subdivision, TempoState,
//! };
//! use std::sync::Arc;
//!
//! # fn main() -> maestro_core::Result<()> {
//! let classifier = Classifier::trained(0.45)?;
//! let (metronome, _ticks) = Metronome::spawn(TempoState::new(100, Subdivision::Quarter))?;
//! let session = SessionManager::new(Session::new(metronome, None));
//! let (dispatcher, _announcements) = Dispatcher::new(session, Arc::new(NullViewer))?;
//!
//! let response = dispatcher.dispatch(&classifier.intent("set tempo to 120"));
//! println!("{}", response.text);
//! # Ok(())
//! # }
//! ```

pub mod classifier;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod intent;
pub mod metronome;
pub mod pager;
pub mod scheduler;
pub mod state;
pub mod timing;

pub use classifier::{Classifier, IntentModel, DEFAULT_CONFIDENCE_THRESHOLD};
pub use config::Config;
pub use dispatch::{Control, Dispatcher, Response};
pub use error::{Error, Result};
pub use intent::{Classified, Direction, Intent, IntentKind};
pub use metronome::{Metronome, Tick, TransportState};
pub use pager::{discover_pdf, page_url, NullViewer, PagerState, Viewer};
pub use scheduler::{ActionSlot, DeferredAction, ScheduledAction};
pub use state::{Session, SessionManager};
pub use timing::{bars_to_duration, clamp_bpm, Subdivision, TapTempo, TempoState};
