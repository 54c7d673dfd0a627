//! Typed commands recognised from utterances.
//!
//! - [`Intent`] - A command with its slot values
//! - [`IntentKind`] - The slot-free label predicted by the statistical model
//! - [`Classified`] - An intent plus the model confidence, if any

use crate::timing::Subdivision;
use std::fmt;

/// Sign of a relative tempo change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Down,
}

/// A structured command derived from an utterance.
///
/// Slots are `None` when the utterance matched a command but did not
/// contain the value it needs; the dispatcher asks for clarification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Intent {
    StartMetronome,
    StopMetronome,
    TapTempo,
    QueryTempo,
    SetTempo { bpm: Option<u32> },
    AdjustTempo { delta: Option<u32>, direction: Direction },
    SetSubdivision { subdivision: Option<Subdivision> },
    NextPage,
    PrevPage,
    GotoPage { page: Option<u32> },
    SchedulePageTurn { bars: Option<u32> },
    Help,
    Quit,
    Unknown,
}

impl Intent {
    /// The slot-free label of this intent.
    pub fn kind(&self) -> IntentKind {
        match self {
            Intent::StartMetronome => IntentKind::StartMetronome,
            Intent::StopMetronome => IntentKind::StopMetronome,
            Intent::TapTempo => IntentKind::TapTempo,
            Intent::QueryTempo => IntentKind::QueryTempo,
            Intent::SetTempo { .. } => IntentKind::SetTempo,
            Intent::AdjustTempo { direction: Direction::Up, .. } => IntentKind::IncreaseTempo,
            Intent::AdjustTempo { direction: Direction::Down, .. } => IntentKind::DecreaseTempo,
            Intent::SetSubdivision { .. } => IntentKind::SetSubdivision,
            Intent::NextPage => IntentKind::NextPage,
            Intent::PrevPage => IntentKind::PrevPage,
            Intent::GotoPage { .. } => IntentKind::GotoPage,
            Intent::SchedulePageTurn { .. } => IntentKind::SchedulePageTurn,
            Intent::Help => IntentKind::Help,
            Intent::Quit => IntentKind::Quit,
            Intent::Unknown => IntentKind::Unknown,
        }
    }
}

/// Intent label without slots.
///
/// Tempo increase and decrease are separate labels so that the statistical
/// model can tell them apart.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IntentKind {
    StartMetronome,
    StopMetronome,
    TapTempo,
    QueryTempo,
    SetTempo,
    IncreaseTempo,
    DecreaseTempo,
    SetSubdivision,
    NextPage,
    PrevPage,
    GotoPage,
    SchedulePageTurn,
    Help,
    Quit,
    Unknown,
}

impl IntentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            IntentKind::StartMetronome => "start_metronome",
            IntentKind::StopMetronome => "stop_metronome",
            IntentKind::TapTempo => "tap_tempo",
            IntentKind::QueryTempo => "query_tempo",
            IntentKind::SetTempo => "set_tempo",
            IntentKind::IncreaseTempo => "increase_tempo",
            IntentKind::DecreaseTempo => "decrease_tempo",
            IntentKind::SetSubdivision => "set_subdivision",
            IntentKind::NextPage => "next_page",
            IntentKind::PrevPage => "prev_page",
            IntentKind::GotoPage => "goto_page",
            IntentKind::SchedulePageTurn => "schedule_page_turn",
            IntentKind::Help => "help",
            IntentKind::Quit => "quit",
            IntentKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for IntentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifier output: the intent and, when the statistical model produced
/// it, the model's confidence in `[0, 1]`.
#[derive(Clone, Debug, PartialEq)]
pub struct Classified {
    pub intent: Intent,
    pub confidence: Option<f64>,
}

impl Classified {
    /// An intent produced by the rule matcher.
    pub fn by_rule(intent: Intent) -> Self {
        Self {
            intent,
            confidence: None,
        }
    }

    /// An intent produced by the statistical model.
    pub fn by_model(intent: Intent, confidence: f64) -> Self {
        Self {
            intent,
            confidence: Some(confidence.clamp(0.0, 1.0)),
        }
    }
}

impl fmt::Display for Classified {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.intent)?;
        if let Some(confidence) = self.confidence {
            write!(f, " (confidence {:.2})", confidence)?;
        }
        Ok(())
    }
}
