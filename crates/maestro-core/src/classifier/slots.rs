//! Slot extraction from raw utterance text.
//!
//! Both classification paths fill slots through [`SlotExtractor`], so a
//! number means the same thing whether a rule or the model picked the
//! intent.

use crate::error::Result;
use crate::intent::{Direction, Intent, IntentKind};
use crate::timing::Subdivision;
use regex::Regex;

/// Compiled slot patterns.
#[derive(Clone, Debug)]
pub struct SlotExtractor {
    number: Regex,
    page: Regex,
    bars: Regex,
    subdivision: Regex,
}

impl SlotExtractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            number: Regex::new(r"\b(\d{1,3})\b")?,
            page: Regex::new(r"(?i)\bpage\s+(\d{1,3})\b")?,
            bars: Regex::new(r"(?i)\b(\d{1,3})\s+bars?\b")?,
            subdivision: Regex::new(r"(?i)(quarter|eighth|triplet|sixteenth)")?,
        })
    }

    /// First 1-3 digit number in the text.
    pub fn first_number(&self, text: &str) -> Option<u32> {
        capture_u32(&self.number, text)
    }

    /// The number after "page", else the first number.
    pub fn page(&self, text: &str) -> Option<u32> {
        capture_u32(&self.page, text).or_else(|| self.first_number(text))
    }

    /// The number before "bar"/"bars".
    pub fn bars(&self, text: &str) -> Option<u32> {
        capture_u32(&self.bars, text)
    }

    /// First subdivision word in the text.
    pub fn subdivision(&self, text: &str) -> Option<Subdivision> {
        self.subdivision
            .captures(text)
            .and_then(|caps| caps.get(1))
            .and_then(|m| Subdivision::from_name(m.as_str()))
    }

    /// Build the full intent for a predicted kind by reading its slots
    /// out of `text`.
    pub fn fill(&self, kind: IntentKind, text: &str) -> Intent {
        match kind {
            IntentKind::StartMetronome => Intent::StartMetronome,
            IntentKind::StopMetronome => Intent::StopMetronome,
            IntentKind::TapTempo => Intent::TapTempo,
            IntentKind::QueryTempo => Intent::QueryTempo,
            IntentKind::SetTempo => Intent::SetTempo {
                bpm: self.first_number(text),
            },
            IntentKind::IncreaseTempo => Intent::AdjustTempo {
                delta: self.first_number(text),
                direction: Direction::Up,
            },
            IntentKind::DecreaseTempo => Intent::AdjustTempo {
                delta: self.first_number(text),
                direction: Direction::Down,
            },
            IntentKind::SetSubdivision => Intent::SetSubdivision {
                subdivision: self.subdivision(text),
            },
            IntentKind::NextPage => Intent::NextPage,
            IntentKind::PrevPage => Intent::PrevPage,
            IntentKind::GotoPage => Intent::GotoPage {
                page: self.page(text),
            },
            IntentKind::SchedulePageTurn => Intent::SchedulePageTurn {
                bars: self.bars(text),
            },
            IntentKind::Help => Intent::Help,
            IntentKind::Quit => Intent::Quit,
            IntentKind::Unknown => Intent::Unknown,
        }
    }
}

fn capture_u32(re: &Regex, text: &str) -> Option<u32> {
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}
