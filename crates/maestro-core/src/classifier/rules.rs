//! Pattern rules over normalised utterance text.
//!
//! Rules are checked in a fixed order and the first match wins, so the
//! order of [`RuleSet::matches`] is part of its behaviour.

use super::slots::SlotExtractor;
use crate::error::Result;
use crate::intent::{Direction, Intent};
use regex::Regex;

/// Compiled utterance rules.
#[derive(Clone, Debug)]
pub struct RuleSet {
    start: Regex,
    stop: Regex,
    tap: Regex,
    query: Regex,
    set_tempo: Regex,
    increase: Regex,
    decrease: Regex,
    schedule_turn: Regex,
    next_page: Regex,
    prev_page: Regex,
    help: Regex,
    quit: Regex,
}

impl RuleSet {
    pub fn new() -> Result<Self> {
        Ok(Self {
            start: Regex::new(r"\b(start|begin)\s+(the\s+)?metronome\b")?,
            stop: Regex::new(r"\b(stop|end)\s+(the\s+)?metronome\b")?,
            tap: Regex::new(r"\btap\s+tempo\b")?,
            query: Regex::new(r"\bwhat(?:'?s|\s+is)\s+(?:the\s+|my\s+)?(?:tempo|bpm)\b")?,
            set_tempo: Regex::new(
                r"\b(set\s+(tempo|bpm)\s+(to|at)\s+\d{2,3}|(tempo|bpm)\s+\d{2,3})\b",
            )?,
            increase: Regex::new(r"\b(increase|up)\s+(tempo|bpm)(\s+by)?(\s+\d{1,3})?\b")?,
            decrease: Regex::new(r"\b(decrease|down)\s+(tempo|bpm)(\s+by)?(\s+\d{1,3})?\b")?,
            schedule_turn: Regex::new(r"\bturn\s+(the\s+)?page\s+in\b.*\bbars?\b")?,
            next_page: Regex::new(r"\b(next\s+page|turn\s+(the\s+)?page)\b")?,
            prev_page: Regex::new(r"\b(previous|prev)\s+page\b")?,
            help: Regex::new(r"\bhelp\b")?,
            quit: Regex::new(r"\b(quit|exit)\b")?,
        })
    }

    /// Match normalised text against the rules.
    ///
    /// `text` must already be lowercased; see [`normalize`].
    pub fn matches(&self, text: &str, slots: &SlotExtractor) -> Intent {
        // Metronome transport and queries
        if self.start.is_match(text) {
            return Intent::StartMetronome;
        }
        if self.stop.is_match(text) {
            return Intent::StopMetronome;
        }
        if self.tap.is_match(text) {
            return Intent::TapTempo;
        }
        if self.query.is_match(text) {
            return Intent::QueryTempo;
        }

        // Tempo
        if self.set_tempo.is_match(text) {
            return Intent::SetTempo {
                bpm: slots.first_number(text),
            };
        }
        if self.increase.is_match(text) {
            return Intent::AdjustTempo {
                delta: slots.first_number(text),
                direction: Direction::Up,
            };
        }
        if self.decrease.is_match(text) {
            return Intent::AdjustTempo {
                delta: slots.first_number(text),
                direction: Direction::Down,
            };
        }
        if text.contains("subdiv") {
            return Intent::SetSubdivision {
                subdivision: slots.subdivision(text),
            };
        }

        // Pages. The delayed turn is checked before "turn page" which it contains.
        if self.schedule_turn.is_match(text) {
            return Intent::SchedulePageTurn {
                bars: slots.bars(text),
            };
        }
        if self.next_page.is_match(text) {
            return Intent::NextPage;
        }
        if self.prev_page.is_match(text) {
            return Intent::PrevPage;
        }
        if text.contains("go to page") {
            return Intent::GotoPage {
                page: slots.page(text),
            };
        }

        if self.help.is_match(text) {
            return Intent::Help;
        }
        if self.quit.is_match(text) {
            return Intent::Quit;
        }

        Intent::Unknown
    }
}

/// Lowercase, trim and fold typographic apostrophes.
pub fn normalize(utterance: &str) -> String {
    utterance
        .trim()
        .to_lowercase()
        .replace(['\u{2019}', '\u{2018}'], "'")
}
