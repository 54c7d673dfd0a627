//! Timing primitives for the metronome and scheduled page turns.
//!
//! This module provides the fundamental timing types used throughout maestro:
//!
//! - [`Subdivision`] - Rhythmic granularity of ticks within a beat
//! - [`TempoState`] - BPM plus subdivision with a derived tick interval
//! - [`TapTempo`] - Tempo estimation from successive taps
//! - [`bars_to_duration`] - Bar count to wall-clock delay conversion

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

/// Slowest tempo the metronome will run at.
pub const MIN_BPM: u32 = 20;

/// Fastest tempo the metronome will run at.
pub const MAX_BPM: u32 = 300;

/// Tempo used when nothing else is configured.
pub const DEFAULT_BPM: u32 = 100;

/// Bar length used for scheduled page turns. There is no time signature
/// model, every bar is four beats.
pub const BEATS_PER_BAR: u32 = 4;

/// Clamp a requested tempo into `[MIN_BPM, MAX_BPM]`.
#[inline]
pub fn clamp_bpm(bpm: i64) -> u32 {
    bpm.clamp(MIN_BPM as i64, MAX_BPM as i64) as u32
}

/// Delay until a page turn `bars` bars from now at the given tempo.
///
/// `bars × 4 × (60 / bpm)` seconds.
pub fn bars_to_duration(bars: u32, bpm: u32) -> Duration {
    let seconds_per_beat = 60.0 / bpm.max(1) as f64;
    Duration::from_secs_f64(bars as f64 * BEATS_PER_BAR as f64 * seconds_per_beat)
}

/// Number of metronome ticks per beat.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Subdivision {
    #[default]
    Quarter = 1,
    Eighth = 2,
    Triplet = 3,
    Sixteenth = 4,
}

impl Subdivision {
    /// All subdivisions, coarsest first.
    pub const ALL: [Subdivision; 4] = [
        Subdivision::Quarter,
        Subdivision::Eighth,
        Subdivision::Triplet,
        Subdivision::Sixteenth,
    ];

    /// Ticks per beat.
    #[inline]
    pub fn multiplier(self) -> u32 {
        self as u32
    }

    /// The spoken name of this subdivision.
    pub fn name(self) -> &'static str {
        match self {
            Subdivision::Quarter => "quarter",
            Subdivision::Eighth => "eighth",
            Subdivision::Triplet => "triplet",
            Subdivision::Sixteenth => "sixteenth",
        }
    }

    /// Look up a subdivision by its spoken name (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|sub| sub.name().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for Subdivision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Subdivision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| format!("unknown subdivision '{}'", s))
    }
}

/// Tempo and subdivision with the tick interval they imply.
///
/// The interval is recomputed on every mutation so it can never go stale.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TempoState {
    bpm: u32,
    subdivision: Subdivision,
    tick_interval: Duration,
}

impl Default for TempoState {
    fn default() -> Self {
        Self::new(DEFAULT_BPM as i64, Subdivision::Quarter)
    }
}

impl TempoState {
    /// Create a tempo state. `bpm` is clamped.
    pub fn new(bpm: i64, subdivision: Subdivision) -> Self {
        let mut state = Self {
            bpm: clamp_bpm(bpm),
            subdivision,
            tick_interval: Duration::ZERO,
        };
        state.recompute();
        state
    }

    /// Set the tempo, clamping into range. Returns the stored value.
    pub fn set_bpm(&mut self, bpm: i64) -> u32 {
        self.bpm = clamp_bpm(bpm);
        self.recompute();
        self.bpm
    }

    /// Set the subdivision.
    pub fn set_subdivision(&mut self, subdivision: Subdivision) {
        self.subdivision = subdivision;
        self.recompute();
    }

    pub fn bpm(&self) -> u32 {
        self.bpm
    }

    pub fn subdivision(&self) -> Subdivision {
        self.subdivision
    }

    /// Time between two ticks: `60 / bpm / multiplier`.
    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    pub fn tick_interval_seconds(&self) -> f64 {
        self.tick_interval.as_secs_f64()
    }

    /// Ticks in one four-beat bar.
    pub fn ticks_per_bar(&self) -> u32 {
        BEATS_PER_BAR * self.subdivision.multiplier()
    }

    fn recompute(&mut self) {
        let seconds = 60.0 / self.bpm as f64 / self.subdivision.multiplier() as f64;
        self.tick_interval = Duration::from_secs_f64(seconds);
    }
}

/// Estimates a tempo from a sequence of taps.
///
/// Taps further apart than [`TapTempo::RESET_AFTER`] start a new sequence.
/// Only the most recent [`TapTempo::WINDOW`] taps are averaged.
#[derive(Clone, Debug, Default)]
pub struct TapTempo {
    taps: Vec<Instant>,
}

impl TapTempo {
    pub const RESET_AFTER: Duration = Duration::from_secs(3);
    pub const WINDOW: usize = 4;

    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tap. Returns the estimated (clamped) BPM once at least two
    /// taps are in the current sequence.
    pub fn tap(&mut self, now: Instant) -> Option<u32> {
        if let Some(&last) = self.taps.last() {
            if now.saturating_duration_since(last) > Self::RESET_AFTER {
                self.taps.clear();
            }
        }
        self.taps.push(now);
        if self.taps.len() > Self::WINDOW {
            self.taps.remove(0);
        }

        let (first, last) = (*self.taps.first()?, *self.taps.last()?);
        let intervals = self.taps.len() as u32 - 1;
        if intervals == 0 {
            return None;
        }
        let average = last.saturating_duration_since(first).as_secs_f64() / intervals as f64;
        if average <= f64::EPSILON {
            return None;
        }
        Some(clamp_bpm((60.0 / average).round() as i64))
    }

    /// Number of taps in the current sequence.
    pub fn len(&self) -> usize {
        self.taps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.taps.is_empty()
    }

    pub fn clear(&mut self) {
        self.taps.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bpm_is_clamped() {
        for (requested, expected) in [(-10, 20), (0, 20), (19, 20), (20, 20), (120, 120), (300, 300), (301, 300), (5000, 300)] {
            let mut state = TempoState::default();
            assert_eq!(state.set_bpm(requested), expected, "bpm {requested}");
            assert_eq!(state.bpm(), expected);
        }
    }

    #[test]
    fn test_tick_interval_follows_subdivision() {
        let mut state = TempoState::new(120, Subdivision::Quarter);
        for sub in Subdivision::ALL {
            state.set_subdivision(sub);
            let expected = 60.0 / 120.0 / sub.multiplier() as f64;
            assert!((state.tick_interval_seconds() - expected).abs() < 1e-9, "{sub}");
        }
    }

    #[test]
    fn test_tick_interval_recomputed_on_bpm_change() {
        let mut state = TempoState::new(60, Subdivision::Eighth);
        assert!((state.tick_interval_seconds() - 0.5).abs() < 1e-9);
        state.set_bpm(120);
        assert!((state.tick_interval_seconds() - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_subdivision_names() {
        assert_eq!(Subdivision::from_name("Triplet"), Some(Subdivision::Triplet));
        assert_eq!(Subdivision::from_name(" sixteenth "), Some(Subdivision::Sixteenth));
        assert_eq!(Subdivision::from_name("half"), None);
        assert_eq!("eighth".parse::<Subdivision>(), Ok(Subdivision::Eighth));
        assert_eq!(Subdivision::Sixteenth.multiplier(), 4);
    }

    #[test]
    fn test_bars_to_duration() {
        let delay = bars_to_duration(4, 120);
        assert!((delay.as_secs_f64() - 8.0).abs() < 1e-9);
        let delay = bars_to_duration(1, 60);
        assert!((delay.as_secs_f64() - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_tap_tempo() {
        let start = Instant::now();
        let mut taps = TapTempo::new();
        assert_eq!(taps.tap(start), None);
        assert_eq!(taps.tap(start + Duration::from_millis(500)), Some(120));
        assert_eq!(taps.tap(start + Duration::from_millis(1000)), Some(120));
        // A long pause starts over
        assert_eq!(taps.tap(start + Duration::from_secs(10)), None);
        assert_eq!(taps.len(), 1);
    }

    #[test]
    fn test_tap_tempo_window() {
        let start = Instant::now();
        let mut taps = TapTempo::new();
        for i in 0..8 {
            taps.tap(start + Duration::from_millis(i * 1000));
        }
        assert_eq!(taps.len(), TapTempo::WINDOW);
    }
}
