//! Utterance to intent classification.
//!
//! The [`Classifier`] owns everything it needs: compiled rules, slot
//! patterns and, optionally, a trained [`IntentModel`]. Build it once at
//! startup and pass it by reference to the input loop.
//!
//! # Algorithm
//!
//! 1. If a model is present and its top probability reaches the confidence
//!    threshold, its label wins. Slots are re-read from the raw text.
//! 2. Otherwise the fixed-order pattern rules decide.
//! 3. Nothing matched: [`Intent::Unknown`].

mod model;
mod rules;
mod slots;

pub use model::{IntentModel, TRAINING_PHRASES};
pub use rules::{normalize, RuleSet};
pub use slots::SlotExtractor;

use crate::error::Result;
use crate::intent::{Classified, Intent};

/// Minimum model probability for a statistical prediction to be used.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.45;

/// Maps free text to typed intents.
#[derive(Clone, Debug)]
pub struct Classifier {
    rules: RuleSet,
    slots: SlotExtractor,
    model: Option<IntentModel>,
    threshold: f64,
}

impl Classifier {
    /// A classifier using only the pattern rules.
    pub fn rules_only() -> Result<Self> {
        Ok(Self {
            rules: RuleSet::new()?,
            slots: SlotExtractor::new()?,
            model: None,
            threshold: DEFAULT_CONFIDENCE_THRESHOLD,
        })
    }

    /// A classifier that consults `model` before the rules.
    pub fn with_model(model: IntentModel, threshold: f64) -> Result<Self> {
        Ok(Self {
            model: Some(model),
            threshold: threshold.clamp(0.0, 1.0),
            ..Self::rules_only()?
        })
    }

    /// A classifier with a model trained on the built-in phrases.
    pub fn trained(threshold: f64) -> Result<Self> {
        Self::with_model(IntentModel::train_default(), threshold)
    }

    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Classify an utterance. Never fails; unmatched text is `Unknown`.
    pub fn classify(&self, utterance: &str) -> Classified {
        if let Some(model) = &self.model {
            match model.predict(utterance) {
                Some((kind, confidence)) if confidence >= self.threshold => {
                    log::debug!("Model: {} ({:.2})", kind, confidence);
                    let intent = self.slots.fill(kind, utterance);
                    return Classified::by_model(intent, confidence);
                }
                Some((kind, confidence)) => {
                    log::debug!(
                        "Model: {} ({:.2}) below threshold {:.2}, using rules",
                        kind,
                        confidence,
                        self.threshold
                    );
                }
                None => log::debug!("Model: no known terms, using rules"),
            }
        }

        let intent = self.rules.matches(&normalize(utterance), &self.slots);
        log::debug!("Rules: {:?}", intent);
        Classified::by_rule(intent)
    }

    /// Classify and drop the confidence.
    pub fn intent(&self, utterance: &str) -> Intent {
        self.classify(utterance).intent
    }
}
