//! Statistical intent model.
//!
//! TF-IDF features over word unigrams and bigrams feed a multinomial
//! logistic regression trained by full-batch gradient descent. Training is
//! deterministic: weights start at zero and samples are visited in order.
//!
//! The model predicts only an [`IntentKind`]; slots are read separately.

use crate::intent::IntentKind;
use std::collections::{BTreeMap, BTreeSet, HashMap};

const EPOCHS: usize = 500;
const LEARNING_RATE: f64 = 2.0;
const L2_PENALTY: f64 = 0.01;

/// Labelled phrases the built-in model is trained on.
pub const TRAINING_PHRASES: &[(&str, IntentKind)] = &[
    ("start metronome", IntentKind::StartMetronome),
    ("begin metronome", IntentKind::StartMetronome),
    ("stop metronome", IntentKind::StopMetronome),
    ("end metronome", IntentKind::StopMetronome),
    ("set tempo to 120", IntentKind::SetTempo),
    ("tempo 140", IntentKind::SetTempo),
    ("bpm 76", IntentKind::SetTempo),
    ("increase tempo by 5", IntentKind::IncreaseTempo),
    ("tempo up 3", IntentKind::IncreaseTempo),
    ("decrease tempo by 4", IntentKind::DecreaseTempo),
    ("tempo down 10", IntentKind::DecreaseTempo),
    ("what's tempo", IntentKind::QueryTempo),
    ("what is my bpm", IntentKind::QueryTempo),
    ("tap tempo", IntentKind::TapTempo),
    ("next page", IntentKind::NextPage),
    ("turn page", IntentKind::NextPage),
    ("previous page", IntentKind::PrevPage),
    ("go to page 5", IntentKind::GotoPage),
    ("open page 3", IntentKind::GotoPage),
    ("set subdivision to eighth", IntentKind::SetSubdivision),
    ("subdivision triplet", IntentKind::SetSubdivision),
    ("turn page in 4 bars", IntentKind::SchedulePageTurn),
    ("help", IntentKind::Help),
    ("quit", IntentKind::Quit),
];

type SparseVector = Vec<(usize, f64)>;

/// Split into lowercase word tokens of at least two characters, then add
/// bigrams of adjacent tokens.
fn ngrams(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|w| w.chars().count() >= 2)
        .collect();

    let mut terms: Vec<String> = words.iter().map(|w| w.to_string()).collect();
    terms.extend(words.windows(2).map(|pair| format!("{} {}", pair[0], pair[1])));
    terms
}

/// Term weighting fitted on the training phrases.
#[derive(Clone, Debug)]
struct TfidfVectorizer {
    vocabulary: HashMap<String, usize>,
    idf: Vec<f64>,
}

impl TfidfVectorizer {
    fn fit<'a>(docs: impl IntoIterator<Item = &'a str>) -> Self {
        let mut doc_freq: BTreeMap<String, usize> = BTreeMap::new();
        let mut n_docs = 0usize;
        for doc in docs {
            n_docs += 1;
            let unique: BTreeSet<String> = ngrams(doc).into_iter().collect();
            for term in unique {
                *doc_freq.entry(term).or_default() += 1;
            }
        }

        // BTreeMap iteration keeps column order stable between runs
        let mut vocabulary = HashMap::with_capacity(doc_freq.len());
        let mut idf = Vec::with_capacity(doc_freq.len());
        for (index, (term, df)) in doc_freq.into_iter().enumerate() {
            vocabulary.insert(term, index);
            idf.push(((1.0 + n_docs as f64) / (1.0 + df as f64)).ln() + 1.0);
        }
        Self { vocabulary, idf }
    }

    fn transform(&self, text: &str) -> SparseVector {
        let mut counts: BTreeMap<usize, f64> = BTreeMap::new();
        for term in ngrams(text) {
            if let Some(&index) = self.vocabulary.get(&term) {
                *counts.entry(index).or_default() += 1.0;
            }
        }
        let mut vector: SparseVector = counts
            .into_iter()
            .map(|(index, tf)| (index, tf * self.idf[index]))
            .collect();
        let norm = vector.iter().map(|(_, v)| v * v).sum::<f64>().sqrt();
        if norm > 0.0 {
            for (_, v) in &mut vector {
                *v /= norm;
            }
        }
        vector
    }

    fn len(&self) -> usize {
        self.idf.len()
    }
}

/// A trained intent model.
#[derive(Clone, Debug)]
pub struct IntentModel {
    vectorizer: TfidfVectorizer,
    classes: Vec<IntentKind>,
    /// One row per class, one column per vocabulary term.
    weights: Vec<Vec<f64>>,
    bias: Vec<f64>,
}

impl IntentModel {
    /// Train on the built-in phrase set.
    pub fn train_default() -> Self {
        Self::train(TRAINING_PHRASES)
    }

    /// Train on labelled phrases.
    pub fn train(samples: &[(&str, IntentKind)]) -> Self {
        let vectorizer = TfidfVectorizer::fit(samples.iter().map(|(text, _)| *text));
        let classes: Vec<IntentKind> = samples
            .iter()
            .map(|(_, kind)| *kind)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let features: Vec<SparseVector> = samples
            .iter()
            .map(|(text, _)| vectorizer.transform(text))
            .collect();
        let targets: Vec<usize> = samples
            .iter()
            .map(|(_, kind)| classes.iter().position(|c| c == kind).unwrap_or(0))
            .collect();

        let n_classes = classes.len();
        let n_features = vectorizer.len();
        let mut weights = vec![vec![0.0; n_features]; n_classes];
        let mut bias = vec![0.0; n_classes];

        if !samples.is_empty() {
            let n = samples.len() as f64;
            for _ in 0..EPOCHS {
                let mut grad_w = vec![vec![0.0; n_features]; n_classes];
                let mut grad_b = vec![0.0; n_classes];

                for (x, &target) in features.iter().zip(&targets) {
                    let probs = softmax(&logits(&weights, &bias, x));
                    for (class, p) in probs.iter().enumerate() {
                        let error = p - if class == target { 1.0 } else { 0.0 };
                        grad_b[class] += error;
                        for &(index, value) in x {
                            grad_w[class][index] += error * value;
                        }
                    }
                }

                for class in 0..n_classes {
                    bias[class] -= LEARNING_RATE * grad_b[class] / n;
                    for index in 0..n_features {
                        let gradient = grad_w[class][index] / n + L2_PENALTY * weights[class][index];
                        weights[class][index] -= LEARNING_RATE * gradient;
                    }
                }
            }
        }

        log::debug!(
            "Trained intent model: {} samples, {} classes, {} features",
            samples.len(),
            n_classes,
            n_features
        );

        Self {
            vectorizer,
            classes,
            weights,
            bias,
        }
    }

    /// Most probable intent kind and its probability.
    ///
    /// Returns `None` when the text shares no term with the training
    /// vocabulary.
    pub fn predict(&self, text: &str) -> Option<(IntentKind, f64)> {
        let x = self.vectorizer.transform(text);
        if x.is_empty() || self.classes.is_empty() {
            return None;
        }
        let probs = softmax(&logits(&self.weights, &self.bias, &x));
        probs
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(class, &p)| (self.classes[class], p))
    }

    /// Labels this model can predict.
    pub fn classes(&self) -> &[IntentKind] {
        &self.classes
    }
}

fn logits(weights: &[Vec<f64>], bias: &[f64], x: &SparseVector) -> Vec<f64> {
    weights
        .iter()
        .zip(bias)
        .map(|(row, b)| b + x.iter().map(|&(index, value)| row[index] * value).sum::<f64>())
        .collect()
}

fn softmax(logits: &[f64]) -> Vec<f64> {
    let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = logits.iter().map(|l| (l - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}
