//! Text input and wake word gating.

use std::io::{self, BufRead, Write};

/// Reads utterances line by line, skipping blank lines.
pub struct LineReader<R> {
    reader: R,
    prompt: String,
}

impl<R: BufRead> LineReader<R> {
    pub fn new(reader: R, prompt: impl Into<String>) -> Self {
        Self {
            reader,
            prompt: prompt.into(),
        }
    }

    /// Next non-empty utterance, or `None` at end of input.
    ///
    /// Bytes that are not valid UTF-8 are replaced, not rejected.
    pub fn next_utterance(&mut self) -> io::Result<Option<String>> {
        let mut buf = Vec::new();
        loop {
            if !self.prompt.is_empty() {
                print!("{}", self.prompt);
                io::stdout().flush()?;
            }
            buf.clear();
            if self.reader.read_until(b'\n', &mut buf)? == 0 {
                return Ok(None);
            }
            let line = String::from_utf8_lossy(&buf);
            let trimmed = line.trim();
            if !trimmed.is_empty() {
                return Ok(Some(trimmed.to_string()));
            }
        }
    }
}

/// What the gate made of an utterance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Gated {
    /// Pass this text on to the classifier.
    Command(String),
    /// The wake word alone; the next utterance will be accepted.
    Awake,
    /// No wake word heard; drop the utterance.
    Ignored,
}

/// Accepts an utterance only right after the wake word.
///
/// The wake word may lead the command ("maestro next page") or come on its
/// own in the preceding utterance. Without a wake word every utterance
/// passes.
#[derive(Clone, Debug, Default)]
pub struct WakeWordGate {
    wake_word: Option<String>,
    awake: bool,
}

impl WakeWordGate {
    pub fn new(wake_word: Option<&str>) -> Self {
        let wake_word = wake_word
            .map(|w| w.trim().to_lowercase())
            .filter(|w| !w.is_empty());
        Self {
            wake_word,
            awake: false,
        }
    }

    pub fn wake_word(&self) -> Option<&str> {
        self.wake_word.as_deref()
    }

    pub fn filter(&mut self, utterance: &str) -> Gated {
        let Some(wake_word) = &self.wake_word else {
            return Gated::Command(utterance.to_string());
        };

        let words: Vec<&str> = utterance.split_whitespace().collect();
        let position = words.iter().position(|word| {
            word.trim_matches(|c: char| !c.is_alphanumeric())
                .eq_ignore_ascii_case(wake_word)
        });

        match position {
            Some(index) => {
                let rest = words[index + 1..].join(" ");
                let rest = rest.trim_start_matches([',', '.', '!', ':']).trim();
                if rest.is_empty() {
                    self.awake = true;
                    Gated::Awake
                } else {
                    self.awake = false;
                    Gated::Command(rest.to_string())
                }
            }
            None if self.awake => {
                self.awake = false;
                Gated::Command(utterance.to_string())
            }
            None => {
                log::debug!("Ignoring '{}' (no wake word)", utterance);
                Gated::Ignored
            }
        }
    }
}
