//! Configuration file support for maestro
//!
//! Configuration is stored in TOML format at:
//! - Linux: `~/.config/maestro/config.toml`
//! - macOS: `~/Library/Application Support/maestro/config.toml`
//! - Windows: `%APPDATA%\maestro\config.toml`

use crate::classifier::{Classifier, DEFAULT_CONFIDENCE_THRESHOLD};
use crate::error::{Error, Result};
use crate::timing::{Subdivision, TempoState, DEFAULT_BPM};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Initial tempo
    pub tempo: TempoSettings,
    /// Intent classification
    pub classifier: ClassifierSettings,
    /// Sheet music location
    pub pager: PagerSettings,
    /// Text input
    pub input: InputSettings,
    /// PDF viewer launching
    pub viewer: ViewerSettings,
}

impl Config {
    /// Load configuration from the default config file location
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            Err(Error::Config(format!("Config file not found at {:?}", path)))
        }
    }

    /// Load configuration from an explicit path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration or return default if not found
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }

    /// Save configuration to the default config file location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Save configuration to an explicit path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path
    pub fn config_path() -> Result<PathBuf> {
        if let Some(proj_dirs) = ProjectDirs::from("", "", "maestro") {
            Ok(proj_dirs.config_dir().join("config.toml"))
        } else {
            Err(Error::Config("Could not determine config directory".to_string()))
        }
    }

    /// Create a default config file with comments
    pub fn create_default_config_file() -> Result<PathBuf> {
        let path = Self::config_path()?;
        Self::write_default_config(&path)?;
        Ok(path)
    }

    /// Write the commented default config to `path`
    pub fn write_default_config(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, DEFAULT_CONFIG)?;
        Ok(())
    }

    /// Initial tempo state for the metronome
    pub fn tempo_state(&self) -> TempoState {
        TempoState::new(self.tempo.bpm as i64, self.tempo.subdivision)
    }

    /// Build the classifier these settings describe
    pub fn build_classifier(&self) -> Result<Classifier> {
        if self.classifier.use_model {
            Classifier::trained(self.classifier.confidence_threshold)
        } else {
            Classifier::rules_only()
        }
    }
}

const DEFAULT_CONFIG: &str = r#"# maestro configuration file

[tempo]
# Initial tempo in BPM (20-300)
bpm = 100

# Ticks per beat: "quarter", "eighth", "triplet" or "sixteenth"
subdivision = "quarter"

[classifier]
# Train the statistical intent model at startup
use_model = true

# Minimum model probability before falling back to the pattern rules
confidence_threshold = 0.45

[pager]
# Directory searched for a PDF when none is given on the command line
music_dir = "music"

# Page count of the score, if known; page navigation stops at the last page
# total_pages = 12

[input]
# Only act on utterances that contain this word (optional)
# wake_word = "maestro"

# Prompt shown before each line of input
prompt = "You: "

[viewer]
# Open pages in a PDF viewer
enabled = true

# Viewer command; receives a file://...#page=N URL (default: xdg-open / open)
# command = "firefox"
"#;

/// Tempo settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TempoSettings {
    /// Initial BPM, clamped to the valid range on use
    pub bpm: u32,
    /// Initial subdivision
    pub subdivision: Subdivision,
}

impl Default for TempoSettings {
    fn default() -> Self {
        Self {
            bpm: DEFAULT_BPM,
            subdivision: Subdivision::Quarter,
        }
    }
}

/// Classifier settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierSettings {
    pub use_model: bool,
    pub confidence_threshold: f64,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            use_model: true,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
        }
    }
}

/// Pager settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PagerSettings {
    pub music_dir: PathBuf,
    pub total_pages: Option<u32>,
}

impl Default for PagerSettings {
    fn default() -> Self {
        Self {
            music_dir: PathBuf::from("music"),
            total_pages: None,
        }
    }
}

/// Input settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputSettings {
    pub wake_word: Option<String>,
    pub prompt: String,
}

impl Default for InputSettings {
    fn default() -> Self {
        Self {
            wake_word: None,
            prompt: "You: ".to_string(),
        }
    }
}

/// Viewer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerSettings {
    pub enabled: bool,
    pub command: Option<String>,
}

impl Default for ViewerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            command: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.tempo.bpm, 100);
        assert_eq!(config.tempo.subdivision, Subdivision::Quarter);
        assert!(config.classifier.use_model);
        assert_eq!(config.classifier.confidence_threshold, 0.45);
        assert_eq!(config.pager.music_dir, PathBuf::from("music"));
        assert!(config.input.wake_word.is_none());
        assert!(config.viewer.enabled);
    }

    #[test]
    fn test_commented_default_matches_default() {
        let parsed: Config = toml::from_str(DEFAULT_CONFIG).unwrap();
        assert_eq!(parsed, Config::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let parsed: Config = toml::from_str(
            r#"
            [tempo]
            subdivision = "triplet"

            [input]
            wake_word = "maestro"
            "#,
        )
        .unwrap();
        assert_eq!(parsed.tempo.bpm, 100);
        assert_eq!(parsed.tempo.subdivision, Subdivision::Triplet);
        assert_eq!(parsed.input.wake_word.as_deref(), Some("maestro"));
        assert_eq!(parsed.input.prompt, "You: ");
    }

    #[test]
    fn test_save_and_load_from() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.tempo.bpm = 132;
        config.viewer.command = Some("zathura".to_string());
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[tempo]\nbpm = \"fast\"\n").unwrap();
        assert!(matches!(Config::load_from(&path), Err(Error::TomlParse(_))));
        assert!(matches!(
            Config::load_from(&dir.path().join("missing.toml")),
            Err(Error::Io(_))
        ));
    }

    #[test]
    fn test_tempo_state_is_clamped() {
        let mut config = Config::default();
        config.tempo.bpm = 5;
        assert_eq!(config.tempo_state().bpm(), 20);
    }

    #[test]
    fn test_build_classifier() {
        let mut config = Config::default();
        config.classifier.use_model = false;
        assert!(!config.build_classifier().unwrap().has_model());
    }
}
