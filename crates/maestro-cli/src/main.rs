//! maestro - hands-free metronome and page turner.
//!
//! Reads commands as text lines ("set tempo to 120", "turn page in 4 bars"),
//! classifies them and applies them to the practice session. Metronome ticks
//! and scheduled page turns are printed as they happen.

mod input;
mod output;
mod viewer;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use input::{Gated, LineReader, WakeWordGate};
use maestro_core::{
    discover_pdf, Config, Dispatcher, Intent, Metronome, NullViewer, PagerState, Session,
    SessionManager, Viewer,
};
use output::{say, Output};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use viewer::SystemViewer;

#[derive(Parser, Debug)]
#[command(name = "maestro")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Voice-style commands for a metronome and sheet music page turner", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Config file path (default: ~/.config/maestro/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Sheet music PDF (default: first PDF in the music directory)
    #[arg(long, value_name = "FILE")]
    pdf: Option<PathBuf>,

    /// Initial tempo in BPM
    #[arg(long)]
    bpm: Option<u32>,

    /// Use only the pattern rules, no statistical model
    #[arg(long)]
    no_model: bool,

    /// Minimum model confidence (0.0-1.0)
    #[arg(long)]
    threshold: Option<f64>,

    /// Only accept commands after this word
    #[arg(long)]
    wake_word: Option<String>,

    /// Do not launch a PDF viewer
    #[arg(long)]
    no_viewer: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a default configuration file
    Init,
    /// Show the configuration file path
    ConfigPath,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .init();

    match cli.command {
        Some(Commands::Init) => {
            let path = Config::create_default_config_file()?;
            println!("Created default config at: {}", path.display());
            return Ok(());
        }
        Some(Commands::ConfigPath) => {
            let path = Config::config_path()?;
            println!("{}", path.display());
            return Ok(());
        }
        None => {}
    }

    let config = load_config(&cli)?;
    let pager = open_pager(cli.pdf.as_deref(), &config)?;
    run(config, pager)
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::load_or_default(),
    };
    apply_overrides(&mut config, cli);
    Ok(config)
}

fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(bpm) = cli.bpm {
        config.tempo.bpm = bpm;
    }
    if cli.no_model {
        config.classifier.use_model = false;
    }
    if let Some(threshold) = cli.threshold {
        config.classifier.confidence_threshold = threshold.clamp(0.0, 1.0);
    }
    if let Some(wake_word) = &cli.wake_word {
        config.input.wake_word = Some(wake_word.clone());
    }
    if cli.no_viewer {
        config.viewer.enabled = false;
    }
}

/// The pager for an explicit PDF, or the first one in the music directory.
fn open_pager(pdf: Option<&Path>, config: &Config) -> Result<Option<PagerState>> {
    let path = match pdf {
        Some(path) => {
            if !path.is_file() {
                bail!("PDF not found: {}", path.display());
            }
            path.to_path_buf()
        }
        None => match discover_pdf(&config.pager.music_dir) {
            Ok(Some(path)) => path,
            Ok(None) => return Ok(None),
            Err(e) => {
                log::debug!(
                    "Could not search {} for PDFs: {}",
                    config.pager.music_dir.display(),
                    e
                );
                return Ok(None);
            }
        },
    };
    log::info!("Using sheet music {}", path.display());
    Ok(Some(PagerState::open(path)?.with_total_pages(config.pager.total_pages)))
}

fn build_viewer(config: &Config) -> Arc<dyn Viewer> {
    if !config.viewer.enabled {
        return Arc::new(NullViewer);
    }
    match SystemViewer::detect(config.viewer.command.as_deref()) {
        Ok(viewer) => {
            log::info!("Opening pages with {}", viewer.program().display());
            Arc::new(viewer)
        }
        Err(e) => {
            log::warn!("Viewer disabled: {}", e);
            Arc::new(NullViewer)
        }
    }
}

fn run(config: Config, pager: Option<PagerState>) -> Result<()> {
    let classifier = config.build_classifier()?;
    if classifier.has_model() {
        say("NLU: statistical intent model ready");
        log::info!("Model confidence threshold {:.2}", classifier.threshold());
    } else {
        say("NLU: using rule-based intents");
    }

    let (metronome, ticks) = Metronome::spawn(config.tempo_state())?;
    let session = SessionManager::new(Session::new(metronome, pager));
    let (mut dispatcher, announcements) = Dispatcher::new(session, build_viewer(&config))?;
    let mut output = Output::spawn(ticks, announcements)?;

    match dispatcher.show_current_page() {
        Some(page) => say(&format!("Opening page {}.", page)),
        None => say(&format!(
            "No PDF found in {}; page commands are disabled.",
            config.pager.music_dir.display()
        )),
    }

    let mut gate = WakeWordGate::new(config.input.wake_word.as_deref());
    match gate.wake_word() {
        Some(word) => println!("[Text Mode] Say '{}' before each command, or type 'quit'.", word),
        None => println!("[Text Mode] Type commands (or 'quit')."),
    }

    let stdin = io::stdin();
    let mut reader = LineReader::new(stdin.lock(), config.input.prompt.clone());
    let result = input_loop(&mut reader, &mut gate, &classifier, &dispatcher);

    dispatcher.shutdown();
    drop(dispatcher);
    output.shutdown();
    result
}

fn input_loop<R: io::BufRead>(
    reader: &mut LineReader<R>,
    gate: &mut WakeWordGate,
    classifier: &maestro_core::Classifier,
    dispatcher: &Dispatcher,
) -> Result<()> {
    loop {
        let Some(utterance) = reader.next_utterance()? else {
            // End of input quits without needing the wake word
            say(&dispatcher.dispatch(&Intent::Quit).text);
            return Ok(());
        };

        let text = match gate.filter(&utterance) {
            Gated::Command(text) => text,
            Gated::Awake => {
                say("Yes?");
                continue;
            }
            Gated::Ignored => continue,
        };

        let classified = classifier.classify(&text);
        log::info!("Intent: {}", classified);
        let response = dispatcher.dispatch(&classified.intent);
        say(&response.text);
        if response.is_quit() {
            return Ok(());
        }
    }
}
