//! Console output for ticks and assistant announcements.

use anyhow::{Context, Result};
use crossbeam_channel::{never, select, unbounded, Receiver, Sender};
use maestro_core::Tick;
use std::thread::{self, JoinHandle};

/// Print an assistant response.
pub fn say(text: &str) {
    println!("{}", assistant_line(text));
}

fn assistant_line(text: &str) -> String {
    format!("[Assistant] {}", text)
}

/// Beats are capitalised; the downbeat also shows the tempo.
fn tick_line(tick: &Tick) -> String {
    if tick.count == 1 {
        format!("[Tick] 1 ({} BPM, {})", tick.bpm, tick.subdivision)
    } else if tick.on_beat {
        format!("[Tick] {}", tick.count)
    } else {
        format!("[tick] {}", tick.count)
    }
}

/// Background printer for the metronome and fired page turns.
pub struct Output {
    stop_tx: Sender<()>,
    thread: Option<JoinHandle<()>>,
}

impl Output {
    pub fn spawn(ticks: Receiver<Tick>, announcements: Receiver<String>) -> Result<Self> {
        let (stop_tx, stop_rx) = unbounded();
        let thread = thread::Builder::new()
            .name("output".to_string())
            .spawn(move || run(ticks, announcements, stop_rx))
            .context("Failed to spawn output thread")?;
        Ok(Self {
            stop_tx,
            thread: Some(thread),
        })
    }

    pub fn shutdown(&mut self) {
        let _ = self.stop_tx.send(());
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Output {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run(mut ticks: Receiver<Tick>, mut announcements: Receiver<String>, stop_rx: Receiver<()>) {
    loop {
        select! {
            recv(ticks) -> tick => match tick {
                Ok(tick) => {
                    println!("{}", tick_line(&tick));
                    log::trace!("Tick {} printed {:?} after it was due", tick.count, tick.at.elapsed());
                }
                Err(_) => ticks = never(),
            },
            recv(announcements) -> text => match text {
                Ok(text) => say(&text),
                Err(_) => announcements = never(),
            },
            recv(stop_rx) -> _ => break,
        }
    }
}
