//! Opens pages in the system PDF viewer.

use anyhow::{anyhow, Result};
use maestro_core::{page_url, Viewer};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Launchers tried in order when no command is configured.
const DEFAULT_OPENERS: &[&str] = &["xdg-open", "open"];

/// Launches an external program with a `file://...#page=N` URL.
///
/// The program is not waited on; a reaper thread collects its exit status.
#[derive(Clone, Debug)]
pub struct SystemViewer {
    program: PathBuf,
}

impl SystemViewer {
    /// Resolve `command` on `PATH`, or the first available default opener.
    pub fn detect(command: Option<&str>) -> Result<Self> {
        let candidates: Vec<&str> = match command {
            Some(command) => vec![command],
            None => DEFAULT_OPENERS.to_vec(),
        };
        for candidate in &candidates {
            if let Ok(program) = which::which(candidate) {
                return Ok(Self { program });
            }
        }
        Err(anyhow!("no PDF viewer found (tried {})", candidates.join(", ")))
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl Viewer for SystemViewer {
    fn open(&self, pdf_path: &Path, page: u32) -> maestro_core::Result<()> {
        let url = page_url(pdf_path, page);
        let mut child = Command::new(&self.program)
            .arg(&url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| maestro_core::Error::Viewer(format!("{}: {}", self.program.display(), e)))?;
        log::debug!("Opened {}", url);
        std::thread::spawn(move || {
            let _ = child.wait();
        });
        Ok(())
    }
}
