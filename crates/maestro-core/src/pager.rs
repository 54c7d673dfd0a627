//! Sheet music page position and the viewer collaborator.

use crate::error::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Current page of a loaded PDF.
///
/// Pages are 1-based and never drop below 1. When the page count is known,
/// moving forward stops at the last page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PagerState {
    pdf_path: PathBuf,
    current_page: u32,
    total_pages: Option<u32>,
}

impl PagerState {
    /// A pager at page 1. The path is not checked.
    pub fn new(pdf_path: impl Into<PathBuf>) -> Self {
        Self {
            pdf_path: pdf_path.into(),
            current_page: 1,
            total_pages: None,
        }
    }

    /// A pager for a PDF that must exist on disk.
    pub fn open(pdf_path: impl Into<PathBuf>) -> Result<Self> {
        let pdf_path = pdf_path.into();
        if !pdf_path.is_file() {
            return Err(Error::PdfNotFound(pdf_path.display().to_string()));
        }
        Ok(Self::new(pdf_path))
    }

    pub fn with_total_pages(mut self, total_pages: Option<u32>) -> Self {
        self.total_pages = total_pages.filter(|&n| n > 0);
        self
    }

    pub fn pdf_path(&self) -> &Path {
        &self.pdf_path
    }

    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    pub fn total_pages(&self) -> Option<u32> {
        self.total_pages
    }

    /// Advance one page. Returns the new page.
    pub fn next_page(&mut self) -> u32 {
        self.goto_page(self.current_page.saturating_add(1))
    }

    /// Go back one page; stays on page 1. Returns the new page.
    pub fn prev_page(&mut self) -> u32 {
        self.goto_page(self.current_page.saturating_sub(1))
    }

    /// Jump to a page, clamped to `[1, total_pages]`. Returns the new page.
    pub fn goto_page(&mut self, page: u32) -> u32 {
        let upper = self.total_pages.unwrap_or(u32::MAX);
        self.current_page = page.clamp(1, upper);
        self.current_page
    }
}

/// Displays a page of a PDF.
///
/// Implementations must not block on the viewer: launching is
/// fire-and-forget from the dispatcher's point of view.
pub trait Viewer: Send + Sync {
    fn open(&self, pdf_path: &Path, page: u32) -> Result<()>;
}

/// A viewer that only logs.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullViewer;

impl Viewer for NullViewer {
    fn open(&self, pdf_path: &Path, page: u32) -> Result<()> {
        log::debug!("Viewer disabled: {} page {}", pdf_path.display(), page);
        Ok(())
    }
}

/// First `*.pdf` in `dir`, by file name. `Ok(None)` when there is none.
pub fn discover_pdf(dir: &Path) -> Result<Option<PathBuf>> {
    let mut pdfs = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_pdf = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
        if is_pdf && path.is_file() {
            pdfs.push(path);
        }
    }
    pdfs.sort();
    Ok(pdfs.into_iter().next())
}

/// `file://` URL with a `#page=N` fragment, understood by browsers and
/// most PDF viewers.
pub fn page_url(pdf_path: &Path, page: u32) -> String {
    let absolute = std::path::absolute(pdf_path).unwrap_or_else(|_| pdf_path.to_path_buf());
    format!("file://{}#page={}", absolute.display(), page)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prev_page_stops_at_one() {
        let mut pager = PagerState::new("score.pdf");
        assert_eq!(pager.prev_page(), 1);
        assert_eq!(pager.prev_page(), 1);
        assert_eq!(pager.next_page(), 2);
        assert_eq!(pager.prev_page(), 1);
    }

    #[test]
    fn test_goto_page_clamps() {
        let mut pager = PagerState::new("score.pdf");
        assert_eq!(pager.goto_page(0), 1);
        assert_eq!(pager.goto_page(42), 42);

        let mut pager = PagerState::new("score.pdf").with_total_pages(Some(3));
        assert_eq!(pager.goto_page(10), 3);
        assert_eq!(pager.next_page(), 3);
        assert_eq!(pager.prev_page(), 2);
    }

    #[test]
    fn test_zero_total_pages_ignored() {
        let pager = PagerState::new("score.pdf").with_total_pages(Some(0));
        assert_eq!(pager.total_pages(), None);
    }

    #[test]
    fn test_open_requires_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.pdf");
        assert!(matches!(PagerState::open(&missing), Err(Error::PdfNotFound(_))));

        let present = dir.path().join("etude.pdf");
        std::fs::write(&present, b"%PDF-1.4").unwrap();
        let pager = PagerState::open(&present).unwrap();
        assert_eq!(pager.current_page(), 1);
        assert_eq!(pager.pdf_path(), present.as_path());
    }

    #[test]
    fn test_discover_pdf_picks_first_by_name() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(discover_pdf(dir.path()).unwrap(), None);

        std::fs::write(dir.path().join("notes.txt"), b"").unwrap();
        std::fs::write(dir.path().join("sonata.pdf"), b"%PDF").unwrap();
        std::fs::write(dir.path().join("etude.PDF"), b"%PDF").unwrap();
        std::fs::create_dir(dir.path().join("archive.pdf")).unwrap();

        let found = discover_pdf(dir.path()).unwrap().unwrap();
        assert_eq!(found.file_name().unwrap(), "etude.PDF");
    }

    #[test]
    fn test_discover_pdf_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(discover_pdf(&dir.path().join("nope")), Err(Error::Io(_))));
    }

    #[test]
    fn test_page_url() {
        let url = page_url(Path::new("/music/etude.pdf"), 4);
        assert_eq!(url, "file:///music/etude.pdf#page=4");
    }
}
