//! Screenshot artifacts

use crate::error::Result;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use stepwright_browser::Page;
use tracing::info;

/// Writes full-page screenshots into one directory.
///
/// Unnamed captures are numbered `screenshot_1.png`, `screenshot_2.png`, ...
/// in capture order.
#[derive(Debug)]
pub struct ArtifactStore {
    dir: PathBuf,
    counter: AtomicU32,
    full_page: bool,
}

impl ArtifactStore {
    /// Create a store writing into `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            counter: AtomicU32::new(1),
            full_page: true,
        }
    }

    /// Capture only the viewport instead of the full page
    #[must_use]
    pub fn with_full_page(mut self, full_page: bool) -> Self {
        self.full_page = full_page;
        self
    }

    /// Target directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path for the next capture
    fn next_path(&self, name: Option<&str>) -> PathBuf {
        let file = match name.map(sanitize).filter(|n| !n.is_empty()) {
            Some(name) if name.ends_with(".png") => name,
            Some(name) => format!("{}.png", name),
            None => format!(
                "screenshot_{}.png",
                self.counter.fetch_add(1, Ordering::SeqCst)
            ),
        };
        self.dir.join(file)
    }

    /// Capture `page`, returning the written path
    pub async fn capture(&self, page: &dyn Page, name: Option<&str>) -> Result<PathBuf> {
        let path = self.next_path(name);
        page.screenshot(&path, self.full_page).await?;
        info!(path = %path.display(), "screenshot saved");
        Ok(path)
    }
}

/// Keep names inside the directory
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '\0' => '_',
            c => c,
        })
        .collect::<String>()
        .trim_start_matches('.')
        .to_string()
}
