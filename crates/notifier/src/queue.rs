//! Image URL queue: a newline-delimited file consumed one line per run.
//!
//! Popping rewrites the remaining lines into a sibling `.tmp` file and renames
//! it over the queue. The rename is the only commit point: an interrupted pop
//! leaves the original file untouched and returns nothing.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("queue file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// File-backed FIFO of image URLs.
#[derive(Debug, Clone)]
pub struct ResourceQueue {
    path: PathBuf,
}

impl ResourceQueue {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove and return the first URL, or `None` when the queue is missing,
    /// empty, or unreadable. Failures are logged, never propagated.
    pub async fn pop_front(&self) -> Option<String> {
        match self.try_pop_front().await {
            Ok(Some(url)) => Some(url),
            Ok(None) => {
                tracing::warn!(path = %self.path.display(), "Image URL queue is empty");
                None
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to pop image URL");
                None
            }
        }
    }

    /// Remove and return the first URL.
    ///
    /// Blank lines are dropped and the survivors trimmed. When nothing is left
    /// after trimming the file is not rewritten and `Ok(None)` is returned.
    pub async fn try_pop_front(&self) -> Result<Option<String>, QueueError> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(QueueError::NotFound(self.path.clone()));
            }
            Err(e) => return Err(self.io_error(e)),
        };

        let mut lines = contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty());

        let Some(first) = lines.next() else {
            return Ok(None);
        };
        let remaining: Vec<&str> = lines.collect();

        let mut rewritten = remaining.join("\n");
        if !rewritten.is_empty() {
            rewritten.push('\n');
        }

        let tmp_path = self.tmp_path();
        tokio::fs::write(&tmp_path, rewritten.as_bytes())
            .await
            .map_err(|e| self.io_error(e))?;
        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .map_err(|e| self.io_error(e))?;

        tracing::info!(
            url = first,
            remaining = remaining.len(),
            "Popped image URL from queue"
        );

        Ok(Some(first.to_string()))
    }

    /// Sibling temp file, so the rename never crosses a filesystem boundary.
    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn io_error(&self, source: std::io::Error) -> QueueError {
        QueueError::Io {
            path: self.path.clone(),
            source,
        }
    }
}
