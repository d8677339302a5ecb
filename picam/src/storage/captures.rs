//! Capture directory: naming, numbering and lookup of still captures.
//!
//! Captures are flat files named `capture_<n>.jpg`. There is no index; the
//! directory listing is the source of truth.

use std::path::{Component, Path, PathBuf};

use tracing::debug;

use crate::errors::ServiceError;
use crate::filesys::dir::Dir;
use crate::filesys::file::File;

const CAPTURE_PREFIX: &str = "capture_";
const CAPTURE_EXTENSION: &str = ".jpg";

/// Build the file name for capture number `n`
pub fn capture_filename(n: u64) -> String {
    format!("{CAPTURE_PREFIX}{n}{CAPTURE_EXTENSION}")
}

/// Parse the sequence number out of a `capture_<n>.jpg` file name.
///
/// Returns `None` for anything that does not follow the pattern exactly.
pub fn parse_capture_number(name: &str) -> Option<u64> {
    let digits = name
        .strip_prefix(CAPTURE_PREFIX)?
        .strip_suffix(CAPTURE_EXTENSION)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Store of still captures backed by a single directory
#[derive(Debug, Clone)]
pub struct CaptureStore {
    dir: Dir,
}

impl CaptureStore {
    pub fn new(dir: Dir) -> Self {
        Self { dir }
    }

    /// The backing directory
    pub fn dir(&self) -> &Dir {
        &self.dir
    }

    /// Create the capture directory if it does not exist yet
    pub async fn setup(&self) -> Result<(), ServiceError> {
        self.dir.create().await
    }

    /// All conforming captures, sorted by ascending sequence number
    pub async fn list_captures(&self) -> Result<Vec<(u64, String)>, ServiceError> {
        let mut captures: Vec<(u64, String)> = self
            .dir
            .list_file_names()
            .await?
            .into_iter()
            .filter_map(|name| parse_capture_number(&name).map(|n| (n, name)))
            .collect();
        captures.sort_unstable_by_key(|(n, _)| *n);
        Ok(captures)
    }

    /// Next free sequence number: highest existing number plus one, or 1 for
    /// an empty directory.
    pub async fn next_capture_number(&self) -> Result<u64, ServiceError> {
        let captures = self.list_captures().await?;
        let max = captures.last().map(|(n, _)| *n).unwrap_or(0);
        Ok(max + 1)
    }

    /// File name of the highest-numbered capture
    pub async fn latest_capture(&self) -> Result<String, ServiceError> {
        self.list_captures()
            .await?
            .pop()
            .map(|(_, name)| name)
            .ok_or_else(|| ServiceError::NotFound("No captures found".to_string()))
    }

    /// Path a capture with sequence number `n` is written to
    pub fn capture_path(&self, n: u64) -> PathBuf {
        self.dir.path().join(capture_filename(n))
    }

    /// Resolve a client-supplied file name to a file inside the capture
    /// directory. Anything other than a single plain path component is
    /// rejected, as are hidden names and files that do not exist.
    pub async fn resolve(&self, filename: &str) -> Result<File, ServiceError> {
        if !is_plain_file_name(filename) {
            debug!("Rejected capture file name: {:?}", filename);
            return Err(ServiceError::NotFound(format!(
                "File not found: {}",
                filename
            )));
        }

        let file = self.dir.file(filename);
        if !file.is_file().await {
            return Err(ServiceError::NotFound(format!(
                "File not found: {}",
                filename
            )));
        }
        Ok(file)
    }
}

fn is_plain_file_name(name: &str) -> bool {
    if name.is_empty() || name.starts_with('.') || name.contains(['/', '\\', '\0']) {
        return false;
    }
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}
