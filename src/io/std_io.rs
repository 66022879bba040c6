//! File and stdin inputs.

use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

use super::InputProvider;

/// Reads the process's standard input.
///
/// Stdin can be opened once in practice; a second read sees whatever is
/// left of the stream.
#[derive(Debug, Clone)]
pub struct StdinInput {
    label: String,
}

impl StdinInput {
    pub fn new() -> Self {
        Self::labelled("-")
    }

    /// Stdin reported under another name in error records.
    pub fn labelled(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }
}

impl Default for StdinInput {
    fn default() -> Self {
        Self::new()
    }
}

impl InputProvider for StdinInput {
    fn id(&self) -> &str {
        &self.label
    }

    fn open(&self) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(io::stdin()))
    }
}

/// A file on disk. Its path is the record identifier and its size drives
/// percentage progress.
#[derive(Debug, Clone)]
pub struct FileInput {
    label: String,
    path: PathBuf,
}

impl FileInput {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            label: path.display().to_string(),
            path,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl InputProvider for FileInput {
    fn id(&self) -> &str {
        &self.label
    }

    fn open(&self) -> io::Result<Box<dyn Read + Send>> {
        let file = File::open(&self.path)?;
        Ok(Box::new(BufReader::new(file)))
    }

    fn len_hint(&self) -> Option<u64> {
        match fs::metadata(&self.path) {
            Ok(meta) if meta.is_file() => Some(meta.len()),
            Ok(_) => None,
            Err(e) => {
                log::debug!("no size for {}: {}", self.path.display(), e);
                None
            }
        }
    }
}
