//! Input specifications.

use std::path::Path;
use std::sync::Arc;

use crate::format::{FormatError, FormatKind};
use crate::io::{FileInput, InputProvider, InMemorySource};

/// Specification for a single input source.
#[derive(Debug, Clone)]
pub struct InputSpec {
    /// Raw input argument or configuration string
    pub raw: String,
    /// The input provider implementation
    pub provider: Arc<dyn InputProvider>,
    /// Explicitly specified format (if any)
    pub explicit_format: Option<FormatKind>,
}

impl InputSpec {
    /// Create a new input specification.
    pub fn new(raw: impl Into<String>, provider: Arc<dyn InputProvider>) -> Self {
        Self {
            raw: raw.into(),
            provider,
            explicit_format: None,
        }
    }

    /// Input backed by a file; the format defaults to the file extension.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        Self::new(
            path.to_string_lossy(),
            Arc::new(FileInput::new(path.to_path_buf())),
        )
    }

    /// In-memory input with an explicit format.
    pub fn from_text(id: impl Into<String>, format: FormatKind, text: impl Into<String>) -> Self {
        let id = id.into();
        Self::new(id.clone(), Arc::new(InMemorySource::from_string(id, text))).with_format(format)
    }

    /// Set the explicit format.
    pub fn with_format(mut self, format: FormatKind) -> Self {
        self.explicit_format = Some(format);
        self
    }

    /// The input's extension, lowercased.
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.raw)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
    }

    /// The explicit format, or the one implied by the input's extension.
    pub fn resolve_format(&self) -> Result<FormatKind, FormatError> {
        self.explicit_format
            .or_else(|| FormatKind::from_path(&self.raw))
            .ok_or_else(|| FormatError::NoFormatMatched(self.raw.clone()))
    }
}
