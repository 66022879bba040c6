//! Guard rail ceilings. A value of `0` disables a check.

use serde::{Deserialize, Serialize};

/// Ceilings checked at every CSV record boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CsvLimits {
    pub max_columns: usize,
    /// Raw record length in bytes, excluding the line terminator
    pub max_record_length: usize,
}

impl CsvLimits {
    pub fn with_max_columns(mut self, max: usize) -> Self {
        self.max_columns = max;
        self
    }

    pub fn with_max_record_length(mut self, max: usize) -> Self {
        self.max_record_length = max;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.max_columns > 0 || self.max_record_length > 0
    }
}

/// Ceilings checked per JSON element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct JsonLimits {
    pub max_elements: u64,
    /// Exact source bytes of one element
    pub max_element_bytes: usize,
    /// Characters in any string, keys included, at any depth
    pub max_string_length: usize,
}

impl JsonLimits {
    pub fn with_max_elements(mut self, max: u64) -> Self {
        self.max_elements = max;
        self
    }

    pub fn with_max_element_bytes(mut self, max: usize) -> Self {
        self.max_element_bytes = max;
        self
    }

    pub fn with_max_string_length(mut self, max: usize) -> Self {
        self.max_string_length = max;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.max_elements > 0 || self.max_element_bytes > 0 || self.max_string_length > 0
    }
}

/// Ceilings checked on the YAML event stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct YamlLimits {
    /// Container nesting depth; the record root is depth 1
    pub max_depth: usize,
    /// Documents, or elements of a root sequence
    pub max_documents: u64,
    /// Characters in one scalar
    pub max_scalar_length: usize,
}

impl YamlLimits {
    pub fn with_max_depth(mut self, max: usize) -> Self {
        self.max_depth = max;
        self
    }

    pub fn with_max_documents(mut self, max: u64) -> Self {
        self.max_documents = max;
        self
    }

    pub fn with_max_scalar_length(mut self, max: usize) -> Self {
        self.max_scalar_length = max;
        self
    }
}

/// Limits for every format, as carried by a reader configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardRailLimits {
    pub csv: CsvLimits,
    pub json: JsonLimits,
    pub yaml: YamlLimits,
}
