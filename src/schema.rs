//! Ordered field names of a tabular source.

use std::collections::HashSet;

/// Field names in source order, fixed once per read.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Schema {
    names: Vec<String>,
}

impl Schema {
    /// Create a schema from explicit names, used as given.
    pub fn new<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Self {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Build a schema from a header row.
    ///
    /// Blank names are replaced with their synthetic name and duplicates get a
    /// numeric suffix (`name_2`, `name_3`, ...).
    pub fn from_header<S: AsRef<str>>(header: &[S]) -> Self {
        let mut seen = HashSet::new();
        let mut names = Vec::with_capacity(header.len());
        for (i, raw) in header.iter().enumerate() {
            let trimmed = raw.as_ref().trim();
            let base = if trimmed.is_empty() {
                synthetic_name(i)
            } else {
                trimmed.to_string()
            };
            let mut name = base.clone();
            let mut n = 2;
            while !seen.insert(name.clone()) {
                name = format!("{}_{}", base, n);
                n += 1;
            }
            names.push(name);
        }
        Self { names }
    }

    /// `Column1..ColumnN`.
    pub fn synthetic(len: usize) -> Self {
        Self {
            names: (0..len).map(synthetic_name).collect(),
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Position of a field by exact name.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }
}

fn synthetic_name(index: usize) -> String {
    format!("Column{}", index + 1)
}
