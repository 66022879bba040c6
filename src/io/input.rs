//! Input provider trait definition.

use std::fmt::Debug;
use std::io::Read;

/// A source a reader can open.
///
/// The engine opens the provider and hands the stream to a reader, which owns
/// and drops it. Callers that pass their own `Read` to a reader directly keep
/// ownership of whatever that wraps.
pub trait InputProvider: Send + Sync + Debug {
    /// Identifier written into error records.
    ///
    /// Convention: "-" for stdin, file path for files.
    fn id(&self) -> &str;

    /// Open a fresh stream positioned at the beginning.
    fn open(&self) -> std::io::Result<Box<dyn Read + Send>>;

    /// Total length in bytes, when cheaply known.
    fn len_hint(&self) -> Option<u64> {
        None
    }
}
