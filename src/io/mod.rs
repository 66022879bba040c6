//! Input providers.
//!
//! This module provides:
//! - `InputProvider`: Trait for input sources
//! - `FileInput`, `StdinInput`: Standard implementations
//! - `InMemorySource`: In-memory implementation for tests and embedding

mod input;
mod memory;
mod std_io;

pub use input::InputProvider;
pub use memory::InMemorySource;
pub use std_io::{FileInput, StdinInput};
