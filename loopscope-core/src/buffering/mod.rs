//! Scope capture buffers.
//!
//! The render callback is the only writer; display consumers read through a
//! [`ScopeReader`]. Writes are wait-free and allocation-free, reads never
//! hold up the writer.

pub mod scope;

pub use scope::{ScopeChannel, ScopeReader, ScopeRingBuffer, DEFAULT_SCOPE_CAPACITY};
