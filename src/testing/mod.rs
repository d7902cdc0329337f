//! Test harness utilities.
//!
//! Deterministic PCM generators and in-memory implementations of the
//! acquisition and record-sink seams, so the full measurement loop can run in
//! unit and integration tests without audio hardware or scratch files.

pub mod memory;
pub mod signals;

pub use memory::{MemorySink, MemorySource};
pub use signals::{generate_pcm, write_pcm_wav, SyntheticSignal};
