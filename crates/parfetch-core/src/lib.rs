//! parfetch Core - Download Engine
//!
//! This crate provides the partitioned download engine: it probes a URL,
//! fetches byte ranges of the resource concurrently into part files and
//! merges them into the destination, falling back to a single streaming
//! request when the server cannot serve ranges.

mod config;
mod engine;
mod error;

#[cfg(test)]
mod test_server;

pub use config::*;
pub use engine::*;
pub use error::*;

pub use parfetch_types as types;
