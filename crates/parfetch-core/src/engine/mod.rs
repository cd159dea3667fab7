//! Download Engine
//!
//! Splits a remote resource into byte ranges, fetches them in parallel
//! into part files and merges the parts into the destination:
//! - Capability probing (HEAD, then a one-byte ranged GET)
//! - Pure range planning
//! - One streaming worker per part
//! - Ordered merge with cleanup on every exit path

mod download_task;
mod manager;
mod merge;
mod part_worker;
mod planner;
mod prober;
mod staging;

pub use download_task::*;
pub use manager::*;
pub use merge::*;
pub use part_worker::*;
pub use planner::*;
pub use prober::*;
pub use staging::*;
