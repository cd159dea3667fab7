//! Range planner - splits a resource length into contiguous byte ranges
//!
//! Every part gets `floor(length / concurrency)` bytes and the last part
//! absorbs the remainder.

use crate::error::ParfetchError;
use parfetch_types::ByteRange;

/// Compute the ranges covering `[0, content_length)`.
///
/// When the resource is shorter than `concurrency` bytes the effective
/// concurrency drops to one byte per part, so no range is ever empty.
pub fn plan(content_length: u64, concurrency: u32) -> Result<Vec<ByteRange>, ParfetchError> {
    if concurrency == 0 {
        return Err(ParfetchError::InvalidPlan(
            "concurrency must be at least 1".to_string(),
        ));
    }
    if content_length == 0 {
        return Err(ParfetchError::InvalidPlan(
            "cannot partition an empty resource".to_string(),
        ));
    }

    let parts = u64::from(concurrency).min(content_length);
    let part_size = content_length / parts;

    let ranges = (0..parts)
        .map(|i| {
            let start = i * part_size;
            let end = if i == parts - 1 {
                content_length
            } else {
                start + part_size
            };
            ByteRange::new(i as u32, start, end)
        })
        .collect();

    Ok(ranges)
}
