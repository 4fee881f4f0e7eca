//! Splitting record sequences into batch-sized chunks.

use crate::error::{Error, Result};

/// Maximum records accepted in one batch by the service.
pub const MAX_BATCH_SIZE: usize = 10_000;

/// Split `records` into ordered chunks of at most `max_size` elements.
///
/// No chunk is empty and the concatenation of the chunks is the input.
/// Empty input yields no chunks.
pub fn chunk<T>(records: Vec<T>, max_size: usize) -> Result<Vec<Vec<T>>> {
    if max_size < 1 {
        return Err(Error::invalid_input("Batch size must be at least 1"));
    }

    let mut chunks = Vec::with_capacity(records.len().div_ceil(max_size));
    let mut records = records.into_iter().peekable();
    while records.peek().is_some() {
        chunks.push(records.by_ref().take(max_size).collect());
    }
    Ok(chunks)
}
