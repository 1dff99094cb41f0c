use std::io::Read;

use anyhow::Context;

use crate::error::ServiceError;

/// Reads the request body, stopping after `limit` bytes. Anything the caller
/// sends past the limit is never looked at.
pub fn read_bounded(input: impl Read, limit: usize) -> Result<Vec<u8>, ServiceError> {
    let mut body = Vec::new();
    input
        .take(limit as u64)
        .read_to_end(&mut body)
        .context("read request body")?;
    Ok(body)
}
