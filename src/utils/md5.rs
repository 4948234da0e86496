//! Utility functions for `md5` hash computation.
use md5::{Digest, Md5};

/// Compute the `md5` hash of a document body.
///
/// The result is a hexadecimal string of 32 characters. Used to fingerprint layer bodies
/// in logs without printing them.
#[must_use]
pub fn compute(data: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(data.as_bytes());
    let result = hasher.finalize();
    format!("{result:x}")
}
