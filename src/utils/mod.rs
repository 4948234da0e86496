//! Small helpers shared by the rest of the crate.

/// The `docbatch` command line.
pub mod cli;
/// Line diffs of document bodies.
pub mod diff;
/// Body fingerprints for logs.
pub mod md5;
