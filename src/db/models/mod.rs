//! This module contains all the sqlx structs for the database tables.

/// sqlx structs for document table.
pub mod document;
/// sqlx structs for `doc_version` table.
pub mod version;
