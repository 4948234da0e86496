//! # docbatch
//!
//! `docbatch` runs batch correction jobs against a versioned XML document store.
//!
//! A job selects candidate documents, hands every eligible layer of each document (the live
//! working copy, the last version and the last publishable version) to a caller supplied
//! transformation, and writes back only the layers whose content actually changed. Each
//! document is checked out for the duration of its processing and always released again, so
//! a failing document never stops the rest of the batch and a job can simply be re-run.
//!
//! The moving parts:
//!
//! - [`store::StoreClient`]: the store boundary, implemented over SQL by [`store::SqlStore`].
//! - [`job::Selector`] and [`job::Transformer`]: the per-job capabilities.
//! - [`job::Job`]: the orchestrator, driven by a [`job::VersionPolicy`].
//! - [`report::Reporter`]: the append-only run log.

// =========================================================================
//                  Canonical lints for whole crate
// =========================================================================
// Official docs:
//   https://doc.rust-lang.org/nightly/clippy/lints.html
// Useful app to lookup full details of individual lints:
//   https://rust-lang.github.io/rust-clippy/master/index.html
//
// We set base lints to give the fullest, most pedantic feedback possible.
// Though we prefer that they are just warnings during development so that build-denial
// is only enforced in CI.
//
#![warn(
    // `clippy::all` is already on by default.
    clippy::all,

    // It's always good to write as much documentation as possible
    missing_docs,

    // > clippy::pedantic lints which are rather strict or might have false positives
    clippy::pedantic,

    // > new lints that are still under development"
    clippy::nursery,

    // > The clippy::cargo group gives you suggestions on how to improve your Cargo.toml file.
    clippy::cargo
)]
// > The clippy::restriction group will restrict you in some way.
// > If you enable a restriction lint for your crate it is recommended to also fix code that
// > this lint triggers on. However, those lints are really strict by design and you might want
// > to #[allow] them in some special cases, with a comment justifying that.
#![allow(
    clippy::blanket_clippy_restriction_lints,
    reason = "See above explanation."
)]
#![warn(clippy::restriction)]
//
//
// =========================================================================
//   Individually blanket-allow single lints relevant to this whole crate
// =========================================================================
#![allow(clippy::implicit_return, reason = "This is idiomatic Rust")]
#![allow(
    clippy::multiple_crate_versions,
    reason = "sqlx and libxml pull in overlapping transitive versions"
)]
#![allow(
    clippy::module_name_repetitions,
    reason = "Types such as `StoreError` read better fully named at call sites"
)]
#![allow(
    clippy::missing_errors_doc,
    reason = "Database manager traits only pass on `sqlx` errors; `StoreClient` documents its own"
)]
#![allow(
    clippy::std_instead_of_alloc,
    reason = "We're not interested in becoming no-std compatible"
)]
#![allow(
    clippy::std_instead_of_core,
    reason = "Import items from std instead of core"
)]
#![allow(
    clippy::mod_module_files,
    reason = "mod.rs is the layout used for every multi-file module here"
)]
#![allow(
    clippy::missing_inline_in_public_items,
    reason = "Nothing here is hot enough to benefit from explicit inline hints"
)]
#![allow(
    clippy::exhaustive_structs,
    reason = "`#[non_exhaustive]` is for types imported into other crates"
)]
#![allow(
    clippy::exhaustive_enums,
    reason = "`#[non_exhaustive]` is for types imported into other crates"
)]
#![allow(
    clippy::question_mark_used,
    reason = "We rely on propagating errors with question mark extensively"
)]
#![allow(
    clippy::semicolon_outside_block,
    reason = "Opt in to have semicolon in the outside block across codebase"
)]
#![allow(
    clippy::single_call_fn,
    reason = "We tend to break up long functions into smaller ones, so this lint is not useful"
)]
#![allow(
    clippy::arithmetic_side_effects,
    reason = "Arithmetic is limited to counters and bounded line indices"
)]
#![allow(
    clippy::pub_use,
    reason = "`job` and `store` re-export their submodule types as one public surface"
)]
#![allow(
    clippy::renamed_function_params,
    reason = "
    Sometimes collides with `min_ident_chars`, in cases where trait params consist of a single char.
    So we disallow single chars, and allow renamed_function_params.
"
)]
#![allow(
    clippy::arbitrary_source_item_ordering,
    reason = "Items are ordered by reading flow, not alphabetically"
)]

pub mod db;
pub mod job;
pub mod report;
pub mod store;
pub mod utils;
