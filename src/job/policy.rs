//! Which layers of a document a job may rewrite, and how a live save touches history.
use serde_derive::{Deserialize, Serialize};

use crate::store::ActiveStatus;

/// Layer switches for a job. Fixed for the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
#[allow(
    clippy::struct_excessive_bools,
    reason = "Four independent switches, each documented on its own"
)]
pub struct VersionPolicy {
    /// Apply the correction in place to the last version.
    pub patch_last_snapshot: bool,
    /// Apply the correction in place to the last publishable version.
    pub patch_last_publishable_snapshot: bool,
    /// Saving the live copy also appends a new version.
    pub create_new_snapshot_on_save: bool,
    /// Every saved document is also blocked.
    pub block_on_save: bool,
}

impl Default for VersionPolicy {
    fn default() -> Self {
        Self {
            patch_last_snapshot: true,
            patch_last_publishable_snapshot: true,
            create_new_snapshot_on_save: true,
            block_on_save: false,
        }
    }
}

impl VersionPolicy {
    /// A policy that only ever rewrites the live copy.
    #[must_use]
    pub fn live_only() -> Self {
        Self {
            patch_last_snapshot: false,
            patch_last_publishable_snapshot: false,
            ..Self::default()
        }
    }

    /// Active status to force on saved documents, `None` to leave it alone.
    #[must_use]
    pub const fn forced_status(&self) -> Option<ActiveStatus> {
        if self.block_on_save {
            Some(ActiveStatus::Blocked)
        } else {
            None
        }
    }
}
