//! The independently stored bodies of one document and which of them a job touches.
use derive_more::Display;
use serde_derive::Serialize;
use std::str::FromStr;

use super::policy::VersionPolicy;
use crate::store::{LiveCopy, Snapshot, Snapshots};

/// One stored body of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, Serialize)]
pub enum Layer {
    /// The current working copy.
    #[display(fmt = "cwd")]
    #[serde(rename = "cwd")]
    Live,
    /// The most recent version.
    #[display(fmt = "lastv")]
    #[serde(rename = "lastv")]
    LastSnapshot,
    /// The most recent publishable version.
    #[display(fmt = "pub")]
    #[serde(rename = "pub")]
    LastPublishable,
}

impl Layer {
    /// Every layer, in processing order.
    pub const ALL: [Self; 3] = [Self::Live, Self::LastSnapshot, Self::LastPublishable];
}

impl FromStr for Layer {
    type Err = anyhow::Error;

    fn from_str(label: &str) -> anyhow::Result<Self> {
        match label {
            "cwd" => Ok(Self::Live),
            "lastv" => Ok(Self::LastSnapshot),
            "pub" => Ok(Self::LastPublishable),
            other => anyhow::bail!(
                "unrecognized layer {other:?}, expected one of \"cwd\", \"lastv\", \"pub\""
            ),
        }
    }
}

/// A layer selected for transformation, with the body it currently holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerTarget {
    /// Which layer.
    pub layer: Layer,
    /// Version number for snapshot layers.
    pub version: Option<i64>,
    /// Body before transformation.
    pub xml: String,
}

/// Decide which layers of a checked out document are eligible for correction.
///
/// The live copy is always eligible. A snapshot is eligible when the policy allows it, it
/// exists, and its body differs from the live copy's body; identical bodies are covered by
/// the live copy. The last publishable version is skipped when it is the very version already
/// planned as the last version.
#[must_use]
pub fn plan_layers(
    policy: &VersionPolicy,
    live: &LiveCopy,
    snapshots: Snapshots,
) -> Vec<LayerTarget> {
    let mut targets = vec![LayerTarget {
        layer: Layer::Live,
        version: None,
        xml: live.xml.clone(),
    }];
    let independent = |snapshot: &Snapshot| snapshot.xml != live.xml;

    if policy.patch_last_snapshot {
        if let Some(last) = snapshots.last.filter(independent) {
            targets.push(LayerTarget {
                layer: Layer::LastSnapshot,
                version: Some(last.num),
                xml: last.xml,
            });
        }
    }
    if policy.patch_last_publishable_snapshot {
        if let Some(publishable) = snapshots.last_publishable.filter(independent) {
            let already_planned = targets
                .iter()
                .any(|target| target.version == Some(publishable.num));
            if !already_planned {
                targets.push(LayerTarget {
                    layer: Layer::LastPublishable,
                    version: Some(publishable.num),
                    xml: publishable.xml,
                });
            }
        }
    }
    targets
}
