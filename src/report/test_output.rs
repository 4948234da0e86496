//! Per-layer before/after files and diffs written by test mode runs, and the combined diff
//! report built from them.
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeMap;
use std::fs::{create_dir_all, read_dir, read_to_string, write};
use std::path::{Path, PathBuf};

use crate::job::Layer;
use crate::store::DocId;
use crate::utils::diff::line_diff;

/// Separator printed between documents in a diff report.
const DOCUMENT_SEPARATOR: &str =
    "==========================================================================";

/// Directory receiving test mode artifacts.
#[derive(Debug, Clone)]
pub struct TestOutput {
    /// Output directory.
    dir: PathBuf,
}

impl TestOutput {
    /// Use `dir` for artifacts, creating it if needed.
    ///
    /// # Errors
    /// Errors if the directory cannot be created.
    pub fn create(dir: &Path) -> anyhow::Result<Self> {
        create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    /// Artifact directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `<id>.<layer>.old.xml`, `<id>.<layer>.new.xml` and `<id>.<layer>.diff`.
    ///
    /// # Errors
    /// Errors if any file cannot be written.
    pub fn write_layer(&self, id: DocId, layer: Layer, old: &str, new: &str) -> anyhow::Result<()> {
        let stem = format!("{id}.{layer}");
        write(self.dir.join(format!("{stem}.old.xml")), old)?;
        write(self.dir.join(format!("{stem}.new.xml")), new)?;
        write(self.dir.join(format!("{stem}.diff")), line_diff(old, new))?;
        Ok(())
    }
}

/// Split a diff artifact name into its document id and layer label.
#[allow(clippy::expect_used)]
fn parse_diff_file_name(name: &str) -> Option<(&str, &str)> {
    lazy_static! {
        static ref RE: Regex = Regex::new(r"^(CDR\d{10})\.(cwd|lastv|pub)\.diff$")
            .expect("Failed to compile regex!?!");
    }
    let captures = RE.captures(name)?;
    Some((captures.get(1)?.as_str(), captures.get(2)?.as_str()))
}

/// Concatenate the diff artifacts in `dir` into one report.
///
/// Documents are listed in id order, each introduced by its id and followed by one section per
/// layer. Only layers in `layers` are included; an empty slice includes all of them. Documents
/// with no matching diff are left out.
///
/// # Errors
/// Errors if the directory or a diff file cannot be read.
pub fn diff_report(dir: &Path, layers: &[Layer]) -> anyhow::Result<String> {
    let mut diffs: BTreeMap<String, BTreeMap<Layer, PathBuf>> = BTreeMap::new();
    for entry in read_dir(dir)? {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        let Some((id, label)) = parse_diff_file_name(name) else {
            continue;
        };
        let layer: Layer = label.parse()?;
        if !layers.is_empty() && !layers.contains(&layer) {
            continue;
        }
        diffs
            .entry(id.to_owned())
            .or_default()
            .insert(layer, path.clone());
    }

    let mut report = String::new();
    for (id, per_layer) in diffs {
        report.push_str(&format!("\n{id}:\n{DOCUMENT_SEPARATOR}\n"));
        for (layer, path) in per_layer {
            report.push_str(&format!("\n____ {layer} ____\n"));
            report.push_str(&read_to_string(path)?);
        }
    }
    Ok(report)
}
