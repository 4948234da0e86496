//! Job files.
//!
//! A job file describes one correction in TOML:
//!
//! ```toml
//! comment = "Request 3724: add missing StartDate"
//! validate = true
//! max_docs = 500
//!
//! [selector]
//! query = "SELECT id FROM document WHERE doc_type = 'Term' ORDER BY id"
//!
//! [[transform.replace]]
//! pattern = '<Term>(\s*)<Name>'
//! replacement = '<Term>$1<StartDate/>$1<Name>'
//!
//! [policy]
//! block_on_save = false
//! ```
use anyhow::Context;
use serde_derive::Deserialize;
use std::fs::read_to_string;
use std::path::Path;

use super::policy::VersionPolicy;
use super::select::{IdListSelector, QuerySelector, Selector};
use super::transform::RegexTransformer;
use super::{JobSettings, RunMode};
use crate::db::DatabaseConnection;
use crate::store::DocId;

/// Parsed job file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobFile {
    /// Comment recorded with every save.
    #[serde(default)]
    pub comment: String,
    /// Reject transformed bodies that are not well-formed XML.
    #[serde(default)]
    pub validate: bool,
    /// Process at most this many candidates.
    #[serde(default)]
    pub max_docs: Option<usize>,
    /// How candidates are selected.
    pub selector: SelectorConfig,
    /// How bodies are corrected.
    pub transform: TransformConfig,
    /// Layer switches.
    #[serde(default)]
    pub policy: VersionPolicy,
}

/// `[selector]` table. Exactly one of the keys must be set.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SelectorConfig {
    /// Fixed list of ids.
    pub ids: Option<Vec<DocId>>,
    /// `SQL` query returning ids in its first column.
    pub query: Option<String>,
}

/// `[transform]` table.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransformConfig {
    /// Replacements applied in order.
    pub replace: Vec<ReplaceRule>,
}

/// One `[[transform.replace]]` entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReplaceRule {
    /// Regular expression.
    pub pattern: String,
    /// Replacement, may refer to capture groups.
    pub replacement: String,
}

impl JobFile {
    /// Read and parse a job file.
    ///
    /// # Errors
    /// Errors if the file cannot be read or is not a valid job file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = read_to_string(path)
            .with_context(|| format!("Could not read job file {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("Invalid job file {}", path.display()))
    }

    /// Parse job file text.
    ///
    /// # Errors
    /// Errors if the text is not a valid job file.
    pub fn parse(text: &str) -> anyhow::Result<Self> {
        let file: Self = toml::from_str(text)?;
        if file.transform.replace.is_empty() {
            anyhow::bail!("at least one [[transform.replace]] rule is required");
        }
        match (&file.selector.ids, &file.selector.query) {
            (Some(_), None) | (None, Some(_)) => Ok(file),
            _ => anyhow::bail!("[selector] needs exactly one of `ids` or `query`"),
        }
    }

    /// Build the selector. Query selectors run against `conn`.
    ///
    /// # Errors
    /// Errors if the selector table is inconsistent.
    pub fn selector(&self, conn: &DatabaseConnection) -> anyhow::Result<Box<dyn Selector>> {
        match (&self.selector.ids, &self.selector.query) {
            (Some(ids), None) => Ok(Box::new(IdListSelector::new(ids.iter().copied()))),
            (None, Some(query)) => Ok(Box::new(QuerySelector::new(conn.clone(), query.clone()))),
            _ => anyhow::bail!("[selector] needs exactly one of `ids` or `query`"),
        }
    }

    /// Compile the replacement rules.
    ///
    /// # Errors
    /// Errors if a pattern does not compile.
    pub fn transformer(&self) -> anyhow::Result<RegexTransformer> {
        RegexTransformer::new(
            self.transform
                .replace
                .iter()
                .map(|rule| (rule.pattern.as_str(), rule.replacement.as_str())),
        )
    }

    /// Run parameters for `mode`, taken from the file.
    #[must_use]
    pub fn settings(&self, mode: RunMode) -> JobSettings {
        JobSettings {
            policy: self.policy,
            mode,
            max_docs: self.max_docs,
            comment: self.comment.clone(),
            validate: self.validate,
            output_dir: None,
        }
    }
}
