//! Document transformation.
use libxml::parser::{Parser, ParserOptions};
use regex::Regex;
use std::panic::{self, AssertUnwindSafe};

use super::layer::Layer;
use crate::store::DocId;

/// One layer of a document, as handed to a [`Transformer`].
#[derive(Debug, Clone, Copy)]
pub struct LayerBody<'doc> {
    /// Document identifier.
    pub id: DocId,
    /// Which layer the body comes from.
    pub layer: Layer,
    /// Version number for snapshot layers.
    pub version: Option<i64>,
    /// Document type name.
    pub doc_type: &'doc str,
    /// Document title.
    pub title: &'doc str,
    /// Body to correct.
    pub xml: &'doc str,
}

/// Computes the corrected body of one layer.
///
/// Implementations must be pure: the same input always yields the same output. Jobs rely on
/// this to be idempotent, since an already corrected layer must transform to itself.
/// Returning the input unchanged means the layer needs no correction.
pub trait Transformer: Send + Sync {
    /// Return the corrected body.
    ///
    /// # Errors
    /// An error marks the whole document as failed and leaves it untouched.
    fn transform(&self, body: &LayerBody<'_>) -> anyhow::Result<String>;
}

/// Applies a list of regex replacements, in order.
#[derive(Debug, Clone)]
pub struct RegexTransformer {
    /// Compiled pattern and replacement pairs.
    rules: Vec<(Regex, String)>,
}

impl RegexTransformer {
    /// Compile `(pattern, replacement)` pairs. Replacements may refer to capture groups as
    /// `$1` or `${name}`.
    ///
    /// # Errors
    /// Errors if a pattern does not compile.
    pub fn new<'rule, I>(rules: I) -> anyhow::Result<Self>
    where
        I: IntoIterator<Item = (&'rule str, &'rule str)>,
    {
        let rules = rules
            .into_iter()
            .map(|(pattern, replacement)| {
                let regex = Regex::new(pattern)
                    .map_err(|err| anyhow::anyhow!("invalid pattern {pattern:?}: {err}"))?;
                Ok((regex, replacement.to_owned()))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(Self { rules })
    }
}

impl Transformer for RegexTransformer {
    fn transform(&self, body: &LayerBody<'_>) -> anyhow::Result<String> {
        let mut xml = body.xml.to_owned();
        for (regex, replacement) in &self.rules {
            xml = regex.replace_all(&xml, replacement.as_str()).into_owned();
        }
        Ok(xml)
    }
}

/// Adapts a closure into a [`Transformer`].
pub struct FnTransformer<F>(pub F);

impl<F> Transformer for FnTransformer<F>
where
    F: Fn(&LayerBody<'_>) -> anyhow::Result<String> + Send + Sync,
{
    fn transform(&self, body: &LayerBody<'_>) -> anyhow::Result<String> {
        (self.0)(body)
    }
}

/// Run `transformer` on `body`, turning panics into errors and, when `validate` is set,
/// rejecting output that is not well-formed XML.
pub(crate) fn transform_checked(
    transformer: &dyn Transformer,
    body: &LayerBody<'_>,
    validate: bool,
) -> anyhow::Result<String> {
    let output = panic::catch_unwind(AssertUnwindSafe(|| transformer.transform(body)))
        .map_err(|payload| {
            let message = payload
                .downcast_ref::<&str>()
                .map(|msg| (*msg).to_owned())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_owned());
            anyhow::anyhow!("transformer panicked: {message}")
        })??;
    if validate {
        check_well_formed(&output)?;
    }
    Ok(output)
}

/// Check that `xml` parses as a well-formed XML document.
///
/// # Errors
/// Errors if the parser cannot build a document from `xml`.
pub fn check_well_formed(xml: &str) -> anyhow::Result<()> {
    let options = ParserOptions {
        recover: false,
        no_error: true,
        no_warning: true,
        ..ParserOptions::default()
    };
    Parser::default()
        .parse_string_with_options(xml, options)
        .map(drop)
        .map_err(|err| anyhow::anyhow!("transformed body is not well-formed XML: {err:?}"))
}
