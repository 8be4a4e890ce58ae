//! Extraction record and its diagnostics.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::layout::RowTemplate;

/// One reconstructed row of the bin table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRow {
    pub min: String,
    pub max: String,
    pub count: String,
}

impl TableRow {
    pub fn new(min: impl Into<String>, max: impl Into<String>, count: impl Into<String>) -> Self {
        Self {
            min: min.into(),
            max: max.into(),
            count: count.into(),
        }
    }
}

impl From<&RowTemplate> for TableRow {
    fn from(template: &RowTemplate) -> Self {
        Self::new(&template.min, &template.max, &template.count)
    }
}

/// Fully populated record for one document.
///
/// Fields are serialized at the top level next to `table`, e.g.
/// `{"badge_number": "...", "recipe": "...", "table": [...]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionResult {
    #[serde(flatten)]
    pub fields: BTreeMap<String, String>,

    pub table: Vec<TableRow>,
}

impl ExtractionResult {
    /// Value of a field by name.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

/// Which cascade strategy produced a field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldSource {
    CoordinateWindow,
    KnownLiteral,
    AnchorLabel,
    BlockPattern,
    Fallback,
}

impl FieldSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldSource::CoordinateWindow => "coordinate_window",
            FieldSource::KnownLiteral => "known_literal",
            FieldSource::AnchorLabel => "anchor_label",
            FieldSource::BlockPattern => "block_pattern",
            FieldSource::Fallback => "fallback",
        }
    }

    /// True when the value came from the document rather than configuration.
    pub fn is_match(&self) -> bool {
        !matches!(self, FieldSource::Fallback)
    }
}

impl std::fmt::Display for FieldSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the table was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TableSource {
    /// Rows were joined from tokens; the rest came from templates.
    Reconstructed { detected: usize, filled: usize },
    /// Reconstruction failed and the canonical table was used as is.
    Template,
}

/// Provenance of every value in an [`ExtractionResult`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionReport {
    /// Strategy per field name.
    pub fields: BTreeMap<String, FieldSource>,

    pub table: TableSource,

    /// Tokens that entered extraction after score filtering.
    pub token_count: usize,
}

impl ExtractionReport {
    /// Number of fields resolved from the document.
    pub fn matched_fields(&self) -> usize {
        self.fields.values().filter(|s| s.is_match()).count()
    }

    /// Number of table rows joined from tokens.
    pub fn detected_rows(&self) -> usize {
        match self.table {
            TableSource::Reconstructed { detected, .. } => detected,
            TableSource::Template => 0,
        }
    }
}
