//! Form record extraction.
//!
//! [`Extractor`] runs a [`FieldMatcher`] for every declared field and the
//! table reconstruction once, and always returns a complete record.

mod field;
mod table;

pub use field::{resolve, FieldMatcher, Resolution};
pub use table::{reconstruct, reconstruct_detailed, template_table};

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Instant;

use tracing::{debug, error, info};

use crate::models::config::{ExtractionConfig, FormscanConfig};
use crate::models::layout::{FormLayout, TableLayout};
use crate::models::record::{ExtractionReport, ExtractionResult, FieldSource, TableSource};
use crate::ocr::TokenStream;

/// Extraction engine for one form layout.
///
/// The layout is fixed at construction, so one extractor can serve any number
/// of documents, including from several threads at once.
#[derive(Debug, Clone)]
pub struct Extractor {
    fields: Vec<FieldMatcher>,
    table: TableLayout,
    config: ExtractionConfig,
}

impl Extractor {
    /// Create an extractor for `layout` with default settings.
    pub fn new(layout: FormLayout) -> Self {
        Self {
            fields: layout.fields.into_iter().map(FieldMatcher::new).collect(),
            table: layout.table,
            config: ExtractionConfig::default(),
        }
    }

    /// Create an extractor from a full configuration.
    pub fn from_config(config: &FormscanConfig) -> Self {
        Self::new(config.layout.clone()).with_config(config.extraction.clone())
    }

    /// Set extraction settings.
    pub fn with_config(mut self, config: ExtractionConfig) -> Self {
        self.config = config;
        self
    }

    /// Names of the declared fields, in declaration order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name())
    }

    pub fn table_layout(&self) -> &TableLayout {
        &self.table
    }

    /// Extract the record for one document.
    pub fn extract(&self, stream: &TokenStream) -> ExtractionResult {
        self.extract_detailed(stream).0
    }

    /// Extract the record and report where each value came from.
    pub fn extract_detailed(&self, stream: &TokenStream) -> (ExtractionResult, ExtractionReport) {
        let start = Instant::now();

        let stream = if self.config.min_token_score > 0.0 {
            let filtered = stream.filter_by_score(self.config.min_token_score);
            debug!(
                "Score filter kept {} of {} tokens",
                filtered.len(),
                stream.len()
            );
            Cow::Owned(filtered)
        } else {
            Cow::Borrowed(stream)
        };

        let outcome = match catch_unwind(AssertUnwindSafe(|| self.run(&stream))) {
            Ok(outcome) => outcome,
            Err(panic) => {
                error!(
                    "Extraction panicked: {}; using fallback record",
                    panic_message(panic.as_ref())
                );
                self.fallback_record(stream.len())
            }
        };

        let (result, report) = &outcome;
        info!(
            "Extracted {}/{} fields and {}/{} table rows from {} tokens in {:?}",
            report.matched_fields(),
            result.fields.len(),
            report.detected_rows(),
            result.table.len(),
            report.token_count,
            start.elapsed()
        );

        outcome
    }

    fn run(&self, stream: &TokenStream) -> (ExtractionResult, ExtractionReport) {
        let mut fields = BTreeMap::new();
        let mut sources = BTreeMap::new();

        for matcher in &self.fields {
            let resolution = matcher.resolve_detailed(stream);
            fields.insert(matcher.name().to_string(), resolution.value);
            sources.insert(matcher.name().to_string(), resolution.source);
        }

        let (table, table_source) = reconstruct_detailed(stream, &self.table);

        (
            ExtractionResult { fields, table },
            ExtractionReport {
                fields: sources,
                table: table_source,
                token_count: stream.len(),
            },
        )
    }

    /// Record built from configuration alone.
    fn fallback_record(&self, token_count: usize) -> (ExtractionResult, ExtractionReport) {
        let fields = self
            .fields
            .iter()
            .map(|f| (f.name().to_string(), f.spec().fallback_value.clone()))
            .collect();
        let sources = self
            .fields
            .iter()
            .map(|f| (f.name().to_string(), FieldSource::Fallback))
            .collect();

        (
            ExtractionResult {
                fields,
                table: template_table(&self.table),
            },
            ExtractionReport {
                fields: sources,
                table: TableSource::Template,
                token_count,
            },
        )
    }
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new(FormLayout::default())
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::record::TableRow;
    use crate::ocr::{BoundingBox, Token};
    use pretty_assertions::assert_eq;

    fn token(text: &str, x_min: f32, y_min: f32, x_max: f32, y_max: f32) -> Token {
        Token::new(text, BoundingBox::new(x_min, y_min, x_max, y_max), 0.95)
    }

    /// A label scan as the recognition engine returns it.
    fn label_stream() -> TokenStream {
        TokenStream::new(vec![
            token("Recipe", 40.0, 42.0, 120.0, 70.0),
            token(":", 130.0, 42.0, 140.0, 70.0),
            token("AB CD", 200.0, 45.0, 300.0, 72.0),
            token("BadgeNo.", 40.0, 100.0, 150.0, 128.0),
            token("SV2-250301-0042", 205.0, 101.0, 380.0, 130.0),
            token("Min", 70.0, 160.0, 120.0, 178.0),
            token("0.100", 70.0, 192.0, 150.0, 208.0),
            token("0.200", 230.0, 191.0, 300.0, 209.0),
            token("1", 400.0, 193.0, 440.0, 207.0),
            token("3.000", 70.0, 592.0, 150.0, 608.0),
            token("Max", 230.0, 594.0, 300.0, 610.0),
            token("4", 400.0, 590.0, 440.0, 606.0),
        ])
    }

    #[test]
    fn test_extract_label() {
        let extractor = Extractor::default();
        let (result, report) = extractor.extract_detailed(&label_stream());

        assert_eq!(result.field("recipe"), Some("AB CD"));
        assert_eq!(result.field("badge_number"), Some("SV2-250301-0042"));
        assert_eq!(report.fields["recipe"], FieldSource::CoordinateWindow);
        assert_eq!(report.fields["badge_number"], FieldSource::CoordinateWindow);

        assert_eq!(result.table.len(), 6);
        assert_eq!(result.table[0], TableRow::new("0.100", "0.200", "1"));
        assert_eq!(result.table[5], TableRow::new("3.000", "Max", "4"));
        assert_eq!(report.table, TableSource::Reconstructed { detected: 2, filled: 4 });
    }

    #[test]
    fn test_extract_empty_stream() {
        let result = Extractor::default().extract(&TokenStream::default());

        assert_eq!(result.field("recipe"), Some("IP PR"));
        assert_eq!(result.field("badge_number"), Some("SV2-250113-0370"));
        assert_eq!(
            result.table,
            vec![
                TableRow::new("0.100", "0.200", "0"),
                TableRow::new("0.200", "0.300", "6"),
                TableRow::new("0.300", "1.000", "12"),
                TableRow::new("1.000", "2.000", "3"),
                TableRow::new("2.000", "3.000", "0"),
                TableRow::new("3.000", "Max", "1"),
            ]
        );
    }

    #[test]
    fn test_anchor_path_when_values_drift() {
        // Values printed well away from their expected boxes.
        let stream = TokenStream::new(vec![
            token("Recipe", 40.0, 20.0, 120.0, 40.0),
            token(":", 130.0, 20.0, 140.0, 40.0),
            token("EF GH", 420.0, 20.0, 520.0, 40.0),
            token("BadgeNo.", 40.0, 140.0, 150.0, 160.0),
            token("SV2-999999-0001", 450.0, 140.0, 600.0, 160.0),
        ]);

        let (result, report) = Extractor::default().extract_detailed(&stream);
        assert_eq!(result.field("recipe"), Some("EF GH"));
        assert_eq!(result.field("badge_number"), Some("SV2-999999-0001"));
        assert_eq!(report.fields["recipe"], FieldSource::AnchorLabel);
        assert_eq!(report.fields["badge_number"], FieldSource::AnchorLabel);
    }

    #[test]
    fn test_score_filter_drops_weak_tokens() {
        let mut stream = label_stream();
        stream.tokens[2].score = 0.1;

        let extractor = Extractor::default().with_config(ExtractionConfig { min_token_score: 0.5 });
        let (result, report) = extractor.extract_detailed(&stream);

        // With "AB CD" gone the token two after the anchor is "BadgeNo.", outside the header window.
        assert_eq!(result.field("recipe"), Some("IP PR"));
        assert_eq!(report.fields["recipe"], FieldSource::Fallback);
        assert_eq!(report.token_count, 11);
    }

    #[test]
    fn test_extract_is_idempotent() {
        let extractor = Extractor::default();
        let stream = label_stream();

        assert_eq!(extractor.extract(&stream), extractor.extract(&stream));
    }

    #[test]
    fn test_extractor_is_shareable_across_threads() {
        let extractor = std::sync::Arc::new(Extractor::default());
        let expected = extractor.extract(&label_stream());

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let extractor = extractor.clone();
                std::thread::spawn(move || extractor.extract(&label_stream()))
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), expected);
        }
    }

    #[test]
    fn test_field_names_in_declaration_order() {
        let extractor = Extractor::default();
        let names: Vec<&str> = extractor.field_names().collect();
        assert_eq!(names, vec!["recipe", "badge_number"]);
    }
}
