//! Core library for label form OCR extraction.
//!
//! This crate provides:
//! - A token model for recognition engine output, with PaddleOCR result ingestion
//! - Field resolution through a cascade of spatial and textual strategies
//! - Bin table reconstruction by column windows and nearest-row joins
//! - An extractor that always yields a complete, schema-conformant record

pub mod error;
pub mod extract;
pub mod models;
pub mod ocr;

pub use error::{ExtractionError, FormscanError, IngestError, Result};
pub use extract::{reconstruct, resolve, Extractor, FieldMatcher};
pub use models::config::{ExtractionConfig, FormscanConfig};
pub use models::layout::{BoxWindow, ColumnSpec, FieldSpec, FormLayout, RowTemplate, Span, TableLayout};
pub use models::record::{ExtractionReport, ExtractionResult, FieldSource, TableRow, TableSource};
pub use ocr::{BoundingBox, LayoutBlock, OcrDocument, Token, TokenStream};
