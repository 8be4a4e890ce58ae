//! PaddleOCR result ingestion.
//!
//! Reads the `*_res.json` file written by the PaddleOCR pipeline and turns it
//! into a [`TokenStream`]. Only the fields the extraction engine consumes are
//! modelled; everything else in the file is ignored.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{BoundingBox, LayoutBlock, Token, TokenStream};
use crate::error::{IngestError, Result};

/// Top-level PaddleOCR result document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OcrDocument {
    /// Source image path as recorded by the recognition run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_path: Option<String>,

    /// Layout parser blocks.
    #[serde(default)]
    pub parsing_res_list: Vec<ParsingBlock>,

    /// Line-level recognition output.
    #[serde(default)]
    pub overall_ocr_res: Option<OverallOcrResult>,
}

/// Line-level recognition arrays. Entries at the same index describe one token.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OverallOcrResult {
    #[serde(default)]
    pub rec_texts: Vec<String>,

    #[serde(default)]
    pub rec_scores: Vec<f32>,

    /// Axis-aligned boxes as `[x_min, y_min, x_max, y_max]`.
    #[serde(default)]
    pub rec_boxes: Vec<[f32; 4]>,

    /// Recognition polygons, used when `rec_boxes` is missing.
    #[serde(default)]
    pub rec_polys: Vec<Vec<[f32; 2]>>,
}

/// One block of the layout parser output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParsingBlock {
    #[serde(default)]
    pub block_label: String,

    #[serde(default)]
    pub block_content: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_bbox: Option<[f32; 4]>,
}

impl OcrDocument {
    /// Parse a result document from JSON text.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a result document from a file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Build the token stream for this document.
    ///
    /// A document without `overall_ocr_res` yields an empty token list; the
    /// layout blocks are still carried over.
    pub fn into_stream(self) -> Result<TokenStream> {
        let tokens = match self.overall_ocr_res {
            Some(ocr) => ocr.into_tokens()?,
            None => Vec::new(),
        };

        let blocks = self
            .parsing_res_list
            .into_iter()
            .map(|b| LayoutBlock {
                label: b.block_label,
                content: b.block_content,
                bbox: b
                    .block_bbox
                    .map(|[x_min, y_min, x_max, y_max]| BoundingBox::new(x_min, y_min, x_max, y_max)),
            })
            .collect::<Vec<_>>();

        debug!("Ingested {} tokens and {} layout blocks", tokens.len(), blocks.len());

        Ok(TokenStream::new(tokens).with_blocks(blocks))
    }
}

impl OverallOcrResult {
    fn into_tokens(self) -> std::result::Result<Vec<Token>, IngestError> {
        let count = self.rec_texts.len();

        let boxes: Vec<BoundingBox> = if !self.rec_boxes.is_empty() {
            check_len("rec_boxes", self.rec_boxes.len(), count)?;
            self.rec_boxes
                .iter()
                .map(|&[x_min, y_min, x_max, y_max]| BoundingBox::new(x_min, y_min, x_max, y_max))
                .collect()
        } else if !self.rec_polys.is_empty() {
            check_len("rec_polys", self.rec_polys.len(), count)?;
            self.rec_polys
                .iter()
                .enumerate()
                .map(|(i, poly)| {
                    if poly.is_empty() {
                        Err(IngestError::EmptyPolygon(i))
                    } else {
                        Ok(BoundingBox::from_points(poly))
                    }
                })
                .collect::<std::result::Result<_, _>>()?
        } else if count > 0 {
            return Err(IngestError::MissingBoxes);
        } else {
            Vec::new()
        };

        // Scores are optional in older result files.
        let scores = if self.rec_scores.is_empty() {
            vec![1.0; count]
        } else {
            check_len("rec_scores", self.rec_scores.len(), count)?;
            self.rec_scores
        };

        Ok(self
            .rec_texts
            .into_iter()
            .zip(boxes)
            .zip(scores)
            .map(|((text, bbox), score)| Token::new(text, bbox, score))
            .collect())
    }
}

fn check_len(field: &'static str, actual: usize, expected: usize) -> std::result::Result<(), IngestError> {
    if actual == expected {
        Ok(())
    } else {
        Err(IngestError::LengthMismatch {
            field,
            expected,
            actual,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FormscanError;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = r#"{
        "input_path": "label_01.jpg",
        "parsing_res_list": [
            {"block_label": "text", "block_content": "Recipe  IP PR", "block_bbox": [30, 40, 300, 80]}
        ],
        "overall_ocr_res": {
            "rec_texts": ["Recipe", ":", "IP PR"],
            "rec_scores": [0.99, 0.5, 0.97],
            "rec_boxes": [[30, 45, 110, 75], [115, 45, 125, 75], [200, 48, 330, 78]],
            "model_settings": {"use_doc_preprocessor": false}
        }
    }"#;

    #[test]
    fn test_ingest_sample_document() {
        let stream = OcrDocument::from_json(SAMPLE).unwrap().into_stream().unwrap();

        assert_eq!(stream.len(), 3);
        assert_eq!(stream.tokens[2].text, "IP PR");
        assert_eq!(stream.tokens[2].bbox, BoundingBox::new(200.0, 48.0, 330.0, 78.0));
        assert_eq!(stream.blocks.len(), 1);
        assert_eq!(stream.blocks[0].content, "Recipe  IP PR");
    }

    #[test]
    fn test_polygons_used_without_boxes() {
        let json = r#"{
            "overall_ocr_res": {
                "rec_texts": ["12"],
                "rec_polys": [[[400, 290], [440, 291], [441, 306], [399, 305]]]
            }
        }"#;

        let stream = OcrDocument::from_json(json).unwrap().into_stream().unwrap();
        assert_eq!(stream.tokens[0].bbox, BoundingBox::new(399.0, 290.0, 441.0, 306.0));
        assert_eq!(stream.tokens[0].score, 1.0);
    }

    #[test]
    fn test_length_mismatch_is_rejected() {
        let json = r#"{
            "overall_ocr_res": {
                "rec_texts": ["a", "b"],
                "rec_boxes": [[0, 0, 1, 1]]
            }
        }"#;

        let err = OcrDocument::from_json(json).unwrap().into_stream().unwrap_err();
        assert!(matches!(
            err,
            FormscanError::Ingest(IngestError::LengthMismatch { field: "rec_boxes", expected: 2, actual: 1 })
        ));
    }

    #[test]
    fn test_missing_boxes_is_rejected() {
        let json = r#"{"overall_ocr_res": {"rec_texts": ["a"]}}"#;
        let err = OcrDocument::from_json(json).unwrap().into_stream().unwrap_err();
        assert!(matches!(err, FormscanError::Ingest(IngestError::MissingBoxes)));
    }

    #[test]
    fn test_document_without_recognition_is_empty() {
        let stream = OcrDocument::from_json("{}").unwrap().into_stream().unwrap();
        assert!(stream.is_empty());
        assert!(stream.blocks.is_empty());
    }
}
