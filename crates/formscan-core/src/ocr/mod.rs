//! Token model for recognition engine output.
//!
//! The recognition engine itself is external; this module only describes what
//! it hands over: recognized text spans with boxes and scores, in recognition
//! order, plus any layout blocks its parser produced.

mod paddle;

pub use paddle::{OcrDocument, OverallOcrResult, ParsingBlock};

use serde::{Deserialize, Serialize};

use crate::error::ExtractionError;

/// Axis-aligned bounding rectangle in image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x_min: f32,
    pub y_min: f32,
    pub x_max: f32,
    pub y_max: f32,
}

impl BoundingBox {
    pub fn new(x_min: f32, y_min: f32, x_max: f32, y_max: f32) -> Self {
        Self {
            x_min,
            y_min,
            x_max,
            y_max,
        }
    }

    /// Axis-aligned hull of a polygon given as (x, y) points.
    ///
    /// An empty polygon yields a non-finite box that fails [`validate`](Self::validate).
    pub fn from_points(points: &[[f32; 2]]) -> Self {
        let xs = points.iter().map(|p| p[0]);
        let ys = points.iter().map(|p| p[1]);

        Self {
            x_min: xs.clone().fold(f32::INFINITY, f32::min),
            x_max: xs.fold(f32::NEG_INFINITY, f32::max),
            y_min: ys.clone().fold(f32::INFINITY, f32::min),
            y_max: ys.fold(f32::NEG_INFINITY, f32::max),
        }
    }

    /// Vertical center, the key used for row ordering and joins.
    pub fn center_y(&self) -> f32 {
        (self.y_min + self.y_max) / 2.0
    }

    /// Center point of the box.
    pub fn center(&self) -> (f32, f32) {
        ((self.x_min + self.x_max) / 2.0, self.center_y())
    }

    pub fn width(&self) -> f32 {
        self.x_max - self.x_min
    }

    pub fn height(&self) -> f32 {
        self.y_max - self.y_min
    }

    /// Check that all edges are finite and the box is not inverted.
    pub fn validate(&self) -> Result<(), String> {
        let edges = [self.x_min, self.y_min, self.x_max, self.y_max];
        if edges.iter().any(|v| !v.is_finite()) {
            return Err(format!("non-finite edge in {:?}", edges));
        }
        if self.x_min > self.x_max {
            return Err(format!("x_min {} > x_max {}", self.x_min, self.x_max));
        }
        if self.y_min > self.y_max {
            return Err(format!("y_min {} > y_max {}", self.y_min, self.y_max));
        }
        Ok(())
    }
}

/// One recognized text span.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    /// Recognized text content.
    pub text: String,

    /// Bounding box of the text region.
    pub bbox: BoundingBox,

    /// Recognition confidence score (0.0 - 1.0).
    pub score: f32,
}

impl Token {
    pub fn new(text: impl Into<String>, bbox: BoundingBox, score: f32) -> Self {
        Self {
            text: text.into(),
            bbox,
            score,
        }
    }

    /// Validated box, or a malformed-token error carrying the stream index.
    pub(crate) fn checked_box(&self, index: usize) -> Result<&BoundingBox, ExtractionError> {
        self.bbox
            .validate()
            .map(|()| &self.bbox)
            .map_err(|reason| ExtractionError::MalformedToken { index, reason })
    }
}

/// A paragraph-level region from the layout parser, with its joined text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutBlock {
    /// Block type reported by the layout parser (e.g. "text", "table").
    pub label: String,

    /// Concatenated text content of the block.
    pub content: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub bbox: Option<BoundingBox>,
}

/// Recognition output for one document image.
///
/// Tokens keep recognition order, which is not reading order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenStream {
    pub tokens: Vec<Token>,

    #[serde(default)]
    pub blocks: Vec<LayoutBlock>,
}

impl TokenStream {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            blocks: Vec::new(),
        }
    }

    pub fn with_blocks(mut self, blocks: Vec<LayoutBlock>) -> Self {
        self.blocks = blocks;
        self
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Token> {
        self.tokens.iter()
    }

    /// Copy of the stream keeping only tokens scored at or above `min_score`.
    pub fn filter_by_score(&self, min_score: f32) -> TokenStream {
        TokenStream {
            tokens: self
                .tokens
                .iter()
                .filter(|t| t.score >= min_score)
                .cloned()
                .collect(),
            blocks: self.blocks.clone(),
        }
    }

    /// Token texts joined with newlines, in stream order.
    pub fn text(&self) -> String {
        self.tokens
            .iter()
            .map(|t| t.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl FromIterator<Token> for TokenStream {
    fn from_iter<I: IntoIterator<Item = Token>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_points_hull() {
        let bbox = BoundingBox::from_points(&[[10.0, 20.0], [50.0, 18.0], [52.0, 40.0], [9.0, 42.0]]);
        assert_eq!(bbox, BoundingBox::new(9.0, 18.0, 52.0, 42.0));
        assert_eq!(bbox.center_y(), 30.0);
    }

    #[test]
    fn test_validate_rejects_malformed_boxes() {
        assert!(BoundingBox::new(0.0, 0.0, 10.0, 10.0).validate().is_ok());
        assert!(BoundingBox::new(10.0, 0.0, 0.0, 10.0).validate().is_err());
        assert!(BoundingBox::new(0.0, 10.0, 10.0, 0.0).validate().is_err());
        assert!(BoundingBox::new(f32::NAN, 0.0, 10.0, 10.0).validate().is_err());
    }

    #[test]
    fn test_filter_by_score() {
        let bbox = BoundingBox::new(0.0, 0.0, 1.0, 1.0);
        let stream: TokenStream = vec![
            Token::new("keep", bbox, 0.9),
            Token::new("drop", bbox, 0.2),
        ]
        .into_iter()
        .collect();

        let filtered = stream.filter_by_score(0.5);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered.tokens[0].text, "keep");
        assert_eq!(stream.text(), "keep\ndrop");
    }
}
