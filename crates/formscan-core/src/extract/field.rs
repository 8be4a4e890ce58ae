//! Singleton field resolution.
//!
//! A field is resolved by trying a fixed cascade of strategies against the
//! token stream. The first strategy that yields a value wins; when none does,
//! the field's configured fallback is used. Resolution never fails.

use regex::Regex;
use tracing::{debug, info, warn};

use crate::error::ExtractionError;
use crate::models::layout::FieldSpec;
use crate::models::record::FieldSource;
use crate::ocr::TokenStream;

type StrategyResult = Result<Option<String>, ExtractionError>;
type Strategy = fn(&FieldMatcher, &TokenStream) -> StrategyResult;

/// Strategies in priority order.
const CASCADE: [(FieldSource, Strategy); 4] = [
    (FieldSource::CoordinateWindow, FieldMatcher::match_window),
    (FieldSource::KnownLiteral, FieldMatcher::match_literal),
    (FieldSource::AnchorLabel, FieldMatcher::match_anchor),
    (FieldSource::BlockPattern, FieldMatcher::match_block),
];

/// A resolved field value with the strategy that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub value: String,
    pub source: FieldSource,
}

/// Resolves one field from its [`FieldSpec`] and compiled block pattern.
#[derive(Debug, Clone)]
pub struct FieldMatcher {
    spec: FieldSpec,
    pattern: Option<Regex>,
}

impl FieldMatcher {
    /// Build a matcher. An invalid block pattern is logged and disables the
    /// block-pattern strategy for this field.
    pub fn new(spec: FieldSpec) -> Self {
        let pattern = match spec.block_pattern.as_deref().map(Regex::new) {
            Some(Ok(re)) => Some(re),
            Some(Err(e)) => {
                let err = ExtractionError::InvalidPattern {
                    field: spec.name.clone(),
                    reason: e.to_string(),
                };
                warn!("{}; block pattern strategy disabled", err);
                None
            }
            None => None,
        };

        Self { spec, pattern }
    }

    pub fn spec(&self) -> &FieldSpec {
        &self.spec
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    /// Resolve the field value.
    pub fn resolve(&self, stream: &TokenStream) -> String {
        self.resolve_detailed(stream).value
    }

    /// Resolve the field value and report which strategy produced it.
    pub fn resolve_detailed(&self, stream: &TokenStream) -> Resolution {
        for (source, strategy) in CASCADE {
            match strategy(self, stream) {
                Ok(Some(value)) => {
                    debug!("Field {} resolved by {}: {:?}", self.spec.name, source, value);
                    return Resolution { value, source };
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(
                        "Field {} failed during {}: {}; using fallback",
                        self.spec.name, source, e
                    );
                    return self.fallback();
                }
            }
        }

        info!(
            "Field {} not found, using fallback {:?}",
            self.spec.name, self.spec.fallback_value
        );
        self.fallback()
    }

    fn fallback(&self) -> Resolution {
        Resolution {
            value: self.spec.fallback_value.clone(),
            source: FieldSource::Fallback,
        }
    }

    /// First token, in stream order, whose box fits the expected window.
    fn match_window(&self, stream: &TokenStream) -> StrategyResult {
        let Some(window) = &self.spec.expected_box else {
            return Ok(None);
        };

        for (index, token) in stream.iter().enumerate() {
            if window.contains(token.checked_box(index)?) {
                return Ok(Some(token.text.clone()));
            }
        }

        Ok(None)
    }

    /// The known literal, if some token reads exactly that.
    fn match_literal(&self, stream: &TokenStream) -> StrategyResult {
        let Some(literal) = &self.spec.known_literal else {
            return Ok(None);
        };

        Ok(stream
            .iter()
            .any(|t| t.text == *literal)
            .then(|| literal.clone()))
    }

    /// Token at a fixed stream offset from the first anchor label.
    fn match_anchor(&self, stream: &TokenStream) -> StrategyResult {
        let Some(label) = &self.spec.anchor_label else {
            return Ok(None);
        };
        let Some(anchor) = stream.iter().position(|t| t.text == *label) else {
            return Ok(None);
        };

        let target = anchor as i64 + i64::from(self.spec.offset());
        let Some(index) = usize::try_from(target).ok().filter(|&i| i < stream.len()) else {
            debug!(
                "Field {}: anchor at {} but offset {} leaves the stream",
                self.spec.name,
                anchor,
                self.spec.offset()
            );
            return Ok(None);
        };

        let token = &stream.tokens[index];
        if let Some(window) = &self.spec.anchor_window {
            if !window.contains(token.checked_box(index)?) {
                debug!(
                    "Field {}: token {:?} next to anchor is outside its window",
                    self.spec.name, token.text
                );
                return Ok(None);
            }
        }

        Ok(Some(token.text.clone()))
    }

    /// First capture of the block pattern in any layout block.
    fn match_block(&self, stream: &TokenStream) -> StrategyResult {
        let Some(pattern) = &self.pattern else {
            return Ok(None);
        };

        Ok(stream.blocks.iter().find_map(|block| {
            pattern
                .captures(&block.content)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().trim().to_string())
                .filter(|v| !v.is_empty())
        }))
    }
}

/// Resolve one field of `stream` according to `spec`.
pub fn resolve(stream: &TokenStream, spec: &FieldSpec) -> String {
    FieldMatcher::new(spec.clone()).resolve(stream)
}
