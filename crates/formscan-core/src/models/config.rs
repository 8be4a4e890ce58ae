//! Configuration structures for the extraction pipeline.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::layout::FormLayout;
use crate::error::{FormscanError, Result};

/// Main configuration for formscan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormscanConfig {
    /// Form layout: field specs, table columns and row templates.
    pub layout: FormLayout,

    /// Extraction behaviour.
    pub extraction: ExtractionConfig,
}

/// Extraction engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Tokens scored below this are dropped before extraction (0.0 - 1.0).
    pub min_token_score: f32,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            min_token_score: 0.0, // Disabled - recognition scores vary a lot between prints
        }
    }
}

impl FormscanConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| FormscanError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
