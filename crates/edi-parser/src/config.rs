//! Parser configuration

use crate::{Error, Result};
use edi_ir::ErrorLevel;
use serde::Deserialize;
use std::path::Path;

/// Options fixed for the lifetime of one parser
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ParserConfig {
    /// Break ties between templates sharing a lead segment id by content
    pub prevalidate: bool,
    /// Abort when no transaction-set definition exists
    pub throw_on_error: bool,
    /// Turn a non-empty error collection into a failed parse
    pub fail_on_errors: bool,
    /// Run the validation pass after the grammar completes
    pub auto_validate: bool,
    /// Least severe level recorded
    pub error_level: ErrorLevel,
    /// Segment ids whose second field declares a binary payload length
    pub binary_segments: Vec<String>,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            prevalidate: true,
            throw_on_error: false,
            fail_on_errors: false,
            auto_validate: true,
            error_level: ErrorLevel::Situation,
            binary_segments: vec!["BIN".to_string(), "BDS".to_string()],
        }
    }
}

impl ParserConfig {
    /// # Errors
    ///
    /// Returns [`Error::Config`] on malformed YAML.
    pub fn from_yaml(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).map_err(|e| Error::Config(format!("YAML parse error: {e}")))
    }

    /// # Errors
    ///
    /// Returns [`Error::Config`] on malformed JSON.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::Config(format!("JSON parse error: {e}")))
    }

    /// Load from a `.yaml`/`.yml` or JSON file
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read, or [`Error::Config`]
    /// if it cannot be parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        if path.extension().is_some_and(|e| e == "yaml" || e == "yml") {
            Self::from_yaml(&text)
        } else {
            Self::from_json(&text)
        }
    }

    pub fn is_binary_segment(&self, id: &str) -> bool {
        self.binary_segments.iter().any(|s| s == id)
    }
}
