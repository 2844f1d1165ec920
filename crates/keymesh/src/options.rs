//! Parser configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{KeyfileError, Result};

/// How the block parser treats an unexpected token inside a block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseMode {
    /// Leave the block and look for the next keyword.
    #[default]
    Permissive,
    /// Raise a syntax error.
    Strict,
}

/// What to do when a node id is defined a second time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateNodePolicy {
    /// The first definition stays; later ones are dropped with a warning.
    #[default]
    KeepFirst,
    /// Raise a duplicate id error.
    Reject,
}

/// Options for parsing keyfiles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseOptions {
    /// Handling of unexpected tokens inside blocks.
    pub mode: ParseMode,
    /// Handling of repeated node ids.
    pub duplicate_nodes: DuplicateNodePolicy,
}

impl ParseOptions {
    /// Strict mode with duplicate nodes rejected.
    pub fn strict() -> Self {
        Self {
            mode: ParseMode::Strict,
            duplicate_nodes: DuplicateNodePolicy::Reject,
        }
    }

    /// Read options from TOML text. Missing keys take their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Read options from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| KeyfileError::source_access(path, e.to_string()))?;
        Self::from_toml_str(&text)
    }

    /// Whether unexpected tokens are errors.
    pub fn is_strict(&self) -> bool {
        self.mode == ParseMode::Strict
    }
}
