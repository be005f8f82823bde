//! Lexer and parser configuration
//!
//! Every option has a default, so a configuration file only needs to list the
//! values it changes:
//!
//! ```json
//! { "lexer": { "retain_whitespace": true }, "parser": { "memoize": false } }
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Options of the standard channel lexer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LexerConfig {
    /// Keep whitespace and line continuations as `Skipped` trivia
    pub retain_whitespace: bool,
    /// Recognize `//` and `/* */` comments
    pub comments: bool,
    /// Recognize `#` directives as `PREPROCESSOR` tokens
    pub preprocessor: bool,
    /// Move directives out of the significant stream into trivia
    pub directives_as_trivia: bool,
}

impl Default for LexerConfig {
    fn default() -> Self {
        Self {
            retain_whitespace: false,
            comments: true,
            preprocessor: true,
            directives_as_trivia: false,
        }
    }
}

impl LexerConfig {
    pub fn with_retain_whitespace(mut self, retain: bool) -> Self {
        self.retain_whitespace = retain;
        self
    }

    pub fn with_comments(mut self, comments: bool) -> Self {
        self.comments = comments;
        self
    }

    pub fn with_preprocessor(mut self, preprocessor: bool) -> Self {
        self.preprocessor = preprocessor;
        self
    }

    pub fn with_directives_as_trivia(mut self, as_trivia: bool) -> Self {
        self.directives_as_trivia = as_trivia;
        self
    }
}

/// Options of the parsing machine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Honour the per-rule memoization flags.
    /// Turning this off never changes the tree, only the running time.
    pub memoize: bool,
    /// Log execution statistics at debug level after each parse
    pub collect_stats: bool,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            memoize: true,
            collect_stats: false,
        }
    }
}

impl ParserConfig {
    pub fn with_memoize(mut self, memoize: bool) -> Self {
        self.memoize = memoize;
        self
    }

    pub fn with_collect_stats(mut self, collect: bool) -> Self {
        self.collect_stats = collect;
        self
    }
}

/// Complete configuration, as read from a JSON file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub lexer: LexerConfig,
    pub parser: ParserConfig,
}

impl Config {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
