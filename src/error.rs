//! Error types shared by every stage of the pipeline
//!
//! Grammar construction and compilation fail fast with [`GrammarError`].
//! Lexing can only fail on I/O or an internal [`LexError::LexicalDeadlock`].
//! Recognition failures are reported as a positioned [`ParseFailure`].

use crate::token::Token;
use std::fmt;
use thiserror::Error;

/// Errors raised while building or compiling a grammar
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GrammarError {
    /// A rule was given a second expression through `define`
    #[error("The rule '{rule}' has already been defined somewhere in the grammar")]
    DefinitionConflict { rule: String },

    /// A rule reference has no definition at compile time
    #[error("The rule '{rule}' referenced from '{referenced_from}' has no definition")]
    UnresolvedRule {
        rule: String,
        referenced_from: String,
    },

    /// `compile` was called on a grammar without a root rule
    #[error("The grammar has no root rule")]
    MissingRootRule,
}

/// Errors raised by the channel lexer
#[derive(Debug, Error)]
pub enum LexError {
    /// No channel consumed the character at the given position.
    ///
    /// This only happens with a lexer built without a fallback channel.
    #[error(
        "Lexical deadlock at line {line}, column {column}: no channel consumed {character:?}"
    )]
    LexicalDeadlock {
        line: usize,
        column: usize,
        character: char,
    },

    /// The source file could not be read
    #[error("Unable to read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Why the parsing machine gave up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// Every alternative was exhausted
    NoViableAlternative,

    /// A rule re-entered itself at the same position without consuming input
    LeftRecursion { rule: String },
}

/// A recognition failure anchored at the furthest token the machine reached
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseFailure {
    /// 1-based line of the offending token
    pub line: usize,
    /// 0-based column of the offending token
    pub column: usize,
    /// Index of the offending token in the stream
    pub position: usize,
    /// Value of the offending token ("EOF" at the end of input)
    pub token_value: String,
    /// Descriptions of the tokens that would have been accepted
    pub expected: Vec<String>,
    pub reason: FailureReason,
}

impl ParseFailure {
    /// Format the failure together with the offending source line.
    ///
    /// The line is rebuilt from the original values of the tokens that sit on
    /// the same line as the failure, each placed at its column, so no access
    /// to the source text is needed and the caret lines up with the token.
    pub fn format_with_context(&self, tokens: &[Token]) -> String {
        let mut context = String::new();
        let mut width = 0;
        for token in tokens.iter().filter(|t| t.line() == self.line) {
            if token.column() > width {
                context.push_str(&" ".repeat(token.column() - width));
                width = token.column();
            }
            context.push_str(token.original_value());
            width += token.original_value().chars().count();
        }

        let pointer = " ".repeat(self.column);
        format!("{}\n  {}\n  {}^", self, context.trim_end(), pointer)
    }
}

impl fmt::Display for ParseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Parse error at line {}, column {}: ", self.line, self.column)?;
        match &self.reason {
            FailureReason::NoViableAlternative => {
                write!(f, "Unexpected '{}'", self.token_value)?;
                if !self.expected.is_empty() {
                    write!(f, ", expected {}", self.expected.join(" or "))?;
                }
                Ok(())
            }
            FailureReason::LeftRecursion { rule } => write!(
                f,
                "Left recursion without progress detected in rule '{}'",
                rule
            ),
        }
    }
}

impl std::error::Error for ParseFailure {}

/// Errors raised while compiling an XPath query
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum XPathError {
    #[error("XPath syntax error at offset {offset}: {message}")]
    Syntax { offset: usize, message: String },

    #[error("Unknown XPath function '{0}'")]
    UnknownFunction(String),
}

/// Errors raised while loading a configuration file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unable to read configuration '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    Json(#[from] serde_json::Error),
}

/// Crate-level error
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Grammar(#[from] GrammarError),

    #[error(transparent)]
    Lex(#[from] LexError),

    #[error(transparent)]
    Parse(#[from] ParseFailure),

    #[error(transparent)]
    XPath(#[from] XPathError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
