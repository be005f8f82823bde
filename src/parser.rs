//! One-stop parsing: lexer, compiled grammar and options bundled together

use crate::ast::Ast;
use crate::compiler::CompiledGrammar;
use crate::config::ParserConfig;
use crate::error::{LexError, ParseFailure, Result};
use crate::lexer::Lexer;
use crate::machine;
use crate::parse_context::ParseStats;
use crate::recovery::{self, Diagnostic};
use crate::token::{SourceRef, TokenStream};
use std::path::Path;
use tracing::{debug, warn};

/// A lexer and a compiled grammar, shareable across threads.
///
/// Every call to [`Parser::parse`] uses a fresh parse context, so one parser
/// can serve any number of concurrent parses.
pub struct Parser {
    lexer: Lexer,
    grammar: CompiledGrammar,
    config: ParserConfig,
}

/// Result of a successful parse
#[derive(Debug, Clone)]
pub struct ParseOutcome {
    pub ast: Ast,
    /// Spans consumed by recovery rules, empty for clean input
    pub diagnostics: Vec<Diagnostic>,
    pub stats: ParseStats,
}

impl ParseOutcome {
    pub fn has_errors(&self) -> bool {
        !self.diagnostics.is_empty()
    }
}

impl Parser {
    pub fn new(lexer: Lexer, grammar: CompiledGrammar) -> Self {
        Parser {
            lexer,
            grammar,
            config: ParserConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ParserConfig) -> Self {
        self.config = config;
        self
    }

    pub fn lexer(&self) -> &Lexer {
        &self.lexer
    }

    pub fn grammar(&self) -> &CompiledGrammar {
        &self.grammar
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    pub fn lex(&self, text: &str) -> Result<TokenStream, LexError> {
        self.lexer.lex(text)
    }

    /// Run the grammar over an already lexed stream
    pub fn parse(&self, tokens: &TokenStream) -> Result<ParseOutcome, ParseFailure> {
        let (result, stats) = machine::parse_with_stats(&self.grammar, tokens, &self.config);
        let ast = result?;
        let diagnostics = recovery::diagnostics(&ast);
        for diagnostic in &diagnostics {
            warn!(line = diagnostic.line, column = diagnostic.column, "{}", diagnostic);
        }
        debug!(nodes = ast.len(), recovered = diagnostics.len(), "parsed token stream");
        Ok(ParseOutcome {
            ast,
            diagnostics,
            stats,
        })
    }

    /// Lex and parse `text`, tagging its tokens with `source`
    pub fn parse_source(&self, text: &str, source: SourceRef) -> Result<ParseOutcome> {
        let tokens = self.lexer.lex_source(text, source)?;
        Ok(self.parse(&tokens)?)
    }

    pub fn parse_str(&self, text: &str) -> Result<ParseOutcome> {
        self.parse_source(text, SourceRef::default())
    }

    /// Read a UTF-8 file, then lex and parse it
    pub fn parse_file(&self, path: impl AsRef<Path>) -> Result<ParseOutcome> {
        let tokens = self.lexer.lex_file(path)?;
        Ok(self.parse(&tokens)?)
    }
}
