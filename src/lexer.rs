//! Channel-based lexer
//!
//! The lexer offers the current position to each [`Channel`] in order. The
//! first channel that consumes input wins and the loop restarts at the new
//! position. After the last character an EOF token is appended, carrying any
//! trivia that was still waiting for a token.
//!
//! Once the channels are done, optional [`Preprocessor`]s may rewrite the
//! token list.

use crate::config::LexerConfig;
use crate::error::LexError;
use crate::input_stream::{CodeReader, Position};
use crate::token::{self, SourceRef, Token, TokenStream, TokenType, Trivia, TriviaKind};
use std::path::Path;
use tracing::{debug, trace};

/// One recognizer of the lexer
pub trait Channel: Send + Sync {
    /// Try to consume input at the reader's position.
    ///
    /// Returns `true` only if input was consumed; the reader must be left
    /// untouched otherwise.
    fn consume(&self, code: &mut CodeReader<'_>, output: &mut LexerOutput) -> bool;
}

/// Sink for the tokens and trivia produced by the channels
#[derive(Debug)]
pub struct LexerOutput {
    source: SourceRef,
    retain_whitespace: bool,
    tokens: Vec<Token>,
    pending_trivia: Vec<Trivia>,
}

impl LexerOutput {
    pub fn new(source: SourceRef, retain_whitespace: bool) -> Self {
        LexerOutput {
            source,
            retain_whitespace,
            tokens: Vec::new(),
            pending_trivia: Vec::new(),
        }
    }

    pub fn source(&self) -> &SourceRef {
        &self.source
    }

    /// Whether discarded text should be kept as `Skipped` trivia
    pub fn retain_whitespace(&self) -> bool {
        self.retain_whitespace
    }

    /// Add a token; pending trivia is attached to it
    pub fn add_token(&mut self, token: Token) {
        let trivia = std::mem::take(&mut self.pending_trivia);
        self.tokens.push(token.with_leading_trivia(trivia));
    }

    /// Add trivia to be attached to the next token
    pub fn add_trivia(&mut self, trivia: Trivia) {
        self.pending_trivia.push(trivia);
    }

    /// Build a token for the text read since `start` and add it
    pub fn emit(
        &mut self,
        token_type: &'static TokenType,
        value: impl Into<String>,
        code: &CodeReader<'_>,
        start: Position,
    ) {
        let token = self.token(token_type, value, code, start);
        self.add_token(token);
    }

    /// Build a trivia token for the text read since `start` and add it
    pub fn emit_trivia(
        &mut self,
        kind: TriviaKind,
        token_type: &'static TokenType,
        code: &CodeReader<'_>,
        start: Position,
    ) {
        let text = code.text_since(start);
        let token = self.token(token_type, text, code, start);
        let trivia = match kind {
            TriviaKind::Comment => Trivia::comment(token),
            TriviaKind::Skipped => Trivia::skipped(token),
            TriviaKind::Preprocessor => Trivia::preprocessor(vec![token]),
        };
        self.add_trivia(trivia);
    }

    fn token(
        &self,
        token_type: &'static TokenType,
        value: impl Into<String>,
        code: &CodeReader<'_>,
        start: Position,
    ) -> Token {
        Token::builder(token_type, value)
            .original_value(code.text_since(start))
            .line(start.line)
            .column(start.column)
            .span(start.offset..code.offset())
            .source(self.source.clone())
            .build()
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Last significant token added so far
    pub fn last_token(&self) -> Option<&Token> {
        self.tokens.last()
    }

    fn finish(mut self, code: &CodeReader<'_>) -> Vec<Token> {
        let eof = Token::builder(&token::EOF, "EOF")
            .original_value("")
            .line(code.line())
            .column(code.column())
            .span(code.offset()..code.offset())
            .source(self.source.clone())
            .build();
        self.add_token(eof);
        self.tokens
    }
}

/// Outcome of a preprocessor looking at the remaining tokens
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreprocessorAction {
    /// Number of tokens removed from the stream
    pub consumed: usize,
    /// Trivia attached to the next token kept in the stream
    pub trivia_to_inject: Vec<Trivia>,
    /// Tokens inserted in place of the consumed ones
    pub tokens_to_inject: Vec<Token>,
}

impl PreprocessorAction {
    pub fn no_operation() -> Self {
        Self::default()
    }

    pub fn new(consumed: usize, trivia_to_inject: Vec<Trivia>, tokens_to_inject: Vec<Token>) -> Self {
        PreprocessorAction {
            consumed,
            trivia_to_inject,
            tokens_to_inject,
        }
    }
}

/// Rewrites the token list after channel lexing
pub trait Preprocessor: Send + Sync {
    /// Inspect `tokens` (the remaining tokens, the first one being the current
    /// token) and decide what to do with them.
    fn process(&self, tokens: &[Token]) -> PreprocessorAction;
}

/// Moves `PREPROCESSOR` tokens into `Preprocessor` trivia of the next token
#[derive(Debug, Clone, Copy)]
pub struct DirectivesAsTrivia {
    directive: &'static TokenType,
}

impl DirectivesAsTrivia {
    pub fn new(directive: &'static TokenType) -> Self {
        DirectivesAsTrivia { directive }
    }
}

impl Preprocessor for DirectivesAsTrivia {
    fn process(&self, tokens: &[Token]) -> PreprocessorAction {
        match tokens.first() {
            Some(token) if token.is(self.directive) => {
                PreprocessorAction::new(1, vec![Trivia::preprocessor(vec![token.clone()])], Vec::new())
            }
            _ => PreprocessorAction::no_operation(),
        }
    }
}

/// Channel lexer; immutable once built and shareable across threads
pub struct Lexer {
    channels: Vec<Box<dyn Channel>>,
    preprocessors: Vec<Box<dyn Preprocessor>>,
    retain_whitespace: bool,
}

impl Lexer {
    pub fn builder() -> LexerBuilder {
        LexerBuilder::default()
    }

    /// Lex `text` with the default source reference
    pub fn lex(&self, text: &str) -> Result<TokenStream, LexError> {
        self.lex_source(text, SourceRef::default())
    }

    /// Lex `text`, tagging every token with `source`
    pub fn lex_source(&self, text: &str, source: SourceRef) -> Result<TokenStream, LexError> {
        let mut code = CodeReader::new(text);
        let mut output = LexerOutput::new(source, self.retain_whitespace);

        while !code.is_eof() {
            let before = code.offset();
            let consumed = self
                .channels
                .iter()
                .any(|channel| channel.consume(&mut code, &mut output));

            if !consumed || code.offset() == before {
                return Err(LexError::LexicalDeadlock {
                    line: code.line(),
                    column: code.column(),
                    character: code.current().unwrap_or('\0'),
                });
            }
        }

        let mut tokens = output.finish(&code);
        for preprocessor in &self.preprocessors {
            tokens = preprocess(preprocessor.as_ref(), tokens);
        }

        debug!(tokens = tokens.len(), bytes = text.len(), "lexed source");
        Ok(TokenStream::new(tokens))
    }

    /// Read a UTF-8 file and lex its content
    pub fn lex_file(&self, path: impl AsRef<Path>) -> Result<TokenStream, LexError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| LexError::Io {
            path: path.display().to_string(),
            source,
        })?;
        self.lex_source(&text, SourceRef::new(path.display().to_string()))
    }
}

fn preprocess(preprocessor: &dyn Preprocessor, tokens: Vec<Token>) -> Vec<Token> {
    let mut result = Vec::with_capacity(tokens.len());
    let mut pending: Vec<Trivia> = Vec::new();
    let mut i = 0;

    while i < tokens.len() {
        let action = preprocessor.process(&tokens[i..]);
        // The EOF token always stays in the stream
        let consumed = action.consumed.min(tokens.len() - i - 1);

        for token in &tokens[i..i + consumed] {
            pending.extend(token.trivia().iter().cloned());
        }
        pending.extend(action.trivia_to_inject);
        for token in action.tokens_to_inject {
            result.push(token.with_leading_trivia(std::mem::take(&mut pending)));
        }

        if consumed == 0 {
            result.push(tokens[i].clone().with_leading_trivia(std::mem::take(&mut pending)));
            i += 1;
        } else {
            trace!(consumed, "preprocessor removed tokens");
            i += consumed;
        }
    }
    result
}

#[derive(Default)]
pub struct LexerBuilder {
    channels: Vec<Box<dyn Channel>>,
    preprocessors: Vec<Box<dyn Preprocessor>>,
    retain_whitespace: bool,
}

impl LexerBuilder {
    pub fn with_channel(mut self, channel: impl Channel + 'static) -> Self {
        self.channels.push(Box::new(channel));
        self
    }

    pub fn with_preprocessor(mut self, preprocessor: impl Preprocessor + 'static) -> Self {
        self.preprocessors.push(Box::new(preprocessor));
        self
    }

    pub fn retain_whitespace(mut self, retain: bool) -> Self {
        self.retain_whitespace = retain;
        self
    }

    /// Apply the options of `config` that concern every lexer
    pub fn with_config(self, config: &LexerConfig) -> Self {
        self.retain_whitespace(config.retain_whitespace)
    }

    pub fn build(self) -> Lexer {
        Lexer {
            channels: self.channels,
            preprocessors: self.preprocessors,
            retain_whitespace: self.retain_whitespace,
        }
    }
}
