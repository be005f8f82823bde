//! Tokens, token types and trivia
//!
//! A [`TokenType`] is a statically allocated descriptor. Two types are equal
//! only if they are the same descriptor, so a grammar can never confuse a
//! keyword with an identifier that happens to share its name.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::{Index, Range};
use std::sync::Arc;

/// Broad classification of a token type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenClass {
    Keyword,
    Punctuator,
    Literal,
    Identifier,
    Comment,
    Preprocessor,
    Whitespace,
    Eof,
    Unknown,
    Other,
}

/// Descriptor of a kind of token, compared by identity
pub struct TokenType {
    name: &'static str,
    value: &'static str,
    class: TokenClass,
}

impl TokenType {
    /// Create a descriptor; bind it to a `static` to give it an identity
    pub const fn new(name: &'static str, value: &'static str, class: TokenClass) -> Self {
        TokenType { name, value, class }
    }

    /// Allocate a descriptor at runtime.
    ///
    /// The descriptor lives for the rest of the process, like any `static`.
    pub fn leak(name: impl Into<String>, value: impl Into<String>, class: TokenClass) -> &'static TokenType {
        let name: &'static str = Box::leak(name.into().into_boxed_str());
        let value: &'static str = Box::leak(value.into().into_boxed_str());
        Box::leak(Box::new(TokenType { name, value, class }))
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Source text of keywords and punctuators, or the name for other types
    pub fn value(&self) -> &'static str {
        self.value
    }

    pub fn class(&self) -> TokenClass {
        self.class
    }

    /// Human readable description used in "expected ..." messages
    pub fn describe(&self) -> String {
        match self.class {
            TokenClass::Keyword | TokenClass::Punctuator => format!("\"{}\"", self.value),
            _ => self.name.to_string(),
        }
    }
}

impl PartialEq for TokenType {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}

impl Eq for TokenType {}

impl Hash for TokenType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (self as *const TokenType).hash(state);
    }
}

impl fmt::Debug for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TokenType({})", self.name)
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

pub static EOF: TokenType = TokenType::new("EOF", "EOF", TokenClass::Eof);
pub static IDENTIFIER: TokenType = TokenType::new("IDENTIFIER", "IDENTIFIER", TokenClass::Identifier);
pub static LITERAL: TokenType = TokenType::new("LITERAL", "LITERAL", TokenClass::Literal);
pub static COMMENT: TokenType = TokenType::new("COMMENT", "COMMENT", TokenClass::Comment);
pub static WHITESPACE: TokenType = TokenType::new("WHITESPACE", "WHITESPACE", TokenClass::Whitespace);
pub static UNKNOWN_CHAR: TokenType = TokenType::new("UNKNOWN_CHAR", "UNKNOWN_CHAR", TokenClass::Unknown);

/// Opaque reference to the origin of a token (file path or URI)
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SourceRef(Arc<str>);

impl SourceRef {
    pub fn new(source: impl AsRef<str>) -> Self {
        SourceRef(Arc::from(source.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SourceRef {
    fn default() -> Self {
        SourceRef::new("tests://unittest")
    }
}

impl fmt::Debug for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", &*self.0)
    }
}

impl fmt::Display for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriviaKind {
    Comment,
    /// Discarded text such as whitespace, only kept on request
    Skipped,
    /// Tokens removed from the stream by a preprocessor
    Preprocessor,
}

/// Non-significant material attached to the token that follows it
#[derive(Debug, Clone, PartialEq)]
pub struct Trivia {
    kind: TriviaKind,
    tokens: Vec<Token>,
}

impl Trivia {
    pub fn comment(token: Token) -> Self {
        Trivia {
            kind: TriviaKind::Comment,
            tokens: vec![token],
        }
    }

    pub fn skipped(token: Token) -> Self {
        Trivia {
            kind: TriviaKind::Skipped,
            tokens: vec![token],
        }
    }

    pub fn preprocessor(tokens: Vec<Token>) -> Self {
        Trivia {
            kind: TriviaKind::Preprocessor,
            tokens,
        }
    }

    pub fn kind(&self) -> TriviaKind {
        self.kind
    }

    pub fn is_comment(&self) -> bool {
        self.kind == TriviaKind::Comment
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// First (usually only) token of the trivia
    pub fn token(&self) -> Option<&Token> {
        self.tokens.first()
    }

    /// Raw text of the trivia, delimiters included
    pub fn text(&self) -> String {
        self.tokens.iter().map(Token::original_value).collect()
    }

    /// `/** ... */`, `/*! ... */`, `/// ...` and `//! ...` comments
    pub fn is_doc_comment(&self) -> bool {
        if !self.is_comment() {
            return false;
        }
        let Some(token) = self.token() else {
            return false;
        };
        let text = token.original_value();
        (text.starts_with("/**") && text != "/**/" && !text.starts_with("/***"))
            || text.starts_with("/*!")
            || (text.starts_with("///") && !text.starts_with("////"))
            || text.starts_with("//!")
    }
}

/// Immutable lexical unit
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    token_type: &'static TokenType,
    value: String,
    original_value: String,
    line: usize,
    column: usize,
    span: Range<usize>,
    source: SourceRef,
    trivia: Vec<Trivia>,
    generated: bool,
}

impl Token {
    pub fn builder(token_type: &'static TokenType, value: impl Into<String>) -> TokenBuilder {
        let value = value.into();
        TokenBuilder {
            token: Token {
                token_type,
                original_value: value.clone(),
                value,
                line: 1,
                column: 0,
                span: 0..0,
                source: SourceRef::default(),
                trivia: Vec::new(),
                generated: false,
            },
        }
    }

    pub fn token_type(&self) -> &'static TokenType {
        self.token_type
    }

    pub fn is(&self, token_type: &TokenType) -> bool {
        self.token_type == token_type
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// Text exactly as it appeared in the source
    pub fn original_value(&self) -> &str {
        &self.original_value
    }

    /// 1-based line
    pub fn line(&self) -> usize {
        self.line
    }

    /// 0-based column, counted in characters
    pub fn column(&self) -> usize {
        self.column
    }

    /// Byte range of the token in the source text
    pub fn span(&self) -> Range<usize> {
        self.span.clone()
    }

    pub fn source(&self) -> &SourceRef {
        &self.source
    }

    pub fn trivia(&self) -> &[Trivia] {
        &self.trivia
    }

    pub fn has_trivia(&self) -> bool {
        !self.trivia.is_empty()
    }

    pub fn comments(&self) -> impl Iterator<Item = &Trivia> {
        self.trivia.iter().filter(|t| t.is_comment())
    }

    pub fn is_generated(&self) -> bool {
        self.generated
    }

    /// Return this token with `trivia` placed in front of its own
    pub fn with_leading_trivia(mut self, mut trivia: Vec<Trivia>) -> Token {
        if !trivia.is_empty() {
            trivia.append(&mut self.trivia);
            self.trivia = trivia;
        }
        self
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}:{})", self.value, self.line, self.column)
    }
}

pub struct TokenBuilder {
    token: Token,
}

impl TokenBuilder {
    pub fn original_value(mut self, original: impl Into<String>) -> Self {
        self.token.original_value = original.into();
        self
    }

    pub fn line(mut self, line: usize) -> Self {
        self.token.line = line;
        self
    }

    pub fn column(mut self, column: usize) -> Self {
        self.token.column = column;
        self
    }

    pub fn span(mut self, span: Range<usize>) -> Self {
        self.token.span = span;
        self
    }

    pub fn source(mut self, source: SourceRef) -> Self {
        self.token.source = source;
        self
    }

    pub fn trivia(mut self, trivia: Vec<Trivia>) -> Self {
        self.token.trivia = trivia;
        self
    }

    pub fn generated(mut self, generated: bool) -> Self {
        self.token.generated = generated;
        self
    }

    pub fn build(self) -> Token {
        self.token
    }
}

/// EOF-terminated sequence of tokens produced by a lexer
#[derive(Debug, Clone, PartialEq)]
pub struct TokenStream {
    tokens: Arc<[Token]>,
}

impl TokenStream {
    pub fn new(tokens: Vec<Token>) -> Self {
        TokenStream {
            tokens: Arc::from(tokens),
        }
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Token> {
        self.tokens.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Token> {
        self.tokens.iter()
    }

    pub fn as_slice(&self) -> &[Token] {
        &self.tokens
    }

    /// Shared handle on the token storage, kept alive by syntax trees
    pub fn shared(&self) -> Arc<[Token]> {
        Arc::clone(&self.tokens)
    }

    /// Token values, mostly useful in tests
    pub fn values(&self) -> Vec<&str> {
        self.tokens.iter().map(Token::value).collect()
    }
}

impl Index<usize> for TokenStream {
    type Output = Token;

    fn index(&self, index: usize) -> &Token {
        &self.tokens[index]
    }
}

impl<'a> IntoIterator for &'a TokenStream {
    type Item = &'a Token;
    type IntoIter = std::slice::Iter<'a, Token>;

    fn into_iter(self) -> Self::IntoIter {
        self.tokens.iter()
    }
}
