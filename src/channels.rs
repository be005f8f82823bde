//! Standard channels for C-family languages
//!
//! Each channel recognizes one lexical family. They are combined, in a fixed
//! order, by [`crate::cfamily::standard_lexer`].

use crate::input_stream::CodeReader;
use crate::lexer::{Channel, LexerOutput};
use crate::token::{TokenType, TriviaKind, COMMENT, IDENTIFIER, UNKNOWN_CHAR, WHITESPACE};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use tracing::debug;

/// Whitespace; kept as `Skipped` trivia only when the output asks for it
#[derive(Debug, Clone, Copy, Default)]
pub struct WhitespaceChannel;

impl Channel for WhitespaceChannel {
    fn consume(&self, code: &mut CodeReader<'_>, output: &mut LexerOutput) -> bool {
        let start = code.position();
        if code.consume_while(char::is_whitespace).is_empty() {
            return false;
        }
        if output.retain_whitespace() {
            output.emit_trivia(TriviaKind::Skipped, &WHITESPACE, code, start);
        }
        true
    }
}

/// `//` line comments and non-nesting `/* */` block comments
#[derive(Debug, Clone, Copy, Default)]
pub struct CommentChannel;

impl Channel for CommentChannel {
    fn consume(&self, code: &mut CodeReader<'_>, output: &mut LexerOutput) -> bool {
        let start = code.position();
        let remaining = code.remaining();

        let len = if remaining.starts_with("//") {
            remaining.find(['\n', '\r']).unwrap_or(remaining.len())
        } else if let Some(body) = remaining.strip_prefix("/*") {
            // An unterminated block comment is not a comment
            match body.find("*/") {
                Some(end) => end + 4,
                None => return false,
            }
        } else {
            return false;
        };

        code.consume(len);
        output.emit_trivia(TriviaKind::Comment, &COMMENT, code, start);
        true
    }
}

/// Backslash immediately followed by a line break
#[derive(Debug, Clone, Copy, Default)]
pub struct LineContinuationChannel;

impl Channel for LineContinuationChannel {
    fn consume(&self, code: &mut CodeReader<'_>, output: &mut LexerOutput) -> bool {
        let len = match code.remaining().as_bytes() {
            [b'\\', b'\r', b'\n', ..] => 3,
            [b'\\', b'\n', ..] | [b'\\', b'\r', ..] => 2,
            _ => return false,
        };
        let start = code.position();
        code.consume(len);
        if output.retain_whitespace() {
            output.emit_trivia(TriviaKind::Skipped, &WHITESPACE, code, start);
        }
        true
    }
}

/// Preprocessor directives, emitted as one token per logical line.
///
/// The token value is the directive with comments removed and escaped line
/// breaks replaced by a space; the original value is the raw text.
#[derive(Debug, Clone, Copy)]
pub struct PreprocessorChannel {
    token_type: &'static TokenType,
}

impl PreprocessorChannel {
    pub fn new(token_type: &'static TokenType) -> Self {
        PreprocessorChannel { token_type }
    }
}

impl Channel for PreprocessorChannel {
    fn consume(&self, code: &mut CodeReader<'_>, output: &mut LexerOutput) -> bool {
        if code.current() != Some('#') {
            return false;
        }
        let start = code.position();
        let mut value = String::new();

        while let Some(ch) = code.current() {
            if ch == '\n' || ch == '\r' {
                break;
            }
            // Literals are copied verbatim, comment markers inside them included
            if let Some(len) = quoted_literal_len(code.remaining()) {
                value.push_str(code.consume(len));
                continue;
            }
            let rest = code.remaining();
            if rest.starts_with("//") {
                code.consume_while(|c| c != '\n' && c != '\r');
            } else if let Some(body) = rest.strip_prefix("/*") {
                let len = body.find("*/").map_or(rest.len(), |end| end + 4);
                code.consume(len);
                value.push(' ');
            } else if rest.starts_with("\\\r\n") {
                code.consume(3);
                value.push(' ');
            } else if rest.starts_with("\\\n") || rest.starts_with("\\\r") {
                code.consume(2);
                value.push(' ');
            } else {
                value.push(ch);
                code.advance();
            }
        }

        output.emit(self.token_type, value.trim_end(), code, start);
        true
    }
}

/// Length of a `"..."` or `'...'` literal at the start of `text`
fn quoted_literal_len(text: &str) -> Option<usize> {
    let quote = text.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let mut escaped = false;
    for (i, ch) in text.char_indices().skip(1) {
        match ch {
            '\n' | '\r' => return None,
            '\\' if !escaped => escaped = true,
            c if c == quote && !escaped => return Some(i + 1),
            _ => escaped = false,
        }
    }
    None
}

/// Length of an encoding prefix (`u8`, `u`, `U`, `L`) at the start of `text`
fn encoding_prefix_len(text: &str) -> usize {
    if text.starts_with("u8") {
        2
    } else if text.starts_with(['u', 'U', 'L']) {
        1
    } else {
        0
    }
}

/// Length of a user-defined literal suffix at the start of `text`
fn ud_suffix_len(text: &str) -> usize {
    let mut chars = text.char_indices();
    match chars.next() {
        Some((_, c)) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return 0,
    }
    chars
        .find(|(_, c)| !(c.is_ascii_alphanumeric() || *c == '_'))
        .map_or(text.len(), |(i, _)| i)
}

/// Character literals: `'a'`, `'\n'`, `u8'a'`, `L'ab'`, with optional ud-suffix
#[derive(Debug, Clone, Copy)]
pub struct CharacterLiteralChannel {
    token_type: &'static TokenType,
}

impl CharacterLiteralChannel {
    pub fn new(token_type: &'static TokenType) -> Self {
        CharacterLiteralChannel { token_type }
    }
}

impl Channel for CharacterLiteralChannel {
    fn consume(&self, code: &mut CodeReader<'_>, output: &mut LexerOutput) -> bool {
        let text = code.remaining();
        let prefix = encoding_prefix_len(text);
        if !text[prefix..].starts_with('\'') {
            return false;
        }
        let Some(body) = quoted_literal_len(&text[prefix..]) else {
            return false;
        };
        let len = prefix + body;
        let len = len + ud_suffix_len(&text[len..]);

        let start = code.position();
        let value = code.consume(len);
        output.emit(self.token_type, value, code, start);
        true
    }
}

/// String literals, raw strings included
#[derive(Debug, Clone, Copy)]
pub struct StringLiteralChannel {
    token_type: &'static TokenType,
}

impl StringLiteralChannel {
    pub fn new(token_type: &'static TokenType) -> Self {
        StringLiteralChannel { token_type }
    }

    fn literal_len(text: &str) -> Option<usize> {
        let mut index = encoding_prefix_len(text);
        let raw = text[index..].starts_with("R\"");
        if raw {
            index += 1;
            // R"delim( ... )delim"
            let body = &text[index + 1..];
            let open = body.find('(')?;
            let delimiter = &body[..open];
            if delimiter.len() > 16 || delimiter.contains(char::is_whitespace) {
                return None;
            }
            let closing = format!("){}\"", delimiter);
            let end = body[open + 1..].find(&closing)?;
            index += 1 + open + 1 + end + closing.len();
        } else {
            if !text[index..].starts_with('"') {
                return None;
            }
            index += quoted_literal_len(&text[index..])?;
        }
        Some(index + ud_suffix_len(&text[index..]))
    }
}

impl Channel for StringLiteralChannel {
    fn consume(&self, code: &mut CodeReader<'_>, output: &mut LexerOutput) -> bool {
        let Some(len) = Self::literal_len(code.remaining()) else {
            return false;
        };
        let start = code.position();
        let value = code.consume(len);
        output.emit(self.token_type, value, code, start);
        true
    }
}

const EXPONENT: &str = r"[Ee][+-]?[0-9_](?:'?[0-9_]+)*";
const BINARY_EXPONENT: &str = r"[pP][+-]?[0-9](?:'?[0-9]+)*";
const UD_SUFFIX: &str = r"[_a-zA-Z][_a-zA-Z0-9]*";
const HEXDIGITS: &str = r"[0-9a-fA-F](?:'?[0-9a-fA-F]+)*";
const DIGITS: &str = r"[0-9](?:'?[0-9]+)*";

static NUMBER_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    let patterns = [
        // Floating literals
        format!(r"{DIGITS}\.(?:{DIGITS})?(?:{EXPONENT})?(?:{UD_SUFFIX})?"),
        format!(r"\.{DIGITS}(?:{EXPONENT})?(?:{UD_SUFFIX})?"),
        format!(r"{DIGITS}{EXPONENT}(?:{UD_SUFFIX})?"),
        // Hexadecimal floating literals
        format!(r"0[xX](?:{HEXDIGITS})?\.{HEXDIGITS}{BINARY_EXPONENT}(?:{UD_SUFFIX})?"),
        format!(r"0[xX]{HEXDIGITS}\.?{BINARY_EXPONENT}(?:{UD_SUFFIX})?"),
        // Integer literals
        format!(r"0[xX]{HEXDIGITS}(?:{UD_SUFFIX})?"),
        format!(r"0[bB][01](?:'?[01]+)*(?:{UD_SUFFIX})?"),
        format!(r"0(?:'?[0-7]+)+(?:{UD_SUFFIX})?"),
        format!(r"[1-9](?:'?[0-9]+)*(?:{UD_SUFFIX})?"),
        format!(r"0(?:{UD_SUFFIX})?"),
    ];
    patterns
        .iter()
        .map(|p| Regex::new(&format!("^(?:{p})")).expect("invalid number pattern"))
        .collect()
});

/// Integer and floating literals, tried in order; the first pattern that
/// matches decides the length of the token
#[derive(Debug, Clone, Copy)]
pub struct NumberChannel {
    token_type: &'static TokenType,
}

impl NumberChannel {
    pub fn new(token_type: &'static TokenType) -> Self {
        NumberChannel { token_type }
    }

    fn literal_len(text: &str) -> Option<usize> {
        let first = text.chars().next()?;
        if !(first.is_ascii_digit() || first == '.') {
            return None;
        }
        NUMBER_PATTERNS
            .iter()
            .find_map(|pattern| pattern.find(text))
            .map(|m| m.end())
            .filter(|len| *len > 0)
    }
}

impl Channel for NumberChannel {
    fn consume(&self, code: &mut CodeReader<'_>, output: &mut LexerOutput) -> bool {
        let Some(len) = Self::literal_len(code.remaining()) else {
            return false;
        };
        let start = code.position();
        let value = code.consume(len);
        output.emit(self.token_type, value, code, start);
        true
    }
}

/// `[A-Za-z_][A-Za-z0-9_]*`, classified against a closed keyword set
pub struct IdentifierAndKeywordChannel {
    keywords: HashMap<&'static str, &'static TokenType>,
}

impl IdentifierAndKeywordChannel {
    pub fn new(keywords: &[&'static TokenType]) -> Self {
        IdentifierAndKeywordChannel {
            keywords: keywords.iter().map(|k| (k.value(), *k)).collect(),
        }
    }
}

impl Channel for IdentifierAndKeywordChannel {
    fn consume(&self, code: &mut CodeReader<'_>, output: &mut LexerOutput) -> bool {
        match code.current() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
            _ => return false,
        }
        let start = code.position();
        let word = code.consume_while(|c| c.is_ascii_alphanumeric() || c == '_');
        let token_type = self.keywords.get(word).copied().unwrap_or(&IDENTIFIER);
        output.emit(token_type, word, code, start);
        true
    }
}

/// Longest match over a punctuator table
pub struct PunctuatorChannel {
    punctuators: Vec<&'static TokenType>,
}

impl PunctuatorChannel {
    pub fn new(punctuators: &[&'static TokenType]) -> Self {
        let mut punctuators = punctuators.to_vec();
        punctuators.sort_by_key(|p| std::cmp::Reverse(p.value().len()));
        PunctuatorChannel { punctuators }
    }
}

impl Channel for PunctuatorChannel {
    fn consume(&self, code: &mut CodeReader<'_>, output: &mut LexerOutput) -> bool {
        let remaining = code.remaining();
        let Some(punctuator) = self
            .punctuators
            .iter()
            .find(|p| remaining.starts_with(p.value()))
        else {
            return false;
        };
        let start = code.position();
        code.consume(punctuator.value().len());
        output.emit(punctuator, punctuator.value(), code, start);
        true
    }
}

/// Fallback consuming exactly one character
#[derive(Debug, Clone, Copy, Default)]
pub struct UnknownCharacterChannel;

impl Channel for UnknownCharacterChannel {
    fn consume(&self, code: &mut CodeReader<'_>, output: &mut LexerOutput) -> bool {
        let start = code.position();
        let Some(ch) = code.advance() else {
            return false;
        };
        debug!(
            line = start.line,
            column = start.column,
            character = ?ch,
            source = %output.source(),
            "unknown character"
        );
        output.emit(&UNKNOWN_CHAR, ch.to_string(), code, start);
        true
    }
}
