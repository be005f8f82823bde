//! Character cursor over source text with line/column tracking
//!
//! Channels read the text through a [`CodeReader`]. Offsets are byte offsets
//! into the source, lines are 1-based and columns are 0-based character counts.

use std::fmt;

/// Snapshot of a reader position, used to rewind after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

/// Cursor over source text that tracks line and column while advancing
#[derive(Clone)]
pub struct CodeReader<'a> {
    text: &'a str,
    position: Position,
}

impl<'a> CodeReader<'a> {
    pub fn new(text: &'a str) -> Self {
        CodeReader {
            text,
            position: Position {
                offset: 0,
                line: 1,
                column: 0,
            },
        }
    }

    /// Get the current character without advancing
    pub fn current(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    /// Look ahead at the character `offset` characters after the current one
    pub fn peek(&self, offset: usize) -> Option<char> {
        self.remaining().chars().nth(offset)
    }

    /// Get the current character and advance past it
    pub fn advance(&mut self) -> Option<char> {
        let ch = self.current()?;
        self.position.offset += ch.len_utf8();
        match ch {
            '\n' => self.new_line(),
            // A lone '\r' ends a line, "\r\n" ends it on the '\n'
            '\r' if self.current() != Some('\n') => self.new_line(),
            _ => self.position.column += 1,
        }
        Some(ch)
    }

    fn new_line(&mut self) {
        self.position.line += 1;
        self.position.column = 0;
    }

    /// Advance over `len` bytes and return the consumed text.
    ///
    /// `len` is clamped to the end of the input and must fall on a character
    /// boundary, which is always the case for lengths taken from matches on
    /// [`CodeReader::remaining`].
    pub fn consume(&mut self, len: usize) -> &'a str {
        let start = self.position.offset;
        let end = (start + len).min(self.text.len());
        while self.position.offset < end {
            if self.advance().is_none() {
                break;
            }
        }
        &self.text[start..self.position.offset]
    }

    /// Advance while `predicate` holds and return the consumed text
    pub fn consume_while(&mut self, mut predicate: impl FnMut(char) -> bool) -> &'a str {
        let start = self.position.offset;
        while let Some(ch) = self.current() {
            if !predicate(ch) {
                break;
            }
            self.advance();
        }
        &self.text[start..self.position.offset]
    }

    pub fn starts_with(&self, prefix: &str) -> bool {
        self.remaining().starts_with(prefix)
    }

    /// Current position, to be restored with [`CodeReader::set_position`]
    pub fn position(&self) -> Position {
        self.position
    }

    /// Set position (for backtracking)
    pub fn set_position(&mut self, position: Position) {
        self.position = position;
    }

    pub fn offset(&self) -> usize {
        self.position.offset
    }

    pub fn line(&self) -> usize {
        self.position.line
    }

    pub fn column(&self) -> usize {
        self.position.column
    }

    /// Remaining input as a string slice
    pub fn remaining(&self) -> &'a str {
        &self.text[self.position.offset..]
    }

    /// Text between a previously saved position and the current one
    pub fn text_since(&self, start: Position) -> &'a str {
        &self.text[start.offset..self.position.offset]
    }

    /// Check if at end of input
    pub fn is_eof(&self) -> bool {
        self.position.offset >= self.text.len()
    }

    /// Total length in bytes
    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

impl fmt::Debug for CodeReader<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CodeReader({}:{}, remaining={:?})",
            self.position.line,
            self.position.column,
            self.remaining().chars().take(20).collect::<String>()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new() {
        let reader = CodeReader::new("hello");
        assert_eq!(reader.len(), 5);
        assert_eq!(reader.offset(), 0);
        assert_eq!(reader.line(), 1);
        assert_eq!(reader.column(), 0);
        assert!(!reader.is_eof());
    }

    #[test]
    fn test_current_and_advance() {
        let mut reader = CodeReader::new("abc");
        assert_eq!(reader.current(), Some('a'));
        assert_eq!(reader.advance(), Some('a'));
        assert_eq!(reader.column(), 1);
        assert_eq!(reader.current(), Some('b'));

        assert_eq!(reader.advance(), Some('b'));
        assert_eq!(reader.advance(), Some('c'));
        assert_eq!(reader.advance(), None);
        assert!(reader.is_eof());
    }

    #[test]
    fn test_peek() {
        let reader = CodeReader::new("hello");
        assert_eq!(reader.peek(0), Some('h'));
        assert_eq!(reader.peek(1), Some('e'));
        assert_eq!(reader.peek(4), Some('o'));
        assert_eq!(reader.peek(5), None);
    }

    #[test]
    fn test_backtracking() {
        let mut reader = CodeReader::new("ab\ncd");
        let start = reader.position();
        reader.consume(4);
        assert_eq!(reader.line(), 2);
        assert_eq!(reader.column(), 1);

        reader.set_position(start);
        assert_eq!(reader.offset(), 0);
        assert_eq!(reader.line(), 1);
        assert_eq!(reader.current(), Some('a'));
    }

    #[test]
    fn test_line_endings() {
        let mut reader = CodeReader::new("a\r\nb\rc\nd");
        reader.consume_while(|c| c != 'b');
        assert_eq!((reader.line(), reader.column()), (2, 0));
        reader.consume_while(|c| c != 'c');
        assert_eq!((reader.line(), reader.column()), (3, 0));
        reader.consume_while(|c| c != 'd');
        assert_eq!((reader.line(), reader.column()), (4, 0));
    }

    #[test]
    fn test_unicode() {
        let mut reader = CodeReader::new("Hello 世界");
        reader.consume_while(|c| c.is_ascii());
        assert_eq!(reader.current(), Some('世'));
        assert_eq!(reader.column(), 6);
        reader.advance();
        assert_eq!(reader.current(), Some('界'));
        assert_eq!(reader.column(), 7);
        assert_eq!(reader.offset(), 9);
    }

    #[test]
    fn test_consume_returns_text() {
        let mut reader = CodeReader::new("hello world");
        let start = reader.position();
        assert_eq!(reader.consume(5), "hello");
        assert_eq!(reader.text_since(start), "hello");
        assert_eq!(reader.remaining(), " world");
        assert_eq!(reader.consume(100), " world");
        assert!(reader.is_eof());
    }

    #[test]
    fn test_empty() {
        let reader = CodeReader::new("");
        assert!(reader.is_empty());
        assert!(reader.is_eof());
        assert_eq!(reader.current(), None);
    }
}
