//! Character scanner.
use std::str::CharIndices;

use itertools::{multipeek, MultiPeek};

/// Character returned when the cursor is past the end of the source.
pub const EOF_CHAR: char = '\0';

/// Wrapper for source code that keeps a cursor position.
///
/// Allows forward lookup via peeking.
pub struct Cursor<'a> {
    /// Iterator over UTF-8 encoded source code.
    ///
    /// The `MultiPeek` wrapper allows lookahead by consuming the
    /// iterator internally and buffering the result. This is required
    /// because UTF-8 characters are variable in width.
    ///
    /// Peeking advances the internal peek cursor by 1, so every
    /// peek here is preceded by a reset.
    chars: MultiPeek<CharIndices<'a>>,
    /// Byte position in the source string, and the current character.
    current: (usize, char),
    /// number of bytes in source.
    len: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            chars: multipeek(source.char_indices()),
            current: (0, EOF_CHAR),
            len: source.len(),
        }
    }

    /// Advance the cursor and return the new current character.
    pub fn next(&mut self) -> char {
        match self.chars.next() {
            Some((index, c)) => {
                self.current = (index, c);
            }
            None => {
                // There is no end-of-file character, so the
                // position is set to the size of the source.
                self.current = (self.len, EOF_CHAR);
            }
        }
        self.current.1
    }

    /// Character under the cursor.
    #[inline]
    pub fn current(&self) -> char {
        self.current.1
    }

    /// Byte position of the character under the cursor.
    #[inline]
    pub fn offset(&self) -> u32 {
        self.current.0 as u32
    }

    /// Character after the current one.
    pub fn peek(&mut self) -> char {
        self.chars.reset_peek();
        let c = self.chars.peek().map(|(_, c)| *c).unwrap_or(EOF_CHAR);
        self.chars.reset_peek();
        c
    }

    /// Byte position of the character after the current one.
    pub fn peek_offset(&mut self) -> u32 {
        self.chars.reset_peek();
        let offset = self.chars.peek().map(|(i, _)| *i).unwrap_or(self.len);
        self.chars.reset_peek();
        offset as u32
    }

    /// Indicates if the cursor is at the end of the source.
    ///
    /// Source may contain literal `'\0'` characters, so this is the
    /// authority on end-of-file, not [`EOF_CHAR`].
    #[inline]
    pub fn at_end(&self) -> bool {
        self.current.0 >= self.len
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_cursor_walk() {
        let mut cursor = Cursor::new("ab");
        assert_eq!(cursor.current(), EOF_CHAR);

        assert_eq!(cursor.next(), 'a');
        assert_eq!(cursor.offset(), 0);
        assert_eq!(cursor.peek(), 'b');
        assert_eq!(cursor.peek_offset(), 1);
        // peeking is idempotent
        assert_eq!(cursor.peek(), 'b');

        assert_eq!(cursor.next(), 'b');
        assert_eq!(cursor.peek(), EOF_CHAR);
        assert_eq!(cursor.peek_offset(), 2);
        assert!(!cursor.at_end());

        assert_eq!(cursor.next(), EOF_CHAR);
        assert!(cursor.at_end());
        assert_eq!(cursor.offset(), 2);
    }

    #[test]
    fn test_cursor_multibyte() {
        let mut cursor = Cursor::new("é!");
        cursor.next();
        assert_eq!(cursor.current(), 'é');
        assert_eq!(cursor.peek_offset(), 2);
        assert_eq!(cursor.next(), '!');
        assert_eq!(cursor.offset(), 2);
    }
}
