//! Lexical analysis
use crate::{
    constants::MAX_INT,
    error::{LexError, LexErrorKind},
};

use super::{
    cursor::{Cursor, EOF_CHAR},
    tokens::{Keyword, Span, Symbol, Token, TokenKind},
};

pub struct Lexer<'a> {
    /// Character scanner
    cursor: Cursor<'a>,
    /// Keep reference to the source so the parser can
    /// slice fragments from it.
    original: &'a str,
    /// Start absolute byte position of the current token
    /// in the source.
    start_pos: u32,
}

impl<'a> Lexer<'a> {
    pub fn new(source_code: &'a str) -> Self {
        let mut cursor = Cursor::new(source_code);

        // Initial state of the cursor is a non-existant EOF char,
        // but the initial state of the lexer should be a valid
        // token starting character.
        //
        // Prime the cursor for the first iteration.
        cursor.next();

        let start_pos = cursor.offset();

        Self {
            cursor,
            original: source_code,
            start_pos,
        }
    }

    /// Original source code that was passed in during construction.
    pub fn source_code(&self) -> &'a str {
        self.original
    }

    /// Scan the source characters and construct the next token.
    ///
    /// ## Implementation
    ///
    /// Each iteration starts with the assumption that the internal
    /// cursor is pointing to the start of the remaining source to be
    /// consumed, and must leave the cursor at the start of the next
    /// token's text when it is done.
    ///
    /// Categories are tried in a fixed order: a word is a keyword
    /// before it is an identifier, and a symbol character is never
    /// part of a number or identifier.
    pub fn next_token(&mut self) -> Result<Token, LexError> {
        use TokenKind as TK;

        self.erase_trivia()?;

        // Assume that lexer initialization, or previous iteration,
        // leaves the cursor at the next character.
        self.start_token();

        let c = self.cursor.current();

        if let Some(symbol) = Symbol::parse(c) {
            return Ok(self.make_token(TK::Symbol(symbol)));
        }

        match c {
            '0'..='9' => self.consume_number(),
            '_' | 'a'..='z' | 'A'..='Z' => Ok(self.consume_ident()),
            '"' => self.consume_string(),
            EOF_CHAR if self.cursor.at_end() => Ok(self.make_token(TK::EOF)),
            _ => Err(self.error(LexErrorKind::UnknownCharacter(c))),
        }
    }

    /// Indicates whether the lexer is at the end of the source.
    pub fn at_end(&self) -> bool {
        self.cursor.at_end()
    }

    /// Create a span using the starting position of the current token,
    /// and the current offset of the cursor.
    fn make_span(&mut self) -> Span {
        let start = self.start_pos;
        let end = self.cursor.peek_offset();

        // start and end can be equal, and a token can have 0 size.
        debug_assert!(end >= start);
        let size = end - start;

        Span { index: start, size }
    }

    fn fragment(&mut self) -> &'a str {
        let span = self.make_span();
        span.fragment(self.original)
    }

    /// Primes the lexer to consume the next token.
    fn start_token(&mut self) {
        self.start_pos = self.cursor.offset();
    }

    /// Build a token, using the source text from the position
    /// stored by [`start_token`](struct.Lexer.html#fn-start_token) to the
    /// current cursor position.
    ///
    /// Also prepare the cursor for the next iteration.
    fn make_token(&mut self, kind: TokenKind) -> Token {
        let token = Token {
            span: self.make_span(),
            kind,
        };

        // Position the cursor to the starting character for the
        // next token.
        self.cursor.next();
        debug_assert!(self.cursor.at_end() || self.cursor.offset() == token.span.end());

        token
    }

    #[inline(never)]
    #[cold]
    fn error(&mut self, kind: LexErrorKind) -> LexError {
        let span = self.make_span();
        LexError::new(self.original, span, kind)
    }
}

/// Specialised tokens.
impl<'a> Lexer<'a> {
    /// Erase whitespace and comments until the start of a token,
    /// or the end of the source.
    fn erase_trivia(&mut self) -> Result<(), LexError> {
        loop {
            while is_whitespace(self.cursor.current()) {
                self.cursor.next();
            }

            match (self.cursor.current(), self.cursor.peek()) {
                ('/', '/') => self.erase_line_comment(),
                ('/', '*') => self.erase_block_comment()?,
                _ => return Ok(()),
            }
        }
    }

    /// Erase comment line up to, but not including, the trailing newline.
    fn erase_line_comment(&mut self) {
        debug_assert_eq!(self.cursor.current(), '/');

        while !is_newline(self.cursor.current()) && !self.cursor.at_end() {
            self.cursor.next();
        }
    }

    /// Erase a `/* ... */` or `/** ... */` comment, including the closing marker.
    fn erase_block_comment(&mut self) -> Result<(), LexError> {
        debug_assert_eq!(self.cursor.current(), '/');

        self.start_token();

        // Opening marker
        self.cursor.next();
        self.cursor.next();

        loop {
            if self.cursor.at_end() {
                return Err(self.error(LexErrorKind::UnterminatedComment));
            }

            if self.cursor.current() == '*' && self.cursor.peek() == '/' {
                self.cursor.next();
                self.cursor.next();
                return Ok(());
            }

            self.cursor.next();
        }
    }

    /// Make an identifier or keyword token.
    fn consume_ident(&mut self) -> Token {
        debug_assert!(is_letter(self.cursor.current()));

        while is_letter_or_digit(self.cursor.peek()) {
            self.cursor.next();
        }

        // Reserved words take precedence over identifiers.
        let token_kind = match Keyword::parse(self.fragment()) {
            Some(keyword) => TokenKind::Keyword(keyword),
            None => TokenKind::Ident,
        };

        self.make_token(token_kind)
    }

    /// Make an unsigned decimal number literal token.
    fn consume_number(&mut self) -> Result<Token, LexError> {
        debug_assert!(is_digit(self.cursor.current()));

        while is_digit(self.cursor.peek()) {
            self.cursor.next();
        }

        let fragment = self.fragment();
        match fragment.parse::<u16>() {
            Ok(value) if value <= MAX_INT => Ok(self.make_token(TokenKind::Integer)),
            _ => Err(self.error(LexErrorKind::IntegerOverflow(fragment.to_owned()))),
        }
    }

    /// Make a string literal token.
    ///
    /// The span includes both quotes. Strings may not contain
    /// a quote or a line break.
    fn consume_string(&mut self) -> Result<Token, LexError> {
        debug_assert_eq!(self.cursor.current(), '"');

        loop {
            match self.cursor.peek() {
                '"' => {
                    self.cursor.next();
                    return Ok(self.make_token(TokenKind::String));
                }
                c if is_newline(c) => return Err(self.error(LexErrorKind::UnterminatedString)),
                EOF_CHAR if self.cursor.peek_offset() as usize >= self.original.len() => {
                    return Err(self.error(LexErrorKind::UnterminatedString));
                }
                _ => {
                    self.cursor.next();
                }
            }
        }
    }
}

/// Test whether the character is considered whitespace
/// that should be ignored by the parser later.
fn is_whitespace(c: char) -> bool {
    matches!(
        c,
        '\u{0020}' // space
            | '\u{0009}' // tab
            | '\u{000A}' // line feed
            | '\u{000D}' // carriage return
            | '\u{000C}' // form feed
            | '\u{00A0}' // no-break space
            | '\u{FEFF}' // zero width no-break space
    )
}

fn is_newline(c: char) -> bool {
    matches!(c, '\r' | '\n')
}

#[allow(clippy::manual_is_ascii_check)] // consistency with other functions
fn is_digit(c: char) -> bool {
    matches!(c, '0'..='9')
}

fn is_letter(c: char) -> bool {
    matches!(c, 'a'..='z' | 'A'..='Z' | '_')
}

fn is_letter_or_digit(c: char) -> bool {
    is_letter(c) || is_digit(c)
}

impl<'a> IntoIterator for Lexer<'a> {
    type Item = Result<Token, LexError>;
    type IntoIter = LexerIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        LexerIter {
            lexer: self,
            done: false,
        }
    }
}

/// Convenience iterator that wraps the lexer.
///
/// Yields the final EOF token once, and stops after the first error.
#[must_use = "iterators are lazy and do nothing unless consumed"]
pub struct LexerIter<'a> {
    done: bool,
    lexer: Lexer<'a>,
}

impl<'a> Iterator for LexerIter<'a> {
    type Item = Result<Token, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let result = self.lexer.next_token();
        if matches!(result, Ok(Token { kind: TokenKind::EOF, .. }) | Err(_)) {
            self.done = true;
        }
        Some(result)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Lexer::new(source)
            .into_iter()
            .map(|result| result.unwrap().kind)
            .collect()
    }

    fn fragments(source: &str) -> Vec<&str> {
        Lexer::new(source)
            .into_iter()
            .map(|result| result.unwrap().span.fragment(source))
            .collect()
    }

    #[test]
    fn test_lex_class_header() {
        use TokenKind as TK;

        assert_eq!(
            kinds("class Main {"),
            vec![
                TK::Keyword(Keyword::Class),
                TK::Ident,
                TK::Symbol(Symbol::LeftBrace),
                TK::EOF,
            ]
        );
    }

    #[test]
    fn test_lex_fragments() {
        assert_eq!(
            fragments("let a[i]=x1+42;"),
            vec!["let", "a", "[", "i", "]", "=", "x1", "+", "42", ";", ""]
        );
    }

    #[test]
    fn test_keyword_prefix_is_identifier() {
        assert_eq!(kinds("classes _if do_"), vec![
            TokenKind::Ident,
            TokenKind::Ident,
            TokenKind::Ident,
            TokenKind::EOF
        ]);
    }

    #[test]
    fn test_erase_comments() {
        const CODE: &str = concat!(
            "// line comment\n",
            "/** doc\n * comment */\n",
            "let /* inline */ x = 1; // trailing\n",
            "/**/return;",
        );

        assert_eq!(
            fragments(CODE),
            vec!["let", "x", "=", "1", ";", "return", ";", ""]
        );
    }

    #[test]
    fn test_slash_is_symbol() {
        assert_eq!(fragments("a / b"), vec!["a", "/", "b", ""]);
    }

    #[test]
    fn test_string_literal() {
        const CODE: &str = "do Output.printString(\"Hello, World\");";
        let tokens: Vec<Token> = Lexer::new(CODE).into_iter().map(Result::unwrap).collect();

        assert_eq!(tokens[5].kind, TokenKind::String);
        assert_eq!(tokens[5].span.fragment(CODE), "\"Hello, World\"");
        assert_eq!(tokens[6].kind, TokenKind::Symbol(Symbol::RightParen));
    }

    #[test]
    fn test_empty_string_literal() {
        assert_eq!(fragments("\"\""), vec!["\"\"", ""]);
    }

    #[test]
    fn test_unterminated_string() {
        let err = Lexer::new("let s = \"abc\nx").into_iter().find_map(Result::err).unwrap();
        assert_eq!(err.kind, LexErrorKind::UnterminatedString);
        assert_eq!((err.location.line, err.location.column), (1, 9));

        let err = Lexer::new("\"abc").into_iter().find_map(Result::err).unwrap();
        assert_eq!(err.kind, LexErrorKind::UnterminatedString);
    }

    #[test]
    fn test_unterminated_comment() {
        let err = Lexer::new("let x; /* oops").into_iter().find_map(Result::err).unwrap();
        assert_eq!(err.kind, LexErrorKind::UnterminatedComment);
        assert_eq!(err.location.column, 8);
    }

    #[test]
    fn test_integer_limits() {
        assert_eq!(kinds("32767"), vec![TokenKind::Integer, TokenKind::EOF]);

        let err = Lexer::new("32768").into_iter().find_map(Result::err).unwrap();
        assert_eq!(err.kind, LexErrorKind::IntegerOverflow("32768".to_owned()));

        let err = Lexer::new("99999999999").into_iter().find_map(Result::err).unwrap();
        assert!(matches!(err.kind, LexErrorKind::IntegerOverflow(_)));
    }

    #[test]
    fn test_unknown_character() {
        let err = Lexer::new("let x = #;").into_iter().find_map(Result::err).unwrap();
        assert_eq!(err.kind, LexErrorKind::UnknownCharacter('#'));
        assert_eq!(err.location.column, 9);
    }

    #[test]
    fn test_eof_repeats() {
        let mut lexer = Lexer::new("  ");
        assert_eq!(lexer.next_token().unwrap().kind, TokenKind::EOF);
        assert_eq!(lexer.next_token().unwrap().kind, TokenKind::EOF);
        assert!(lexer.at_end());
    }
}
