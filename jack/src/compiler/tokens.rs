//! Tokens

use std::fmt;

#[derive(Debug, Clone, Copy)]
pub struct Token {
    pub span: Span,
    pub kind: TokenKind,
}

impl Token {
    #[inline]
    pub fn is_eof(&self) -> bool {
        self.kind == TokenKind::EOF
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[rustfmt::skip]
pub enum TokenKind {
    /// Reserved identifiers
    Keyword(Keyword),
    /// Single character punctuation and operators
    Symbol(Symbol),
    /// Unsigned decimal number literal
    Integer,
    /// String literal, quotes included in the span
    String,
    Ident,

    // ------------------------------------------------------------------------
    // Special
    /// End-of-file
    EOF,
}

impl TokenKind {
    /// Lexical category, used for accessor checks and the token dump.
    pub fn class(&self) -> TokenClass {
        match self {
            Self::Keyword(_) => TokenClass::Keyword,
            Self::Symbol(_) => TokenClass::Symbol,
            Self::Integer => TokenClass::IntegerConstant,
            Self::String => TokenClass::StringConstant,
            Self::Ident => TokenClass::Identifier,
            Self::EOF => TokenClass::EndOfFile,
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Keyword(keyword) => write!(f, "'{keyword}'"),
            Self::Symbol(symbol) => write!(f, "'{symbol}'"),
            Self::Integer => write!(f, "integer constant"),
            Self::String => write!(f, "string constant"),
            Self::Ident => write!(f, "identifier"),
            Self::EOF => write!(f, "end-of-file"),
        }
    }
}

/// The five lexical categories, plus end-of-file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenClass {
    Keyword,
    Symbol,
    IntegerConstant,
    StringConstant,
    Identifier,
    EndOfFile,
}

impl fmt::Display for TokenClass {
    #[rustfmt::skip]
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Keyword         => write!(f, "keyword"),
            Self::Symbol          => write!(f, "symbol"),
            Self::IntegerConstant => write!(f, "integerConstant"),
            Self::StringConstant  => write!(f, "stringConstant"),
            Self::Identifier      => write!(f, "identifier"),
            Self::EndOfFile       => write!(f, "eof"),
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Span {
    pub index: u32,
    pub size: u32,
}

impl Span {
    pub fn new(index: u32, size: u32) -> Self {
        Self { index, size }
    }

    #[inline]
    pub fn fragment<'a>(&self, text: &'a str) -> &'a str {
        &text[(self.index as usize)..(self.index as usize + self.size as usize)]
    }

    /// Ending index of the span, exclusive.
    #[inline]
    pub fn end(&self) -> u32 {
        self.index + self.size
    }

    /// One-based line and column of the span's first character.
    ///
    /// Columns count characters, not bytes.
    pub fn location(&self, text: &str) -> (usize, usize) {
        let head = &text[..(self.index as usize).min(text.len())];
        let line = head.matches('\n').count() + 1;
        let column = match head.rfind('\n') {
            Some(newline) => head[newline + 1..].chars().count() + 1,
            None => head.chars().count() + 1,
        };
        (line, column)
    }

    pub fn surrounding_line<'a>(&self, text: &'a str) -> (&'a str, Span) {
        const NEWLINE: char = '\n';
        const RETURN: char = '\r';

        let mut chars = text.char_indices().peekable();
        let mut start = 0;
        let mut end = text.len();

        while let Some((i, c)) = chars.next() {
            if i < self.index as usize {
                if c == NEWLINE {
                    // Span not found yet, move the starting cursor to the next line.

                    if chars.peek().map(|(_, c)| *c) == Some(RETURN) {
                        chars.next();
                    }

                    // Line starts at the character after the newline (\n) and carriage return (\r).
                    // A span at the very end of text ending in a newline is on an empty last line.
                    start = chars.peek().map(|(i, _)| *i).unwrap_or(text.len());
                }
            } else if c == NEWLINE {
                // End the line when we encounter a newline after the start of the token.
                // Newline tokens (and on Windows the carriage return character)
                // will now be included in the line span.
                end = i + 1;

                if chars.peek().map(|(_, c)| *c) == Some(RETURN) {
                    chars.next();
                    end += 1;
                }

                break;
            }
        }

        let line_span = Span {
            index: start as u32,
            size: end as u32 - start as u32,
        };

        (&text[start..end], line_span)
    }
}

/// Reserved keywords.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
#[rustfmt::skip]
pub enum Keyword {
    // ------------------------------------------------------------------------
    // Declarations
    Class,
    Constructor,
    Function,
    Method,
    Field,
    Static,
    Var,

    // ------------------------------------------------------------------------
    // Types
    Int,
    Char,
    Boolean,
    Void,

    // ------------------------------------------------------------------------
    // Constants
    True,
    False,
    Null,
    This,

    // ------------------------------------------------------------------------
    // Statements
    Let,
    Do,
    If,
    Else,
    While,
    Return,
}

impl Keyword {
    #[rustfmt::skip]
    pub fn parse(text: impl AsRef<str>) -> Option<Self> {
        match text.as_ref() {
            "class"       => Some(Self::Class),
            "constructor" => Some(Self::Constructor),
            "function"    => Some(Self::Function),
            "method"      => Some(Self::Method),
            "field"       => Some(Self::Field),
            "static"      => Some(Self::Static),
            "var"         => Some(Self::Var),
            // ----------------------------------------------------------------
            "int"         => Some(Self::Int),
            "char"        => Some(Self::Char),
            "boolean"     => Some(Self::Boolean),
            "void"        => Some(Self::Void),
            // ----------------------------------------------------------------
            "true"        => Some(Self::True),
            "false"       => Some(Self::False),
            "null"        => Some(Self::Null),
            "this"        => Some(Self::This),
            // ----------------------------------------------------------------
            "let"         => Some(Self::Let),
            "do"          => Some(Self::Do),
            "if"          => Some(Self::If),
            "else"        => Some(Self::Else),
            "while"       => Some(Self::While),
            "return"      => Some(Self::Return),
            // ----------------------------------------------------------------
            _ => None,
        }
    }

    #[rustfmt::skip]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Class       => "class",
            Self::Constructor => "constructor",
            Self::Function    => "function",
            Self::Method      => "method",
            Self::Field       => "field",
            Self::Static      => "static",
            Self::Var         => "var",
            Self::Int         => "int",
            Self::Char        => "char",
            Self::Boolean     => "boolean",
            Self::Void        => "void",
            Self::True        => "true",
            Self::False       => "false",
            Self::Null        => "null",
            Self::This        => "this",
            Self::Let         => "let",
            Self::Do          => "do",
            Self::If          => "if",
            Self::Else        => "else",
            Self::While       => "while",
            Self::Return      => "return",
        }
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Punctuation and operator characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
#[rustfmt::skip]
pub enum Symbol {
    LeftBrace,    // {
    RightBrace,   // }
    LeftParen,    // (
    RightParen,   // )
    LeftBracket,  // [
    RightBracket, // ]
    Dot,          // .
    Comma,        // ,
    Semicolon,    // ;
    Plus,         // +
    Minus,        // -
    Star,         // *
    Slash,        // /
    Amp,          // &
    Pipe,         // |
    Less,         // <
    Greater,      // >
    Eq,           // =
    Tilde,        // ~
}

impl Symbol {
    #[rustfmt::skip]
    pub fn parse(c: char) -> Option<Self> {
        match c {
            '{' => Some(Self::LeftBrace),
            '}' => Some(Self::RightBrace),
            '(' => Some(Self::LeftParen),
            ')' => Some(Self::RightParen),
            '[' => Some(Self::LeftBracket),
            ']' => Some(Self::RightBracket),
            '.' => Some(Self::Dot),
            ',' => Some(Self::Comma),
            ';' => Some(Self::Semicolon),
            '+' => Some(Self::Plus),
            '-' => Some(Self::Minus),
            '*' => Some(Self::Star),
            '/' => Some(Self::Slash),
            '&' => Some(Self::Amp),
            '|' => Some(Self::Pipe),
            '<' => Some(Self::Less),
            '>' => Some(Self::Greater),
            '=' => Some(Self::Eq),
            '~' => Some(Self::Tilde),
            _ => None,
        }
    }

    #[rustfmt::skip]
    pub fn as_char(&self) -> char {
        match self {
            Self::LeftBrace    => '{',
            Self::RightBrace   => '}',
            Self::LeftParen    => '(',
            Self::RightParen   => ')',
            Self::LeftBracket  => '[',
            Self::RightBracket => ']',
            Self::Dot          => '.',
            Self::Comma        => ',',
            Self::Semicolon    => ';',
            Self::Plus         => '+',
            Self::Minus        => '-',
            Self::Star         => '*',
            Self::Slash        => '/',
            Self::Amp          => '&',
            Self::Pipe         => '|',
            Self::Less         => '<',
            Self::Greater      => '>',
            Self::Eq           => '=',
            Self::Tilde        => '~',
        }
    }

    /// Binary operators that may appear between two terms.
    pub fn is_binary_op(&self) -> bool {
        matches!(
            self,
            Self::Plus
                | Self::Minus
                | Self::Star
                | Self::Slash
                | Self::Amp
                | Self::Pipe
                | Self::Less
                | Self::Greater
                | Self::Eq
        )
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_span_fragment() {
        const CODE: &str = "let x = 42;";

        let spans = &[
            Span::new(0, 3), // let
            Span::new(4, 1), // x
            Span::new(6, 1), // =
            Span::new(8, 2), // 42
        ];

        assert_eq!(spans[0].fragment(CODE), "let");
        assert_eq!(spans[1].fragment(CODE), "x");
        assert_eq!(spans[2].fragment(CODE), "=");
        assert_eq!(spans[3].fragment(CODE), "42");
    }

    #[test]
    #[rustfmt::skip]
    fn test_span_surrounding_line() {
        const CODE: &str = "------------\n....here....\n------------";

        let span = Span::new(17, 4);
        assert_eq!(span.fragment(CODE), "here");

        let (line, line_span) = span.surrounding_line(CODE);
        assert_eq!(line, "....here....\n");
        assert_eq!(line_span, Span { index: 13, size: 13 });
    }

    #[test]
    #[rustfmt::skip]
    fn test_span_surrounding_full_text() {
        const CODE: &str = "....here....";

        let span = Span::new(4, 4);
        assert_eq!(span.fragment(CODE), "here");

        let (line, line_span) = span.surrounding_line(CODE);
        assert_eq!(line, "....here....");
        assert_eq!(line_span, Span { index: 0, size: 12 });
    }

    #[test]
    fn test_span_surrounding_line_at_end() {
        const CODE: &str = "class Main {\n  field int x;\n";

        // end-of-file sits on the empty line after the trailing newline
        let span = Span::new(CODE.len() as u32, 0);
        let (line, line_span) = span.surrounding_line(CODE);
        assert_eq!(line, "");
        assert_eq!(line_span, Span::new(CODE.len() as u32, 0));
        assert_eq!(span.location(CODE), (3, 1));
    }

    #[test]
    fn test_span_location() {
        const CODE: &str = "class Main {\n  field int x;\n}";

        assert_eq!(Span::new(0, 5).location(CODE), (1, 1));
        assert_eq!(Span::new(6, 4).location(CODE), (1, 7));
        // `int` on the second line
        assert_eq!(Span::new(21, 3).location(CODE), (2, 9));
    }

    #[test]
    fn test_keyword_roundtrip_names() {
        for name in ["class", "method", "boolean", "null", "while", "return"] {
            let keyword = Keyword::parse(name).unwrap();
            assert_eq!(keyword.as_str(), name);
        }
        assert_eq!(Keyword::parse("Class"), None);
        assert_eq!(Keyword::parse("classy"), None);
    }

    #[test]
    fn test_binary_operators() {
        let ops: Vec<char> = "{}()[].,;+-*/&|<>=~"
            .chars()
            .filter(|c| Symbol::parse(*c).unwrap().is_binary_op())
            .collect();
        assert_eq!(ops, vec!['+', '-', '*', '/', '&', '|', '<', '>', '=']);
    }
}
