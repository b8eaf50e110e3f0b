//! Result and errors.
use std::{
    fmt::{self, Display, Formatter},
    io,
    path::PathBuf,
    string::FromUtf8Error,
};

use smol_str::SmolStr;

use crate::compiler::{Span, TokenClass};

pub type JackResult<T> = std::result::Result<T, JackError>;

#[derive(Debug)]
pub enum JackError {
    /// Source text matches no lexical category.
    Lex(LexError),
    /// Token does not fit the grammar at this point.
    Syntax(SyntaxError),
    /// Identifier used as a value has no entry in either scope.
    UndefinedSymbol {
        name: SmolStr,
        location: Option<Location>,
    },
    /// Name redefined in the scope it already lives in.
    DuplicateDefinition {
        name: SmolStr,
        location: Option<Location>,
    },
    /// Typed token accessor called on a token of another category.
    InvalidAccess {
        expected: TokenClass,
        encountered: TokenClass,
    },
    /// Directory contains no source files.
    NoSources(PathBuf),
    /// Path is not a source file.
    InvalidSource(PathBuf),
    Io(io::Error),
    Utf8(FromUtf8Error),
}

impl JackError {
    /// Attach a source location to a symbol error raised without one.
    pub fn at(self, location: Location) -> Self {
        match self {
            Self::UndefinedSymbol {
                name,
                location: None,
            } => Self::UndefinedSymbol {
                name,
                location: Some(location),
            },
            Self::DuplicateDefinition {
                name,
                location: None,
            } => Self::DuplicateDefinition {
                name,
                location: Some(location),
            },
            err => err,
        }
    }

    /// Source location of the error, if it has one.
    pub fn location(&self) -> Option<&Location> {
        match self {
            Self::Lex(err) => Some(&err.location),
            Self::Syntax(err) => Some(&err.location),
            Self::UndefinedSymbol { location, .. } | Self::DuplicateDefinition { location, .. } => {
                location.as_ref()
            }
            _ => None,
        }
    }
}

impl Display for JackError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lex(err) => write!(f, "{err}"),
            Self::Syntax(err) => write!(f, "{err}"),
            Self::UndefinedSymbol { name, location } => {
                write_located(f, location.as_ref(), format_args!("undefined symbol '{name}'"))
            }
            Self::DuplicateDefinition { name, location } => write_located(
                f,
                location.as_ref(),
                format_args!("symbol '{name}' is already defined in this scope"),
            ),
            Self::InvalidAccess {
                expected,
                encountered,
            } => write!(f, "cannot read {encountered} token as {expected}"),
            Self::NoSources(path) => write!(f, "no source files found in {}", path.display()),
            Self::InvalidSource(path) => write!(f, "not a source file: {}", path.display()),
            Self::Io(err) => write!(f, "{err}"),
            Self::Utf8(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for JackError {}

impl From<LexError> for JackError {
    fn from(err: LexError) -> Self {
        JackError::Lex(err)
    }
}

impl From<SyntaxError> for JackError {
    fn from(err: SyntaxError) -> Self {
        JackError::Syntax(err)
    }
}

impl From<io::Error> for JackError {
    fn from(err: io::Error) -> Self {
        JackError::Io(err)
    }
}

impl From<FromUtf8Error> for JackError {
    fn from(err: FromUtf8Error) -> Self {
        JackError::Utf8(err)
    }
}

fn write_located(f: &mut Formatter<'_>, location: Option<&Location>, message: fmt::Arguments) -> fmt::Result {
    match location {
        Some(location) => write!(f, "{location}: {message}\n{}", location.snippet()),
        None => write!(f, "{message}"),
    }
}

/// Position of an error in the source, with the line it occurred on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    /// One-based line number.
    pub line: usize,
    /// One-based character column.
    pub column: usize,
    /// Text of the offending line, without the line ending.
    pub text: String,
}

impl Location {
    pub fn new(source: &str, span: Span) -> Self {
        let (line, column) = span.location(source);
        let (text, _) = span.surrounding_line(source);
        Self {
            line,
            column,
            text: text.trim_end_matches(['\n', '\r']).to_owned(),
        }
    }

    /// The source line with a caret under the error column.
    pub fn snippet(&self) -> String {
        let indent: String = self
            .text
            .chars()
            .take(self.column.saturating_sub(1))
            .map(|c| if c == '\t' { '\t' } else { ' ' })
            .collect();
        format!("    {}\n    {indent}^", self.text)
    }
}

impl Display for Location {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexError {
    pub kind: LexErrorKind,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LexErrorKind {
    UnknownCharacter(char),
    UnterminatedString,
    UnterminatedComment,
    /// Integer literal outside `0..=MAX_INT`.
    IntegerOverflow(String),
    /// Token requested after the end of the source.
    NoMoreTokens,
}

impl LexError {
    pub fn new(source: &str, span: Span, kind: LexErrorKind) -> Self {
        Self {
            kind,
            location: Location::new(source, span),
        }
    }
}

impl Display for LexError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        use LexErrorKind as K;
        let message = match &self.kind {
            K::UnknownCharacter(c) => format!("unknown character {c:?}"),
            K::UnterminatedString => "unterminated string constant".to_owned(),
            K::UnterminatedComment => "unterminated block comment".to_owned(),
            K::IntegerOverflow(text) => format!(
                "integer constant {text} exceeds maximum {}",
                crate::constants::MAX_INT
            ),
            K::NoMoreTokens => "no tokens remaining".to_owned(),
        };
        write!(f, "{}: lexical error: {message}\n{}", self.location, self.location.snippet())
    }
}

impl std::error::Error for LexError {}

/// Error returned when a token doesn't match any grammar alternative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    /// Construct the parser was looking for.
    pub expected: String,
    /// Description of the token that was encountered instead.
    pub encountered: String,
    pub location: Location,
}

impl Display for SyntaxError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: syntax error: expected {}, found {}\n{}",
            self.location,
            self.expected,
            self.encountered,
            self.location.snippet()
        )
    }
}

impl std::error::Error for SyntaxError {}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_location_snippet() {
        const CODE: &str = "class Main {\n    let x = 1 y\n}";
        let location = Location::new(CODE, Span::new(27, 1));

        assert_eq!(location.line, 2);
        assert_eq!(location.column, 15);
        assert_eq!(location.text, "    let x = 1 y");
        assert_eq!(location.snippet(), "        let x = 1 y\n                  ^");
    }

    #[test]
    fn test_location_at_end_of_file() {
        const CODE: &str = "class Main {\n    function void f() {\n";
        let location = Location::new(CODE, Span::new(CODE.len() as u32, 0));

        assert_eq!(location.line, 3);
        assert_eq!(location.column, 1);
        assert_eq!(location.text, "");
        assert_eq!(location.snippet(), "    \n    ^");
    }

    #[test]
    fn test_symbol_error_location_attached_once() {
        const CODE: &str = "a\nb";
        let first = Location::new(CODE, Span::new(0, 1));
        let second = Location::new(CODE, Span::new(2, 1));

        let err = JackError::UndefinedSymbol {
            name: "a".into(),
            location: None,
        }
        .at(first.clone())
        .at(second);

        assert_eq!(err.location(), Some(&first));
    }
}
