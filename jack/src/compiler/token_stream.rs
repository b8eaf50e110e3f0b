//! Token stream with one token of look ahead.
use smol_str::SmolStr;

use crate::error::{JackError, JackResult, LexError, LexErrorKind, Location, SyntaxError};

use super::{
    lexer::Lexer,
    tokens::{Keyword, Span, Symbol, Token, TokenClass, TokenKind},
};

/// Buffered stream of tokens that allows one token of look ahead.
///
/// Tokens are lazily lexed. Peeking or consuming the next token
/// triggers the internal lexer. The lookahead is an explicit
/// single slot, filled by [`TokenStream::peek`] and drained by
/// [`TokenStream::advance`].
///
/// Past the last token the stream yields an [`TokenKind::EOF`]
/// sentinel when peeked.
pub struct TokenStream<'a> {
    lexer: Lexer<'a>,
    /// Keep reference to the source so the parser can
    /// slice fragments from it.
    original: &'a str,
    /// Most recently consumed token.
    current: Option<Token>,
    /// Lexed but not yet consumed token.
    peeked: Option<Token>,
}

impl<'a> TokenStream<'a> {
    pub fn new(lexer: Lexer<'a>) -> Self {
        Self {
            original: lexer.source_code(),
            lexer,
            current: None,
            peeked: None,
        }
    }

    /// Text of the given token.
    ///
    /// String literals are returned without their surrounding quotes.
    pub fn lexeme(&self, token: &Token) -> &'a str {
        let fragment = token.span.fragment(self.original);
        match token.kind {
            TokenKind::String => fragment
                .strip_prefix('"')
                .and_then(|s| s.strip_suffix('"'))
                .unwrap_or(fragment),
            _ => fragment,
        }
    }

    /// Source location of a span, for building errors.
    pub fn location(&self, span: Span) -> Location {
        Location::new(self.original, span)
    }

    /// Indicates whether there are tokens left before end-of-file.
    pub fn has_next(&mut self) -> JackResult<bool> {
        Ok(!self.peek()?.is_eof())
    }

    /// Consumes the next token regardless of kind, making it the current token.
    ///
    /// # Errors
    ///
    /// Returns a lexical error when the source is exhausted.
    pub fn advance(&mut self) -> JackResult<Token> {
        let token = self.peek()?;
        if token.is_eof() {
            return Err(LexError::new(self.original, token.span, LexErrorKind::NoMoreTokens).into());
        }

        self.peeked = None;
        self.current = Some(token);
        Ok(token)
    }

    /// Most recently consumed token.
    ///
    /// Returns `None` before the first call to [`TokenStream::advance`].
    #[inline]
    pub fn current(&self) -> Option<&Token> {
        self.current.as_ref()
    }

    /// Return the next token without advancing the cursor.
    pub fn peek(&mut self) -> JackResult<Token> {
        match self.peeked {
            Some(token) => Ok(token),
            None => {
                let token = self.lexer.next_token()?;
                self.peeked = Some(token);
                Ok(token)
            }
        }
    }

    /// Return the next token kind without advancing the cursor.
    #[inline]
    pub fn peek_kind(&mut self) -> JackResult<TokenKind> {
        self.peek().map(|token| token.kind)
    }

    /// Consumes the next token if it matches the given token kind.
    ///
    /// Returns true when matched. Does not consume the token if the
    /// kinds do not match.
    pub fn match_token(&mut self, token_kind: TokenKind) -> JackResult<bool> {
        if self.peek_kind()? == token_kind {
            self.advance()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Return the next token and advance the cursor.
    ///
    /// The consumed token must match the given token kind, otherwise
    /// a syntax error is returned. The cursor is not advanced if
    /// the token kind does not match.
    pub fn consume(&mut self, token_kind: TokenKind) -> JackResult<Token> {
        let token = self.peek()?;
        if token.kind != token_kind {
            return Err(self.unexpected(&token, token_kind));
        }
        self.advance()
    }

    /// Consume the given symbol.
    #[inline]
    pub fn consume_symbol(&mut self, symbol: Symbol) -> JackResult<Token> {
        self.consume(TokenKind::Symbol(symbol))
    }

    /// Consume the given keyword.
    #[inline]
    pub fn consume_keyword(&mut self, keyword: Keyword) -> JackResult<Token> {
        self.consume(TokenKind::Keyword(keyword))
    }

    /// Consume an identifier, described as `what` in the error if missing.
    pub fn consume_ident(&mut self, what: &str) -> JackResult<(SmolStr, Span)> {
        let token = self.peek()?;
        if token.kind != TokenKind::Ident {
            return Err(self.unexpected(&token, what));
        }
        self.advance()?;
        Ok((SmolStr::from(self.identifier()?), token.span))
    }

    /// Build a syntax error for a token that doesn't fit the grammar.
    #[inline(never)]
    #[cold]
    pub fn unexpected(&self, token: &Token, expected: impl ToString) -> JackError {
        let encountered = match token.kind {
            TokenKind::EOF => "end-of-file".to_owned(),
            TokenKind::String => format!("string constant {}", token.span.fragment(self.original)),
            _ => format!("'{}'", token.span.fragment(self.original)),
        };

        SyntaxError {
            expected: expected.to_string(),
            encountered,
            location: self.location(token.span),
        }
        .into()
    }
}

/// Typed accessors of the current token.
///
/// Each fails with [`JackError::InvalidAccess`] when the current
/// token is of another lexical category.
impl<'a> TokenStream<'a> {
    fn current_as(&self, expected: TokenClass) -> JackResult<Token> {
        let encountered = self
            .current
            .map(|token| token.kind.class())
            .unwrap_or(TokenClass::EndOfFile);

        match self.current {
            Some(token) if encountered == expected => Ok(token),
            _ => Err(JackError::InvalidAccess {
                expected,
                encountered,
            }),
        }
    }

    pub fn keyword(&self) -> JackResult<Keyword> {
        match self.current_as(TokenClass::Keyword)?.kind {
            TokenKind::Keyword(keyword) => Ok(keyword),
            _ => unreachable!("token class checked"),
        }
    }

    pub fn symbol(&self) -> JackResult<Symbol> {
        match self.current_as(TokenClass::Symbol)?.kind {
            TokenKind::Symbol(symbol) => Ok(symbol),
            _ => unreachable!("token class checked"),
        }
    }

    pub fn identifier(&self) -> JackResult<&'a str> {
        let token = self.current_as(TokenClass::Identifier)?;
        Ok(self.lexeme(&token))
    }

    /// Value of the current integer constant.
    ///
    /// The lexer has already bounds checked the literal.
    pub fn int_val(&self) -> JackResult<u16> {
        let token = self.current_as(TokenClass::IntegerConstant)?;
        let text = self.lexeme(&token);
        text.parse::<u16>().map_err(|_| {
            LexError::new(
                self.original,
                token.span,
                LexErrorKind::IntegerOverflow(text.to_owned()),
            )
            .into()
        })
    }

    /// Contents of the current string constant, without quotes.
    pub fn string_val(&self) -> JackResult<&'a str> {
        let token = self.current_as(TokenClass::StringConstant)?;
        Ok(self.lexeme(&token))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn stream(source: &str) -> TokenStream {
        TokenStream::new(Lexer::new(source))
    }

    #[test]
    fn test_advance_and_peek() {
        let mut tokens = stream("let x;");

        assert!(tokens.current().is_none());
        assert!(tokens.has_next().unwrap());
        assert_eq!(tokens.peek_kind().unwrap(), TokenKind::Keyword(Keyword::Let));
        // peek does not consume
        assert_eq!(tokens.peek_kind().unwrap(), TokenKind::Keyword(Keyword::Let));

        tokens.advance().unwrap();
        assert_eq!(tokens.keyword().unwrap(), Keyword::Let);
        assert_eq!(tokens.peek_kind().unwrap(), TokenKind::Ident);

        tokens.advance().unwrap();
        assert_eq!(tokens.identifier().unwrap(), "x");

        tokens.advance().unwrap();
        assert_eq!(tokens.symbol().unwrap(), Symbol::Semicolon);

        assert!(!tokens.has_next().unwrap());
        assert_eq!(tokens.peek_kind().unwrap(), TokenKind::EOF);
    }

    #[test]
    fn test_advance_past_end() {
        let mut tokens = stream("x");
        tokens.advance().unwrap();

        match tokens.advance() {
            Err(JackError::Lex(err)) => assert_eq!(err.kind, LexErrorKind::NoMoreTokens),
            other => panic!("expected lex error, got {other:?}"),
        }
        // current token is untouched
        assert_eq!(tokens.identifier().unwrap(), "x");
    }

    #[test]
    fn test_typed_accessors() {
        let mut tokens = stream("42 \"hi there\" class");

        tokens.advance().unwrap();
        assert_eq!(tokens.int_val().unwrap(), 42);
        assert!(matches!(
            tokens.string_val(),
            Err(JackError::InvalidAccess {
                expected: TokenClass::StringConstant,
                encountered: TokenClass::IntegerConstant,
            })
        ));

        tokens.advance().unwrap();
        assert_eq!(tokens.string_val().unwrap(), "hi there");

        tokens.advance().unwrap();
        assert!(matches!(
            tokens.identifier(),
            Err(JackError::InvalidAccess {
                expected: TokenClass::Identifier,
                encountered: TokenClass::Keyword,
            })
        ));
    }

    #[test]
    fn test_accessor_before_advance() {
        let tokens = stream("x");
        assert!(matches!(
            tokens.symbol(),
            Err(JackError::InvalidAccess {
                encountered: TokenClass::EndOfFile,
                ..
            })
        ));
    }

    #[test]
    fn test_consume_mismatch() {
        let mut tokens = stream("let x");

        assert!(tokens.consume_symbol(Symbol::Semicolon).is_err());
        // not consumed
        assert!(tokens.match_token(TokenKind::Keyword(Keyword::Let)).unwrap());

        let (name, span) = tokens.consume_ident("variable name").unwrap();
        assert_eq!(name, "x");
        assert_eq!(span, Span::new(4, 1));

        match tokens.consume_symbol(Symbol::Semicolon) {
            Err(JackError::Syntax(err)) => {
                assert_eq!(err.expected, "';'");
                assert_eq!(err.encountered, "end-of-file");
            }
            other => panic!("expected syntax error, got {other:?}"),
        }
    }
}
