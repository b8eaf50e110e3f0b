//! Token dump in the analyzer's XML format.
use crate::error::JackResult;

use super::{lexer::Lexer, token_stream::TokenStream, tokens::TokenClass};

/// Render every token of the source as one element of a `<tokens>` document.
///
/// ```
/// let xml = jack::compiler::tokens_xml("let x = \"a<b\";").unwrap();
/// assert!(xml.contains("<stringConstant> a&lt;b </stringConstant>"));
/// ```
pub fn tokens_xml(source: &str) -> JackResult<String> {
    let mut tokens = TokenStream::new(Lexer::new(source));
    let mut xml = String::from("<tokens>\n");

    while tokens.has_next()? {
        let token = tokens.advance()?;
        let class = token.kind.class();

        let text = match class {
            TokenClass::Keyword => tokens.keyword()?.as_str().to_owned(),
            TokenClass::Symbol => tokens.symbol()?.as_char().to_string(),
            TokenClass::IntegerConstant => tokens.int_val()?.to_string(),
            TokenClass::StringConstant => tokens.string_val()?.to_owned(),
            TokenClass::Identifier => tokens.identifier()?.to_owned(),
            TokenClass::EndOfFile => break,
        };

        xml.push_str(&format!("<{class}> {} </{class}>\n", escape(&text)));
    }

    xml.push_str("</tokens>\n");
    Ok(xml)
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
