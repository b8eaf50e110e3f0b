//! Compiler
mod cursor;
mod engine;
mod lexer;
mod symbol;
mod token_stream;
mod tokens;
mod vm;
mod xml;

use crate::error::JackResult;

/// Compile the source of one class to VM code.
pub fn compile(source_code: impl AsRef<str>) -> JackResult<CompiledClass> {
    let lexer = Lexer::new(source_code.as_ref());
    let engine = CompilationEngine::new(TokenStream::new(lexer));
    engine.compile()
}

pub use self::{
    engine::{CompilationEngine, CompiledClass, SubroutineKind},
    lexer::{Lexer, LexerIter},
    symbol::{Symbol as SymbolEntry, SymbolKind, SymbolTable},
    token_stream::TokenStream,
    tokens::{Keyword, Span, Symbol, Token, TokenClass, TokenKind},
    vm::{ArithmeticCommand, Segment, VmCommand, VmWriter},
    xml::tokens_xml,
};
