//! Single pass compilation engine.
//!
//! Recursive descent parser that resolves symbols and emits VM code
//! while it recognises the grammar. No syntax tree is built; every
//! nonterminal is one method, and the emitted code follows the order
//! in which the method finishes recognising its parts.
use std::fmt;

use smol_str::SmolStr;

use crate::{
    constants::*,
    error::{JackError, JackResult},
};

use super::{
    symbol::{SymbolKind, SymbolTable},
    token_stream::TokenStream,
    tokens::{Keyword, Span, Symbol, Token, TokenKind},
    vm::{ArithmeticCommand, Segment, VmWriter},
};

/// Output of compiling one class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledClass {
    /// Name declared in the class header.
    pub name: SmolStr,
    /// VM code text, one command per line.
    pub code: String,
}

/// Class being compiled.
#[derive(Debug)]
struct ClassContext {
    name: SmolStr,
    /// Number of field variables, which is the size of an instance.
    field_count: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubroutineKind {
    Constructor,
    Function,
    Method,
}

impl fmt::Display for SubroutineKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Constructor => write!(f, "constructor"),
            Self::Function => write!(f, "function"),
            Self::Method => write!(f, "method"),
        }
    }
}

/// Subroutine being compiled.
///
/// Lives for the duration of one subroutine declaration and is passed
/// down to every statement and expression inside its body.
#[derive(Debug)]
struct SubroutineContext<'c> {
    class: &'c ClassContext,
    kind: SubroutineKind,
    name: SmolStr,
    return_type: SmolStr,
    /// Next free suffix for `if` labels.
    if_count: u16,
    /// Next free suffix for `while` labels.
    while_count: u16,
}

impl<'c> SubroutineContext<'c> {
    /// Fully qualified `Class.subroutine` name.
    fn qualified_name(&self) -> String {
        format!("{}.{}", self.class.name, self.name)
    }

    fn next_if(&mut self) -> u16 {
        let n = self.if_count;
        self.if_count += 1;
        n
    }

    fn next_while(&mut self) -> u16 {
        let n = self.while_count;
        self.while_count += 1;
        n
    }
}

pub struct CompilationEngine<'a> {
    tokens: TokenStream<'a>,
    symbols: SymbolTable,
    writer: VmWriter,
}

impl<'a> CompilationEngine<'a> {
    pub fn new(tokens: TokenStream<'a>) -> Self {
        Self {
            tokens,
            symbols: SymbolTable::new(),
            writer: VmWriter::new(),
        }
    }

    /// Compile the class in the token stream.
    ///
    /// The source must contain exactly one class. On any error the
    /// partially emitted code is dropped.
    pub fn compile(mut self) -> JackResult<CompiledClass> {
        let name = self.compile_class()?;

        let token = self.tokens.peek()?;
        if !token.is_eof() {
            return Err(self.tokens.unexpected(&token, "end-of-file after class"));
        }

        Ok(CompiledClass {
            name,
            code: self.writer.close(),
        })
    }
}

/// Program structure
impl<'a> CompilationEngine<'a> {
    /// ```text
    /// 'class' className '{' classVarDec* subroutineDec* '}'
    /// ```
    fn compile_class(&mut self) -> JackResult<SmolStr> {
        use Keyword as K;
        use TokenKind as TK;

        self.tokens.consume_keyword(K::Class)?;
        let (name, _) = self.tokens.consume_ident("class name")?;
        self.tokens.consume_symbol(Symbol::LeftBrace)?;

        let mut class = ClassContext { name, field_count: 0 };

        while let TK::Keyword(K::Static | K::Field) = self.tokens.peek_kind()? {
            self.compile_class_var_dec(&mut class)?;
        }

        // The grammar puts every variable declaration before the first
        // subroutine, so the instance size is final from here on.
        debug_assert_eq!(class.field_count, self.symbols.var_count(SymbolKind::Field));

        loop {
            let token = self.tokens.peek()?;
            match token.kind {
                TK::Keyword(K::Constructor | K::Function | K::Method) => {
                    self.compile_subroutine(&class)?;
                }
                TK::Symbol(Symbol::RightBrace) => {
                    self.tokens.advance()?;
                    break;
                }
                _ => {
                    return Err(self
                        .tokens
                        .unexpected(&token, "'constructor', 'function', 'method' or '}'"))
                }
            }
        }

        log::debug!("compiled class {} ({} fields)", class.name, class.field_count);

        Ok(class.name)
    }

    /// ```text
    /// ('static' | 'field') type varName (',' varName)* ';'
    /// ```
    fn compile_class_var_dec(&mut self, class: &mut ClassContext) -> JackResult<()> {
        self.tokens.advance()?;
        let kind = match self.tokens.keyword()? {
            Keyword::Static => SymbolKind::Static,
            _ => SymbolKind::Field,
        };

        let ty = self.compile_type(false)?;

        loop {
            self.define_variable(&ty, kind, "variable name")?;
            if kind == SymbolKind::Field {
                class.field_count += 1;
            }

            if !self.tokens.match_token(TokenKind::Symbol(Symbol::Comma))? {
                break;
            }
        }

        self.tokens.consume_symbol(Symbol::Semicolon)?;

        Ok(())
    }

    /// ```text
    /// 'int' | 'char' | 'boolean' | className
    /// ```
    ///
    /// Return types additionally allow `'void'`.
    fn compile_type(&mut self, allow_void: bool) -> JackResult<SmolStr> {
        use Keyword as K;

        let token = self.tokens.peek()?;
        match token.kind {
            TokenKind::Keyword(K::Int | K::Char | K::Boolean) => {
                self.tokens.advance()?;
                Ok(SmolStr::from(self.tokens.keyword()?.as_str()))
            }
            TokenKind::Keyword(K::Void) if allow_void => {
                self.tokens.advance()?;
                Ok(SmolStr::from(K::Void.as_str()))
            }
            TokenKind::Ident => self.tokens.consume_ident("type").map(|(name, _)| name),
            _ if allow_void => Err(self.tokens.unexpected(&token, "'void' or a type")),
            _ => Err(self.tokens.unexpected(&token, "a type")),
        }
    }

    /// Consume a variable name and define it in the symbol table.
    fn define_variable(&mut self, ty: &SmolStr, kind: SymbolKind, what: &str) -> JackResult<u16> {
        let (name, span) = self.tokens.consume_ident(what)?;
        self.symbols
            .define(name, ty.clone(), kind)
            .map_err(|err| err.at(self.tokens.location(span)))
    }

    /// ```text
    /// ('constructor' | 'function' | 'method') ('void' | type) subroutineName
    ///     '(' parameterList ')' subroutineBody
    /// ```
    fn compile_subroutine(&mut self, class: &ClassContext) -> JackResult<()> {
        self.tokens.advance()?;
        let kind = match self.tokens.keyword()? {
            Keyword::Constructor => SubroutineKind::Constructor,
            Keyword::Method => SubroutineKind::Method,
            _ => SubroutineKind::Function,
        };

        let return_type = self.compile_type(true)?;
        let (name, _) = self.tokens.consume_ident("subroutine name")?;

        self.symbols.start_subroutine();

        // The receiver is passed as a hidden first argument, so declared
        // parameters of a method are numbered from 1.
        if kind == SubroutineKind::Method {
            self.symbols.define("this", class.name.clone(), SymbolKind::Argument)?;
        }

        self.tokens.consume_symbol(Symbol::LeftParen)?;
        self.compile_parameter_list()?;
        self.tokens.consume_symbol(Symbol::RightParen)?;

        let mut sub = SubroutineContext {
            class,
            kind,
            name,
            return_type,
            if_count: 0,
            while_count: 0,
        };

        self.compile_subroutine_body(&mut sub)
    }

    /// ```text
    /// ((type varName) (',' type varName)*)?
    /// ```
    fn compile_parameter_list(&mut self) -> JackResult<u16> {
        let mut count = 0;

        if self.tokens.peek_kind()? == TokenKind::Symbol(Symbol::RightParen) {
            return Ok(count);
        }

        loop {
            let ty = self.compile_type(false)?;
            self.define_variable(&ty, SymbolKind::Argument, "parameter name")?;
            count += 1;

            if !self.tokens.match_token(TokenKind::Symbol(Symbol::Comma))? {
                break;
            }
        }

        Ok(count)
    }

    /// ```text
    /// '{' varDec* statements '}'
    /// ```
    fn compile_subroutine_body(&mut self, sub: &mut SubroutineContext) -> JackResult<()> {
        self.tokens.consume_symbol(Symbol::LeftBrace)?;

        while self.tokens.peek_kind()? == TokenKind::Keyword(Keyword::Var) {
            self.compile_var_dec()?;
        }

        // Local count is only known once every declaration is parsed.
        let n_locals = self.symbols.var_count(SymbolKind::Local);
        self.writer.write_function(sub.qualified_name(), n_locals);

        match sub.kind {
            SubroutineKind::Constructor => {
                // Allocate the instance and anchor `this` to it.
                self.writer.write_push(Segment::Constant, sub.class.field_count);
                self.writer.write_call(MEMORY_ALLOC, 1);
                self.writer.write_pop(Segment::Pointer, 0);
            }
            SubroutineKind::Method => {
                self.writer.write_push(Segment::Argument, 0);
                self.writer.write_pop(Segment::Pointer, 0);
            }
            SubroutineKind::Function => {}
        }

        self.compile_statements(sub)?;
        self.close_block()?;

        log::debug!(
            "compiled {} {} {} ({} arguments, {} locals)",
            sub.kind,
            sub.return_type,
            sub.qualified_name(),
            self.symbols.var_count(SymbolKind::Argument),
            n_locals
        );

        Ok(())
    }

    /// ```text
    /// 'var' type varName (',' varName)* ';'
    /// ```
    fn compile_var_dec(&mut self) -> JackResult<()> {
        self.tokens.consume_keyword(Keyword::Var)?;
        let ty = self.compile_type(false)?;

        loop {
            self.define_variable(&ty, SymbolKind::Local, "variable name")?;
            if !self.tokens.match_token(TokenKind::Symbol(Symbol::Comma))? {
                break;
            }
        }

        self.tokens.consume_symbol(Symbol::Semicolon)?;

        Ok(())
    }

    /// Consume the `}` ending a statement block.
    fn close_block(&mut self) -> JackResult<()> {
        let token = self.tokens.peek()?;
        if token.kind != TokenKind::Symbol(Symbol::RightBrace) {
            return Err(self.tokens.unexpected(&token, "a statement or '}'"));
        }
        self.tokens.advance()?;
        Ok(())
    }
}

/// Statements
impl<'a> CompilationEngine<'a> {
    /// ```text
    /// statement*
    /// ```
    fn compile_statements(&mut self, sub: &mut SubroutineContext) -> JackResult<()> {
        use Keyword as K;

        loop {
            match self.tokens.peek_kind()? {
                TokenKind::Keyword(K::Let) => self.compile_let(sub)?,
                TokenKind::Keyword(K::Do) => self.compile_do(sub)?,
                TokenKind::Keyword(K::If) => self.compile_if(sub)?,
                TokenKind::Keyword(K::While) => self.compile_while(sub)?,
                TokenKind::Keyword(K::Return) => self.compile_return(sub)?,
                _ => return Ok(()),
            }
        }
    }

    /// `'{' statements '}'`
    fn compile_block(&mut self, sub: &mut SubroutineContext) -> JackResult<()> {
        self.tokens.consume_symbol(Symbol::LeftBrace)?;
        self.compile_statements(sub)?;
        self.close_block()
    }

    /// ```text
    /// 'let' varName ('[' expression ']')? '=' expression ';'
    /// ```
    fn compile_let(&mut self, sub: &mut SubroutineContext) -> JackResult<()> {
        self.tokens.consume_keyword(Keyword::Let)?;
        let (name, span) = self.tokens.consume_ident("variable name")?;
        let (segment, index) = self.variable(&name, span)?;

        if self.tokens.match_token(TokenKind::Symbol(Symbol::LeftBracket))? {
            // Target address: base + offset
            self.writer.write_push(segment, index);
            self.compile_expression(sub)?;
            self.tokens.consume_symbol(Symbol::RightBracket)?;
            self.writer.write_arithmetic(ArithmeticCommand::Add);

            self.tokens.consume_symbol(Symbol::Eq)?;
            self.compile_expression(sub)?;

            // The right-hand side may itself have moved `that`, so the
            // address is only loaded into the pointer after it is evaluated.
            self.writer.write_pop(Segment::Temp, 0);
            self.writer.write_pop(Segment::Pointer, 1);
            self.writer.write_push(Segment::Temp, 0);
            self.writer.write_pop(Segment::That, 0);
        } else {
            self.tokens.consume_symbol(Symbol::Eq)?;
            self.compile_expression(sub)?;
            self.writer.write_pop(segment, index);
        }

        self.tokens.consume_symbol(Symbol::Semicolon)?;

        Ok(())
    }

    /// ```text
    /// 'if' '(' expression ')' '{' statements '}' ('else' '{' statements '}')?
    /// ```
    fn compile_if(&mut self, sub: &mut SubroutineContext) -> JackResult<()> {
        self.tokens.consume_keyword(Keyword::If)?;

        let n = sub.next_if();
        let label_true = format!("{LABEL_IF_TRUE}{n}");
        let label_false = format!("{LABEL_IF_FALSE}{n}");

        self.compile_condition(sub)?;
        self.writer.write_if(label_true.as_str());
        self.writer.write_goto(label_false.as_str());
        self.writer.write_label(label_true.as_str());

        self.compile_block(sub)?;

        if self.tokens.match_token(TokenKind::Keyword(Keyword::Else))? {
            let label_end = format!("{LABEL_IF_END}{n}");
            self.writer.write_goto(label_end.as_str());
            self.writer.write_label(label_false.as_str());
            self.compile_block(sub)?;
            self.writer.write_label(label_end.as_str());
        } else {
            self.writer.write_label(label_false.as_str());
        }

        Ok(())
    }

    /// ```text
    /// 'while' '(' expression ')' '{' statements '}'
    /// ```
    fn compile_while(&mut self, sub: &mut SubroutineContext) -> JackResult<()> {
        self.tokens.consume_keyword(Keyword::While)?;

        let n = sub.next_while();
        let label_exp = format!("{LABEL_WHILE_EXP}{n}");
        let label_end = format!("{LABEL_WHILE_END}{n}");

        self.writer.write_label(label_exp.as_str());
        self.compile_condition(sub)?;
        self.writer.write_arithmetic(ArithmeticCommand::Not);
        self.writer.write_if(label_end.as_str());

        self.compile_block(sub)?;

        self.writer.write_goto(label_exp.as_str());
        self.writer.write_label(label_end.as_str());

        Ok(())
    }

    /// `'(' expression ')'`
    fn compile_condition(&mut self, sub: &mut SubroutineContext) -> JackResult<()> {
        self.tokens.consume_symbol(Symbol::LeftParen)?;
        self.compile_expression(sub)?;
        self.tokens.consume_symbol(Symbol::RightParen)?;
        Ok(())
    }

    /// ```text
    /// 'do' subroutineCall ';'
    /// ```
    fn compile_do(&mut self, sub: &mut SubroutineContext) -> JackResult<()> {
        self.tokens.consume_keyword(Keyword::Do)?;
        let (name, span) = self.tokens.consume_ident("subroutine call")?;
        self.compile_subroutine_call(sub, name, span)?;
        self.tokens.consume_symbol(Symbol::Semicolon)?;

        // Discard the return value.
        self.writer.write_pop(Segment::Temp, 0);

        Ok(())
    }

    /// ```text
    /// 'return' expression? ';'
    /// ```
    fn compile_return(&mut self, sub: &mut SubroutineContext) -> JackResult<()> {
        self.tokens.consume_keyword(Keyword::Return)?;

        if self.tokens.peek_kind()? == TokenKind::Symbol(Symbol::Semicolon) {
            // Every call leaves a value on the stack.
            self.writer.write_push(Segment::Constant, 0);
        } else {
            self.compile_expression(sub)?;
        }

        self.tokens.consume_symbol(Symbol::Semicolon)?;
        self.writer.write_return();

        Ok(())
    }
}

/// Expressions
impl<'a> CompilationEngine<'a> {
    /// ```text
    /// term (op term)*
    /// ```
    ///
    /// Binary operators have no precedence over each other. Each one is
    /// held on a pending stack when recognised and the stack is drained
    /// after the last term, so `1 + 2 * 3` emits the multiplication
    /// before the addition. Chains therefore group from the right:
    /// `a - b - c` computes `a - (b - c)`.
    fn compile_expression(&mut self, sub: &mut SubroutineContext) -> JackResult<()> {
        let mut operators: Vec<Symbol> = Vec::new();

        self.compile_term(sub)?;

        loop {
            match self.tokens.peek_kind()? {
                TokenKind::Symbol(symbol) if symbol.is_binary_op() => {
                    self.tokens.advance()?;
                    operators.push(self.tokens.symbol()?);
                }
                _ => break,
            }

            self.compile_term(sub)?;
        }

        while let Some(op) = operators.pop() {
            self.emit_binary_op(op);
        }

        Ok(())
    }

    fn emit_binary_op(&mut self, op: Symbol) {
        use ArithmeticCommand as A;

        let command = match op {
            Symbol::Plus => A::Add,
            Symbol::Minus => A::Sub,
            Symbol::Amp => A::And,
            Symbol::Pipe => A::Or,
            Symbol::Less => A::Lt,
            Symbol::Greater => A::Gt,
            Symbol::Eq => A::Eq,
            // The VM has no multiply or divide instructions.
            Symbol::Star => return self.writer.write_call(MATH_MULTIPLY, 2),
            Symbol::Slash => return self.writer.write_call(MATH_DIVIDE, 2),
            _ => unreachable!("'{op}' is not a binary operator"),
        };

        self.writer.write_arithmetic(command);
    }

    /// ```text
    /// integerConstant | stringConstant | keywordConstant | varName
    ///     | varName '[' expression ']' | subroutineCall
    ///     | '(' expression ')' | unaryOp term
    /// ```
    fn compile_term(&mut self, sub: &mut SubroutineContext) -> JackResult<()> {
        use Keyword as K;
        use TokenKind as TK;

        let token = self.tokens.peek()?;

        match token.kind {
            TK::Integer => {
                self.tokens.advance()?;
                let value = self.tokens.int_val()?;
                self.writer.write_push(Segment::Constant, value);
            }
            TK::String => {
                self.tokens.advance()?;
                let text = self.tokens.string_val()?;
                self.emit_string(text, &token)?;
            }
            TK::Keyword(K::True) => {
                self.tokens.advance()?;
                self.writer.write_push(Segment::Constant, 1);
                self.writer.write_arithmetic(ArithmeticCommand::Neg);
            }
            TK::Keyword(K::False | K::Null) => {
                self.tokens.advance()?;
                self.writer.write_push(Segment::Constant, 0);
            }
            TK::Keyword(K::This) => {
                self.tokens.advance()?;
                self.writer.write_push(Segment::Pointer, 0);
            }
            TK::Symbol(Symbol::LeftParen) => {
                self.tokens.advance()?;
                self.compile_expression(sub)?;
                self.tokens.consume_symbol(Symbol::RightParen)?;
            }
            TK::Symbol(Symbol::Minus) => {
                self.tokens.advance()?;
                self.compile_term(sub)?;
                self.writer.write_arithmetic(ArithmeticCommand::Neg);
            }
            TK::Symbol(Symbol::Tilde) => {
                self.tokens.advance()?;
                self.compile_term(sub)?;
                self.writer.write_arithmetic(ArithmeticCommand::Not);
            }
            TK::Ident => {
                let (name, span) = self.tokens.consume_ident("variable name")?;

                match self.tokens.peek_kind()? {
                    TK::Symbol(Symbol::LeftBracket) => {
                        let (segment, index) = self.variable(&name, span)?;
                        self.writer.write_push(segment, index);

                        self.tokens.advance()?;
                        self.compile_expression(sub)?;
                        self.tokens.consume_symbol(Symbol::RightBracket)?;

                        self.writer.write_arithmetic(ArithmeticCommand::Add);
                        self.writer.write_pop(Segment::Pointer, 1);
                        self.writer.write_push(Segment::That, 0);
                    }
                    TK::Symbol(Symbol::Dot | Symbol::LeftParen) => {
                        self.compile_subroutine_call(sub, name, span)?;
                    }
                    _ => {
                        let (segment, index) = self.variable(&name, span)?;
                        self.writer.write_push(segment, index);
                    }
                }
            }
            _ => return Err(self.tokens.unexpected(&token, "an expression")),
        }

        Ok(())
    }

    /// Called with the leading identifier already consumed.
    ///
    /// ```text
    /// subroutineName '(' expressionList ')'
    ///     | (className | varName) '.' subroutineName '(' expressionList ')'
    /// ```
    fn compile_subroutine_call(&mut self, sub: &mut SubroutineContext, name: SmolStr, span: Span) -> JackResult<()> {
        let token = self.tokens.peek()?;

        let (callee, receiver_args) = match token.kind {
            TokenKind::Symbol(Symbol::Dot) => {
                self.tokens.advance()?;
                let (method, _) = self.tokens.consume_ident("subroutine name")?;

                match self.symbols.kind_of(&name) {
                    // Method call on an object held in a variable.
                    Some(kind) => {
                        let index = self.symbols.index_of(&name).map_err(|err| err.at(self.tokens.location(span)))?;
                        let class_name = self.symbols.type_of(&name).map_err(|err| err.at(self.tokens.location(span)))?;
                        let callee = format!("{class_name}.{method}");
                        self.writer.write_push(kind.segment(), index);
                        (callee, 1)
                    }
                    // Function or constructor of a class.
                    None => (format!("{name}.{method}"), 0),
                }
            }
            TokenKind::Symbol(Symbol::LeftParen) => {
                // Method of the current object.
                self.writer.write_push(Segment::Pointer, 0);
                (format!("{}.{name}", sub.class.name), 1)
            }
            _ => return Err(self.tokens.unexpected(&token, "'.' or '('")),
        };

        self.tokens.consume_symbol(Symbol::LeftParen)?;
        let n_args = self.compile_expression_list(sub)?;
        self.tokens.consume_symbol(Symbol::RightParen)?;

        self.writer.write_call(callee, n_args + receiver_args);

        Ok(())
    }

    /// ```text
    /// (expression (',' expression)*)?
    /// ```
    ///
    /// Returns the number of expressions.
    fn compile_expression_list(&mut self, sub: &mut SubroutineContext) -> JackResult<u16> {
        let mut count = 0;

        if self.tokens.peek_kind()? == TokenKind::Symbol(Symbol::RightParen) {
            return Ok(count);
        }

        loop {
            self.compile_expression(sub)?;
            count += 1;

            if !self.tokens.match_token(TokenKind::Symbol(Symbol::Comma))? {
                break;
            }
        }

        Ok(count)
    }

    /// Build a string object one character at a time.
    fn emit_string(&mut self, text: &str, token: &Token) -> JackResult<()> {
        let chars = text
            .chars()
            .map(|c| u16::try_from(c as u32).ok().filter(|code| *code <= MAX_INT))
            .collect::<Option<Vec<u16>>>();

        let chars = match chars {
            Some(chars) if chars.len() <= MAX_INT as usize => chars,
            _ => return Err(self.tokens.unexpected(token, "a string of at most 32767 characters below U+8000")),
        };

        self.writer.write_push(Segment::Constant, chars.len() as u16);
        self.writer.write_call(STRING_NEW, 1);

        for code in chars {
            self.writer.write_push(Segment::Constant, code);
            self.writer.write_call(STRING_APPEND_CHAR, 2);
        }

        Ok(())
    }

    /// Segment and index of a variable used as a value.
    fn variable(&self, name: &str, span: Span) -> JackResult<(Segment, u16)> {
        match self.symbols.kind_of(name) {
            Some(kind) => {
                let index = self.symbols.index_of(name)?;
                Ok((kind.segment(), index))
            }
            None => Err(JackError::UndefinedSymbol {
                name: SmolStr::from(name),
                location: Some(self.tokens.location(span)),
            }),
        }
    }
}
