//! Virtual machine commands and the text writer.
use std::fmt;

use smol_str::SmolStr;

/// Named virtual memory region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    Constant,
    Argument,
    Local,
    Static,
    This,
    That,
    Pointer,
    Temp,
}

impl fmt::Display for Segment {
    #[rustfmt::skip]
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Self::Constant => "constant",
            Self::Argument => "argument",
            Self::Local    => "local",
            Self::Static   => "static",
            Self::This     => "this",
            Self::That     => "that",
            Self::Pointer  => "pointer",
            Self::Temp     => "temp",
        })
    }
}

/// Arithmetic and logical commands, operating on the top of the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticCommand {
    Add,
    Sub,
    Neg,
    Eq,
    Gt,
    Lt,
    And,
    Or,
    Not,
}

impl fmt::Display for ArithmeticCommand {
    #[rustfmt::skip]
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Self::Add => "add",
            Self::Sub => "sub",
            Self::Neg => "neg",
            Self::Eq  => "eq",
            Self::Gt  => "gt",
            Self::Lt  => "lt",
            Self::And => "and",
            Self::Or  => "or",
            Self::Not => "not",
        })
    }
}

/// One line of VM code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VmCommand {
    /// `push segment index`
    Push(Segment, u16),
    /// `pop segment index`
    Pop(Segment, u16),
    Arithmetic(ArithmeticCommand),
    /// `label name`
    Label(SmolStr),
    /// `goto name`
    Goto(SmolStr),
    /// `if-goto name`
    /// Jump when the popped value is not false.
    IfGoto(SmolStr),
    /// `call Class.sub nArgs`
    Call(SmolStr, u16),
    /// `function Class.sub nLocals`
    Function(SmolStr, u16),
    Return,
}

/// Outputs the command in the VM text format.
impl fmt::Display for VmCommand {
    #[rustfmt::skip]
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Push(segment, index)   => write!(f, "push {segment} {index}"),
            Self::Pop(segment, index)    => write!(f, "pop {segment} {index}"),
            Self::Arithmetic(command)    => write!(f, "{command}"),
            Self::Label(name)            => write!(f, "label {name}"),
            Self::Goto(name)             => write!(f, "goto {name}"),
            Self::IfGoto(name)           => write!(f, "if-goto {name}"),
            Self::Call(name, n_args)     => write!(f, "call {name} {n_args}"),
            Self::Function(name, n_locals) => write!(f, "function {name} {n_locals}"),
            Self::Return                 => write!(f, "return"),
        }
    }
}

/// Accumulates VM commands for one compilation unit.
///
/// The writer holds no state besides its buffer. The text is
/// produced by [`VmWriter::close`], which consumes the writer
/// so the output can only be finalized once.
#[derive(Debug, Default)]
pub struct VmWriter {
    code: Vec<VmCommand>,
}

impl VmWriter {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands written so far.
    pub fn commands(&self) -> &[VmCommand] {
        &self.code
    }

    fn emit(&mut self, command: VmCommand) {
        log::trace!("emit: {command}");
        self.code.push(command);
    }

    pub fn write_push(&mut self, segment: Segment, index: u16) {
        self.emit(VmCommand::Push(segment, index))
    }

    pub fn write_pop(&mut self, segment: Segment, index: u16) {
        debug_assert_ne!(segment, Segment::Constant, "constant segment is read-only");
        self.emit(VmCommand::Pop(segment, index))
    }

    pub fn write_arithmetic(&mut self, command: ArithmeticCommand) {
        self.emit(VmCommand::Arithmetic(command))
    }

    pub fn write_label(&mut self, label: impl Into<SmolStr>) {
        self.emit(VmCommand::Label(label.into()))
    }

    pub fn write_goto(&mut self, label: impl Into<SmolStr>) {
        self.emit(VmCommand::Goto(label.into()))
    }

    pub fn write_if(&mut self, label: impl Into<SmolStr>) {
        self.emit(VmCommand::IfGoto(label.into()))
    }

    pub fn write_call(&mut self, name: impl Into<SmolStr>, n_args: u16) {
        self.emit(VmCommand::Call(name.into(), n_args))
    }

    pub fn write_function(&mut self, name: impl Into<SmolStr>, n_locals: u16) {
        self.emit(VmCommand::Function(name.into(), n_locals))
    }

    pub fn write_return(&mut self) {
        self.emit(VmCommand::Return)
    }

    /// Render the accumulated commands, one per line.
    pub fn close(self) -> String {
        let mut text = String::with_capacity(self.code.len() * 16);
        for command in &self.code {
            text.push_str(&command.to_string());
            text.push('\n');
        }
        text
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_command_format() {
        let mut writer = VmWriter::new();
        writer.write_function("Main.main", 2);
        writer.write_push(Segment::Constant, 7);
        writer.write_pop(Segment::Local, 1);
        writer.write_arithmetic(ArithmeticCommand::Neg);
        writer.write_label("WHILE_EXP0");
        writer.write_if("WHILE_END0");
        writer.write_goto("WHILE_EXP0");
        writer.write_call("Math.multiply", 2);
        writer.write_push(Segment::Pointer, 0);
        writer.write_return();

        assert_eq!(writer.commands().len(), 10);
        assert_eq!(
            writer.close(),
            concat!(
                "function Main.main 2\n",
                "push constant 7\n",
                "pop local 1\n",
                "neg\n",
                "label WHILE_EXP0\n",
                "if-goto WHILE_END0\n",
                "goto WHILE_EXP0\n",
                "call Math.multiply 2\n",
                "push pointer 0\n",
                "return\n",
            )
        );
    }

    #[test]
    fn test_empty_writer() {
        assert_eq!(VmWriter::new().close(), "");
    }
}
