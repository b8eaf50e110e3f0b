//! Constant values of the Jack language and its virtual machine.

/// Largest integer constant the language allows.
///
/// The VM works on 16-bit two's complement words, and a literal
/// is always pushed as a positive constant.
pub const MAX_INT: u16 = 32767;

/// File extension of source files.
pub const SOURCE_EXTENSION: &str = "jack";

/// File extension of emitted VM code.
pub const VM_EXTENSION: &str = "vm";

// ----------------------------------------------------------------------------
// Operating system subroutines called by generated code.

/// Heap allocation for constructors, `Memory.alloc(size)`.
pub const MEMORY_ALLOC: &str = "Memory.alloc";
pub const MATH_MULTIPLY: &str = "Math.multiply";
pub const MATH_DIVIDE: &str = "Math.divide";
/// `String.new(maxLength)`
pub const STRING_NEW: &str = "String.new";
/// `String.appendChar(this, c)`
pub const STRING_APPEND_CHAR: &str = "String.appendChar";

// ----------------------------------------------------------------------------
// Label prefixes for control flow.

pub const LABEL_IF_TRUE: &str = "IF_TRUE";
pub const LABEL_IF_FALSE: &str = "IF_FALSE";
pub const LABEL_IF_END: &str = "IF_END";
pub const LABEL_WHILE_EXP: &str = "WHILE_EXP";
pub const LABEL_WHILE_END: &str = "WHILE_END";
