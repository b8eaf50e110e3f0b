pub mod compiler;
pub mod constants;
pub mod driver;
mod error;

/// Version of the compiler library.
pub const IMPL_VERSION: &str = env!("CARGO_PKG_VERSION");

pub use self::error::{JackError, JackResult, LexError, LexErrorKind, Location, SyntaxError};

pub mod prelude {
    pub use super::{
        compiler::{compile, CompiledClass},
        driver::{CompilerConf, Report},
        error::{JackError, JackResult},
    };
}
