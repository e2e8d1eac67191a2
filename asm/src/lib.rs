pub mod ast;
pub mod compiler;
pub mod config;
pub mod deps;
pub mod diag;
pub mod dump;
pub mod error;
pub mod expr;
pub mod lexer;
pub mod linker;
pub mod marker;
pub mod options;
pub mod parser;
pub mod program;
pub mod relocation;
pub mod resource;
pub mod symbols;
pub mod unit;
pub mod writer;

pub use compiler::{CompilationListener, Compiler, LogListener, NullListener, Phase, PhaseSlot};
pub use error::Error;
pub use linker::{CompiledCode, Linker};
pub use options::{CompilerOption, Options};
pub use program::Program;
pub use resource::Resource;
