pub mod cfg;
pub mod codegen;
pub mod config;
pub mod driver;
pub mod emitter;
pub mod error;
pub mod ir;
pub mod lexer;
pub mod optimizer;
pub mod parser;

pub use config::Config;
pub use driver::compile;
pub use error::{Error, Result};
