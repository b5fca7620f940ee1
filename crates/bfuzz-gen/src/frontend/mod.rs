//! Frontend for scanning Go package sources.
//!
//! This module contains:
//! - [`ast`] - Declarations and type expressions
//! - [`lexer`] - Identifier and keyword rules
//! - [`parser`] - pest grammar and tree construction

pub mod ast;
pub mod lexer;
pub mod parser;

pub use ast::*;
pub use lexer::*;
pub use parser::*;
