//! Glint front end: source text to instruction lists.
//!
//! Parsing is a single pass. The lexer produces tokens lazily, the parser
//! lowers each statement straight to the flat instruction list of the
//! procedure it belongs to, and forward jumps are patched as soon as their
//! target is laid out.
//!
//! # Usage
//!
//! ```
//! use glint_parser::parse_program;
//!
//! let program = parse_program("def twice(x) { return x * 2; }\n", "demo.gl");
//! assert!(program.check().is_ok());
//! assert!(program.get_member("twice").unwrap().is_some());
//! ```
//!
//! A program that fails to parse is still returned; it carries the error and
//! re-raises it from [`Program::check`] and every member access.

pub mod lexer;

mod cursor;
mod emit;
mod expr;
mod listing;
mod parser;

use std::rc::Rc;

use glint_common::Program;

pub use lexer::{tokenize, Keyword, Lexer, Token, TokenKind};
pub use listing::listing;
pub use parser::{ParseOptions, MODULE_PROCEDURE};

/// Parse `source` with default options (breakpoint markers on).
pub fn parse_program(source: &str, filename: &str) -> Rc<Program> {
    parse_program_with(
        source,
        &ParseOptions {
            filename: filename.to_string(),
            ..ParseOptions::default()
        },
    )
}

/// Parse `source`. Parse errors are recorded on the returned program.
pub fn parse_program_with(source: &str, options: &ParseOptions) -> Rc<Program> {
    let digest = *blake3::hash(source.as_bytes()).as_bytes();
    Rc::new_cyclic(|scope| {
        match parser::Parser::new(source, options, scope.clone()).parse_module() {
            Ok(parts) => Program::new(&options.filename, digest, parts),
            Err(error) => {
                log::debug!("parse of {} failed: {}", options.filename, error.kind);
                Program::failed(&options.filename, digest, error)
            }
        }
    })
}

/// Hex blake3 digest of a source text, as reported by
/// [`Program::source_digest`].
pub fn source_digest(source: &str) -> String {
    blake3::hash(source.as_bytes()).to_hex().to_string()
}
