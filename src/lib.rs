#![forbid(unsafe_code)]
//! `btvm`: an interpreter for a typed, C-like binary-description ("template")
//! language, producing a located, typed tree from running a template against
//! a byte source (spec.md §1-2).
//!
//! The crate is organized leaves-first, mirroring the component list in
//! spec.md §2:
//!
//! - [`value`]: the tagged runtime value model and its arena.
//! - [`reader`]: the bit-granular, endianness-aware binary reader.
//! - [`ast`]: the typed AST the interpreter consumes.
//! - [`scope`]: lexical scopes and the declaration stack.
//! - [`host`]: the host function registry.
//! - [`interp`]: the tree-walking interpreter.
//! - [`format`]: the post-run display tree builder.
//! - [`parser`]: a small bundled recursive-descent parser (SPEC_FULL.md §8).

pub mod ast;
pub mod error;
pub mod format;
pub mod host;
pub mod interp;
pub mod parser;
pub mod reader;
pub mod scope;
pub mod value;

#[cfg(test)]
mod test;

pub use error::{Result, VmError};
pub use format::BTEntry;
pub use interp::{Interpreter, State};
pub use reader::{SliceSource, StreamSource};
