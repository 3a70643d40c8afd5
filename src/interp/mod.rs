//! The interpreter: owns the value arena, lexical scopes, the binary
//! reader, and the host function registry, and drives statement execution
//! (spec.md §4). Grounded on the teacher's `til::TILSection`/loader split:
//! one long-lived owner struct, with behavior factored into submodules by
//! concern (`decl`, `expr`, `stmt`, `size`) rather than one giant `impl`.

pub(crate) mod decl;
mod expr;
pub(crate) mod size;
mod stmt;

use std::collections::HashMap;
use std::io::Write;

use crate::error::Result;
use crate::host::HostRegistry;
use crate::reader::{BinaryReader, ByteSource};
use crate::scope::{DeclarationStack, ScopeStack};
use crate::value::{Color, Value, ValueArena, ValueFlags, ValueId};

/// Control-flow signal threaded through statement execution, mirroring the
/// teacher's `ControlFlow`-style state enum rather than exceptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum State {
    #[default]
    None,
    Break,
    Continue,
    Return,
    Error,
}

const COLOR_CONSTANTS: &[(&str, Color)] = &[
    ("cBlack", Color::Black),
    ("cRed", Color::Red),
    ("cDkRed", Color::DkRed),
    ("cLtRed", Color::LtRed),
    ("cGreen", Color::Green),
    ("cDkGreen", Color::DkGreen),
    ("cLtGreen", Color::LtGreen),
    ("cBlue", Color::Blue),
    ("cDkBlue", Color::DkBlue),
    ("cLtBlue", Color::LtBlue),
    ("cPurple", Color::Purple),
    ("cDkPurple", Color::DkPurple),
    ("cLtPurple", Color::LtPurple),
    ("cAqua", Color::Aqua),
    ("cDkAqua", Color::DkAqua),
    ("cLtAqua", Color::LtAqua),
    ("cYellow", Color::Yellow),
    ("cDkYellow", Color::DkYellow),
    ("cLtYellow", Color::LtYellow),
    ("cDkGray", Color::DkGray),
    ("cGray", Color::Gray),
    ("cSilver", Color::Silver),
    ("cLtGray", Color::LtGray),
    ("cWhite", Color::White),
    ("cNone", Color::None),
];

pub struct Interpreter<S> {
    arena: ValueArena,
    scopes: ScopeStack,
    decl_stack: DeclarationStack,
    /// Top-level template variables, in declaration order (spec.md §4.7's
    /// display tree walks this list, not the scope table).
    allocations: Vec<ValueId>,
    reader: BinaryReader<S>,
    state: State,
    hosts: HostRegistry<S>,
    back_colors: HashMap<u64, Color>,
    fore_colors: HashMap<u64, Color>,
    out: Box<dyn Write>,
    return_value: Option<Value>,
}

impl<S: ByteSource> Interpreter<S> {
    pub fn new(source: S) -> Self {
        Self::with_writer(source, Box::new(std::io::sink()))
    }

    pub fn with_writer(source: S, out: Box<dyn Write>) -> Self {
        let mut interp = Interpreter {
            arena: ValueArena::new(),
            scopes: ScopeStack::new(),
            decl_stack: DeclarationStack::new(),
            allocations: Vec::new(),
            reader: BinaryReader::new(source),
            state: State::None,
            hosts: HostRegistry::standard(),
            back_colors: HashMap::new(),
            fore_colors: HashMap::new(),
            out,
            return_value: None,
        };
        interp.bind_color_constants();
        interp
    }

    fn bind_color_constants(&mut self) {
        for &(name, color) in COLOR_CONSTANTS {
            let mut v = Value::literal_int(color as u32 as u64);
            v.flags.insert(ValueFlags::CONST);
            let id = self.arena.alloc(v);
            self.scopes.global_mut().bind(name, id);
        }
    }

    pub fn reader(&self) -> &BinaryReader<S> {
        &self.reader
    }

    pub(crate) fn reader_mut(&mut self) -> &mut BinaryReader<S> {
        &mut self.reader
    }

    pub fn arena(&self) -> &ValueArena {
        &self.arena
    }

    pub(crate) fn arena_mut(&mut self) -> &mut ValueArena {
        &mut self.arena
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub(crate) fn write_output(&mut self, s: &str) {
        let _ = self.out.write_all(s.as_bytes());
    }

    pub(crate) fn set_back_color(&mut self, offset: u64, color: Color) {
        self.back_colors.insert(offset, color);
    }

    pub(crate) fn set_fore_color(&mut self, offset: u64, color: Color) {
        self.fore_colors.insert(offset, color);
    }

    /// Reads `size` bytes at `offset` into `dest` without disturbing the
    /// primary cursor, for host functions like `ReadBytes`/`ReadUInt`
    /// (spec.md §6). Implemented via direct field access rather than
    /// through `reader_mut()`/`arena_mut()`, since those each borrow all of
    /// `self` and can't be combined within one `no_seek()` scope.
    pub(crate) fn peek_read(&mut self, offset: u64, dest: ValueId, size: u64) -> Result<()> {
        let mut guard = self.reader.no_seek();
        guard.reader().seek(offset);
        guard.reader().read_into(&mut self.arena, dest, size)
    }

    /// Parses and executes a template source string, stopping (and leaving
    /// `state() == State::Error`) at the first runtime error.
    pub fn evaluate(&mut self, source: &str) -> Result<()> {
        let program = match crate::parser::parse(source) {
            Ok(block) => block,
            Err(err) => {
                self.error();
                return Err(err);
            }
        };
        if let Err(err) = self.exec_stmts(&program) {
            self.error();
            return Err(err);
        }
        Ok(())
    }

    /// Records a fatal evaluation failure (spec.md §7): sets
    /// `state = State::Error` and clears scopes and the declaration stack,
    /// so a reused `Interpreter` doesn't carry partial binding state from
    /// the failed run into whatever runs next.
    fn error(&mut self) {
        self.state = State::Error;
        self.scopes = ScopeStack::new();
        self.decl_stack = DeclarationStack::new();
        self.bind_color_constants();
    }

    /// Builds the display tree for everything allocated so far (spec.md
    /// §4.7). Returns an empty tree if the program ended in an error.
    pub fn format(&self) -> Vec<crate::format::BTEntry> {
        if self.state == State::Error {
            return Vec::new();
        }
        crate::format::build_tree(
            &self.arena,
            &self.allocations,
            &self.back_colors,
            &self.fore_colors,
            self.reader.endianness(),
        )
    }
}
