//! The runtime value model: a tagged, arena-owned value with scalar,
//! string, and compound (struct/union/enum/array) storage disciplines.

mod ops;

pub use ops::{cast_scalar, compatible, CompareOp};

use std::num::NonZeroU32;
use std::rc::Rc;

use num_enum::TryFromPrimitive;
use serde::Serialize;

use crate::ast::{CompoundDecl, EnumDecl};
use crate::error::{Result, VmError};

/// Index into a [`ValueArena`]. 1-based so that `Option<ValueId>` is
/// pointer-sized, matching the teacher's own `NonZeroU32`/`NonZeroU64`
/// index newtypes (see `til/bitfield.rs`, `id0.rs`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ValueId(NonZeroU32);

impl ValueId {
    fn from_index(idx: usize) -> Self {
        ValueId(NonZeroU32::new((idx + 1) as u32).expect("arena index overflow"))
    }

    fn to_index(self) -> usize {
        (self.0.get() - 1) as usize
    }
}

/// Owns every [`Value`] created during one evaluation run. Children are
/// referenced by [`ValueId`] rather than by pointer, so teardown is O(1)
/// and no reference cycle can form.
#[derive(Default)]
pub struct ValueArena {
    values: Vec<Value>,
}

impl ValueArena {
    pub fn new() -> Self {
        Self { values: Vec::new() }
    }

    pub fn alloc(&mut self, value: Value) -> ValueId {
        self.values.push(value);
        ValueId::from_index(self.values.len() - 1)
    }

    pub fn get(&self, id: ValueId) -> &Value {
        &self.values[id.to_index()]
    }

    pub fn get_mut(&mut self, id: ValueId) -> &mut Value {
        &mut self.values[id.to_index()]
    }
}

/// Variant tag from spec.md's `{Null, Bool, u8..u64, s8..s64, Float,
/// Double, String, Array, Struct, Union, Enum}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ValueKind {
    Null,
    Bool,
    U8,
    U16,
    U32,
    U64,
    S8,
    S16,
    S32,
    S64,
    Float,
    Double,
    String,
    Array,
    Struct,
    Union,
    Enum,
}

impl ValueKind {
    pub fn is_signed(self) -> bool {
        matches!(
            self,
            ValueKind::S8 | ValueKind::S16 | ValueKind::S32 | ValueKind::S64
        )
    }

    pub fn is_integer(self) -> bool {
        matches!(
            self,
            ValueKind::Bool
                | ValueKind::U8
                | ValueKind::U16
                | ValueKind::U32
                | ValueKind::U64
                | ValueKind::S8
                | ValueKind::S16
                | ValueKind::S32
                | ValueKind::S64
        )
    }

    pub fn is_floating_point(self) -> bool {
        matches!(self, ValueKind::Float | ValueKind::Double)
    }

    pub fn is_scalar(self) -> bool {
        self.is_integer() || self.is_floating_point()
    }

    pub fn is_compound(self) -> bool {
        matches!(
            self,
            ValueKind::Struct | ValueKind::Union | ValueKind::Enum | ValueKind::Array
        )
    }

    /// Byte width for a basic scalar type; `None` for non-scalars (and for
    /// `Bool`, whose *storage* is 1 byte but whose bit-width as a bitfield
    /// member is meant to be spelled out by the declaration instead).
    pub fn byte_width(self) -> Option<u64> {
        match self {
            ValueKind::Bool | ValueKind::U8 | ValueKind::S8 => Some(1),
            ValueKind::U16 | ValueKind::S16 => Some(2),
            ValueKind::U32 | ValueKind::S32 | ValueKind::Float => Some(4),
            ValueKind::U64 | ValueKind::S64 | ValueKind::Double => Some(8),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ValueKind::Null => "null",
            ValueKind::Bool => "bool",
            ValueKind::U8 => "u8",
            ValueKind::U16 => "u16",
            ValueKind::U32 => "u32",
            ValueKind::U64 => "u64",
            ValueKind::S8 => "s8",
            ValueKind::S16 => "s16",
            ValueKind::S32 => "s32",
            ValueKind::S64 => "s64",
            ValueKind::Float => "float",
            ValueKind::Double => "double",
            ValueKind::String => "string",
            ValueKind::Array => "array",
            ValueKind::Struct => "struct",
            ValueKind::Union => "union",
            ValueKind::Enum => "enum",
        }
    }

    /// Picks the narrowest scalar kind that can hold `bits` bits, per the
    /// teacher-independent rule from `original_source/btvm/vm/vmvalue.cpp`
    /// (`VMValue::build`).
    pub fn from_bits(bits: u64, is_signed: bool, is_fp: bool) -> Self {
        if is_fp {
            return if bits < 64 { ValueKind::Float } else { ValueKind::Double };
        }
        if bits == 1 {
            return ValueKind::Bool;
        }
        match bits {
            0..=8 => {
                if is_signed {
                    ValueKind::S8
                } else {
                    ValueKind::U8
                }
            }
            9..=16 => {
                if is_signed {
                    ValueKind::S16
                } else {
                    ValueKind::U16
                }
            }
            17..=32 => {
                if is_signed {
                    ValueKind::S32
                } else {
                    ValueKind::U32
                }
            }
            _ => {
                if is_signed {
                    ValueKind::S64
                } else {
                    ValueKind::U64
                }
            }
        }
    }
}

/// Bitset for `value_flags`: `Const`, `Local`, `Reference`. Hand-rolled
/// rather than pulled from the `bitflags` crate, matching the teacher's own
/// `flags_to_struct!` macro idiom in `lib.rs`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ValueFlags(u8);

impl ValueFlags {
    pub const NONE: ValueFlags = ValueFlags(0);
    pub const CONST: ValueFlags = ValueFlags(1);
    pub const LOCAL: ValueFlags = ValueFlags(2);
    pub const REFERENCE: ValueFlags = ValueFlags(4);

    pub fn contains(self, other: ValueFlags) -> bool {
        (self.0 & other.0) == other.0
    }

    pub fn insert(&mut self, other: ValueFlags) {
        self.0 |= other.0;
    }

    pub fn union(self, other: ValueFlags) -> ValueFlags {
        ValueFlags(self.0 | other.0)
    }

    pub fn is_const(self) -> bool {
        self.contains(ValueFlags::CONST)
    }

    pub fn is_local(self) -> bool {
        self.contains(ValueFlags::LOCAL)
    }

    pub fn is_reference(self) -> bool {
        self.contains(ValueFlags::REFERENCE)
    }
}

/// Scalar storage: exactly one of these is meaningful, selected by
/// `ValueKind`. Integers are always widened to 64 bits in storage; callers
/// narrow on read (`Cursor::read`) and mask on bitwise-not (`!`).
#[derive(Debug, Clone, Copy, Serialize)]
pub enum Scalar {
    UInt(u64),
    Int(i64),
    Float(f64),
}

impl Default for Scalar {
    fn default() -> Self {
        Scalar::UInt(0)
    }
}

impl Scalar {
    pub fn as_u64(self) -> u64 {
        match self {
            Scalar::UInt(v) => v,
            Scalar::Int(v) => v as u64,
            Scalar::Float(v) => v as u64,
        }
    }

    pub fn as_i64(self) -> i64 {
        match self {
            Scalar::UInt(v) => v as i64,
            Scalar::Int(v) => v,
            Scalar::Float(v) => v as i64,
        }
    }

    pub fn as_f64(self) -> f64 {
        match self {
            Scalar::UInt(v) => v as f64,
            Scalar::Int(v) => v as f64,
            Scalar::Float(v) => v,
        }
    }

    pub fn is_truthy(self) -> bool {
        self.as_u64() != 0
    }
}

/// `(value-index, byte-offset)` reference produced by indexing a `String`
/// value; writing through it mutates the target buffer in place.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Reference {
    pub target: ValueId,
    pub byte_offset: usize,
}

/// Back-pointer to the AST declaration a value was allocated from, used for
/// compatibility checks and member/name resolution. `None` for anonymous
/// scalars (literals, temporaries).
#[derive(Clone)]
pub enum TypeRef {
    Struct(Rc<CompoundDecl>),
    Union(Rc<CompoundDecl>),
    Enum(Rc<EnumDecl>),
    /// A typedef alias, kept only for its name (compatibility messages).
    Named(String),
}

impl TypeRef {
    pub fn type_name(&self) -> &str {
        match self {
            TypeRef::Struct(d) | TypeRef::Union(d) => d.name.as_deref().unwrap_or("<anonymous>"),
            TypeRef::Enum(d) => d.name.as_deref().unwrap_or("<anonymous>"),
            TypeRef::Named(n) => n,
        }
    }
}

/// Recognized color identifiers (`0x00BBGGRR`); `None` (0xFFFFFFFF) is the
/// unset sentinel from spec.md §6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, Serialize)]
#[repr(u32)]
pub enum Color {
    Black = 0x00_00_00_00,
    Red = 0x00_00_00_FF,
    DkRed = 0x00_00_00_80,
    LtRed = 0x00_80_80_FF,
    Green = 0x00_00_FF_00,
    DkGreen = 0x00_00_80_00,
    LtGreen = 0x00_80_FF_80,
    Blue = 0x00_FF_00_00,
    DkBlue = 0x00_80_00_00,
    LtBlue = 0x00_FF_80_80,
    Purple = 0x00_FF_00_FF,
    DkPurple = 0x00_80_00_80,
    LtPurple = 0x00_FF_80_FF,
    Aqua = 0x00_FF_FF_00,
    DkAqua = 0x00_80_80_00,
    LtAqua = 0x00_FF_FF_80,
    Yellow = 0x00_00_FF_FF,
    DkYellow = 0x00_00_80_80,
    LtYellow = 0x00_80_FF_FF,
    DkGray = 0x00_40_40_40,
    Gray = 0x00_80_80_80,
    Silver = 0x00_C0_C0_C0,
    LtGray = 0x00_E0_E0_E0,
    White = 0x00_FF_FF_FF,
    None = 0xFF_FF_FF_FF,
}

/// The central runtime value, per spec.md §3.
#[derive(Clone)]
pub struct Value {
    pub kind: ValueKind,
    pub typedef: Option<TypeRef>,
    pub flags: ValueFlags,
    pub id: String,
    /// Explicit bitfield width; `None` means byte-aligned (spec: `bits == -1`).
    pub bit_width: Option<u32>,
    /// File offset at which the value was read; only set for template
    /// (non-local, non-const) variables.
    pub offset: Option<u64>,
    pub fg_color: Option<Color>,
    pub bg_color: Option<Color>,
    pub scalar: Scalar,
    pub string_buf: Vec<u8>,
    pub members: Vec<ValueId>,
    pub reference: Option<Reference>,
}

impl Value {
    pub fn new(kind: ValueKind, id: impl Into<String>) -> Self {
        Value {
            kind,
            typedef: None,
            flags: ValueFlags::NONE,
            id: id.into(),
            bit_width: None,
            offset: None,
            fg_color: None,
            bg_color: None,
            scalar: Scalar::default(),
            string_buf: Vec::new(),
            members: Vec::new(),
            reference: None,
        }
    }

    pub fn null(id: impl Into<String>) -> Self {
        Value::new(ValueKind::Null, id)
    }

    pub fn literal_bool(value: bool) -> Self {
        let mut v = Value::new(ValueKind::Bool, "");
        v.scalar = Scalar::UInt(value as u64);
        v
    }

    pub fn literal_int(value: u64) -> Self {
        let mut v = Value::new(ValueKind::from_bits(64, false, false), "");
        v.scalar = Scalar::UInt(value);
        v
    }

    pub fn literal_signed(value: i64) -> Self {
        let mut v = Value::new(ValueKind::S64, "");
        v.scalar = Scalar::Int(value);
        v
    }

    pub fn literal_real(value: f64) -> Self {
        let mut v = Value::new(ValueKind::Double, "");
        v.scalar = Scalar::Float(value);
        v
    }

    pub fn literal_string(value: &str) -> Self {
        let mut v = Value::new(ValueKind::String, "");
        v.string_buf = value.as_bytes().to_vec();
        v
    }

    pub fn is_string(&self) -> bool {
        self.kind == ValueKind::String
    }

    pub fn is_array(&self) -> bool {
        self.kind == ValueKind::Array
    }

    pub fn is_struct(&self) -> bool {
        self.kind == ValueKind::Struct
    }

    pub fn is_union(&self) -> bool {
        self.kind == ValueKind::Union
    }

    pub fn is_enum(&self) -> bool {
        self.kind == ValueKind::Enum
    }

    pub fn is_compound(&self) -> bool {
        self.kind.is_compound()
    }

    pub fn is_integer(&self) -> bool {
        self.kind.is_integer()
    }

    pub fn is_floating_point(&self) -> bool {
        self.kind.is_floating_point()
    }

    pub fn is_scalar(&self) -> bool {
        self.kind.is_scalar()
    }

    pub fn is_signed(&self) -> bool {
        self.kind.is_signed()
    }

    pub fn is_negative(&self) -> bool {
        if self.is_signed() {
            self.scalar.as_i64() < 0
        } else if self.is_floating_point() {
            self.scalar.as_f64() < 0.0
        } else {
            false
        }
    }

    /// A value participates in the file-read pass unless it's `Const`,
    /// `Local`, a `Reference`, or a `Null`/already-populated enum constant.
    pub fn is_readable(&self) -> bool {
        !self.flags.is_const() && !self.flags.is_local() && !self.flags.is_reference()
    }

    pub fn type_name(&self) -> String {
        match &self.typedef {
            Some(t) => t.type_name().to_string(),
            None => self.kind.name().to_string(),
        }
    }

    /// Logical string length: the byte buffer is not NUL-terminated by
    /// contract, but an embedded NUL truncates formatted display.
    pub fn display_len(&self) -> usize {
        self.string_buf
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(self.string_buf.len())
    }

    pub fn to_display_string(&self) -> Result<String> {
        if !self.is_string() {
            return Err(VmError::ty(format!(
                "Trying to converting a '{}' to 'string'",
                self.type_name()
            )));
        }
        Ok(String::from_utf8_lossy(&self.string_buf[..self.display_len()]).into_owned())
    }

    pub fn find_member<'a>(&self, arena: &'a ValueArena, name: &str) -> Option<ValueId> {
        self.members
            .iter()
            .copied()
            .find(|&m| arena.get(m).id == name)
    }

    /// For an `Enum` Value, the name of the first declared constant whose
    /// raw value matches this one's. `members` holds the enum's ordered
    /// constant children (spec.md §3's field table lists `members` as used
    /// by `Enum` alongside the compound kinds).
    pub fn enum_label<'a>(&self, arena: &'a ValueArena) -> Option<&'a str> {
        let raw = self.scalar.as_i64();
        self.members
            .iter()
            .map(|&m| arena.get(m))
            .find(|c| c.scalar.as_i64() == raw)
            .map(|c| c.id.as_str())
    }
}
