//! `sizeOf` computation over already-allocated Values (spec.md §4.5).
//!
//! Bitfield packing here mirrors exactly what [`crate::reader`] does when
//! populating a struct: bits accumulate across byte boundaries with no
//! per-declared-type storage-unit rounding, and only a non-bitfield member
//! (or the end of the struct) flushes the run to the next byte boundary.
//! Scenario D (`a:3, b:5, c:8` sizing to 2 bytes, not padded per-member to
//! 32 bits) is the concrete case this is grounded on.

use crate::ast::TypeNode;
use crate::error::Result;
use crate::value::{TypeRef, ValueArena, ValueId, ValueKind};

pub fn size_of_value(arena: &ValueArena, id: ValueId) -> Result<u64> {
    let value = arena.get(id);
    match value.kind {
        ValueKind::Null => Ok(0),
        ValueKind::String => Ok(value.string_buf.len() as u64),
        ValueKind::Array => size_of_array(arena, id),
        ValueKind::Struct => size_of_struct(arena, id),
        ValueKind::Union => size_of_union(arena, id),
        ValueKind::Enum => Ok(size_of_enum(value)),
        _ => Ok(value.kind.byte_width().unwrap_or(0)),
    }
}

fn size_of_array(arena: &ValueArena, id: ValueId) -> Result<u64> {
    let value = arena.get(id);
    match value.members.first() {
        None => Ok(0),
        Some(&first) => {
            let element_size = size_of_value(arena, first)?;
            Ok(element_size * value.members.len() as u64)
        }
    }
}

fn size_of_struct(arena: &ValueArena, id: ValueId) -> Result<u64> {
    let value = arena.get(id);
    let mut bits: u64 = 0;
    for &member in &value.members {
        let m = arena.get(member);
        if m.flags.is_local() || m.flags.is_const() {
            continue;
        }
        if let Some(w) = m.bit_width {
            bits += w as u64;
        } else {
            bits = round_up_to_byte(bits);
            bits += size_of_value(arena, member)? * 8;
        }
    }
    Ok(round_up_to_byte(bits) / 8)
}

/// Per-member `(offset, byte_size)` for a struct's children, replaying the
/// same bit-accumulation [`size_of_struct`] uses so the display tree's
/// offsets (spec.md §4.7) agree with the size the struct itself reports.
/// Bitfield members report a zero byte size (they don't own an addressable
/// byte range); Local/Const members are skipped entirely from the layout,
/// not just hidden from the size total, since they were never read from
/// the file and have no file offset to show.
pub fn struct_child_layout(arena: &ValueArena, id: ValueId) -> Vec<(ValueId, u64, u64)> {
    let value = arena.get(id);
    let mut bits: u64 = 0;
    let mut layout = Vec::with_capacity(value.members.len());
    for &member in &value.members {
        let m = arena.get(member);
        if m.flags.is_local() || m.flags.is_const() {
            continue;
        }
        if let Some(w) = m.bit_width {
            let offset = bits / 8;
            bits += w as u64;
            layout.push((member, offset, 0));
        } else {
            bits = round_up_to_byte(bits);
            let offset = bits / 8;
            let size = size_of_value(arena, member).unwrap_or(0);
            bits += size * 8;
            layout.push((member, offset, size));
        }
    }
    layout
}

fn size_of_union(arena: &ValueArena, id: ValueId) -> Result<u64> {
    let value = arena.get(id);
    let mut max = 0u64;
    for &member in &value.members {
        let m = arena.get(member);
        if m.flags.is_local() || m.flags.is_const() {
            continue;
        }
        max = max.max(size_of_value(arena, member)?);
    }
    Ok(max)
}

fn size_of_enum(value: &crate::value::Value) -> u64 {
    match &value.typedef {
        Some(TypeRef::Enum(decl)) => type_node_byte_width(&decl.underlying),
        _ => 4,
    }
}

fn round_up_to_byte(bits: u64) -> u64 {
    (bits + 7) / 8 * 8
}

/// Byte width of a type node as it would appear in a declaration, *before*
/// any instance is allocated. Used for enum underlying-type sizing and as a
/// fallback for sizing an inline compound with no dynamically-sized (VLA)
/// members; once a Value exists, prefer [`size_of_value`], which reflects
/// what was actually read. A bare `Named` reference with no further context
/// defaults to a 4-byte (`s32`) slot, matching spec.md §4.5's enum fallback.
pub fn type_node_byte_width(ty: &TypeNode) -> u64 {
    match ty {
        TypeNode::Basic(basic) => basic.bits() / 8,
        TypeNode::Enum(decl) => type_node_byte_width(&decl.underlying),
        TypeNode::Struct(decl) => {
            let mut bits = 0u64;
            for m in &decl.members {
                if m.is_local || m.is_const || m.array_size.is_some() {
                    continue;
                }
                if let Some(_bits_expr) = &m.bits {
                    let _ = _bits_expr;
                    continue;
                }
                bits = round_up_to_byte(bits) + type_node_byte_width(&m.ty) * 8;
            }
            round_up_to_byte(bits) / 8
        }
        TypeNode::Union(decl) => decl
            .members
            .iter()
            .filter(|m| !m.is_local && !m.is_const)
            .map(|m| type_node_byte_width(&m.ty))
            .max()
            .unwrap_or(0),
        TypeNode::Named(_) => 4,
    }
}
