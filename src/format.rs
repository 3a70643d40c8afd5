//! Builds the display tree handed to callers after a template run
//! (spec.md §4.7): one [`BTEntry`] per top-level allocation, offsets
//! recomputed purely from a running byte cursor plus `sizeof` rather than
//! trusted from `Value::offset` (which is only set for leaves that were
//! actually read, not for the compounds wrapping them). Colors are resolved
//! per-offset, falling back to the parent entry's color, then to
//! `Color::None`.

use std::collections::HashMap;

use serde::Serialize;

use crate::interp::size::{size_of_value, struct_child_layout};
use crate::reader::Endianness;
use crate::value::{Color, Value, ValueArena, ValueId};

#[derive(Debug, Clone, Serialize)]
pub struct Location {
    pub offset: u64,
    pub size: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BTEntry {
    pub name: String,
    pub type_name: String,
    pub value: String,
    pub location: Location,
    pub endianness: &'static str,
    pub fg_color: u32,
    pub bg_color: u32,
    pub children: Vec<BTEntry>,
}

fn endianness_label(e: Endianness) -> &'static str {
    match e {
        Endianness::Little => "little",
        Endianness::Big => "big",
        Endianness::Platform => "platform",
    }
}

/// Renders a scalar/string/enum Value for display. Compounds render empty;
/// their content lives entirely in `children`.
fn display_value(value: &Value, arena: &ValueArena) -> String {
    if value.is_string() {
        return value.to_display_string().unwrap_or_default();
    }
    if value.is_enum() {
        return match value.enum_label(arena) {
            Some(label) => label.to_string(),
            None => value.scalar.as_i64().to_string(),
        };
    }
    if value.is_compound() || value.is_array() {
        return String::new();
    }
    if value.is_floating_point() {
        return value.scalar.as_f64().to_string();
    }
    if value.is_signed() {
        value.scalar.as_i64().to_string()
    } else {
        value.scalar.as_u64().to_string()
    }
}

struct ColorContext<'a> {
    back_colors: &'a HashMap<u64, Color>,
    fore_colors: &'a HashMap<u64, Color>,
    endianness: Endianness,
}

impl ColorContext<'_> {
    fn resolve(&self, offset: u64, parent: (Color, Color)) -> (Color, Color) {
        let bg = self.back_colors.get(&offset).copied().unwrap_or(parent.0);
        let fg = self.fore_colors.get(&offset).copied().unwrap_or(parent.1);
        (bg, fg)
    }
}

pub fn build_tree(
    arena: &ValueArena,
    allocations: &[ValueId],
    back_colors: &HashMap<u64, Color>,
    fore_colors: &HashMap<u64, Color>,
    endianness: Endianness,
) -> Vec<BTEntry> {
    let ctx = ColorContext {
        back_colors,
        fore_colors,
        endianness,
    };
    let mut cursor = 0u64;
    let mut out = Vec::with_capacity(allocations.len());
    for &id in allocations {
        let size = size_of_value(arena, id).unwrap_or(0);
        out.push(build_entry(arena, id, cursor, (Color::None, Color::None), &ctx));
        cursor += size;
    }
    out
}

fn build_entry(arena: &ValueArena, id: ValueId, offset: u64, parent: (Color, Color), ctx: &ColorContext) -> BTEntry {
    let value = arena.get(id);
    let size = size_of_value(arena, id).unwrap_or(0);
    let (bg, fg) = ctx.resolve(offset, parent);

    let children = if value.is_struct() {
        struct_child_layout(arena, id)
            .into_iter()
            .map(|(member, rel_offset, _)| build_entry(arena, member, offset + rel_offset, (bg, fg), ctx))
            .collect()
    } else if value.is_union() {
        value
            .members
            .iter()
            .map(|&member| build_entry(arena, member, offset, (bg, fg), ctx))
            .collect()
    } else if value.is_array() {
        let mut child_offset = offset;
        let mut children = Vec::with_capacity(value.members.len());
        for &member in &value.members {
            let member_size = size_of_value(arena, member).unwrap_or(0);
            children.push(build_entry(arena, member, child_offset, (bg, fg), ctx));
            child_offset += member_size;
        }
        children
    } else {
        Vec::new()
    };

    BTEntry {
        name: value.id.clone(),
        type_name: value.type_name(),
        value: display_value(value, arena),
        location: Location { offset, size },
        endianness: endianness_label(ctx.endianness),
        fg_color: fg as u32,
        bg_color: bg as u32,
        children,
    }
}
