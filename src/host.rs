//! Host function registry: name → `(interpreter, call) -> Value` (spec.md
//! §4.6/§6). Bodies are intentionally trivial per spec — the registry and
//! calling convention are the specified part.

use std::collections::HashMap;

use crate::ast::Call;
use crate::error::{Result, VmError};
use crate::interp::Interpreter;
use crate::reader::ByteSource;
use crate::value::{Color, Value};

pub type HostFn<S> = fn(&mut Interpreter<S>, &Call) -> Result<Option<Value>>;

pub struct HostRegistry<S> {
    functions: HashMap<&'static str, HostFn<S>>,
}

impl<S: ByteSource> HostRegistry<S> {
    pub fn standard() -> Self {
        let mut functions: HashMap<&'static str, HostFn<S>> = HashMap::new();
        functions.insert("Printf", printf as HostFn<S>);
        functions.insert("Warning", warning as HostFn<S>);
        functions.insert("SetBackColor", set_back_color as HostFn<S>);
        functions.insert("SetForeColor", set_fore_color as HostFn<S>);
        functions.insert("LittleEndian", little_endian as HostFn<S>);
        functions.insert("BigEndian", big_endian as HostFn<S>);
        functions.insert("FTell", ftell as HostFn<S>);
        functions.insert("FEof", feof as HostFn<S>);
        functions.insert("FileSize", file_size as HostFn<S>);
        functions.insert("FSeek", fseek as HostFn<S>);
        functions.insert("ReadBytes", read_bytes as HostFn<S>);
        functions.insert("ReadUInt", read_uint as HostFn<S>);
        functions.insert("Ceil", ceil as HostFn<S>);
        HostRegistry { functions }
    }

    pub fn get(&self, name: &str) -> Option<HostFn<S>> {
        self.functions.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }
}

fn require_arity(call: &Call, min: usize, max: usize) -> Result<()> {
    let n = call.args.len();
    if n < min || n > max {
        return Err(VmError::argument(format!(
            "'{}' expects {} argument(s), got {}",
            call.name,
            if min == max {
                format!("{min}")
            } else {
                format!("{min}..={max}")
            },
            n
        )));
    }
    Ok(())
}

fn printf<S: ByteSource>(interp: &mut Interpreter<S>, call: &Call) -> Result<Option<Value>> {
    if call.args.is_empty() {
        return Err(VmError::argument("'Printf' expects at least 1 argument"));
    }
    let fmt = interp.eval_expr(&call.args[0])?;
    let fmt = fmt.to_display_string()?;
    let mut args = Vec::with_capacity(call.args.len() - 1);
    for arg in &call.args[1..] {
        args.push(interp.eval_expr(arg)?);
    }
    let rendered = crate::host::format_printf(&fmt, &args)?;
    interp.write_output(&rendered);
    Ok(None)
}

fn warning<S: ByteSource>(interp: &mut Interpreter<S>, call: &Call) -> Result<Option<Value>> {
    interp.write_output("WARNING: ");
    printf(interp, call)
}

fn set_back_color<S: ByteSource>(interp: &mut Interpreter<S>, call: &Call) -> Result<Option<Value>> {
    require_arity(call, 1, 1)?;
    let color = resolve_color(interp, &call.args[0])?;
    let offset = interp.reader().offset();
    interp.set_back_color(offset, color);
    Ok(None)
}

fn set_fore_color<S: ByteSource>(interp: &mut Interpreter<S>, call: &Call) -> Result<Option<Value>> {
    require_arity(call, 1, 1)?;
    let color = resolve_color(interp, &call.args[0])?;
    let offset = interp.reader().offset();
    interp.set_fore_color(offset, color);
    Ok(None)
}

fn resolve_color<S: ByteSource>(interp: &mut Interpreter<S>, expr: &crate::ast::Expr) -> Result<Color> {
    let v = interp.eval_expr(expr)?;
    let raw = v.scalar.as_u64() as u32;
    Color::try_from(raw).map_err(|_| VmError::argument(format!("unrecognized color id 0x{raw:08X}")))
}

fn little_endian<S: ByteSource>(interp: &mut Interpreter<S>, call: &Call) -> Result<Option<Value>> {
    require_arity(call, 0, 0)?;
    interp.reader_mut().set_little_endian();
    Ok(None)
}

fn big_endian<S: ByteSource>(interp: &mut Interpreter<S>, call: &Call) -> Result<Option<Value>> {
    require_arity(call, 0, 0)?;
    interp.reader_mut().set_big_endian();
    Ok(None)
}

fn ftell<S: ByteSource>(interp: &mut Interpreter<S>, call: &Call) -> Result<Option<Value>> {
    require_arity(call, 0, 0)?;
    Ok(Some(Value::literal_int(interp.reader().offset())))
}

fn feof<S: ByteSource>(interp: &mut Interpreter<S>, call: &Call) -> Result<Option<Value>> {
    require_arity(call, 0, 0)?;
    Ok(Some(Value::literal_bool(interp.reader().at_eof())))
}

fn file_size<S: ByteSource>(interp: &mut Interpreter<S>, call: &Call) -> Result<Option<Value>> {
    require_arity(call, 0, 0)?;
    Ok(Some(Value::literal_int(interp.reader().size())))
}

fn fseek<S: ByteSource>(interp: &mut Interpreter<S>, call: &Call) -> Result<Option<Value>> {
    require_arity(call, 1, 1)?;
    let off = interp.eval_expr(&call.args[0])?.scalar.as_u64();
    if off >= interp.reader().size() {
        return Ok(Some(Value::literal_signed(-1)));
    }
    interp.reader_mut().seek(off);
    Ok(Some(Value::literal_signed(0)))
}

fn read_bytes<S: ByteSource>(interp: &mut Interpreter<S>, call: &Call) -> Result<Option<Value>> {
    require_arity(call, 3, 3)?;
    let dest = interp.eval_lvalue(&call.args[0])?;
    let off = interp.eval_expr(&call.args[1])?.scalar.as_u64();
    let n = interp.eval_expr(&call.args[2])?.scalar.as_u64();
    interp.peek_read(off, dest, n)?;
    Ok(None)
}

fn read_uint<S: ByteSource>(interp: &mut Interpreter<S>, call: &Call) -> Result<Option<Value>> {
    require_arity(call, 0, 1)?;
    let off = if call.args.is_empty() {
        interp.reader().offset()
    } else {
        interp.eval_expr(&call.args[0])?.scalar.as_u64()
    };
    let id = interp
        .arena_mut()
        .alloc(crate::value::Value::new(crate::value::ValueKind::U32, ""));
    interp.peek_read(off, id, 4)?;
    let raw = interp.arena().get(id).scalar.as_u64() as u32;
    Ok(Some(Value::literal_int(raw as u64)))
}

fn ceil<S: ByteSource>(interp: &mut Interpreter<S>, call: &Call) -> Result<Option<Value>> {
    require_arity(call, 1, 1)?;
    let v = interp.eval_expr(&call.args[0])?;
    if !v.is_floating_point() {
        return Err(VmError::ty(format!(
            "'Ceil' expects a float argument, got '{}'",
            v.type_name()
        )));
    }
    Ok(Some(Value::literal_real(v.scalar.as_f64().ceil())))
}

/// Renders a `Printf`-family format string against already-evaluated
/// argument Values, per spec.md §6's specifier grammar.
pub fn format_printf(fmt: &str, args: &[Value]) -> Result<String> {
    let mut out = String::new();
    let mut chars = fmt.chars().peekable();
    let mut arg_iter = args.iter();

    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('"') => out.push('"'),
                Some('t') => out.push('\t'),
                Some('r') => out.push('\r'),
                Some('n') => out.push('\n'),
                Some(other) => out.push(other),
                None => {}
            }
            continue;
        }
        if c != '%' {
            out.push(c);
            continue;
        }

        // Skip width/precision/flags: '-', digits, '.'.
        while matches!(chars.peek(), Some('-') | Some('.') | Some('0'..='9')) {
            chars.next();
        }
        // Optional 'L' (64-bit) or 'l' (long, used only as "lf") prefix.
        let mut long64 = false;
        if chars.peek() == Some(&'L') {
            long64 = true;
            chars.next();
        } else if chars.peek() == Some(&'l') {
            chars.next();
        }

        let spec = chars.next().ok_or_else(|| {
            VmError::argument("Printf: dangling '%' at end of format string")
        })?;

        let value = arg_iter
            .next()
            .ok_or_else(|| VmError::argument("Printf: not enough arguments for format string"))?;

        match spec {
            'd' | 'i' => {
                let v = value.scalar.as_i64();
                out.push_str(&v.to_string());
            }
            'u' => {
                let v = if long64 {
                    value.scalar.as_u64()
                } else {
                    value.scalar.as_u64() & 0xFFFF_FFFF
                };
                out.push_str(&v.to_string());
            }
            'x' => out.push_str(&format!("{:x}", mask_width(value.scalar.as_u64(), long64))),
            'X' => out.push_str(&format!("{:X}", mask_width(value.scalar.as_u64(), long64))),
            'o' => out.push_str(&format!("{:o}", mask_width(value.scalar.as_u64(), long64))),
            'c' => {
                let b = value.scalar.as_u64() as u8 as char;
                out.push(b);
            }
            's' => out.push_str(&value.to_display_string()?),
            'f' | 'e' | 'g' => out.push_str(&format!("{}", value.scalar.as_f64())),
            other => {
                return Err(VmError::argument(format!(
                    "Printf: unrecognized format specifier '%{other}'"
                )))
            }
        }
    }
    Ok(out)
}

fn mask_width(v: u64, long64: bool) -> u64 {
    if long64 {
        v
    } else {
        v & 0xFFFF_FFFF
    }
}
