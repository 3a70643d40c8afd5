//! Arithmetic, comparison, and assignment semantics for [`super::Value`].
//!
//! Mirrors `original_source/btvm/vm/vmvalue.cpp`'s operator overloads:
//! float contaminates to `f64`, otherwise everything operates on the 64-bit
//! integer storage and picks signed/unsigned by "either operand signed".

use super::{Scalar, Value, ValueKind};
use crate::error::{Result, VmError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Le,
    Ge,
    Lt,
    Gt,
}

/// Two values are compatible if both scalar, both compound with the same
/// `typedef` name, or their type tags are equal (spec.md §4.1).
pub fn compatible(a: &Value, b: &Value) -> bool {
    if a.is_scalar() && b.is_scalar() {
        return true;
    }
    if a.is_compound() && b.is_compound() {
        return a.type_name() == b.type_name();
    }
    a.kind == b.kind
}

fn require_compatible(a: &Value, b: &Value, op: &str) -> Result<()> {
    if compatible(a, b) {
        Ok(())
    } else {
        Err(VmError::ty(format!(
            "Cannot use '{op}' operator with '{}' and '{}'",
            a.type_name(),
            b.type_name()
        )))
    }
}

fn result_kind(a: &Value, b: &Value) -> ValueKind {
    if a.is_floating_point() || b.is_floating_point() {
        ValueKind::Double
    } else if a.is_signed() || b.is_signed() {
        ValueKind::S64
    } else {
        ValueKind::U64
    }
}

fn scalar_literal(kind: ValueKind, scalar: Scalar) -> Value {
    let mut v = Value::new(kind, "");
    v.scalar = scalar;
    v
}

fn require_integer_operands(a: &Value, b: &Value, op: &str) -> Result<()> {
    if !a.is_integer() || !b.is_integer() {
        return Err(VmError::ty(format!(
            "'{op}' requires integer operands, got '{}' and '{}'",
            a.type_name(),
            b.type_name()
        )));
    }
    Ok(())
}

impl Value {
    pub fn binary_add(&self, rhs: &Value) -> Result<Value> {
        require_compatible(self, rhs, "+")?;
        if self.is_string() && rhs.is_string() {
            let mut v = Value::new(ValueKind::String, "");
            v.string_buf = self.string_buf.clone();
            v.string_buf.extend_from_slice(&rhs.string_buf);
            return Ok(v);
        }
        let kind = result_kind(self, rhs);
        let scalar = match kind {
            ValueKind::Double => Scalar::Float(self.scalar.as_f64() + rhs.scalar.as_f64()),
            ValueKind::S64 => Scalar::Int(self.scalar.as_i64().wrapping_add(rhs.scalar.as_i64())),
            _ => Scalar::UInt(self.scalar.as_u64().wrapping_add(rhs.scalar.as_u64())),
        };
        Ok(scalar_literal(kind, scalar))
    }

    pub fn binary_sub(&self, rhs: &Value) -> Result<Value> {
        require_compatible(self, rhs, "-")?;
        let kind = result_kind(self, rhs);
        let scalar = match kind {
            ValueKind::Double => Scalar::Float(self.scalar.as_f64() - rhs.scalar.as_f64()),
            _ => Scalar::Int(self.scalar.as_i64().wrapping_sub(rhs.scalar.as_i64())),
        };
        Ok(scalar_literal(kind, scalar))
    }

    pub fn binary_mul(&self, rhs: &Value) -> Result<Value> {
        require_compatible(self, rhs, "*")?;
        let kind = result_kind(self, rhs);
        let scalar = match kind {
            ValueKind::Double => Scalar::Float(self.scalar.as_f64() * rhs.scalar.as_f64()),
            _ => Scalar::Int(self.scalar.as_i64().wrapping_mul(rhs.scalar.as_i64())),
        };
        Ok(scalar_literal(kind, scalar))
    }

    pub fn binary_div(&self, rhs: &Value) -> Result<Value> {
        require_compatible(self, rhs, "/")?;
        let kind = result_kind(self, rhs);
        if kind == ValueKind::Double {
            return Ok(scalar_literal(
                kind,
                Scalar::Float(self.scalar.as_f64() / rhs.scalar.as_f64()),
            ));
        }
        let divisor = rhs.scalar.as_i64();
        if divisor == 0 {
            return Err(VmError::ty("Division by zero"));
        }
        Ok(scalar_literal(kind, Scalar::Int(self.scalar.as_i64() / divisor)))
    }

    pub fn binary_rem(&self, rhs: &Value) -> Result<Value> {
        require_compatible(self, rhs, "%")?;
        require_integer_operands(self, rhs, "%")?;
        let divisor = rhs.scalar.as_i64();
        if divisor == 0 {
            return Err(VmError::ty("Division by zero"));
        }
        let kind = result_kind(self, rhs);
        Ok(scalar_literal(kind, Scalar::Int(self.scalar.as_i64() % divisor)))
    }

    pub fn binary_bitand(&self, rhs: &Value) -> Result<Value> {
        require_compatible(self, rhs, "&")?;
        require_integer_operands(self, rhs, "&")?;
        let kind = result_kind(self, rhs);
        Ok(scalar_literal(kind, Scalar::UInt(self.scalar.as_u64() & rhs.scalar.as_u64())))
    }

    pub fn binary_bitor(&self, rhs: &Value) -> Result<Value> {
        require_compatible(self, rhs, "|")?;
        require_integer_operands(self, rhs, "|")?;
        let kind = result_kind(self, rhs);
        Ok(scalar_literal(kind, Scalar::UInt(self.scalar.as_u64() | rhs.scalar.as_u64())))
    }

    pub fn binary_bitxor(&self, rhs: &Value) -> Result<Value> {
        require_compatible(self, rhs, "^")?;
        require_integer_operands(self, rhs, "^")?;
        let kind = result_kind(self, rhs);
        Ok(scalar_literal(kind, Scalar::UInt(self.scalar.as_u64() ^ rhs.scalar.as_u64())))
    }

    pub fn binary_shl(&self, rhs: &Value) -> Result<Value> {
        require_integer_operands(self, rhs, "<<")?;
        let shift = (rhs.scalar.as_u64() & 63) as u32;
        Ok(scalar_literal(self.kind, Scalar::UInt(self.scalar.as_u64() << shift)))
    }

    pub fn binary_shr(&self, rhs: &Value) -> Result<Value> {
        require_integer_operands(self, rhs, ">>")?;
        let shift = (rhs.scalar.as_u64() & 63) as u32;
        Ok(scalar_literal(self.kind, Scalar::UInt(self.scalar.as_u64() >> shift)))
    }

    pub fn logical_and(&self, rhs: &Value) -> Result<Value> {
        Ok(Value::literal_bool(self.scalar.is_truthy() && rhs.scalar.is_truthy()))
    }

    pub fn logical_or(&self, rhs: &Value) -> Result<Value> {
        Ok(Value::literal_bool(self.scalar.is_truthy() || rhs.scalar.is_truthy()))
    }

    pub fn compare(&self, rhs: &Value, op: CompareOp) -> Result<bool> {
        if self.is_string() && rhs.is_string() {
            let a = &self.string_buf[..self.display_len()];
            let b = &rhs.string_buf[..rhs.display_len()];
            return Ok(match op {
                CompareOp::Eq => a == b,
                CompareOp::Ne => a != b,
                CompareOp::Le => a <= b,
                CompareOp::Ge => a >= b,
                CompareOp::Lt => a < b,
                CompareOp::Gt => a > b,
            });
        }
        let signed = self.is_signed() || rhs.is_signed();
        let fp = self.is_floating_point() || rhs.is_floating_point();
        Ok(if fp {
            let (a, b) = (self.scalar.as_f64(), rhs.scalar.as_f64());
            match op {
                CompareOp::Eq => a == b,
                CompareOp::Ne => a != b,
                CompareOp::Le => a <= b,
                CompareOp::Ge => a >= b,
                CompareOp::Lt => a < b,
                CompareOp::Gt => a > b,
            }
        } else if signed {
            let (a, b) = (self.scalar.as_i64(), rhs.scalar.as_i64());
            match op {
                CompareOp::Eq => a == b,
                CompareOp::Ne => a != b,
                CompareOp::Le => a <= b,
                CompareOp::Ge => a >= b,
                CompareOp::Lt => a < b,
                CompareOp::Gt => a > b,
            }
        } else {
            let (a, b) = (self.scalar.as_u64(), rhs.scalar.as_u64());
            match op {
                CompareOp::Eq => a == b,
                CompareOp::Ne => a != b,
                CompareOp::Le => a <= b,
                CompareOp::Ge => a >= b,
                CompareOp::Lt => a < b,
                CompareOp::Gt => a > b,
            }
        })
    }

    /// Unary `-`; on an unsigned type this promotes to the signed type of
    /// the same width (spec.md §4.1).
    pub fn unary_neg(&self) -> Result<Value> {
        if !self.is_scalar() {
            return Err(VmError::ty(format!(
                "Cannot use unary operators on '{}' types",
                self.type_name()
            )));
        }
        if self.is_floating_point() {
            return Ok(scalar_literal(self.kind, Scalar::Float(-self.scalar.as_f64())));
        }
        let signed_kind = match self.kind {
            ValueKind::U8 => ValueKind::S8,
            ValueKind::U16 => ValueKind::S16,
            ValueKind::U32 => ValueKind::S32,
            ValueKind::U64 | ValueKind::Bool => ValueKind::S64,
            other => other,
        };
        Ok(scalar_literal(signed_kind, Scalar::Int(-self.scalar.as_i64())))
    }

    pub fn unary_not(&self) -> Result<Value> {
        Ok(Value::literal_bool(!self.scalar.is_truthy()))
    }

    /// `~`, masked to the operand's bit width (spec.md §4.1).
    pub fn unary_bitnot(&self) -> Result<Value> {
        if !self.is_integer() {
            return Err(VmError::ty(format!(
                "Cannot use '~' on '{}' type",
                self.type_name()
            )));
        }
        let raw = self.scalar.as_u64();
        let masked = match self.kind.byte_width() {
            Some(1) => !(raw as u8) as u64,
            Some(2) => !(raw as u16) as u64,
            Some(4) => !(raw as u32) as u64,
            _ => !raw,
        };
        Ok(scalar_literal(self.kind, Scalar::UInt(masked)))
    }

    pub fn increment(&mut self) -> Result<()> {
        if !self.is_scalar() {
            return Err(VmError::ty(format!(
                "Cannot use unary operators on '{}' types",
                self.type_name()
            )));
        }
        if self.is_floating_point() {
            self.scalar = Scalar::Float(self.scalar.as_f64() + 1.0);
        } else {
            self.scalar = Scalar::Int(self.scalar.as_i64().wrapping_add(1));
        }
        Ok(())
    }

    pub fn decrement(&mut self) -> Result<()> {
        if !self.is_scalar() {
            return Err(VmError::ty(format!(
                "Cannot use unary operators on '{}' types",
                self.type_name()
            )));
        }
        if self.is_floating_point() {
            self.scalar = Scalar::Float(self.scalar.as_f64() - 1.0);
        } else {
            self.scalar = Scalar::Int(self.scalar.as_i64().wrapping_sub(1));
        }
        Ok(())
    }

    /// Overwrites storage in place (spec.md §4.1 assignment semantics).
    /// Writing through a `Reference` is handled by the caller, which has
    /// arena access; this only updates `self`'s own scalar/string storage.
    pub fn assign_scalar_or_string(&mut self, rhs: &Value) -> Result<()> {
        require_compatible(self, rhs, "=")?;
        if rhs.is_string() {
            self.string_buf = rhs.string_buf.clone();
        } else if rhs.is_signed() {
            self.scalar = Scalar::Int(rhs.scalar.as_i64());
        } else if rhs.is_floating_point() {
            self.scalar = Scalar::Float(rhs.scalar.as_f64());
        } else {
            self.scalar = Scalar::UInt(rhs.scalar.as_u64());
        }
        Ok(())
    }
}

/// Widens/narrows `value` in place to the scalar kind `target`, numeric
/// conversion only (spec.md §4.4 `NCast`: "Integer<->float conversion is
/// numeric; compound-to-compound is allowed only when type-names match").
pub fn cast_scalar(value: &mut Value, target: ValueKind) -> Result<()> {
    if value.kind == target {
        return Ok(());
    }
    if !value.is_scalar() || !target.is_scalar() {
        return Err(VmError::ty(format!(
            "Cannot convert '{}' to '{}'",
            value.type_name(),
            target.name()
        )));
    }
    value.scalar = if target.is_floating_point() {
        Scalar::Float(value.scalar.as_f64())
    } else if target.is_signed() {
        Scalar::Int(value.scalar.as_i64())
    } else {
        Scalar::UInt(value.scalar.as_u64())
    };
    value.kind = target;
    Ok(())
}
