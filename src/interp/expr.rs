//! Expression evaluation: arithmetic/comparison dispatch to
//! [`crate::value::ops`], identifier/member/index resolution against the
//! arena, host/user function calls, casts, and `sizeof` (spec.md §4.4).

use crate::ast::{BinaryOp, Call, Expr, SizeOfTarget, TypeNode, UnaryOp};
use crate::error::{Result, VmError};
use crate::reader::ByteSource;
use crate::scope::Declaration;
use crate::value::{Reference, Scalar, Value, ValueFlags, ValueId, ValueKind};

use super::Interpreter;

fn map_compare_op(op: crate::ast::CompareOp) -> crate::value::CompareOp {
    use crate::ast::CompareOp as A;
    use crate::value::CompareOp as V;
    match op {
        A::Eq => V::Eq,
        A::Ne => V::Ne,
        A::Le => V::Le,
        A::Ge => V::Ge,
        A::Lt => V::Lt,
        A::Gt => V::Gt,
    }
}

impl<S: ByteSource> Interpreter<S> {
    pub(crate) fn eval_expr(&mut self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Bool(b) => Ok(Value::literal_bool(*b)),
            Expr::Int(n) => Ok(Value::literal_int(*n)),
            Expr::Real(f) => Ok(Value::literal_real(*f)),
            Expr::Str(s) => Ok(Value::literal_string(s)),
            Expr::Ident(_) | Expr::Dot { .. } => {
                let id = self.eval_lvalue(expr)?;
                Ok(self.arena.get(id).clone())
            }
            Expr::Unary { op, expr: inner } => self.eval_unary(*op, inner),
            Expr::Binary { op, left, right } => self.eval_binary(*op, left, right),
            Expr::Compare { op, left, right } => {
                let l = self.eval_expr(left)?;
                let r = self.eval_expr(right)?;
                Ok(Value::literal_bool(l.compare(&r, map_compare_op(*op))?))
            }
            Expr::Index { expr: base, index } => self.eval_index(base, index),
            Expr::Call(call) => self.eval_call(call),
            Expr::Cast { ty, expr: inner } => self.eval_cast(ty, inner),
            Expr::SizeOf(target) => self.eval_sizeof(target),
        }
    }

    /// Resolves an identifier/member/array-index chain to the arena slot it
    /// names, for assignment and by-reference function arguments. String
    /// indexing is deliberately excluded (it yields a byte `Reference`, not
    /// a `ValueId`); assignment through it is handled directly in
    /// [`Self::do_assign`].
    pub(crate) fn eval_lvalue(&mut self, expr: &Expr) -> Result<ValueId> {
        match expr {
            Expr::Ident(name) => self
                .scopes
                .lookup_variable(name)
                .ok_or_else(|| VmError::declaration(format!("Unknown identifier '{name}'"))),
            Expr::Dot { left, field } => {
                let base = self.eval_lvalue(left)?;
                let base_val = self.arena.get(base);
                base_val.find_member(&self.arena, field).ok_or_else(|| {
                    VmError::declaration(format!(
                        "'{field}' is not a member of '{}'",
                        base_val.type_name()
                    ))
                })
            }
            Expr::Index { expr: base, index } => {
                let base_id = self.eval_lvalue(base)?;
                let idx = self.eval_expr(index)?.scalar.as_i64();
                if idx < 0 {
                    return Err(VmError::index("index must be non-negative"));
                }
                let idx = idx as usize;
                let base_val = self.arena.get(base_id);
                if base_val.is_array() {
                    base_val
                        .members
                        .get(idx)
                        .copied()
                        .ok_or_else(|| VmError::index(format!("index {idx} out of range")))
                } else {
                    Err(VmError::ty(format!(
                        "cannot use '{}' as an assignment target here",
                        base_val.type_name()
                    )))
                }
            }
            _ => Err(VmError::ty("expression is not assignable")),
        }
    }

    fn eval_index(&mut self, base: &Expr, index: &Expr) -> Result<Value> {
        let base_id = self.eval_lvalue(base)?;
        let idx = self.eval_expr(index)?.scalar.as_i64();
        if idx < 0 {
            return Err(VmError::index("index must be non-negative"));
        }
        let idx = idx as usize;
        let base_val = self.arena.get(base_id);
        if base_val.is_array() {
            let elem = base_val
                .members
                .get(idx)
                .copied()
                .ok_or_else(|| VmError::index(format!("index {idx} out of range")))?;
            Ok(self.arena.get(elem).clone())
        } else if base_val.is_string() {
            let byte = *base_val
                .string_buf
                .get(idx)
                .ok_or_else(|| VmError::index(format!("string index {idx} out of range")))?;
            let mut v = Value::new(ValueKind::U8, "");
            v.scalar = Scalar::UInt(byte as u64);
            v.flags.insert(ValueFlags::REFERENCE);
            v.reference = Some(Reference {
                target: base_id,
                byte_offset: idx,
            });
            Ok(v)
        } else {
            Err(VmError::ty(format!("cannot index '{}'", base_val.type_name())))
        }
    }

    fn eval_unary(&mut self, op: UnaryOp, inner: &Expr) -> Result<Value> {
        match op {
            UnaryOp::Neg => self.eval_expr(inner)?.unary_neg(),
            UnaryOp::Not => self.eval_expr(inner)?.unary_not(),
            UnaryOp::BitNot => self.eval_expr(inner)?.unary_bitnot(),
            UnaryOp::PreInc => {
                let id = self.eval_lvalue(inner)?;
                self.arena.get_mut(id).increment()?;
                Ok(self.arena.get(id).clone())
            }
            UnaryOp::PreDec => {
                let id = self.eval_lvalue(inner)?;
                self.arena.get_mut(id).decrement()?;
                Ok(self.arena.get(id).clone())
            }
            UnaryOp::PostInc => {
                let id = self.eval_lvalue(inner)?;
                let before = self.arena.get(id).clone();
                self.arena.get_mut(id).increment()?;
                Ok(before)
            }
            UnaryOp::PostDec => {
                let id = self.eval_lvalue(inner)?;
                let before = self.arena.get(id).clone();
                self.arena.get_mut(id).decrement()?;
                Ok(before)
            }
        }
    }

    fn eval_binary(&mut self, op: BinaryOp, left: &Expr, right: &Expr) -> Result<Value> {
        use BinaryOp::*;
        match op {
            Assign => {
                let rhs = self.eval_expr(right)?;
                self.do_assign(left, rhs)
            }
            AddAssign | SubAssign | MulAssign | DivAssign | BitAndAssign | BitOrAssign
            | BitXorAssign | ShlAssign | ShrAssign => {
                let current = self.eval_expr(left)?;
                let rhs = self.eval_expr(right)?;
                let combined = match op {
                    AddAssign => current.binary_add(&rhs)?,
                    SubAssign => current.binary_sub(&rhs)?,
                    MulAssign => current.binary_mul(&rhs)?,
                    DivAssign => current.binary_div(&rhs)?,
                    BitAndAssign => current.binary_bitand(&rhs)?,
                    BitOrAssign => current.binary_bitor(&rhs)?,
                    BitXorAssign => current.binary_bitxor(&rhs)?,
                    ShlAssign => current.binary_shl(&rhs)?,
                    ShrAssign => current.binary_shr(&rhs)?,
                    _ => unreachable!(),
                };
                self.do_assign(left, combined)
            }
            LogAnd => {
                let l = self.eval_expr(left)?;
                let r = self.eval_expr(right)?;
                l.logical_and(&r)
            }
            LogOr => {
                let l = self.eval_expr(left)?;
                let r = self.eval_expr(right)?;
                l.logical_or(&r)
            }
            Add => self.eval_expr(left)?.binary_add(&self.eval_expr(right)?),
            Sub => self.eval_expr(left)?.binary_sub(&self.eval_expr(right)?),
            Mul => self.eval_expr(left)?.binary_mul(&self.eval_expr(right)?),
            Div => self.eval_expr(left)?.binary_div(&self.eval_expr(right)?),
            Rem => self.eval_expr(left)?.binary_rem(&self.eval_expr(right)?),
            BitAnd => self.eval_expr(left)?.binary_bitand(&self.eval_expr(right)?),
            BitOr => self.eval_expr(left)?.binary_bitor(&self.eval_expr(right)?),
            BitXor => self.eval_expr(left)?.binary_bitxor(&self.eval_expr(right)?),
            Shl => self.eval_expr(left)?.binary_shl(&self.eval_expr(right)?),
            Shr => self.eval_expr(left)?.binary_shr(&self.eval_expr(right)?),
        }
    }

    /// Writes `rhs` into the slot `lhs` names and returns the assigned
    /// value, so assignment can itself be used as a subexpression.
    fn do_assign(&mut self, lhs: &Expr, rhs: Value) -> Result<Value> {
        if let Expr::Index { expr: base, index } = lhs {
            let base_id = self.eval_lvalue(base)?;
            if self.arena.get(base_id).is_string() {
                let idx = self.eval_expr(index)?.scalar.as_i64();
                if idx < 0 {
                    return Err(VmError::index("string index must be non-negative"));
                }
                let idx = idx as usize;
                let byte = rhs.scalar.as_u64() as u8;
                let buf = &mut self.arena.get_mut(base_id).string_buf;
                if idx >= buf.len() {
                    return Err(VmError::index(format!("string index {idx} out of range")));
                }
                buf[idx] = byte;
                return Ok(rhs);
            }
        }
        let id = self.eval_lvalue(lhs)?;
        self.arena.get_mut(id).assign_scalar_or_string(&rhs)?;
        Ok(self.arena.get(id).clone())
    }

    fn eval_call(&mut self, call: &Call) -> Result<Value> {
        if let Some(f) = self.hosts.get(&call.name) {
            return Ok(f(self, call)?.unwrap_or_else(|| Value::null("")));
        }
        self.call_user_function(call)
    }

    fn call_user_function(&mut self, call: &Call) -> Result<Value> {
        let decl = match self.scopes.lookup_declaration(&call.name).cloned() {
            Some(Declaration::Function(f)) => f,
            Some(_) => return Err(VmError::ty(format!("'{}' is not callable", call.name))),
            None => {
                return Err(VmError::declaration(format!(
                    "Unknown function '{}'",
                    call.name
                )))
            }
        };
        if call.args.len() != decl.params.len() {
            return Err(VmError::argument(format!(
                "'{}' expects {} argument(s), got {}",
                decl.name,
                decl.params.len(),
                call.args.len()
            )));
        }

        let mut bindings = Vec::with_capacity(decl.params.len());
        for (param, arg_expr) in decl.params.iter().zip(&call.args) {
            let id = if param.by_reference {
                self.eval_lvalue(arg_expr)?
            } else {
                let mut value = self.eval_expr(arg_expr)?;
                if value.is_scalar() {
                    if let TypeNode::Basic(basic) = &param.ty {
                        let _ = crate::value::cast_scalar(&mut value, super::decl::basic_to_kind(*basic));
                    }
                }
                self.arena.alloc(value)
            };
            bindings.push((param.name.clone(), id));
        }

        self.scopes.push();
        for (name, id) in bindings {
            self.scopes.current_mut().bind(name, id);
        }
        let outcome = self.exec_stmts(&decl.body);
        self.scopes.pop();
        outcome?;

        let result = self.return_value.take().unwrap_or_else(|| Value::null(""));
        if self.state == super::State::Return {
            self.state = super::State::None;
        }
        Ok(result)
    }

    fn eval_cast(&mut self, ty: &TypeNode, inner: &Expr) -> Result<Value> {
        let mut value = self.eval_expr(inner)?;
        match ty {
            TypeNode::Basic(basic) => {
                crate::value::cast_scalar(&mut value, super::decl::basic_to_kind(*basic))?;
                Ok(value)
            }
            TypeNode::Named(n) => {
                if value.type_name() == *n {
                    Ok(value)
                } else {
                    Err(VmError::ty(format!("Cannot cast '{}' to '{n}'", value.type_name())))
                }
            }
            TypeNode::Struct(d) | TypeNode::Union(d) => {
                let target_name = d.name.clone().unwrap_or_default();
                if value.type_name() == target_name {
                    Ok(value)
                } else {
                    Err(VmError::ty(format!(
                        "Cannot cast '{}' to '{target_name}'",
                        value.type_name()
                    )))
                }
            }
            TypeNode::Enum(d) => {
                let target_name = d.name.clone().unwrap_or_default();
                if value.type_name() == target_name {
                    Ok(value)
                } else {
                    Err(VmError::ty(format!(
                        "Cannot cast '{}' to '{target_name}'",
                        value.type_name()
                    )))
                }
            }
        }
    }

    fn eval_sizeof(&mut self, target: &SizeOfTarget) -> Result<Value> {
        let size = match target {
            SizeOfTarget::Type(ty) => self.sizeof_type(ty)?,
            SizeOfTarget::Ident(name) => {
                if let Some(id) = self.scopes.lookup_variable(name) {
                    super::size::size_of_value(&self.arena, id)?
                } else if let Some(decl) = self.scopes.lookup_declaration(name).cloned() {
                    self.sizeof_declaration(&decl)?
                } else {
                    return Err(VmError::declaration(format!("Unknown identifier '{name}'")));
                }
            }
            SizeOfTarget::Expr(expr) => {
                let value = self.eval_expr(expr)?;
                let id = self.arena.alloc(value);
                super::size::size_of_value(&self.arena, id)?
            }
        };
        Ok(Value::literal_int(size))
    }

    fn sizeof_type(&mut self, ty: &TypeNode) -> Result<u64> {
        match ty {
            TypeNode::Named(name) => {
                let decl = self
                    .scopes
                    .lookup_declaration(name)
                    .cloned()
                    .ok_or_else(|| VmError::declaration(format!("Unknown type '{name}'")))?;
                self.sizeof_declaration(&decl)
            }
            _ => Ok(super::size::type_node_byte_width(ty)),
        }
    }

    fn sizeof_declaration(&mut self, decl: &Declaration) -> Result<u64> {
        match decl {
            Declaration::Typedef(target) => self.sizeof_type(target),
            Declaration::Struct(d) => Ok(super::size::type_node_byte_width(&TypeNode::Struct(d.clone()))),
            Declaration::Union(d) => Ok(super::size::type_node_byte_width(&TypeNode::Union(d.clone()))),
            Declaration::Enum(d) => Ok(super::size::type_node_byte_width(&d.underlying)),
            Declaration::Function(_) => Err(VmError::ty("sizeof: not a type")),
        }
    }
}
