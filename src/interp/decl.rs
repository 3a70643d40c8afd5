//! Declaration and allocation: turns `VarDecl`/`TypeDeclStmt` AST nodes into
//! arena Values, driving the BinaryReader for template variables per
//! spec.md §4.4.

use std::rc::Rc;

use crate::ast::{BasicKind, CompoundDecl, EnumDecl, TypeDeclStmt, TypeNode, VarDecl};
use crate::error::{Result, VmError};
use crate::reader::ByteSource;
use crate::scope::Declaration;
use crate::value::{Scalar, TypeRef, Value, ValueFlags, ValueId, ValueKind};

use super::Interpreter;

/// Prefix the parser stamps on synthesized names for unnamed members (an
/// inline anonymous struct/union field). Grounded on
/// `original_source/btvm/vm/ast.h`'s `anonymous_type_prefix`.
const ANONYMOUS_PREFIX: &str = "__anonymous_";

fn is_anonymous(name: &str) -> bool {
    name.starts_with(ANONYMOUS_PREFIX)
}

pub(super) fn basic_to_kind(basic: BasicKind) -> ValueKind {
    match basic {
        BasicKind::Bool => ValueKind::Bool,
        BasicKind::U8 => ValueKind::U8,
        BasicKind::U16 => ValueKind::U16,
        BasicKind::U32 => ValueKind::U32,
        BasicKind::U64 => ValueKind::U64,
        BasicKind::S8 => ValueKind::S8,
        BasicKind::S16 => ValueKind::S16,
        BasicKind::S32 => ValueKind::S32,
        BasicKind::S64 => ValueKind::S64,
        BasicKind::Float => ValueKind::Float,
        BasicKind::Double => ValueKind::Double,
        BasicKind::Str => ValueKind::String,
    }
}

fn underlying_kind(ty: &TypeNode) -> ValueKind {
    match ty {
        TypeNode::Basic(b) => basic_to_kind(*b),
        _ => ValueKind::S32,
    }
}

impl<S: ByteSource> Interpreter<S> {
    /// Declares one variable: resolves its type, allocates storage, reads it
    /// from the file (unless `const`/`local`), and files it into the
    /// current scope plus either the enclosing compound's members or the
    /// top-level allocation list.
    pub(crate) fn declare_variable(&mut self, var: &VarDecl) -> Result<()> {
        if !is_anonymous(&var.name) && self.scopes.current_mut().variable(&var.name).is_some() {
            return Err(VmError::declaration(format!(
                "'{}' is already declared in this scope",
                var.name
            )));
        }

        let id = match &var.array_size {
            Some(size_expr) => {
                let count_value = self.eval_expr(size_expr)?;
                let count = count_value.scalar.as_i64();
                if count < 0 {
                    return Err(VmError::index("array size must be a non-negative integer"));
                }
                self.alloc_array(&var.name, &var.ty, count as usize)?
            }
            None => self.alloc_type(&var.name, &var.ty)?,
        };

        if var.is_const {
            self.arena.get_mut(id).flags.insert(ValueFlags::CONST);
        }
        if var.is_local {
            self.arena.get_mut(id).flags.insert(ValueFlags::LOCAL);
        }

        if let Some(bits_expr) = &var.bits {
            let n = self.eval_expr(bits_expr)?;
            let bits = n.scalar.as_i64();
            if bits < 0 {
                return Err(VmError::ty("bitfield width must be non-negative"));
            }
            self.arena.get_mut(id).bit_width = Some(bits as u32);
        }

        if !var.is_const && !var.is_local {
            let in_union = self
                .decl_stack
                .top()
                .map(|parent| self.arena.get(parent).is_union())
                .unwrap_or(false);
            self.read_template_variable(id, in_union)?;
        } else if let Some(init) = &var.init {
            let rhs = self.eval_expr(init)?;
            self.arena.get_mut(id).assign_scalar_or_string(&rhs)?;
        }

        if !is_anonymous(&var.name) {
            self.scopes.current_mut().bind(var.name.clone(), id);
        }

        match self.decl_stack.top() {
            Some(parent) => self.arena.get_mut(parent).members.push(id),
            // Only non-local, non-const template variables participate in
            // the top-level output tree (GLOSSARY: "Allocation").
            None if !var.is_const && !var.is_local => self.allocations.push(id),
            None => {}
        }

        Ok(())
    }

    pub(crate) fn declare_type(&mut self, decl: &TypeDeclStmt) -> Result<()> {
        match decl {
            TypeDeclStmt::Struct(d) => {
                if let Some(name) = &d.name {
                    self.scopes
                        .current_mut()
                        .declare(name.clone(), Declaration::Struct(d.clone()));
                }
                Ok(())
            }
            TypeDeclStmt::Union(d) => {
                if let Some(name) = &d.name {
                    self.scopes
                        .current_mut()
                        .declare(name.clone(), Declaration::Union(d.clone()));
                }
                Ok(())
            }
            TypeDeclStmt::Enum(d) => {
                if let Some(name) = &d.name {
                    self.scopes
                        .current_mut()
                        .declare(name.clone(), Declaration::Enum(d.clone()));
                }
                self.eval_enum_constants(d).map(|_| ())
            }
            TypeDeclStmt::Typedef { name, target } => {
                self.scopes
                    .current_mut()
                    .declare(name.clone(), Declaration::Typedef(target.clone()));
                self.declare_compound_tag(target);
                Ok(())
            }
        }
    }

    fn declare_compound_tag(&mut self, target: &TypeNode) {
        match target {
            TypeNode::Struct(d) if d.name.is_some() => {
                let name = d.name.clone().unwrap();
                self.scopes.current_mut().declare(name, Declaration::Struct(d.clone()));
            }
            TypeNode::Union(d) if d.name.is_some() => {
                let name = d.name.clone().unwrap();
                self.scopes.current_mut().declare(name, Declaration::Union(d.clone()));
            }
            TypeNode::Enum(d) if d.name.is_some() => {
                let name = d.name.clone().unwrap();
                self.scopes.current_mut().declare(name, Declaration::Enum(d.clone()));
            }
            _ => {}
        }
    }

    fn alloc_type(&mut self, name: &str, ty: &TypeNode) -> Result<ValueId> {
        match ty {
            TypeNode::Basic(basic) => Ok(self.arena.alloc(Value::new(basic_to_kind(*basic), name))),
            TypeNode::Named(ident) => {
                let decl = self
                    .scopes
                    .lookup_declaration(ident)
                    .cloned()
                    .ok_or_else(|| VmError::declaration(format!("Unknown type '{ident}'")))?;
                self.alloc_named_type(name, &decl)
            }
            TypeNode::Struct(decl) => self.alloc_compound(name, decl.clone(), false),
            TypeNode::Union(decl) => self.alloc_compound(name, decl.clone(), true),
            TypeNode::Enum(decl) => self.alloc_enum(name, decl.clone()),
        }
    }

    fn alloc_named_type(&mut self, name: &str, decl: &Declaration) -> Result<ValueId> {
        match decl {
            Declaration::Struct(d) => self.alloc_compound(name, d.clone(), false),
            Declaration::Union(d) => self.alloc_compound(name, d.clone(), true),
            Declaration::Enum(d) => self.alloc_enum(name, d.clone()),
            Declaration::Typedef(target) => self.alloc_type(name, target),
            Declaration::Function(_) => Err(VmError::ty(format!("'{name}' does not name a type"))),
        }
    }

    fn alloc_array(&mut self, name: &str, element_ty: &TypeNode, count: usize) -> Result<ValueId> {
        let id = self.arena.alloc(Value::new(ValueKind::Array, name));
        for i in 0..count {
            let elem_id = self.alloc_type(&i.to_string(), element_ty)?;
            self.arena.get_mut(id).members.push(elem_id);
        }
        Ok(id)
    }

    fn alloc_compound(&mut self, name: &str, decl: Rc<CompoundDecl>, is_union: bool) -> Result<ValueId> {
        let kind = if is_union { ValueKind::Union } else { ValueKind::Struct };
        let mut v = Value::new(kind, name);
        v.typedef = Some(if is_union {
            TypeRef::Union(decl.clone())
        } else {
            TypeRef::Struct(decl.clone())
        });
        let id = self.arena.alloc(v);

        if let Some(tag) = &decl.name {
            let registered = if is_union {
                Declaration::Union(decl.clone())
            } else {
                Declaration::Struct(decl.clone())
            };
            self.scopes.current_mut().declare(tag.clone(), registered);
        }

        let union_start = if is_union { Some(self.reader.offset()) } else { None };

        self.decl_stack.push(id);
        self.scopes.push();
        let outcome = (|| -> Result<()> {
            for member in &decl.members {
                self.declare_variable(member)?;
                if self.state != super::State::None {
                    break;
                }
            }
            Ok(())
        })();
        self.scopes.pop();
        self.decl_stack.pop();
        outcome?;

        if let Some(start) = union_start {
            let size = super::size::size_of_value(&self.arena, id)?;
            self.reader.seek(start + size);
        }

        Ok(id)
    }

    fn alloc_enum(&mut self, name: &str, decl: Rc<EnumDecl>) -> Result<ValueId> {
        let mut v = Value::new(ValueKind::Enum, name);
        v.typedef = Some(TypeRef::Enum(decl.clone()));
        let id = self.arena.alloc(v);

        let members = self.eval_enum_constants(&decl)?;
        self.arena.get_mut(id).members = members;

        Ok(id)
    }

    /// Evaluates and (re)binds each enum member as a `const` Value in the
    /// current scope, per spec.md §4.4's auto-increment rule. Returns the
    /// ordered constant ids so the caller can stash them on an enum Value's
    /// `members` for label lookup at display time. Idempotent: rebinding the
    /// same constants twice (once from a bare `enum E {...};` and again
    /// while allocating a variable of type `E`) produces identical values.
    fn eval_enum_constants(&mut self, decl: &Rc<EnumDecl>) -> Result<Vec<ValueId>> {
        let kind = underlying_kind(&decl.underlying);
        let mut prev: i64 = -1;
        let mut ids = Vec::with_capacity(decl.members.len());
        for (member_name, init) in &decl.members {
            let raw = match init {
                Some(expr) => self.eval_expr(expr)?.scalar.as_i64(),
                None => prev + 1,
            };
            prev = raw;

            let mut cv = Value::new(kind, member_name.clone());
            cv.typedef = Some(TypeRef::Enum(decl.clone()));
            cv.flags.insert(ValueFlags::CONST);
            cv.scalar = if kind.is_signed() {
                Scalar::Int(raw)
            } else {
                Scalar::UInt(raw as u64)
            };
            let cid = self.arena.alloc(cv);
            self.scopes.current_mut().bind(member_name.clone(), cid);
            ids.push(cid);
        }
        Ok(ids)
    }

    /// Reads a just-allocated template variable from the file, per
    /// spec.md §4.2/§4.4. Struct/Union members are already fully populated
    /// by [`Self::alloc_compound`]'s own per-member recursion by the time
    /// this runs, so those kinds (and arrays of them) are a no-op here.
    fn read_template_variable(&mut self, id: ValueId, in_union: bool) -> Result<()> {
        match self.arena.get(id).kind {
            ValueKind::Struct | ValueKind::Union => Ok(()),
            ValueKind::Array => {
                let already_read = self
                    .arena
                    .get(id)
                    .members
                    .first()
                    .map(|&m| matches!(self.arena.get(m).kind, ValueKind::Struct | ValueKind::Union))
                    .unwrap_or(false);
                if already_read {
                    Ok(())
                } else {
                    self.read_leaf_or_array(id, in_union)
                }
            }
            _ => self.read_leaf_or_array(id, in_union),
        }
    }

    fn read_leaf_or_array(&mut self, id: ValueId, in_union: bool) -> Result<()> {
        let size = super::size::size_of_value(&self.arena, id)?;
        if in_union {
            let mut guard = self.reader.no_seek();
            guard.reader().read_into(&mut self.arena, id, size)
        } else {
            self.reader.read_into(&mut self.arena, id, size)
        }
    }
}
