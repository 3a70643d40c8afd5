//! Statement execution: block scoping, control flow (`if`/`while`/`do
//! while`/`for`/`switch`), and the `Break`/`Continue`/`Return` signals
//! threaded through [`super::State`] rather than unwound as errors.

use crate::ast::{Block, Conditional, ForLoop, Stmt, Switch, WhileLoop};
use crate::error::Result;
use crate::reader::ByteSource;
use crate::scope::Declaration;
use crate::value::{CompareOp, Value};

use super::{Interpreter, State};

fn truthy(v: &Value) -> bool {
    v.scalar.is_truthy()
}

impl<S: ByteSource> Interpreter<S> {
    pub(crate) fn exec_block(&mut self, block: &Block) -> Result<()> {
        self.scopes.push();
        let outcome = self.exec_stmts(block);
        self.scopes.pop();
        outcome
    }

    pub(crate) fn exec_stmts(&mut self, stmts: &[Stmt]) -> Result<()> {
        for stmt in stmts {
            self.exec_stmt(stmt)?;
            if self.state != State::None {
                break;
            }
        }
        Ok(())
    }

    fn exec_stmt(&mut self, stmt: &Stmt) -> Result<()> {
        match stmt {
            Stmt::Expr(e) => {
                self.eval_expr(e)?;
                Ok(())
            }
            Stmt::VarDecl(v) => self.declare_variable(v),
            Stmt::TypeDecl(t) => self.declare_type(t),
            Stmt::FunctionDecl(f) => {
                self.scopes
                    .current_mut()
                    .declare(f.name.clone(), Declaration::Function(f.clone()));
                Ok(())
            }
            Stmt::Block(b) => self.exec_block(b),
            Stmt::If(cond) => self.exec_if(cond),
            Stmt::While(w) => self.exec_while(w),
            Stmt::DoWhile(w) => self.exec_do_while(w),
            Stmt::For(f) => self.exec_for(f),
            Stmt::Switch(sw) => self.exec_switch(sw),
            Stmt::Return(expr) => {
                let value = match expr {
                    Some(e) => self.eval_expr(e)?,
                    None => Value::null(""),
                };
                self.return_value = Some(value);
                self.state = State::Return;
                Ok(())
            }
            Stmt::Break => {
                self.state = State::Break;
                Ok(())
            }
            Stmt::Continue => {
                self.state = State::Continue;
                Ok(())
            }
        }
    }

    fn exec_if(&mut self, cond: &Conditional) -> Result<()> {
        let value = self.eval_expr(&cond.condition)?;
        if truthy(&value) {
            self.exec_block(&cond.then_block)
        } else if let Some(else_block) = &cond.else_block {
            self.exec_block(else_block)
        } else {
            Ok(())
        }
    }

    fn exec_while(&mut self, w: &WhileLoop) -> Result<()> {
        loop {
            let cond = self.eval_expr(&w.condition)?;
            if !truthy(&cond) {
                break;
            }
            self.exec_block(&w.body)?;
            match self.state {
                State::Break => {
                    self.state = State::None;
                    break;
                }
                State::Continue => self.state = State::None,
                State::Return | State::Error => break,
                State::None => {}
            }
        }
        Ok(())
    }

    fn exec_do_while(&mut self, w: &WhileLoop) -> Result<()> {
        loop {
            self.exec_block(&w.body)?;
            match self.state {
                State::Break => {
                    self.state = State::None;
                    break;
                }
                State::Continue => self.state = State::None,
                State::Return | State::Error => break,
                State::None => {}
            }
            let cond = self.eval_expr(&w.condition)?;
            if !truthy(&cond) {
                break;
            }
        }
        Ok(())
    }

    fn exec_for(&mut self, f: &ForLoop) -> Result<()> {
        self.scopes.push();
        let outcome = self.exec_for_inner(f);
        self.scopes.pop();
        outcome
    }

    fn exec_for_inner(&mut self, f: &ForLoop) -> Result<()> {
        if let Some(counter) = &f.counter {
            self.exec_stmt(counter)?;
        }
        loop {
            if let Some(cond) = &f.condition {
                let v = self.eval_expr(cond)?;
                if !truthy(&v) {
                    break;
                }
            }
            self.exec_block(&f.body)?;
            match self.state {
                State::Break => {
                    self.state = State::None;
                    break;
                }
                State::Continue => self.state = State::None,
                State::Return | State::Error => break,
                State::None => {}
            }
            if let Some(update) = &f.update {
                self.exec_stmt(update)?;
            }
        }
        Ok(())
    }

    /// Built fresh on every execution rather than cached, since spec.md's
    /// case values are constant expressions and re-evaluating them costs
    /// nothing observable (documented in DESIGN.md as the chosen tradeoff
    /// against the original's one-time case-table build).
    fn exec_switch(&mut self, sw: &Switch) -> Result<()> {
        let scrutinee = self.eval_expr(&sw.expr)?;
        self.scopes.push();
        let outcome = (|| -> Result<()> {
            let mut matched = None;
            for (i, case) in sw.cases.iter().enumerate() {
                if let Some(expr) = &case.value {
                    let cv = self.eval_expr(expr)?;
                    if scrutinee.compare(&cv, CompareOp::Eq)? {
                        matched = Some(i);
                        break;
                    }
                }
            }
            let start = matched.or_else(|| sw.cases.iter().position(|c| c.value.is_none()));
            if let Some(start) = start {
                for case in &sw.cases[start..] {
                    self.exec_stmts(&case.body)?;
                    if self.state != State::None {
                        break;
                    }
                }
            }
            Ok(())
        })();
        self.scopes.pop();
        outcome?;
        if self.state == State::Break {
            self.state = State::None;
        }
        Ok(())
    }
}
