//! Minimal recursive-descent parser producing the [`crate::ast`] tree the
//! interpreter consumes (SPEC_FULL.md §8). Deliberately small: it covers the
//! surface grammar needed for spec.md's worked scenarios and general
//! template syntax, not every corner of the original BTVM grammar.

mod lexer;

use std::rc::Rc;

use lexer::{Lexer, Tok, Token};

use crate::ast::{
    BasicKind, BinaryOp, Block, Call, Case, CompareOp, CompoundDecl, Conditional, EnumDecl,
    Expr, ForLoop, FunctionDecl, Param, SizeOfTarget, Stmt, Switch, TypeDeclStmt, TypeNode,
    UnaryOp, VarDecl, WhileLoop,
};
use crate::error::{Result, VmError};

pub fn parse(source: &str) -> Result<Block> {
    let tokens = Lexer::new(source).tokenize()?;
    let mut p = Parser { tokens, pos: 0 };
    let block = p.parse_stmts_until_eof()?;
    Ok(block)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn cur(&self) -> &Tok {
        &self.tokens[self.pos].tok
    }

    fn cur_line(&self) -> u32 {
        self.tokens[self.pos].line
    }

    fn peek_at(&self, n: usize) -> &Tok {
        self.tokens
            .get(self.pos + n)
            .map(|t| &t.tok)
            .unwrap_or(&Tok::Eof)
    }

    fn bump(&mut self) -> Tok {
        let t = self.tokens[self.pos].tok.clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        t
    }

    fn err_here(&self) -> VmError {
        VmError::Syntax {
            token: format!("{:?}", self.cur()),
            line: self.cur_line(),
        }
    }

    fn expect(&mut self, tok: Tok) -> Result<()> {
        if *self.cur() == tok {
            self.bump();
            Ok(())
        } else {
            Err(self.err_here())
        }
    }

    fn expect_ident(&mut self) -> Result<String> {
        match self.bump() {
            Tok::Ident(s) => Ok(s),
            other => Err(VmError::Syntax {
                token: format!("{other:?}"),
                line: self.cur_line(),
            }),
        }
    }

    fn parse_stmts_until_eof(&mut self) -> Result<Block> {
        let mut stmts = Vec::new();
        while *self.cur() != Tok::Eof {
            stmts.push(self.parse_stmt()?);
        }
        Ok(stmts)
    }

    fn parse_block(&mut self) -> Result<Block> {
        self.expect(Tok::LBrace)?;
        let mut stmts = Vec::new();
        while *self.cur() != Tok::RBrace {
            stmts.push(self.parse_stmt()?);
        }
        self.expect(Tok::RBrace)?;
        Ok(stmts)
    }

    fn basic_from_tok(tok: &Tok) -> Option<BasicKind> {
        Some(match tok {
            Tok::Bool => BasicKind::Bool,
            Tok::Uint8 => BasicKind::U8,
            Tok::Uint16 => BasicKind::U16,
            Tok::Uint32 => BasicKind::U32,
            Tok::Uint64 => BasicKind::U64,
            Tok::Int8 => BasicKind::S8,
            Tok::Int16 => BasicKind::S16,
            Tok::Int32 => BasicKind::S32,
            Tok::Int64 => BasicKind::S64,
            Tok::Float => BasicKind::Float,
            Tok::Double => BasicKind::Double,
            Tok::StringTy => BasicKind::Str,
            _ => return None,
        })
    }

    fn starts_basic_type(&self) -> bool {
        Self::basic_from_tok(self.cur()).is_some()
    }

    /// A statement beginning with a bare identifier is a variable
    /// declaration of a previously-declared named type exactly when the
    /// identifier is immediately followed by another identifier (the
    /// variable's name) — `Foo bar;` — as opposed to an expression
    /// statement like `bar = 1;` or a call `bar();`.
    fn looks_like_named_type_decl(&self) -> bool {
        matches!(self.cur(), Tok::Ident(_)) && matches!(self.peek_at(1), Tok::Ident(_))
    }

    fn parse_stmt(&mut self) -> Result<Stmt> {
        match self.cur().clone() {
            Tok::LBrace => Ok(Stmt::Block(self.parse_block()?)),
            Tok::If => self.parse_if(),
            Tok::While => self.parse_while(),
            Tok::Do => self.parse_do_while(),
            Tok::For => self.parse_for(),
            Tok::Switch => self.parse_switch(),
            Tok::Return => {
                self.bump();
                let expr = if *self.cur() == Tok::Semi {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                self.expect(Tok::Semi)?;
                Ok(Stmt::Return(expr))
            }
            Tok::Break => {
                self.bump();
                self.expect(Tok::Semi)?;
                Ok(Stmt::Break)
            }
            Tok::Continue => {
                self.bump();
                self.expect(Tok::Semi)?;
                Ok(Stmt::Continue)
            }
            Tok::Typedef => self.parse_typedef(),
            Tok::Struct | Tok::Union => self.parse_struct_or_union_stmt(),
            Tok::Enum => self.parse_enum_stmt(),
            Tok::Const | Tok::Local => self.parse_var_decl_stmt(),
            _ if self.starts_basic_type() => self.parse_var_decl_or_fn_stmt(),
            _ if self.looks_like_named_type_decl() => self.parse_var_decl_or_fn_stmt(),
            _ => {
                let expr = self.parse_expr()?;
                self.expect(Tok::Semi)?;
                Ok(Stmt::Expr(expr))
            }
        }
    }

    fn parse_if(&mut self) -> Result<Stmt> {
        self.expect(Tok::If)?;
        self.expect(Tok::LParen)?;
        let condition = self.parse_expr()?;
        self.expect(Tok::RParen)?;
        let then_block = self.parse_stmt_as_block()?;
        let else_block = if *self.cur() == Tok::Else {
            self.bump();
            Some(self.parse_stmt_as_block()?)
        } else {
            None
        };
        Ok(Stmt::If(Conditional {
            condition,
            then_block,
            else_block,
        }))
    }

    /// Wraps a single non-brace statement as a one-element block, so `if
    /// (x) y = 1;` and `if (x) { y = 1; }` parse into the same AST shape.
    fn parse_stmt_as_block(&mut self) -> Result<Block> {
        if *self.cur() == Tok::LBrace {
            self.parse_block()
        } else {
            Ok(vec![self.parse_stmt()?])
        }
    }

    fn parse_while(&mut self) -> Result<Stmt> {
        self.expect(Tok::While)?;
        self.expect(Tok::LParen)?;
        let condition = self.parse_expr()?;
        self.expect(Tok::RParen)?;
        let body = self.parse_stmt_as_block()?;
        Ok(Stmt::While(WhileLoop { condition, body }))
    }

    fn parse_do_while(&mut self) -> Result<Stmt> {
        self.expect(Tok::Do)?;
        let body = self.parse_stmt_as_block()?;
        self.expect(Tok::While)?;
        self.expect(Tok::LParen)?;
        let condition = self.parse_expr()?;
        self.expect(Tok::RParen)?;
        self.expect(Tok::Semi)?;
        Ok(Stmt::DoWhile(WhileLoop { condition, body }))
    }

    fn parse_for(&mut self) -> Result<Stmt> {
        self.expect(Tok::For)?;
        self.expect(Tok::LParen)?;
        let counter = if *self.cur() == Tok::Semi {
            None
        } else {
            Some(Box::new(self.parse_simple_stmt()?))
        };
        self.expect(Tok::Semi)?;
        let condition = if *self.cur() == Tok::Semi {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.expect(Tok::Semi)?;
        let update = if *self.cur() == Tok::RParen {
            None
        } else {
            Some(Box::new(Stmt::Expr(self.parse_expr()?)))
        };
        self.expect(Tok::RParen)?;
        let body = self.parse_stmt_as_block()?;
        Ok(Stmt::For(ForLoop {
            counter,
            condition,
            update,
            body,
        }))
    }

    /// Parses one declaration/expression without its trailing `;`, for the
    /// `for (...)` init clause.
    fn parse_simple_stmt(&mut self) -> Result<Stmt> {
        if self.starts_basic_type() || *self.cur() == Tok::Const || *self.cur() == Tok::Local {
            self.parse_var_decl_no_semi()
        } else {
            Ok(Stmt::Expr(self.parse_expr()?))
        }
    }

    fn parse_switch(&mut self) -> Result<Stmt> {
        self.expect(Tok::Switch)?;
        self.expect(Tok::LParen)?;
        let expr = self.parse_expr()?;
        self.expect(Tok::RParen)?;
        self.expect(Tok::LBrace)?;
        let mut cases = Vec::new();
        while *self.cur() != Tok::RBrace {
            let value = match self.cur() {
                Tok::Case => {
                    self.bump();
                    let v = self.parse_expr()?;
                    self.expect(Tok::Colon)?;
                    Some(v)
                }
                Tok::Default => {
                    self.bump();
                    self.expect(Tok::Colon)?;
                    None
                }
                _ => return Err(self.err_here()),
            };
            let mut body = Vec::new();
            while !matches!(self.cur(), Tok::Case | Tok::Default | Tok::RBrace) {
                body.push(self.parse_stmt()?);
            }
            cases.push(Case { value, body });
        }
        self.expect(Tok::RBrace)?;
        Ok(Stmt::Switch(Switch { expr, cases }))
    }

    fn parse_typedef(&mut self) -> Result<Stmt> {
        self.expect(Tok::Typedef)?;
        let target = self.parse_type_node()?;
        let name = self.expect_ident()?;
        self.expect(Tok::Semi)?;
        Ok(Stmt::TypeDecl(TypeDeclStmt::Typedef { name, target }))
    }

    fn parse_struct_or_union_stmt(&mut self) -> Result<Stmt> {
        let is_union = *self.cur() == Tok::Union;
        let decl = Rc::new(self.parse_compound_decl()?);
        if *self.cur() == Tok::Semi {
            self.bump();
            return Ok(Stmt::TypeDecl(if is_union {
                TypeDeclStmt::Union(decl)
            } else {
                TypeDeclStmt::Struct(decl)
            }));
        }
        let ty = if is_union {
            TypeNode::Union(decl)
        } else {
            TypeNode::Struct(decl)
        };
        self.parse_var_decl_tail_stmt(ty, false, false)
    }

    fn parse_compound_decl(&mut self) -> Result<CompoundDecl> {
        self.bump(); // 'struct' / 'union'
        let name = if matches!(self.cur(), Tok::Ident(_)) {
            Some(self.expect_ident()?)
        } else {
            None
        };
        self.expect(Tok::LBrace)?;
        let mut members = Vec::new();
        while *self.cur() != Tok::RBrace {
            match self.parse_stmt()? {
                Stmt::VarDecl(v) => members.push(v),
                // nested struct/union/enum/typedef declarations with no
                // instance don't themselves become members; the tag is
                // still visible via the enclosing scope once this compound
                // is instantiated.
                Stmt::TypeDecl(_) => {}
                _ => return Err(self.err_here()),
            }
        }
        self.expect(Tok::RBrace)?;
        Ok(CompoundDecl { name, members })
    }

    fn parse_enum_stmt(&mut self) -> Result<Stmt> {
        let decl = Rc::new(self.parse_enum_decl()?);
        if *self.cur() == Tok::Semi {
            self.bump();
            return Ok(Stmt::TypeDecl(TypeDeclStmt::Enum(decl)));
        }
        self.parse_var_decl_tail_stmt(TypeNode::Enum(decl), false, false)
    }

    fn parse_enum_decl(&mut self) -> Result<EnumDecl> {
        self.expect(Tok::Enum)?;
        let underlying = if *self.cur() == Tok::Lt {
            self.bump();
            let ty = self.parse_type_node()?;
            self.expect(Tok::Gt)?;
            ty
        } else {
            TypeNode::Basic(BasicKind::S32)
        };
        let name = if matches!(self.cur(), Tok::Ident(_)) {
            Some(self.expect_ident()?)
        } else {
            None
        };
        self.expect(Tok::LBrace)?;
        let mut members = Vec::new();
        loop {
            if *self.cur() == Tok::RBrace {
                break;
            }
            let member_name = self.expect_ident()?;
            let init = if *self.cur() == Tok::Assign {
                self.bump();
                Some(self.parse_expr()?)
            } else {
                None
            };
            members.push((member_name, init));
            if *self.cur() == Tok::Comma {
                self.bump();
            } else {
                break;
            }
        }
        self.expect(Tok::RBrace)?;
        Ok(EnumDecl {
            name,
            underlying,
            members,
        })
    }

    /// Resolves a type appearing in a declaration position: a basic
    /// keyword, an inline `struct`/`union`/`enum`, or a previously declared
    /// name.
    fn parse_type_node(&mut self) -> Result<TypeNode> {
        if let Some(basic) = Self::basic_from_tok(self.cur()) {
            self.bump();
            return Ok(TypeNode::Basic(basic));
        }
        match self.cur() {
            Tok::Struct | Tok::Union => {
                let is_union = *self.cur() == Tok::Union;
                let decl = Rc::new(self.parse_compound_decl()?);
                Ok(if is_union {
                    TypeNode::Union(decl)
                } else {
                    TypeNode::Struct(decl)
                })
            }
            Tok::Enum => Ok(TypeNode::Enum(Rc::new(self.parse_enum_decl()?))),
            Tok::Ident(_) => Ok(TypeNode::Named(self.expect_ident()?)),
            _ => Err(self.err_here()),
        }
    }

    fn parse_var_decl_stmt(&mut self) -> Result<Stmt> {
        let mut is_const = false;
        let mut is_local = false;
        loop {
            match self.cur() {
                Tok::Const => {
                    is_const = true;
                    self.bump();
                }
                Tok::Local => {
                    is_local = true;
                    self.bump();
                }
                _ => break,
            }
        }
        let ty = self.parse_type_node()?;
        self.parse_var_decl_tail_stmt(ty, is_const, is_local)
    }

    /// Dispatches a statement starting with a basic-type keyword or a
    /// known-named-type identifier: either a variable declaration or (when
    /// the declarator is followed by `(`) a function declaration.
    fn parse_var_decl_or_fn_stmt(&mut self) -> Result<Stmt> {
        let ty = self.parse_type_node()?;
        if matches!(self.cur(), Tok::Ident(_)) && *self.peek_at(1) == Tok::LParen {
            return self.parse_function_decl(ty);
        }
        self.parse_var_decl_tail_stmt(ty, false, false)
    }

    fn parse_function_decl(&mut self, return_type: TypeNode) -> Result<Stmt> {
        let name = self.expect_ident()?;
        self.expect(Tok::LParen)?;
        let mut params = Vec::new();
        while *self.cur() != Tok::RParen {
            let by_reference = if *self.cur() == Tok::Amp {
                self.bump();
                true
            } else {
                false
            };
            let ty = self.parse_type_node()?;
            let name = self.expect_ident()?;
            params.push(Param { name, ty, by_reference });
            if *self.cur() == Tok::Comma {
                self.bump();
            } else {
                break;
            }
        }
        self.expect(Tok::RParen)?;
        let body = self.parse_block()?;
        Ok(Stmt::FunctionDecl(Rc::new(FunctionDecl {
            name,
            return_type,
            params,
            body,
        })))
    }

    /// Parses the `name [ '[' size ']' ] [ ':' bits ] [ '=' init ] ;` tail of
    /// a variable declaration and wraps it as a statement. Comma-separated
    /// multi-declarator lines (`int a, b;`) are intentionally not supported:
    /// every worked template in spec.md §8 declares one variable per
    /// statement, and a `Block`-wrapped group would wrongly push a fresh
    /// lexical scope around the declarations (they'd fall out of scope the
    /// instant the statement ended).
    fn parse_var_decl_tail_stmt(
        &mut self,
        ty: TypeNode,
        is_const: bool,
        is_local: bool,
    ) -> Result<Stmt> {
        let decl = self.parse_one_declarator(ty, is_const, is_local)?;
        self.expect(Tok::Semi)?;
        Ok(Stmt::VarDecl(decl))
    }

    /// Same as [`Self::parse_var_decl_tail_stmt`] but without consuming the
    /// trailing `;` (for `for (...)` init clauses), and restricted to a
    /// single declarator.
    fn parse_var_decl_no_semi(&mut self) -> Result<Stmt> {
        let mut is_const = false;
        let mut is_local = false;
        loop {
            match self.cur() {
                Tok::Const => {
                    is_const = true;
                    self.bump();
                }
                Tok::Local => {
                    is_local = true;
                    self.bump();
                }
                _ => break,
            }
        }
        let ty = self.parse_type_node()?;
        let decl = self.parse_one_declarator(ty, is_const, is_local)?;
        Ok(Stmt::VarDecl(decl))
    }

    fn parse_one_declarator(
        &mut self,
        ty: TypeNode,
        is_const: bool,
        is_local: bool,
    ) -> Result<VarDecl> {
        let name = self.expect_ident()?;
        let array_size = if *self.cur() == Tok::LBracket {
            self.bump();
            let size = self.parse_expr()?;
            self.expect(Tok::RBracket)?;
            Some(Box::new(size))
        } else {
            None
        };
        let bits = if *self.cur() == Tok::Colon {
            self.bump();
            Some(Box::new(self.parse_expr()?))
        } else {
            None
        };
        let init = if *self.cur() == Tok::Assign {
            self.bump();
            Some(self.parse_expr()?)
        } else {
            None
        };
        Ok(VarDecl {
            name,
            ty,
            array_size,
            bits,
            is_const,
            is_local,
            init,
        })
    }

    // --- expressions, precedence-climbing, tightest last ---

    fn parse_expr(&mut self) -> Result<Expr> {
        self.parse_assign()
    }

    fn parse_assign(&mut self) -> Result<Expr> {
        let left = self.parse_logical_or()?;
        let op = match self.cur() {
            Tok::Assign => BinaryOp::Assign,
            Tok::PlusAssign => BinaryOp::AddAssign,
            Tok::MinusAssign => BinaryOp::SubAssign,
            Tok::StarAssign => BinaryOp::MulAssign,
            Tok::SlashAssign => BinaryOp::DivAssign,
            Tok::AmpAssign => BinaryOp::BitAndAssign,
            Tok::PipeAssign => BinaryOp::BitOrAssign,
            Tok::CaretAssign => BinaryOp::BitXorAssign,
            Tok::ShlAssign => BinaryOp::ShlAssign,
            Tok::ShrAssign => BinaryOp::ShrAssign,
            _ => return Ok(left),
        };
        self.bump();
        let right = self.parse_assign()?; // right-associative
        Ok(Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    fn parse_logical_or(&mut self) -> Result<Expr> {
        let mut left = self.parse_logical_and()?;
        while *self.cur() == Tok::PipePipe {
            self.bump();
            let right = self.parse_logical_and()?;
            left = Expr::Binary {
                op: BinaryOp::LogOr,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_logical_and(&mut self) -> Result<Expr> {
        let mut left = self.parse_bit_or()?;
        while *self.cur() == Tok::AmpAmp {
            self.bump();
            let right = self.parse_bit_or()?;
            left = Expr::Binary {
                op: BinaryOp::LogAnd,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_bit_or(&mut self) -> Result<Expr> {
        let mut left = self.parse_bit_xor()?;
        while *self.cur() == Tok::Pipe {
            self.bump();
            let right = self.parse_bit_xor()?;
            left = Expr::Binary {
                op: BinaryOp::BitOr,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_bit_xor(&mut self) -> Result<Expr> {
        let mut left = self.parse_bit_and()?;
        while *self.cur() == Tok::Caret {
            self.bump();
            let right = self.parse_bit_and()?;
            left = Expr::Binary {
                op: BinaryOp::BitXor,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_bit_and(&mut self) -> Result<Expr> {
        let mut left = self.parse_equality()?;
        while *self.cur() == Tok::Amp {
            self.bump();
            let right = self.parse_equality()?;
            left = Expr::Binary {
                op: BinaryOp::BitAnd,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expr> {
        let mut left = self.parse_relational()?;
        loop {
            let op = match self.cur() {
                Tok::EqEq => CompareOp::Eq,
                Tok::NotEq => CompareOp::Ne,
                _ => break,
            };
            self.bump();
            let right = self.parse_relational()?;
            left = Expr::Compare {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_relational(&mut self) -> Result<Expr> {
        let mut left = self.parse_shift()?;
        loop {
            let op = match self.cur() {
                Tok::Lt => CompareOp::Lt,
                Tok::Gt => CompareOp::Gt,
                Tok::LtEq => CompareOp::Le,
                Tok::GtEq => CompareOp::Ge,
                _ => break,
            };
            self.bump();
            let right = self.parse_shift()?;
            left = Expr::Compare {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_shift(&mut self) -> Result<Expr> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.cur() {
                Tok::Shl => BinaryOp::Shl,
                Tok::Shr => BinaryOp::Shr,
                _ => break,
            };
            self.bump();
            let right = self.parse_additive()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expr> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.cur() {
                Tok::Plus => BinaryOp::Add,
                Tok::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.bump();
            let right = self.parse_multiplicative()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.cur() {
                Tok::Star => BinaryOp::Mul,
                Tok::Slash => BinaryOp::Div,
                Tok::Percent => BinaryOp::Rem,
                _ => break,
            };
            self.bump();
            let right = self.parse_unary()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        let op = match self.cur() {
            Tok::Minus => Some(UnaryOp::Neg),
            Tok::Bang => Some(UnaryOp::Not),
            Tok::Tilde => Some(UnaryOp::BitNot),
            Tok::PlusPlus => Some(UnaryOp::PreInc),
            Tok::MinusMinus => Some(UnaryOp::PreDec),
            _ => None,
        };
        if let Some(op) = op {
            self.bump();
            let expr = self.parse_unary()?;
            return Ok(Expr::Unary {
                op,
                expr: Box::new(expr),
            });
        }
        if *self.cur() == Tok::SizeOf {
            return self.parse_sizeof();
        }
        if *self.cur() == Tok::LParen && self.is_cast_ahead() {
            self.bump();
            let ty = self.parse_type_node()?;
            self.expect(Tok::RParen)?;
            let expr = self.parse_unary()?;
            return Ok(Expr::Cast {
                ty,
                expr: Box::new(expr),
            });
        }
        self.parse_postfix()
    }

    /// Disambiguates `(Type)expr` from a parenthesized expression: only a
    /// basic-type keyword can start a cast here, since arbitrary named-type
    /// casts are ambiguous with a parenthesized identifier expression in a
    /// one-token lookahead grammar.
    fn is_cast_ahead(&self) -> bool {
        matches!(self.peek_at(1), t if Self::basic_from_tok(t).is_some())
            && *self.peek_at(2) == Tok::RParen
    }

    fn parse_sizeof(&mut self) -> Result<Expr> {
        self.expect(Tok::SizeOf)?;
        self.expect(Tok::LParen)?;
        if self.starts_basic_type() || matches!(self.cur(), Tok::Struct | Tok::Union | Tok::Enum) {
            let ty = self.parse_type_node()?;
            self.expect(Tok::RParen)?;
            return Ok(Expr::SizeOf(SizeOfTarget::Type(ty)));
        }
        if matches!(self.cur(), Tok::Ident(_)) && *self.peek_at(1) == Tok::RParen {
            let name = self.expect_ident()?;
            self.expect(Tok::RParen)?;
            return Ok(Expr::SizeOf(SizeOfTarget::Ident(name)));
        }
        let expr = self.parse_expr()?;
        self.expect(Tok::RParen)?;
        Ok(Expr::SizeOf(SizeOfTarget::Expr(Box::new(expr))))
    }

    fn parse_postfix(&mut self) -> Result<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.cur() {
                Tok::Dot => {
                    self.bump();
                    let field = self.expect_ident()?;
                    expr = Expr::Dot {
                        left: Box::new(expr),
                        field,
                    };
                }
                Tok::LBracket => {
                    self.bump();
                    let index = self.parse_expr()?;
                    self.expect(Tok::RBracket)?;
                    expr = Expr::Index {
                        expr: Box::new(expr),
                        index: Box::new(index),
                    };
                }
                Tok::PlusPlus => {
                    self.bump();
                    expr = Expr::Unary {
                        op: UnaryOp::PostInc,
                        expr: Box::new(expr),
                    };
                }
                Tok::MinusMinus => {
                    self.bump();
                    expr = Expr::Unary {
                        op: UnaryOp::PostDec,
                        expr: Box::new(expr),
                    };
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        match self.bump() {
            Tok::Int(v) => Ok(Expr::Int(v)),
            Tok::Real(v) => Ok(Expr::Real(v)),
            Tok::Str(s) => Ok(Expr::Str(s)),
            Tok::True => Ok(Expr::Bool(true)),
            Tok::False => Ok(Expr::Bool(false)),
            Tok::LParen => {
                let expr = self.parse_expr()?;
                self.expect(Tok::RParen)?;
                Ok(expr)
            }
            Tok::Ident(name) => {
                if *self.cur() == Tok::LParen {
                    self.bump();
                    let mut args = Vec::new();
                    while *self.cur() != Tok::RParen {
                        args.push(self.parse_expr()?);
                        if *self.cur() == Tok::Comma {
                            self.bump();
                        } else {
                            break;
                        }
                    }
                    self.expect(Tok::RParen)?;
                    Ok(Expr::Call(Call { name, args }))
                } else {
                    Ok(Expr::Ident(name))
                }
            }
            other => Err(VmError::Syntax {
                token: format!("{other:?}"),
                line: self.cur_line(),
            }),
        }
    }
}
