use crate::Args;

use anyhow::{Context, Result};

use btvm::ast::Stmt;

pub fn dump_ast(args: &Args) -> Result<()> {
    let template =
        std::fs::read_to_string(&args.template).context("reading template source")?;
    let block = btvm::parser::parse(&template).map_err(|err| anyhow::anyhow!("{err}"))?;
    for stmt in &block {
        print_stmt(stmt, 0);
    }
    Ok(())
}

fn print_stmt(stmt: &Stmt, depth: usize) {
    let indent = "  ".repeat(depth);
    match stmt {
        Stmt::VarDecl(v) => println!("{indent}VarDecl {}", v.name),
        Stmt::TypeDecl(_) => println!("{indent}TypeDecl"),
        Stmt::FunctionDecl(f) => println!("{indent}FunctionDecl {}", f.name),
        Stmt::Expr(_) => println!("{indent}Expr"),
        Stmt::Block(b) => {
            println!("{indent}Block");
            for s in b {
                print_stmt(s, depth + 1);
            }
        }
        Stmt::If(c) => {
            println!("{indent}If");
            for s in &c.then_block {
                print_stmt(s, depth + 1);
            }
            if let Some(else_block) = &c.else_block {
                println!("{indent}Else");
                for s in else_block {
                    print_stmt(s, depth + 1);
                }
            }
        }
        Stmt::While(w) => {
            println!("{indent}While");
            for s in &w.body {
                print_stmt(s, depth + 1);
            }
        }
        Stmt::DoWhile(w) => {
            println!("{indent}DoWhile");
            for s in &w.body {
                print_stmt(s, depth + 1);
            }
        }
        Stmt::For(f) => {
            println!("{indent}For");
            for s in &f.body {
                print_stmt(s, depth + 1);
            }
        }
        Stmt::Switch(sw) => {
            println!("{indent}Switch");
            for case in &sw.cases {
                println!("{indent}  Case");
                for s in &case.body {
                    print_stmt(s, depth + 2);
                }
            }
        }
        Stmt::Return(_) => println!("{indent}Return"),
        Stmt::Break => println!("{indent}Break"),
        Stmt::Continue => println!("{indent}Continue"),
    }
}
