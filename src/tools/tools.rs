mod check;
mod dump_ast;
mod run;

use check::check;
use dump_ast::dump_ast;
use run::run;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// Run and inspect binary templates against a target file
#[derive(Clone, Debug, Parser)]
struct Args {
    /// input binary file the template runs against
    #[arg(short, long)]
    input: PathBuf,
    /// template source file
    #[arg(short, long)]
    template: PathBuf,
    #[command(subcommand)]
    operation: Operation,
}

#[derive(Clone, Debug, Subcommand)]
enum Operation {
    /// Execute the template against the input file and print the entry tree
    Run(RunArgs),
    /// Parse the template and pretty-print its AST, without executing it
    DumpAst,
    /// Parse the template only, reporting syntax errors
    Check,
}

/// Execute the template against the input file and print the entry tree
#[derive(Clone, Debug, Parser)]
struct RunArgs {
    /// print the entry tree as JSON instead of the default indented text
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    match &args.operation {
        Operation::Run(run_args) => run(&args, run_args),
        Operation::DumpAst => dump_ast(&args),
        Operation::Check => check(&args),
    }
}
