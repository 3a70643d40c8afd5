use crate::Args;

use anyhow::{Context, Result};

pub fn check(args: &Args) -> Result<()> {
    let template =
        std::fs::read_to_string(&args.template).context("reading template source")?;
    match btvm::parser::parse(&template) {
        Ok(block) => {
            println!("OK: {} top-level statement(s)", block.len());
            Ok(())
        }
        Err(err) => Err(anyhow::anyhow!("{err}")),
    }
}
