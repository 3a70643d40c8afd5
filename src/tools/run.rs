use crate::{Args, RunArgs};

use anyhow::{Context, Result};

use btvm::{BTEntry, Interpreter, SliceSource};

pub fn run(args: &Args, run_args: &RunArgs) -> Result<()> {
    let template =
        std::fs::read_to_string(&args.template).context("reading template source")?;
    let data = std::fs::read(&args.input).context("reading input file")?;

    let mut interp = Interpreter::new(SliceSource::new(data));
    interp
        .evaluate(&template)
        .map_err(|err| anyhow::anyhow!("{err}"))
        .context("evaluating template")?;

    let tree = interp.format();
    if run_args.json {
        println!("{}", serde_json::to_string_pretty(&tree)?);
    } else {
        for entry in &tree {
            print_entry(entry, 0);
        }
    }
    Ok(())
}

fn print_entry(entry: &BTEntry, depth: usize) {
    let indent = "  ".repeat(depth);
    println!(
        "{indent}{} = {} @ {:#x} ({} bytes)",
        entry.name, entry.value, entry.location.offset, entry.location.size
    );
    for child in &entry.children {
        print_entry(child, depth + 1);
    }
}
