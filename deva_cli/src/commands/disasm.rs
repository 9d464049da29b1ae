use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use deva_core::{debug, fileformat};

#[derive(Args)]
#[clap(author, version, about, long_about = None)]
pub struct DisasmArgs {
    /// Compiled .dvc bytecode file to disassemble
    pub input: PathBuf,

    /// Print only the instruction stream, without the constant pool and
    /// function table headers
    #[arg(long, default_value_t = false)]
    pub code_only: bool,
}

pub fn execute(args: DisasmArgs) -> Result<()> {
    let file = File::open(&args.input).with_context(|| format!("failed to open {}", args.input.display()))?;
    let code = fileformat::read_code(&mut BufReader::new(file))
        .with_context(|| format!("failed to read {}", args.input.display()))?;

    if args.code_only {
        print!("{}", debug::dump_instructions(&code));
    } else {
        print!("{}", debug::dump_code(&code));
    }
    Ok(())
}
