use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::rc::Rc;

use anyhow::{Context, Result};
use clap::Args;
use deva_core::fileformat;
use deva_vm::Executor;

use crate::errors::print_error;

#[derive(Args)]
#[clap(author, version, about, long_about = None)]
pub struct RunArgs {
    /// Compiled .dvc bytecode file to execute
    pub input: PathBuf,

    /// Source line to stop and log at before executing it (repeatable)
    #[arg(long = "break", value_name = "LINE")]
    pub breakpoints: Vec<u32>,
}

/// Load a `.dvc` file and run it to completion. Prints the program's
/// exit value and reports a runtime error with the file/line it was
/// tagged with, exiting non-zero either way a script can fail.
pub fn execute(args: RunArgs) -> Result<()> {
    let file = File::open(&args.input).with_context(|| format!("failed to open {}", args.input.display()))?;
    let code = fileformat::read_code(&mut BufReader::new(file))
        .with_context(|| format!("failed to read {}", args.input.display()))?;

    let module_name = args
        .input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "module".to_string());

    let mut executor = Executor::new(Rc::new(code), module_name)?;
    for line in &args.breakpoints {
        if !executor.break_at_line(*line) {
            log::warn!("no instruction maps to line {line}, breakpoint ignored");
        }
    }

    match executor.run() {
        Ok(result) => {
            log::info!("program finished: {}", executor.render_top_level(&result));
            Ok(())
        }
        Err(e) => {
            print_error(&e);
            std::process::exit(1);
        }
    }
}
