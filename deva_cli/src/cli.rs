use clap::{Parser, Subcommand};

use crate::commands::compile::CompileArgs;
use crate::commands::disasm::DisasmArgs;
use crate::commands::run::RunArgs;
use crate::commands::{compile, disasm, run};

#[derive(Parser)]
#[command(name = "deva")]
#[command(about = "Run and inspect compiled deva bytecode", version, author)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load a .dvc file and run it
    Run(Box<RunArgs>),

    /// Print a readable disassembly of a .dvc file
    Disasm(Box<DisasmArgs>),

    /// Report that no compiler front end is linked into this build
    Compile(Box<CompileArgs>),
}

pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => run::execute(*args),
        Commands::Disasm(args) => disasm::execute(*args),
        Commands::Compile(args) => compile::execute(*args),
    }
}
