use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

#[derive(Args)]
#[clap(author, version, about, long_about = None)]
pub struct CompileArgs {
    /// Source file that would be compiled, were a front end linked in
    pub input: PathBuf,
}

/// This build only links the execution core: the bytecode format, the
/// VM, and the built-ins. There is no grammar, parser, or compiler pass
/// behind this binary, so `compile` can't do anything but say so.
pub fn execute(_args: CompileArgs) -> Result<()> {
    anyhow::bail!(
        "no compiler front end is linked into this build; `deva compile` has nothing to call. \
         Produce a .dvc file with a separate front end and pass it to `deva run` or `deva disasm`."
    )
}
