//! The compiled-artifact half of the deva execution core: the `.dvc`
//! bytecode format, the instruction set, and the static structures
//! (constant pool, function table, line map) the VM in `deva_vm` loads
//! and runs. What builds this artifact from source text — the grammar,
//! the parser, the two compiler passes — lives elsewhere; this crate
//! only defines the artifact and how to read and write it.

pub mod builder;
pub mod debug;
pub mod error;
pub mod fileformat;
pub mod ids;
pub mod linemap;
pub mod module;
pub mod opcode;

pub use error::{DevaError, DevaResult, ErrorKind};
pub use ids::{Addr, ConstId, FunctionId, LocalId};
pub use linemap::{Line, LineMap};
pub use module::{Code, Constant, FunctionDef};
pub use opcode::{Instr, Op};
