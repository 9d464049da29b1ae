//! The immutable compiled artifact: everything a `.dvc` file holds once
//! loaded into memory. Parsing source text into this shape is the
//! compiler's job and lives outside this crate; here we only define the
//! shape and how to read/write it.

use crate::ids::{Addr, ConstId, FunctionId};
use crate::linemap::LineMap;

/// A pool constant. The file format allows only these two variants in the
/// constant pool; every other [`Object`](https://docs.rs/deva_vm) variant
/// is synthesized at runtime.
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Number(f64),
    Str(String),
}

/// One compiled function's metadata, as recorded in the `.func` section.
#[derive(Debug, Clone)]
pub struct FunctionDef {
    pub id: FunctionId,
    pub name: String,
    pub source_file: String,
    pub first_line: u32,
    /// Non-empty for methods; the class they were declared on.
    pub class_name: Option<String>,
    pub arg_count: u32,
    /// Constant-pool indices of default argument values, one per trailing
    /// optional parameter.
    pub default_args: Vec<ConstId>,
    pub num_locals: u32,
    /// Declared name of each local slot, parallel to the locals array
    /// itself (`None` for a compiler-introduced temporary with no source
    /// name). `store` consults this to bind the slot under that name in
    /// the active scope, the same moment a declaration would.
    pub local_names: Vec<Option<String>>,
    /// Names referenced by this function that are resolved at runtime via
    /// the scope chain (externals, undeclared vars, called functions).
    pub names: Vec<String>,
    pub code_offset: Addr,
}

impl FunctionDef {
    pub fn num_default_args(&self) -> usize {
        self.default_args.len()
    }
}

/// The immutable compiled unit: constant pool, function table, line map
/// and the raw instruction stream they all index into.
#[derive(Debug, Clone)]
pub struct Code {
    pub constants: Vec<Constant>,
    pub functions: Vec<FunctionDef>,
    pub lines: LineMap,
    pub instructions: Vec<u8>,
    /// Index into `functions` of the synthetic top-level `@main` entry.
    pub entry: FunctionId,
}

impl Code {
    pub fn function(&self, id: FunctionId) -> Option<&FunctionDef> {
        self.functions.get(id.0 as usize)
    }

    pub fn constant(&self, id: ConstId) -> Option<&Constant> {
        self.constants.get(id.0 as usize)
    }
}
