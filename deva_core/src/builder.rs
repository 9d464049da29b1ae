//! Programmatic [`Code`] construction.
//!
//! No grammar or parser lives in this crate; `Code` values are assembled
//! directly, the way a hand-rolled instruction stream would be built.

use crate::ids::{Addr, ConstId, FunctionId};
use crate::linemap::{Line, LineMap};
use crate::module::{Code, Constant, FunctionDef};
use crate::opcode::{encode, Instr};

pub struct CodeBuilder {
    constants: Vec<Constant>,
    functions: Vec<FunctionDef>,
    code: Vec<u8>,
    lines: LineMap,
    next_function_id: u32,
    entry: Option<FunctionId>,
}

impl CodeBuilder {
    pub fn new() -> Self {
        Self {
            constants: Vec::new(),
            functions: Vec::new(),
            code: Vec::new(),
            lines: LineMap::new(),
            next_function_id: 0,
            entry: None,
        }
    }

    /// Intern a constant, reusing an existing entry when one is already
    /// equal (mirrors the compiler's constant-pool interning).
    pub fn add_constant(&mut self, c: Constant) -> ConstId {
        if let Some(idx) = self.constants.iter().position(|e| *e == c) {
            return ConstId(idx as u32);
        }
        let id = ConstId(self.constants.len() as u32);
        self.constants.push(c);
        id
    }

    pub fn add_number(&mut self, n: f64) -> ConstId {
        self.add_constant(Constant::Number(n))
    }

    pub fn add_string(&mut self, s: impl Into<String>) -> ConstId {
        self.add_constant(Constant::Str(s.into()))
    }

    pub fn new_function(
        &mut self,
        name: impl Into<String>,
        arg_count: u32,
        class_name: Option<String>,
    ) -> FunctionBuilder {
        let id = FunctionId(self.next_function_id);
        self.next_function_id += 1;
        FunctionBuilder {
            id,
            name: name.into(),
            source_file: "<builder>".to_string(),
            first_line: 0,
            class_name,
            arg_count,
            default_args: Vec::new(),
            num_locals: arg_count,
            local_names: vec![None; arg_count as usize],
            names: Vec::new(),
            code: Vec::new(),
            line_markers: Vec::new(),
        }
    }

    /// Splice a function's instruction stream into the shared code blob
    /// and record its [`FunctionDef`], fixing up its code offset and line
    /// map entries to be absolute.
    pub fn push_function(&mut self, fb: FunctionBuilder) -> FunctionId {
        let offset = Addr(self.code.len() as u32);
        for (rel, line) in &fb.line_markers {
            self.lines.add(*line, Addr(offset.0 + rel));
        }
        self.code.extend_from_slice(&fb.code);
        let is_main = fb.name == "@main";
        let def = FunctionDef {
            id: fb.id,
            name: fb.name,
            source_file: fb.source_file,
            first_line: fb.first_line,
            class_name: fb.class_name,
            arg_count: fb.arg_count,
            default_args: fb.default_args,
            num_locals: fb.num_locals,
            local_names: fb.local_names,
            names: fb.names,
            code_offset: offset,
        };
        if is_main {
            self.entry = Some(def.id);
        }
        self.functions.push(def);
        fb.id
    }

    pub fn set_entry(&mut self, f: FunctionId) {
        self.entry = Some(f);
    }

    pub fn build(self) -> Code {
        let entry = self.entry.unwrap_or(FunctionId(0));
        Code {
            constants: self.constants,
            functions: self.functions,
            lines: self.lines,
            instructions: self.code,
            entry,
        }
    }
}

impl Default for CodeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub struct FunctionBuilder {
    id: FunctionId,
    name: String,
    source_file: String,
    first_line: u32,
    class_name: Option<String>,
    arg_count: u32,
    default_args: Vec<ConstId>,
    num_locals: u32,
    local_names: Vec<Option<String>>,
    names: Vec<String>,
    code: Vec<u8>,
    /// (offset relative to the start of this function's code, line)
    line_markers: Vec<(u32, Line)>,
}

impl FunctionBuilder {
    pub fn id(&self) -> FunctionId {
        self.id
    }

    pub fn set_source_file(&mut self, f: impl Into<String>) -> &mut Self {
        self.source_file = f.into();
        self
    }

    pub fn set_first_line(&mut self, line: u32) -> &mut Self {
        self.first_line = line;
        self
    }

    pub fn add_default_arg(&mut self, const_id: ConstId) -> &mut Self {
        self.default_args.push(const_id);
        self
    }

    /// Reserve a new local slot beyond the arguments and return its index.
    pub fn add_local(&mut self) -> u32 {
        let idx = self.num_locals;
        self.num_locals += 1;
        self.local_names.push(None);
        idx
    }

    /// Reserve a new local slot and record the source name a `store` into
    /// it should bind in the active scope — what makes a stored class
    /// nameable and a later `delete(name)` find it.
    pub fn add_named_local(&mut self, name: impl Into<String>) -> u32 {
        let idx = self.add_local();
        self.local_names[idx as usize] = Some(name.into());
        idx
    }

    /// Record a name this function resolves dynamically (an external,
    /// undeclared variable, or called function) — mirrors the `.func`
    /// section's name table.
    pub fn add_name(&mut self, name: impl Into<String>) -> &mut Self {
        self.names.push(name.into());
        self
    }

    pub fn mark_line(&mut self, line: u32) -> &mut Self {
        self.line_markers
            .push((self.code.len() as u32, Line(line)));
        self
    }

    pub fn emit(&mut self, instr: Instr) -> &mut Self {
        encode(&instr, &mut self.code);
        self
    }

    pub fn label(&self) -> Addr {
        Addr(self.code.len() as u32)
    }

    /// Current length of this function's code, useful for computing a
    /// forward jump target before the target instruction is emitted.
    pub fn offset(&self) -> u32 {
        self.code.len() as u32
    }
}

/// Helper kept around for callers that want to resolve a forward jump by
/// patching its operand after the fact, mirroring a single-pass assembler.
pub fn patch_jump_target(buf: &mut [u8], instr_offset: usize, target: Addr) {
    let operand_at = instr_offset + 1;
    buf[operand_at..operand_at + 4].copy_from_slice(&target.0.to_le_bytes());
}
