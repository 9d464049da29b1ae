//! The bytecode dispatch loop: fetch, decode, execute, one instruction at
//! a time. Owns the operand stack, the call stack of [`Frame`]s, the
//! [`ScopeTable`], the ref-counted [`Heaps`], and the built-in registry.
//! Everything else in this crate exists to be driven by this one.

use std::rc::Rc;

use deva_core::opcode::decode_at;
use deva_core::{Addr, Code, Constant, DevaError, DevaResult, FunctionId, Instr, Line};

use crate::breakpoint::Breakpoint;
use crate::builtins::Builtins;
use crate::container::{MapTag, VectorData};
use crate::frame::{Callee, Frame};
use crate::heap::Handle;
use crate::heaps::Heaps;
use crate::scope::{Binding, Scope, ScopeKind, ScopeTable};
use crate::value::Object;

/// Hook for `eval`: compiling source text is outside this crate, so the
/// executor only knows how to ask a plugged-in compiler for a [`Code`].
pub trait Compiler {
    fn compile(&mut self, source: &str) -> DevaResult<Code>;
}

pub struct Executor {
    code: Rc<Code>,
    ip: usize,
    stack: Vec<Object>,
    call_stack: Vec<Frame>,
    scopes: ScopeTable,
    heaps: Heaps,
    builtins: Builtins,
    breakpoints: Vec<Breakpoint>,
    module_name: String,
    current_line: Option<Line>,
    output: Box<dyn std::io::Write>,
    compiler: Option<Box<dyn Compiler>>,
}

impl Executor {
    pub fn new(code: Rc<Code>, module_name: impl Into<String>) -> DevaResult<Self> {
        let module_name = module_name.into();
        let entry_def = code
            .function(code.entry)
            .ok_or_else(|| DevaError::ice("entry function index out of range"))?
            .clone();

        let mut module_scope = Scope::new(ScopeKind::Module, 0);
        for def in &code.functions {
            if def.id != code.entry {
                module_scope.add_symbol(def.name.clone(), Binding::Function(def.id));
            }
        }

        let top_frame = Frame::new(
            None,
            Callee::Bytecode(code.entry),
            entry_def.num_locals as usize,
            0,
            Addr(code.instructions.len() as u32),
            Addr::ENTRY,
            true,
        );

        let mut scopes = ScopeTable::new();
        scopes.push(module_scope);

        Ok(Executor {
            ip: entry_def.code_offset.0 as usize,
            code,
            stack: Vec::new(),
            call_stack: vec![top_frame],
            scopes,
            heaps: Heaps::new(),
            builtins: Builtins::new(),
            breakpoints: Vec::new(),
            module_name,
            current_line: None,
            output: Box::new(std::io::stdout()),
            compiler: None,
        })
    }

    #[must_use]
    pub fn with_compiler(mut self, compiler: Box<dyn Compiler>) -> Self {
        self.compiler = Some(compiler);
        self
    }

    pub fn set_output(&mut self, output: Box<dyn std::io::Write>) {
        self.output = output;
    }

    pub fn add_breakpoint(&mut self, bp: Breakpoint) {
        self.breakpoints.push(bp);
    }

    /// Resolve `line` in the currently loaded module to an instruction
    /// address and register an active breakpoint there. Returns `false`
    /// if the line has no corresponding instruction.
    pub fn break_at_line(&mut self, line: u32) -> bool {
        let Some(addr) = self.code.lines.find_address(Line(line)) else {
            return false;
        };
        let mut bp = Breakpoint::new(self.module_name.clone(), line, addr);
        bp.activate();
        self.breakpoints.push(bp);
        true
    }

    pub fn heaps(&self) -> &Heaps {
        &self.heaps
    }

    pub fn heaps_mut(&mut self) -> &mut Heaps {
        &mut self.heaps
    }

    /// Run until `@main` returns (explicitly or by falling off the end)
    /// or a `halt` instruction executes. Returns the value left on the
    /// operand stack.
    pub fn run(&mut self) -> DevaResult<Object> {
        loop {
            match self.step() {
                Ok(Some(result)) => return Ok(result),
                Ok(None) => continue,
                Err(e) => return Err(self.tag_error(e)),
            }
        }
    }

    fn tag_error(&self, e: DevaError) -> DevaError {
        let mut e = e.with_file(self.module_name.clone());
        if let Some(line) = self.current_line {
            e = e.with_line(line);
        }
        e
    }

    fn step(&mut self) -> DevaResult<Option<Object>> {
        self.check_breakpoint();
        if self.ip >= self.code.instructions.len() {
            return self.implicit_return();
        }
        let (instr, next_ip) = decode_at(&self.code.instructions, self.ip)?;
        self.dispatch(instr, next_ip)
    }

    fn check_breakpoint(&self) {
        let here = Addr(self.ip as u32);
        if self.breakpoints.iter().any(|b| b.matches(&self.module_name, here)) {
            log::debug!("breakpoint hit in {} at offset {}", self.module_name, self.ip);
        }
    }

    fn current_frame_index(&self) -> DevaResult<usize> {
        self.call_stack
            .len()
            .checked_sub(1)
            .ok_or_else(|| DevaError::ice("no active frame"))
    }

    fn implicit_return(&mut self) -> DevaResult<Option<Object>> {
        let fi = self.current_frame_index()?;
        if !self.call_stack[fi].is_module {
            return Err(DevaError::ice(
                "control fell off the end of a function without a return",
            ));
        }
        self.push(Object::Null);
        self.execute_return()
    }

    fn execute_return(&mut self) -> DevaResult<Option<Object>> {
        let result = self.pop_resolved()?;
        let mut frame = self
            .call_stack
            .pop()
            .ok_or_else(|| DevaError::ice("return with no active frame"))?;
        frame.release_locals(&mut self.heaps);
        self.heaps.drain_dead_pools();
        self.scopes.pop();
        if frame.is_module || self.call_stack.is_empty() {
            return Ok(Some(result));
        }
        self.ip = frame.return_addr.0 as usize;
        self.push(result);
        Ok(None)
    }

    // --- stack primitives -------------------------------------------------

    fn push(&mut self, v: Object) {
        self.stack.push(v);
    }

    fn raw_pop(&mut self) -> DevaResult<Object> {
        self.stack.pop().ok_or_else(|| DevaError::ice("operand stack underflow"))
    }

    /// Pop and, if the value is an unresolved identifier placeholder,
    /// look it up through the scope chain / function table / built-ins.
    fn pop_resolved(&mut self) -> DevaResult<Object> {
        let v = self.raw_pop()?;
        self.resolve(v)
    }

    fn resolve(&mut self, v: Object) -> DevaResult<Object> {
        match v {
            Object::Unknown(name) => self.resolve_unknown(&name),
            other => Ok(other),
        }
    }

    /// `load`'s operand is a plain local-slot index, but a function's
    /// declared locals don't cover names it only references dynamically
    /// (globals, builtins, other functions) — those live past the end of
    /// the locals array, indexed into the function's own `names` table.
    /// This is how a bare identifier like `print` reaches the stack
    /// without a dedicated "push unknown" opcode.
    fn dynamic_name(&self, frame_index: usize, idx: usize, num_locals: usize) -> DevaResult<String> {
        let fid = match self.call_stack[frame_index].callee {
            Callee::Bytecode(fid) => fid,
            Callee::Native(_) => return Err(DevaError::ice("load: a native frame has no names table")),
        };
        let def = self
            .code
            .function(fid)
            .ok_or_else(|| DevaError::ice("load: unknown function id"))?;
        def.names
            .get(idx - num_locals)
            .cloned()
            .ok_or_else(|| DevaError::ice("load: local index beyond both locals and names"))
    }

    fn resolve_unknown(&mut self, name: &str) -> DevaResult<Object> {
        match self.scopes.find_symbol(name, false) {
            Some(Binding::Local { frame_index, slot }) => {
                let frame = self
                    .call_stack
                    .get(frame_index)
                    .ok_or_else(|| DevaError::ice("symbol bound to a dead frame"))?;
                let raw = frame.get_local_ref(slot).clone();
                self.heaps.retain(&raw);
                Ok(raw)
            }
            Some(Binding::Function(fid)) => Ok(Object::FunctionRef(fid)),
            None => self
                .builtins
                .resolve_any(name)
                .map(|id| Object::Native(id, false))
                .ok_or_else(|| DevaError::runtime(format!("undefined symbol '{name}'"))),
        }
    }

    /// Clone a value, retaining its reference if compound. The one place
    /// duplication (as opposed to transfer) happens: `load`, `dup`,
    /// reading a vector/map element, and built-ins that hand back a
    /// value they don't own exclusively (`find`, `keys`, `values`).
    pub fn duplicate(&mut self, v: &Object) -> Object {
        let c = v.clone();
        self.heaps.retain(&c);
        c
    }

    /// Release a value popped off the stack and not transferred anywhere
    /// else. A no-op for non-compound values.
    pub fn discard(&mut self, v: Object) {
        self.heaps.release(&v);
    }

    pub fn discard_all(&mut self, vs: &[Object]) {
        for v in vs {
            self.heaps.release(v);
        }
    }

    pub fn shallow_copy(&mut self, obj: &Object) -> DevaResult<Object> {
        match obj {
            Object::Vector(h) => {
                let items = self
                    .heaps
                    .vector(*h)
                    .ok_or_else(|| DevaError::ice("copy() on a freed vector"))?
                    .items
                    .clone();
                for item in &items {
                    self.heaps.retain(item);
                }
                let handle = self.heaps.alloc_vector(VectorData { items });
                Ok(Object::Vector(handle))
            }
            Object::Map(h) | Object::Class(h) | Object::Instance(h) => {
                let data = self
                    .heaps
                    .map(*h)
                    .ok_or_else(|| DevaError::ice("copy() on a freed map"))?
                    .clone();
                for k in data.entries.keys() {
                    self.heaps.retain(k);
                }
                for v in data.entries.values() {
                    self.heaps.retain(v);
                }
                let handle = self.heaps.alloc_map(data);
                Ok(match obj {
                    Object::Class(_) => Object::Class(handle),
                    Object::Instance(_) => Object::Instance(handle),
                    _ => Object::Map(handle),
                })
            }
            _ => Err(DevaError::runtime("copy() requires a vector or map")),
        }
    }

    pub fn write_output(&mut self, line: &str) {
        use std::io::Write;
        let _ = writeln!(self.output, "{line}");
    }

    pub fn render_top_level(&self, v: &Object) -> String {
        self.render(v, true)
    }

    fn render(&self, v: &Object, top_level: bool) -> String {
        match v {
            Object::Number(n) => format!("{}", n.0),
            Object::Str(s) => {
                if top_level {
                    s.clone()
                } else {
                    format!("'{s}'")
                }
            }
            Object::Bool(b) => if *b { "true" } else { "false" }.to_string(),
            Object::Null => "null".to_string(),
            Object::Vector(h) => {
                let items = self.heaps.vector(*h).map(|d| d.items.clone()).unwrap_or_default();
                let inner: Vec<String> = items.iter().map(|i| self.render(i, false)).collect();
                format!("[{}]", inner.join(", "))
            }
            Object::Map(h) => self.render_plain_map(*h),
            Object::Class(h) => self.render_tagged(*h, "class"),
            Object::Instance(h) => self.render_tagged(*h, "instance"),
            Object::FunctionRef(f) => format!("<function #{}>", f.0),
            Object::Native(id, _) => format!("<native_function {}>", self.builtins.name_of(*id)),
            Object::Offset(o) => format!("<offset {o}>"),
            Object::Unknown(name) => format!("<unresolved {name}>"),
        }
    }

    fn render_entries(&self, h: Handle) -> String {
        let entries = self.heaps.map(h).map(|d| d.entries.clone()).unwrap_or_default();
        let inner: Vec<String> = entries
            .iter()
            .map(|(k, v)| format!("{}:{}", self.render(k, false), self.render(v, false)))
            .collect();
        inner.join(", ")
    }

    fn render_plain_map(&self, h: Handle) -> String {
        format!("{{{}}}", self.render_entries(h))
    }

    fn render_tagged(&self, h: Handle, kind: &str) -> String {
        let name = self
            .heaps
            .map(h)
            .and_then(|d| d.display_name())
            .unwrap_or("")
            .to_string();
        format!("{kind}: '{name}' = {{{}}}", self.render_entries(h))
    }

    fn is_falsy(&self, v: &Object) -> DevaResult<bool> {
        if let Some(b) = v.is_falsy_self_contained() {
            return Ok(b);
        }
        match v {
            Object::Vector(h) => Ok(self
                .heaps
                .vector(*h)
                .ok_or_else(|| DevaError::ice("falsy check on a freed vector"))?
                .items
                .is_empty()),
            Object::Map(h) | Object::Class(h) | Object::Instance(h) => Ok(self
                .heaps
                .map(*h)
                .ok_or_else(|| DevaError::ice("falsy check on a freed map"))?
                .entries
                .is_empty()),
            _ => Ok(false),
        }
    }

    // --- eval ---------------------------------------------------------

    pub fn eval_source(&mut self, source: &str) -> DevaResult<Object> {
        let mut compiler = self
            .compiler
            .take()
            .ok_or_else(|| DevaError::runtime("eval() requires a compiler front end to be configured"))?;
        let compiled = compiler.compile(source);
        self.compiler = Some(compiler);
        self.run_nested(Rc::new(compiled?))
    }

    fn run_nested(&mut self, code: Rc<Code>) -> DevaResult<Object> {
        let depth_before = self.call_stack.len();
        let saved_code = std::mem::replace(&mut self.code, code);
        let saved_ip = self.ip;

        let entry_id = self.code.entry;
        let entry = match self.code.function(entry_id) {
            Some(def) => def.clone(),
            None => {
                self.code = saved_code;
                self.ip = saved_ip;
                return Err(DevaError::ice("eval(): compiled code has no entry function"));
            }
        };

        let parent = depth_before.checked_sub(1);
        let frame = Frame::new(
            parent,
            Callee::Bytecode(entry_id),
            entry.num_locals as usize,
            0,
            Addr(self.code.instructions.len() as u32),
            Addr(saved_ip as u32),
            false,
        );
        self.call_stack.push(frame);
        self.scopes.push(Scope::new(ScopeKind::Block, self.call_stack.len() - 1));
        self.ip = entry.code_offset.0 as usize;

        let result = self.run_until_depth(depth_before);
        self.code = saved_code;
        self.ip = saved_ip;
        result
    }

    fn run_until_depth(&mut self, depth_before: usize) -> DevaResult<Object> {
        while self.call_stack.len() > depth_before {
            if let Some(final_value) = self.step().map_err(|e| self.tag_error(e))? {
                return Ok(final_value);
            }
        }
        self.raw_pop()
    }

    // --- delete ---------------------------------------------------------

    pub fn delete_binding(&mut self, name: &str) -> DevaResult<()> {
        for i in (0..self.scopes.len()).rev() {
            let has_it = self.scopes.at(i).map(|s| s.find_local(name).is_some()).unwrap_or(false);
            if !has_it {
                continue;
            }
            let binding = self
                .scopes
                .at_mut(i)
                .and_then(|s| s.remove(name))
                .ok_or_else(|| DevaError::ice("delete(): binding vanished between lookup and removal"))?;
            if let Binding::Local { frame_index, slot } = binding {
                if let Some(frame) = self.call_stack.get_mut(frame_index) {
                    frame.set_local(slot, Object::Null, &mut self.heaps);
                    self.heaps.drain_dead_pools();
                }
            }
            return Ok(());
        }
        Err(DevaError::runtime(format!("'{name}' is not bound in any active scope")))
    }

    /// A `store` into a slot the compiler declared a name for is a
    /// variable declaration or assignment: bind that name in the active
    /// scope so later lookups (and `delete`) can find it, and — if the
    /// value is a freshly-created, still-unnamed class — backfill its
    /// display name from the same binding.
    fn bind_local_name(&mut self, frame_index: usize, slot: usize, value: &Object) {
        let Callee::Bytecode(fid) = self.call_stack[frame_index].callee else { return };
        let Some(def) = self.code.function(fid) else { return };
        let Some(name) = def.local_names.get(slot).cloned().flatten() else { return };
        if let Some(scope) = self.scopes.current_mut() {
            scope.add_symbol(name.clone(), Binding::Local { frame_index, slot });
        }
        let Object::Class(h) = value else { return };
        if let Some(data) = self.heaps.map_mut(*h) {
            if let MapTag::Class { name: existing } = &mut data.tag {
                if existing.is_empty() {
                    *existing = name;
                }
            }
        }
    }

    // --- indexing ---------------------------------------------------------

    fn as_index(index: &Object) -> DevaResult<usize> {
        match index {
            Object::Number(n) if n.0 >= 0.0 && n.0.fract() == 0.0 => Ok(n.0 as usize),
            Object::Number(_) => Err(DevaError::runtime("index must be a non-negative whole number")),
            _ => Err(DevaError::runtime("index must be a number")),
        }
    }

    fn tbl_load(&mut self, container: &Object, index: &Object) -> DevaResult<Object> {
        match container {
            Object::Vector(h) => {
                let i = Self::as_index(index)?;
                let raw = self
                    .heaps
                    .vector(*h)
                    .ok_or_else(|| DevaError::ice("tbl_load on a freed vector"))?
                    .items
                    .get(i)
                    .cloned()
                    .ok_or_else(|| DevaError::runtime("vector index out of range"))?;
                Ok(self.duplicate(&raw))
            }
            Object::Map(h) | Object::Class(h) | Object::Instance(h) => {
                let raw = self
                    .heaps
                    .map(*h)
                    .ok_or_else(|| DevaError::ice("tbl_load on a freed map"))?
                    .entries
                    .get(index)
                    .cloned()
                    .ok_or_else(|| DevaError::runtime("key not found"))?;
                Ok(self.duplicate(&raw))
            }
            _ => Err(DevaError::runtime("indexing requires a vector or map")),
        }
    }

    fn tbl_store(&mut self, container: &Object, index: Object, value: Object) -> DevaResult<()> {
        match container {
            Object::Vector(h) => {
                let i = Self::as_index(&index)?;
                self.discard(index);
                let data = self
                    .heaps
                    .vector_mut(*h)
                    .ok_or_else(|| DevaError::ice("tbl_store on a freed vector"))?;
                if i >= data.items.len() {
                    self.discard(value);
                    return Err(DevaError::runtime("vector index out of range"));
                }
                let old = std::mem::replace(&mut data.items[i], value);
                self.heaps.release(&old);
                Ok(())
            }
            Object::Map(h) | Object::Class(h) | Object::Instance(h) => {
                let removed = {
                    let data = self
                        .heaps
                        .map_mut(*h)
                        .ok_or_else(|| DevaError::ice("tbl_store on a freed map"))?;
                    data.entries.remove_entry(&index)
                };
                if let Some((old_key, old_value)) = removed {
                    self.heaps.release(&old_key);
                    self.heaps.release(&old_value);
                }
                let data = self
                    .heaps
                    .map_mut(*h)
                    .ok_or_else(|| DevaError::ice("tbl_store on a freed map"))?;
                data.entries.insert(index, value);
                Ok(())
            }
            _ => {
                self.discard(index);
                self.discard(value);
                Err(DevaError::runtime("indexing-store requires a vector or map"))
            }
        }
    }

    // --- calls ---------------------------------------------------------

    fn do_call(&mut self, nargs: u32, next_ip: usize) -> DevaResult<Option<Object>> {
        let nargs = nargs as usize;
        let callee = self.pop_resolved()?;
        if self.stack.len() < nargs {
            self.discard(callee);
            return Err(DevaError::ice("call: fewer arguments on the stack than declared"));
        }
        let args_start = self.stack.len() - nargs;
        let args: Vec<Object> = self.stack.split_off(args_start);
        match callee {
            Object::FunctionRef(fid) => {
                self.call_bytecode(fid, args, next_ip)?;
                Ok(None)
            }
            Object::Native(nid, _is_method) => {
                let builtins = std::mem::take(&mut self.builtins);
                let result = builtins.call(nid, self, args);
                self.builtins = builtins;
                self.push(result?);
                self.ip = next_ip;
                Ok(None)
            }
            other => {
                self.discard_all(&args);
                self.discard(other);
                Err(DevaError::runtime("call target is not callable"))
            }
        }
    }

    fn call_bytecode(&mut self, fid: FunctionId, mut args: Vec<Object>, return_addr: usize) -> DevaResult<()> {
        let def = self
            .code
            .function(fid)
            .ok_or_else(|| DevaError::ice("call to an unknown function id"))?
            .clone();
        let arg_count = def.arg_count as usize;
        let min_args = arg_count.saturating_sub(def.default_args.len());
        if args.len() < min_args || args.len() > arg_count {
            self.discard_all(&args);
            return Err(DevaError::runtime(format!(
                "'{}' expects {}..{} arguments, got {}",
                def.name,
                min_args,
                arg_count,
                args.len()
            )));
        }
        while args.len() < arg_count {
            let default_idx = def.default_args[args.len() - min_args];
            let constant = self
                .code
                .constant(default_idx)
                .ok_or_else(|| DevaError::ice("default-argument constant index out of range"))?;
            args.push(match constant {
                Constant::Number(n) => Object::number(*n),
                Constant::Str(s) => Object::Str(s.clone()),
            });
        }

        let num_locals = def.num_locals as usize;
        let num_args = args.len();
        let mut locals = vec![Object::Null; num_locals];
        for (slot, value) in args.into_iter().enumerate() {
            locals[slot] = value;
        }

        let parent = Some(self.current_frame_index()?);
        let mut frame = Frame::new(
            parent,
            Callee::Bytecode(fid),
            num_locals,
            num_args,
            Addr(return_addr as u32),
            Addr(self.ip as u32),
            false,
        );
        frame.locals = locals;
        self.call_stack.push(frame);
        self.scopes.push(Scope::new(ScopeKind::Function, self.call_stack.len() - 1));
        self.ip = def.code_offset.0 as usize;
        Ok(())
    }

    // --- dispatch ---------------------------------------------------------

    fn dispatch(&mut self, instr: Instr, next_ip: usize) -> DevaResult<Option<Object>> {
        match instr {
            Instr::Pop => {
                let v = self.pop_resolved()?;
                self.discard(v);
                self.ip = next_ip;
            }
            Instr::Push(c) => {
                let constant = self
                    .code
                    .constant(c)
                    .ok_or_else(|| DevaError::ice("constant index out of range"))?;
                let obj = match constant {
                    Constant::Number(n) => Object::number(*n),
                    Constant::Str(s) => Object::Str(s.clone()),
                };
                self.push(obj);
                self.ip = next_ip;
            }
            Instr::Load(l) => {
                let fi = self.current_frame_index()?;
                let idx = l.0 as usize;
                let num_locals = self.call_stack[fi].locals.len();
                let raw = if idx < num_locals {
                    let v = self.call_stack[fi].get_local_ref(idx).clone();
                    self.heaps.retain(&v);
                    v
                } else {
                    let name = self.dynamic_name(fi, idx, num_locals)?;
                    self.resolve_unknown(&name)?
                };
                self.push(raw);
                self.ip = next_ip;
            }
            Instr::Store(l) => {
                let v = self.pop_resolved()?;
                let fi = self.current_frame_index()?;
                self.bind_local_name(fi, l.0 as usize, &v);
                self.call_stack[fi].set_local(l.0 as usize, v, &mut self.heaps);
                self.ip = next_ip;
            }
            Instr::Dup(depth) => {
                let len = self.stack.len();
                let idx = len
                    .checked_sub(1 + depth as usize)
                    .ok_or_else(|| DevaError::ice("dup: depth beyond the stack"))?;
                let base = self.stack[idx].clone();
                let dup = self.duplicate(&base);
                self.push(dup);
                self.ip = next_ip;
            }
            Instr::Swap => {
                let a = self.raw_pop()?;
                let b = self.raw_pop()?;
                self.push(a);
                self.push(b);
                self.ip = next_ip;
            }
            Instr::NewMap => {
                let handle = self.heaps.alloc_map(crate::container::MapData::new());
                self.push(Object::Map(handle));
                self.ip = next_ip;
            }
            Instr::NewVec => {
                let handle = self.heaps.alloc_vector(VectorData::new());
                self.push(Object::Vector(handle));
                self.ip = next_ip;
            }
            Instr::NewClass => {
                let handle = self.heaps.alloc_map(crate::container::MapData::new_class(String::new()));
                self.push(Object::Class(handle));
                self.ip = next_ip;
            }
            Instr::NewInstance => {
                let class_obj = self.pop_resolved()?;
                let Object::Class(ch) = class_obj else {
                    self.discard(class_obj);
                    return Err(DevaError::runtime("new_instance requires a class"));
                };
                let class_name = self
                    .heaps
                    .map(ch)
                    .ok_or_else(|| DevaError::ice("new_instance on a freed class"))?
                    .display_name()
                    .unwrap_or("")
                    .to_string();
                let instance_data = {
                    let class_data = self
                        .heaps
                        .map(ch)
                        .ok_or_else(|| DevaError::ice("new_instance on a freed class"))?;
                    crate::container::MapData::new_instance(class_data, class_name)
                };
                for v in instance_data.entries.keys() {
                    self.heaps.retain(v);
                }
                for v in instance_data.entries.values() {
                    self.heaps.retain(v);
                }
                let handle = self.heaps.alloc_map(instance_data);
                self.discard(Object::Class(ch));
                self.push(Object::Instance(handle));
                self.ip = next_ip;
            }
            Instr::TblLoad => {
                let index = self.pop_resolved()?;
                let container = self.pop_resolved()?;
                let element = self.tbl_load(&container, &index)?;
                self.discard(index);
                self.discard(container);
                self.push(element);
                self.ip = next_ip;
            }
            Instr::TblStore => {
                let value = self.pop_resolved()?;
                let index = self.pop_resolved()?;
                let container = self.pop_resolved()?;
                self.tbl_store(&container, index, value)?;
                self.discard(container);
                self.ip = next_ip;
            }
            Instr::Jmp(a) => {
                self.ip = a.0 as usize;
            }
            Instr::Jmpf(a) => {
                let cond = self.pop_resolved()?;
                let falsy = self.is_falsy(&cond)?;
                self.discard(cond);
                self.ip = if falsy { a.0 as usize } else { next_ip };
            }
            Instr::Call(nargs) => return self.do_call(nargs, next_ip),
            Instr::Return => return self.execute_return(),
            Instr::Enter => {
                let fi = self.current_frame_index()?;
                self.scopes.push(Scope::new(ScopeKind::Block, fi));
                self.ip = next_ip;
            }
            Instr::Leave => {
                self.scopes
                    .pop()
                    .ok_or_else(|| DevaError::ice("leave with no open block scope"))?;
                self.ip = next_ip;
            }
            Instr::Halt(code) => {
                while let Some(mut frame) = self.call_stack.pop() {
                    frame.release_locals(&mut self.heaps);
                }
                self.heaps.drain_dead_pools();
                let pending: Vec<Object> = self.stack.drain(..).collect();
                self.discard_all(&pending);
                return Ok(Some(Object::number(code as f64)));
            }
            Instr::Nop | Instr::Defun(_) | Instr::Defarg(_) | Instr::Endf => {
                self.ip = next_ip;
            }
            Instr::Eq | Instr::Neq | Instr::Lt | Instr::Lte | Instr::Gt | Instr::Gte => {
                let right = self.pop_resolved()?;
                let left = self.pop_resolved()?;
                let ord = left.cmp(&right);
                let result = match instr {
                    Instr::Eq => ord == std::cmp::Ordering::Equal,
                    Instr::Neq => ord != std::cmp::Ordering::Equal,
                    Instr::Lt => ord == std::cmp::Ordering::Less,
                    Instr::Lte => ord != std::cmp::Ordering::Greater,
                    Instr::Gt => ord == std::cmp::Ordering::Greater,
                    Instr::Gte => ord != std::cmp::Ordering::Less,
                    _ => unreachable!(),
                };
                self.discard(left);
                self.discard(right);
                self.push(Object::Bool(result));
                self.ip = next_ip;
            }
            Instr::Or | Instr::And => {
                let right = self.pop_resolved()?;
                let left = self.pop_resolved()?;
                let lt = !self.is_falsy(&left)?;
                let rt = !self.is_falsy(&right)?;
                let result = if matches!(instr, Instr::Or) { lt || rt } else { lt && rt };
                self.discard(left);
                self.discard(right);
                self.push(Object::Bool(result));
                self.ip = next_ip;
            }
            Instr::Neg => {
                let v = self.pop_resolved()?;
                let result = match &v {
                    Object::Number(n) => Object::number(-n.0),
                    _ => {
                        self.discard(v);
                        return Err(DevaError::runtime("neg requires a number"));
                    }
                };
                self.discard(v);
                self.push(result);
                self.ip = next_ip;
            }
            Instr::Not => {
                let v = self.pop_resolved()?;
                let falsy = self.is_falsy(&v)?;
                self.discard(v);
                self.push(Object::Bool(falsy));
                self.ip = next_ip;
            }
            Instr::Add => {
                let right = self.pop_resolved()?;
                let left = self.pop_resolved()?;
                let result = match (&left, &right) {
                    (Object::Number(a), Object::Number(b)) => Ok(Object::number(a.0 + b.0)),
                    (Object::Str(a), Object::Str(b)) => Ok(Object::Str(format!("{a}{b}"))),
                    _ => Err(DevaError::runtime("add requires two numbers or two strings")),
                };
                self.discard(left);
                self.discard(right);
                self.push(result?);
                self.ip = next_ip;
            }
            Instr::Sub | Instr::Mul | Instr::Div | Instr::Mod => {
                let right = self.pop_resolved()?;
                let left = self.pop_resolved()?;
                let result = match (&left, &right) {
                    (Object::Number(a), Object::Number(b)) => match instr {
                        Instr::Sub => Ok(Object::number(a.0 - b.0)),
                        Instr::Mul => Ok(Object::number(a.0 * b.0)),
                        Instr::Div if b.0 == 0.0 => Err(DevaError::runtime("division by zero")),
                        Instr::Div => Ok(Object::number(a.0 / b.0)),
                        Instr::Mod if b.0 == 0.0 => Err(DevaError::runtime("division by zero")),
                        Instr::Mod => Ok(Object::number(a.0 % b.0)),
                        _ => unreachable!(),
                    },
                    _ => Err(DevaError::runtime("arithmetic requires two numbers")),
                };
                self.discard(left);
                self.discard(right);
                self.push(result?);
                self.ip = next_ip;
            }
            Instr::LineNum(n) => {
                self.current_line = Some(Line(n));
                self.ip = next_ip;
            }
            Instr::Roll(depth) => {
                let d = depth as usize;
                let len = self.stack.len();
                if d > len {
                    return Err(DevaError::ice("roll: depth beyond the stack"));
                }
                self.stack[len - d..].rotate_right(1);
                self.ip = next_ip;
            }
        }
        Ok(None)
    }
}
