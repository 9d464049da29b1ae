//! Activation record for one function invocation.

use deva_core::{Addr, FunctionId};

use crate::heaps::Heaps;
use crate::value::{NativeId, Object};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Callee {
    Bytecode(FunctionId),
    Native(NativeId),
}

#[derive(Debug)]
pub struct Frame {
    pub parent: Option<usize>,
    pub callee: Callee,
    /// Arguments occupy the front `num_args` slots; the rest are locals
    /// declared within the function body.
    pub locals: Vec<Object>,
    pub num_args: usize,
    pub return_addr: Addr,
    pub call_site: Addr,
    /// Heap strings created by actions in this frame (as opposed to ones
    /// that came straight from the constant pool), freed when the frame
    /// is torn down.
    owned_strings: Vec<String>,
    pub is_module: bool,
}

impl Frame {
    pub fn new(
        parent: Option<usize>,
        callee: Callee,
        num_locals: usize,
        num_args: usize,
        return_addr: Addr,
        call_site: Addr,
        is_module: bool,
    ) -> Self {
        Frame {
            parent,
            callee,
            locals: vec![Object::Null; num_locals],
            num_args,
            return_addr,
            call_site,
            owned_strings: Vec::new(),
            is_module,
        }
    }

    pub fn get_local(&self, i: usize) -> Object {
        self.locals[i].clone()
    }

    pub fn get_local_ref(&self, i: usize) -> &Object {
        &self.locals[i]
    }

    /// Overwrite local `i`, releasing whatever compound value was there.
    /// Does not retain `value` — callers hand over ownership of the ref
    /// they already hold (see the module doc on `Executor`'s transfer
    /// convention).
    pub fn set_local(&mut self, i: usize, value: Object, heaps: &mut Heaps) {
        heaps.release(&self.locals[i]);
        self.locals[i] = value;
    }

    pub fn num_args_passed(&self) -> usize {
        self.num_args
    }

    pub fn add_string(&mut self, s: String) -> &str {
        self.owned_strings.push(s);
        self.owned_strings.last().unwrap()
    }

    /// Release every compound local's reference. Called at frame
    /// teardown, before the dead pools are drained.
    pub fn release_locals(&mut self, heaps: &mut Heaps) {
        for slot in &self.locals {
            heaps.release(slot);
        }
    }
}
