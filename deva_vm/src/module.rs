//! Ties a compiled [`Code`] to the top-level [`Scope`] and [`Frame`] the
//! executor runs it in.

use std::rc::Rc;

use deva_core::Code;

use crate::frame::Frame;
use crate::heaps::Heaps;
use crate::scope::Scope;

pub struct Module {
    pub code: Rc<Code>,
    pub scope: Scope,
    pub frame: Frame,
}

impl Module {
    pub fn new(code: Rc<Code>, scope: Scope, frame: Frame) -> Self {
        Module { code, scope, frame }
    }

    /// Release the module-level frame's locals. Split from
    /// [`Module::delete_scope`] so the executor can drain the dead pools
    /// in between, the way frame teardown does for ordinary calls.
    pub fn delete_scope_data(&mut self, heaps: &mut Heaps) {
        self.frame.release_locals(heaps);
    }

    /// Drop the scope itself once its data has been released. The scope
    /// holds no heap resources of its own; this exists mainly so the two
    /// teardown steps stay visually paired with the frame's.
    pub fn delete_scope(&mut self) {
        self.scope = Scope::new(self.scope.kind, self.scope.frame_index);
    }
}
