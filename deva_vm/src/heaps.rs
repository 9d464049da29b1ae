//! The two per-type dead pools: one [`Heap`] of vectors, one of maps
//! (maps double as the backing store for classes and instances).
//! [`Heaps::drain_dead_pools`] is the only place
//! compound values are actually destroyed, and it recurses into whatever
//! each dying container referenced so nested vectors-of-vectors and
//! maps-of-maps don't leak a reference.

use crate::container::{MapData, VectorData};
use crate::heap::{Handle, Heap};
use crate::value::Object;

#[derive(Default)]
pub struct Heaps {
    pub vectors: Heap<VectorData>,
    pub maps: Heap<MapData>,
}

impl Heaps {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc_vector(&mut self, data: VectorData) -> Handle {
        self.vectors.alloc(data)
    }

    pub fn alloc_map(&mut self, data: MapData) -> Handle {
        self.maps.alloc(data)
    }

    /// Increment the refcount behind a compound `Object`; a no-op for
    /// value types.
    pub fn retain(&mut self, obj: &Object) {
        match obj {
            Object::Vector(h) => self.vectors.inc_ref(*h),
            Object::Map(h) | Object::Class(h) | Object::Instance(h) => self.maps.inc_ref(*h),
            _ => {}
        }
    }

    /// Decrement the refcount behind a compound `Object`, queuing it in
    /// the dead pool on reaching zero. Does not recurse or free anything
    /// by itself — draining happens only at a safe point.
    pub fn release(&mut self, obj: &Object) {
        match obj {
            Object::Vector(h) => self.vectors.dec_ref(*h),
            Object::Map(h) | Object::Class(h) | Object::Instance(h) => self.maps.dec_ref(*h),
            _ => {}
        }
    }

    /// Alias for [`Heaps::retain`]: values are shared by handle identity,
    /// never deep-copied, so retaining "shallowly" and retaining are the
    /// same operation.
    pub fn retain_shallow(&mut self, obj: &Object) {
        self.retain(obj);
    }

    /// Drain both dead pools to a fixed point: freeing a vector or map
    /// releases every `Object` it held, which may itself drive another
    /// container's refcount to zero in the same pass.
    pub fn drain_dead_pools(&mut self) {
        loop {
            let dead_vectors = self.vectors.drain_dead();
            let dead_maps = self.maps.drain_dead();
            if dead_vectors.is_empty() && dead_maps.is_empty() {
                break;
            }
            for v in dead_vectors {
                for item in &v.items {
                    self.release(item);
                }
            }
            for m in dead_maps {
                for (k, v) in &m.entries {
                    self.release(k);
                    self.release(v);
                }
            }
        }
    }

    pub fn vector(&self, h: Handle) -> Option<&VectorData> {
        self.vectors.get(h)
    }

    pub fn vector_mut(&mut self, h: Handle) -> Option<&mut VectorData> {
        self.vectors.get_mut(h)
    }

    pub fn map(&self, h: Handle) -> Option<&MapData> {
        self.maps.get(h)
    }

    pub fn map_mut(&mut self, h: Handle) -> Option<&mut MapData> {
        self.maps.get_mut(h)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_vector_release_cascades_through_drain() {
        let mut heaps = Heaps::new();
        let inner = heaps.alloc_vector(VectorData {
            items: vec![Object::number(1.0)],
        });
        let outer = heaps.alloc_vector(VectorData {
            items: vec![Object::Vector(inner)],
        });

        assert_eq!(heaps.vectors.ref_count(inner), 1);
        heaps.release(&Object::Vector(outer));
        heaps.drain_dead_pools();

        assert!(heaps.vector(outer).is_none(), "outer freed");
        assert!(
            heaps.vector(inner).is_none(),
            "inner released transitively when outer was drained"
        );
    }
}
