//! Payloads stored behind the ref-counted [`Handle`](crate::heap::Handle)s:
//! vectors, and the map/class/instance family which all share a single
//! underlying ordered mapping, distinguished only by a tag.

use std::collections::BTreeMap;

use crate::value::Object;

#[derive(Debug, Clone, Default)]
pub struct VectorData {
    pub items: Vec<Object>,
}

impl VectorData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sized(n: usize) -> Self {
        VectorData {
            items: vec![Object::Null; n],
        }
    }

    pub fn slice(&self, start: usize, end: usize) -> VectorData {
        VectorData {
            items: self.items[start.min(self.items.len())..end.min(self.items.len())].to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MapTag {
    Plain,
    Class { name: String },
    Instance { class_name: String },
}

#[derive(Debug, Clone)]
pub struct MapData {
    pub entries: BTreeMap<Object, Object>,
    pub tag: MapTag,
}

impl MapData {
    pub fn new() -> Self {
        MapData {
            entries: BTreeMap::new(),
            tag: MapTag::Plain,
        }
    }

    pub fn new_class(name: impl Into<String>) -> Self {
        MapData {
            entries: BTreeMap::new(),
            tag: MapTag::Class { name: name.into() },
        }
    }

    /// Shallow-copy a class's entries into a fresh instance map; the new
    /// instance inherits its class's keys at construction. Element
    /// values keep shared identity with the class's own values; the
    /// caller is responsible for incrementing refs on any compound
    /// values copied across.
    pub fn new_instance(class: &MapData, class_name: impl Into<String>) -> MapData {
        MapData {
            entries: class.entries.clone(),
            tag: MapTag::Instance {
                class_name: class_name.into(),
            },
        }
    }

    pub fn is_class(&self) -> bool {
        matches!(self.tag, MapTag::Class { .. })
    }

    pub fn is_instance(&self) -> bool {
        matches!(self.tag, MapTag::Instance { .. })
    }

    pub fn display_name(&self) -> Option<&str> {
        match &self.tag {
            MapTag::Plain => None,
            MapTag::Class { name } => Some(name),
            MapTag::Instance { class_name } => Some(class_name),
        }
    }
}

impl Default for MapData {
    fn default() -> Self {
        Self::new()
    }
}
