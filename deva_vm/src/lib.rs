//! The runtime half of the execution core: the ref-counted heaps, the
//! tagged value type, call frames and lexical scopes, the built-in
//! method tables, and the fetch-decode-execute loop that ties them
//! together. `deva_core` defines the bytecode artifact this crate loads
//! and runs.

pub mod breakpoint;
pub mod builtins;
pub mod container;
pub mod executor;
pub mod frame;
pub mod heap;
pub mod heaps;
pub mod module;
pub mod scope;
pub mod value;

pub use breakpoint::Breakpoint;
pub use container::{MapData, MapTag, VectorData};
pub use executor::{Compiler, Executor};
pub use frame::{Callee, Frame};
pub use heap::{Handle, Heap};
pub use heaps::Heaps;
pub use module::Module;
pub use scope::{Binding, Scope, ScopeKind, ScopeTable};
pub use value::{NativeId, Object, OrderedFloat};
