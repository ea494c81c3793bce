//! Runtime support for schema-generated XML beans.
//!
//! A code generator (out of scope here) emits one typed accessor class per
//! schema element; this crate supplies the machinery all of them share:
//!
//! - a property model ([`decl`], [`flags`], [`attr`]) describing each
//!   element's children and attributes,
//! - a lazy, bidirectional DOM binding ([`binding`]) that keeps property
//!   slots and XML nodes in sync, caching values for subtrees that are not
//!   attached to a document yet,
//! - change and vetoable-change notification with path-based event names
//!   ([`events`]),
//! - a recursive structural merge/compare between whole graphs
//!   ([`merge`], [`comparator`]).
//!
//! Everything hangs off a [`Graph`]: it owns the XML [`Document`], the bean
//! arena, the stable slot-identity counter and the comparator chain, so
//! there is no process-global state. Beans are addressed by [`BeanId`] and
//! array elements keep a permanent identity across index shifts, which is
//! what makes path names like `/Book/Chapter.1a/Line` stable for the life
//! of the graph.

pub mod attr;
mod bean;
mod binding;
pub mod comparator;
pub mod decl;
mod error;
pub mod events;
pub mod flags;
mod graph;
pub mod merge;
mod prop;
mod value;

pub use attr::{AttrKind, AttrOption, AttrProp};
pub use comparator::{BeanComparator, Comparison, DefaultComparator};
pub use decl::{convert_name, AttrDecl, NodeDecl, PropertyDecl, TypeRegistry};
pub use error::BindError;
pub use events::{ListenerId, PropertyChangeEvent};
pub use flags::{TypeFlags, ValueKind};
pub use graph::Graph;
pub use merge::MergeMode;
pub use value::{BeanId, Value};

pub use xmlbind_dom::{Document, NodeId};
