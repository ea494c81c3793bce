//! Arena-backed mutable XML DOM.
//!
//! The binding runtime keeps a bean graph and an XML tree in lockstep; this
//! crate provides the tree side. Nodes live in a flat arena owned by
//! [`Document`] and reference each other through [`NodeId`] indices, so the
//! binding layer can hold on to node handles without reference cycles.
//!
//! Textual XML only exists at the boundary: [`io::parse_document`] and
//! [`io::write_document`] convert between byte streams and the arena via
//! `quick-xml`. Everything in between is structural mutation.

mod document;
pub mod io;

pub use document::{Document, Node, NodeId, NodeKind};
pub use io::XmlError;
