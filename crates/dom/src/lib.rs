//! Output sink for resolved fields.
//!
//! A [`Document`] is an arena of nodes behind a shared handle; a [`NodeRef`]
//! is a cursor into it. Cursors are cheap to clone and can be embedded in
//! programs, so the tree is guarded by a lock even though a single document is
//! only ever written by one interpreter run at a time.

mod document;
mod markup;
mod serialize;

pub use document::{Document, NodeId, NodeKind, NodeRef};
pub use markup::MarkupError;
