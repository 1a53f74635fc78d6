//! Interfaces of the hierarchical store the interpreter reads from.
//!
//! Both traits are read-only from the interpreter's point of view and must be
//! safe to share between concurrent runs; any locking is up to the implementor.

mod error;

pub use error::{StoreError, StoreErrorKind};

use crate::value::FieldValue;

/// Link from a page to each of its direct children.
pub const CHILDREN_LINK: &str = "children";
/// Link from a page to its direct parent.
pub const PARENT_LINK: &str = "parent";
/// Link from a page to the page describing its type.
pub const PAGE_TYPE_LINK: &str = "page-type";

/// Rows of named fields keyed by absolute path.
pub trait ContentStore: Send + Sync {
    /// Whether a row exists for `path`.
    fn exists(&self, path: &str) -> Result<bool, StoreError>;

    /// The value of `field` on the row at `path`, `None` when either is missing.
    ///
    /// A stored null is reported as `Some(FieldValue::Null)`.
    fn get_field(&self, path: &str, field: &str) -> Result<Option<FieldValue>, StoreError>;
}

/// Named, directional relations between absolute paths.
pub trait LinkStore: Send + Sync {
    /// Destination of the unique link `name` leaving `source`.
    fn find_link(&self, source: &str, name: &str) -> Result<Option<String>, StoreError>;

    /// Destinations of the [`CHILDREN_LINK`] relation of `path`, in insertion order.
    fn children(&self, path: &str) -> Result<Vec<String>, StoreError>;
}
