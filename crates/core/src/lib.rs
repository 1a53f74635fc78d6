//! Shared vocabulary for the fieldsearch workspace.
//!
//! The interpreter in `fieldsearch-engine` resolves named fields against a
//! hierarchical content store. This crate holds the types that both sides of
//! that seam agree on: [`FieldValue`], the site path helpers and the
//! [`ContentStore`] / [`LinkStore`] traits.

pub mod path;
pub mod store;
pub mod value;

pub use path::{SitePrefix, canonicalize_path};
pub use store::{
    CHILDREN_LINK, ContentStore, LinkStore, PAGE_TYPE_LINK, PARENT_LINK, StoreError,
    StoreErrorKind,
};
pub use value::FieldValue;
