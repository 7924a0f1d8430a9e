//! Utility types shared by every layer.
//!
//! - [`Error`] / [`Result`] - Error handling
//! - [`SdfPath`] - Prim and property paths
//! - [`Token`] / [`AssetPath`] - Interned names and asset references
//! - [`join_namespace`] - Namespaced property names

mod error;
mod namespace;
mod path;
mod token;

pub use error::*;
pub use namespace::*;
pub use path::*;
pub use token::*;
