//! Core layer - the wire vocabulary shared by the backend and the engine.
//!
//! This module provides:
//! - [`Value`] / [`ValueKind`] - Type-tagged wire values
//! - [`ValueTypeName`] - Wire type tags, including role names
//! - [`TimeCode`] / [`InterpolationMode`] - Time addressing
//! - [`Variability`], [`UpAxis`], [`Specifier`] - Schema enums

mod value;
mod value_type;
mod time;
mod enums;

pub use value::{Value, ValueKind, WireValue};
pub use value_type::ValueTypeName;
pub use time::{TimeCode, InterpolationMode};
pub use enums::{Variability, UpAxis, Specifier};
