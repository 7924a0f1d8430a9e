//! # usd-io
//!
//! Typed, time-aware serialization of plain data objects onto a USD-style
//! scene graph.
//!
//! A [`Sample`](serialization::Sample) declares its members once; the engine
//! maps each member onto a namespaced, typed, time-sampled attribute of a
//! prim and back. Reads can record which members vary over time so later
//! frames only touch those.
//!
//! ## Modules
//!
//! - [`util`] - Errors, paths, tokens, namespace joining
//! - [`core`] - Wire values, type names, time codes
//! - [`stage`] - Scene backend trait and the in-memory JSON-backed stage
//! - [`serialization`] - Type binding, member reflection, the engine
//! - [`scene`] - Caller-facing [`Scene`] handle
//!
//! ## Example
//!
//! ```ignore
//! use usd_io::prelude::*;
//!
//! #[derive(Default)]
//! struct CubeSample {
//!     size: f64,
//!     color: Primvar<Vec<Vec3>>,
//! }
//!
//! impl Sample for CubeSample {
//!     fn describe(s: &mut SchemaBuilder<Self>) {
//!         s.schema_name("Cube");
//!         s.field("size", |c| &c.size, |c| &mut c.size);
//!         s.primvar("displayColor", |c| &c.color, |c| &mut c.color);
//!     }
//! }
//!
//! let scene = Scene::create();
//! scene.write(&SdfPath::new("/World/Cube")?, &CubeSample::default())?;
//! ```

pub mod util;
pub mod core;
pub mod stage;
pub mod serialization;
pub mod scene;

// Re-export commonly used types
pub use util::{Error, Result, SdfPath, Token};
pub use scene::{Scene, WriteMode};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::util::{AssetPath, Error, Result, SdfPath, Token};
    pub use crate::core::{InterpolationMode, TimeCode, UpAxis, Value, ValueTypeName, Variability};
    pub use crate::serialization::{
        AccessMask, Connectable, Dynamic, Primvar, PrimvarInterpolation, Relationship, Sample,
        SchemaBuilder, SerializationContext,
    };
    pub use crate::stage::{MemoryStage, SceneBackend};
    pub use crate::scene::{Scene, WriteMode};
    pub use glam::{DMat4, Vec2, Vec3, Vec4};
}
