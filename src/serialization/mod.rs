//! Typed sample serialization.
//!
//! - [`Sample`] / [`SchemaBuilder`] - Declare a type's members once
//! - [`TypeBinder`] - Host type <-> wire type conversions
//! - [`ReflectCache`] - Memoized schemas and per-member metadata
//! - [`TokenCache`] - Interned namespaced property names
//! - [`AccessMask`] - Per-prim record of time-varying members
//! - [`UsdIo`] - The engine: write and read samples against a backend
//! - [`SerializationContext`] - Owns the caches and the array pool

mod access_mask;
mod array_pool;
mod connectable;
mod context;
mod field;
mod primvar;
mod reflect;
mod relationship;
mod sample;
mod token_cache;
mod type_binder;
mod usd_io;

pub use access_mask::{AccessMask, DeserializationContext, MayVary};
pub use array_pool::{ArrayAllocator, ArrayPool, ArrayUnpool};
pub use connectable::{Connectable, ConnectableAccess};
pub use context::SerializationContext;
pub use field::{
    assign_boxed, ArrayElement, BoxedValue, Dynamic, EnumVTable, FieldValue, PooledArray, SampleVTable,
    TypeInfo, UsdEnum,
};
pub use primvar::{Primvar, PrimvarAccess, PrimvarInterpolation};
pub use reflect::{
    Annotation, MemberAccess, MemberBuilder, MemberDecl, MemberId, MemberInfo, ReflectCache, SampleSchema,
    SchemaBuilder, SlotKind,
};
pub use relationship::Relationship;
pub use sample::{DictElement, DictionaryAccess, DynSample, Sample, SlotMut, SlotRef};
pub use token_cache::TokenCache;
pub use type_binder::{
    short_type_name, value_to_name, ArrayConverter, BinderConfig, FromWire, IntrinsicConverter, NativeOps,
    ToWire, TokenConverter, TypeBinder, TypeBinding,
};
pub use usd_io::{UsdIo, SOURCE_MEMBER_KEY};
