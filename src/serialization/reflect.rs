//! Member descriptor tables and the metadata reflection cache.
//!
//! A [`Sample`] lists its members once through [`SchemaBuilder`]; the
//! resulting [`SampleSchema`] is memoized per type by [`ReflectCache`],
//! which also memoizes each member's [`MemberInfo`].
//!
//! # Example
//!
//! ```ignore
//! impl Sample for MeshSample {
//!     fn describe(s: &mut SchemaBuilder<Self>) {
//!         s.schema_name("Mesh");
//!         s.field("points", |m| &m.points, |m| &mut m.points);
//!         s.field("extent", |m| &m.extent, |m| &mut m.extent).uniform();
//!         s.primvar("st", |m| &m.st, |m| &mut m.st);
//!     }
//! }
//! ```

use parking_lot::RwLock;
use smallvec::SmallVec;
use std::any::{Any, TypeId};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use super::{
    Connectable, DictionaryAccess, DynSample, FieldValue, PooledArray, Primvar, Relationship, Sample,
    SlotMut, SlotRef,
};
use crate::core::Variability;
use crate::util::{Error, Result};

// ============================================================================
// Annotations
// ============================================================================

/// Per-member serialization hint.
#[derive(Clone, Debug, PartialEq)]
pub enum Annotation {
    Uniform,
    Namespace(String),
    /// Legacy primvar marker on a plain member, with its element size.
    VertexData(i32),
    CustomData,
    Metadata,
    NonSerialized,
    Relationship,
    AssetPath,
    FusedDisplayColor,
    FusedTransform,
    ForceNoNamespace,
}

/// Shape of the slot a member exposes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotKind {
    Value,
    Primvar,
    Connectable,
    Relationship,
    Dictionary,
    Nested,
}

type FieldGet = Box<dyn for<'a> Fn(&'a dyn Any) -> Option<SlotRef<'a>> + Send + Sync>;
type FieldGetMut = Box<dyn for<'a> Fn(&'a mut dyn Any) -> Option<SlotMut<'a>> + Send + Sync>;
type PropGet = Box<dyn Fn(&dyn Any) -> Option<Box<dyn FieldValue>> + Send + Sync>;
type PropSet = Box<dyn Fn(&mut dyn Any, Box<dyn FieldValue>) -> Result<()> + Send + Sync>;

fn erase_get<F>(f: F) -> FieldGet
where
    F: for<'a> Fn(&'a dyn Any) -> Option<SlotRef<'a>> + Send + Sync + 'static,
{
    Box::new(f)
}

fn erase_get_mut<F>(f: F) -> FieldGetMut
where
    F: for<'a> Fn(&'a mut dyn Any) -> Option<SlotMut<'a>> + Send + Sync + 'static,
{
    Box::new(f)
}

/// How the engine reaches a member.
pub enum MemberAccess {
    /// Borrowed in place.
    Field { get: FieldGet, get_mut: FieldGetMut },
    /// Copied out through a getter and stored back through a setter.
    Property { get: PropGet, set: PropSet },
}

/// One declared member.
pub struct MemberDecl {
    pub name: String,
    pub kind: SlotKind,
    pub annotations: SmallVec<[Annotation; 2]>,
    pub access: MemberAccess,
}

impl MemberDecl {
    pub fn is_property(&self) -> bool {
        matches!(self.access, MemberAccess::Property { .. })
    }

    pub fn has(&self, annotation: &Annotation) -> bool {
        self.annotations.contains(annotation)
    }

    /// Borrow the member out of `sample` for writing.
    ///
    /// Properties cannot be borrowed; use [`get_owned`](Self::get_owned).
    pub fn get<'a>(&self, sample: &'a dyn Any) -> Option<SlotRef<'a>> {
        match &self.access {
            MemberAccess::Field { get, .. } => get(sample),
            MemberAccess::Property { .. } => None,
        }
    }

    pub fn get_mut<'a>(&self, sample: &'a mut dyn Any) -> Option<SlotMut<'a>> {
        match &self.access {
            MemberAccess::Field { get_mut, .. } => get_mut(sample),
            MemberAccess::Property { .. } => None,
        }
    }

    /// Copy a property's value out of `sample`.
    pub fn get_owned(&self, sample: &dyn Any) -> Option<Box<dyn FieldValue>> {
        match &self.access {
            MemberAccess::Property { get, .. } => get(sample),
            MemberAccess::Field { .. } => None,
        }
    }

    pub fn set_owned(&self, sample: &mut dyn Any, value: Box<dyn FieldValue>) -> Result<()> {
        match &self.access {
            MemberAccess::Property { set, .. } => set(sample, value),
            MemberAccess::Field { .. } => {
                Err(Error::InternalConsistency(format!("member '{}' is not a property", self.name)))
            }
        }
    }
}

impl fmt::Debug for MemberDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemberDecl")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("annotations", &self.annotations)
            .field("property", &self.is_property())
            .finish()
    }
}

// ============================================================================
// SchemaBuilder
// ============================================================================

/// Collects the member table of `S`.
pub struct SchemaBuilder<S> {
    schema_name: String,
    properties: Vec<MemberDecl>,
    fields: Vec<MemberDecl>,
    _marker: PhantomData<fn() -> S>,
}

/// Chains annotations onto the member just declared.
pub struct MemberBuilder<'b> {
    decl: &'b mut MemberDecl,
}

impl MemberBuilder<'_> {
    fn annotate(self, annotation: Annotation) -> Self {
        self.decl.annotations.push(annotation);
        self
    }

    /// Written and read at the default time code only.
    pub fn uniform(self) -> Self {
        self.annotate(Annotation::Uniform)
    }

    /// Prefix the attribute name with `ns:`.
    pub fn namespace(self, ns: &str) -> Self {
        self.annotate(Annotation::Namespace(ns.to_string()))
    }

    /// Store a plain member as a primvar with the given element size.
    pub fn vertex_data(self, element_size: i32) -> Self {
        self.annotate(Annotation::VertexData(element_size))
    }

    pub fn custom_data(self) -> Self {
        self.annotate(Annotation::CustomData)
    }

    pub fn metadata(self) -> Self {
        self.annotate(Annotation::Metadata)
    }

    pub fn non_serialized(self) -> Self {
        self.annotate(Annotation::NonSerialized)
    }

    /// String members become relationship targets.
    pub fn relationship(self) -> Self {
        self.annotate(Annotation::Relationship)
    }

    /// String members become asset paths.
    pub fn asset_path(self) -> Self {
        self.annotate(Annotation::AssetPath)
    }

    pub fn fused_display_color(self) -> Self {
        self.annotate(Annotation::FusedDisplayColor)
    }

    pub fn fused_transform(self) -> Self {
        self.annotate(Annotation::FusedTransform)
    }

    /// Keep a dictionary's entries out of a namespace named after the member.
    pub fn force_no_namespace(self) -> Self {
        self.annotate(Annotation::ForceNoNamespace)
    }
}

impl<S: Sample> SchemaBuilder<S> {
    fn new() -> Self {
        Self { schema_name: String::new(), properties: Vec::new(), fields: Vec::new(), _marker: PhantomData }
    }

    /// Prim type name used when defining prims for `S`.
    pub fn schema_name(&mut self, name: &str) -> &mut Self {
        self.schema_name = name.to_string();
        self
    }

    fn push_field(&mut self, name: &str, kind: SlotKind, get: FieldGet, get_mut: FieldGetMut) -> MemberBuilder<'_> {
        self.fields.push(MemberDecl {
            name: name.to_string(),
            kind,
            annotations: SmallVec::new(),
            access: MemberAccess::Field { get, get_mut },
        });
        let last = self.fields.len() - 1;
        MemberBuilder { decl: &mut self.fields[last] }
    }

    /// A plain value member.
    pub fn field<T: FieldValue>(
        &mut self,
        name: &str,
        get: fn(&S) -> &T,
        get_mut: fn(&mut S) -> &mut T,
    ) -> MemberBuilder<'_> {
        self.push_field(
            name,
            SlotKind::Value,
            erase_get(move |any| any.downcast_ref::<S>().map(|s| SlotRef::Value(get(s)))),
            erase_get_mut(move |any| any.downcast_mut::<S>().map(|s| SlotMut::Value(get_mut(s)))),
        )
    }

    pub fn primvar<T: FieldValue + Default>(
        &mut self,
        name: &str,
        get: fn(&S) -> &Primvar<T>,
        get_mut: fn(&mut S) -> &mut Primvar<T>,
    ) -> MemberBuilder<'_> {
        self.push_field(
            name,
            SlotKind::Primvar,
            erase_get(move |any| any.downcast_ref::<S>().map(|s| SlotRef::Primvar(get(s)))),
            erase_get_mut(move |any| any.downcast_mut::<S>().map(|s| SlotMut::Primvar(get_mut(s)))),
        )
    }

    pub fn connectable<T: FieldValue + Default>(
        &mut self,
        name: &str,
        get: fn(&S) -> &Connectable<T>,
        get_mut: fn(&mut S) -> &mut Connectable<T>,
    ) -> MemberBuilder<'_> {
        self.push_field(
            name,
            SlotKind::Connectable,
            erase_get(move |any| any.downcast_ref::<S>().map(|s| SlotRef::Connectable(get(s)))),
            erase_get_mut(move |any| any.downcast_mut::<S>().map(|s| SlotMut::Connectable(get_mut(s)))),
        )
    }

    pub fn relationship(
        &mut self,
        name: &str,
        get: fn(&S) -> &Relationship,
        get_mut: fn(&mut S) -> &mut Relationship,
    ) -> MemberBuilder<'_> {
        self.push_field(
            name,
            SlotKind::Relationship,
            erase_get(move |any| any.downcast_ref::<S>().map(|s| SlotRef::Relationship(get(s)))),
            erase_get_mut(move |any| any.downcast_mut::<S>().map(|s| SlotMut::Relationship(get_mut(s)))),
        )
    }

    /// A string-keyed map unrolled into one attribute per entry.
    pub fn dictionary<D: DictionaryAccess + 'static>(
        &mut self,
        name: &str,
        get: fn(&S) -> &D,
        get_mut: fn(&mut S) -> &mut D,
    ) -> MemberBuilder<'_> {
        self.push_field(
            name,
            SlotKind::Dictionary,
            erase_get(move |any| any.downcast_ref::<S>().map(|s| SlotRef::Dictionary(get(s)))),
            erase_get_mut(move |any| any.downcast_mut::<S>().map(|s| SlotMut::Dictionary(get_mut(s)))),
        )
    }

    /// A nested sample, flattened into its annotated namespace.
    ///
    /// Without a namespace the member is not serialized.
    pub fn nested<N: Sample>(
        &mut self,
        name: &str,
        get: fn(&S) -> &N,
        get_mut: fn(&mut S) -> &mut N,
    ) -> MemberBuilder<'_> {
        self.push_field(
            name,
            SlotKind::Nested,
            erase_get(move |any| any.downcast_ref::<S>().map(|s| SlotRef::Sample(get(s)))),
            erase_get_mut(move |any| any.downcast_mut::<S>().map(|s| SlotMut::Sample(get_mut(s)))),
        )
    }

    /// A computed member. Properties are visited before fields.
    pub fn property<T: FieldValue>(&mut self, name: &str, get: fn(&S) -> T, set: fn(&mut S, T)) -> MemberBuilder<'_> {
        let getter: PropGet = Box::new(move |any: &dyn Any| {
            any.downcast_ref::<S>().map(|s| Box::new(get(s)) as Box<dyn FieldValue>)
        });
        let owner = std::any::type_name::<S>();
        let setter: PropSet = Box::new(move |any: &mut dyn Any, value: Box<dyn FieldValue>| {
            let sample = any
                .downcast_mut::<S>()
                .ok_or_else(|| Error::type_mismatch(owner, "sample"))?;
            let value = value
                .into_any()
                .downcast::<T>()
                .map_err(|_| Error::type_mismatch(std::any::type_name::<T>(), "property value"))?;
            set(sample, *value);
            Ok(())
        });
        self.properties.push(MemberDecl {
            name: name.to_string(),
            kind: SlotKind::Value,
            annotations: SmallVec::new(),
            access: MemberAccess::Property { get: getter, set: setter },
        });
        let last = self.properties.len() - 1;
        MemberBuilder { decl: &mut self.properties[last] }
    }

    fn build(self) -> Result<SampleSchema> {
        let type_name = std::any::type_name::<S>();
        let members: Vec<MemberDecl> = self.properties.into_iter().chain(self.fields).collect();

        let mut seen = HashSet::new();
        for member in &members {
            if !seen.insert(member.name.as_str()) {
                return Err(Error::config(format!("{type_name}: duplicate member '{}'", member.name)));
            }
            for annotation in &member.annotations {
                if let Annotation::VertexData(size) = annotation {
                    if *size < 1 {
                        return Err(Error::config(format!(
                            "{type_name}.{}: element size must be at least 1, got {size}",
                            member.name
                        )));
                    }
                }
            }
        }

        Ok(SampleSchema { type_id: TypeId::of::<S>(), type_name, schema_name: self.schema_name, members })
    }
}

// ============================================================================
// SampleSchema / MemberInfo
// ============================================================================

/// The member table of one sample type.
#[derive(Debug)]
pub struct SampleSchema {
    pub type_id: TypeId,
    pub type_name: &'static str,
    /// Prim type name; empty for typeless prims.
    pub schema_name: String,
    /// Properties first, then fields, each in declaration order.
    pub members: Vec<MemberDecl>,
}

impl SampleSchema {
    /// Run `S::describe` and validate the result.
    pub fn of<S: Sample>() -> Result<Self> {
        let mut builder = SchemaBuilder::<S>::new();
        S::describe(&mut builder);
        builder.build()
    }

    pub fn member_index(&self, name: &str) -> Option<usize> {
        self.members.iter().position(|m| m.name == name)
    }
}

/// Identity of a member: owning sample type plus position in its table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MemberId {
    pub owner: TypeId,
    pub index: usize,
}

/// Serialization metadata resolved from a member's annotations.
#[derive(Clone, Debug, PartialEq)]
pub struct MemberInfo {
    pub id: MemberId,
    pub name: String,
    pub kind: SlotKind,
    pub variability: Variability,
    pub namespace: String,
    pub is_primvar: bool,
    pub element_size: i32,
    pub is_metadata: bool,
    pub is_custom_data: bool,
    pub is_relationship: bool,
    pub is_asset_path: bool,
    pub is_non_serialized: bool,
    pub force_no_namespace: bool,
    pub is_fused_display_color: bool,
    pub is_fused_transform: bool,
    pub is_property: bool,
}

impl MemberInfo {
    fn resolve(id: MemberId, decl: &MemberDecl) -> Self {
        let mut info = Self {
            id,
            name: decl.name.clone(),
            kind: decl.kind,
            variability: Variability::Varying,
            namespace: String::new(),
            is_primvar: decl.kind == SlotKind::Primvar,
            element_size: 1,
            is_metadata: false,
            is_custom_data: false,
            is_relationship: decl.kind == SlotKind::Relationship,
            is_asset_path: false,
            is_non_serialized: false,
            force_no_namespace: false,
            is_fused_display_color: false,
            is_fused_transform: false,
            is_property: decl.is_property(),
        };
        // First annotation of each kind wins.
        for annotation in decl.annotations.iter().rev() {
            match annotation {
                Annotation::Uniform => info.variability = Variability::Uniform,
                Annotation::Namespace(ns) => info.namespace = ns.clone(),
                Annotation::VertexData(size) => {
                    info.is_primvar = true;
                    info.element_size = *size;
                }
                Annotation::CustomData => info.is_custom_data = true,
                Annotation::Metadata => info.is_metadata = true,
                Annotation::NonSerialized => info.is_non_serialized = true,
                Annotation::Relationship => info.is_relationship = true,
                Annotation::AssetPath => info.is_asset_path = true,
                Annotation::FusedDisplayColor => info.is_fused_display_color = true,
                Annotation::FusedTransform => info.is_fused_transform = true,
                Annotation::ForceNoNamespace => info.force_no_namespace = true,
            }
        }
        info
    }
}

// ============================================================================
// ReflectCache
// ============================================================================

/// Thread-safe memo of schemas and member metadata.
#[derive(Default)]
pub struct ReflectCache {
    schemas: RwLock<HashMap<TypeId, Arc<SampleSchema>>>,
    entries: RwLock<HashMap<MemberId, Arc<MemberInfo>>>,
}

impl ReflectCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schema of the sample's concrete type, built on first use.
    pub fn get_schema(&self, sample: &dyn DynSample) -> Result<Arc<SampleSchema>> {
        let type_id = sample.sample_type();
        if let Some(schema) = self.schemas.read().get(&type_id) {
            return Ok(schema.clone());
        }
        let built = Arc::new(sample.build_schema()?);
        tracing::trace!("reflect: schema for {} ({} members)", built.type_name, built.members.len());
        let mut schemas = self.schemas.write();
        Ok(schemas.entry(type_id).or_insert(built).clone())
    }

    pub fn get_schema_of<S: Sample>(&self) -> Result<Arc<SampleSchema>> {
        let type_id = TypeId::of::<S>();
        if let Some(schema) = self.schemas.read().get(&type_id) {
            return Ok(schema.clone());
        }
        let built = Arc::new(SampleSchema::of::<S>()?);
        let mut schemas = self.schemas.write();
        Ok(schemas.entry(type_id).or_insert(built).clone())
    }

    /// Prim type name declared by `S`.
    pub fn schema_name<S: Sample>(&self) -> Result<String> {
        Ok(self.get_schema_of::<S>()?.schema_name.clone())
    }

    /// Metadata for member `index` of `schema`.
    pub fn get_cache_entry(&self, schema: &SampleSchema, index: usize) -> Result<Arc<MemberInfo>> {
        let id = MemberId { owner: schema.type_id, index };
        if let Some(info) = self.entries.read().get(&id) {
            return Ok(info.clone());
        }
        let decl = schema.members.get(index).ok_or_else(|| {
            Error::InternalConsistency(format!("{} has no member #{index}", schema.type_name))
        })?;
        let info = Arc::new(MemberInfo::resolve(id, decl));
        let mut entries = self.entries.write();
        Ok(entries.entry(id).or_insert(info).clone())
    }

    /// Move every array member out of `sample`, recursing into nested samples.
    ///
    /// Fails before touching anything if a member holds a multi-dimensional array.
    pub fn extract_arrays(&self, sample: &mut dyn DynSample) -> Result<Vec<PooledArray>> {
        self.check_ranks(&*sample)?;
        let mut out = Vec::new();
        self.take_arrays(sample, &mut out)?;
        Ok(out)
    }

    fn check_ranks(&self, sample: &dyn DynSample) -> Result<()> {
        let schema = self.get_schema(sample)?;
        for member in &schema.members {
            let rank = match &member.access {
                MemberAccess::Field { get, .. } => match get(sample.as_any()) {
                    Some(SlotRef::Value(v)) => v.declared_rank(),
                    Some(SlotRef::Sample(nested)) => {
                        self.check_ranks(nested)?;
                        0
                    }
                    _ => 0,
                },
                MemberAccess::Property { get, .. } => get(sample.as_any()).map_or(0, |v| v.declared_rank()),
            };
            if rank > 1 {
                return Err(Error::Unsupported(format!(
                    "{}.{}: multi-dimensional arrays cannot be released",
                    schema.type_name, member.name
                )));
            }
        }
        Ok(())
    }

    fn take_arrays(&self, sample: &mut dyn DynSample, out: &mut Vec<PooledArray>) -> Result<()> {
        let schema = self.get_schema(&*sample)?;
        for member in &schema.members {
            match &member.access {
                MemberAccess::Field { get_mut, .. } => match get_mut(sample.as_any_mut()) {
                    Some(SlotMut::Value(v)) => out.extend(v.take_array()),
                    Some(SlotMut::Sample(nested)) => self.take_arrays(nested, out)?,
                    _ => {}
                },
                MemberAccess::Property { get, set } => {
                    let Some(mut value) = get(sample.as_any()) else { continue };
                    if let Some(array) = value.take_array() {
                        out.push(array);
                        set(sample.as_any_mut(), value)?;
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Gauge {
        points: Vec<f32>,
        size: f64,
        label: String,
    }

    impl Sample for Gauge {
        fn describe(s: &mut SchemaBuilder<Self>) {
            s.schema_name("Gauge");
            s.field("points", |p| &p.points, |p| &mut p.points).vertex_data(3);
            s.field("size", |p| &p.size, |p| &mut p.size).uniform().namespace("info");
            s.property("label", |p| p.label.clone(), |p, v| p.label = v).metadata();
        }
    }

    #[derive(Default)]
    struct Grid {
        grid: Vec<Vec<f32>>,
    }

    impl Sample for Grid {
        fn describe(s: &mut SchemaBuilder<Self>) {
            s.field("grid", |g| &g.grid, |g| &mut g.grid);
        }
    }

    #[derive(Default)]
    struct BadSize {
        v: Vec<f32>,
    }

    impl Sample for BadSize {
        fn describe(s: &mut SchemaBuilder<Self>) {
            s.field("v", |b| &b.v, |b| &mut b.v).vertex_data(0);
        }
    }

    #[derive(Default)]
    struct Dup {
        a: i32,
    }

    impl Sample for Dup {
        fn describe(s: &mut SchemaBuilder<Self>) {
            s.field("a", |d| &d.a, |d| &mut d.a);
            s.field("a", |d| &d.a, |d| &mut d.a);
        }
    }

    #[test]
    fn test_properties_first() {
        let schema = SampleSchema::of::<Gauge>().expect("Failed to build schema");
        let names: Vec<_> = schema.members.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["label", "points", "size"]);
        assert_eq!(schema.schema_name, "Gauge");
    }

    #[test]
    fn test_cache_entry() {
        let cache = ReflectCache::new();
        let gauge = Gauge::default();
        let schema = cache.get_schema(&gauge).expect("Failed to get schema");

        let points = cache.get_cache_entry(&schema, 1).expect("Failed to get entry");
        assert!(points.is_primvar);
        assert_eq!(points.element_size, 3);
        assert_eq!(points.variability, Variability::Varying);

        let size = cache.get_cache_entry(&schema, 2).expect("Failed to get entry");
        assert_eq!(size.variability, Variability::Uniform);
        assert_eq!(size.namespace, "info");
        assert!(!size.is_primvar);
        assert_eq!(size.element_size, 1);

        let again = cache.get_cache_entry(&schema, 2).expect("Failed to get entry");
        assert!(Arc::ptr_eq(&size, &again));

        let label = cache.get_cache_entry(&schema, 0).expect("Failed to get entry");
        assert!(label.is_metadata && label.is_property);
    }

    #[test]
    fn test_build_errors() {
        assert!(matches!(SampleSchema::of::<BadSize>(), Err(Error::Configuration(_))));
        assert!(matches!(SampleSchema::of::<Dup>(), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_extract_arrays() {
        let cache = ReflectCache::new();
        let mut gauge = Gauge { points: vec![1.0, 2.0, 3.0], ..Default::default() };
        let arrays = cache.extract_arrays(&mut gauge).expect("Failed to extract");
        assert_eq!(arrays.len(), 1);
        assert_eq!(arrays[0].len, 3);
        assert!(gauge.points.is_empty());

        let mut grid = Grid { grid: vec![vec![1.0]] };
        assert!(matches!(cache.extract_arrays(&mut grid), Err(Error::Unsupported(_))));
        assert_eq!(grid.grid.len(), 1);
    }
}
