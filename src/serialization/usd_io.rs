//! The serialization engine.
//!
//! [`UsdIo::serialize`] walks a sample's members in schema order (properties,
//! then fields) and writes each one to a prim; [`UsdIo::deserialize`] walks
//! the same order and reads them back. Member shapes are dispatched through
//! [`SlotRef`] / [`SlotMut`]:
//!
//! - plain values go through a [`TypeBinding`]
//! - primvars and connectables are unwrapped, then their extras (element
//!   size, interpolation, indices, connection) are authored alongside
//! - dictionaries are unrolled into one attribute per entry under a namespace
//! - relationships become target lists
//! - nested samples recurse under an extended namespace
//!
//! Every backend call runs under the stage lock, held only for that call.
//! Cache lookups (bindings, member metadata, tokens) never take it.

use parking_lot::Mutex;
use std::any::TypeId;
use std::collections::HashSet;
use std::sync::Arc;

use super::{
    DictionaryAccess, DynSample, FieldValue, MayVary, MemberDecl, MemberId, MemberInfo,
    PrimvarAccess, PrimvarInterpolation, Relationship, SerializationContext, SlotMut, SlotRef,
    TypeBinding, TypeInfo,
};
use crate::core::{TimeCode, Value, ValueKind, Variability};
use crate::stage::{
    AttributeHandle, SceneBackend, SparseValueWriter, DISPLAY_COLOR, INDICES_SUFFIX, XFORM_OP_ORDER,
};
use crate::util::{join_namespace, Error, Result, SdfPath, Token, PRIMVARS_NAMESPACE};

/// Custom-data key naming the member an unrolled attribute came from.
pub const SOURCE_MEMBER_KEY: &str = "sourceMember";

/// Interpolation given to a primvar when it is first created.
const DEFAULT_PRIMVAR_INTERPOLATION: &str = "vertex";

/// Backend plus the per-stage sparse writer, guarded together.
struct StageState {
    backend: Box<dyn SceneBackend>,
    sparse: SparseValueWriter,
}

/// Extras authored next to a value.
#[derive(Clone, Copy)]
enum WriteExtras<'a> {
    None,
    Primvar(&'a dyn PrimvarAccess),
    Connection(Option<&'a str>),
}

/// Outcome of a single value read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ReadOutcome {
    /// A value was found and assigned.
    Assigned,
    /// Nothing authored; the member was left untouched.
    Absent,
    /// The member cannot be represented (no binding, no namespace context).
    Unrepresentable,
}

impl ReadOutcome {
    fn succeeded(self) -> bool {
        self != ReadOutcome::Unrepresentable
    }
}

/// Reads and writes samples against one scene backend.
pub struct UsdIo {
    ctx: Arc<SerializationContext>,
    stage: Mutex<StageState>,
}

impl UsdIo {
    /// Engine over `backend` using the process-wide context.
    pub fn new(backend: Box<dyn SceneBackend>) -> Self {
        Self::with_context(SerializationContext::shared(), backend)
    }

    pub fn with_context(ctx: Arc<SerializationContext>, backend: Box<dyn SceneBackend>) -> Self {
        Self {
            ctx,
            stage: Mutex::new(StageState { backend, sparse: SparseValueWriter::new() }),
        }
    }

    pub fn context(&self) -> &Arc<SerializationContext> {
        &self.ctx
    }

    /// Run `f` against the backend under the stage lock.
    pub fn with_stage<R>(&self, f: impl FnOnce(&mut dyn SceneBackend) -> R) -> R {
        let mut stage = self.stage.lock();
        f(stage.backend.as_mut())
    }

    /// Swap in a new backend, forgetting sparse-writer history.
    pub fn replace_backend(&self, backend: Box<dyn SceneBackend>) -> Box<dyn SceneBackend> {
        let mut stage = self.stage.lock();
        stage.sparse.clear();
        std::mem::replace(&mut stage.backend, backend)
    }

    /// Time samples skipped so far because they repeated the previous one.
    pub fn elided_samples(&self) -> usize {
        self.stage.lock().sparse.elided()
    }

    // ========================================================================
    // Write path
    // ========================================================================

    /// Write every serializable member of `sample` to `prim` at `time`.
    ///
    /// `ns` prefixes every attribute name; nested samples pass their
    /// extended namespace here. Members that cannot be represented are
    /// skipped and logged; schema errors abort the write, possibly leaving
    /// earlier members written.
    pub fn serialize(
        &self,
        sample: &dyn DynSample,
        prim: &SdfPath,
        time: TimeCode,
        ns: &str,
    ) -> Result<()> {
        let reflect = self.ctx.reflect();
        let schema = reflect.get_schema(sample)?;

        for (index, decl) in schema.members.iter().enumerate() {
            let info = reflect.get_cache_entry(&schema, index)?;
            if info.is_non_serialized {
                continue;
            }

            let written = if decl.is_property() {
                let owned = decl.get_owned(sample.as_any()).ok_or_else(|| missing_member(&info))?;
                self.write_member(&info, SlotRef::Value(owned.as_ref()), prim, time, ns)?
            } else {
                let slot = decl.get(sample.as_any()).ok_or_else(|| missing_member(&info))?;
                self.write_member(&info, slot, prim, time, ns)?
            };

            if !written {
                tracing::debug!("write {prim}: skipped unrepresentable member '{}'", info.name);
            }
        }
        Ok(())
    }

    fn write_member(
        &self,
        info: &MemberInfo,
        slot: SlotRef<'_>,
        prim: &SdfPath,
        time: TimeCode,
        ns: &str,
    ) -> Result<bool> {
        if info.is_metadata || info.is_custom_data {
            if let SlotRef::Value(value) = &slot {
                if value.is_dynamic() {
                    return Err(Error::schema(format!(
                        "'{}' is stored as metadata and cannot be type-erased",
                        info.name
                    )));
                }
            }
        }
        self.write_attr(&info.name, slot, info, prim, time, ns, None)
    }

    #[allow(clippy::too_many_arguments)]
    fn write_attr(
        &self,
        attr_name: &str,
        slot: SlotRef<'_>,
        info: &MemberInfo,
        prim: &SdfPath,
        time: TimeCode,
        ns: &str,
        source: Option<&str>,
    ) -> Result<bool> {
        let full_ns = join_namespace(ns, &info.namespace);

        match slot {
            SlotRef::Dictionary(dict) => {
                self.write_dictionary(attr_name, dict, info, prim, time, ns)
            }
            SlotRef::Relationship(rel) => match rel.target_paths.as_deref() {
                Some(targets) => self.write_targets(&full_ns, attr_name, targets, prim),
                None => Ok(true),
            },
            SlotRef::Sample(nested) => self.write_nested(nested, prim, time, &full_ns),
            SlotRef::Primvar(pv) => match pv.held() {
                Some(held) if held.value().is_some() => self.write_value(
                    attr_name, held, WriteExtras::Primvar(pv), info, prim, time, &full_ns, source,
                ),
                _ => Ok(true),
            },
            SlotRef::Connectable(c) => self.write_value(
                attr_name,
                c.held(),
                WriteExtras::Connection(c.connected_path()),
                info,
                prim,
                time,
                &full_ns,
                source,
            ),
            SlotRef::Value(value) if info.is_relationship => {
                match relationship_targets(value)? {
                    Some(targets) => self.write_targets(&full_ns, attr_name, &targets, prim),
                    None => Ok(true),
                }
            }
            SlotRef::Value(value) => self.write_value(
                attr_name,
                value,
                WriteExtras::None,
                info,
                prim,
                time,
                &full_ns,
                source,
            ),
        }
    }

    /// One attribute per entry, named `<member>:<key>` unless the member
    /// carries its own namespace or opts out.
    fn write_dictionary(
        &self,
        attr_name: &str,
        dict: &dyn DictionaryAccess,
        info: &MemberInfo,
        prim: &SdfPath,
        time: TimeCode,
        ns: &str,
    ) -> Result<bool> {
        let entry_ns = if !info.force_no_namespace && info.namespace.is_empty() {
            join_namespace(ns, attr_name)
        } else {
            ns.to_string()
        };

        let mut all = true;
        dict.visit(&mut |key, slot| {
            all &= self.write_attr(key, slot, info, prim, time, &entry_ns, Some(attr_name))?;
            Ok(())
        })?;
        Ok(all)
    }

    fn write_targets(
        &self,
        ns: &str,
        attr_name: &str,
        targets: &[String],
        prim: &SdfPath,
    ) -> Result<bool> {
        let name = self.ctx.tokens().intern(ns, attr_name);
        let paths = targets.iter().map(|t| SdfPath::new(t)).collect::<Result<Vec<_>>>()?;
        let mut stage = self.stage.lock();
        let rel = stage.backend.create_relationship(prim, &name)?;
        stage.backend.set_targets(&rel, &paths)?;
        Ok(true)
    }

    fn write_nested(
        &self,
        nested: &dyn DynSample,
        prim: &SdfPath,
        time: TimeCode,
        ns: &str,
    ) -> Result<bool> {
        if ns.is_empty() {
            tracing::debug!(
                "write {prim}: nested {} has no namespace, skipped",
                nested.sample_type_name()
            );
            return Ok(false);
        }
        self.serialize(nested, prim, time, ns)?;
        Ok(true)
    }

    #[allow(clippy::too_many_arguments)]
    fn write_value(
        &self,
        attr_name: &str,
        value: &dyn FieldValue,
        extras: WriteExtras<'_>,
        info: &MemberInfo,
        prim: &SdfPath,
        time: TimeCode,
        ns: &str,
        source: Option<&str>,
    ) -> Result<bool> {
        let Some(any) = value.value() else {
            return Ok(true);
        };

        let ty = value.runtime_type();
        let Some(binding) = self.binding_for(&ty, info) else {
            if ns.is_empty() {
                return Ok(false);
            }
            let nested = ty
                .sample
                .and_then(|vt| (vt.as_sample)(any))
                .ok_or_else(|| {
                    Error::schema(format!("'{}': {} is not a Sample", info.name, ty.name))
                })?;
            return self.write_nested(nested, prim, time, ns);
        };

        let wire = binding.to_wire(any)?;
        let time = effective_time(info, time);
        let name = self.ctx.tokens().intern(ns, attr_name);

        let mut stage = self.stage.lock();
        let StageState { backend, sparse } = &mut *stage;

        if info.is_metadata {
            backend.set_metadata(prim, &name, wire)?;
            return Ok(true);
        }
        if info.is_custom_data {
            backend.set_custom_data(prim, &name, wire)?;
            return Ok(true);
        }
        if info.is_fused_display_color {
            backend.set_fused_display_color(prim, wire, time)?;
            if let Some(attr) = backend.get_attribute(prim, DISPLAY_COLOR) {
                author_extras(backend.as_mut(), &attr, extras, info, time)?;
            }
            return Ok(true);
        }

        let attr = if info.is_primvar || matches!(extras, WriteExtras::Primvar(_)) {
            backend.create_primvar(
                prim,
                &join_namespace(ns, attr_name),
                binding.type_name,
                &Token::new(DEFAULT_PRIMVAR_INTERPOLATION),
            )?
        } else {
            backend.create_attribute(prim, &name, binding.type_name, info.variability)?
        };

        author_extras(backend.as_mut(), &attr, extras, info, time)?;
        sparse.set_attribute(backend.as_mut(), &attr, wire, time)?;

        if let Some(source) = source {
            let source = Value::String(source.to_string());
            backend.set_attribute_custom_data(&attr, SOURCE_MEMBER_KEY, source)?;
        }
        if info.is_fused_transform {
            ensure_op_order(backend.as_mut(), prim, &name)?;
        }
        Ok(true)
    }

    fn binding_for(&self, ty: &TypeInfo, info: &MemberInfo) -> Option<Arc<TypeBinding>> {
        if info.is_asset_path {
            return Some(self.ctx.binder().asset_path());
        }
        self.ctx.binder().get_binding(ty)
    }

    // ========================================================================
    // Read path
    // ========================================================================

    /// Read every serializable member of `sample` from `prim` at `time`.
    ///
    /// With an access set and `may_vary` applicable, members found to vary
    /// are added to the set and `may_vary` is confirmed. With an access set
    /// and `may_vary` inapplicable, only members already in the set are
    /// read. Returns false if some member could not be represented.
    pub fn deserialize(
        &self,
        sample: &mut dyn DynSample,
        prim: &SdfPath,
        time: TimeCode,
        mut access: Option<&mut HashSet<MemberId>>,
        may_vary: &mut MayVary,
        ns: &str,
    ) -> Result<bool> {
        let reflect = self.ctx.reflect();
        let schema = reflect.get_schema(&*sample)?;
        let filtering = access.is_some() && !may_vary.is_applicable();

        let mut all = true;
        for (index, decl) in schema.members.iter().enumerate() {
            let info = reflect.get_cache_entry(&schema, index)?;
            if info.is_non_serialized {
                continue;
            }
            if filtering && !access.as_deref().is_some_and(|set| set.contains(&info.id)) {
                continue;
            }

            let before = *may_vary;
            let read = self.read_member(
                decl,
                &info,
                sample,
                prim,
                time,
                access.as_deref_mut(),
                may_vary,
                ns,
            )?;
            MayVary::check_transition(before, *may_vary, &info.name)?;

            if !read {
                tracing::debug!("read {prim}: could not represent member '{}'", info.name);
            }
            all &= read;
        }
        Ok(all)
    }

    /// Read the single member called `name`, without variability tracking.
    pub fn deserialize_member(
        &self,
        sample: &mut dyn DynSample,
        name: &str,
        prim: &SdfPath,
        time: TimeCode,
    ) -> Result<bool> {
        let reflect = self.ctx.reflect();
        let schema = reflect.get_schema(&*sample)?;
        let index = schema.member_index(name).ok_or_else(|| {
            Error::InvalidArgument(format!("{} has no member '{name}'", schema.type_name))
        })?;
        let info = reflect.get_cache_entry(&schema, index)?;
        if info.is_non_serialized {
            return Ok(true);
        }
        let mut may_vary = MayVary::Inapplicable;
        self.read_member(&schema.members[index], &info, sample, prim, time, None, &mut may_vary, "")
    }

    #[allow(clippy::too_many_arguments)]
    fn read_member(
        &self,
        decl: &MemberDecl,
        info: &MemberInfo,
        sample: &mut dyn DynSample,
        prim: &SdfPath,
        time: TimeCode,
        access: Option<&mut HashSet<MemberId>>,
        may_vary: &mut MayVary,
        ns: &str,
    ) -> Result<bool> {
        if decl.is_property() {
            let mut owned = decl.get_owned(sample.as_any()).ok_or_else(|| missing_member(info))?;
            let read = self.read_attr(
                &info.name, SlotMut::Value(owned.as_mut()), info, prim, time, access, may_vary, ns,
            )?;
            decl.set_owned(sample.as_any_mut(), owned)?;
            Ok(read)
        } else {
            let slot = decl.get_mut(sample.as_any_mut()).ok_or_else(|| missing_member(info))?;
            self.read_attr(&info.name, slot, info, prim, time, access, may_vary, ns)
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn read_attr(
        &self,
        attr_name: &str,
        slot: SlotMut<'_>,
        info: &MemberInfo,
        prim: &SdfPath,
        time: TimeCode,
        mut access: Option<&mut HashSet<MemberId>>,
        may_vary: &mut MayVary,
        ns: &str,
    ) -> Result<bool> {
        let read_ns = join_namespace(ns, &info.namespace);

        match slot {
            SlotMut::Dictionary(dict) => {
                self.read_dictionary(attr_name, dict, info, prim, time, access, may_vary, ns)
            }
            SlotMut::Relationship(rel) => {
                let name = self.ctx.tokens().intern(&read_ns, attr_name);
                *rel = Relationship { target_paths: self.read_targets(prim, &name) };
                Ok(true)
            }
            SlotMut::Sample(nested) => {
                self.read_nested(nested, info, prim, time, access, may_vary, &read_ns)
            }
            SlotMut::Primvar(pv) => {
                let name = self.property_name(&read_ns, attr_name, true);
                let was_null = pv.held().is_none();
                let outcome = self.read_value(
                    &name,
                    pv.held_mut(),
                    info,
                    prim,
                    time,
                    access.as_deref_mut(),
                    may_vary,
                    &read_ns,
                )?;
                match outcome {
                    ReadOutcome::Assigned => {
                        self.read_primvar_extras(&name, pv, info, prim, time, access, may_vary)?
                    }
                    _ if was_null => pv.clear_held(),
                    _ => {}
                }
                Ok(outcome.succeeded())
            }
            SlotMut::Connectable(c) => {
                let name = self.property_name(&read_ns, attr_name, info.is_primvar);
                let held = c.held_mut();
                let outcome =
                    self.read_value(&name, held, info, prim, time, access, may_vary, &read_ns)?;
                let connection = self.with_stage(|backend| {
                    backend
                        .get_attribute(prim, &name)
                        .and_then(|attr| backend.get_connections(&attr).into_iter().next())
                });
                c.set_connection(connection.map(|path| path.as_str().to_string()));
                Ok(outcome.succeeded())
            }
            SlotMut::Value(value) if info.is_relationship => {
                let name = self.ctx.tokens().intern(&read_ns, attr_name);
                match self.read_targets(prim, &name) {
                    Some(targets) => assign_targets(value, targets, info),
                    None => Ok(true),
                }
            }
            SlotMut::Value(value) => {
                let primvar = info.is_primvar && !info.is_metadata && !info.is_custom_data;
                let name = self.property_name(&read_ns, attr_name, primvar);
                let outcome =
                    self.read_value(&name, value, info, prim, time, access, may_vary, &read_ns)?;
                Ok(outcome.succeeded())
            }
        }
    }

    /// Rebuild a dictionary from the properties authored under its namespace.
    #[allow(clippy::too_many_arguments)]
    fn read_dictionary(
        &self,
        attr_name: &str,
        dict: &mut dyn DictionaryAccess,
        info: &MemberInfo,
        prim: &SdfPath,
        time: TimeCode,
        mut access: Option<&mut HashSet<MemberId>>,
        may_vary: &mut MayVary,
        ns: &str,
    ) -> Result<bool> {
        let mut entry_ns = ns.to_string();
        let mut read_ns = join_namespace(ns, &info.namespace);
        if !info.force_no_namespace && info.namespace.is_empty() {
            entry_ns = join_namespace(&entry_ns, attr_name);
            read_ns = join_namespace(&read_ns, attr_name);
        }

        let primvars = dict.holds_primvars();
        if primvars {
            read_ns = join_namespace(PRIMVARS_NAMESPACE, &read_ns);
        }

        // Attributes and relationships share the namespace; each entry only
        // reads the property kind its element type can hold.
        let found: Vec<(String, bool)> = self.with_stage(|backend| {
            backend
                .authored_properties_in_namespace(prim, &read_ns)
                .into_iter()
                .map(|(key, handle)| {
                    let is_attribute = backend.get_attribute(&handle.prim, &handle.name).is_some();
                    (key, is_attribute)
                })
                .collect()
        });
        dict.clear();

        let mut all = true;
        for (key, is_attribute) in found {
            if primvars && key.rsplit_once(':').is_some_and(|(_, last)| last == INDICES_SUFFIX) {
                continue;
            }
            let slot = dict.insert_default(key.clone());
            let wants_relationship =
                info.is_relationship || matches!(slot, SlotMut::Relationship(_));
            if wants_relationship == is_attribute {
                dict.remove(&key);
                continue;
            }
            all &= self.read_attr(
                &key,
                slot,
                info,
                prim,
                time,
                access.as_deref_mut(),
                may_vary,
                &entry_ns,
            )?;
            dict.remove_if_null(&key);
        }
        Ok(all)
    }

    fn read_targets(&self, prim: &SdfPath, name: &Token) -> Option<Vec<String>> {
        self.with_stage(|backend| {
            let rel = backend.get_relationship(prim, name)?;
            Some(backend.get_targets(&rel).iter().map(|p| p.as_str().to_string()).collect())
        })
    }

    /// Nested reads track variability on their own; a varying inner member
    /// marks the outer member as varying.
    #[allow(clippy::too_many_arguments)]
    fn read_nested(
        &self,
        nested: &mut dyn DynSample,
        info: &MemberInfo,
        prim: &SdfPath,
        time: TimeCode,
        mut access: Option<&mut HashSet<MemberId>>,
        may_vary: &mut MayVary,
        ns: &str,
    ) -> Result<bool> {
        if ns.is_empty() {
            tracing::debug!(
                "read {prim}: nested {} has no namespace, skipped",
                nested.sample_type_name()
            );
            return Ok(false);
        }

        let mut inner = if may_vary.is_applicable() {
            MayVary::NotYetConfirmed
        } else {
            MayVary::Inapplicable
        };
        let read = self.deserialize(nested, prim, time, access.as_deref_mut(), &mut inner, ns)?;
        if inner.is_confirmed() {
            note_varying(access, may_vary, info.id);
        }
        Ok(read)
    }

    #[allow(clippy::too_many_arguments)]
    fn read_value(
        &self,
        name: &Token,
        value: &mut dyn FieldValue,
        info: &MemberInfo,
        prim: &SdfPath,
        time: TimeCode,
        access: Option<&mut HashSet<MemberId>>,
        may_vary: &mut MayVary,
        ns: &str,
    ) -> Result<ReadOutcome> {
        let binding = if value.is_dynamic() {
            if info.is_metadata || info.is_custom_data {
                return Ok(ReadOutcome::Unrepresentable);
            }
            if let Some(vt) = value.runtime_type().sample {
                let nested = value
                    .value_mut()
                    .and_then(|any| (vt.as_sample_mut)(any))
                    .ok_or_else(|| {
                        Error::schema(format!("'{}' does not hold a Sample", info.name))
                    })?;
                return Ok(match self.read_nested(nested, info, prim, time, access, may_vary, ns)? {
                    true => ReadOutcome::Assigned,
                    false => ReadOutcome::Unrepresentable,
                });
            }
            let stored = self.with_stage(|backend| {
                backend
                    .get_attribute(prim, name)
                    .and_then(|attr| backend.attribute_type_name(&attr))
            });
            let Some(stored) = stored else {
                return Ok(ReadOutcome::Absent);
            };
            match self.ctx.binder().get_reverse_binding(&stored) {
                Some(binding) => binding,
                None => {
                    tracing::debug!("read {prim}: no host type for {stored} at '{name}'");
                    return Ok(ReadOutcome::Unrepresentable);
                }
            }
        } else {
            match self.binding_for(&value.runtime_type(), info) {
                Some(binding) => binding,
                None if ns.is_empty() => return Ok(ReadOutcome::Unrepresentable),
                None => {
                    return Err(Error::schema(format!(
                        "'{}': {} has no binding and is not a Sample",
                        info.name,
                        value.runtime_type().name
                    )))
                }
            }
        };

        let time = effective_time(info, time);
        let tracking = access.is_some() && may_vary.is_applicable();
        let (wire, varies) = {
            let stage = self.stage.lock();
            let backend = stage.backend.as_ref();
            if info.is_metadata {
                (backend.get_metadata(prim, name), false)
            } else if info.is_custom_data {
                (backend.get_custom_data(prim, name), false)
            } else if info.is_fused_display_color {
                let varies = tracking && backend.fused_display_color_might_vary(prim);
                (backend.get_fused_display_color(prim, time)?, varies)
            } else if info.is_fused_transform {
                let varies = tracking && backend.fused_transform_might_vary(prim);
                (backend.get_fused_transform(prim, time)?.map(Value::Matrix4d), varies)
            } else {
                let Some(attr) = backend.get_attribute(prim, name) else {
                    return Ok(ReadOutcome::Absent);
                };
                let varies = tracking
                    && info.variability == Variability::Varying
                    && backend.might_vary_over_time(&attr);
                (backend.get_value(&attr, time)?, varies)
            }
        };

        if varies {
            note_varying(access, may_vary, info.id);
        }

        let Some(wire) = wire else {
            return Ok(ReadOutcome::Absent);
        };
        let wire = coerce_text(wire, binding.type_name.kind());
        let converted = binding.from_wire(wire, self.ctx.pool())?;
        value.assign(converted, &binding.host)?;
        Ok(ReadOutcome::Assigned)
    }

    #[allow(clippy::too_many_arguments)]
    fn read_primvar_extras(
        &self,
        name: &Token,
        pv: &mut dyn PrimvarAccess,
        info: &MemberInfo,
        prim: &SdfPath,
        time: TimeCode,
        access: Option<&mut HashSet<MemberId>>,
        may_vary: &mut MayVary,
    ) -> Result<()> {
        let tracking = access.is_some() && may_vary.is_applicable();
        let time = effective_time(info, time);

        let (element_size, interpolation, indices, varies) = {
            let stage = self.stage.lock();
            let backend = stage.backend.as_ref();
            let attr = if info.is_fused_display_color {
                backend.get_attribute(prim, DISPLAY_COLOR)
            } else {
                backend.get_attribute(prim, name)
            };
            let Some(attr) = attr else {
                return Ok(());
            };
            let (indices, varies) = match backend.indices_attribute(&attr) {
                Some(ia) => {
                    let varies = tracking
                        && info.variability == Variability::Varying
                        && backend.might_vary_over_time(&ia);
                    (backend.get_value(&ia, time)?, varies)
                }
                None => (None, false),
            };
            (backend.get_element_size(&attr), backend.get_interpolation(&attr), indices, varies)
        };

        if varies {
            note_varying(access, may_vary, info.id);
        }

        pv.set_element_size(element_size);
        if let Some(token) = interpolation {
            pv.set_interpolation(PrimvarInterpolation::from_token(&token)?);
        }
        match indices {
            Some(Value::IntArray(indices)) => pv.set_indices(Some(indices)),
            Some(other) => {
                return Err(Error::type_mismatch(
                    format!("int[] indices for {name}"),
                    format!("{:?}", other.kind()),
                ));
            }
            None => pv.set_indices(None),
        }
        Ok(())
    }

    /// `ns:name`, or `primvars:ns:name` for primvars.
    fn property_name(&self, ns: &str, attr_name: &str, primvar: bool) -> Token {
        if primvar {
            self.ctx.tokens().intern(PRIMVARS_NAMESPACE, &join_namespace(ns, attr_name))
        } else {
            self.ctx.tokens().intern(ns, attr_name)
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn missing_member(info: &MemberInfo) -> Error {
    Error::InternalConsistency(format!("member '{}' not reachable on its own sample", info.name))
}

/// Uniform members always live at the default time.
fn effective_time(info: &MemberInfo, time: TimeCode) -> TimeCode {
    match info.variability {
        Variability::Uniform => TimeCode::Default,
        Variability::Varying => time,
    }
}

fn note_varying(access: Option<&mut HashSet<MemberId>>, may_vary: &mut MayVary, id: MemberId) {
    if let Some(set) = access {
        set.insert(id);
    }
    may_vary.mark();
}

fn author_extras(
    backend: &mut dyn SceneBackend,
    attr: &AttributeHandle,
    extras: WriteExtras<'_>,
    info: &MemberInfo,
    time: TimeCode,
) -> Result<()> {
    match extras {
        WriteExtras::Primvar(pv) => {
            if pv.element_size() > 1 {
                backend.set_element_size(attr, pv.element_size())?;
            }
            backend.set_interpolation(attr, &pv.interpolation().to_token())?;
            if let Some(indices) = pv.indices() {
                backend.set_indices(attr, indices.to_vec(), time)?;
            }
        }
        WriteExtras::Connection(Some(path)) if path.is_empty() => {
            backend.set_connections(attr, &[])?
        }
        WriteExtras::Connection(Some(path)) => {
            backend.set_connections(attr, &[SdfPath::new(path)?])?
        }
        WriteExtras::Connection(None) => {}
        WriteExtras::None if info.is_primvar && info.element_size > 1 => {
            backend.set_element_size(attr, info.element_size)?;
        }
        WriteExtras::None => {}
    }
    Ok(())
}

/// A fused transform is only readable through `xformOpOrder`.
fn ensure_op_order(backend: &mut dyn SceneBackend, prim: &SdfPath, op: &Token) -> Result<()> {
    if backend.get_attribute(prim, XFORM_OP_ORDER).is_some() {
        return Ok(());
    }
    let order = backend.create_attribute(
        prim,
        &Token::new(XFORM_OP_ORDER),
        crate::core::ValueTypeName::TOKEN_ARRAY,
        Variability::Uniform,
    )?;
    backend.set_value(&order, Value::TokenArray(vec![op.clone()]), TimeCode::Default)
}

/// Targets held by a `String` or `Vec<String>` member flagged as a relationship.
fn relationship_targets(value: &dyn FieldValue) -> Result<Option<Vec<String>>> {
    let Some(any) = value.value() else {
        return Ok(None);
    };
    if let Some(target) = any.downcast_ref::<String>() {
        return Ok(Some(vec![target.clone()]));
    }
    if let Some(targets) = any.downcast_ref::<Vec<String>>() {
        return Ok(Some(targets.clone()));
    }
    Err(Error::schema(format!(
        "relationship member holds {}, expected String or Vec<String>",
        value.runtime_type().name
    )))
}

fn assign_targets(
    value: &mut dyn FieldValue,
    targets: Vec<String>,
    info: &MemberInfo,
) -> Result<bool> {
    let declared = value.runtime_type().id;
    if declared == TypeId::of::<String>() {
        match targets.into_iter().next() {
            Some(target) => value.assign(Box::new(target), &TypeInfo::of::<String>())?,
            None => value.set_null(),
        }
        return Ok(true);
    }
    if declared == TypeId::of::<Vec<String>>() {
        value.assign(Box::new(targets), &TypeInfo::of::<Vec<String>>())?;
        return Ok(true);
    }
    Err(Error::schema(format!(
        "relationship member '{}' is {}, expected String or Vec<String>",
        info.name,
        value.runtime_type().name
    )))
}

/// Strings and tokens are interchangeable on read.
fn coerce_text(wire: Value, expected: ValueKind) -> Value {
    match (wire, expected) {
        (Value::Token(t), ValueKind::String) => Value::String(t.as_str().to_string()),
        (Value::String(s), ValueKind::Token) => Value::Token(Token::from(s)),
        (Value::TokenArray(t), ValueKind::StringArray) => {
            Value::StringArray(t.iter().map(|t| t.as_str().to_string()).collect())
        }
        (Value::StringArray(s), ValueKind::TokenArray) => {
            Value::TokenArray(s.into_iter().map(Token::from).collect())
        }
        (wire, _) => wire,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::MemoryStage;

    #[test]
    fn test_coerce_text() {
        assert_eq!(
            coerce_text(Value::Token(Token::new("a")), ValueKind::String),
            Value::String("a".into())
        );
        assert_eq!(
            coerce_text(Value::StringArray(vec!["x".into()]), ValueKind::TokenArray),
            Value::TokenArray(vec![Token::new("x")])
        );
        assert_eq!(coerce_text(Value::Float(1.0), ValueKind::String), Value::Float(1.0));
    }

    #[test]
    fn test_property_name() {
        let io = UsdIo::with_context(
            Arc::new(SerializationContext::new()),
            Box::new(MemoryStage::new()),
        );
        assert_eq!(io.property_name("", "points", false).as_str(), "points");
        assert_eq!(io.property_name("a:b", "x", false).as_str(), "a:b:x");
        assert_eq!(io.property_name("", "st", true).as_str(), "primvars:st");
        assert_eq!(io.property_name("uv", "st", true).as_str(), "primvars:uv:st");
    }

    #[test]
    fn test_relationship_targets() {
        let single = Some("/World/Mat".to_string());
        assert_eq!(
            relationship_targets(&single).expect("Failed to read targets"),
            Some(vec!["/World/Mat".to_string()])
        );
        let none: Option<String> = None;
        assert_eq!(relationship_targets(&none).expect("Failed to read targets"), None);
        assert!(relationship_targets(&3.0f32).is_err());
    }
}
