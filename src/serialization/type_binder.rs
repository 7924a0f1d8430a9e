//! Type binding registry: host type <-> wire value conversion.
//!
//! Bindings are looked up by exact type, then through `Option<T>`, then
//! synthesized for [`UsdEnum`](super::UsdEnum) types and memoized.
//!
//! Array bindings go through an [`ArrayConverter`]. Two conversion paths
//! exist: the code-generation path monomorphizes the converter into the
//! binding's closures; the late-binding path resolves the native wire
//! operation by name on every call. Both produce identical values.

use parking_lot::{Mutex, RwLock};
use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use glam::{DMat4, DQuat, DVec2, DVec3, DVec4, IVec2, IVec3, IVec4, Quat, Vec2, Vec3, Vec4};
use half::f16;

use super::{ArrayElement, ArrayPool, BoxedValue, FieldValue, TypeInfo};
use crate::core::{Value, ValueKind, ValueTypeName, WireValue};
use crate::util::{AssetPath, Error, Result, Token};

pub type ToWire = Arc<dyn Fn(&dyn Any) -> Result<Value> + Send + Sync>;
pub type FromWire = Arc<dyn Fn(Value, &dyn ArrayPool) -> Result<BoxedValue> + Send + Sync>;

/// Conversion pair between one host type and one wire type name.
#[derive(Clone)]
pub struct TypeBinding {
    pub host: TypeInfo,
    pub type_name: ValueTypeName,
    /// Rust type of the wire payload (`Vec<f32>` for `float[]`).
    pub wire_type: TypeId,
    to_wire: ToWire,
    from_wire: FromWire,
}

impl TypeBinding {
    pub fn new(
        host: TypeInfo,
        type_name: ValueTypeName,
        wire_type: TypeId,
        to_wire: ToWire,
        from_wire: FromWire,
    ) -> Self {
        Self { host, type_name, wire_type, to_wire, from_wire }
    }

    /// Convert a host value (of type `host`) into its wire value.
    pub fn to_wire(&self, value: &dyn Any) -> Result<Value> {
        (self.to_wire)(value)
    }

    /// Convert a wire value back into a boxed host value.
    pub fn from_wire(&self, value: Value, pool: &dyn ArrayPool) -> Result<BoxedValue> {
        (self.from_wire)(value, pool)
    }
}

impl fmt::Debug for TypeBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeBinding({} <-> {})", self.host.name, self.type_name)
    }
}

// ============================================================================
// Native operations
// ============================================================================

type ToValueFn = fn(&dyn Any) -> Option<Value>;
type ValueToFn = fn(Value) -> Option<BoxedValue>;

fn to_value_of<T: WireValue>(value: &dyn Any) -> Option<Value> {
    value.downcast_ref::<T>().cloned().map(T::into_value)
}

fn value_to_of<T: WireValue>(value: Value) -> Option<BoxedValue> {
    T::from_value(value).map(|v| Box::new(v) as BoxedValue)
}

/// `alloc::vec::Vec<glam::f32::vec3::Vec3>` -> `Vec<Vec3>`
pub fn short_type_name(full: &str) -> String {
    let mut out = String::with_capacity(full.len());
    let mut segment = String::new();
    for c in full.chars() {
        if c.is_alphanumeric() || c == '_' || c == ':' {
            segment.push(c);
        } else {
            out.push_str(segment.rsplit("::").next().unwrap_or(&segment));
            segment.clear();
            out.push(c);
        }
    }
    out.push_str(segment.rsplit("::").next().unwrap_or(&segment));
    out
}

/// Name of the native "wire value to T" operation for a type name.
pub fn value_to_name(full_type_name: &str) -> String {
    format!("value_to_{}", short_type_name(full_type_name))
}

/// Table of per-type wire conversions, keyed the way bindings find them:
/// host to wire by type, wire to host by operation name.
#[derive(Default)]
pub struct NativeOps {
    to_value: HashMap<TypeId, (ValueKind, ToValueFn)>,
    value_to: HashMap<String, ValueToFn>,
}

macro_rules! register_native_ops {
    ($ops:ident; $($ty:ty),+ $(,)?) => {
        $(
            $ops.register::<$ty>();
            $ops.register::<Vec<$ty>>();
        )+
    };
}

impl NativeOps {
    /// Operations for every wire value type.
    pub fn standard() -> Self {
        let mut ops = Self::default();
        register_native_ops!(ops;
            bool, u8, i32, u32, i64, u64, f16, f32, f64, String, Token, AssetPath,
            IVec2, IVec3, IVec4, Vec2, Vec3, Vec4, DVec2, DVec3, DVec4, Quat, DQuat,
        );
        ops.register::<DMat4>();
        ops
    }

    pub fn register<T: WireValue>(&mut self) {
        self.to_value.insert(TypeId::of::<T>(), (T::KIND, to_value_of::<T>));
        self.value_to.insert(value_to_name(type_name::<T>()), value_to_of::<T>);
    }

    pub fn to_value(&self, ty: TypeId) -> Option<(ValueKind, ToValueFn)> {
        self.to_value.get(&ty).copied()
    }

    pub fn value_to(&self, name: &str) -> Option<ValueToFn> {
        self.value_to.get(name).copied()
    }
}

// ============================================================================
// Array converters
// ============================================================================

/// Static conversions between a host array type `H` and a wire array.
pub trait ArrayConverter<H>: 'static {
    type Wire: WireValue;

    fn to_wire_array(host: &H) -> Self::Wire;
    fn from_wire_array(wire: Self::Wire, pool: &dyn ArrayPool) -> H;
}

/// Element-preserving conversions for `Vec<T>` and `Box<[T]>`.
pub struct IntrinsicConverter;

impl<T: ArrayElement> ArrayConverter<Vec<T>> for IntrinsicConverter
where
    Vec<T>: WireValue,
{
    type Wire = Vec<T>;

    fn to_wire_array(host: &Vec<T>) -> Vec<T> {
        host.clone()
    }

    fn from_wire_array(wire: Vec<T>, pool: &dyn ArrayPool) -> Vec<T> {
        pool.adopt(wire)
    }
}

impl<T: ArrayElement> ArrayConverter<Box<[T]>> for IntrinsicConverter
where
    Vec<T>: WireValue,
{
    type Wire = Vec<T>;

    fn to_wire_array(host: &Box<[T]>) -> Vec<T> {
        host.to_vec()
    }

    fn from_wire_array(wire: Vec<T>, pool: &dyn ArrayPool) -> Box<[T]> {
        pool.adopt(wire).into_boxed_slice()
    }
}

/// String lists stored as token arrays.
pub struct TokenConverter;

impl ArrayConverter<Vec<String>> for TokenConverter {
    type Wire = Vec<Token>;

    fn to_wire_array(host: &Vec<String>) -> Vec<Token> {
        host.iter().map(|s| Token::new(s)).collect()
    }

    fn from_wire_array(wire: Vec<Token>, _pool: &dyn ArrayPool) -> Vec<String> {
        wire.iter().map(|t| t.as_str().to_string()).collect()
    }
}

impl ArrayConverter<Box<[String]>> for TokenConverter {
    type Wire = Vec<Token>;

    fn to_wire_array(host: &Box<[String]>) -> Vec<Token> {
        host.iter().map(|s| Token::new(s)).collect()
    }

    fn from_wire_array(wire: Vec<Token>, _pool: &dyn ArrayPool) -> Box<[String]> {
        wire.iter().map(|t| t.as_str().to_string()).collect()
    }
}

fn codegen_array<C, H>() -> (ToWire, FromWire)
where
    C: ArrayConverter<H>,
    H: FieldValue,
{
    let to_wire: ToWire = Arc::new(|value: &dyn Any| {
        let host = value
            .downcast_ref::<H>()
            .ok_or_else(|| Error::type_mismatch(type_name::<H>(), "host value"))?;
        Ok(C::to_wire_array(host).into_value())
    });
    let from_wire: FromWire = Arc::new(|value: Value, pool: &dyn ArrayPool| {
        let kind = value.kind();
        let wire = C::Wire::from_value(value)
            .ok_or_else(|| Error::type_mismatch(format!("{:?}", C::Wire::KIND), format!("{kind:?}")))?;
        Ok(Box::new(C::from_wire_array(wire, pool)) as BoxedValue)
    });
    (to_wire, from_wire)
}

fn late_bound_array<C, H>(ops: Arc<NativeOps>) -> (ToWire, FromWire)
where
    C: ArrayConverter<H>,
    H: FieldValue,
{
    let wire_id = TypeId::of::<C::Wire>();
    let op_name = value_to_name(type_name::<C::Wire>());
    let to_ops = ops.clone();

    let to_wire: ToWire = Arc::new(move |value: &dyn Any| {
        let host = value
            .downcast_ref::<H>()
            .ok_or_else(|| Error::type_mismatch(type_name::<H>(), "host value"))?;
        let wire: Box<dyn Any> = Box::new(C::to_wire_array(host));
        let (_, to_value) = to_ops
            .to_value(wire_id)
            .ok_or_else(|| Error::config(format!("no native op for {}", type_name::<C::Wire>())))?;
        to_value(&*wire).ok_or_else(|| Error::type_mismatch(type_name::<C::Wire>(), "wire array"))
    });

    let from_wire: FromWire = Arc::new(move |value: Value, pool: &dyn ArrayPool| {
        let value_to = ops.value_to(&op_name).ok_or_else(|| Error::config(format!("no native op {op_name}")))?;
        let kind = value.kind();
        let wire: Box<dyn Any> = value_to(value)
            .ok_or_else(|| Error::type_mismatch(type_name::<C::Wire>(), format!("{kind:?}")))?;
        let wire = wire
            .downcast::<C::Wire>()
            .map_err(|_| Error::InternalConsistency(format!("{op_name} produced the wrong type")))?;
        Ok(Box::new(C::from_wire_array(*wire, pool)) as BoxedValue)
    });

    (to_wire, from_wire)
}

// ============================================================================
// TypeBinder
// ============================================================================

/// Registry options.
#[derive(Clone, Debug)]
pub struct BinderConfig {
    /// Monomorphize array conversions at registration. Requires the `codegen` feature.
    pub code_generation: bool,
}

impl Default for BinderConfig {
    fn default() -> Self {
        Self { code_generation: cfg!(feature = "codegen") }
    }
}

#[derive(Default)]
struct BindingTable {
    bindings: HashMap<TypeId, Arc<TypeBinding>>,
    /// Registration order, for reverse lookups.
    order: Vec<TypeId>,
}

/// Registry of host type <-> wire type bindings.
pub struct TypeBinder {
    config: BinderConfig,
    ops: Arc<NativeOps>,
    table: RwLock<BindingTable>,
    aliases: RwLock<HashMap<String, String>>,
    /// Parsed enum tokens per enum type.
    enum_maps: Arc<Mutex<HashMap<TypeId, HashMap<String, usize>>>>,
    asset_path: Arc<TypeBinding>,
}

impl Default for TypeBinder {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TypeBinder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeBinder")
            .field("config", &self.config)
            .field("bindings", &self.len())
            .finish()
    }
}

macro_rules! bind_intrinsics {
    ($binder:expr; $($ty:ty => $scalar:ident, $array:ident);+ $(;)?) => {
        [
            $(
                $binder.bind_native::<$ty>(ValueTypeName::$scalar),
                $binder.bind_array_type::<IntrinsicConverter, Vec<$ty>>(ValueTypeName::$array),
                $binder.bind_array_type::<IntrinsicConverter, Box<[$ty]>>(ValueTypeName::$array),
            )+
        ]
    };
}

impl TypeBinder {
    pub fn new() -> Self {
        Self::with_config(BinderConfig::default())
    }

    pub fn with_config(config: BinderConfig) -> Self {
        Self::with_native_ops(config, NativeOps::standard())
    }

    /// Registry over a custom native operation table.
    ///
    /// Intrinsic types whose operations are missing from `ops` are left unbound.
    pub fn with_native_ops(config: BinderConfig, ops: NativeOps) -> Self {
        let asset_path = Arc::new(Self::asset_path_binding());
        let binder = Self {
            config,
            ops: Arc::new(ops),
            table: RwLock::new(BindingTable::default()),
            aliases: RwLock::new(HashMap::new()),
            enum_maps: Arc::new(Mutex::new(HashMap::new())),
            asset_path,
        };
        let skipped = binder.register_intrinsic_types();
        if skipped > 0 {
            tracing::debug!("binder: {skipped} intrinsic bindings skipped, {} registered", binder.len());
        }
        binder.register_role_aliases();
        binder
    }

    pub fn config(&self) -> &BinderConfig {
        &self.config
    }

    pub fn uses_code_generation(&self) -> bool {
        cfg!(feature = "codegen") && self.config.code_generation
    }

    pub fn len(&self) -> usize {
        self.table.read().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bind every intrinsic independently; returns how many were skipped.
    fn register_intrinsic_types(&self) -> usize {
        let intrinsics = bind_intrinsics!(self;
            bool => BOOL, BOOL_ARRAY;
            u8 => UCHAR, UCHAR_ARRAY;
            i32 => INT, INT_ARRAY;
            u32 => UINT, UINT_ARRAY;
            i64 => INT64, INT64_ARRAY;
            u64 => UINT64, UINT64_ARRAY;
            f16 => HALF, HALF_ARRAY;
            f32 => FLOAT, FLOAT_ARRAY;
            f64 => DOUBLE, DOUBLE_ARRAY;
            Token => TOKEN, TOKEN_ARRAY;
            AssetPath => ASSET, ASSET_ARRAY;
            IVec2 => INT2, INT2_ARRAY;
            IVec3 => INT3, INT3_ARRAY;
            IVec4 => INT4, INT4_ARRAY;
            Vec2 => FLOAT2, FLOAT2_ARRAY;
            Vec3 => FLOAT3, FLOAT3_ARRAY;
            Vec4 => FLOAT4, FLOAT4_ARRAY;
            DVec2 => DOUBLE2, DOUBLE2_ARRAY;
            DVec3 => DOUBLE3, DOUBLE3_ARRAY;
            DVec4 => DOUBLE4, DOUBLE4_ARRAY;
            Quat => QUATF, QUATF_ARRAY;
            DQuat => QUATD, QUATD_ARRAY;
        );
        let extras = [
            self.bind_native::<String>(ValueTypeName::STRING),
            self.bind_array_type::<TokenConverter, Vec<String>>(ValueTypeName::TOKEN_ARRAY),
            self.bind_array_type::<TokenConverter, Box<[String]>>(ValueTypeName::TOKEN_ARRAY),
            self.bind_native::<DMat4>(ValueTypeName::MATRIX4D),
        ];

        let mut skipped = 0;
        for err in intrinsics.into_iter().chain(extras).filter_map(Result::err) {
            tracing::warn!("binder: intrinsic left unbound: {err}");
            skipped += 1;
        }
        skipped
    }

    fn register_role_aliases(&self) {
        let roles = [
            (ValueTypeName::TEXCOORD2F, ValueTypeName::FLOAT2),
            (ValueTypeName::TEXCOORD3F, ValueTypeName::FLOAT3),
            (ValueTypeName::POINT3F, ValueTypeName::FLOAT3),
            (ValueTypeName::NORMAL3F, ValueTypeName::FLOAT3),
            (ValueTypeName::VECTOR3F, ValueTypeName::FLOAT3),
            (ValueTypeName::COLOR3F, ValueTypeName::FLOAT3),
            (ValueTypeName::COLOR4F, ValueTypeName::FLOAT4),
            (ValueTypeName::TEXCOORD2F_ARRAY, ValueTypeName::FLOAT2_ARRAY),
            (ValueTypeName::TEXCOORD3F_ARRAY, ValueTypeName::FLOAT3_ARRAY),
            (ValueTypeName::POINT3F_ARRAY, ValueTypeName::FLOAT3_ARRAY),
            (ValueTypeName::NORMAL3F_ARRAY, ValueTypeName::FLOAT3_ARRAY),
            (ValueTypeName::VECTOR3F_ARRAY, ValueTypeName::FLOAT3_ARRAY),
            (ValueTypeName::COLOR3F_ARRAY, ValueTypeName::FLOAT3_ARRAY),
            (ValueTypeName::COLOR4F_ARRAY, ValueTypeName::FLOAT4_ARRAY),
        ];
        let mut aliases = self.aliases.write();
        for (alias, target) in roles {
            aliases.insert(alias.name().to_string(), target.name().to_string());
        }
    }

    // === Registration ===

    /// Register or replace a binding. A replaced binding keeps its reverse-lookup position.
    pub fn bind_type(&self, binding: TypeBinding) {
        let id = binding.host.id;
        tracing::debug!("binder: {} -> {}", binding.host.name, binding.type_name);
        let mut table = self.table.write();
        if table.bindings.insert(id, Arc::new(binding)).is_none() {
            table.order.push(id);
        }
    }

    /// Bind a type through its native wire operation, found by name.
    pub fn bind_native_type(&self, host: TypeInfo, type_name: ValueTypeName) -> Result<()> {
        let op_name = value_to_name(host.name);
        let value_to = self.ops.value_to(&op_name).ok_or_else(|| {
            Error::config(format!("no native operation {op_name} for {} ({type_name})", host.name))
        })?;
        let (kind, to_value) = self
            .ops
            .to_value(host.id)
            .ok_or_else(|| Error::config(format!("no native wire conversion for {}", host.name)))?;
        if kind != type_name.kind() {
            return Err(Error::config(format!(
                "{} is stored as {kind:?}, which cannot carry {type_name}",
                host.name
            )));
        }
        let host_name = host.name;
        let to_wire: ToWire = Arc::new(move |value: &dyn Any| {
            to_value(value).ok_or_else(|| Error::type_mismatch(host_name, "host value"))
        });
        let from_wire: FromWire = Arc::new(move |value: Value, _pool: &dyn ArrayPool| {
            let actual = format!("{:?}", value.kind());
            value_to(value).ok_or_else(|| Error::type_mismatch(format!("{kind:?}"), actual))
        });
        self.bind_type(TypeBinding::new(host, type_name, host.id, to_wire, from_wire));
        Ok(())
    }

    pub fn bind_native<T: FieldValue>(&self, type_name: ValueTypeName) -> Result<()> {
        self.bind_native_type(T::type_info(), type_name)
    }

    /// Bind an array type through converter `C`.
    pub fn bind_array_type<C, H>(&self, wire_name: ValueTypeName) -> Result<()>
    where
        C: ArrayConverter<H>,
        H: FieldValue,
    {
        if C::Wire::KIND != wire_name.kind() {
            return Err(Error::config(format!(
                "{} converts to {:?}, which cannot carry {wire_name}",
                type_name::<H>(),
                C::Wire::KIND
            )));
        }
        let (to_wire, from_wire) = if self.uses_code_generation() {
            codegen_array::<C, H>()
        } else {
            if self.ops.to_value(TypeId::of::<C::Wire>()).is_none() {
                return Err(Error::config(format!("no native operation for {}", type_name::<C::Wire>())));
            }
            late_bound_array::<C, H>(self.ops.clone())
        };
        self.bind_type(TypeBinding::new(H::type_info(), wire_name, TypeId::of::<C::Wire>(), to_wire, from_wire));
        Ok(())
    }

    pub fn add_type_alias(&self, alias: ValueTypeName, target: ValueTypeName) {
        tracing::debug!("binder: alias {alias} -> {target}");
        self.aliases.write().insert(alias.name().to_string(), target.name().to_string());
    }

    pub fn remove_type_alias(&self, alias: ValueTypeName) -> bool {
        let removed = self.aliases.write().remove(alias.name()).is_some();
        if removed {
            tracing::debug!("binder: alias {alias} removed");
        }
        removed
    }

    // === Lookup ===

    /// Binding for `ty`: exact, then through `Option<T>`, then synthesized for enums.
    pub fn get_binding(&self, ty: &TypeInfo) -> Option<Arc<TypeBinding>> {
        if let Some(binding) = self.table.read().bindings.get(&ty.id) {
            return Some(binding.clone());
        }
        if let Some(underlying) = ty.underlying {
            let inner = underlying();
            if let Some(binding) = self.table.read().bindings.get(&inner.id) {
                return Some(binding.clone());
            }
            return self.get_binding(&inner);
        }
        if !ty.is_enum() {
            return None;
        }
        let binding = self.bind_enum(ty)?;
        let mut table = self.table.write();
        if let Some(existing) = table.bindings.get(&ty.id) {
            return Some(existing.clone());
        }
        tracing::debug!("binder: synthesized enum binding for {}", ty.name);
        table.bindings.insert(ty.id, binding.clone());
        table.order.push(ty.id);
        Some(binding)
    }

    pub fn get_binding_of<T: FieldValue>(&self) -> Option<Arc<TypeBinding>> {
        self.get_binding(&T::type_info())
    }

    /// First binding, in registration order, stored as `type_name` (after aliasing).
    ///
    /// Lossy: `Vec<f32>` and `Box<[f32]>` both store `float[]`; the first one
    /// registered wins.
    pub fn get_reverse_binding(&self, type_name: &ValueTypeName) -> Option<Arc<TypeBinding>> {
        let name = self
            .aliases
            .read()
            .get(type_name.name())
            .cloned()
            .unwrap_or_else(|| type_name.name().to_string());
        let table = self.table.read();
        table
            .order
            .iter()
            .filter_map(|id| table.bindings.get(id))
            .find(|b| b.type_name.name() == name)
            .cloned()
    }

    /// First binding whose wire payload is the Rust type `wire`.
    pub fn get_reverse_binding_for_host(&self, wire: TypeId) -> Option<Arc<TypeBinding>> {
        let table = self.table.read();
        table
            .order
            .iter()
            .filter_map(|id| table.bindings.get(id))
            .find(|b| b.wire_type == wire)
            .cloned()
    }

    /// `String` stored as an `asset` value.
    pub fn asset_path(&self) -> Arc<TypeBinding> {
        self.asset_path.clone()
    }

    fn asset_path_binding() -> TypeBinding {
        let to_wire: ToWire = Arc::new(|value: &dyn Any| {
            let path = value
                .downcast_ref::<String>()
                .ok_or_else(|| Error::type_mismatch("String", "asset path member"))?;
            Ok(Value::Asset(AssetPath(path.clone())))
        });
        let from_wire: FromWire = Arc::new(|value: Value, _pool: &dyn ArrayPool| match value {
            Value::Asset(AssetPath(path)) | Value::String(path) => Ok(Box::new(path) as BoxedValue),
            other => Err(Error::type_mismatch("asset", format!("{:?}", other.kind()))),
        });
        TypeBinding::new(
            <String as FieldValue>::type_info(),
            ValueTypeName::ASSET,
            TypeId::of::<AssetPath>(),
            to_wire,
            from_wire,
        )
    }

    // === Enums ===

    fn bind_enum(&self, ty: &TypeInfo) -> Option<Arc<TypeBinding>> {
        let vtable = ty.enumeration?;
        let enum_name = ty.name;
        let enum_id = ty.id;

        let to_wire: ToWire = Arc::new(move |value: &dyn Any| {
            let index = (vtable.index_of)(value).ok_or_else(|| Error::type_mismatch(enum_name, "enum value"))?;
            let name = vtable
                .names
                .get(index)
                .ok_or_else(|| Error::InternalConsistency(format!("{enum_name} has no variant #{index}")))?;
            Ok(Value::Token(Token::from(lower_first(name))))
        });

        let maps = self.enum_maps.clone();
        let from_wire: FromWire = Arc::new(move |value: Value, _pool: &dyn ArrayPool| {
            let token = match value {
                Value::Token(t) => t,
                other => return Err(Error::type_mismatch("token", format!("{:?}", other.kind()))),
            };
            let index = {
                let mut maps = maps.lock();
                let map = maps.entry(enum_id).or_default();
                match map.get(token.as_str()) {
                    Some(index) => *index,
                    None => {
                        let wanted = upper_first(&token);
                        let index = vtable.names.iter().position(|n| *n == wanted).ok_or_else(|| {
                            Error::schema(format!("'{token}' is not a variant of {enum_name}"))
                        })?;
                        map.insert(token.as_str().to_string(), index);
                        index
                    }
                }
            };
            (vtable.from_index)(index)
                .ok_or_else(|| Error::InternalConsistency(format!("{enum_name} has no variant #{index}")))
        });

        Some(Arc::new(TypeBinding::new(*ty, ValueTypeName::TOKEN, TypeId::of::<Token>(), to_wire, from_wire)))
    }
}

fn lower_first(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn upper_first(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serialization::ArrayUnpool;

    crate::usd_enum! {
        enum Purpose { Default, Render, ProxyShape }
    }

    fn round_trip<T: FieldValue + Clone + PartialEq + fmt::Debug>(binder: &TypeBinder, value: T) -> T {
        let binding = binder.get_binding_of::<T>().expect("Failed to find binding");
        let wire = binding.to_wire(&value).expect("Failed to convert to wire");
        let back = binding.from_wire(wire, &ArrayUnpool).expect("Failed to convert from wire");
        let back: Box<dyn Any> = back;
        *back.downcast::<T>().expect("Failed to downcast")
    }

    #[test]
    fn test_short_type_name() {
        assert_eq!(short_type_name("alloc::vec::Vec<glam::f32::vec3::Vec3>"), "Vec<Vec3>");
        assert_eq!(short_type_name("f32"), "f32");
        assert_eq!(value_to_name("alloc::string::String"), "value_to_String");
    }

    #[test]
    fn test_intrinsics_round_trip() {
        let binder = TypeBinder::new();
        assert_eq!(round_trip(&binder, i32::MIN), i32::MIN);
        assert_eq!(round_trip(&binder, u64::MAX), u64::MAX);
        assert_eq!(round_trip(&binder, f16::from_f32(0.5)), f16::from_f32(0.5));
        assert_eq!(round_trip(&binder, Vec3::new(1.0, -2.0, 3.5)), Vec3::new(1.0, -2.0, 3.5));
        assert_eq!(round_trip(&binder, vec![1.0f64, f64::MAX]), vec![1.0, f64::MAX]);
        assert_eq!(round_trip(&binder, Vec::<i32>::new()), Vec::<i32>::new());
        let boxed: Box<[u8]> = vec![7u8].into_boxed_slice();
        assert_eq!(round_trip(&binder, boxed.clone()), boxed);
        assert_eq!(round_trip(&binder, DMat4::from_diagonal(DVec4::splat(2.0))), DMat4::from_diagonal(DVec4::splat(2.0)));
    }

    #[test]
    fn test_string_list_as_tokens() {
        let binder = TypeBinder::new();
        let binding = binder.get_binding_of::<Vec<String>>().expect("Failed to find binding");
        assert_eq!(binding.type_name, ValueTypeName::TOKEN_ARRAY);
        let wire = binding.to_wire(&vec!["a".to_string()]).expect("Failed to convert");
        assert_eq!(wire, Value::TokenArray(vec![Token::new("a")]));
    }

    #[test]
    fn test_option_unwraps() {
        let binder = TypeBinder::new();
        let binding = binder.get_binding_of::<Option<f32>>().expect("Failed to find binding");
        assert_eq!(binding.type_name, ValueTypeName::FLOAT);
    }

    #[test]
    fn test_enum_binding() {
        let binder = TypeBinder::new();
        let binding = binder.get_binding_of::<Purpose>().expect("Failed to synthesize enum binding");
        let wire = binding.to_wire(&Purpose::ProxyShape).expect("Failed to convert");
        assert_eq!(wire, Value::Token(Token::new("proxyShape")));
        assert_eq!(round_trip(&binder, Purpose::Render), Purpose::Render);

        let bad = binding.from_wire(Value::Token(Token::new("guide")), &ArrayUnpool);
        assert!(matches!(bad, Err(Error::SchemaMismatch(_))));

        let again = binder.get_binding_of::<Purpose>().expect("Failed to find binding");
        assert!(Arc::ptr_eq(&binding, &again));
    }

    #[test]
    fn test_reverse_binding_is_lossy() {
        let binder = TypeBinder::new();
        let binding = binder.get_reverse_binding(&ValueTypeName::FLOAT3_ARRAY).expect("Failed to reverse bind");
        assert_eq!(binding.host, <Vec<Vec3> as FieldValue>::type_info());

        // Role names resolve through aliases.
        let color = binder.get_reverse_binding(&ValueTypeName::COLOR3F_ARRAY).expect("Failed to reverse bind");
        assert_eq!(color.host, <Vec<Vec3> as FieldValue>::type_info());

        assert!(binder.remove_type_alias(ValueTypeName::COLOR3F_ARRAY));
        assert!(binder.get_reverse_binding(&ValueTypeName::COLOR3F_ARRAY).is_none());
        assert!(!binder.remove_type_alias(ValueTypeName::COLOR3F_ARRAY));

        let by_wire = binder.get_reverse_binding_for_host(TypeId::of::<Vec<f32>>()).expect("Failed to reverse bind");
        assert_eq!(by_wire.host, <Vec<f32> as FieldValue>::type_info());
    }

    #[test]
    fn test_late_binding_matches_codegen() {
        let fast = TypeBinder::with_config(BinderConfig { code_generation: true });
        let late = TypeBinder::with_config(BinderConfig { code_generation: false });
        let points = vec![Vec3::ZERO, Vec3::new(1.0, 2.0, 3.0)];
        let a = fast.get_binding_of::<Vec<Vec3>>().expect("Failed to find binding");
        let b = late.get_binding_of::<Vec<Vec3>>().expect("Failed to find binding");
        let wa = a.to_wire(&points).expect("Failed to convert");
        let wb = b.to_wire(&points).expect("Failed to convert");
        assert_eq!(wa, wb);
        assert_eq!(round_trip(&late, points.clone()), points);
    }

    #[test]
    fn test_missing_native_op() {
        #[derive(Clone, Default)]
        struct Opaque;
        crate::impl_field_value!(Opaque);

        let binder = TypeBinder::new();
        let err = binder.bind_native::<Opaque>(ValueTypeName::FLOAT);
        assert!(matches!(err, Err(Error::Configuration(_))));

        let mismatch = binder.bind_native::<f32>(ValueTypeName::DOUBLE);
        assert!(matches!(mismatch, Err(Error::Configuration(_))));

        let array_mismatch = binder.bind_array_type::<IntrinsicConverter, Vec<f32>>(ValueTypeName::DOUBLE_ARRAY);
        match array_mismatch {
            Err(Error::Configuration(msg)) => assert!(msg.contains("Vec<f32>"), "unexpected message: {msg}"),
            other => panic!("expected a configuration error, got {other:?}"),
        }
    }

    #[test]
    fn test_partial_native_ops() {
        let mut ops = NativeOps::default();
        ops.register::<f32>();
        ops.register::<Vec<f32>>();
        let binder = TypeBinder::with_native_ops(BinderConfig { code_generation: false }, ops);

        // Missing operations skip their own bindings only.
        assert!(binder.get_binding_of::<f32>().is_some());
        assert!(binder.get_binding_of::<Vec<f32>>().is_some());
        assert!(binder.get_binding_of::<Box<[f32]>>().is_some());
        assert!(binder.get_binding_of::<bool>().is_none());
        assert!(binder.get_binding_of::<DMat4>().is_none());
        assert_eq!(binder.len(), 3);
    }
}
