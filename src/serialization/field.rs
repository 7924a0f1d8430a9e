//! Member values: what a Sample slot can hold and how the engine sees it.
//!
//! - [`TypeInfo`] - Runtime descriptor of a slot's type
//! - [`FieldValue`] - A value slot the engine can read, convert and assign
//! - [`Dynamic`] - Fully type-erased slot; its type comes from the held value
//! - [`UsdEnum`] - Fieldless enums serialized as tokens
//! - [`PooledArray`] - An array released from a sample, bound for the pool

use glam::{DMat4, DQuat, DVec2, DVec3, DVec4, IVec2, IVec3, IVec4, Quat, Vec2, Vec3, Vec4};
use half::f16;
use std::any::{type_name, Any, TypeId};
use std::fmt;

use super::sample::{DynSample, Sample};
use crate::util::{AssetPath, Error, Result, Token};

/// Owned, type-erased value as produced by a binding's from-wire converter.
pub type BoxedValue = Box<dyn Any + Send + Sync>;

/// Enum hooks used to synthesize token bindings.
#[derive(Clone, Copy)]
pub struct EnumVTable {
    pub names: &'static [&'static str],
    pub index_of: fn(&dyn Any) -> Option<usize>,
    pub from_index: fn(usize) -> Option<BoxedValue>,
}

/// Sample hooks used when a type-erased slot holds a nested sample.
#[derive(Clone, Copy)]
pub struct SampleVTable {
    pub as_sample: fn(&dyn Any) -> Option<&dyn DynSample>,
    pub as_sample_mut: fn(&mut dyn Any) -> Option<&mut dyn DynSample>,
}

/// Runtime description of a slot type.
#[derive(Clone, Copy)]
pub struct TypeInfo {
    pub id: TypeId,
    pub name: &'static str,
    /// Array nesting depth; 0 for scalars.
    pub rank: u8,
    /// `Option<T>` resolves to `T`'s binding.
    pub underlying: Option<fn() -> TypeInfo>,
    pub enumeration: Option<EnumVTable>,
    pub sample: Option<SampleVTable>,
    /// The [`Dynamic`] placeholder.
    pub dynamic: bool,
    /// Turns a boxed array of this type into a [`PooledArray`].
    pub release: Option<fn(BoxedValue) -> Option<PooledArray>>,
}

impl TypeInfo {
    pub fn of<T: 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
            rank: 0,
            underlying: None,
            enumeration: None,
            sample: None,
            dynamic: false,
            release: None,
        }
    }

    pub fn array_of<T: 'static>(rank: u8) -> Self {
        Self { rank, ..Self::of::<T>() }
    }

    pub fn of_enum<E: UsdEnum>() -> Self {
        Self {
            enumeration: Some(EnumVTable {
                names: E::NAMES,
                index_of: |v| v.downcast_ref::<E>().map(|e| e.to_index()),
                from_index: |i| E::from_index(i).map(|e| Box::new(e) as BoxedValue),
            }),
            ..Self::of::<E>()
        }
    }

    pub fn of_sample<S: Sample>() -> Self {
        fn as_sample<S: Sample>(v: &dyn Any) -> Option<&dyn DynSample> {
            v.downcast_ref::<S>().map(|s| s as &dyn DynSample)
        }
        fn as_sample_mut<S: Sample>(v: &mut dyn Any) -> Option<&mut dyn DynSample> {
            v.downcast_mut::<S>().map(|s| s as &mut dyn DynSample)
        }
        Self {
            sample: Some(SampleVTable { as_sample: as_sample::<S>, as_sample_mut: as_sample_mut::<S> }),
            ..Self::of::<S>()
        }
    }

    pub fn optional<T: FieldValue>() -> Self {
        Self { underlying: Some(T::type_info), ..Self::of::<Option<T>>() }
    }

    pub fn dynamic() -> Self {
        Self { dynamic: true, ..Self::of::<Dynamic>() }
    }

    pub fn is_enum(&self) -> bool {
        self.enumeration.is_some()
    }

    pub fn is_sample(&self) -> bool {
        self.sample.is_some()
    }
}

impl PartialEq for TypeInfo {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl fmt::Debug for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeInfo({})", self.name)
    }
}

/// An array taken out of a sample on release.
pub struct PooledArray {
    /// Element type.
    pub element: TypeId,
    pub len: usize,
    pub rank: u8,
    /// The `Vec<element>` itself.
    pub data: Box<dyn Any + Send>,
}

impl PooledArray {
    pub fn new<T: Send + 'static>(array: Vec<T>, rank: u8) -> Self {
        Self { element: TypeId::of::<T>(), len: array.len(), rank, data: Box::new(array) }
    }
}

impl fmt::Debug for PooledArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PooledArray(len={}, rank={})", self.len, self.rank)
    }
}

/// A value slot in a sample.
///
/// `value()` returns the held value as its runtime type, or `None` for null.
/// Bindings always receive and produce the runtime type, so `Option<T>`
/// hands out `&T` and accepts a boxed `T`.
pub trait FieldValue: Send + Sync + 'static {
    /// Declared type of the slot.
    fn type_info() -> TypeInfo
    where
        Self: Sized;

    /// Type of the value currently held.
    fn runtime_type(&self) -> TypeInfo;

    fn value(&self) -> Option<&dyn Any>;

    fn value_mut(&mut self) -> Option<&mut dyn Any>;

    /// Store a converted value of type `ty`.
    fn assign(&mut self, value: BoxedValue, ty: &TypeInfo) -> Result<()>;

    /// Clear the slot. Non-nullable slots ignore this.
    fn set_null(&mut self) {}

    /// Move an owned array out, leaving the slot empty.
    fn take_array(&mut self) -> Option<PooledArray> {
        None
    }

    /// Array rank of the declared type, checked before release.
    fn declared_rank(&self) -> u8 {
        self.runtime_type().rank
    }

    /// Declared as [`Dynamic`]; its type is only known from the held value.
    fn is_dynamic(&self) -> bool {
        false
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

fn assign_exact<T: 'static>(slot: &mut T, value: BoxedValue, ty: &TypeInfo) -> Result<()> {
    let value: Box<dyn Any> = value;
    match value.downcast::<T>() {
        Ok(v) => {
            *slot = *v;
            Ok(())
        }
        Err(_) => Err(Error::type_mismatch(type_name::<T>(), ty.name)),
    }
}

/// Element types usable inside arrays; nested `Vec`s raise the rank.
pub trait ArrayElement: Clone + Default + Send + Sync + 'static {
    const RANK: u8 = 0;
}

impl<T: ArrayElement> ArrayElement for Vec<T> {
    const RANK: u8 = T::RANK + 1;
}

/// Implement [`FieldValue`] (and dictionary element support) for a plain value type.
///
/// The type still needs a binding in the [`TypeBinder`](super::TypeBinder) to
/// be written; without one it is treated as a nested object and rejected.
#[macro_export]
macro_rules! impl_field_value {
    (@enum $ty:ty) => {
        impl $crate::serialization::FieldValue for $ty {
            fn type_info() -> $crate::serialization::TypeInfo {
                $crate::serialization::TypeInfo::of_enum::<$ty>()
            }
            fn runtime_type(&self) -> $crate::serialization::TypeInfo {
                <Self as $crate::serialization::FieldValue>::type_info()
            }
            fn value(&self) -> Option<&dyn ::std::any::Any> {
                Some(self)
            }
            fn value_mut(&mut self) -> Option<&mut dyn ::std::any::Any> {
                Some(self)
            }
            fn assign(
                &mut self,
                value: $crate::serialization::BoxedValue,
                ty: &$crate::serialization::TypeInfo,
            ) -> $crate::util::Result<()> {
                $crate::serialization::assign_boxed(self, value, ty)
            }
            fn into_any(self: Box<Self>) -> Box<dyn ::std::any::Any> {
                self
            }
        }
    };
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $crate::serialization::FieldValue for $ty {
                fn type_info() -> $crate::serialization::TypeInfo {
                    $crate::serialization::TypeInfo::of::<$ty>()
                }
                fn runtime_type(&self) -> $crate::serialization::TypeInfo {
                    <Self as $crate::serialization::FieldValue>::type_info()
                }
                fn value(&self) -> Option<&dyn ::std::any::Any> {
                    Some(self)
                }
                fn value_mut(&mut self) -> Option<&mut dyn ::std::any::Any> {
                    Some(self)
                }
                fn assign(
                    &mut self,
                    value: $crate::serialization::BoxedValue,
                    ty: &$crate::serialization::TypeInfo,
                ) -> $crate::util::Result<()> {
                    $crate::serialization::assign_boxed(self, value, ty)
                }
                fn into_any(self: Box<Self>) -> Box<dyn ::std::any::Any> {
                    self
                }
            }
            impl $crate::serialization::DictElement for $ty {
                fn slot(&self) -> $crate::serialization::SlotRef<'_> {
                    $crate::serialization::SlotRef::Value(self)
                }
                fn slot_mut(&mut self) -> $crate::serialization::SlotMut<'_> {
                    $crate::serialization::SlotMut::Value(self)
                }
            }
        )+
    };
}

/// Downcast `value` into `slot`; used by [`impl_field_value!`].
#[doc(hidden)]
pub fn assign_boxed<T: 'static>(slot: &mut T, value: BoxedValue, ty: &TypeInfo) -> Result<()> {
    assign_exact(slot, value, ty)
}

macro_rules! intrinsic_values {
    ($($ty:ty),+ $(,)?) => {
        $( impl ArrayElement for $ty {} )+
        crate::impl_field_value!($($ty),+);
    };
}

intrinsic_values!(
    bool, u8, i32, u32, i64, u64, f16, f32, f64, String, Token, AssetPath,
    IVec2, IVec3, IVec4, Vec2, Vec3, Vec4, DVec2, DVec3, DVec4, Quat, DQuat, DMat4,
);

impl<T: ArrayElement> FieldValue for Vec<T> {
    fn type_info() -> TypeInfo {
        TypeInfo {
            release: Some(|boxed| {
                let boxed: Box<dyn Any> = boxed;
                let array = *boxed.downcast::<Vec<T>>().ok()?;
                Some(PooledArray::new(array, <Vec<T> as ArrayElement>::RANK))
            }),
            ..TypeInfo::array_of::<Vec<T>>(<Vec<T> as ArrayElement>::RANK)
        }
    }

    fn runtime_type(&self) -> TypeInfo {
        Self::type_info()
    }

    fn value(&self) -> Option<&dyn Any> {
        Some(self)
    }

    fn value_mut(&mut self) -> Option<&mut dyn Any> {
        Some(self)
    }

    fn assign(&mut self, value: BoxedValue, ty: &TypeInfo) -> Result<()> {
        assign_exact(self, value, ty)
    }

    fn set_null(&mut self) {
        self.clear();
    }

    fn take_array(&mut self) -> Option<PooledArray> {
        if self.is_empty() {
            return None;
        }
        Some(PooledArray::new(std::mem::take(self), <Vec<T> as ArrayElement>::RANK))
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

impl<T: ArrayElement> FieldValue for Box<[T]> {
    fn type_info() -> TypeInfo {
        TypeInfo {
            release: Some(|boxed| {
                let boxed: Box<dyn Any> = boxed;
                let array = boxed.downcast::<Box<[T]>>().ok()?.into_vec();
                Some(PooledArray::new(array, T::RANK + 1))
            }),
            ..TypeInfo::array_of::<Box<[T]>>(T::RANK + 1)
        }
    }

    fn runtime_type(&self) -> TypeInfo {
        Self::type_info()
    }

    fn value(&self) -> Option<&dyn Any> {
        Some(self)
    }

    fn value_mut(&mut self) -> Option<&mut dyn Any> {
        Some(self)
    }

    fn assign(&mut self, value: BoxedValue, ty: &TypeInfo) -> Result<()> {
        assign_exact(self, value, ty)
    }

    fn set_null(&mut self) {
        *self = Box::default();
    }

    fn take_array(&mut self) -> Option<PooledArray> {
        if self.is_empty() {
            return None;
        }
        let array = std::mem::take(self).into_vec();
        Some(PooledArray::new(array, T::RANK + 1))
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

impl<T: FieldValue> FieldValue for Option<T> {
    fn type_info() -> TypeInfo {
        let inner = T::type_info();
        TypeInfo { rank: inner.rank, ..TypeInfo::optional::<T>() }
    }

    fn runtime_type(&self) -> TypeInfo {
        match self {
            Some(v) => v.runtime_type(),
            None => T::type_info(),
        }
    }

    fn value(&self) -> Option<&dyn Any> {
        self.as_ref().and_then(|v| v.value())
    }

    fn value_mut(&mut self) -> Option<&mut dyn Any> {
        self.as_mut().and_then(|v| v.value_mut())
    }

    fn assign(&mut self, value: BoxedValue, ty: &TypeInfo) -> Result<()> {
        let value: Box<dyn Any> = value;
        match value.downcast::<T>() {
            Ok(v) => {
                *self = Some(*v);
                Ok(())
            }
            Err(_) => Err(Error::type_mismatch(type_name::<T>(), ty.name)),
        }
    }

    fn set_null(&mut self) {
        *self = None;
    }

    fn take_array(&mut self) -> Option<PooledArray> {
        let taken = self.as_mut()?.take_array();
        *self = None;
        taken
    }

    fn declared_rank(&self) -> u8 {
        T::type_info().rank
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// A slot whose type is decided by the value it holds.
///
/// Writing uses the held value's type. Reading an empty `Dynamic` infers the
/// type from the attribute's stored type name through the binder's reverse
/// lookup, which is lossy when several host types share a wire type.
#[derive(Default)]
pub struct Dynamic {
    value: Option<BoxedValue>,
    ty: Option<TypeInfo>,
}

impl Dynamic {
    pub fn new<T: FieldValue>(value: T) -> Self {
        Self { value: Some(Box::new(value)), ty: Some(T::type_info()) }
    }

    /// Hold a nested sample.
    pub fn sample<S: Sample>(sample: S) -> Self {
        Self { value: Some(Box::new(sample)), ty: Some(TypeInfo::of_sample::<S>()) }
    }

    pub fn is_none(&self) -> bool {
        self.value.is_none()
    }

    pub fn get<T: 'static>(&self) -> Option<&T> {
        self.value.as_ref()?.downcast_ref::<T>()
    }

    pub fn get_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.value.as_mut()?.downcast_mut::<T>()
    }

    pub fn held_type(&self) -> Option<&TypeInfo> {
        self.ty.as_ref()
    }

    pub fn take(&mut self) -> Option<BoxedValue> {
        self.ty = None;
        self.value.take()
    }
}

impl fmt::Debug for Dynamic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.ty {
            Some(ty) => write!(f, "Dynamic({})", ty.name),
            None => f.write_str("Dynamic(None)"),
        }
    }
}

impl FieldValue for Dynamic {
    fn type_info() -> TypeInfo {
        TypeInfo::dynamic()
    }

    fn runtime_type(&self) -> TypeInfo {
        self.ty.unwrap_or_else(TypeInfo::dynamic)
    }

    fn value(&self) -> Option<&dyn Any> {
        self.value.as_deref().map(|v| v as &dyn Any)
    }

    fn value_mut(&mut self) -> Option<&mut dyn Any> {
        self.value.as_deref_mut().map(|v| v as &mut dyn Any)
    }

    fn assign(&mut self, value: BoxedValue, ty: &TypeInfo) -> Result<()> {
        self.value = Some(value);
        self.ty = Some(*ty);
        Ok(())
    }

    fn set_null(&mut self) {
        self.value = None;
        self.ty = None;
    }

    fn take_array(&mut self) -> Option<PooledArray> {
        let release = self.ty?.release?;
        let boxed = self.value.take()?;
        self.ty = None;
        release(boxed).filter(|a| a.len > 0)
    }

    fn declared_rank(&self) -> u8 {
        self.ty.map_or(0, |t| t.rank)
    }

    fn is_dynamic(&self) -> bool {
        true
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// Fieldless enum stored as a lower-camel-case token.
///
/// Declare with [`usd_enum!`](crate::usd_enum).
pub trait UsdEnum: Copy + Send + Sync + 'static {
    /// Variant names in declaration order.
    const NAMES: &'static [&'static str];

    fn to_index(self) -> usize;
    fn from_index(index: usize) -> Option<Self>;
}

/// Declare an enum serialized as a token (`FaceVarying` <-> `faceVarying`).
#[macro_export]
macro_rules! usd_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        $vis enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $crate::serialization::UsdEnum for $name {
            const NAMES: &'static [&'static str] = &[$(stringify!($variant)),+];

            fn to_index(self) -> usize {
                self as usize
            }

            fn from_index(index: usize) -> Option<Self> {
                const ALL: &[$name] = &[$($name::$variant),+];
                ALL.get(index).copied()
            }
        }

        $crate::impl_field_value!(@enum $name);
    };
}
