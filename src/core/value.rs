//! Wire values: the representation stored by a scene backend.

use glam::{DMat4, DQuat, DVec2, DVec3, DVec4, IVec2, IVec3, IVec4, Quat, Vec2, Vec3, Vec4};
use half::f16;
use serde::{Deserialize, Serialize};

use crate::util::{AssetPath, Token};

macro_rules! define_values {
    ($( $scalar:ident($ty:ty) => $array:ident ),* $(,)?) => {
        /// A type-tagged value as held by the backend.
        ///
        /// Every scalar kind has an array counterpart holding a `Vec` of the
        /// same element type.
        #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
        #[serde(tag = "kind", content = "value")]
        pub enum Value {
            $( $scalar($ty), $array(Vec<$ty>), )*
            Matrix4d(DMat4),
        }

        /// Storage kind of a [`Value`], without payload.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum ValueKind {
            $( $scalar, $array, )*
            Matrix4d,
        }

        impl Value {
            pub fn kind(&self) -> ValueKind {
                match self {
                    $(
                        Value::$scalar(_) => ValueKind::$scalar,
                        Value::$array(_) => ValueKind::$array,
                    )*
                    Value::Matrix4d(_) => ValueKind::Matrix4d,
                }
            }

            /// Element count for arrays, `None` for scalars.
            pub fn array_len(&self) -> Option<usize> {
                match self {
                    $( Value::$array(v) => Some(v.len()), )*
                    _ => None,
                }
            }
        }

        impl ValueKind {
            pub const fn is_array(self) -> bool {
                match self {
                    $( ValueKind::$array => true, )*
                    _ => false,
                }
            }

            /// Element kind of an array kind; scalars map to themselves.
            pub const fn element(self) -> ValueKind {
                match self {
                    $( ValueKind::$array => ValueKind::$scalar, )*
                    other => other,
                }
            }

            /// Array kind holding elements of this kind, if one exists.
            pub const fn array(self) -> Option<ValueKind> {
                match self {
                    $( ValueKind::$scalar => Some(ValueKind::$array), )*
                    _ => None,
                }
            }
        }

        $(
            impl WireValue for $ty {
                const KIND: ValueKind = ValueKind::$scalar;

                fn from_value(value: Value) -> Option<Self> {
                    match value {
                        Value::$scalar(v) => Some(v),
                        _ => None,
                    }
                }

                fn from_value_ref(value: &Value) -> Option<&Self> {
                    match value {
                        Value::$scalar(v) => Some(v),
                        _ => None,
                    }
                }

                fn into_value(self) -> Value {
                    Value::$scalar(self)
                }
            }

            impl WireValue for Vec<$ty> {
                const KIND: ValueKind = ValueKind::$array;

                fn from_value(value: Value) -> Option<Self> {
                    match value {
                        Value::$array(v) => Some(v),
                        _ => None,
                    }
                }

                fn from_value_ref(value: &Value) -> Option<&Self> {
                    match value {
                        Value::$array(v) => Some(v),
                        _ => None,
                    }
                }

                fn into_value(self) -> Value {
                    Value::$array(self)
                }
            }

            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$scalar(v)
                }
            }

            impl From<Vec<$ty>> for Value {
                fn from(v: Vec<$ty>) -> Self {
                    Value::$array(v)
                }
            }
        )*
    };
}

/// A Rust type with a direct wire representation.
pub trait WireValue: Sized + Clone + Send + Sync + 'static {
    const KIND: ValueKind;

    fn from_value(value: Value) -> Option<Self>;
    fn from_value_ref(value: &Value) -> Option<&Self>;
    fn into_value(self) -> Value;
}

define_values! {
    Bool(bool) => BoolArray,
    UChar(u8) => UCharArray,
    Int(i32) => IntArray,
    UInt(u32) => UIntArray,
    Int64(i64) => Int64Array,
    UInt64(u64) => UInt64Array,
    Half(f16) => HalfArray,
    Float(f32) => FloatArray,
    Double(f64) => DoubleArray,
    String(String) => StringArray,
    Token(Token) => TokenArray,
    Asset(AssetPath) => AssetArray,
    Int2(IVec2) => Int2Array,
    Int3(IVec3) => Int3Array,
    Int4(IVec4) => Int4Array,
    Float2(Vec2) => Float2Array,
    Float3(Vec3) => Float3Array,
    Float4(Vec4) => Float4Array,
    Double2(DVec2) => Double2Array,
    Double3(DVec3) => Double3Array,
    Double4(DVec4) => Double4Array,
    Quatf(Quat) => QuatfArray,
    Quatd(DQuat) => QuatdArray,
}

impl WireValue for DMat4 {
    const KIND: ValueKind = ValueKind::Matrix4d;

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Matrix4d(m) => Some(m),
            _ => None,
        }
    }

    fn from_value_ref(value: &Value) -> Option<&Self> {
        match value {
            Value::Matrix4d(m) => Some(m),
            _ => None,
        }
    }

    fn into_value(self) -> Value {
        Value::Matrix4d(self)
    }
}

impl From<DMat4> for Value {
    fn from(m: DMat4) -> Self {
        Value::Matrix4d(m)
    }
}

impl Value {
    pub fn is_array(&self) -> bool {
        self.kind().is_array()
    }

    /// True for empty arrays and empty strings/tokens.
    pub fn is_empty(&self) -> bool {
        match self {
            Value::String(s) => s.is_empty(),
            Value::Token(t) => t.is_empty(),
            other => other.array_len() == Some(0),
        }
    }

    /// Extract a typed payload.
    pub fn get<T: WireValue>(&self) -> Option<&T> {
        T::from_value_ref(self)
    }

    /// Linear interpolation between two samples of the same kind.
    ///
    /// Only floating-point kinds interpolate; everything else (and mismatched
    /// array lengths) holds the earlier value.
    pub fn lerp(&self, other: &Value, alpha: f64) -> Value {
        let a32 = alpha as f32;
        match (self, other) {
            (Value::Float(a), Value::Float(b)) => Value::Float(a + (b - a) * a32),
            (Value::Double(a), Value::Double(b)) => Value::Double(a + (b - a) * alpha),
            (Value::Half(a), Value::Half(b)) => {
                let (a, b) = (a.to_f32(), b.to_f32());
                Value::Half(f16::from_f32(a + (b - a) * a32))
            }
            (Value::Float2(a), Value::Float2(b)) => Value::Float2(a.lerp(*b, a32)),
            (Value::Float3(a), Value::Float3(b)) => Value::Float3(a.lerp(*b, a32)),
            (Value::Float4(a), Value::Float4(b)) => Value::Float4(a.lerp(*b, a32)),
            (Value::Double2(a), Value::Double2(b)) => Value::Double2(a.lerp(*b, alpha)),
            (Value::Double3(a), Value::Double3(b)) => Value::Double3(a.lerp(*b, alpha)),
            (Value::Double4(a), Value::Double4(b)) => Value::Double4(a.lerp(*b, alpha)),
            (Value::Quatf(a), Value::Quatf(b)) => Value::Quatf(a.slerp(*b, a32)),
            (Value::Quatd(a), Value::Quatd(b)) => Value::Quatd(a.slerp(*b, alpha)),
            (Value::FloatArray(a), Value::FloatArray(b)) if a.len() == b.len() => {
                Value::FloatArray(a.iter().zip(b).map(|(a, b)| a + (b - a) * a32).collect())
            }
            (Value::DoubleArray(a), Value::DoubleArray(b)) if a.len() == b.len() => {
                Value::DoubleArray(a.iter().zip(b).map(|(a, b)| a + (b - a) * alpha).collect())
            }
            (Value::Float2Array(a), Value::Float2Array(b)) if a.len() == b.len() => {
                Value::Float2Array(a.iter().zip(b).map(|(a, b)| a.lerp(*b, a32)).collect())
            }
            (Value::Float3Array(a), Value::Float3Array(b)) if a.len() == b.len() => {
                Value::Float3Array(a.iter().zip(b).map(|(a, b)| a.lerp(*b, a32)).collect())
            }
            (Value::Float4Array(a), Value::Float4Array(b)) if a.len() == b.len() => {
                Value::Float4Array(a.iter().zip(b).map(|(a, b)| a.lerp(*b, a32)).collect())
            }
            _ => self.clone(),
        }
    }
}
