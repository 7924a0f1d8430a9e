//! ValueTypeName - the backend's wire type tag.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use super::ValueKind;
use crate::util::Token;

/// Names an attribute's stored representation.
///
/// Several names can share one [`ValueKind`]: role types such as `color3f`
/// and `point3f` are stored exactly like `float3` but keep their own name so
/// consumers can tell them apart.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ValueTypeName {
    name: &'static str,
    kind: ValueKind,
}

impl ValueTypeName {
    pub const fn new(name: &'static str, kind: ValueKind) -> Self {
        Self { name, kind }
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }

    pub const fn kind(&self) -> ValueKind {
        self.kind
    }

    pub const fn is_array(&self) -> bool {
        self.kind.is_array()
    }

    pub fn as_token(&self) -> Token {
        Token::new(self.name)
    }

    /// Look up a registered type name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.name == name)
    }

    /// Scalar counterpart of an array type (`float3[]` -> `float3`).
    pub fn scalar_type(&self) -> Self {
        match self.name.strip_suffix("[]") {
            Some(scalar) => Self::from_name(scalar).unwrap_or(*self),
            None => *self,
        }
    }

    // Scalars
    pub const BOOL: Self = Self::new("bool", ValueKind::Bool);
    pub const UCHAR: Self = Self::new("uchar", ValueKind::UChar);
    pub const INT: Self = Self::new("int", ValueKind::Int);
    pub const UINT: Self = Self::new("uint", ValueKind::UInt);
    pub const INT64: Self = Self::new("int64", ValueKind::Int64);
    pub const UINT64: Self = Self::new("uint64", ValueKind::UInt64);
    pub const HALF: Self = Self::new("half", ValueKind::Half);
    pub const FLOAT: Self = Self::new("float", ValueKind::Float);
    pub const DOUBLE: Self = Self::new("double", ValueKind::Double);
    pub const STRING: Self = Self::new("string", ValueKind::String);
    pub const TOKEN: Self = Self::new("token", ValueKind::Token);
    pub const ASSET: Self = Self::new("asset", ValueKind::Asset);

    // Vectors
    pub const INT2: Self = Self::new("int2", ValueKind::Int2);
    pub const INT3: Self = Self::new("int3", ValueKind::Int3);
    pub const INT4: Self = Self::new("int4", ValueKind::Int4);
    pub const FLOAT2: Self = Self::new("float2", ValueKind::Float2);
    pub const FLOAT3: Self = Self::new("float3", ValueKind::Float3);
    pub const FLOAT4: Self = Self::new("float4", ValueKind::Float4);
    pub const DOUBLE2: Self = Self::new("double2", ValueKind::Double2);
    pub const DOUBLE3: Self = Self::new("double3", ValueKind::Double3);
    pub const DOUBLE4: Self = Self::new("double4", ValueKind::Double4);
    pub const QUATF: Self = Self::new("quatf", ValueKind::Quatf);
    pub const QUATD: Self = Self::new("quatd", ValueKind::Quatd);
    pub const MATRIX4D: Self = Self::new("matrix4d", ValueKind::Matrix4d);

    // Roles
    pub const COLOR3F: Self = Self::new("color3f", ValueKind::Float3);
    pub const COLOR4F: Self = Self::new("color4f", ValueKind::Float4);
    pub const POINT3F: Self = Self::new("point3f", ValueKind::Float3);
    pub const NORMAL3F: Self = Self::new("normal3f", ValueKind::Float3);
    pub const VECTOR3F: Self = Self::new("vector3f", ValueKind::Float3);
    pub const TEXCOORD2F: Self = Self::new("texCoord2f", ValueKind::Float2);
    pub const TEXCOORD3F: Self = Self::new("texCoord3f", ValueKind::Float3);

    // Arrays
    pub const BOOL_ARRAY: Self = Self::new("bool[]", ValueKind::BoolArray);
    pub const UCHAR_ARRAY: Self = Self::new("uchar[]", ValueKind::UCharArray);
    pub const INT_ARRAY: Self = Self::new("int[]", ValueKind::IntArray);
    pub const UINT_ARRAY: Self = Self::new("uint[]", ValueKind::UIntArray);
    pub const INT64_ARRAY: Self = Self::new("int64[]", ValueKind::Int64Array);
    pub const UINT64_ARRAY: Self = Self::new("uint64[]", ValueKind::UInt64Array);
    pub const HALF_ARRAY: Self = Self::new("half[]", ValueKind::HalfArray);
    pub const FLOAT_ARRAY: Self = Self::new("float[]", ValueKind::FloatArray);
    pub const DOUBLE_ARRAY: Self = Self::new("double[]", ValueKind::DoubleArray);
    pub const STRING_ARRAY: Self = Self::new("string[]", ValueKind::StringArray);
    pub const TOKEN_ARRAY: Self = Self::new("token[]", ValueKind::TokenArray);
    pub const ASSET_ARRAY: Self = Self::new("asset[]", ValueKind::AssetArray);
    pub const INT2_ARRAY: Self = Self::new("int2[]", ValueKind::Int2Array);
    pub const INT3_ARRAY: Self = Self::new("int3[]", ValueKind::Int3Array);
    pub const INT4_ARRAY: Self = Self::new("int4[]", ValueKind::Int4Array);
    pub const FLOAT2_ARRAY: Self = Self::new("float2[]", ValueKind::Float2Array);
    pub const FLOAT3_ARRAY: Self = Self::new("float3[]", ValueKind::Float3Array);
    pub const FLOAT4_ARRAY: Self = Self::new("float4[]", ValueKind::Float4Array);
    pub const DOUBLE2_ARRAY: Self = Self::new("double2[]", ValueKind::Double2Array);
    pub const DOUBLE3_ARRAY: Self = Self::new("double3[]", ValueKind::Double3Array);
    pub const DOUBLE4_ARRAY: Self = Self::new("double4[]", ValueKind::Double4Array);
    pub const QUATF_ARRAY: Self = Self::new("quatf[]", ValueKind::QuatfArray);
    pub const QUATD_ARRAY: Self = Self::new("quatd[]", ValueKind::QuatdArray);
    pub const COLOR3F_ARRAY: Self = Self::new("color3f[]", ValueKind::Float3Array);
    pub const COLOR4F_ARRAY: Self = Self::new("color4f[]", ValueKind::Float4Array);
    pub const POINT3F_ARRAY: Self = Self::new("point3f[]", ValueKind::Float3Array);
    pub const NORMAL3F_ARRAY: Self = Self::new("normal3f[]", ValueKind::Float3Array);
    pub const VECTOR3F_ARRAY: Self = Self::new("vector3f[]", ValueKind::Float3Array);
    pub const TEXCOORD2F_ARRAY: Self = Self::new("texCoord2f[]", ValueKind::Float2Array);
    pub const TEXCOORD3F_ARRAY: Self = Self::new("texCoord3f[]", ValueKind::Float3Array);

    /// Every predefined type name.
    pub const ALL: &'static [Self] = &[
        Self::BOOL, Self::UCHAR, Self::INT, Self::UINT, Self::INT64, Self::UINT64,
        Self::HALF, Self::FLOAT, Self::DOUBLE, Self::STRING, Self::TOKEN, Self::ASSET,
        Self::INT2, Self::INT3, Self::INT4, Self::FLOAT2, Self::FLOAT3, Self::FLOAT4,
        Self::DOUBLE2, Self::DOUBLE3, Self::DOUBLE4, Self::QUATF, Self::QUATD, Self::MATRIX4D,
        Self::COLOR3F, Self::COLOR4F, Self::POINT3F, Self::NORMAL3F, Self::VECTOR3F,
        Self::TEXCOORD2F, Self::TEXCOORD3F,
        Self::BOOL_ARRAY, Self::UCHAR_ARRAY, Self::INT_ARRAY, Self::UINT_ARRAY,
        Self::INT64_ARRAY, Self::UINT64_ARRAY, Self::HALF_ARRAY, Self::FLOAT_ARRAY,
        Self::DOUBLE_ARRAY, Self::STRING_ARRAY, Self::TOKEN_ARRAY, Self::ASSET_ARRAY,
        Self::INT2_ARRAY, Self::INT3_ARRAY, Self::INT4_ARRAY,
        Self::FLOAT2_ARRAY, Self::FLOAT3_ARRAY, Self::FLOAT4_ARRAY,
        Self::DOUBLE2_ARRAY, Self::DOUBLE3_ARRAY, Self::DOUBLE4_ARRAY,
        Self::QUATF_ARRAY, Self::QUATD_ARRAY,
        Self::COLOR3F_ARRAY, Self::COLOR4F_ARRAY, Self::POINT3F_ARRAY, Self::NORMAL3F_ARRAY,
        Self::VECTOR3F_ARRAY, Self::TEXCOORD2F_ARRAY, Self::TEXCOORD3F_ARRAY,
    ];
}

impl fmt::Debug for ValueTypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ValueTypeName({})", self.name)
    }
}

impl fmt::Display for ValueTypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl Serialize for ValueTypeName {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name)
    }
}

impl<'de> Deserialize<'de> for ValueTypeName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Self::from_name(&name)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown value type name: {name}")))
    }
}
