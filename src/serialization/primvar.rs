//! Primvar wrapper: a value plus interpolation, element size and indices.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{FieldValue, TypeInfo};
use crate::util::{Error, Result, Token};

/// How a primvar's elements map onto the geometry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PrimvarInterpolation {
    /// One value for the whole prim.
    #[default]
    Constant,
    /// One value per face.
    Uniform,
    /// One value per vertex, linearly interpolated.
    Varying,
    /// One value per point, interpolated by the surface basis.
    Vertex,
    /// One value per face-vertex.
    FaceVarying,
}

impl PrimvarInterpolation {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Constant => "constant",
            Self::Uniform => "uniform",
            Self::Varying => "varying",
            Self::Vertex => "vertex",
            Self::FaceVarying => "faceVarying",
        }
    }

    pub fn to_token(&self) -> Token {
        Token::new(self.as_str())
    }

    /// Parse an interpolation token; unknown tokens are a schema mismatch.
    pub fn from_token(token: &str) -> Result<Self> {
        match token {
            "constant" => Ok(Self::Constant),
            "uniform" => Ok(Self::Uniform),
            "varying" => Ok(Self::Varying),
            "vertex" => Ok(Self::Vertex),
            "faceVarying" => Ok(Self::FaceVarying),
            other => Err(Error::schema(format!("unknown primvar interpolation '{other}'"))),
        }
    }
}

impl fmt::Display for PrimvarInterpolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A member stored under the `primvars:` namespace.
///
/// `value: None` writes nothing. Indices, when present, are written to the
/// companion `<name>:indices` attribute at the same time code.
#[derive(Clone, Debug, PartialEq)]
pub struct Primvar<T> {
    pub value: Option<T>,
    pub interpolation: PrimvarInterpolation,
    pub element_size: i32,
    pub indices: Option<Vec<i32>>,
}

impl<T> Default for Primvar<T> {
    fn default() -> Self {
        Self { value: None, interpolation: PrimvarInterpolation::Constant, element_size: 1, indices: None }
    }
}

impl<T> Primvar<T> {
    pub fn new(value: T) -> Self {
        Self { value: Some(value), ..Self::default() }
    }

    pub fn with_interpolation(mut self, interpolation: PrimvarInterpolation) -> Self {
        self.interpolation = interpolation;
        self
    }

    pub fn with_indices(mut self, indices: Vec<i32>) -> Self {
        self.indices = Some(indices);
        self
    }

    pub fn with_element_size(mut self, element_size: i32) -> Self {
        self.element_size = element_size;
        self
    }

    pub fn is_indexed(&self) -> bool {
        self.indices.is_some()
    }
}

/// Type-erased [`Primvar`].
pub trait PrimvarAccess: Send + Sync {
    /// The held value, if any.
    fn held(&self) -> Option<&dyn FieldValue>;
    /// The held value, created on demand for reading into.
    fn held_mut(&mut self) -> &mut dyn FieldValue;
    fn clear_held(&mut self);
    fn held_type(&self) -> TypeInfo;

    fn interpolation(&self) -> PrimvarInterpolation;
    fn set_interpolation(&mut self, interpolation: PrimvarInterpolation);
    fn element_size(&self) -> i32;
    fn set_element_size(&mut self, size: i32);
    fn indices(&self) -> Option<&[i32]>;
    fn set_indices(&mut self, indices: Option<Vec<i32>>);
}

impl<T: FieldValue + Default> PrimvarAccess for Primvar<T> {
    fn held(&self) -> Option<&dyn FieldValue> {
        self.value.as_ref().map(|v| v as &dyn FieldValue)
    }

    fn held_mut(&mut self) -> &mut dyn FieldValue {
        self.value.get_or_insert_with(T::default)
    }

    fn clear_held(&mut self) {
        self.value = None;
    }

    fn held_type(&self) -> TypeInfo {
        T::type_info()
    }

    fn interpolation(&self) -> PrimvarInterpolation {
        self.interpolation
    }

    fn set_interpolation(&mut self, interpolation: PrimvarInterpolation) {
        self.interpolation = interpolation;
    }

    fn element_size(&self) -> i32 {
        self.element_size
    }

    fn set_element_size(&mut self, size: i32) {
        self.element_size = size;
    }

    fn indices(&self) -> Option<&[i32]> {
        self.indices.as_deref()
    }

    fn set_indices(&mut self, indices: Option<Vec<i32>>) {
        self.indices = indices;
    }
}
