//! Scene backend - the hierarchical attribute store the engine talks to.
//!
//! - [`SceneBackend`] - Capability set consumed by the serialization engine
//! - [`MemoryStage`] - In-memory implementation with JSON persistence
//! - [`SparseValueWriter`] - Elides redundant consecutive time samples
//! - [`LayerMetadata`] - Stage-level timing and units
//!
//! Every call here runs under the owning scene's stage lock; implementations
//! need `Send` but not `Sync`.

mod memory;
mod sparse;
mod xform;

pub use memory::{MemoryStage, LayerMetadata};
pub use sparse::SparseValueWriter;
pub use xform::{compose_xform_ops, XFORM_OP_ORDER};

use glam::{DMat4, Vec3, Vec4};
use std::path::Path;

use crate::core::{TimeCode, Value, ValueTypeName, Variability};
use crate::util::{join_namespace, Error, Result, SdfPath, Token, PRIMVARS_NAMESPACE};

/// A property on a prim: attribute or relationship.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PropertyHandle {
    pub prim: SdfPath,
    pub name: Token,
}

impl PropertyHandle {
    pub fn new(prim: SdfPath, name: Token) -> Self {
        Self { prim, name }
    }

    /// `/prim.name`
    pub fn path(&self) -> Result<SdfPath> {
        self.prim.append_property(&self.name)
    }
}

pub type AttributeHandle = PropertyHandle;
pub type RelationshipHandle = PropertyHandle;

/// Name of the primvar interpolation metadata key.
pub const INTERPOLATION_KEY: &str = "interpolation";
/// Suffix of the companion attribute holding primvar indices.
pub const INDICES_SUFFIX: &str = "indices";
/// Primvar names used by fused display color.
pub const DISPLAY_COLOR: &str = "primvars:displayColor";
pub const DISPLAY_OPACITY: &str = "primvars:displayOpacity";

/// Typed, time-sampled property store.
pub trait SceneBackend: Send {
    // === Prims ===

    /// Define `path` (and any missing ancestors) with the given schema type.
    fn define_prim(&mut self, path: &SdfPath, type_name: &str) -> Result<()>;
    /// Author an override for `path`, creating it if absent.
    fn override_prim(&mut self, path: &SdfPath) -> Result<()>;
    fn prim_exists(&self, path: &SdfPath) -> bool;
    fn prim_type_name(&self, path: &SdfPath) -> Option<Token>;
    /// All prims at or under `root` whose type name is `type_name`.
    fn find_prims_by_type(&self, type_name: &str, root: &SdfPath) -> Vec<SdfPath>;
    /// Every prim path in depth-first order.
    fn prim_paths(&self) -> Vec<SdfPath>;

    // === Attributes ===

    fn create_attribute(
        &mut self,
        prim: &SdfPath,
        name: &Token,
        type_name: ValueTypeName,
        variability: Variability,
    ) -> Result<AttributeHandle>;
    fn get_attribute(&self, prim: &SdfPath, name: &str) -> Option<AttributeHandle>;
    fn attribute_type_name(&self, attr: &AttributeHandle) -> Option<ValueTypeName>;
    fn attribute_variability(&self, attr: &AttributeHandle) -> Variability;
    /// Resolved value at `time`; `None` when nothing is authored.
    fn get_value(&self, attr: &AttributeHandle, time: TimeCode) -> Result<Option<Value>>;
    fn set_value(&mut self, attr: &AttributeHandle, value: Value, time: TimeCode) -> Result<()>;
    /// Cheap check that does not read values: more than one time sample.
    fn might_vary_over_time(&self, attr: &AttributeHandle) -> bool;
    fn time_samples(&self, attr: &AttributeHandle) -> Vec<f64>;
    fn set_connections(&mut self, attr: &AttributeHandle, sources: &[SdfPath]) -> Result<()>;
    fn get_connections(&self, attr: &AttributeHandle) -> Vec<SdfPath>;
    fn set_attribute_custom_data(&mut self, attr: &AttributeHandle, key: &str, value: Value) -> Result<()>;
    fn get_attribute_custom_data(&self, attr: &AttributeHandle, key: &str) -> Option<Value>;
    fn set_attribute_metadata(&mut self, attr: &AttributeHandle, key: &str, value: Value) -> Result<()>;
    fn get_attribute_metadata(&self, attr: &AttributeHandle, key: &str) -> Option<Value>;

    // === Relationships ===

    fn create_relationship(&mut self, prim: &SdfPath, name: &Token) -> Result<RelationshipHandle>;
    fn get_relationship(&self, prim: &SdfPath, name: &str) -> Option<RelationshipHandle>;
    fn set_targets(&mut self, rel: &RelationshipHandle, targets: &[SdfPath]) -> Result<()>;
    fn get_targets(&self, rel: &RelationshipHandle) -> Vec<SdfPath>;

    // === Prim metadata ===

    fn set_metadata(&mut self, prim: &SdfPath, key: &str, value: Value) -> Result<()>;
    fn get_metadata(&self, prim: &SdfPath, key: &str) -> Option<Value>;
    fn set_custom_data(&mut self, prim: &SdfPath, key: &str, value: Value) -> Result<()>;
    fn get_custom_data(&self, prim: &SdfPath, key: &str) -> Option<Value>;

    /// Authored properties named `ns:<rest>`, as `(rest, handle)` pairs.
    fn authored_properties_in_namespace(&self, prim: &SdfPath, ns: &str) -> Vec<(String, PropertyHandle)>;

    // === Stage ===

    fn layer(&self) -> &LayerMetadata;
    fn layer_mut(&mut self) -> &mut LayerMetadata;

    /// Persist the stage to `path`.
    fn save_to(&self, path: &Path) -> Result<()> {
        Err(Error::Unsupported(format!("this backend cannot be saved to {}", path.display())))
    }

    // === Primvars ===
    //
    // Provided on top of the attribute primitives; backends with native
    // primvar support may override them.

    /// Create `primvars:<name>` with a default interpolation.
    fn create_primvar(
        &mut self,
        prim: &SdfPath,
        name: &str,
        type_name: ValueTypeName,
        interpolation: &Token,
    ) -> Result<AttributeHandle> {
        let full = Token::from(join_namespace(PRIMVARS_NAMESPACE, name));
        let attr = self.create_attribute(prim, &full, type_name, Variability::Varying)?;
        if self.get_attribute_metadata(&attr, INTERPOLATION_KEY).is_none() {
            self.set_attribute_metadata(&attr, INTERPOLATION_KEY, Value::Token(interpolation.clone()))?;
        }
        Ok(attr)
    }

    fn set_element_size(&mut self, attr: &AttributeHandle, size: i32) -> Result<()> {
        self.set_attribute_metadata(attr, "elementSize", Value::Int(size))
    }

    fn get_element_size(&self, attr: &AttributeHandle) -> i32 {
        match self.get_attribute_metadata(attr, "elementSize") {
            Some(Value::Int(n)) => n,
            _ => 1,
        }
    }

    fn set_interpolation(&mut self, attr: &AttributeHandle, interpolation: &Token) -> Result<()> {
        self.set_attribute_metadata(attr, INTERPOLATION_KEY, Value::Token(interpolation.clone()))
    }

    fn get_interpolation(&self, attr: &AttributeHandle) -> Option<Token> {
        match self.get_attribute_metadata(attr, INTERPOLATION_KEY) {
            Some(Value::Token(t)) => Some(t),
            _ => None,
        }
    }

    fn indices_attribute(&self, attr: &AttributeHandle) -> Option<AttributeHandle> {
        self.get_attribute(&attr.prim, &join_namespace(&attr.name, INDICES_SUFFIX))
    }

    fn set_indices(&mut self, attr: &AttributeHandle, indices: Vec<i32>, time: TimeCode) -> Result<()> {
        let name = Token::from(join_namespace(&attr.name, INDICES_SUFFIX));
        let indices_attr = self.create_attribute(&attr.prim, &name, ValueTypeName::INT_ARRAY, Variability::Varying)?;
        self.set_value(&indices_attr, Value::IntArray(indices), time)
    }

    // === Fused readers/writers ===

    /// Write a `color4f[]` as `displayColor` (rgb) plus `displayOpacity` (a).
    fn set_fused_display_color(&mut self, prim: &SdfPath, value: Value, time: TimeCode) -> Result<()> {
        let colors = match value {
            Value::Float4Array(c) => c,
            Value::Float4(c) => vec![c],
            other => {
                return Err(Error::type_mismatch("color4f[]", format!("{:?}", other.kind())));
            }
        };
        let (rgb, alpha): (Vec<Vec3>, Vec<f32>) = colors
            .iter()
            .map(|c| {
                let [r, g, b, a]: [f32; 4] = bytemuck::cast(*c);
                (Vec3::new(r, g, b), a)
            })
            .unzip();
        let color_attr = self.create_attribute(
            prim, &Token::new(DISPLAY_COLOR), ValueTypeName::COLOR3F_ARRAY, Variability::Varying,
        )?;
        let opacity_attr = self.create_attribute(
            prim, &Token::new(DISPLAY_OPACITY), ValueTypeName::FLOAT_ARRAY, Variability::Varying,
        )?;
        self.set_value(&color_attr, Value::Float3Array(rgb), time)?;
        self.set_value(&opacity_attr, Value::FloatArray(alpha), time)
    }

    /// Fuse `displayColor` and `displayOpacity` back into `color4f[]`.
    ///
    /// Missing opacity entries default to 1.
    fn get_fused_display_color(&self, prim: &SdfPath, time: TimeCode) -> Result<Option<Value>> {
        let Some(color_attr) = self.get_attribute(prim, DISPLAY_COLOR) else {
            return Ok(None);
        };
        let rgb = match self.get_value(&color_attr, time)? {
            Some(Value::Float3Array(rgb)) => rgb,
            Some(Value::Float3(c)) => vec![c],
            Some(other) => return Err(Error::type_mismatch("color3f[]", format!("{:?}", other.kind()))),
            None => return Ok(None),
        };
        let alpha = match self.get_attribute(prim, DISPLAY_OPACITY) {
            Some(attr) => match self.get_value(&attr, time)? {
                Some(Value::FloatArray(a)) => a,
                Some(Value::Float(a)) => vec![a],
                _ => Vec::new(),
            },
            None => Vec::new(),
        };
        let fused = rgb
            .iter()
            .enumerate()
            .map(|(i, c)| c.extend(alpha.get(i).copied().unwrap_or(1.0)))
            .collect::<Vec<Vec4>>();
        Ok(Some(Value::Float4Array(fused)))
    }

    fn fused_display_color_might_vary(&self, prim: &SdfPath) -> bool {
        self.get_attribute(prim, DISPLAY_COLOR)
            .is_some_and(|attr| self.might_vary_over_time(&attr))
    }

    /// Local transform composed from the prim's ordered xform ops.
    fn get_fused_transform(&self, prim: &SdfPath, time: TimeCode) -> Result<Option<DMat4>> {
        let Some(order) = self.xform_op_order(prim, time)? else {
            return Ok(None);
        };
        let mut ops = Vec::with_capacity(order.len());
        for op in order.iter() {
            let name = op.strip_prefix("!invert!").unwrap_or(op);
            let value = match self.get_attribute(prim, name) {
                Some(attr) => self.get_value(&attr, time)?,
                None => None,
            };
            ops.push((op.clone(), value));
        }
        compose_xform_ops(&ops).map(Some)
    }

    /// `xformOpOrder` varying wins; otherwise any varying op.
    fn fused_transform_might_vary(&self, prim: &SdfPath) -> bool {
        let Some(order_attr) = self.get_attribute(prim, XFORM_OP_ORDER) else {
            return false;
        };
        if self.attribute_variability(&order_attr) == Variability::Varying
            && self.might_vary_over_time(&order_attr)
        {
            return true;
        }
        let Ok(Some(order)) = self.xform_op_order(prim, TimeCode::Default) else {
            return false;
        };
        order.iter().any(|op| {
            let name = op.strip_prefix("!invert!").unwrap_or(op);
            self.get_attribute(prim, name).is_some_and(|attr| {
                self.attribute_variability(&attr) == Variability::Varying && self.might_vary_over_time(&attr)
            })
        })
    }

    /// Authored `xformOpOrder`, if any.
    fn xform_op_order(&self, prim: &SdfPath, time: TimeCode) -> Result<Option<Vec<Token>>> {
        let Some(attr) = self.get_attribute(prim, XFORM_OP_ORDER) else {
            return Ok(None);
        };
        match self.get_value(&attr, time)? {
            Some(Value::TokenArray(order)) => Ok(Some(order)),
            Some(Value::StringArray(order)) => Ok(Some(order.into_iter().map(Token::from).collect())),
            Some(other) => Err(Error::type_mismatch("token[]", format!("{:?}", other.kind()))),
            None => Ok(None),
        }
    }
}
