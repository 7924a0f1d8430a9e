//! In-memory scene backend.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::BTreeMap;
use std::path::Path;

use super::{AttributeHandle, PropertyHandle, RelationshipHandle, SceneBackend};
use crate::core::{InterpolationMode, Specifier, TimeCode, UpAxis, Value, ValueTypeName, Variability};
use crate::util::{strip_namespace, Error, Result, SdfPath, Token};

/// Stage-level timing and unit settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LayerMetadata {
    pub start_time_code: f64,
    pub end_time_code: f64,
    pub frames_per_second: f64,
    pub time_codes_per_second: f64,
    pub up_axis: UpAxis,
    pub meters_per_unit: f64,
    pub interpolation: InterpolationMode,
}

impl Default for LayerMetadata {
    fn default() -> Self {
        Self {
            start_time_code: 0.0,
            end_time_code: 0.0,
            frames_per_second: 24.0,
            time_codes_per_second: 24.0,
            up_axis: UpAxis::Z,
            meters_per_unit: 0.01,
            interpolation: InterpolationMode::Linear,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct AttributeSpec {
    type_name: ValueTypeName,
    variability: Variability,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    default: Option<Value>,
    /// Sorted by time.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    samples: Vec<(f64, Value)>,
    #[serde(default, skip_serializing_if = "SmallVec::is_empty")]
    connections: SmallVec<[SdfPath; 1]>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    metadata: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    custom_data: BTreeMap<String, Value>,
}

impl AttributeSpec {
    fn new(type_name: ValueTypeName, variability: Variability) -> Self {
        Self {
            type_name,
            variability,
            default: None,
            samples: Vec::new(),
            connections: SmallVec::new(),
            metadata: BTreeMap::new(),
            custom_data: BTreeMap::new(),
        }
    }

    fn resolve(&self, time: TimeCode, interpolation: InterpolationMode) -> Option<Value> {
        let t = match time {
            TimeCode::Time(t) if !self.samples.is_empty() => t,
            _ => return self.default.clone(),
        };
        let upper = self.samples.partition_point(|(st, _)| *st <= t);
        if upper == 0 {
            return Some(self.samples[0].1.clone());
        }
        let (t0, v0) = &self.samples[upper - 1];
        if upper == self.samples.len() || *t0 == t {
            return Some(v0.clone());
        }
        match interpolation {
            InterpolationMode::Held => Some(v0.clone()),
            InterpolationMode::Linear => {
                let (t1, v1) = &self.samples[upper];
                Some(v0.lerp(v1, (t - t0) / (t1 - t0)))
            }
        }
    }

    fn is_authored(&self) -> bool {
        self.default.is_some() || !self.samples.is_empty() || !self.connections.is_empty()
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct PrimSpec {
    specifier: Specifier,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    type_name: Option<Token>,
    #[serde(default)]
    attributes: BTreeMap<Token, AttributeSpec>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    relationships: BTreeMap<Token, Vec<SdfPath>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    metadata: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    custom_data: BTreeMap<String, Value>,
}

/// A complete stage held in memory.
///
/// Prims are keyed by path; attribute values resolve through the layer's
/// [`InterpolationMode`]. Saved and loaded as JSON.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MemoryStage {
    layer: LayerMetadata,
    prims: BTreeMap<SdfPath, PrimSpec>,
}

impl MemoryStage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of prims, excluding the pseudo-root.
    pub fn prim_count(&self) -> usize {
        self.prims.len()
    }

    /// Names of all attributes authored on `prim`.
    pub fn attribute_names(&self, prim: &SdfPath) -> Vec<Token> {
        self.prims.get(prim).map(|p| p.attributes.keys().cloned().collect()).unwrap_or_default()
    }

    /// Names of all relationships authored on `prim`.
    pub fn relationship_names(&self, prim: &SdfPath) -> Vec<Token> {
        self.prims.get(prim).map(|p| p.relationships.keys().cloned().collect()).unwrap_or_default()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_json()?)?;
        tracing::debug!("saved stage with {} prims to {}", self.prims.len(), path.display());
        Ok(())
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::FileNotFound(path.to_path_buf()));
        }
        let stage = Self::from_json(&std::fs::read_to_string(path)?)?;
        tracing::debug!("loaded stage with {} prims from {}", stage.prims.len(), path.display());
        Ok(stage)
    }

    fn prim(&self, path: &SdfPath) -> Result<&PrimSpec> {
        self.prims.get(path).ok_or_else(|| Error::PrimNotFound(path.to_string()))
    }

    fn prim_mut(&mut self, path: &SdfPath) -> Result<&mut PrimSpec> {
        self.prims.get_mut(path).ok_or_else(|| Error::PrimNotFound(path.to_string()))
    }

    fn attr(&self, attr: &AttributeHandle) -> Option<&AttributeSpec> {
        self.prims.get(&attr.prim)?.attributes.get(&attr.name)
    }

    fn attr_mut(&mut self, attr: &AttributeHandle) -> Result<&mut AttributeSpec> {
        self.prim_mut(&attr.prim)?
            .attributes
            .get_mut(&attr.name)
            .ok_or_else(|| Error::PropertyNotFound(format!("{}.{}", attr.prim, attr.name)))
    }

    fn ensure_ancestors(&mut self, path: &SdfPath, specifier: Specifier) {
        for prefix in path.prefixes() {
            self.prims.entry(prefix).or_insert_with(|| PrimSpec { specifier, ..Default::default() });
        }
    }
}

impl SceneBackend for MemoryStage {
    fn define_prim(&mut self, path: &SdfPath, type_name: &str) -> Result<()> {
        if path.is_absolute_root() || path.is_property_path() {
            return Err(Error::InvalidArgument(format!("cannot define prim at {path}")));
        }
        self.ensure_ancestors(path, Specifier::Def);
        let prim = self.prim_mut(path)?;
        prim.specifier = Specifier::Def;
        if !type_name.is_empty() {
            prim.type_name = Some(Token::new(type_name));
        }
        Ok(())
    }

    fn override_prim(&mut self, path: &SdfPath) -> Result<()> {
        if path.is_absolute_root() || path.is_property_path() {
            return Err(Error::InvalidArgument(format!("cannot override prim at {path}")));
        }
        self.ensure_ancestors(path, Specifier::Over);
        Ok(())
    }

    fn prim_exists(&self, path: &SdfPath) -> bool {
        path.is_absolute_root() || self.prims.contains_key(path)
    }

    fn prim_type_name(&self, path: &SdfPath) -> Option<Token> {
        self.prims.get(path)?.type_name.clone()
    }

    fn find_prims_by_type(&self, type_name: &str, root: &SdfPath) -> Vec<SdfPath> {
        self.prims
            .iter()
            .filter(|(path, prim)| {
                path.has_prefix(root) && prim.type_name.as_deref() == Some(type_name)
            })
            .map(|(path, _)| path.clone())
            .collect()
    }

    fn prim_paths(&self) -> Vec<SdfPath> {
        self.prims.keys().cloned().collect()
    }

    fn create_attribute(
        &mut self,
        prim: &SdfPath,
        name: &Token,
        type_name: ValueTypeName,
        variability: Variability,
    ) -> Result<AttributeHandle> {
        let spec = self.prim_mut(prim)?;
        let attr = spec
            .attributes
            .entry(name.clone())
            .or_insert_with(|| AttributeSpec::new(type_name, variability));
        if attr.type_name != type_name {
            if attr.type_name.kind() != type_name.kind() {
                tracing::debug!("{prim}.{name}: retyped {} -> {}, dropping values", attr.type_name, type_name);
                attr.default = None;
                attr.samples.clear();
            }
            attr.type_name = type_name;
        }
        attr.variability = variability;
        Ok(PropertyHandle::new(prim.clone(), name.clone()))
    }

    fn get_attribute(&self, prim: &SdfPath, name: &str) -> Option<AttributeHandle> {
        let (key, _) = self.prims.get(prim)?.attributes.get_key_value(name)?;
        Some(PropertyHandle::new(prim.clone(), key.clone()))
    }

    fn attribute_type_name(&self, attr: &AttributeHandle) -> Option<ValueTypeName> {
        self.attr(attr).map(|a| a.type_name)
    }

    fn attribute_variability(&self, attr: &AttributeHandle) -> Variability {
        self.attr(attr).map_or(Variability::Varying, |a| a.variability)
    }

    fn get_value(&self, attr: &AttributeHandle, time: TimeCode) -> Result<Option<Value>> {
        Ok(self.attr(attr).and_then(|a| a.resolve(time, self.layer.interpolation)))
    }

    fn set_value(&mut self, attr: &AttributeHandle, value: Value, time: TimeCode) -> Result<()> {
        let spec = self.attr_mut(attr)?;
        if value.kind() != spec.type_name.kind() {
            return Err(Error::type_mismatch(
                format!("{} for {}.{}", spec.type_name, attr.prim, attr.name),
                format!("{:?}", value.kind()),
            ));
        }
        match time {
            TimeCode::Default => spec.default = Some(value),
            TimeCode::Time(_) if spec.variability == Variability::Uniform => {
                // Uniform attributes have no time samples.
                spec.default = Some(value);
            }
            TimeCode::Time(t) => {
                let idx = spec.samples.partition_point(|(st, _)| *st < t);
                match spec.samples.get_mut(idx) {
                    Some((st, v)) if *st == t => *v = value,
                    _ => spec.samples.insert(idx, (t, value)),
                }
            }
        }
        Ok(())
    }

    fn might_vary_over_time(&self, attr: &AttributeHandle) -> bool {
        self.attr(attr).is_some_and(|a| a.samples.len() > 1)
    }

    fn time_samples(&self, attr: &AttributeHandle) -> Vec<f64> {
        self.attr(attr).map(|a| a.samples.iter().map(|(t, _)| *t).collect()).unwrap_or_default()
    }

    fn set_connections(&mut self, attr: &AttributeHandle, sources: &[SdfPath]) -> Result<()> {
        self.attr_mut(attr)?.connections = sources.iter().cloned().collect();
        Ok(())
    }

    fn get_connections(&self, attr: &AttributeHandle) -> Vec<SdfPath> {
        self.attr(attr).map(|a| a.connections.to_vec()).unwrap_or_default()
    }

    fn set_attribute_custom_data(&mut self, attr: &AttributeHandle, key: &str, value: Value) -> Result<()> {
        self.attr_mut(attr)?.custom_data.insert(key.to_string(), value);
        Ok(())
    }

    fn get_attribute_custom_data(&self, attr: &AttributeHandle, key: &str) -> Option<Value> {
        self.attr(attr)?.custom_data.get(key).cloned()
    }

    fn set_attribute_metadata(&mut self, attr: &AttributeHandle, key: &str, value: Value) -> Result<()> {
        self.attr_mut(attr)?.metadata.insert(key.to_string(), value);
        Ok(())
    }

    fn get_attribute_metadata(&self, attr: &AttributeHandle, key: &str) -> Option<Value> {
        self.attr(attr)?.metadata.get(key).cloned()
    }

    fn create_relationship(&mut self, prim: &SdfPath, name: &Token) -> Result<RelationshipHandle> {
        self.prim_mut(prim)?.relationships.entry(name.clone()).or_default();
        Ok(PropertyHandle::new(prim.clone(), name.clone()))
    }

    fn get_relationship(&self, prim: &SdfPath, name: &str) -> Option<RelationshipHandle> {
        let (key, _) = self.prims.get(prim)?.relationships.get_key_value(name)?;
        Some(PropertyHandle::new(prim.clone(), key.clone()))
    }

    fn set_targets(&mut self, rel: &RelationshipHandle, targets: &[SdfPath]) -> Result<()> {
        let prim = self.prim_mut(&rel.prim)?;
        prim.relationships.insert(rel.name.clone(), targets.to_vec());
        Ok(())
    }

    fn get_targets(&self, rel: &RelationshipHandle) -> Vec<SdfPath> {
        self.prims
            .get(&rel.prim)
            .and_then(|p| p.relationships.get(&rel.name))
            .cloned()
            .unwrap_or_default()
    }

    fn set_metadata(&mut self, prim: &SdfPath, key: &str, value: Value) -> Result<()> {
        self.prim_mut(prim)?.metadata.insert(key.to_string(), value);
        Ok(())
    }

    fn get_metadata(&self, prim: &SdfPath, key: &str) -> Option<Value> {
        self.prim(prim).ok()?.metadata.get(key).cloned()
    }

    fn set_custom_data(&mut self, prim: &SdfPath, key: &str, value: Value) -> Result<()> {
        self.prim_mut(prim)?.custom_data.insert(key.to_string(), value);
        Ok(())
    }

    fn get_custom_data(&self, prim: &SdfPath, key: &str) -> Option<Value> {
        self.prim(prim).ok()?.custom_data.get(key).cloned()
    }

    fn authored_properties_in_namespace(&self, prim: &SdfPath, ns: &str) -> Vec<(String, PropertyHandle)> {
        let Some(spec) = self.prims.get(prim) else {
            return Vec::new();
        };
        let attrs = spec
            .attributes
            .iter()
            .filter(|(_, a)| a.is_authored())
            .map(|(name, _)| name);
        let rels = spec.relationships.keys();
        let mut out: Vec<_> = attrs
            .chain(rels)
            .filter_map(|name| {
                let local = strip_namespace(ns, name)?;
                Some((local.to_string(), PropertyHandle::new(prim.clone(), name.clone())))
            })
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    fn layer(&self) -> &LayerMetadata {
        &self.layer
    }

    fn layer_mut(&mut self) -> &mut LayerMetadata {
        &mut self.layer
    }

    fn save_to(&self, path: &Path) -> Result<()> {
        self.save(path)
    }
}
