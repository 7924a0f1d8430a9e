//! Scene - the caller-facing handle over one stage.
//!
//! A [`Scene`] owns a serialization engine bound to a backend and carries the
//! per-scene settings: current time, write mode and the access mask used to
//! skip static members when replaying animation.
//!
//! # Example
//!
//! ```ignore
//! let scene = Scene::create();
//! scene.set_time(1.0);
//! scene.write(&SdfPath::new("/World/Cube")?, &cube)?;
//!
//! let mut back = CubeSample::default();
//! scene.read(&SdfPath::new("/World/Cube")?, &mut back)?;
//! ```

use parking_lot::{Mutex, RwLock};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::core::{InterpolationMode, TimeCode, UpAxis};
use crate::serialization::{AccessMask, DynSample, MayVary, Sample, SerializationContext, UsdIo};
use crate::stage::{LayerMetadata, MemoryStage, SceneBackend};
use crate::util::{Error, Result, SdfPath};

/// How [`Scene::write`] authors the target prim.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// Define the prim with the sample's schema type.
    #[default]
    Define,
    /// Author an override; the prim's type is left alone.
    Over,
}

/// A stage plus the state needed to read and write samples on it.
///
/// Every method takes `&self`; a scene can be shared across threads and
/// read from in parallel.
pub struct Scene {
    io: UsdIo,
    file_path: RwLock<Option<PathBuf>>,
    time: RwLock<TimeCode>,
    write_mode: RwLock<WriteMode>,
    populating_access_mask: AtomicBool,
    access_mask: Mutex<Option<AccessMask>>,
}

impl Scene {
    /// Create an empty in-memory scene.
    pub fn create() -> Self {
        Self::from_backend(Box::new(MemoryStage::new()))
    }

    /// Create an empty scene that [`save`](Self::save) writes to `path`.
    pub fn create_at(path: impl AsRef<Path>) -> Self {
        let scene = Self::create();
        *scene.file_path.write() = Some(path.as_ref().to_path_buf());
        scene
    }

    /// Open a scene previously saved as JSON.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let scene = Self::from_backend(Box::new(MemoryStage::open(path)?));
        *scene.file_path.write() = Some(path.to_path_buf());
        Ok(scene)
    }

    /// Wrap an existing backend, using the process-wide serialization context.
    pub fn from_backend(backend: Box<dyn SceneBackend>) -> Self {
        Self::with_context(SerializationContext::shared(), backend)
    }

    /// Wrap an existing backend with an independent serialization context.
    pub fn with_context(ctx: Arc<SerializationContext>, backend: Box<dyn SceneBackend>) -> Self {
        Self {
            io: UsdIo::with_context(ctx, backend),
            file_path: RwLock::new(None),
            time: RwLock::new(TimeCode::Default),
            write_mode: RwLock::new(WriteMode::Define),
            populating_access_mask: AtomicBool::new(false),
            access_mask: Mutex::new(None),
        }
    }

    pub fn io(&self) -> &UsdIo {
        &self.io
    }

    pub fn context(&self) -> &Arc<SerializationContext> {
        self.io.context()
    }

    /// Path the scene was opened from or created at, if any.
    pub fn file_path(&self) -> Option<PathBuf> {
        self.file_path.read().clone()
    }

    // ========================================================================
    // Settings
    // ========================================================================

    /// Time used by subsequent reads and writes.
    pub fn time(&self) -> TimeCode {
        *self.time.read()
    }

    /// Set the time for subsequent reads and writes; `None` is the default time.
    pub fn set_time(&self, time: impl Into<TimeCode>) {
        *self.time.write() = time.into();
    }

    pub fn write_mode(&self) -> WriteMode {
        *self.write_mode.read()
    }

    pub fn set_write_mode(&self, mode: WriteMode) {
        *self.write_mode.write() = mode;
    }

    /// While set, reads record which members vary over time.
    pub fn is_populating_access_mask(&self) -> bool {
        self.populating_access_mask.load(Ordering::Acquire)
    }

    pub fn set_populate_access_mask(&self, populate: bool) {
        self.populating_access_mask.store(populate, Ordering::Release);
    }

    /// Install (or clear) the access mask consulted by reads.
    pub fn set_access_mask(&self, mask: Option<AccessMask>) {
        *self.access_mask.lock() = mask;
    }

    /// Remove and return the access mask.
    pub fn take_access_mask(&self) -> Option<AccessMask> {
        self.access_mask.lock().take()
    }

    /// Run `f` on the installed access mask, if any.
    pub fn with_access_mask<R>(&self, f: impl FnOnce(&mut AccessMask) -> R) -> Option<R> {
        self.access_mask.lock().as_mut().map(f)
    }

    // ========================================================================
    // Stage metadata
    // ========================================================================

    pub fn layer(&self) -> LayerMetadata {
        self.io.with_stage(|stage| stage.layer().clone())
    }

    pub fn start_time(&self) -> f64 {
        self.io.with_stage(|stage| stage.layer().start_time_code)
    }

    pub fn set_start_time(&self, time: f64) {
        self.io.with_stage(|stage| stage.layer_mut().start_time_code = time);
    }

    pub fn end_time(&self) -> f64 {
        self.io.with_stage(|stage| stage.layer().end_time_code)
    }

    pub fn set_end_time(&self, time: f64) {
        self.io.with_stage(|stage| stage.layer_mut().end_time_code = time);
    }

    /// Playback rate in frames per second.
    pub fn frame_rate(&self) -> f64 {
        self.io.with_stage(|stage| stage.layer().frames_per_second)
    }

    /// Set frames and time codes per second. Must be > 0.
    pub fn set_frame_rate(&self, fps: f64) -> Result<()> {
        if fps.is_nan() || fps <= 0.0 {
            return Err(Error::InvalidArgument(format!("frame rate must be > 0, got {fps}")));
        }
        self.io.with_stage(|stage| {
            let layer = stage.layer_mut();
            layer.frames_per_second = fps;
            layer.time_codes_per_second = fps;
        });
        Ok(())
    }

    pub fn up_axis(&self) -> UpAxis {
        self.io.with_stage(|stage| stage.layer().up_axis)
    }

    pub fn set_up_axis(&self, axis: UpAxis) {
        self.io.with_stage(|stage| stage.layer_mut().up_axis = axis);
    }

    /// Linear scale of the scene; centimeters unless authored.
    pub fn meters_per_unit(&self) -> f64 {
        self.io.with_stage(|stage| stage.layer().meters_per_unit)
    }

    /// Must be > 0.
    pub fn set_meters_per_unit(&self, meters: f64) -> Result<()> {
        if meters.is_nan() || meters <= 0.0 {
            return Err(Error::InvalidArgument(format!("meters per unit must be > 0, got {meters}")));
        }
        self.io.with_stage(|stage| stage.layer_mut().meters_per_unit = meters);
        Ok(())
    }

    pub fn interpolation(&self) -> InterpolationMode {
        self.io.with_stage(|stage| stage.layer().interpolation)
    }

    pub fn set_interpolation(&self, mode: InterpolationMode) {
        self.io.with_stage(|stage| stage.layer_mut().interpolation = mode);
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Every prim path in the scene.
    pub fn all_paths(&self) -> Vec<SdfPath> {
        self.io.with_stage(|stage| stage.prim_paths())
    }

    pub fn prim_exists(&self, path: &SdfPath) -> bool {
        self.io.with_stage(|stage| stage.prim_exists(path))
    }

    /// Prims under `root` whose type matches `S`'s schema name.
    pub fn find<S: Sample>(&self, root: &SdfPath) -> Result<Vec<SdfPath>> {
        let schema = self.context().reflect().schema_name::<S>()?;
        if schema.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.find_by_type(root, &schema))
    }

    /// Prims under `root` with the given schema type name.
    pub fn find_by_type(&self, root: &SdfPath, type_name: &str) -> Vec<SdfPath> {
        self.io.with_stage(|stage| stage.find_prims_by_type(type_name, root))
    }

    /// Time samples of `attribute` on every prim under `root` that has any.
    pub fn compute_key_frames(&self, root: &SdfPath, attribute: &str) -> Result<BTreeMap<SdfPath, Vec<f64>>> {
        self.io.with_stage(|stage| {
            if !stage.prim_exists(root) {
                return Err(Error::PrimNotFound(root.to_string()));
            }
            let mut keys = BTreeMap::new();
            for path in stage.prim_paths() {
                if path.is_absolute_root() || !path.has_prefix(root) {
                    continue;
                }
                let Some(attr) = stage.get_attribute(&path, attribute) else {
                    continue;
                };
                let times = stage.time_samples(&attr);
                if !times.is_empty() {
                    keys.insert(path, times);
                }
            }
            Ok(keys)
        })
    }

    // ========================================================================
    // Write
    // ========================================================================

    /// Write `sample` to `path` at the current time.
    ///
    /// On error the prim may be partially written.
    pub fn write<S: Sample>(&self, path: &SdfPath, sample: &S) -> Result<()> {
        self.write_dyn(path, sample)
    }

    pub fn write_dyn(&self, path: &SdfPath, sample: &dyn DynSample) -> Result<()> {
        match self.write_mode() {
            WriteMode::Define => {
                let schema = self.context().reflect().get_schema(sample)?;
                let type_name = schema.schema_name.as_str();
                self.io.with_stage(|stage| {
                    // Another sample may have typed this prim already; an Xform
                    // written over it must not replace that type.
                    let keep_type = type_name == "Xform"
                        && stage.prim_type_name(path).is_some_and(|t| !t.is_empty());
                    if keep_type {
                        Ok(())
                    } else {
                        stage.define_prim(path, type_name)
                    }
                })?;
            }
            WriteMode::Over => self.io.with_stage(|stage| stage.override_prim(path))?,
        }
        self.io.serialize(sample, path, self.time(), "")
    }

    // ========================================================================
    // Read
    // ========================================================================

    /// Read `sample` from `path` at the current time.
    ///
    /// With an access mask installed, reads either record varying members
    /// (while populating) or read only the recorded ones. Returns false when
    /// the prim does not exist or a member could not be represented. On error
    /// the sample may be partially read.
    pub fn read<S: Sample>(&self, path: &SdfPath, sample: &mut S) -> Result<bool> {
        self.read_dyn(path, sample)
    }

    pub fn read_dyn(&self, path: &SdfPath, sample: &mut dyn DynSample) -> Result<bool> {
        if !self.prim_exists(path) {
            tracing::debug!("read: no prim at {path}");
            return Ok(false);
        }
        let time = self.time();

        if self.access_mask.lock().is_none() {
            let mut may_vary = MayVary::NotYetConfirmed;
            return self.io.deserialize(sample, path, time, None, &mut may_vary, "");
        }

        if self.is_populating_access_mask() {
            self.read_populating(path, sample, time)
        } else {
            self.read_filtered(path, sample, time)
        }
    }

    fn read_populating(&self, path: &SdfPath, sample: &mut dyn DynSample, time: TimeCode) -> Result<bool> {
        let mut record = self
            .with_access_mask(|mask| mask.remove(path))
            .flatten()
            .unwrap_or_else(|| {
                tracing::trace!("access mask: new record for {path}");
                Default::default()
            });

        let mut may_vary = MayVary::NotYetConfirmed;
        let read = self.io.deserialize(sample, path, time, Some(&mut record.dynamic_members), &mut may_vary, "")?;

        if may_vary.is_confirmed() {
            self.with_access_mask(|mask| mask.insert(path.clone(), record));
        } else {
            tracing::debug!("access mask: {path} is static, pruned");
        }
        Ok(read)
    }

    fn read_filtered(&self, path: &SdfPath, sample: &mut dyn DynSample, time: TimeCode) -> Result<bool> {
        let members = self.with_access_mask(|mask| {
            let members = mask.get(path).map(|record| record.dynamic_members.clone());
            if members.as_ref().is_some_and(|m| m.is_empty()) {
                mask.remove(path);
                tracing::debug!("access mask: {path} has no varying members, pruned");
            }
            members
        });

        let Some(mut members) = members.flatten().filter(|m| !m.is_empty()) else {
            return Ok(true);
        };
        let mut may_vary = MayVary::Inapplicable;
        self.io.deserialize(sample, path, time, Some(&mut members), &mut may_vary, "")
    }

    /// Read the single member `name` of `sample`, ignoring the access mask.
    pub fn read_member<S: Sample>(&self, path: &SdfPath, sample: &mut S, name: &str) -> Result<bool> {
        if !self.prim_exists(path) {
            return Ok(false);
        }
        self.io.deserialize_member(sample, name, path, self.time())
    }

    /// Read every prim under `root` whose type matches `S`.
    pub fn read_all<S: Sample>(&self, root: &SdfPath) -> Result<Vec<(SdfPath, S)>> {
        let paths = self.find::<S>(root)?;
        let mut out = Vec::with_capacity(paths.len());
        for path in paths {
            let mut sample = S::default();
            self.read(&path, &mut sample)?;
            out.push((path, sample));
        }
        Ok(out)
    }

    /// Read `paths` in parallel. Results keep the order of `paths`.
    pub fn read_many<S: Sample>(&self, paths: &[SdfPath]) -> Result<Vec<S>> {
        paths
            .par_iter()
            .map(|path| {
                let mut sample = S::default();
                self.read(path, &mut sample)?;
                Ok(sample)
            })
            .collect()
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    /// Save to the path the scene was created at or opened from.
    pub fn save(&self) -> Result<()> {
        let path = self
            .file_path()
            .ok_or_else(|| Error::InvalidArgument("scene has no file path; use save_as".into()))?;
        self.save_as(path)
    }

    /// Save to `path` without changing the scene's own path.
    pub fn save_as(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        self.io.with_stage(|stage| stage.save_to(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_validation() {
        let scene = Scene::create();
        assert!(scene.set_frame_rate(0.0).is_err());
        assert!(scene.set_frame_rate(-24.0).is_err());
        scene.set_frame_rate(30.0).expect("Failed to set frame rate");
        assert_eq!(scene.frame_rate(), 30.0);
        assert_eq!(scene.layer().time_codes_per_second, 30.0);

        assert!(scene.set_meters_per_unit(0.0).is_err());
        assert_eq!(scene.meters_per_unit(), 0.01);
        scene.set_meters_per_unit(1.0).expect("Failed to set meters per unit");
        assert_eq!(scene.meters_per_unit(), 1.0);
    }

    #[test]
    fn test_time_and_modes() {
        let scene = Scene::create();
        assert_eq!(scene.time(), TimeCode::Default);
        scene.set_time(3.0);
        assert_eq!(scene.time(), TimeCode::Time(3.0));
        scene.set_time(None::<f64>);
        assert_eq!(scene.time(), TimeCode::Default);

        assert_eq!(scene.write_mode(), WriteMode::Define);
        scene.set_write_mode(WriteMode::Over);
        assert_eq!(scene.write_mode(), WriteMode::Over);

        assert_eq!(scene.up_axis(), UpAxis::Z);
        scene.set_up_axis(UpAxis::Y);
        assert_eq!(scene.up_axis(), UpAxis::Y);
    }

    #[test]
    fn test_save_requires_path() {
        let scene = Scene::create();
        assert!(scene.save().is_err());
    }
}
