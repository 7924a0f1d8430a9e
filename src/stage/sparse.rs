//! Sparse value authoring.
//!
//! Consecutive identical time samples carry no information under held
//! interpolation, so the writer skips them. When the value finally changes,
//! the last skipped sample is authored first so linear interpolation still
//! sees a flat segment up to the change.

use std::collections::HashMap;

use super::{AttributeHandle, SceneBackend};
use crate::core::{TimeCode, Value};
use crate::util::Result;

#[derive(Debug)]
struct LastSample {
    time: f64,
    value: Value,
    /// The sample at `time` was elided and not yet authored.
    pending: bool,
}

/// Writes attribute values, dropping redundant consecutive time samples.
#[derive(Debug, Default)]
pub struct SparseValueWriter {
    last: HashMap<AttributeHandle, LastSample>,
    elided: usize,
}

impl SparseValueWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Author `value` at `time`, unless it repeats the previous sample.
    ///
    /// Returns true if a sample was authored. Default-time values are always
    /// authored.
    pub fn set_attribute(
        &mut self,
        backend: &mut dyn SceneBackend,
        attr: &AttributeHandle,
        value: Value,
        time: TimeCode,
    ) -> Result<bool> {
        let TimeCode::Time(t) = time else {
            backend.set_value(attr, value, time)?;
            return Ok(true);
        };

        if let Some(last) = self.last.get_mut(attr) {
            if last.value == value && t > last.time {
                last.time = t;
                last.pending = true;
                self.elided += 1;
                tracing::trace!("sparse writer: eliding {}.{} at {}", attr.prim, attr.name, t);
                return Ok(false);
            }
            if last.pending {
                backend.set_value(attr, last.value.clone(), TimeCode::Time(last.time))?;
            }
        }

        backend.set_value(attr, value.clone(), time)?;
        self.last.insert(attr.clone(), LastSample { time: t, value, pending: false });
        Ok(true)
    }

    /// Number of samples elided so far.
    pub fn elided(&self) -> usize {
        self.elided
    }

    /// Forget per-attribute history (e.g. after the stage is replaced).
    pub fn clear(&mut self) {
        self.last.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ValueTypeName, Variability};
    use crate::stage::MemoryStage;
    use crate::util::{SdfPath, Token};

    #[test]
    fn test_elides_repeats() {
        let mut stage = MemoryStage::new();
        let prim = SdfPath::new("/A").unwrap();
        stage.define_prim(&prim, "Xform").unwrap();
        let attr = stage
            .create_attribute(&prim, &Token::new("v"), ValueTypeName::FLOAT, Variability::Varying)
            .unwrap();

        let mut writer = SparseValueWriter::new();
        for (t, v) in [(1.0, 1.0f32), (2.0, 1.0), (3.0, 1.0), (4.0, 5.0)] {
            writer.set_attribute(&mut stage, &attr, Value::Float(v), TimeCode::Time(t)).unwrap();
        }
        // 1.0@1, held 1.0@3, then 5.0@4
        assert_eq!(stage.time_samples(&attr), vec![1.0, 3.0, 4.0]);
        assert_eq!(writer.elided(), 2);
        assert_eq!(stage.get_value(&attr, TimeCode::Time(2.0)).unwrap(), Some(Value::Float(1.0)));
    }

    #[test]
    fn test_default_time_always_written() {
        let mut stage = MemoryStage::new();
        let prim = SdfPath::new("/A").unwrap();
        stage.define_prim(&prim, "").unwrap();
        let attr = stage
            .create_attribute(&prim, &Token::new("v"), ValueTypeName::INT, Variability::Uniform)
            .unwrap();
        let mut writer = SparseValueWriter::new();
        assert!(writer.set_attribute(&mut stage, &attr, Value::Int(3), TimeCode::Default).unwrap());
        assert!(writer.set_attribute(&mut stage, &attr, Value::Int(3), TimeCode::Default).unwrap());
        assert!(!stage.might_vary_over_time(&attr));
    }
}
