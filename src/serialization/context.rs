//! Serialization context: the binder, caches and array pool one engine uses.

use std::sync::{Arc, OnceLock};

use super::{ArrayPool, ArrayUnpool, BinderConfig, DynSample, ReflectCache, TokenCache, TypeBinder};
use crate::util::Result;

/// Shared state behind every [`UsdIo`](super::UsdIo).
///
/// Most callers use [`SerializationContext::shared`]; tests and tools that
/// need isolated bindings create their own.
pub struct SerializationContext {
    binder: TypeBinder,
    tokens: TokenCache,
    reflect: ReflectCache,
    pool: Arc<dyn ArrayPool>,
}

static SHARED: OnceLock<Arc<SerializationContext>> = OnceLock::new();

impl Default for SerializationContext {
    fn default() -> Self {
        Self::new()
    }
}

impl SerializationContext {
    pub fn new() -> Self {
        Self::with_config(BinderConfig::default())
    }

    pub fn with_config(config: BinderConfig) -> Self {
        Self {
            binder: TypeBinder::with_config(config),
            tokens: TokenCache::new(),
            reflect: ReflectCache::new(),
            pool: Arc::new(ArrayUnpool),
        }
    }

    /// Replace the array pool (defaults to [`ArrayUnpool`]).
    pub fn with_pool(mut self, pool: Arc<dyn ArrayPool>) -> Self {
        self.pool = pool;
        self
    }

    /// Process-wide context, created on first use.
    pub fn shared() -> Arc<Self> {
        SHARED.get_or_init(|| Arc::new(Self::new())).clone()
    }

    pub fn binder(&self) -> &TypeBinder {
        &self.binder
    }

    pub fn tokens(&self) -> &TokenCache {
        &self.tokens
    }

    pub fn reflect(&self) -> &ReflectCache {
        &self.reflect
    }

    pub fn pool(&self) -> &dyn ArrayPool {
        self.pool.as_ref()
    }

    /// Return every array held by `sample` to the pool, leaving the members empty.
    ///
    /// Returns how many arrays were released.
    pub fn release_sample(&self, sample: &mut dyn DynSample) -> Result<usize> {
        let arrays = self.reflect.extract_arrays(sample)?;
        let count = arrays.len();
        for array in arrays {
            self.pool.free(array);
        }
        tracing::trace!("released {count} arrays from {}", sample.sample_type_name());
        Ok(count)
    }
}
