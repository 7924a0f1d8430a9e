//! Access mask: per-prim record of members known to vary over time.
//!
//! Populated on a first pass over an animation, then used to read only the
//! varying members on later frames.

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::fmt;

use super::MemberId;
use crate::util::{Error, Result, SdfPath};

/// Result of asking "did any member vary?" across one deserialization.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MayVary {
    /// Variability is not being tracked (filtered reads, single-member reads).
    Inapplicable,
    /// Tracking, nothing varying found yet.
    #[default]
    NotYetConfirmed,
    /// At least one member varies.
    Confirmed,
}

impl MayVary {
    pub fn is_applicable(self) -> bool {
        self != MayVary::Inapplicable
    }

    pub fn is_confirmed(self) -> bool {
        self == MayVary::Confirmed
    }

    /// Record a varying member. No effect when tracking is off.
    pub fn mark(&mut self) {
        if *self == MayVary::NotYetConfirmed {
            *self = MayVary::Confirmed;
        }
    }

    /// Applicability must not change while reading a single member.
    pub fn check_transition(before: MayVary, after: MayVary, member: &str) -> Result<()> {
        if before.is_applicable() != after.is_applicable() {
            return Err(Error::InternalConsistency(format!(
                "variability tracking changed from {before:?} to {after:?} while reading '{member}'"
            )));
        }
        Ok(())
    }
}

/// Per-prim record.
#[derive(Default)]
pub struct DeserializationContext {
    pub dynamic_members: HashSet<MemberId>,
    /// Caller data kept alongside the record, e.g. static values captured on
    /// the populate pass and reused on filtered frames.
    pub cached_data: Option<Box<dyn Any + Send + Sync>>,
}

impl DeserializationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_dynamic(&self, member: &MemberId) -> bool {
        self.dynamic_members.contains(member)
    }

    pub fn cached<T: 'static>(&self) -> Option<&T> {
        self.cached_data.as_ref()?.downcast_ref::<T>()
    }

    pub fn set_cached<T: Any + Send + Sync>(&mut self, data: T) {
        self.cached_data = Some(Box::new(data));
    }
}

impl fmt::Debug for DeserializationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeserializationContext")
            .field("dynamic_members", &self.dynamic_members.len())
            .field("cached_data", &self.cached_data.is_some())
            .finish()
    }
}

/// Prim path -> varying members.
#[derive(Debug, Default)]
pub struct AccessMask {
    pub included: HashMap<SdfPath, DeserializationContext>,
}

impl AccessMask {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.included.len()
    }

    pub fn is_empty(&self) -> bool {
        self.included.is_empty()
    }

    pub fn contains(&self, path: &SdfPath) -> bool {
        self.included.contains_key(path)
    }

    pub fn get(&self, path: &SdfPath) -> Option<&DeserializationContext> {
        self.included.get(path)
    }

    pub fn get_mut(&mut self, path: &SdfPath) -> Option<&mut DeserializationContext> {
        self.included.get_mut(path)
    }

    pub fn insert(&mut self, path: SdfPath, context: DeserializationContext) {
        self.included.insert(path, context);
    }

    pub fn remove(&mut self, path: &SdfPath) -> Option<DeserializationContext> {
        self.included.remove(path)
    }

    /// Number of varying members recorded for `path`.
    pub fn dynamic_count(&self, path: &SdfPath) -> usize {
        self.included.get(path).map_or(0, |c| c.dynamic_members.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::any::TypeId;

    #[test]
    fn test_may_vary() {
        let mut v = MayVary::NotYetConfirmed;
        v.mark();
        assert!(v.is_confirmed());

        let mut off = MayVary::Inapplicable;
        off.mark();
        assert_eq!(off, MayVary::Inapplicable);

        assert!(MayVary::check_transition(MayVary::NotYetConfirmed, MayVary::Confirmed, "x").is_ok());
        assert!(matches!(
            MayVary::check_transition(MayVary::Confirmed, MayVary::Inapplicable, "x"),
            Err(Error::InternalConsistency(_))
        ));
    }

    #[test]
    fn test_cached_data() {
        let mut ctx = DeserializationContext::new();
        ctx.dynamic_members.insert(MemberId { owner: TypeId::of::<u8>(), index: 0 });
        ctx.set_cached(vec![1u32, 2]);
        assert_eq!(ctx.cached::<Vec<u32>>(), Some(&vec![1, 2]));
        assert!(ctx.cached::<String>().is_none());

        let mut mask = AccessMask::new();
        let path = SdfPath::new("/World").expect("Failed to parse path");
        mask.insert(path.clone(), ctx);
        assert_eq!(mask.dynamic_count(&path), 1);
        assert!(mask.remove(&path).is_some());
        assert!(mask.is_empty());
    }
}
