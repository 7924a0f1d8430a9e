//! Samples and the slots the engine walks.
//!
//! A [`Sample`] describes its members once through a
//! [`SchemaBuilder`](super::SchemaBuilder); the engine then reaches each
//! member as a [`SlotRef`] (writes) or [`SlotMut`] (reads).

use std::any::{Any, TypeId};
use std::collections::{BTreeMap, HashMap};

use super::{
    Connectable, ConnectableAccess, Dynamic, FieldValue, Primvar, PrimvarAccess, Relationship,
    SampleSchema, SchemaBuilder,
};
use crate::util::Result;

/// A plain data object mapped onto one prim.
pub trait Sample: Default + Send + Sync + 'static {
    /// Declare serializable members, their order and annotations.
    fn describe(schema: &mut SchemaBuilder<Self>)
    where
        Self: Sized;
}

/// Object-safe view of a [`Sample`].
pub trait DynSample: Send + Sync + 'static {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn sample_type(&self) -> TypeId;
    fn sample_type_name(&self) -> &'static str;
    /// Run `describe`; the reflect cache memoizes the result per type.
    fn build_schema(&self) -> Result<SampleSchema>;
}

impl<S: Sample> DynSample for S {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn sample_type(&self) -> TypeId {
        TypeId::of::<S>()
    }

    fn sample_type_name(&self) -> &'static str {
        std::any::type_name::<S>()
    }

    fn build_schema(&self) -> Result<SampleSchema> {
        SampleSchema::of::<S>()
    }
}

/// Borrowed member, as seen by the write path.
pub enum SlotRef<'a> {
    Value(&'a dyn FieldValue),
    Primvar(&'a dyn PrimvarAccess),
    Connectable(&'a dyn ConnectableAccess),
    Relationship(&'a Relationship),
    Dictionary(&'a dyn DictionaryAccess),
    Sample(&'a dyn DynSample),
}

/// Mutable member, as seen by the read path.
pub enum SlotMut<'a> {
    Value(&'a mut dyn FieldValue),
    Primvar(&'a mut dyn PrimvarAccess),
    Connectable(&'a mut dyn ConnectableAccess),
    Relationship(&'a mut Relationship),
    Dictionary(&'a mut dyn DictionaryAccess),
    Sample(&'a mut dyn DynSample),
}

/// Values that can sit in a string-keyed dictionary member.
pub trait DictElement: Default + Send + Sync + 'static {
    /// Element is a [`Primvar`]; changes where the dictionary is discovered.
    const IS_PRIMVAR: bool = false;

    fn slot(&self) -> SlotRef<'_>;
    fn slot_mut(&mut self) -> SlotMut<'_>;

    /// Null elements are dropped after a read.
    fn is_null(&self) -> bool {
        match self.slot() {
            SlotRef::Value(v) => v.value().is_none(),
            SlotRef::Primvar(p) => p.held().and_then(|v| v.value()).is_none(),
            _ => false,
        }
    }
}

/// Type-erased string-keyed dictionary.
pub trait DictionaryAccess: Send + Sync {
    fn holds_primvars(&self) -> bool;
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    fn visit(&self, f: &mut dyn FnMut(&str, SlotRef<'_>) -> Result<()>) -> Result<()>;
    fn clear(&mut self);
    /// Insert a default element under `key` and return it for reading.
    fn insert_default(&mut self, key: String) -> SlotMut<'_>;
    fn remove_if_null(&mut self, key: &str);
    fn remove(&mut self, key: &str);
}

macro_rules! dictionary_access {
    ($($map:ident),+) => {
        $(
            impl<V: DictElement> DictionaryAccess for $map<String, V> {
                fn holds_primvars(&self) -> bool {
                    V::IS_PRIMVAR
                }

                fn len(&self) -> usize {
                    $map::len(self)
                }

                fn visit(&self, f: &mut dyn FnMut(&str, SlotRef<'_>) -> Result<()>) -> Result<()> {
                    for (key, value) in self.iter() {
                        f(key, value.slot())?;
                    }
                    Ok(())
                }

                fn clear(&mut self) {
                    $map::clear(self);
                }

                fn insert_default(&mut self, key: String) -> SlotMut<'_> {
                    self.entry(key).or_default().slot_mut()
                }

                fn remove_if_null(&mut self, key: &str) {
                    if self.get(key).is_some_and(|v| v.is_null()) {
                        $map::remove(self, key);
                    }
                }

                fn remove(&mut self, key: &str) {
                    $map::remove(self, key);
                }
            }
        )+
    };
}

dictionary_access!(HashMap, BTreeMap);

impl<T: DictElement + FieldValue> DictElement for Option<T> {
    fn slot(&self) -> SlotRef<'_> {
        SlotRef::Value(self)
    }

    fn slot_mut(&mut self) -> SlotMut<'_> {
        SlotMut::Value(self)
    }
}

impl<T: super::ArrayElement> DictElement for Vec<T> {
    fn slot(&self) -> SlotRef<'_> {
        SlotRef::Value(self)
    }

    fn slot_mut(&mut self) -> SlotMut<'_> {
        SlotMut::Value(self)
    }
}

impl DictElement for Dynamic {
    fn slot(&self) -> SlotRef<'_> {
        SlotRef::Value(self)
    }

    fn slot_mut(&mut self) -> SlotMut<'_> {
        SlotMut::Value(self)
    }
}

impl<T: FieldValue + Default> DictElement for Primvar<T> {
    const IS_PRIMVAR: bool = true;

    fn slot(&self) -> SlotRef<'_> {
        SlotRef::Primvar(self)
    }

    fn slot_mut(&mut self) -> SlotMut<'_> {
        SlotMut::Primvar(self)
    }
}

impl<T: FieldValue + Default> DictElement for Connectable<T> {
    fn slot(&self) -> SlotRef<'_> {
        SlotRef::Connectable(self)
    }

    fn slot_mut(&mut self) -> SlotMut<'_> {
        SlotMut::Connectable(self)
    }
}

impl DictElement for Relationship {
    fn slot(&self) -> SlotRef<'_> {
        SlotRef::Relationship(self)
    }

    fn slot_mut(&mut self) -> SlotMut<'_> {
        SlotMut::Relationship(self)
    }
}
