//! Relationship member: target prim paths, never values.

use crate::util::{Error, Result};

/// Target paths of a relationship.
///
/// `None` targets are not written; after a read of a missing relationship
/// the targets stay `None`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Relationship {
    pub target_paths: Option<Vec<String>>,
}

impl Relationship {
    pub fn new(targets: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self { target_paths: Some(targets.into_iter().map(Into::into).collect()) }
    }

    pub fn single(target: impl Into<String>) -> Self {
        Self { target_paths: Some(vec![target.into()]) }
    }

    pub fn len(&self) -> usize {
        self.target_paths.as_ref().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get_target(&self, index: usize) -> Option<&str> {
        self.target_paths.as_ref()?.get(index).map(String::as_str)
    }

    /// The target of a relationship that must have exactly one.
    pub fn get_only_target(&self) -> Result<&str> {
        match self.target_paths.as_deref() {
            Some([only]) => Ok(only),
            Some(targets) => Err(Error::schema(format!(
                "expected exactly one relationship target, found {}",
                targets.len()
            ))),
            None => Err(Error::schema("relationship has no targets")),
        }
    }
}
