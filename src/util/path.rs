//! Scene-graph paths.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use super::{Error, Result};

/// Absolute path to a prim (e.g. `/World/Mesh`), or a property on one
/// (`/World/Mesh.points`).
///
/// Cheap to clone; the string is shared.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SdfPath(Arc<str>);

impl SdfPath {
    /// The pseudo-root, `/`.
    pub fn absolute_root() -> Self {
        Self(Arc::from("/"))
    }

    /// Parse and validate a path string.
    pub fn new(path: &str) -> Result<Self> {
        if !path.starts_with('/') {
            return Err(Error::InvalidArgument(format!("path must be absolute: {path:?}")));
        }
        if path.len() > 1 {
            let (prims, prop) = match path.split_once('.') {
                Some((p, prop)) => (p, Some(prop)),
                None => (path, None),
            };
            if prims.len() > 1 && prims[1..].split('/').any(|c| !is_identifier(c)) {
                return Err(Error::InvalidArgument(format!("invalid prim path: {path:?}")));
            }
            if let Some(prop) = prop {
                if prop.is_empty() || prop.split(':').any(|c| !is_identifier(c)) {
                    return Err(Error::InvalidArgument(format!("invalid property path: {path:?}")));
                }
            }
        }
        Ok(Self(Arc::from(path)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_absolute_root(&self) -> bool {
        &*self.0 == "/"
    }

    pub fn is_property_path(&self) -> bool {
        self.0.contains('.')
    }

    /// Prim part of a property path; prim paths are returned unchanged.
    pub fn prim_path(&self) -> SdfPath {
        match self.0.split_once('.') {
            Some((prim, _)) => Self(Arc::from(prim)),
            None => self.clone(),
        }
    }

    /// Property part of a property path.
    pub fn property_name(&self) -> Option<&str> {
        self.0.split_once('.').map(|(_, p)| p)
    }

    /// Last prim component (`/a/b` -> `b`); empty for the root.
    pub fn name(&self) -> &str {
        let prim = self.0.split_once('.').map_or(&*self.0, |(p, _)| p);
        prim.rsplit('/').next().unwrap_or("")
    }

    /// Parent prim path. The root is its own parent.
    pub fn parent(&self) -> SdfPath {
        if self.is_property_path() {
            return self.prim_path();
        }
        match self.0.rfind('/') {
            Some(0) | None => Self::absolute_root(),
            Some(i) => Self(Arc::from(&self.0[..i])),
        }
    }

    /// Append a child prim name.
    pub fn append_child(&self, name: &str) -> Result<SdfPath> {
        if self.is_absolute_root() {
            Self::new(&format!("/{name}"))
        } else {
            Self::new(&format!("{}/{name}", self.0))
        }
    }

    /// Append a property name (`/a` + `points` -> `/a.points`).
    pub fn append_property(&self, name: &str) -> Result<SdfPath> {
        Self::new(&format!("{}.{name}", self.prim_path().0))
    }

    /// True if `self` is `prefix` or lies beneath it.
    pub fn has_prefix(&self, prefix: &SdfPath) -> bool {
        if prefix.is_absolute_root() {
            return true;
        }
        match self.0.strip_prefix(&*prefix.0) {
            Some(rest) => rest.is_empty() || rest.starts_with('/') || rest.starts_with('.'),
            None => false,
        }
    }

    /// Ancestors from the topmost prim down to `self`, excluding the root.
    pub fn prefixes(&self) -> Vec<SdfPath> {
        let prim = self.prim_path();
        let mut out = Vec::new();
        let mut end = 0;
        for (i, c) in prim.0.char_indices().skip(1) {
            if c == '/' {
                out.push(Self(Arc::from(&prim.0[..i])));
            }
            end = i;
        }
        if end > 0 {
            out.push(prim);
        }
        out
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl fmt::Display for SdfPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for SdfPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SdfPath({})", self.0)
    }
}

impl TryFrom<String> for SdfPath {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(&value)
    }
}

impl TryFrom<&str> for SdfPath {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        Self::new(value)
    }
}

impl From<SdfPath> for String {
    fn from(path: SdfPath) -> Self {
        path.0.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert!(SdfPath::new("/").is_ok());
        assert!(SdfPath::new("/World/Mesh_1").is_ok());
        assert!(SdfPath::new("/World.primvars:st").is_ok());
        assert!(SdfPath::new("World").is_err());
        assert!(SdfPath::new("/World/1abc").is_err());
        assert!(SdfPath::new("/World.").is_err());
    }

    #[test]
    fn test_navigation() {
        let p = SdfPath::new("/World/Mesh").unwrap();
        assert_eq!(p.name(), "Mesh");
        assert_eq!(p.parent().as_str(), "/World");
        assert_eq!(p.parent().parent().as_str(), "/");
        assert!(p.has_prefix(&SdfPath::new("/World").unwrap()));
        assert!(!p.has_prefix(&SdfPath::new("/Wor").unwrap()));

        let attr = p.append_property("points").unwrap();
        assert_eq!(attr.as_str(), "/World/Mesh.points");
        assert_eq!(attr.prim_path(), p);
        assert_eq!(attr.property_name(), Some("points"));

        let prefixes: Vec<_> = p.prefixes().iter().map(|p| p.to_string()).collect();
        assert_eq!(prefixes, vec!["/World", "/World/Mesh"]);
        assert!(SdfPath::absolute_root().prefixes().is_empty());
    }

    #[test]
    fn test_path_json() {
        let p = SdfPath::new("/World/Mesh").expect("Failed to parse path");
        let json = serde_json::to_string(&p).expect("Failed to serialize path");
        let back: SdfPath = serde_json::from_str(&json).expect("Failed to deserialize path");
        assert_eq!(back, p);
    }
}
