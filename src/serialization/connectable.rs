//! Connectable wrapper: a default value plus an optional upstream connection.

use super::FieldValue;
use crate::util::{join_namespace, SdfPath};

/// A member that may be driven by another attribute.
///
/// On write, `Some("")` clears existing connections and `Some(path)` sets a
/// single source. On read, the first authored source wins.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Connectable<T> {
    pub default_value: T,
    pub connected_path: Option<String>,
}

impl<T> Connectable<T> {
    pub fn new(default_value: T) -> Self {
        Self { default_value, connected_path: None }
    }

    pub fn is_connected(&self) -> bool {
        self.connected_path.as_deref().is_some_and(|p| !p.is_empty())
    }

    /// Connect to `attr` on the prim at `prim`, e.g. `/Looks/Tex.outputs:rgb`.
    pub fn set_connected_path(&mut self, prim: &str, attr: &str) {
        self.connected_path = Some(format!("{prim}.{attr}"));
    }

    /// Connect to an output in the given namespace (`outputs:rgb`).
    pub fn connect_output(&mut self, prim: &SdfPath, output: &str) {
        self.set_connected_path(prim.as_str(), &join_namespace("outputs", output));
    }
}

/// Type-erased [`Connectable`].
pub trait ConnectableAccess: Send + Sync {
    fn held(&self) -> &dyn FieldValue;
    fn held_mut(&mut self) -> &mut dyn FieldValue;
    fn connected_path(&self) -> Option<&str>;
    fn set_connection(&mut self, path: Option<String>);
}

impl<T: FieldValue + Default> ConnectableAccess for Connectable<T> {
    fn held(&self) -> &dyn FieldValue {
        &self.default_value
    }

    fn held_mut(&mut self) -> &mut dyn FieldValue {
        &mut self.default_value
    }

    fn connected_path(&self) -> Option<&str> {
        self.connected_path.as_deref()
    }

    fn set_connection(&mut self, path: Option<String>) {
        self.connected_path = path;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection() {
        let mut c = Connectable::new(0.5f32);
        assert!(!c.is_connected());
        c.connected_path = Some(String::new());
        assert!(!c.is_connected());
        let prim = SdfPath::new("/Looks/Tex").expect("Failed to parse path");
        c.connect_output(&prim, "rgb");
        assert_eq!(c.connected_path(), Some("/Looks/Tex.outputs:rgb"));
    }
}
