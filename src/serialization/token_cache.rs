//! Interned property names.

use parking_lot::RwLock;
use std::collections::HashMap;

use crate::util::{join_namespace, Token};

/// Interns `(namespace, name)` pairs as shared [`Token`]s.
///
/// Lookups take a read lock; a miss upgrades to the write lock and re-checks,
/// so racing callers all receive the single winning token.
#[derive(Debug, Default)]
pub struct TokenCache {
    /// namespace -> (local name -> token)
    cache: RwLock<HashMap<String, HashMap<String, Token>>>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token for `name` with no namespace.
    pub fn get(&self, name: &str) -> Token {
        self.intern("", name)
    }

    /// Token for `join_namespace(ns, name)`.
    pub fn intern(&self, ns: &str, name: &str) -> Token {
        if let Some(token) = self.cache.read().get(ns).and_then(|names| names.get(name)) {
            return token.clone();
        }

        let mut cache = self.cache.write();
        // Don't insert duplicates
        cache
            .entry(ns.to_string())
            .or_default()
            .entry(name.to_string())
            .or_insert_with(|| Token::from(join_namespace(ns, name)))
            .clone()
    }

    /// Number of interned pairs.
    pub fn len(&self) -> usize {
        self.cache.read().values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
