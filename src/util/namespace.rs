//! Namespaced property names.
//!
//! Property names are colon separated (`primvars:st`, `xformOp:translate`).
//! [`join_namespace`] is the single place that decides how a namespace and a
//! local name combine.

/// Namespace separator used in property names.
pub const NAMESPACE_DELIMITER: char = ':';

/// Namespace holding primvar attributes.
pub const PRIMVARS_NAMESPACE: &str = "primvars";

/// Join a namespace and a local name.
///
/// Empty parts are dropped, so `join_namespace("", "x") == "x"`,
/// `join_namespace("ns", "") == "ns"` and both empty yields `""`.
pub fn join_namespace(ns: &str, name: &str) -> String {
    match (ns.is_empty(), name.is_empty()) {
        (true, _) => name.to_string(),
        (false, true) => ns.to_string(),
        (false, false) => {
            let mut out = String::with_capacity(ns.len() + name.len() + 1);
            out.push_str(ns);
            out.push(NAMESPACE_DELIMITER);
            out.push_str(name);
            out
        }
    }
}

/// Last component of a namespaced name (`"a:b:c"` -> `"c"`).
pub fn base_name(name: &str) -> &str {
    name.rsplit(NAMESPACE_DELIMITER).next().unwrap_or(name)
}

/// Strip `ns:` from the front of `name`, if present.
pub fn strip_namespace<'a>(ns: &str, name: &'a str) -> Option<&'a str> {
    if ns.is_empty() {
        return Some(name);
    }
    name.strip_prefix(ns)?.strip_prefix(NAMESPACE_DELIMITER)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_law() {
        assert_eq!(join_namespace("", ""), "");
        assert_eq!(join_namespace("a", ""), "a");
        assert_eq!(join_namespace("", "b"), "b");
        assert_eq!(join_namespace("a", "b"), "a:b");
    }

    #[test]
    fn test_join_associative() {
        let parts = ["", "a", "b:c", "d"];
        for x in parts {
            for y in parts {
                for z in parts {
                    assert_eq!(
                        join_namespace(&join_namespace(x, y), z),
                        join_namespace(x, &join_namespace(y, z)),
                        "{x:?} {y:?} {z:?}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_strip_and_base() {
        assert_eq!(strip_namespace("primvars", "primvars:st"), Some("st"));
        assert_eq!(strip_namespace("primvars", "primvarsX:st"), None);
        assert_eq!(strip_namespace("", "st"), Some("st"));
        assert_eq!(base_name("a:b:c"), "c");
        assert_eq!(base_name("c"), "c");
    }
}
