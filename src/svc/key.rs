//! # Key module
//!
//! A resource `Key` is a deterministic, stable string used as the work
//! queue item and as the seed for gateway-object naming (C7). See spec
//! §3 "Invariants" and the GLOSSARY entry for `Key`.

use std::fmt::{self, Display, Formatter};

// -----------------------------------------------------------------------------
// Key structure

/// `<workspace>-<kind-tag>-<id>-<name>`, stable across reconciliations of
/// the same resource and never colliding between distinct resources.
#[derive(PartialEq, Eq, Hash, Clone, Debug)]
pub struct Key(String);

impl Key {
    pub fn new(workspace: &str, kind_tag: &str, id: i64, name: &str) -> Self {
        Self(format!("{workspace}-{kind_tag}-{id}-{name}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Key {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_distinct_resources_never_collide() {
        let a = Key::new("w", "endpoint", 1, "n");
        let b = Key::new("w", "endpoint", 2, "n");
        let c = Key::new("w", "externalendpoint", 1, "n");

        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn key_is_stable() {
        let a = Key::new("w", "endpoint", 1, "n");
        let b = Key::new("w", "endpoint", 1, "n");

        assert_eq!(a, b);
        assert_eq!(a.as_str(), "w-endpoint-1-n");
    }
}
