//! Language name interning.
//!
//! Routing keys off `(source, target)` pairs constantly; comparing and
//! hashing interned 32-bit ids is much cheaper than string pairs, and the
//! ids stay stable for the lifetime of the process.

use std::collections::HashMap;
use std::fmt;

use parking_lot::RwLock;

/// Stable identifier for an interned language name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LangUid(u32);

impl LangUid {
    /// Returns the raw numeric value.
    pub fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Display for LangUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Default)]
struct RegistryInner {
    by_name: HashMap<String, LangUid>,
    names: Vec<String>,
}

/// Process-wide intern table for language names.
///
/// `register` returns the same uid for the same name, for the lifetime of
/// the registry. Entries are never removed.
#[derive(Default)]
pub struct LanguageRegistry {
    inner: RwLock<RegistryInner>,
}

impl LanguageRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Interns a language name, returning its stable uid.
    pub fn register(&self, name: &str) -> LangUid {
        if let Some(uid) = self.lookup(name) {
            return uid;
        }
        let mut inner = self.inner.write();
        // A racing writer may have interned it between our locks.
        if let Some(uid) = inner.by_name.get(name) {
            return *uid;
        }
        let uid = LangUid(inner.names.len() as u32);
        inner.names.push(name.to_string());
        inner.by_name.insert(name.to_string(), uid);
        uid
    }

    /// Looks a name up without interning it.
    pub fn lookup(&self, name: &str) -> Option<LangUid> {
        self.inner.read().by_name.get(name).copied()
    }

    /// Returns the name registered for `uid`, if any.
    pub fn name(&self, uid: LangUid) -> Option<String> {
        self.inner.read().names.get(uid.0 as usize).cloned()
    }

    /// Number of interned names.
    pub fn len(&self) -> usize {
        self.inner.read().names.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
