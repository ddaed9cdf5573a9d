//! Shared cookie store.
//!
//! The rotation task and request building both go through the same
//! narrow `snapshot` / `set` interface. Requests are always built from a
//! snapshot, so a concurrent rotation never tears an in-flight request.

use std::fmt;
use std::sync::{Arc, RwLock};

use crate::constants::IDENTITY_COOKIE;

/// Ordered cookie name → value map. Entries are overwritten, never removed.
#[derive(Clone, Default)]
pub struct CredentialBag {
    inner: Arc<RwLock<Vec<(String, String)>>>,
}

impl CredentialBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let bag = Self::new();
        for (k, v) in pairs {
            bag.set(k, v);
        }
        bag
    }

    /// Insert or overwrite one cookie, keeping its original position.
    pub fn set(&self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        let mut entries = match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        match entries.iter_mut().find(|(k, _)| *k == name) {
            Some(entry) => entry.1 = value,
            None => entries.push((name, value)),
        }
    }

    /// Overwrite or append every pair from `other`.
    pub fn merge(&self, other: &[(String, String)]) {
        for (k, v) in other {
            self.set(k.clone(), v.clone());
        }
    }

    pub fn get(&self, name: &str) -> Option<String> {
        self.snapshot()
            .into_iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v)
    }

    pub fn snapshot(&self) -> Vec<(String, String)> {
        match self.inner.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn identity(&self) -> Option<String> {
        self.get(IDENTITY_COOKIE).filter(|v| !v.is_empty())
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `Cookie` header value for a snapshot of the bag.
    pub fn cookie_header(&self) -> String {
        format_cookie_header(&self.snapshot())
    }
}

pub fn format_cookie_header(cookies: &[(String, String)]) -> String {
    cookies
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("; ")
}

impl fmt::Debug for CredentialBag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.snapshot().into_iter().map(|(k, _)| k).collect();
        f.debug_struct("CredentialBag")
            .field("cookies", &names)
            .field("values", &"[REDACTED]")
            .finish()
    }
}
