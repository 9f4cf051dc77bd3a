//! Per-group admin token cache (see SPEC_FULL §4.3).
//!
//! The directory hands a client its token on `CREATE` (trust-on-first-use,
//! by design — see the registry's grounding in DESIGN.md). This store just
//! remembers which token goes with which group for the life of the process.

use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct TokenStore(HashMap<String, String>);

impl TokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, group: impl Into<String>, token: impl Into<String>) {
        self.0.insert(group.into(), token.into());
    }

    pub fn get(&self, group: &str) -> Option<&str> {
        self.0.get(group).map(String::as_str)
    }

    pub fn remove(&mut self, group: &str) -> Option<String> {
        self.0.remove(group)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
