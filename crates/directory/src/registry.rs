//! The directory's live group registry.
//!
//! Grounded on the teacher's `broker::registry::PodRegistry`: a
//! `RwLock`-protected map, snapshot reads for queries, and explicit
//! insert/remove for lifecycle changes. Slots are tracked separately so a
//! group's UDP port is always `base_port + slot`.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use tokio::sync::RwLock;

use crate::error::Error;

/// A live group, as tracked by the directory.
#[derive(Debug, Clone)]
pub struct GroupRecord {
    pub name: String,
    pub port: u16,
    pub slot: usize,
    pub token: Option<String>,
}

impl GroupRecord {
    /// The group daemon's administrative endpoint (loopback on its port).
    pub fn admin_addr(&self) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), self.port)
    }
}

struct Inner {
    records: HashMap<String, GroupRecord>,
    used_slots: Vec<bool>,
    base_port: u16,
}

/// Registry of live groups, shared between the UDP loop, the admin console,
/// and the child-exit reapers.
pub struct GroupRegistry {
    inner: RwLock<Inner>,
}

impl GroupRegistry {
    pub fn new(max_groups: u16, base_port: u16) -> Self {
        Self {
            inner: RwLock::new(Inner {
                records: HashMap::new(),
                used_slots: vec![false; max_groups as usize],
                base_port,
            }),
        }
    }

    /// Snapshot of `(name, port)` for every live group.
    pub async fn list(&self) -> Vec<(String, u16)> {
        let inner = self.inner.read().await;
        inner.records.values().map(|r| (r.name.clone(), r.port)).collect()
    }

    pub async fn find(&self, name: &str) -> Option<GroupRecord> {
        self.inner.read().await.records.get(name).cloned()
    }

    /// Look up an existing group by name, or allocate a new slot for it.
    /// Returns `(is_new, record)`.
    pub async fn get_or_create(&self, name: &str) -> Result<(bool, GroupRecord), Error> {
        let mut inner = self.inner.write().await;
        if let Some(existing) = inner.records.get(name) {
            return Ok((false, existing.clone()));
        }

        let slot = inner.used_slots.iter().position(|used| !used).ok_or(Error::NoSlot)?;
        inner.used_slots[slot] = true;
        let port = inner.base_port + slot as u16;
        let record = GroupRecord { name: name.to_owned(), port, slot, token: None };
        inner.records.insert(name.to_owned(), record.clone());
        Ok((true, record))
    }

    pub async fn set_token(&self, name: &str, token: String) {
        if let Some(record) = self.inner.write().await.records.get_mut(name) {
            record.token = Some(token);
        }
    }

    /// Remove a group's record and free its slot, e.g. after its child
    /// process exits.
    pub async fn remove(&self, name: &str) -> Option<GroupRecord> {
        let mut inner = self.inner.write().await;
        let record = inner.records.remove(name)?;
        inner.used_slots[record.slot] = false;
        Some(record)
    }
}
