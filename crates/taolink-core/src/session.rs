//! Device session contract.
//!
//! The schema engine never talks to a device itself: it works on an
//! observed [`DpSnapshot`] and hands completed write sets to a
//! [`DeviceSession`] implemented by the transport layer (local TCP,
//! cloud relay, test double).

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::value::DpValue;

/// An observed raw property snapshot: dp id to raw value.
///
/// Snapshots are plain data. The engine treats them as read-only input;
/// refreshing them from the device is the caller's job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DpSnapshot(HashMap<String, DpValue>);

impl DpSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw value of a dp, or `None` when the device has not reported it.
    pub fn get(&self, id: &str) -> Option<&DpValue> {
        self.0.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.0.contains_key(id)
    }

    pub fn insert(&mut self, id: impl Into<String>, value: impl Into<DpValue>) {
        self.0.insert(id.into(), value.into());
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(|k| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<HashMap<String, DpValue>> for DpSnapshot {
    fn from(map: HashMap<String, DpValue>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>, V: Into<DpValue>> FromIterator<(K, V)> for DpSnapshot {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Errors surfaced by a device session implementation.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Transport-level failure talking to the device
    #[error("Communication error: {0}")]
    Communication(String),

    /// The device refused the write
    #[error("Device rejected write: {0}")]
    Rejected(String),

    /// Operation timed out
    #[error("Operation timed out after {0}ms")]
    Timeout(u64),
}

/// Transport-side collaborator for one device.
///
/// `set_properties` receives the complete, pre-merged write set for one
/// semantic write and is expected to apply it atomically or fail as a
/// whole; the engine performs no partial writes of its own.
#[async_trait]
pub trait DeviceSession: Send + Sync {
    /// Read one raw property, or `None` when the device does not expose it.
    async fn get_property(&self, id: &str) -> Option<DpValue>;

    /// Apply a batch of raw property writes.
    async fn set_properties(&self, updates: HashMap<String, DpValue>) -> Result<(), SessionError>;
}
