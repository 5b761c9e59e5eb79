//! Feature store backends
//!
//! The evaluator reads flags and segments through the [`FeatureStore`]
//! trait. Lookups are async because a store may sit on the network; a store
//! answering `None` means "no such item", never an error.
//!
//! - **Memory**: DashMap-backed store, loadable from a JSON snapshot

mod memory;

pub use memory::MemoryStore;

use crate::flag::FeatureFlag;
use crate::segment::Segment;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// Kind of item kept in a feature store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataKind {
    Features,
    Segments,
}

impl DataKind {
    /// Namespace name of the kind
    pub fn namespace(&self) -> &'static str {
        match self {
            DataKind::Features => "features",
            DataKind::Segments => "segments",
        }
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.namespace())
    }
}

/// Item returned by a feature store
#[derive(Debug, Clone, PartialEq)]
pub enum StoreItem {
    Flag(Arc<FeatureFlag>),
    Segment(Arc<Segment>),
}

impl StoreItem {
    pub fn kind(&self) -> DataKind {
        match self {
            StoreItem::Flag(_) => DataKind::Features,
            StoreItem::Segment(_) => DataKind::Segments,
        }
    }

    pub fn key(&self) -> &str {
        match self {
            StoreItem::Flag(flag) => &flag.key,
            StoreItem::Segment(segment) => &segment.key,
        }
    }

    pub fn version(&self) -> u64 {
        match self {
            StoreItem::Flag(flag) => flag.version,
            StoreItem::Segment(segment) => segment.version,
        }
    }
}

/// Read-only view of flag and segment definitions
#[async_trait]
pub trait FeatureStore: Send + Sync {
    /// Fetch an item by kind and key; `None` if it does not exist
    async fn get(&self, kind: DataKind, key: &str) -> Option<StoreItem>;

    /// Fetch a flag by key
    async fn flag(&self, key: &str) -> Option<Arc<FeatureFlag>> {
        match self.get(DataKind::Features, key).await {
            Some(StoreItem::Flag(flag)) => Some(flag),
            _ => None,
        }
    }

    /// Fetch a segment by key
    async fn segment(&self, key: &str) -> Option<Arc<Segment>> {
        match self.get(DataKind::Segments, key).await {
            Some(StoreItem::Segment(segment)) => Some(segment),
            _ => None,
        }
    }

    /// Get store type name for debugging
    fn store_type(&self) -> &'static str;
}

/// Store wrapper that logs every lookup as `"<namespace>/<key>"`
#[cfg(test)]
pub(crate) struct RecordingStore {
    inner: MemoryStore,
    lookups: std::sync::Mutex<Vec<String>>,
}

#[cfg(test)]
impl RecordingStore {
    pub(crate) fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            lookups: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn lookups(&self) -> Vec<String> {
        self.lookups.lock().unwrap().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl FeatureStore for RecordingStore {
    async fn get(&self, kind: DataKind, key: &str) -> Option<StoreItem> {
        self.lookups.lock().unwrap().push(format!("{kind}/{key}"));
        self.inner.get(kind, key).await
    }

    fn store_type(&self) -> &'static str {
        "recording"
    }
}
