//! In-memory feature store
//!
//! Uses DashMap for thread-safe concurrent access. Items are kept as `Arc`
//! snapshots, so an evaluation holding a flag is unaffected by later updates.

use crate::error::FlagResult;
use crate::flag::FeatureFlag;
use crate::segment::Segment;
use crate::stores::{DataKind, FeatureStore, StoreItem};
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};

/// Shape of a JSON snapshot accepted by [`MemoryStore::load_json`]
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Snapshot {
    flags: HashMap<String, FeatureFlag>,
    segments: HashMap<String, Segment>,
}

/// In-memory feature store
pub struct MemoryStore {
    flags: DashMap<String, Arc<FeatureFlag>>,
    segments: DashMap<String, Arc<Segment>>,
}

impl MemoryStore {
    /// Create a new, empty in-memory store
    pub fn new() -> Self {
        debug!("Creating new in-memory feature store");
        Self {
            flags: DashMap::new(),
            segments: DashMap::new(),
        }
    }

    /// Insert or update a flag.
    ///
    /// An update carrying a lower version than the stored flag is ignored.
    /// Returns whether the flag was written.
    pub fn upsert_flag(&self, flag: FeatureFlag) -> bool {
        let (key, version) = (flag.key.clone(), flag.version);
        upsert_versioned(&self.flags, key, version, flag, |f: &FeatureFlag| f.version)
    }

    /// Insert or update a segment, with the same version rule as flags
    pub fn upsert_segment(&self, segment: Segment) -> bool {
        let (key, version) = (segment.key.clone(), segment.version);
        upsert_versioned(&self.segments, key, version, segment, |s: &Segment| s.version)
    }

    /// Builder-style [`upsert_flag`](Self::upsert_flag)
    pub fn with_flag(self, flag: FeatureFlag) -> Self {
        self.upsert_flag(flag);
        self
    }

    /// Builder-style [`upsert_segment`](Self::upsert_segment)
    pub fn with_segment(self, segment: Segment) -> Self {
        self.upsert_segment(segment);
        self
    }

    /// Remove an item; returns whether it existed
    pub fn delete(&self, kind: DataKind, key: &str) -> bool {
        debug!(kind = %kind, key = %key, "Deleting item");
        match kind {
            DataKind::Features => self.flags.remove(key).is_some(),
            DataKind::Segments => self.segments.remove(key).is_some(),
        }
    }

    /// Replace the whole content of the store
    pub fn init(
        &self,
        flags: impl IntoIterator<Item = FeatureFlag>,
        segments: impl IntoIterator<Item = Segment>,
    ) {
        self.flags.clear();
        self.segments.clear();
        for flag in flags {
            self.flags.insert(flag.key.clone(), Arc::new(flag));
        }
        for segment in segments {
            self.segments.insert(segment.key.clone(), Arc::new(segment));
        }
        debug!(
            flags = self.flags.len(),
            segments = self.segments.len(),
            "Initialized feature store"
        );
    }

    /// Replace the content of the store with a JSON snapshot of the form
    /// `{"flags": {key: flag}, "segments": {key: segment}}`.
    ///
    /// Map keys win over any `key` field inside the item.
    pub fn load_json(&self, json: &str) -> FlagResult<()> {
        let snapshot: Snapshot = serde_json::from_str(json)?;

        let flags = snapshot.flags.into_iter().map(|(key, mut flag)| {
            flag.key = key;
            flag
        });
        let segments = snapshot.segments.into_iter().map(|(key, mut segment)| {
            segment.key = key;
            segment
        });

        self.init(flags, segments);
        Ok(())
    }

    /// Create a store from a JSON snapshot
    pub fn from_json(json: &str) -> FlagResult<Self> {
        let store = Self::new();
        store.load_json(json)?;
        Ok(store)
    }

    pub fn flag_count(&self) -> usize {
        self.flags.len()
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }
}

fn upsert_versioned<T>(
    map: &DashMap<String, Arc<T>>,
    key: String,
    version: u64,
    item: T,
    version_of: impl Fn(&T) -> u64,
) -> bool {
    match map.entry(key) {
        Entry::Occupied(entry) if version_of(entry.get()) > version => {
            debug!(
                key = %entry.key(),
                stored = version_of(entry.get()),
                offered = version,
                "Ignoring stale update"
            );
            false
        }
        Entry::Occupied(mut entry) => {
            trace!(key = %entry.key(), version = version, "Updating item");
            entry.insert(Arc::new(item));
            true
        }
        Entry::Vacant(entry) => {
            trace!(key = %entry.key(), version = version, "Inserting item");
            entry.insert(Arc::new(item));
            true
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FeatureStore for MemoryStore {
    async fn get(&self, kind: DataKind, key: &str) -> Option<StoreItem> {
        trace!(kind = %kind, key = %key, "Feature store lookup");
        match kind {
            DataKind::Features => self
                .flags
                .get(key)
                .map(|flag| StoreItem::Flag(Arc::clone(&flag))),
            DataKind::Segments => self
                .segments
                .get(key)
                .map(|segment| StoreItem::Segment(Arc::clone(&segment))),
        }
    }

    fn store_type(&self) -> &'static str {
        "memory"
    }
}
