// ── Response cache ──
//
// Short-lived cache for read-only OBS queries. Every entry carries its own
// expiry (category-specific TTL) and is also dropped eagerly when OBS
// pushes an event that makes it stale.

use std::time::Duration;

use dashmap::DashMap;
use serde_json::Value;
use tokio::time::Instant;
use tracing::trace;

use crate::config::CacheTtl;

/// Cacheable queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::AsRefStr)]
pub enum CacheKey {
    SceneList,
    CurrentProgramScene,
    CurrentPreviewScene,
    InputList,
    StreamStatus,
    RecordStatus,
    VirtualCamStatus,
    ReplayBufferStatus,
    VideoSettings,
}

impl CacheKey {
    fn ttl(self, ttl: &CacheTtl) -> Duration {
        match self {
            Self::SceneList => ttl.scene_list,
            Self::CurrentProgramScene | Self::CurrentPreviewScene | Self::InputList => ttl.sources,
            Self::StreamStatus
            | Self::RecordStatus
            | Self::VirtualCamStatus
            | Self::ReplayBufferStatus => ttl.status,
            Self::VideoSettings => ttl.default,
        }
    }
}

/// Cache keys made stale by an OBS event. Unknown events invalidate nothing.
pub fn keys_for_event(event_type: &str) -> &'static [CacheKey] {
    match event_type {
        "CurrentProgramSceneChanged" => &[CacheKey::CurrentProgramScene],
        "CurrentPreviewSceneChanged" => &[CacheKey::CurrentPreviewScene],
        "SceneListChanged" | "SceneCreated" | "SceneRemoved" | "SceneNameChanged" => {
            &[CacheKey::SceneList]
        }
        "InputCreated" | "InputRemoved" | "InputNameChanged" | "InputVolumeChanged" => {
            &[CacheKey::InputList]
        }
        "StreamStateChanged" => &[CacheKey::StreamStatus],
        "RecordStateChanged" => &[CacheKey::RecordStatus],
        "VirtualcamStateChanged" => &[CacheKey::VirtualCamStatus],
        "ReplayBufferStateChanged" => &[CacheKey::ReplayBufferStatus],
        _ => &[],
    }
}

struct Entry {
    value: Value,
    expires_at: Instant,
}

/// TTL cache of raw response payloads.
pub struct ResponseCache {
    entries: DashMap<CacheKey, Entry>,
    ttl: CacheTtl,
}

impl ResponseCache {
    pub fn new(ttl: CacheTtl) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Fresh value for `key`, if any. Expired entries are evicted on read.
    pub fn get(&self, key: CacheKey) -> Option<Value> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(&key) {
            if entry.expires_at > now {
                return Some(entry.value.clone());
            }
        }
        self.entries.remove_if(&key, |_, entry| entry.expires_at <= now);
        None
    }

    pub fn insert(&self, key: CacheKey, value: Value) {
        let expires_at = Instant::now() + key.ttl(&self.ttl);
        self.entries.insert(key, Entry { value, expires_at });
    }

    /// Drop only the entries `event_type` affects.
    pub fn invalidate_for_event(&self, event_type: &str) {
        for key in keys_for_event(event_type) {
            if self.entries.remove(key).is_some() {
                trace!(key = key.as_ref(), event = event_type, "cache entry invalidated");
            }
        }
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
