// ── Client-side state ──
//
// TTL response cache with event-driven invalidation, and the change
// tracker that diffs successive snapshots.

pub mod cache;
pub mod tracker;

pub use cache::{CacheKey, ResponseCache};
pub use tracker::{ChangeCategory, ChangeRecord, StateChange, StateTracker, StateWithChanges};
