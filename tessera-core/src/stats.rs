//! Frame statistics counters.
//!
//! Incremented by the tessellator, the caches' consumers, and the retrieval
//! pipeline; read by an external stats overlay. Counters are atomics so the
//! shared handle can also be touched from fetch workers.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Cumulative counters for one rendering surface.
#[derive(Debug, Default)]
pub struct FrameStatistics {
    texture_cache_hits: AtomicU64,
    texture_cache_misses: AtomicU64,
    tiles_rendered: AtomicU64,
    tiles_culled: AtomicU64,
    requests_issued: AtomicU64,
    retrievals_completed: AtomicU64,
    retrievals_failed: AtomicU64,
    gpu_resource_loads: AtomicU64,
}

impl FrameStatistics {
    pub fn inc_texture_cache_hits(&self) {
        self.texture_cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_texture_cache_misses(&self) {
        self.texture_cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_tiles_rendered(&self, count: u64) {
        self.tiles_rendered.fetch_add(count, Ordering::Relaxed);
    }

    pub fn inc_tiles_culled(&self) {
        self.tiles_culled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_requests_issued(&self) {
        self.requests_issued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_retrievals_completed(&self) {
        self.retrievals_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_retrievals_failed(&self) {
        self.retrievals_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_gpu_resource_loads(&self) {
        self.gpu_resource_loads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            texture_cache_hits: self.texture_cache_hits.load(Ordering::Relaxed),
            texture_cache_misses: self.texture_cache_misses.load(Ordering::Relaxed),
            tiles_rendered: self.tiles_rendered.load(Ordering::Relaxed),
            tiles_culled: self.tiles_culled.load(Ordering::Relaxed),
            requests_issued: self.requests_issued.load(Ordering::Relaxed),
            retrievals_completed: self.retrievals_completed.load(Ordering::Relaxed),
            retrievals_failed: self.retrievals_failed.load(Ordering::Relaxed),
            gpu_resource_loads: self.gpu_resource_loads.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        self.texture_cache_hits.store(0, Ordering::Relaxed);
        self.texture_cache_misses.store(0, Ordering::Relaxed);
        self.tiles_rendered.store(0, Ordering::Relaxed);
        self.tiles_culled.store(0, Ordering::Relaxed);
        self.requests_issued.store(0, Ordering::Relaxed);
        self.retrievals_completed.store(0, Ordering::Relaxed);
        self.retrievals_failed.store(0, Ordering::Relaxed);
        self.gpu_resource_loads.store(0, Ordering::Relaxed);
    }
}

/// A point-in-time copy of the counters, cheap to display or serialize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub texture_cache_hits: u64,
    pub texture_cache_misses: u64,
    pub tiles_rendered: u64,
    pub tiles_culled: u64,
    pub requests_issued: u64,
    pub retrievals_completed: u64,
    pub retrievals_failed: u64,
    pub gpu_resource_loads: u64,
}

impl StatsSnapshot {
    /// Fraction of texture lookups served from cache, 0 when none occurred.
    pub fn cache_hit_rate(&self) -> f64 {
        let total = self.texture_cache_hits + self.texture_cache_misses;
        if total == 0 {
            0.0
        } else {
            self.texture_cache_hits as f64 / total as f64
        }
    }
}
