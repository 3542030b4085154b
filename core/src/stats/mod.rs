//! Build and decode counters for mosaic sources.
//!
//! A [`MosaicStats`] instance can be shared between several sources; snapshots are serialisable so
//! a host application can surface them next to its own diagnostics.

use std::cmp::Ordering;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

use serde::Serialize;

const DEFAULT_SAMPLE_CAPACITY: usize = 240;

#[derive(Debug, Default)]
struct SampleWindow {
    samples: VecDeque<f32>,
    capacity: usize,
}

impl SampleWindow {
    fn new(capacity: usize) -> Self {
        Self { samples: VecDeque::with_capacity(capacity), capacity }
    }

    fn push(&mut self, value: f32) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(value);
    }

    fn percentile(&self, percentile: f32) -> f32 {
        if self.samples.is_empty() {
            return 0.0;
        }

        let mut sorted: Vec<f32> = self.samples.iter().copied().collect();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

        let rank = percentile.clamp(0.0, 1.0) * (sorted.len() - 1) as f32;
        sorted.get(rank.round() as usize).copied().unwrap_or(0.0)
    }
}

#[derive(Debug)]
struct StatsInner {
    started_at: Instant,
    build_times_ms: SampleWindow,
    decode_times_ms: SampleWindow,
    builds: u64,
    resets: u64,
    tiles_decoded: u64,
    tiles_registered: usize,
    registry_bytes: usize,
    cache_requests: u64,
    cache_hits: u64,
}

impl Default for StatsInner {
    fn default() -> Self {
        Self {
            started_at: Instant::now(),
            build_times_ms: SampleWindow::new(DEFAULT_SAMPLE_CAPACITY),
            decode_times_ms: SampleWindow::new(DEFAULT_SAMPLE_CAPACITY),
            builds: 0,
            resets: 0,
            tiles_decoded: 0,
            tiles_registered: 0,
            registry_bytes: 0,
            cache_requests: 0,
            cache_hits: 0,
        }
    }
}

/// Thread-safe counter collection.
#[derive(Debug, Default)]
pub struct MosaicStats {
    inner: parking_lot::Mutex<StatsInner>,
}

impl MosaicStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the wall time of one complete level build.
    pub fn record_build(&self, duration: Duration) {
        let mut guard = self.inner.lock();
        guard.builds = guard.builds.saturating_add(1);
        guard.build_times_ms.push(duration.as_secs_f64() as f32 * 1_000.0);
    }

    pub fn record_decode(&self, duration: Duration) {
        let mut guard = self.inner.lock();
        guard.tiles_decoded = guard.tiles_decoded.saturating_add(1);
        guard.decode_times_ms.push(duration.as_secs_f64() as f32 * 1_000.0);
    }

    pub fn record_reset(&self) {
        let mut guard = self.inner.lock();
        guard.resets = guard.resets.saturating_add(1);
        guard.tiles_registered = 0;
        guard.registry_bytes = 0;
    }

    /// Record whether a decoded storage tile was served from cache.
    pub fn record_cache_lookup(&self, hit: bool) {
        let mut guard = self.inner.lock();
        guard.cache_requests = guard.cache_requests.saturating_add(1);
        if hit {
            guard.cache_hits = guard.cache_hits.saturating_add(1);
        }
    }

    pub fn update_registry(&self, tiles: usize, bytes: usize) {
        let mut guard = self.inner.lock();
        guard.tiles_registered = tiles;
        guard.registry_bytes = bytes;
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let guard = self.inner.lock();
        let cache_requests = guard.cache_requests.max(1);

        StatsSnapshot {
            uptime_ms: guard.started_at.elapsed().as_millis() as u64,
            builds: guard.builds,
            resets: guard.resets,
            build_time_ms_p50: guard.build_times_ms.percentile(0.50),
            build_time_ms_p95: guard.build_times_ms.percentile(0.95),
            tiles_decoded: guard.tiles_decoded,
            decode_time_ms_p50: guard.decode_times_ms.percentile(0.50),
            decode_time_ms_p95: guard.decode_times_ms.percentile(0.95),
            tiles_registered: guard.tiles_registered,
            registry_bytes: guard.registry_bytes,
            cache_requests: guard.cache_requests,
            cache_hit_ratio: guard.cache_hits as f32 / cache_requests as f32,
        }
    }
}

/// Immutable view of the counters.
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub uptime_ms: u64,
    pub builds: u64,
    pub resets: u64,
    pub build_time_ms_p50: f32,
    pub build_time_ms_p95: f32,
    pub tiles_decoded: u64,
    pub decode_time_ms_p50: f32,
    pub decode_time_ms_p95: f32,
    pub tiles_registered: usize,
    pub registry_bytes: usize,
    pub cache_requests: u64,
    pub cache_hit_ratio: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentiles_follow_recorded_builds() {
        let stats = MosaicStats::new();
        stats.record_build(Duration::from_millis(10));
        stats.record_build(Duration::from_millis(20));
        stats.record_build(Duration::from_millis(30));

        let snap = stats.snapshot();
        assert_eq!(snap.builds, 3);
        assert!(snap.build_time_ms_p50 >= 19.0 && snap.build_time_ms_p50 <= 21.0);
        assert!(snap.build_time_ms_p95 >= 29.0);
    }

    #[test]
    fn reset_clears_registry_counters() {
        let stats = MosaicStats::new();
        stats.update_registry(12, 4096);
        stats.record_cache_lookup(true);
        stats.record_cache_lookup(false);
        stats.record_reset();

        let snap = stats.snapshot();
        assert_eq!(snap.tiles_registered, 0);
        assert_eq!(snap.registry_bytes, 0);
        assert_eq!(snap.resets, 1);
        assert_eq!(snap.cache_requests, 2);
        assert!((snap.cache_hit_ratio - 0.5).abs() < f32::EPSILON);
    }
}
