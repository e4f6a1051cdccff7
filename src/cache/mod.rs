use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use lru::LruCache;

use crate::io::{Station, station_hash};
use crate::physics::VisibilityMask;
use crate::terrain::ElevationGrid;

pub const DEFAULT_CACHE_CAPACITY: usize = 64;

#[derive(Hash, PartialEq, Eq, Clone, Copy, Debug)]
pub struct StationKey {
    pub grid: u64,
    pub station: u64,
    pub angle_scale_bits: u64,
}

impl StationKey {
    pub fn new(grid_fingerprint: u64, station: &Station, angle_scale: f64) -> Self {
        Self {
            grid: grid_fingerprint,
            station: station_hash(station),
            angle_scale_bits: angle_scale.to_bits(),
        }
    }
}

/// Hash of a grid's geometry, sentinel and samples.
pub fn grid_fingerprint(grid: &ElevationGrid) -> u64 {
    let mut hasher = DefaultHasher::new();
    let g = &grid.geometry;
    (g.cols, g.rows).hash(&mut hasher);
    for v in [g.west, g.north, g.cell_width, g.cell_height, grid.novalue] {
        v.to_bits().hash(&mut hasher);
    }
    for v in grid.data.iter() {
        v.to_bits().hash(&mut hasher);
    }
    hasher.finish()
}

#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheMetrics {
    pub hits: u32,
    pub misses: u32,
}

/// Per-station visibility masks, shared between runs over the same grid.
pub struct MaskCache {
    cache: Arc<Mutex<LruCache<StationKey, Arc<VisibilityMask>>>>,
    metrics: Mutex<CacheMetrics>,
}

impl Default for MaskCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

impl MaskCache {
    /// A zero capacity is bumped to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: Arc::new(Mutex::new(LruCache::new(capacity))),
            metrics: Mutex::new(CacheMetrics::default()),
        }
    }

    pub fn get(&self, key: &StationKey) -> Option<Arc<VisibilityMask>> {
        let found = lock(&self.cache).get(key).cloned();
        let mut metrics = lock(&self.metrics);
        if found.is_some() {
            metrics.hits += 1;
        } else {
            metrics.misses += 1;
        }
        found
    }

    pub fn insert(&self, key: StationKey, mask: Arc<VisibilityMask>) {
        lock(&self.cache).put(key, mask);
    }

    pub fn len(&self) -> usize {
        lock(&self.cache).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn metrics(&self) -> CacheMetrics {
        *lock(&self.metrics)
    }
}

/// Recovers the guard from a poisoned lock.
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::GridGeometry;
    use crate::terrain::Raster;
    use ndarray::Array2;

    fn mask() -> Arc<VisibilityMask> {
        Arc::new(VisibilityMask {
            geometry: GridGeometry::new(2, 2, 0.0, 2.0, 1.0, 1.0),
            visible: Array2::from_elem((2, 2), true),
        })
    }

    #[test]
    fn test_hits_and_misses() {
        let cache = MaskCache::new(2);
        let key = StationKey::new(1, &Station::new("a", 0.0, 0.0, 1.0), 1000.0);

        assert!(cache.get(&key).is_none());
        cache.insert(key, mask());
        assert!(cache.get(&key).is_some());
        assert_eq!(cache.metrics(), CacheMetrics { hits: 1, misses: 1 });
    }

    #[test]
    fn test_least_recently_used_is_evicted() {
        let cache = MaskCache::new(1);
        let a = StationKey::new(1, &Station::new("a", 0.0, 0.0, 1.0), 1000.0);
        let b = StationKey::new(1, &Station::new("b", 1.0, 0.0, 1.0), 1000.0);
        cache.insert(a, mask());
        cache.insert(b, mask());
        assert!(cache.get(&a).is_none());
        assert!(cache.get(&b).is_some());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_fingerprint_tracks_samples() {
        let a = Raster::from_rows(vec![1.0, 2.0], 2, 1, 0.0, 1.0, 1.0, -9999.0).unwrap();
        let mut b = a.clone();
        assert_eq!(grid_fingerprint(&a), grid_fingerprint(&b));
        b.set(1, 0, 3.0);
        assert_ne!(grid_fingerprint(&a), grid_fingerprint(&b));
    }
}
