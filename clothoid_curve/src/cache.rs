//! Memoized projection onto a single clothoid

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::clothoid::Clothoid;
use crate::error::Result;
use crate::projection::Projection;
use crate::Float;

pub const DEFAULT_CAPACITY: usize = 32;
/// query points closer than this on both axes share a cache entry
pub const QUANTUM: Float = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheInfo {
    pub hits: usize,
    pub misses: usize,
    pub max_size: usize,
    pub curr_size: usize,
}

type Key = (u64, u64);

fn quantize_axis(v: Float) -> u64 {
    let q = (v / QUANTUM).round();
    // huge coordinates overflow the quotient, key those on the exact value
    let q = if q.is_finite() { q } else { v };
    // adding 0.0 folds -0.0 into 0.0
    (q + 0.0).to_bits()
}

fn quantize(x: Float, y: Float) -> Key {
    (quantize_axis(x), quantize_axis(y))
}

/// most recently used entry at the front
#[derive(Debug)]
struct Lru {
    capacity: usize,
    entries: VecDeque<(Key, Projection)>,
    hits: usize,
    misses: usize,
}

impl Lru {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
            hits: 0,
            misses: 0,
        }
    }

    fn get(&mut self, key: &Key) -> Option<Projection> {
        let Some(index) = self.entries.iter().position(|(k, _)| k == key) else {
            self.misses += 1;
            return None;
        };
        self.hits += 1;
        let entry = self.entries.remove(index)?;
        let projection = entry.1;
        self.entries.push_front(entry);
        Some(projection)
    }

    fn insert(&mut self, key: Key, projection: Projection) {
        if self.capacity == 0 {
            return;
        }
        // another thread may have stored it while the lock was released
        self.entries.retain(|(k, _)| *k != key);
        if self.entries.len() >= self.capacity {
            self.entries.pop_back();
        }
        self.entries.push_front((key, projection));
    }

    fn info(&self) -> CacheInfo {
        CacheInfo {
            hits: self.hits,
            misses: self.misses,
            max_size: self.capacity,
            curr_size: self.entries.len(),
        }
    }
}

/// A clothoid with its own least recently used cache of projection results.
///
/// Repeated queries of the same point (to within [`QUANTUM`]) return the stored
/// projection. Errors are never cached. The cache sits behind a mutex so a shared
/// `&CachedClothoid` can be queried from several threads.
#[derive(Debug)]
pub struct CachedClothoid {
    clothoid: Clothoid,
    cache: Mutex<Option<Lru>>,
}

impl Clone for CachedClothoid {
    /// The clone gets an empty cache of the same capacity
    fn clone(&self) -> Self {
        let capacity = self.lock().as_ref().map(|lru| lru.capacity);
        Self::with_capacity(self.clothoid, capacity)
    }
}

impl From<Clothoid> for CachedClothoid {
    fn from(clothoid: Clothoid) -> Self {
        Self::new(clothoid)
    }
}

impl CachedClothoid {
    pub fn new(clothoid: Clothoid) -> Self {
        Self::with_capacity(clothoid, Some(DEFAULT_CAPACITY))
    }

    /// `None` disables caching
    pub fn with_capacity(clothoid: Clothoid, capacity: Option<usize>) -> Self {
        Self {
            clothoid,
            cache: Mutex::new(capacity.map(Lru::new)),
        }
    }

    pub fn clothoid(&self) -> &Clothoid {
        &self.clothoid
    }

    // a panic elsewhere can't leave the cache inconsistent, so ignore poisoning
    fn lock(&self) -> MutexGuard<'_, Option<Lru>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the cache with an empty one of the given capacity, `None` disables it
    pub fn setup_projection_cache(&self, capacity: Option<usize>) {
        *self.lock() = capacity.map(Lru::new);
    }

    /// `None` when caching is disabled
    pub fn cache_info(&self) -> Option<CacheInfo> {
        self.lock().as_ref().map(Lru::info)
    }

    pub fn project(&self, x: Float, y: Float) -> Result<Projection> {
        if !x.is_finite() || !y.is_finite() {
            // let the projection report it
            return self.clothoid.project(x, y);
        }
        let key = quantize(x, y);
        if let Some(lru) = self.lock().as_mut() {
            if let Some(projection) = lru.get(&key) {
                trace!("projection cache hit ({x}, {y})");
                return Ok(projection);
            }
        }
        // the lock isn't held while projecting
        let projection = self.clothoid.project(x, y)?;
        if let Some(lru) = self.lock().as_mut() {
            lru.insert(key, projection);
        }
        Ok(projection)
    }

    pub fn closest_point(&self, x: Float, y: Float) -> Result<(Float, Float)> {
        let p = self.project(x, y)?;
        Ok((p.x, p.y))
    }

    pub fn closest_point_arc_length(&self, x: Float, y: Float) -> Result<Float> {
        Ok(self.project(x, y)?.s)
    }

    pub fn distance(&self, x: Float, y: Float) -> Result<Float> {
        Ok(self.project(x, y)?.distance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn clothoid() -> Clothoid {
        Clothoid::new(0.0, 0.0, 0.0, 1.0, -0.3, 4.0).unwrap()
    }

    #[test]
    fn default_size_configurable() {
        let cached = CachedClothoid::new(clothoid());
        assert_eq!(cached.cache_info().unwrap().max_size, 32);
        cached.setup_projection_cache(Some(64));
        let info = cached.cache_info().unwrap();
        assert_eq!(info.max_size, 64);
        assert_eq!(info.curr_size, 0);
    }

    #[test]
    fn disable() {
        let cached = CachedClothoid::new(clothoid());
        assert!(cached.cache_info().is_some());
        cached.setup_projection_cache(None);
        assert!(cached.cache_info().is_none());
        // still answers queries
        let d = cached.distance(1.0, 1.0).unwrap();
        assert_abs_diff_eq!(d, clothoid().distance(1.0, 1.0).unwrap(), epsilon = 1e-15);
    }

    #[test]
    fn caches_are_independent() {
        let c1 = CachedClothoid::new(clothoid());
        let c2 = CachedClothoid::new(clothoid());
        c1.project(1.0, 1.0).unwrap();
        assert_eq!(c1.cache_info().unwrap().curr_size, 1);
        assert_eq!(c2.cache_info().unwrap().curr_size, 0);

        let c3 = c1.clone();
        assert_eq!(c3.cache_info().unwrap().curr_size, 0);
        assert_eq!(c3.cache_info().unwrap().max_size, 32);
    }

    #[test]
    fn hits_and_eviction() {
        let cached = CachedClothoid::with_capacity(clothoid(), Some(2));
        let first = cached.project(1.0, 1.0).unwrap();
        let again = cached.project(1.0, 1.0 + 1e-12).unwrap();
        assert_eq!(first, again);
        let info = cached.cache_info().unwrap();
        assert_eq!((info.hits, info.misses, info.curr_size), (1, 1, 1));

        cached.closest_point(2.0, 0.0).unwrap();
        cached.closest_point_arc_length(3.0, 0.0).unwrap();
        let info = cached.cache_info().unwrap();
        assert_eq!((info.misses, info.curr_size), (3, 2));
        // (1, 1) was evicted
        cached.project(1.0, 1.0).unwrap();
        assert_eq!(cached.cache_info().unwrap().misses, 4);
    }

    #[test]
    fn huge_coordinates_keep_distinct_keys() {
        let cached = CachedClothoid::new(clothoid());
        let d1 = cached.distance(1e300, 0.0).unwrap();
        let d2 = cached.distance(1.5e300, 0.0).unwrap();
        assert!(d2 > d1);
        assert_eq!(d2, clothoid().distance(1.5e300, 0.0).unwrap());
        let info = cached.cache_info().unwrap();
        assert_eq!((info.hits, info.misses, info.curr_size), (0, 2, 2));
        assert_ne!(quantize(1e300, 0.0), quantize(1.5e300, 0.0));
        assert_eq!(quantize(-0.0, 0.0), quantize(0.0, 0.0));
    }

    #[test]
    fn errors_not_cached() {
        let cached = CachedClothoid::new(clothoid());
        assert!(cached.project(Float::NAN, 0.0).unwrap_err().is_invalid_input());
        assert_eq!(cached.cache_info().unwrap().curr_size, 0);
    }

    #[test]
    fn shared_between_threads() {
        let cached = CachedClothoid::new(clothoid());
        std::thread::scope(|scope| {
            for i in 0..4 {
                let cached = &cached;
                scope.spawn(move || {
                    for j in 0..8 {
                        cached.distance(i as Float, j as Float).unwrap();
                    }
                });
            }
        });
        let info = cached.cache_info().unwrap();
        assert_eq!(info.hits + info.misses, 32);
        assert_eq!(info.curr_size, 32);
    }
}
