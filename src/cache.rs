//! Decoded page images and the LRU cache that holds them.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use log::{debug, trace};

const MIN_BUDGET: usize = 32 * 1024 * 1024;
const MAX_BUDGET: usize = 128 * 1024 * 1024;
const ANIMATED_WEIGHT_FACTOR: usize = 5;

/// An immutable decoded page: RGBA pixels plus dimensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageImage {
    width: u32,
    height: u32,
    animated: bool,
    pixels: Vec<u8>,
}

impl PageImage {
    /// `pixels` is row-major RGBA; a short buffer reads as transparent.
    pub fn new(width: u32, height: u32, animated: bool, pixels: Vec<u8>) -> Self {
        Self {
            width,
            height,
            animated,
            pixels,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn is_animated(&self) -> bool {
        self.animated
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        if x >= self.width || y >= self.height {
            return [0; 4];
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        match self.pixels.get(i..i + 4) {
            Some(p) => [p[0], p[1], p[2], p[3]],
            None => [0; 4],
        }
    }

    /// Cache weight in bytes; animated images count five times.
    pub fn weight(&self) -> usize {
        let base = self.width as usize * self.height as usize * 4;
        if self.animated {
            base * ANIMATED_WEIGHT_FACTOR
        } else {
            base
        }
    }
}

/// Cache budget for a machine with `total_memory` bytes.
pub fn budget_for_memory(total_memory: u64) -> usize {
    let sixteenth = usize::try_from(total_memory / 16).unwrap_or(usize::MAX);
    sixteenth.clamp(MIN_BUDGET, MAX_BUDGET)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

#[derive(Debug)]
struct Entry {
    image: Arc<PageImage>,
    stamp: u64,
}

/// Weight-bounded image cache with strict least-recently-used eviction.
#[derive(Debug)]
pub struct ImageCache {
    budget: usize,
    used: usize,
    entries: HashMap<usize, Entry>,
    // Recency stamp to page index; the first key is least recently used.
    order: BTreeMap<u64, usize>,
    clock: u64,
    stats: CacheStats,
}

impl ImageCache {
    pub fn new(budget: usize) -> Self {
        Self {
            budget,
            used: 0,
            entries: HashMap::new(),
            order: BTreeMap::new(),
            clock: 0,
            stats: CacheStats::default(),
        }
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    pub fn used(&self) -> usize {
        self.used
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    pub fn contains(&self, index: usize) -> bool {
        self.entries.contains_key(&index)
    }

    fn next_stamp(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn evict_lru(&mut self) -> bool {
        let Some((_, index)) = self.order.pop_first() else {
            return false;
        };
        if let Some(entry) = self.entries.remove(&index) {
            self.used = self.used.saturating_sub(entry.image.weight());
            self.stats.evictions += 1;
            trace!("cache: evicted page {index}, used {}/{}", self.used, self.budget);
        }
        true
    }

    /// Look up a page and mark it most recently used.
    pub fn get(&mut self, index: usize) -> Option<Arc<PageImage>> {
        let stamp = self.next_stamp();
        let Some(entry) = self.entries.get_mut(&index) else {
            self.stats.misses += 1;
            return None;
        };
        self.order.remove(&entry.stamp);
        self.order.insert(stamp, index);
        entry.stamp = stamp;
        self.stats.hits += 1;
        Some(Arc::clone(&entry.image))
    }

    /// Store a page, evicting older ones to fit. Returns `false` when the
    /// image alone exceeds the budget and was not retained.
    pub fn put(&mut self, index: usize, image: Arc<PageImage>) -> bool {
        let weight = image.weight();
        self.remove(index);
        if weight > self.budget {
            debug!(
                "cache: page {index} weighs {weight} bytes, over budget {}",
                self.budget
            );
            return false;
        }
        while self.used + weight > self.budget {
            if !self.evict_lru() {
                break;
            }
        }
        let stamp = self.next_stamp();
        self.entries.insert(index, Entry { image, stamp });
        self.order.insert(stamp, index);
        self.used += weight;
        true
    }

    pub fn remove(&mut self, index: usize) -> Option<Arc<PageImage>> {
        let entry = self.entries.remove(&index)?;
        self.order.remove(&entry.stamp);
        self.used = self.used.saturating_sub(entry.image.weight());
        Some(entry.image)
    }

    pub fn evict_all(&mut self) {
        let count = self.entries.len();
        self.entries.clear();
        self.order.clear();
        self.used = 0;
        self.stats.evictions += count as u64;
    }
}
