//! Planning-query cache tied to the grid's obstacle revision

use crate::core::GridCoord;
use crate::planning::astar::{PlanError, PlannedPath};
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

type CachedResult = Result<PlannedPath, PlanError>;

/// Cache usage counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStatistics {
    pub hits: u64,
    pub misses: u64,
    /// Full flushes caused by a grid change
    pub invalidations: u64,
    pub entries: usize,
}

impl CacheStatistics {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// `(start, goal)` keyed results, all dropped as soon as the grid revision moves
#[derive(Debug)]
pub struct PathCache {
    entries: HashMap<(GridCoord, GridCoord), CachedResult>,
    revision: u64,
    capacity: usize,
    hits: u64,
    misses: u64,
    invalidations: u64,
}

impl PathCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            revision: 0,
            capacity: capacity.max(1),
            hits: 0,
            misses: 0,
            invalidations: 0,
        }
    }

    /// Drop every entry if the grid has changed since they were stored
    fn sync(&mut self, revision: u64) {
        if revision != self.revision {
            if !self.entries.is_empty() {
                debug!(
                    "[PathCache] grid revision {} -> {}, dropping {} cached paths",
                    self.revision,
                    revision,
                    self.entries.len()
                );
                self.entries.clear();
                self.invalidations += 1;
            }
            self.revision = revision;
        }
    }

    pub fn get(&mut self, start: GridCoord, goal: GridCoord, revision: u64) -> Option<CachedResult> {
        self.sync(revision);
        match self.entries.get(&(start, goal)) {
            Some(result) => {
                self.hits += 1;
                Some(result.clone())
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    pub fn insert(&mut self, start: GridCoord, goal: GridCoord, revision: u64, result: CachedResult) {
        self.sync(revision);
        if self.entries.len() >= self.capacity && !self.entries.contains_key(&(start, goal)) {
            trace!("[PathCache] capacity {} reached, flushing", self.capacity);
            self.entries.clear();
        }
        self.entries.insert((start, goal), result);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn statistics(&self) -> CacheStatistics {
        CacheStatistics {
            hits: self.hits,
            misses: self.misses,
            invalidations: self.invalidations,
            entries: self.entries.len(),
        }
    }
}
