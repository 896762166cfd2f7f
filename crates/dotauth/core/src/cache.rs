// Dotlanth
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Decision cache for permission checks
//!
//! Decisions are stored per user under a structured [`DecisionKey`].
//! There is no expiry: entries live until the next invalidation event.
//! Every invalidation bumps an epoch, and a decision computed under an
//! older epoch is dropped instead of installed, so a check racing with a
//! mutation cannot resurrect a stale answer.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use dotauth_common::{AccessQuery, DecisionKey, UserId};
use metrics::counter;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Cache statistics for monitoring
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheStats {
    /// Total cache hits
    pub hits: u64,

    /// Total cache misses
    pub misses: u64,

    /// Invalidation events (per user or global)
    pub invalidations: u64,

    /// Decisions computed under an outdated epoch and therefore not cached
    pub stale_discards: u64,

    /// Users with at least one cached decision
    pub cached_users: usize,

    /// Cached decisions across all users
    pub cached_decisions: usize,
}

impl CacheStats {
    /// Calculate hit ratio
    pub fn hit_ratio(&self) -> f64 {
        if self.hits + self.misses == 0 { 0.0 } else { self.hits as f64 / (self.hits + self.misses) as f64 }
    }
}

/// Per-user memo of permission decisions
#[derive(Debug)]
pub struct DecisionCache {
    entries: DashMap<UserId, HashMap<DecisionKey, bool>>,
    epoch: AtomicU64,
    enabled: bool,
    hits: AtomicU64,
    misses: AtomicU64,
    invalidations: AtomicU64,
    stale_discards: AtomicU64,
}

impl DecisionCache {
    /// Create a new, enabled cache
    pub fn new() -> Self {
        Self::with_enabled(true)
    }

    /// Create a cache; a disabled cache never stores anything
    pub fn with_enabled(enabled: bool) -> Self {
        Self {
            entries: DashMap::new(),
            epoch: AtomicU64::new(0),
            enabled,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            invalidations: AtomicU64::new(0),
            stale_discards: AtomicU64::new(0),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Current invalidation epoch. Read it before computing a decision and
    /// hand it back to [`DecisionCache::insert`].
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Look up a cached decision
    pub fn get(&self, query: &AccessQuery) -> Option<bool> {
        if !self.enabled {
            return None;
        }

        let cached = self.entries.get(&query.user_id).and_then(|decisions| decisions.get(&query.decision_key()).copied());

        match cached {
            Some(allowed) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                counter!("dotauth_cache_hits_total", 1);
                debug!(user_id = %query.user_id, query = %query, "Decision cache hit");
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                counter!("dotauth_cache_misses_total", 1);
                debug!(user_id = %query.user_id, query = %query, "Decision cache miss");
            }
        }

        cached
    }

    /// Install a decision computed under `observed_epoch`. Returns whether it was stored.
    pub fn insert(&self, query: &AccessQuery, allowed: bool, observed_epoch: u64) -> bool {
        if !self.enabled {
            return false;
        }

        // The shard lock is held while comparing epochs, so an invalidation
        // either sees this entry and removes it or has already moved the epoch on.
        let entry = self.entries.entry(query.user_id);
        if self.epoch.load(Ordering::SeqCst) != observed_epoch {
            drop(entry);
            self.stale_discards.fetch_add(1, Ordering::Relaxed);
            debug!(user_id = %query.user_id, query = %query, "Discarding decision computed before invalidation");
            return false;
        }

        match entry {
            Entry::Occupied(mut occupied) => {
                occupied.get_mut().insert(query.decision_key(), allowed);
            }
            Entry::Vacant(vacant) => {
                vacant.insert(HashMap::from([(query.decision_key(), allowed)]));
            }
        }
        true
    }

    /// Drop every cached decision of one user
    pub fn invalidate_user(&self, user_id: UserId) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.entries.remove(&user_id);
        self.invalidations.fetch_add(1, Ordering::Relaxed);
        counter!("dotauth_cache_invalidations_total", 1);
        debug!(user_id = %user_id, "Invalidated cached decisions for user");
    }

    /// Drop every cached decision
    pub fn clear(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.entries.clear();
        self.invalidations.fetch_add(1, Ordering::Relaxed);
        counter!("dotauth_cache_invalidations_total", 1);
        debug!("Cleared all cached decisions");
    }

    /// Number of cached decisions across all users
    pub fn len(&self) -> usize {
        self.entries.iter().map(|decisions| decisions.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
            stale_discards: self.stale_discards.load(Ordering::Relaxed),
            cached_users: self.entries.len(),
            cached_decisions: self.len(),
        }
    }
}

impl Default for DecisionCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decision_cache() {
        let cache = DecisionCache::new();
        let query = AccessQuery::new(1, "invoice", "view");

        // Cache miss
        assert!(cache.get(&query).is_none());

        // Set and get
        assert!(cache.insert(&query, true, cache.epoch()));
        assert_eq!(cache.get(&query), Some(true));

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.cached_decisions, 1);
    }

    #[test]
    fn test_negative_decisions_are_cached() {
        let cache = DecisionCache::new();
        let query = AccessQuery::new(1, "invoice", "delete").on(42);

        cache.insert(&query, false, cache.epoch());
        assert_eq!(cache.get(&query), Some(false));
        assert!(cache.get(&AccessQuery::new(1, "invoice", "delete")).is_none());
    }

    #[test]
    fn test_keys_with_separators_do_not_collide() {
        let cache = DecisionCache::new();
        cache.insert(&AccessQuery::new(1, "invoice", "delete").on(42), true, cache.epoch());

        assert!(cache.get(&AccessQuery::new(1, "invoice", "delete:42")).is_none());
        assert!(cache.get(&AccessQuery::new(1, "invoice:delete", "42")).is_none());
        assert_eq!(cache.get(&AccessQuery::new(1, "invoice", "delete").on(42)), Some(true));
    }

    #[test]
    fn test_user_invalidation_is_scoped() {
        let cache = DecisionCache::new();
        let alice = AccessQuery::new(1, "invoice", "view");
        let bob = AccessQuery::new(2, "invoice", "view");

        cache.insert(&alice, true, cache.epoch());
        cache.insert(&bob, true, cache.epoch());

        cache.invalidate_user(1);

        assert!(cache.get(&alice).is_none());
        assert_eq!(cache.get(&bob), Some(true));
    }

    #[test]
    fn test_clear() {
        let cache = DecisionCache::new();
        cache.insert(&AccessQuery::new(1, "invoice", "view"), true, cache.epoch());
        cache.insert(&AccessQuery::new(2, "report", "view"), false, cache.epoch());

        cache.clear();

        assert!(cache.is_empty());
        assert_eq!(cache.stats().invalidations, 1);
    }

    #[test]
    fn test_stale_decision_is_discarded() {
        let cache = DecisionCache::new();
        let query = AccessQuery::new(1, "invoice", "view");

        let observed = cache.epoch();
        cache.clear();

        assert!(!cache.insert(&query, false, observed));
        assert!(cache.get(&query).is_none());
        assert_eq!(cache.stats().stale_discards, 1);
    }

    #[test]
    fn test_disabled_cache_stores_nothing() {
        let cache = DecisionCache::with_enabled(false);
        let query = AccessQuery::new(1, "invoice", "view");

        assert!(!cache.insert(&query, true, cache.epoch()));
        assert!(cache.get(&query).is_none());
        assert_eq!(cache.stats().misses, 0);
    }
}
