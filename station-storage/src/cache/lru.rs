//! Bounded LRU cache of logbook snapshots with per-entry TTL.
//!
//! Entries live in a slab (`Vec<Node>` plus a free list) and are threaded
//! onto a doubly-linked recency list by index, most recent at the head. A
//! `HashMap` maps logbook ids to slab slots, so lookup, promotion, insertion
//! and eviction are all O(1). All state sits behind one mutex and no method
//! holds it longer than a single operation.
//!
//! Expiry is lazy: a stale entry is only removed when a read finds it.
//! The cache is never authoritative; a miss means "ask storage".

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use station_core::{Logbook, LogbookId};

use super::read_through::CacheConfig;
use super::traits::CacheStats;

const NIL: usize = usize::MAX;

#[derive(Debug)]
struct Node {
    key: LogbookId,
    value: Logbook,
    /// `None` when the TTL overflowed `Instant`.
    expires_at: Option<Instant>,
    prev: usize,
    next: usize,
}

impl Node {
    fn is_expired(&self, now: Instant) -> bool {
        matches!(self.expires_at, Some(at) if now >= at)
    }
}

#[derive(Debug)]
struct Inner {
    map: HashMap<LogbookId, usize>,
    nodes: Vec<Node>,
    free: Vec<usize>,
    head: usize,
    tail: usize,
    hits: u64,
    misses: u64,
    evictions: u64,
    expirations: u64,
}

impl Inner {
    fn new(capacity: usize) -> Self {
        Self {
            map: HashMap::with_capacity(capacity),
            nodes: Vec::with_capacity(capacity),
            free: Vec::new(),
            head: NIL,
            tail: NIL,
            hits: 0,
            misses: 0,
            evictions: 0,
            expirations: 0,
        }
    }

    fn unlink(&mut self, idx: usize) {
        let (prev, next) = (self.nodes[idx].prev, self.nodes[idx].next);
        if prev == NIL {
            self.head = next;
        } else {
            self.nodes[prev].next = next;
        }
        if next == NIL {
            self.tail = prev;
        } else {
            self.nodes[next].prev = prev;
        }
        self.nodes[idx].prev = NIL;
        self.nodes[idx].next = NIL;
    }

    fn push_front(&mut self, idx: usize) {
        self.nodes[idx].prev = NIL;
        self.nodes[idx].next = self.head;
        if self.head != NIL {
            self.nodes[self.head].prev = idx;
        }
        self.head = idx;
        if self.tail == NIL {
            self.tail = idx;
        }
    }

    fn promote(&mut self, idx: usize) {
        if self.head != idx {
            self.unlink(idx);
            self.push_front(idx);
        }
    }

    /// Unlink a slot, drop its map entry and return it to the free list.
    fn remove_slot(&mut self, idx: usize) {
        self.unlink(idx);
        let key = self.nodes[idx].key;
        self.map.remove(&key);
        self.nodes[idx].value = Logbook::default();
        self.nodes[idx].key = 0;
        self.nodes[idx].expires_at = None;
        self.free.push(idx);
    }

    fn allocate(&mut self, key: LogbookId, value: Logbook, expires_at: Option<Instant>) -> usize {
        let node = Node {
            key,
            value,
            expires_at,
            prev: NIL,
            next: NIL,
        };
        match self.free.pop() {
            Some(idx) => {
                self.nodes[idx] = node;
                idx
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        }
    }
}

/// Concurrent LRU cache keyed by logbook id.
#[derive(Debug)]
pub struct LogbookCache {
    inner: Mutex<Inner>,
    capacity: usize,
    default_ttl: Duration,
    enabled: bool,
}

impl LogbookCache {
    /// Build a cache from config. A capacity of 0 is raised to 1.
    pub fn new(config: &CacheConfig) -> Self {
        if !config.enabled {
            return Self::disabled();
        }
        Self::with_capacity(config.max_entries, config.entry_ttl)
    }

    pub fn with_capacity(capacity: usize, default_ttl: Duration) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Mutex::new(Inner::new(capacity)),
            capacity,
            default_ttl,
            enabled: true,
        }
    }

    /// A cache that stores nothing. Every `get` misses.
    pub fn disabled() -> Self {
        Self {
            inner: Mutex::new(Inner::new(0)),
            capacity: 0,
            default_ttl: Duration::ZERO,
            enabled: false,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // No critical section panics halfway through relinking.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Resolve a caller TTL: zero means the default, negative means the
    /// entry is born expired.
    fn expiry(&self, now: Instant, ttl: chrono::Duration) -> Option<Instant> {
        if ttl < chrono::Duration::zero() {
            return Some(now);
        }
        let ttl = if ttl.is_zero() {
            self.default_ttl
        } else {
            ttl.to_std().unwrap_or(Duration::MAX)
        };
        now.checked_add(ttl)
    }

    /// Look up a logbook. A fresh hit is promoted to most recently used;
    /// an expired entry is removed and reported as a miss.
    pub fn get(&self, id: LogbookId) -> Option<Logbook> {
        let mut inner = self.lock();
        if !self.enabled {
            inner.misses += 1;
            return None;
        }

        let idx = match inner.map.get(&id).copied() {
            Some(idx) => idx,
            None => {
                inner.misses += 1;
                return None;
            }
        };

        if inner.nodes[idx].is_expired(Instant::now()) {
            inner.remove_slot(idx);
            inner.misses += 1;
            inner.expirations += 1;
            return None;
        }

        inner.promote(idx);
        inner.hits += 1;
        Some(inner.nodes[idx].value.clone())
    }

    /// Insert or refresh an entry. Evicts the least recently used entry
    /// when a new key arrives at capacity.
    pub fn set(&self, id: LogbookId, logbook: Logbook, ttl: chrono::Duration) {
        if !self.enabled {
            return;
        }
        let now = Instant::now();
        let expires_at = self.expiry(now, ttl);

        let mut inner = self.lock();
        if let Some(idx) = inner.map.get(&id).copied() {
            inner.nodes[idx].value = logbook;
            inner.nodes[idx].expires_at = expires_at;
            inner.promote(idx);
            return;
        }

        if inner.map.len() >= self.capacity {
            let tail = inner.tail;
            if tail != NIL {
                inner.remove_slot(tail);
                inner.evictions += 1;
            }
        }

        let idx = inner.allocate(id, logbook, expires_at);
        inner.push_front(idx);
        inner.map.insert(id, idx);
    }

    /// Drop an entry. Absent keys are ignored.
    pub fn invalidate(&self, id: LogbookId) {
        if !self.enabled {
            return;
        }
        let mut inner = self.lock();
        if let Some(idx) = inner.map.get(&id).copied() {
            inner.remove_slot(idx);
        }
    }

    /// Whether a live entry exists. Does not promote or count.
    pub fn contains(&self, id: LogbookId) -> bool {
        let inner = self.lock();
        match inner.map.get(&id) {
            Some(&idx) => !inner.nodes[idx].is_expired(Instant::now()),
            None => false,
        }
    }

    /// Entries currently held, expired ones not yet collected included.
    pub fn len(&self) -> usize {
        self.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut inner = self.lock();
        let mut fresh = Inner::new(self.capacity);
        fresh.hits = inner.hits;
        fresh.misses = inner.misses;
        fresh.evictions = inner.evictions;
        fresh.expirations = inner.expirations;
        *inner = fresh;
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();
        CacheStats {
            hits: inner.hits,
            misses: inner.misses,
            entry_count: inner.map.len() as u64,
            evictions: inner.evictions,
            expirations: inner.expirations,
        }
    }

    /// Walk the recency list and check it against the map and the slab.
    pub fn is_consistent(&self) -> bool {
        let inner = self.lock();

        if inner.map.len() > self.capacity.max(1) {
            return false;
        }
        if inner.map.len() + inner.free.len() != inner.nodes.len() {
            return false;
        }

        let mut seen = 0usize;
        let mut prev = NIL;
        let mut cursor = inner.head;
        while cursor != NIL {
            if seen > inner.nodes.len() {
                return false;
            }
            let node = &inner.nodes[cursor];
            if node.prev != prev {
                return false;
            }
            if inner.map.get(&node.key) != Some(&cursor) {
                return false;
            }
            seen += 1;
            prev = cursor;
            cursor = node.next;
        }

        prev == inner.tail && seen == inner.map.len()
    }
}
