//! Exact sliding-window log counter.
//!
//! Every admitted request leaves a timestamp in its client's window. A request is
//! admitted only if fewer than `max_requests` timestamps remain after dropping the
//! ones older than `now - window_seconds`. The boundary moves continuously with
//! `now`; there are no fixed buckets.
//!
//! # Concurrency
//!
//! The key space is split across a power-of-two number of shards, each guarded by
//! its own mutex. The purge, check and record steps for a key run under a single
//! shard lock, so concurrent callers for the same key can never over-admit, while
//! keys living in different shards never contend.
//!
//! # Memory
//!
//! Each shard holds at most `ceil(max_clients / shards)` windows. When a new client
//! arrives at a full shard, windows whose entries have all expired are dropped
//! first, then the least recently seen clients are evicted until a tenth of the
//! shard is free. The scan cost is spread over the clients that fill that space.

use std::collections::VecDeque;
use std::num::{NonZeroU32, NonZeroU64};
use std::sync::{Mutex, MutexGuard};

use ahash::{AHashMap, RandomState};
use tracing::{debug, warn};

use crate::error::{GateError, Result};
use crate::security::client_id::ClientKey;

const DEFAULT_SHARDS: usize = 16;
const DEFAULT_MAX_CLIENTS: usize = 100_000;
// A sweep frees 1/10 of a full shard
const EVICTION_BATCH_DIVISOR: usize = 10;

/// Immutable (limit, window) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    max_requests: NonZeroU32,
    window_seconds: NonZeroU64,
}

impl RateLimitPolicy {
    /// Both values must be positive.
    pub fn new(max_requests: u32, window_seconds: u64) -> Result<Self> {
        let max_requests = NonZeroU32::new(max_requests)
            .ok_or_else(|| GateError::Config("max_requests must be > 0".into()))?;
        let window_seconds = NonZeroU64::new(window_seconds)
            .ok_or_else(|| GateError::Config("window_seconds must be > 0".into()))?;
        Ok(Self { max_requests, window_seconds })
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests.get()
    }

    pub fn window_seconds(&self) -> u64 {
        self.window_seconds.get()
    }

    /// Oldest timestamp still counted at `now`
    fn window_start(&self, now: u64) -> u64 {
        now.saturating_sub(self.window_seconds())
    }
}

/// Timestamps recorded for one client, oldest first.
#[derive(Debug, Default)]
struct ClientWindow {
    stamps: VecDeque<u64>,
    last_seen: u64,
}

impl ClientWindow {
    fn purge(&mut self, window_start: u64) {
        // retain rather than pop_front: callers read the clock outside the lock,
        // so stamps from racing threads may land slightly out of order
        self.stamps.retain(|&t| t >= window_start);
    }

    fn live_count(&self, window_start: u64) -> usize {
        self.stamps.iter().filter(|&&t| t >= window_start).count()
    }

    fn is_expired(&self, window_start: u64) -> bool {
        self.stamps.iter().all(|&t| t < window_start)
    }
}

#[derive(Debug, Default)]
struct Shard {
    windows: AHashMap<ClientKey, ClientWindow>,
    // Full-table scans performed by `make_room`
    sweeps: u64,
}

impl Shard {
    /// Ensure there is space for one more client.
    ///
    /// A sweep drops expired windows, then evicts the least recently seen clients
    /// until a batch of slots is free, so scans happen at most once per batch of
    /// new clients.
    fn make_room(&mut self, capacity: usize, window_start: u64) {
        if self.windows.len() < capacity {
            return;
        }
        self.sweeps = self.sweeps.saturating_add(1);

        let before = self.windows.len();
        self.windows
            .retain(|_, window| !window.is_expired(window_start));
        let expired = before.saturating_sub(self.windows.len());

        let batch = (capacity / EVICTION_BATCH_DIVISOR).max(1);
        let target = capacity.saturating_sub(batch);
        let excess = self.windows.len().saturating_sub(target);
        if excess > 0 {
            let mut by_age: Vec<(u64, ClientKey)> = self
                .windows
                .iter()
                .map(|(key, window)| (window.last_seen, *key))
                .collect();
            by_age.select_nth_unstable(excess - 1);
            for (_, key) in &by_age[..excess] {
                self.windows.remove(key);
            }
        }
        debug!(sweeps = self.sweeps, expired, evicted = excess, "made room in full shard");
    }
}

/// Outcome of a single admission attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    /// Whether the request was admitted and recorded
    pub admitted: bool,
    /// Entries in the window after the attempt
    pub count: usize,
}

/// Concurrent per-client sliding-window counter.
pub struct SlidingWindowCounter {
    policy: RateLimitPolicy,
    shards: Box<[Mutex<Shard>]>,
    shard_mask: usize,
    shard_capacity: usize,
    hasher: RandomState,
}

impl SlidingWindowCounter {
    /// Counter with the default shard count and client bound.
    pub fn new(policy: RateLimitPolicy) -> Self {
        Self::with_capacity(policy, DEFAULT_MAX_CLIENTS, DEFAULT_SHARDS)
    }

    /// Counter tracking at most roughly `max_clients` clients across `shards` locks.
    ///
    /// `shards` is rounded up to the next power of two.
    pub fn with_capacity(policy: RateLimitPolicy, max_clients: usize, shards: usize) -> Self {
        let shard_count = shards.max(1).next_power_of_two();
        let shard_capacity = max_clients.max(1).div_ceil(shard_count).max(1);
        Self {
            policy,
            shards: (0..shard_count)
                .map(|_| Mutex::new(Shard::default()))
                .collect::<Vec<_>>()
                .into_boxed_slice(),
            shard_mask: shard_count.saturating_sub(1),
            shard_capacity,
            hasher: RandomState::new(),
        }
    }

    pub fn policy(&self) -> RateLimitPolicy {
        self.policy
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Purge, check and record in one step. Returns true if the request was admitted.
    pub fn try_admit(&self, key: &ClientKey, now: u64) -> bool {
        self.admit(key, now).admitted
    }

    /// Like [`try_admit`](Self::try_admit) but also reports the window size.
    pub fn admit(&self, key: &ClientKey, now: u64) -> Admission {
        let window_start = self.policy.window_start(now);
        let max = self.policy.max_requests() as usize;

        let mut shard = self.lock_shard(key);
        if !shard.windows.contains_key(key) {
            shard.make_room(self.shard_capacity, window_start);
        }

        let window = shard.windows.entry(*key).or_default();
        window.purge(window_start);
        window.last_seen = window.last_seen.max(now);

        if window.stamps.len() >= max {
            return Admission { admitted: false, count: window.stamps.len() };
        }

        window.stamps.push_back(now);
        Admission { admitted: true, count: window.stamps.len() }
    }

    /// Entries for `key` still inside the window at `now`, without recording anything.
    pub fn count(&self, key: &ClientKey, now: u64) -> usize {
        let window_start = self.policy.window_start(now);
        self.lock_shard(key)
            .windows
            .get(key)
            .map(|w| w.live_count(window_start))
            .unwrap_or(0)
    }

    /// Number of clients currently holding a window.
    pub fn tracked_clients(&self) -> usize {
        (0..self.shards.len())
            .map(|idx| self.lock_index(idx).windows.len())
            .sum()
    }

    /// Drop every window whose entries have all expired at `now`. Returns how many were dropped.
    pub fn purge_expired(&self, now: u64) -> usize {
        let window_start = self.policy.window_start(now);
        (0..self.shards.len())
            .map(|idx| {
                let mut shard = self.lock_index(idx);
                let before = shard.windows.len();
                shard
                    .windows
                    .retain(|_, window| !window.is_expired(window_start));
                before.saturating_sub(shard.windows.len())
            })
            .sum()
    }

    fn lock_shard(&self, key: &ClientKey) -> MutexGuard<'_, Shard> {
        let idx = (self.hasher.hash_one(key) as usize) & self.shard_mask;
        self.lock_index(idx)
    }

    fn lock_index(&self, idx: usize) -> MutexGuard<'_, Shard> {
        self.shards[idx].lock().unwrap_or_else(|poisoned| {
            warn!(shard = idx, "rate limit shard lock poisoned, recovering");
            poisoned.into_inner()
        })
    }
}
