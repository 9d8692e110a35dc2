//! Strategy-driven prefetching of same-origin links.
//!
//! The host forwards pointer-over and viewport-intersection events for
//! candidate links; the manager decides eligibility, reserves the URL in a
//! dedup set *before* the request starts (so rapid repeated events cannot
//! spawn duplicate fetches), and spawns a fire-and-forget GET on the
//! embedder's runtime handle. Successful bodies land in a URL-keyed cache;
//! failures evict the reservation so a later trigger can retry, and never
//! propagate. Concurrency is bounded by a semaphore.

use crate::config::PreloadStrategy;
use crate::fetch::Fetcher;
use crate::host::{BrowserCapabilities, LinkCandidate};
use bytes::Bytes;
use log::{debug, trace};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use url::Url;

/// Root margin the host should use when observing link visibility.
pub const VISIBLE_ROOT_MARGIN_PX: u32 = 50;
/// Intersection ratio at which a link counts as visible.
pub const VISIBLE_THRESHOLD: f64 = 0.1;
/// Upper bound on simultaneous in-flight preload requests.
pub const MAX_CONCURRENT_PRELOADS: usize = 4;

/// Read-only counters for status snapshots.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct PreloadStats {
    pub strategy: PreloadStrategy,
    pub reserved_urls: usize,
    pub cached_responses: usize,
}

struct PreloadShared {
    /// URLs reserved or already fetched; the dedup set.
    reserved: Mutex<HashSet<String>>,
    /// Successful responses keyed by URL. No eviction beyond explicit clear.
    cache: Mutex<HashMap<String, Bytes>>,
    limiter: Semaphore,
    debug: bool,
}

fn locked<Inner>(mutex: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Prefetches eligible links according to the configured strategy.
pub struct PreloadManager {
    strategy: PreloadStrategy,
    shared: Arc<PreloadShared>,
    fetcher: Arc<dyn Fetcher>,
    handle: Handle,
}

impl PreloadManager {
    /// Build a manager; `Visible` degrades to `Hover` when the host cannot
    /// observe viewport intersection.
    #[must_use]
    pub fn new(
        strategy: PreloadStrategy,
        capabilities: BrowserCapabilities,
        fetcher: Arc<dyn Fetcher>,
        handle: Handle,
        debug: bool,
    ) -> Self {
        Self {
            strategy: effective_strategy(strategy, capabilities),
            shared: Arc::new(PreloadShared {
                reserved: Mutex::new(HashSet::new()),
                cache: Mutex::new(HashMap::new()),
                limiter: Semaphore::new(MAX_CONCURRENT_PRELOADS),
                debug,
            }),
            fetcher,
            handle,
        }
    }

    /// Strategy actually in effect after capability fallback.
    #[must_use]
    pub const fn strategy(&self) -> PreloadStrategy {
        self.strategy
    }

    /// Swap the trigger strategy in place. The dedup set and cache survive;
    /// only the event source changes (the host re-wires its listener or
    /// observer to match the returned effective strategy).
    pub fn set_strategy(
        &mut self,
        strategy: PreloadStrategy,
        capabilities: BrowserCapabilities,
    ) -> PreloadStrategy {
        self.strategy = effective_strategy(strategy, capabilities);
        self.strategy
    }

    /// Pointer moved over a candidate link. Only acts under `Hover`.
    pub fn on_pointer_over(&self, candidate: &LinkCandidate, current: &Url) {
        if self.strategy == PreloadStrategy::Hover {
            self.trigger(candidate, current);
        }
    }

    /// A candidate link became visible. Only acts under `Visible`.
    pub fn on_link_visible(&self, candidate: &LinkCandidate, current: &Url) {
        if self.strategy == PreloadStrategy::Visible {
            self.trigger(candidate, current);
        }
    }

    /// Reserve and fetch one eligible candidate.
    fn trigger(&self, candidate: &LinkCandidate, current: &Url) {
        let Some(target) = eligible_url(candidate, current) else {
            return;
        };
        let key = target.to_string();
        {
            // Reservation happens before the request starts; a concurrent
            // trigger for the same URL sees the entry and bails here.
            let mut reserved = locked(&self.shared.reserved);
            if !reserved.insert(key.clone()) {
                return;
            }
        }
        trace!("preloading {key}");
        let shared = Arc::clone(&self.shared);
        let fetcher = Arc::clone(&self.fetcher);
        // Fire-and-forget; dropping the handle detaches the task.
        let _task = self.handle.spawn(async move {
            let Ok(_permit) = shared.limiter.acquire().await else {
                // Semaphore closed; the manager is gone.
                locked(&shared.reserved).remove(&key);
                return;
            };
            match fetcher.fetch(target).await {
                Ok(body) => {
                    locked(&shared.cache).insert(key, body);
                }
                Err(err) => {
                    // Evict so a later trigger may retry. Never propagates.
                    locked(&shared.reserved).remove(&key);
                    if shared.debug {
                        debug!("preload failed for {key}: {err}");
                    } else {
                        trace!("preload failed for {key}: {err}");
                    }
                }
            }
        });
    }

    /// Whether the URL has been reserved (fetch in flight or completed).
    #[must_use]
    pub fn is_reserved(&self, url: &str) -> bool {
        locked(&self.shared.reserved).contains(url)
    }

    /// Cached response body for a URL, if the preload completed.
    #[must_use]
    pub fn cached(&self, url: &str) -> Option<Bytes> {
        locked(&self.shared.cache).get(url).cloned()
    }

    #[must_use]
    pub fn stats(&self) -> PreloadStats {
        PreloadStats {
            strategy: self.strategy,
            reserved_urls: locked(&self.shared.reserved).len(),
            cached_responses: locked(&self.shared.cache).len(),
        }
    }

    /// Drop the cache and all reservations; every URL becomes eligible again.
    pub fn clear_cache(&self) {
        locked(&self.shared.cache).clear();
        locked(&self.shared.reserved).clear();
    }
}

const fn effective_strategy(
    strategy: PreloadStrategy,
    capabilities: BrowserCapabilities,
) -> PreloadStrategy {
    match strategy {
        PreloadStrategy::Visible if !capabilities.intersection_observer => PreloadStrategy::Hover,
        other => other,
    }
}

/// The eligibility predicate: same origin, not opted out, not a
/// fragment-only anchor, not the current page. Returns the resolved URL
/// (fragment stripped) when the candidate qualifies.
fn eligible_url(candidate: &LinkCandidate, current: &Url) -> Option<Url> {
    if candidate.opted_out || candidate.href.starts_with('#') {
        return None;
    }
    let mut target = current.join(&candidate.href).ok()?;
    target.set_fragment(None);
    if target.origin() != current.origin() {
        return None;
    }
    let mut here = current.clone();
    here.set_fragment(None);
    if target == here {
        return None;
    }
    Some(target)
}
