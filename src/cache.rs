// === Module Header (agents-tooling) START ===
// header: Parsed by scripts/check_module_headers.sh for purpose/role presence; keep keys on single-line entries.
// purpose: TTL-bounded memoization for the project directory and per-window fetch results
// role: state/cache
// inputs: Cache keys (sorted repo names + window), fetch closures, a TTL per cache
// outputs: Cached clones of previously fetched values while fresh
// invariants:
// - A hit younger than the TTL never invokes the fetch closure
// - A miss or stale entry invokes the closure exactly once and stores its result
// - Single dominant writer per key assumed; concurrent same-key writers may both fetch
// errors: Fetch closure errors propagate and leave the cache unchanged
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use anyhow::Result;

/// A single TTL-guarded value, used for the hourly project directory listing.
pub struct TtlCell<T> {
  slot: Mutex<Option<(Instant, T)>>,
  ttl: Duration,
}

impl<T: Clone> TtlCell<T> {
  pub fn new(ttl: Duration) -> Self {
    Self {
      slot: Mutex::new(None),
      ttl,
    }
  }

  /// Return the cached value while fresh, otherwise refresh via `init`.
  pub fn get_or_init(&self, init: impl FnOnce() -> Result<T>) -> Result<T> {
    {
      let guard = self.slot.lock().unwrap_or_else(|e| e.into_inner());
      if let Some((created, value)) = guard.as_ref() {
        if created.elapsed() < self.ttl {
          return Ok(value.clone());
        }
      }
    }

    // Lock released while fetching; remote listing calls are slow.
    let value = init()?;
    let mut guard = self.slot.lock().unwrap_or_else(|e| e.into_inner());
    *guard = Some((Instant::now(), value.clone()));

    Ok(value)
  }
}

/// Keyed TTL cache for fetch results.
pub struct TtlCache<K, V> {
  entries: Mutex<HashMap<K, (Instant, V)>>,
  ttl: Duration,
}

impl<K: Eq + Hash + Clone, V: Clone> TtlCache<K, V> {
  pub fn new(ttl: Duration) -> Self {
    Self {
      entries: Mutex::new(HashMap::new()),
      ttl,
    }
  }

  /// Return the cached value for `key` while fresh, otherwise invoke
  /// `fetch_fn`, store its result, and return it.
  pub fn get_or_fetch(&self, key: K, fetch_fn: impl FnOnce() -> Result<V>) -> Result<V> {
    {
      let guard = self.entries.lock().unwrap_or_else(|e| e.into_inner());
      if let Some((created, value)) = guard.get(&key) {
        if created.elapsed() < self.ttl {
          return Ok(value.clone());
        }
      }
    }

    let value = fetch_fn()?;
    let mut guard = self.entries.lock().unwrap_or_else(|e| e.into_inner());
    guard.insert(key, (Instant::now(), value.clone()));

    Ok(value)
  }
}

/// Key for memoized merge-request fetches: sorted repository names plus the
/// rendered window bounds.
pub type FetchKey = (Vec<String>, String, String);

pub fn fetch_key(names: &[String], start_iso: String, end_iso: String) -> FetchKey {
  let mut sorted: Vec<String> = names.to_vec();
  sorted.sort();
  (sorted, start_iso, end_iso)
}
