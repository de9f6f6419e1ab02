//! Collapses concurrent loads of the same key into a single execution.

use shoal_cache::Janitor;

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, Thread};
use std::time::{Duration, Instant};

use ahash::HashMap;
use parking_lot::Mutex;

enum CallState<V, E> {
  Running,
  Done(Result<V, E>),
  /// The loader panicked; waiters start over.
  Abandoned,
}

struct CallInner<V, E> {
  state: CallState<V, E>,
  waiters: VecDeque<Thread>,
}

/// One in-flight load. Waiters park until the leader completes it.
struct Call<V, E> {
  inner: Mutex<CallInner<V, E>>,
}

impl<V: Clone, E: Clone> Call<V, E> {
  fn new() -> Self {
    Self {
      inner: Mutex::new(CallInner {
        state: CallState::Running,
        waiters: VecDeque::new(),
      }),
    }
  }

  fn finish(&self, state: CallState<V, E>) {
    let mut inner = self.inner.lock();
    inner.state = state;
    for waiter in inner.waiters.drain(..) {
      waiter.unpark();
    }
  }

  /// Blocks until the call finishes. `None` if it was abandoned.
  fn wait(&self) -> Option<Result<V, E>> {
    loop {
      {
        let mut inner = self.inner.lock();
        match &inner.state {
          CallState::Done(result) => return Some(result.clone()),
          CallState::Abandoned => return None,
          CallState::Running => inner.waiters.push_back(thread::current()),
        }
      }
      thread::park();
    }
  }
}

struct Cached<V> {
  value: V,
  expires_at: Instant,
}

struct Inner<V, E> {
  calls: Mutex<HashMap<String, Arc<Call<V, E>>>>,
  results: Mutex<HashMap<String, Cached<V>>>,
  ttl: Option<Duration>,
  executions: AtomicU64,
  suppressed: AtomicU64,
}

impl<V, E> Inner<V, E> {
  fn sweep(&self) -> usize {
    let now = Instant::now();
    let mut results = self.results.lock();
    let before = results.len();
    results.retain(|_, cached| cached.expires_at > now);
    before - results.len()
  }
}

/// Completes the call as abandoned if the leader unwinds before finishing.
struct LeaderGuard<'a, V: Clone, E: Clone> {
  inner: &'a Inner<V, E>,
  key: &'a str,
  call: Arc<Call<V, E>>,
  armed: bool,
}

impl<V: Clone, E: Clone> Drop for LeaderGuard<'_, V, E> {
  fn drop(&mut self) {
    if self.armed {
      self.inner.calls.lock().remove(self.key);
      self.call.finish(CallState::Abandoned);
    }
  }
}

/// Ensures at most one loader per key runs at a time.
///
/// Callers arriving while a load is in flight block until it finishes and
/// receive its result, success or error. With a result TTL, successful
/// results are also served to later callers until they expire; a janitor
/// sweeps expired results every TTL.
pub struct SingleFlight<V, E> {
  inner: Arc<Inner<V, E>>,
  sweeper: Mutex<Option<Janitor>>,
}

impl<V, E> SingleFlight<V, E>
where
  V: Clone + Send + 'static,
  E: Clone + Send + 'static,
{
  /// Creates a group. `ttl` of `None` or zero disables result caching.
  pub fn new(ttl: Option<Duration>) -> Self {
    let ttl = ttl.filter(|ttl| !ttl.is_zero());
    let inner = Arc::new(Inner {
      calls: Mutex::new(HashMap::default()),
      results: Mutex::new(HashMap::default()),
      ttl,
      executions: AtomicU64::new(0),
      suppressed: AtomicU64::new(0),
    });

    let sweeper = ttl.map(|ttl| {
      let inner = inner.clone();
      Janitor::spawn("singleflight-sweeper", ttl, move || {
        let removed = inner.sweep();
        if removed > 0 {
          tracing::trace!(removed, "expired singleflight results swept");
        }
      })
    });

    Self {
      inner,
      sweeper: Mutex::new(sweeper),
    }
  }

  /// Runs `loader` for `key` unless a load is already in flight or a cached
  /// result is still fresh.
  ///
  /// The loader runs on the calling thread. Only successful results are
  /// cached.
  pub fn call<F>(&self, key: &str, loader: F) -> Result<V, E>
  where
    F: FnOnce() -> Result<V, E>,
  {
    let call = loop {
      let running = {
        let mut calls = self.inner.calls.lock();
        if let Some(value) = self.fresh_result(key) {
          self.inner.suppressed.fetch_add(1, Ordering::Relaxed);
          return Ok(value);
        }
        match calls.get(key) {
          Some(call) => call.clone(),
          None => {
            let call = Arc::new(Call::new());
            calls.insert(key.to_owned(), call.clone());
            break call;
          }
        }
      };

      if let Some(result) = running.wait() {
        self.inner.suppressed.fetch_add(1, Ordering::Relaxed);
        return result;
      }
      tracing::debug!(key, "in-flight load abandoned; retrying");
    };

    self.lead(key, call, loader)
  }

  fn lead<F>(&self, key: &str, call: Arc<Call<V, E>>, loader: F) -> Result<V, E>
  where
    F: FnOnce() -> Result<V, E>,
  {
    let mut guard = LeaderGuard {
      inner: &self.inner,
      key,
      call: call.clone(),
      armed: true,
    };

    self.inner.executions.fetch_add(1, Ordering::Relaxed);
    let result = loader();
    guard.armed = false;

    if let (Ok(value), Some(ttl)) = (&result, self.inner.ttl) {
      self.inner.results.lock().insert(
        key.to_owned(),
        Cached {
          value: value.clone(),
          expires_at: Instant::now() + ttl,
        },
      );
    }
    call.finish(CallState::Done(result.clone()));
    self.inner.calls.lock().remove(key);
    result
  }

  fn fresh_result(&self, key: &str) -> Option<V> {
    let mut results = self.inner.results.lock();
    match results.get(key) {
      Some(cached) if cached.expires_at > Instant::now() => Some(cached.value.clone()),
      Some(_) => {
        results.remove(key);
        None
      }
      None => None,
    }
  }

  /// Drops any cached result for `key`.
  pub fn forget(&self, key: &str) -> bool {
    self.inner.results.lock().remove(key).is_some()
  }

  /// Removes expired cached results now. Returns how many were removed.
  pub fn sweep(&self) -> usize {
    self.inner.sweep()
  }

  pub fn ttl(&self) -> Option<Duration> {
    self.inner.ttl
  }

  /// Number of loads currently running.
  pub fn in_flight(&self) -> usize {
    self.inner.calls.lock().len()
  }

  /// Number of cached results, including expired ones not yet swept.
  pub fn cached(&self) -> usize {
    self.inner.results.lock().len()
  }

  /// How many times a loader actually ran.
  pub fn executions(&self) -> u64 {
    self.inner.executions.load(Ordering::Relaxed)
  }

  /// How many calls were answered without running their loader.
  pub fn suppressed(&self) -> u64 {
    self.inner.suppressed.load(Ordering::Relaxed)
  }

  /// Stops the result sweeper. Cached results then expire lazily.
  pub fn stop(&self) -> bool {
    match self.sweeper.lock().take() {
      Some(janitor) => {
        janitor.stop();
        true
      }
      None => false,
    }
  }

  pub fn sweeper_running(&self) -> bool {
    self
      .sweeper
      .lock()
      .as_ref()
      .map_or(false, |janitor| janitor.is_running())
  }
}

impl<V, E> fmt::Debug for SingleFlight<V, E> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("SingleFlight")
      .field("ttl", &self.inner.ttl)
      .field("in_flight", &self.inner.calls.lock().len())
      .field("cached", &self.inner.results.lock().len())
      .finish()
  }
}
