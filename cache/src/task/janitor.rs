use std::fmt;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

#[derive(Default)]
struct StopSignal {
  stopped: Mutex<bool>,
  wake: Condvar,
}

/// A background thread that runs a task at a fixed interval until stopped.
///
/// Stopping is deterministic: [`Janitor::stop`] wakes the thread, waits for
/// any in-progress tick to finish and joins it. Dropping a janitor stops it
/// the same way.
pub struct Janitor {
  name: String,
  interval: Duration,
  signal: Arc<StopSignal>,
  handle: Option<JoinHandle<()>>,
}

impl Janitor {
  /// Spawns a janitor thread running `tick` every `interval`.
  ///
  /// The first tick happens one full interval after spawning.
  pub fn spawn<F>(name: impl Into<String>, interval: Duration, mut tick: F) -> Self
  where
    F: FnMut() + Send + 'static,
  {
    let name = name.into();
    let signal = Arc::new(StopSignal::default());
    let thread_signal = signal.clone();
    let thread_name = name.clone();

    let handle = thread::spawn(move || {
      tracing::debug!(janitor = %thread_name, ?interval, "janitor started");
      loop {
        {
          let mut stopped = thread_signal.stopped.lock();
          if !*stopped {
            thread_signal.wake.wait_for(&mut stopped, interval);
          }
          if *stopped {
            break;
          }
        }
        tick();
      }
      tracing::debug!(janitor = %thread_name, "janitor stopped");
    });

    Self {
      name,
      interval,
      signal,
      handle: Some(handle),
    }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn interval(&self) -> Duration {
    self.interval
  }

  /// Returns `true` until the janitor has been stopped.
  pub fn is_running(&self) -> bool {
    self.handle.as_ref().map_or(false, |handle| !handle.is_finished())
  }

  /// Signals the thread to stop and waits for it to exit.
  pub fn stop(mut self) {
    self.shutdown();
  }

  fn shutdown(&mut self) {
    {
      let mut stopped = self.signal.stopped.lock();
      *stopped = true;
    }
    self.signal.wake.notify_all();

    if let Some(handle) = self.handle.take() {
      if handle.thread().id() == thread::current().id() {
        // Dropped from inside its own tick; the loop exits on its own.
        return;
      }
      if handle.join().is_err() {
        tracing::warn!(janitor = %self.name, "janitor thread panicked");
      }
    }
  }
}

impl Drop for Janitor {
  fn drop(&mut self) {
    self.shutdown();
  }
}

impl fmt::Debug for Janitor {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Janitor")
      .field("name", &self.name)
      .field("interval", &self.interval)
      .field("running", &self.is_running())
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::time::Instant;

  #[test]
  fn ticks_until_stopped() {
    let ticks = Arc::new(AtomicUsize::new(0));
    let janitor = Janitor::spawn("test", Duration::from_millis(5), {
      let ticks = ticks.clone();
      move || {
        ticks.fetch_add(1, Ordering::SeqCst);
      }
    });

    thread::sleep(Duration::from_millis(60));
    assert!(janitor.is_running());
    janitor.stop();

    let after_stop = ticks.load(Ordering::SeqCst);
    assert!(after_stop > 0, "janitor should have ticked");
    thread::sleep(Duration::from_millis(30));
    assert_eq!(ticks.load(Ordering::SeqCst), after_stop, "no ticks after stop");
  }

  #[test]
  fn reports_its_name_and_interval() {
    let janitor = Janitor::spawn("scores-janitor", Duration::from_millis(250), || {});
    assert_eq!(janitor.name(), "scores-janitor");
    assert_eq!(janitor.interval(), Duration::from_millis(250));
    janitor.stop();
  }

  #[test]
  fn stop_does_not_wait_for_the_interval() {
    let janitor = Janitor::spawn("slow", Duration::from_secs(60), || {});
    let started = Instant::now();
    janitor.stop();
    assert!(started.elapsed() < Duration::from_secs(5));
  }

  #[test]
  fn drop_releases_the_task() {
    let owned = Arc::new(());
    let janitor = Janitor::spawn("drop", Duration::from_millis(5), {
      let owned = owned.clone();
      move || {
        assert!(Arc::strong_count(&owned) >= 1);
      }
    });
    assert_eq!(Arc::strong_count(&owned), 2);
    drop(janitor);
    assert_eq!(Arc::strong_count(&owned), 1, "task closure is dropped once joined");
  }
}
