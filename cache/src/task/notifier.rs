use crate::listener::{EvictionListener, EvictionReason};
use crate::metrics::Metrics;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// A message sent to the notifier thread.
pub(crate) type Notification<V> = (String, V, EvictionReason);

/// Capacity of the notification channel. When the listener falls this far
/// behind, further notifications are dropped and counted.
const NOTIFICATION_CHANNEL_CAPACITY: usize = 1024;

/// The background thread responsible for calling a user-provided eviction
/// listener outside of any cache lock.
pub(crate) struct Notifier<V> {
  _handle: JoinHandle<()>,
  sender: Option<flume::Sender<Notification<V>>>,
}

impl<V: Send + 'static> Notifier<V> {
  /// Spawns a notifier thread and returns it with a sender for notifications.
  pub(crate) fn spawn(listener: Arc<dyn EvictionListener<V>>) -> (Self, flume::Sender<Notification<V>>) {
    let (tx, rx) = flume::bounded::<Notification<V>>(NOTIFICATION_CHANNEL_CAPACITY);

    // The loop ends once every sender, including the one held by the cache's
    // strategies, has been dropped.
    let handle = thread::spawn(move || {
      while let Ok((key, value, reason)) = rx.recv() {
        listener.on_evict(key, value, reason);
      }
    });

    let notifier = Self {
      _handle: handle,
      sender: Some(tx.clone()),
    };
    (notifier, tx)
  }
}

impl<V> Drop for Notifier<V> {
  fn drop(&mut self) {
    self.sender.take();
  }
}

/// Forwards a notification without blocking the caller.
pub(crate) fn forward<V>(sender: &flume::Sender<Notification<V>>, metrics: &Metrics, notification: Notification<V>) {
  if sender.try_send(notification).is_err() {
    metrics.notifications_dropped.fetch_add(1, Ordering::Relaxed);
    tracing::warn!("eviction notification dropped; listener is falling behind");
  }
}
