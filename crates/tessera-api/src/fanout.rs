//! Per-application notification fan-out.
//!
//! One `broadcast` channel per application topic. Delivery is best-effort and
//! at-most-once to whoever is subscribed when an event is published; there is
//! no replay for late subscribers.

use std::{
  collections::HashMap,
  sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use tessera_core::lifecycle::{StatusUpdated, topic_for};
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

/// Events buffered per topic before slow subscribers start lagging.
pub const DEFAULT_CAPACITY: usize = 64;

pub struct FanOut {
  topics:   Mutex<HashMap<Uuid, broadcast::Sender<StatusUpdated>>>,
  capacity: usize,
}

impl Default for FanOut {
  fn default() -> Self { Self::new(DEFAULT_CAPACITY) }
}

impl FanOut {
  pub fn new(capacity: usize) -> Self {
    Self { topics: Mutex::new(HashMap::new()), capacity: capacity.max(1) }
  }

  fn topics(&self) -> MutexGuard<'_, HashMap<Uuid, broadcast::Sender<StatusUpdated>>> {
    self.topics.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Join the topic of `application_id`. Only events published after this
  /// call are received.
  pub fn subscribe(&self, application_id: Uuid) -> Subscription {
    let receiver = self
      .topics()
      .entry(application_id)
      .or_insert_with(|| broadcast::channel(self.capacity).0)
      .subscribe();
    debug!(topic = %topic_for(application_id), "subscribed");
    Subscription { application_id, receiver }
  }

  /// Like [`subscribe`](Self::subscribe), but the returned [`Listener`]
  /// leaves the topic by itself when dropped.
  pub fn listen(self: &Arc<Self>, application_id: Uuid) -> Listener {
    Listener { fanout: Arc::clone(self), subscription: Some(self.subscribe(application_id)) }
  }

  /// Leave a topic. The topic is dropped once nobody listens to it.
  pub fn unsubscribe(&self, subscription: Subscription) {
    let Subscription { application_id, receiver } = subscription;
    drop(receiver);

    let mut topics = self.topics();
    if topics
      .get(&application_id)
      .is_some_and(|sender| sender.receiver_count() == 0)
    {
      topics.remove(&application_id);
    }
    debug!(topic = %topic_for(application_id), "unsubscribed");
  }

  /// Deliver `event` to the current subscribers of its topic. Returns how
  /// many were reached. Never blocks and never fails.
  pub fn publish(&self, event: &StatusUpdated) -> usize {
    let mut topics = self.topics();
    let Some(sender) = topics.get(&event.application_id) else {
      debug!(topic = %event.topic(), "no subscribers; event dropped");
      return 0;
    };

    match sender.send(event.clone()) {
      Ok(reached) => reached,
      Err(_) => {
        // Every receiver went away without unsubscribing.
        topics.remove(&event.application_id);
        debug!(topic = %event.topic(), "no live subscribers; event dropped");
        0
      }
    }
  }

  /// Number of live subscribers on the topic of `application_id`.
  pub fn subscriber_count(&self, application_id: Uuid) -> usize {
    self
      .topics()
      .get(&application_id)
      .map_or(0, broadcast::Sender::receiver_count)
  }
}

/// A live membership in one application topic.
pub struct Subscription {
  pub application_id: Uuid,
  receiver:           broadcast::Receiver<StatusUpdated>,
}

impl Subscription {
  pub fn topic(&self) -> String { topic_for(self.application_id) }

  /// Wait for the next event. Events missed by a lagging subscriber are
  /// skipped. Returns `None` once the topic is gone.
  pub async fn recv(&mut self) -> Option<StatusUpdated> {
    loop {
      match self.receiver.recv().await {
        Ok(event) => return Some(event),
        Err(broadcast::error::RecvError::Lagged(missed)) => {
          debug!(topic = %self.topic(), missed, "subscriber lagged");
        }
        Err(broadcast::error::RecvError::Closed) => return None,
      }
    }
  }

  /// The next already-delivered event, if any.
  pub fn try_recv(&mut self) -> Option<StatusUpdated> {
    loop {
      match self.receiver.try_recv() {
        Ok(event) => return Some(event),
        Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
        Err(_) => return None,
      }
    }
  }
}

/// A [`Subscription`] tied to the lifetime of a connection.
pub struct Listener {
  fanout:       Arc<FanOut>,
  subscription: Option<Subscription>,
}

impl Listener {
  pub async fn recv(&mut self) -> Option<StatusUpdated> {
    self.subscription.as_mut()?.recv().await
  }
}

impl Drop for Listener {
  fn drop(&mut self) {
    if let Some(subscription) = self.subscription.take() {
      self.fanout.unsubscribe(subscription);
    }
  }
}
