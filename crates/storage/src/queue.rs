//! Enqueued messages
//!
//! Delivery is the store's concern. The in-memory store only keeps what
//! was enqueued, in commit order, so callers can drain it.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use kvtoolbox_core::{EnqueueOptions, Key, Value, Versionstamp};

/// A message accepted by a commit
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedMessage {
    /// Message payload
    pub value: Value,
    /// Earliest delivery time
    pub ready_at: Instant,
    /// Keys written with the payload if delivery fails
    pub keys_if_undelivered: Vec<Key>,
    /// Retry delays
    pub backoff_schedule: Option<Vec<Duration>>,
    /// Versionstamp of the enqueuing commit
    pub versionstamp: Versionstamp,
}

/// FIFO of accepted messages
#[derive(Debug, Default)]
pub struct MessageQueue {
    messages: VecDeque<QueuedMessage>,
}

impl MessageQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message enqueued at `now`
    pub fn push(
        &mut self,
        value: Value,
        options: EnqueueOptions,
        versionstamp: Versionstamp,
        now: Instant,
    ) {
        self.messages.push_back(QueuedMessage {
            value,
            ready_at: now + options.delay.unwrap_or_default(),
            keys_if_undelivered: options.keys_if_undelivered,
            backoff_schedule: options.backoff_schedule,
            versionstamp,
        });
    }

    /// Remove and return messages whose delay has elapsed at `now`
    pub fn take_ready(&mut self, now: Instant) -> Vec<QueuedMessage> {
        let (ready, pending): (VecDeque<_>, VecDeque<_>) =
            self.messages.drain(..).partition(|m| m.ready_at <= now);
        self.messages = pending;
        ready.into()
    }

    /// Number of queued messages
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the queue is empty
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
