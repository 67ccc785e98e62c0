//! Bounded event bus
//!
//! One mutex guards the log and the id counter, so ids are assigned and
//! appended atomically. A watch channel carrying the latest id wakes
//! every live subscriber; the log itself is the only buffer.

use crate::events::types::{Event, NewEvent, StreamFrame};
use futures_util::stream::{self, Stream};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::debug;

/// Events retained before the oldest is evicted
pub const DEFAULT_CAPACITY: usize = 5000;

/// Idle wait before a subscriber receives a heartbeat
pub const DEFAULT_HEARTBEAT: Duration = Duration::from_secs(2);

struct EventLog {
    events: VecDeque<Event>,
    next_id: u64,
}

/// Append-only, bounded, thread-safe event log
pub struct EventBus {
    log: Mutex<EventLog>,
    notify: watch::Sender<u64>,
    capacity: usize,
    heartbeat: Duration,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_HEARTBEAT)
    }
}

impl EventBus {
    /// Create new bus; capacity is clamped to at least one event
    pub fn new(capacity: usize, heartbeat: Duration) -> Self {
        let capacity = capacity.max(1);
        let (notify, _) = watch::channel(0);
        Self {
            log: Mutex::new(EventLog {
                events: VecDeque::with_capacity(capacity.min(1024)),
                next_id: 1,
            }),
            notify,
            capacity,
            heartbeat,
        }
    }

    /// Append an event, assigning its id and missing timestamp
    pub fn publish(&self, event: NewEvent) -> Event {
        let mut log = self.log.lock();
        let id = log.next_id;
        log.next_id += 1;

        let stored = event.into_event(id);
        log.events.push_back(stored.clone());
        while log.events.len() > self.capacity {
            if let Some(evicted) = log.events.pop_front() {
                debug!(id = evicted.id, "evicted event from bus");
            }
        }

        // Still under the lock so notifications are ordered like ids
        self.notify.send_replace(id);
        stored
    }

    /// Retained events with id greater than `since`, oldest first
    ///
    /// When `since` predates retention the result starts at the oldest
    /// retained event; the evicted range is silently skipped.
    pub fn replay_since(&self, since: u64) -> Vec<Event> {
        let log = self.log.lock();
        let start = log.events.partition_point(|e| e.id <= since);
        log.events.range(start..).cloned().collect()
    }

    /// Id of the most recently published event, 0 if none
    pub fn latest_id(&self) -> u64 {
        self.log.lock().next_id - 1
    }

    /// Id of the oldest retained event
    pub fn oldest_id(&self) -> Option<u64> {
        self.log.lock().events.front().map(|e| e.id)
    }

    pub fn len(&self) -> usize {
        self.log.lock().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.lock().events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn heartbeat(&self) -> Duration {
        self.heartbeat
    }

    /// Live subscription starting after `since`
    ///
    /// Yields [`StreamFrame::Connected`] first, then every event newer than
    /// the cursor. Once caught up it waits up to the heartbeat interval and
    /// then yields a [`StreamFrame::Heartbeat`] whether or not anything was
    /// published meanwhile. The stream never ends on its own;
    /// dropping it ends the subscription.
    pub fn subscribe(self: &Arc<Self>, since: u64) -> impl Stream<Item = StreamFrame> + Send + 'static {
        let subscription = Subscription {
            bus: Arc::clone(self),
            rx: self.notify.subscribe(),
            cursor: since,
            pending: VecDeque::new(),
            connected: false,
        };
        stream::unfold(subscription, |mut sub| async move {
            let frame = sub.next_frame().await;
            Some((frame, sub))
        })
    }
}

struct Subscription {
    bus: Arc<EventBus>,
    rx: watch::Receiver<u64>,
    cursor: u64,
    pending: VecDeque<Event>,
    connected: bool,
}

impl Subscription {
    async fn next_frame(&mut self) -> StreamFrame {
        if !self.connected {
            self.connected = true;
            return StreamFrame::Connected;
        }

        loop {
            if let Some(event) = self.pending.pop_front() {
                self.cursor = event.id;
                return StreamFrame::Event(event);
            }

            // Mark the current id seen before reading so a publish racing
            // the replay still wakes the wait below
            let _ = self.rx.borrow_and_update();
            let batch = self.bus.replay_since(self.cursor);
            if !batch.is_empty() {
                self.pending.extend(batch);
                continue;
            }

            // A wake or a timeout both end in a heartbeat; new events are
            // drained on the next poll
            let _ = tokio::time::timeout(self.bus.heartbeat, self.rx.changed()).await;
            return StreamFrame::Heartbeat;
        }
    }
}
