//! In-process publish/subscribe keyed by stream id.
//!
//! Built on `tokio::sync::broadcast`, whose fixed-capacity ring already
//! drops the oldest unread value and marks lagging receivers with
//! `Lagged` rather than blocking the sender. A broker indexed by stream
//! id gives each stream its own channel instead of one firehose that
//! every consumer has to filter locally.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::models::StreamId;

/// Payload of a `tick:{streamId}` event, published after every accepted
/// heartbeat.
#[derive(Debug, Clone, Serialize)]
pub struct TickEvent {
    pub stream_id: StreamId,
    pub nonce: i64,
    pub round_result: f64,
}

/// Payload of a `newrows:{streamId}` event, published after every
/// accepted bet.
#[derive(Debug, Clone, Serialize)]
pub struct NewRowsEvent {
    pub stream_id: StreamId,
    pub last_known_id_hint: Option<i64>,
}

/// Connection-state signal, `status:{streamId}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Connected,
    Disconnected,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StreamEvent {
    Tick(TickEvent),
    NewRows(NewRowsEvent),
    Status {
        stream_id: StreamId,
        state: ConnectionState,
    },
}

struct Broker {
    channels: HashMap<StreamId, broadcast::Sender<StreamEvent>>,
}

/// A handle returned by `subscribe`. Dropping it is the unsubscribe - the
/// bus holds only a weak-by-construction `Sender` per stream and prunes
/// channels with no receivers left on the next publish, so nothing is
/// retained once every subscriber has gone.
pub struct Subscriber {
    receiver: broadcast::Receiver<StreamEvent>,
}

impl Subscriber {
    /// Returns `None` only once the bus itself is dropped; a lagging
    /// receiver silently skips ahead to the oldest event still buffered
    /// rather than surfacing the gap, since subscribers are required to
    /// reconcile via `tailBets`/`tailRounds` regardless.
    pub async fn recv(&mut self) -> Option<StreamEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    pub fn unsubscribe(self) {}
}

/// Per-stream-id broker. Cheap to clone - an `Arc` around a mutex guarding
/// a small `HashMap`; no concurrent-map crate needed for this fan-out.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<Mutex<Broker>>,
    queue_capacity: usize,
}

impl EventBus {
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Broker {
                channels: HashMap::new(),
            })),
            queue_capacity: queue_capacity.max(1),
        }
    }

    pub fn subscribe(&self, stream_id: StreamId) -> Subscriber {
        let mut broker = self.inner.lock();
        let sender = broker
            .channels
            .entry(stream_id)
            .or_insert_with(|| broadcast::channel(self.queue_capacity).0);
        Subscriber {
            receiver: sender.subscribe(),
        }
    }

    /// Publishing on an unknown stream id is a no-op. A
    /// channel with no receivers left is dropped here rather than kept
    /// alive forever.
    fn publish(&self, stream_id: StreamId, event: StreamEvent) {
        let mut broker = self.inner.lock();
        let Some(sender) = broker.channels.get(&stream_id) else {
            return;
        };

        if sender.receiver_count() == 0 {
            broker.channels.remove(&stream_id);
            return;
        }

        // `send` only errs when no receivers are subscribed, which was
        // just checked; ignore it regardless per the fire-and-forget
        // publication policy.
        let _ = sender.send(event);
    }

    pub fn publish_tick(&self, stream_id: StreamId, nonce: i64, round_result: f64) {
        self.publish(
            stream_id,
            StreamEvent::Tick(TickEvent {
                stream_id,
                nonce,
                round_result,
            }),
        );
    }

    pub fn publish_new_rows(&self, stream_id: StreamId, last_known_id_hint: Option<i64>) {
        self.publish(
            stream_id,
            StreamEvent::NewRows(NewRowsEvent {
                stream_id,
                last_known_id_hint,
            }),
        );
    }

    pub fn publish_status(&self, stream_id: StreamId, state: ConnectionState) {
        self.publish(stream_id, StreamEvent::Status { stream_id, state });
    }

    #[cfg(test)]
    fn has_channel(&self, stream_id: StreamId) -> bool {
        self.inner.lock().channels.contains_key(&stream_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_delivers_to_subscriber() {
        let bus = EventBus::new(8);
        let mut sub = bus.subscribe(1);

        bus.publish_tick(1, 5, 2.5);

        let event = sub.recv().await.unwrap();
        match event {
            StreamEvent::Tick(t) => {
                assert_eq!(t.nonce, 5);
                assert_eq!(t.round_result, 2.5);
            }
            _ => panic!("expected tick"),
        }
    }

    #[tokio::test]
    async fn publish_on_unknown_stream_is_noop() {
        let bus = EventBus::new(8);
        bus.publish_tick(999, 1, 1.0);
    }

    #[tokio::test]
    async fn dropping_every_subscriber_prunes_the_channel() {
        let bus = EventBus::new(8);
        let sub = bus.subscribe(1);
        assert!(bus.has_channel(1));

        sub.unsubscribe();
        bus.publish_tick(1, 1, 1.0); // triggers the prune
        assert!(!bus.has_channel(1));
    }

    #[tokio::test]
    async fn overflow_drops_oldest_rather_than_blocking() {
        let bus = EventBus::new(1);
        let mut sub = bus.subscribe(1);

        bus.publish_tick(1, 1, 1.0);
        bus.publish_tick(1, 2, 2.0); // ring capacity 1, oldest dropped

        let event = sub.recv().await.unwrap();
        match event {
            StreamEvent::Tick(t) => assert_eq!(t.nonce, 2),
            _ => panic!("expected tick"),
        }
    }

    #[tokio::test]
    async fn events_for_different_streams_are_isolated() {
        let bus = EventBus::new(8);
        let mut sub_a = bus.subscribe(1);
        let mut sub_b = bus.subscribe(2);

        bus.publish_tick(1, 10, 1.0);

        let event = sub_a.recv().await.unwrap();
        assert!(matches!(event, StreamEvent::Tick(t) if t.stream_id == 1));

        assert!(sub_b.receiver.try_recv().is_err());
    }
}
