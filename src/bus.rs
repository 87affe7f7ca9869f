/// Event bus
///
/// Fan-out of SDK lifecycle events. The SDK calls back from its own threads,
/// so publishing is synchronous and never waits on subscribers. Every event
/// travels on one channel, so each subscriber sees a producer's events in the
/// order they were published. The latest connection state is also kept aside
/// and replayed to every new subscriber, so freshly attached consumers know
/// whether the relay is reachable without waiting for the next transition.
///
use std::sync::{Arc, Mutex, PoisonError};

use log::warn;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};

use crate::constants::EVENT_BUS_CAPACITY;
use crate::event::LifecycleEvent;

#[derive(Clone, Debug)]
pub struct EventBus {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    events: broadcast::Sender<LifecycleEvent>,
    // Held while publishing connection state and while subscribing, so a new
    // subscriber either gets a value as replay or on the channel, never both.
    last_connection: Mutex<Option<LifecycleEvent>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(EVENT_BUS_CAPACITY)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity);
        Self {
            inner: Arc::new(Inner {
                events,
                last_connection: Mutex::new(None),
            }),
        }
    }

    /// Deliver `event` to all current subscribers. Returns how many
    /// subscribers were reached; events without subscribers are dropped,
    /// except that connection state is still remembered for replay.
    pub fn publish(&self, event: LifecycleEvent) -> usize {
        let _replay = event.is_connection_state().then(|| {
            let mut last = self
                .inner
                .last_connection
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            *last = Some(event.clone());
            last
        });
        self.inner.events.send(event).unwrap_or(0)
    }

    /// All lifecycle events published from now on, preceded by the current
    /// connection state if one is known.
    pub fn subscribe(&self) -> Subscription {
        self.attach(false)
    }

    /// Only `ConnectionStateChanged` events, with replay of the latest one.
    pub fn subscribe_connection_state(&self) -> Subscription {
        self.attach(true)
    }

    /// Last published connection availability.
    pub fn connection_state(&self) -> Option<bool> {
        match *self
            .inner
            .last_connection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
        {
            Some(LifecycleEvent::ConnectionStateChanged { available }) => {
                Some(available)
            }
            _ => None,
        }
    }

    fn attach(&self, connection_only: bool) -> Subscription {
        let last = self
            .inner
            .last_connection
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Subscription {
            replay: last.clone(),
            events: self.inner.events.subscribe(),
            connection_only,
        }
    }
}

/// A subscriber's view of the bus. Each subscription processes its events
/// strictly in delivery order.
#[derive(Debug)]
pub struct Subscription {
    replay: Option<LifecycleEvent>,
    events: broadcast::Receiver<LifecycleEvent>,
    connection_only: bool,
}

impl Subscription {
    /// Next event, or `None` once the bus has been dropped.
    pub async fn recv(&mut self) -> Option<LifecycleEvent> {
        if let Some(event) = self.replay.take() {
            return Some(event);
        }

        loop {
            match self.events.recv().await {
                Ok(event) if self.wants(&event) => return Some(event),
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!("event subscriber lagged, skipped {skipped} events");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Next event if one is already queued.
    pub fn try_recv(&mut self) -> Option<LifecycleEvent> {
        if let Some(event) = self.replay.take() {
            return Some(event);
        }

        loop {
            match self.events.try_recv() {
                Ok(event) if self.wants(&event) => return Some(event),
                Ok(_) => {}
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!("event subscriber lagged, skipped {skipped} events");
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
            }
        }
    }

    fn wants(&self, event: &LifecycleEvent) -> bool {
        !self.connection_only || event.is_connection_state()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approved(topic: &str) -> LifecycleEvent {
        LifecycleEvent::SessionApproved {
            topic: topic.to_string(),
        }
    }

    fn connection(available: bool) -> LifecycleEvent {
        LifecycleEvent::ConnectionStateChanged { available }
    }

    #[tokio::test]
    async fn delivers_in_publish_order_to_every_subscriber() {
        let bus = EventBus::default();
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        bus.publish(approved("t1"));
        bus.publish(LifecycleEvent::SessionDeleted {
            topic: "t1".to_string(),
        });

        for sub in [&mut a, &mut b] {
            assert_eq!(sub.recv().await, Some(approved("t1")));
            assert_eq!(
                sub.recv().await,
                Some(LifecycleEvent::SessionDeleted {
                    topic: "t1".to_string()
                })
            );
        }
    }

    #[tokio::test]
    async fn connection_changes_keep_their_place_in_the_stream() {
        let bus = EventBus::default();
        let mut sub = bus.subscribe();

        bus.publish(approved("t1"));
        bus.publish(connection(false));
        bus.publish(approved("t2"));

        assert_eq!(sub.recv().await, Some(approved("t1")));
        assert_eq!(sub.recv().await, Some(connection(false)));
        assert_eq!(sub.recv().await, Some(approved("t2")));
        assert_eq!(sub.try_recv(), None);
    }

    #[tokio::test]
    async fn late_subscriber_only_sees_later_events() {
        let bus = EventBus::default();
        assert_eq!(bus.publish(approved("early")), 0);

        let mut sub = bus.subscribe();
        assert_eq!(sub.try_recv(), None);

        bus.publish(approved("late"));
        assert_eq!(sub.recv().await, Some(approved("late")));
    }

    #[tokio::test]
    async fn connection_state_is_replayed_to_new_subscribers() {
        let bus = EventBus::default();
        bus.publish(connection(false));
        bus.publish(connection(true));
        assert_eq!(bus.connection_state(), Some(true));

        let mut sub = bus.subscribe();
        assert_eq!(sub.recv().await, Some(connection(true)));
        assert_eq!(sub.try_recv(), None);

        let mut only_connection = bus.subscribe_connection_state();
        assert_eq!(only_connection.recv().await, Some(connection(true)));

        bus.publish(approved("t1"));
        bus.publish(connection(false));
        assert_eq!(only_connection.recv().await, Some(connection(false)));
        assert_eq!(only_connection.try_recv(), None);
    }

    #[tokio::test]
    async fn publish_from_many_threads() {
        let bus = EventBus::default();
        let mut sub = bus.subscribe();

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let bus = bus.clone();
                std::thread::spawn(move || {
                    for j in 0..10 {
                        bus.publish(approved(&format!("{i}-{j}")));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let mut last_seen = [None::<usize>; 4];
        for _ in 0..40 {
            let Some(LifecycleEvent::SessionApproved { topic }) = sub.recv().await
            else {
                panic!("unexpected event");
            };
            let (producer, seq) = topic.split_once('-').unwrap();
            let (producer, seq): (usize, usize) =
                (producer.parse().unwrap(), seq.parse().unwrap());
            // per-producer order holds
            assert!(last_seen[producer].is_none_or(|prev| prev < seq));
            last_seen[producer] = Some(seq);
        }
    }

    #[tokio::test]
    async fn lagging_subscriber_skips_and_continues() {
        let bus = EventBus::new(2);
        let mut sub = bus.subscribe();
        for i in 0..5 {
            bus.publish(approved(&i.to_string()));
        }
        assert_eq!(sub.recv().await, Some(approved("3")));
        assert_eq!(sub.recv().await, Some(approved("4")));
    }

    #[tokio::test]
    async fn closed_bus_ends_stream() {
        let bus = EventBus::default();
        let mut sub = bus.subscribe();
        drop(bus);
        assert_eq!(sub.recv().await, None);
    }
}
