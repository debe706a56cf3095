//! Thread-safe FIFO mailbox between producers and the foreground drain.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use crate::event::{Event, EventKind};

/// Counters describing queue pressure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueueStats {
    pub pending: usize,
    pub coalesced: u64,
    pub dropped: u64,
}

#[derive(Debug, Default)]
struct Shared {
    events: Mutex<VecDeque<Event>>,
    capacity: usize,
    coalesced: AtomicU64,
    dropped: AtomicU64,
}

/// Unbounded by default. With a soft capacity, only thinking toggles are
/// coalesced or dropped once the cap is reached; every other kind is kept.
#[derive(Debug, Clone, Default)]
pub struct EventQueue {
    inner: Arc<Shared>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// A queue whose thinking toggles are coalesced past `capacity` pending
    /// events. `0` means unbounded.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Shared {
                capacity,
                ..Shared::default()
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Event>> {
        self.inner
            .events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Enqueue `event`. Safe from any thread; never fails.
    pub fn push(&self, event: Event) {
        let mut events = self.lock();
        let capacity = self.inner.capacity;
        if capacity > 0 && events.len() >= capacity {
            if let EventKind::ThinkingStateChanged(_) = event.kind {
                let previous = events.iter().rposition(|queued| {
                    queued.session == event.session
                        && matches!(queued.kind, EventKind::ThinkingStateChanged(_))
                });
                match previous {
                    Some(idx) => {
                        events.remove(idx);
                        events.push_back(event);
                        self.inner.coalesced.fetch_add(1, Ordering::Relaxed);
                        warn!(
                            "Event queue at capacity ({capacity}), coalesced thinking toggle"
                        );
                    }
                    None => {
                        self.inner.dropped.fetch_add(1, Ordering::Relaxed);
                        warn!("Event queue at capacity ({capacity}), dropped thinking toggle");
                    }
                }
                return;
            }
        }
        events.push_back(event);
    }

    /// Take every pending event in FIFO order as one batch.
    ///
    /// Events pushed while this runs land in the next batch.
    pub fn drain_all(&self) -> Vec<Event> {
        let batch = std::mem::take(&mut *self.lock());
        if !batch.is_empty() {
            debug!("Drained {} events", batch.len());
        }
        batch.into()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            pending: self.len(),
            coalesced: self.inner.coalesced.load(Ordering::Relaxed),
            dropped: self.inner.dropped.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::SessionId;
    use std::thread;

    fn user(text: &str) -> Event {
        Event::detached(EventKind::UserUtterance(text.into()))
    }

    fn thinking(session: SessionId, active: bool) -> Event {
        Event::for_session(session, EventKind::ThinkingStateChanged(active))
    }

    #[test]
    fn drain_returns_fifo_batch_once() {
        let queue = EventQueue::new();
        queue.push(user("a"));
        queue.push(user("b"));
        queue.push(user("a"));

        let batch = queue.drain_all();
        assert_eq!(batch, vec![user("a"), user("b"), user("a")]);
        assert!(queue.drain_all().is_empty());
        assert!(queue.is_empty());
    }

    #[test]
    fn concurrent_producers_lose_nothing_and_keep_per_producer_order() {
        const PRODUCERS: usize = 4;
        const PER_PRODUCER: usize = 500;

        let queue = EventQueue::new();
        let handles: Vec<_> = (0..PRODUCERS)
            .map(|p| {
                let queue = queue.clone();
                thread::spawn(move || {
                    for i in 0..PER_PRODUCER {
                        queue.push(user(&format!("{p}:{i}")));
                    }
                })
            })
            .collect();

        let mut seen: Vec<Event> = Vec::new();
        while handles.iter().any(|h| !h.is_finished()) {
            seen.extend(queue.drain_all());
        }
        for handle in handles {
            handle.join().unwrap();
        }
        seen.extend(queue.drain_all());

        assert_eq!(seen.len(), PRODUCERS * PER_PRODUCER);
        let mut next = [0usize; PRODUCERS];
        for event in seen {
            let EventKind::UserUtterance(text) = event.kind else {
                panic!("unexpected kind");
            };
            let (p, i) = text.split_once(':').unwrap();
            let (p, i): (usize, usize) = (p.parse().unwrap(), i.parse().unwrap());
            assert_eq!(i, next[p], "producer {p} out of order");
            next[p] += 1;
        }
        assert!(next.iter().all(|&n| n == PER_PRODUCER));
    }

    #[test]
    fn unbounded_queue_never_coalesces() {
        let queue = EventQueue::new();
        let id = SessionId::new();
        for i in 0..100 {
            queue.push(thinking(id, i % 2 == 0));
        }
        assert_eq!(queue.len(), 100);
        assert_eq!(queue.stats().coalesced, 0);
    }

    #[test]
    fn capped_queue_coalesces_thinking_to_the_back() {
        let queue = EventQueue::with_capacity(2);
        let id = SessionId::new();
        queue.push(thinking(id, true));
        queue.push(user("hi"));
        queue.push(thinking(id, false));

        assert_eq!(queue.drain_all(), vec![user("hi"), thinking(id, false)]);
        assert_eq!(queue.stats().coalesced, 1);
    }

    #[test]
    fn capped_queue_drops_thinking_without_predecessor_but_keeps_other_kinds() {
        let queue = EventQueue::with_capacity(1);
        let id = SessionId::new();
        queue.push(user("a"));
        queue.push(thinking(id, true));
        queue.push(Event::for_session(
            id,
            EventKind::SessionEnded("completed".into()),
        ));

        let stats = queue.stats();
        assert_eq!(stats.pending, 2);
        assert_eq!(stats.dropped, 1);
        let batch = queue.drain_all();
        assert!(batch[1].kind.is_terminal());
    }
}
