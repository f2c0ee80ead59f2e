//! Discrete-event scheduler: a min-ordered queue of timed events that drives
//! every other component in the simulator.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::error::{ScoreError, ScoreResult};

/// A scheduled unit of work. `payload` carries whatever the embedding core
/// wants dispatched (component tick, connection propagate, delayed
/// delivery, ...); the scheduler itself does not interpret it.
#[derive(Debug, Clone)]
pub struct Event<A> {
    pub time: u64,
    pub priority: i32,
    pub id: u64,
    pub cancelled: bool,
    pub name: String,
    pub payload: A,
}

impl<A> Event<A> {
    pub fn new(time: u64, priority: i32, id: u64, name: impl Into<String>, payload: A) -> Self {
        Self {
            time,
            priority,
            id,
            cancelled: false,
            name: name.into(),
            payload,
        }
    }
}

impl<A> PartialEq for Event<A> {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.priority == other.priority && self.id == other.id
    }
}
impl<A> Eq for Event<A> {}

// `BinaryHeap` is a max-heap; we want the *earliest* time, then *highest*
// priority, then *lowest* id dequeued first, so `Ord` is defined inverted
// relative to the natural `(time, priority, id)` tuple ordering for time and
// id, and kept natural for priority.
impl<A> Ord for Event<A> {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .time
            .cmp(&self.time)
            .then_with(|| self.priority.cmp(&other.priority))
            .then_with(|| other.id.cmp(&self.id))
    }
}

impl<A> PartialOrd for Event<A> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Priority used by connection `propagate` events: runs before component
/// ticks within the same cycle.
pub const PRIORITY_PROPAGATE: i32 = 1;
/// Priority used by component `tick` events.
pub const PRIORITY_TICK: i32 = 0;
/// Priority used by delayed connection deliveries: lands before any other
/// work scheduled at the same target time.
pub const PRIORITY_DELIVER: i32 = -1;

/// A handle to a scheduled event, usable to cancel it before it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventId(pub u64);

pub struct Scheduler<A> {
    queue: BinaryHeap<Event<A>>,
    cancelled: ahash::AHashSet<u64>,
    now: u64,
    next_id: u64,
    total_scheduled: u64,
}

impl<A> Default for Scheduler<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> Scheduler<A> {
    pub fn new() -> Self {
        Self {
            queue: BinaryHeap::new(),
            cancelled: ahash::AHashSet::default(),
            now: 0,
            next_id: 0,
            total_scheduled: 0,
        }
    }

    pub fn current_time(&self) -> u64 {
        self.now
    }

    pub fn pending_count(&self) -> usize {
        self.queue.len()
    }

    pub fn total_count(&self) -> u64 {
        self.total_scheduled
    }

    pub fn reset(&mut self) {
        self.queue.clear();
        self.cancelled.clear();
        self.now = 0;
        self.next_id = 0;
        self.total_scheduled = 0;
    }

    fn alloc_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Insert an event. Fails if `time < current_time()`.
    pub fn schedule_at(
        &mut self,
        time: u64,
        priority: i32,
        name: impl Into<String>,
        payload: A,
    ) -> ScoreResult<EventId> {
        if time < self.now {
            tracing::warn!(requested = time, now = self.now, "rejecting past event");
            return Err(ScoreError::PastEvent {
                now: self.now,
                requested: time,
            });
        }
        let id = self.alloc_id();
        self.total_scheduled += 1;
        self.queue.push(Event::new(time, priority, id, name, payload));
        Ok(EventId(id))
    }

    /// Mark an event cancelled; it is skipped without effect at dispatch
    /// time. Cancelling after it has already been dispatched has no effect.
    pub fn cancel(&mut self, id: EventId) {
        self.cancelled.insert(id.0);
    }

    fn pop_next(&mut self) -> Option<Event<A>> {
        loop {
            let ev = self.queue.pop()?;
            if self.cancelled.remove(&ev.id) {
                continue;
            }
            self.now = ev.time;
            return Some(ev);
        }
    }

    /// Dequeue and dispatch every event via `handler` until the queue is
    /// empty.
    pub fn run(&mut self, mut handler: impl FnMut(&mut Self, Event<A>)) {
        while let Some(ev) = self.pop_next() {
            handler(self, ev);
        }
    }

    /// Dequeue and dispatch until the next event's time would exceed `t`.
    pub fn run_until(&mut self, t: u64, mut handler: impl FnMut(&mut Self, Event<A>)) {
        loop {
            match self.queue.peek() {
                Some(ev) if ev.time <= t => {
                    if let Some(ev) = self.pop_next() {
                        handler(self, ev);
                    }
                }
                _ => {
                    self.now = self.now.max(t);
                    break;
                }
            }
        }
    }

    /// Dequeue and dispatch up to `n` non-cancelled events.
    pub fn run_for(&mut self, n: usize, mut handler: impl FnMut(&mut Self, Event<A>)) {
        let mut dispatched = 0;
        while dispatched < n {
            match self.pop_next() {
                Some(ev) => {
                    handler(self, ev);
                    dispatched += 1;
                }
                None => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orders_by_time_then_priority_then_id() {
        let mut s: Scheduler<i32> = Scheduler::new();
        s.schedule_at(5, 0, "a", 1).unwrap();
        s.schedule_at(5, 1, "b", 2).unwrap();
        s.schedule_at(1, 0, "c", 3).unwrap();
        s.schedule_at(5, 1, "d", 4).unwrap();

        let mut order = vec![];
        s.run(|_, ev| order.push(ev.payload));
        assert_eq!(order, vec![3, 2, 4, 1]);
    }

    #[test]
    fn rejects_past_events() {
        let mut s: Scheduler<i32> = Scheduler::new();
        s.schedule_at(10, 0, "a", 1).unwrap();
        s.run(|_, _| {});
        assert_eq!(s.current_time(), 10);
        assert!(s.schedule_at(3, 0, "b", 2).is_err());
    }

    #[test]
    fn cancelled_events_are_skipped() {
        let mut s: Scheduler<i32> = Scheduler::new();
        let id = s.schedule_at(1, 0, "a", 1).unwrap();
        s.schedule_at(2, 0, "b", 2).unwrap();
        s.cancel(id);
        let mut order = vec![];
        s.run(|_, ev| order.push(ev.payload));
        assert_eq!(order, vec![2]);
    }

    #[test]
    fn run_until_stops_at_time() {
        let mut s: Scheduler<i32> = Scheduler::new();
        s.schedule_at(1, 0, "a", 1).unwrap();
        s.schedule_at(10, 0, "b", 2).unwrap();
        let mut order = vec![];
        s.run_until(5, |_, ev| order.push(ev.payload));
        assert_eq!(order, vec![1]);
        assert_eq!(s.pending_count(), 1);
    }
}
