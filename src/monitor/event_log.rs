//! Bounded, newest-first log of decoded events

use std::collections::VecDeque;

use crate::midi::Event;

/// Number of events retained; older ones are evicted first
pub const EVENT_LOG_CAPACITY: usize = 101;

/// Event log with gap-free ids starting at 1
///
/// `last` and `prevlast` are two successive paint high-water marks: events
/// with `id <= prevlast` were already on screen one paint ago and are drawn
/// faded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventLog {
    events: VecDeque<Event>,
    max_id: u64,
    last: u64,
    prevlast: u64,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number `event`, put it at the front and trim to capacity
    ///
    /// Returns the new log and the id given to the event.
    pub fn append(mut self, mut event: Event) -> (Self, u64) {
        let id = self.max_id + 1;
        event.id = id;
        self.max_id = id;

        self.events.push_front(event);
        self.events.truncate(EVENT_LOG_CAPACITY);

        (self, id)
    }

    /// Record that everything up to the newest id has been painted
    pub fn mark_painted(&mut self) {
        self.prevlast = self.last;
        self.last = self.max_id;
    }

    /// Whether an event should be drawn faded
    pub fn is_faded(&self, id: u64) -> bool {
        id <= self.prevlast
    }

    /// Events, newest first
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }

    pub fn newest(&self) -> Option<&Event> {
        self.events.front()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Highest id handed out so far
    pub fn max_id(&self) -> u64 {
        self.max_id
    }

    pub fn last(&self) -> u64 {
        self.last
    }

    pub fn prevlast(&self) -> u64 {
        self.prevlast
    }
}
