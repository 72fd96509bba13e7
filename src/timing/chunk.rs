use std::collections::BTreeMap;

use crate::events::{Event, Tick};

/// A window `[begin_tick, end_tick)` of events ordered by tick.
///
/// Several events may share a tick; they keep the order they were inserted in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Chunk {
    pub begin_tick: Tick,
    pub end_tick: Tick,
    events: BTreeMap<Tick, Vec<Event>>,
}

impl Chunk {
    pub fn new(begin_tick: Tick, end_tick: Tick) -> Self {
        Self {
            begin_tick,
            end_tick,
            events: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, tick: Tick, event: Event) {
        self.events.entry(tick).or_default().push(event);
    }

    pub fn duration(&self) -> Tick {
        self.end_tick - self.begin_tick
    }

    pub fn len(&self) -> usize {
        self.events.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn events(&self) -> impl Iterator<Item = (Tick, &Event)> + '_ {
        self.events
            .iter()
            .flat_map(|(&tick, events)| events.iter().map(move |event| (tick, event)))
    }

    pub fn events_at(&self, tick: Tick) -> &[Event] {
        self.events.get(&tick).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn first_tick(&self) -> Option<Tick> {
        self.events.keys().next().copied()
    }

    pub fn last_tick(&self) -> Option<Tick> {
        self.events.keys().next_back().copied()
    }
}
