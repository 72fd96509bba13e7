use ringbuf::traits::{Observer, Producer};
use thiserror::Error;

use super::Chunk;
use crate::events::{Event, ScheduledEvent, Tick};

pub type EventProducer = ringbuf::HeapProd<ScheduledEvent>;
pub type EventConsumer = ringbuf::HeapCons<ScheduledEvent>;

/// Maps ticks onto the sample timeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickClock {
    pub ticks_per_beat: u32,
    pub bpm: f32,
    pub sample_rate: u32,
}

impl TickClock {
    pub fn samples_per_tick(&self) -> f64 {
        (60.0 / self.bpm as f64) * self.sample_rate as f64 / self.ticks_per_beat as f64
    }

    pub fn tick_to_sample(&self, tick: Tick) -> u64 {
        (tick as f64 * self.samples_per_tick()).round() as u64
    }
}

#[derive(Debug, Clone, Copy, Error)]
pub enum SchedulerError {
    #[error("event buffer is full ({needed} events, {vacant} slots free)")]
    BufferFull { needed: usize, vacant: usize },
}

/// Queues every event of `chunk` in time order. Either the whole chunk fits
/// or nothing is pushed.
pub fn schedule_chunk_events(
    chunk: &Chunk,
    clock: &TickClock,
    producer: &mut EventProducer,
) -> Result<usize, SchedulerError> {
    let needed = chunk.len();
    let vacant = producer.vacant_len();
    if needed > vacant {
        return Err(SchedulerError::BufferFull { needed, vacant });
    }

    for (tick, event) in chunk.events() {
        let scheduled = ScheduledEvent {
            sample_timestamp: clock.tick_to_sample(tick),
            event: *event,
        };
        if producer.try_push(scheduled).is_err() {
            return Err(SchedulerError::BufferFull { needed, vacant });
        }
    }

    Ok(needed)
}

/// Queues session setup events at the very start of the timeline.
pub fn schedule_init_events(
    events: &[Event],
    producer: &mut EventProducer,
) -> Result<usize, SchedulerError> {
    let needed = events.len();
    let vacant = producer.vacant_len();
    if needed > vacant {
        return Err(SchedulerError::BufferFull { needed, vacant });
    }

    for event in events {
        let scheduled = ScheduledEvent {
            sample_timestamp: 0,
            event: *event,
        };
        if producer.try_push(scheduled).is_err() {
            return Err(SchedulerError::BufferFull { needed, vacant });
        }
    }

    Ok(needed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timing::ArpeggioConfig;
    use ringbuf::HeapRb;
    use ringbuf::traits::{Consumer, Split};

    const CLOCK: TickClock = TickClock {
        ticks_per_beat: 480,
        bpm: 120.0,
        sample_rate: 48000,
    };

    #[test]
    fn tick_conversion() {
        assert_eq!(CLOCK.samples_per_tick(), 50.0);
        assert_eq!(CLOCK.tick_to_sample(0), 0);
        assert_eq!(CLOCK.tick_to_sample(480), 24000);
    }

    #[test]
    fn chunk_events_arrive_in_order() {
        let (mut producer, mut consumer) = HeapRb::<ScheduledEvent>::new(64).split();
        let chunk = ArpeggioConfig::default().build_chunk(4440, 2);

        schedule_init_events(&[Event::program_change(0, 0)], &mut producer).unwrap();
        assert_eq!(schedule_chunk_events(&chunk, &CLOCK, &mut producer).unwrap(), 24);

        let first = consumer.try_pop().unwrap();
        assert_eq!(first.sample_timestamp, 0);
        assert_eq!(first.event, Event::program_change(0, 0));

        let mut last = 0;
        let mut count = 0;
        while let Some(scheduled) = consumer.try_pop() {
            assert!(scheduled.sample_timestamp >= last);
            last = scheduled.sample_timestamp;
            count += 1;
        }
        assert_eq!(count, 24);
        assert_eq!(last, CLOCK.tick_to_sample(4440 + 370 * 13));
    }

    #[test]
    fn overflow_pushes_nothing() {
        let (mut producer, consumer) = HeapRb::<ScheduledEvent>::new(10).split();
        let chunk = ArpeggioConfig::default().build_chunk(0, 0);

        let err = schedule_chunk_events(&chunk, &CLOCK, &mut producer).unwrap_err();
        assert!(matches!(
            err,
            SchedulerError::BufferFull {
                needed: 24,
                vacant: 10
            }
        ));
        assert!(consumer.is_empty());
    }
}
