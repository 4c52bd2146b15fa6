//! Latest-value cache with one slot per input channel
//!
//! The event source is the only writer. Control loops read with either
//! [`ReadMode::Peek`] (level-sensed axes: "what is the value right now") or
//! [`ReadMode::Consume`] (edge-sensed buttons: "was there a press since I last
//! looked"). Each slot has its own lock so unrelated channels never contend.
//!
//! The cache is one deep. Two edges on the same channel between two consuming
//! reads collapse into the later one.

use crate::controller::channel::Channel;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

/// A decoded input sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelEvent {
    pub timestamp: DateTime<Utc>,
    pub channel: Channel,
    pub value: i32,
}

impl ChannelEvent {
    pub fn new(timestamp: DateTime<Utc>, channel: Channel, value: i32) -> Self {
        Self {
            timestamp,
            channel,
            value,
        }
    }

    /// Build from the `timeval` pair of a raw frame
    pub fn from_timeval(seconds: i64, microseconds: i64, channel: Channel, value: i32) -> Self {
        let nanos = (microseconds.clamp(0, 999_999) * 1_000) as u32;
        let timestamp = DateTime::from_timestamp(seconds, nanos).unwrap_or_default();
        Self::new(timestamp, channel, value)
    }

    /// Digital press edge
    pub fn is_press(&self) -> bool {
        self.value == 1
    }
}

/// How a read treats the slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMode {
    /// Return the current value, leave the slot untouched
    Peek,
    /// Return the current value and empty the slot
    Consume,
}

#[derive(Debug)]
pub struct EventCache {
    slots: [Mutex<Option<ChannelEvent>>; Channel::COUNT],
    sealed: AtomicBool,
}

impl EventCache {
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| Mutex::new(None)),
            sealed: AtomicBool::new(false),
        }
    }

    /// Overwrite the slot for `channel`; dropped once the cache is sealed
    pub fn write(&self, channel: Channel, event: ChannelEvent) {
        if self.is_sealed() {
            debug!("Cache sealed, dropping write to {}", channel);
            return;
        }
        *self.slots[channel.index()].lock() = Some(event);
    }

    pub fn read(&self, channel: Channel, mode: ReadMode) -> Option<ChannelEvent> {
        let mut slot = self.slots[channel.index()].lock();
        match mode {
            ReadMode::Peek => *slot,
            ReadMode::Consume => slot.take(),
        }
    }

    pub fn peek(&self, channel: Channel) -> Option<ChannelEvent> {
        self.read(channel, ReadMode::Peek)
    }

    pub fn consume(&self, channel: Channel) -> Option<ChannelEvent> {
        self.read(channel, ReadMode::Consume)
    }

    /// Empty every slot
    pub fn clear_all(&self) {
        for slot in &self.slots {
            *slot.lock() = None;
        }
    }

    /// Refuse all future writes. Used once the input device is gone so readers
    /// see "no input" rather than stale values.
    pub fn seal(&self) {
        if !self.sealed.swap(true, Ordering::AcqRel) {
            info!("Event cache sealed, all channels stay empty");
        }
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::Acquire)
    }
}

impl Default for EventCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    fn event(channel: Channel, value: i32) -> ChannelEvent {
        ChannelEvent::from_timeval(100, value as i64, channel, value)
    }

    #[test]
    fn unwritten_channels_read_as_absent() {
        let cache = EventCache::new();
        for channel in Channel::ALL {
            assert_eq!(cache.peek(channel), None);
            assert_eq!(cache.consume(channel), None);
        }
    }

    #[test]
    fn peek_is_repeatable_until_next_write() {
        let cache = EventCache::new();
        let first = event(Channel::AxisLeftStickX, 130);
        cache.write(Channel::AxisLeftStickX, first);

        for _ in 0..5 {
            assert_eq!(cache.peek(Channel::AxisLeftStickX), Some(first));
        }

        let second = event(Channel::AxisLeftStickX, 12);
        cache.write(Channel::AxisLeftStickX, second);
        assert_eq!(cache.peek(Channel::AxisLeftStickX), Some(second));
    }

    #[test]
    fn consume_delivers_once() {
        let cache = EventCache::new();
        let press = event(Channel::ButtonCross, 1);
        cache.write(Channel::ButtonCross, press);

        assert_eq!(cache.read(Channel::ButtonCross, ReadMode::Consume), Some(press));
        assert_eq!(cache.read(Channel::ButtonCross, ReadMode::Consume), None);
        assert_eq!(cache.peek(Channel::ButtonCross), None);
    }

    #[test]
    fn channels_are_independent() {
        let cache = EventCache::new();
        cache.write(Channel::ButtonCross, event(Channel::ButtonCross, 1));
        cache.write(Channel::AxisR2, event(Channel::AxisR2, 255));

        cache.consume(Channel::ButtonCross);
        assert_eq!(cache.peek(Channel::AxisR2).map(|e| e.value), Some(255));
    }

    #[test]
    fn all_zero_event_is_not_absent() {
        let cache = EventCache::new();
        let zero = ChannelEvent::from_timeval(0, 0, Channel::AxisL2, 0);
        cache.write(Channel::AxisL2, zero);
        assert_eq!(cache.peek(Channel::AxisL2), Some(zero));
    }

    #[test]
    fn timestamp_keeps_microseconds() {
        let e = ChannelEvent::from_timeval(1_700_000_000, 123_456, Channel::ButtonPs, 1);
        assert_eq!(e.timestamp.timestamp(), 1_700_000_000);
        assert_eq!(e.timestamp.timestamp_subsec_micros(), 123_456);
    }

    #[test]
    fn sealed_cache_stays_empty() {
        let cache = EventCache::new();
        cache.write(Channel::AxisR2, event(Channel::AxisR2, 40));
        cache.clear_all();
        cache.seal();
        cache.write(Channel::AxisR2, event(Channel::AxisR2, 50));
        assert!(cache.is_sealed());
        assert_eq!(cache.peek(Channel::AxisR2), None);
    }

    #[test]
    fn concurrent_consumers_never_share_an_event() {
        const WRITES: i32 = 2_000;
        let cache = Arc::new(EventCache::new());

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    let mut seen = Vec::new();
                    let mut idle = 0;
                    while idle < 100_000 {
                        match cache.consume(Channel::ButtonCircle) {
                            Some(e) => {
                                seen.push(e.value);
                                idle = 0;
                            }
                            None => idle += 1,
                        }
                    }
                    seen
                })
            })
            .collect();

        for value in 0..WRITES {
            cache.write(Channel::ButtonCircle, event(Channel::ButtonCircle, value));
        }

        let mut all = HashSet::new();
        for reader in readers {
            for value in reader.join().unwrap() {
                assert!(all.insert(value), "event {} delivered twice", value);
            }
        }
        assert!(all.len() as i32 <= WRITES);
    }
}
