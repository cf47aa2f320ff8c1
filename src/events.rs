//! Event log: a bounded ring buffer of timestamped state transitions
//! (spec §3, §4.13). Internal "physical limit" / "resource exhausted"
//! conditions (spec §7) surface here rather than as command errors.

use ringbuffer::{AllocRingBuffer, RingBuffer};
use serde::{Deserialize, Serialize};

/// Discriminated payload for an [`Event`]; one variant per spec §3 "Event"
/// kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventKind {
    Ignition,
    IgnitionAbort,
    Shutdown,
    Scram,
    ReactorOnline,
    TankEmpty { tank_id: String },
    TankRuptured { tank_id: String },
    OverpressureWarning { tank_id: String },
    Brownout { bus_id: String, shed: Vec<String> },
    BrownoutUnrecoverable { bus_id: String },
    Overtemp { component_id: String },
    CoolantFreeze { loop_id: String },
    CoolantBoil { loop_id: String },
    GroundImpact { speed_m_s: f64, vertical_speed_m_s: f64 },
    LowAltitude { altitude_m: f64 },
    SasEngage { mode: String },
    AutopilotEngage { mode: String },
    RcsTankEmpty { group: String },
    BreakerTripped { consumer_id: String },
}

/// A single timestamped, kinded event (spec §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub time_s: f64,
    pub kind: EventKind,
}

/// Fixed-capacity ring buffer of events; oldest entries are silently
/// overwritten once `max_events` (spec §3, `SimulationConfig`) is reached.
#[derive(Debug, Clone)]
pub struct EventLog {
    buffer: AllocRingBuffer<Event>,
}

/// On-disk representation (spec §6 "Persisted state layout"): capacity plus
/// the chronological event list, since `AllocRingBuffer` itself has no serde
/// support.
#[derive(Serialize, Deserialize)]
struct EventLogRepr {
    capacity: usize,
    events: Vec<Event>,
}

impl Serialize for EventLog {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        EventLogRepr {
            capacity: self.capacity(),
            events: self.to_vec(),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for EventLog {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let repr = EventLogRepr::deserialize(deserializer)?;
        let mut log = EventLog::new(repr.capacity);
        for event in repr.events {
            log.buffer.push(event);
        }
        Ok(log)
    }
}

impl EventLog {
    pub fn new(capacity: usize) -> Self {
        EventLog {
            buffer: AllocRingBuffer::new(capacity.max(1)),
        }
    }

    pub fn push(&mut self, time_s: f64, kind: EventKind) {
        self.buffer.push(Event { time_s, kind });
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    /// Events in chronological order, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.buffer.iter()
    }

    /// Snapshot of the current contents, oldest first.
    pub fn to_vec(&self) -> Vec<Event> {
        self.buffer.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_around_capacity() {
        let mut log = EventLog::new(2);
        log.push(0.0, EventKind::Ignition);
        log.push(0.1, EventKind::Shutdown);
        log.push(0.2, EventKind::Scram);

        let events = log.to_vec();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, EventKind::Shutdown);
        assert_eq!(events[1].kind, EventKind::Scram);
    }

    #[test]
    fn zero_requested_capacity_clamped_to_one() {
        let log = EventLog::new(0);
        assert_eq!(log.capacity(), 1);
    }
}
