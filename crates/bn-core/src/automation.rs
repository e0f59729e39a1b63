//! Scheduled parameter timelines
//!
//! Evaluates the value of a host parameter at an arbitrary time from the
//! events written to it:
//! - Step events hold their value from their time onwards
//! - Linear events ramp from the previous event and land at their time
//! - Events sharing a time apply in insertion order

use crate::graph::ParamChange;

// ============ Curve Types ============

/// How a parameter approaches an event's value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CurveType {
    /// Jump at the event time
    #[default]
    Step,
    /// Linear ramp ending at the event time
    Linear,
}

impl CurveType {
    /// Interpolate between two values, t normalized to 0..=1
    #[inline]
    pub fn interpolate(self, start: f32, end: f32, t: f64) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            CurveType::Step => {
                if t >= 1.0 {
                    end
                } else {
                    start
                }
            }
            CurveType::Linear => start + (end - start) * t as f32,
        }
    }
}

// ============ Param Event ============

/// Single scheduled point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamEvent {
    /// Time the value is reached (seconds)
    pub time: f64,
    /// Value at `time`
    pub value: f32,
    /// Approach curve from previous event
    pub curve: CurveType,
}

impl ParamEvent {
    /// Convert a parameter change written at `now`
    pub fn from_change(change: ParamChange, now: f64) -> Self {
        match change {
            ParamChange::Immediate(value) => Self {
                time: now,
                value,
                curve: CurveType::Step,
            },
            ParamChange::SetAtTime { value, time } => Self {
                time,
                value,
                curve: CurveType::Step,
            },
            ParamChange::LinearRampTo { value, end_time } => Self {
                time: end_time,
                value,
                curve: CurveType::Linear,
            },
        }
    }
}

// ============ Param Timeline ============

/// Time-ordered event list for one parameter
#[derive(Debug, Clone)]
pub struct ParamTimeline {
    /// Value before any event
    default_value: f32,
    /// Events sorted by time; equal times keep insertion order
    events: Vec<ParamEvent>,
}

impl ParamTimeline {
    pub fn new(default_value: f32) -> Self {
        Self {
            default_value,
            events: Vec::new(),
        }
    }

    /// Insert event keeping time order
    pub fn push(&mut self, event: ParamEvent) {
        let index = self.events.partition_point(|e| e.time <= event.time);
        self.events.insert(index, event);
    }

    /// Scheduled events
    pub fn events(&self) -> &[ParamEvent] {
        &self.events
    }

    pub fn default_value(&self) -> f32 {
        self.default_value
    }

    /// Latest event time (None when nothing scheduled)
    pub fn last_event_time(&self) -> Option<f64> {
        self.events.last().map(|e| e.time)
    }

    /// Drop events at or after `time`
    pub fn cancel_from(&mut self, time: f64) {
        let keep = self.events.partition_point(|e| e.time < time);
        self.events.truncate(keep);
    }

    /// Drop every event
    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Parameter value at `time`
    pub fn value_at(&self, time: f64) -> f32 {
        // Events at or before `time`
        let split = self.events.partition_point(|e| e.time <= time);

        let (prev_time, prev_value) = match split.checked_sub(1) {
            Some(i) => (self.events[i].time, self.events[i].value),
            None => (0.0, self.default_value),
        };

        match self.events.get(split) {
            Some(next) if next.curve == CurveType::Linear => {
                let span = next.time - prev_time;
                if span <= 0.0 {
                    return next.value;
                }
                let t = (time - prev_time) / span;
                next.curve.interpolate(prev_value, next.value, t)
            }
            _ => prev_value,
        }
    }
}
