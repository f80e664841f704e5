//! Core types for spark-motive.
//!
//! These types define the foundation that everything builds on.
//! They flow between the engine, the processors and the motivator handles.

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

// =============================================================================
// Index Types
// =============================================================================

/// Index into a processor's parallel arrays.
///
/// A motivator with more than one dimension occupies a contiguous run of
/// indices; the first index of the run identifies it.
pub type MotiveIndex = usize;

/// Number of contiguous indices occupied by one motivator.
pub type MotiveDimension = usize;

/// Index of a child component inside one matrix motivator.
pub type MotiveChildIndex = usize;

/// Time in caller-defined units (commonly milliseconds).
///
/// All processors registered with one engine must agree on the unit.
pub type MotiveTime = i32;

// =============================================================================
// Processor Identity
// =============================================================================

static NEXT_PROCESSOR_ID: AtomicU32 = AtomicU32::new(1);

/// Identity of one processor instance.
///
/// Written into motivator links so a link can tell which processor it
/// references without holding a pointer to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProcessorId(u32);

impl ProcessorId {
    /// Allocate a fresh, never reused id.
    pub fn next() -> Self {
        Self(NEXT_PROCESSOR_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ProcessorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p{}", self.0)
    }
}

/// Static identity of an animation algorithm.
///
/// One engine holds at most one processor per type. Each processor module
/// declares its type as a constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MotivatorType(&'static str);

impl MotivatorType {
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    #[inline]
    pub const fn name(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for MotivatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

// =============================================================================
// Motivator Init
// =============================================================================

/// Initialization parameters for one motivator.
///
/// Each processor defines its own init struct. The processor receives it as a
/// trait object and downcasts to its own type with [`MotivatorInit::as_any`].
pub trait MotivatorInit: Any {
    /// The processor type this init is meant for.
    fn motivator_type(&self) -> MotivatorType;

    fn as_any(&self) -> &dyn Any;
}

// =============================================================================
// Motive Targets
// =============================================================================

/// One waypoint of a scalar target: reach `value` at `velocity` after `time`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MotiveNode1f {
    pub value: f32,
    pub velocity: f32,
    pub time: MotiveTime,
}

impl MotiveNode1f {
    pub const fn new(value: f32, velocity: f32, time: MotiveTime) -> Self {
        Self { value, velocity, time }
    }
}

/// Discrete target for a scalar motivator.
///
/// Holds one or two waypoints. A waypoint at time 0 overrides the current
/// state; the last waypoint is the goal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotiveTarget1f {
    nodes: [MotiveNode1f; 2],
    num_nodes: usize,
}

impl MotiveTarget1f {
    /// Set the current value and velocity immediately.
    pub const fn current(value: f32, velocity: f32) -> Self {
        Self {
            nodes: [MotiveNode1f::new(value, velocity, 0), MotiveNode1f::new(0.0, 0.0, 0)],
            num_nodes: 1,
        }
    }

    /// Keep the current state; arrive at `value` with `velocity` after `time`.
    pub const fn target(value: f32, velocity: f32, time: MotiveTime) -> Self {
        Self {
            nodes: [MotiveNode1f::new(value, velocity, time), MotiveNode1f::new(0.0, 0.0, 0)],
            num_nodes: 1,
        }
    }

    /// Override the current state, then head for a target.
    pub const fn current_to_target(
        current_value: f32,
        current_velocity: f32,
        target_value: f32,
        target_velocity: f32,
        target_time: MotiveTime,
    ) -> Self {
        Self {
            nodes: [
                MotiveNode1f::new(current_value, current_velocity, 0),
                MotiveNode1f::new(target_value, target_velocity, target_time),
            ],
            num_nodes: 2,
        }
    }

    /// Waypoints in time order.
    pub fn nodes(&self) -> &[MotiveNode1f] {
        &self.nodes[..self.num_nodes]
    }

    /// The waypoint at time 0, if this target overrides the current state.
    pub fn override_node(&self) -> Option<&MotiveNode1f> {
        self.nodes().first().filter(|node| node.time == 0)
    }

    /// The final waypoint.
    pub fn goal(&self) -> &MotiveNode1f {
        &self.nodes[self.num_nodes - 1]
    }
}

// =============================================================================
// Spline Playback
// =============================================================================

/// One key of a piecewise curve.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SplineKey {
    pub time: MotiveTime,
    pub value: f32,
}

impl SplineKey {
    pub const fn new(time: MotiveTime, value: f32) -> Self {
        Self { time, value }
    }
}

/// Playback parameters for a piecewise curve.
///
/// Keys must be sorted by time. Processors that support curve playback
/// interpolate between neighbouring keys.
#[derive(Debug, Clone, PartialEq)]
pub struct SplinePlayback {
    pub keys: Vec<SplineKey>,
    /// Time into the curve at which playback starts.
    pub start_time: MotiveTime,
    /// Loop back to the first key after the last one.
    pub repeat: bool,
    /// Multiplier on `delta_time`. 1.0 plays at authored speed.
    pub playback_rate: f32,
}

impl SplinePlayback {
    pub fn new(keys: Vec<SplineKey>) -> Self {
        Self {
            keys,
            start_time: 0,
            repeat: false,
            playback_rate: 1.0,
        }
    }

    pub fn with_start_time(mut self, start_time: MotiveTime) -> Self {
        self.start_time = start_time;
        self
    }

    pub fn with_repeat(mut self, repeat: bool) -> Self {
        self.repeat = repeat;
        self
    }

    pub fn with_playback_rate(mut self, playback_rate: f32) -> Self {
        self.playback_rate = playback_rate;
        self
    }

    /// Time of the last key (0 for an empty curve).
    pub fn end_time(&self) -> MotiveTime {
        self.keys.last().map(|key| key.time).unwrap_or(0)
    }

    /// Evaluate the curve at `time`, clamped to the key range.
    pub fn evaluate(&self, time: MotiveTime) -> f32 {
        let Some(first) = self.keys.first() else { return 0.0 };
        if time <= first.time {
            return first.value;
        }
        for pair in self.keys.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if time <= b.time {
                let span = (b.time - a.time) as f32;
                if span <= 0.0 {
                    return b.value;
                }
                let t = (time - a.time) as f32 / span;
                return a.value + (b.value - a.value) * t;
            }
        }
        self.keys[self.keys.len() - 1].value
    }

    /// Slope of the curve at `time` (value units per time unit).
    pub fn slope(&self, time: MotiveTime) -> f32 {
        for pair in self.keys.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if time >= a.time && time < b.time && b.time > a.time {
                return (b.value - a.value) / (b.time - a.time) as f32;
            }
        }
        0.0
    }
}
