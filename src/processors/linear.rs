//! Linear Processor - Constant-velocity scalar motion.
//!
//! Each motivator moves toward its target value at the constant velocity that
//! reaches it exactly at the target time. Curve playback interpolates linearly
//! between keys.
//!
//! Payload arrays (one entry per index):
//! - values / velocities: current state
//! - target_values / target_velocities / target_times: current goal
//! - curves: active curve playback, if any

use std::any::Any;

use tracing::{trace, warn};

use crate::engine::{
    EngineConfig, MotiveEngine, MotiveProcessor, ProcessorCore, ProcessorHandle, ProcessorLifecycle, ScalarProcessor,
};
use crate::error::{MotiveError, Result};
use crate::types::{
    MotiveIndex, MotiveTarget1f, MotiveTime, MotivatorInit, MotivatorType, SplinePlayback,
};

/// Type of [`LinearProcessor`].
pub const LINEAR: MotivatorType = MotivatorType::new("linear");

/// Scalar processors run before anything that composes their output.
pub const LINEAR_PRIORITY: i32 = 0;

// =============================================================================
// Init
// =============================================================================

/// Initial state of a linear motivator. It starts at rest on `value`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LinearInit {
    pub value: f32,
}

impl LinearInit {
    pub const fn new(value: f32) -> Self {
        Self { value }
    }
}

impl MotivatorInit for LinearInit {
    fn motivator_type(&self) -> MotivatorType {
        LINEAR
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// =============================================================================
// Processor
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
struct CurveState {
    playback: SplinePlayback,
    time: MotiveTime,
}

/// Linear interpolation toward discrete targets or along piecewise curves.
#[derive(Debug, Default)]
pub struct LinearProcessor {
    core: ProcessorCore,
    values: Vec<f32>,
    velocities: Vec<f32>,
    target_values: Vec<f32>,
    target_velocities: Vec<f32>,
    target_times: Vec<MotiveTime>,
    curves: Vec<Option<CurveState>>,
}

/// Factory registered with the engine.
pub fn create(config: &EngineConfig) -> ProcessorHandle {
    ProcessorHandle::scalar(LinearProcessor::new(config))
}

impl LinearProcessor {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            core: ProcessorCore::new().with_defragment_threshold(config.defragment_threshold),
            ..Default::default()
        }
    }

    fn reset_index(&mut self, index: MotiveIndex) {
        self.values[index] = 0.0;
        self.velocities[index] = 0.0;
        self.target_values[index] = 0.0;
        self.target_velocities[index] = 0.0;
        self.target_times[index] = 0;
        self.curves[index] = None;
    }

    fn advance_target(&mut self, index: MotiveIndex, delta_time: MotiveTime) {
        let remaining = self.target_times[index];
        if remaining <= 0 {
            return;
        }
        let step = delta_time.clamp(0, remaining);
        self.values[index] += self.velocities[index] * step as f32;
        self.target_times[index] = remaining - step;

        if self.target_times[index] == 0 {
            self.values[index] = self.target_values[index];
            self.velocities[index] = self.target_velocities[index];
        }
    }

    fn advance_curve(&mut self, index: MotiveIndex, delta_time: MotiveTime) {
        let Some(curve) = self.curves[index].as_mut() else { return };

        let step = (delta_time.max(0) as f32 * curve.playback.playback_rate).round() as MotiveTime;
        let end_time = curve.playback.end_time();
        curve.time = curve.time.saturating_add(step);
        if curve.playback.repeat && end_time > 0 {
            curve.time = curve.time.rem_euclid(end_time);
        }

        let time = curve.time;
        self.values[index] = curve.playback.evaluate(time);
        self.velocities[index] = curve.playback.slope(time);
        self.target_values[index] = curve.playback.evaluate(end_time);
        self.target_velocities[index] = 0.0;
        self.target_times[index] = end_time.saturating_sub(time).max(0);

        if !curve.playback.repeat && time >= end_time {
            self.velocities[index] = 0.0;
            self.curves[index] = None;
        }
    }
}

impl MotiveProcessor for LinearProcessor {
    fn core(&self) -> &ProcessorCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ProcessorCore {
        &mut self.core
    }

    fn advance_frame(&mut self, delta_time: MotiveTime) {
        self.defragment_if_needed();

        let num_indices = self.core.num_indices();
        let mut index = 0;
        while index < num_indices {
            if !self.valid_index(index) {
                index += 1;
                continue;
            }
            // Every slot of a multi-dimensional motivator advances
            let end = index + self.dimensions(index);
            for slot in index..end {
                if self.curves[slot].is_some() {
                    self.advance_curve(slot, delta_time);
                } else {
                    self.advance_target(slot, delta_time);
                }
            }
            index = end;
        }
    }

    fn motivator_type(&self) -> MotivatorType {
        LINEAR
    }

    fn priority(&self) -> i32 {
        LINEAR_PRIORITY
    }

    fn initialize_index(&mut self, init: &dyn MotivatorInit, index: MotiveIndex, _engine: &MotiveEngine) -> Result<()> {
        let init = init.as_any().downcast_ref::<LinearInit>().ok_or(MotiveError::WrongInit {
            expected: LINEAR,
            found: init.motivator_type(),
        })?;
        for slot in index..index + self.dimensions(index) {
            self.reset_index(slot);
            self.values[slot] = init.value;
            self.target_values[slot] = init.value;
        }
        Ok(())
    }

    fn remove_index(&mut self, index: MotiveIndex) {
        for slot in index..index + self.dimensions(index) {
            self.reset_index(slot);
        }
    }

    fn move_index(&mut self, old_index: MotiveIndex, new_index: MotiveIndex) {
        self.values[new_index] = self.values[old_index];
        self.velocities[new_index] = self.velocities[old_index];
        self.target_values[new_index] = self.target_values[old_index];
        self.target_velocities[new_index] = self.target_velocities[old_index];
        self.target_times[new_index] = self.target_times[old_index];
        self.curves[new_index] = self.curves[old_index].take();
    }

    fn set_num_indices(&mut self, num_indices: MotiveIndex) {
        self.values.resize(num_indices, 0.0);
        self.velocities.resize(num_indices, 0.0);
        self.target_values.resize(num_indices, 0.0);
        self.target_velocities.resize(num_indices, 0.0);
        self.target_times.resize(num_indices, 0);
        self.curves.resize_with(num_indices, || None);
    }

    fn payload_len(&self) -> Option<MotiveIndex> {
        Some(self.values.len())
    }
}

impl ScalarProcessor for LinearProcessor {
    fn value(&self, index: MotiveIndex) -> f32 {
        self.values[index]
    }

    fn velocity(&self, index: MotiveIndex) -> f32 {
        self.velocities[index]
    }

    fn target_value(&self, index: MotiveIndex) -> f32 {
        self.target_values[index]
    }

    fn target_velocity(&self, index: MotiveIndex) -> f32 {
        self.target_velocities[index]
    }

    fn difference(&self, index: MotiveIndex) -> f32 {
        self.target_values[index] - self.values[index]
    }

    fn target_time(&self, index: MotiveIndex) -> MotiveTime {
        self.target_times[index]
    }

    fn set_target(&mut self, index: MotiveIndex, target: &MotiveTarget1f) {
        self.curves[index] = None;

        if let Some(current) = target.override_node() {
            self.values[index] = current.value;
            self.velocities[index] = current.velocity;
        }

        let goal = *target.goal();
        self.target_values[index] = goal.value;
        self.target_velocities[index] = goal.velocity;
        if goal.time > 0 {
            self.target_times[index] = goal.time;
            self.velocities[index] = (goal.value - self.values[index]) / goal.time as f32;
        } else {
            self.target_times[index] = 0;
            self.values[index] = goal.value;
            self.velocities[index] = goal.velocity;
        }
        trace!(index, target = goal.value, time = goal.time, "linear target set");
    }

    fn set_spline(&mut self, index: MotiveIndex, playback: &SplinePlayback) {
        let mut curve = CurveState {
            playback: playback.clone(),
            time: playback.start_time,
        };
        // Playback only runs forward
        let rate = curve.playback.playback_rate;
        if rate.is_nan() || rate < 0.0 {
            warn!(index, rate, "negative playback rate clamped to 0");
            curve.playback.playback_rate = 0.0;
        }
        if curve.playback.repeat && curve.playback.end_time() > 0 {
            curve.time = curve.time.rem_euclid(curve.playback.end_time());
        }

        let time = curve.time;
        let end_time = curve.playback.end_time();
        self.values[index] = curve.playback.evaluate(time);
        self.velocities[index] = curve.playback.slope(time);
        self.target_values[index] = curve.playback.evaluate(end_time);
        self.target_velocities[index] = 0.0;
        self.target_times[index] = end_time.saturating_sub(time).max(0);
        self.curves[index] = Some(curve);
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::engine::MotivatorLink;
    use crate::types::SplineKey;

    fn setup() -> (LinearProcessor, MotiveEngine) {
        (LinearProcessor::new(&EngineConfig::default()), MotiveEngine::default())
    }

    fn add(processor: &mut LinearProcessor, engine: &MotiveEngine, value: f32) -> (Rc<MotivatorLink>, MotiveIndex) {
        let link = Rc::new(MotivatorLink::new());
        let index = processor
            .initialize_motivator(&LinearInit::new(value), engine, &link, 1)
            .unwrap();
        (link, index)
    }

    #[test]
    fn test_initial_state() {
        let (mut processor, engine) = setup();
        let (_, index) = add(&mut processor, &engine, 2.0);

        assert_eq!(processor.value(index), 2.0);
        assert_eq!(processor.velocity(index), 0.0);
        assert_eq!(processor.target_value(index), 2.0);
        assert_eq!(processor.difference(index), 0.0);
        assert_eq!(processor.target_time(index), 0);
    }

    #[test]
    fn test_reaches_target() {
        let (mut processor, engine) = setup();
        let (_, index) = add(&mut processor, &engine, 0.0);

        processor.set_target(index, &MotiveTarget1f::target(10.0, 0.0, 100));
        assert_eq!(processor.velocity(index), 0.1);
        assert_eq!(processor.target_time(index), 100);

        processor.advance_frame(50);
        assert!((processor.value(index) - 5.0).abs() < 1e-5);
        assert_eq!(processor.target_time(index), 50);
        assert!((processor.difference(index) - 5.0).abs() < 1e-5);

        // Overshooting the remaining time lands exactly on target
        processor.advance_frame(80);
        assert_eq!(processor.value(index), 10.0);
        assert_eq!(processor.velocity(index), 0.0);
        assert_eq!(processor.target_time(index), 0);
    }

    #[test]
    fn test_current_target_snaps() {
        let (mut processor, engine) = setup();
        let (_, index) = add(&mut processor, &engine, 0.0);

        processor.set_target(index, &MotiveTarget1f::current(4.0, 0.0));
        assert_eq!(processor.value(index), 4.0);
        assert_eq!(processor.target_value(index), 4.0);
    }

    #[test]
    fn test_current_to_target() {
        let (mut processor, engine) = setup();
        let (_, index) = add(&mut processor, &engine, 0.0);

        processor.set_target(index, &MotiveTarget1f::current_to_target(10.0, 0.0, 20.0, 0.0, 10));
        assert_eq!(processor.value(index), 10.0);
        assert_eq!(processor.velocity(index), 1.0);

        processor.advance_frame(10);
        assert_eq!(processor.value(index), 20.0);
    }

    #[test]
    fn test_curve_playback() {
        let (mut processor, engine) = setup();
        let (_, index) = add(&mut processor, &engine, 0.0);
        let playback = SplinePlayback::new(vec![SplineKey::new(0, 0.0), SplineKey::new(100, 50.0)]);

        processor.set_spline(index, &playback);
        assert_eq!(processor.target_value(index), 50.0);
        assert_eq!(processor.target_time(index), 100);

        processor.advance_frame(40);
        assert_eq!(processor.value(index), 20.0);
        assert_eq!(processor.velocity(index), 0.5);

        processor.advance_frame(100);
        assert_eq!(processor.value(index), 50.0);
        assert_eq!(processor.velocity(index), 0.0);
        assert!(processor.curves[index].is_none());
    }

    #[test]
    fn test_curve_repeat() {
        let (mut processor, engine) = setup();
        let (_, index) = add(&mut processor, &engine, 0.0);
        let playback = SplinePlayback::new(vec![SplineKey::new(0, 0.0), SplineKey::new(100, 100.0)])
            .with_repeat(true);

        processor.set_spline(index, &playback);
        processor.advance_frame(150);
        assert_eq!(processor.value(index), 50.0);
        assert!(processor.curves[index].is_some());
    }

    #[test]
    fn test_target_cancels_curve() {
        let (mut processor, engine) = setup();
        let (_, index) = add(&mut processor, &engine, 0.0);
        processor.set_spline(index, &SplinePlayback::new(vec![SplineKey::new(0, 0.0), SplineKey::new(10, 1.0)]));

        processor.set_target(index, &MotiveTarget1f::current(7.0, 0.0));
        assert!(processor.curves[index].is_none());
        processor.advance_frame(5);
        assert_eq!(processor.value(index), 7.0);
    }

    #[test]
    fn test_defragment_keeps_motion() {
        let (mut processor, engine) = setup();
        let (first, _) = add(&mut processor, &engine, 0.0);
        let (second, second_index) = add(&mut processor, &engine, 0.0);
        processor.set_target(second_index, &MotiveTarget1f::target(10.0, 0.0, 10));

        processor.remove_motivator(first.index().unwrap()).unwrap();
        processor.advance_frame(5);

        let index = second.index().unwrap();
        assert_eq!(index, 0);
        assert_eq!(processor.value(index), 5.0);
        assert_eq!(processor.target_time(index), 5);
        assert_eq!(processor.values.len(), 1);
        processor.verify_internal_state().unwrap();
    }

    #[test]
    fn test_multi_dimension_seeds_every_slot() {
        let (mut processor, engine) = setup();
        let link = Rc::new(MotivatorLink::new());
        let index = processor
            .initialize_motivator(&LinearInit::new(3.0), &engine, &link, 3)
            .unwrap();

        assert_eq!(&processor.values[index..index + 3], &[3.0, 3.0, 3.0]);
        processor.remove_motivator(index).unwrap();
        assert_eq!(&processor.values[index..index + 3], &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_multi_dimension_advances_every_slot() {
        let (mut processor, engine) = setup();
        let link = Rc::new(MotivatorLink::new());
        let index = processor
            .initialize_motivator(&LinearInit::new(0.0), &engine, &link, 2)
            .unwrap();

        processor.set_target(index, &MotiveTarget1f::target(4.0, 0.0, 4));
        processor.set_target(index + 1, &MotiveTarget1f::target(8.0, 0.0, 4));
        processor.advance_frame(4);

        assert_eq!(processor.value(index), 4.0);
        assert_eq!(processor.value(index + 1), 8.0);
    }

    #[test]
    fn test_curve_from_start_time_survives_huge_frame() {
        let (mut processor, engine) = setup();
        let (_, index) = add(&mut processor, &engine, 0.0);
        let playback = SplinePlayback::new(vec![SplineKey::new(0, 0.0), SplineKey::new(100, 1.0)]).with_start_time(50);

        processor.set_spline(index, &playback);
        assert_eq!(processor.value(index), 0.5);
        assert_eq!(processor.target_time(index), 50);

        processor.advance_frame(MotiveTime::MAX);
        assert_eq!(processor.value(index), 1.0);
        assert_eq!(processor.target_time(index), 0);
        assert!(processor.curves[index].is_none());
    }

    #[test]
    fn test_negative_playback_rate_holds_position() {
        let (mut processor, engine) = setup();
        let (_, index) = add(&mut processor, &engine, 0.0);
        let playback = SplinePlayback::new(vec![SplineKey::new(0, 0.0), SplineKey::new(100, 1.0)])
            .with_start_time(20)
            .with_playback_rate(-3.0);

        processor.set_spline(index, &playback);
        for _ in 0..4 {
            processor.advance_frame(MotiveTime::MAX);
        }
        assert_eq!(processor.value(index), 0.2);
        assert_eq!(processor.target_time(index), 80);
    }

    #[test]
    fn test_negative_delta_time_is_ignored() {
        let (mut processor, engine) = setup();
        let (_, index) = add(&mut processor, &engine, 0.0);
        processor.set_target(index, &MotiveTarget1f::target(10.0, 0.0, 10));

        processor.advance_frame(MotiveTime::MIN);
        assert_eq!(processor.value(index), 0.0);
        assert_eq!(processor.target_time(index), 10);
    }

    #[test]
    fn test_foreign_init_rejected() {
        struct Impostor;

        impl MotivatorInit for Impostor {
            fn motivator_type(&self) -> MotivatorType {
                LINEAR
            }

            fn as_any(&self) -> &dyn Any {
                self
            }
        }

        let (mut processor, engine) = setup();
        let link = Rc::new(MotivatorLink::new());
        let err = processor
            .initialize_motivator(&Impostor, &engine, &link, 1)
            .unwrap_err();

        assert_eq!(err, MotiveError::WrongInit { expected: LINEAR, found: LINEAR });
        assert!(!link.is_bound());
        assert_eq!(processor.core().live_count(), 0);
        processor.verify_internal_state().unwrap();
    }
}
