//! Repetition state machine
//!
//! Two thresholds form a hysteresis band around the primary angle. A rep is
//! one full `Up -> Down -> Up` cycle; jitter inside the band never moves the
//! state, so a noisy angle hovering near a single boundary cannot double
//! count.

use serde::{Deserialize, Serialize};

use crate::error::{CoachError, Result};

/// Hysteresis thresholds on the primary angle, in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdConfig {
    /// At or above this the joint counts as extended
    pub up_threshold: f64,
    /// At or below this the joint counts as flexed
    pub down_threshold: f64,
}

impl ThresholdConfig {
    pub const SQUAT: ThresholdConfig = ThresholdConfig {
        up_threshold: 150.0,
        down_threshold: 110.0,
    };

    pub const PUSHUP: ThresholdConfig = ThresholdConfig {
        up_threshold: 160.0,
        down_threshold: 90.0,
    };

    /// Build a validated band
    pub fn new(up_threshold: f64, down_threshold: f64) -> Result<Self> {
        let config = Self {
            up_threshold,
            down_threshold,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.up_threshold.is_finite()
            || !self.down_threshold.is_finite()
            || self.down_threshold >= self.up_threshold
        {
            return Err(CoachError::InvalidThresholds {
                up: self.up_threshold,
                down: self.down_threshold,
            });
        }
        Ok(())
    }
}

/// Hysteresis phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RepPhase {
    /// Resting / extended
    Up,
    /// Flexed / bottom position
    Down,
}

/// Snapshot of a counter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RepState {
    pub phase: RepPhase,
    pub count: u32,
}

impl Default for RepState {
    fn default() -> Self {
        Self {
            phase: RepPhase::Up,
            count: 0,
        }
    }
}

/// Callback invoked with the new total each time a rep completes
pub type RepCallback = Box<dyn FnMut(u32) + Send>;

/// Counts repetitions from a stream of primary angles
pub struct RepCounter {
    config: ThresholdConfig,
    state: RepState,
    on_rep: RepCallback,
}

impl std::fmt::Debug for RepCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepCounter")
            .field("config", &self.config)
            .field("state", &self.state)
            .finish()
    }
}

impl RepCounter {
    /// Create a counter in the `Up` phase with a zero count.
    ///
    /// Refuses to build with an inverted or non-finite band.
    pub fn new<F>(config: ThresholdConfig, on_rep: F) -> Result<Self>
    where
        F: FnMut(u32) + Send + 'static,
    {
        config.validate()?;
        Ok(Self {
            config,
            state: RepState::default(),
            on_rep: Box::new(on_rep),
        })
    }

    /// Feed one primary angle.
    ///
    /// On a `Down -> Up` crossing the count is incremented and the callback
    /// runs before this returns. Non-finite input is ignored.
    pub fn update(&mut self, angle: f64) {
        if !angle.is_finite() {
            return;
        }

        match self.state.phase {
            RepPhase::Up => {
                if angle <= self.config.down_threshold {
                    self.state.phase = RepPhase::Down;
                }
            }
            RepPhase::Down => {
                if angle >= self.config.up_threshold {
                    self.state.phase = RepPhase::Up;
                    self.state.count += 1;
                    (self.on_rep)(self.state.count);
                }
            }
        }
    }

    /// Back to `Up` with a zero count
    pub fn reset(&mut self) {
        self.state = RepState::default();
    }

    pub fn state(&self) -> RepState {
        self.state
    }

    pub fn count(&self) -> u32 {
        self.state.count
    }

    pub fn phase(&self) -> RepPhase {
        self.state.phase
    }

    pub fn config(&self) -> ThresholdConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn recording_counter(config: ThresholdConfig) -> (RepCounter, Arc<Mutex<Vec<u32>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let counter = RepCounter::new(config, move |count| sink.lock().push(count)).unwrap();
        (counter, seen)
    }

    fn feed(counter: &mut RepCounter, angles: &[f64]) {
        for &angle in angles {
            counter.update(angle);
        }
    }

    #[test]
    fn test_single_full_cycle() {
        let (mut counter, seen) = recording_counter(ThresholdConfig::PUSHUP);
        feed(&mut counter, &[170.0, 150.0, 95.0, 85.0, 170.0]);

        assert_eq!(counter.count(), 1);
        assert_eq!(counter.phase(), RepPhase::Up);
        assert_eq!(*seen.lock(), vec![1]);
    }

    #[test]
    fn test_never_reaching_bottom_counts_nothing() {
        let (mut counter, seen) = recording_counter(ThresholdConfig::PUSHUP);
        feed(&mut counter, &[170.0, 120.0, 140.0, 170.0]);

        assert_eq!(counter.count(), 0);
        assert_eq!(counter.phase(), RepPhase::Up);
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn test_oscillation_inside_band_does_not_double_count() {
        let (mut counter, seen) = recording_counter(ThresholdConfig::PUSHUP);
        feed(&mut counter, &[85.0, 100.0, 89.0, 120.0, 91.0, 159.9, 160.0, 159.0, 161.0, 170.0]);

        assert_eq!(counter.count(), 1);
        assert_eq!(*seen.lock(), vec![1]);
    }

    #[test]
    fn test_thresholds_are_inclusive() {
        let (mut counter, _) = recording_counter(ThresholdConfig::PUSHUP);
        counter.update(90.0);
        assert_eq!(counter.phase(), RepPhase::Down);
        counter.update(160.0);
        assert_eq!(counter.phase(), RepPhase::Up);
        assert_eq!(counter.count(), 1);
    }

    #[test]
    fn test_callback_sees_each_total_once() {
        let (mut counter, seen) = recording_counter(ThresholdConfig::SQUAT);
        for _ in 0..3 {
            feed(&mut counter, &[170.0, 100.0, 105.0, 155.0, 152.0]);
        }
        assert_eq!(*seen.lock(), vec![1, 2, 3]);
    }

    #[test]
    fn test_sentinel_zero_only_moves_down() {
        let (mut counter, seen) = recording_counter(ThresholdConfig::PUSHUP);
        feed(&mut counter, &[0.0, 0.0, 0.0]);
        assert_eq!(counter.phase(), RepPhase::Down);
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn test_non_finite_angle_is_ignored() {
        let (mut counter, _) = recording_counter(ThresholdConfig::PUSHUP);
        counter.update(80.0);
        counter.update(f64::NAN);
        counter.update(f64::INFINITY);
        assert_eq!(counter.phase(), RepPhase::Down);
        assert_eq!(counter.count(), 0);
    }

    #[test]
    fn test_reset() {
        let (mut counter, _) = recording_counter(ThresholdConfig::PUSHUP);
        feed(&mut counter, &[80.0, 170.0, 80.0]);
        assert_eq!(counter.state(), RepState { phase: RepPhase::Down, count: 1 });

        counter.reset();
        assert_eq!(counter.state(), RepState::default());
    }

    #[test]
    fn test_rejects_invalid_band() {
        assert!(matches!(
            ThresholdConfig::new(90.0, 160.0),
            Err(CoachError::InvalidThresholds { .. })
        ));
        assert!(ThresholdConfig::new(120.0, 120.0).is_err());
        assert!(ThresholdConfig::new(f64::NAN, 90.0).is_err());

        let inverted = ThresholdConfig {
            up_threshold: 80.0,
            down_threshold: 100.0,
        };
        assert!(RepCounter::new(inverted, |_| {}).is_err());
    }
}
