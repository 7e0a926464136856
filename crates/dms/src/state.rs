//! Drowsiness state machine
//!
//! One counter per tracked subject. Each frame with a usable EAR either
//! extends the run of low-EAR frames or resets it to zero:
//!
//! ```text
//!            ear < thresh && count >= consec
//!   Awake ---------------------------------> Alerting
//!     ^                                         |
//!     +------------- ear >= thresh -------------+
//! ```

use serde::{Deserialize, Serialize};

use crate::DmsConfig;

/// Alert state of one subject
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrowsinessState {
    #[default]
    Awake,
    Alerting,
}

/// Edge produced by [`DrowsinessCounter::update`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateChange {
    AlertStarted,
    AlertStopped,
}

/// Consecutive low-EAR frame counter plus alert flag
#[derive(Debug, Clone, Default)]
pub struct DrowsinessCounter {
    count: u32,
    state: DrowsinessState,
}

impl DrowsinessCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one frame's EAR. Returns the edge, if this frame crossed one.
    ///
    /// Non-finite input is ignored and leaves the counter untouched.
    pub fn update(&mut self, ear: f32, config: &DmsConfig) -> Option<StateChange> {
        if !ear.is_finite() {
            return None;
        }

        if ear < config.ear_threshold {
            self.count = self.count.saturating_add(1);
            if self.count >= config.consec_frames && self.state == DrowsinessState::Awake {
                self.state = DrowsinessState::Alerting;
                return Some(StateChange::AlertStarted);
            }
            None
        } else {
            self.count = 0;
            if self.state == DrowsinessState::Alerting {
                self.state = DrowsinessState::Awake;
                return Some(StateChange::AlertStopped);
            }
            None
        }
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn state(&self) -> DrowsinessState {
        self.state
    }

    pub fn is_alerting(&self) -> bool {
        self.state == DrowsinessState::Alerting
    }

    /// Back to the initial state
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(counter: &mut DrowsinessCounter, ears: &[f32], config: &DmsConfig) -> Vec<(usize, StateChange)> {
        ears.iter()
            .enumerate()
            .filter_map(|(i, &ear)| counter.update(ear, config).map(|c| (i + 1, c)))
            .collect()
    }

    #[test]
    fn test_alert_fires_once_at_threshold_frame() {
        let config = DmsConfig::default();
        let mut counter = DrowsinessCounter::new();

        let changes = feed(&mut counter, &[0.1; 25], &config);

        assert_eq!(changes, vec![(20, StateChange::AlertStarted)]);
        assert_eq!(counter.count(), 25);
        assert!(counter.is_alerting());
    }

    #[test]
    fn test_interrupted_run_never_alerts() {
        let config = DmsConfig::default();
        let mut counter = DrowsinessCounter::new();

        let mut ears = vec![0.1; 19];
        ears.push(0.3);
        ears.extend(std::iter::repeat(0.1).take(19));

        assert!(feed(&mut counter, &ears, &config).is_empty());
        assert_eq!(counter.state(), DrowsinessState::Awake);
        assert_eq!(counter.count(), 19);
    }

    #[test]
    fn test_open_eyes_stop_alert() {
        let config = DmsConfig::default();
        let mut counter = DrowsinessCounter::new();
        feed(&mut counter, &[0.1; 20], &config);
        assert!(counter.is_alerting());

        assert_eq!(counter.update(0.3, &config), Some(StateChange::AlertStopped));
        assert_eq!(counter.count(), 0);
        assert_eq!(counter.state(), DrowsinessState::Awake);

        assert_eq!(counter.update(0.3, &config), None);
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let config = DmsConfig {
            consec_frames: 1,
            ..Default::default()
        };
        let mut counter = DrowsinessCounter::new();

        assert_eq!(counter.update(config.ear_threshold, &config), None);
        assert_eq!(counter.count(), 0);
        assert_eq!(counter.update(0.2499, &config), Some(StateChange::AlertStarted));
    }

    #[test]
    fn test_counter_resets_to_zero_from_any_value() {
        let config = DmsConfig::default();
        let mut counter = DrowsinessCounter::new();
        feed(&mut counter, &[0.2; 7], &config);
        assert_eq!(counter.count(), 7);

        counter.update(0.4, &config);
        assert_eq!(counter.count(), 0);
    }

    #[test]
    fn test_nan_ignored() {
        let config = DmsConfig::default();
        let mut counter = DrowsinessCounter::new();
        feed(&mut counter, &[0.1; 5], &config);

        assert_eq!(counter.update(f32::NAN, &config), None);
        assert_eq!(counter.count(), 5);
    }

    #[test]
    fn test_realert_after_recovery() {
        let config = DmsConfig {
            consec_frames: 3,
            ..Default::default()
        };
        let mut counter = DrowsinessCounter::new();

        let ears = [0.1, 0.1, 0.1, 0.1, 0.3, 0.1, 0.1, 0.1];
        assert_eq!(
            feed(&mut counter, &ears, &config),
            vec![
                (3, StateChange::AlertStarted),
                (5, StateChange::AlertStopped),
                (8, StateChange::AlertStarted),
            ]
        );
    }
}
