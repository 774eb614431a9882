use chrono::{DateTime, Duration, Local};
use serde::{Deserialize, Serialize};

/// Raw acceleration report (gravity included), in m/s²
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionSample {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub captured_at: DateTime<Local>,
}

impl MotionSample {
    pub fn new(x: f64, y: f64, z: f64, captured_at: DateTime<Local>) -> Self {
        Self {
            x,
            y,
            z,
            captured_at,
        }
    }

    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

/// Threshold + debounce step detector.
///
/// A sample counts as a step when its magnitude is strictly above the
/// threshold and strictly more than the debounce window has passed since the
/// previous step. Before the first step the debounce gate is open.
#[derive(Debug, Clone)]
pub struct StepDetector {
    threshold: f64,
    debounce: Duration,
    last_step_at: Option<DateTime<Local>>,
}

impl StepDetector {
    pub fn new(threshold: f64, debounce_ms: u64) -> Self {
        Self {
            threshold,
            debounce: Duration::milliseconds(debounce_ms as i64),
            last_step_at: None,
        }
    }

    pub fn last_step_at(&self) -> Option<DateTime<Local>> {
        self.last_step_at
    }

    /// Returns true if `sample` registers a step, updating the step timestamp
    pub fn detect(&mut self, sample: &MotionSample) -> bool {
        if sample.magnitude() <= self.threshold {
            return false;
        }

        let now = sample.captured_at;
        let debounced = match self.last_step_at {
            Some(last) => now - last > self.debounce,
            None => true,
        };

        if debounced {
            self.last_step_at = Some(now);
        }
        debounced
    }

    /// Restart the debounce window at `now`
    pub fn reset(&mut self, now: DateTime<Local>) {
        self.last_step_at = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(ms: i64) -> DateTime<Local> {
        Local.timestamp_millis_opt(1_700_000_000_000 + ms).unwrap()
    }

    #[test]
    fn test_magnitude() {
        let s = MotionSample::new(3.0, 4.0, 12.0, at(0));
        assert_eq!(s.magnitude(), 13.0);
    }

    #[test]
    fn test_below_threshold_is_ignored() {
        let mut detector = StepDetector::new(16.0, 500);
        assert!(!detector.detect(&MotionSample::new(0.0, 0.0, 9.81, at(0))));
        assert!(!detector.detect(&MotionSample::new(0.0, 0.0, 16.0, at(1000))));
        assert_eq!(detector.last_step_at(), None);
    }

    #[test]
    fn test_first_spike_counts() {
        let mut detector = StepDetector::new(16.0, 500);
        assert!(detector.detect(&MotionSample::new(0.0, 5.0, 17.0, at(0))));
        assert_eq!(detector.last_step_at(), Some(at(0)));
    }

    #[test]
    fn test_spike_inside_debounce_window_is_ignored() {
        let mut detector = StepDetector::new(16.0, 500);
        assert!(detector.detect(&MotionSample::new(0.0, 0.0, 20.0, at(0))));
        assert!(!detector.detect(&MotionSample::new(0.0, 0.0, 20.0, at(300))));
        // exactly at the window edge is still inside it
        assert!(!detector.detect(&MotionSample::new(0.0, 0.0, 20.0, at(500))));
        assert!(detector.detect(&MotionSample::new(0.0, 0.0, 20.0, at(501))));
        assert_eq!(detector.last_step_at(), Some(at(501)));
    }

    #[test]
    fn test_reset_restarts_window() {
        let mut detector = StepDetector::new(16.0, 500);
        detector.reset(at(0));
        assert!(!detector.detect(&MotionSample::new(0.0, 0.0, 20.0, at(200))));
        assert!(detector.detect(&MotionSample::new(0.0, 0.0, 20.0, at(700))));
    }
}
