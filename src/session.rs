use serde::{Deserialize, Serialize};

pub const START_LABEL: &str = "Start walk";
pub const STOP_LABEL: &str = "Stop walk";

/// Knobs for step detection and fix filtering
#[derive(Debug, Clone, PartialEq)]
pub struct Tuning {
    /// Acceleration magnitude (m/s², gravity included) a sample must exceed to count as a step
    pub step_threshold: f64,
    /// Minimum time between two registered steps
    pub step_debounce_ms: u64,
    /// Fixes reporting a worse accuracy than this are dropped; `None` keeps every fix
    pub max_fix_accuracy_m: Option<f64>,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            step_threshold: 16.0,
            step_debounce_ms: 500,
            max_fix_accuracy_m: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub elapsed_seconds: u64,
    pub distance_meters: f64,
    pub step_count: u64,
    pub running: bool,
}

impl SessionState {
    pub fn is_zeroed(&self) -> bool {
        self.elapsed_seconds == 0 && self.distance_meters == 0.0 && self.step_count == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElapsedParts {
    pub hours: u64,
    pub minutes: u64,
    pub seconds: u64,
}

impl From<u64> for ElapsedParts {
    fn from(total: u64) -> Self {
        Self {
            hours: total / 3600,
            minutes: (total % 3600) / 60,
            seconds: total % 60,
        }
    }
}

pub fn format_elapsed(seconds: u64) -> String {
    let parts = ElapsedParts::from(seconds);
    format!("{}h {:02}m {:02}s", parts.hours, parts.minutes, parts.seconds)
}

/// Elapsed time without the seconds component
pub fn format_elapsed_short(seconds: u64) -> String {
    let parts = ElapsedParts::from(seconds);
    format!("{}h {:02}m", parts.hours, parts.minutes)
}

pub fn format_distance(meters: f64) -> String {
    format!("{:.1}km", meters / 1000.0)
}

/// Everything a front end needs to draw the tracker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Display {
    pub elapsed: String,
    pub distance: String,
    pub steps: String,
    pub toggle_label: &'static str,
}

impl From<&SessionState> for Display {
    fn from(state: &SessionState) -> Self {
        Self {
            elapsed: format_elapsed(state.elapsed_seconds),
            distance: format_distance(state.distance_meters),
            steps: state.step_count.to_string(),
            toggle_label: if state.running { STOP_LABEL } else { START_LABEL },
        }
    }
}
