//! The walk session controller.
//!
//! [`SessionTracker`] owns the session counters and is the only place they
//! change. Every event the host delivers (ticks, fixes, motion samples,
//! permission outcomes, user commands) goes through one of its methods, and
//! every counter mutation is written through to the [`KeyValueStore`].

use chrono::{DateTime, Duration, Local};
use std::cell::Cell;
use std::rc::Rc;
use tracing::{debug, info, warn};

use crate::geo::GeoFix;
use crate::motion::{MotionSample, StepDetector};
use crate::path::{PathRenderer, PolylinePath};
use crate::session::{Display, SessionState, Tuning};
use crate::store::{keys, KeyValueStore};

pub trait Clock {
    fn now(&self) -> DateTime<Local>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// Clock driven by the caller; clones share the same time
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Rc<Cell<DateTime<Local>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Local>) -> Self {
        Self {
            now: Rc::new(Cell::new(start)),
        }
    }

    pub fn set(&self, now: DateTime<Local>) {
        self.now.set(now);
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Local> {
        self.now.get()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum PermissionOutcome {
    Granted,
    Denied,
    Unsupported,
}

/// Device capabilities the tracker switches on and off around a session
pub trait SensorHub {
    fn start_ticker(&mut self);
    fn stop_ticker(&mut self);
    fn watch_position(&mut self);
    fn clear_watch(&mut self);
    /// Ask for motion-sensor access. Platforms that decide on the spot return
    /// the outcome; otherwise return `None` and deliver it later through
    /// [`SessionTracker::on_motion_permission`] with the same ticket.
    fn request_motion_permission(&mut self, ticket: u64) -> Option<PermissionOutcome>;
    fn subscribe_motion(&mut self);
    fn unsubscribe_motion(&mut self);
}

/// Sensor hub for hosts that only inspect or reset stored counters
#[derive(Debug, Clone, Copy, Default)]
pub struct IdleSensors;

impl SensorHub for IdleSensors {
    fn start_ticker(&mut self) {}
    fn stop_ticker(&mut self) {}
    fn watch_position(&mut self) {}
    fn clear_watch(&mut self) {}
    fn request_motion_permission(&mut self, _ticket: u64) -> Option<PermissionOutcome> {
        Some(PermissionOutcome::Unsupported)
    }
    fn subscribe_motion(&mut self) {}
    fn unsubscribe_motion(&mut self) {}
}

pub struct SessionTracker<R: PathRenderer = PolylinePath> {
    state: SessionState,
    tuning: Tuning,
    store: Box<dyn KeyValueStore>,
    sensors: Box<dyn SensorHub>,
    clock: Box<dyn Clock>,
    path: R,
    last_fix: Option<GeoFix>,
    detector: StepDetector,
    motion_subscribed: bool,
    permission_ticket: u64,
}

impl<R: PathRenderer> SessionTracker<R> {
    /// Build a tracker and restore the persisted counters
    pub fn new(
        store: Box<dyn KeyValueStore>,
        sensors: Box<dyn SensorHub>,
        clock: Box<dyn Clock>,
        path: R,
        tuning: Tuning,
    ) -> Self {
        let detector = StepDetector::new(tuning.step_threshold, tuning.step_debounce_ms);
        let mut tracker = Self {
            state: SessionState::default(),
            tuning,
            store,
            sensors,
            clock,
            path,
            last_fix: None,
            detector,
            motion_subscribed: false,
            permission_ticket: 0,
        };
        tracker.restore();
        tracker
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_running(&self) -> bool {
        self.state.running
    }

    pub fn display(&self) -> Display {
        Display::from(&self.state)
    }

    pub fn path(&self) -> &R {
        &self.path
    }

    pub fn store(&self) -> &dyn KeyValueStore {
        self.store.as_ref()
    }

    pub fn tuning(&self) -> &Tuning {
        &self.tuning
    }

    pub fn last_fix(&self) -> Option<&GeoFix> {
        self.last_fix.as_ref()
    }

    pub fn last_step_at(&self) -> Option<DateTime<Local>> {
        self.detector.last_step_at()
    }

    pub fn motion_subscribed(&self) -> bool {
        self.motion_subscribed
    }

    /// Load the persisted counters; absent or unreadable values become zero
    pub fn restore(&mut self) {
        self.state.elapsed_seconds = self.read_counter(keys::WALK_TIME);
        self.state.step_count = self.read_counter(keys::WALK_STEPS);
        self.state.distance_meters = self.read_counter(keys::WALK_DISTANCE);
        debug!(state = ?self.state, "restored session");
    }

    pub fn toggle(&mut self) {
        if self.state.running {
            self.stop();
        } else {
            self.start();
        }
    }

    fn start(&mut self) {
        let now = self.clock.now();
        self.state.running = true;
        self.last_fix = None;
        self.persist(keys::WALK_START_TIME, &now.to_rfc3339());

        self.sensors.start_ticker();
        self.sensors.watch_position();

        self.permission_ticket += 1;
        match self
            .sensors
            .request_motion_permission(self.permission_ticket)
        {
            Some(outcome) => self.apply_permission(outcome),
            None => debug!(ticket = self.permission_ticket, "motion permission pending"),
        }
        info!(started_at = %now, "walk started");
    }

    fn stop(&mut self) {
        let now = self.clock.now();
        self.state.running = false;

        self.sensors.stop_ticker();
        self.sensors.clear_watch();
        if self.motion_subscribed {
            self.sensors.unsubscribe_motion();
            self.motion_subscribed = false;
        }

        let started = self.store.get(keys::WALK_START_TIME).unwrap_or_else(|e| {
            warn!("failed to read session start: {e}");
            None
        });
        if spans_day_boundary(started.as_deref(), now) {
            info!("walk crossed midnight, resetting counters");
            self.reset();
        }

        self.persist(keys::WALK_END_TIME, &now.to_rfc3339());
        info!(ended_at = %now, state = ?self.state, "walk stopped");
    }

    /// Outcome of a permission request that was left pending by the sensor hub
    pub fn on_motion_permission(&mut self, ticket: u64, outcome: PermissionOutcome) {
        if !self.state.running || ticket != self.permission_ticket {
            debug!(ticket, current = self.permission_ticket, "ignoring stale motion permission");
            return;
        }
        self.apply_permission(outcome);
    }

    fn apply_permission(&mut self, outcome: PermissionOutcome) {
        match outcome {
            PermissionOutcome::Granted => {
                if !self.motion_subscribed {
                    self.sensors.subscribe_motion();
                    self.motion_subscribed = true;
                }
            }
            PermissionOutcome::Denied => {
                warn!("motion permission denied, steps will not be counted")
            }
            PermissionOutcome::Unsupported => {
                warn!("motion sensor not supported, steps will not be counted")
            }
        }
    }

    pub fn on_tick(&mut self) {
        if !self.state.running {
            return;
        }
        self.state.elapsed_seconds += 1;
        self.persist(keys::WALK_TIME, &self.state.elapsed_seconds.to_string());
    }

    pub fn on_geo_fix(&mut self, fix: GeoFix) {
        if !self.state.running {
            return;
        }
        if !fix.within_accuracy(self.tuning.max_fix_accuracy_m) {
            debug!(accuracy = ?fix.accuracy_m, "dropping imprecise fix");
            return;
        }

        self.path.append(&fix);
        if let Some(previous) = self.last_fix.replace(fix) {
            self.state.distance_meters += previous.distance_to(&fix);
            self.persist(keys::WALK_DISTANCE, &self.state.distance_meters.to_string());
        }
    }

    pub fn on_motion_sample(&mut self, sample: MotionSample) {
        if !self.state.running || !self.motion_subscribed {
            return;
        }
        if self.detector.detect(&sample) {
            self.state.step_count += 1;
            self.persist(keys::WALK_STEPS, &self.state.step_count.to_string());
        }
    }

    /// Zero the counters and forget the route
    pub fn reset(&mut self) {
        self.state.elapsed_seconds = 0;
        self.state.distance_meters = 0.0;
        self.state.step_count = 0;
        self.last_fix = None;
        self.detector.reset(self.clock.now());

        for key in keys::COUNTERS {
            if let Err(e) = self.store.remove(key) {
                warn!("failed to clear {key}: {e}");
            }
        }
        self.path.reset_path();
    }

    fn read_counter<T: std::str::FromStr + Default>(&self, key: &str) -> T {
        match self.store.get(key) {
            Ok(Some(raw)) => raw.parse().unwrap_or_else(|_| {
                warn!("ignoring malformed {key} value {raw:?}");
                T::default()
            }),
            Ok(None) => T::default(),
            Err(e) => {
                warn!("failed to read {key}: {e}");
                T::default()
            }
        }
    }

    fn persist(&self, key: &str, value: &str) {
        if let Err(e) = self.store.put(key, value) {
            warn!("failed to persist {key}: {e}");
        }
    }
}

/// Whether a session that began at `started` (RFC 3339) and ends at `ended`
/// covers more than one local calendar date
pub fn spans_day_boundary(started: Option<&str>, ended: DateTime<Local>) -> bool {
    started
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|s| s.with_timezone(&Local).date_naive() != ended.date_naive())
        .unwrap_or(false)
}
