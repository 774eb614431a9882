use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, TimeZone};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use walkr::geo::GeoFix;
use walkr::motion::MotionSample;
use walkr::path::{PathRenderer, PolylinePath};
use walkr::runtime::{
    channel, dispatch, ChannelEventSource, FixedTicker, HostSensors, PermissionPolicy, Runner,
    SensorFlags, WalkEvent,
};
use walkr::session::{format_distance, format_elapsed, Tuning};
use walkr::store::{keys, KeyValueStore, MemoryStore, SqliteStore};
use walkr::trace::{read_trace, replay};
use walkr::tracker::{ManualClock, PermissionOutcome, SessionTracker};

// Drive a session the way the terminal app does: a runner pulling events off
// one channel, keys toggling, host sources gated by the sensor flags.
#[test]
fn headless_walk_flow() {
    let (tx, rx) = channel();
    let flags = Arc::new(SensorFlags::default());
    let sensors = HostSensors::new(flags.clone(), PermissionPolicy::NotRequired, tx.clone());
    let clock = ManualClock::new(Local.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap());

    let mut tracker: SessionTracker = SessionTracker::new(
        Box::new(MemoryStore::new()),
        Box::new(sensors),
        Box::new(clock.clone()),
        PolylinePath::new(),
        Tuning::default(),
    );

    let runner = Runner::new(
        ChannelEventSource::new(rx),
        FixedTicker::new(Duration::from_millis(5)),
    );

    let space = || WalkEvent::Key(KeyEvent::new(KeyCode::Char(' '), KeyModifiers::NONE));
    let at = |s| clock_at(&clock, s);

    tx.send(space()).unwrap();
    tx.send(WalkEvent::Fix(GeoFix::new(37.5665, 126.9780, at(0))))
        .unwrap();
    tx.send(WalkEvent::Tick).unwrap();
    tx.send(WalkEvent::Fix(GeoFix::new(37.5651, 126.9895, at(1))))
        .unwrap();
    tx.send(WalkEvent::Motion(MotionSample::new(12.0, 9.0, 6.0, at(1))))
        .unwrap();
    tx.send(WalkEvent::Tick).unwrap();
    tx.send(space()).unwrap();
    // arrives after the stop; the closed gate drops it
    tx.send(WalkEvent::Tick).unwrap();

    for _ in 0..100u32 {
        match runner.step() {
            WalkEvent::Key(key) if key.code == KeyCode::Char(' ') => tracker.toggle(),
            WalkEvent::Idle => break,
            event => {
                if flags.admits(&event) {
                    dispatch(&mut tracker, event);
                }
            }
        }
    }

    let state = *tracker.state();
    assert!(!state.running);
    assert_eq!(state.elapsed_seconds, 2);
    assert_eq!(state.step_count, 1);
    assert!(state.distance_meters > 1000.0 && state.distance_meters < 1050.0);
    assert_eq!(format_elapsed(state.elapsed_seconds), "0h 00m 02s");
    assert_eq!(format_distance(state.distance_meters), "1.0km");
    assert_eq!(tracker.path().points().len(), 2);
    assert_eq!(tracker.store().get(keys::WALK_STEPS).unwrap().as_deref(), Some("1"));
}

fn clock_at(clock: &ManualClock, seconds: i64) -> chrono::DateTime<Local> {
    let base = Local.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
    let now = base + chrono::Duration::seconds(seconds);
    clock.set(now);
    now
}

const TRACE: &str = "\
kind,t_ms,lat,lon,accuracy,x,y,z
fix,0,37.5665,126.9780,5,,,
motion,300,,,,0,0,20
motion,600,,,,0,0,20
motion,900,,,,0,0,20
fix,2500,37.5651,126.9895,5,,,
motion,3000,,,,1,1,1
";

#[test]
fn replayed_trace_counts_and_persists() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("walkr.db");
    let origin = Local.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
    let records = read_trace(Cursor::new(TRACE)).unwrap();

    let (tx, rx) = channel();
    let flags = Arc::new(SensorFlags::default());
    let sensors = HostSensors::new(
        flags.clone(),
        PermissionPolicy::Prompt(PermissionOutcome::Granted),
        tx,
    );
    let clock = ManualClock::new(origin);

    let mut tracker: SessionTracker = SessionTracker::new(
        Box::new(SqliteStore::open(&db).unwrap()),
        Box::new(sensors),
        Box::new(clock.clone()),
        PolylinePath::new(),
        Tuning::default(),
    );

    let summary = replay(&mut tracker, &clock, &flags, &rx, &records, origin);
    tracker.toggle();

    assert_eq!(summary.fixes, 2);
    assert_eq!(summary.samples, 4);
    assert_eq!(summary.gated, 0);
    // 600 ms falls inside the debounce window after the 300 ms step
    assert_eq!(summary.state.step_count, 2);
    assert_eq!(summary.state.elapsed_seconds, 3);

    drop(tracker);
    let reopened = SqliteStore::open(&db).unwrap();
    assert_eq!(reopened.get(keys::WALK_TIME).unwrap().as_deref(), Some("3"));
    assert_eq!(reopened.get(keys::WALK_STEPS).unwrap().as_deref(), Some("2"));
    assert!(reopened.get(keys::WALK_END_TIME).unwrap().is_some());
}

#[test]
fn denied_motion_gates_samples_but_not_distance() {
    let origin = Local.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
    let records = read_trace(Cursor::new(TRACE)).unwrap();

    let (tx, rx) = channel();
    let flags = Arc::new(SensorFlags::default());
    let sensors = HostSensors::new(
        flags.clone(),
        PermissionPolicy::Prompt(PermissionOutcome::Denied),
        tx,
    );
    let clock = ManualClock::new(origin);

    let mut tracker: SessionTracker = SessionTracker::new(
        Box::new(MemoryStore::new()),
        Box::new(sensors),
        Box::new(clock.clone()),
        PolylinePath::new(),
        Tuning::default(),
    );

    let summary = replay(&mut tracker, &clock, &flags, &rx, &records, origin);

    assert_eq!(summary.gated, 4);
    assert_eq!(summary.state.step_count, 0);
    assert!(summary.state.distance_meters > 1000.0);
    assert!(summary.state.running);
    assert!(!tracker.motion_subscribed());
}

#[test]
fn reset_clears_path_and_store() {
    let store = MemoryStore::new();
    store.put(keys::WALK_TIME, "90").unwrap();
    store.put(keys::WALK_STEPS, "12").unwrap();
    store.put(keys::WALK_DISTANCE, "250.5").unwrap();

    let (tx, _rx) = channel();
    let flags = Arc::new(SensorFlags::default());
    let sensors = HostSensors::new(flags, PermissionPolicy::NotRequired, tx);
    let mut tracker: SessionTracker = SessionTracker::new(
        Box::new(store),
        Box::new(sensors),
        Box::new(ManualClock::new(Local::now())),
        PolylinePath::new(),
        Tuning::default(),
    );
    assert_eq!(tracker.state().elapsed_seconds, 90);

    tracker.toggle();
    tracker.on_geo_fix(GeoFix::new(37.5665, 126.9780, Local::now()));
    assert!(!tracker.path().is_empty());

    tracker.reset();
    assert!(tracker.state().is_zeroed());
    assert!(tracker.path().is_empty());
    assert_eq!(tracker.store().get(keys::WALK_TIME).unwrap(), None);
}

// PathRenderer is public so hosts can draw the route themselves.
#[test]
fn custom_path_renderer_receives_fixes() {
    #[derive(Default)]
    struct Counting {
        appended: usize,
        resets: usize,
    }

    impl PathRenderer for Counting {
        fn append(&mut self, _fix: &GeoFix) {
            self.appended += 1;
        }

        fn reset_path(&mut self) {
            self.resets += 1;
        }
    }

    let (tx, _rx) = channel();
    let flags = Arc::new(SensorFlags::default());
    let sensors = HostSensors::new(flags, PermissionPolicy::NotRequired, tx);
    let mut tracker = SessionTracker::new(
        Box::new(MemoryStore::new()),
        Box::new(sensors),
        Box::new(ManualClock::new(Local::now())),
        Counting::default(),
        Tuning::default(),
    );

    tracker.toggle();
    tracker.on_geo_fix(GeoFix::new(1.0, 1.0, Local::now()));
    tracker.on_geo_fix(GeoFix::new(1.0, 1.001, Local::now()));
    tracker.reset();

    assert_eq!(tracker.path().appended, 2);
    assert_eq!(tracker.path().resets, 1);
}
