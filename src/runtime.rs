use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossterm::event::{self, Event as CtEvent, KeyEvent};
use tracing::debug;

use crate::geo::GeoFix;
use crate::motion::MotionSample;
use crate::path::PathRenderer;
use crate::tracker::{PermissionOutcome, SensorHub, SessionTracker};

/// Period of the elapsed-time ticker; each tick adds one second
pub const TICK_INTERVAL_MS: u64 = 1000;
/// How long the runner waits for an event before redrawing anyway
pub const REDRAW_MS: u64 = 100;

/// Unified event type consumed by the app runner
#[derive(Clone, Debug)]
pub enum WalkEvent {
    Key(KeyEvent),
    Resize,
    /// One elapsed-time tick from the armed ticker
    Tick,
    Fix(GeoFix),
    Motion(MotionSample),
    MotionPermission {
        ticket: u64,
        outcome: PermissionOutcome,
    },
    /// Nothing arrived within the redraw interval
    Idle,
}

/// Source of events for the runner
pub trait WalkEventSource {
    /// Block for up to `timeout` waiting for an event.
    fn recv_timeout(&self, timeout: Duration) -> Result<WalkEvent, RecvTimeoutError>;
}

/// Channel-backed event source. Host threads (keyboard, ticker, trace player)
/// all feed the same sender, so events are seen in arrival order.
pub struct ChannelEventSource {
    rx: Receiver<WalkEvent>,
}

impl ChannelEventSource {
    pub fn new(rx: Receiver<WalkEvent>) -> Self {
        Self { rx }
    }
}

impl WalkEventSource for ChannelEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<WalkEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Forward terminal key and resize events into `tx`
pub fn spawn_terminal_reader(tx: Sender<WalkEvent>) {
    thread::spawn(move || loop {
        match event::read() {
            Ok(CtEvent::Key(key)) => {
                if tx.send(WalkEvent::Key(key)).is_err() {
                    break;
                }
            }
            Ok(CtEvent::Resize(_, _)) => {
                if tx.send(WalkEvent::Resize).is_err() {
                    break;
                }
            }
            Ok(_) => {}
            Err(_) => break,
        }
    });
}

/// Gates shared between the tracker's sensor hub and the host threads that
/// produce ticks, fixes and motion samples
#[derive(Debug, Default)]
pub struct SensorFlags {
    ticking: AtomicBool,
    watching: AtomicBool,
    motion: AtomicBool,
}

impl SensorFlags {
    pub fn ticking(&self) -> bool {
        self.ticking.load(Ordering::SeqCst)
    }

    pub fn watching(&self) -> bool {
        self.watching.load(Ordering::SeqCst)
    }

    pub fn motion(&self) -> bool {
        self.motion.load(Ordering::SeqCst)
    }

    /// Whether an event from a host source should reach the tracker
    pub fn admits(&self, event: &WalkEvent) -> bool {
        match event {
            WalkEvent::Tick => self.ticking(),
            WalkEvent::Fix(_) => self.watching(),
            WalkEvent::Motion(_) => self.motion(),
            _ => true,
        }
    }
}

/// How the host answers motion-permission requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionPolicy {
    /// No prompt needed; access is available immediately
    NotRequired,
    /// Prompted platform; the answer arrives later as an event
    Prompt(PermissionOutcome),
}

/// Sensor hub for terminal hosts: flips the shared gates and answers
/// permission requests through the event channel
pub struct HostSensors {
    flags: Arc<SensorFlags>,
    policy: PermissionPolicy,
    tx: Sender<WalkEvent>,
}

impl HostSensors {
    pub fn new(flags: Arc<SensorFlags>, policy: PermissionPolicy, tx: Sender<WalkEvent>) -> Self {
        Self { flags, policy, tx }
    }
}

impl SensorHub for HostSensors {
    fn start_ticker(&mut self) {
        self.flags.ticking.store(true, Ordering::SeqCst);
    }

    fn stop_ticker(&mut self) {
        self.flags.ticking.store(false, Ordering::SeqCst);
    }

    fn watch_position(&mut self) {
        self.flags.watching.store(true, Ordering::SeqCst);
    }

    fn clear_watch(&mut self) {
        self.flags.watching.store(false, Ordering::SeqCst);
    }

    fn request_motion_permission(&mut self, ticket: u64) -> Option<PermissionOutcome> {
        match self.policy {
            PermissionPolicy::NotRequired => Some(PermissionOutcome::Granted),
            PermissionPolicy::Prompt(outcome) => {
                if self
                    .tx
                    .send(WalkEvent::MotionPermission { ticket, outcome })
                    .is_err()
                {
                    debug!("event channel closed before permission answer");
                }
                None
            }
        }
    }

    fn subscribe_motion(&mut self) {
        self.flags.motion.store(true, Ordering::SeqCst);
    }

    fn unsubscribe_motion(&mut self) {
        self.flags.motion.store(false, Ordering::SeqCst);
    }
}

/// Emit a Tick every `interval` while the ticker gate is armed
pub fn spawn_ticker(interval: Duration, flags: Arc<SensorFlags>, tx: Sender<WalkEvent>) {
    thread::spawn(move || loop {
        thread::sleep(interval);
        if flags.ticking() && tx.send(WalkEvent::Tick).is_err() {
            break;
        }
    });
}

/// Configurable redraw interval
pub trait Ticker {
    fn interval(&self) -> Duration;
}

/// Fixed interval ticker
#[derive(Clone, Copy, Debug)]
pub struct FixedTicker {
    interval: Duration,
}

impl FixedTicker {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Ticker for FixedTicker {
    fn interval(&self) -> Duration {
        self.interval
    }
}

/// Runner that advances the application one event at a time
pub struct Runner<E: WalkEventSource, T: Ticker> {
    event_source: E,
    ticker: T,
}

impl<E: WalkEventSource, T: Ticker> Runner<E, T> {
    pub fn new(event_source: E, ticker: T) -> Self {
        Self {
            event_source,
            ticker,
        }
    }

    /// Blocks up to the redraw interval and returns the next event, or Idle on timeout
    pub fn step(&self) -> WalkEvent {
        match self.event_source.recv_timeout(self.ticker.interval()) {
            Ok(ev) => ev,
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => WalkEvent::Idle,
        }
    }
}

pub fn channel() -> (Sender<WalkEvent>, Receiver<WalkEvent>) {
    mpsc::channel()
}

/// Hand a sensor or timer event to the tracker. Returns false for events the
/// tracker does not consume (keys, resizes, idle wakeups).
pub fn dispatch<R: PathRenderer>(tracker: &mut SessionTracker<R>, event: WalkEvent) -> bool {
    match event {
        WalkEvent::Tick => tracker.on_tick(),
        WalkEvent::Fix(fix) => tracker.on_geo_fix(fix),
        WalkEvent::Motion(sample) => tracker.on_motion_sample(sample),
        WalkEvent::MotionPermission { ticket, outcome } => {
            tracker.on_motion_permission(ticket, outcome)
        }
        WalkEvent::Key(_) | WalkEvent::Resize | WalkEvent::Idle => return false,
    }
    true
}

/// Dispatch everything already queued on `rx` that the gates admit
pub fn drain<R: PathRenderer>(
    tracker: &mut SessionTracker<R>,
    flags: &SensorFlags,
    rx: &Receiver<WalkEvent>,
) {
    while let Ok(event) = rx.try_recv() {
        if flags.admits(&event) {
            dispatch(tracker, event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::Local;

    #[test]
    fn step_returns_idle_on_timeout() {
        let (_tx, rx) = channel();
        let runner = Runner::new(
            ChannelEventSource::new(rx),
            FixedTicker::new(Duration::from_millis(1)),
        );
        assert_matches!(runner.step(), WalkEvent::Idle);
    }

    #[test]
    fn step_passes_through_events() {
        let (tx, rx) = channel();
        tx.send(WalkEvent::Resize).unwrap();
        tx.send(WalkEvent::Tick).unwrap();
        let runner = Runner::new(
            ChannelEventSource::new(rx),
            FixedTicker::new(Duration::from_millis(10)),
        );

        assert_matches!(runner.step(), WalkEvent::Resize);
        assert_matches!(runner.step(), WalkEvent::Tick);
    }

    #[test]
    fn host_sensors_flip_gates() {
        let (tx, _rx) = channel();
        let flags = Arc::new(SensorFlags::default());
        let mut sensors = HostSensors::new(flags.clone(), PermissionPolicy::NotRequired, tx);

        let fix = WalkEvent::Fix(GeoFix::new(1.0, 2.0, Local::now()));
        assert!(!flags.admits(&WalkEvent::Tick));
        assert!(!flags.admits(&fix));

        sensors.start_ticker();
        sensors.watch_position();
        assert!(flags.admits(&WalkEvent::Tick));
        assert!(flags.admits(&fix));
        assert!(!flags.motion());

        sensors.subscribe_motion();
        assert!(flags.motion());

        sensors.stop_ticker();
        sensors.clear_watch();
        sensors.unsubscribe_motion();
        assert!(!flags.ticking() && !flags.watching() && !flags.motion());
        assert!(flags.admits(&WalkEvent::Resize));
    }

    #[test]
    fn prompted_permission_answers_through_channel() {
        let (tx, rx) = channel();
        let flags = Arc::new(SensorFlags::default());
        let mut sensors = HostSensors::new(
            flags,
            PermissionPolicy::Prompt(PermissionOutcome::Denied),
            tx,
        );

        assert_eq!(sensors.request_motion_permission(4), None);
        assert_matches!(
            rx.try_recv(),
            Ok(WalkEvent::MotionPermission {
                ticket: 4,
                outcome: PermissionOutcome::Denied
            })
        );
    }

    #[test]
    fn drain_delivers_pending_permission() {
        use crate::path::PolylinePath;
        use crate::session::Tuning;
        use crate::store::MemoryStore;
        use crate::tracker::SystemClock;

        let (tx, rx) = channel();
        let flags = Arc::new(SensorFlags::default());
        let sensors = HostSensors::new(
            flags.clone(),
            PermissionPolicy::Prompt(PermissionOutcome::Granted),
            tx,
        );
        let mut tracker = SessionTracker::new(
            Box::new(MemoryStore::new()),
            Box::new(sensors),
            Box::new(SystemClock),
            PolylinePath::new(),
            Tuning::default(),
        );

        tracker.toggle();
        assert!(!flags.motion());
        drain(&mut tracker, &flags, &rx);
        assert!(flags.motion());
        assert!(tracker.motion_subscribed());

        assert!(!dispatch(&mut tracker, WalkEvent::Idle));
        assert!(dispatch(&mut tracker, WalkEvent::Tick));
        assert_eq!(tracker.state().elapsed_seconds, 1);
    }

    #[test]
    fn ticker_only_ticks_when_armed() {
        let (tx, rx) = channel();
        let flags = Arc::new(SensorFlags::default());
        spawn_ticker(Duration::from_millis(2), flags.clone(), tx.clone());

        assert!(rx.recv_timeout(Duration::from_millis(30)).is_err());

        let mut sensors = HostSensors::new(flags, PermissionPolicy::NotRequired, tx);
        sensors.start_ticker();
        assert_matches!(rx.recv_timeout(Duration::from_secs(1)), Ok(WalkEvent::Tick));
    }
}
