//! Recorded sensor traces.
//!
//! A trace is a CSV file with the header `kind,t_ms,lat,lon,accuracy,x,y,z`.
//! `kind` is `fix` (uses `lat`, `lon` and optionally `accuracy`) or `motion`
//! (uses `x`, `y`, `z`); `t_ms` counts milliseconds from the start of the
//! recording and must never go backwards. Recordings longer than a week are
//! rejected, as are non-finite readings and coordinates off the globe.

use chrono::{DateTime, Duration as ChronoDuration, Local};
use serde::Deserialize;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::mpsc::{Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::error::{Result, WalkError};
use crate::geo::GeoFix;
use crate::motion::MotionSample;
use crate::path::PathRenderer;
use crate::runtime::{dispatch, drain, SensorFlags, WalkEvent, TICK_INTERVAL_MS};
use crate::session::SessionState;
use crate::tracker::{ManualClock, SessionTracker};

/// Longest recording a trace may span
pub const MAX_TRACE_MS: u64 = 7 * 24 * 60 * 60 * 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, strum_macros::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TraceKind {
    Fix,
    Motion,
}

#[derive(Debug, Deserialize)]
struct TraceRow {
    kind: TraceKind,
    t_ms: u64,
    lat: Option<f64>,
    lon: Option<f64>,
    accuracy: Option<f64>,
    x: Option<f64>,
    y: Option<f64>,
    z: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reading {
    Fix {
        lat: f64,
        lon: f64,
        accuracy: Option<f64>,
    },
    Motion {
        x: f64,
        y: f64,
        z: f64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TraceRecord {
    pub t_ms: u64,
    pub reading: Reading,
}

impl TraceRecord {
    pub fn kind(&self) -> TraceKind {
        match self.reading {
            Reading::Fix { .. } => TraceKind::Fix,
            Reading::Motion { .. } => TraceKind::Motion,
        }
    }

    pub fn at(&self, origin: DateTime<Local>) -> DateTime<Local> {
        origin + ChronoDuration::milliseconds(self.t_ms.min(MAX_TRACE_MS) as i64)
    }

    /// The event this record produces for a recording that began at `origin`
    pub fn to_event(&self, origin: DateTime<Local>) -> WalkEvent {
        let captured_at = self.at(origin);
        match self.reading {
            Reading::Fix { lat, lon, accuracy } => WalkEvent::Fix(GeoFix {
                latitude: lat,
                longitude: lon,
                accuracy_m: accuracy,
                captured_at,
            }),
            Reading::Motion { x, y, z } => {
                WalkEvent::Motion(MotionSample::new(x, y, z, captured_at))
            }
        }
    }
}

pub fn load_trace<P: AsRef<Path>>(path: P) -> Result<Vec<TraceRecord>> {
    read_trace(File::open(path)?)
}

pub fn read_trace<R: Read>(reader: R) -> Result<Vec<TraceRecord>> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut records = Vec::new();
    let mut last_t = 0;

    for row in rdr.deserialize::<TraceRow>() {
        let row = row?;
        let line = records.len() as u64 + 2;
        let missing = |field: &str| WalkError::TraceRecord {
            line,
            reason: format!("{} row without {field}", row.kind),
        };

        let reading = match row.kind {
            TraceKind::Fix => Reading::Fix {
                lat: row.lat.ok_or_else(|| missing("lat"))?,
                lon: row.lon.ok_or_else(|| missing("lon"))?,
                accuracy: row.accuracy,
            },
            TraceKind::Motion => Reading::Motion {
                x: row.x.ok_or_else(|| missing("x"))?,
                y: row.y.ok_or_else(|| missing("y"))?,
                z: row.z.ok_or_else(|| missing("z"))?,
            },
        };

        if row.t_ms > MAX_TRACE_MS {
            return Err(WalkError::TraceRecord {
                line,
                reason: format!("t_ms {} is past the {MAX_TRACE_MS} ms limit", row.t_ms),
            });
        }
        check_reading(&reading).map_err(|reason| WalkError::TraceRecord { line, reason })?;

        if row.t_ms < last_t {
            return Err(WalkError::TraceRecord {
                line,
                reason: format!("t_ms {} goes back from {last_t}", row.t_ms),
            });
        }
        last_t = row.t_ms;

        records.push(TraceRecord {
            t_ms: row.t_ms,
            reading,
        });
    }

    Ok(records)
}

fn check_reading(reading: &Reading) -> std::result::Result<(), String> {
    match *reading {
        Reading::Fix { lat, lon, accuracy } => {
            if !lat.is_finite() || !lon.is_finite() || accuracy.is_some_and(|a| !a.is_finite()) {
                return Err("fix has a non-finite value".to_string());
            }
            if !(-90.0..=90.0).contains(&lat) {
                return Err(format!("lat {lat} is outside -90..90"));
            }
            if !(-180.0..=180.0).contains(&lon) {
                return Err(format!("lon {lon} is outside -180..180"));
            }
        }
        Reading::Motion { x, y, z } => {
            if !(x.is_finite() && y.is_finite() && z.is_finite()) {
                return Err("motion sample has a non-finite axis".to_string());
            }
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReplaySummary {
    pub state: SessionState,
    pub fixes: usize,
    pub samples: usize,
    /// Records that arrived while their sensor was switched off
    pub gated: usize,
}

/// Feed a whole trace through the tracker without waiting in real time.
///
/// The session is started at `origin` if it is not already running. One tick
/// is delivered for every full second of trace time, interleaved with the
/// records in timestamp order, and `clock` follows the trace so step debounce
/// and day-boundary checks see recorded time. The session is left running;
/// callers decide whether to stop it.
pub fn replay<R: PathRenderer>(
    tracker: &mut SessionTracker<R>,
    clock: &ManualClock,
    flags: &SensorFlags,
    rx: &Receiver<WalkEvent>,
    records: &[TraceRecord],
    origin: DateTime<Local>,
) -> ReplaySummary {
    clock.set(origin);
    if !tracker.is_running() {
        tracker.toggle();
    }
    drain(tracker, flags, rx);

    let mut summary = ReplaySummary {
        state: *tracker.state(),
        fixes: 0,
        samples: 0,
        gated: 0,
    };
    let mut next_tick_ms = TICK_INTERVAL_MS;

    for record in records {
        while next_tick_ms <= record.t_ms {
            clock.set(origin + ChronoDuration::milliseconds(next_tick_ms as i64));
            if flags.admits(&WalkEvent::Tick) {
                dispatch(tracker, WalkEvent::Tick);
            }
            next_tick_ms += TICK_INTERVAL_MS;
        }

        clock.set(record.at(origin));
        let event = record.to_event(origin);
        if flags.admits(&event) {
            match record.kind() {
                TraceKind::Fix => summary.fixes += 1,
                TraceKind::Motion => summary.samples += 1,
            }
            dispatch(tracker, event);
        } else {
            summary.gated += 1;
        }
        drain(tracker, flags, rx);
    }

    summary.state = *tracker.state();
    debug!(?summary, "replay finished");
    summary
}

/// Send `records` into `tx`, pacing each one at its recorded time divided by
/// `speed`. Events carry the recorded time `origin + t_ms`, so a sped-up
/// playback keeps the gaps the step debounce was recorded with.
pub fn play(
    records: &[TraceRecord],
    speed: f64,
    origin: DateTime<Local>,
    flags: &SensorFlags,
    tx: &Sender<WalkEvent>,
) {
    if !(speed > 0.0 && speed.is_finite()) {
        warn!(speed, "ignoring trace playback at an invalid speed");
        return;
    }

    let started = Instant::now();
    for record in records {
        let Ok(due) = Duration::try_from_secs_f64(record.t_ms as f64 / 1000.0 / speed) else {
            warn!(t_ms = record.t_ms, speed, "trace record is out of playback range");
            break;
        };
        if let Some(wait) = due.checked_sub(started.elapsed()) {
            thread::sleep(wait);
        }

        let event = record.to_event(origin);
        if flags.admits(&event) && tx.send(event).is_err() {
            break;
        }
    }
}

/// Play `records` on a background thread once the position watch is armed.
/// The recording is anchored at the moment playback begins.
pub fn spawn_player(
    records: Vec<TraceRecord>,
    speed: f64,
    flags: Arc<SensorFlags>,
    tx: Sender<WalkEvent>,
) {
    thread::spawn(move || {
        while !flags.watching() {
            thread::sleep(Duration::from_millis(50));
        }
        info!(records = records.len(), speed, "trace playback started");
        play(&records, speed, Local::now(), &flags, &tx);
        info!("trace playback finished");
    });
}
