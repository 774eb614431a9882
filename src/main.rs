mod ui;

use std::{
    error::Error,
    fs::OpenOptions,
    io::{self, stdin},
    path::{Path, PathBuf},
    process::ExitCode,
    sync::{Arc, Mutex},
    time::Duration,
};

use chrono::{DateTime, Local};
use clap::{Parser, Subcommand};
use crossterm::{
    event::{KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use serde::Serialize;
use tracing_subscriber::{fmt, EnvFilter};

use walkr::{
    app_dirs::AppDirs,
    bridge::{BackendBridge, HttpBackend},
    config::{Config, ConfigStore, FileConfigStore},
    identity::{check_login_status, complete_login, logout, StaticIdentity, UserInfo},
    offline::{self, CacheManifest, DirFetcher, FsCacheStorage},
    path::PolylinePath,
    runtime::{
        self, dispatch, spawn_terminal_reader, spawn_ticker, ChannelEventSource, FixedTicker,
        HostSensors, PermissionPolicy, Runner, SensorFlags, WalkEvent, REDRAW_MS,
        TICK_INTERVAL_MS,
    },
    server::{self, users::UserDb},
    session::{format_distance, format_elapsed, SessionState},
    store::{keys, KeyValueStore, SqliteStore},
    trace::{self, load_trace, spawn_player},
    tracker::{IdleSensors, ManualClock, PermissionOutcome, SessionTracker, SystemClock},
};

/// walk tracker with step detection, gps distance and a live terminal map
#[derive(Parser, Debug)]
#[command(name = "walkr", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Track a walk in the terminal (default)
    Track {
        /// Sensor trace (CSV) to play back as the device's GPS and motion feed
        #[arg(short, long)]
        trace: Option<PathBuf>,

        /// Playback speed multiplier for the trace
        #[arg(long, default_value_t = 1.0)]
        speed: f64,

        /// Behave like a platform that refuses motion-sensor access
        #[arg(long)]
        deny_motion: bool,
    },

    /// Run a sensor trace through a walk session without the UI
    Replay {
        /// Sensor trace (CSV)
        trace: PathBuf,

        /// Wall-clock time the recording started (RFC 3339), defaults to now
        #[arg(long, value_parser = parse_timestamp)]
        start: Option<DateTime<Local>>,

        /// Leave the session running instead of stopping it after the trace
        #[arg(long)]
        keep_running: bool,

        /// Behave like a platform that refuses motion-sensor access
        #[arg(long)]
        deny_motion: bool,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the stored walk counters
    Status {
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Zero the stored walk counters
    Reset,

    /// Log in with an identity and register it with the backend
    Login {
        #[arg(long)]
        id: i64,

        #[arg(long)]
        nickname: String,
    },

    /// Forget the logged-in user
    Logout,

    /// Show the logged-in user
    Whoami,

    /// Run the account backend
    Serve {
        /// Port to listen on (defaults to config, then WALKR_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Manage the offline asset cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand, Debug)]
enum CacheAction {
    /// Cache every manifest asset from a directory
    Install {
        #[arg(long)]
        from: PathBuf,
    },
    /// Delete caches that are no longer in use
    Activate,
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Local>, String> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Local))
        .map_err(|e| format!("expected an RFC 3339 timestamp: {e}"))
}

/// State behind the tracking screen
pub struct App {
    pub tracker: SessionTracker,
    pub user: Option<UserInfo>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let command = cli.command.unwrap_or(Commands::Track {
        trace: None,
        speed: 1.0,
        deny_motion: false,
    });
    match command {
        Commands::Track { .. } => init_file_logging(&AppDirs::log_path()),
        Commands::Serve { .. } => init_logging("info"),
        _ => init_logging("warn"),
    }
    let config = FileConfigStore::new().load();

    match command {
        Commands::Track {
            trace,
            speed,
            deny_motion,
        } => cmd_track(&config, trace.as_deref(), speed, deny_motion),
        Commands::Replay {
            trace,
            start,
            keep_running,
            deny_motion,
            json,
        } => cmd_replay(&config, &trace, start, keep_running, deny_motion, json),
        Commands::Status { json } => cmd_status(&config, json),
        Commands::Reset => {
            let mut tracker = idle_tracker(&config)?;
            tracker.reset();
            println!("Walk counters reset");
            Ok(())
        }
        Commands::Login { id, nickname } => cmd_login(&config, UserInfo { id, nickname }),
        Commands::Logout => {
            logout(&SqliteStore::new()?)?;
            println!("Logged out");
            Ok(())
        }
        Commands::Whoami => {
            match check_login_status(&SqliteStore::new()?) {
                Some(user) => println!("{} ({})", user.nickname, user.id),
                None => println!("Not logged in"),
            }
            Ok(())
        }
        Commands::Serve { port } => {
            let port = port.unwrap_or_else(|| config.resolved_port());
            let users = UserDb::open(AppDirs::users_db_path())?;
            tokio::runtime::Runtime::new()?.block_on(server::serve(users, port))?;
            Ok(())
        }
        Commands::Cache { action } => cmd_cache(action),
    }
}

fn init_logging(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// The terminal UI owns stdout, so logs go to a file instead
fn init_file_logging(path: &Path) {
    if let Some(parent) = path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            eprintln!("warning: cannot create {}: {e}; logging is off", parent.display());
            return;
        }
    }
    let file = match OpenOptions::new().create(true).append(true).open(path) {
        Ok(file) => file,
        Err(e) => {
            eprintln!("warning: cannot open {}: {e}; logging is off", path.display());
            return;
        }
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .init();
}

fn permission_policy(config: &Config, deny_motion: bool) -> PermissionPolicy {
    if deny_motion {
        PermissionPolicy::Prompt(PermissionOutcome::Denied)
    } else if config.motion_permission_prompt {
        PermissionPolicy::Prompt(PermissionOutcome::Granted)
    } else {
        PermissionPolicy::NotRequired
    }
}

fn idle_tracker(config: &Config) -> Result<SessionTracker, Box<dyn Error>> {
    Ok(SessionTracker::new(
        Box::new(SqliteStore::new()?),
        Box::new(IdleSensors),
        Box::new(SystemClock),
        PolylinePath::new(),
        config.tuning(),
    ))
}

fn cmd_track(
    config: &Config,
    trace: Option<&Path>,
    speed: f64,
    deny_motion: bool,
) -> Result<(), Box<dyn Error>> {
    if !(speed > 0.0 && speed.is_finite()) {
        return Err("--speed must be a positive number".into());
    }
    if !stdin().is_tty() {
        return Err("stdin must be a tty; use `walkr replay` for headless runs".into());
    }
    let records = trace.map(load_trace).transpose()?;

    let store = SqliteStore::new()?;
    let user = check_login_status(&store);

    let (tx, rx) = runtime::channel();
    let flags = Arc::new(SensorFlags::default());
    let sensors = HostSensors::new(flags.clone(), permission_policy(config, deny_motion), tx.clone());

    let mut app = App {
        tracker: SessionTracker::new(
            Box::new(store),
            Box::new(sensors),
            Box::new(SystemClock),
            PolylinePath::new(),
            config.tuning(),
        ),
        user,
    };

    spawn_ticker(
        Duration::from_millis(TICK_INTERVAL_MS),
        flags.clone(),
        tx.clone(),
    );
    if let Some(records) = records {
        spawn_player(records, speed, flags.clone(), tx.clone());
    }
    spawn_terminal_reader(tx);

    let runner = Runner::new(
        ChannelEventSource::new(rx),
        FixedTicker::new(Duration::from_millis(REDRAW_MS)),
    );

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = start_tui(&mut terminal, &mut app, &runner, &flags);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if app.tracker.is_running() {
        app.tracker.toggle();
    }
    result
}

fn start_tui<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    runner: &Runner<ChannelEventSource, FixedTicker>,
    flags: &SensorFlags,
) -> Result<(), Box<dyn Error>> {
    loop {
        terminal.draw(|f| f.render_widget(&*app, f.area()))?;

        match runner.step() {
            WalkEvent::Key(key) if key.kind == KeyEventKind::Press => match key.code {
                KeyCode::Esc | KeyCode::Char('q') => break,
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => break,
                KeyCode::Char(' ') | KeyCode::Enter => app.tracker.toggle(),
                KeyCode::Char('r') => app.tracker.reset(),
                _ => {}
            },
            event => {
                if flags.admits(&event) {
                    dispatch(&mut app.tracker, event);
                }
            }
        }
    }

    Ok(())
}

#[derive(Debug, Serialize)]
struct Report {
    running: bool,
    elapsed_seconds: u64,
    distance_meters: f64,
    step_count: u64,
    elapsed: String,
    distance: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_started: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_ended: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    fixes: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    samples: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    gated: Option<usize>,
}

impl Report {
    fn new(state: &SessionState, store: &dyn KeyValueStore) -> Self {
        let stored = |key| store.get(key).ok().flatten();
        Self {
            running: state.running,
            elapsed_seconds: state.elapsed_seconds,
            distance_meters: state.distance_meters,
            step_count: state.step_count,
            elapsed: format_elapsed(state.elapsed_seconds),
            distance: format_distance(state.distance_meters),
            last_started: stored(keys::WALK_START_TIME),
            last_ended: stored(keys::WALK_END_TIME),
            fixes: None,
            samples: None,
            gated: None,
        }
    }

    fn print(&self, json: bool) -> Result<(), Box<dyn Error>> {
        if json {
            println!("{}", serde_json::to_string_pretty(self)?);
            return Ok(());
        }

        println!("Status:   {}", if self.running { "walking" } else { "stopped" });
        println!("Time:     {}", self.elapsed);
        println!("Distance: {}", self.distance);
        println!("Steps:    {}", self.step_count);
        if let Some(ended) = self.last_ended.as_deref().and_then(|e| parse_timestamp(e).ok()) {
            println!("Last walk ended {}", ended.format("%Y-%m-%d %H:%M"));
        }
        if let (Some(fixes), Some(samples), Some(gated)) = (self.fixes, self.samples, self.gated) {
            println!("Replayed {fixes} fixes and {samples} motion samples ({gated} gated)");
        }
        Ok(())
    }
}

fn cmd_replay(
    config: &Config,
    trace_path: &Path,
    start: Option<DateTime<Local>>,
    keep_running: bool,
    deny_motion: bool,
    json: bool,
) -> Result<(), Box<dyn Error>> {
    let records = load_trace(trace_path)?;
    let origin = start.unwrap_or_else(Local::now);

    let (tx, rx) = runtime::channel();
    let flags = Arc::new(SensorFlags::default());
    let sensors = HostSensors::new(flags.clone(), permission_policy(config, deny_motion), tx);
    let clock = ManualClock::new(origin);

    let mut tracker: SessionTracker = SessionTracker::new(
        Box::new(SqliteStore::new()?),
        Box::new(sensors),
        Box::new(clock.clone()),
        PolylinePath::new(),
        config.tuning(),
    );

    let summary = trace::replay(&mut tracker, &clock, &flags, &rx, &records, origin);
    if !keep_running {
        tracker.toggle();
    }

    let mut report = Report::new(tracker.state(), tracker.store());
    report.fixes = Some(summary.fixes);
    report.samples = Some(summary.samples);
    report.gated = Some(summary.gated);
    report.print(json)
}

fn cmd_status(config: &Config, json: bool) -> Result<(), Box<dyn Error>> {
    let tracker = idle_tracker(config)?;
    Report::new(tracker.state(), tracker.store()).print(json)
}

fn cmd_login(config: &Config, user: UserInfo) -> Result<(), Box<dyn Error>> {
    let store = SqliteStore::new()?;
    let bridge = BackendBridge::spawn(HttpBackend::new(config.backend_url.clone()));

    let result = complete_login(&mut StaticIdentity::new(user), &store, &bridge);
    bridge.shutdown();

    let user = result?;
    println!("Logged in as {} ({})", user.nickname, user.id);
    Ok(())
}

fn cmd_cache(action: CacheAction) -> Result<(), Box<dyn Error>> {
    let manifest = CacheManifest::default();
    let storage = FsCacheStorage::new(AppDirs::cache_root());

    match action {
        CacheAction::Install { from } => {
            offline::install(&manifest, &DirFetcher::new(from), &storage)?;
            println!(
                "Cached {} assets in {}",
                manifest.assets.len(),
                manifest.name
            );
        }
        CacheAction::Activate => {
            let purged = offline::activate(&manifest, &storage)?;
            if purged.is_empty() {
                println!("No stale caches");
            } else {
                println!("Deleted {}", purged.join(", "));
            }
        }
    }
    Ok(())
}
