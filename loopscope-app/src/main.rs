//! Loopscope headless host entry point.
//!
//! Stands in for an interactive front end: a display thread pulls the scope
//! at the configured refresh rate and draws a level meter, while a gesture
//! thread replays a scripted pan over the filter as the loop plays.
//!
//! ```text
//! loopscope [--settings <path>] [--init-settings] [--list-devices]
//! ```

mod display;
mod gesture;
mod settings;

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context};
use crossbeam_channel::{select, tick, Receiver};
use display::{DisplayStats, ScopeDisplay};
use gesture::{GestureStep, SweepScript};
use loopscope_core::{audio::device::list_output_devices, LoopSession, PlaybackStatusEvent};
use parking_lot::Mutex;
use settings::{default_settings_path, load_settings, save_settings, AppSettings};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

/// Pointer-event rate of the scripted gesture.
const GESTURE_TICK: Duration = Duration::from_millis(16);

#[derive(Debug, Default)]
struct CliArgs {
    settings_path: Option<PathBuf>,
    list_devices: bool,
    init_settings: bool,
}

impl CliArgs {
    fn parse(mut args: impl Iterator<Item = String>) -> anyhow::Result<Self> {
        let mut parsed = Self::default();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--list-devices" => parsed.list_devices = true,
                "--init-settings" => parsed.init_settings = true,
                "--settings" => {
                    let path = args.next().context("--settings needs a path")?;
                    parsed.settings_path = Some(PathBuf::from(path));
                }
                other => bail!("unknown argument: {other}"),
            }
        }
        Ok(parsed)
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("loopscope=info")),
        )
        .init();

    let args = CliArgs::parse(std::env::args().skip(1))?;

    if args.list_devices {
        for device in list_output_devices() {
            println!(
                "{}{} ({} ch @ {} Hz)",
                if device.is_default { "* " } else { "  " },
                device.name,
                device.channels.map_or("?".into(), |c| c.to_string()),
                device.sample_rate.map_or("?".into(), |r| r.to_string()),
            );
        }
        return Ok(());
    }

    let settings_path = args.settings_path.unwrap_or_else(default_settings_path);
    let mut settings = load_settings(&settings_path);
    settings.apply_env_overrides();

    if args.init_settings {
        save_settings(&settings_path, &settings)
            .with_context(|| format!("write {}", settings_path.display()))?;
        info!(path = %settings_path.display(), "settings written");
        return Ok(());
    }

    info!(
        settings = %settings_path.display(),
        resource = settings.resource_id.as_str(),
        "Loopscope starting"
    );

    let session = Arc::new(
        LoopSession::open(settings.session_config())
            .with_context(|| format!("open loop '{}'", settings.resource_id))?,
    );
    let status_thread = spawn_status_logger(&session)?;

    session.start_loop().context("start playback")?;

    let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(0);
    let stats = Arc::new(Mutex::new(DisplayStats::default()));
    let display = spawn_display(&session, &settings, Arc::clone(&stats), stop_rx.clone())?;
    let gesture = spawn_gesture(
        Arc::clone(&session),
        Duration::from_secs_f32(settings.sweep_period_secs),
        stop_rx,
    )?;

    let _ = crossbeam_channel::after(Duration::from_secs_f32(settings.run_seconds)).recv();

    // Closing the channel wakes both loops.
    drop(stop_tx);
    display
        .join()
        .map_err(|_| anyhow!("display thread panicked"))?;
    gesture
        .join()
        .map_err(|_| anyhow!("gesture thread panicked"))?;

    session.stop()?;

    let diagnostics = session.engine().diagnostics_snapshot();
    let stats = *stats.lock();
    info!(
        diagnostics = %serde_json::to_string(&diagnostics)?,
        display = %serde_json::to_string(&stats)?,
        "Loopscope finished"
    );

    drop(session);
    status_thread
        .join()
        .map_err(|_| anyhow!("status thread panicked"))?;
    Ok(())
}

fn spawn_status_logger(session: &LoopSession) -> io::Result<JoinHandle<()>> {
    let mut status_rx = session.engine().subscribe_status();
    thread::Builder::new()
        .name("loopscope-status".into())
        .spawn(move || loop {
            match status_rx.blocking_recv() {
                Ok(event) => log_status(&event),
                Err(RecvError::Lagged(missed)) => warn!(missed, "status events dropped"),
                Err(RecvError::Closed) => break,
            }
        })
}

fn log_status(event: &PlaybackStatusEvent) {
    info!(
        status = ?event.status,
        detail = event.detail.as_deref().unwrap_or(""),
        "playback status"
    );
}

fn spawn_display(
    session: &LoopSession,
    settings: &AppSettings,
    stats: Arc<Mutex<DisplayStats>>,
    stop_rx: Receiver<()>,
) -> io::Result<JoinHandle<()>> {
    let mut display = ScopeDisplay::new(session.reader(), settings.scope_window, settings.meter_width);
    let ticker = tick(Duration::from_secs_f64(1.0 / settings.display_fps as f64));

    thread::Builder::new()
        .name("loopscope-display".into())
        .spawn(move || {
            let stdout = io::stdout();
            loop {
                select! {
                    recv(ticker) -> _ => {
                        let frame = display.sample();
                        stats.lock().record(frame);
                        let mut out = stdout.lock();
                        let _ = write!(out, "\r{}", display.render_line(&frame));
                        let _ = out.flush();
                    }
                    recv(stop_rx) -> _ => break,
                }
            }
            println!();
        })
}

fn spawn_gesture(
    session: Arc<LoopSession>,
    period: Duration,
    stop_rx: Receiver<()>,
) -> io::Result<JoinHandle<()>> {
    let script = SweepScript::new(period);
    let ticker = tick(GESTURE_TICK);

    thread::Builder::new()
        .name("loopscope-gesture".into())
        .spawn(move || {
            let started = Instant::now();
            let mut pressed = false;
            loop {
                select! {
                    recv(ticker) -> _ => match script.step_at(started.elapsed()) {
                        GestureStep::Pan { x, y } => {
                            if !pressed {
                                session.set_filter_bypass(false);
                                pressed = true;
                                debug!("gesture began");
                            }
                            session.set_filter_sweep(x, y);
                        }
                        GestureStep::Released => {
                            if pressed {
                                session.set_filter_bypass(true);
                                pressed = false;
                                debug!("gesture ended");
                            }
                        }
                    },
                    recv(stop_rx) -> _ => break,
                }
            }
            session.set_filter_bypass(true);
        })
}
