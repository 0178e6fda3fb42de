use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::time::Duration;
use tracing::{debug, info, warn};

use arm_link::{ArmLink, MockLink};
use motion_engine::{
    encode_command, shared_link, AnimationFrame, CancelToken, Direction, FrameSink, PlayMode,
    PlayOutcome, PlayReport, PlayScope, Session, SharedLink, SpeedModel, TelemetryReader,
    TrafficEntry, TrafficLog,
};
use scara_kinematics::{
    normalize_solution, GatePolicy, JointConfig, JointSolution, Kinematics, LimitGate,
    PlanarScara, Transform, Verdict,
};

mod config;
use config::{load_routine, SessionConfig};

#[derive(Parser, Debug)]
#[command(
    name = "scara",
    version,
    about = "SCARA arm motion console",
    disable_help_subcommand = true
)]
struct Cli {
    /// Serial device of the arm controller (omit for disconnected mode)
    #[arg(long, global = true)]
    device: Option<String>,

    /// Baud rate for the controller link
    #[arg(long, global = true)]
    baud: Option<u32>,

    /// Use the in-process mock link (portable)
    #[arg(long, action = ArgAction::SetTrue, global = true)]
    mock: bool,

    /// Session config YAML
    #[arg(long, global = true)]
    config: Option<String>,

    /// Speed percent override
    #[arg(long, global = true)]
    speed: Option<f64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum GripState {
    Open,
    Close,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List available controller ports
    Ports,
    /// Forward kinematics for a joint configuration
    Fk {
        /// Shoulder angle, degrees
        #[arg(long)]
        q1: f64,
        /// Elbow angle, degrees
        #[arg(long)]
        q2: f64,
        /// Prismatic extension, millimeters
        #[arg(long, default_value_t = 0.0)]
        d3: f64,
        /// Print the per-joint DH transform chain
        #[arg(long, action = ArgAction::SetTrue)]
        transforms: bool,
    },
    /// Inverse kinematics for a Cartesian target (meters)
    Ik {
        #[arg(long)]
        x: f64,
        #[arg(long)]
        y: f64,
        #[arg(long)]
        z: f64,
        /// Animate to the solution
        #[arg(long, action = ArgAction::SetTrue)]
        apply: bool,
        /// Animate and transmit the result (implies --apply)
        #[arg(long, action = ArgAction::SetTrue)]
        execute: bool,
    },
    /// Animate to a joint configuration
    Goto {
        /// Shoulder angle, degrees
        #[arg(long)]
        q1: f64,
        /// Elbow angle, degrees
        #[arg(long)]
        q2: f64,
        /// Prismatic extension, millimeters
        #[arg(long, default_value_t = 0.0)]
        d3: f64,
        /// Transmit on arrival
        #[arg(long, action = ArgAction::SetTrue)]
        execute: bool,
    },
    /// Return to the origin configuration (q1 = q2 = 0, d3 retracted)
    Origin {
        /// Transmit on arrival
        #[arg(long, action = ArgAction::SetTrue)]
        execute: bool,
    },
    /// Set the gripper and transmit immediately
    Grip {
        #[arg(value_enum)]
        state: GripState,
    },
    /// Encode and transmit the current configuration
    Send,
    /// Print a routine file, poses numbered as the panel shows them
    RoutineShow {
        /// Routine YAML (list of poses)
        #[arg(long)]
        file: String,
    },
    /// Play a routine, whole or one step
    RoutinePlay {
        /// Routine YAML (list of poses)
        #[arg(long)]
        file: String,
        /// Play only this pose (1-based)
        #[arg(long)]
        step: Option<usize>,
        /// Transmit each pose instead of simulating
        #[arg(long, action = ArgAction::SetTrue)]
        execute: bool,
    },
    /// Watch wire traffic for a while
    Monitor {
        /// How long to listen
        #[arg(long, default_value_t = 10u64)]
        secs: u64,
        /// Export the captured traffic as NDJSON
        #[arg(long)]
        export: Option<String>,
    },
    /// Open the link, probe a write, listen briefly
    Doctor,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    setup_tracing();
    let cli = Cli::parse();

    let mut cfg = SessionConfig::load(cli.config.as_deref())?;
    if let Some(device) = &cli.device {
        cfg.link.device = Some(device.clone());
    }
    if let Some(baud) = cli.baud {
        cfg.link.baud = baud;
    }
    if let Some(speed) = cli.speed {
        cfg.speed_percent = speed;
    }

    match cli.command {
        Commands::Ports => list_ports(),
        Commands::Fk {
            q1,
            q2,
            d3,
            transforms,
        } => fk_query(&cfg, q1, q2, d3, transforms),
        Commands::Ik {
            x,
            y,
            z,
            apply,
            execute,
        } => ik_query(&cfg, cli.mock, x, y, z, apply, execute).await,
        Commands::Goto { q1, q2, d3, execute } => {
            goto(&cfg, cli.mock, JointConfig::new(q1, q2, d3), execute).await
        }
        Commands::Origin { execute } => {
            goto(&cfg, cli.mock, JointConfig::default(), execute).await
        }
        Commands::Grip { state } => grip(&cfg, cli.mock, state),
        Commands::Send => send_current(&cfg, cli.mock),
        Commands::RoutineShow { file } => routine_show(&file),
        Commands::RoutinePlay {
            file,
            step,
            execute,
        } => routine_play(&cfg, cli.mock, &file, step, execute).await,
        Commands::Monitor { secs, export } => monitor(&cfg, cli.mock, secs, export.as_deref()).await,
        Commands::Doctor => doctor(&cfg, cli.mock).await,
    }
}

fn setup_tracing() {
    // Best-effort; avoid panics if already set
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// Frames go to the debug log; surfaces that render them plug in here.
struct ConsoleSink;

impl FrameSink for ConsoleSink {
    fn apply(&mut self, frame: &AnimationFrame) {
        debug!(
            step = frame.step,
            q1 = frame.config.q1_deg,
            q2 = frame.config.q2_deg,
            d3 = frame.config.d3_mm,
            "frame"
        );
    }
}

fn open_link(cfg: &SessionConfig, mock: bool) -> Option<Box<dyn ArmLink>> {
    if mock {
        return match MockLink::open("mock0", cfg.link.baud) {
            Ok(link) => Some(Box::new(link)),
            Err(e) => {
                warn!(error = %e, "mock link failed to open; running disconnected");
                None
            }
        };
    }
    let Some(device) = cfg.link.device.as_deref() else {
        info!("no device configured; running disconnected");
        return None;
    };
    #[cfg(feature = "serial")]
    {
        match arm_link::SerialLink::open(device, cfg.link.baud) {
            Ok(link) => Some(Box::new(link)),
            Err(e) => {
                warn!(device, error = %e, "serial open failed; running disconnected");
                None
            }
        }
    }
    #[cfg(not(feature = "serial"))]
    {
        warn!(device, "built without the serial feature; running disconnected");
        None
    }
}

fn build_session(cfg: &SessionConfig, mock: bool) -> Session {
    let link = shared_link(open_link(cfg, mock));
    let mut session = Session::new(
        LimitGate::new(cfg.limits, GatePolicy::WarnOnly),
        link,
        TrafficLog::default(),
        cfg.motion,
    );
    session.set_speed(SpeedModel::new(cfg.speed_percent, cfg.speed_range));
    session
}

fn solver(cfg: &SessionConfig) -> PlanarScara {
    PlanarScara::new(cfg.geometry, cfg.limits)
}

/// A ctrl-c anywhere during a motion flips the shared cancel flag; the run
/// notices at its next frame or step boundary.
fn cancel_on_ctrl_c() -> CancelToken {
    let cancel = CancelToken::new();
    let flag = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; stopping at the next boundary");
            flag.cancel();
        }
    });
    cancel
}

fn list_ports() -> Result<()> {
    for port in MockLink::list()? {
        println!("{}\t{}", port.name, port.driver);
    }
    #[cfg(feature = "serial")]
    for port in arm_link::SerialLink::list()? {
        println!("{}\t{}", port.name, port.driver);
    }
    Ok(())
}

fn fk_query(cfg: &SessionConfig, q1: f64, q2: f64, d3: f64, transforms: bool) -> Result<()> {
    let fk = solver(cfg).forward(q1.to_radians(), q2.to_radians(), d3 / 1000.0);
    println!("x={:.4} m  y={:.4} m  z={:.4} m", fk.x, fk.y, fk.z);
    if transforms {
        for (name, t) in [("A1", &fk.joint_transforms[0]), ("A2", &fk.joint_transforms[1]), ("A3", &fk.joint_transforms[2]), ("T", &fk.end_transform)] {
            println!("{name} =");
            print_transform(t);
        }
    }
    Ok(())
}

fn print_transform(t: &Transform) {
    for row in t {
        println!(
            "  [{:8.4} {:8.4} {:8.4} {:8.4}]",
            row[0], row[1], row[2], row[3]
        );
    }
}

fn print_solution(solution: &JointSolution) {
    println!(
        "q1={:.2} deg ({:.4} rad)  q2={:.2} deg ({:.4} rad)  d3={:.1} mm ({:.4} m)",
        solution.q1_deg,
        solution.q1_rad,
        solution.q2_deg,
        solution.q2_rad,
        solution.d3_mm,
        solution.d3_m
    );
}

fn print_limit_verdict(verdict: Verdict) {
    if verdict == Verdict::Warning {
        println!("warning: configuration exceeds joint limits; proceeding anyway");
    }
}

async fn ik_query(
    cfg: &SessionConfig,
    mock: bool,
    x: f64,
    y: f64,
    z: f64,
    apply: bool,
    execute: bool,
) -> Result<()> {
    let outcome = solver(cfg).inverse(x, y, z);
    let message = outcome.message.clone();
    if !(apply || execute) {
        let solution = normalize_solution(outcome)?;
        println!("{message}");
        print_solution(&solution);
        return Ok(());
    }

    let mut session = build_session(cfg, mock);
    let cancel = cancel_on_ctrl_c();
    let (solution, run, report) = session
        .apply_ik(outcome, &mut ConsoleSink, &cancel)
        .await?;
    println!("{message}");
    print_solution(&solution);
    print_limit_verdict(report.verdict);
    debug!(?run, "ik animation finished");
    if execute {
        transmit(&mut session);
    }
    Ok(())
}

async fn goto(cfg: &SessionConfig, mock: bool, target: JointConfig, execute: bool) -> Result<()> {
    let mut session = build_session(cfg, mock);
    let cancel = cancel_on_ctrl_c();
    let (run, report) = session.goto(target, &mut ConsoleSink, &cancel).await?;
    print_limit_verdict(report.verdict);
    println!(
        "at q1={:.2} q2={:.2} d3={:.1} ({run:?})",
        session.current().q1_deg,
        session.current().q2_deg,
        session.current().d3_mm
    );
    if execute {
        transmit(&mut session);
    }
    Ok(())
}

fn grip(cfg: &SessionConfig, mock: bool, state: GripState) -> Result<()> {
    let mut session = build_session(cfg, mock);
    match session.set_gripper(state == GripState::Open) {
        Ok(line) => println!("TX {}", line.trim_end()),
        Err(e) => warn!(error = %e, "gripper command not sent"),
    }
    Ok(())
}

fn send_current(cfg: &SessionConfig, mock: bool) -> Result<()> {
    let mut session = build_session(cfg, mock);
    transmit(&mut session);
    Ok(())
}

/// Transmit the current configuration; link trouble degrades to a warning.
fn transmit(session: &mut Session) {
    match session.send_current() {
        Ok(line) => println!("TX {}", line.trim_end()),
        Err(e) => warn!(error = %e, "send failed"),
    }
}

fn routine_show(file: &str) -> Result<()> {
    let poses = load_routine(file)?;
    if poses.is_empty() {
        println!("(empty routine)");
        return Ok(());
    }
    for (i, pose) in poses.iter().enumerate() {
        println!(
            "{:>3}. q1={:7.2} deg  q2={:7.2} deg  d3={:6.1} mm  gripper={}",
            i + 1,
            pose.q1_deg,
            pose.q2_deg,
            pose.d3_mm,
            if pose.gripper_open { "open" } else { "closed" }
        );
    }
    Ok(())
}

async fn routine_play(
    cfg: &SessionConfig,
    mock: bool,
    file: &str,
    step: Option<usize>,
    execute: bool,
) -> Result<()> {
    let scope = match step {
        Some(0) => anyhow::bail!("--step is 1-based"),
        Some(n) => PlayScope::Step(n - 1),
        None => PlayScope::Whole,
    };
    let mode = if execute {
        PlayMode::Execute
    } else {
        PlayMode::Simulate
    };

    let mut session = build_session(cfg, mock);
    session.load_routine(load_routine(file)?);
    session.log().set_observer(print_entry);

    let cancel = cancel_on_ctrl_c();
    let reader = TelemetryReader::new(
        session.link(),
        session.log().clone(),
        session.timings().telemetry_period(),
    );

    // Telemetry polls on the same cooperative loop until playback settles.
    let mut sink = ConsoleSink;
    let report = tokio::select! {
        biased;
        report = session.play(mode, scope, &mut sink, &cancel) => report?,
        () = reader.run(cancel.clone()) => anyhow::bail!("telemetry stopped before playback"),
    };
    print_report(&report);
    Ok(())
}

fn print_entry(entry: &TrafficEntry) {
    println!("{} {}", entry.direction, entry.line);
}

fn print_report(report: &PlayReport) {
    let ending = match report.outcome {
        PlayOutcome::Completed => "completed",
        PlayOutcome::Cancelled => "cancelled",
        PlayOutcome::Superseded => "superseded",
    };
    println!(
        "{ending}: {} pose(s), {} sent, {} send failure(s), {} limit warning(s)",
        report.poses_done, report.writes, report.write_failures, report.limit_warnings
    );
}

async fn monitor(cfg: &SessionConfig, mock: bool, secs: u64, export: Option<&str>) -> Result<()> {
    let link: SharedLink = shared_link(open_link(cfg, mock));
    let log = TrafficLog::default();
    log.set_observer(print_entry);

    let cancel = CancelToken::new();
    let stop = cancel.clone();
    let reader = TelemetryReader::new(link, log.clone(), cfg.motion.telemetry_period());
    let poller = tokio::spawn(reader.run(cancel));

    tokio::select! {
        () = tokio::time::sleep(Duration::from_secs(secs)) => {},
        _ = tokio::signal::ctrl_c() => info!("interrupt received; stopping monitor"),
    }
    stop.cancel();
    let _ = poller.await;

    if let Some(path) = export {
        export_ndjson(&log, path)?;
        println!("exported {} entr(ies) to {path}", log.len());
    }
    Ok(())
}

#[derive(Serialize)]
struct WireRecord<'a> {
    ts: String,
    dir: &'a str,
    line: &'a str,
}

fn export_ndjson(log: &TrafficLog, path: &str) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {path}"))?;
    let mut w = BufWriter::new(file);
    for entry in log.entries() {
        let ts = entry
            .at
            .format(&time::format_description::well_known::Rfc3339)
            .context("formatting timestamp")?;
        let record = WireRecord {
            ts,
            dir: match entry.direction {
                Direction::Rx => "rx",
                Direction::Tx => "tx",
            },
            line: &entry.line,
        };
        serde_json::to_writer(&mut w, &record)?;
        w.write_all(b"\n")?;
    }
    Ok(())
}

async fn doctor(cfg: &SessionConfig, mock: bool) -> Result<()> {
    println!(
        "doctor: device={} baud={} mock={mock}",
        cfg.link.device.as_deref().unwrap_or("(none)"),
        cfg.link.baud
    );
    let link = shared_link(open_link(cfg, mock));
    {
        let guard = link.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        match guard.as_ref() {
            Some(port) => println!("open: ok ({})", port.name()),
            None => {
                println!("open: failed (disconnected mode)");
                return Ok(());
            }
        }
    }

    let probe = encode_command(&JointSolution::from_degrees(0.0, 0.0, 0.0), true, 1.0);
    {
        let mut guard = link.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(port) = guard.as_mut() {
            match port.write_line(&probe) {
                Ok(()) => println!("probe write: ok ({} bytes)", probe.len()),
                Err(e) => println!("probe write: failed ({e})"),
            }
        }
    }

    let log = TrafficLog::default();
    log.set_observer(print_entry);
    let mut reader = TelemetryReader::new(link, log.clone(), cfg.motion.telemetry_period());
    for _ in 0..5 {
        reader.tick();
        tokio::time::sleep(cfg.motion.telemetry_period()).await;
    }
    if log.is_empty() {
        println!("listen: quiet");
    }
    println!("doctor: done");
    Ok(())
}
