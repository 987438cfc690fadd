use std::{path::PathBuf, thread, time::Duration};

use clap::{Parser, Subcommand};
use marionette_core::{
    Controller, EngineConfig, FramePump, FrameReport, ManifestLoader, Rig, SimulatedRig,
    SmoothingSettings,
};
use tracing_subscriber::EnvFilter;

fn main() -> marionette_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => run(args),
        Commands::Inspect { rig } => inspect(rig),
    }
}

fn run(args: RunArgs) -> marionette_core::Result<()> {
    let mut config = match &args.config {
        Some(path) => EngineConfig::from_json_file(path)?,
        None => EngineConfig::default(),
    };
    if let Some(fps) = args.fps {
        config.frame_rate = fps;
    }
    if args.no_idle {
        config.animator.auto_blink = false;
        config.animator.auto_breath = false;
    }
    tracing::info!(frame_rate = config.frame_rate, rig = ?args.rig, "starting controller");

    let frame_rate = config.frame_rate;
    let controller = Controller::new(config);
    match &args.rig {
        Some(path) => controller.load_rig(&ManifestLoader, path)?,
        None => controller.install_rig(Box::new(SimulatedRig::standard()))?,
    };
    if let Some(window) = args.window {
        controller.set_smoothing_settings(SmoothingSettings {
            window_length: Some(window),
            ..SmoothingSettings::default()
        })?;
    }

    let log_every = u64::from(frame_rate.max(1));
    let pump = FramePump::new(controller.clone(), frame_rate).spawn(Box::new(
        move |report: &FrameReport| {
            if report.frame % log_every == 0 {
                tracing::debug!(frame = report.frame, skipped = report.skipped.len(), "frame");
            }
        },
    ))?;

    let applied = controller.set_parameters(args.set.iter().map(|(id, value)| (id, *value)))?;
    tracing::info!(applied, requested = args.set.len(), "parameters applied");
    for motion in &args.motion {
        report(controller.play_motion(&motion.name, motion.index, motion.priority));
    }
    if let Some(expression) = &args.expression {
        report(controller.play_expression(expression));
    }

    thread::sleep(args.seconds);
    let frames = pump.stop()?;

    let summary = serde_json::json!({
        "frames": frames,
        "rig": controller.rig_info()?,
        "smoothing": controller.smoothing_info()?,
        "parameters": controller.parameter_values()?,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn inspect(rig: Option<PathBuf>) -> marionette_core::Result<()> {
    let rig: Box<dyn Rig> = match rig {
        Some(path) => Box::new(SimulatedRig::from_manifest_path(&path)?),
        None => Box::new(SimulatedRig::standard()),
    };
    let listing = serde_json::json!({
        "parameters": rig.enumerate_parameters()?,
        "expressions": rig.enumerate_expressions(),
    });
    println!("{}", serde_json::to_string_pretty(&listing)?);
    Ok(())
}

fn report(outcome: marionette_core::Result<()>) {
    if let Err(err) = outcome {
        tracing::warn!(%err, "command failed");
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Parameter controller for animated character rigs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Drive a rig for a while, applying the given commands, then print its state.
    Run(RunArgs),
    /// Print the parameter table and expressions of a rig.
    Inspect {
        /// Rig manifest to read. Defaults to the built-in rig.
        #[arg(short, long)]
        rig: Option<PathBuf>,
    },
}

#[derive(clap::Args, Debug)]
struct RunArgs {
    /// Rig manifest to load. Defaults to the built-in rig.
    #[arg(short, long)]
    rig: Option<PathBuf>,
    /// Engine configuration file (JSON).
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Frame rate override.
    #[arg(long)]
    fps: Option<u32>,
    /// Smoothing window override (1-20).
    #[arg(long)]
    window: Option<usize>,
    /// Disable idle blinking and breathing.
    #[arg(long)]
    no_idle: bool,
    /// How long to run, in seconds.
    #[arg(short, long, default_value = "2", value_parser = parse_seconds)]
    seconds: Duration,
    /// Parameter command, `ID=VALUE`. Repeatable.
    #[arg(long, value_parser = parse_assignment)]
    set: Vec<(String, f32)>,
    /// Motion to play, `GROUP:INDEX:PRIORITY`. Repeatable.
    #[arg(long, value_parser = parse_motion)]
    motion: Vec<MotionArg>,
    /// Expression to apply.
    #[arg(long)]
    expression: Option<String>,
}

#[derive(Debug, Clone)]
struct MotionArg {
    name: String,
    index: usize,
    priority: u32,
}

fn parse_assignment(raw: &str) -> Result<(String, f32), String> {
    let (id, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected ID=VALUE, got `{raw}`"))?;
    let value = value
        .trim()
        .parse::<f32>()
        .map_err(|err| format!("bad value for `{id}`: {err}"))?;
    Ok((id.trim().to_string(), value))
}

fn parse_seconds(raw: &str) -> Result<Duration, String> {
    let seconds = raw
        .trim()
        .parse::<f64>()
        .map_err(|err| format!("bad duration `{raw}`: {err}"))?;
    Duration::try_from_secs_f64(seconds)
        .map_err(|_| format!("duration must be a finite, non-negative number of seconds, got `{raw}`"))
}

fn parse_motion(raw: &str) -> Result<MotionArg, String> {
    let mut parts = raw.split(':');
    let (Some(name), Some(index), Some(priority), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(format!("expected GROUP:INDEX:PRIORITY, got `{raw}`"));
    };
    Ok(MotionArg {
        name: name.to_string(),
        index: index.parse().map_err(|err| format!("bad motion index: {err}"))?,
        priority: priority
            .parse()
            .map_err(|err| format!("bad motion priority: {err}"))?,
    })
}
