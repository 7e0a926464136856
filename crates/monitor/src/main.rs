//! Drowsiness Monitor - Main Entry Point

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use alerting::{AlertDispatcher, SinkKind};
use anyhow::{bail, Context};
use camera_capture::{BlankSource, FrameSource, ImageDirSource};
use clap::{Parser, ValueEnum};
use dms::{DrowsinessMonitor, ReplayLandmarkProvider};
use monitor::{init_logging, AppConfig, MonitorSession, Overrides};
use tokio::sync::watch;
use tracing::{info, warn};

/// Watches eye openness and raises an alert when the eyes stay closed
#[derive(Parser)]
#[command(name = "drowsiness-monitor")]
#[command(version)]
#[command(about = "Eye-aspect-ratio drowsiness detection", long_about = None)]
struct Cli {
    /// Configuration file (TOML, YAML or JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Recorded 68-point landmark trace (NDJSON)
    #[arg(short, long)]
    landmarks: PathBuf,

    /// Directory of frames to replay alongside the trace
    #[arg(short, long)]
    frames: Option<PathBuf>,

    /// EAR below which a frame counts as eyes-closed
    #[arg(long)]
    ear_threshold: Option<f32>,

    /// Consecutive closed frames before alerting
    #[arg(long)]
    consec_frames: Option<u32>,

    /// Alert sink
    #[arg(long)]
    sink: Option<SinkArg>,

    /// Write per-frame analysis as NDJSON (use - for stdout)
    #[arg(long)]
    analysis_out: Option<PathBuf>,

    /// Pace frames at the configured FPS
    #[arg(long)]
    realtime: bool,

    /// JSON log output
    #[arg(long)]
    json_logs: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum SinkArg {
    Log,
    Bell,
    Speech,
}

impl From<SinkArg> for SinkKind {
    fn from(arg: SinkArg) -> Self {
        match arg {
            SinkArg::Log => SinkKind::Log,
            SinkArg::Bell => SinkKind::Bell,
            SinkArg::Speech => SinkKind::Speech,
        }
    }
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            ear_threshold: self.ear_threshold,
            consec_frames: self.consec_frames,
            sink: self.sink.map(Into::into),
            realtime: self.realtime,
            json_logs: self.json_logs,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref()).context("loading configuration")?;
    config.apply_overrides(&cli.overrides());
    init_logging(&config.logging)?;
    config.camera.validate().context("invalid camera settings")?;

    info!("=== Drowsiness Monitor v{} ===", env!("CARGO_PKG_VERSION"));

    let provider = ReplayLandmarkProvider::open(&cli.landmarks)
        .with_context(|| format!("loading landmarks from {}", cli.landmarks.display()))?;

    if provider.frame_count() == 0 {
        bail!("landmark trace {} contains no frames", cli.landmarks.display());
    }

    let mut source: Box<dyn FrameSource> = match &cli.frames {
        Some(dir) => Box::new(
            ImageDirSource::open(dir, config.camera.fps)
                .with_context(|| format!("opening frames in {}", dir.display()))?,
        ),
        None => Box::new(BlankSource::new(
            config.camera.width,
            config.camera.height,
            provider.frame_count(),
            config.camera.fps,
        )?),
    };

    let monitor = DrowsinessMonitor::new(config.dms.clone()).context("invalid detection settings")?;
    let dispatcher = AlertDispatcher::new(config.alerting.build_sink());

    let mut session = MonitorSession::new(
        monitor,
        Box::new(provider),
        dispatcher,
        config.alerting.clone(),
        config.camera.clone(),
    )
    .with_realtime(config.realtime);

    if let Some(path) = &cli.analysis_out {
        let out: Box<dyn Write + Send> = if path.as_os_str() == "-" {
            Box::new(std::io::stdout())
        } else {
            Box::new(BufWriter::new(
                File::create(path).with_context(|| format!("creating {}", path.display()))?,
            ))
        };
        session = session.with_analysis_output(out);
    }

    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Ctrl-C received, stopping after the current frame");
            let _ = stop_tx.send(true);
        }
    });

    let summary = session.run(source.as_mut(), stop_rx).await?;
    info!("Session summary: {}", serde_json::to_string(&summary)?);

    Ok(())
}
