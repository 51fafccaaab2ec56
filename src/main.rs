//! MJPEG HTTP streaming CLI application

// Use jemalloc for better memory management (optional feature)
#[cfg(feature = "jemalloc")]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use rust_mjpeg_http::config::{CaptureSection, CaptureSource, Config, Resolution};
use rust_mjpeg_http::{
    CaptureError, FramePipeline, FrameProducer, FrameSource, ImageJpegCodec, JpegDirectorySource,
    MjpegFileSink, MjpegServer, PixelFormat, Recorder, ServerStats, TestPatternSource,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "mjpeg-http")]
#[command(about = "MJPEG camera streaming over HTTP with optional Digest authentication")]
#[command(version)]
struct Cli {
    /// Path to configuration file (defaults are used if it does not exist)
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Video device to open, or frame directory for the directory source
    #[arg(short, long)]
    device: Option<String>,

    /// Frame size, e.g. 960x720, 640x480, 320x240, 160x120
    #[arg(short, long)]
    resolution: Option<Resolution>,

    /// Frames per second
    #[arg(short, long)]
    fps: Option<u32>,

    /// TCP port for the stream server
    #[arg(short, long)]
    port: Option<u16>,

    /// Server user
    #[arg(short, long = "user")]
    user: Option<String>,

    /// Server password; enables Digest authentication
    #[arg(short = 'P', long)]
    password: Option<String>,

    /// Capture in YUYV and compress on the host
    #[arg(short = 'y', long, conflicts_with = "rggb")]
    yuyv: bool,

    /// Capture 8-bit RGGB Bayer and compress on the host
    #[arg(short = 'g', long)]
    rggb: bool,

    /// JPEG compression quality (1-100)
    #[arg(short, long)]
    quality: Option<u8>,

    /// Record the frame stream to this file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Frame source: test-pattern, directory or v4l2
    #[arg(long)]
    source: Option<CaptureSource>,
}

impl Cli {
    /// Command-line values take precedence over the config file
    fn apply(&self, config: &mut Config) {
        let capture = &mut config.capture;

        if let Some(device) = &self.device {
            capture.device = device.clone();
        }
        if let Some(resolution) = self.resolution {
            capture.width = resolution.width;
            capture.height = resolution.height;
        }
        if let Some(fps) = self.fps {
            capture.fps = fps;
        }
        if let Some(quality) = self.quality {
            capture.quality = quality;
        }
        if let Some(source) = self.source {
            capture.source = source;
        }
        if self.yuyv {
            capture.format = PixelFormat::Yuyv;
        }
        if self.rggb {
            capture.format = PixelFormat::Rggb;
        }

        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(user) = &self.user {
            config.server.username = user.clone();
        }
        if let Some(password) = &self.password {
            config.server.password = Some(password.clone());
        }
        if let Some(output) = &self.output {
            config.recording.output = Some(output.clone());
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    fmt().with_env_filter(filter).with_target(false).init();

    info!("MJPEG HTTP streamer starting");
    info!(config_path = %cli.config, "Loading configuration");

    let mut config = Config::load_or_default(&cli.config)?;
    cli.apply(&mut config);
    config.validate()?;

    let capture = &config.capture;
    info!(
        source = %capture.source,
        device = %capture.device,
        format = %capture.format,
        quality = capture.quality,
        resolution = %format!("{}x{}", capture.width, capture.height),
        fps = capture.fps,
        port = config.server.port,
        user = %config.server.username,
        auth = config.server.password.is_some(),
        "Configuration loaded"
    );

    let source = open_source(capture)?;
    let pipeline = Arc::new(FramePipeline::new(capture.slots, source.max_frame_size()));

    let producer = FrameProducer::new(
        source,
        Box::new(ImageJpegCodec::new()),
        capture.quality,
        capture.fps,
        Arc::clone(&pipeline),
    )
    .spawn()
    .context("failed to start producer thread")?;

    let recorder = match &config.recording.output {
        Some(path) => {
            let sink = MjpegFileSink::create(path)?;
            info!(output = %path.display(), "Recording frames");
            Some(Recorder::spawn(
                sink,
                Arc::clone(&pipeline),
                tokio::runtime::Handle::current(),
            )?)
        }
        None => None,
    };

    let server = Arc::new(MjpegServer::new(config.server_config(), Arc::clone(&pipeline)));

    // Ctrl+C stops the pipeline, which in turn stops everything else
    {
        let pipeline = Arc::clone(&pipeline);
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("Shutting down"),
                Err(e) => error!(error = %e, "Unable to listen for shutdown signal"),
            }
            pipeline.shutdown();
        });
    }

    if config.stats_interval_seconds > 0 {
        tokio::spawn(report_stats(
            Arc::clone(&server),
            Arc::clone(&pipeline),
            Duration::from_secs(config.stats_interval_seconds),
        ));
    }

    let served = match server.bind() {
        Ok(listener) => {
            info!("Streaming started, press Ctrl+C to stop");
            server.serve(listener, pipeline.stopped()).await
        }
        Err(e) => Err(e),
    };

    // Whatever ended the server, the producer and recorder must stop too
    pipeline.shutdown();

    let captured = tokio::task::spawn_blocking(move || producer.join())
        .await?
        .map_err(|_| anyhow!("producer thread panicked"))?;

    if let Some(recorder) = recorder {
        match tokio::task::spawn_blocking(move || recorder.join()).await? {
            Ok(frames) => info!(frames, "Recorder stopped"),
            Err(e) => warn!(error = %e, "Recorder failed"),
        }
    }

    served?;
    captured.context("capture failed")?;

    info!(stats = ?pipeline.stats(), "Stopped");
    Ok(())
}

fn open_source(capture: &CaptureSection) -> Result<Box<dyn FrameSource>, CaptureError> {
    let source: Box<dyn FrameSource> = match capture.source {
        CaptureSource::TestPattern => Box::new(TestPatternSource::new(
            capture.width,
            capture.height,
            capture.format,
            capture.fps,
        )),
        CaptureSource::Directory => Box::new(JpegDirectorySource::new(
            &capture.device,
            capture.width,
            capture.height,
            capture.fps,
        )?),
        CaptureSource::V4l2 => open_v4l2(capture)?,
    };

    info!(source = %capture.source, format = %source.format(), "Capture source ready");
    Ok(source)
}

#[cfg(feature = "v4l2")]
fn open_v4l2(capture: &CaptureSection) -> Result<Box<dyn FrameSource>, CaptureError> {
    Ok(Box::new(rust_mjpeg_http::capture::V4lSource::new(
        &capture.device,
        capture.width,
        capture.height,
        capture.format,
        capture.fps,
    )?))
}

#[cfg(not(feature = "v4l2"))]
fn open_v4l2(capture: &CaptureSection) -> Result<Box<dyn FrameSource>, CaptureError> {
    Err(CaptureError::Device(format!(
        "{}: built without the v4l2 feature",
        capture.device
    )))
}

async fn report_stats(server: Arc<MjpegServer>, pipeline: Arc<FramePipeline>, every: Duration) {
    let mut interval = tokio::time::interval(every);
    interval.tick().await;

    let mut previous = ServerStats::default();
    let mut last = Instant::now();

    loop {
        tokio::select! {
            _ = pipeline.stopped() => break,
            _ = interval.tick() => {}
        }

        let current = server.stats();
        let produced = pipeline.stats();
        let elapsed = last.elapsed().as_secs_f64();

        info!(
            produced = produced.frames_produced,
            dropped = produced.frames_dropped,
            clients = current.sessions_active,
            sessions = current.sessions_total,
            rejected = current.sessions_rejected,
            auth_failures = current.auth_failures,
            fps = %format!("{:.1}", current.calculate_fps(&previous, elapsed)),
            kbps = %format!("{:.0}", current.calculate_bitrate_kbps(&previous, elapsed)),
            "Stats"
        );

        previous = current;
        last = Instant::now();
    }
}
