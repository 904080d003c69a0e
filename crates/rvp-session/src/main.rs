use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use rvp_backend::BackendError;
use rvp_display::{CanvasSurface, DisplayAdapter, MpscDisplayChannel};
use rvp_pacer::{EncoderConfig, GstEncoder, VideoPacer};
use rvp_session::{
    close_video, connect_with_retries, pace_video_frame, run_session, ClipboardRelay, SessionAbort, SessionConfig,
    SessionOutcome, StaticBackend,
};

/// Image-difference and frame-pacing core of an RVP-to-browser gateway.
///
/// Implementing the viewer wire protocol itself is out of scope; absent a
/// concrete backend, this binary demonstrates the frame-pacing session
/// loop against a single-frame static display, the same role
/// `cosmic-rdp-server`'s `--static-display` flag plays for its own core.
#[derive(Parser, Debug)]
#[command(name = "rvp-session", version, about)]
struct Cli {
    /// Path to a TOML session configuration file.
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Log level filter, e.g. "info", "debug", "rvp_session=trace".
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Additional connection attempts after the first failure. Overrides
    /// the config file's `retries` when given.
    #[arg(long)]
    retries: Option<u32>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level)),
        )
        .init();

    let mut config = rvp_session::config::load(cli.config.as_deref()).context("loading session configuration")?;
    if let Some(retries) = cli.retries {
        config.retries = retries;
    }

    match run(&config) {
        Ok(SessionOutcome::Stopped) => {
            tracing::info!("session stopped");
            Ok(())
        }
        Ok(SessionOutcome::Aborted { status, reason }) => {
            let abort = SessionAbort { status, reason };
            tracing::error!(%abort, "session aborted");
            anyhow::bail!("{abort}");
        }
        Err(err) => {
            tracing::error!(error = %err, "session failed to start");
            Err(err)
        }
    }
}

fn run(config: &SessionConfig) -> Result<SessionOutcome> {
    const DEMO_WIDTH: u32 = 1280;
    const DEMO_HEIGHT: u32 = 720;

    // When video pacing is configured its `EncoderConfig` dimensions must
    // match whatever the canvas actually produces, so size the canvas off
    // the video config rather than the display-only demo defaults.
    let (width, height) = config
        .video
        .as_ref()
        .map(|video| (video.width, video.height))
        .unwrap_or((DEMO_WIDTH, DEMO_HEIGHT));

    let (mut channel, mut channel_rx) = MpscDisplayChannel::new(64);
    let surface = CanvasSurface::new(width, height);
    let adapter = DisplayAdapter::new(surface, channel.clone(), config.backend.swap_red_blue);
    // `StaticBackend::clipboard_encoding` always reports "UTF-8"; this is
    // the only backend this demo binary wires up.
    let mut relay = ClipboardRelay::new(adapter, channel.clone(), "UTF-8");

    let settings = config.backend.clone();
    let backend = connect_with_retries(
        || StaticBackend::connect(&settings, width, height, &mut relay),
        config.retries,
    )
    .map_err(|err: BackendError| anyhow::anyhow!(SessionAbort::from(&err)))?;

    let mut pacer = match &config.video {
        Some(video) => {
            let encoder_config = EncoderConfig {
                width: video.width,
                height: video.height,
                framerate: 25,
                bitrate_bps: video.bitrate_bps,
            };
            let encoder = GstEncoder::new(&encoder_config).context("building video encoder")?;
            Some(VideoPacer::new(Box::new(encoder), &encoder_config))
        }
        None => None,
    };

    let stop_requested = Arc::new(AtomicBool::new(false));
    {
        let stop_requested = Arc::clone(&stop_requested);
        install_signal_handler(move || stop_requested.store(true, Ordering::SeqCst));
    }

    // Drain the outbound channel on a background thread so `try_send`
    // never reports it full while this demo binary runs; a real
    // deployment wires this receiver to the actual outbound transport
    // instead of discarding what it carries.
    let drain = std::thread::spawn(move || while channel_rx.blocking_recv().is_some() {});

    // Snapshot the canvas through the video pacer on the cadence the
    // frame loop actually builds frames at, rather than never feeding it
    // at all.
    let on_frame = |channel: &mut MpscDisplayChannel, timestamp_ms: u64| {
        if let Some(pacer) = pacer.as_mut() {
            let pixels = relay.inner().surface().pixels().to_vec();
            if let Err(err) = pace_video_frame(pacer, channel, &pixels, timestamp_ms) {
                tracing::warn!(error = %err, "video frame pacing failed, dropping frame");
            }
        }
    };

    let outcome = run_session(
        &backend,
        &mut channel,
        || 0,
        || stop_requested.load(Ordering::SeqCst),
        on_frame,
    );

    if let Some(pacer) = pacer {
        match close_video(pacer, &mut channel) {
            Ok(frames) => tracing::info!(count = frames.len(), "flushed residual encoded video frames"),
            Err(err) => tracing::warn!(error = %err, "video flush failed"),
        }
    }

    drop(channel);
    let _ = drain.join();

    Ok(outcome)
}

/// Best-effort SIGINT/SIGTERM handling without an extra signal-handling
/// dependency: installs a process-wide handler and polls its flag from a
/// background thread. Out of scope per spec.md §1 (the surrounding
/// process supervision is an external collaborator); kept minimal since
/// this binary exists to demonstrate C8, not to be a production entry
/// point.
fn install_signal_handler(on_signal: impl FnOnce() + Send + 'static) {
    use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, Signal};

    static SHOULD_STOP: AtomicBool = AtomicBool::new(false);

    extern "C" fn handler(_: i32) {
        SHOULD_STOP.store(true, Ordering::SeqCst);
    }

    // SAFETY: installs a process-wide handler once at startup; this
    // binary has no other signal handling to conflict with.
    unsafe {
        let action = SigAction::new(SigHandler::Handler(handler), SaFlags::empty(), SigSet::empty());
        let _ = signal::sigaction(Signal::SIGINT, &action);
        let _ = signal::sigaction(Signal::SIGTERM, &action);
    }

    std::thread::spawn(move || loop {
        if SHOULD_STOP.load(Ordering::SeqCst) {
            on_signal();
            return;
        }
        std::thread::sleep(std::time::Duration::from_millis(100));
    });
}
