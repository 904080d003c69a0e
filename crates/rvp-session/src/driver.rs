//! The session frame loop (spec.md §4.8, C8), grounded line-for-line on
//! `original_source`'s `src/protocols/vnc/vnc.c::guac_vnc_client_thread`
//! and its constants in `client.h` (`GUAC_VNC_FRAME_DURATION`,
//! `GUAC_VNC_FRAME_TIMEOUT_FACTOR`, `GUAC_VNC_FRAME_START_TIMEOUT`,
//! `GUAC_VNC_CONNECT_INTERVAL`).

use std::time::{Duration, Instant};

use rvp_backend::{Backend, BackendError, UpdateWait};
use rvp_display::{ChannelOp, DisplayChannel};
use rvp_pacer::{EncodedFrame, PacerError, VideoPacer};

/// Maximum duration of a frame, in milliseconds (`GUAC_VNC_FRAME_DURATION`).
pub const FRAME_DURATION_MS: u64 = 200;

/// Factor applied to the dynamic processing-lag timeout to absorb jitter
/// (`GUAC_VNC_FRAME_TIMEOUT_FACTOR`).
pub const FRAME_TIMEOUT_FACTOR: u64 = 3;

/// The per-iteration timeout used while draining updates within an open
/// frame window: `FRAME_DURATION_MS / FRAME_TIMEOUT_FACTOR`.
pub const FRAME_TIMEOUT_MS: u64 = FRAME_DURATION_MS / FRAME_TIMEOUT_FACTOR;

/// How long to wait for the first update of a new frame
/// (`GUAC_VNC_FRAME_START_TIMEOUT`, 1s in the original, there expressed in
/// microseconds).
pub const FRAME_START_TIMEOUT_MS: u32 = 1_000;

/// Delay between connection retries (`GUAC_VNC_CONNECT_INTERVAL`).
pub const CONNECT_RETRY_INTERVAL_MS: u64 = 1_000;

/// How a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Stopped cooperatively, e.g. by an external disconnect request.
    Stopped,
    /// A hard failure ended the session; `status` matches
    /// [`rvp_backend::BackendError::status_code`]'s vocabulary.
    Aborted { status: &'static str, reason: String },
}

/// Connect to `B`, retrying up to `retries` additional times with
/// [`CONNECT_RETRY_INTERVAL_MS`] between attempts
/// (spec.md §4.8 step 1, `guac_vnc_connect`'s retry loop).
///
/// The first attempt always happens; `retries` bounds only the number of
/// *additional* attempts after the first failure.
pub fn connect_with_retries<B, F>(mut connect: F, retries: u32) -> Result<B, BackendError>
where
    F: FnMut() -> Result<B, BackendError>,
{
    let mut attempt = 0;
    loop {
        match connect() {
            Ok(backend) => return Ok(backend),
            Err(err) if attempt < retries => {
                attempt += 1;
                tracing::info!(
                    attempt,
                    retries,
                    error = %err,
                    "connect failed, retrying after {CONNECT_RETRY_INTERVAL_MS}ms"
                );
                std::thread::sleep(Duration::from_millis(CONNECT_RETRY_INTERVAL_MS));
            }
            Err(err) => return Err(err),
        }
    }
}

fn millis_between(earlier: Instant, later: Instant) -> i64 {
    later.saturating_duration_since(earlier).as_millis() as i64
}

/// Run the frame-pacing loop until the backend reports the connection
/// closed or `should_stop` returns `true` between frames.
///
/// `processing_lag_ms` stands in for the outbound channel's own
/// client-processing-lag feedback (out of scope here, spec.md §1 — the
/// wire format that would report it is an external collaborator); callers
/// wire it to whatever their channel implementation can supply, or pass
/// `|| 0` where no such feedback exists.
///
/// `on_frame` fires once per frame actually built (never on a frame-start
/// timeout), with the same channel this loop drives and a monotonically
/// increasing millisecond timestamp anchored to this call's start. This is
/// the cadence a caller with video configured should snapshot its surface
/// and feed [`pace_video_frame`] from; a caller with no video pacer
/// configured passes a no-op.
///
/// At the end of every iteration (built a frame or not) the outbound
/// channel is told the frame ended and to flush, exactly matching the
/// original's unconditional `guac_common_surface_flush` / `guac_client_end_frame`
/// / `guac_socket_flush` trailer.
pub fn run_session<B, C>(
    backend: &B,
    channel: &mut C,
    mut processing_lag_ms: impl FnMut() -> u32,
    mut should_stop: impl FnMut() -> bool,
    mut on_frame: impl FnMut(&mut C, u64),
) -> SessionOutcome
where
    B: Backend,
    C: DisplayChannel,
{
    let session_start = Instant::now();
    let mut last_frame_end = session_start;

    loop {
        if should_stop() {
            return SessionOutcome::Stopped;
        }

        let mut wait_result = backend.wait_for_update(FRAME_START_TIMEOUT_MS);

        if wait_result == UpdateWait::Signaled {
            let frame_start = Instant::now();
            let lag = processing_lag_ms();

            loop {
                let frame_end = Instant::now();
                let frame_remaining = FRAME_DURATION_MS as i64 - millis_between(frame_start, frame_end);
                let time_elapsed = millis_between(last_frame_end, frame_end);
                let required_wait = i64::from(lag) - time_elapsed;

                if required_wait > FRAME_TIMEOUT_MS as i64 {
                    wait_result = backend.wait_for_update(u32::try_from(required_wait.max(0)).unwrap_or(u32::MAX));
                } else if frame_remaining > 0 {
                    wait_result = backend.wait_for_update(FRAME_TIMEOUT_MS as u32);
                } else {
                    break;
                }

                if wait_result != UpdateWait::Signaled {
                    break;
                }
            }

            // Record end of frame, excluding server-side render time, under
            // the assumption it is stable between any two subsequent frames
            // (spec.md §4.8 "Frame pacing rule").
            last_frame_end = frame_start;

            let timestamp_ms = millis_between(session_start, frame_start) as u64;
            on_frame(channel, timestamp_ms);
        }

        // Flush unconditionally, whether or not a frame was built this
        // iteration, matching the original's trailer that runs every pass
        // through the outer loop.
        channel.send(ChannelOp::EndFrame);
        channel.send(ChannelOp::Flush);

        if wait_result == UpdateWait::Closed {
            return SessionOutcome::Aborted {
                status: "UPSTREAM_ERROR",
                reason: "connection closed".to_string(),
            };
        }
    }
}

/// Feed one raw `BGRx` surface snapshot through the video pacer, emitting
/// the outbound channel's sync marker first (spec.md §4.4 `prepare_frame`:
/// "stores the result as the staged frame. Then emit the staged frame
/// immediately and publish a sync marker").
///
/// What becomes of the returned [`EncodedFrame`]s — which outbound stream
/// carries the actual video bytes — is outside this crate's scope
/// (spec.md §1 Non-goals: implementing a codec or a wire format); the
/// caller routes them to whatever transport it has.
pub fn pace_video_frame<C: DisplayChannel>(
    pacer: &mut VideoPacer,
    channel: &mut C,
    raw_bgrx: &[u8],
    timestamp_ms: u64,
) -> Result<Vec<EncodedFrame>, PacerError> {
    channel.send(ChannelOp::Sync { timestamp_ms });
    pacer.write_frame(raw_bgrx, timestamp_ms)
}

/// Tear down a video pacer: flush its last held frame through the
/// encoder and emit the end-of-stream marker (spec.md §4.4 `close`).
pub fn close_video<C: DisplayChannel>(pacer: VideoPacer, channel: &mut C) -> Result<Vec<EncodedFrame>, PacerError> {
    let frames = pacer.close()?;
    channel.send(ChannelOp::EndOfStream);
    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rvp_backend::ConnectionState;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    /// A [`Backend`] double that answers `frame_starts` frame-start waits
    /// (those passing [`FRAME_START_TIMEOUT_MS`]) with [`UpdateWait::Signaled`]
    /// and then [`UpdateWait::Closed`] forever after; every other wait (the
    /// inner per-frame drains) always times out immediately, so each
    /// signaled frame-start produces exactly one outer-loop iteration.
    struct ScriptedBackend {
        remaining_frame_starts: Mutex<u32>,
        state: Mutex<ConnectionState>,
        wait_calls: AtomicU32,
    }

    impl ScriptedBackend {
        fn new(frame_starts: u32) -> Self {
            Self {
                remaining_frame_starts: Mutex::new(frame_starts),
                state: Mutex::new(ConnectionState::Connected),
                wait_calls: AtomicU32::new(0),
            }
        }
    }

    impl Backend for ScriptedBackend {
        fn width(&self) -> u32 {
            64
        }
        fn height(&self) -> u32 {
            64
        }
        fn wait_for_update(&self, timeout_ms: u32) -> UpdateWait {
            self.wait_calls.fetch_add(1, Ordering::SeqCst);
            if timeout_ms != FRAME_START_TIMEOUT_MS {
                return UpdateWait::TimedOut;
            }
            let mut remaining = self.remaining_frame_starts.lock().unwrap();
            if *remaining > 0 {
                *remaining -= 1;
                UpdateWait::Signaled
            } else {
                *self.state.lock().unwrap() = ConnectionState::Disconnected;
                UpdateWait::Closed
            }
        }
        fn send_key(&self, _keysym: u32, _pressed: bool) {}
        fn send_pointer(&self, _x: u16, _y: u16, _mask: u8) {}
        fn send_clipboard(&self, _bytes: &[u8]) {}
        fn clipboard_encoding(&self) -> &'static str {
            "UTF-8"
        }
        fn shutdown(&mut self) {
            *self.state.lock().unwrap() = ConnectionState::Disconnected;
        }
    }

    #[derive(Default, Clone)]
    struct RecordingChannel {
        ops: Arc<Mutex<Vec<ChannelOp>>>,
    }
    impl DisplayChannel for RecordingChannel {
        fn send(&mut self, op: ChannelOp) {
            self.ops.lock().unwrap().push(op);
        }
    }

    #[test]
    fn frame_loop_ends_frame_and_flushes_every_iteration_then_aborts_on_close() {
        let backend = ScriptedBackend::new(2);
        let mut channel = RecordingChannel::default();
        let ops = Arc::clone(&channel.ops);

        let outcome = run_session(&backend, &mut channel, || 0, || false, |_, _| {});

        assert_eq!(
            outcome,
            SessionOutcome::Aborted {
                status: "UPSTREAM_ERROR",
                reason: "connection closed".to_string(),
            }
        );

        let recorded = ops.lock().unwrap();
        let end_frames = recorded.iter().filter(|op| matches!(op, ChannelOp::EndFrame)).count();
        let flushes = recorded.iter().filter(|op| matches!(op, ChannelOp::Flush)).count();
        // One iteration per signal plus the final closing iteration.
        assert_eq!(end_frames, 3);
        assert_eq!(flushes, 3);
    }

    #[test]
    fn on_frame_fires_once_per_built_frame_and_never_on_the_closing_iteration() {
        let backend = ScriptedBackend::new(2);
        let mut channel = RecordingChannel::default();
        let timestamps = Arc::new(Mutex::new(Vec::new()));
        let timestamps_clone = Arc::clone(&timestamps);

        run_session(&backend, &mut channel, || 0, || false, move |_, ts| {
            timestamps_clone.lock().unwrap().push(ts);
        });

        // Exactly the two signaled frame-starts produce a callback, not the
        // final iteration that discovers the connection closed.
        assert_eq!(timestamps.lock().unwrap().len(), 2);
    }

    #[test]
    fn cooperative_stop_wins_before_the_next_wait() {
        let backend = ScriptedBackend::new(1000);
        let mut channel = RecordingChannel::default();
        let mut iterations = 0;

        let outcome = run_session(
            &backend,
            &mut channel,
            || 0,
            || {
                iterations += 1;
                iterations > 3
            },
            |_, _| {},
        );

        assert_eq!(outcome, SessionOutcome::Stopped);
    }

    #[test]
    fn connect_with_retries_gives_up_after_budget_exhausted() {
        let attempts = Arc::new(Mutex::new(0u32));
        let attempts_clone = Arc::clone(&attempts);
        let result: Result<(), BackendError> = connect_with_retries(
            move || {
                *attempts_clone.lock().unwrap() += 1;
                Err(BackendError::Upstream("refused".to_string()))
            },
            2,
        );

        assert!(result.is_err());
        assert_eq!(*attempts.lock().unwrap(), 3); // initial + 2 retries
    }

    #[test]
    fn connect_with_retries_succeeds_once_the_backend_comes_up() {
        let attempts = Arc::new(Mutex::new(0u32));
        let attempts_clone = Arc::clone(&attempts);
        let result = connect_with_retries(
            move || {
                let mut count = attempts_clone.lock().unwrap();
                *count += 1;
                if *count < 3 {
                    Err(BackendError::Upstream("not yet".to_string()))
                } else {
                    Ok(42)
                }
            },
            5,
        );

        assert_eq!(result.unwrap(), 42);
        assert_eq!(*attempts.lock().unwrap(), 3);
    }
}
