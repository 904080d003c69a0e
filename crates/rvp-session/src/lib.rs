//! Session Driver (spec.md §4.8, C8): retries the initial connection,
//! runs the frame-pacing loop, and wires clipboard encoding negotiation
//! and video pacing around whichever [`rvp_backend::Backend`] and
//! [`rvp_display::DisplayChannel`] the binary constructs.

pub mod clipboard;
pub mod config;
pub mod driver;
pub mod error;
pub mod static_backend;

pub use clipboard::{decode_clipboard, encode_clipboard, send_clipboard_text, ClipboardRelay};
pub use config::{SessionConfig, VideoConfig};
pub use driver::{
    close_video, connect_with_retries, pace_video_frame, run_session, SessionOutcome,
    CONNECT_RETRY_INTERVAL_MS, FRAME_DURATION_MS, FRAME_START_TIMEOUT_MS, FRAME_TIMEOUT_FACTOR, FRAME_TIMEOUT_MS,
};
pub use error::SessionAbort;
pub use static_backend::StaticBackend;
