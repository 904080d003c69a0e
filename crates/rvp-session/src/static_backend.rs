//! A backend with no wire protocol at all: a single solid-color frame,
//! delivered once at connect time and never updated again.
//!
//! Implementing a real viewer wire protocol is explicitly out of scope
//! (spec.md §1 Non-goals); this is the seam's trivial inhabitant, used by
//! the `rvp-session` binary the same way `cosmic-rdp-server/src/main.rs`
//! falls back to its own static blue-screen display when live capture is
//! unavailable — a working, demonstrable [`Backend`] that needs no
//! external SDK or socket.

use std::sync::Mutex;
use std::time::Duration;

use rvp_backend::{Backend, BackendCallbacks, BackendError, BackendSettings, ConnectionState, FramebufferUpdate, UpdateWait};

/// Blue-screen fill color, BGRA (B=0xCC, G=0x44, R=0x11, A=0xFF) — the
/// same constant `cosmic-rdp-server/src/server.rs` uses for its static
/// fallback display.
pub const BLUE_BGRA: [u8; 4] = [0xCC, 0x44, 0x11, 0xFF];

/// A [`Backend`] that paints one solid-color frame and then idles until
/// [`Backend::shutdown`] is called.
pub struct StaticBackend {
    width: u32,
    height: u32,
    state: Mutex<ConnectionState>,
}

impl StaticBackend {
    /// "Connect": synchronously deliver a resize and one full-frame update
    /// through `callbacks`, then return a handle that idles.
    pub fn connect(
        _settings: &BackendSettings,
        width: u32,
        height: u32,
        callbacks: &mut dyn BackendCallbacks,
    ) -> Result<Self, BackendError> {
        if width == 0 || height == 0 {
            return Err(BackendError::Server("static backend requires nonzero dimensions".to_string()));
        }

        callbacks.framebuffer_resized(width, height);
        callbacks.framebuffer_updated(FramebufferUpdate {
            x: 0,
            y: 0,
            width,
            height,
            stride: width * 4,
            pixels: solid_fill(width, height, BLUE_BGRA),
        });

        Ok(Self {
            width,
            height,
            state: Mutex::new(ConnectionState::Connected),
        })
    }
}

fn solid_fill(width: u32, height: u32, bgra: [u8; 4]) -> Vec<u8> {
    let mut pixels = Vec::with_capacity((width * height * 4) as usize);
    for _ in 0..(width * height) {
        pixels.extend_from_slice(&bgra);
    }
    pixels
}

impl Backend for StaticBackend {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn wait_for_update(&self, timeout_ms: u32) -> UpdateWait {
        if *self.state.lock().unwrap_or_else(|e| e.into_inner()) == ConnectionState::Disconnected {
            return UpdateWait::Closed;
        }
        // Nothing ever changes after the initial frame; behave like a
        // quiescent connection and simply time out every call.
        std::thread::sleep(Duration::from_millis(u64::from(timeout_ms)));
        if *self.state.lock().unwrap_or_else(|e| e.into_inner()) == ConnectionState::Disconnected {
            UpdateWait::Closed
        } else {
            UpdateWait::TimedOut
        }
    }

    fn send_key(&self, keysym: u32, pressed: bool) {
        tracing::debug!(keysym, pressed, "static backend ignoring key event");
    }

    fn send_pointer(&self, x: u16, y: u16, mask: u8) {
        tracing::debug!(x, y, mask, "static backend ignoring pointer event");
    }

    fn send_clipboard(&self, bytes: &[u8]) {
        tracing::debug!(len = bytes.len(), "static backend ignoring clipboard event");
    }

    fn clipboard_encoding(&self) -> &'static str {
        "UTF-8"
    }

    fn shutdown(&mut self) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = ConnectionState::Disconnected;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rvp_backend::{CursorShape, FramebufferCopy};

    struct RecordingCallbacks {
        resized: Option<(u32, u32)>,
        updated: Option<FramebufferUpdate>,
    }

    impl BackendCallbacks for RecordingCallbacks {
        fn clipboard_received(&mut self, _bytes: &[u8]) {}
        fn cursor_updated(&mut self, _cursor: CursorShape) {}
        fn framebuffer_resized(&mut self, width: u32, height: u32) {
            self.resized = Some((width, height));
        }
        fn framebuffer_copied(&mut self, _copy: FramebufferCopy) {}
        fn framebuffer_updated(&mut self, update: FramebufferUpdate) {
            self.updated = Some(update);
        }
    }

    #[test]
    fn connect_delivers_one_solid_frame_matching_reported_size() {
        let mut callbacks = RecordingCallbacks {
            resized: None,
            updated: None,
        };
        let backend = StaticBackend::connect(&BackendSettings::default(), 4, 3, &mut callbacks).unwrap();

        assert_eq!(backend.width(), 4);
        assert_eq!(backend.height(), 3);
        assert_eq!(callbacks.resized, Some((4, 3)));
        let update = callbacks.updated.expect("expected one framebuffer update");
        assert_eq!(update.pixels.len(), 4 * 3 * 4);
        assert_eq!(&update.pixels[0..4], &BLUE_BGRA);
    }

    #[test]
    fn zero_sized_connect_is_a_server_error() {
        let mut callbacks = RecordingCallbacks {
            resized: None,
            updated: None,
        };
        let err = StaticBackend::connect(&BackendSettings::default(), 0, 10, &mut callbacks).unwrap_err();
        assert!(matches!(err, BackendError::Server(_)));
    }

    #[test]
    fn shutdown_makes_wait_for_update_report_closed() {
        let mut callbacks = RecordingCallbacks {
            resized: None,
            updated: None,
        };
        let mut backend = StaticBackend::connect(&BackendSettings::default(), 2, 2, &mut callbacks).unwrap();
        backend.shutdown();
        assert_eq!(backend.wait_for_update(1), UpdateWait::Closed);
    }
}
