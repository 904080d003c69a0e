//! Shared contract between the classic (library-driven) and vendor-SDK
//! viewer backends (spec.md §4.5, C5).
//!
//! Implementing the wire protocol of either backend is out of scope; this
//! crate only defines the seam both implementations satisfy plus the one
//! concrete implementation that needs no proprietary SDK: [`ClassicBackend`]
//! over an abstracted [`ViewerLibrary`].

mod callbacks;
mod classic;
mod error;
mod settings;

pub use callbacks::{BackendCallbacks, CursorShape, FramebufferCopy, FramebufferUpdate};
pub use classic::{ClassicBackend, ViewerLibrary};
pub use error::BackendError;
pub use settings::BackendSettings;

/// Connection lifecycle state (spec.md §3 "Connection state"). Monotone:
/// once [`Disconnected`](ConnectionState::Disconnected) is reached, no
/// further transitions occur.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Disconnected,
}

/// Outcome of [`Backend::wait_for_update`], matching the original's
/// positive/zero/negative return convention rather than a `Result`, since
/// "the connection closed" is routine rather than exceptional here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateWait {
    /// A framebuffer change was signaled within the timeout.
    Signaled,
    /// No change arrived before the timeout elapsed.
    TimedOut,
    /// The connection is already closed.
    Closed,
}

/// Button-state bitmask used by [`Backend::send_pointer`], matching the
/// wire convention: bit 0 = left, bit 1 = middle, bit 2 = right, bits 3-4 =
/// scroll up/down.
pub mod pointer_mask {
    pub const LEFT: u8 = 0x01;
    pub const MIDDLE: u8 = 0x02;
    pub const RIGHT: u8 = 0x04;
    pub const SCROLL_UP: u8 = 0x08;
    pub const SCROLL_DOWN: u8 = 0x10;

    /// The subset of bits a `POINTER` wire record carries; scroll bits are
    /// split out into separate `SCROLL` records upstream.
    pub const POINTER_BITS: u8 = LEFT | MIDDLE | RIGHT;
}

/// Operations the session driver (C8) needs from either backend
/// implementation, independent of which viewer protocol is underneath.
pub trait Backend: Send {
    /// Current framebuffer width in pixels.
    fn width(&self) -> u32;

    /// Current framebuffer height in pixels.
    fn height(&self) -> u32;

    /// Block up to `timeout_ms` for the next framebuffer-update signal.
    fn wait_for_update(&self, timeout_ms: u32) -> UpdateWait;

    /// Enqueue a keyboard event. Non-blocking; best-effort once the
    /// session is tearing down.
    fn send_key(&self, keysym: u32, pressed: bool);

    /// Enqueue a pointer event. `mask` follows [`pointer_mask`].
    fn send_pointer(&self, x: u16, y: u16, mask: u8);

    /// Enqueue a clipboard payload for delivery to the remote end, already
    /// encoded per [`Backend::clipboard_encoding`]. Ignored when
    /// [`BackendSettings::read_only`] was set at connect time.
    fn send_clipboard(&self, bytes: &[u8]);

    /// Wire encoding the backend uses for clipboard text, e.g.
    /// `"ISO-8859-1"` (classic) or `"UTF-8"` (vendor SDK).
    fn clipboard_encoding(&self) -> &'static str;

    /// Disconnect and release any backend-owned resources. Blocking.
    fn shutdown(&mut self);
}
