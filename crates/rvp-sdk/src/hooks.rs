//! The seam a real vendor SDK's FFI bindings would plug into.
//!
//! The vendor SDK registers outbound notifications as raw function
//! pointers on an opaque handle (spec.md §4.5/§4.6). That shape doesn't
//! port to safe Rust directly; here [`SdkHooks::handle_events`] returns the
//! batch of events produced by the call instead of invoking a callback
//! table, preserving the invariant that every notification is only ever
//! produced on the SDK thread (whoever calls `handle_events`) while
//! avoiding an FFI-style global callback registry.

use std::os::unix::io::RawFd;
use std::time::Duration;

use rvp_backend::{BackendError, BackendSettings};

/// A file descriptor the SDK wants monitored, and which I/O directions.
#[derive(Debug, Clone, Copy)]
pub struct FdInterest {
    pub fd: RawFd,
    pub read: bool,
    pub write: bool,
}

/// One notification produced by a call to [`SdkHooks::handle_events`].
#[derive(Debug, Clone)]
pub enum SdkEvent {
    Connected,
    Disconnected,
    FramebufferUpdated {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        stride: u32,
        pixels: Vec<u8>,
    },
    FramebufferResized {
        width: u32,
        height: u32,
    },
    FramebufferCopied {
        src_x: u32,
        src_y: u32,
        width: u32,
        height: u32,
        dst_x: u32,
        dst_y: u32,
    },
    CursorUpdated {
        hot_x: u32,
        hot_y: u32,
        width: u32,
        height: u32,
        stride: u32,
        pixels: Vec<u8>,
    },
    ClipboardReceived {
        text: String,
    },
}

/// Every call in this trait, and every [`SdkEvent`] it produces, must only
/// ever occur on the thread that called [`SdkHooks::connect`] — the vendor
/// SDK asserts this at runtime and aborts otherwise. [`crate::SdkBackend`]
/// is the only thing allowed to hold a value implementing this trait.
pub trait SdkHooks: Send {
    /// Initialize the SDK, register the logger/datastore, create the
    /// viewer object, and initiate the TCP connect. Does not block for
    /// the handshake to complete; connection-state transitions arrive
    /// later as [`SdkEvent::Connected`]/[`SdkEvent::Disconnected`] from
    /// [`Self::handle_events`].
    fn connect(&mut self, settings: &BackendSettings) -> Result<(), BackendError>;

    /// The current set of file descriptors the SDK wants monitored,
    /// refreshed before every `select`/`poll` iteration.
    fn requested_fds(&self) -> Vec<FdInterest>;

    /// Translate one ready file descriptor's readiness bits into the
    /// SDK's `mark_events` call.
    fn mark_events(&mut self, fd: RawFd, readable: bool, writable: bool, excepted: bool);

    /// Advance the SDK's internal state machine by one tick, draining
    /// whatever events became ready, and return the timeout the caller
    /// should use for the next `poll`.
    fn handle_events(&mut self) -> (Duration, Vec<SdkEvent>);

    fn send_key_down(&mut self, keysym: u32);
    fn send_key_up(&mut self, keysym: u32);

    /// `mask` already has scroll bits stripped by the caller
    /// (spec.md §4.6 "Scroll derivation").
    fn send_pointer_event(&mut self, x: u16, y: u16, mask: u8);

    fn send_scroll(&mut self, delta: i8);
    fn send_clipboard_text(&mut self, text: &str);

    /// Enable one add-on file discovered by [`crate::addon::load_addons`].
    fn enable_addon(&mut self, path: &std::path::Path);

    /// Request a clean shutdown; the event loop exits once the SDK next
    /// reports itself disconnected.
    fn client_stop(&mut self);
}
