//! Backend-fired callbacks (spec.md §4.5).
//!
//! The original SDKs invoke these through a registered function pointer
//! plus an opaque `data` pointer supplied at `create`. Rust closures and
//! trait objects already carry their own captured state, so the `data`
//! pointer is dropped from this port; callers implement [`BackendCallbacks`]
//! on a type that owns whatever state it needs.

/// A rectangular framebuffer update delivered by the backend.
#[derive(Debug, Clone)]
pub struct FramebufferUpdate {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub stride: u32,
    /// `width * height` pixels, 4 bytes each, row-major, `stride`-padded.
    pub pixels: Vec<u8>,
}

/// An in-surface copy the backend reports directly (no pixel payload).
#[derive(Debug, Clone, Copy)]
pub struct FramebufferCopy {
    pub src_x: u32,
    pub src_y: u32,
    pub width: u32,
    pub height: u32,
    pub dst_x: u32,
    pub dst_y: u32,
}

/// A new cursor shape and hotspot.
#[derive(Debug, Clone)]
pub struct CursorShape {
    pub hot_x: u32,
    pub hot_y: u32,
    pub width: u32,
    pub height: u32,
    pub stride: u32,
    pub pixels: Vec<u8>,
}

/// Receiver for every callback a backend may fire, always invoked from
/// whichever thread owns the backend's internal event loop (the SDK
/// thread for [`crate::Backend`]'s vendor-SDK implementation, the caller's
/// thread for the classic one).
pub trait BackendCallbacks: Send {
    /// `bytes` is the clipboard payload exactly as the backend put it on
    /// its wire, in whatever encoding `Backend::clipboard_encoding`
    /// reports; recoding to the outbound channel's UTF-8 is the session
    /// driver's job, not this callback's.
    fn clipboard_received(&mut self, bytes: &[u8]);
    fn cursor_updated(&mut self, cursor: CursorShape);
    fn framebuffer_resized(&mut self, width: u32, height: u32);
    fn framebuffer_copied(&mut self, copy: FramebufferCopy);
    fn framebuffer_updated(&mut self, update: FramebufferUpdate);
}
