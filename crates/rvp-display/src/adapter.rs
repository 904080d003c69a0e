//! Translates backend callbacks into surface operations (spec.md §4.7,
//! C7), including the copy-suppresses-next-update flag and the
//! `swap_red_blue` channel-order normalization (spec.md §4.7 "Color
//! format").

use rvp_backend::{BackendCallbacks, CursorShape, FramebufferCopy, FramebufferUpdate};
use rvp_hash::Image;

use crate::channel::{ChannelOp, DisplayChannel};
use crate::surface::{Layer, Surface};

/// Wraps a [`Surface`] and an outbound [`DisplayChannel`], implementing
/// [`BackendCallbacks`] so it can be handed directly to
/// `Backend::connect`/[`rvp_sdk::SdkBackend::connect`].
pub struct DisplayAdapter<S: Surface, C: DisplayChannel> {
    surface: S,
    channel: C,
    swap_red_blue: bool,
    /// Set by `framebuffer_copied`; consumed (and cleared) by the very
    /// next `framebuffer_updated`, since the underlying library fires one
    /// redundantly after every in-surface copy (spec.md §4.7).
    copy_recently_done: bool,
}

impl<S: Surface, C: DisplayChannel> DisplayAdapter<S, C> {
    #[must_use]
    pub fn new(surface: S, channel: C, swap_red_blue: bool) -> Self {
        Self {
            surface,
            channel,
            swap_red_blue,
            copy_recently_done: false,
        }
    }

    #[must_use]
    pub fn into_surface(self) -> S {
        self.surface
    }

    /// Borrow the wrapped surface, e.g. to snapshot it for video pacing.
    #[must_use]
    pub fn surface(&self) -> &S {
        &self.surface
    }

    fn normalize(&self, pixels: &mut [u8]) {
        if self.swap_red_blue {
            swap_rb_channels(pixels);
        }
    }
}

/// Swap the red and blue bytes of each 32-bit-per-pixel entry in place.
/// The high byte (spec.md §4.7: "32-bit-per-pixel with an unused high
/// byte") is left untouched.
fn swap_rb_channels(pixels: &mut [u8]) {
    for pixel in pixels.chunks_exact_mut(4) {
        pixel.swap(0, 2);
    }
}

impl<S: Surface, C: DisplayChannel> BackendCallbacks for DisplayAdapter<S, C> {
    fn clipboard_received(&mut self, _bytes: &[u8]) {
        // Clipboard delivery is handled by the session driver (C8); the
        // display adapter only ever translates framebuffer/cursor
        // callbacks into surface operations.
    }

    fn cursor_updated(&mut self, mut cursor: CursorShape) {
        self.normalize(&mut cursor.pixels);
        let image = match Image::new(
            &cursor.pixels,
            cursor.width,
            cursor.height,
            cursor.stride,
            4,
        ) {
            Ok(image) => image,
            Err(e) => {
                tracing::warn!(error = %e, "dropping malformed cursor image");
                return;
            }
        };
        self.surface.set_cursor(cursor.hot_x, cursor.hot_y, image);
        self.channel.send(ChannelOp::Cursor {
            x: cursor.hot_x,
            y: cursor.hot_y,
            width: cursor.width,
            height: cursor.height,
            stride: cursor.stride,
            pixels: cursor.pixels,
        });
    }

    fn framebuffer_resized(&mut self, width: u32, height: u32) {
        self.surface.resize(width, height);
        self.channel.send(ChannelOp::Resize { width, height });
    }

    fn framebuffer_copied(&mut self, copy: FramebufferCopy) {
        self.surface.copy(
            Layer::Default,
            copy.src_x,
            copy.src_y,
            copy.width,
            copy.height,
            Layer::Default,
            copy.dst_x,
            copy.dst_y,
        );
        self.channel.send(ChannelOp::Copy {
            src_layer: Layer::Default,
            src_x: copy.src_x,
            src_y: copy.src_y,
            width: copy.width,
            height: copy.height,
            dst_layer: Layer::Default,
            dst_x: copy.dst_x,
            dst_y: copy.dst_y,
        });
        self.copy_recently_done = true;
    }

    fn framebuffer_updated(&mut self, mut update: FramebufferUpdate) {
        if self.copy_recently_done {
            self.copy_recently_done = false;
            return;
        }

        self.normalize(&mut update.pixels);
        let image = match Image::new(
            &update.pixels,
            update.width,
            update.height,
            update.stride,
            4,
        ) {
            Ok(image) => image,
            Err(e) => {
                tracing::warn!(error = %e, "dropping malformed framebuffer update");
                return;
            }
        };
        self.surface.draw(Layer::Default, update.x, update.y, image);
        self.channel.send(ChannelOp::Draw {
            layer: Layer::Default,
            x: update.x,
            y: update.y,
            width: update.width,
            height: update.height,
            stride: update.stride,
            pixels: update.pixels,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::CanvasSurface;
    use std::sync::{Arc, Mutex};

    #[derive(Default, Clone)]
    struct RecordingChannel {
        ops: Arc<Mutex<Vec<ChannelOp>>>,
    }

    impl DisplayChannel for RecordingChannel {
        fn send(&mut self, op: ChannelOp) {
            self.ops.lock().unwrap().push(op);
        }
    }

    fn op_label(op: &ChannelOp) -> &'static str {
        match op {
            ChannelOp::Draw { .. } => "draw",
            ChannelOp::Copy { .. } => "copy",
            ChannelOp::Resize { .. } => "resize",
            ChannelOp::Cursor { .. } => "cursor",
            ChannelOp::EndFrame => "end_frame",
            ChannelOp::Flush => "flush",
            ChannelOp::Sync { .. } => "sync",
            ChannelOp::EndOfStream => "end_of_stream",
            ChannelOp::Clipboard { .. } => "clipboard",
        }
    }

    fn solid_update(width: u32, height: u32, value: u8) -> FramebufferUpdate {
        FramebufferUpdate {
            x: 0,
            y: 0,
            width,
            height,
            stride: width * 4,
            pixels: vec![value; (width * height * 4) as usize],
        }
    }

    #[test]
    fn copy_suppresses_the_immediately_following_update() {
        let channel = RecordingChannel::default();
        let ops = Arc::clone(&channel.ops);
        let mut adapter = DisplayAdapter::new(CanvasSurface::new(4, 4), channel, false);

        adapter.framebuffer_copied(FramebufferCopy {
            src_x: 0,
            src_y: 0,
            width: 2,
            height: 2,
            dst_x: 2,
            dst_y: 2,
        });
        adapter.framebuffer_updated(solid_update(4, 4, 0xAA));
        // The suppressed update must not reach the surface or channel...
        let labels: Vec<_> = ops.lock().unwrap().iter().map(op_label).collect();
        assert_eq!(labels, vec!["copy"]);

        // ...but the next one, unprompted by a copy, goes through.
        adapter.framebuffer_updated(solid_update(4, 4, 0xBB));
        let labels: Vec<_> = ops.lock().unwrap().iter().map(op_label).collect();
        assert_eq!(labels, vec!["copy", "draw"]);
    }

    #[test]
    fn swap_red_blue_flips_the_first_and_third_byte_of_every_pixel() {
        let channel = RecordingChannel::default();
        let ops = Arc::clone(&channel.ops);
        let mut adapter = DisplayAdapter::new(CanvasSurface::new(1, 1), channel, true);

        let mut update = solid_update(1, 1, 0);
        update.pixels = vec![0x10, 0x20, 0x30, 0x40];
        adapter.framebuffer_updated(update);

        let recorded = ops.lock().unwrap();
        let ChannelOp::Draw { pixels, .. } = &recorded[0] else {
            panic!("expected a draw operation");
        };
        assert_eq!(pixels.as_slice(), &[0x30, 0x20, 0x10, 0x40]);
    }
}
