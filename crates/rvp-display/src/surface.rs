//! The surface model [`crate::DisplayAdapter`] draws onto (spec.md §4.7).

use rvp_hash::Image;

/// Which surface layer an operation targets. There is exactly one layer
/// today; kept as an enum rather than a bare unit so a future overlay
/// layer (e.g. a local cursor layer) doesn't need a breaking API change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    Default,
}

/// A drawable surface: the default framebuffer layer plus the cursor
/// image. [`crate::CanvasSurface`] is the concrete implementation backed
/// by an owned pixel buffer; a real compositor target would implement
/// this directly over its own canvas.
pub trait Surface: Send {
    /// Draw `src` at `(x, y)` on `layer`.
    fn draw(&mut self, layer: Layer, x: u32, y: u32, src: Image<'_>);

    /// Copy a rectangle from `src_layer` to `dst_layer` at `(dst_x, dst_y)`.
    fn copy(
        &mut self,
        src_layer: Layer,
        src_x: u32,
        src_y: u32,
        width: u32,
        height: u32,
        dst_layer: Layer,
        dst_x: u32,
        dst_y: u32,
    );

    /// Resize the default layer, discarding its prior contents.
    fn resize(&mut self, width: u32, height: u32);

    /// Upload a new cursor image and hotspot.
    fn set_cursor(&mut self, hot_x: u32, hot_y: u32, img: Image<'_>);
}
