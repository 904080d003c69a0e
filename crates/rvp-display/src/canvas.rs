//! [`CanvasSurface`]: an owned-pixel-buffer [`Surface`] plus the
//! multi-monitor virtual-desktop bounding box the teacher's
//! `rdp-capture::compositor` already computed. Kept as ambient capability
//! (spec.md doesn't forbid it) for whichever session wiring needs a
//! concrete, in-process `Surface` rather than a remote compositor target.

use rvp_hash::Image;

use crate::surface::{Layer, Surface};

const BYTES_PER_PIXEL: usize = 4;

/// A single monitor's placement within a virtual desktop, exactly the
/// shape the teacher's compositor used to lay out multi-monitor captures.
#[derive(Debug, Clone, Copy)]
pub struct MonitorInfo {
    pub width: u16,
    pub height: u16,
    pub x: i32,
    pub y: i32,
}

/// The bounding box `(width, height)` of the virtual desktop spanned by
/// `monitors`, each placed at its own offset.
#[must_use]
pub fn bounding_box(monitors: &[MonitorInfo]) -> (u16, u16) {
    if monitors.is_empty() {
        return (0, 0);
    }

    let mut max_x: i32 = 0;
    let mut max_y: i32 = 0;
    for m in monitors {
        max_x = max_x.max(m.x + i32::from(m.width));
        max_y = max_y.max(m.y + i32::from(m.height));
    }

    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    let width = max_x.max(0).min(i32::from(u16::MAX)) as u16;
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    let height = max_y.max(0).min(i32::from(u16::MAX)) as u16;
    (width, height)
}

/// An owned 32-bit-per-pixel canvas, plus a separately owned cursor
/// image. The default [`Surface`] implementation used wherever the
/// session needs an in-process framebuffer rather than a remote
/// compositor target.
pub struct CanvasSurface {
    width: u32,
    height: u32,
    stride: u32,
    pixels: Vec<u8>,
    cursor: Option<CursorState>,
}

struct CursorState {
    hot_x: u32,
    hot_y: u32,
    width: u32,
    height: u32,
    stride: u32,
    pixels: Vec<u8>,
}

impl CanvasSurface {
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        let stride = width * BYTES_PER_PIXEL as u32;
        Self {
            width,
            height,
            stride,
            pixels: vec![0u8; (stride as usize) * (height as usize)],
            cursor: None,
        }
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// The current cursor hotspot and image, if one has been uploaded.
    #[must_use]
    pub fn cursor(&self) -> Option<(u32, u32, Image<'_>)> {
        let cursor = self.cursor.as_ref()?;
        let image = Image::new(
            &cursor.pixels,
            cursor.width,
            cursor.height,
            cursor.stride,
            4,
        )
        .expect("cursor buffer is always sized for its own stride/height");
        Some((cursor.hot_x, cursor.hot_y, image))
    }

    /// Borrow the canvas as an [`Image`] for inspection (tests, or handing
    /// to the hashing/diff algorithms upstream of the frame pacer).
    #[must_use]
    pub fn as_image(&self) -> Image<'_> {
        Image::new(&self.pixels, self.width, self.height, self.stride, 4)
            .expect("canvas buffer is always sized for its own stride/height")
    }

    /// The tightly packed `BGRx` buffer backing this canvas: `stride`
    /// always equals `width * 4` here, so this is exactly the
    /// `width * height * 4` byte layout a video pacer's `write_frame`
    /// expects, with no row padding to strip.
    #[must_use]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }
}

impl Surface for CanvasSurface {
    fn draw(&mut self, _layer: Layer, x: u32, y: u32, src: Image<'_>) {
        blit(
            &mut self.pixels,
            self.stride as usize,
            self.width,
            self.height,
            x,
            y,
            src,
        );
    }

    fn copy(
        &mut self,
        _src_layer: Layer,
        src_x: u32,
        src_y: u32,
        width: u32,
        height: u32,
        _dst_layer: Layer,
        dst_x: u32,
        dst_y: u32,
    ) {
        let stride = self.stride as usize;
        // When src and dst rows overlap vertically and the destination is
        // below the source, copying top-to-bottom would overwrite a row
        // before it is read. Reverse the iteration order in that case,
        // matching `memmove`'s overlap-safe direction.
        let rows: Box<dyn Iterator<Item = u32>> = if dst_y > src_y {
            Box::new((0..height).rev())
        } else {
            Box::new(0..height)
        };
        for row in rows {
            let src_row = src_y + row;
            let dst_row = dst_y + row;
            if src_row >= self.height || dst_row >= self.height {
                continue;
            }
            let copy_width = width.min(self.width.saturating_sub(src_x.max(dst_x))) as usize;
            if copy_width == 0 {
                continue;
            }
            let src_off = (src_row as usize) * stride + (src_x as usize) * BYTES_PER_PIXEL;
            let dst_off = (dst_row as usize) * stride + (dst_x as usize) * BYTES_PER_PIXEL;
            let byte_len = copy_width * BYTES_PER_PIXEL;

            if src_off == dst_off {
                continue;
            }
            let mut row_buf = vec![0u8; byte_len];
            row_buf.copy_from_slice(&self.pixels[src_off..src_off + byte_len]);
            self.pixels[dst_off..dst_off + byte_len].copy_from_slice(&row_buf);
        }
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.stride = width * BYTES_PER_PIXEL as u32;
        self.pixels = vec![0u8; (self.stride as usize) * (height as usize)];
    }

    fn set_cursor(&mut self, hot_x: u32, hot_y: u32, img: Image<'_>) {
        // Repacked tightly (row pitch == width * 4), independent of the
        // source image's own stride.
        self.cursor = Some(CursorState {
            hot_x,
            hot_y,
            width: img.width(),
            height: img.height(),
            stride: img.width() * BYTES_PER_PIXEL as u32,
            pixels: (0..img.height())
                .flat_map(|row| img.row(row).to_vec())
                .collect(),
        });
    }
}

/// Blit `src` onto `canvas` at `(x, y)`, clipping to the canvas bounds.
/// Grounded in the teacher's `rdp-capture::compositor::blit_frame`.
fn blit(
    canvas: &mut [u8],
    canvas_stride: usize,
    canvas_width: u32,
    canvas_height: u32,
    x: u32,
    y: u32,
    src: Image<'_>,
) {
    for row in 0..src.height() {
        let dst_y = y + row;
        if dst_y >= canvas_height {
            continue;
        }

        let visible_width = src.width().min(canvas_width.saturating_sub(x));
        if visible_width == 0 {
            continue;
        }

        let src_row = src.row(row);
        let byte_len = (visible_width as usize) * BYTES_PER_PIXEL;
        let dst_off = (dst_y as usize) * canvas_stride + (x as usize) * BYTES_PER_PIXEL;
        canvas[dst_off..dst_off + byte_len].copy_from_slice(&src_row[..byte_len]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounding_box_of_two_side_by_side_monitors() {
        let monitors = [
            MonitorInfo {
                width: 1920,
                height: 1080,
                x: 0,
                y: 0,
            },
            MonitorInfo {
                width: 1280,
                height: 1024,
                x: 1920,
                y: 0,
            },
        ];
        assert_eq!(bounding_box(&monitors), (3200, 1080));
    }

    #[test]
    fn bounding_box_of_no_monitors_is_zero() {
        assert_eq!(bounding_box(&[]), (0, 0));
    }

    #[test]
    fn draw_places_pixels_at_the_requested_offset() {
        let mut canvas = CanvasSurface::new(4, 4);
        let src_data = vec![0xFFu8; 2 * 2 * 4];
        let src = Image::new(&src_data, 2, 2, 2 * 4, 4).unwrap();
        canvas.draw(Layer::Default, 1, 1, src);

        let image = canvas.as_image();
        assert_eq!(image.pixel(1, 1), 0xFFFF_FFFF);
        assert_eq!(image.pixel(0, 0), 0);
    }

    #[test]
    fn draw_clips_at_the_canvas_edge() {
        let mut canvas = CanvasSurface::new(2, 2);
        let src_data = vec![0xFFu8; 4 * 4 * 4];
        let src = Image::new(&src_data, 4, 4, 4 * 4, 4).unwrap();
        // Should not panic despite the source overflowing the canvas.
        canvas.draw(Layer::Default, 0, 0, src);
        assert_eq!(canvas.as_image().pixel(1, 1), 0xFFFF_FFFF);
    }

    #[test]
    fn copy_moves_a_rectangle_within_the_canvas() {
        let mut canvas = CanvasSurface::new(4, 4);
        let src_data = vec![0xAAu8; 2 * 2 * 4];
        let src = Image::new(&src_data, 2, 2, 2 * 4, 4).unwrap();
        canvas.draw(Layer::Default, 0, 0, src);

        canvas.copy(Layer::Default, 0, 0, 2, 2, Layer::Default, 2, 2);
        let image = canvas.as_image();
        assert_eq!(image.pixel(2, 2), 0xAAAA_AAAA);
        assert_eq!(image.pixel(3, 3), 0xAAAA_AAAA);
    }

    #[test]
    fn copy_handles_vertically_overlapping_downward_shift() {
        // A 1-row-tall vertical overlap: column 0 holds distinct markers
        // per row; shifting the whole column down by one row must not let
        // an earlier write clobber a row the copy still needs to read.
        let mut canvas = CanvasSurface::new(1, 4);
        for y in 0..4u32 {
            let marker = vec![(y + 1) as u8; 4];
            let src = Image::new(&marker, 1, 1, 4, 4).unwrap();
            canvas.draw(Layer::Default, 0, y, src);
        }

        canvas.copy(Layer::Default, 0, 0, 1, 3, Layer::Default, 0, 1);
        let image = canvas.as_image();
        assert_eq!(image.pixel(0, 1), 0x0101_0101);
        assert_eq!(image.pixel(0, 2), 0x0202_0202);
        assert_eq!(image.pixel(0, 3), 0x0303_0303);
    }

    #[test]
    fn set_cursor_stores_the_hotspot_and_image() {
        let mut canvas = CanvasSurface::new(4, 4);
        assert!(canvas.cursor().is_none());

        let src_data = vec![0x7Fu8; 2 * 2 * 4];
        let src = Image::new(&src_data, 2, 2, 2 * 4, 4).unwrap();
        canvas.set_cursor(1, 1, src);

        let (hot_x, hot_y, image) = canvas.cursor().unwrap();
        assert_eq!((hot_x, hot_y), (1, 1));
        assert_eq!(image.pixel(0, 0), 0x7F7F_7F7F);
    }

    #[test]
    fn resize_clears_prior_contents() {
        let mut canvas = CanvasSurface::new(2, 2);
        let src_data = vec![0xFFu8; 2 * 2 * 4];
        let src = Image::new(&src_data, 2, 2, 2 * 4, 4).unwrap();
        canvas.draw(Layer::Default, 0, 0, src);

        canvas.resize(3, 3);
        assert_eq!(canvas.width(), 3);
        assert_eq!(canvas.as_image().pixel(0, 0), 0);
    }
}
