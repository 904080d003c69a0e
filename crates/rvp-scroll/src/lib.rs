//! Scroll/translation detection.
//!
//! Before falling back to a full pixel diff, a dirty region is checked for
//! whether it is actually the same content translated a few pixels in one
//! direction, as happens continuously while a terminal or document scrolls.
//! [`estimate_delta`] finds the translation vector (if any) by locating a
//! small tile from the new frame inside a window of the old frame;
//! [`clip_to_common_rect`] turns a confirmed delta into the largest
//! source/destination rectangle pair that a scrolling copy can reuse
//! instead of re-encoding, and [`find_common_rect`] runs the whole
//! pipeline over a pair of full frames, matching a whole-image scroll
//! detector's public contract.

use rvp_hash::{compare, search, Image, Rect};

/// Search window size, in pixels, centered on the region under test.
const WINDOW_SIZE: u32 = 512;

/// Size of the tile taken from the center of the window to search for.
const TILE_SIZE: u32 = 64;

/// Minimum width/height required of both frames before whole-image scroll
/// detection is attempted.
const MIN_IMAGE_SIZE: u32 = 64;

/// The source/destination rectangle pair produced by a confirmed
/// whole-image scroll: `src` in the old frame and `dst` in the new frame
/// name the same content, `width`/`height` apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommonRect {
    pub src: Rect,
    pub dst: Rect,
    pub width: u32,
    pub height: u32,
}

/// Detect whether `new` is a translated (scrolled) copy of `old` and, if
/// so, return the largest source/destination rectangle pair the two
/// frames share.
///
/// Requires both frames to share dimensions and be at least
/// [`MIN_IMAGE_SIZE`] pixels in both axes; otherwise returns `None`. The
/// detector is one-sided: a missed tile match or a failed verification
/// both report `None` (a false negative), but a `Some` result has always
/// passed a byte-exact comparison (no false positives).
#[must_use]
pub fn find_common_rect(old: &Image, new: &Image) -> Option<CommonRect> {
    if old.width() != new.width() || old.height() != new.height() {
        return None;
    }
    if old.width() < MIN_IMAGE_SIZE || old.height() < MIN_IMAGE_SIZE {
        return None;
    }

    let region = Rect::new(0, 0, old.width(), old.height());
    let delta = locate_delta(old, new, region)?;
    let (src, dst) = clip_to_common_rect(old, new, delta, region)?;

    let src_img = old.sub_rect(src);
    let dst_img = new.sub_rect(dst);
    if compare(&src_img, &dst_img) != 0 {
        return None;
    }

    Some(CommonRect {
        src,
        dst,
        width: dst.width,
        height: dst.height,
    })
}

/// A translation vector: the new frame's content is the old frame's
/// content shifted by `(dx, dy)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delta {
    pub dx: i32,
    pub dy: i32,
}

/// Estimate the scroll translation between `old` and `new` around `region`.
///
/// A window of up to [`WINDOW_SIZE`] pixels centered on `region` is taken
/// from both frames. A 64x64 tile from the center of the new frame's
/// window is searched for inside the old frame's window; a match gives a
/// candidate delta, which is then verified by an exact comparison of the
/// full region shifted by that delta. Returns `None` if the frames differ
/// in size, the region is too small to search, no tile match is found, or
/// the candidate delta fails verification.
#[must_use]
pub fn estimate_delta(old: &Image, new: &Image, region: Rect) -> Option<Delta> {
    if old.width() != new.width() || old.height() != new.height() {
        return None;
    }

    let delta = locate_delta(old, new, region)?;
    verify_delta(old, new, region, delta).then_some(delta)
}

/// Steps 1-4 of scroll detection: take a centered window, search for the
/// new frame's center tile inside it, and report the resulting delta
/// without verifying it against `region`. Exposed separately so callers
/// that clip to a smaller rectangle before verifying (as whole-image scroll
/// detection must, since verifying the unclipped region against an
/// interior-only shift always runs off the edge) can skip the redundant
/// full-region check.
fn locate_delta(old: &Image, new: &Image, region: Rect) -> Option<Delta> {
    let window = centered_window(region, old.width(), old.height(), WINDOW_SIZE);
    if window.width < TILE_SIZE || window.height < TILE_SIZE {
        return None;
    }

    let tile_x = window.x + (window.width - TILE_SIZE) / 2;
    let tile_y = window.y + (window.height - TILE_SIZE) / 2;
    let tile = new.sub_rect(Rect::new(tile_x, tile_y, TILE_SIZE, TILE_SIZE));

    let old_window = old.sub_rect(window);
    let (found_x, found_y) = search(&old_window, &tile)?;

    let old_abs_x = window.x + found_x;
    let old_abs_y = window.y + found_y;

    Some(Delta {
        dx: tile_x as i64 as i32 - old_abs_x as i64 as i32,
        dy: tile_y as i64 as i32 - old_abs_y as i64 as i32,
    })
}

/// Clip `region` and its `delta`-shifted counterpart to the rectangle pair
/// a scrolling copy can actually use: `(source_rect_in_old, dest_rect_in_new)`.
///
/// Both frames must share dimensions. Returns `None` if clipping leaves an
/// empty rectangle, i.e. the delta carries the region entirely out of
/// frame.
#[must_use]
pub fn clip_to_common_rect(old: &Image, new: &Image, delta: Delta, region: Rect) -> Option<(Rect, Rect)> {
    if old.width() != new.width() || old.height() != new.height() {
        return None;
    }

    let dst = clip_for_shift(region, delta, old.width(), old.height())?;
    let src = shifted_rect(dst, -delta.dx, -delta.dy, old.width(), old.height())?;

    if src.width == 0 || src.height == 0 {
        return None;
    }

    Some((src, dst))
}

fn centered_window(region: Rect, img_w: u32, img_h: u32, max_size: u32) -> Rect {
    let cx = region.x as i64 + region.width as i64 / 2;
    let cy = region.y as i64 + region.height as i64 / 2;
    let half = max_size as i64 / 2;

    let x0 = (cx - half).max(0);
    let y0 = (cy - half).max(0);
    let x1 = (cx + half).min(img_w as i64);
    let y1 = (cy + half).min(img_h as i64);

    let width = (x1 - x0).max(0) as u32;
    let height = (y1 - y0).max(0) as u32;
    Rect::new(x0 as u32, y0 as u32, width, height)
}

fn shifted_rect(base: Rect, dx: i32, dy: i32, img_w: u32, img_h: u32) -> Option<Rect> {
    let x = base.x as i64 + dx as i64;
    let y = base.y as i64 + dy as i64;
    if x < 0 || y < 0 {
        return None;
    }
    let (x, y) = (x as u32, y as u32);
    if x + base.width > img_w || y + base.height > img_h {
        return None;
    }
    Some(Rect::new(x, y, base.width, base.height))
}

fn clip_for_shift(rect: Rect, delta: Delta, img_w: u32, img_h: u32) -> Option<Rect> {
    let mut x0 = rect.x as i64;
    let mut y0 = rect.y as i64;
    let mut x1 = rect.x as i64 + rect.width as i64;
    let mut y1 = rect.y as i64 + rect.height as i64;

    x0 = x0.max(i64::from(delta.dx)).max(0);
    y0 = y0.max(i64::from(delta.dy)).max(0);
    x1 = x1.min(img_w as i64 + i64::from(delta.dx)).min(img_w as i64);
    y1 = y1.min(img_h as i64 + i64::from(delta.dy)).min(img_h as i64);

    if x1 <= x0 || y1 <= y0 {
        return None;
    }
    Some(Rect::new(x0 as u32, y0 as u32, (x1 - x0) as u32, (y1 - y0) as u32))
}

fn verify_delta(old: &Image, new: &Image, region: Rect, delta: Delta) -> bool {
    let Some(old_rect) = shifted_rect(region, -delta.dx, -delta.dy, old.width(), old.height()) else {
        return false;
    };
    let old_block = old.sub_rect(old_rect);
    let new_block = new.sub_rect(region);
    compare(&old_block, &new_block) == 0
}
