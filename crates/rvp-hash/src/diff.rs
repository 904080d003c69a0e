//! Image comparison: needle search and largest-common-rectangle diffing.

use crate::hash::{for_each_64x64_cell, single_cell_hash, CELL_SIZE};
use crate::image::{Image, Rect};

/// Granularity, in pixels, at which the largest-common-rectangle search
/// samples equality between two images. Matches regions are always aligned
/// to this grid and sized in multiples of it.
const STEP: u32 = 16;

/// Search `haystack` for the first position at which `needle` occurs
/// byte-for-byte, scanning top-to-bottom, left-to-right.
///
/// `needle` must be exactly 64x64 pixels; any other size returns `None`.
/// Candidate positions are found via a hash comparison first and confirmed
/// with an exact byte comparison, so hash collisions never produce a false
/// positive.
#[must_use]
pub fn search(haystack: &Image, needle: &Image) -> Option<(u32, u32)> {
    if needle.width() != CELL_SIZE || needle.height() != CELL_SIZE {
        return None;
    }

    let needle_hash = single_cell_hash(needle);
    let mut found: Option<(u32, u32)> = None;

    for_each_64x64_cell(haystack, |x, y, hash| {
        if hash == needle_hash {
            let candidate = haystack.sub_rect(Rect::new(x, y, CELL_SIZE, CELL_SIZE));
            if compare(&candidate, needle) == 0 {
                found = Some((x, y));
                return 1;
            }
        }
        0
    });

    found
}

/// Lexicographically compare two images: first by width, then by height,
/// then by the first row whose bytes differ. Returns `0` for pixel-exact
/// equality, matching C `memcmp` sign conventions.
#[must_use]
pub fn compare(a: &Image, b: &Image) -> i32 {
    if a.width() != b.width() {
        return (a.width() as i64 - b.width() as i64) as i32;
    }
    if a.height() != b.height() {
        return (a.height() as i64 - b.height() as i64) as i32;
    }

    for y in 0..a.height() {
        let row_a = a.row(y);
        let row_b = b.row(y);
        if let Some(diff) = compare_bytes(row_a, row_b) {
            return diff;
        }
    }

    0
}

fn compare_bytes(a: &[u8], b: &[u8]) -> Option<i32> {
    a.iter()
        .zip(b.iter())
        .find_map(|(&x, &y)| (x != y).then(|| i32::from(x) - i32::from(y)))
}

/// Find the largest axis-aligned rectangle of pixels that are identical
/// between `a` and `b`, sampled on a [`STEP`]-pixel grid.
///
/// `a` and `b` must have identical dimensions. Equality is tested block by
/// block to build a per-column run-length histogram as the grid is scanned
/// row by row, and the classic largest-rectangle-in-histogram algorithm is
/// applied to each row's histogram to find the best match so far. Returns
/// `None` if the images differ in size, are smaller than one grid step, or
/// share no common rectangle at all.
#[must_use]
pub fn largest_common_rect(a: &Image, b: &Image) -> Option<Rect> {
    if a.width() != b.width() || a.height() != b.height() {
        return None;
    }

    let cols = a.width() / STEP;
    let rows = a.height() / STEP;
    if cols == 0 || rows == 0 {
        return None;
    }

    let mut run_heights = vec![0u32; cols as usize];
    let mut best_area: u64 = 0;
    let mut best_rect: Option<Rect> = None;

    for row in 0..rows {
        for col in 0..cols {
            let block_rect = Rect::new(col * STEP, row * STEP, STEP, STEP);
            let block_a = a.sub_rect(block_rect);
            let block_b = b.sub_rect(block_rect);
            if compare(&block_a, &block_b) == 0 {
                run_heights[col as usize] += 1;
            } else {
                run_heights[col as usize] = 0;
            }
        }

        if let Some((left, right, height)) = largest_rectangle_in_histogram(&run_heights) {
            let grid_width = right - left + 1;
            let area = u64::from(grid_width) * u64::from(height) * u64::from(STEP) * u64::from(STEP);
            if area > best_area {
                best_area = area;
                let grid_y = row + 1 - height;
                best_rect = Some(Rect::new(
                    left * STEP,
                    grid_y * STEP,
                    grid_width * STEP,
                    height * STEP,
                ));
            }
        }
    }

    best_rect
}

/// Largest rectangle in a histogram, via the standard monotone-stack
/// algorithm. Returns `(left_index, right_index, height)` of the winning
/// rectangle, inclusive on both ends.
fn largest_rectangle_in_histogram(heights: &[u32]) -> Option<(u32, u32, u32)> {
    let mut stack: Vec<(u32, u32)> = Vec::new();
    let mut best: Option<(u32, u32, u32)> = None;
    let mut best_area: u64 = 0;
    let n = heights.len() as u32;

    for i in 0..=n {
        let current = if i < n { heights[i as usize] } else { 0 };
        let mut start = i;

        while let Some(&(idx, height)) = stack.last() {
            if height <= current {
                break;
            }
            stack.pop();
            let area = u64::from(height) * u64::from(i - idx);
            if area > best_area {
                best_area = area;
                best = Some((idx, i - 1, height));
            }
            start = idx;
        }

        if current > 0 {
            stack.push((start, current));
        }
    }

    best
}
