//! Cyclic-polynomial pixel hashing.

use crate::image::Image;

const MULTIPLIER: u64 = 31;
const HASH_CONSTANT: u32 = 0x1B87_2E69;
pub(crate) const CELL_SIZE: u32 = 64;

/// Fold a 32-bit hash down to 24 significant bits by XORing the discarded
/// top byte back into the low bytes at three different shifts.
fn fold_32_to_24(value: u32) -> u32 {
    let upper = value & 0xFF00_0000;
    (value & 0x00FF_FFFF) ^ (upper >> 8) ^ (upper >> 16) ^ (upper >> 24)
}

/// A whole-image content hash, stable across identical pixel data and
/// sensitive to any single-pixel change.
///
/// Every pixel is folded into a running 32-bit value via a one-bit
/// rotation, an XOR with the pixel itself, and an XOR with a fixed
/// constant, then the accumulator is reduced to 24 bits.
#[must_use]
pub fn hash_image(img: &Image) -> u32 {
    let mut hash: u32 = 0;
    for y in 0..img.height() {
        for x in 0..img.width() {
            let pixel = img.pixel(x, y);
            hash = hash.rotate_left(1) ^ pixel ^ HASH_CONSTANT;
        }
    }
    fold_32_to_24(hash)
}

/// Visit the 64x64-pixel hash of every cell in `img`, calling `visit` with
/// the cell's upper-left coordinate and its hash.
///
/// `visit` returns `0` to keep iterating and any nonzero value to stop
/// early, in which case that value is returned. If `img` is smaller than
/// one cell in either dimension, no cells exist and `0` is returned without
/// calling `visit`.
///
/// Hashes are built bottom-up from a row hash (one per scanline, recomputed
/// as the scan advances) combined into a cell hash as each row within the
/// cell's height is crossed, exactly mirroring a streaming two-level
/// polynomial rolling hash rather than hashing each cell's bytes from
/// scratch.
pub fn for_each_64x64_cell<F>(img: &Image, mut visit: F) -> u64
where
    F: FnMut(u32, u32, u64) -> u64,
{
    let width = img.width();
    let height = img.height();

    if width < CELL_SIZE || height < CELL_SIZE {
        return 0;
    }

    let mut cell_hash = vec![0u64; width as usize];

    for y in 0..height {
        let mut row_hash: u64 = 0;

        for x in 0..width {
            let pixel = img.pixel(x, y);
            row_hash = row_hash.wrapping_mul(MULTIPLIER).wrapping_shl(1) + u64::from(pixel);
            cell_hash[x as usize] =
                cell_hash[x as usize].wrapping_mul(MULTIPLIER).wrapping_shl(1) + row_hash;

            if y + 1 >= CELL_SIZE && x + 1 >= CELL_SIZE {
                let cell_x = x + 1 - CELL_SIZE;
                let cell_y = y + 1 - CELL_SIZE;
                let result = visit(cell_x, cell_y, cell_hash[x as usize]);
                if result != 0 {
                    return result;
                }
            }
        }
    }

    0
}

/// Hash of a single exactly-64x64 cell, used by [`crate::diff::search`] to
/// hash the needle once before scanning the haystack.
pub(crate) fn single_cell_hash(img: &Image) -> u64 {
    let mut cell_hash: u64 = 0;
    for y in 0..CELL_SIZE {
        let mut row_hash: u64 = 0;
        for x in 0..CELL_SIZE {
            let pixel = img.pixel(x, y);
            row_hash = row_hash.wrapping_mul(MULTIPLIER).wrapping_shl(1) + u64::from(pixel);
            cell_hash = cell_hash.wrapping_mul(MULTIPLIER).wrapping_shl(1) + row_hash;
        }
    }
    cell_hash
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::Image;

    fn solid_image(width: u32, height: u32, pixel: u32) -> Vec<u8> {
        let bytes = pixel.to_le_bytes();
        let mut data = Vec::with_capacity((width * height * 4) as usize);
        for _ in 0..(width * height) {
            data.extend_from_slice(&bytes);
        }
        data
    }

    #[test]
    fn hash_changes_on_single_pixel_flip() {
        let mut data = solid_image(128, 128, 0x0011_2233);
        let stride = 128 * 4;
        let before = {
            let img = Image::new(&data, 128, 128, stride, 4).unwrap();
            hash_image(&img)
        };

        let offset = (50 * stride + 50 * 4) as usize;
        data[offset] ^= 0xFF;

        let after = {
            let img = Image::new(&data, 128, 128, stride, 4).unwrap();
            hash_image(&img)
        };

        assert_ne!(before, after);
    }

    #[test]
    fn hash_is_stable_for_identical_data() {
        let data = solid_image(32, 32, 0xDEAD_BEEF);
        let stride = 32 * 4;
        let img_a = Image::new(&data, 32, 32, stride, 4).unwrap();
        let img_b = Image::new(&data, 32, 32, stride, 4).unwrap();
        assert_eq!(hash_image(&img_a), hash_image(&img_b));
    }

    #[test]
    fn cell_iteration_skips_images_smaller_than_one_cell() {
        let data = solid_image(32, 32, 0);
        let img = Image::new(&data, 32, 32, 32 * 4, 4).unwrap();
        let visited = for_each_64x64_cell(&img, |_, _, _| 0);
        assert_eq!(visited, 0);
    }

    #[test]
    fn cell_iteration_visits_every_aligned_position() {
        let data = solid_image(66, 65, 7);
        let img = Image::new(&data, 66, 65, 66 * 4, 4).unwrap();
        let mut count = 0u64;
        for_each_64x64_cell(&img, |_, _, _| {
            count += 1;
            0
        });
        // (66 - 64 + 1) * (65 - 64 + 1) = 3 * 2
        assert_eq!(count, 6);
    }
}
