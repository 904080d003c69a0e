//! Pixel hashing and image diffing.
//!
//! Provides the cyclic-polynomial rolling hash used to fingerprint
//! 64x64-pixel cells of a captured frame, and the two comparison
//! operations built on top of it: locating a previously-seen tile inside a
//! newer frame ([`search`]), and finding the largest rectangle of pixels
//! two frames still share ([`largest_common_rect`]).

mod diff;
mod hash;
mod image;

pub use diff::{compare, largest_common_rect, search};
pub use hash::{for_each_64x64_cell, hash_image};
pub use image::{Image, ImageError, Rect};
