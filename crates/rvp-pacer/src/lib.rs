//! Frame-paced H.264 video encoding.
//!
//! Captured frames do not arrive at a steady rate, but the output video
//! stream must. [`VideoPacer`] sits between a capture source and a
//! [`FrameEncoder`]: it drops frames that arrive faster than the target
//! framerate and duplicates the last frame to fill in gaps when frames
//! arrive slower, keeping the encoded stream's timestamps on a fixed grid.

mod encoder;
mod error;
mod pacer;

pub use encoder::{EncodedFrame, EncoderConfig, FrameEncoder, GstEncoder};
pub use error::PacerError;
pub use pacer::{advance_timeline, VideoPacer};
