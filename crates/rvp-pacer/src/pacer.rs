//! Fixed-framerate pacing on top of a [`FrameEncoder`].

use crate::encoder::{EncodedFrame, EncoderConfig, FrameEncoder};
use crate::error::PacerError;

/// Compute how many encoder ticks have elapsed since `last_timestamp_ms`
/// and the snapped-to-grid timestamp that should replace it.
///
/// Returns `(elapsed_frames, new_last_timestamp_ms)`. On the very first
/// call (`last_timestamp_ms` is `None`) exactly one frame has "elapsed" so
/// the caller always encodes its first frame. A `timestamp_ms` at or
/// before `last_timestamp_ms` (clock skew, duplicate timestamps) yields
/// zero elapsed frames and leaves the grid untouched.
#[must_use]
pub fn advance_timeline(
    last_timestamp_ms: Option<u64>,
    timestamp_ms: u64,
    framerate: u32,
) -> (u64, u64) {
    let Some(last) = last_timestamp_ms else {
        return (1, timestamp_ms);
    };

    if timestamp_ms <= last {
        tracing::warn!(timestamp_ms, last, "clamping negative elapsed-frame count to zero");
        return (0, last);
    }

    let frame_duration_ms = 1000 / u64::from(framerate.max(1));
    let elapsed = (timestamp_ms - last) * u64::from(framerate) / 1000;
    if elapsed == 0 {
        return (0, last);
    }

    (elapsed, last + elapsed * frame_duration_ms)
}

/// Paces raw frames into a [`FrameEncoder`] at a fixed framerate,
/// duplicating the last frame to fill in gaps when the caller is called
/// less often than the target rate, and dropping frames that arrive
/// faster than the target rate allows.
pub struct VideoPacer {
    encoder: Box<dyn FrameEncoder>,
    width: u32,
    height: u32,
    framerate: u32,
    last_timestamp_ms: Option<u64>,
    last_frame: Option<Vec<u8>>,
}

impl VideoPacer {
    #[must_use]
    pub fn new(encoder: Box<dyn FrameEncoder>, config: &EncoderConfig) -> Self {
        Self {
            encoder,
            width: config.width,
            height: config.height,
            framerate: config.framerate,
            last_timestamp_ms: None,
            last_frame: None,
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

    /// Submit a raw `BGRx` frame for the given wall-clock timestamp.
    ///
    /// Frames arriving before the next scheduled tick are dropped
    /// (pacing); frames arriving after a gap cause the previous frame to
    /// be re-submitted to pad the gap before the new frame is encoded.
    ///
    /// A dimension mismatch is a caller contract violation and is
    /// returned as an error immediately. An encoder failure while
    /// encoding a specific frame is instead logged and that frame is
    /// dropped; the pacer's timeline still advances and later frames are
    /// unaffected (spec.md §4.4 "Failure semantics": "encoder allocation
    /// or conversion failures drop the offending frame with a warning;
    /// the pacer continues").
    pub fn write_frame(
        &mut self,
        raw_bgrx: &[u8],
        timestamp_ms: u64,
    ) -> Result<Vec<EncodedFrame>, PacerError> {
        let expected_len = (self.width as usize) * (self.height as usize) * 4;
        if raw_bgrx.len() != expected_len {
            return Err(PacerError::DimensionMismatch {
                width: self.width,
                height: self.height,
                expected_bytes: expected_len,
                got_bytes: raw_bgrx.len(),
            });
        }

        let (elapsed, new_last) =
            advance_timeline(self.last_timestamp_ms, timestamp_ms, self.framerate);
        if elapsed == 0 {
            return Ok(Vec::new());
        }
        self.last_timestamp_ms = Some(new_last);

        let mut produced = Vec::new();

        if let Some(last_frame) = self.last_frame.clone() {
            for _ in 0..elapsed.saturating_sub(1) {
                self.encode_or_drop(&last_frame, new_last, &mut produced);
            }
        }

        self.encode_or_drop(raw_bgrx, new_last, &mut produced);
        self.last_frame = Some(raw_bgrx.to_vec());

        Ok(produced)
    }

    /// Encode one frame, logging a warning and dropping it on failure
    /// rather than propagating the error to the caller.
    fn encode_or_drop(&mut self, raw_bgrx: &[u8], pts_ms: u64, produced: &mut Vec<EncodedFrame>) {
        match self.encoder.encode(raw_bgrx, pts_ms) {
            Ok(frames) => produced.extend(frames),
            Err(err) => tracing::warn!(error = %err, pts_ms, "dropping frame after encoder failure"),
        }
    }

    /// Force the next encoded frame to be a keyframe, e.g. after the
    /// consumer's decoder surface was recreated.
    pub fn force_keyframe(&mut self) {
        self.encoder.force_keyframe();
    }

    /// Flush the last held frame through the encoder and tear it down.
    pub fn close(mut self) -> Result<Vec<EncodedFrame>, PacerError> {
        let mut produced = Vec::new();
        if let Some(last_frame) = self.last_frame.take() {
            let ts = self.last_timestamp_ms.unwrap_or(0);
            produced.extend(self.encoder.encode(&last_frame, ts)?);
        }
        Ok(produced)
    }
}
