/// Errors surfaced by the encoder and the pacer driving it.
#[derive(Debug, thiserror::Error)]
pub enum PacerError {
    #[error("failed to build GStreamer encoding pipeline: {0}")]
    PipelineInit(String),

    #[error("failed to push frame into encoder: {0}")]
    EncodeFailed(String),

    #[error("frame buffer is {got_bytes} bytes, pacer expected {expected_bytes} bytes for {width}x{height} BGRx")]
    DimensionMismatch {
        width: u32,
        height: u32,
        expected_bytes: usize,
        got_bytes: usize,
    },
}
