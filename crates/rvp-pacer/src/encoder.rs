//! H.264 encoding backend.

use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_app::{AppSink, AppSrc};
use gstreamer_video as gst_video;

use crate::error::PacerError;

/// Encoder construction parameters.
#[derive(Debug, Clone, Copy)]
pub struct EncoderConfig {
    pub width: u32,
    pub height: u32,
    pub framerate: u32,
    pub bitrate_bps: u32,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            framerate: 25,
            bitrate_bps: 4_000_000,
        }
    }
}

/// One encoded access unit produced by a [`FrameEncoder`].
#[derive(Debug, Clone)]
pub struct EncodedFrame {
    pub data: Vec<u8>,
    pub keyframe: bool,
    pub pts_ms: u64,
}

/// A stateful H.264 encoder accepting raw BGRx frames and producing
/// encoded access units, possibly with internal buffering delay.
pub trait FrameEncoder: Send {
    /// Push one raw frame (`BGRx`, `width * height * 4` bytes, no padding)
    /// and drain whatever encoded output is currently available. The
    /// return value may be empty if the encoder is still buffering.
    fn encode(&mut self, raw_bgrx: &[u8], pts_ms: u64) -> Result<Vec<EncodedFrame>, PacerError>;

    /// Request that the next encoded frame be a keyframe, e.g. because the
    /// decoder's surface was just (re)created.
    fn force_keyframe(&mut self);

    /// Human-readable identifier of the concrete encoder in use, for logs.
    fn encoder_type(&self) -> &'static str;
}

/// Software H.264 encoder built on a GStreamer `appsrc ! videoconvert !
/// x264enc ! h264parse ! appsink` pipeline, tuned for low latency.
pub struct GstEncoder {
    pipeline: gst::Pipeline,
    appsrc: AppSrc,
    appsink: AppSink,
}

impl GstEncoder {
    pub fn new(config: &EncoderConfig) -> Result<Self, PacerError> {
        let description = format!(
            "appsrc name=rvp_src format=time is-live=true block=true \
             caps=video/x-raw,format=BGRx,width={width},height={height},framerate={fps}/1 ! \
             videoscale method=bicubic ! videoconvert ! \
             video/x-raw,format=I420,width={width},height={height} ! \
             x264enc name=rvp_enc tune=zerolatency speed-preset=ultrafast \
             key-int-max={fps} bitrate={kbps} byte-stream=true ! \
             h264parse config-interval=-1 ! \
             appsink name=rvp_sink sync=false max-buffers=4 drop=true",
            width = config.width,
            height = config.height,
            fps = config.framerate.max(1),
            kbps = (config.bitrate_bps / 1000).max(1),
        );

        let element = gst::parse::launch(&description)
            .map_err(|e| PacerError::PipelineInit(e.to_string()))?;
        let pipeline = element
            .downcast::<gst::Pipeline>()
            .map_err(|_| PacerError::PipelineInit("parsed graph is not a pipeline".into()))?;

        let appsrc = pipeline
            .by_name("rvp_src")
            .ok_or_else(|| PacerError::PipelineInit("appsrc element missing".into()))?
            .downcast::<AppSrc>()
            .map_err(|_| PacerError::PipelineInit("rvp_src is not an appsrc".into()))?;

        let appsink = pipeline
            .by_name("rvp_sink")
            .ok_or_else(|| PacerError::PipelineInit("appsink element missing".into()))?
            .downcast::<AppSink>()
            .map_err(|_| PacerError::PipelineInit("rvp_sink is not an appsink".into()))?;

        pipeline
            .set_state(gst::State::Playing)
            .map_err(|e| PacerError::PipelineInit(e.to_string()))?;

        Ok(Self {
            pipeline,
            appsrc,
            appsink,
        })
    }
}

impl FrameEncoder for GstEncoder {
    fn encode(&mut self, raw_bgrx: &[u8], pts_ms: u64) -> Result<Vec<EncodedFrame>, PacerError> {
        let mut buffer = gst::Buffer::with_size(raw_bgrx.len())
            .map_err(|e| PacerError::EncodeFailed(e.to_string()))?;
        {
            let buffer_mut = buffer.get_mut().expect("buffer has a single owner here");
            buffer_mut.set_pts(gst::ClockTime::from_mseconds(pts_ms));
            let mut map = buffer_mut
                .map_writable()
                .map_err(|e| PacerError::EncodeFailed(e.to_string()))?;
            map.copy_from_slice(raw_bgrx);
        }

        self.appsrc
            .push_buffer(buffer)
            .map_err(|e| PacerError::EncodeFailed(e.to_string()))?;

        let mut frames = Vec::new();
        while let Some(sample) = self.appsink.try_pull_sample(gst::ClockTime::ZERO) {
            let Some(sample_buffer) = sample.buffer() else {
                continue;
            };
            let keyframe = !sample_buffer
                .flags()
                .contains(gst::BufferFlags::DELTA_UNIT);
            let map = sample_buffer
                .map_readable()
                .map_err(|e| PacerError::EncodeFailed(e.to_string()))?;
            frames.push(EncodedFrame {
                data: map.as_slice().to_vec(),
                keyframe,
                pts_ms: sample_buffer
                    .pts()
                    .map(|t| t.mseconds())
                    .unwrap_or(pts_ms),
            });
        }

        Ok(frames)
    }

    fn force_keyframe(&mut self) {
        let event = gst_video::UpstreamForceKeyUnitEvent::builder()
            .all_headers(true)
            .build();
        let _ = self.appsrc.send_event(event);
    }

    fn encoder_type(&self) -> &'static str {
        "x264enc"
    }
}

impl Drop for GstEncoder {
    fn drop(&mut self) {
        let _ = self.pipeline.set_state(gst::State::Null);
    }
}
