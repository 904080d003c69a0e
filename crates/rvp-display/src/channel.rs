//! The outbound display channel (spec.md §6 "Outbound display channel").
//!
//! Its wire format is explicitly out of scope (spec.md §1 Non-goals); this
//! crate only defines the operation set and a `tokio::sync::mpsc`-backed
//! implementation that hands owned [`ChannelOp`]s to whatever encodes and
//! ships them.

use crate::surface::Layer;

/// One operation emitted on the outbound display channel. Pixel data is
/// always owned here since it must outlive the call that produced it
/// (the sender may run arbitrarily far ahead of the channel's consumer).
#[derive(Debug, Clone)]
pub enum ChannelOp {
    Draw {
        layer: Layer,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        stride: u32,
        pixels: Vec<u8>,
    },
    Copy {
        src_layer: Layer,
        src_x: u32,
        src_y: u32,
        width: u32,
        height: u32,
        dst_layer: Layer,
        dst_x: u32,
        dst_y: u32,
    },
    Resize {
        width: u32,
        height: u32,
    },
    Cursor {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        stride: u32,
        pixels: Vec<u8>,
    },
    EndFrame,
    Flush,
    /// The video pacer's "sync" marker (spec.md §4.4): the logical
    /// wall-clock time associated with the frame contents that follow.
    Sync { timestamp_ms: u64 },
    /// The video pacer's end-of-stream marker, emitted once on
    /// [`crate::DisplayAdapter`] teardown.
    EndOfStream,
    /// A clipboard payload, already recoded to the channel's native UTF-8
    /// (spec.md §6 "Clipboard encoding").
    Clipboard { text: String },
}

/// The channel consumed by C7/C8 and produced by the display model
/// (spec.md §6). `tracing::warn!`-and-drop is an acceptable response to a
/// full or closed channel; a stalled display consumer must never block
/// the frame loop.
pub trait DisplayChannel: Send {
    fn send(&mut self, op: ChannelOp);
}

/// [`DisplayChannel`] backed by a bounded `tokio::sync::mpsc` channel.
/// Sends are best-effort: a full channel means the consumer has fallen
/// behind, and the frame is dropped rather than blocking the producer.
///
/// Cloning shares the same underlying queue (`Sender` is itself `Clone`),
/// so the same outbound channel can be handed to a [`crate::DisplayAdapter`]
/// for framebuffer/cursor ops and kept by the session driver for the
/// frame-end/flush/sync markers it emits directly.
#[derive(Clone)]
pub struct MpscDisplayChannel {
    tx: tokio::sync::mpsc::Sender<ChannelOp>,
}

impl MpscDisplayChannel {
    #[must_use]
    pub fn new(capacity: usize) -> (Self, tokio::sync::mpsc::Receiver<ChannelOp>) {
        let (tx, rx) = tokio::sync::mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

impl DisplayChannel for MpscDisplayChannel {
    fn send(&mut self, op: ChannelOp) {
        if self.tx.try_send(op).is_err() {
            tracing::warn!("display channel full or closed, dropping operation");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn forwards_operations_in_order() {
        let (mut channel, mut rx) = MpscDisplayChannel::new(8);
        channel.send(ChannelOp::Resize {
            width: 800,
            height: 600,
        });
        channel.send(ChannelOp::EndFrame);

        assert!(matches!(rx.recv().await, Some(ChannelOp::Resize { width: 800, height: 600 })));
        assert!(matches!(rx.recv().await, Some(ChannelOp::EndFrame)));
    }

    #[tokio::test]
    async fn full_channel_drops_rather_than_blocks() {
        let (mut channel, _rx) = MpscDisplayChannel::new(1);
        channel.send(ChannelOp::Flush);
        // Second send has nowhere to go (receiver never drains); must not
        // panic or block.
        channel.send(ChannelOp::Flush);
    }
}
