//! Clipboard encoding negotiation (spec.md §6 "Clipboard encoding"),
//! grounded in `original_source`'s `vnc/clipboard.c` / `settings.h`
//! `clipboard_encoding` pattern: the backend reports which wire encoding
//! it speaks ("ISO-8859-1" for the classic library, "UTF-8" for the
//! vendor SDK) and the session driver transcodes between that and the
//! outbound channel's native UTF-8.

use rvp_backend::{Backend, BackendCallbacks, CursorShape, FramebufferCopy, FramebufferUpdate};
use rvp_display::{ChannelOp, DisplayChannel};

/// Decode clipboard bytes received from the backend into UTF-8, per its
/// reported wire encoding. ISO-8859-1 maps byte-for-byte onto the first
/// 256 Unicode code points, so no external codec is needed for it.
#[must_use]
pub fn decode_clipboard(bytes: &[u8], backend_encoding: &str) -> String {
    match backend_encoding {
        "UTF-8" => String::from_utf8_lossy(bytes).into_owned(),
        _ => bytes.iter().map(|&b| b as char).collect(),
    }
}

/// Encode outbound clipboard text for delivery to the backend, per its
/// reported wire encoding. Characters outside ISO-8859-1's range are
/// replaced with `?`, matching how a byte-oriented wire format without a
/// Unicode escape would have to degrade.
#[must_use]
pub fn encode_clipboard(text: &str, backend_encoding: &str) -> Vec<u8> {
    match backend_encoding {
        "UTF-8" => text.as_bytes().to_vec(),
        _ => text
            .chars()
            .map(|c| u8::try_from(c as u32).unwrap_or(b'?'))
            .collect(),
    }
}

/// Encode `text` per `backend`'s reported wire encoding and enqueue it for
/// delivery, completing the outbound half of the negotiation
/// [`decode_clipboard`]/[`ClipboardRelay`] implement for the inbound half.
pub fn send_clipboard_text<B: Backend>(backend: &B, text: &str) {
    let bytes = encode_clipboard(text, backend.clipboard_encoding());
    backend.send_clipboard(&bytes);
}

/// Wraps a [`BackendCallbacks`] implementation (typically a
/// [`rvp_display::DisplayAdapter`]) and relays the clipboard payloads it
/// would otherwise drop: decodes them per `backend_encoding` and forwards
/// the result as a [`ChannelOp::Clipboard`] on the outbound channel. Every
/// other callback passes straight through to `inner` unchanged.
pub struct ClipboardRelay<B, C> {
    inner: B,
    channel: C,
    backend_encoding: &'static str,
}

impl<B: BackendCallbacks, C: DisplayChannel> ClipboardRelay<B, C> {
    #[must_use]
    pub fn new(inner: B, channel: C, backend_encoding: &'static str) -> Self {
        Self {
            inner,
            channel,
            backend_encoding,
        }
    }

    /// Borrow the wrapped callbacks, e.g. to reach through to an inner
    /// `DisplayAdapter`'s surface.
    #[must_use]
    pub fn inner(&self) -> &B {
        &self.inner
    }

    #[must_use]
    pub fn into_inner(self) -> B {
        self.inner
    }
}

impl<B: BackendCallbacks, C: DisplayChannel> BackendCallbacks for ClipboardRelay<B, C> {
    fn clipboard_received(&mut self, bytes: &[u8]) {
        let text = decode_clipboard(bytes, self.backend_encoding);
        self.channel.send(ChannelOp::Clipboard { text });
    }

    fn cursor_updated(&mut self, cursor: CursorShape) {
        self.inner.cursor_updated(cursor);
    }

    fn framebuffer_resized(&mut self, width: u32, height: u32) {
        self.inner.framebuffer_resized(width, height);
    }

    fn framebuffer_copied(&mut self, copy: FramebufferCopy) {
        self.inner.framebuffer_copied(copy);
    }

    fn framebuffer_updated(&mut self, update: FramebufferUpdate) {
        self.inner.framebuffer_updated(update);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn iso_8859_1_round_trips_latin1_text() {
        let bytes = encode_clipboard("café", "ISO-8859-1");
        assert_eq!(decode_clipboard(&bytes, "ISO-8859-1"), "café");
    }

    #[test]
    fn utf8_round_trips_arbitrary_unicode() {
        let text = "héllo 世界";
        let bytes = encode_clipboard(text, "UTF-8");
        assert_eq!(decode_clipboard(&bytes, "UTF-8"), text);
    }

    #[test]
    fn characters_outside_latin1_degrade_to_question_mark() {
        let bytes = encode_clipboard("a世b", "ISO-8859-1");
        assert_eq!(bytes, vec![b'a', b'?', b'b']);
    }

    #[derive(Default)]
    struct NoopCallbacks {
        resizes: u32,
    }

    impl BackendCallbacks for NoopCallbacks {
        fn clipboard_received(&mut self, _bytes: &[u8]) {
            panic!("ClipboardRelay must handle clipboard itself, never delegate it");
        }
        fn cursor_updated(&mut self, _cursor: CursorShape) {}
        fn framebuffer_resized(&mut self, _width: u32, _height: u32) {
            self.resizes += 1;
        }
        fn framebuffer_copied(&mut self, _copy: FramebufferCopy) {}
        fn framebuffer_updated(&mut self, _update: FramebufferUpdate) {}
    }

    #[derive(Default, Clone)]
    struct RecordingChannel {
        ops: Arc<Mutex<Vec<ChannelOp>>>,
    }

    impl DisplayChannel for RecordingChannel {
        fn send(&mut self, op: ChannelOp) {
            self.ops.lock().unwrap().push(op);
        }
    }

    #[test]
    fn relay_decodes_clipboard_and_forwards_to_the_channel() {
        let channel = RecordingChannel::default();
        let ops = Arc::clone(&channel.ops);
        let mut relay = ClipboardRelay::new(NoopCallbacks::default(), channel, "ISO-8859-1");

        let bytes = encode_clipboard("café", "ISO-8859-1");
        relay.clipboard_received(&bytes);

        let recorded = ops.lock().unwrap();
        assert_eq!(recorded.len(), 1);
        let ChannelOp::Clipboard { text } = &recorded[0] else {
            panic!("expected a clipboard operation");
        };
        assert_eq!(text, "café");
    }

    #[test]
    fn relay_still_delegates_non_clipboard_callbacks_to_the_inner_adapter() {
        let mut relay = ClipboardRelay::new(NoopCallbacks::default(), RecordingChannel::default(), "UTF-8");
        relay.framebuffer_resized(800, 600);
        assert_eq!(relay.inner().resizes, 1);
    }
}
