//! The classic (library-driven) backend: a thin wrapper over an abstracted
//! viewer library whose hooks mirror [`BackendCallbacks`] directly.
//!
//! Implementing the wire protocol the real library speaks is out of scope
//! (spec.md §1 Non-goals); [`ViewerLibrary`] is the seam a concrete
//! implementation would fill in. Unlike the vendor-SDK backend, this one
//! tolerates being driven from any thread as long as calls are
//! serialized, which a plain mutex is sufficient for.

use std::os::unix::io::RawFd;
use std::sync::{Condvar, Mutex};

use nix::poll::{PollFd, PollFlags, PollTimeout};
use nix::unistd::close;
use std::os::fd::BorrowedFd;

use crate::callbacks::BackendCallbacks;
use crate::error::BackendError;
use crate::settings::BackendSettings;
use crate::{Backend, ConnectionState, UpdateWait};

/// The abstracted library surface this backend drives. A real
/// implementation owns the socket and the wire-protocol state machine;
/// both are explicitly out of scope here.
pub trait ViewerLibrary: Send {
    /// Establish the connection. Blocks until the handshake completes or
    /// fails.
    fn connect(settings: &BackendSettings) -> Result<Self, BackendError>
    where
        Self: Sized;

    /// The underlying socket, for the bounded `select` in
    /// [`ClassicBackend::wait_for_update`].
    fn socket_fd(&self) -> RawFd;

    /// Decode whatever the socket currently has buffered, firing
    /// `callbacks` for anything it produces. Returns `Ok(false)` on a
    /// clean EOF (the remote end disconnected).
    fn handle_messages(&mut self, callbacks: &mut dyn BackendCallbacks) -> Result<bool, BackendError>;

    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn send_key_event(&mut self, keysym: u32, down: bool);
    fn send_pointer_event(&mut self, x: u16, y: u16, mask: u8);
    /// `bytes` is already wire-encoded (ISO-8859-1 for this backend).
    fn send_client_cut_text(&mut self, bytes: &[u8]);
}

struct Shared<V> {
    viewer: V,
    callbacks: Box<dyn BackendCallbacks>,
    state: ConnectionState,
}

/// [`Backend`] implementation over a [`ViewerLibrary`]. No dedicated
/// thread: callers drive the event loop themselves via
/// [`Backend::wait_for_update`], which polls the socket with a bounded
/// timeout and then lets the library decode whatever arrived.
pub struct ClassicBackend<V: ViewerLibrary> {
    inner: Mutex<Shared<V>>,
    update_flag: Mutex<bool>,
    update_cond: Condvar,
}

impl<V: ViewerLibrary> ClassicBackend<V> {
    /// Connect and wrap the resulting viewer. `callbacks` receives every
    /// framebuffer/clipboard/cursor notification the library produces.
    pub fn connect(
        settings: &BackendSettings,
        callbacks: Box<dyn BackendCallbacks>,
    ) -> Result<Self, BackendError> {
        let viewer = V::connect(settings)?;
        Ok(Self {
            inner: Mutex::new(Shared {
                viewer,
                callbacks,
                state: ConnectionState::Connected,
            }),
            update_flag: Mutex::new(false),
            update_cond: Condvar::new(),
        })
    }

    fn mark_update(&self) {
        let mut flag = self.update_flag.lock().unwrap_or_else(|e| e.into_inner());
        *flag = true;
        self.update_cond.notify_all();
    }
}

impl<V: ViewerLibrary> Backend for ClassicBackend<V> {
    fn width(&self) -> u32 {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).viewer.width()
    }

    fn height(&self) -> u32 {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).viewer.height()
    }

    fn wait_for_update(&self, timeout_ms: u32) -> UpdateWait {
        {
            let shared = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            if shared.state == ConnectionState::Disconnected {
                return UpdateWait::Closed;
            }
        }

        // Bounded select on the viewer's socket, then hand off to the
        // library to decode. A real implementation's `select` would also
        // watch the library's own internal wakeup fd; here the viewer's
        // socket is the only thing to wait on.
        let fd = self.inner.lock().unwrap_or_else(|e| e.into_inner()).viewer.socket_fd();
        // SAFETY: `fd` is owned by the viewer for the lifetime of this
        // backend and outlives this poll call.
        let borrowed = unsafe { BorrowedFd::borrow_raw(fd) };
        let mut poll_fds = [PollFd::new(borrowed, PollFlags::POLLIN)];
        let timeout = PollTimeout::try_from(timeout_ms).unwrap_or(PollTimeout::MAX);
        let ready = nix::poll::poll(&mut poll_fds, timeout).unwrap_or(0);

        if ready <= 0 {
            return UpdateWait::TimedOut;
        }

        let mut shared = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let Shared {
            viewer,
            callbacks,
            state,
        } = &mut *shared;
        match viewer.handle_messages(callbacks.as_mut()) {
            Ok(true) => {
                drop(shared);
                self.mark_update();
                UpdateWait::Signaled
            }
            Ok(false) => {
                *state = ConnectionState::Disconnected;
                drop(shared);
                self.update_cond.notify_all();
                UpdateWait::Closed
            }
            Err(_) => {
                *state = ConnectionState::Disconnected;
                drop(shared);
                self.update_cond.notify_all();
                UpdateWait::Closed
            }
        }
    }

    fn send_key(&self, keysym: u32, pressed: bool) {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .viewer
            .send_key_event(keysym, pressed);
    }

    fn send_pointer(&self, x: u16, y: u16, mask: u8) {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .viewer
            .send_pointer_event(x, y, mask & crate::pointer_mask::POINTER_BITS);
    }

    fn send_clipboard(&self, bytes: &[u8]) {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .viewer
            .send_client_cut_text(bytes);
    }

    fn clipboard_encoding(&self) -> &'static str {
        "ISO-8859-1"
    }

    fn shutdown(&mut self) {
        let mut shared = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        shared.state = ConnectionState::Disconnected;
        let fd = shared.viewer.socket_fd();
        drop(shared);
        let _ = close(fd);
        self.update_cond.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callbacks::{CursorShape, FramebufferCopy, FramebufferUpdate};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    struct NoopCallbacks {
        updates: Arc<AtomicBool>,
    }

    impl BackendCallbacks for NoopCallbacks {
        fn clipboard_received(&mut self, _bytes: &[u8]) {}
        fn cursor_updated(&mut self, _cursor: CursorShape) {}
        fn framebuffer_resized(&mut self, _width: u32, _height: u32) {}
        fn framebuffer_copied(&mut self, _copy: FramebufferCopy) {}
        fn framebuffer_updated(&mut self, _update: FramebufferUpdate) {
            self.updates.store(true, Ordering::SeqCst);
        }
    }

    /// A `ViewerLibrary` double backed by a pipe: writing a byte makes the
    /// socket readable and `handle_messages` fire one framebuffer update.
    struct PipeViewer {
        read_fd: std::os::fd::OwnedFd,
        write_fd: std::os::fd::OwnedFd,
    }

    impl ViewerLibrary for PipeViewer {
        fn connect(_settings: &BackendSettings) -> Result<Self, BackendError> {
            let (read_fd, write_fd) = nix::unistd::pipe().map_err(|e| BackendError::Fatal(e.to_string()))?;
            Ok(Self { read_fd, write_fd })
        }

        fn socket_fd(&self) -> RawFd {
            std::os::fd::AsRawFd::as_raw_fd(&self.read_fd)
        }

        fn handle_messages(&mut self, callbacks: &mut dyn BackendCallbacks) -> Result<bool, BackendError> {
            let mut buf = [0u8; 1];
            match nix::unistd::read(&self.read_fd, &mut buf) {
                Ok(0) => Ok(false),
                Ok(_) => {
                    callbacks.framebuffer_updated(FramebufferUpdate {
                        x: 0,
                        y: 0,
                        width: 1,
                        height: 1,
                        stride: 4,
                        pixels: vec![0, 0, 0, 0],
                    });
                    Ok(true)
                }
                Err(_) => Ok(false),
            }
        }

        fn width(&self) -> u32 {
            1
        }

        fn height(&self) -> u32 {
            1
        }

        fn send_key_event(&mut self, _keysym: u32, _down: bool) {}
        fn send_pointer_event(&mut self, _x: u16, _y: u16, _mask: u8) {}
        fn send_client_cut_text(&mut self, _bytes: &[u8]) {}
    }

    #[test]
    fn wait_for_update_times_out_with_nothing_pending() {
        let updates = Arc::new(AtomicBool::new(false));
        let backend = ClassicBackend::<PipeViewer>::connect(
            &BackendSettings::default(),
            Box::new(NoopCallbacks {
                updates: updates.clone(),
            }),
        )
        .unwrap();

        assert_eq!(backend.wait_for_update(10), UpdateWait::TimedOut);
        assert!(!updates.load(Ordering::SeqCst));
    }

    #[test]
    fn wait_for_update_signals_on_socket_activity() {
        let updates = Arc::new(AtomicBool::new(false));
        let backend = ClassicBackend::<PipeViewer>::connect(
            &BackendSettings::default(),
            Box::new(NoopCallbacks {
                updates: updates.clone(),
            }),
        )
        .unwrap();

        let write_fd = {
            let shared = backend.inner.lock().unwrap();
            std::os::fd::AsRawFd::as_raw_fd(&shared.viewer.write_fd)
        };
        nix::unistd::write(unsafe { BorrowedFd::borrow_raw(write_fd) }, b"x").unwrap();

        assert_eq!(backend.wait_for_update(1000), UpdateWait::Signaled);
        assert!(updates.load(Ordering::SeqCst));
    }

    #[test]
    fn clipboard_encoding_is_iso_8859_1() {
        let updates = Arc::new(AtomicBool::new(false));
        let backend = ClassicBackend::<PipeViewer>::connect(
            &BackendSettings::default(),
            Box::new(NoopCallbacks { updates }),
        )
        .unwrap();
        assert_eq!(backend.clipboard_encoding(), "ISO-8859-1");
    }
}
