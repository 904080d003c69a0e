//! The dedicated SDK thread and the [`Backend`] implementation fronting it
//! (spec.md §4.6, the centerpiece of this crate).
//!
//! Every [`SdkHooks`] call happens exclusively on the thread spawned by
//! [`SdkBackend::connect`]. All other threads interact with the SDK only
//! by pushing [`crate::event::EventRecord`]s onto the event pipe or by
//! waiting on the shared condition variables; this is the only way to
//! respect the vendor SDK's single-thread assertion without blocking
//! arbitrary callers on it.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use std::os::fd::BorrowedFd;

use rvp_backend::{
    pointer_mask, Backend, BackendCallbacks, BackendError, BackendSettings, ConnectionState,
    CursorShape, FramebufferCopy, FramebufferUpdate, UpdateWait,
};

use crate::event::EventRecord;
use crate::hooks::{SdkEvent, SdkHooks};
use crate::pipe::{event_pipe, EventReceiver, EventSender};

struct StateCell {
    lock: Mutex<ConnectionState>,
    cond: Condvar,
}

struct UpdateCell {
    lock: Mutex<bool>,
    cond: Condvar,
}

/// [`Backend`] implementation that fronts a dedicated SDK thread.
pub struct SdkBackend {
    sender: EventSender,
    thread: Option<JoinHandle<()>>,
    state: Arc<StateCell>,
    update: Arc<UpdateCell>,
    width: Arc<AtomicU32>,
    height: Arc<AtomicU32>,
    button_mask: Mutex<u8>,
}

impl SdkBackend {
    /// Spawn the SDK thread, run the startup sequence, and block the
    /// calling thread on `state_cond` until the connection settles one
    /// way or the other (spec.md §4.6 "Connection handshake").
    pub fn connect<H>(
        hooks: H,
        settings: BackendSettings,
        callbacks: Box<dyn BackendCallbacks>,
    ) -> Result<Self, BackendError>
    where
        H: SdkHooks + 'static,
    {
        let (sender, receiver) = event_pipe().map_err(|e| BackendError::Fatal(e.to_string()))?;

        let state = Arc::new(StateCell {
            lock: Mutex::new(ConnectionState::Connecting),
            cond: Condvar::new(),
        });
        let update = Arc::new(UpdateCell {
            lock: Mutex::new(false),
            cond: Condvar::new(),
        });
        let width = Arc::new(AtomicU32::new(0));
        let height = Arc::new(AtomicU32::new(0));

        let thread_state = Arc::clone(&state);
        let thread_update = Arc::clone(&update);
        let thread_width = Arc::clone(&width);
        let thread_height = Arc::clone(&height);
        let host = settings.hostname.clone();
        let port = settings.port;

        let join = std::thread::Builder::new()
            .name("rvp-sdk".to_string())
            .spawn(move || {
                run_event_loop(
                    hooks,
                    settings,
                    receiver,
                    callbacks,
                    &thread_state,
                    &thread_update,
                    &thread_width,
                    &thread_height,
                );
            })
            .map_err(|e| BackendError::Fatal(e.to_string()))?;

        let final_state = {
            let mut guard = state.lock.lock().unwrap_or_else(|e| e.into_inner());
            while *guard == ConnectionState::Connecting {
                guard = state.cond.wait(guard).unwrap_or_else(|e| e.into_inner());
            }
            *guard
        };

        if final_state == ConnectionState::Disconnected {
            let _ = join.join();
            return Err(BackendError::NotFound {
                host,
                port,
                attempts: 1,
            });
        }

        Ok(Self {
            sender,
            thread: Some(join),
            state,
            update,
            width,
            height,
            button_mask: Mutex::new(0),
        })
    }
}

impl Backend for SdkBackend {
    fn width(&self) -> u32 {
        self.width.load(Ordering::Acquire)
    }

    fn height(&self) -> u32 {
        self.height.load(Ordering::Acquire)
    }

    fn wait_for_update(&self, timeout_ms: u32) -> UpdateWait {
        if *self.state.lock.lock().unwrap_or_else(|e| e.into_inner()) == ConnectionState::Disconnected {
            return UpdateWait::Closed;
        }

        let deadline = Duration::from_millis(u64::from(timeout_ms));
        let mut guard = self.update.lock.lock().unwrap_or_else(|e| e.into_inner());
        if !*guard {
            let (g, timeout_result) = self
                .update
                .cond
                .wait_timeout(guard, deadline)
                .unwrap_or_else(|e| e.into_inner());
            guard = g;
            if timeout_result.timed_out() && !*guard {
                return UpdateWait::TimedOut;
            }
        }
        *guard = false;
        drop(guard);

        if *self.state.lock.lock().unwrap_or_else(|e| e.into_inner()) == ConnectionState::Disconnected {
            UpdateWait::Closed
        } else {
            UpdateWait::Signaled
        }
    }

    fn send_key(&self, keysym: u32, pressed: bool) {
        self.sender.send_key(keysym, pressed);
    }

    fn send_pointer(&self, x: u16, y: u16, mask: u8) {
        let mut guard = self.button_mask.lock().unwrap_or_else(|e| e.into_inner());
        let changed = mask ^ *guard;
        let newly_set = changed & mask;
        *guard = mask;
        drop(guard);

        if newly_set & pointer_mask::SCROLL_UP != 0 {
            self.sender.send_scroll(-1);
        }
        if newly_set & pointer_mask::SCROLL_DOWN != 0 {
            self.sender.send_scroll(1);
        }
        self.sender.send_pointer(x, y, mask & pointer_mask::POINTER_BITS);
    }

    fn send_clipboard(&self, bytes: &[u8]) {
        // This backend's wire encoding is UTF-8, so `bytes` is already
        // valid UTF-8 once the session driver has encoded it that way.
        let text = String::from_utf8_lossy(bytes);
        self.sender.send_clipboard(&text);
    }

    fn clipboard_encoding(&self) -> &'static str {
        "UTF-8"
    }

    fn shutdown(&mut self) {
        self.sender.send_disconnect();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for SdkBackend {
    fn drop(&mut self) {
        if self.thread.is_some() {
            self.shutdown();
        }
    }
}

/// Body of the dedicated SDK thread: startup sequence, then the
/// `select`/`handle_events`/dispatch loop (spec.md §4.6), running until a
/// `Disconnect` record is processed and the SDK confirms the teardown.
#[allow(clippy::too_many_arguments)]
fn run_event_loop<H: SdkHooks>(
    mut hooks: H,
    settings: BackendSettings,
    mut receiver: EventReceiver,
    mut callbacks: Box<dyn BackendCallbacks>,
    state: &StateCell,
    update: &UpdateCell,
    width: &AtomicU32,
    height: &AtomicU32,
) {
    if let Err(e) = hooks.connect(&settings) {
        tracing::error!(error = %e, "SDK connect failed");
        set_state(state, ConnectionState::Disconnected);
        return;
    }

    let (mut next_timeout, initial_events) = hooks.handle_events();
    apply_events(
        initial_events,
        &mut hooks,
        state,
        update,
        width,
        height,
        callbacks.as_mut(),
    );

    loop {
        if *state.lock.lock().unwrap_or_else(|e| e.into_inner()) == ConnectionState::Disconnected {
            break;
        }

        let fd_interests = hooks.requested_fds();
        // Built from the raw fd rather than `receiver.as_fd()` so the
        // `BorrowedFd` doesn't keep `receiver` borrowed across the
        // `receiver.drain()` call below.
        let pipe_raw_fd = receiver.raw_fd();
        // SAFETY: `pipe_raw_fd` is owned by `receiver`, which outlives this
        // poll call; each interest fd is likewise owned by `hooks` for the
        // duration of this loop iteration.
        let pipe_fd = unsafe { BorrowedFd::borrow_raw(pipe_raw_fd) };
        let mut poll_fds: Vec<PollFd> = Vec::with_capacity(fd_interests.len() + 1);
        poll_fds.push(PollFd::new(pipe_fd, PollFlags::POLLIN));
        for interest in &fd_interests {
            let mut flags = PollFlags::empty();
            if interest.read {
                flags |= PollFlags::POLLIN;
            }
            if interest.write {
                flags |= PollFlags::POLLOUT;
            }
            let borrowed = unsafe { BorrowedFd::borrow_raw(interest.fd) };
            poll_fds.push(PollFd::new(borrowed, flags));
        }

        let timeout = duration_to_poll_timeout(next_timeout);
        let _ = poll(&mut poll_fds, timeout);

        if let Some(revents) = poll_fds[0].revents() {
            if revents.contains(PollFlags::POLLIN) {
                for record in receiver.drain() {
                    dispatch_record(record, &mut hooks, &receiver);
                }
            }
        }

        for (slot, interest) in poll_fds[1..].iter().zip(fd_interests.iter()) {
            if let Some(revents) = slot.revents() {
                hooks.mark_events(
                    interest.fd,
                    revents.contains(PollFlags::POLLIN),
                    revents.contains(PollFlags::POLLOUT),
                    revents.intersects(PollFlags::POLLERR | PollFlags::POLLHUP),
                );
            }
        }

        let (timeout_next, events) = hooks.handle_events();
        next_timeout = timeout_next;
        apply_events(
            events,
            &mut hooks,
            state,
            update,
            width,
            height,
            callbacks.as_mut(),
        );
    }
}

fn dispatch_record<H: SdkHooks>(record: EventRecord, hooks: &mut H, receiver: &EventReceiver) {
    match record {
        EventRecord::Key { keysym, pressed } => {
            if pressed {
                hooks.send_key_down(keysym);
            } else {
                hooks.send_key_up(keysym);
            }
        }
        EventRecord::Pointer { x, y, mask } => {
            hooks.send_pointer_event(x, y, mask & pointer_mask::POINTER_BITS);
        }
        EventRecord::Scroll { delta } => {
            hooks.send_scroll(delta);
        }
        EventRecord::Clipboard { payload_index } => {
            match receiver.take_clipboard_payload(payload_index) {
                Some(text) => hooks.send_clipboard_text(&text),
                None => tracing::warn!(payload_index, "clipboard payload missing from side queue"),
            }
        }
        EventRecord::Disconnect => {
            hooks.client_stop();
        }
    }
}

fn apply_events<H: SdkHooks>(
    events: Vec<SdkEvent>,
    _hooks: &mut H,
    state: &StateCell,
    update: &UpdateCell,
    width: &AtomicU32,
    height: &AtomicU32,
    callbacks: &mut dyn BackendCallbacks,
) {
    for event in events {
        match event {
            SdkEvent::Connected => {
                transition_to_connected(state);
            }
            SdkEvent::Disconnected => {
                set_state(state, ConnectionState::Disconnected);
                signal_update(update);
            }
            SdkEvent::FramebufferUpdated {
                x,
                y,
                width: w,
                height: h,
                stride,
                pixels,
            } => {
                // The first framebuffer update forces CONNECTING ->
                // CONNECTED even if the SDK hasn't fired its connected
                // callback yet (spec.md §4.6).
                transition_to_connected(state);
                callbacks.framebuffer_updated(FramebufferUpdate {
                    x,
                    y,
                    width: w,
                    height: h,
                    stride,
                    pixels,
                });
                signal_update(update);
            }
            SdkEvent::FramebufferResized { width: w, height: h } => {
                width.store(w, Ordering::Release);
                height.store(h, Ordering::Release);
                callbacks.framebuffer_resized(w, h);
                signal_update(update);
            }
            SdkEvent::FramebufferCopied {
                src_x,
                src_y,
                width: w,
                height: h,
                dst_x,
                dst_y,
            } => {
                callbacks.framebuffer_copied(FramebufferCopy {
                    src_x,
                    src_y,
                    width: w,
                    height: h,
                    dst_x,
                    dst_y,
                });
            }
            SdkEvent::CursorUpdated {
                hot_x,
                hot_y,
                width: w,
                height: h,
                stride,
                pixels,
            } => {
                callbacks.cursor_updated(CursorShape {
                    hot_x,
                    hot_y,
                    width: w,
                    height: h,
                    stride,
                    pixels,
                });
            }
            SdkEvent::ClipboardReceived { text } => {
                callbacks.clipboard_received(text.as_bytes());
            }
        }
    }
}

fn transition_to_connected(state: &StateCell) {
    let mut guard = state.lock.lock().unwrap_or_else(|e| e.into_inner());
    if *guard == ConnectionState::Connecting {
        *guard = ConnectionState::Connected;
        state.cond.notify_all();
    }
}

fn set_state(state: &StateCell, new_state: ConnectionState) {
    let mut guard = state.lock.lock().unwrap_or_else(|e| e.into_inner());
    *guard = new_state;
    state.cond.notify_all();
}

fn signal_update(update: &UpdateCell) {
    let mut guard = update.lock.lock().unwrap_or_else(|e| e.into_inner());
    *guard = true;
    update.cond.notify_all();
}

fn duration_to_poll_timeout(d: Duration) -> PollTimeout {
    let millis = d.as_millis().min(u128::from(u32::MAX)) as u32;
    PollTimeout::try_from(millis).unwrap_or(PollTimeout::MAX)
}
