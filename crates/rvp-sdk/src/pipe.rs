//! The event pipe: a multi-producer, single-consumer byte pipe carrying
//! fixed-size [`EventRecord`]s from arbitrary caller threads to the SDK
//! thread (spec.md §4.6, §5).
//!
//! Every record is [`EVENT_RECORD_SIZE`] bytes, well inside `PIPE_BUF`, so
//! concurrent writers never interleave a partial record; POSIX guarantees
//! a `write()` of that size is atomic. [`EventSender`] is `Clone` and
//! `Send`+`Sync` so any number of caller threads can hold one.

use std::collections::HashMap;
use std::io;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd, RawFd};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use nix::fcntl::{fcntl, FcntlArg, OFlag};
use nix::errno::Errno;

use crate::event::{EventRecord, EVENT_RECORD_SIZE};

#[derive(Default)]
struct ClipboardPayloads {
    pending: HashMap<u64, Vec<u8>>,
}

/// Sending half of the event pipe. Cheaply `Clone`-able; every clone
/// writes to the same underlying pipe.
#[derive(Clone)]
pub struct EventSender {
    write_fd: Arc<OwnedFd>,
    payloads: Arc<Mutex<ClipboardPayloads>>,
    next_payload_index: Arc<AtomicU64>,
}

impl EventSender {
    /// Enqueue a fixed-layout record. Retries on short writes and
    /// `EINTR`, matching spec.md §5's "retried in a tight loop" backpressure
    /// note (records this small never actually see backpressure on Linux
    /// pipes, but the retry loop is cheap insurance).
    pub fn send(&self, record: EventRecord) {
        let bytes = record.encode();
        let mut written = 0usize;
        while written < EVENT_RECORD_SIZE {
            match nix::unistd::write(self.write_fd.as_ref(), &bytes[written..]) {
                Ok(0) => break,
                Ok(n) => written += n,
                Err(Errno::EINTR) => continue,
                Err(e) => {
                    tracing::warn!(error = %e, "event pipe write failed, dropping record");
                    break;
                }
            }
        }
    }

    pub fn send_key(&self, keysym: u32, pressed: bool) {
        self.send(EventRecord::Key { keysym, pressed });
    }

    pub fn send_pointer(&self, x: u16, y: u16, mask: u8) {
        self.send(EventRecord::Pointer { x, y, mask });
    }

    pub fn send_scroll(&self, delta: i8) {
        self.send(EventRecord::Scroll { delta });
    }

    /// Queue a clipboard payload and enqueue the fixed-size record that
    /// references it. The reading thread is responsible for consuming
    /// (and thereby freeing) the payload once it dispatches the record.
    pub fn send_clipboard(&self, text: &str) {
        let payload_index = self.next_payload_index.fetch_add(1, Ordering::Relaxed);
        self.payloads
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pending
            .insert(payload_index, text.as_bytes().to_vec());
        self.send(EventRecord::Clipboard { payload_index });
    }

    /// The sole shutdown mechanism: push a `Disconnect` record. The
    /// caller then joins the SDK thread.
    pub fn send_disconnect(&self) {
        self.send(EventRecord::Disconnect);
    }
}

/// Receiving half, owned exclusively by the SDK thread.
pub struct EventReceiver {
    read_fd: OwnedFd,
    payloads: Arc<Mutex<ClipboardPayloads>>,
}

impl EventReceiver {
    #[must_use]
    pub fn as_fd(&self) -> BorrowedFd<'_> {
        self.read_fd.as_fd()
    }

    #[must_use]
    pub fn raw_fd(&self) -> RawFd {
        self.read_fd.as_raw_fd()
    }

    /// Drain every complete record currently buffered, non-blocking.
    /// Stops at the first short read (nothing more to read right now) or
    /// `EWOULDBLOCK`.
    pub fn drain(&mut self) -> Vec<EventRecord> {
        let mut records = Vec::new();
        loop {
            let mut buf = [0u8; EVENT_RECORD_SIZE];
            match nix::unistd::read(&self.read_fd, &mut buf) {
                Ok(EVENT_RECORD_SIZE) => {
                    if let Some(record) = EventRecord::decode(buf) {
                        records.push(record);
                    }
                }
                Ok(0) => break,
                Ok(_) => {
                    tracing::warn!("event pipe produced a short read, dropping partial record");
                    break;
                }
                Err(Errno::EWOULDBLOCK | Errno::EINTR) => break,
                Err(e) => {
                    tracing::warn!(error = %e, "event pipe read failed");
                    break;
                }
            }
        }
        records
    }

    /// Take ownership of (and remove) a previously queued clipboard
    /// payload, decoding it as UTF-8.
    #[must_use]
    pub fn take_clipboard_payload(&self, payload_index: u64) -> Option<String> {
        let mut payloads = self.payloads.lock().unwrap_or_else(|e| e.into_inner());
        let bytes = payloads.pending.remove(&payload_index)?;
        String::from_utf8(bytes).ok()
    }
}

/// Construct a fresh event pipe. The read end is set non-blocking so
/// [`EventReceiver::drain`] never stalls the SDK thread's `poll` loop.
pub fn event_pipe() -> io::Result<(EventSender, EventReceiver)> {
    let (read_fd, write_fd) = nix::unistd::pipe()?;

    let flags = fcntl(&read_fd, FcntlArg::F_GETFL)?;
    let mut oflags = OFlag::from_bits_truncate(flags);
    oflags.insert(OFlag::O_NONBLOCK);
    fcntl(&read_fd, FcntlArg::F_SETFL(oflags))?;

    let payloads = Arc::new(Mutex::new(ClipboardPayloads::default()));

    Ok((
        EventSender {
            write_fd: Arc::new(write_fd),
            payloads: Arc::clone(&payloads),
            next_payload_index: Arc::new(AtomicU64::new(0)),
        },
        EventReceiver { read_fd, payloads },
    ))
}
