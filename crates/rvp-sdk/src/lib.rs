//! Thread-confined vendor SDK event loop (spec.md §4.5-4.6, C6).
//!
//! The vendor SDK this crate abstracts asserts at runtime that every call
//! into it happens on the same thread that created the connection, and
//! aborts the process otherwise. [`SdkBackend`] is the only thing allowed
//! to hold an [`SdkHooks`] implementation, and it confines every call to
//! the dedicated thread it spawns in [`SdkBackend::connect`]; everything
//! else talks to it over the [`pipe::event_pipe`] or the shared condition
//! variables.

mod addon;
mod event;
mod hooks;
mod pipe;
mod thread_loop;

pub use addon::{load_addons, DEFAULT_ADDON_DIR};
pub use event::{EventRecord, EVENT_RECORD_SIZE};
pub use hooks::{FdInterest, SdkEvent, SdkHooks};
pub use pipe::{event_pipe, EventReceiver, EventSender};
pub use thread_loop::SdkBackend;
