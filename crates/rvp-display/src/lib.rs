//! Display Adapter: translates backend callbacks into surface
//! draw/copy/resize operations and an outbound display channel
//! (spec.md §4.7, C7).

mod adapter;
mod canvas;
mod channel;
mod surface;

pub use adapter::DisplayAdapter;
pub use canvas::{bounding_box, CanvasSurface, MonitorInfo};
pub use channel::{ChannelOp, DisplayChannel, MpscDisplayChannel};
pub use surface::{Layer, Surface};
