//! Surface fleet management: one live surface per enabled widget.

pub mod batch;
pub mod controller;
pub mod headless;
pub mod snapping;

pub use batch::{BatchAction, BatchTiming};
pub use controller::{MountContext, SurfaceController};
pub use headless::{HeadlessBackend, HeadlessSurface, StaticDisplay};
pub use snapping::snap_rect;
