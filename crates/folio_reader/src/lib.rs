//! Folio Reader
//!
//! Page-flip core for a manga reader: per-page bend animation, drag gestures
//! that turn pages under the finger, and whole-book cascades.
//!
//! Rendering is external. Each page is backed by a [`PageSurface`] that
//! receives a bend force and a rotation/depth transform whenever the page's
//! flip progress changes. Animations run on a [`folio_animation::FrameScheduler`]
//! that the host ticks once per display frame.
//!
//! # Example
//!
//! ```ignore
//! use folio_animation::FrameScheduler;
//! use folio_reader::prelude::*;
//!
//! let scheduler = FrameScheduler::new();
//! let config = ReaderConfig::load(Path::new("folio.toml"))?;
//! let book = Book::new(scheduler.handle(), config, surfaces)?;
//!
//! book.on_page_turn(|turn| save_position(turn.index_after()));
//!
//! // In the host's event loop
//! book.pointer_down(event.x);
//! book.pointer_move(event.x);
//! book.pointer_up(event.x);
//!
//! // Once per display frame
//! scheduler.tick();
//! ```

mod book;
mod config;
mod error;
mod gesture;
mod page;
mod surface;

pub use book::{Book, CascadeDirection, CascadeHandle, CascadeOutcome, PageTurnListener};
pub use config::{CascadeConfig, GestureConfig, ReaderConfig, ReadingDirection};
pub use error::{ReaderError, Result};
pub use gesture::{
    DragDirection, GestureRelease, GestureSession, GestureTracker, InputSource, PageTurn,
    TouchPoint,
};
pub use page::{FlipHandle, FlipOutcome, PageFlip, PageParams};
pub use surface::{bend_force, HeadlessSurface, MeshHandle, PageSurface, SpatialState, SurfaceLog};

/// Prelude module - import everything commonly needed
pub mod prelude {
    pub use crate::book::{Book, CascadeHandle, CascadeOutcome};
    pub use crate::config::{ReaderConfig, ReadingDirection};
    pub use crate::error::{ReaderError, Result};
    pub use crate::gesture::{PageTurn, TouchPoint};
    pub use crate::page::{FlipHandle, FlipOutcome, PageFlip};
    pub use crate::surface::{HeadlessSurface, MeshHandle, PageSurface, SpatialState};
}
