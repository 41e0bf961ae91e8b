//! On-screen display windows for X11
//!
//! A [`Session`] owns one borderless, always-on-top, override-redirect window and a
//! background thread that keeps it in sync with the caller's configuration. Callers
//! supply a [`Renderer`] that paints onto a [`Canvas`]; the session takes care of
//! placement, transparency (opaque, captured backdrop, or true ARGB through a
//! compositor), mouse input and timed fade-in/hold/fade-out flashes.
//!
//! ```no_run
//! use aosd::{Color, Geometry, Renderer, Session, Transparency};
//!
//! let session = Session::new()?;
//! session.set_transparency(Transparency::Composite)?;
//! session.set_geometry(Geometry::at_position(4, 300, 80));
//! session.set_renderer(Some(Renderer::new(|canvas| {
//!     canvas.fill_rounded_rect(0.0, 0.0, 300.0, 80.0, 12.0, Color::from_rgba8(0, 0, 0, 160));
//! })));
//! session.flash(300, 2000, 300)?;
//! # Ok::<(), aosd::Error>(())
//! ```

mod channel;
mod compose;
mod event_loop;
mod tasks;

pub mod canvas;
pub mod error;
pub mod flash;
pub mod geometry;
pub mod renderer;
pub mod session;
pub mod window_system;

pub use canvas::{Canvas, Color};
pub use error::{Error, Result};
pub use flash::FlashTimings;
pub use geometry::{Anchor, Coord, Geometry, Rect};
pub use renderer::{MouseEvent, MouseHandler, Renderer};
pub use session::Session;
pub use window_system::{Transparency, WindowEvent, WindowNames, WindowSystem, X11WindowSystem};
