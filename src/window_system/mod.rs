//! Windowing-system boundary
//!
//! The session core only talks to the display through [`WindowSystem`]. The X11
//! implementation lives in [`x11`]; tests use an in-memory double.

use std::os::unix::io::RawFd;

use tiny_skia::Pixmap;

use crate::error::Result;
use crate::geometry::Rect;
use crate::renderer::MouseEvent;

pub mod x11;

#[cfg(test)]
pub(crate) mod recording;

pub use x11::X11WindowSystem;

/// How the OSD achieves transparency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Transparency {
    /// Opaque window.
    #[default]
    None,
    /// The screen area under the window is captured and painted as the backdrop.
    Fake,
    /// Per-pixel alpha through an ARGB visual and a running compositing manager.
    Composite,
}

/// WM_CLASS identification of the OSD window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowNames {
    pub name: String,
    pub class: String,
}

impl WindowNames {
    pub fn new(name: impl Into<String>, class: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            class: class.into(),
        }
    }
}

impl Default for WindowNames {
    fn default() -> Self {
        Self::new("aosd", "Aosd")
    }
}

/// Notifications the event loop cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowEvent {
    Expose,
    /// The window now occupies this rectangle.
    Configure(Rect),
    ButtonPress(MouseEvent),
}

/// Everything the session needs from a display server.
///
/// Only one thread at a time owns an implementation; after construction that is
/// the event-loop thread.
pub trait WindowSystem: Send {
    /// File descriptor that becomes readable when events arrive.
    fn event_fd(&self) -> RawFd;

    fn screen_size(&self) -> (u32, u32);

    /// Destroy the current window (if any) and create a fresh unmapped one carrying
    /// `names` and, when `passthrough` is set, an empty input shape. Returns the
    /// transparency mode actually in effect, which may be a fallback.
    fn create_window(
        &mut self,
        mode: Transparency,
        names: &WindowNames,
        passthrough: bool,
    ) -> Result<Transparency>;

    fn destroy_window(&mut self) -> Result<()>;

    fn set_names(&mut self, names: &WindowNames) -> Result<()>;

    /// Let pointer input fall through the window.
    fn set_input_passthrough(&mut self, enabled: bool) -> Result<()>;

    fn configure(&mut self, rect: Rect) -> Result<()>;

    fn map_raised(&mut self) -> Result<()>;

    fn unmap(&mut self) -> Result<()>;

    /// Grab what is currently on screen in `rect`. Parts outside the screen are black.
    fn capture(&mut self, rect: Rect) -> Result<Pixmap>;

    /// Make `frame` the window contents.
    fn present(&mut self, frame: &Pixmap) -> Result<()>;

    /// Everything received so far, without blocking.
    fn pending_events(&mut self) -> Result<Vec<WindowEvent>>;

    fn flush(&mut self) -> Result<()>;
}
