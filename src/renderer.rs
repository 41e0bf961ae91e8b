//! Caller-supplied paint and mouse callbacks

use std::fmt;

use crate::canvas::Canvas;

type PaintFn = Box<dyn FnMut(&mut Canvas<'_>) + Send>;
type ReleaseFn = Box<dyn FnOnce() + Send>;

/// The active paint callback of a session.
///
/// Any state the callback needs is owned by the closure. The optional release hook
/// runs exactly once, when the renderer is dropped: that happens when it is replaced
/// through [`Session::set_renderer`](crate::Session::set_renderer) or when the session
/// is destroyed. A flash animation borrows the renderer and hands it back untouched,
/// so the hook does not run then.
pub struct Renderer {
    paint: PaintFn,
    release: Option<ReleaseFn>,
}

impl Renderer {
    pub fn new<F>(paint: F) -> Self
    where
        F: FnMut(&mut Canvas<'_>) + Send + 'static,
    {
        Self {
            paint: Box::new(paint),
            release: None,
        }
    }

    /// Attach a hook that runs once when this renderer is released.
    pub fn on_release<F>(mut self, release: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.release = Some(Box::new(release));
        self
    }

    pub(crate) fn paint(&mut self, canvas: &mut Canvas<'_>) {
        (self.paint)(canvas);
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl fmt::Debug for Renderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Renderer")
            .field("has_release", &self.release.is_some())
            .finish_non_exhaustive()
    }
}

/// A button press on the OSD window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MouseEvent {
    /// Position relative to the window.
    pub x: i32,
    pub y: i32,
    /// Position relative to the root window.
    pub x_root: i32,
    pub y_root: i32,
    /// True when the event was synthesized by another client (SendEvent).
    pub send_event: bool,
    pub button: u8,
    /// Server timestamp in milliseconds.
    pub time: u32,
}

/// Mouse callback. It runs on the event-loop thread with the session state locked,
/// so it must not call back into the session.
pub type MouseHandler = Box<dyn FnMut(&MouseEvent) + Send>;
