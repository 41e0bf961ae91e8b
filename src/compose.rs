//! Frame composition
//!
//! Builds the offscreen buffer for one render: seed according to the transparency
//! mode, then let the renderer paint on top.

use tiny_skia::{Color, Pixmap};

use crate::canvas::Canvas;
use crate::renderer::Renderer;
use crate::window_system::Transparency;

/// What to paint on top of the seeded frame.
pub(crate) enum Content<'a> {
    Direct(Option<&'a mut Renderer>),
    /// During a flash the renderer is painted once into `layer`, which is then
    /// blended into every frame at `alpha`.
    Faded {
        renderer: Option<&'a mut Renderer>,
        layer: &'a mut Option<Pixmap>,
        alpha: f32,
    },
}

/// Returns `None` for a zero-sized window.
pub(crate) fn compose_frame(
    mode: Transparency,
    width: u32,
    height: u32,
    background: Option<&Pixmap>,
    content: Content<'_>,
) -> Option<Pixmap> {
    let mut frame = seed(mode, width, height, background)?;

    match content {
        Content::Direct(renderer) => {
            if let Some(renderer) = renderer {
                renderer.paint(&mut Canvas::new(frame.as_mut()));
            }
        }
        Content::Faded {
            renderer,
            layer,
            alpha,
        } => {
            let stale = layer
                .as_ref()
                .is_none_or(|cached| cached.width() != width || cached.height() != height);
            if stale {
                let mut fresh = Pixmap::new(width, height)?;
                if let Some(renderer) = renderer {
                    renderer.paint(&mut Canvas::new(fresh.as_mut()));
                }
                *layer = Some(fresh);
            }
            if let Some(cached) = layer.as_ref() {
                Canvas::new(frame.as_mut()).draw_pixmap(0, 0, cached.as_ref(), alpha);
            }
        }
    }
    Some(frame)
}

fn seed(mode: Transparency, width: u32, height: u32, background: Option<&Pixmap>) -> Option<Pixmap> {
    match (mode, background) {
        (Transparency::Fake, Some(bg)) if bg.width() == width && bg.height() == height => {
            Some(bg.clone())
        }
        (Transparency::Composite, _) => Pixmap::new(width, height),
        _ => {
            let mut frame = Pixmap::new(width, height)?;
            frame.fill(Color::BLACK);
            Some(frame)
        }
    }
}
