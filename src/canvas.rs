//! Paint surface handed to renderers
//!
//! A [`Canvas`] is bound to the frame buffer of exactly one render pass and is always
//! the current window size. Drawing outside the bounds is clipped by tiny-skia.

use tiny_skia::{
    FillRule, Paint, Path, PathBuilder, PixmapMut, PixmapPaint, PixmapRef, Rect, Stroke, Transform,
};

pub use tiny_skia::Color;

pub struct Canvas<'a> {
    pixmap: PixmapMut<'a>,
}

impl<'a> Canvas<'a> {
    pub(crate) fn new(pixmap: PixmapMut<'a>) -> Self {
        Self { pixmap }
    }

    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    /// Direct access to the underlying tiny-skia surface for anything the
    /// helpers below don't cover (gradients, masks, transforms).
    pub fn pixmap(&mut self) -> &mut PixmapMut<'a> {
        &mut self.pixmap
    }

    /// Replace every pixel, including alpha.
    pub fn clear(&mut self, color: Color) {
        self.pixmap.fill(color);
    }

    pub fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, color: Color) {
        let Some(rect) = Rect::from_xywh(x, y, w, h) else {
            return;
        };
        self.pixmap
            .fill_rect(rect, &solid(color), Transform::identity(), None);
    }

    pub fn fill_rounded_rect(&mut self, x: f32, y: f32, w: f32, h: f32, radius: f32, color: Color) {
        if let Some(path) = rounded_rect_path(x, y, w, h, radius) {
            self.fill_path(&path, color);
        }
    }

    pub fn stroke_rounded_rect(
        &mut self,
        x: f32,
        y: f32,
        w: f32,
        h: f32,
        radius: f32,
        stroke: &Stroke,
        color: Color,
    ) {
        if let Some(path) = rounded_rect_path(x, y, w, h, radius) {
            self.stroke_path(&path, stroke, color);
        }
    }

    pub fn fill_path(&mut self, path: &Path, color: Color) {
        self.pixmap.fill_path(
            path,
            &solid(color),
            FillRule::Winding,
            Transform::identity(),
            None,
        );
    }

    pub fn stroke_path(&mut self, path: &Path, stroke: &Stroke, color: Color) {
        self.pixmap
            .stroke_path(path, &solid(color), stroke, Transform::identity(), None);
    }

    /// Blit an image with its top-left corner at (`x`, `y`), scaled by `opacity`.
    pub fn draw_pixmap(&mut self, x: i32, y: i32, image: PixmapRef<'_>, opacity: f32) {
        let paint = PixmapPaint {
            opacity: opacity.clamp(0.0, 1.0),
            ..PixmapPaint::default()
        };
        self.pixmap
            .draw_pixmap(x, y, image, &paint, Transform::identity(), None);
    }
}

fn solid(color: Color) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color(color);
    paint.anti_alias = true;
    paint
}

/// Closed rounded-rectangle path; the radius is clamped to half the shorter side.
pub fn rounded_rect_path(x: f32, y: f32, w: f32, h: f32, radius: f32) -> Option<Path> {
    let r = radius.max(0.0).min(w / 2.0).min(h / 2.0);

    let mut pb = PathBuilder::new();
    pb.move_to(x + r, y);
    pb.line_to(x + w - r, y);
    pb.quad_to(x + w, y, x + w, y + r);
    pb.line_to(x + w, y + h - r);
    pb.quad_to(x + w, y + h, x + w - r, y + h);
    pb.line_to(x + r, y + h);
    pb.quad_to(x, y + h, x, y + h - r);
    pb.line_to(x, y + r);
    pb.quad_to(x, y, x + r, y);
    pb.close();
    pb.finish()
}
