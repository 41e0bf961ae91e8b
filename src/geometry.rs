//! Window geometry
//!
//! Coordinates are stored unresolved. `Center` and `End` are resolved against the
//! screen size the session read when it was created. Resolved rectangles are
//! clamped to what the X protocol can carry (16-bit positions and sizes).

/// Largest window width or height the session will request.
pub const MAX_EXTENT: u32 = i16::MAX as u32;

/// Resolved positions stay within the X11 `INT16` range.
const MIN_POSITION: i64 = i16::MIN as i64;
const MAX_POSITION: i64 = i16::MAX as i64;

/// One axis of a window position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Coord {
    /// Absolute pixel coordinate from the left/top edge.
    Start(i32),
    /// Centered on the screen, shifted by the given offset.
    Center(i32),
    /// Aligned to the right/bottom edge, shifted by the given offset
    /// (negative moves the window inwards).
    End(i32),
}

impl Coord {
    /// Centered with no offset.
    pub const CENTER: Coord = Coord::Center(0);

    /// Resolve to an absolute pixel position for a window of `extent` on a screen of `screen`.
    ///
    /// The result saturates at the `i32` range rather than wrapping.
    pub fn resolve(self, extent: u32, screen: u32) -> i32 {
        let free = i64::from(screen) - i64::from(extent);
        let position = match self {
            Coord::Start(px) => i64::from(px),
            Coord::Center(offset) => free / 2 + i64::from(offset),
            Coord::End(offset) => free + i64::from(offset),
        };
        position.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
    }

    /// Shift the coordinate by `delta`, keeping its anchor.
    pub fn offset(self, delta: i32) -> Self {
        match self {
            Coord::Start(px) => Coord::Start(px.saturating_add(delta)),
            Coord::Center(offset) => Coord::Center(offset.saturating_add(delta)),
            Coord::End(offset) => Coord::End(offset.saturating_add(delta)),
        }
    }
}

impl Default for Coord {
    fn default() -> Self {
        Coord::Start(0)
    }
}

impl From<i32> for Coord {
    fn from(px: i32) -> Self {
        Coord::Start(px)
    }
}

/// Alignment of a window along one axis of the screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    Min,
    Center,
    Max,
}

impl Anchor {
    fn coord(self, offset: i32) -> Coord {
        match self {
            Anchor::Min => Coord::Start(offset),
            Anchor::Center => Coord::Center(offset),
            Anchor::Max => Coord::End(offset),
        }
    }

    fn from_cell(cell: u8) -> Self {
        match cell {
            0 => Anchor::Min,
            1 => Anchor::Center,
            _ => Anchor::Max,
        }
    }
}

/// Requested window geometry, as configured by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Geometry {
    pub x: Coord,
    pub y: Coord,
    pub width: u32,
    pub height: u32,
}

impl Geometry {
    pub fn new(x: impl Into<Coord>, y: impl Into<Coord>, width: u32, height: u32) -> Self {
        Self {
            x: x.into(),
            y: y.into(),
            width,
            height,
        }
    }

    /// Place a `width` x `height` window by anchoring each axis.
    pub fn anchored(horizontal: Anchor, vertical: Anchor, width: u32, height: u32) -> Self {
        Self {
            x: horizontal.coord(0),
            y: vertical.coord(0),
            width,
            height,
        }
    }

    /// Place a window in one of nine screen cells, numbered row by row:
    ///
    /// ```text
    /// 0 1 2
    /// 3 4 5
    /// 6 7 8
    /// ```
    ///
    /// Anything above 8 is treated as 4 (screen center).
    pub fn at_position(position: u8, width: u32, height: u32) -> Self {
        let position = if position > 8 { 4 } else { position };
        Self::anchored(
            Anchor::from_cell(position % 3),
            Anchor::from_cell(position / 3),
            width,
            height,
        )
    }

    /// Shift both axes, keeping their anchors.
    pub fn with_offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x.offset(dx),
            y: self.y.offset(dy),
            ..self
        }
    }

    pub fn has_area(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    /// Resolve against the screen dimensions into absolute pixels.
    ///
    /// Sizes are capped at [`MAX_EXTENT`] and positions clamped to the X11
    /// coordinate range, so extreme requests park the window off-screen instead
    /// of overflowing.
    pub fn resolve(&self, screen: (u32, u32)) -> Rect {
        let width = self.width.min(MAX_EXTENT);
        let height = self.height.min(MAX_EXTENT);
        let clamp = |px: i32| i64::from(px).clamp(MIN_POSITION, MAX_POSITION) as i32;
        Rect {
            x: clamp(self.x.resolve(width, screen.0)),
            y: clamp(self.y.resolve(height, screen.1)),
            width,
            height,
        }
    }
}

/// Absolute on-screen rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Overlap of two rectangles, or `None` when they don't intersect.
    pub fn intersect(&self, other: &Rect) -> Option<Rect> {
        let left = self.x.max(other.x);
        let top = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        if right <= i64::from(left) || bottom <= i64::from(top) {
            return None;
        }
        // Both extents fit: each is bounded by one of the input sizes
        let width = (right - i64::from(left)) as u32;
        let height = (bottom - i64::from(top)) as u32;
        Some(Rect::new(left, top, width, height))
    }

    fn right(&self) -> i64 {
        i64::from(self.x) + i64::from(self.width)
    }

    fn bottom(&self) -> i64 {
        i64::from(self.y) + i64::from(self.height)
    }
}
