//! X11 backend
//!
//! The OSD is an override-redirect window whose background pixmap is replaced on every
//! render. Frames are uploaded with core `PutImage`, so no SHM or GL is required.

use std::os::unix::io::{AsRawFd, RawFd};

use bitflags::bitflags;
use tiny_skia::{IntSize, Pixmap};
use tracing::{debug, info, warn};
use x11rb::atom_manager;
use x11rb::connection::{Connection, RequestConnection};
use x11rb::protocol::Event;
use x11rb::protocol::composite;
use x11rb::protocol::shape::{self, ConnectionExt as _};
use x11rb::protocol::xproto::*;
use x11rb::rust_connection::RustConnection;
use x11rb::wrapper::ConnectionExt as _;

use super::{Transparency, WindowEvent, WindowNames, WindowSystem};
use crate::error::{Error, Result};
use crate::geometry::Rect;
use crate::renderer::MouseEvent;

atom_manager! {
    pub Atoms: AtomsCookie {
        _MOTIF_WM_HINTS,
        _NET_WM_STATE,
        _NET_WM_STATE_ABOVE,
        _NET_WM_STATE_SKIP_TASKBAR,
        _NET_WM_STATE_SKIP_PAGER,
        _NET_WM_WINDOW_TYPE,
        _NET_WM_WINDOW_TYPE_NOTIFICATION,
        ATOM,
    }
}

bitflags! {
    /// `flags` word of the `_MOTIF_WM_HINTS` property.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MotifHints: u32 {
        const FUNCTIONS = 1 << 0;
        const DECORATIONS = 1 << 1;
        const INPUT_MODE = 1 << 2;
        const STATUS = 1 << 3;
    }
}

/// Size of the fixed part of a PutImage request.
const PUT_IMAGE_HEADER: usize = 24;

struct OverlayWindow {
    id: Window,
    gc: Gcontext,
    depth: u8,
    colormap: Option<Colormap>,
}

pub struct X11WindowSystem {
    conn: RustConnection,
    screen_num: usize,
    atoms: Atoms,
    has_shape: bool,
    window: Option<OverlayWindow>,
    passthrough: bool,
}

impl X11WindowSystem {
    /// Connect to `display`, or `$DISPLAY` when `None`.
    pub fn connect(display: Option<&str>) -> Result<Self> {
        let (conn, screen_num) = x11rb::connect(display)?;
        let atoms = Atoms::new(&conn)?.reply()?;
        let has_shape = conn
            .extension_information(shape::X11_EXTENSION_NAME)?
            .is_some();

        let screen = &conn.setup().roots[screen_num];
        info!(
            "Connected to X server, screen {} ({}x{}), root window {}",
            screen_num, screen.width_in_pixels, screen.height_in_pixels, screen.root
        );
        if !has_shape {
            warn!("SHAPE extension missing, input passthrough unavailable");
        }

        Ok(Self {
            conn,
            screen_num,
            atoms,
            has_shape,
            window: None,
            passthrough: false,
        })
    }

    fn screen(&self) -> &Screen {
        &self.conn.setup().roots[self.screen_num]
    }

    fn window_id(&self) -> Option<Window> {
        self.window.as_ref().map(|window| window.id)
    }

    /// True when per-pixel alpha will actually be composited: the Composite
    /// extension is present and a compositing manager owns `_NET_WM_CM_S<screen>`.
    pub fn supports_composite(&self) -> Result<bool> {
        if self
            .conn
            .extension_information(composite::X11_EXTENSION_NAME)?
            .is_none()
        {
            return Ok(false);
        }
        let selection = format!("_NET_WM_CM_S{}", self.screen_num);
        let atom = self.conn.intern_atom(false, selection.as_bytes())?.reply()?.atom;
        let owner = self.conn.get_selection_owner(atom)?.reply()?.owner;
        Ok(owner != x11rb::NONE)
    }

    /// Find a 32-bit TrueColor visual for ARGB windows
    fn find_argb_visual(screen: &Screen) -> Option<Visualid> {
        screen
            .allowed_depths
            .iter()
            .filter(|depth| depth.depth == 32)
            .flat_map(|depth| depth.visuals.iter())
            .find(|visual| visual.class == VisualClass::TRUE_COLOR)
            .map(|visual| visual.visual_id)
    }

    fn bits_per_pixel(&self, depth: u8) -> Option<u8> {
        self.conn
            .setup()
            .pixmap_formats
            .iter()
            .find(|format| format.depth == depth)
            .map(|format| format.bits_per_pixel)
    }

    fn lsb_first(&self) -> bool {
        self.conn.setup().image_byte_order == ImageOrder::LSB_FIRST
    }

    /// Pick visual, depth and colormap for `mode`, falling back to FAKE when
    /// native alpha isn't available.
    fn choose_visual(&self, mode: Transparency) -> Result<(Transparency, u8, Visualid, Option<Colormap>)> {
        let screen = self.screen();
        let (root, root_depth, root_visual) = (screen.root, screen.root_depth, screen.root_visual);

        if mode == Transparency::Composite {
            match (self.supports_composite()?, Self::find_argb_visual(screen)) {
                (true, Some(visual)) => {
                    let colormap = self.conn.generate_id()?;
                    self.conn
                        .create_colormap(ColormapAlloc::NONE, colormap, root, visual)?;
                    return Ok((Transparency::Composite, 32, visual, Some(colormap)));
                }
                (false, _) => warn!("No compositing manager running, falling back to fake transparency"),
                (true, None) => warn!("No 32-bit ARGB visual, falling back to fake transparency"),
            }
            return Ok((Transparency::Fake, root_depth, root_visual, None));
        }
        Ok((mode, root_depth, root_visual, None))
    }

    /// Borderless, above everything, kept off taskbars and pagers
    fn set_window_hints(&self, window: Window) -> Result<()> {
        let motif = [MotifHints::DECORATIONS.bits(), 0, 0, 0, 0];
        self.conn.change_property32(
            PropMode::REPLACE,
            window,
            self.atoms._MOTIF_WM_HINTS,
            self.atoms._MOTIF_WM_HINTS,
            &motif,
        )?;

        self.conn.change_property32(
            PropMode::REPLACE,
            window,
            self.atoms._NET_WM_STATE,
            self.atoms.ATOM,
            &[
                self.atoms._NET_WM_STATE_ABOVE,
                self.atoms._NET_WM_STATE_SKIP_TASKBAR,
                self.atoms._NET_WM_STATE_SKIP_PAGER,
            ],
        )?;

        self.conn.change_property32(
            PropMode::REPLACE,
            window,
            self.atoms._NET_WM_WINDOW_TYPE,
            self.atoms.ATOM,
            &[self.atoms._NET_WM_WINDOW_TYPE_NOTIFICATION],
        )?;
        Ok(())
    }

    fn apply_input_shape(&self, window: Window) -> Result<()> {
        if !self.has_shape {
            return Ok(());
        }
        if self.passthrough {
            // Empty input region: clicks fall through to whatever is below
            self.conn.shape_rectangles(
                shape::SO::SET,
                shape::SK::INPUT,
                ClipOrdering::UNSORTED,
                window,
                0,
                0,
                &[],
            )?;
        } else {
            // Reset to the default (whole window)
            self.conn
                .shape_mask(shape::SO::SET, shape::SK::INPUT, window, 0, 0, x11rb::NONE)?;
        }
        Ok(())
    }

    fn map_event(&self, event: Event) -> Option<WindowEvent> {
        let window = self.window_id()?;
        match event {
            Event::Expose(e) if e.window == window => Some(WindowEvent::Expose),
            Event::ConfigureNotify(e) if e.window == window => Some(WindowEvent::Configure(
                Rect::new(e.x.into(), e.y.into(), e.width.into(), e.height.into()),
            )),
            Event::ButtonPress(e) if e.event == window => {
                Some(WindowEvent::ButtonPress(MouseEvent {
                    x: e.event_x.into(),
                    y: e.event_y.into(),
                    x_root: e.root_x.into(),
                    y_root: e.root_y.into(),
                    send_event: e.response_type & 0x80 != 0,
                    button: e.detail,
                    time: e.time,
                }))
            }
            Event::Error(err) => {
                warn!("X11 error: {:?}", err);
                None
            }
            _ => None,
        }
    }
}

impl WindowSystem for X11WindowSystem {
    fn event_fd(&self) -> RawFd {
        self.conn.stream().as_raw_fd()
    }

    fn screen_size(&self) -> (u32, u32) {
        let screen = self.screen();
        (screen.width_in_pixels.into(), screen.height_in_pixels.into())
    }

    fn create_window(
        &mut self,
        mode: Transparency,
        names: &WindowNames,
        passthrough: bool,
    ) -> Result<Transparency> {
        self.destroy_window()?;
        self.passthrough = passthrough;

        let (effective, depth, visual, colormap) = self.choose_visual(mode)?;
        if self.bits_per_pixel(depth) != Some(32) {
            return Err(Error::Protocol(format!(
                "depth {depth} does not use 32 bits per pixel"
            )));
        }

        let root = self.screen().root;
        let id = self.conn.generate_id()?;
        let mut aux = CreateWindowAux::new()
            .background_pixel(0)
            .border_pixel(0)
            .backing_store(BackingStore::WHEN_MAPPED)
            .save_under(1)
            .override_redirect(1)
            .event_mask(EventMask::EXPOSURE | EventMask::STRUCTURE_NOTIFY | EventMask::BUTTON_PRESS);
        if let Some(colormap) = colormap {
            aux = aux.colormap(colormap);
        }

        // Parked off-screen until the first configure
        self.conn.create_window(
            depth,
            id,
            root,
            -1,
            -1,
            1,
            1,
            0,
            WindowClass::INPUT_OUTPUT,
            visual,
            &aux,
        )?;

        let gc = self.conn.generate_id()?;
        self.conn.create_gc(gc, id, &CreateGCAux::new())?;

        self.window = Some(OverlayWindow {
            id,
            gc,
            depth,
            colormap,
        });

        self.set_window_hints(id)?;
        self.set_names(names)?;
        self.apply_input_shape(id)?;
        self.conn.flush()?;

        debug!("Created OSD window {} (depth {}, {:?})", id, depth, effective);
        Ok(effective)
    }

    fn destroy_window(&mut self) -> Result<()> {
        let Some(window) = self.window.take() else {
            return Ok(());
        };
        self.conn.free_gc(window.gc)?;
        self.conn.destroy_window(window.id)?;
        if let Some(colormap) = window.colormap {
            self.conn.free_colormap(colormap)?;
        }
        self.conn.flush()?;
        debug!("Destroyed OSD window {}", window.id);
        Ok(())
    }

    fn set_names(&mut self, names: &WindowNames) -> Result<()> {
        let Some(window) = self.window_id() else {
            return Ok(());
        };
        // WM_CLASS is two NUL-terminated strings: instance, then class
        let mut class = Vec::with_capacity(names.name.len() + names.class.len() + 2);
        class.extend_from_slice(names.name.as_bytes());
        class.push(0);
        class.extend_from_slice(names.class.as_bytes());
        class.push(0);
        self.conn.change_property8(
            PropMode::REPLACE,
            window,
            AtomEnum::WM_CLASS,
            AtomEnum::STRING,
            &class,
        )?;
        Ok(())
    }

    fn set_input_passthrough(&mut self, enabled: bool) -> Result<()> {
        self.passthrough = enabled;
        match self.window_id() {
            Some(window) => self.apply_input_shape(window),
            None => Ok(()),
        }
    }

    fn configure(&mut self, rect: Rect) -> Result<()> {
        let Some(window) = self.window_id() else {
            return Ok(());
        };
        self.conn.configure_window(
            window,
            &ConfigureWindowAux::new()
                .x(rect.x)
                .y(rect.y)
                .width(rect.width)
                .height(rect.height),
        )?;
        Ok(())
    }

    fn map_raised(&mut self) -> Result<()> {
        let Some(window) = self.window_id() else {
            return Ok(());
        };
        self.conn.configure_window(
            window,
            &ConfigureWindowAux::new().stack_mode(StackMode::ABOVE),
        )?;
        self.conn.map_window(window)?;
        Ok(())
    }

    fn unmap(&mut self) -> Result<()> {
        if let Some(window) = self.window_id() {
            self.conn.unmap_window(window)?;
        }
        Ok(())
    }

    fn capture(&mut self, rect: Rect) -> Result<Pixmap> {
        let mut snapshot = Pixmap::new(rect.width, rect.height)
            .ok_or_else(|| Error::Protocol(format!("cannot capture empty area {rect:?}")))?;
        snapshot.fill(tiny_skia::Color::BLACK);

        let (screen_width, screen_height) = self.screen_size();
        let screen = Rect::new(0, 0, screen_width, screen_height);
        // GetImage on the root fails for areas outside the screen
        let Some(visible) = rect.intersect(&screen) else {
            return Ok(snapshot);
        };

        let root = self.screen().root;
        let reply = self
            .conn
            .get_image(
                ImageFormat::Z_PIXMAP,
                root,
                wire_position(visible.x)?,
                wire_position(visible.y)?,
                wire_extent(visible.width)?,
                wire_extent(visible.height)?,
                !0,
            )?
            .reply()?;

        if self.bits_per_pixel(reply.depth) != Some(32) {
            return Err(Error::Protocol(format!(
                "cannot decode {}-bit root window image",
                reply.depth
            )));
        }

        let lsb_first = self.lsb_first();
        let mut area = Vec::with_capacity(reply.data.len());
        for px in reply.data.chunks_exact(4) {
            let (r, g, b) = if lsb_first {
                (px[2], px[1], px[0])
            } else {
                (px[1], px[2], px[3])
            };
            area.extend_from_slice(&[r, g, b, 255]);
        }

        let size = IntSize::from_wh(visible.width, visible.height)
            .ok_or_else(|| Error::Protocol("empty capture".into()))?;
        let area = Pixmap::from_vec(area, size)
            .ok_or_else(|| Error::Protocol("short GetImage reply".into()))?;
        snapshot.as_mut().draw_pixmap(
            visible.x - rect.x,
            visible.y - rect.y,
            area.as_ref(),
            &tiny_skia::PixmapPaint::default(),
            tiny_skia::Transform::identity(),
            None,
        );
        debug!("Captured {}x{} background at {},{}", rect.width, rect.height, rect.x, rect.y);
        Ok(snapshot)
    }

    fn present(&mut self, frame: &Pixmap) -> Result<()> {
        let Some(window) = self.window.as_ref() else {
            return Ok(());
        };
        let (id, gc, depth) = (window.id, window.gc, window.depth);
        let (width, height) = (wire_extent(frame.width())?, wire_extent(frame.height())?);

        let data = encode_frame(frame.data(), self.lsb_first());

        let pixmap = self.conn.generate_id()?;
        self.conn.create_pixmap(depth, pixmap, id, width, height)?;

        let stride = usize::from(width) * 4;
        let max_payload = self
            .conn
            .maximum_request_bytes()
            .saturating_sub(PUT_IMAGE_HEADER);
        let rows_per_request = (max_payload / stride).max(1);
        for (chunk_index, rows) in data.chunks(rows_per_request * stride).enumerate() {
            let y = i16::try_from(chunk_index * rows_per_request)
                .map_err(|_| Error::Protocol(format!("{width}x{height} frame is too tall")))?;
            let rows_in_chunk = wire_extent((rows.len() / stride) as u32)?;
            self.conn.put_image(
                ImageFormat::Z_PIXMAP,
                pixmap,
                gc,
                width,
                rows_in_chunk,
                0,
                y,
                0,
                depth,
                rows,
            )?;
        }

        self.conn.change_window_attributes(
            id,
            &ChangeWindowAttributesAux::new().background_pixmap(pixmap),
        )?;
        // The window keeps its own reference to the background
        self.conn.free_pixmap(pixmap)?;
        self.conn.clear_area(false, id, 0, 0, 0, 0)?;
        Ok(())
    }

    fn pending_events(&mut self) -> Result<Vec<WindowEvent>> {
        let mut events = Vec::new();
        while let Some(event) = self.conn.poll_for_event()? {
            if let Some(event) = self.map_event(event) {
                events.push(event);
            }
        }
        Ok(events)
    }

    fn flush(&mut self) -> Result<()> {
        self.conn.flush()?;
        Ok(())
    }
}

impl Drop for X11WindowSystem {
    fn drop(&mut self) {
        if let Err(err) = self.destroy_window() {
            warn!("Failed to destroy OSD window: {}", err);
        }
    }
}

/// Premultiplied RGBA to the server's 32-bit ARGB pixel layout.
fn encode_frame(rgba: &[u8], lsb_first: bool) -> Vec<u8> {
    let mut out = Vec::with_capacity(rgba.len());
    for px in rgba.chunks_exact(4) {
        let [r, g, b, a] = [px[0], px[1], px[2], px[3]];
        if lsb_first {
            out.extend_from_slice(&[b, g, r, a]);
        } else {
            out.extend_from_slice(&[a, r, g, b]);
        }
    }
    out
}

/// A window position as the X11 `INT16` it is sent as.
fn wire_position(px: i32) -> Result<i16> {
    i16::try_from(px).map_err(|_| Error::Protocol(format!("position {px} is outside the X11 range")))
}

/// A width or height as the X11 `CARD16` it is sent as. Images are addressed by
/// `INT16` offsets, so extents are held to the same positive range.
fn wire_extent(extent: u32) -> Result<u16> {
    i16::try_from(extent)
        .map(|extent| extent as u16)
        .map_err(|_| Error::Protocol(format!("extent {extent} is outside the X11 range")))
}
