//! In-memory window system for tests
//!
//! Every mutation is recorded. Events are injected through a handle and announced on a
//! real socket pair, so the event loop's poll wakes exactly as it would for X11.

use std::collections::VecDeque;
use std::io::{ErrorKind, Read, Write};
use std::os::unix::io::{AsRawFd, RawFd};
use std::os::unix::net::UnixStream;
use std::sync::{Arc, Mutex, MutexGuard};

use tiny_skia::{Color, Pixmap};

use super::{Transparency, WindowEvent, WindowNames, WindowSystem};
use crate::error::{Error, Result};
use crate::geometry::Rect;

/// Colour returned by every background capture.
pub(crate) const CAPTURE_COLOR: [u8; 4] = [0, 0, 255, 255];

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    CreateWindow {
        window: u32,
        effective: Transparency,
        names: WindowNames,
        passthrough: bool,
    },
    DestroyWindow(u32),
    SetNames(WindowNames),
    InputPassthrough(bool),
    Configure(Rect),
    MapRaised,
    Unmap,
    Capture(Rect),
    /// Size of the frame and the premultiplied RGBA value of its centre pixel.
    Present { width: u32, height: u32, center: [u8; 4] },
}

#[derive(Default)]
struct Log {
    calls: Vec<Call>,
    events: VecDeque<WindowEvent>,
    fail_events: bool,
}

pub(crate) struct RecordingWindowSystem {
    log: Arc<Mutex<Log>>,
    reader: UnixStream,
    screen: (u32, u32),
    composite: bool,
    next_id: u32,
    window: Option<u32>,
}

#[derive(Clone)]
pub(crate) struct RecordingHandle {
    log: Arc<Mutex<Log>>,
    writer: Arc<UnixStream>,
}

/// A backend with the given screen size. Without `composite`, COMPOSITE requests
/// fall back to FAKE like they do on an X server without a compositing manager.
pub(crate) fn recording(screen: (u32, u32), composite: bool) -> (RecordingWindowSystem, RecordingHandle) {
    let (reader, writer) = UnixStream::pair().unwrap();
    reader.set_nonblocking(true).unwrap();
    let log = Arc::new(Mutex::new(Log::default()));
    let backend = RecordingWindowSystem {
        log: log.clone(),
        reader,
        screen,
        composite,
        next_id: 1,
        window: None,
    };
    let handle = RecordingHandle {
        log,
        writer: Arc::new(writer),
    };
    (backend, handle)
}

fn lock(log: &Mutex<Log>) -> MutexGuard<'_, Log> {
    log.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl RecordingHandle {
    pub fn inject(&self, event: WindowEvent) {
        lock(&self.log).events.push_back(event);
        self.ring();
    }

    /// Make the next event read fail, which kills the event loop.
    pub fn break_connection(&self) {
        lock(&self.log).fail_events = true;
        self.ring();
    }

    pub fn calls(&self) -> Vec<Call> {
        lock(&self.log).calls.clone()
    }

    pub fn count(&self, matches: impl Fn(&Call) -> bool) -> usize {
        lock(&self.log).calls.iter().filter(|call| matches(call)).count()
    }

    /// Centre-pixel alpha of every presented frame, in order.
    pub fn presented_alphas(&self) -> Vec<u8> {
        lock(&self.log)
            .calls
            .iter()
            .filter_map(|call| match call {
                Call::Present { center, .. } => Some(center[3]),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        lock(&self.log).calls.clear();
    }

    fn ring(&self) {
        (&*self.writer).write_all(&[1]).unwrap();
    }
}

impl RecordingWindowSystem {
    fn record(&self, call: Call) {
        lock(&self.log).calls.push(call);
    }
}

impl WindowSystem for RecordingWindowSystem {
    fn event_fd(&self) -> RawFd {
        self.reader.as_raw_fd()
    }

    fn screen_size(&self) -> (u32, u32) {
        self.screen
    }

    fn create_window(
        &mut self,
        mode: Transparency,
        names: &WindowNames,
        passthrough: bool,
    ) -> Result<Transparency> {
        self.destroy_window()?;
        let effective = match mode {
            Transparency::Composite if !self.composite => Transparency::Fake,
            other => other,
        };
        let window = self.next_id;
        self.next_id += 1;
        self.window = Some(window);
        self.record(Call::CreateWindow {
            window,
            effective,
            names: names.clone(),
            passthrough,
        });
        Ok(effective)
    }

    fn destroy_window(&mut self) -> Result<()> {
        if let Some(window) = self.window.take() {
            self.record(Call::DestroyWindow(window));
        }
        Ok(())
    }

    fn set_names(&mut self, names: &WindowNames) -> Result<()> {
        self.record(Call::SetNames(names.clone()));
        Ok(())
    }

    fn set_input_passthrough(&mut self, enabled: bool) -> Result<()> {
        self.record(Call::InputPassthrough(enabled));
        Ok(())
    }

    fn configure(&mut self, rect: Rect) -> Result<()> {
        self.record(Call::Configure(rect));
        Ok(())
    }

    fn map_raised(&mut self) -> Result<()> {
        self.record(Call::MapRaised);
        Ok(())
    }

    fn unmap(&mut self) -> Result<()> {
        self.record(Call::Unmap);
        Ok(())
    }

    fn capture(&mut self, rect: Rect) -> Result<Pixmap> {
        self.record(Call::Capture(rect));
        let mut pixmap = Pixmap::new(rect.width, rect.height)
            .ok_or_else(|| Error::Protocol("empty capture".into()))?;
        let [r, g, b, a] = CAPTURE_COLOR;
        pixmap.fill(Color::from_rgba8(r, g, b, a));
        Ok(pixmap)
    }

    fn present(&mut self, frame: &Pixmap) -> Result<()> {
        let pixel = frame
            .pixel(frame.width() / 2, frame.height() / 2)
            .ok_or_else(|| Error::Protocol("empty frame".into()))?;
        self.record(Call::Present {
            width: frame.width(),
            height: frame.height(),
            center: [pixel.red(), pixel.green(), pixel.blue(), pixel.alpha()],
        });
        Ok(())
    }

    fn pending_events(&mut self) -> Result<Vec<WindowEvent>> {
        let mut buf = [0u8; 64];
        loop {
            match self.reader.read(&mut buf) {
                Ok(0) => break,
                Ok(_) => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => break,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(Error::Protocol(err.to_string())),
            }
        }
        let mut log = lock(&self.log);
        if log.fail_events {
            return Err(Error::Protocol("connection reset by test".into()));
        }
        Ok(log.events.drain(..).collect())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}
