//! The public OSD session handle

use std::sync::Arc;

use mio::unix::SourceFd;
use mio::{Interest, Poll, Waker};
use tracing::{debug, error, info};

use crate::channel::{CommandChannel, FlashRun, State};
use crate::error::{Error, Result};
use crate::event_loop::{CONNECTION, EventLoop, WAKER, WorkerHandle};
use crate::flash::FlashTimings;
use crate::geometry::Geometry;
use crate::renderer::{MouseEvent, Renderer};
use crate::tasks::UpdateTask;
use crate::window_system::{Transparency, WindowNames, WindowSystem, X11WindowSystem};

/// One on-screen display window and the thread that drives it.
///
/// Every method takes `&self` and may be called from any thread. Calls are
/// serialized against each other and against the event loop; `show`, `hide`,
/// `render_now`, `set_transparency` and `flash` return once the event loop has
/// applied them.
///
/// Dropping the session (or calling [`destroy`](Self::destroy)) stops the event
/// loop, destroys the window and closes the connection.
pub struct Session {
    channel: Arc<CommandChannel>,
    worker: Option<WorkerHandle>,
}

impl Session {
    /// Open a session on the default X display.
    pub fn new() -> Result<Self> {
        Self::with_window_system(X11WindowSystem::connect(None)?)
    }

    /// Open a session on an already connected window system.
    pub fn with_window_system<W>(mut backend: W) -> Result<Self>
    where
        W: WindowSystem + 'static,
    {
        let poll = Poll::new().map_err(Error::ResourceExhausted)?;
        let fd = backend.event_fd();
        poll.registry()
            .register(&mut SourceFd(&fd), CONNECTION, Interest::READABLE)
            .map_err(Error::ResourceExhausted)?;
        let waker = Waker::new(poll.registry(), WAKER).map_err(Error::ResourceExhausted)?;

        // The loop doesn't exist yet, so this thread may still touch the window
        let names = WindowNames::default();
        let mode = backend.create_window(Transparency::None, &names, false)?;
        let state = State::new(mode, names, backend.screen_size());

        let channel = Arc::new(CommandChannel::new(state, waker));
        let worker = EventLoop::new(channel.clone(), Box::new(backend), poll).spawn()?;
        info!("OSD session started");

        Ok(Self {
            channel,
            worker: Some(worker),
        })
    }

    /// Stop the event loop and release everything. Same as dropping the session.
    pub fn destroy(mut self) {
        self.shutdown();
    }

    pub fn geometry(&self) -> Geometry {
        self.channel.lock().geometry
    }

    /// Centered and edge-aligned coordinates are resolved when the event loop
    /// applies the geometry.
    pub fn set_geometry(&self, geometry: Geometry) {
        let mut epoch = self.channel.acquire();
        let previous = epoch.geometry;
        if previous == geometry {
            return;
        }
        epoch.geometry = geometry;
        if (previous.width, previous.height) != (geometry.width, geometry.height) {
            epoch.tasks.insert(UpdateTask::Resize);
        }
        if (previous.x, previous.y) != (geometry.x, geometry.y) {
            epoch.tasks.insert(UpdateTask::Reposition);
        }
        if epoch.shown {
            epoch.tasks.insert(UpdateTask::Render);
        }
    }

    /// Place a `width` x `height` window in one of the nine screen cells
    /// (see [`Geometry::at_position`]), shifted by the given offsets.
    pub fn set_position(&self, position: u8, width: u32, height: u32, x_offset: i32, y_offset: i32) {
        self.set_geometry(Geometry::at_position(position, width, height).with_offset(x_offset, y_offset));
    }

    pub fn screen_size(&self) -> (u32, u32) {
        self.channel.lock().screen
    }

    /// Mode in effect, which is FAKE when COMPOSITE was requested but unavailable.
    pub fn transparency(&self) -> Transparency {
        self.channel.lock().mode
    }

    /// Recreate the window for `mode`. A shown window is shown again afterwards.
    pub fn set_transparency(&self, mode: Transparency) -> Result<()> {
        let mut epoch = self.channel.acquire();
        epoch.ensure_running()?;
        if epoch.requested_mode == mode {
            return Ok(());
        }
        epoch.requested_mode = mode;
        epoch.tasks.insert(UpdateTask::Recreate);
        epoch.commit()
    }

    pub fn names(&self) -> WindowNames {
        self.channel.lock().names.clone()
    }

    pub fn set_names(&self, name: impl Into<String>, class: impl Into<String>) {
        let mut epoch = self.channel.acquire();
        epoch.names = WindowNames::new(name, class);
        epoch.tasks.insert(UpdateTask::Rename);
    }

    /// Replace the renderer. The previous one is released here, on the calling thread.
    pub fn set_renderer(&self, renderer: Option<Renderer>) {
        let previous = std::mem::replace(&mut self.channel.acquire().renderer, renderer);
        drop(previous);
    }

    /// Called on the event-loop thread for every button press. The callback must
    /// not call back into this session.
    pub fn set_mouse_callback<F>(&self, callback: F)
    where
        F: FnMut(&MouseEvent) + Send + 'static,
    {
        let previous = self.channel.acquire().mouse.replace(Box::new(callback));
        drop(previous);
    }

    pub fn clear_mouse_callback(&self) {
        let previous = self.channel.acquire().mouse.take();
        drop(previous);
    }

    /// Hide the window whenever it is clicked.
    pub fn set_hide_on_mouse(&self, enabled: bool) {
        self.channel.acquire().hide_on_mouse = enabled;
    }

    /// Let clicks fall through to the windows below. Mouse callbacks stop firing.
    pub fn set_input_passthrough(&self, enabled: bool) {
        let mut epoch = self.channel.acquire();
        if epoch.passthrough != enabled {
            epoch.passthrough = enabled;
            epoch.tasks.insert(UpdateTask::InputShape);
        }
    }

    pub fn is_shown(&self) -> bool {
        self.channel.lock().shown
    }

    pub fn show(&self) -> Result<()> {
        let mut epoch = self.channel.acquire();
        epoch.ensure_running()?;
        epoch.tasks.remove(UpdateTask::Hide);
        if epoch.shown {
            return Ok(());
        }
        epoch.tasks.extend([UpdateTask::Render, UpdateTask::Show]);
        epoch.commit()
    }

    pub fn hide(&self) -> Result<()> {
        let mut epoch = self.channel.acquire();
        epoch.ensure_running()?;
        epoch.tasks.remove(UpdateTask::Show);
        if !epoch.shown {
            return Ok(());
        }
        epoch.tasks.insert(UpdateTask::Hide);
        epoch.commit()
    }

    /// Repaint with the current geometry and renderer without changing visibility.
    pub fn render_now(&self) -> Result<()> {
        let mut epoch = self.channel.acquire();
        epoch.ensure_running()?;
        epoch.tasks.insert(UpdateTask::Render);
        epoch.commit()
    }

    /// Show the window, fade it in, hold, fade it out and hide it again. Blocks for
    /// the whole animation. Hiding the window (a click with hide-on-mouse, or
    /// [`hide`](Self::hide) from another thread) ends it early.
    ///
    /// The current renderer is used for every frame and is reinstated afterwards.
    /// A renderer installed while the flash runs is released when it ends.
    pub fn flash(&self, fade_in_ms: u32, hold_ms: u32, fade_out_ms: u32) -> Result<()> {
        self.flash_with(FlashTimings::from_millis(
            fade_in_ms.into(),
            hold_ms.into(),
            fade_out_ms.into(),
        ))
    }

    pub fn flash_with(&self, timings: FlashTimings) -> Result<()> {
        if timings.is_zero() {
            return Ok(());
        }

        {
            let mut epoch = self.channel.acquire();
            epoch.ensure_running()?;
            if epoch.flash.is_some() {
                return Err(Error::FlashInProgress);
            }
            let saved = epoch.renderer.take();
            epoch.flash = Some(FlashRun::new(timings, saved));
            epoch.tasks.remove(UpdateTask::Hide);
            epoch
                .tasks
                .extend([UpdateTask::Render, UpdateTask::Show, UpdateTask::StartTimer]);
            debug!("Flash requested: {:?}", timings);
        }

        drop(self.channel.wait_until(|state| {
            !state.is_running() || state.flash.as_ref().is_none_or(|run| run.animation.is_done())
        }));

        let mut epoch = self.channel.acquire();
        let replaced = match epoch.flash.take() {
            Some(run) => std::mem::replace(&mut epoch.renderer, run.saved),
            None => None,
        };
        let result = if epoch.is_running() {
            epoch.tasks.remove(UpdateTask::Show);
            epoch.tasks.insert(UpdateTask::Hide);
            epoch.commit()
        } else {
            drop(epoch);
            Err(Error::EventLoopStopped)
        };
        drop(replaced);
        result
    }

    fn shutdown(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        self.channel.acquire().finish = true;
        match worker.join() {
            // Dropping the window system closes the connection
            Ok(backend) => drop(backend),
            Err(_) => error!("OSD event loop thread panicked"),
        }
        info!("OSD session destroyed");
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Color;
    use crate::geometry::{Coord, Rect};
    use crate::window_system::WindowEvent;
    use crate::window_system::recording::{CAPTURE_COLOR, Call, RecordingHandle, recording};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::{Duration, Instant};

    fn session(composite: bool) -> (Session, RecordingHandle) {
        let (backend, handle) = recording((1000, 800), composite);
        (Session::with_window_system(backend).unwrap(), handle)
    }

    /// Opaque white renderer counting paints and releases.
    fn counted_renderer() -> (Renderer, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let paints = Arc::new(AtomicUsize::new(0));
        let releases = Arc::new(AtomicUsize::new(0));
        let (p, r) = (paints.clone(), releases.clone());
        let renderer = Renderer::new(move |canvas| {
            p.fetch_add(1, Ordering::SeqCst);
            canvas.clear(Color::WHITE);
        })
        .on_release(move || {
            r.fetch_add(1, Ordering::SeqCst);
        });
        (renderer, paints, releases)
    }

    fn wait_for(mut condition: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !condition() {
            assert!(Instant::now() < deadline, "condition not reached in time");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_geometry_round_trip() {
        let (session, _handle) = session(false);
        for geometry in [
            Geometry::new(-5, 7, 1, 1),
            Geometry::new(Coord::End(-20), Coord::CENTER, 300, 40),
            Geometry::at_position(8, 640, 480).with_offset(-50, -50),
        ] {
            session.set_geometry(geometry);
            assert_eq!(session.geometry(), geometry);
        }
    }

    #[test]
    fn test_geometry_is_resolved_against_screen() {
        let (session, handle) = session(false);
        session.set_geometry(Geometry::new(Coord::CENTER, Coord::End(-10), 200, 100));
        session.render_now().unwrap();
        assert!(handle.calls().contains(&Call::Configure(Rect::new(400, 690, 200, 100))));
    }

    #[test]
    fn test_show_and_hide_are_idempotent() {
        let (session, handle) = session(false);
        session.set_geometry(Geometry::new(10, 10, 100, 50));

        session.show().unwrap();
        session.show().unwrap();
        assert!(session.is_shown());
        assert_eq!(handle.count(|call| *call == Call::MapRaised), 1);
        assert_eq!(handle.count(|call| matches!(call, Call::Present { .. })), 1);

        session.hide().unwrap();
        session.hide().unwrap();
        assert!(!session.is_shown());
        assert_eq!(handle.count(|call| *call == Call::Unmap), 1);
    }

    #[test]
    fn test_zero_flash_is_a_no_op() {
        let (session, handle) = session(false);
        let (renderer, paints, releases) = counted_renderer();
        session.set_geometry(Geometry::new(0, 0, 10, 10));
        session.set_renderer(Some(renderer));

        session.flash(0, 0, 0).unwrap();
        assert!(!session.is_shown());
        assert_eq!(paints.load(Ordering::SeqCst), 0);
        assert_eq!(releases.load(Ordering::SeqCst), 0);
        assert_eq!(handle.count(|call| *call == Call::MapRaised), 0);

        session.render_now().unwrap();
        assert_eq!(paints.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_fade_in_reaches_full_opacity() {
        let (session, handle) = session(true);
        session.set_transparency(Transparency::Composite).unwrap();
        assert_eq!(session.transparency(), Transparency::Composite);
        session.set_geometry(Geometry::new(0, 0, 20, 20));
        let (renderer, paints, releases) = counted_renderer();
        session.set_renderer(Some(renderer));

        session.flash(100, 0, 0).unwrap();

        let alphas = handle.presented_alphas();
        assert_eq!(alphas.first(), Some(&0));
        assert_eq!(alphas.last(), Some(&255));
        assert!(alphas.windows(2).all(|pair| pair[0] <= pair[1]), "{alphas:?}");
        assert!(!session.is_shown());
        // Painted once into the fade layer, never released
        assert_eq!(paints.load(Ordering::SeqCst), 1);
        assert_eq!(releases.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_flash_with_hold_renders_full_frame() {
        let (session, handle) = session(true);
        session.set_transparency(Transparency::Composite).unwrap();
        session.set_geometry(Geometry::new(0, 0, 20, 20));
        session.set_renderer(Some(counted_renderer().0));

        session.flash(50, 100, 50).unwrap();

        let alphas = handle.presented_alphas();
        assert!(alphas.contains(&255), "{alphas:?}");
        assert_eq!(alphas.last(), Some(&0));
        assert_eq!(handle.calls().last(), Some(&Call::Unmap));
    }

    #[test]
    fn test_flash_restores_renderer() {
        let (session, _handle) = session(false);
        session.set_geometry(Geometry::new(0, 0, 10, 10));
        let (renderer, paints, releases) = counted_renderer();
        session.set_renderer(Some(renderer));

        session.flash(0, 60, 0).unwrap();
        assert_eq!(releases.load(Ordering::SeqCst), 0);

        let before = paints.load(Ordering::SeqCst);
        session.render_now().unwrap();
        assert_eq!(paints.load(Ordering::SeqCst), before + 1);

        session.set_renderer(None);
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_renderer_set_during_flash_is_released() {
        let (session, _handle) = session(false);
        session.set_geometry(Geometry::new(0, 0, 10, 10));
        let (original, original_paints, original_releases) = counted_renderer();
        let (intruder, _, intruder_releases) = counted_renderer();
        session.set_renderer(Some(original));

        thread::scope(|scope| {
            let flash = scope.spawn(|| session.flash(0, 1000, 0));
            wait_for(|| session.is_shown());
            session.set_renderer(Some(intruder));
            session.hide().unwrap();
            flash.join().unwrap().unwrap();
        });

        assert_eq!(intruder_releases.load(Ordering::SeqCst), 1);
        assert_eq!(original_releases.load(Ordering::SeqCst), 0);
        let before = original_paints.load(Ordering::SeqCst);
        session.render_now().unwrap();
        assert_eq!(original_paints.load(Ordering::SeqCst), before + 1);
    }

    #[test]
    fn test_click_hides_and_aborts_flash() {
        let (session, handle) = session(false);
        session.set_geometry(Geometry::new(0, 0, 10, 10));
        session.set_hide_on_mouse(true);
        let clicks = Arc::new(Mutex::new(Vec::new()));
        let sink = clicks.clone();
        session.set_mouse_callback(move |event| sink.lock().unwrap().push(*event));

        let started = Instant::now();
        thread::scope(|scope| {
            let flash = scope.spawn(|| session.flash(0, 10_000, 0));
            wait_for(|| session.is_shown());
            handle.inject(WindowEvent::ButtonPress(MouseEvent {
                x: 3,
                y: 4,
                button: 1,
                ..MouseEvent::default()
            }));
            flash.join().unwrap().unwrap();
        });

        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(!session.is_shown());
        let clicks = clicks.lock().unwrap();
        assert_eq!(clicks.len(), 1);
        assert_eq!((clicks[0].x, clicks[0].y, clicks[0].button), (3, 4, 1));
    }

    #[test]
    fn test_concurrent_flash_is_rejected() {
        let (session, _handle) = session(false);
        session.set_geometry(Geometry::new(0, 0, 10, 10));

        thread::scope(|scope| {
            let flash = scope.spawn(|| session.flash(0, 10_000, 0));
            wait_for(|| session.is_shown());
            assert!(matches!(session.flash(0, 10, 0), Err(Error::FlashInProgress)));
            session.hide().unwrap();
            flash.join().unwrap().unwrap();
        });
    }

    #[test]
    fn test_transparency_switch_preserves_names() {
        let (session, handle) = session(true);
        session.set_names("osd", "Test");
        session.set_transparency(Transparency::Composite).unwrap();
        session.set_transparency(Transparency::None).unwrap();

        let created: Vec<_> = handle
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::CreateWindow {
                    effective, names, ..
                } => Some((effective, names)),
                _ => None,
            })
            .collect();
        let expected = WindowNames::new("osd", "Test");
        assert_eq!(created.len(), 3);
        assert_eq!(created[1], (Transparency::Composite, expected.clone()));
        assert_eq!(created[2], (Transparency::None, expected.clone()));
        assert_eq!(session.names(), expected);
    }

    #[test]
    fn test_names_applied_to_live_window() {
        let (session, handle) = session(false);
        session.set_names("osd", "Test");
        session.render_now().unwrap();

        let expected = WindowNames::new("osd", "Test");
        assert_eq!(handle.count(|call| *call == Call::SetNames(expected.clone())), 1);
        assert_eq!(session.names(), expected);
    }

    #[test]
    fn test_input_passthrough_toggles_on_live_window() {
        let (session, handle) = session(false);
        let passthrough = |handle: &RecordingHandle| -> Vec<bool> {
            handle
                .calls()
                .into_iter()
                .filter_map(|call| match call {
                    Call::InputPassthrough(enabled) => Some(enabled),
                    _ => None,
                })
                .collect()
        };

        session.set_input_passthrough(true);
        session.render_now().unwrap();
        assert_eq!(passthrough(&handle), vec![true]);

        // Unchanged setting: nothing to apply
        session.set_input_passthrough(true);
        session.render_now().unwrap();
        assert_eq!(passthrough(&handle), vec![true]);

        session.set_input_passthrough(false);
        session.render_now().unwrap();
        assert_eq!(passthrough(&handle), vec![true, false]);
    }

    fn last_created_passthrough(handle: &RecordingHandle) -> Option<bool> {
        handle.calls().into_iter().rev().find_map(|call| match call {
            Call::CreateWindow { passthrough, .. } => Some(passthrough),
            _ => None,
        })
    }

    #[test]
    fn test_recreate_keeps_input_passthrough() {
        let (session, handle) = session(true);
        assert_eq!(last_created_passthrough(&handle), Some(false));

        session.set_input_passthrough(true);
        session.set_transparency(Transparency::Composite).unwrap();
        assert_eq!(last_created_passthrough(&handle), Some(true));

        session.set_input_passthrough(false);
        session.set_transparency(Transparency::None).unwrap();
        assert_eq!(last_created_passthrough(&handle), Some(false));
    }

    #[test]
    fn test_passthrough_and_recreate_in_one_tick() {
        let (session, handle) = session(false);
        {
            let mut epoch = session.channel.acquire();
            epoch.passthrough = true;
            epoch.tasks.insert(UpdateTask::InputShape);
            epoch.requested_mode = Transparency::Fake;
            epoch.tasks.insert(UpdateTask::Recreate);
            epoch.commit().unwrap();
        }

        let created: Vec<_> = handle
            .calls()
            .into_iter()
            .filter(|call| matches!(call, Call::CreateWindow { .. }))
            .collect();
        assert_eq!(created.len(), 2);
        assert!(matches!(
            created[1],
            Call::CreateWindow {
                effective: Transparency::Fake,
                passthrough: true,
                ..
            }
        ));
        assert_eq!(session.transparency(), Transparency::Fake);
    }

    #[test]
    fn test_extreme_geometry_keeps_loop_alive() {
        let (session, handle) = session(false);
        session.set_geometry(Geometry::new(Coord::End(i32::MAX), 0, 10, 10));
        session.render_now().unwrap();
        assert!(handle.calls().contains(&Call::Configure(Rect::new(32767, 0, 10, 10))));

        session.set_geometry(Geometry::new(Coord::Start(i32::MIN), Coord::Center(i32::MAX), 10, 10));
        session.show().unwrap();
        assert!(session.is_shown());
        assert!(handle.calls().contains(&Call::Configure(Rect::new(-32768, 32767, 10, 10))));
        session.hide().unwrap();
    }

    #[test]
    fn test_composite_falls_back_to_fake() {
        let (session, _handle) = session(false);
        session.set_transparency(Transparency::Composite).unwrap();
        assert_eq!(session.transparency(), Transparency::Fake);
    }

    #[test]
    fn test_recreate_keeps_window_shown() {
        let (session, handle) = session(true);
        session.set_geometry(Geometry::new(0, 0, 10, 10));
        session.show().unwrap();
        session.set_transparency(Transparency::Composite).unwrap();

        assert!(session.is_shown());
        assert_eq!(handle.count(|call| *call == Call::MapRaised), 2);
        assert_eq!(handle.count(|call| matches!(call, Call::Configure(_))), 2);
    }

    #[test]
    fn test_fake_snapshot_lifecycle() {
        let (session, handle) = session(false);
        session.set_transparency(Transparency::Fake).unwrap();
        let rect = Rect::new(10, 20, 100, 50);
        session.set_geometry(Geometry::new(rect.x, rect.y, rect.width, rect.height));

        session.show().unwrap();
        let calls = handle.calls();
        let capture = calls.iter().position(|call| *call == Call::Capture(rect));
        let map = calls.iter().position(|call| *call == Call::MapRaised);
        assert!(capture.unwrap() < map.unwrap());
        assert!(calls.contains(&Call::Present {
            width: 100,
            height: 50,
            center: CAPTURE_COLOR,
        }));

        // Re-shown: captured again
        session.hide().unwrap();
        session.show().unwrap();
        assert_eq!(handle.count(|call| matches!(call, Call::Capture(_))), 2);

        // Moved while shown: unmapped around a fresh capture
        handle.clear();
        session.set_geometry(Geometry::new(30, 20, 100, 50));
        session.render_now().unwrap();
        let calls = handle.calls();
        let capture = calls
            .iter()
            .position(|call| *call == Call::Capture(Rect::new(30, 20, 100, 50)))
            .unwrap();
        assert_eq!(calls[capture - 1], Call::Unmap);
        assert_eq!(calls[capture + 1], Call::MapRaised);
        assert!(session.is_shown());
    }

    #[test]
    fn test_concurrent_geometry_reads_are_consistent() {
        let (session, _handle) = session(false);
        let uniform = |v: u32| Geometry::new(v as i32, v as i32, v, v);

        thread::scope(|scope| {
            for value in [1, 2] {
                let session = &session;
                scope.spawn(move || {
                    for _ in 0..500 {
                        session.set_geometry(uniform(value));
                    }
                });
            }
            scope.spawn(|| {
                for _ in 0..1000 {
                    let geometry = session.geometry();
                    if geometry != Geometry::default() {
                        assert!(geometry == uniform(1) || geometry == uniform(2), "{geometry:?}");
                    }
                }
            });
        });
    }

    #[test]
    fn test_configure_fight_is_bounded() {
        let (session, handle) = session(false);
        let wanted = Rect::new(10, 10, 100, 50);
        session.set_geometry(Geometry::new(10, 10, 100, 50));
        session.render_now().unwrap();
        handle.clear();

        for _ in 0..6 {
            handle.inject(WindowEvent::Configure(Rect::new(500, 500, 100, 50)));
            session.render_now().unwrap();
        }
        assert_eq!(handle.count(|call| *call == Call::Configure(wanted)), 3);
    }

    #[test]
    fn test_mouse_callback_without_hide() {
        let (session, handle) = session(false);
        session.set_geometry(Geometry::new(0, 0, 10, 10));
        let clicks = Arc::new(AtomicUsize::new(0));
        let counter = clicks.clone();
        session.set_mouse_callback(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        session.show().unwrap();

        handle.inject(WindowEvent::ButtonPress(MouseEvent::default()));
        session.render_now().unwrap();
        assert_eq!(clicks.load(Ordering::SeqCst), 1);
        assert!(session.is_shown());
    }

    #[test]
    fn test_dead_event_loop_reports_errors() {
        let (session, handle) = session(false);
        handle.break_connection();

        wait_for(|| matches!(session.render_now(), Err(Error::EventLoopStopped)));
        assert!(matches!(session.show(), Err(Error::EventLoopStopped)));
        assert!(matches!(session.flash(10, 10, 10), Err(Error::EventLoopStopped)));

        // Plain configuration still round-trips
        session.set_geometry(Geometry::new(1, 2, 3, 4));
        assert_eq!(session.geometry(), Geometry::new(1, 2, 3, 4));
        session.destroy();
    }

    #[test]
    fn test_destroy_releases_everything() {
        let (session, handle) = session(false);
        let (renderer, _, releases) = counted_renderer();
        session.set_geometry(Geometry::new(0, 0, 10, 10));
        session.set_renderer(Some(renderer));
        session.show().unwrap();

        session.destroy();
        assert_eq!(releases.load(Ordering::SeqCst), 1);
        assert_eq!(handle.calls().last(), Some(&Call::DestroyWindow(1)));
    }
}
