//! The per-session event-loop thread
//!
//! This thread owns the window system for the whole life of the session and is the
//! only one that mutates the window. Each tick it:
//!
//! 1. dispatches window-system events (collapsing expose/configure bursts),
//! 2. advances a running flash if its deadline has passed,
//! 3. drains the pending update tasks in their fixed order,
//! 4. publishes the tick by bumping the drain generation,
//!
//! then sleeps in `mio::Poll` until the connection is readable, a caller wakes it,
//! or the next flash deadline arrives.

use std::io::ErrorKind;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use mio::{Events, Poll, Token};
use tracing::{debug, error, info, warn};

use crate::channel::{Background, CommandChannel, LoopStatus, State};
use crate::compose::{Content, compose_frame};
use crate::error::{Error, Result};
use crate::geometry::Rect;
use crate::tasks::UpdateTask;
use crate::window_system::{Transparency, WindowEvent, WindowSystem};

/// Readiness of the window-system connection.
pub(crate) const CONNECTION: Token = Token(0);
/// Readiness of the caller wakeup.
pub(crate) const WAKER: Token = Token(1);

/// Times a moved window is put back before giving up on the window manager.
const MAX_CONFIGURE_RETRIES: u8 = 3;

pub(crate) type WorkerHandle = JoinHandle<Box<dyn WindowSystem>>;

pub(crate) struct EventLoop {
    channel: Arc<CommandChannel>,
    backend: Box<dyn WindowSystem>,
    poll: Poll,
    events: Events,
    /// Events read while waiting for replies, dispatched on the next tick.
    backlog: Vec<WindowEvent>,
    configure_retries: u8,
}

/// Marks the loop stopped and wakes every waiter, however the thread exits.
struct StopOnExit(Arc<CommandChannel>);

impl Drop for StopOnExit {
    fn drop(&mut self) {
        self.0.lock().status = LoopStatus::Stopped;
        self.0.notify_drained();
    }
}

impl EventLoop {
    pub fn new(channel: Arc<CommandChannel>, backend: Box<dyn WindowSystem>, poll: Poll) -> Self {
        Self {
            channel,
            backend,
            poll,
            events: Events::with_capacity(16),
            backlog: Vec::new(),
            configure_retries: 0,
        }
    }

    /// Start the thread. It hands the window system back when it exits so the
    /// connection is closed by whoever joins it.
    pub fn spawn(self) -> Result<WorkerHandle> {
        thread::Builder::new()
            .name("aosd-event-loop".into())
            .spawn(move || self.run())
            .map_err(Error::ResourceExhausted)
    }

    fn run(mut self) -> Box<dyn WindowSystem> {
        let _stopped = StopOnExit(self.channel.clone());
        match self.run_ticks() {
            Ok(()) => debug!("OSD event loop finished"),
            Err(err) => error!("OSD event loop stopped: {}", err),
        }
        self.backend
    }

    fn run_ticks(&mut self) -> Result<()> {
        let channel = self.channel.clone();
        loop {
            let timeout = {
                let mut state = channel.lock();
                if self.tick(&mut state)? {
                    self.backend.destroy_window()?;
                    self.backend.flush()?;
                    return Ok(());
                }
                // Replies read during the drain may have queued events behind the fd
                self.backlog = self.backend.pending_events()?;
                if self.backlog.is_empty() {
                    next_timeout(&state, Instant::now())
                } else {
                    Some(Duration::ZERO)
                }
            };

            match self.poll.poll(&mut self.events, timeout) {
                Ok(()) => {}
                Err(err) if err.kind() == ErrorKind::Interrupted => {}
                Err(err) => return Err(Error::Protocol(format!("event poll failed: {err}"))),
            }
        }
    }

    /// One pass over events, animation and tasks. Returns true once FINISH is seen.
    fn tick(&mut self, state: &mut State) -> Result<bool> {
        let mut mutated = self.dispatch_events(state)?;

        let frame_due = state
            .flash
            .as_mut()
            .is_some_and(|run| run.animation.tick(Instant::now()));
        if frame_due {
            state.tasks.insert(UpdateTask::Render);
        }

        mutated |= self.drain(state)?;

        if !state.shown {
            if let Some(run) = state.flash.as_mut().filter(|run| run.animation.is_running()) {
                debug!("Flash aborted, window was hidden");
                run.animation.abort();
            }
        }

        if mutated {
            self.backend.flush()?;
        }
        state.generation += 1;
        self.channel.notify_drained();
        Ok(state.finish)
    }

    fn dispatch_events(&mut self, state: &mut State) -> Result<bool> {
        let mut events = std::mem::take(&mut self.backlog);
        events.extend(self.backend.pending_events()?);

        let mut mutated = false;
        for event in collapse(events) {
            match event {
                // Contents live in the background pixmap, the server repaints on its own
                WindowEvent::Expose => {}
                WindowEvent::Configure(actual) => mutated |= self.hold_position(state, actual)?,
                WindowEvent::ButtonPress(mouse) => {
                    debug!("Button {} pressed at {},{}", mouse.button, mouse.x, mouse.y);
                    if state.hide_on_mouse {
                        state.tasks.insert(UpdateTask::Hide);
                    }
                    if let Some(callback) = state.mouse.as_mut() {
                        callback(&mouse);
                    }
                }
            }
        }
        Ok(mutated)
    }

    /// Put the window back if something else moved or resized it.
    fn hold_position(&mut self, state: &State, actual: Rect) -> Result<bool> {
        let Some(wanted) = state.window_rect else {
            return Ok(false);
        };
        if actual == wanted {
            self.configure_retries = 0;
            return Ok(false);
        }
        if self.configure_retries >= MAX_CONFIGURE_RETRIES {
            if self.configure_retries == MAX_CONFIGURE_RETRIES {
                warn!(
                    "Window keeps being moved to {:?} instead of {:?}, giving up",
                    actual, wanted
                );
                self.configure_retries += 1;
            }
            return Ok(false);
        }
        self.configure_retries += 1;
        debug!("Window moved to {:?}, restoring {:?}", actual, wanted);
        self.backend.configure(wanted)?;
        Ok(true)
    }

    fn drain(&mut self, state: &mut State) -> Result<bool> {
        if state.tasks.is_empty() {
            return Ok(false);
        }
        let mut mutated = false;

        if state.tasks.take(UpdateTask::Recreate) {
            let was_shown = state.shown;
            state.mode =
                self.backend
                    .create_window(state.requested_mode, &state.names, state.passthrough)?;
            state.shown = false;
            state.background = None;
            state.window_rect = None;
            // Names and input shape were applied by create_window
            state.tasks.remove(UpdateTask::Rename);
            state.tasks.remove(UpdateTask::InputShape);
            state.tasks.extend([UpdateTask::Resize, UpdateTask::Reposition]);
            if was_shown {
                state.tasks.extend([UpdateTask::Render, UpdateTask::Show]);
            }
            info!("Recreated OSD window with {:?} transparency", state.mode);
            mutated = true;
        }

        if state.tasks.take(UpdateTask::Rename) {
            self.backend.set_names(&state.names)?;
            mutated = true;
        }

        if state.tasks.take(UpdateTask::InputShape) {
            self.backend.set_input_passthrough(state.passthrough)?;
            mutated = true;
        }

        if state.tasks.take(UpdateTask::Hide) && state.shown {
            self.backend.unmap()?;
            state.shown = false;
            state.background = None;
            mutated = true;
        }

        let resize = state.tasks.take(UpdateTask::Resize);
        let reposition = state.tasks.take(UpdateTask::Reposition);
        if (resize || reposition) && state.geometry.has_area() {
            let rect = state.geometry.resolve(state.screen);
            if state.window_rect != Some(rect) {
                self.backend.configure(rect)?;
                state.window_rect = Some(rect);
                self.configure_retries = 0;
                mutated = true;
            }
        }

        if state.tasks.take(UpdateTask::Render) {
            mutated |= self.render(state)?;
        }

        if state.tasks.take(UpdateTask::Show) && !state.shown {
            self.backend.map_raised()?;
            state.shown = true;
            mutated = true;
        }

        if state.tasks.take(UpdateTask::StartTimer) {
            if let Some(run) = state.flash.as_mut() {
                run.animation.begin(Instant::now());
                debug!("Flash started in {:?}", run.animation.phase());
            }
        }

        Ok(mutated)
    }

    fn render(&mut self, state: &mut State) -> Result<bool> {
        let Some(rect) = state.window_rect else {
            debug!("Nothing to render, geometry not set");
            return Ok(false);
        };

        let stale = state
            .background
            .as_ref()
            .is_none_or(|background| background.rect != rect);
        if state.mode == Transparency::Fake && stale {
            // The snapshot must not contain the OSD itself
            if state.shown {
                self.backend.unmap()?;
            }
            let pixmap = self.backend.capture(rect)?;
            if state.shown {
                self.backend.map_raised()?;
            }
            state.background = Some(Background { rect, pixmap });
        }

        let State {
            mode,
            background,
            renderer,
            flash,
            ..
        } = state;
        let background = background
            .as_ref()
            .filter(|_| *mode == Transparency::Fake)
            .map(|background| &background.pixmap);
        let content = match flash.as_mut() {
            Some(run) => Content::Faded {
                renderer: run.saved.as_mut(),
                layer: &mut run.layer,
                alpha: run.animation.alpha(),
            },
            None => Content::Direct(renderer.as_mut()),
        };

        let Some(frame) = compose_frame(*mode, rect.width, rect.height, background, content) else {
            return Ok(false);
        };
        self.backend.present(&frame)?;
        Ok(true)
    }
}

fn next_timeout(state: &State, now: Instant) -> Option<Duration> {
    state
        .flash
        .as_ref()
        .and_then(|run| run.animation.deadline())
        .map(|deadline| deadline.saturating_duration_since(now))
}

/// Collapse each run of expose/configure notifications into one, keeping the last
/// configure of the run.
fn collapse(events: Vec<WindowEvent>) -> Vec<WindowEvent> {
    fn redundant(event: &WindowEvent) -> bool {
        matches!(event, WindowEvent::Expose | WindowEvent::Configure(_))
    }

    let mut collapsed: Vec<WindowEvent> = Vec::with_capacity(events.len());
    for event in events {
        match collapsed.last_mut() {
            Some(last) if redundant(last) && redundant(&event) => {
                if matches!(event, WindowEvent::Configure(_)) {
                    *last = event;
                }
            }
            _ => collapsed.push(event),
        }
    }
    collapsed
}
