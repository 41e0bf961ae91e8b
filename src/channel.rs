//! Shared session state and the handoff between caller threads and the event loop
//!
//! All mutable session fields live in one [`State`] behind a mutex. A caller takes an
//! [`Epoch`] to mutate it; dropping the epoch wakes the event loop, which then drains
//! everything queued during the epoch in a single tick. Operations that must observe
//! their effect wait on the drain generation.

use std::ops::{Deref, DerefMut};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use mio::Waker;
use tiny_skia::Pixmap;
use tracing::warn;

use crate::error::{Error, Result};
use crate::flash::{FlashAnimation, FlashTimings};
use crate::geometry::{Geometry, Rect};
use crate::renderer::{MouseHandler, Renderer};
use crate::tasks::UpdateTasks;
use crate::window_system::{Transparency, WindowNames};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LoopStatus {
    Running,
    Stopped,
}

/// Screen contents captured from under the window, valid for `rect` only.
pub(crate) struct Background {
    pub rect: Rect,
    pub pixmap: Pixmap,
}

/// A flash in progress. The session's renderer is parked in `saved` until the
/// caller restores it.
pub(crate) struct FlashRun {
    pub animation: FlashAnimation,
    pub saved: Option<Renderer>,
    pub layer: Option<Pixmap>,
}

impl FlashRun {
    pub fn new(timings: FlashTimings, saved: Option<Renderer>) -> Self {
        Self {
            animation: FlashAnimation::new(timings),
            saved,
            layer: None,
        }
    }
}

pub(crate) struct State {
    pub geometry: Geometry,
    /// Mode the caller asked for.
    pub requested_mode: Transparency,
    /// Mode of the current window, after any fallback.
    pub mode: Transparency,
    pub names: WindowNames,
    pub passthrough: bool,
    pub screen: (u32, u32),
    pub shown: bool,
    /// Resolved rectangle last sent to the window system.
    pub window_rect: Option<Rect>,
    pub background: Option<Background>,
    pub renderer: Option<Renderer>,
    pub mouse: Option<MouseHandler>,
    pub hide_on_mouse: bool,
    pub tasks: UpdateTasks,
    pub flash: Option<FlashRun>,
    pub finish: bool,
    pub status: LoopStatus,
    /// Incremented at the end of every event-loop tick.
    pub generation: u64,
}

impl State {
    pub fn new(mode: Transparency, names: WindowNames, screen: (u32, u32)) -> Self {
        Self {
            geometry: Geometry::default(),
            requested_mode: mode,
            mode,
            names,
            passthrough: false,
            screen,
            shown: false,
            window_rect: None,
            background: None,
            renderer: None,
            mouse: None,
            hide_on_mouse: false,
            tasks: UpdateTasks::default(),
            flash: None,
            finish: false,
            status: LoopStatus::Running,
            generation: 0,
        }
    }

    pub fn ensure_running(&self) -> Result<()> {
        match self.status {
            LoopStatus::Running => Ok(()),
            LoopStatus::Stopped => Err(Error::EventLoopStopped),
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == LoopStatus::Running
    }
}

pub(crate) struct CommandChannel {
    state: Mutex<State>,
    drained: Condvar,
    waker: Waker,
}

impl CommandChannel {
    pub fn new(state: State, waker: Waker) -> Self {
        Self {
            state: Mutex::new(state),
            drained: Condvar::new(),
            waker,
        }
    }

    /// Begin a configuration epoch.
    ///
    /// Not reentrant: taking a second epoch on a thread that already holds one
    /// deadlocks.
    pub fn acquire(&self) -> Epoch<'_> {
        Epoch {
            channel: self,
            state: self.lock(),
        }
    }

    /// Lock without waking the loop. Used for reads and by the loop itself.
    pub fn lock(&self) -> MutexGuard<'_, State> {
        // A panicking user callback must not take the whole session down with it
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn wake(&self) {
        if let Err(err) = self.waker.wake() {
            warn!("Failed to wake OSD event loop: {}", err);
        }
    }

    pub fn notify_drained(&self) {
        self.drained.notify_all();
    }

    /// Block until `done` holds, re-checking after every tick.
    pub fn wait_until<F>(&self, mut done: F) -> MutexGuard<'_, State>
    where
        F: FnMut(&State) -> bool,
    {
        let guard = self.lock();
        self.drained
            .wait_while(guard, |state| !done(state))
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until the tick numbered `generation` has completed.
    pub fn wait_for_drain(&self, generation: u64) -> Result<()> {
        let state = self.wait_until(|state| state.generation >= generation || !state.is_running());
        if state.generation >= generation {
            Ok(())
        } else {
            Err(Error::EventLoopStopped)
        }
    }
}

/// Exclusive access to the session state. Dropping it wakes the event loop.
pub(crate) struct Epoch<'a> {
    channel: &'a CommandChannel,
    state: MutexGuard<'a, State>,
}

impl Epoch<'_> {
    /// End the epoch and wait until the event loop has applied it.
    pub fn commit(self) -> Result<()> {
        let channel = self.channel;
        let target = self.state.generation + 1;
        drop(self);
        channel.wait_for_drain(target)
    }
}

impl Deref for Epoch<'_> {
    type Target = State;

    fn deref(&self) -> &State {
        &self.state
    }
}

impl DerefMut for Epoch<'_> {
    fn deref_mut(&mut self) -> &mut State {
        &mut self.state
    }
}

impl Drop for Epoch<'_> {
    fn drop(&mut self) {
        self.channel.wake();
    }
}
