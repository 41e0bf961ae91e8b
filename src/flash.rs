//! Fade-in / hold / fade-out state machine
//!
//! The animation is pure: it is advanced with explicit instants by the event loop,
//! which uses [`FlashAnimation::deadline`] as its poll timeout and renders a frame
//! whenever [`FlashAnimation::tick`] asks for one.

use std::time::{Duration, Instant};

/// Interval between fade frames.
pub const FLASH_STEP: Duration = Duration::from_millis(50);

/// Phase durations of a flash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlashTimings {
    pub fade_in: Duration,
    pub hold: Duration,
    pub fade_out: Duration,
}

impl FlashTimings {
    pub fn from_millis(fade_in: u64, hold: u64, fade_out: u64) -> Self {
        Self {
            fade_in: Duration::from_millis(fade_in),
            hold: Duration::from_millis(hold),
            fade_out: Duration::from_millis(fade_out),
        }
    }

    pub fn is_zero(&self) -> bool {
        self.total().is_zero()
    }

    pub fn total(&self) -> Duration {
        self.fade_in + self.hold + self.fade_out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FlashPhase {
    Start,
    FadeIn,
    Hold,
    FadeOut,
    Done,
}

impl FlashPhase {
    fn next(self) -> Self {
        match self {
            FlashPhase::Start => FlashPhase::FadeIn,
            FlashPhase::FadeIn => FlashPhase::Hold,
            FlashPhase::Hold => FlashPhase::FadeOut,
            FlashPhase::FadeOut | FlashPhase::Done => FlashPhase::Done,
        }
    }
}

#[derive(Debug)]
pub(crate) struct FlashAnimation {
    timings: FlashTimings,
    phase: FlashPhase,
    phase_started: Option<Instant>,
    deadline: Option<Instant>,
    alpha: f32,
}

impl FlashAnimation {
    pub fn new(timings: FlashTimings) -> Self {
        let mut animation = Self {
            timings,
            phase: FlashPhase::Start,
            phase_started: None,
            deadline: None,
            alpha: 0.0,
        };
        // The first frame is painted before the clock starts.
        animation.alpha = entry_alpha(animation.following(FlashPhase::Start), 0.0);
        animation
    }

    pub fn phase(&self) -> FlashPhase {
        self.phase
    }

    /// Opacity of the frame that should currently be on screen.
    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_running(&self) -> bool {
        matches!(
            self.phase,
            FlashPhase::FadeIn | FlashPhase::Hold | FlashPhase::FadeOut
        )
    }

    pub fn is_done(&self) -> bool {
        self.phase == FlashPhase::Done
    }

    /// Start the clock. Only the first call has an effect.
    pub fn begin(&mut self, now: Instant) {
        if self.phase == FlashPhase::Start {
            let first = self.following(FlashPhase::Start);
            self.enter(first, now);
        }
    }

    /// Advance to `now`. Returns true when a frame must be rendered with the new alpha.
    pub fn tick(&mut self, now: Instant) -> bool {
        let (Some(deadline), Some(started)) = (self.deadline, self.phase_started) else {
            return false;
        };
        if now < deadline {
            return false;
        }

        let duration = self.duration(self.phase);
        let elapsed = now.saturating_duration_since(started);
        match self.phase {
            FlashPhase::FadeIn | FlashPhase::FadeOut => {
                let fading_in = self.phase == FlashPhase::FadeIn;
                if elapsed >= duration {
                    // Land exactly on the phase's final value.
                    self.alpha = if fading_in { 1.0 } else { 0.0 };
                    let next = self.following(self.phase);
                    self.enter(next, now);
                } else {
                    let progress = (elapsed.as_secs_f32() / duration.as_secs_f32()).clamp(0.0, 1.0);
                    self.alpha = if fading_in { progress } else { 1.0 - progress };
                    self.deadline = Some((now + FLASH_STEP).min(started + duration));
                }
                true
            }
            FlashPhase::Hold => {
                let next = self.following(FlashPhase::Hold);
                self.enter(next, now);
                false
            }
            FlashPhase::Start | FlashPhase::Done => false,
        }
    }

    /// Skip every remaining phase.
    pub fn abort(&mut self) {
        self.phase = FlashPhase::Done;
        self.deadline = None;
    }

    fn duration(&self, phase: FlashPhase) -> Duration {
        match phase {
            FlashPhase::FadeIn => self.timings.fade_in,
            FlashPhase::Hold => self.timings.hold,
            FlashPhase::FadeOut => self.timings.fade_out,
            FlashPhase::Start | FlashPhase::Done => Duration::ZERO,
        }
    }

    /// First phase after `phase` that has a non-zero duration.
    fn following(&self, phase: FlashPhase) -> FlashPhase {
        let mut next = phase.next();
        while next != FlashPhase::Done && self.duration(next).is_zero() {
            next = next.next();
        }
        next
    }

    fn enter(&mut self, phase: FlashPhase, now: Instant) {
        self.phase = phase;
        self.phase_started = Some(now);
        self.alpha = entry_alpha(phase, self.alpha);
        let duration = self.duration(phase);
        self.deadline = match phase {
            FlashPhase::FadeIn | FlashPhase::FadeOut => Some(now + FLASH_STEP.min(duration)),
            FlashPhase::Hold => Some(now + duration),
            FlashPhase::Start | FlashPhase::Done => None,
        };
    }
}

fn entry_alpha(phase: FlashPhase, current: f32) -> f32 {
    match phase {
        FlashPhase::FadeIn => 0.0,
        FlashPhase::Hold | FlashPhase::FadeOut => 1.0,
        FlashPhase::Start | FlashPhase::Done => current,
    }
}
