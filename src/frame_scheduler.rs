//! Frame pacing for the strip controller.
//!
//! Portable pacing without async/await or platform timers. The caller
//! sleeps between frames for the returned duration.

use embassy_time::{Duration, Instant};

use crate::clock::Clock;
use crate::controller::{FrameResult, StripController};
use crate::transmit::TransmitDriver;

/// Default target frame rate.
pub const DEFAULT_FPS: u32 = 60;

/// Default frame duration based on target FPS.
pub const DEFAULT_FRAME_DURATION: Duration = Duration::from_micros(1_000_000 / DEFAULT_FPS as u64);

/// Outcome of one scheduler tick
#[derive(Debug, Clone)]
pub struct FrameTick<const MAX_STRIPS: usize> {
    /// Per-strip outcome of the frame just shown
    pub result: FrameResult<MAX_STRIPS>,
    /// The deadline for the next frame
    pub next_deadline: Instant,
    /// How long to wait until the next frame, zero when behind schedule
    pub sleep_duration: Duration,
}

/// Drives `show` at a fixed frame rate.
///
/// # Usage
///
/// ```ignore
/// let mut scheduler = FrameScheduler::new(controller);
///
/// loop {
///     // update pixels through scheduler.controller_mut()
///     let tick = scheduler.tick(Instant::now());
///     Timer::after(tick.sleep_duration).await;
/// }
/// ```
pub struct FrameScheduler<'a, D, C, const MAX_STRIPS: usize, const K: usize>
where
    D: TransmitDriver,
    C: Clock,
{
    controller: StripController<'a, D, C, MAX_STRIPS, K>,
    next_frame: Option<Instant>,
    frame_duration: Duration,
}

impl<'a, D, C, const MAX_STRIPS: usize, const K: usize> FrameScheduler<'a, D, C, MAX_STRIPS, K>
where
    D: TransmitDriver,
    C: Clock,
{
    /// Uses `DEFAULT_FRAME_DURATION` for frame timing.
    pub fn new(controller: StripController<'a, D, C, MAX_STRIPS, K>) -> Self {
        Self::with_frame_duration(controller, DEFAULT_FRAME_DURATION)
    }

    pub fn with_frame_duration(
        controller: StripController<'a, D, C, MAX_STRIPS, K>,
        frame_duration: Duration,
    ) -> Self {
        Self {
            controller,
            next_frame: None,
            frame_duration,
        }
    }

    pub const fn frame_duration(&self) -> Duration {
        self.frame_duration
    }

    /// Show one frame and return timing for the next.
    ///
    /// Falling more than two frames behind drops the backlog so a stall
    /// does not cause a burst of catch-up frames.
    pub fn tick(&mut self, now: Instant) -> FrameTick<MAX_STRIPS> {
        let max_drift = self.frame_duration * 2;
        let scheduled = match self.next_frame {
            Some(next) if now.saturating_duration_since(next) <= max_drift => next,
            _ => now,
        };

        let result = self.controller.show();

        let next_deadline = scheduled + self.frame_duration;
        self.next_frame = Some(next_deadline);

        FrameTick {
            result,
            next_deadline,
            sleep_duration: next_deadline.saturating_duration_since(now),
        }
    }

    pub fn controller(&self) -> &StripController<'a, D, C, MAX_STRIPS, K> {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut StripController<'a, D, C, MAX_STRIPS, K> {
        &mut self.controller
    }

    pub fn into_controller(self) -> StripController<'a, D, C, MAX_STRIPS, K> {
        self.controller
    }
}
