//! Frame-driven animation timing.
//!
//! An [`Animation`] only tracks time. The owner applies the interpolated
//! progress to its own state, which keeps layout managers free of callbacks
//! that would need to borrow them.

use crate::fling;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpolator {
    Linear,
    /// Decelerating `1 - (1 - t)^2`.
    FastSlow,
    /// `(t - 1)^5 + 1`, used for page turns.
    QuinticOut,
    /// Spline position table of the fling model.
    Fling,
}

impl Interpolator {
    pub fn apply(self, t: f64) -> f64 {
        match self {
            Interpolator::Linear => t,
            Interpolator::FastSlow => 1.0 - (1.0 - t) * (1.0 - t),
            Interpolator::QuinticOut => {
                let t = t - 1.0;
                t * t * t * t * t + 1.0
            }
            Interpolator::Fling => fling::interpolate(t),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    /// Started; the start time is latched by the next `calculate`.
    Pending,
    Running(u64),
}

/// Result of one `calculate` call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tick {
    pub progress: f64,
    pub finished: bool,
}

#[derive(Debug, Clone)]
pub struct Animation {
    duration: u64,
    interpolator: Interpolator,
    state: State,
}

impl Animation {
    pub fn new(interpolator: Interpolator) -> Self {
        Self {
            duration: 0,
            interpolator,
            state: State::Idle,
        }
    }

    pub fn set_duration(&mut self, duration: u64) {
        self.duration = duration;
    }

    pub fn duration(&self) -> u64 {
        self.duration
    }

    pub fn start(&mut self) {
        self.state = State::Pending;
    }

    pub fn cancel(&mut self) {
        self.state = State::Idle;
    }

    pub fn is_running(&self) -> bool {
        self.state != State::Idle
    }

    /// Advance to `now` (ms). Returns `None` when idle. The tick that reports
    /// `finished` has already returned the animation to idle.
    pub fn calculate(&mut self, now: u64) -> Option<Tick> {
        let start = match self.state {
            State::Idle => return None,
            State::Pending => {
                self.state = State::Running(now);
                now
            }
            State::Running(start) => start,
        };
        let elapsed = now.saturating_sub(start);
        let x = if self.duration == 0 {
            1.0
        } else {
            (elapsed as f64 / self.duration as f64).clamp(0.0, 1.0)
        };
        let finished = elapsed >= self.duration;
        if finished {
            self.state = State::Idle;
        }
        Some(Tick {
            progress: self.interpolator.apply(x),
            finished,
        })
    }
}

/// Animates a value from `from` to `to`.
#[derive(Debug, Clone)]
pub struct FloatAnimation {
    anim: Animation,
    from: f64,
    to: f64,
    current: f64,
}

impl FloatAnimation {
    pub fn new(duration: u64) -> Self {
        let mut anim = Animation::new(Interpolator::Linear);
        anim.set_duration(duration);
        Self {
            anim,
            from: 0.0,
            to: 0.0,
            current: 0.0,
        }
    }

    pub fn set_range(&mut self, from: f64, to: f64) {
        self.from = from;
        self.to = to;
        self.current = from;
    }

    pub fn start(&mut self) {
        self.anim.start();
    }

    pub fn cancel(&mut self) {
        self.anim.cancel();
    }

    pub fn is_running(&self) -> bool {
        self.anim.is_running()
    }

    pub fn get(&self) -> f64 {
        self.current
    }

    pub fn calculate(&mut self, now: u64) -> Option<Tick> {
        let tick = self.anim.calculate(now)?;
        self.current = self.from + (self.to - self.from) * tick.progress;
        Some(tick)
    }
}
