//! Spline-based fling physics.
//!
//! Converts a release velocity into a travel distance and a duration using
//! the same deceleration model as platform scrollers. Both layout managers
//! share this one primitive; they only differ in the per-axis limits they
//! pass to [`FlingPlan::start`].

use std::sync::LazyLock;

const DECELERATION_RATE: f64 = 2.358_201_815_576_249; // ln(0.78) / ln(0.9)
const INFLEXION: f64 = 0.35; // tension lines cross at (INFLEXION, 1)
const START_TENSION: f64 = 0.5;
const END_TENSION: f64 = 1.0;
const P1: f64 = START_TENSION * INFLEXION;
const P2: f64 = 1.0 - END_TENSION * (1.0 - INFLEXION);

/// Scroll friction of the platform scroller.
pub const FLING_FRICTION: f64 = 0.015;

const GRAVITY_EARTH: f64 = 9.80665; // m/s^2
const INCHES_PER_METER: f64 = 39.37;
const TOUCH_TUNING: f64 = 0.84;

const NB_SAMPLES: usize = 100;
const BISECT_TOLERANCE: f64 = 1e-5;
const BISECT_MAX_STEPS: usize = 64;

struct SplineTables {
    position: [f64; NB_SAMPLES + 1],
    time: [f64; NB_SAMPLES + 1],
}

static SPLINE: LazyLock<SplineTables> = LazyLock::new(build_tables);

fn build_tables() -> SplineTables {
    let mut position = [0.0; NB_SAMPLES + 1];
    let mut time = [0.0; NB_SAMPLES + 1];

    let mut x_min = 0.0;
    let mut y_min = 0.0;
    for (i, (pos, tim)) in position
        .iter_mut()
        .zip(time.iter_mut())
        .enumerate()
        .take(NB_SAMPLES)
    {
        let alpha = i as f64 / NB_SAMPLES as f64;

        let x = bisect(&mut x_min, alpha, |x| {
            3.0 * x * (1.0 - x) * ((1.0 - x) * P1 + x * P2) + x * x * x
        });
        *pos = 3.0 * x * (1.0 - x) * ((1.0 - x) * START_TENSION + x) + x * x * x;

        let y = bisect(&mut y_min, alpha, |y| {
            3.0 * y * (1.0 - y) * ((1.0 - y) * START_TENSION + y) + y * y * y
        });
        *tim = 3.0 * y * (1.0 - y) * ((1.0 - y) * P1 + y * P2) + y * y * y;
    }
    position[NB_SAMPLES] = 1.0;
    time[NB_SAMPLES] = 1.0;

    SplineTables { position, time }
}

/// Solve `curve(x) = alpha` on `[lo, 1]`. `lo` carries over between samples
/// since alpha only grows.
fn bisect(lo: &mut f64, alpha: f64, curve: impl Fn(f64) -> f64) -> f64 {
    let mut hi = 1.0;
    let mut steps = 0;
    loop {
        let x = *lo + (hi - *lo) / 2.0;
        let value = curve(x);
        steps += 1;
        if (value - alpha).abs() < BISECT_TOLERANCE || steps == BISECT_MAX_STEPS {
            return x;
        }
        if value > alpha {
            hi = x;
        } else {
            *lo = x;
        }
    }
}

/// Eased fling progress: maps elapsed fraction of the duration to travelled
/// fraction of the distance.
pub fn interpolate(input: f64) -> f64 {
    let index = (NB_SAMPLES as f64 * input) as usize;
    if index < NB_SAMPLES {
        let t_inf = index as f64 / NB_SAMPLES as f64;
        let t_sup = (index + 1) as f64 / NB_SAMPLES as f64;
        let d_inf = SPLINE.position[index];
        let d_sup = SPLINE.position[index + 1];
        let velocity_coef = (d_sup - d_inf) / (t_sup - t_inf);
        d_inf + (input - t_inf) * velocity_coef
    } else {
        1.0
    }
}

/// Shrink `duration` so that travelling `new_distance` instead of
/// `old_distance` keeps the same velocity profile.
pub fn adjust_duration(old_distance: i32, new_distance: i32, duration: u64) -> u64 {
    if old_distance == 0 {
        return duration;
    }
    let x = (new_distance as f64 / old_distance as f64).abs();
    let index = (NB_SAMPLES as f64 * x) as usize;
    if index < NB_SAMPLES {
        let x_inf = index as f64 / NB_SAMPLES as f64;
        let x_sup = (index + 1) as f64 / NB_SAMPLES as f64;
        let t_inf = SPLINE.time[index];
        let t_sup = SPLINE.time[index + 1];
        let time_coef = t_inf + (x - x_inf) / (x_sup - x_inf) * (t_sup - t_inf);
        (duration as f64 * time_coef) as u64
    } else {
        duration
    }
}

/// Density-dependent fling calculator.
#[derive(Debug, Clone, Copy)]
pub struct Fling {
    physical_coeff: f64,
}

impl Fling {
    pub fn new(density: f64) -> Self {
        let ppi = density * 160.0;
        Self {
            physical_coeff: GRAVITY_EARTH * INCHES_PER_METER * ppi * TOUCH_TUNING,
        }
    }

    fn spline_deceleration(&self, velocity: f64) -> f64 {
        (INFLEXION * velocity.abs() / (FLING_FRICTION * self.physical_coeff)).ln()
    }

    /// Duration in milliseconds of an unconstrained fling.
    pub fn spline_duration(&self, velocity: f64) -> u64 {
        if velocity == 0.0 {
            return 0;
        }
        let l = self.spline_deceleration(velocity);
        (1000.0 * (l / (DECELERATION_RATE - 1.0)).exp()) as u64
    }

    /// Unsigned travel distance in pixels of an unconstrained fling.
    pub fn spline_distance(&self, velocity: f64) -> f64 {
        if velocity == 0.0 {
            return 0.0;
        }
        let l = self.spline_deceleration(velocity);
        FLING_FRICTION
            * self.physical_coeff
            * (DECELERATION_RATE / (DECELERATION_RATE - 1.0) * l).exp()
    }

    /// Plan one axis: signed distance clamped to `[min, max]`.
    pub fn plan_axis(&self, velocity: f64, min: i32, max: i32) -> AxisFling {
        let mut distance = (self.spline_distance(velocity) * velocity.signum()) as i32;
        let mut duration = self.spline_duration(velocity);
        if distance < min {
            duration = adjust_duration(distance, min, duration);
            distance = min;
        }
        if distance > max {
            duration = adjust_duration(distance, max, duration);
            distance = max;
        }
        AxisFling { distance, duration }
    }
}

/// One axis of a fling after clamping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisFling {
    pub distance: i32,
    pub duration: u64,
}

/// A two-axis fling ready to be animated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlingPlan {
    pub velocity_x: f64,
    pub velocity_y: f64,
    pub dx: i32,
    pub dy: i32,
    pub duration: u64,
}

impl FlingPlan {
    /// Returns `None` when both axes clamp to zero travel.
    #[allow(clippy::too_many_arguments)]
    pub fn start(
        fling: &Fling,
        velocity_x: f64,
        min_x: i32,
        max_x: i32,
        velocity_y: f64,
        min_y: i32,
        max_y: i32,
    ) -> Option<Self> {
        let x = fling.plan_axis(velocity_x, min_x, max_x);
        let y = fling.plan_axis(velocity_y, min_y, max_y);
        if x.distance == 0 && y.distance == 0 {
            return None;
        }
        Some(Self {
            velocity_x,
            velocity_y,
            dx: x.distance,
            dy: y.distance,
            duration: x.duration.max(y.duration),
        })
    }
}
