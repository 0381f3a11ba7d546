//! Touch event normalisation.
//!
//! Folds three detectors into one state machine: a pinch detector, a
//! tap/scroll/fling detector and a plain down/up tracker. Pure logic, no
//! clocks: every event carries its own timestamp and pending timers (tap
//! confirmation, long press) fire from [`GestureRecognizer::tick`].

use kurbo::{Point, Vec2};

const DOUBLE_TAP_TIMEOUT: u64 = 300;
const DOUBLE_TAP_MIN_TIME: u64 = 40;
const LONG_PRESS_TIMEOUT: u64 = 500;
const VELOCITY_HORIZON: u64 = 100;

const TOUCH_SLOP_DP: f64 = 8.0;
const DOUBLE_TAP_SLOP_DP: f64 = 100.0;
const MIN_FLING_VELOCITY_DP: f64 = 50.0;
const MAX_FLING_VELOCITY_DP: f64 = 8000.0;
const MIN_SCALING_SPAN_MM: f64 = 27.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TouchKind {
    Down,
    PointerDown,
    Move,
    /// A secondary pointer left; the index refers to `pointers`.
    PointerUp(usize),
    Up,
    Cancel,
}

/// One raw pointer event. `pointers` holds every pointer still touching,
/// including the one that is lifting for `PointerUp`/`Up`.
#[derive(Debug, Clone, PartialEq)]
pub struct TouchEvent {
    pub kind: TouchKind,
    pub time: u64,
    pub pointers: Vec<Point>,
}

impl TouchEvent {
    pub fn new(kind: TouchKind, time: u64, pointers: Vec<Point>) -> Self {
        Self {
            kind,
            time,
            pointers,
        }
    }

    pub fn single(kind: TouchKind, time: u64, x: f64, y: f64) -> Self {
        Self::new(kind, time, vec![Point::new(x, y)])
    }

    fn position(&self) -> Point {
        self.pointers.first().copied().unwrap_or(Point::ORIGIN)
    }

    fn active(&self) -> impl Iterator<Item = Point> + '_ {
        let skip = match self.kind {
            TouchKind::PointerUp(i) => Some(i),
            _ => None,
        };
        self.pointers
            .iter()
            .enumerate()
            .filter(move |(i, _)| Some(*i) != skip)
            .map(|(_, p)| *p)
    }

    fn focus(&self) -> Point {
        let mut sum = Vec2::ZERO;
        let mut n = 0;
        for p in self.active() {
            sum += p.to_vec2();
            n += 1;
        }
        if n == 0 {
            return Point::ORIGIN;
        }
        (sum / n as f64).to_point()
    }

    fn span(&self, focus: Point) -> f64 {
        let mut dev = Vec2::ZERO;
        let mut n = 0;
        for p in self.active() {
            dev.x += (p.x - focus.x).abs();
            dev.y += (p.y - focus.y).abs();
            n += 1;
        }
        if n == 0 {
            return 0.0;
        }
        let avg = dev / n as f64;
        (avg * 2.0).length()
    }

    fn active_count(&self) -> usize {
        self.active().count()
    }
}

/// Semantic gestures. Scroll deltas are distances scrolled (previous focus
/// minus current focus); fling velocities are positive toward growing
/// coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Gesture {
    Down { x: f64, y: f64 },
    Up,
    PointerDown { x: f64, y: f64 },
    PointerUp,
    SingleTapUp { x: f64, y: f64 },
    SingleTapConfirmed { x: f64, y: f64 },
    DoubleTap { x: f64, y: f64 },
    DoubleTapConfirmed { x: f64, y: f64 },
    LongPress { x: f64, y: f64 },
    Scroll {
        dx: f64,
        dy: f64,
        total_x: f64,
        total_y: f64,
        x: f64,
        y: f64,
    },
    Fling { velocity_x: f64, velocity_y: f64 },
    ScaleBegin { focus_x: f64, focus_y: f64 },
    Scale { focus_x: f64, focus_y: f64, factor: f64 },
    ScaleEnd,
}

#[derive(Debug, Default)]
struct VelocityTracker {
    samples: Vec<(u64, Point)>,
}

impl VelocityTracker {
    fn clear(&mut self) {
        self.samples.clear();
    }

    fn add(&mut self, time: u64, p: Point) {
        self.samples.push((time, p));
        let horizon = time.saturating_sub(VELOCITY_HORIZON);
        self.samples.retain(|(t, _)| *t >= horizon);
    }

    /// Pixels per second.
    fn velocity(&self) -> Vec2 {
        match (self.samples.first(), self.samples.last()) {
            (Some((t0, p0)), Some((t1, p1))) if t1 > t0 => {
                (*p1 - *p0) * (1000.0 / (t1 - t0) as f64)
            }
            _ => Vec2::ZERO,
        }
    }
}

#[derive(Debug, Default)]
struct ScaleState {
    in_progress: bool,
    initial_span: f64,
    prev_span: f64,
}

pub struct GestureRecognizer {
    touch_slop_sq: f64,
    double_tap_slop_sq: f64,
    min_fling_velocity: f64,
    max_fling_velocity: f64,
    span_slop: f64,
    min_span: f64,

    still_down: bool,
    current_down: Option<(Point, u64)>,
    previous_up: Option<u64>,
    down_focus: Point,
    last_focus: Point,
    always_in_tap_region: bool,
    always_in_bigger_tap_region: bool,
    is_double_tapping: bool,
    in_long_press: bool,
    defer_confirm_single_tap: bool,
    tap_deadline: Option<u64>,
    long_press_deadline: Option<u64>,
    velocity: VelocityTracker,
    scale: ScaleState,
}

impl GestureRecognizer {
    pub fn new(density: f64) -> Self {
        let touch_slop = TOUCH_SLOP_DP * density;
        let double_tap_slop = DOUBLE_TAP_SLOP_DP * density;
        Self {
            touch_slop_sq: touch_slop * touch_slop,
            double_tap_slop_sq: double_tap_slop * double_tap_slop,
            min_fling_velocity: MIN_FLING_VELOCITY_DP * density,
            max_fling_velocity: MAX_FLING_VELOCITY_DP * density,
            span_slop: touch_slop * 2.0,
            min_span: MIN_SCALING_SPAN_MM * density * 160.0 / 25.4,
            still_down: false,
            current_down: None,
            previous_up: None,
            down_focus: Point::ORIGIN,
            last_focus: Point::ORIGIN,
            always_in_tap_region: false,
            always_in_bigger_tap_region: false,
            is_double_tapping: false,
            in_long_press: false,
            defer_confirm_single_tap: false,
            tap_deadline: None,
            long_press_deadline: None,
            velocity: VelocityTracker::default(),
            scale: ScaleState::default(),
        }
    }

    pub fn is_down(&self) -> bool {
        self.still_down
    }

    /// Abort an ongoing pinch as if the stream had been cancelled.
    pub fn cancel_scale(&mut self) -> Vec<Gesture> {
        let mut out = Vec::new();
        if self.scale.in_progress {
            self.scale.in_progress = false;
            out.push(Gesture::ScaleEnd);
        }
        self.scale.initial_span = 0.0;
        self.scale.prev_span = 0.0;
        out
    }

    /// Fire timers that are due at `now`.
    pub fn tick(&mut self, now: u64) -> Vec<Gesture> {
        let mut out = Vec::new();
        loop {
            let tap = self.tap_deadline.filter(|t| *t <= now);
            let long_press = self.long_press_deadline.filter(|t| *t <= now);
            match (tap, long_press) {
                (Some(t), Some(l)) if t <= l => self.fire_tap(&mut out),
                (Some(_), None) => self.fire_tap(&mut out),
                (_, Some(_)) => self.fire_long_press(&mut out),
                (None, None) => break,
            }
        }
        out
    }

    fn fire_tap(&mut self, out: &mut Vec<Gesture>) {
        self.tap_deadline = None;
        if self.still_down {
            self.defer_confirm_single_tap = true;
        } else if let Some((p, _)) = self.current_down {
            out.push(Gesture::SingleTapConfirmed { x: p.x, y: p.y });
        }
    }

    fn fire_long_press(&mut self, out: &mut Vec<Gesture>) {
        self.long_press_deadline = None;
        self.tap_deadline = None;
        self.defer_confirm_single_tap = false;
        self.in_long_press = true;
        if let Some((p, _)) = self.current_down {
            out.push(Gesture::LongPress { x: p.x, y: p.y });
        }
    }

    fn cancel_taps(&mut self) {
        self.tap_deadline = None;
        self.long_press_deadline = None;
        self.is_double_tapping = false;
        self.always_in_tap_region = false;
        self.always_in_bigger_tap_region = false;
        self.defer_confirm_single_tap = false;
        self.in_long_press = false;
    }

    fn is_considered_double_tap(&self, second_down: &TouchEvent) -> bool {
        let (Some((first_down, _)), Some(first_up)) = (self.current_down, self.previous_up) else {
            return false;
        };
        if !self.always_in_bigger_tap_region {
            return false;
        }
        let delta = second_down.time.saturating_sub(first_up);
        if !(DOUBLE_TAP_MIN_TIME..=DOUBLE_TAP_TIMEOUT).contains(&delta) {
            return false;
        }
        (second_down.position() - first_down).length_squared() < self.double_tap_slop_sq
    }

    /// Feed one raw event; returns the gestures it produced, due timers first.
    pub fn on_touch_event(&mut self, ev: &TouchEvent) -> Vec<Gesture> {
        let mut out = self.tick(ev.time);
        self.detect_scale(ev, &mut out);
        self.detect_gesture(ev, &mut out);
        self.detect_down_up(ev, &mut out);
        out
    }

    // -----------------------------------------------------------------------
    // Pinch
    // -----------------------------------------------------------------------

    fn detect_scale(&mut self, ev: &TouchEvent, out: &mut Vec<Gesture>) {
        match ev.kind {
            TouchKind::Down | TouchKind::Up | TouchKind::Cancel => {
                out.extend(self.cancel_scale());
            }
            TouchKind::PointerDown | TouchKind::PointerUp(_) => {
                let was_in_progress = self.scale.in_progress;
                if was_in_progress {
                    self.scale.in_progress = false;
                    out.push(Gesture::ScaleEnd);
                }
                if ev.active_count() < 2 {
                    self.scale.initial_span = 0.0;
                    self.scale.prev_span = 0.0;
                    return;
                }
                let focus = ev.focus();
                let span = ev.span(focus);
                self.scale.initial_span = span;
                self.scale.prev_span = span;
                if was_in_progress && span >= self.min_span {
                    self.scale.in_progress = true;
                    out.push(Gesture::ScaleBegin {
                        focus_x: focus.x,
                        focus_y: focus.y,
                    });
                }
            }
            TouchKind::Move => {
                if ev.active_count() < 2 {
                    return;
                }
                let focus = ev.focus();
                let span = ev.span(focus);
                if !self.scale.in_progress {
                    if span >= self.min_span
                        && (span - self.scale.initial_span).abs() > self.span_slop
                    {
                        self.scale.in_progress = true;
                        self.scale.prev_span = span;
                        out.push(Gesture::ScaleBegin {
                            focus_x: focus.x,
                            focus_y: focus.y,
                        });
                    }
                } else if self.scale.prev_span > 0.0 {
                    out.push(Gesture::Scale {
                        focus_x: focus.x,
                        focus_y: focus.y,
                        factor: span / self.scale.prev_span,
                    });
                    self.scale.prev_span = span;
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Tap / scroll / fling
    // -----------------------------------------------------------------------

    fn detect_gesture(&mut self, ev: &TouchEvent, out: &mut Vec<Gesture>) {
        let focus = ev.focus();
        match ev.kind {
            TouchKind::Down => {
                self.velocity.clear();
                self.velocity.add(ev.time, ev.position());

                let had_tap_message = self.tap_deadline.take().is_some();
                if had_tap_message && self.is_considered_double_tap(ev) {
                    self.is_double_tapping = true;
                    if let Some((p, _)) = self.current_down {
                        out.push(Gesture::DoubleTap { x: p.x, y: p.y });
                    }
                } else {
                    self.tap_deadline = Some(ev.time + DOUBLE_TAP_TIMEOUT);
                }

                self.down_focus = focus;
                self.last_focus = focus;
                self.current_down = Some((ev.position(), ev.time));
                self.always_in_tap_region = true;
                self.always_in_bigger_tap_region = true;
                self.in_long_press = false;
                self.defer_confirm_single_tap = false;
                self.long_press_deadline = Some(ev.time + LONG_PRESS_TIMEOUT);
            }
            TouchKind::PointerDown => {
                self.down_focus = focus;
                self.last_focus = focus;
                self.cancel_taps();
            }
            TouchKind::PointerUp(_) => {
                self.down_focus = focus;
                self.last_focus = focus;
            }
            TouchKind::Move => {
                self.velocity.add(ev.time, ev.position());
                if self.in_long_press || self.is_double_tapping {
                    return;
                }
                let scroll = self.last_focus - focus;
                let (total_x, total_y) = match self.current_down {
                    Some((p, _)) => (ev.position().x - p.x, ev.position().y - p.y),
                    None => (0.0, 0.0),
                };
                let at = ev.position();
                if self.always_in_tap_region {
                    let distance_sq = (focus - self.down_focus).length_squared();
                    if distance_sq > self.touch_slop_sq {
                        out.push(Gesture::Scroll {
                            dx: scroll.x,
                            dy: scroll.y,
                            total_x,
                            total_y,
                            x: at.x,
                            y: at.y,
                        });
                        self.last_focus = focus;
                        self.always_in_tap_region = false;
                        self.tap_deadline = None;
                        self.long_press_deadline = None;
                        self.always_in_bigger_tap_region = false;
                    }
                } else if scroll.x.abs() >= 1.0 || scroll.y.abs() >= 1.0 {
                    out.push(Gesture::Scroll {
                        dx: scroll.x,
                        dy: scroll.y,
                        total_x,
                        total_y,
                        x: at.x,
                        y: at.y,
                    });
                    self.last_focus = focus;
                }
            }
            TouchKind::Up => {
                self.velocity.add(ev.time, ev.position());
                let at = ev.position();
                if self.is_double_tapping {
                    out.push(Gesture::DoubleTapConfirmed { x: at.x, y: at.y });
                } else if self.in_long_press {
                    self.tap_deadline = None;
                    self.in_long_press = false;
                } else if self.always_in_tap_region {
                    out.push(Gesture::SingleTapUp { x: at.x, y: at.y });
                    if self.defer_confirm_single_tap {
                        out.push(Gesture::SingleTapConfirmed { x: at.x, y: at.y });
                    }
                } else {
                    let v = self.velocity.velocity();
                    let vx = v.x.clamp(-self.max_fling_velocity, self.max_fling_velocity);
                    let vy = v.y.clamp(-self.max_fling_velocity, self.max_fling_velocity);
                    if vx.abs() > self.min_fling_velocity || vy.abs() > self.min_fling_velocity
                    {
                        out.push(Gesture::Fling {
                            velocity_x: vx,
                            velocity_y: vy,
                        });
                    }
                }
                self.previous_up = Some(ev.time);
                self.velocity.clear();
                self.is_double_tapping = false;
                self.defer_confirm_single_tap = false;
                self.long_press_deadline = None;
            }
            TouchKind::Cancel => {
                self.tap_deadline = None;
                self.long_press_deadline = None;
                self.velocity.clear();
                self.is_double_tapping = false;
                self.always_in_tap_region = false;
                self.always_in_bigger_tap_region = false;
                self.defer_confirm_single_tap = false;
                self.in_long_press = false;
            }
        }
    }

    // -----------------------------------------------------------------------
    // Down / up
    // -----------------------------------------------------------------------

    fn set_down(&mut self, down: bool, ev: &TouchEvent, out: &mut Vec<Gesture>) {
        if down == self.still_down {
            return;
        }
        self.still_down = down;
        if down {
            let p = ev.position();
            out.push(Gesture::Down { x: p.x, y: p.y });
        } else {
            out.push(Gesture::Up);
        }
    }

    fn detect_down_up(&mut self, ev: &TouchEvent, out: &mut Vec<Gesture>) {
        match ev.kind {
            TouchKind::Down => self.set_down(true, ev, out),
            TouchKind::PointerDown => {
                let p = ev.pointers.last().copied().unwrap_or(Point::ORIGIN);
                out.push(Gesture::PointerDown { x: p.x, y: p.y });
            }
            TouchKind::Up => {
                out.push(Gesture::PointerUp);
                self.set_down(false, ev, out);
            }
            TouchKind::Cancel => self.set_down(false, ev, out),
            TouchKind::Move | TouchKind::PointerUp(_) => {}
        }
    }
}
