//! Edge glows shown when scrolling past the first or last page.

use crate::anim::FloatAnimation;

const RECEDE_DURATION: u64 = 600;
const ABSORB_FULL_VELOCITY: f64 = 8000.0;
const ABSORB_MIN_INTENSITY: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Left,
    Top,
    Right,
    Bottom,
}

impl Edge {
    pub const ALL: [Edge; 4] = [Edge::Left, Edge::Top, Edge::Right, Edge::Bottom];

    fn slot(self) -> usize {
        match self {
            Edge::Left => 0,
            Edge::Top => 1,
            Edge::Right => 2,
            Edge::Bottom => 3,
        }
    }

    fn is_vertical(self) -> bool {
        matches!(self, Edge::Left | Edge::Right)
    }
}

/// Snapshot of one glow for drawing. `position` runs along the edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Glow {
    pub edge: Edge,
    pub intensity: f64,
    pub position: f64,
}

#[derive(Debug, Clone)]
struct GlowState {
    intensity: f64,
    position: f64,
    recede: FloatAnimation,
}

impl GlowState {
    fn new() -> Self {
        Self {
            intensity: 0.0,
            position: 0.0,
            recede: FloatAnimation::new(RECEDE_DURATION),
        }
    }

    fn start_recede(&mut self) {
        if self.intensity > 0.0 && !self.recede.is_running() {
            self.recede.set_range(self.intensity, 0.0);
            self.recede.start();
        }
    }
}

#[derive(Debug, Clone)]
pub struct EdgeView {
    width: f64,
    height: f64,
    glows: [GlowState; 4],
}

impl Default for EdgeView {
    fn default() -> Self {
        Self::new()
    }
}

impl EdgeView {
    pub fn new() -> Self {
        Self {
            width: 0.0,
            height: 0.0,
            glows: std::array::from_fn(|_| GlowState::new()),
        }
    }

    pub fn set_size(&mut self, width: f64, height: f64) {
        self.width = width;
        self.height = height;
    }

    /// `distance` is the total overscroll so far, not a delta.
    pub fn on_pull(&mut self, distance: f64, position: f64, edge: Edge) {
        let extent = if edge.is_vertical() {
            self.width
        } else {
            self.height
        };
        let glow = &mut self.glows[edge.slot()];
        glow.recede.cancel();
        glow.intensity = if extent > 0.0 {
            (distance / extent).clamp(0.0, 1.0)
        } else {
            0.0
        };
        glow.position = position;
    }

    pub fn on_release(&mut self, edge: Edge) {
        self.glows[edge.slot()].start_recede();
    }

    pub fn release_all(&mut self) {
        for glow in &mut self.glows {
            glow.start_recede();
        }
    }

    /// A fling hit the edge at `velocity` px/s.
    pub fn on_absorb(&mut self, velocity: f64, edge: Edge) {
        let along = if edge.is_vertical() {
            self.height
        } else {
            self.width
        };
        let glow = &mut self.glows[edge.slot()];
        glow.recede.cancel();
        glow.intensity = (velocity.abs() / ABSORB_FULL_VELOCITY).clamp(ABSORB_MIN_INTENSITY, 1.0);
        glow.position = along / 2.0;
        glow.start_recede();
    }

    pub fn is_finished(&self, edge: Edge) -> bool {
        let glow = &self.glows[edge.slot()];
        glow.intensity <= 0.0 && !glow.recede.is_running()
    }

    /// Decay released glows. Returns `true` while any is still visible.
    pub fn update(&mut self, now: u64) -> bool {
        let mut active = false;
        for glow in &mut self.glows {
            if glow.recede.calculate(now).is_some() {
                glow.intensity = glow.recede.get();
            }
            active |= glow.intensity > 0.0;
        }
        active
    }

    pub fn glows(&self) -> Vec<Glow> {
        Edge::ALL
            .iter()
            .filter_map(|&edge| {
                let g = &self.glows[edge.slot()];
                (g.intensity > 0.0).then_some(Glow {
                    edge,
                    intensity: g.intensity,
                    position: g.position,
                })
            })
            .collect()
    }
}
