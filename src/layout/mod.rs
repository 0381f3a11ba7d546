//! Layout managers: the contract the controller drives, the state they
//! share through [`LayoutHost`], and the animation drivers both use.

mod pager;
mod scroll;

pub use pager::{PagerDirection, PagerLayoutManager};
pub use scroll::ScrollLayoutManager;

use kurbo::Size;

use crate::anim::{Animation, FloatAnimation, Interpolator};
use crate::cell::{CellId, CellPool, CellStyle};
use crate::edge::{Edge, EdgeView};
use crate::fling::{Fling, FlingPlan};
use crate::provider::{PageAdapter, PageCount};
use crate::transform::{ScaleMode, StartPosition};

const SMOOTH_SCALE_DURATION: u64 = 300;
const OVER_SCROLL_DURATION: u64 = 300;

/// Full-viewport placeholder shown instead of pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Overlay {
    Progress,
    Message(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerKind {
    Pager,
    Scroll,
}

/// One scroll step. `dx`/`dy` are distances since the previous event
/// (previous position minus current), `total_*` since the gesture began.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollEvent {
    pub dx: f64,
    pub dy: f64,
    pub total_x: f64,
    pub total_y: f64,
    pub x: f64,
    pub y: f64,
}

/// State owned by the controller that managers read and mutate.
#[derive(Debug)]
pub struct LayoutHost {
    pub(crate) width: i32,
    pub(crate) height: i32,
    pub(crate) cells: CellPool,
    pub(crate) edge: EdgeView,
    pub(crate) fling: Fling,
    pub(crate) default_error: String,
    pub(crate) empty_text: String,
    pub(crate) overlay: Option<Overlay>,
    pub(crate) request_fill: bool,
    pub(crate) enable_request_fill: bool,
    pub(crate) first_scroll: bool,
    pub(crate) transfer_end: bool,
}

impl LayoutHost {
    pub fn new(style: CellStyle, density: f64, default_error: String, empty_text: String) -> Self {
        Self {
            width: 0,
            height: 0,
            cells: CellPool::new(style),
            edge: EdgeView::new(),
            fling: Fling::new(density),
            default_error,
            empty_text,
            overlay: None,
            request_fill: false,
            enable_request_fill: true,
            first_scroll: false,
            transfer_end: false,
        }
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn screen(&self) -> Size {
        Size::new(self.width as f64, self.height as f64)
    }

    pub fn cells(&self) -> &CellPool {
        &self.cells
    }

    pub fn overlay(&self) -> Option<&Overlay> {
        self.overlay.as_ref()
    }

    pub fn set_size(&mut self, width: i32, height: i32) {
        self.width = width.max(0);
        self.height = height.max(0);
        self.edge.set_size(self.width as f64, self.height as f64);
    }

    /// Ask for a fill before the next draw. Ignored while a fill runs.
    pub fn request_fill(&mut self) {
        if self.enable_request_fill {
            self.request_fill = true;
        }
    }

    pub fn is_fill_requested(&self) -> bool {
        self.request_fill
    }

    pub(crate) fn fill_begin(&mut self) {
        self.enable_request_fill = false;
    }

    pub(crate) fn fill_end(&mut self) {
        self.enable_request_fill = true;
        self.request_fill = false;
    }

    /// Whether this is the first scroll event since the finger went down.
    /// Reading it clears the flag.
    pub fn take_first_scroll(&mut self) -> bool {
        std::mem::take(&mut self.first_scroll)
    }

    pub fn take_transfer_end(&mut self) -> bool {
        std::mem::take(&mut self.transfer_end)
    }

    /// Take a cell from the pool, place its content and bind it to `index`.
    pub(crate) fn bind_cell(
        &mut self,
        adapter: &mut PageAdapter,
        index: usize,
        placement: (ScaleMode, StartPosition, f64),
    ) -> CellId {
        let screen = self.screen();
        let id = self.cells.obtain();
        let cell = &mut self.cells[id];
        let (mode, position, value) = placement;
        cell.transform_mut().set_scale_offset(mode, position, value);
        adapter.bind(cell, index, screen);
        id
    }

    pub(crate) fn release_cell(&mut self, adapter: &mut PageAdapter, id: CellId) {
        adapter.unbind(&mut self.cells[id]);
        self.cells.release(id);
    }

    /// Show the gallery-level placeholder for `count`. Returns the page
    /// count when pages should be laid out instead.
    pub(crate) fn show_gallery_state(
        &mut self,
        count: PageCount,
        error: Option<String>,
    ) -> Option<usize> {
        match count {
            PageCount::Wait => {
                self.overlay = Some(Overlay::Progress);
                None
            }
            PageCount::Error => {
                let message = error.unwrap_or_else(|| self.default_error.clone());
                self.overlay = Some(Overlay::Message(message));
                None
            }
            PageCount::Ready(0) => {
                self.overlay = Some(Overlay::Message(self.empty_text.clone()));
                None
            }
            PageCount::Ready(size) => {
                self.overlay = None;
                Some(size)
            }
        }
    }
}

/// The operations the controller drives a layout manager through.
///
/// A manager owns the [`PageAdapter`] while attached; attaching twice or
/// detaching while unattached panics.
pub trait LayoutManager {
    fn on_attach(&mut self, adapter: PageAdapter);

    fn on_detach(&mut self, host: &mut LayoutHost) -> PageAdapter;

    fn is_attached(&self) -> bool;

    fn adapter_mut(&mut self) -> Option<&mut PageAdapter>;

    /// Bind cells and place them for the current state. Calling it twice
    /// without a state change places everything identically.
    fn on_fill(&mut self, host: &mut LayoutHost);

    /// Fill now, ignoring fill requests made meanwhile.
    fn force_fill(&mut self, host: &mut LayoutHost) {
        host.fill_begin();
        self.on_fill(host);
        host.fill_end();
    }

    fn on_down(&mut self, host: &mut LayoutHost);

    fn on_up(&mut self, host: &mut LayoutHost);

    fn on_double_tap_confirmed(&mut self, host: &mut LayoutHost, x: f64, y: f64);

    fn on_long_press(&mut self, _host: &mut LayoutHost, _x: f64, _y: f64) {}

    fn on_scroll(&mut self, host: &mut LayoutHost, event: ScrollEvent);

    fn on_fling(&mut self, host: &mut LayoutHost, velocity_x: f64, velocity_y: f64);

    fn can_scale(&self, host: &LayoutHost) -> bool;

    fn on_scale(&mut self, host: &mut LayoutHost, focus_x: f64, focus_y: f64, factor: f64);

    /// Advance running animations. Returns `true` while any still runs.
    fn on_update_animation(&mut self, host: &mut LayoutHost, now: u64) -> bool;

    fn on_data_changed(&mut self, host: &mut LayoutHost);

    fn on_page_left(&mut self, host: &mut LayoutHost);

    fn on_page_right(&mut self, host: &mut LayoutHost);

    /// `false` when the current gesture began by interrupting an animation.
    fn is_tap_or_press_enabled(&self) -> bool;

    fn find_cell_by_index(&self, host: &LayoutHost, index: usize) -> Option<CellId>;

    fn current_index(&self, host: &LayoutHost) -> Option<usize>;

    fn set_current_index(&mut self, host: &mut LayoutHost, index: usize);

    fn index_under(&self, host: &LayoutHost, x: f64, y: f64) -> Option<usize>;

    /// The visible index, or the logical one when nothing is bound.
    fn internal_current_index(&self, host: &LayoutHost) -> usize;

    /// Bound cells in draw order.
    fn cells(&self) -> Vec<CellId>;

    fn set_interval(&mut self, host: &mut LayoutHost, interval: i32);
}

/// Page count with the wait and error states read as "unbounded", for
/// jumps requested before the count is known.
pub(crate) fn jump_bound(count: PageCount) -> usize {
    match count {
        PageCount::Ready(size) if size > 0 => size,
        _ => usize::MAX,
    }
}

pub(crate) fn ready_size(count: PageCount) -> Option<usize> {
    match count {
        PageCount::Ready(size) if size > 0 => Some(size),
        _ => None,
    }
}

/// Accumulate an over-scroll drag and pull the matching glows.
pub(crate) fn pull_edges(
    edge: &mut EdgeView,
    delta: (i32, i32),
    at: (f64, f64),
    vertical: bool,
) {
    let (delta_x, delta_y) = delta;
    let (x, y) = at;
    if delta_x < 0 {
        edge.on_pull(-delta_x as f64, y, Edge::Left);
        if !edge.is_finished(Edge::Right) {
            edge.on_release(Edge::Right);
        }
    } else if delta_x > 0 {
        edge.on_pull(delta_x as f64, y, Edge::Right);
        if !edge.is_finished(Edge::Left) {
            edge.on_release(Edge::Left);
        }
    }
    if !vertical {
        return;
    }
    if delta_y < 0 {
        edge.on_pull(-delta_y as f64, x, Edge::Top);
        if !edge.is_finished(Edge::Bottom) {
            edge.on_release(Edge::Bottom);
        }
    } else if delta_y > 0 {
        edge.on_pull(delta_y as f64, x, Edge::Bottom);
        if !edge.is_finished(Edge::Top) {
            edge.on_release(Edge::Top);
        }
    }
}

// ---------------------------------------------------------------------------
// Animation drivers
// ---------------------------------------------------------------------------

/// Per-frame movement of a running fling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FlingStep {
    pub dx: i32,
    pub dy: i32,
    pub finished: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct PageFling {
    anim: Animation,
    velocity_x: f64,
    velocity_y: f64,
    dx: i32,
    dy: i32,
    last_x: i32,
    last_y: i32,
}

impl PageFling {
    pub fn new() -> Self {
        Self {
            anim: Animation::new(Interpolator::Fling),
            velocity_x: 0.0,
            velocity_y: 0.0,
            dx: 0,
            dy: 0,
            last_x: 0,
            last_y: 0,
        }
    }

    pub fn start(&mut self, plan: FlingPlan) {
        self.velocity_x = plan.velocity_x;
        self.velocity_y = plan.velocity_y;
        self.dx = plan.dx;
        self.dy = plan.dy;
        self.last_x = 0;
        self.last_y = 0;
        self.anim.set_duration(plan.duration);
        self.anim.start();
    }

    pub fn velocity(&self) -> (f64, f64) {
        (self.velocity_x, self.velocity_y)
    }

    pub fn is_running(&self) -> bool {
        self.anim.is_running()
    }

    pub fn cancel(&mut self) {
        self.anim.cancel();
    }

    pub fn step(&mut self, now: u64) -> Option<FlingStep> {
        let tick = self.anim.calculate(now)?;
        let x = (self.dx as f64 * tick.progress) as i32;
        let y = (self.dy as f64 * tick.progress) as i32;
        let step = FlingStep {
            dx: x - self.last_x,
            dy: y - self.last_y,
            finished: tick.finished,
        };
        self.last_x = x;
        self.last_y = y;
        Some(step)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ScaleStep {
    pub focus_x: f64,
    pub focus_y: f64,
    /// Relative to the previous step.
    pub factor: f64,
    pub scale: f64,
    pub finished: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct SmoothScaler {
    anim: Animation,
    focus_x: f64,
    focus_y: f64,
    start_scale: f64,
    end_scale: f64,
    last_scale: f64,
}

impl SmoothScaler {
    pub fn new() -> Self {
        let mut anim = Animation::new(Interpolator::FastSlow);
        anim.set_duration(SMOOTH_SCALE_DURATION);
        Self {
            anim,
            focus_x: 0.0,
            focus_y: 0.0,
            start_scale: 1.0,
            end_scale: 1.0,
            last_scale: 1.0,
        }
    }

    pub fn start(&mut self, focus: (f64, f64), start_scale: f64, end_scale: f64) {
        self.focus_x = focus.0;
        self.focus_y = focus.1;
        self.start_scale = start_scale;
        self.end_scale = end_scale;
        self.last_scale = start_scale;
        self.anim.start();
    }

    pub fn is_running(&self) -> bool {
        self.anim.is_running()
    }

    pub fn cancel(&mut self) {
        self.anim.cancel();
    }

    pub fn step(&mut self, now: u64) -> Option<ScaleStep> {
        let tick = self.anim.calculate(now)?;
        let scale = self.start_scale + (self.end_scale - self.start_scale) * tick.progress;
        let factor = scale / self.last_scale;
        self.last_scale = scale;
        Some(ScaleStep {
            focus_x: self.focus_x,
            focus_y: self.focus_y,
            factor,
            scale,
            finished: tick.finished,
        })
    }
}

/// Short edge pull used when a page step runs past either end.
#[derive(Debug, Clone)]
pub(crate) struct OverScroller {
    anim: FloatAnimation,
    edge: Edge,
    position: f64,
}

impl OverScroller {
    pub fn new() -> Self {
        Self {
            anim: FloatAnimation::new(OVER_SCROLL_DURATION),
            edge: Edge::Left,
            position: 0.0,
        }
    }

    pub fn start(&mut self, host: &LayoutHost, edge: Edge) {
        let (range, position) = match edge {
            Edge::Left | Edge::Right => (host.width / 7, host.height / 2),
            Edge::Top | Edge::Bottom => (host.height / 7, host.width / 2),
        };
        self.edge = edge;
        self.position = position as f64;
        self.anim.set_range(0.0, range as f64);
        self.anim.start();
    }

    pub fn is_running(&self) -> bool {
        self.anim.is_running()
    }

    pub fn cancel(&mut self) {
        self.anim.cancel();
    }

    pub fn update(&mut self, host: &mut LayoutHost, now: u64) -> bool {
        let Some(tick) = self.anim.calculate(now) else {
            return false;
        };
        host.edge.on_pull(self.anim.get(), self.position, self.edge);
        if tick.finished {
            host.edge.on_release(self.edge);
        }
        !tick.finished
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_requests_are_ignored_while_filling() {
        let mut host = LayoutHost::new(CellStyle::default(), 1.0, "E".into(), "N".into());
        host.fill_begin();
        host.request_fill();
        assert!(!host.is_fill_requested());
        host.fill_end();
        host.request_fill();
        assert!(host.is_fill_requested());
    }

    #[test]
    fn gallery_state_overlays() {
        let mut host = LayoutHost::new(CellStyle::default(), 1.0, "Error".into(), "Empty".into());
        assert_eq!(host.show_gallery_state(PageCount::Wait, None), None);
        assert_eq!(host.overlay(), Some(&Overlay::Progress));
        host.show_gallery_state(PageCount::Error, None);
        assert_eq!(host.overlay(), Some(&Overlay::Message("Error".into())));
        host.show_gallery_state(PageCount::Error, Some("gone".into()));
        assert_eq!(host.overlay(), Some(&Overlay::Message("gone".into())));
        host.show_gallery_state(PageCount::Ready(0), None);
        assert_eq!(host.overlay(), Some(&Overlay::Message("Empty".into())));
        assert_eq!(host.show_gallery_state(PageCount::Ready(3), None), Some(3));
        assert_eq!(host.overlay(), None);
    }

    #[test]
    fn over_scroller_pulls_then_releases() {
        let mut host = LayoutHost::new(CellStyle::default(), 1.0, "E".into(), "N".into());
        host.set_size(700, 1400);
        let mut over = OverScroller::new();
        over.start(&host, Edge::Left);
        assert!(over.update(&mut host, 0));
        assert!(over.update(&mut host, 150));
        assert!(!host.edge.is_finished(Edge::Left));
        assert!(!over.update(&mut host, 300));
        assert!(!over.is_running());
        // Released glows decay on later frames.
        host.edge.update(300);
        host.edge.update(2000);
        assert!(host.edge.is_finished(Edge::Left));
    }

    #[test]
    fn smooth_scaler_reaches_end_scale() {
        let mut scaler = SmoothScaler::new();
        scaler.start((0.0, 0.0), 1.0, 2.0);
        let mut product = 1.0;
        for now in [0, 100, 200, 300] {
            let step = scaler.step(now).unwrap();
            product *= step.factor;
        }
        assert!((product - 2.0).abs() < 1e-9);
        assert!(scaler.step(400).is_none());
    }

    #[test]
    fn pull_edges_skips_vertical_when_disabled() {
        let mut edge = EdgeView::new();
        edge.set_size(100.0, 100.0);
        pull_edges(&mut edge, (-10, 10), (50.0, 50.0), false);
        assert!(!edge.is_finished(Edge::Left));
        assert!(edge.is_finished(Edge::Bottom));
        pull_edges(&mut edge, (0, 10), (50.0, 50.0), true);
        assert!(!edge.is_finished(Edge::Bottom));
    }
}
