//! One page at a time, with the neighbours parked either side of the
//! viewport and a signed drag offset toward one of them.

use kurbo::{Point, Rect};
use log::{debug, warn};

use super::{
    LayoutHost, LayoutManager, OverScroller, PageFling, ScrollEvent, SmoothScaler, jump_bound,
    pull_edges, ready_size,
};
use crate::anim::{Animation, Interpolator};
use crate::cell::CellId;
use crate::edge::Edge;
use crate::fling::FlingPlan;
use crate::provider::{PageAdapter, PageCount};
use crate::transform::{ScaleMode, StartPosition};

const DOUBLE_TAP_SCALE_ERROR: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagerDirection {
    LeftToRight,
    RightToLeft,
}

/// Eased horizontal scroll between pages (spring back or page turn).
#[derive(Debug, Clone)]
struct SmoothScroller {
    anim: Animation,
    dx: i32,
    dy: i32,
    last_x: i32,
    last_y: i32,
}

impl SmoothScroller {
    fn new() -> Self {
        Self {
            anim: Animation::new(Interpolator::QuinticOut),
            dx: 0,
            dy: 0,
            last_x: 0,
            last_y: 0,
        }
    }

    fn start(&mut self, dx: i32, dy: i32, duration: u64) {
        self.dx = dx;
        self.dy = dy;
        self.last_x = 0;
        self.last_y = 0;
        self.anim.set_duration(duration);
        self.anim.start();
    }
}

#[derive(Debug)]
pub struct PagerLayoutManager {
    adapter: Option<PageAdapter>,
    direction: PagerDirection,
    scale_mode: ScaleMode,
    start_position: StartPosition,
    scale_value: f64,
    offset: i32,
    delta_x: i32,
    delta_y: i32,
    can_scroll_between_pages: bool,
    stop_animation_finger: bool,
    interval: i32,
    page_turn_ratio: f64,
    index: usize,
    previous: Option<CellId>,
    current: Option<CellId>,
    next: Option<CellId>,
    smooth_scroller: SmoothScroller,
    page_fling: PageFling,
    smooth_scaler: SmoothScaler,
    over_scroller: OverScroller,
}

impl PagerLayoutManager {
    /// `page_turn_ratio` is the fraction of `interval` a released drag must
    /// exceed to turn the page.
    pub fn new(
        scale_mode: ScaleMode,
        start_position: StartPosition,
        scale_value: f64,
        interval: i32,
        page_turn_ratio: f64,
    ) -> Self {
        Self {
            adapter: None,
            direction: PagerDirection::RightToLeft,
            scale_mode,
            start_position,
            scale_value,
            offset: 0,
            delta_x: 0,
            delta_y: 0,
            can_scroll_between_pages: false,
            stop_animation_finger: false,
            interval,
            page_turn_ratio,
            index: 0,
            previous: None,
            current: None,
            next: None,
            smooth_scroller: SmoothScroller::new(),
            page_fling: PageFling::new(),
            smooth_scaler: SmoothScaler::new(),
            over_scroller: OverScroller::new(),
        }
    }

    pub fn direction(&self) -> PagerDirection {
        self.direction
    }

    pub fn offset(&self) -> i32 {
        self.offset
    }

    pub fn interval(&self) -> i32 {
        self.interval
    }

    pub fn previous(&self) -> Option<CellId> {
        self.previous
    }

    pub fn current(&self) -> Option<CellId> {
        self.current
    }

    pub fn next(&self) -> Option<CellId> {
        self.next
    }

    fn reset_parameters(&mut self) {
        self.offset = 0;
        self.delta_x = 0;
        self.delta_y = 0;
        self.can_scroll_between_pages = false;
        self.stop_animation_finger = false;
    }

    /// Returns whether anything was running.
    fn cancel_all_animations(&mut self) -> bool {
        let running = self.smooth_scroller.anim.is_running()
            || self.page_fling.is_running()
            || self.smooth_scaler.is_running()
            || self.over_scroller.is_running();
        self.smooth_scroller.anim.cancel();
        self.page_fling.cancel();
        self.smooth_scaler.cancel();
        self.over_scroller.cancel();
        running
    }

    fn page_count(&self) -> PageCount {
        self.adapter
            .as_ref()
            .map_or(PageCount::Wait, PageAdapter::size)
    }

    fn placement(&self) -> (ScaleMode, StartPosition, f64) {
        (self.scale_mode, self.start_position, self.scale_value)
    }

    /// Drop every bound cell and placeholder and start over on next fill.
    fn reset_layout(&mut self, host: &mut LayoutHost) {
        self.cancel_all_animations();
        host.overlay = None;
        self.remove_all_pages(host);
        self.reset_parameters();
    }

    pub fn set_direction(&mut self, host: &mut LayoutHost, direction: PagerDirection) {
        if self.direction == direction {
            return;
        }
        self.direction = direction;
        if self.adapter.is_some() {
            self.reset_layout(host);
            host.request_fill();
        }
    }

    fn apply_placement(&self, host: &mut LayoutHost) {
        let (mode, position, value) = self.placement();
        for id in [self.current, self.previous, self.next].into_iter().flatten() {
            host.cells[id]
                .transform_mut()
                .set_scale_offset(mode, position, value);
        }
    }

    pub fn set_scale_mode(&mut self, host: &mut LayoutHost, scale_mode: ScaleMode) {
        if self.scale_mode == scale_mode {
            return;
        }
        self.scale_mode = scale_mode;
        self.apply_placement(host);
    }

    pub fn set_start_position(&mut self, host: &mut LayoutHost, start_position: StartPosition) {
        if self.start_position == start_position {
            return;
        }
        self.start_position = start_position;
        self.apply_placement(host);
    }

    fn obtain_page(&mut self, host: &mut LayoutHost, index: usize) -> Option<CellId> {
        let placement = self.placement();
        let adapter = self.adapter.as_mut()?;
        Some(host.bind_cell(adapter, index, placement))
    }

    fn remove_page(&mut self, host: &mut LayoutHost, id: CellId) {
        if let Some(adapter) = self.adapter.as_mut() {
            host.release_cell(adapter, id);
        }
    }

    fn remove_all_pages(&mut self, host: &mut LayoutHost) {
        for id in [self.previous.take(), self.current.take(), self.next.take()]
            .into_iter()
            .flatten()
        {
            self.remove_page(host, id);
        }
    }

    fn left_page(&self) -> Option<CellId> {
        match self.direction {
            PagerDirection::LeftToRight => self.previous,
            PagerDirection::RightToLeft => self.next,
        }
    }

    fn right_page(&self) -> Option<CellId> {
        match self.direction {
            PagerDirection::LeftToRight => self.next,
            PagerDirection::RightToLeft => self.previous,
        }
    }

    fn layout_page(&self, host: &mut LayoutHost, id: CellId, bounds: Rect) {
        let screen = host.screen();
        let cell = &mut host.cells[id];
        if cell.layout(bounds, screen) {
            let (mode, position, value) = self.placement();
            cell.transform_mut().set_scale_offset(mode, position, value);
        }
    }

    fn page_previous(&mut self, host: &mut LayoutHost) {
        if self.index == 0 {
            return;
        }
        self.index -= 1;
        if let Some(next) = self.next.take() {
            self.remove_page(host, next);
        }
        self.next = self.current.take();
        self.current = self.previous.take();
        if self.index > 0 {
            self.previous = self.obtain_page(host, self.index - 1);
        }
    }

    fn page_next(&mut self, host: &mut LayoutHost) {
        let Some(size) = ready_size(self.page_count()) else {
            return;
        };
        if self.index >= size - 1 {
            return;
        }
        self.index += 1;
        if let Some(previous) = self.previous.take() {
            self.remove_page(host, previous);
        }
        self.previous = self.current.take();
        self.current = self.next.take();
        if self.index < size - 1 {
            self.next = self.obtain_page(host, self.index + 1);
        }
    }

    fn turn_left(&mut self, host: &mut LayoutHost) {
        match self.direction {
            PagerDirection::LeftToRight => self.page_previous(host),
            PagerDirection::RightToLeft => self.page_next(host),
        }
    }

    fn turn_right(&mut self, host: &mut LayoutHost) {
        match self.direction {
            PagerDirection::LeftToRight => self.page_next(host),
            PagerDirection::RightToLeft => self.page_previous(host),
        }
    }

    /// Move the drag offset by `dx`, turning the page when a neighbour
    /// becomes fully shown. Returns the distance not consumed.
    fn scroll_between_pages(&mut self, host: &mut LayoutHost, dx: i32) -> i32 {
        let left = self.left_page();
        let right = self.right_page();
        let width = host.width;
        if dx < 0 {
            let limit = if left.is_none() {
                0
            } else {
                width + self.interval
            };
            if dx > self.offset - limit {
                self.offset -= dx;
                0
            } else {
                if left.is_some() {
                    self.turn_left(host);
                }
                let remain = dx + limit - self.offset;
                self.offset = 0;
                remain
            }
        } else {
            let limit = if right.is_none() {
                0
            } else {
                -width - self.interval
            };
            if dx < self.offset - limit {
                self.offset -= dx;
                0
            } else {
                if right.is_some() {
                    self.turn_right(host);
                }
                let remain = dx + limit - self.offset;
                self.offset = 0;
                remain
            }
        }
    }

    fn over_scroll_edge(&mut self, host: &mut LayoutHost, dx: i32, dy: i32, x: f64, y: f64) {
        self.delta_x += dx;
        self.delta_y += dy;
        let vertical = self
            .current
            .is_some_and(|id| host.cells[id].transform_mut().can_fling_vertically());
        pull_edges(
            &mut host.edge,
            (self.delta_x, self.delta_y),
            (x, y),
            vertical,
        );
    }

    fn scroll_internal(&mut self, host: &mut LayoutHost, dx: f64, dy: f64, x: f64, y: f64) {
        let Some(current) = self.current else {
            return;
        };
        let mut need_fill = false;
        let mut can_image_scroll = true;
        let mut remain_x = dx as i32;
        let mut remain_y = dy as i32;

        if host.take_first_scroll() {
            self.can_scroll_between_pages = dx.abs() > dy.abs() * 1.5;
        }

        while remain_x != 0 || remain_y != 0 {
            if self.offset == 0 && can_image_scroll {
                // The page may have turned; always scroll the current one.
                let id = self.current.unwrap_or(current);
                (remain_x, remain_y) = host.cells[id].transform_mut().scroll(remain_x, remain_y);
                can_image_scroll = false;
                self.delta_x = 0;
                self.delta_y = 0;
            } else if remain_x == 0
                || (self.left_page().is_none() && self.offset == 0 && remain_x < 0)
                || (self.right_page().is_none() && self.offset == 0 && remain_x > 0)
            {
                self.over_scroll_edge(host, remain_x, remain_y, x, y);
                remain_x = 0;
                remain_y = 0;
            } else if self.can_scroll_between_pages {
                remain_x = self.scroll_between_pages(host, remain_x);
                can_image_scroll = true;
                need_fill = true;
                self.delta_x = 0;
                self.delta_y = 0;
            } else {
                remain_x = 0;
                remain_y = 0;
                self.delta_x = 0;
                self.delta_y = 0;
            }
        }

        if need_fill {
            host.request_fill();
        }
    }

    fn update_smooth_scroll(&mut self, host: &mut LayoutHost, now: u64) -> bool {
        let Some(tick) = self.smooth_scroller.anim.calculate(now) else {
            return false;
        };
        let x = (self.smooth_scroller.dx as f64 * tick.progress) as i32;
        let y = (self.smooth_scroller.dy as f64 * tick.progress) as i32;
        let mut offset_x = x - self.smooth_scroller.last_x;
        while offset_x != 0 {
            let old = offset_x;
            offset_x = self.scroll_between_pages(host, offset_x);
            if offset_x == old {
                break;
            }
            host.request_fill();
        }
        self.smooth_scroller.last_x = x;
        self.smooth_scroller.last_y = y;
        !tick.finished
    }

    fn update_fling(&mut self, host: &mut LayoutHost, now: u64) -> bool {
        let Some(step) = self.page_fling.step(now) else {
            return false;
        };
        if let Some(id) = self.current
            && (step.dx != 0 || step.dy != 0)
        {
            host.cells[id].transform_mut().scroll(-step.dx, -step.dy);
        }
        if step.finished {
            self.on_fling_finish(host);
        }
        !step.finished
    }

    fn on_fling_finish(&mut self, host: &mut LayoutHost) {
        let Some(id) = self.current else {
            return;
        };
        let (velocity_x, velocity_y) = self.page_fling.velocity();
        let no_left = self.left_page().is_none();
        let no_right = self.right_page().is_none();
        let edge = &mut host.edge;
        let transform = host.cells[id].transform_mut();
        if transform.can_fling_horizontally() {
            if velocity_x > 0.0
                && no_left
                && transform.max_dx() == 0
                && edge.is_finished(Edge::Left)
            {
                edge.on_absorb(velocity_x, Edge::Left);
            } else if velocity_x < 0.0
                && no_right
                && transform.min_dx() == 0
                && edge.is_finished(Edge::Right)
            {
                edge.on_absorb(-velocity_x, Edge::Right);
            }
        }
        if transform.can_fling_vertically() {
            if velocity_y > 0.0 && transform.max_dy() == 0 && edge.is_finished(Edge::Top) {
                edge.on_absorb(velocity_y, Edge::Top);
            } else if velocity_y < 0.0
                && transform.min_dy() == 0
                && edge.is_finished(Edge::Bottom)
            {
                edge.on_absorb(-velocity_y, Edge::Bottom);
            }
        }
    }

    fn update_smooth_scale(&mut self, host: &mut LayoutHost, now: u64) -> bool {
        let Some(step) = self.smooth_scaler.step(now) else {
            return false;
        };
        if let Some(id) = self.current {
            host.cells[id]
                .transform_mut()
                .scale(step.focus_x, step.focus_y, step.factor);
            self.scale_value = step.scale;
        }
        !step.finished
    }
}

impl LayoutManager for PagerLayoutManager {
    fn on_attach(&mut self, adapter: PageAdapter) {
        assert!(
            self.adapter.is_none(),
            "pager layout manager is already attached"
        );
        debug!("pager: attach at index {}", self.index);
        self.adapter = Some(adapter);
        self.reset_parameters();
    }

    fn on_detach(&mut self, host: &mut LayoutHost) -> PageAdapter {
        assert!(self.adapter.is_some(), "pager layout manager is not attached");
        self.cancel_all_animations();
        host.overlay = None;
        self.remove_all_pages(host);
        debug!("pager: detach at index {}", self.index);
        let Some(adapter) = self.adapter.take() else {
            panic!("pager layout manager is not attached");
        };
        adapter
    }

    fn is_attached(&self) -> bool {
        self.adapter.is_some()
    }

    fn adapter_mut(&mut self) -> Option<&mut PageAdapter> {
        self.adapter.as_mut()
    }

    fn on_fill(&mut self, host: &mut LayoutHost) {
        assert!(self.adapter.is_some(), "pager layout manager is not attached");
        let error = self.adapter.as_ref().and_then(PageAdapter::error);
        let Some(size) = host.show_gallery_state(self.page_count(), error) else {
            self.remove_all_pages(host);
            return;
        };

        if self.index >= size {
            warn!("pager: index {} out of range, size = {size}", self.index);
            self.index = size - 1;
            self.remove_all_pages(host);
        }
        let index = self.index;

        if self.current.is_none() {
            self.current = self.obtain_page(host, index);
        }
        if self.previous.is_none() && index > 0 {
            self.previous = self.obtain_page(host, index - 1);
        } else if index == 0
            && let Some(previous) = self.previous.take()
        {
            self.remove_page(host, previous);
        }
        if self.next.is_none() && index < size - 1 {
            self.next = self.obtain_page(host, index + 1);
        } else if index == size - 1
            && let Some(next) = self.next.take()
        {
            self.remove_page(host, next);
        }

        let width = host.width;
        let height = host.height;
        let interval = self.interval;
        let left = self.left_page();
        let right = self.right_page();

        let min = if right.is_none() {
            0
        } else {
            (-width - interval + 1).min(0)
        };
        let max = if left.is_none() {
            0
        } else {
            (width + interval - 1).max(0)
        };
        self.offset = self.offset.clamp(min, max);

        let offset = self.offset as f64;
        let (w, h, gap) = (width as f64, height as f64, interval as f64);
        if let Some(id) = self.current {
            self.layout_page(host, id, Rect::new(offset, 0.0, w + offset, h));
        }
        if let Some(id) = left {
            self.layout_page(host, id, Rect::new(-gap - w + offset, 0.0, -gap + offset, h));
        }
        if let Some(id) = right {
            self.layout_page(
                host,
                id,
                Rect::new(w + gap + offset, 0.0, w + gap + w + offset, h),
            );
        }
    }

    fn on_down(&mut self, _host: &mut LayoutHost) {
        self.delta_x = 0;
        self.delta_y = 0;
        self.stop_animation_finger = self.cancel_all_animations();
    }

    fn on_up(&mut self, host: &mut LayoutHost) {
        host.edge.release_all();
        if self.current.is_none() || self.offset == 0 {
            return;
        }
        let width = host.width;
        let span = width + self.interval;
        let threshold = (self.interval as f64 * self.page_turn_ratio) as i32;
        let dx = if self.offset >= threshold && self.left_page().is_some() {
            self.offset - span
        } else if self.offset <= -threshold && self.right_page().is_some() {
            self.offset + span
        } else {
            self.offset
        };
        let page_delta = 7.0 * self.offset.abs() as f64 / span.max(1) as f64;
        let duration = ((page_delta + 1.0) * 100.0) as u64;
        self.smooth_scroller.start(dx, 0, duration);
    }

    fn on_double_tap_confirmed(&mut self, host: &mut LayoutHost, x: f64, y: f64) {
        let Some(id) = self.current else {
            return;
        };
        let transform = host.cells[id].transform();
        if !transform.is_loaded() {
            return;
        }
        let Some(scales) = transform.canonical_scales() else {
            return;
        };
        let scale = transform.current_scale();
        let end = scales
            .iter()
            .copied()
            .find(|&value| scale < value - DOUBLE_TAP_SCALE_ERROR)
            .unwrap_or(scales[0]);
        self.smooth_scaler.start((x, y), scale, end);
    }

    fn on_scroll(&mut self, host: &mut LayoutHost, event: ScrollEvent) {
        self.scroll_internal(host, event.dx, event.dy, event.x, event.y);
    }

    fn on_fling(&mut self, host: &mut LayoutHost, velocity_x: f64, velocity_y: f64) {
        let Some(id) = self.current else {
            return;
        };
        if self.offset != 0 {
            return;
        }
        let transform = host.cells[id].transform_mut();
        if !transform.is_loaded() || !transform.can_fling() {
            return;
        }
        let plan = FlingPlan::start(
            &host.fling,
            velocity_x.trunc(),
            transform.min_dx(),
            transform.max_dx(),
            velocity_y.trunc(),
            transform.min_dy(),
            transform.max_dy(),
        );
        if let Some(plan) = plan {
            self.page_fling.start(plan);
        }
    }

    fn can_scale(&self, host: &LayoutHost) -> bool {
        self.offset == 0
            && self
                .current
                .is_some_and(|id| host.cells[id].transform().is_loaded())
    }

    fn on_scale(&mut self, host: &mut LayoutHost, focus_x: f64, focus_y: f64, factor: f64) {
        let Some(id) = self.current else {
            return;
        };
        let transform = host.cells[id].transform_mut();
        if !transform.is_loaded() {
            return;
        }
        transform.scale(focus_x, focus_y, factor);
        self.scale_value = transform.current_scale();
    }

    fn on_update_animation(&mut self, host: &mut LayoutHost, now: u64) -> bool {
        let mut invalidate = self.update_smooth_scroll(host, now);
        invalidate |= self.update_fling(host, now);
        invalidate |= self.update_smooth_scale(host, now);
        invalidate |= self.over_scroller.update(host, now);
        invalidate
    }

    fn on_data_changed(&mut self, host: &mut LayoutHost) {
        assert!(self.adapter.is_some(), "pager layout manager is not attached");
        self.reset_layout(host);
        host.request_fill();
    }

    fn on_page_left(&mut self, host: &mut LayoutHost) {
        let Some(size) = ready_size(self.page_count()) else {
            return;
        };
        if self.current.is_none() {
            return;
        }
        match self.direction {
            PagerDirection::LeftToRight => {
                if self.index == 0 {
                    self.over_scroller.start(host, Edge::Left);
                } else {
                    self.set_current_index(host, self.index - 1);
                }
            }
            PagerDirection::RightToLeft => {
                if self.index >= size - 1 {
                    self.over_scroller.start(host, Edge::Left);
                    host.transfer_end = true;
                } else {
                    self.set_current_index(host, self.index + 1);
                }
            }
        }
    }

    fn on_page_right(&mut self, host: &mut LayoutHost) {
        let Some(size) = ready_size(self.page_count()) else {
            return;
        };
        if self.current.is_none() {
            return;
        }
        match self.direction {
            PagerDirection::LeftToRight => {
                if self.index >= size - 1 {
                    self.over_scroller.start(host, Edge::Right);
                    host.transfer_end = true;
                } else {
                    self.set_current_index(host, self.index + 1);
                }
            }
            PagerDirection::RightToLeft => {
                if self.index == 0 {
                    self.over_scroller.start(host, Edge::Right);
                } else {
                    self.set_current_index(host, self.index - 1);
                }
            }
        }
    }

    fn is_tap_or_press_enabled(&self) -> bool {
        !self.stop_animation_finger
    }

    fn find_cell_by_index(&self, host: &LayoutHost, index: usize) -> Option<CellId> {
        [self.current, self.previous, self.next]
            .into_iter()
            .flatten()
            .find(|&id| host.cells[id].index() == Some(index))
    }

    fn current_index(&self, host: &LayoutHost) -> Option<usize> {
        self.current.and_then(|id| host.cells[id].index())
    }

    fn set_current_index(&mut self, host: &mut LayoutHost, index: usize) {
        let size = jump_bound(self.page_count());
        if index == self.index || index >= size {
            return;
        }
        if self.current.is_none() {
            self.index = index;
        } else if index + 1 == self.index {
            self.cancel_all_animations();
            self.reset_parameters();
            self.page_previous(host);
            host.request_fill();
        } else if index == self.index + 1 {
            self.cancel_all_animations();
            self.reset_parameters();
            self.page_next(host);
            host.request_fill();
        } else {
            self.index = index;
            self.reset_layout(host);
            host.request_fill();
        }
    }

    fn index_under(&self, host: &LayoutHost, x: f64, y: f64) -> Option<usize> {
        let current = self.current?;
        let point = Point::new((x as i32) as f64, (y as i32) as f64);
        [Some(current), self.previous, self.next]
            .into_iter()
            .flatten()
            .find(|&id| host.cells[id].bounds().contains(point))
            .and_then(|id| host.cells[id].index())
    }

    fn internal_current_index(&self, host: &LayoutHost) -> usize {
        self.current_index(host).unwrap_or(self.index)
    }

    fn cells(&self) -> Vec<CellId> {
        [self.previous, self.current, self.next]
            .into_iter()
            .flatten()
            .collect()
    }

    fn set_interval(&mut self, host: &mut LayoutHost, interval: i32) {
        if self.interval == interval {
            return;
        }
        if self.adapter.is_some() {
            let index = self.internal_current_index(host);
            let adapter = self.on_detach(host);
            self.interval = interval;
            self.on_attach(adapter);
            self.set_current_index(host, index);
            host.request_fill();
        } else {
            self.interval = interval;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::Overlay;
    use crate::layout::testing::{self, Fixture, deliver, fixture, preload};

    const W: i32 = 1000;
    const H: i32 = 1000;

    fn attached(count: PageCount) -> (PagerLayoutManager, Fixture) {
        let (mut f, adapter) = fixture(count, W, H);
        let mut pager = PagerLayoutManager::new(
            ScaleMode::Fit,
            StartPosition::TopLeft,
            1.0,
            48,
            0.5,
        );
        pager.set_direction(&mut f.host, PagerDirection::LeftToRight);
        pager.on_attach(adapter);
        (pager, f)
    }

    fn indices(pager: &PagerLayoutManager, f: &Fixture) -> [Option<usize>; 3] {
        [pager.previous, pager.current, pager.next]
            .map(|id| id.and_then(|id| f.host.cells[id].index()))
    }

    fn drag(pager: &mut PagerLayoutManager, f: &mut Fixture, dx: f64) {
        pager.on_down(&mut f.host);
        f.host.first_scroll = true;
        pager.on_scroll(
            &mut f.host,
            ScrollEvent {
                dx,
                dy: 0.0,
                total_x: dx,
                total_y: 0.0,
                x: 500.0,
                y: 500.0,
            },
        );
    }

    fn run(pager: &mut PagerLayoutManager, f: &mut Fixture, from: u64, to: u64) {
        let mut now = from;
        while now <= to {
            pager.on_update_animation(&mut f.host, now);
            if f.host.is_fill_requested() {
                pager.force_fill(&mut f.host);
            }
            now += 16;
        }
    }

    #[test]
    fn wait_shows_progress_only() {
        let (mut pager, mut f) = attached(PageCount::Wait);
        pager.on_fill(&mut f.host);
        assert!(pager.cells().is_empty());
        assert_eq!(f.host.overlay(), Some(&Overlay::Progress));
    }

    #[test]
    fn boundaries_have_no_neighbour() {
        let (mut pager, mut f) = attached(PageCount::Ready(5));
        pager.on_fill(&mut f.host);
        assert_eq!(indices(&pager, &f), [None, Some(0), Some(1)]);

        pager.set_current_index(&mut f.host, 4);
        pager.on_fill(&mut f.host);
        assert_eq!(indices(&pager, &f), [Some(3), Some(4), None]);
        assert_eq!(f.host.cells.in_use(), 2);
    }

    #[test]
    fn adjacent_jump_slides_window() {
        let (mut pager, mut f) = attached(PageCount::Ready(5));
        pager.set_current_index(&mut f.host, 2);
        pager.on_fill(&mut f.host);
        let old_next = pager.next;
        pager.set_current_index(&mut f.host, 3);
        assert_eq!(pager.current, old_next);
        pager.on_fill(&mut f.host);
        assert_eq!(indices(&pager, &f), [Some(2), Some(3), Some(4)]);
        assert_eq!(f.host.cells.in_use(), 3);
    }

    #[test]
    fn fill_is_idempotent() {
        let (mut pager, mut f) = attached(PageCount::Ready(3));
        pager.set_current_index(&mut f.host, 1);
        pager.on_fill(&mut f.host);
        let before: Vec<_> = pager.cells().iter().map(|&id| f.host.cells[id].bounds()).collect();
        pager.on_fill(&mut f.host);
        let after: Vec<_> = pager.cells().iter().map(|&id| f.host.cells[id].bounds()).collect();
        assert_eq!(before, after);
        assert_eq!(
            f.host.cells[pager.current.unwrap()].bounds(),
            Rect::new(0.0, 0.0, 1000.0, 1000.0)
        );
        // Left neighbour sits one gap off screen.
        assert_eq!(
            f.host.cells[pager.previous.unwrap()].bounds(),
            Rect::new(-1048.0, 0.0, -48.0, 1000.0)
        );
    }

    #[test]
    fn shrinking_to_index_zero_drops_previous() {
        let (mut pager, mut f) = attached(PageCount::Ready(5));
        pager.set_current_index(&mut f.host, 3);
        pager.on_fill(&mut f.host);
        *f.count.lock().unwrap() = PageCount::Ready(1);
        pager.on_fill(&mut f.host);
        assert_eq!(indices(&pager, &f), [None, Some(0), None]);
        assert_eq!(f.host.cells.in_use(), 1);
    }

    #[test]
    fn page_left_at_start_overscrolls() {
        let (mut pager, mut f) = attached(PageCount::Ready(5));
        pager.on_fill(&mut f.host);
        pager.on_page_left(&mut f.host);
        assert_eq!(pager.current_index(&f.host), Some(0));
        assert!(pager.on_update_animation(&mut f.host, 0));
        assert!(pager.on_update_animation(&mut f.host, 100));
        assert!(!f.host.edge.is_finished(Edge::Left));
        assert!(!f.host.take_transfer_end());
    }

    #[test]
    fn page_right_past_end_transfers() {
        let (mut pager, mut f) = attached(PageCount::Ready(2));
        pager.on_fill(&mut f.host);
        pager.on_page_right(&mut f.host);
        pager.on_fill(&mut f.host);
        assert_eq!(pager.current_index(&f.host), Some(1));
        pager.on_page_right(&mut f.host);
        assert!(f.host.take_transfer_end());
    }

    #[test]
    fn right_to_left_mirrors_neighbours() {
        let (mut pager, mut f) = attached(PageCount::Ready(3));
        pager.set_direction(&mut f.host, PagerDirection::RightToLeft);
        pager.set_current_index(&mut f.host, 1);
        pager.on_fill(&mut f.host);
        let next = pager.next.unwrap();
        assert!(f.host.cells[next].bounds().x1 <= 0.0);
        pager.on_page_left(&mut f.host);
        assert_eq!(pager.current_index(&f.host), Some(2));
    }

    #[test]
    fn short_drag_springs_back() {
        let (mut pager, mut f) = attached(PageCount::Ready(3));
        pager.set_current_index(&mut f.host, 1);
        pager.on_fill(&mut f.host);
        // Drag toward the left neighbour by less than half the gap.
        drag(&mut pager, &mut f, -20.0);
        assert_eq!(pager.offset(), 20);
        pager.on_up(&mut f.host);
        run(&mut pager, &mut f, 0, 1000);
        assert_eq!(pager.offset(), 0);
        assert_eq!(pager.current_index(&f.host), Some(1));
    }

    #[test]
    fn long_drag_turns_page() {
        let (mut pager, mut f) = attached(PageCount::Ready(3));
        pager.set_current_index(&mut f.host, 1);
        pager.on_fill(&mut f.host);
        drag(&mut pager, &mut f, 300.0);
        assert_eq!(pager.offset(), -300);
        pager.on_up(&mut f.host);
        run(&mut pager, &mut f, 0, 1000);
        assert_eq!(pager.offset(), 0);
        assert_eq!(pager.current_index(&f.host), Some(2));
    }

    #[test]
    fn vertical_first_scroll_locks_pages() {
        let (mut pager, mut f) = attached(PageCount::Ready(3));
        pager.on_fill(&mut f.host);
        pager.on_down(&mut f.host);
        f.host.first_scroll = true;
        pager.on_scroll(
            &mut f.host,
            ScrollEvent {
                dx: 10.0,
                dy: 100.0,
                total_x: 10.0,
                total_y: 100.0,
                x: 0.0,
                y: 0.0,
            },
        );
        assert_eq!(pager.offset(), 0);
    }

    #[test]
    fn double_tap_cycles_canonical_scales() {
        let (mut pager, mut f) = attached(PageCount::Ready(1));
        // Canonical scales are 1, 2, 4 and 8 for this page.
        preload(&f.notifier, 0, 500, 250);
        pager.on_fill(&mut f.host);
        let id = pager.current.unwrap();
        assert_eq!(f.host.cells[id].transform().current_scale(), 2.0);

        let mut now = 0;
        for expected in [4.0, 8.0, 1.0] {
            pager.on_double_tap_confirmed(&mut f.host, 500.0, 500.0);
            run(&mut pager, &mut f, now, now + 400);
            now += 500;
            let scale = f.host.cells[id].transform().current_scale();
            assert!((scale - expected).abs() < 1e-6, "{scale} != {expected}");
        }
    }

    #[test]
    fn pinch_needs_loaded_page() {
        let (mut pager, mut f) = attached(PageCount::Ready(2));
        pager.on_fill(&mut f.host);
        assert!(!pager.can_scale(&f.host));
        preload(&f.notifier, 0, 1000, 1000);
        deliver(&mut pager, &mut f.host);
        assert!(pager.can_scale(&f.host));
        pager.on_scale(&mut f.host, 0.0, 0.0, 1.5);
        let id = pager.current.unwrap();
        assert_eq!(f.host.cells[id].transform().current_scale(), 1.5);
        assert_eq!(pager.scale_value, 1.5);
    }

    #[test]
    fn index_under_prefers_current() {
        let (mut pager, mut f) = attached(PageCount::Ready(3));
        pager.set_current_index(&mut f.host, 1);
        pager.on_fill(&mut f.host);
        assert_eq!(pager.index_under(&f.host, 10.0, 10.0), Some(1));
        assert_eq!(pager.index_under(&f.host, -500.0, 10.0), Some(0));
        assert_eq!(pager.index_under(&f.host, -20.0, 10.0), None);
    }

    #[test]
    fn interval_change_keeps_index() {
        let (mut pager, mut f) = attached(PageCount::Ready(5));
        pager.set_current_index(&mut f.host, 3);
        pager.on_fill(&mut f.host);
        pager.set_interval(&mut f.host, 10);
        pager.on_fill(&mut f.host);
        assert_eq!(pager.current_index(&f.host), Some(3));
        assert_eq!(pager.interval(), 10);
    }

    #[test]
    #[should_panic(expected = "already attached")]
    fn double_attach_panics() {
        let (mut pager, _f) = attached(PageCount::Ready(1));
        let (adapter, _, _) = testing::adapter(PageCount::Ready(1));
        pager.on_attach(adapter);
    }
}
