//! Continuous vertical strip of pages sharing one zoom level.
//!
//! Cells cover the viewport plus a reservation band above and below it.
//! `offset_y` is the top of the first bound cell; refills are anchored on a
//! "keep top" page so zooming and rebinding never make the view jump.

use std::collections::VecDeque;

use kurbo::{Point, Rect};
use log::{debug, warn};

use super::{
    LayoutHost, LayoutManager, OverScroller, PageFling, ScrollEvent, SmoothScaler, jump_bound,
    pull_edges, ready_size,
};
use crate::cell::CellId;
use crate::edge::Edge;
use crate::fling::FlingPlan;
use crate::provider::{PageAdapter, PageCount};
use crate::transform::{ScaleMode, StartPosition};

const RESERVATION: f64 = 1.0;
const MAX_SCALE: f64 = 2.0;
const MIN_SCALE: f64 = 1.0;
const SCALE_ERROR: f64 = 0.01;
const PLACEMENT: (ScaleMode, StartPosition, f64) = (ScaleMode::Fit, StartPosition::TopRight, 1.0);

#[derive(Debug)]
pub struct ScrollLayoutManager {
    adapter: Option<PageAdapter>,
    pages: VecDeque<CellId>,
    spare: Vec<CellId>,
    scale: f64,
    offset_x: i32,
    offset_y: i32,
    delta_x: i32,
    delta_y: i32,
    keep_top_index: Option<usize>,
    keep_top: Option<i32>,
    first_shown_index: Option<usize>,
    scroll_up: bool,
    fling_up: bool,
    stop_animation_finger: bool,
    interval: i32,
    page_fling: PageFling,
    smooth_scaler: SmoothScaler,
    over_scroller: OverScroller,
    index: usize,
}

impl ScrollLayoutManager {
    pub fn new(interval: i32) -> Self {
        Self {
            adapter: None,
            pages: VecDeque::new(),
            spare: Vec::new(),
            scale: MIN_SCALE,
            offset_x: 0,
            offset_y: 0,
            delta_x: 0,
            delta_y: 0,
            keep_top_index: None,
            keep_top: None,
            first_shown_index: None,
            scroll_up: false,
            fling_up: false,
            stop_animation_finger: false,
            interval,
            page_fling: PageFling::new(),
            smooth_scaler: SmoothScaler::new(),
            over_scroller: OverScroller::new(),
            index: 0,
        }
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn offset_x(&self) -> i32 {
        self.offset_x
    }

    pub fn offset_y(&self) -> i32 {
        self.offset_y
    }

    pub fn interval(&self) -> i32 {
        self.interval
    }

    fn reset_parameters(&mut self) {
        self.scale = MIN_SCALE;
        self.offset_x = 0;
        self.offset_y = 0;
        self.delta_x = 0;
        self.delta_y = 0;
        self.keep_top_index = None;
        self.keep_top = None;
        self.first_shown_index = None;
        self.scroll_up = false;
        self.fling_up = false;
        self.stop_animation_finger = false;
    }

    fn cancel_all_animations(&mut self) -> bool {
        let running = self.page_fling.is_running()
            || self.smooth_scaler.is_running()
            || self.over_scroller.is_running();
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

    fn obtain_page(&mut self, host: &mut LayoutHost, index: usize) -> Option<CellId> {
        let adapter = self.adapter.as_mut()?;
        Some(host.bind_cell(adapter, index, PLACEMENT))
    }

    fn remove_page(&mut self, host: &mut LayoutHost, id: CellId) {
        if let Some(adapter) = self.adapter.as_mut() {
            host.release_cell(adapter, id);
        }
    }

    fn remove_all_pages(&mut self, host: &mut LayoutHost) {
        while let Some(id) = self.pages.pop_front() {
            self.remove_page(host, id);
        }
    }

    fn reset_layout(&mut self, host: &mut LayoutHost) {
        self.cancel_all_animations();
        host.overlay = None;
        self.remove_all_pages(host);
    }

    fn find_page(&self, host: &LayoutHost, index: usize) -> Option<CellId> {
        self.pages
            .iter()
            .copied()
            .find(|&id| host.cells[id].index() == Some(index))
    }

    /// Reuse a spare cell already bound to `index`, or bind a new one.
    fn take_page(&mut self, host: &mut LayoutHost, index: usize) -> Option<CellId> {
        match self
            .spare
            .iter()
            .position(|&id| host.cells[id].index() == Some(index))
        {
            Some(pos) => Some(self.spare.remove(pos)),
            None => self.obtain_page(host, index),
        }
    }

    fn is_in_screen(host: &LayoutHost, id: CellId) -> bool {
        let height = host.height;
        let bounds = host.cells[id].bounds();
        let top = bounds.y0 as i32;
        let bottom = bounds.y1 as i32;
        (top >= 0 && top < height) || (bottom > 0 && bottom <= height) || (top < 0 && bottom > height)
    }

    fn reservation(&self) -> f64 {
        RESERVATION.max(((1.0 + 2.0 * RESERVATION) * self.scale - 1.0) / 2.0)
    }

    fn page_width(&self, host: &LayoutHost) -> i32 {
        (host.width as f64 * self.scale) as i32
    }

    fn place(&self, host: &mut LayoutHost, id: CellId, top: i32, height: i32, page_width: i32) {
        let screen = host.screen();
        let left = self.offset_x as f64;
        host.cells[id].layout(
            Rect::new(
                left,
                top as f64,
                left + page_width as f64,
                (top + height) as f64,
            ),
            screen,
        );
    }

    fn fill_pages(&mut self, host: &mut LayoutHost, size: usize, start: (usize, i32)) {
        let (mut start_index, mut start_offset) = start;
        let width = host.width;
        let height = host.height;
        let page_width = self.page_width(host);
        let interval = self.interval;
        let reservation = self.reservation();
        let min_y = (-height as f64 * reservation) as i32;
        let max_y = (height as f64 * (1.0 + reservation)) as i32;

        // Fix start index and start offset
        if start_index >= size {
            start_index = size - 1;
            start_offset = 0;
        } else if start_offset < min_y {
            loop {
                let Some(id) = self.find_page(host, start_index) else {
                    start_offset = min_y;
                    break;
                };
                let page_height = host.cells[id].height();
                if start_offset + page_height > min_y {
                    break;
                } else if start_index == size - 1 {
                    start_offset = 0;
                    break;
                }
                start_index += 1;
                start_offset += page_height + interval;
                if start_offset >= min_y {
                    break;
                }
            }
        } else if start_offset >= max_y {
            if start_index == 0 {
                start_offset = 0;
            } else {
                start_index -= 1;
                let mut start_bottom = start_offset - interval;
                loop {
                    let Some(id) = self.find_page(host, start_index) else {
                        start_offset = max_y - 1;
                        break;
                    };
                    start_offset = start_bottom - host.cells[id].height();
                    if start_offset < max_y {
                        break;
                    } else if start_index == 0 {
                        start_offset = 0;
                        break;
                    }
                    start_index -= 1;
                    start_bottom = start_offset - interval;
                }
            }
        }

        let mut spare = std::mem::take(&mut self.spare);
        spare.extend(self.pages.drain(..));
        self.spare = spare;

        let margin = page_width - width;
        if margin >= 0 {
            self.offset_x = self.offset_x.clamp(-margin, 0);
        } else {
            self.offset_x = -margin / 2;
        }

        // Start page
        let Some(id) = self.take_page(host, start_index) else {
            return;
        };
        self.pages.push_back(id);
        let measured = host.cells[id].measure_height(page_width);
        self.place(host, id, start_offset, measured, page_width);
        let mut bottom_offset = start_offset - interval;
        let mut top_offset = start_offset + measured + interval;

        // Up
        let mut index = start_index;
        while bottom_offset > min_y && index > 0 {
            index -= 1;
            let Some(id) = self.take_page(host, index) else {
                break;
            };
            self.pages.push_front(id);
            let measured = host.cells[id].measure_height(page_width);
            self.place(host, id, bottom_offset - measured, measured, page_width);
            bottom_offset -= measured + interval;
        }

        // No gap above the first page
        if let Some(&first) = self.pages.front() {
            let top = host.cells[first].bounds().y0 as i32;
            if host.cells[first].index() == Some(0) && top > 0 {
                for &id in &self.pages {
                    host.cells[id].offset_top_and_bottom(-top);
                }
                top_offset -= top;
            }
        }

        // Down
        let mut index = start_index + 1;
        while top_offset < max_y && index < size {
            let Some(id) = self.take_page(host, index) else {
                break;
            };
            self.pages.push_back(id);
            let measured = host.cells[id].measure_height(page_width);
            self.place(host, id, top_offset, measured, page_width);
            top_offset += measured + interval;
            index += 1;
        }

        // No gap below the last page
        let last_is_end = self
            .pages
            .back()
            .is_some_and(|&id| host.cells[id].index() == Some(size - 1));
        if last_is_end {
            loop {
                let (Some(&first), Some(&last)) = (self.pages.front(), self.pages.back()) else {
                    break;
                };
                let pages_bottom = host.cells[last].bounds().y1 as i32;
                if pages_bottom >= height {
                    break;
                }
                let pages_top = host.cells[first].bounds().y0 as i32;
                let Some(first_index) = host.cells[first].index().filter(|&i| i > 0) else {
                    // Page 0 is bound already: slide down, but never past the top.
                    let offset = (height - pages_bottom).min(-pages_top);
                    if offset > 0 {
                        for &p in &self.pages {
                            host.cells[p].offset_top_and_bottom(offset);
                        }
                    }
                    break;
                };
                let Some(id) = self.take_page(host, first_index - 1) else {
                    break;
                };
                self.pages.push_front(id);
                let measured = host.cells[id].measure_height(page_width);
                let offset = (height - pages_bottom).min(measured);
                for &p in &self.pages {
                    host.cells[p].offset_top_and_bottom(offset);
                }
                let bottom = pages_top - interval + offset;
                self.place(host, id, bottom - measured, measured, page_width);
            }
        }

        for id in std::mem::take(&mut self.spare) {
            self.remove_page(host, id);
        }

        if let Some(&first) = self.pages.front() {
            if let Some(index) = host.cells[first].index() {
                self.index = index;
            }
            self.offset_y = host.cells[first].bounds().y0 as i32;
        }
    }

    /// Bottom of the last bound page and whether more pages follow it.
    fn bottom_state(&self, host: &LayoutHost) -> (i32, bool) {
        let mut bottom = self.offset_y;
        for (i, &id) in self.pages.iter().enumerate() {
            if i != 0 {
                bottom += self.interval;
            }
            bottom += host.cells[id].height();
        }
        let size = ready_size(self.page_count()).unwrap_or(0);
        (bottom, self.index + self.pages.len() < size)
    }

    fn over_scroll_edge(&mut self, host: &mut LayoutHost, dx: i32, dy: i32, x: f64, y: f64) {
        self.delta_x += dx;
        self.delta_y += dy;
        pull_edges(
            &mut host.edge,
            (self.delta_x, self.delta_y),
            (x, y),
            true,
        );
    }

    /// Returns `true` when the top or bottom of the gallery was reached.
    fn scroll_internal(
        &mut self,
        host: &mut LayoutHost,
        (dx, dy): (i32, i32),
        fling: bool,
        (x, y): (f64, f64),
    ) -> bool {
        if self.pages.is_empty() {
            return false;
        }
        let width = host.width;
        let height = host.height;
        let page_width = self.page_width(host);
        let reservation = self.reservation();
        let mut request_fill = false;
        let mut result = false;

        let margin = page_width - width;
        if margin > 0 && dx != 0 {
            let old_offset_x = self.offset_x;
            self.offset_x = (old_offset_x - dx).clamp(-margin, 0);
            if self.offset_x != old_offset_x {
                request_fill = true;
            }
        }

        let mut remain_y = dy;
        while remain_y != 0 {
            if remain_y < 0 {
                // Toward the top
                let limit = if self.index > 0 {
                    (-height as f64 * reservation) as i32 + self.interval
                } else {
                    0
                };
                if self.offset_y - remain_y <= limit {
                    self.offset_y -= remain_y;
                    remain_y = 0;
                    request_fill = true;
                    self.delta_x = 0;
                    self.delta_y = 0;
                } else if self.index > 0 {
                    remain_y += limit - self.offset_y;
                    self.offset_y = limit;
                    // One pixel each round so this always terminates.
                    self.offset_y += 1;
                    remain_y += 1;
                    self.force_fill(host);
                    request_fill = false;
                    self.delta_x = 0;
                    self.delta_y = 0;
                } else {
                    if self.offset_y != limit {
                        self.offset_y = limit;
                        request_fill = true;
                    }
                    if !fling {
                        self.over_scroll_edge(host, 0, remain_y + limit - self.offset_y, x, y);
                    }
                    remain_y = 0;
                    result = true;
                }
            } else {
                // Toward the bottom
                let (bottom, has_next) = self.bottom_state(host);
                let limit = if has_next {
                    (height as f64 * (1.0 + reservation)) as i32 - self.interval
                } else {
                    height
                };
                // Pages may not fill the screen.
                let limit = bottom.min(limit);
                if bottom - remain_y >= limit {
                    self.offset_y -= remain_y;
                    remain_y = 0;
                    request_fill = true;
                    self.delta_x = 0;
                    self.delta_y = 0;
                } else if has_next {
                    self.offset_y -= bottom - limit;
                    remain_y += limit - bottom;
                    self.offset_y -= 1;
                    remain_y -= 1;
                    self.force_fill(host);
                    request_fill = false;
                    self.delta_x = 0;
                    self.delta_y = 0;
                } else {
                    if bottom != limit {
                        self.offset_y -= bottom - limit;
                        request_fill = true;
                    }
                    if !fling {
                        self.over_scroll_edge(host, 0, remain_y + limit - bottom, x, y);
                    }
                    remain_y = 0;
                    result = true;
                }
            }
        }

        if request_fill {
            host.request_fill();
        }
        result
    }

    fn update_fling(&mut self, host: &mut LayoutHost, now: u64) -> bool {
        let Some(step) = self.page_fling.step(now) else {
            return false;
        };
        if self.scroll_internal(host, (-step.dx, -step.dy), true, (0.0, 0.0)) {
            self.page_fling.cancel();
            self.on_fling_finish(host);
            return false;
        }
        if step.finished {
            self.on_fling_finish(host);
        }
        !step.finished
    }

    fn on_fling_finish(&mut self, host: &mut LayoutHost) {
        self.fling_up = false;
        let top_edge = self.index == 0 && self.offset_y >= 0;
        let (bottom, has_next) = self.bottom_state(host);
        let bottom_edge = !has_next && bottom <= host.height;
        if top_edge && bottom_edge {
            return;
        }
        let (_, velocity_y) = self.page_fling.velocity();
        let edge = &mut host.edge;
        if top_edge && edge.is_finished(Edge::Top) {
            edge.on_absorb(velocity_y, Edge::Top);
        } else if bottom_edge && edge.is_finished(Edge::Bottom) {
            edge.on_absorb(-velocity_y, Edge::Bottom);
        }
    }

    fn update_smooth_scale(&mut self, host: &mut LayoutHost, now: u64) -> bool {
        let Some(step) = self.smooth_scaler.step(now) else {
            return false;
        };
        if !self.pages.is_empty() {
            self.on_scale(host, step.focus_x, step.focus_y, step.factor);
        }
        !step.finished
    }
}

impl LayoutManager for ScrollLayoutManager {
    fn on_attach(&mut self, adapter: PageAdapter) {
        assert!(
            self.adapter.is_none(),
            "scroll layout manager is already attached"
        );
        debug!("scroll: attach at index {}", self.index);
        self.adapter = Some(adapter);
        self.reset_parameters();
    }

    fn on_detach(&mut self, host: &mut LayoutHost) -> PageAdapter {
        assert!(self.adapter.is_some(), "scroll layout manager is not attached");
        self.reset_layout(host);
        debug!("scroll: detach at index {}", self.index);
        let Some(adapter) = self.adapter.take() else {
            panic!("scroll layout manager is not attached");
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
        assert!(self.adapter.is_some(), "scroll layout manager is not attached");
        let error = self.adapter.as_ref().and_then(PageAdapter::error);
        let Some(size) = host.show_gallery_state(self.page_count(), error) else {
            self.remove_all_pages(host);
            return;
        };

        if self.index >= size {
            warn!("scroll: index {} out of range, size = {size}", self.index);
            self.index = size - 1;
            self.remove_all_pages(host);
        }

        let (keep_top_index, mut keep_top) = match self.keep_top_index {
            Some(index) => (Some(index), self.keep_top),
            None => (self.first_shown_index, None),
        };
        if let Some(keep_index) = keep_top_index
            && keep_top.is_none()
        {
            let mut top = self.offset_y;
            for &id in &self.pages {
                if host.cells[id].index() == Some(keep_index) {
                    break;
                }
                top += host.cells[id].height() + self.interval;
            }
            keep_top = Some(top);
        }

        let start = match (keep_top_index, keep_top) {
            (Some(index), Some(top)) => (index, top),
            _ => (self.index, self.offset_y),
        };
        self.fill_pages(host, size, start);

        self.first_shown_index = None;
        let skip_unloaded = self.scroll_up || self.fling_up;
        for &id in &self.pages {
            if skip_unloaded && !host.cells[id].is_loaded() {
                continue;
            }
            if Self::is_in_screen(host, id) {
                self.first_shown_index = host.cells[id].index();
                break;
            }
        }
    }

    fn on_down(&mut self, _host: &mut LayoutHost) {
        self.delta_x = 0;
        self.delta_y = 0;
        self.scroll_up = false;
        self.stop_animation_finger = self.cancel_all_animations();
    }

    fn on_up(&mut self, host: &mut LayoutHost) {
        self.scroll_up = false;
        host.edge.release_all();
    }

    fn on_double_tap_confirmed(&mut self, _host: &mut LayoutHost, x: f64, y: f64) {
        if self.pages.is_empty() {
            return;
        }
        let start = self.scale;
        let end = if start < MAX_SCALE - SCALE_ERROR {
            MAX_SCALE
        } else {
            MIN_SCALE
        };
        self.smooth_scaler.start((x, y), start, end);
    }

    fn on_scroll(&mut self, host: &mut LayoutHost, event: ScrollEvent) {
        self.keep_top_index = None;
        self.keep_top = None;
        self.scroll_up = event.dy < 0.0;
        self.scroll_internal(
            host,
            (event.dx as i32, event.dy as i32),
            false,
            (event.x, event.y),
        );
    }

    fn on_fling(&mut self, host: &mut LayoutHost, velocity_x: f64, velocity_y: f64) {
        if self.pages.is_empty() {
            return;
        }
        self.keep_top_index = None;
        self.keep_top = None;
        self.fling_up = velocity_y > 0.0;

        let margin = self.page_width(host) - host.width;
        let (min_x, max_x) = if margin > 0 {
            (-margin + self.offset_x, -self.offset_x)
        } else {
            (0, 0)
        };
        let max_y = if self.index > 0 {
            i32::MAX
        } else {
            -self.offset_y
        };
        let (bottom, has_next) = self.bottom_state(host);
        let min_y = if has_next {
            i32::MIN
        } else {
            host.height - bottom
        };
        let plan = FlingPlan::start(
            &host.fling,
            velocity_x.trunc(),
            min_x,
            max_x,
            velocity_y.trunc(),
            min_y,
            max_y,
        );
        if let Some(plan) = plan {
            self.page_fling.start(plan);
        }
    }

    fn can_scale(&self, _host: &LayoutHost) -> bool {
        !self.pages.is_empty()
    }

    fn on_scale(&mut self, host: &mut LayoutHost, focus_x: f64, focus_y: f64, factor: f64) {
        if self.pages.is_empty() {
            return;
        }
        let old_scale = self.scale;
        self.scale = (old_scale * factor).clamp(MIN_SCALE, MAX_SCALE);
        if old_scale == self.scale {
            return;
        }
        let factor = self.scale / old_scale;

        // Keep the page under the focus where it is.
        let anchor = self
            .pages
            .iter()
            .copied()
            .take_while(|&id| host.cells[id].bounds().y0 < focus_y)
            .last();
        let Some(id) = anchor else {
            warn!("scroll: no page above focus {focus_y}");
            self.keep_top_index = None;
            self.keep_top = None;
            self.force_fill(host);
            return;
        };

        let loaded = host.cells[id].is_loaded();
        self.keep_top_index = host.cells[id].index();
        let old_keep_top = host.cells[id].bounds().y0 as i32;
        self.keep_top = Some(old_keep_top);
        self.force_fill(host);
        self.keep_top = None;

        let new_offset_x = (focus_x - (focus_x - self.offset_x as f64) * factor) as i32;
        let new_keep_top = if loaded {
            (focus_y - (focus_y - old_keep_top as f64) * factor) as i32
        } else {
            old_keep_top
        };
        self.scroll_internal(
            host,
            (self.offset_x - new_offset_x, old_keep_top - new_keep_top),
            false,
            (focus_x, focus_y),
        );
    }

    fn on_update_animation(&mut self, host: &mut LayoutHost, now: u64) -> bool {
        let mut invalidate = self.update_fling(host, now);
        invalidate |= self.update_smooth_scale(host, now);
        invalidate |= self.over_scroller.update(host, now);
        invalidate
    }

    fn on_data_changed(&mut self, host: &mut LayoutHost) {
        assert!(self.adapter.is_some(), "scroll layout manager is not attached");
        self.reset_layout(host);
        self.reset_parameters();
        host.request_fill();
    }

    fn on_page_left(&mut self, host: &mut LayoutHost) {
        if ready_size(self.page_count()).is_none() || self.pages.is_empty() {
            return;
        }
        if self.index == 0 && self.offset_y >= 0 {
            self.over_scroller.start(host, Edge::Top);
            host.transfer_end = true;
            return;
        }
        self.cancel_all_animations();

        let mut previous = None;
        let mut first_shown = None;
        for &id in &self.pages {
            if Self::is_in_screen(host, id) {
                first_shown = Some(id);
                break;
            }
            previous = Some(id);
        }
        let height = host.height;
        let max_offset = height - self.interval;
        match first_shown {
            None => {
                warn!("scroll: no page on screen when paging up");
                self.offset_y += height / 2;
            }
            Some(id) => {
                let first_top = host.cells[id].bounds().y0 as i32;
                if first_top >= 0 {
                    match previous {
                        Some(prev) => {
                            let prev_top = host.cells[prev].bounds().y0 as i32;
                            self.offset_y += max_offset.min(-prev_top);
                        }
                        None => {
                            warn!("scroll: no page above the first shown one");
                            self.offset_y += height / 2;
                        }
                    }
                } else {
                    self.offset_y += max_offset.min(-first_top);
                }
            }
        }
        host.request_fill();
    }

    fn on_page_right(&mut self, host: &mut LayoutHost) {
        if ready_size(self.page_count()).is_none() || self.pages.is_empty() {
            return;
        }
        let (bottom, has_next) = self.bottom_state(host);
        if !has_next && bottom <= host.height {
            self.over_scroller.start(host, Edge::Bottom);
            host.transfer_end = true;
            return;
        }
        self.cancel_all_animations();

        let mut last_shown = None;
        let mut next = None;
        for &id in &self.pages {
            if Self::is_in_screen(host, id) {
                last_shown = Some(id);
            } else if last_shown.is_some() {
                next = Some(id);
                break;
            }
        }
        let height = host.height;
        let max_offset = height - self.interval;
        match last_shown {
            None => {
                warn!("scroll: no page on screen when paging down");
                self.offset_y -= height / 2;
            }
            Some(id) => {
                let last_bottom = host.cells[id].bounds().y1 as i32;
                if last_bottom <= height {
                    match next {
                        Some(next) => {
                            let next_bottom = host.cells[next].bounds().y1 as i32;
                            self.offset_y -= max_offset.min(next_bottom - height);
                        }
                        None => {
                            warn!("scroll: no page below the last shown one");
                            self.offset_y -= height / 2;
                        }
                    }
                } else {
                    self.offset_y -= max_offset.min(last_bottom - height);
                }
            }
        }
        host.request_fill();
    }

    fn is_tap_or_press_enabled(&self) -> bool {
        !self.stop_animation_finger
    }

    fn find_cell_by_index(&self, host: &LayoutHost, index: usize) -> Option<CellId> {
        self.find_page(host, index)
    }

    fn current_index(&self, host: &LayoutHost) -> Option<usize> {
        self.pages
            .iter()
            .copied()
            .find(|&id| Self::is_in_screen(host, id))
            .and_then(|id| host.cells[id].index())
    }

    fn set_current_index(&mut self, host: &mut LayoutHost, index: usize) {
        if index >= jump_bound(self.page_count()) {
            return;
        }
        self.keep_top_index = Some(index);
        self.keep_top = None;
        if self.pages.is_empty() {
            self.index = index;
            return;
        }
        match self.find_page(host, index) {
            Some(id) => {
                self.cancel_all_animations();
                self.offset_y -= host.cells[id].bounds().y0 as i32;
            }
            None => {
                self.index = index;
                self.offset_y = 0;
                self.reset_layout(host);
            }
        }
        host.request_fill();
    }

    fn index_under(&self, host: &LayoutHost, x: f64, y: f64) -> Option<usize> {
        let point = Point::new((x as i32) as f64, (y as i32) as f64);
        self.pages
            .iter()
            .copied()
            .find(|&id| host.cells[id].bounds().contains(point))
            .and_then(|id| host.cells[id].index())
    }

    fn internal_current_index(&self, host: &LayoutHost) -> usize {
        self.current_index(host).unwrap_or(self.index)
    }

    fn cells(&self) -> Vec<CellId> {
        self.pages.iter().copied().collect()
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
    use crate::layout::testing::{Fixture, fixture, preload};

    fn attached(count: PageCount, width: i32, height: i32) -> (ScrollLayoutManager, Fixture) {
        let (f, adapter) = fixture(count, width, height);
        let mut scroll = ScrollLayoutManager::new(24);
        scroll.on_attach(adapter);
        (scroll, f)
    }

    fn scroll_by(scroll: &mut ScrollLayoutManager, f: &mut Fixture, dy: f64) {
        scroll.on_scroll(
            &mut f.host,
            ScrollEvent {
                dx: 0.0,
                dy,
                total_x: 0.0,
                total_y: dy,
                x: 500.0,
                y: 500.0,
            },
        );
        if f.host.is_fill_requested() {
            scroll.force_fill(&mut f.host);
        }
    }

    fn bound(scroll: &ScrollLayoutManager, f: &Fixture) -> Vec<usize> {
        scroll
            .cells()
            .iter()
            .filter_map(|&id| f.host.cells[id].index())
            .collect()
    }

    #[test]
    fn tall_page_scrolls_until_bottom() {
        let (mut scroll, mut f) = attached(PageCount::Ready(1), 1000, 1000);
        preload(&f.notifier, 0, 1000, 2000);
        scroll.on_fill(&mut f.host);
        assert_eq!(scroll.offset_y(), 0);

        scroll_by(&mut scroll, &mut f, 500.0);
        assert_eq!(scroll.offset_y(), -500);
        scroll_by(&mut scroll, &mut f, 500.0);
        assert_eq!(scroll.offset_y(), -1000);
        // Bottom reached: the page stays put and the edge glows instead.
        scroll_by(&mut scroll, &mut f, 500.0);
        assert_eq!(scroll.offset_y(), -1000);
        assert!(!f.host.edge.is_finished(Edge::Bottom));
    }

    #[test]
    fn top_of_gallery_pulls_edge() {
        let (mut scroll, mut f) = attached(PageCount::Ready(3), 1000, 1000);
        scroll.on_fill(&mut f.host);
        scroll_by(&mut scroll, &mut f, -100.0);
        assert_eq!(scroll.offset_y(), 0);
        assert!(!f.host.edge.is_finished(Edge::Top));
    }

    #[test]
    fn fill_covers_reservation_band() {
        let (mut scroll, mut f) = attached(PageCount::Ready(50), 1000, 1000);
        for i in 0..50 {
            preload(&f.notifier, i, 1000, 500);
        }
        scroll.set_current_index(&mut f.host, 20);
        scroll.on_fill(&mut f.host);
        let pages = bound(&scroll, &f);
        // 500px pages plus 24px gaps, one screen above and below.
        assert_eq!(pages.first(), Some(&18));
        assert_eq!(pages.last(), Some(&23));
        assert_eq!(scroll.current_index(&f.host), Some(20));
        for pair in scroll.cells().windows(2) {
            let (a, b) = (f.host.cells[pair[0]].bounds(), f.host.cells[pair[1]].bounds());
            assert_eq!(b.y0 - a.y1, 24.0);
        }
    }

    #[test]
    fn fill_is_idempotent() {
        let (mut scroll, mut f) = attached(PageCount::Ready(10), 800, 600);
        scroll.on_fill(&mut f.host);
        scroll_by(&mut scroll, &mut f, 700.0);
        let before: Vec<Rect> = scroll.cells().iter().map(|&id| f.host.cells[id].bounds()).collect();
        scroll.on_fill(&mut f.host);
        let after: Vec<Rect> = scroll.cells().iter().map(|&id| f.host.cells[id].bounds()).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn short_gallery_has_no_gap_at_bottom() {
        let (mut scroll, mut f) = attached(PageCount::Ready(3), 1000, 1000);
        for i in 0..3 {
            preload(&f.notifier, i, 1000, 600);
        }
        scroll.set_current_index(&mut f.host, 2);
        scroll.on_fill(&mut f.host);
        let last = *scroll.cells().last().unwrap();
        assert_eq!(f.host.cells[last].bounds().y1, 1000.0);
        assert_eq!(bound(&scroll, &f), vec![0, 1, 2]);
    }

    #[test]
    fn jump_to_bound_page_moves_offset() {
        let (mut scroll, mut f) = attached(PageCount::Ready(10), 1000, 1000);
        for i in 0..10 {
            preload(&f.notifier, i, 1000, 500);
        }
        scroll.on_fill(&mut f.host);
        scroll.set_current_index(&mut f.host, 1);
        scroll.force_fill(&mut f.host);
        assert_eq!(scroll.current_index(&f.host), Some(1));
        let id = scroll.find_cell_by_index(&f.host, 1).unwrap();
        assert_eq!(f.host.cells[id].bounds().y0, 0.0);
    }

    #[test]
    fn page_right_advances_one_screen() {
        let (mut scroll, mut f) = attached(PageCount::Ready(10), 1000, 1000);
        for i in 0..10 {
            preload(&f.notifier, i, 1000, 488);
        }
        scroll.on_fill(&mut f.host);
        // Pages 0 and 1 fill the screen exactly; page 2 follows at 1024.
        scroll.on_page_right(&mut f.host);
        scroll.force_fill(&mut f.host);
        assert_eq!(scroll.current_index(&f.host), Some(1));
        let id = scroll.find_cell_by_index(&f.host, 2).unwrap();
        assert_eq!(f.host.cells[id].bounds().y1, 1000.0);

        scroll.on_page_left(&mut f.host);
        scroll.force_fill(&mut f.host);
        assert_eq!(scroll.current_index(&f.host), Some(0));
        assert_eq!(scroll.offset_y(), 0);
        scroll.on_page_left(&mut f.host);
        assert!(f.host.take_transfer_end());
    }

    #[test]
    fn double_tap_toggles_scale() {
        let (mut scroll, mut f) = attached(PageCount::Ready(5), 1000, 1000);
        for i in 0..5 {
            preload(&f.notifier, i, 1000, 1000);
        }
        scroll.on_fill(&mut f.host);
        scroll.on_double_tap_confirmed(&mut f.host, 500.0, 500.0);
        let mut now = 0;
        while scroll.on_update_animation(&mut f.host, now) {
            if f.host.is_fill_requested() {
                scroll.force_fill(&mut f.host);
            }
            now += 16;
        }
        assert!((scroll.scale() - MAX_SCALE).abs() < 1e-9);
        let margin = scroll.page_width(&f.host) - 1000;
        assert!(scroll.offset_x() <= 0 && scroll.offset_x() >= -margin);

        scroll.on_double_tap_confirmed(&mut f.host, 500.0, 500.0);
        while scroll.on_update_animation(&mut f.host, now) {
            now += 16;
        }
        assert!((scroll.scale() - MIN_SCALE).abs() < 1e-9);
    }

    #[test]
    fn wait_then_ready() {
        let (mut scroll, mut f) = attached(PageCount::Wait, 1000, 1000);
        scroll.on_fill(&mut f.host);
        assert!(scroll.cells().is_empty());
        *f.count.lock().unwrap() = PageCount::Ready(4);
        scroll.on_data_changed(&mut f.host);
        scroll.force_fill(&mut f.host);
        assert_eq!(f.host.overlay(), None);
        assert!(!scroll.cells().is_empty());
    }

    #[test]
    fn fling_stops_at_bottom() {
        let (mut scroll, mut f) = attached(PageCount::Ready(3), 1000, 1000);
        for i in 0..3 {
            preload(&f.notifier, i, 1000, 1000);
        }
        scroll.on_fill(&mut f.host);
        scroll.on_fling(&mut f.host, 0.0, -8000.0);
        let mut now = 0;
        while scroll.on_update_animation(&mut f.host, now) {
            if f.host.is_fill_requested() {
                scroll.force_fill(&mut f.host);
            }
            now += 16;
        }
        scroll.force_fill(&mut f.host);
        let (bottom, has_next) = scroll.bottom_state(&f.host);
        assert!(!has_next);
        assert_eq!(bottom, 1000);
    }
}
