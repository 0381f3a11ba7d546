//! The render-side controller.
//!
//! [`GalleryView`] owns every piece of page state and is driven by calling
//! [`GalleryView::frame`] once per display frame. Other threads talk to it
//! only through a [`GalleryHandle`], whose commands are queued and executed
//! in order at the start of the next frame.

use std::sync::mpsc::{self, Receiver, Sender};

use kurbo::{Point, Rect};
use log::{debug, info, trace};

use crate::cache::CacheStats;
use crate::cell::{CellId, CellStyle};
use crate::gesture::Gesture;
use crate::layout::{
    LayoutHost, LayoutManager, ManagerKind, PagerDirection, PagerLayoutManager, ScrollEvent,
    ScrollLayoutManager,
};
use crate::provider::{
    GalleryProvider, Notification, PageAdapter, PageCount, PageNotifier, PageSource,
};
use crate::scene::Scene;
use crate::transform::{ScaleMode, StartPosition};

// Tap areas as fractions of the view: left, top, right, bottom.
const LEFT_AREA: [f64; 4] = [0.0, 0.0, 1.0 / 3.0, 1.0];
const RIGHT_AREA: [f64; 4] = [2.0 / 3.0, 0.0, 1.0, 1.0];
const MENU_AREA: [f64; 4] = [1.0 / 3.0, 0.0, 2.0 / 3.0, 0.5];
const SLIDER_AREA: [f64; 4] = [1.0 / 3.0, 0.5, 2.0 / 3.0, 1.0];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutMode {
    LeftToRight,
    RightToLeft,
    TopToBottom,
}

impl LayoutMode {
    /// Unknown names fall back to left-to-right.
    pub fn from_name(name: &str) -> Self {
        match name {
            "right-to-left" | "rtl" => LayoutMode::RightToLeft,
            "top-to-bottom" | "scroll" => LayoutMode::TopToBottom,
            _ => LayoutMode::LeftToRight,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            LayoutMode::LeftToRight => "left-to-right",
            LayoutMode::RightToLeft => "right-to-left",
            LayoutMode::TopToBottom => "top-to-bottom",
        }
    }

    pub fn cycle(self) -> Self {
        match self {
            LayoutMode::LeftToRight => LayoutMode::RightToLeft,
            LayoutMode::RightToLeft => LayoutMode::TopToBottom,
            LayoutMode::TopToBottom => LayoutMode::LeftToRight,
        }
    }

    fn kind(self) -> ManagerKind {
        match self {
            LayoutMode::LeftToRight | LayoutMode::RightToLeft => ManagerKind::Pager,
            LayoutMode::TopToBottom => ManagerKind::Scroll,
        }
    }

    fn direction(self) -> Option<PagerDirection> {
        match self {
            LayoutMode::LeftToRight => Some(PagerDirection::LeftToRight),
            LayoutMode::RightToLeft => Some(PagerDirection::RightToLeft),
            LayoutMode::TopToBottom => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Commands and events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Attach,
    Resize { width: i32, height: i32 },
    SetLayoutMode(LayoutMode),
    SetScaleMode(ScaleMode),
    SetStartPosition(StartPosition),
    SetCurrentPage(usize),
    PageLeft,
    PageRight,
    SetPagerInterval(i32),
    SetScrollInterval(i32),
    /// Force a new request for a failed page.
    Retry(usize),
    Gesture(Gesture),
}

/// Everything a [`GalleryListener`] can hear, as a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GalleryEvent {
    CurrentIndex(Option<usize>),
    TapSliderArea,
    TapMenuArea,
    TapErrorText(usize),
    LongPressPage(usize),
    AutoTransferDone,
}

/// Callbacks fired on the render thread at the end of a frame.
pub trait GalleryListener: Send {
    fn on_update_current_index(&mut self, _index: Option<usize>) {}
    fn on_tap_slider_area(&mut self) {}
    fn on_tap_menu_area(&mut self) {}
    fn on_tap_error_text(&mut self, _index: usize) {}
    fn on_long_press_page(&mut self, _index: usize) {}
    /// Paging went past the first or last page.
    fn on_auto_transfer_done(&mut self) {}
}

fn emit(tx: &Sender<GalleryEvent>, event: GalleryEvent) {
    if let Err(mpsc::SendError(event)) = tx.send(event) {
        debug!("gallery: listener is gone, dropping {event:?}");
    }
}

impl GalleryListener for Sender<GalleryEvent> {
    fn on_update_current_index(&mut self, index: Option<usize>) {
        emit(self, GalleryEvent::CurrentIndex(index));
    }
    fn on_tap_slider_area(&mut self) {
        emit(self, GalleryEvent::TapSliderArea);
    }
    fn on_tap_menu_area(&mut self) {
        emit(self, GalleryEvent::TapMenuArea);
    }
    fn on_tap_error_text(&mut self, index: usize) {
        emit(self, GalleryEvent::TapErrorText(index));
    }
    fn on_long_press_page(&mut self, index: usize) {
        emit(self, GalleryEvent::LongPressPage(index));
    }
    fn on_auto_transfer_done(&mut self) {
        emit(self, GalleryEvent::AutoTransferDone);
    }
}

/// Thread-safe command surface of a [`GalleryView`].
#[derive(Debug, Clone)]
pub struct GalleryHandle {
    tx: Sender<Command>,
}

impl GalleryHandle {
    pub fn send(&self, command: Command) {
        trace!("gallery: queue {command:?}");
        if self.tx.send(command).is_err() {
            debug!("gallery: view is gone, dropping command");
        }
    }

    pub fn resize(&self, width: i32, height: i32) {
        self.send(Command::Resize { width, height });
    }

    pub fn set_layout_mode(&self, mode: LayoutMode) {
        self.send(Command::SetLayoutMode(mode));
    }

    pub fn set_scale_mode(&self, mode: ScaleMode) {
        self.send(Command::SetScaleMode(mode));
    }

    pub fn set_start_position(&self, position: StartPosition) {
        self.send(Command::SetStartPosition(position));
    }

    pub fn set_current_page(&self, page: usize) {
        self.send(Command::SetCurrentPage(page));
    }

    pub fn page_left(&self) {
        self.send(Command::PageLeft);
    }

    pub fn page_right(&self) {
        self.send(Command::PageRight);
    }

    pub fn set_pager_interval(&self, interval: i32) {
        self.send(Command::SetPagerInterval(interval));
    }

    pub fn set_scroll_interval(&self, interval: i32) {
        self.send(Command::SetScrollInterval(interval));
    }

    pub fn retry(&self, page: usize) {
        self.send(Command::Retry(page));
    }

    pub fn gesture(&self, gesture: Gesture) {
        self.send(Command::Gesture(gesture));
    }

    pub fn gestures(&self, gestures: impl IntoIterator<Item = Gesture>) {
        for gesture in gestures {
            self.gesture(gesture);
        }
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

pub struct GalleryBuilder {
    layout_mode: LayoutMode,
    scale_mode: ScaleMode,
    start_position: StartPosition,
    start_page: usize,
    pager_interval: i32,
    scroll_interval: i32,
    style: CellStyle,
    default_error: String,
    empty_text: String,
    show_index: bool,
    page_turn_ratio: f64,
    density: f64,
    cache_budget: usize,
    listener: Option<Box<dyn GalleryListener>>,
}

impl Default for GalleryBuilder {
    fn default() -> Self {
        Self {
            layout_mode: LayoutMode::LeftToRight,
            scale_mode: ScaleMode::Fit,
            start_position: StartPosition::TopLeft,
            start_page: 0,
            pager_interval: 48,
            scroll_interval: 24,
            style: CellStyle::default(),
            default_error: "Error".into(),
            empty_text: "Empty".into(),
            show_index: true,
            page_turn_ratio: 0.5,
            density: 1.0,
            cache_budget: 32 * 1024 * 1024,
            listener: None,
        }
    }
}

impl GalleryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn layout_mode(mut self, mode: LayoutMode) -> Self {
        self.layout_mode = mode;
        self
    }

    pub fn scale_mode(mut self, mode: ScaleMode) -> Self {
        self.scale_mode = mode;
        self
    }

    pub fn start_position(mut self, position: StartPosition) -> Self {
        self.start_position = position;
        self
    }

    pub fn start_page(mut self, page: usize) -> Self {
        self.start_page = page;
        self
    }

    pub fn pager_interval(mut self, interval: i32) -> Self {
        self.pager_interval = interval;
        self
    }

    pub fn scroll_interval(mut self, interval: i32) -> Self {
        self.scroll_interval = interval;
        self
    }

    pub fn cell_style(mut self, style: CellStyle) -> Self {
        self.style = style;
        self
    }

    pub fn default_error(mut self, text: impl Into<String>) -> Self {
        self.default_error = text.into();
        self
    }

    pub fn empty_text(mut self, text: impl Into<String>) -> Self {
        self.empty_text = text.into();
        self
    }

    pub fn show_index(mut self, show: bool) -> Self {
        self.show_index = show;
        self
    }

    pub fn page_turn_ratio(mut self, ratio: f64) -> Self {
        self.page_turn_ratio = ratio;
        self
    }

    pub fn density(mut self, density: f64) -> Self {
        self.density = density;
        self
    }

    pub fn cache_budget(mut self, bytes: usize) -> Self {
        self.cache_budget = bytes;
        self
    }

    pub fn listener(mut self, listener: impl GalleryListener + 'static) -> Self {
        self.listener = Some(Box::new(listener));
        self
    }

    /// Build the view and start the provider. The managers attach on the
    /// first frame.
    pub fn build(self, source: Box<dyn PageSource>) -> GalleryView {
        let mut provider = GalleryProvider::new(source, self.cache_budget);
        provider.start();
        let notifier = provider.notifier();
        let mut adapter = PageAdapter::new(provider);
        adapter.set_show_index(self.show_index);

        let (tx, rx) = mpsc::channel();
        let handle = GalleryHandle { tx };
        handle.send(Command::Attach);

        info!(
            "gallery: build mode={}, scale={}, start={}, page={}, intervals={}/{}",
            self.layout_mode.name(),
            self.scale_mode.name(),
            self.start_position.name(),
            self.start_page,
            self.pager_interval,
            self.scroll_interval,
        );

        GalleryView {
            host: LayoutHost::new(self.style, self.density, self.default_error, self.empty_text),
            managers: Managers {
                pager: PagerLayoutManager::new(
                    self.scale_mode,
                    self.start_position,
                    1.0,
                    self.pager_interval,
                    self.page_turn_ratio,
                ),
                scroll: ScrollLayoutManager::new(self.scroll_interval),
            },
            active: None,
            adapter: Some(adapter),
            notifier,
            layout_mode: self.layout_mode,
            index: self.start_page,
            handle,
            rx,
            listener: self.listener,
            scale: false,
            scroll: false,
            areas: TapAreas::default(),
            current_index: None,
        }
    }
}

// ---------------------------------------------------------------------------
// View
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Managers {
    pager: PagerLayoutManager,
    scroll: ScrollLayoutManager,
}

impl Managers {
    fn get(&self, kind: ManagerKind) -> &dyn LayoutManager {
        match kind {
            ManagerKind::Pager => &self.pager,
            ManagerKind::Scroll => &self.scroll,
        }
    }

    fn get_mut(&mut self, kind: ManagerKind) -> &mut dyn LayoutManager {
        match kind {
            ManagerKind::Pager => &mut self.pager,
            ManagerKind::Scroll => &mut self.scroll,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct TapAreas {
    left: Rect,
    right: Rect,
    menu: Rect,
    slider: Rect,
}

impl TapAreas {
    fn new(width: i32, height: i32) -> Self {
        let area = |f: [f64; 4]| {
            Rect::new(
                (f[0] * width as f64) as i32 as f64,
                (f[1] * height as f64) as i32 as f64,
                (f[2] * width as f64) as i32 as f64,
                (f[3] * height as f64) as i32 as f64,
            )
        };
        Self {
            left: area(LEFT_AREA),
            right: area(RIGHT_AREA),
            menu: area(MENU_AREA),
            slider: area(SLIDER_AREA),
        }
    }
}

pub struct GalleryView {
    host: LayoutHost,
    managers: Managers,
    active: Option<ManagerKind>,
    /// Held here only while no manager is attached.
    adapter: Option<PageAdapter>,
    notifier: PageNotifier,
    layout_mode: LayoutMode,
    /// Logical index while detached.
    index: usize,
    handle: GalleryHandle,
    rx: Receiver<Command>,
    listener: Option<Box<dyn GalleryListener>>,
    scale: bool,
    scroll: bool,
    areas: TapAreas,
    current_index: Option<usize>,
}

impl GalleryView {
    pub fn handle(&self) -> GalleryHandle {
        self.handle.clone()
    }

    /// Producer-side handle for page results.
    pub fn notifier(&self) -> PageNotifier {
        self.notifier.clone()
    }

    pub fn host(&self) -> &LayoutHost {
        &self.host
    }

    pub fn layout_mode(&self) -> LayoutMode {
        self.layout_mode
    }

    pub fn active_kind(&self) -> Option<ManagerKind> {
        self.active
    }

    pub fn pager(&self) -> &PagerLayoutManager {
        &self.managers.pager
    }

    pub fn scroll(&self) -> &ScrollLayoutManager {
        &self.managers.scroll
    }

    /// The index last reported to the listener.
    pub fn current_index(&self) -> Option<usize> {
        self.current_index
    }

    /// Bound cells of the active manager in draw order.
    pub fn cells(&self) -> Vec<CellId> {
        self.active
            .map(|kind| self.managers.get(kind).cells())
            .unwrap_or_default()
    }

    fn adapter_mut(&mut self) -> Option<&mut PageAdapter> {
        match self.active {
            Some(kind) => self.managers.get_mut(kind).adapter_mut(),
            None => self.adapter.as_mut(),
        }
    }

    /// Page count as the source currently reports it.
    pub fn page_count(&mut self) -> PageCount {
        self.adapter_mut()
            .map_or(PageCount::Wait, |a| a.size())
    }

    pub fn cache_stats(&mut self) -> CacheStats {
        self.adapter_mut()
            .map(|a| a.provider().with_cache(|c| c.stats()))
            .unwrap_or_default()
    }

    /// Run one frame at `now` (ms). Returns the display list and whether
    /// another frame is needed soon.
    pub fn frame(&mut self, now: u64) -> (Scene, bool) {
        let mut invalidate = self.apply_notifications();

        let commands: Vec<Command> = self.rx.try_iter().collect();
        invalidate |= !commands.is_empty();
        for command in commands {
            self.dispatch(command);
        }

        if let Some(kind) = self.active {
            let manager = self.managers.get_mut(kind);
            invalidate |= manager.on_update_animation(&mut self.host, now);
            if self.host.is_fill_requested() {
                manager.force_fill(&mut self.host);
            }
            for id in manager.cells() {
                invalidate |= self.host.cells[id].update_fade(now);
            }
        }

        if self.host.take_transfer_end()
            && let Some(listener) = self.listener.as_mut()
        {
            listener.on_auto_transfer_done();
        }

        invalidate |= self.host.edge.update(now);

        let cells = self.cells();
        let scene = Scene::build(&mut self.host, &cells);

        let index = self
            .active
            .and_then(|kind| self.managers.get(kind).current_index(&self.host));
        if index != self.current_index {
            debug!("gallery: current index {:?} -> {index:?}", self.current_index);
            self.current_index = index;
            if let Some(listener) = self.listener.as_mut() {
                listener.on_update_current_index(index);
            }
        }

        trace!(
            "gallery: frame at {now}, {} pages, invalidate={invalidate}",
            scene.pages.len()
        );
        (scene, invalidate)
    }

    /// Detach the active manager and drop cached pages.
    pub fn shutdown(&mut self) {
        self.detach();
        if let Some(adapter) = self.adapter.as_mut() {
            adapter.provider_mut().stop();
        }
        info!("gallery: shut down");
    }

    fn apply_notifications(&mut self) -> bool {
        let notes = match self.adapter_mut() {
            Some(adapter) => adapter.drain(),
            None => return false,
        };
        if notes.is_empty() {
            return false;
        }
        let Some(kind) = self.active else {
            // Cache already holds the results; they apply on bind.
            return true;
        };
        let screen = self.host.screen();
        let manager = self.managers.get_mut(kind);
        for note in notes {
            if let Notification::DataChanged(None) = note {
                manager.on_data_changed(&mut self.host);
                continue;
            }
            let Some(id) = note
                .index()
                .and_then(|i| manager.find_cell_by_index(&self.host, i))
            else {
                trace!("gallery: stale {note:?}");
                continue;
            };
            if let Some(adapter) = manager.adapter_mut() {
                adapter.apply(note, &mut self.host.cells[id], screen);
            }
        }
        self.host.request_fill();
        true
    }

    fn dispatch(&mut self, command: Command) {
        debug!("gallery: {command:?}");
        match command {
            Command::Attach => self.attach(),
            Command::Resize { width, height } => {
                self.host.set_size(width, height);
                self.areas = TapAreas::new(self.host.width(), self.host.height());
                self.host.request_fill();
            }
            Command::SetLayoutMode(mode) => self.set_layout_mode(mode),
            Command::SetScaleMode(mode) => {
                self.managers.pager.set_scale_mode(&mut self.host, mode);
            }
            Command::SetStartPosition(position) => {
                self.managers
                    .pager
                    .set_start_position(&mut self.host, position);
            }
            Command::SetCurrentPage(page) => match self.active {
                Some(kind) => self
                    .managers
                    .get_mut(kind)
                    .set_current_index(&mut self.host, page),
                None => self.index = page,
            },
            Command::PageLeft => {
                if let Some(kind) = self.active {
                    self.managers.get_mut(kind).on_page_left(&mut self.host);
                }
            }
            Command::PageRight => {
                if let Some(kind) = self.active {
                    self.managers.get_mut(kind).on_page_right(&mut self.host);
                }
            }
            Command::SetPagerInterval(interval) => {
                self.managers.pager.set_interval(&mut self.host, interval);
            }
            Command::SetScrollInterval(interval) => {
                self.managers.scroll.set_interval(&mut self.host, interval);
            }
            Command::Retry(page) => self.retry(page),
            Command::Gesture(gesture) => self.on_gesture(gesture),
        }
    }

    fn retry(&mut self, page: usize) {
        let Some(kind) = self.active else {
            return;
        };
        let manager = self.managers.get_mut(kind);
        let Some(id) = manager.find_cell_by_index(&self.host, page) else {
            debug!("gallery: retry of unbound page {page}");
            return;
        };
        if let Some(adapter) = manager.adapter_mut() {
            adapter.retry(&mut self.host.cells[id]);
        }
    }

    fn attach(&mut self) {
        if self.active.is_some() {
            return;
        }
        let Some(adapter) = self.adapter.take() else {
            return;
        };
        let kind = self.layout_mode.kind();
        if let Some(direction) = self.layout_mode.direction() {
            self.managers.pager.set_direction(&mut self.host, direction);
        }
        let manager = self.managers.get_mut(kind);
        manager.on_attach(adapter);
        manager.set_current_index(&mut self.host, self.index);
        self.active = Some(kind);
        info!(
            "gallery: attached {} at page {}",
            self.layout_mode.name(),
            self.index
        );
        self.host.request_fill();
    }

    fn detach(&mut self) {
        let Some(kind) = self.active.take() else {
            return;
        };
        let manager = self.managers.get_mut(kind);
        self.index = manager.internal_current_index(&self.host);
        self.adapter = Some(manager.on_detach(&mut self.host));
        info!("gallery: detached at page {}", self.index);
    }

    fn set_layout_mode(&mut self, mode: LayoutMode) {
        if self.layout_mode == mode {
            return;
        }
        info!(
            "gallery: layout {} -> {}",
            self.layout_mode.name(),
            mode.name()
        );
        self.layout_mode = mode;
        let Some(from) = self.active else {
            return;
        };
        let to = mode.kind();
        if from == to {
            // Only the reading direction changed.
            if let Some(direction) = mode.direction() {
                self.managers.pager.set_direction(&mut self.host, direction);
            }
        } else {
            let old = self.managers.get_mut(from);
            let index = old.internal_current_index(&self.host);
            let adapter = old.on_detach(&mut self.host);
            if let Some(direction) = mode.direction() {
                self.managers.pager.set_direction(&mut self.host, direction);
            }
            let new = self.managers.get_mut(to);
            new.on_attach(adapter);
            new.set_current_index(&mut self.host, index);
            self.active = Some(to);
        }
        self.host.request_fill();
    }

    // -----------------------------------------------------------------------
    // Gestures
    // -----------------------------------------------------------------------

    fn on_gesture(&mut self, gesture: Gesture) {
        let Some(kind) = self.active else {
            return;
        };
        match gesture {
            Gesture::Down { .. } => {
                self.scale = false;
                self.scroll = false;
                self.host.first_scroll = true;
                self.managers.get_mut(kind).on_down(&mut self.host);
            }
            Gesture::Up => self.managers.get_mut(kind).on_up(&mut self.host),
            Gesture::PointerDown { .. } => {
                if !self.scroll && self.managers.get(kind).can_scale(&self.host) {
                    self.scale = true;
                }
            }
            Gesture::SingleTapConfirmed { x, y } => self.on_single_tap_confirmed(kind, x, y),
            Gesture::DoubleTapConfirmed { x, y } => {
                if !self.scale {
                    self.managers
                        .get_mut(kind)
                        .on_double_tap_confirmed(&mut self.host, x, y);
                }
            }
            Gesture::LongPress { x, y } => self.on_long_press(kind, x, y),
            Gesture::Scroll {
                dx,
                dy,
                total_x,
                total_y,
                x,
                y,
            } => {
                if self.scale {
                    return;
                }
                self.scroll = true;
                let event = ScrollEvent {
                    dx,
                    dy,
                    total_x,
                    total_y,
                    x,
                    y,
                };
                self.managers.get_mut(kind).on_scroll(&mut self.host, event);
            }
            Gesture::Fling {
                velocity_x,
                velocity_y,
            } => {
                self.managers
                    .get_mut(kind)
                    .on_fling(&mut self.host, velocity_x, velocity_y);
            }
            Gesture::ScaleBegin { focus_x, focus_y } => self.on_scale(kind, focus_x, focus_y, 1.0),
            Gesture::Scale {
                focus_x,
                focus_y,
                factor,
            } => self.on_scale(kind, focus_x, focus_y, factor),
            Gesture::PointerUp
            | Gesture::SingleTapUp { .. }
            | Gesture::DoubleTap { .. }
            | Gesture::ScaleEnd => {}
        }
    }

    fn on_scale(&mut self, kind: ManagerKind, focus_x: f64, focus_y: f64, factor: f64) {
        let manager = self.managers.get_mut(kind);
        if self.scroll || !manager.can_scale(&self.host) {
            return;
        }
        self.scale = true;
        manager.on_scale(&mut self.host, focus_x, focus_y, factor);
    }

    fn on_single_tap_confirmed(&mut self, kind: ManagerKind, x: f64, y: f64) {
        let manager = self.managers.get_mut(kind);
        if !manager.is_tap_or_press_enabled() {
            return;
        }
        let point = Point::new((x as i32) as f64, (y as i32) as f64);
        let error_page = manager.cells().into_iter().find_map(|id| {
            let cell = &self.host.cells[id];
            let index = cell.index()?;
            (cell.bounds().contains(point) && cell.is_error() && cell.is_under_info(x, y))
                .then_some(index)
        });
        if let Some(index) = error_page {
            if let Some(listener) = self.listener.as_mut() {
                listener.on_tap_error_text(index);
            }
        } else if self.areas.slider.contains(point) {
            if let Some(listener) = self.listener.as_mut() {
                listener.on_tap_slider_area();
            }
        } else if self.areas.menu.contains(point) {
            if let Some(listener) = self.listener.as_mut() {
                listener.on_tap_menu_area();
            }
        } else if self.areas.left.contains(point) {
            manager.on_page_left(&mut self.host);
        } else if self.areas.right.contains(point) {
            manager.on_page_right(&mut self.host);
        }
    }

    fn on_long_press(&mut self, kind: ManagerKind, x: f64, y: f64) {
        let manager = self.managers.get(kind);
        if self.scale || !manager.is_tap_or_press_enabled() {
            return;
        }
        let Some(index) = manager.index_under(&self.host, x, y) else {
            return;
        };
        if let Some(listener) = self.listener.as_mut() {
            listener.on_long_press_page(index);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::cache::PageImage;
    use crate::layout::Overlay;

    struct Fixed {
        count: Arc<Mutex<PageCount>>,
    }

    impl PageSource for Fixed {
        fn size(&self) -> PageCount {
            *self.count.lock().unwrap()
        }
        fn error(&self) -> Option<String> {
            None
        }
        fn on_request(&mut self, _index: usize) {}
        fn on_force_request(&mut self, _index: usize) {}
        fn on_cancel_request(&mut self, _index: usize) {}
    }

    fn view(
        count: PageCount,
        builder: GalleryBuilder,
    ) -> (GalleryView, Receiver<GalleryEvent>, Arc<Mutex<PageCount>>) {
        let count = Arc::new(Mutex::new(count));
        let (tx, rx) = mpsc::channel();
        let view = builder.listener(tx).build(Box::new(Fixed {
            count: Arc::clone(&count),
        }));
        view.handle().resize(900, 1200);
        (view, rx, count)
    }

    #[test]
    fn layout_mode_names() {
        assert_eq!(LayoutMode::from_name("rtl"), LayoutMode::RightToLeft);
        assert_eq!(LayoutMode::from_name("scroll"), LayoutMode::TopToBottom);
        assert_eq!(LayoutMode::from_name("sideways"), LayoutMode::LeftToRight);
        assert_eq!(LayoutMode::TopToBottom.cycle(), LayoutMode::LeftToRight);
    }

    #[test]
    fn tap_areas_cover_thirds() {
        let areas = TapAreas::new(900, 1200);
        assert_eq!(areas.left, Rect::new(0.0, 0.0, 300.0, 1200.0));
        assert_eq!(areas.right, Rect::new(600.0, 0.0, 900.0, 1200.0));
        assert_eq!(areas.menu, Rect::new(300.0, 0.0, 600.0, 600.0));
        assert_eq!(areas.slider, Rect::new(300.0, 600.0, 600.0, 1200.0));
    }

    #[test]
    fn first_frame_attaches_and_reports_index() {
        let (mut view, rx, _) = view(PageCount::Ready(5), GalleryBuilder::new().start_page(2));
        assert_eq!(view.active_kind(), None);
        let (scene, _) = view.frame(0);
        assert_eq!(view.active_kind(), Some(ManagerKind::Pager));
        assert_eq!(scene.overlay, None);
        assert_eq!(view.current_index(), Some(2));
        assert_eq!(rx.try_recv(), Ok(GalleryEvent::CurrentIndex(Some(2))));
    }

    #[test]
    fn dropped_receiver_does_not_stop_frames() {
        let (mut view, rx, _) = view(PageCount::Ready(5), GalleryBuilder::new());
        drop(rx);
        view.frame(0);
        assert_eq!(view.current_index(), Some(0));
        view.handle().page_right();
        view.frame(16);
        assert_eq!(view.active_kind(), Some(ManagerKind::Pager));

        let (mut tx, rx) = mpsc::channel::<GalleryEvent>();
        drop(rx);
        tx.on_tap_menu_area();
        tx.on_long_press_page(3);
    }

    #[test]
    fn wait_shows_progress() {
        let (mut view, _rx, count) = view(PageCount::Wait, GalleryBuilder::new());
        let (scene, _) = view.frame(0);
        assert!(scene.pages.is_empty());
        assert_eq!(scene.overlay, Some(Overlay::Progress));

        *count.lock().unwrap() = PageCount::Ready(3);
        view.notifier().notify_data_changed();
        let (scene, _) = view.frame(16);
        assert_eq!(scene.overlay, None);
        assert!(scene.page(0).is_some());
    }

    #[test]
    fn taps_route_to_areas() {
        let (mut view, rx, _) = view(PageCount::Ready(5), GalleryBuilder::new());
        view.frame(0);
        let _ = rx.try_recv();
        let handle = view.handle();
        handle.gesture(Gesture::SingleTapConfirmed { x: 450.0, y: 100.0 });
        handle.gesture(Gesture::SingleTapConfirmed { x: 450.0, y: 1000.0 });
        view.frame(16);
        assert_eq!(rx.try_recv(), Ok(GalleryEvent::TapMenuArea));
        assert_eq!(rx.try_recv(), Ok(GalleryEvent::TapSliderArea));

        // Right third turns the page in left-to-right mode.
        handle.gesture(Gesture::SingleTapConfirmed { x: 800.0, y: 600.0 });
        let mut now = 32;
        while view.frame(now).1 {
            now += 16;
        }
        assert_eq!(view.current_index(), Some(1));
    }

    #[test]
    fn error_text_tap_wins() {
        let (mut view, rx, _) = view(PageCount::Ready(3), GalleryBuilder::new());
        view.frame(0);
        view.notifier()
            .notify_page_failed(0, &crate::provider::PageError::Decode);
        view.frame(16);
        let _ = rx.try_iter().count();
        // The info panel sits at the center of the page.
        view.handle()
            .gesture(Gesture::SingleTapConfirmed { x: 450.0, y: 600.0 });
        view.frame(32);
        assert_eq!(rx.try_recv(), Ok(GalleryEvent::TapErrorText(0)));
    }

    #[test]
    fn retry_restores_spinner() {
        let (mut view, _rx, _) = view(PageCount::Ready(3), GalleryBuilder::new());
        view.frame(0);
        view.notifier()
            .notify_page_failed(0, &crate::provider::PageError::NotFound);
        let (scene, _) = view.frame(16);
        let info = scene.page(0).and_then(|p| p.info.clone()).unwrap();
        assert_eq!(info.error.as_deref(), Some("Page not found"));

        view.handle().retry(0);
        let (scene, _) = view.frame(32);
        let info = scene.page(0).and_then(|p| p.info.clone()).unwrap();
        assert_eq!(info.error, None);
        assert_eq!(info.progress, crate::cell::Progress::Indeterminate);
    }

    #[test]
    fn long_press_reports_page() {
        let (mut view, rx, _) = view(PageCount::Ready(3), GalleryBuilder::new());
        view.frame(0);
        let _ = rx.try_recv();
        view.handle().gesture(Gesture::Down { x: 10.0, y: 10.0 });
        view.handle().gesture(Gesture::LongPress { x: 10.0, y: 10.0 });
        view.frame(16);
        assert_eq!(rx.try_recv(), Ok(GalleryEvent::LongPressPage(0)));
    }

    #[test]
    fn direction_switch_keeps_pager_attached() {
        let (mut view, _rx, _) = view(PageCount::Ready(5), GalleryBuilder::new().start_page(1));
        view.frame(0);
        view.handle().set_layout_mode(LayoutMode::RightToLeft);
        view.frame(16);
        assert_eq!(view.active_kind(), Some(ManagerKind::Pager));
        assert_eq!(view.pager().direction(), PagerDirection::RightToLeft);
        assert_eq!(view.current_index(), Some(1));
    }

    #[test]
    fn loaded_page_reaches_scene() {
        let (mut view, _rx, _) = view(PageCount::Ready(2), GalleryBuilder::new());
        view.frame(0);
        view.notifier()
            .notify_page_succeed(0, PageImage::new(900, 1200, false, Vec::new()));
        let (scene, more) = view.frame(16);
        assert!(more);
        let page = scene.page(0).unwrap();
        assert!(page.info.is_none());
        let draw = page.image.as_ref().unwrap();
        assert_eq!(draw.dst, Rect::new(0.0, 0.0, 900.0, 1200.0));
        // Both bound pages missed; the result went straight to the cell.
        let stats = view.cache_stats();
        assert_eq!((stats.hits, stats.misses), (0, 2));
    }
}
