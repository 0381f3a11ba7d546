use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex};

use kurbo::Rect;

use folio::cache::{ImageCache, PageImage};
use folio::cell::Progress;
use folio::edge::Edge;
use folio::fling::{Fling, FlingPlan, adjust_duration};
use folio::gallery::{GalleryBuilder, GalleryEvent, GalleryHandle, GalleryView, LayoutMode};
use folio::gesture::Gesture;
use folio::layout::{ManagerKind, Overlay};
use folio::provider::{PageCount, PageError, PageNotifier, PageSource};
use folio::scene::Scene;
use folio::transform::ScaleMode;

const W: i32 = 1000;
const H: i32 = 1000;

/// In-memory source: the count is scripted by the test, requests are logged.
struct Scripted {
    count: Arc<Mutex<PageCount>>,
    requests: Arc<Mutex<Vec<(usize, bool)>>>,
    error: Option<String>,
}

impl PageSource for Scripted {
    fn size(&self) -> PageCount {
        *self.count.lock().unwrap()
    }
    fn error(&self) -> Option<String> {
        self.error.clone()
    }
    fn on_request(&mut self, index: usize) {
        self.requests.lock().unwrap().push((index, false));
    }
    fn on_force_request(&mut self, index: usize) {
        self.requests.lock().unwrap().push((index, true));
    }
    fn on_cancel_request(&mut self, _index: usize) {}
}

struct Gallery {
    view: GalleryView,
    handle: GalleryHandle,
    notifier: PageNotifier,
    events: Receiver<GalleryEvent>,
    count: Arc<Mutex<PageCount>>,
    requests: Arc<Mutex<Vec<(usize, bool)>>>,
    now: u64,
}

impl Gallery {
    fn new(count: PageCount, builder: GalleryBuilder) -> Self {
        Self::with_error(count, builder, None)
    }

    fn with_error(count: PageCount, builder: GalleryBuilder, error: Option<&str>) -> Self {
        let count = Arc::new(Mutex::new(count));
        let requests = Arc::new(Mutex::new(Vec::new()));
        let (tx, events) = mpsc::channel();
        let view = builder.listener(tx).build(Box::new(Scripted {
            count: Arc::clone(&count),
            requests: Arc::clone(&requests),
            error: error.map(str::to_owned),
        }));
        let handle = view.handle();
        handle.resize(W, H);
        let notifier = view.notifier();
        Self {
            view,
            handle,
            notifier,
            events,
            count,
            requests,
            now: 0,
        }
    }

    fn preload(&self, index: usize, width: u32, height: u32) {
        self.notifier
            .notify_page_succeed(index, PageImage::new(width, height, false, Vec::new()));
    }

    fn frame(&mut self) -> Scene {
        let (scene, _) = self.view.frame(self.now);
        self.now += 16;
        scene
    }

    /// Run frames until nothing is animating.
    fn settle(&mut self) -> Scene {
        for _ in 0..500 {
            let (scene, more) = self.view.frame(self.now);
            self.now += 16;
            if !more {
                return scene;
            }
        }
        panic!("gallery never settled");
    }

    fn events(&self) -> Vec<GalleryEvent> {
        self.events.try_iter().collect()
    }
}

fn scroll(dy: f64) -> Gesture {
    Gesture::Scroll {
        dx: 0.0,
        dy,
        total_x: 0.0,
        total_y: dy,
        x: 500.0,
        y: 500.0,
    }
}

#[test]
fn pager_page_right_from_two_lands_on_three() {
    let mut g = Gallery::new(
        PageCount::Ready(5),
        GalleryBuilder::new().layout_mode(LayoutMode::LeftToRight),
    );
    g.frame();
    g.handle.set_current_page(2);
    g.settle();
    assert_eq!(g.view.current_index(), Some(2));

    g.handle.page_right();
    g.settle();
    assert_eq!(g.view.current_index(), Some(3));
    assert_eq!(
        g.events().last(),
        Some(&GalleryEvent::CurrentIndex(Some(3)))
    );
}

#[test]
fn scroll_drag_moves_until_content_bottom() {
    let mut g = Gallery::new(
        PageCount::Ready(1),
        GalleryBuilder::new().layout_mode(LayoutMode::TopToBottom),
    );
    g.preload(0, 1000, 2000);
    g.frame();
    assert_eq!(g.view.active_kind(), Some(ManagerKind::Scroll));
    assert_eq!(g.view.scroll().offset_y(), 0);

    g.handle.gestures([Gesture::Down { x: 500.0, y: 500.0 }, scroll(500.0)]);
    g.frame();
    assert_eq!(g.view.scroll().offset_y(), -500);

    g.handle.gesture(scroll(500.0));
    g.frame();
    assert_eq!(g.view.scroll().offset_y(), -1000);

    // Content bottom reached: only the edge reacts.
    g.handle.gesture(scroll(500.0));
    let scene = g.frame();
    assert_eq!(g.view.scroll().offset_y(), -1000);
    assert!(scene.glows.iter().any(|glow| glow.edge == Edge::Bottom));
    let page = scene.page(0).unwrap();
    assert_eq!(page.bounds.y1, 1000.0);
}

#[test]
fn fling_distance_clamps_to_axis_bound() {
    let fling = Fling::new(1.0);
    let free = fling.plan_axis(-4000.0, i32::MIN, i32::MAX);
    let clamped = fling.plan_axis(-4000.0, -800, 0);
    assert_eq!(clamped.distance, -800);
    assert_eq!(
        clamped.duration,
        adjust_duration(free.distance, -800, free.duration)
    );
    assert!(clamped.duration < free.duration);

    let plan = FlingPlan::start(&fling, 0.0, 0, 0, -4000.0, -800, 0).unwrap();
    assert_eq!((plan.dx, plan.dy), (0, -800));
    assert_eq!(plan.duration, clamped.duration);
}

#[test]
fn scroll_fling_stops_at_last_page() {
    let mut g = Gallery::new(
        PageCount::Ready(3),
        GalleryBuilder::new().layout_mode(LayoutMode::TopToBottom),
    );
    for i in 0..3 {
        g.preload(i, 1000, 1000);
    }
    g.settle();
    g.handle.gesture(Gesture::Fling {
        velocity_x: 0.0,
        velocity_y: -8000.0,
    });
    let scene = g.settle();
    assert_eq!(g.view.current_index(), Some(2));
    assert_eq!(scene.page(2).unwrap().bounds.y1, 1000.0);
}

#[test]
fn waiting_gallery_binds_nothing() {
    let mut g = Gallery::new(PageCount::Wait, GalleryBuilder::new());
    let scene = g.frame();
    assert!(g.view.cells().is_empty());
    assert!(scene.pages.is_empty());
    assert_eq!(scene.overlay, Some(Overlay::Progress));
    assert!(g.requests.lock().unwrap().is_empty());

    // The count arrives later.
    *g.count.lock().unwrap() = PageCount::Ready(4);
    g.notifier.notify_data_changed();
    let scene = g.frame();
    assert_eq!(scene.overlay, None);
    let info = scene.page(0).and_then(|p| p.info.clone()).unwrap();
    assert_eq!(info.progress, Progress::Indeterminate);
    assert_eq!(info.label.as_deref(), Some("1"));
}

#[test]
fn double_tap_at_max_zoom_resets_to_one() {
    let mut g = Gallery::new(
        PageCount::Ready(1),
        GalleryBuilder::new().scale_mode(ScaleMode::Fit),
    );
    // Fit gives 2x; the canonical scales are 1, 2, 4 and 8.
    g.preload(0, 500, 250);
    g.settle();
    let scale = |g: &Gallery| {
        let id = g.view.pager().current().unwrap();
        g.view.host().cells()[id].transform().current_scale()
    };
    assert_eq!(scale(&g), 2.0);

    for expected in [4.0, 8.0, 1.0] {
        g.handle
            .gesture(Gesture::DoubleTapConfirmed { x: 500.0, y: 500.0 });
        g.settle();
        assert!((scale(&g) - expected).abs() < 1e-6, "{} != {expected}", scale(&g));
    }
}

#[test]
fn placement_spans_or_centers_on_each_axis() {
    let modes = [
        ScaleMode::Origin,
        ScaleMode::FitWidth,
        ScaleMode::FitHeight,
        ScaleMode::Fit,
        ScaleMode::Fixed,
    ];
    let sizes = [(500, 250), (400, 1600), (1200, 900)];
    for mode in modes {
        for (w, h) in sizes {
            let mut g = Gallery::new(PageCount::Ready(1), GalleryBuilder::new().scale_mode(mode));
            g.preload(0, w, h);
            let scene = g.settle();
            let dst = scene.page(0).and_then(|p| p.image.as_ref()).unwrap().dst;
            for (lo, hi, extent) in [(dst.x0, dst.x1, W), (dst.y0, dst.y1, H)] {
                let extent = f64::from(extent);
                if hi - lo > extent + 1.0 {
                    // Larger than the screen: no gap on either side.
                    assert!(lo <= 1.0 && hi >= extent - 1.0, "{mode:?} {w}x{h}: {dst:?}");
                } else {
                    let centered = ((lo + hi) / 2.0 - extent / 2.0).abs() <= 1.0;
                    assert!(centered, "{mode:?} {w}x{h}: {dst:?}");
                }
            }
        }
    }
}

#[test]
fn cache_evicts_least_recently_used_page() {
    // Room for exactly two 100x100 pages.
    let budget = 2 * 100 * 100 * 4;
    let mut g = Gallery::new(PageCount::Ready(3), GalleryBuilder::new().cache_budget(budget));
    for i in 0..3 {
        g.preload(i, 100, 100);
    }
    let scene = g.frame();
    // Page 0 was evicted by page 2 and has to be produced again.
    assert!(scene.page(0).unwrap().info.is_some());
    let stats = g.view.cache_stats();
    assert_eq!((stats.hits, stats.misses, stats.evictions), (1, 1, 1));
    assert_eq!(*g.requests.lock().unwrap(), vec![(0, false)]);

    // The neighbour was bound from the cache.
    g.handle.page_right();
    let scene = g.settle();
    assert!(scene.page(1).unwrap().image.is_some());
}

#[test]
fn cache_weight_stays_within_budget() {
    let mut cache = ImageCache::new(1000);
    let page = |w, h, animated| Arc::new(PageImage::new(w, h, animated, Vec::new()));
    assert!(cache.put(0, page(10, 10, false)));
    assert!(cache.put(1, page(10, 10, false)));
    cache.get(0);
    assert!(cache.put(2, page(10, 10, false)));
    // 1 was least recently used.
    assert!(!cache.contains(1));
    assert!(cache.contains(0) && cache.contains(2));
    assert!(cache.used() <= cache.budget());

    // Animated pages weigh five times as much: 10x10x4x5 = 2000.
    assert!(!cache.put(3, page(10, 10, true)));
    assert!(!cache.contains(3));
    assert!(cache.used() <= cache.budget());
}

#[test]
fn repeated_frames_keep_cell_bounds() {
    for mode in [LayoutMode::LeftToRight, LayoutMode::TopToBottom] {
        let mut g = Gallery::new(
            PageCount::Ready(10),
            GalleryBuilder::new().layout_mode(mode).start_page(4),
        );
        let bounds = |scene: &Scene| -> Vec<(usize, Rect)> {
            scene.pages.iter().map(|p| (p.index, p.bounds)).collect()
        };
        let first = bounds(&g.settle());
        let second = bounds(&g.frame());
        assert!(!first.is_empty());
        assert_eq!(first, second, "{mode:?}");
    }
}

#[test]
fn mode_round_trip_keeps_current_index() {
    let mut g = Gallery::new(
        PageCount::Ready(10),
        GalleryBuilder::new().layout_mode(LayoutMode::TopToBottom),
    );
    for i in 0..10 {
        g.preload(i, 1000, 500);
    }
    g.frame();
    g.handle.set_current_page(4);
    g.settle();
    assert_eq!(g.view.current_index(), Some(4));

    g.handle.set_layout_mode(LayoutMode::LeftToRight);
    g.settle();
    assert_eq!(g.view.active_kind(), Some(ManagerKind::Pager));
    assert_eq!(g.view.current_index(), Some(4));

    g.handle.set_layout_mode(LayoutMode::TopToBottom);
    g.settle();
    assert_eq!(g.view.active_kind(), Some(ManagerKind::Scroll));
    assert_eq!(g.view.current_index(), Some(4));
}

#[test]
fn pager_edges_bounce_or_transfer() {
    let mut g = Gallery::new(PageCount::Ready(3), GalleryBuilder::new());
    g.settle();
    assert!(g.view.pager().previous().is_none());
    assert!(g.view.pager().next().is_some());

    // Paging left at the first page bounces against the left edge.
    g.handle.page_left();
    let glowed = (0..10).any(|_| {
        let scene = g.frame();
        scene.glows.iter().any(|glow| glow.edge == Edge::Left)
    });
    assert!(glowed);
    g.settle();
    assert_eq!(g.view.current_index(), Some(0));
    assert!(!g.events().contains(&GalleryEvent::AutoTransferDone));

    g.handle.set_current_page(2);
    g.settle();
    assert!(g.view.pager().next().is_none());
    g.handle.page_right();
    g.frame();
    assert!(g.events().contains(&GalleryEvent::AutoTransferDone));
    assert_eq!(g.view.current_index(), Some(2));
}

#[test]
fn gallery_level_states_show_overlays() {
    let mut g = Gallery::with_error(
        PageCount::Error,
        GalleryBuilder::new(),
        Some("Gallery removed"),
    );
    let scene = g.frame();
    assert_eq!(
        scene.overlay,
        Some(Overlay::Message("Gallery removed".into()))
    );
    assert!(scene.pages.is_empty());

    let mut g = Gallery::new(PageCount::Error, GalleryBuilder::new().default_error("Oops"));
    assert_eq!(g.frame().overlay, Some(Overlay::Message("Oops".into())));

    let mut g = Gallery::new(PageCount::Ready(0), GalleryBuilder::new().empty_text("Nothing"));
    let scene = g.frame();
    assert_eq!(scene.overlay, Some(Overlay::Message("Nothing".into())));
    assert!(g.view.cells().is_empty());
}

#[test]
fn page_failure_shows_error_and_retries() {
    let mut g = Gallery::new(PageCount::Ready(3), GalleryBuilder::new());
    g.frame();
    g.notifier
        .notify_page_failed(0, &PageError::Network("timeout".into()));
    let scene = g.frame();
    let info = scene.page(0).and_then(|p| p.info.clone()).unwrap();
    assert_eq!(info.error.as_deref(), Some("Network error: timeout"));
    assert_eq!(info.progress, Progress::Gone);

    // Tapping the error text asks the host to retry.
    let center = info.rect.center();
    g.handle.gesture(Gesture::SingleTapConfirmed {
        x: center.x,
        y: center.y,
    });
    g.frame();
    assert!(g.events().contains(&GalleryEvent::TapErrorText(0)));
    g.handle.retry(0);
    g.frame();
    assert!(g.requests.lock().unwrap().contains(&(0, true)));
}

#[test]
fn stale_notifications_are_ignored() {
    let mut g = Gallery::new(PageCount::Ready(10), GalleryBuilder::new());
    let before = g.settle();
    // Page 7 is not bound in the pager window around page 0.
    g.notifier.notify_page_percent(7, 0.5);
    g.notifier
        .notify_page_failed(8, &PageError::Decode);
    g.preload(9, 100, 100);
    let after = g.frame();
    let indices = |s: &Scene| s.pages.iter().map(|p| p.index).collect::<Vec<_>>();
    assert_eq!(indices(&before), indices(&after));
    assert!(after.page(0).unwrap().info.as_ref().unwrap().error.is_none());

    // The stored result still serves a later bind.
    g.handle.set_current_page(9);
    let scene = g.settle();
    assert!(scene.page(9).unwrap().image.is_some());
}

#[test]
fn progress_updates_reach_the_bound_cell() {
    let mut g = Gallery::new(PageCount::Ready(2), GalleryBuilder::new().show_index(false));
    g.frame();
    g.notifier.notify_page_wait(0);
    g.notifier.notify_page_percent(0, 0.25);
    let scene = g.frame();
    let info = scene.page(0).and_then(|p| p.info.clone()).unwrap();
    assert_eq!(info.progress, Progress::Percent(0.25));
    assert_eq!(info.label, None);
}
