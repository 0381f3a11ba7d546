//! Drive a gallery from fuzzer bytes and check what must always hold.
//!
//! Byte 0 picks the page count; every following 4-byte chunk is one step
//! `[op, a, b, c]`, after which a frame runs `c` ms later. Some steps are
//! semantic gestures, others raw touches fed through the recognizer.

use folio::cache::PageImage;
use folio::gallery::{GalleryBuilder, GalleryView, LayoutMode};
use folio::gesture::{Gesture, GestureRecognizer, TouchEvent, TouchKind};
use folio::layout::ManagerKind;
use folio::provider::{PageCount, PageError, PageNotifier, PageSource};
use folio::scene::Scene;
use folio::transform::ScaleMode;
use kurbo::Point;

const BUDGET: usize = 4 * 64 * 64 * 4;

struct Fixed(usize);

impl PageSource for Fixed {
    fn size(&self) -> PageCount {
        PageCount::Ready(self.0)
    }
    fn error(&self) -> Option<String> {
        None
    }
    fn on_request(&mut self, _index: usize) {}
    fn on_force_request(&mut self, _index: usize) {}
    fn on_cancel_request(&mut self, _index: usize) {}
}

fn point(a: u8, b: u8) -> (f64, f64) {
    (f64::from(a) * 4.0, f64::from(b) * 4.0)
}

fn signed(v: u8) -> f64 {
    f64::from(v as i8)
}

struct Driver {
    view: GalleryView,
    notifier: PageNotifier,
    recognizer: GestureRecognizer,
    pages: usize,
    layout: LayoutMode,
    scale: ScaleMode,
    now: u64,
}

impl Driver {
    fn step(&mut self, op: u8, a: u8, b: u8, c: u8) {
        let handle = self.view.handle();
        let (x, y) = point(a, b);
        match op % 20 {
            0 => handle.gesture(Gesture::Down { x, y }),
            1 => handle.gesture(Gesture::Scroll {
                dx: signed(a) * 4.0,
                dy: signed(b) * 4.0,
                total_x: signed(a) * 4.0,
                total_y: signed(b) * 4.0,
                x,
                y,
            }),
            2 => handle.gesture(Gesture::Up),
            3 => handle.gesture(Gesture::Fling {
                velocity_x: signed(a) * 100.0,
                velocity_y: signed(b) * 100.0,
            }),
            4 => handle.gesture(Gesture::DoubleTapConfirmed { x, y }),
            5 => handle.gestures([
                Gesture::PointerDown { x, y },
                Gesture::ScaleBegin {
                    focus_x: x,
                    focus_y: y,
                },
                Gesture::Scale {
                    focus_x: x,
                    focus_y: y,
                    factor: 0.5 + f64::from(c) / 128.0,
                },
                Gesture::ScaleEnd,
                Gesture::PointerUp,
            ]),
            6 => handle.gesture(Gesture::SingleTapConfirmed { x, y }),
            7 => handle.gesture(Gesture::LongPress { x, y }),
            8 => handle.page_left(),
            9 => handle.page_right(),
            10 => handle.set_current_page(usize::from(a)),
            11 => {
                self.layout = self.layout.cycle();
                handle.set_layout_mode(self.layout);
            }
            12 => {
                self.scale = self.scale.cycle();
                handle.set_scale_mode(self.scale);
            }
            13 => handle.resize(i32::from(a) * 8 + 1, i32::from(b) * 8 + 1),
            14 => {
                let (w, h) = (u32::from(b) + 1, u32::from(c) + 1);
                let pixels = vec![0x80; w as usize * h as usize * 4];
                self.notifier.notify_page_succeed(
                    usize::from(a),
                    PageImage::new(w, h, c & 1 == 1, pixels),
                );
            }
            15 => self
                .notifier
                .notify_page_failed(usize::from(a), &PageError::Decode),
            op => {
                let second = Point::new(f64::from(c) * 4.0, y);
                let (kind, pointers) = match op {
                    16 => (TouchKind::Down, vec![Point::new(x, y)]),
                    17 if c & 1 == 1 => (TouchKind::Move, vec![Point::new(x, y), second]),
                    17 => (TouchKind::Move, vec![Point::new(x, y)]),
                    18 => (TouchKind::PointerDown, vec![Point::new(x, y), second]),
                    _ => match c % 3 {
                        0 => (TouchKind::Up, vec![Point::new(x, y)]),
                        1 => (TouchKind::PointerUp(1), vec![Point::new(x, y), second]),
                        _ => (TouchKind::Cancel, vec![Point::new(x, y)]),
                    },
                };
                let touch = TouchEvent::new(kind, self.now, pointers);
                handle.gestures(self.recognizer.on_touch_event(&touch));
            }
        }

        self.now += u64::from(c);
        handle.gestures(self.recognizer.tick(self.now));
        let (scene, _) = self.view.frame(self.now);
        self.check(&scene);
    }

    fn check(&mut self, scene: &Scene) {
        for page in &scene.pages {
            assert!(page.index < self.pages, "page {} of {}", page.index, self.pages);
            if let Some(image) = &page.image {
                assert!((0.0..=1.0).contains(&image.alpha));
                assert!(image.src.width() <= f64::from(image.image.width()) + 1.0);
            }
        }
        if let Some(index) = self.view.current_index() {
            assert!(index < self.pages);
        }
        if self.view.active_kind() == Some(ManagerKind::Pager) {
            assert!(self.view.cells().len() <= 3);
        }
    }
}

pub fn run(data: &[u8]) {
    let Some((&first, rest)) = data.split_first() else {
        return;
    };
    let pages = usize::from(first % 32);
    let view = GalleryBuilder::new()
        .cache_budget(BUDGET)
        .build(Box::new(Fixed(pages)));
    view.handle().resize(800, 600);
    let notifier = view.notifier();
    let mut driver = Driver {
        view,
        notifier,
        recognizer: GestureRecognizer::new(1.0),
        pages,
        layout: LayoutMode::LeftToRight,
        scale: ScaleMode::Fit,
        now: 0,
    };
    for chunk in rest.chunks_exact(4) {
        driver.step(chunk[0], chunk[1], chunk[2], chunk[3]);
    }
    // Let animations run out.
    for _ in 0..1000 {
        driver.now += 16;
        let (scene, more) = driver.view.frame(driver.now);
        driver.check(&scene);
        if !more {
            break;
        }
    }
    driver.view.shutdown();
}
