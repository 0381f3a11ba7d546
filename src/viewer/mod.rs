//! Terminal gallery viewer.
//!
//! Layout:
//!   row 0..term_rows-1 : gallery, painted from each frame's `Scene`
//!   row term_rows-1    : status bar
//!
//! Threads:
//!   The render loop owns the `GalleryView` and is the only thread that
//!   touches page state. A worker thread produces pages and reports back
//!   through the view's `PageNotifier`; key and mouse input turn into
//!   `GalleryHandle` commands executed at the start of the next frame.
//!
//! The loop redraws at most once per frame budget while something is
//! changing, and otherwise wakes at `IDLE_POLL` to pick up page results
//! and gesture timeouts.

mod input;
mod source;
mod terminal;

use crossterm::{
    event::{self, Event},
    terminal as crossterm_terminal,
};
use log::{debug, info};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crate::config::Config;
use crate::gallery::{GalleryEvent, GalleryHandle, GalleryView};
use crate::gesture::{Gesture, GestureRecognizer, TouchEvent};
use crate::provider::PageCount;
use crate::transform::ScaleMode;

use input::{Action, InputAccumulator, Pointer, map_key_event, map_mouse_event};
use source::SyntheticSource;
use terminal::{Layout, PX_PER_ROW, Status};

pub use source::SourceOptions;

const IDLE_POLL: Duration = Duration::from_millis(50);
const SCROLL_STEP_ROWS: u16 = 3;
const ZOOM_STEP: f64 = 1.25;

/// Run the terminal viewer against a synthetic gallery.
pub fn run(config: Config, opts: SourceOptions) -> anyhow::Result<()> {
    terminal::check_tty()?;

    let (term_cols, term_rows) = crossterm_terminal::size()
        .map_err(|e| anyhow::anyhow!("failed to get terminal size: {e}"))?;
    let layout = terminal::compute_layout(term_cols, term_rows);
    if layout.image_rows == 0 || layout.cols == 0 {
        anyhow::bail!("terminal is too small ({term_cols}x{term_rows})");
    }
    info!(
        "viewer: {term_cols}x{term_rows} cells, {} pages, latency={}ms, fail_every={}",
        opts.pages,
        opts.latency.as_millis(),
        opts.fail_every
    );

    let mut guard = terminal::RawGuard::enter()?;

    // The view (and with it the job sender) is dropped before the scope
    // joins the worker, which then sees its channel close.
    let result = thread::scope(|s| -> anyhow::Result<()> {
        let count = Arc::new(Mutex::new(PageCount::Wait));
        let (job_tx, job_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        let mut view = config
            .builder()
            .listener(event_tx)
            .build(Box::new(SyntheticSource::new(Arc::clone(&count), job_tx)));
        let (w, h) = layout.gallery_size();
        view.handle().resize(w, h);

        let notifier = view.notifier();
        s.spawn(move || source::run_worker(job_rx, notifier, count, opts));

        let mut session = Session {
            layout,
            scale: config.gallery.scale,
            acc: InputAccumulator::new(),
            flash: None,
            recognizer: GestureRecognizer::new(config.gesture.density),
            start: Instant::now(),
        };
        let result = session.event_loop(&mut view, &event_rx, config.gallery.frame_budget);
        view.shutdown();
        result
    });

    guard.cleanup();
    result
}

struct Session {
    layout: Layout,
    scale: ScaleMode,
    acc: InputAccumulator,
    /// One-shot message, cleared on the next keypress.
    flash: Option<String>,
    recognizer: GestureRecognizer,
    start: Instant,
}

impl Session {
    fn now(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    fn event_loop(
        &mut self,
        view: &mut GalleryView,
        events: &Receiver<GalleryEvent>,
        frame_budget: Duration,
    ) -> anyhow::Result<()> {
        let handle = view.handle();
        let mut dirty = true;
        let mut last_render = Instant::now();

        loop {
            let timeout = if dirty {
                frame_budget.saturating_sub(last_render.elapsed())
            } else {
                IDLE_POLL
            };

            if event::poll(timeout)? {
                let ev = event::read()?;
                debug!("event: {:?}", ev);
                match ev {
                    Event::Key(key_event) => {
                        self.flash = None;
                        match map_key_event(key_event, &mut self.acc) {
                            Some(Action::Quit) => return Ok(()),
                            Some(action) => self.apply(action, view, &handle),
                            // Unknown key: reset accumulator
                            None => self.acc.reset(),
                        }
                    }
                    Event::Mouse(mouse_event) => match map_mouse_event(mouse_event) {
                        Some(Pointer::Touch { kind, col, row }) => {
                            let (x, y) = self.layout.cell_center(col, row);
                            let touch = TouchEvent::single(kind, self.now(), x, y);
                            handle.gestures(self.recognizer.on_touch_event(&touch));
                        }
                        Some(Pointer::Wheel(notches)) => self.scroll_by(&handle, notches),
                        None => {}
                    },
                    Event::Resize(new_cols, new_rows) => {
                        self.layout = terminal::compute_layout(new_cols, new_rows);
                        let (w, h) = self.layout.gallery_size();
                        debug!("resize: {new_cols}x{new_rows} cells -> {w}x{h} px");
                        handle.resize(w, h);
                    }
                    _ => {}
                }
                dirty = true;
                continue;
            }

            // poll timeout → run a frame
            let now = self.now();
            handle.gestures(self.recognizer.tick(now));
            let (scene, more) = view.frame(now);
            let mut heard = false;
            for event in events.try_iter() {
                heard = true;
                if let Some(msg) = self.on_gallery_event(event, &handle) {
                    self.flash = Some(msg);
                }
            }
            if dirty || more || heard {
                terminal::draw_scene(&scene, &self.layout)?;
                let count = view.page_count();
                terminal::draw_status_bar(
                    &self.layout,
                    &Status {
                        mode: view.layout_mode().name(),
                        scale: self.scale.name(),
                        page: view.current_index(),
                        count,
                        prefix: self.acc.peek(),
                        flash: self.flash.as_deref(),
                    },
                )?;
            }
            dirty = more || heard;
            last_render = Instant::now();
        }
    }

    fn center(&self) -> (f64, f64) {
        let (w, h) = self.layout.gallery_size();
        (f64::from(w) / 2.0, f64::from(h) / 2.0)
    }

    /// A one-finger drag of `notches` scroll steps; positive moves down.
    fn scroll_by(&self, handle: &GalleryHandle, notches: i32) {
        let (x, y) = self.center();
        let dy = f64::from(notches) * f64::from(SCROLL_STEP_ROWS * PX_PER_ROW);
        handle.gestures([
            Gesture::Down { x, y },
            Gesture::Scroll {
                dx: 0.0,
                dy,
                total_x: 0.0,
                total_y: dy,
                x,
                y: y - dy,
            },
            Gesture::Up,
        ]);
    }

    fn zoom(&self, handle: &GalleryHandle, factor: f64) {
        let (focus_x, focus_y) = self.center();
        handle.gestures([
            Gesture::Down {
                x: focus_x,
                y: focus_y,
            },
            Gesture::ScaleBegin { focus_x, focus_y },
            Gesture::Scale {
                focus_x,
                focus_y,
                factor,
            },
            Gesture::ScaleEnd,
            Gesture::Up,
        ]);
    }

    fn apply(&mut self, action: Action, view: &mut GalleryView, handle: &GalleryHandle) {
        debug!("action: {action:?}");
        match action {
            Action::PageLeft(count) => (0..count).for_each(|_| handle.page_left()),
            Action::PageRight(count) => (0..count).for_each(|_| handle.page_right()),
            Action::ScrollDown(count) => self.scroll_by(handle, count as i32),
            Action::ScrollUp(count) => self.scroll_by(handle, -(count as i32)),
            Action::ZoomIn => self.zoom(handle, ZOOM_STEP),
            Action::ZoomOut => self.zoom(handle, 1.0 / ZOOM_STEP),
            Action::ToggleZoom => {
                let (x, y) = self.center();
                handle.gestures([
                    Gesture::Down { x, y },
                    Gesture::Up,
                    Gesture::DoubleTapConfirmed { x, y },
                ]);
            }
            Action::CycleLayout => {
                let mode = view.layout_mode().cycle();
                handle.set_layout_mode(mode);
                self.flash = Some(format!("layout: {}", mode.name()));
            }
            Action::CycleScale => {
                self.scale = self.scale.cycle();
                handle.set_scale_mode(self.scale);
                self.flash = Some(format!("scale: {}", self.scale.name()));
            }
            Action::JumpToFirst => handle.set_current_page(0),
            Action::JumpToLast => {
                if let PageCount::Ready(n) = view.page_count()
                    && n > 0
                {
                    handle.set_current_page(n - 1);
                }
            }
            Action::JumpToPage(n) => handle.set_current_page((n as usize).saturating_sub(1)),
            Action::Retry => match view.current_index() {
                Some(index) => {
                    handle.retry(index);
                    self.flash = Some(format!("retrying page {}", index + 1));
                }
                None => self.flash = Some("no page to retry".into()),
            },
            Action::Quit | Action::CancelInput | Action::Digit => {}
        }
    }

    /// React to a listener event; returns a message for the status bar.
    fn on_gallery_event(&self, event: GalleryEvent, handle: &GalleryHandle) -> Option<String> {
        debug!("gallery event: {event:?}");
        match event {
            GalleryEvent::CurrentIndex(_) => None,
            GalleryEvent::TapSliderArea => Some("slider".into()),
            GalleryEvent::TapMenuArea => Some("menu".into()),
            GalleryEvent::TapErrorText(index) => {
                handle.retry(index);
                Some(format!("retrying page {}", index + 1))
            }
            GalleryEvent::LongPressPage(index) => Some(format!("page {}", index + 1)),
            GalleryEvent::AutoTransferDone => Some("no more pages".into()),
        }
    }
}
