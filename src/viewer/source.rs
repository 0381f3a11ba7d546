//! Synthetic page producer for the terminal viewer.
//!
//! [`SyntheticSource`] only forwards requests to a worker thread; the
//! worker "decodes" pages after a configurable latency and reports back
//! through a [`PageNotifier`].

use std::collections::VecDeque;
use std::sync::mpsc::{Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use log::{debug, error, info};

use crate::cache::PageImage;
use crate::provider::{PageCount, PageError, PageNotifier, PageSource, lock};

const PAGE_WIDTH: u32 = 600;
const PROGRESS_STEPS: u32 = 4;

/// Behavior of the synthetic gallery.
#[derive(Debug, Clone, Copy)]
pub struct SourceOptions {
    pub pages: usize,
    /// Per-page decode time; the page count is also announced after it.
    pub latency: Duration,
    /// Every `fail_every`-th page fails on its first request; 0 disables.
    pub fail_every: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Job {
    Request { index: usize, force: bool },
    Cancel(usize),
}

pub(super) struct SyntheticSource {
    count: Arc<Mutex<PageCount>>,
    jobs: Sender<Job>,
}

impl SyntheticSource {
    pub(super) fn new(count: Arc<Mutex<PageCount>>, jobs: Sender<Job>) -> Self {
        Self { count, jobs }
    }

    fn send(&self, job: Job) {
        if self.jobs.send(job).is_err() {
            debug!("source: worker is gone, dropping {job:?}");
        }
    }
}

impl PageSource for SyntheticSource {
    fn size(&self) -> PageCount {
        *lock(&self.count)
    }

    fn error(&self) -> Option<String> {
        None
    }

    fn on_request(&mut self, index: usize) {
        self.send(Job::Request {
            index,
            force: false,
        });
    }

    fn on_force_request(&mut self, index: usize) {
        self.send(Job::Request { index, force: true });
    }

    fn on_cancel_request(&mut self, index: usize) {
        self.send(Job::Cancel(index));
    }
}

/// Page height cycles through portrait, tall strip and landscape.
pub(super) fn page_height(index: usize) -> u32 {
    match index % 3 {
        0 => 800,
        1 => 1400,
        _ => 420,
    }
}

fn hue_to_rgb(hue: f64) -> [u8; 3] {
    let h = (hue.rem_euclid(1.0)) * 6.0;
    let x = 1.0 - (h % 2.0 - 1.0).abs();
    let (r, g, b) = match h as u32 {
        0 => (1.0, x, 0.0),
        1 => (x, 1.0, 0.0),
        2 => (0.0, 1.0, x),
        3 => (0.0, x, 1.0),
        4 => (x, 0.0, 1.0),
        _ => (1.0, 0.0, x),
    };
    let scale = |c: f64| (60.0 + c * 150.0) as u8;
    [scale(r), scale(g), scale(b)]
}

/// Render page `index`: a tinted sheet with a border and diagonal stripes.
pub(super) fn render_page(index: usize) -> PageImage {
    let (w, h) = (PAGE_WIDTH, page_height(index));
    let base = hue_to_rgb(index as f64 * 0.13);
    let mut pixels = Vec::with_capacity(w as usize * h as usize * 4);
    for y in 0..h {
        for x in 0..w {
            let border = x < 12 || y < 12 || x >= w - 12 || y >= h - 12;
            let stripe = ((x + y) / 40).is_multiple_of(2);
            let rgb = if border {
                [235, 235, 235]
            } else if stripe {
                base
            } else {
                base.map(|c| c / 2)
            };
            pixels.extend_from_slice(&[rgb[0], rgb[1], rgb[2], 255]);
        }
    }
    PageImage::new(w, h, false, pixels)
}

fn should_fail(index: usize, force: bool, fail_every: usize) -> bool {
    !force && fail_every > 0 && (index + 1).is_multiple_of(fail_every)
}

/// Queue of pending requests after applying `job`.
pub(super) fn enqueue(queue: &mut VecDeque<(usize, bool)>, job: Job) {
    match job {
        Job::Request { index, force } => {
            if let Some(pending) = queue.iter_mut().find(|(i, _)| *i == index) {
                pending.1 |= force;
            } else {
                queue.push_back((index, force));
            }
        }
        Job::Cancel(index) => queue.retain(|(i, _)| *i != index),
    }
}

/// Worker loop. Exits when every job sender is dropped.
pub(super) fn run_worker(
    jobs: Receiver<Job>,
    notifier: PageNotifier,
    count: Arc<Mutex<PageCount>>,
    opts: SourceOptions,
) {
    debug!("source worker: started");
    thread::sleep(opts.latency);
    *lock(&count) = PageCount::Ready(opts.pages);
    info!("source worker: gallery ready with {} pages", opts.pages);
    notifier.notify_data_changed();

    let step = opts.latency / PROGRESS_STEPS;
    let mut queue = VecDeque::new();
    while let Ok(job) = jobs.recv() {
        enqueue(&mut queue, job);
        loop {
            for job in jobs.try_iter() {
                enqueue(&mut queue, job);
            }
            let Some((index, force)) = queue.pop_front() else {
                break;
            };
            if index >= opts.pages {
                error!("source worker: request for page {index} out of range");
                notifier.notify_page_failed(index, &PageError::NotFound);
                continue;
            }
            notifier.notify_page_wait(index);
            for i in 1..PROGRESS_STEPS {
                thread::sleep(step);
                notifier.notify_page_percent(index, i as f32 / PROGRESS_STEPS as f32);
            }
            thread::sleep(step);
            if should_fail(index, force, opts.fail_every) {
                notifier.notify_page_failed(index, &PageError::Decode);
            } else {
                notifier.notify_page_succeed(index, render_page(index));
            }
        }
    }
    debug!("source worker: channel closed, exiting");
}
