//! Bridge between a background page producer and the render thread.
//!
//! Producers own a [`PageNotifier`] and report progress from any thread.
//! Notifications travel over a channel and are applied to bound cells only
//! when the controller drains them at the start of a frame.

use std::fmt;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard};

use kurbo::Size;
use log::{debug, trace, warn};
use thiserror::Error;

use crate::cache::{ImageCache, PageImage};
use crate::cell::{PageCell, Progress};

/// Page count as reported by a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageCount {
    /// Not known yet.
    Wait,
    /// The gallery failed; [`PageSource::error`] has the message.
    Error,
    Ready(usize),
}

/// Why a single page could not be produced. The display text is shown in
/// the page's cell.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PageError {
    #[error("{0}")]
    Message(String),
    #[error("Decode error")]
    Decode,
    #[error("Network error: {0}")]
    Network(String),
    #[error("Page not found")]
    NotFound,
}

/// The external producer of page content.
///
/// `on_request` and friends are called on the render thread and must not
/// block; results come back later through the [`PageNotifier`].
pub trait PageSource: Send {
    fn size(&self) -> PageCount;

    /// Message for [`PageCount::Error`]; `None` means use the default text.
    fn error(&self) -> Option<String>;

    fn on_request(&mut self, index: usize);

    /// Request again even if a previous attempt failed.
    fn on_force_request(&mut self, index: usize);

    fn on_cancel_request(&mut self, index: usize);
}

#[derive(Debug, Clone)]
pub enum Notification {
    /// `None`: the whole gallery changed. `Some(i)`: page `i` should be
    /// requested again.
    DataChanged(Option<usize>),
    PageWait(usize),
    PagePercent(usize, f32),
    PageSucceed(usize, Arc<PageImage>),
    PageFailed(usize, String),
}

impl Notification {
    pub fn index(&self) -> Option<usize> {
        match self {
            Notification::DataChanged(index) => *index,
            Notification::PageWait(i)
            | Notification::PagePercent(i, _)
            | Notification::PageSucceed(i, _)
            | Notification::PageFailed(i, _) => Some(*i),
        }
    }
}

/// Lock that shrugs off poisoning. Every value guarded this way stays
/// consistent if a holder panics mid-update.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Producer-side handle. Cheap to clone and safe to send to worker threads.
#[derive(Debug, Clone)]
pub struct PageNotifier {
    tx: Sender<Notification>,
    cache: Arc<Mutex<ImageCache>>,
}

impl PageNotifier {
    fn send(&self, note: Notification) {
        trace!("notify: {note:?}");
        if self.tx.send(note).is_err() {
            debug!("notify: render side is gone, dropping notification");
        }
    }

    pub fn notify_data_changed(&self) {
        self.send(Notification::DataChanged(None));
    }

    pub fn notify_page_changed(&self, index: usize) {
        self.send(Notification::DataChanged(Some(index)));
    }

    pub fn notify_page_wait(&self, index: usize) {
        self.send(Notification::PageWait(index));
    }

    pub fn notify_page_percent(&self, index: usize, percent: f32) {
        self.send(Notification::PagePercent(index, percent.clamp(0.0, 1.0)));
    }

    /// Store the page in the cache, then tell the render thread.
    pub fn notify_page_succeed(&self, index: usize, image: PageImage) {
        let image = Arc::new(image);
        lock(&self.cache).put(index, Arc::clone(&image));
        self.send(Notification::PageSucceed(index, image));
    }

    pub fn notify_page_failed(&self, index: usize, error: &PageError) {
        warn!("page {index} failed: {error}");
        self.send(Notification::PageFailed(index, error.to_string()));
    }
}

/// Render-side owner of the source, the cache and the notification queue.
pub struct GalleryProvider {
    source: Box<dyn PageSource>,
    cache: Arc<Mutex<ImageCache>>,
    tx: Sender<Notification>,
    rx: Receiver<Notification>,
    started: bool,
}

impl GalleryProvider {
    pub fn new(source: Box<dyn PageSource>, cache_budget: usize) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            source,
            cache: Arc::new(Mutex::new(ImageCache::new(cache_budget))),
            tx,
            rx,
            started: false,
        }
    }

    pub fn notifier(&self) -> PageNotifier {
        PageNotifier {
            tx: self.tx.clone(),
            cache: Arc::clone(&self.cache),
        }
    }

    pub fn start(&mut self) {
        assert!(!self.started, "gallery provider started twice");
        self.started = true;
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn stop(&mut self) {
        lock(&self.cache).evict_all();
    }

    pub fn size(&self) -> PageCount {
        self.source.size()
    }

    pub fn error(&self) -> Option<String> {
        self.source.error()
    }

    /// Cached content is returned at once; otherwise the source is asked.
    pub fn request(&mut self, index: usize) -> Option<Arc<PageImage>> {
        let hit = lock(&self.cache).get(index);
        if hit.is_none() {
            self.source.on_request(index);
        }
        hit
    }

    pub fn force_request(&mut self, index: usize) {
        self.source.on_force_request(index);
    }

    pub fn cancel_request(&mut self, index: usize) {
        self.source.on_cancel_request(index);
    }

    pub fn remove_cache(&mut self, index: usize) {
        lock(&self.cache).remove(index);
    }

    pub fn with_cache<R>(&self, f: impl FnOnce(&ImageCache) -> R) -> R {
        f(&lock(&self.cache))
    }

    pub fn drain(&mut self) -> Vec<Notification> {
        self.rx.try_iter().collect()
    }
}

impl fmt::Debug for GalleryProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GalleryProvider")
            .field("size", &self.source.size())
            .field("started", &self.started)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Adapter
// ---------------------------------------------------------------------------

/// Binds cells to pages and applies provider notifications to them.
#[derive(Debug)]
pub struct PageAdapter {
    provider: GalleryProvider,
    show_index: bool,
}

impl PageAdapter {
    pub fn new(provider: GalleryProvider) -> Self {
        Self {
            provider,
            show_index: true,
        }
    }

    pub fn provider(&self) -> &GalleryProvider {
        &self.provider
    }

    pub fn provider_mut(&mut self) -> &mut GalleryProvider {
        &mut self.provider
    }

    pub fn set_show_index(&mut self, show: bool) {
        self.show_index = show;
    }

    pub fn size(&self) -> PageCount {
        self.provider.size()
    }

    pub fn error(&self) -> Option<String> {
        self.provider.error()
    }

    fn label(&self, index: usize) -> Option<String> {
        self.show_index.then(|| (index + 1).to_string())
    }

    fn show_info(&self, cell: &mut PageCell, index: usize, progress: Progress) {
        cell.clear_image();
        cell.set_label(self.label(index));
        cell.set_progress(progress);
        cell.set_error(None);
    }

    fn show_image(&self, cell: &mut PageCell, index: usize, image: Arc<PageImage>, screen: Size) {
        cell.show_image(image, screen);
        cell.set_label(self.label(index));
        cell.set_progress(Progress::Gone);
        cell.set_error(None);
    }

    pub fn bind(&mut self, cell: &mut PageCell, index: usize, screen: Size) {
        let hit = self.provider.request(index);
        self.show_info(cell, index, Progress::Indeterminate);
        cell.set_index(Some(index));
        if let Some(image) = hit {
            self.show_image(cell, index, image, screen);
        }
    }

    pub fn unbind(&mut self, cell: &mut PageCell) {
        if let Some(index) = cell.index() {
            self.provider.cancel_request(index);
        }
        cell.clear_image();
        cell.set_error(None);
        cell.set_index(None);
    }

    /// Re-request a bound page, applying a cache hit immediately.
    pub fn rerequest(&mut self, cell: &mut PageCell, screen: Size) {
        let Some(index) = cell.index() else {
            return;
        };
        if let Some(image) = self.provider.request(index) {
            self.show_image(cell, index, image, screen);
        }
    }

    /// Ask the source again for a page that failed.
    pub fn retry(&mut self, cell: &mut PageCell) {
        let Some(index) = cell.index() else {
            return;
        };
        self.show_info(cell, index, Progress::Indeterminate);
        self.provider.force_request(index);
    }

    /// Apply a page-level notification to the cell bound to its index.
    pub fn apply(&mut self, note: Notification, cell: &mut PageCell, screen: Size) {
        let Some(index) = cell.index() else {
            return;
        };
        if note.index() != Some(index) {
            return;
        }
        match note {
            Notification::DataChanged(_) => self.rerequest(cell, screen),
            Notification::PageWait(_) => self.show_info(cell, index, Progress::Indeterminate),
            Notification::PagePercent(_, percent) => {
                self.show_info(cell, index, Progress::Percent(percent))
            }
            Notification::PageSucceed(_, image) => self.show_image(cell, index, image, screen),
            Notification::PageFailed(_, error) => {
                self.show_info(cell, index, Progress::Gone);
                cell.set_error(Some(error));
            }
        }
    }

    pub fn drain(&mut self) -> Vec<Notification> {
        self.provider.drain()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_recovers_from_poisoning() {
        let count = Arc::new(Mutex::new(PageCount::Wait));
        let shared = Arc::clone(&count);
        let joined = std::thread::spawn(move || {
            let mut guard = shared.lock().unwrap();
            *guard = PageCount::Ready(3);
            panic!("worker died");
        })
        .join();
        assert!(joined.is_err());
        assert!(count.is_poisoned());
        assert_eq!(*lock(&count), PageCount::Ready(3));
    }

    #[derive(Default)]
    struct Log {
        requested: Vec<usize>,
        cancelled: Vec<usize>,
    }

    struct Fake {
        count: PageCount,
        log: Arc<Mutex<Log>>,
    }

    impl PageSource for Fake {
        fn size(&self) -> PageCount {
            self.count
        }
        fn error(&self) -> Option<String> {
            None
        }
        fn on_request(&mut self, index: usize) {
            self.log.lock().unwrap().requested.push(index);
        }
        fn on_force_request(&mut self, index: usize) {
            self.on_request(index);
        }
        fn on_cancel_request(&mut self, index: usize) {
            self.log.lock().unwrap().cancelled.push(index);
        }
    }

    fn adapter() -> (PageAdapter, Arc<Mutex<Log>>) {
        let log = Arc::new(Mutex::new(Log::default()));
        let source = Fake {
            count: PageCount::Ready(10),
            log: Arc::clone(&log),
        };
        let provider = GalleryProvider::new(Box::new(source), 1 << 20);
        (PageAdapter::new(provider), log)
    }

    const SCREEN: Size = Size::new(100.0, 100.0);

    #[test]
    fn bind_requests_and_shows_spinner() {
        let (mut adapter, log) = adapter();
        let mut cell = PageCell::new(Default::default());
        adapter.bind(&mut cell, 4, SCREEN);
        assert_eq!(cell.index(), Some(4));
        assert_eq!(cell.label(), Some("5"));
        assert_eq!(cell.progress(), Progress::Indeterminate);
        assert!(!cell.is_loaded());
        assert_eq!(log.lock().unwrap().requested, vec![4]);

        adapter.unbind(&mut cell);
        assert_eq!(cell.index(), None);
        assert_eq!(log.lock().unwrap().cancelled, vec![4]);
    }

    #[test]
    fn cached_page_binds_without_request() {
        let (mut adapter, log) = adapter();
        let notifier = adapter.provider().notifier();
        notifier.notify_page_succeed(2, PageImage::new(4, 4, false, Vec::new()));

        let mut cell = PageCell::new(Default::default());
        adapter.bind(&mut cell, 2, SCREEN);
        assert!(cell.is_loaded());
        assert_eq!(cell.progress(), Progress::Gone);
        assert!(log.lock().unwrap().requested.is_empty());
    }

    #[test]
    fn notifications_update_matching_cell() {
        let (mut adapter, _) = adapter();
        let notifier = adapter.provider().notifier();
        let mut cell = PageCell::new(Default::default());
        adapter.bind(&mut cell, 1, SCREEN);

        notifier.notify_page_percent(1, 0.4);
        notifier.notify_page_failed(1, &PageError::Network("timeout".into()));
        let notes = adapter.drain();
        assert_eq!(notes.len(), 2);

        let mut notes = notes.into_iter();
        adapter.apply(notes.next().unwrap(), &mut cell, SCREEN);
        assert_eq!(cell.progress(), Progress::Percent(0.4));
        adapter.apply(notes.next().unwrap(), &mut cell, SCREEN);
        assert_eq!(cell.progress(), Progress::Gone);
        assert_eq!(cell.error(), Some("Network error: timeout"));
        assert!(cell.is_error());
    }

    #[test]
    fn stale_notification_is_ignored() {
        let (mut adapter, _) = adapter();
        let notifier = adapter.provider().notifier();
        let mut cell = PageCell::new(Default::default());
        adapter.bind(&mut cell, 1, SCREEN);
        adapter.unbind(&mut cell);

        notifier.notify_page_failed(1, &PageError::NotFound);
        for note in adapter.drain() {
            adapter.apply(note, &mut cell, SCREEN);
        }
        assert!(!cell.is_error());
        assert_eq!(cell.index(), None);
    }

    #[test]
    fn hidden_index_has_no_label() {
        let (mut adapter, _) = adapter();
        adapter.set_show_index(false);
        let mut cell = PageCell::new(Default::default());
        adapter.bind(&mut cell, 0, SCREEN);
        assert_eq!(cell.label(), None);
    }

    #[test]
    #[should_panic(expected = "started twice")]
    fn start_twice_panics() {
        let (mut adapter, _) = adapter();
        adapter.provider_mut().start();
        adapter.provider_mut().start();
    }

    #[test]
    fn stop_evicts_cache() {
        let (mut adapter, _) = adapter();
        let notifier = adapter.provider().notifier();
        notifier.notify_page_succeed(0, PageImage::new(2, 2, false, Vec::new()));
        assert_eq!(adapter.provider().with_cache(|c| c.len()), 1);
        adapter.provider_mut().stop();
        assert_eq!(adapter.provider().with_cache(|c| c.len()), 0);
    }
}
