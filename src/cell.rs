//! Page cells: a page transform plus its placeholder overlay, and the pool
//! they are drawn from.

use std::ops::{Index, IndexMut};
use std::sync::Arc;

use kurbo::{Rect, Size};

use crate::anim::{Animation, Interpolator};
use crate::cache::PageImage;
use crate::transform::PageTransform;

const FADE_DURATION: u64 = 300;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Progress {
    Gone,
    Indeterminate,
    /// Fraction in `[0, 1]`.
    Percent(f32),
}

/// Sizes of the info panel parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellStyle {
    pub min_height: i32,
    pub info_interval: i32,
    pub progress_size: i32,
    pub page_text_size: i32,
    pub error_text_size: i32,
}

impl Default for CellStyle {
    fn default() -> Self {
        Self {
            min_height: 256,
            info_interval: 24,
            progress_size: 56,
            page_text_size: 56,
            error_text_size: 24,
        }
    }
}

// Rough glyph advance as a fraction of text size.
fn text_width(text: &str, size: i32) -> f64 {
    text.chars().count() as f64 * size as f64 * 0.6
}

#[derive(Debug, Clone)]
pub struct PageCell {
    style: CellStyle,
    index: Option<usize>,
    bounds: Rect,
    transform: PageTransform,
    image: Option<Arc<PageImage>>,
    label: Option<String>,
    progress: Progress,
    error: Option<String>,
    fade: Animation,
    alpha: f64,
}

impl PageCell {
    pub fn new(style: CellStyle) -> Self {
        let mut fade = Animation::new(Interpolator::FastSlow);
        fade.set_duration(FADE_DURATION);
        Self {
            style,
            index: None,
            bounds: Rect::ZERO,
            transform: PageTransform::new(),
            image: None,
            label: None,
            progress: Progress::Gone,
            error: None,
            fade,
            alpha: 1.0,
        }
    }

    pub fn index(&self) -> Option<usize> {
        self.index
    }

    pub fn set_index(&mut self, index: Option<usize>) {
        self.index = index;
    }

    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    pub fn height(&self) -> i32 {
        self.bounds.height() as i32
    }

    pub fn transform(&self) -> &PageTransform {
        &self.transform
    }

    pub fn transform_mut(&mut self) -> &mut PageTransform {
        &mut self.transform
    }

    /// Place the cell in gallery coordinates. Returns `true` when the cell
    /// was off screen before and is on screen now.
    pub fn layout(&mut self, bounds: Rect, screen: Size) -> bool {
        let was_visible = is_visible(self.bounds, screen);
        self.bounds = bounds;
        self.transform.set_viewport(bounds.size());
        !was_visible && is_visible(bounds, screen)
    }

    pub fn offset_top_and_bottom(&mut self, dy: i32) {
        self.bounds = self.bounds + kurbo::Vec2::new(0.0, dy as f64);
    }

    pub fn is_visible(&self, screen: Size) -> bool {
        is_visible(self.bounds, screen)
    }

    /// Height for a given width: the image's aspect height when loaded,
    /// otherwise enough for the info panel.
    pub fn measure_height(&self, width: i32) -> i32 {
        match &self.image {
            Some(image) => {
                let w = image.width().max(1) as f32;
                let h = image.height().max(1) as f32;
                (width as f32 / (w / h)) as i32
            }
            None => self.style.min_height.max(self.info_size().height as i32),
        }
    }

    pub fn image(&self) -> Option<&Arc<PageImage>> {
        self.image.as_ref()
    }

    pub fn is_loaded(&self) -> bool {
        self.image.is_some()
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Show decoded content. Fades in when the cell is on screen.
    pub fn show_image(&mut self, image: Arc<PageImage>, screen: Size) {
        self.transform.set_content(Some(Size::new(
            image.width() as f64,
            image.height() as f64,
        )));
        self.image = Some(image);
        if self.is_visible(screen) {
            self.alpha = 0.0;
            self.fade.start();
        } else {
            self.fade.cancel();
            self.alpha = 1.0;
        }
    }

    pub fn clear_image(&mut self) {
        self.image = None;
        self.transform.set_content(None);
        self.fade.cancel();
        self.alpha = 1.0;
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn set_label(&mut self, label: Option<String>) {
        self.label = label;
    }

    pub fn progress(&self) -> Progress {
        self.progress
    }

    pub fn set_progress(&mut self, progress: Progress) {
        self.progress = progress;
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn set_error(&mut self, error: Option<String>) {
        self.error = error;
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn update_fade(&mut self, now: u64) -> bool {
        match self.fade.calculate(now) {
            Some(tick) => {
                self.alpha = tick.progress;
                !tick.finished
            }
            None => false,
        }
    }

    fn info_size(&self) -> Size {
        let mut parts: Vec<(f64, f64)> = Vec::with_capacity(3);
        if let Some(label) = &self.label {
            parts.push((
                text_width(label, self.style.page_text_size),
                self.style.page_text_size as f64,
            ));
        }
        if let Some(error) = &self.error {
            parts.push((
                text_width(error, self.style.error_text_size),
                self.style.error_text_size as f64,
            ));
        }
        if self.progress != Progress::Gone {
            let s = self.style.progress_size as f64;
            parts.push((s, s));
        }
        if parts.is_empty() {
            return Size::ZERO;
        }
        let width = parts.iter().map(|p| p.0).fold(0.0, f64::max);
        let height = parts.iter().map(|p| p.1).sum::<f64>()
            + self.style.info_interval as f64 * (parts.len() - 1) as f64;
        Size::new(width, height)
    }

    /// The centered info panel in gallery coordinates; empty when loaded.
    pub fn info_rect(&self) -> Rect {
        if self.is_loaded() {
            return Rect::ZERO;
        }
        let size = self.info_size();
        let center = self.bounds.center();
        Rect::from_center_size(center, size)
    }

    pub fn is_under_info(&self, x: f64, y: f64) -> bool {
        self.info_rect().contains(kurbo::Point::new(x, y))
    }

    fn reset(&mut self) {
        *self = PageCell::new(self.style);
    }
}

fn is_visible(bounds: Rect, screen: Size) -> bool {
    let clipped = bounds.intersect(screen.to_rect());
    clipped.width() > 0.0 && clipped.height() > 0.0
}

// ---------------------------------------------------------------------------
// Pool
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellId(usize);

/// Arena of cells. Released slots are reset and reused before new ones are
/// allocated.
#[derive(Debug, Default)]
pub struct CellPool {
    style: CellStyle,
    slots: Vec<PageCell>,
    free: Vec<usize>,
}

impl CellPool {
    pub fn new(style: CellStyle) -> Self {
        Self {
            style,
            slots: Vec::new(),
            free: Vec::new(),
        }
    }

    pub fn obtain(&mut self) -> CellId {
        match self.free.pop() {
            Some(slot) => CellId(slot),
            None => {
                self.slots.push(PageCell::new(self.style));
                CellId(self.slots.len() - 1)
            }
        }
    }

    pub fn release(&mut self, id: CellId) {
        debug_assert!(!self.free.contains(&id.0), "cell released twice");
        self.slots[id.0].reset();
        self.free.push(id.0);
    }

    pub fn in_use(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}

impl Index<CellId> for CellPool {
    type Output = PageCell;

    fn index(&self, id: CellId) -> &PageCell {
        &self.slots[id.0]
    }
}

impl IndexMut<CellId> for CellPool {
    fn index_mut(&mut self, id: CellId) -> &mut PageCell {
        &mut self.slots[id.0]
    }
}
