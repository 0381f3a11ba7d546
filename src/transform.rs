//! Scale and translation of one page's content inside its viewport.
//!
//! All coordinates are local to the viewport (origin at its top-left). The
//! destination rectangle is placed lazily: until both content and a non-empty
//! viewport exist the transform stays dirty and every query answers as if
//! nothing could move.

use kurbo::{Rect, Size, Vec2};

pub const SCALE_MIN: f64 = 1.0 / 10.0;
pub const SCALE_MAX: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleMode {
    Origin,
    FitWidth,
    FitHeight,
    Fit,
    Fixed,
}

impl ScaleMode {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "origin" => Some(Self::Origin),
            "fit-width" => Some(Self::FitWidth),
            "fit-height" => Some(Self::FitHeight),
            "fit" => Some(Self::Fit),
            "fixed" => Some(Self::Fixed),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Origin => "origin",
            Self::FitWidth => "fit-width",
            Self::FitHeight => "fit-height",
            Self::Fit => "fit",
            Self::Fixed => "fixed",
        }
    }

    /// Next mode in declaration order, wrapping.
    pub fn cycle(self) -> Self {
        match self {
            Self::Origin => Self::FitWidth,
            Self::FitWidth => Self::FitHeight,
            Self::FitHeight => Self::Fit,
            Self::Fit => Self::Fixed,
            Self::Fixed => Self::Origin,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartPosition {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
    Center,
}

impl StartPosition {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "top-left" => Some(Self::TopLeft),
            "top-right" => Some(Self::TopRight),
            "bottom-left" => Some(Self::BottomLeft),
            "bottom-right" => Some(Self::BottomRight),
            "center" => Some(Self::Center),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::TopLeft => "top-left",
            Self::TopRight => "top-right",
            Self::BottomLeft => "bottom-left",
            Self::BottomRight => "bottom-right",
            Self::Center => "center",
        }
    }
}

#[derive(Debug, Clone)]
pub struct PageTransform {
    viewport: Size,
    content: Option<Size>,
    dst: Rect,
    scale_mode: ScaleMode,
    start_position: StartPosition,
    scale_value: f64,
    scale: f64,
    dirty: bool,
}

impl Default for PageTransform {
    fn default() -> Self {
        Self::new()
    }
}

impl PageTransform {
    pub fn new() -> Self {
        Self {
            viewport: Size::ZERO,
            content: None,
            dst: Rect::ZERO,
            scale_mode: ScaleMode::Fit,
            start_position: StartPosition::TopRight,
            scale_value: 1.0,
            scale: 1.0,
            dirty: true,
        }
    }

    pub fn viewport(&self) -> Size {
        self.viewport
    }

    pub fn set_viewport(&mut self, viewport: Size) {
        if viewport != self.viewport {
            self.viewport = viewport;
            self.dirty = true;
        }
    }

    /// Natural content size; non-positive dimensions count as 1.
    pub fn set_content(&mut self, content: Option<Size>) {
        self.content = content.map(|s| Size::new(s.width.max(1.0), s.height.max(1.0)));
        self.dirty = true;
    }

    pub fn content(&self) -> Option<Size> {
        self.content
    }

    pub fn is_loaded(&self) -> bool {
        self.content.is_some()
    }

    pub fn current_scale(&self) -> f64 {
        self.scale
    }

    /// Place lazily; `false` while placement is impossible.
    fn ensure(&mut self) -> bool {
        if self.dirty {
            self.set_scale_offset(self.scale_mode, self.start_position, self.scale_value);
        }
        !self.dirty
    }

    pub fn dst(&mut self) -> Option<Rect> {
        self.ensure().then_some(self.dst)
    }

    /// The four zoom levels a double tap cycles through, sorted ascending.
    pub fn canonical_scales(&self) -> Option<[f64; 4]> {
        let content = self.content?;
        let fit_width = self.viewport.width / content.width;
        let fit_height = self.viewport.height / content.height;
        let mut scales = [1.0, fit_width, fit_height, fit_width.max(fit_height) * 2.0]
            .map(|s| s.clamp(SCALE_MIN, SCALE_MAX));
        scales.sort_by(f64::total_cmp);
        Some(scales)
    }

    pub fn set_scale_offset(&mut self, mode: ScaleMode, position: StartPosition, value: f64) {
        self.scale_mode = mode;
        self.start_position = position;
        self.scale_value = value;

        let Size {
            width: screen_w,
            height: screen_h,
        } = self.viewport;
        let content = match self.content {
            Some(c) if screen_w > 0.0 && screen_h > 0.0 => c,
            _ => {
                self.dirty = true;
                return;
            }
        };

        self.scale = match mode {
            ScaleMode::Origin => 1.0,
            ScaleMode::FitWidth => screen_w / content.width,
            ScaleMode::FitHeight => screen_h / content.height,
            ScaleMode::Fit => (screen_w / content.width).min(screen_h / content.height),
            ScaleMode::Fixed => value,
        }
        .clamp(SCALE_MIN, SCALE_MAX);
        let target_w = content.width * self.scale;
        let target_h = content.height * self.scale;

        let (left, top) = match position {
            StartPosition::TopLeft => (0.0, 0.0),
            StartPosition::TopRight => (screen_w - target_w, 0.0),
            StartPosition::BottomLeft => (0.0, screen_h - target_h),
            StartPosition::BottomRight => (screen_w - target_w, screen_h - target_h),
            StartPosition::Center => ((screen_w - target_w) / 2.0, (screen_h - target_h) / 2.0),
        };
        self.dst = Rect::new(left, top, left + target_w, top + target_h);
        self.adjust_position();
        self.dirty = false;
    }

    /// Larger than the viewport: pull back so no gap shows. Smaller: center.
    fn adjust_position(&mut self) {
        let Size {
            width: screen_w,
            height: screen_h,
        } = self.viewport;
        let dst = &mut self.dst;
        if dst.width() > screen_w {
            if dst.x0 > 0.0 {
                *dst = *dst - Vec2::new(dst.x0, 0.0);
            } else if screen_w - dst.x1 > 0.0 {
                *dst = *dst + Vec2::new(screen_w - dst.x1, 0.0);
            }
        } else {
            let left = (screen_w - dst.width()) / 2.0;
            *dst = *dst + Vec2::new(left - dst.x0, 0.0);
        }
        if dst.height() > screen_h {
            if dst.y0 > 0.0 {
                *dst = *dst - Vec2::new(0.0, dst.y0);
            } else if screen_h - dst.y1 > 0.0 {
                *dst = *dst + Vec2::new(0.0, screen_h - dst.y1);
            }
        } else {
            let top = (screen_h - dst.height()) / 2.0;
            *dst = *dst + Vec2::new(0.0, top - dst.y0);
        }
    }

    pub fn can_fling(&mut self) -> bool {
        self.can_fling_horizontally() || self.can_fling_vertically()
    }

    pub fn can_fling_horizontally(&mut self) -> bool {
        self.ensure() && (self.dst.x0 < 0.0 || self.dst.x1 > self.viewport.width)
    }

    pub fn can_fling_vertically(&mut self) -> bool {
        self.ensure() && (self.dst.y0 < 0.0 || self.dst.y1 > self.viewport.height)
    }

    pub fn max_dx(&mut self) -> i32 {
        if !self.ensure() {
            return 0;
        }
        0.max(-(self.dst.x0 as i32))
    }

    pub fn min_dx(&mut self) -> i32 {
        if !self.ensure() {
            return 0;
        }
        0.min(self.viewport.width as i32 - self.dst.x1 as i32)
    }

    pub fn max_dy(&mut self) -> i32 {
        if !self.ensure() {
            return 0;
        }
        0.max(-(self.dst.y0 as i32))
    }

    pub fn min_dy(&mut self) -> i32 {
        if !self.ensure() {
            return 0;
        }
        0.min(self.viewport.height as i32 - self.dst.y1 as i32)
    }

    /// Move the content by a scroll distance; returns what could not be
    /// consumed on each axis.
    pub fn scroll(&mut self, dx: i32, dy: i32) -> (i32, i32) {
        if !self.ensure() {
            return (dx, dy);
        }
        let rx = scroll_axis(&mut self.dst.x0, &mut self.dst.x1, self.viewport.width, dx);
        let ry = scroll_axis(&mut self.dst.y0, &mut self.dst.y1, self.viewport.height, dy);
        (rx, ry)
    }

    /// Focus-preserving zoom by `factor`, clamped to the scale bounds.
    pub fn scale(&mut self, focus_x: f64, focus_y: f64, factor: f64) {
        if !self.ensure() {
            return;
        }
        let Some(content) = self.content else {
            return;
        };
        if (self.scale == SCALE_MAX && factor >= 1.0) || (self.scale == SCALE_MIN && factor < 1.0)
        {
            return;
        }
        let new_scale = (self.scale * factor).clamp(SCALE_MIN, SCALE_MAX);
        let applied = new_scale / self.scale;
        self.scale = new_scale;
        let left = focus_x - (focus_x - self.dst.x0) * applied;
        let top = focus_y - (focus_y - self.dst.y0) * applied;
        self.dst = Rect::new(
            left,
            top,
            left + content.width * new_scale,
            top + content.height * new_scale,
        );
        self.adjust_position();
    }

    /// Map the part of the destination inside `clip` back to source pixels.
    /// Returns `(source, destination)`, or `None` when nothing is visible.
    pub fn visible_source(&mut self, clip: Rect) -> Option<(Rect, Rect)> {
        if !self.ensure() {
            return None;
        }
        let content = self.content?;
        let dst = self.dst;
        let visible = dst.intersect(clip);
        if visible.width() <= 0.0 || visible.height() <= 0.0 {
            return None;
        }
        let sx = content.width / dst.width();
        let sy = content.height / dst.height();
        let src = Rect::new(
            (visible.x0 - dst.x0) * sx,
            (visible.y0 - dst.y0) * sy,
            (visible.x1 - dst.x0) * sx,
            (visible.y1 - dst.y0) * sy,
        );
        Some((src, visible))
    }
}

fn scroll_axis(lo: &mut f64, hi: &mut f64, screen: f64, d: i32) -> i32 {
    if *hi - *lo <= screen {
        return d;
    }
    *lo -= d as f64;
    *hi -= d as f64;
    if *lo > 0.0 {
        let fix = *lo;
        *lo -= fix;
        *hi -= fix;
        -(fix as i32)
    } else if screen - *hi > 0.0 {
        let fix = screen - *hi;
        *lo += fix;
        *hi += fix;
        fix as i32
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn placed(content: (f64, f64), viewport: (f64, f64), mode: ScaleMode) -> PageTransform {
        let mut t = PageTransform::new();
        t.set_viewport(Size::new(viewport.0, viewport.1));
        t.set_content(Some(Size::new(content.0, content.1)));
        t.set_scale_offset(mode, StartPosition::TopLeft, 1.0);
        t
    }

    fn assert_no_gap(t: &mut PageTransform) {
        let vp = t.viewport();
        let dst = t.dst().unwrap();
        if dst.width() > vp.width {
            assert!(dst.x0 <= 0.0 && dst.x1 >= vp.width, "{dst:?}");
        } else {
            assert!((dst.x0 - (vp.width - dst.x1)).abs() <= 1.0, "{dst:?}");
        }
        if dst.height() > vp.height {
            assert!(dst.y0 <= 0.0 && dst.y1 >= vp.height, "{dst:?}");
        } else {
            assert!((dst.y0 - (vp.height - dst.y1)).abs() <= 1.0, "{dst:?}");
        }
    }

    #[test]
    fn dirty_until_content_and_viewport() {
        let mut t = PageTransform::new();
        assert!(t.dst().is_none());
        assert_eq!(t.scroll(5, 7), (5, 7));
        assert_eq!(t.max_dx(), 0);
        t.set_content(Some(Size::new(100.0, 100.0)));
        assert!(t.dst().is_none());
        t.set_viewport(Size::new(200.0, 200.0));
        assert!(t.dst().is_some());
    }

    #[test]
    fn fit_centers_smaller_axis() {
        let mut t = placed((1000.0, 500.0), (500.0, 500.0), ScaleMode::Fit);
        assert_eq!(t.current_scale(), 0.5);
        assert_eq!(t.dst(), Some(Rect::new(0.0, 125.0, 500.0, 375.0)));
        assert!(!t.can_fling());
        assert_no_gap(&mut t);
    }

    #[test]
    fn fit_width_tall_page_starts_at_top() {
        let mut t = placed((100.0, 400.0), (200.0, 300.0), ScaleMode::FitWidth);
        assert_eq!(t.dst(), Some(Rect::new(0.0, 0.0, 200.0, 800.0)));
        assert!(t.can_fling_vertically());
        assert!(!t.can_fling_horizontally());
        assert_eq!(t.max_dy(), 0);
        assert_eq!(t.min_dy(), -500);
    }

    #[test]
    fn scale_is_clamped() {
        let t = placed((10.0, 10.0), (1000.0, 1000.0), ScaleMode::Fit);
        assert_eq!(t.current_scale(), SCALE_MAX);
        let t = placed((100_000.0, 100.0), (100.0, 100.0), ScaleMode::FitWidth);
        assert_eq!(t.current_scale(), SCALE_MIN);
    }

    #[test]
    fn scroll_returns_unconsumed_part() {
        let mut t = placed((100.0, 400.0), (200.0, 300.0), ScaleMode::FitWidth);
        // Width fits exactly: nothing consumed horizontally.
        assert_eq!(t.scroll(30, 100), (30, 0));
        assert_eq!(t.dst().unwrap().y0, -100.0);
        // Only 400 more pixels below.
        assert_eq!(t.scroll(0, 450), (0, 50));
        assert_eq!(t.dst().unwrap().y1, 300.0);
        // Back past the top.
        assert_eq!(t.scroll(0, -600), (0, -100));
        assert_eq!(t.dst().unwrap().y0, 0.0);
        assert_no_gap(&mut t);
    }

    #[test]
    fn zoom_keeps_focus_point() {
        let mut t = placed((400.0, 400.0), (400.0, 400.0), ScaleMode::Fit);
        t.scale(100.0, 100.0, 2.0);
        assert_eq!(t.current_scale(), 2.0);
        // Content pixel (100, 100) stays under the focus.
        assert_eq!(t.dst(), Some(Rect::new(-100.0, -100.0, 700.0, 700.0)));
        assert_no_gap(&mut t);

        // Zooming out below the viewport re-centers.
        t.scale(0.0, 0.0, 0.25);
        assert_eq!(t.current_scale(), 0.5);
        assert_eq!(t.dst(), Some(Rect::new(100.0, 100.0, 300.0, 300.0)));
    }

    #[test]
    fn zoom_stops_at_bounds() {
        let mut t = placed((40.0, 40.0), (400.0, 400.0), ScaleMode::Fit);
        assert_eq!(t.current_scale(), SCALE_MAX);
        let before = t.dst();
        t.scale(200.0, 200.0, 1.5);
        assert_eq!(t.dst(), before);
    }

    #[test]
    fn canonical_scales_sorted_and_clamped() {
        let t = placed((100.0, 200.0), (400.0, 400.0), ScaleMode::Fit);
        assert_eq!(t.canonical_scales(), Some([1.0, 2.0, 4.0, 8.0]));
        let t = placed((10.0, 10.0), (400.0, 400.0), ScaleMode::Fit);
        assert_eq!(t.canonical_scales(), Some([1.0, 10.0, 10.0, 10.0]));
    }

    #[test]
    fn start_position_then_adjust() {
        let mut t = PageTransform::new();
        t.set_viewport(Size::new(100.0, 100.0));
        t.set_content(Some(Size::new(300.0, 300.0)));
        t.set_scale_offset(ScaleMode::Origin, StartPosition::BottomRight, 1.0);
        assert_eq!(t.dst(), Some(Rect::new(-200.0, -200.0, 100.0, 100.0)));
        assert_eq!(t.max_dx(), 200);
        assert_eq!(t.min_dx(), 0);
    }

    #[test]
    fn visible_source_maps_back_to_pixels() {
        let mut t = placed((200.0, 200.0), (100.0, 100.0), ScaleMode::Origin);
        let (src, dst) = t.visible_source(Rect::new(0.0, 0.0, 100.0, 50.0)).unwrap();
        assert_eq!(dst, Rect::new(0.0, 0.0, 100.0, 50.0));
        assert_eq!(src, Rect::new(0.0, 0.0, 100.0, 50.0));
        assert!(t.visible_source(Rect::new(500.0, 500.0, 600.0, 600.0)).is_none());
    }

    #[test]
    fn zero_sized_content_counts_as_one() {
        let mut t = PageTransform::new();
        t.set_content(Some(Size::new(0.0, -5.0)));
        assert_eq!(t.content(), Some(Size::new(1.0, 1.0)));
    }

    #[test]
    fn names_round_trip() {
        for m in [
            ScaleMode::Origin,
            ScaleMode::FitWidth,
            ScaleMode::FitHeight,
            ScaleMode::Fit,
            ScaleMode::Fixed,
        ] {
            assert_eq!(ScaleMode::from_name(m.name()), Some(m));
        }
        assert_eq!(StartPosition::from_name("center"), Some(StartPosition::Center));
        assert_eq!(ScaleMode::from_name("zoom"), None);
    }
}
