//! Display list produced once per frame.
//!
//! The controller does no drawing itself. Each frame it flattens the bound
//! cells into a [`Scene`] in screen coordinates, which a front end paints
//! however it likes.

use std::sync::Arc;

use kurbo::{Rect, Vec2};

use crate::cache::PageImage;
use crate::cell::{CellId, Progress};
use crate::edge::Glow;
use crate::layout::{LayoutHost, Overlay};

/// Part of a page image to paint: `src` in image pixels, `dst` on screen.
#[derive(Debug, Clone)]
pub struct ImageDraw {
    pub image: Arc<PageImage>,
    pub src: Rect,
    pub dst: Rect,
    pub alpha: f64,
}

/// Placeholder panel of a page without content.
#[derive(Debug, Clone, PartialEq)]
pub struct PageInfo {
    pub rect: Rect,
    pub label: Option<String>,
    pub progress: Progress,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PageNode {
    pub index: usize,
    pub bounds: Rect,
    pub image: Option<ImageDraw>,
    pub info: Option<PageInfo>,
}

#[derive(Debug, Clone, Default)]
pub struct Scene {
    pub width: i32,
    pub height: i32,
    pub pages: Vec<PageNode>,
    pub overlay: Option<Overlay>,
    pub glows: Vec<Glow>,
}

impl Scene {
    /// Collect the on-screen part of `cells`, in the order given.
    pub fn build(host: &mut LayoutHost, cells: &[CellId]) -> Self {
        let screen = host.screen();
        let mut pages = Vec::with_capacity(cells.len());
        for &id in cells {
            let cell = &mut host.cells[id];
            let Some(index) = cell.index() else {
                continue;
            };
            if !cell.is_visible(screen) {
                continue;
            }
            let bounds = cell.bounds();
            let origin = Vec2::new(bounds.x0, bounds.y0);
            let clip = screen.to_rect() - origin;
            let image = cell.image().cloned().and_then(|image| {
                let (src, dst) = cell.transform_mut().visible_source(clip)?;
                Some(ImageDraw {
                    image,
                    src,
                    dst: dst + origin,
                    alpha: cell.alpha(),
                })
            });
            let info = (!cell.is_loaded()).then(|| PageInfo {
                rect: cell.info_rect(),
                label: cell.label().map(str::to_owned),
                progress: cell.progress(),
                error: cell.error().map(str::to_owned),
            });
            pages.push(PageNode {
                index,
                bounds,
                image,
                info,
            });
        }
        Scene {
            width: host.width(),
            height: host.height(),
            pages,
            overlay: host.overlay().cloned(),
            glows: host.edge.glows(),
        }
    }

    pub fn page(&self, index: usize) -> Option<&PageNode> {
        self.pages.iter().find(|p| p.index == index)
    }

    pub fn is_blank(&self) -> bool {
        self.pages.is_empty() && self.overlay.is_none()
    }
}
