//! Terminal I/O layer: raw mode, half-block scene painting, status bar.
//!
//! Each terminal cell covers `PX_PER_COL` x `PX_PER_ROW` gallery pixels and
//! is painted with an upper half block: the foreground carries the top
//! sample, the background the bottom one.

use crossterm::{
    ExecutableCommand, QueueableCommand, cursor,
    event::{DisableMouseCapture, EnableMouseCapture},
    style::{self, Color, Colors, Stylize},
    terminal,
};
use kurbo::Point;
use std::io::{self, BufWriter, Write, stdout};

use crate::cell::Progress;
use crate::edge::Edge;
use crate::layout::Overlay;
use crate::provider::PageCount;
use crate::scene::{PageInfo, Scene};

pub(super) const PX_PER_COL: u16 = 8;
pub(super) const PX_PER_ROW: u16 = 16;

type Rgb = [u8; 3];

const BACKGROUND: Rgb = [18, 18, 24];
const INFO_PANEL: Rgb = [52, 52, 60];
const GLOW: Rgb = [120, 180, 255];

// ---------------------------------------------------------------------------
// RawGuard: restores the terminal on Drop
// ---------------------------------------------------------------------------

pub(super) struct RawGuard {
    cleaned: bool,
}

impl RawGuard {
    pub(super) fn enter() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        stdout().execute(terminal::EnterAlternateScreen)?;
        stdout().execute(EnableMouseCapture)?;
        stdout().execute(cursor::Hide)?;
        Ok(Self { cleaned: false })
    }

    pub(super) fn cleanup(&mut self) {
        if self.cleaned {
            return;
        }
        self.cleaned = true;
        let mut out = stdout();
        let _ = out.execute(style::ResetColor);
        let _ = out.execute(cursor::Show);
        let _ = out.execute(DisableMouseCapture);
        let _ = out.execute(terminal::LeaveAlternateScreen);
        let _ = terminal::disable_raw_mode();
    }
}

impl Drop for RawGuard {
    fn drop(&mut self) {
        self.cleanup();
    }
}

// ---------------------------------------------------------------------------
// Layout
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct Layout {
    pub cols: u16,
    pub image_rows: u16, // gallery rows (= term_rows - 1)
    pub status_row: u16, // status bar row (= term_rows - 1)
}

pub(super) fn compute_layout(term_cols: u16, term_rows: u16) -> Layout {
    Layout {
        cols: term_cols,
        image_rows: term_rows.saturating_sub(1),
        status_row: term_rows.saturating_sub(1),
    }
}

impl Layout {
    /// Gallery size in pixels.
    pub(super) fn gallery_size(&self) -> (i32, i32) {
        (
            i32::from(self.cols) * i32::from(PX_PER_COL),
            i32::from(self.image_rows) * i32::from(PX_PER_ROW),
        )
    }

    /// Gallery pixel at the center of a terminal cell.
    pub(super) fn cell_center(&self, col: u16, row: u16) -> (f64, f64) {
        (
            (f64::from(col) + 0.5) * f64::from(PX_PER_COL),
            (f64::from(row) + 0.5) * f64::from(PX_PER_ROW),
        )
    }
}

// ---------------------------------------------------------------------------
// Scene sampling
// ---------------------------------------------------------------------------

fn blend(under: Rgb, over: Rgb, alpha: f64) -> Rgb {
    let a = alpha.clamp(0.0, 1.0);
    let mix = |u: u8, o: u8| (f64::from(u) * (1.0 - a) + f64::from(o) * a).round() as u8;
    [
        mix(under[0], over[0]),
        mix(under[1], over[1]),
        mix(under[2], over[2]),
    ]
}

/// Color of the scene at gallery pixel `(x, y)`.
pub(super) fn sample(scene: &Scene, x: f64, y: f64) -> Rgb {
    let p = Point::new(x, y);
    let mut color = BACKGROUND;
    for page in &scene.pages {
        if !page.bounds.contains(p) {
            continue;
        }
        if let Some(draw) = &page.image
            && draw.dst.contains(p)
        {
            let sx = draw.src.x0 + (x - draw.dst.x0) * draw.src.width() / draw.dst.width();
            let sy = draw.src.y0 + (y - draw.dst.y0) * draw.src.height() / draw.dst.height();
            let [r, g, b, a] = draw.image.pixel(sx as u32, sy as u32);
            color = blend(color, [r, g, b], f64::from(a) / 255.0 * draw.alpha);
        } else if let Some(info) = &page.info
            && info.rect.contains(p)
        {
            color = INFO_PANEL;
        }
    }
    let (w, h) = (f64::from(scene.width), f64::from(scene.height));
    for glow in &scene.glows {
        let (distance, extent) = match glow.edge {
            Edge::Left => (x, w),
            Edge::Top => (y, h),
            Edge::Right => (w - x, w),
            Edge::Bottom => (h - y, h),
        };
        if distance < glow.intensity * extent / 6.0 {
            color = blend(color, GLOW, glow.intensity * 0.6);
        }
    }
    color
}

fn rgb(c: Rgb) -> Color {
    Color::Rgb {
        r: c[0],
        g: c[1],
        b: c[2],
    }
}

// ---------------------------------------------------------------------------
// Drawing
// ---------------------------------------------------------------------------

/// Paint the whole gallery area, then page info text and overlays.
pub(super) fn draw_scene(scene: &Scene, layout: &Layout) -> io::Result<()> {
    let mut out = BufWriter::new(stdout());
    for row in 0..layout.image_rows {
        out.queue(cursor::MoveTo(0, row))?;
        let top_y = f64::from(row) * f64::from(PX_PER_ROW) + f64::from(PX_PER_ROW) * 0.25;
        let bottom_y = top_y + f64::from(PX_PER_ROW) * 0.5;
        let mut last = None;
        for col in 0..layout.cols {
            let (x, _) = layout.cell_center(col, row);
            let pair = (sample(scene, x, top_y), sample(scene, x, bottom_y));
            if last != Some(pair) {
                out.queue(style::SetColors(Colors::new(rgb(pair.0), rgb(pair.1))))?;
                last = Some(pair);
            }
            out.queue(style::Print('▀'))?;
        }
    }
    out.queue(style::ResetColor)?;

    for page in &scene.pages {
        if let Some(info) = &page.info {
            draw_info(&mut out, layout, info)?;
        }
    }
    match &scene.overlay {
        Some(Overlay::Progress) => {
            let row = i32::from(layout.image_rows / 2);
            put_text(&mut out, layout, i32::from(layout.cols / 2), row, "Loading…", BACKGROUND)?;
        }
        Some(Overlay::Message(text)) => {
            let row = i32::from(layout.image_rows / 2);
            put_text(&mut out, layout, i32::from(layout.cols / 2), row, text, BACKGROUND)?;
        }
        None => {}
    }
    out.flush()
}

pub(super) fn info_lines(info: &PageInfo) -> Vec<String> {
    let mut lines = Vec::with_capacity(3);
    if let Some(label) = &info.label {
        lines.push(label.clone());
    }
    match info.progress {
        Progress::Gone => {}
        Progress::Indeterminate => lines.push("…".into()),
        Progress::Percent(p) => lines.push(format!("{:.0}%", p * 100.0)),
    }
    if let Some(error) = &info.error {
        lines.push(error.clone());
    }
    lines
}

fn draw_info(out: &mut impl Write, layout: &Layout, info: &PageInfo) -> io::Result<()> {
    let lines = info_lines(info);
    let center = info.rect.center();
    let col = (center.x / f64::from(PX_PER_COL)) as i32;
    let first = (center.y / f64::from(PX_PER_ROW)) as i32 - lines.len() as i32 / 2;
    for (i, line) in lines.iter().enumerate() {
        put_text(out, layout, col, first + i as i32, line, INFO_PANEL)?;
    }
    Ok(())
}

/// Print `text` centered on `center_col`, clipped to the gallery area.
fn put_text(
    out: &mut impl Write,
    layout: &Layout,
    center_col: i32,
    row: i32,
    text: &str,
    bg: Rgb,
) -> io::Result<()> {
    if row < 0 || row >= i32::from(layout.image_rows) {
        return Ok(());
    }
    let len = text.chars().count() as i32;
    let start = (center_col - len / 2).max(0);
    let room = (i32::from(layout.cols) - start).max(0) as usize;
    let clipped: String = text.chars().take(room).collect();
    if clipped.is_empty() {
        return Ok(());
    }
    out.queue(cursor::MoveTo(start as u16, row as u16))?;
    write!(out, "{}", clipped.white().on(rgb(bg)))?;
    Ok(())
}

/// Everything the status bar shows.
pub(super) struct Status<'a> {
    pub mode: &'a str,
    pub scale: &'a str,
    pub page: Option<usize>,
    pub count: PageCount,
    pub prefix: Option<u32>,
    pub flash: Option<&'a str>,
}

pub(super) fn status_text(status: &Status) -> String {
    let page = match (status.page, status.count) {
        (_, PageCount::Wait) => "loading".to_string(),
        (_, PageCount::Error) => "error".to_string(),
        (Some(i), PageCount::Ready(n)) => format!("{}/{n}", i + 1),
        (None, PageCount::Ready(n)) => format!("-/{n}"),
    };
    let head = format!(" folio | {page} | {} {}", status.mode, status.scale);
    if let Some(msg) = status.flash {
        format!("{head} | {msg}")
    } else if let Some(n) = status.prefix {
        format!("{head} | :{n}_")
    } else {
        format!("{head}  [h/l:page j/k:scroll +/-:zoom z m:mode s:scale Ng:goto r:retry q:quit]")
    }
}

/// Draw the status bar on the last terminal row.
pub(super) fn draw_status_bar(layout: &Layout, status: &Status) -> io::Result<()> {
    let mut out = stdout();
    out.queue(cursor::MoveTo(0, layout.status_row))?;
    let text: String = status_text(status)
        .chars()
        .take(layout.cols as usize)
        .collect();
    let padded = format!("{:<width$}", text, width = layout.cols as usize);
    write!(out, "{}", padded.on_dark_grey().white())?;
    out.queue(style::ResetColor)?;
    out.flush()
}

pub(super) fn check_tty() -> anyhow::Result<()> {
    use std::io::IsTerminal;
    // Only stdout matters. crossterm's `use-dev-tty` reads keyboard from /dev/tty
    // (Unix) or Console API (Windows), so stdin being a pipe is always fine.
    if !io::stdout().is_terminal() {
        anyhow::bail!(
            "folio viewer requires an interactive terminal.\n\
             \n\
             Run it in a terminal with 24-bit color support."
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use kurbo::Rect;

    use crate::cache::PageImage;
    use crate::edge::Glow;
    use crate::scene::{ImageDraw, PageNode};

    fn red_page() -> PageNode {
        let pixels = [255u8, 0, 0, 255].repeat(4 * 4);
        PageNode {
            index: 0,
            bounds: Rect::new(0.0, 0.0, 80.0, 80.0),
            image: Some(ImageDraw {
                image: Arc::new(PageImage::new(4, 4, false, pixels)),
                src: Rect::new(0.0, 0.0, 4.0, 4.0),
                dst: Rect::new(0.0, 0.0, 40.0, 40.0),
                alpha: 1.0,
            }),
            info: None,
        }
    }

    fn scene(pages: Vec<PageNode>) -> Scene {
        Scene {
            width: 160,
            height: 160,
            pages,
            ..Scene::default()
        }
    }

    #[test]
    fn layout_reserves_status_row() {
        let layout = compute_layout(80, 25);
        assert_eq!(layout.image_rows, 24);
        assert_eq!(layout.status_row, 24);
        assert_eq!(layout.gallery_size(), (640, 384));
        assert_eq!(layout.cell_center(0, 0), (4.0, 8.0));
    }

    #[test]
    fn sample_reads_image_through_dst() {
        let scene = scene(vec![red_page()]);
        assert_eq!(sample(&scene, 10.0, 10.0), [255, 0, 0]);
        // Inside the page but outside the image.
        assert_eq!(sample(&scene, 60.0, 60.0), BACKGROUND);
        assert_eq!(sample(&scene, 120.0, 10.0), BACKGROUND);
    }

    #[test]
    fn fading_image_blends_with_background() {
        let mut page = red_page();
        if let Some(draw) = page.image.as_mut() {
            draw.alpha = 0.5;
        }
        let c = sample(&scene(vec![page]), 10.0, 10.0);
        assert!(c[0] > BACKGROUND[0] && c[0] < 255);
    }

    #[test]
    fn glow_tints_its_edge() {
        let mut scene = scene(Vec::new());
        scene.glows.push(Glow {
            edge: Edge::Bottom,
            intensity: 1.0,
            position: 80.0,
        });
        assert_ne!(sample(&scene, 80.0, 155.0), BACKGROUND);
        assert_eq!(sample(&scene, 80.0, 10.0), BACKGROUND);
    }

    #[test]
    fn info_lines_stack_label_progress_error() {
        let info = PageInfo {
            rect: Rect::ZERO,
            label: Some("3".into()),
            progress: Progress::Percent(0.42),
            error: Some("Decode error".into()),
        };
        assert_eq!(info_lines(&info), vec!["3", "42%", "Decode error"]);
    }

    #[test]
    fn status_shows_page_and_prefix() {
        let mut status = Status {
            mode: "left-to-right",
            scale: "fit",
            page: Some(2),
            count: PageCount::Ready(10),
            prefix: None,
            flash: None,
        };
        assert!(status_text(&status).starts_with(" folio | 3/10 | left-to-right fit  ["));
        status.prefix = Some(7);
        assert!(status_text(&status).ends_with("| :7_"));
        status.flash = Some("menu");
        status.count = PageCount::Wait;
        assert_eq!(status_text(&status), " folio | loading | left-to-right fit | menu");
    }
}
