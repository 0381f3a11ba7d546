use std::path::PathBuf;
use std::time::Duration;

use log::{debug, info, warn};
use serde::Deserialize;

use crate::cache::budget_for_memory;
use crate::cell::CellStyle;
use crate::gallery::{GalleryBuilder, LayoutMode};
use crate::transform::{ScaleMode, StartPosition};

const MIB: usize = 1024 * 1024;
const DEFAULT_PAGE_TURN_RATIO: f64 = 0.5;
const DEFAULT_DENSITY: f64 = 1.0;

// ---------------------------------------------------------------------------
// ConfigFile: deserialized from TOML, all fields optional
// ---------------------------------------------------------------------------

#[derive(Default, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    #[serde(default)]
    pub gallery: GalleryConfigFile,
    #[serde(default)]
    pub gesture: GestureConfigFile,
    #[serde(default)]
    pub cache: CacheConfigFile,
}

#[derive(Default, Deserialize)]
#[serde(default)]
pub struct GalleryConfigFile {
    pub layout: Option<String>,
    pub scale: Option<String>,
    pub start_position: Option<String>,
    pub start_page: Option<usize>,
    pub pager_interval: Option<i32>,
    pub scroll_interval: Option<i32>,
    pub page_min_height: Option<i32>,
    pub page_info_interval: Option<i32>,
    pub progress_size: Option<i32>,
    pub page_text_size: Option<i32>,
    pub error_text_size: Option<i32>,
    pub default_error: Option<String>,
    pub empty_text: Option<String>,
    pub show_index: Option<bool>,
    pub frame_budget_ms: Option<u64>,
}

#[derive(Default, Deserialize)]
#[serde(default)]
pub struct GestureConfigFile {
    pub page_turn_ratio: Option<f64>,
    pub density: Option<f64>,
}

#[derive(Default, Deserialize)]
#[serde(default)]
pub struct CacheConfigFile {
    pub budget_mib: Option<usize>,
}

// ---------------------------------------------------------------------------
// Config: resolved, all fields concrete
// ---------------------------------------------------------------------------

pub struct Config {
    pub gallery: GalleryConfig,
    pub gesture: GestureConfig,
    pub cache: CacheConfig,
}

pub struct GalleryConfig {
    pub layout: LayoutMode,
    pub scale: ScaleMode,
    pub start_position: StartPosition,
    pub start_page: usize,
    pub pager_interval: i32,
    pub scroll_interval: i32,
    pub style: CellStyle,
    pub default_error: String,
    pub empty_text: String,
    pub show_index: bool,
    pub frame_budget: Duration,
}

pub struct GestureConfig {
    pub page_turn_ratio: f64,
    pub density: f64,
}

pub struct CacheConfig {
    /// Bytes.
    pub budget: usize,
}

impl ConfigFile {
    /// Merge CLI values (overwrites non-None fields).
    pub fn merge_cli(&mut self, layout: Option<String>, start_page: Option<usize>) {
        if let Some(ref v) = layout {
            debug!("config: CLI override layout={v}");
            self.gallery.layout = layout;
        }
        if let Some(v) = start_page {
            debug!("config: CLI override start_page={v}");
            self.gallery.start_page = start_page;
        }
    }

    /// Resolve to a Config by applying defaults to missing fields.
    pub fn resolve(self) -> Config {
        let g = self.gallery;
        let defaults = CellStyle::default();
        let config = Config {
            gallery: GalleryConfig {
                layout: g
                    .layout
                    .as_deref()
                    .map_or(LayoutMode::LeftToRight, LayoutMode::from_name),
                scale: g
                    .scale
                    .as_deref()
                    .and_then(ScaleMode::from_name)
                    .unwrap_or(ScaleMode::Fit),
                start_position: g
                    .start_position
                    .as_deref()
                    .and_then(StartPosition::from_name)
                    .unwrap_or(StartPosition::TopLeft),
                start_page: g.start_page.unwrap_or(0),
                pager_interval: g.pager_interval.unwrap_or(48),
                scroll_interval: g.scroll_interval.unwrap_or(24),
                style: CellStyle {
                    min_height: g.page_min_height.unwrap_or(defaults.min_height),
                    info_interval: g.page_info_interval.unwrap_or(defaults.info_interval),
                    progress_size: g.progress_size.unwrap_or(defaults.progress_size),
                    page_text_size: g.page_text_size.unwrap_or(defaults.page_text_size),
                    error_text_size: g.error_text_size.unwrap_or(defaults.error_text_size),
                },
                default_error: g.default_error.unwrap_or_else(|| "Error".into()),
                empty_text: g.empty_text.unwrap_or_else(|| "Empty".into()),
                show_index: g.show_index.unwrap_or(true),
                frame_budget: Duration::from_millis(g.frame_budget_ms.unwrap_or(16)),
            },
            gesture: GestureConfig {
                page_turn_ratio: page_turn_ratio(self.gesture.page_turn_ratio),
                density: density(self.gesture.density),
            },
            cache: CacheConfig {
                budget: match self.cache.budget_mib {
                    Some(mib) => mib.saturating_mul(MIB),
                    None => budget_for_memory(total_memory().unwrap_or(0)),
                },
            },
        };
        info!(
            "config: resolved layout={}, scale={}, start_position={}, start_page={}, \
             intervals={}/{}, show_index={}, page_turn_ratio={}, density={}, \
             frame_budget={}ms, cache_budget={}MiB",
            config.gallery.layout.name(),
            config.gallery.scale.name(),
            config.gallery.start_position.name(),
            config.gallery.start_page,
            config.gallery.pager_interval,
            config.gallery.scroll_interval,
            config.gallery.show_index,
            config.gesture.page_turn_ratio,
            config.gesture.density,
            config.gallery.frame_budget.as_millis(),
            config.cache.budget / MIB,
        );
        config
    }
}

impl Config {
    /// A builder carrying every resolved setting.
    pub fn builder(&self) -> GalleryBuilder {
        let g = &self.gallery;
        GalleryBuilder::new()
            .layout_mode(g.layout)
            .scale_mode(g.scale)
            .start_position(g.start_position)
            .start_page(g.start_page)
            .pager_interval(g.pager_interval)
            .scroll_interval(g.scroll_interval)
            .cell_style(g.style)
            .default_error(g.default_error.clone())
            .empty_text(g.empty_text.clone())
            .show_index(g.show_index)
            .page_turn_ratio(self.gesture.page_turn_ratio)
            .density(self.gesture.density)
            .cache_budget(self.cache.budget)
    }
}

/// Total physical memory in bytes, from `/proc/meminfo`.
/// A fraction of the page interval; out-of-range values are clamped.
fn page_turn_ratio(value: Option<f64>) -> f64 {
    let Some(ratio) = value else {
        return DEFAULT_PAGE_TURN_RATIO;
    };
    if ratio.is_nan() {
        warn!("config: page_turn_ratio is NaN, using {DEFAULT_PAGE_TURN_RATIO}");
        return DEFAULT_PAGE_TURN_RATIO;
    }
    let clamped = ratio.clamp(0.0, 1.0);
    if clamped != ratio {
        warn!("config: page_turn_ratio {ratio} is outside [0, 1], using {clamped}");
    }
    clamped
}

fn density(value: Option<f64>) -> f64 {
    match value {
        None => DEFAULT_DENSITY,
        Some(d) if d.is_finite() && d > 0.0 => d,
        Some(d) => {
            warn!("config: density must be positive, got {d}, using {DEFAULT_DENSITY}");
            DEFAULT_DENSITY
        }
    }
}

fn total_memory() -> Option<u64> {
    let text = std::fs::read_to_string("/proc/meminfo").ok()?;
    let line = text.lines().find(|l| l.starts_with("MemTotal:"))?;
    let kib: u64 = line.split_whitespace().nth(1)?.parse().ok()?;
    Some(kib * 1024)
}

/// Resolve the XDG config path for folio.
fn config_path() -> Option<PathBuf> {
    let config_dir = std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| {
            std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config"))
        })?;
    Some(config_dir.join("folio").join("config.toml"))
}

/// Load config file. Returns `ConfigFile::default()` if no file exists.
/// Returns an error if the file exists but cannot be parsed.
pub fn load_config() -> anyhow::Result<ConfigFile> {
    let path = match config_path() {
        Some(p) => p,
        None => {
            info!("config: no HOME or XDG_CONFIG_HOME set, using defaults");
            return Ok(ConfigFile::default());
        }
    };
    debug!("config: looking for {}", path.display());
    match std::fs::read_to_string(&path) {
        Ok(text) => {
            info!("config: loaded from {}", path.display());
            let cfg: ConfigFile = toml::from_str(&text)
                .map_err(|e| anyhow::anyhow!("failed to parse {}: {e}", path.display()))?;
            Ok(cfg)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!("config: {} not found, using defaults", path.display());
            Ok(ConfigFile::default())
        }
        Err(e) => Err(anyhow::anyhow!("failed to read {}: {e}", path.display())),
    }
}
