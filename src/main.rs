use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use folio::config;
use folio::viewer::{self, SourceOptions};

#[derive(Parser)]
#[command(
    name = "folio",
    version = concat!(
        env!("CARGO_PKG_VERSION"),
        " (",
        env!("FOLIO_BUILD_GIT_HASH"),
        " ",
        env!("FOLIO_BUILD_PROFILE"),
        ")"
    ),
    about = "Paged and continuous-scroll gallery viewer for the terminal"
)]
struct Cli {
    /// Number of pages in the synthetic gallery
    #[arg(long, default_value_t = 24)]
    pages: usize,

    /// Layout mode: left-to-right, right-to-left (rtl) or top-to-bottom (scroll)
    #[arg(long)]
    mode: Option<String>,

    /// Page to open first (0-based)
    #[arg(long)]
    start_page: Option<usize>,

    /// Simulated decode time per page in milliseconds
    #[arg(long, default_value_t = 400)]
    latency_ms: u64,

    /// Make every Nth page fail on its first request (0 disables)
    #[arg(long, default_value_t = 0)]
    fail_every: usize,

    /// Log output file path (enables logging when specified)
    #[arg(long)]
    log: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();

    if let Some(log_path) = &cli.log {
        let file = match std::fs::File::create(log_path) {
            Ok(f) => f,
            Err(e) => {
                eprintln!("Error: failed to open log file {}: {e}", log_path.display());
                std::process::exit(1);
            }
        };
        env_logger::Builder::from_default_env()
            .target(env_logger::Target::Pipe(Box::new(file)))
            .init();
    }
    // no --log → logger not initialized (the viewer owns the terminal)

    // Load config file and merge CLI overrides
    let mut cfg = match config::load_config() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(1);
        }
    };
    cfg.merge_cli(cli.mode, cli.start_page);
    let config = cfg.resolve();

    let opts = SourceOptions {
        pages: cli.pages,
        latency: Duration::from_millis(cli.latency_ms),
        fail_every: cli.fail_every,
    };

    if let Err(e) = viewer::run(config, opts) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
