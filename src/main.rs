use anyhow::Context;
use clap::Parser;
use log::LevelFilter;
use log4rs::append::console::{ConsoleAppender, Target};
use log4rs::config::{Appender, Config as LogConfig, Root};
use log4rs::encode::pattern::PatternEncoder;
use rust_manga_importer::config::Config;
use rust_manga_importer::{ImportError, ImportRequest, Importer, Quality, SourceKind};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

const LOG_CONFIG: &str = "log4rs.yml";

#[derive(Parser, Debug)]
#[command(name = "rust-manga-importer", version)]
#[command(about = "Import a manga title from a supported source into local storage", long_about = None)]
struct Cli {
    /// Title URL on a supported source
    url: String,

    /// Chapters to import, e.g. "1-10,12.5" or "all"
    #[arg(short, long, default_value = "all")]
    range: String,

    /// Translation language for API sources (defaults to config)
    #[arg(short, long)]
    language: Option<String>,

    /// Image quality for API sources: full or data-saver
    #[arg(short, long)]
    quality: Option<Quality>,

    /// Force an adapter instead of matching on the URL
    #[arg(short, long)]
    source: Option<SourceKind>,

    /// Path to config.toml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the upload root
    #[arg(long)]
    upload_dir: Option<String>,

    /// Log at debug level to stderr
    #[arg(long)]
    debug: bool,
}

fn init_logging(debug: bool) {
    if !debug && Path::new(LOG_CONFIG).exists() {
        match log4rs::init_file(LOG_CONFIG, Default::default()) {
            Ok(()) => return,
            Err(e) => eprintln!("Ignoring {}: {}", LOG_CONFIG, e),
        }
    }
    let level = if debug { LevelFilter::Debug } else { LevelFilter::Info };
    let stderr = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new("{d(%Y-%m-%d %H:%M:%S)} {h({l:<5})} {t} - {m}{n}")))
        .build();
    let config = LogConfig::builder()
        .appender(Appender::builder().build("stderr", Box::new(stderr)))
        .build(Root::builder().appender("stderr").build(level));
    match config {
        Ok(config) => {
            if let Err(e) = log4rs::init_config(config) {
                eprintln!("Failed to initialize logging: {}", e);
            }
        }
        Err(e) => eprintln!("Invalid logging config: {}", e),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug);

    let mut cfg = match &cli.config {
        Some(path) => Config::from_path(path).with_context(|| format!("loading {}", path.display()))?,
        None => Config::load(),
    };
    if let Some(dir) = cli.upload_dir {
        cfg.upload_dir = dir;
    }

    let mut request = ImportRequest::new(cli.url)
        .range(cli.range)
        .language(cli.language.unwrap_or_else(|| cfg.default_language.clone()))
        .quality(cli.quality.unwrap_or(cfg.default_quality));
    if let Some(source) = cli.source {
        request = request.source(source);
    }

    log::info!(
        "Rate limits: document {}ms, api {}ms, image {}ms",
        cfg.rate_limit.document_delay_ms,
        cfg.rate_limit.api_delay_ms,
        cfg.rate_limit.image_delay_ms
    );
    let importer = Importer::from_config(cfg).context("building HTTP client")?;
    log::info!("Upload root: {}", importer.store().root().display());
    let adapters: Vec<&str> = importer.registry().all().iter().map(|a| a.name()).collect();
    log::debug!("Adapters: {}", adapters.join(", "));

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupt received, stopping after the current item");
            signal_token.cancel();
        }
    });

    match importer.import(&request, &cancel).await {
        Ok(outcome) => {
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            Ok(())
        }
        Err(e) => {
            if let ImportError::NoChaptersDownloaded { report } = &e {
                eprintln!("{}", serde_json::to_string_pretty(report)?);
            }
            log::error!("Import failed: {}", e);
            eprintln!("{}", e);
            std::process::exit(1);
        }
    }
}
