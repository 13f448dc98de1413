use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cratedigger::acquisition::{
    AcquisitionManager, AcquisitionSource, DirectUrlSource, MediaRipperSource,
};
use cratedigger::cli_style::{self, TableBuilder};
use cratedigger::config::{AppConfig, CliConfig, FileConfig};
use cratedigger::discovery::{
    DiscoveryOrchestrator, DiscoveryOutcome, ScoutClient, StorefrontClient,
};
use cratedigger::export::UsbExporter;
use cratedigger::narrative::{NarrativeGenerator, TemplateNarrator};
use cratedigger::pipeline::AutomationPipeline;
use cratedigger::processing::{AudioProcessor, ToolStatus};
use cratedigger::store::{SqliteTrackStore, TrackStore};
use cratedigger::track::Track;
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(
    name = "cratedigger",
    about = "Crate digging on autopilot: discover, rank, and export DJ-ready playlists",
    version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GIT_HASH"), ")"),
    styles = cli_style::get_styles()
)]
struct Cli {
    /// Root data directory (database, download cache, export bundle).
    #[clap(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Path to a TOML config file; values there override CLI flags.
    #[clap(long, global = true)]
    config: Option<PathBuf>,

    /// Storefront API key (falls back to STOREFRONT_API_KEY).
    #[clap(long, global = true)]
    storefront_key: Option<String>,

    /// Scout API key (falls back to SCOUT_API_KEY).
    #[clap(long, global = true)]
    scout_key: Option<String>,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Discover and rank tracks matching the style profile.
    Discover {
        /// Number of tracks to keep after ranking.
        #[clap(short, long, default_value_t = 25)]
        count: usize,

        /// Save the result as a named playlist in the database.
        #[clap(short = 'n', long)]
        playlist_name: Option<String>,
    },

    /// List stored tracks at or above a style-score threshold.
    List {
        #[clap(short = 's', long, default_value_t = 0.7)]
        min_score: f64,
    },

    /// Show database statistics.
    Stats,

    /// Discover tracks and run the full download → process → export pipeline.
    Automate {
        /// Number of tracks to target.
        #[clap(short, long, default_value_t = 25)]
        count: usize,

        /// Playlist name for the export bundle.
        #[clap(short = 'n', long)]
        playlist_name: Option<String>,

        /// Skip direct downloads and acquire through the media ripper only.
        #[clap(long)]
        ripper_only: bool,
    },

    /// Rip a single media URL into the download cache.
    Grab {
        url: String,
        artist: String,
        title: String,
    },

    /// Show tool availability and cache/bundle statistics.
    Status,

    /// Clear the download cache and the export bundle.
    ClearCache,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .unwrap();

    let file_config = match &cli.config {
        Some(path) => Some(FileConfig::load(path)?),
        None => {
            let default_path = PathBuf::from("cratedigger.toml");
            if default_path.exists() {
                Some(FileConfig::load(&default_path)?)
            } else {
                None
            }
        }
    };

    let cli_config = CliConfig {
        data_dir: cli.data_dir.clone(),
        storefront_api_key: cli.storefront_key.clone(),
        scout_api_key: cli.scout_key.clone(),
        ripper_bin: None,
    };
    let config = AppConfig::resolve(&cli_config, file_config)?;

    match cli.command {
        Command::Discover {
            count,
            playlist_name,
        } => cmd_discover(&config, count, playlist_name).await,
        Command::List { min_score } => cmd_list(&config, min_score),
        Command::Stats => cmd_stats(&config),
        Command::Automate {
            count,
            playlist_name,
            ripper_only,
        } => cmd_automate(&config, count, playlist_name, ripper_only).await,
        Command::Grab { url, artist, title } => cmd_grab(&config, &url, &artist, &title).await,
        Command::Status => cmd_status(&config).await,
        Command::ClearCache => cmd_clear_cache(&config).await,
    }
}

fn open_store(config: &AppConfig) -> Result<Arc<SqliteTrackStore>> {
    Ok(Arc::new(SqliteTrackStore::new(&config.db_path())?))
}

fn build_orchestrator(
    config: &AppConfig,
    store: Arc<SqliteTrackStore>,
) -> Result<DiscoveryOrchestrator> {
    let storefront = Arc::new(StorefrontClient::new(&config.storefront, &config.pacing)?);
    let scout = Arc::new(ScoutClient::new(
        &config.scout,
        &config.discovery,
        &config.pacing,
        config.profile.clone(),
    )?);

    Ok(DiscoveryOrchestrator::new(
        scout,
        storefront.clone(),
        storefront,
        store,
        config.profile.clone(),
        config.discovery.clone(),
    ))
}

fn spinner(message: &str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    bar.set_message(message.to_string());
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

async fn run_discovery(
    config: &AppConfig,
    store: Arc<SqliteTrackStore>,
    count: usize,
) -> Result<DiscoveryOutcome> {
    let orchestrator = build_orchestrator(config, store)?;

    let bar = spinner(&format!("Digging for {} tracks...", count));
    let outcome = orchestrator.discover(count).await?;
    bar.finish_and_clear();

    Ok(outcome)
}

async fn cmd_discover(
    config: &AppConfig,
    count: usize,
    playlist_name: Option<String>,
) -> Result<()> {
    let store = open_store(config)?;
    let outcome = run_discovery(config, store.clone(), count).await?;

    if outcome.tracks.is_empty() {
        cli_style::print_error("No tracks discovered. Check API keys and connectivity.");
        for error in &outcome.errors {
            cli_style::print_warning(error);
        }
        return Ok(());
    }

    cli_style::print_success(&format!(
        "Discovered {} tracks ({} candidates seen)",
        outcome.tracks.len(),
        outcome.candidates_seen
    ));
    print_track_table(&outcome.tracks);

    if !outcome.errors.is_empty() {
        cli_style::print_warning(&format!(
            "{} sources/items failed along the way",
            outcome.errors.len()
        ));
    }

    if let Some(name) = playlist_name {
        let description = TemplateNarrator.describe(&outcome.tracks, &name);
        let ids: Vec<i64> = outcome.tracks.iter().filter_map(|t| t.store_id).collect();
        let playlist_id = store.create_playlist(&name, &ids, &description)?;
        cli_style::print_success(&format!("Saved playlist '{}' (id {})", name, playlist_id));
        cli_style::print_key_value("Description", &description);
        println!(
            "  Run `cratedigger automate -n \"{}\"` to build the USB bundle.",
            name
        );
    }

    Ok(())
}

fn cmd_list(config: &AppConfig, min_score: f64) -> Result<()> {
    let store = open_store(config)?;
    let tracks = store.tracks_by_min_score(min_score)?;

    if tracks.is_empty() {
        cli_style::print_empty_list(&format!("No tracks with style score >= {:.2}", min_score));
        return Ok(());
    }

    cli_style::print_success(&format!(
        "{} tracks with style score >= {:.2}",
        tracks.len(),
        min_score
    ));
    print_track_table(&tracks);
    Ok(())
}

fn cmd_stats(config: &AppConfig) -> Result<()> {
    let store = open_store(config)?;
    let stats = store.stats()?;

    cli_style::print_section_header("Library Statistics");
    cli_style::print_key_value("Total tracks", &stats.total_tracks.to_string());
    cli_style::print_key_value("Playlists", &stats.total_playlists.to_string());
    cli_style::print_key_value("Searches logged", &stats.total_searches.to_string());
    cli_style::print_key_value(
        "High-score tracks (>0.8)",
        &stats.high_score_tracks.to_string(),
    );
    cli_style::print_key_value(
        "Discovered in last 30 days",
        &stats.recent_discoveries.to_string(),
    );
    cli_style::print_section_footer();
    Ok(())
}

async fn cmd_automate(
    config: &AppConfig,
    count: usize,
    playlist_name: Option<String>,
    ripper_only: bool,
) -> Result<()> {
    let store = open_store(config)?;
    let outcome = run_discovery(config, store.clone(), count).await?;

    if outcome.tracks.is_empty() {
        cli_style::print_error("Nothing discovered, nothing to automate.");
        return Ok(());
    }

    let name = playlist_name
        .unwrap_or_else(|| format!("{} - {} Tracks", config.playlist_name, outcome.tracks.len()));

    let description = TemplateNarrator.describe(&outcome.tracks, &name);
    let ids: Vec<i64> = outcome.tracks.iter().filter_map(|t| t.store_id).collect();
    store.create_playlist(&name, &ids, &description)?;

    let ripper = Arc::new(MediaRipperSource::new(
        config.ripper_bin.clone(),
        config.pacing.ripper_interval_ms,
    ));
    let sources: Vec<Arc<dyn AcquisitionSource>> = if ripper_only {
        vec![ripper]
    } else {
        let direct = Arc::new(DirectUrlSource::new(
            config.storefront.timeout_secs,
            config.pacing.storefront_interval_ms,
        )?);
        vec![direct, ripper]
    };

    let acquisition = Arc::new(
        AcquisitionManager::new(sources, config.cache_dir())
            .context("Failed to set up the download cache")?,
    );
    let processor = Arc::new(AudioProcessor::new(
        config.audio.clone(),
        config.cache_dir().join("processed"),
    ));
    let exporter = Arc::new(UsbExporter::new(config.usb_dir()));

    let cancel = CancellationToken::new();
    let handler_token = cancel.clone();
    let _ = ctrlc::set_handler(move || {
        info!("Ctrl-C received, finishing the current track then stopping");
        handler_token.cancel();
    });

    let pipeline = AutomationPipeline::new(acquisition, processor, exporter, cancel);
    let tracks: Vec<Track> = outcome.tracks.clone();
    let report = pipeline.run(tracks, &name).await?;

    cli_style::print_section_header("Pipeline Report");
    cli_style::print_key_value("Playlist", &report.playlist_name);
    cli_style::print_key_value(
        "Tracks",
        &format!(
            "{} submitted / {} acquired / {} processed / {} exported",
            report.total, report.acquired, report.processed, report.exported
        ),
    );
    if report.cancelled {
        cli_style::print_warning("Run was cancelled before completion");
    }
    match &report.export {
        Some(summary) => {
            cli_style::print_key_value("USB bundle", &summary.usb_path.display().to_string());
            cli_style::print_key_value("Manifest", &summary.xml_path.display().to_string());
            if summary.validation.valid {
                cli_style::print_success("Manifest validation passed");
            } else {
                for error in &summary.validation.errors {
                    cli_style::print_error(error);
                }
            }
        }
        None => cli_style::print_warning("No export bundle was produced"),
    }
    if !report.errors.is_empty() {
        println!();
        for error in &report.errors {
            cli_style::print_warning(error);
        }
    }
    cli_style::print_section_footer();

    Ok(())
}

async fn cmd_grab(config: &AppConfig, url: &str, artist: &str, title: &str) -> Result<()> {
    let ripper = MediaRipperSource::new(
        config.ripper_bin.clone(),
        config.pacing.ripper_interval_ms,
    );

    if !ripper.is_available().await {
        cli_style::print_error(&format!("Ripper binary '{}' not found", config.ripper_bin));
        return Ok(());
    }

    let bar = spinner(&format!("Ripping {} - {}...", artist, title));
    let result = ripper.rip_url(url, artist, title, &config.cache_dir()).await;
    bar.finish_and_clear();

    match result {
        Ok(path) => cli_style::print_success(&format!("Saved to {}", path.display())),
        Err(e) => cli_style::print_error(&format!("Rip failed: {}", e)),
    }
    Ok(())
}

async fn cmd_status(config: &AppConfig) -> Result<()> {
    let tools = ToolStatus::detect().await;
    let ripper = MediaRipperSource::new(config.ripper_bin.clone(), 0);
    let ripper_ok = ripper.is_available().await;

    let acquisition = AcquisitionManager::new(vec![], config.cache_dir())
        .context("Failed to inspect the download cache")?;
    let cache = acquisition.cache_stats();
    let exporter = UsbExporter::new(config.usb_dir());
    let bundle = exporter.stats();

    cli_style::print_section_header("Automation Status");
    print_tool_line("ffmpeg", tools.ffmpeg);
    print_tool_line("ffprobe", tools.ffprobe);
    print_tool_line(&config.ripper_bin, ripper_ok);
    cli_style::print_key_value(
        "Download cache",
        &format!(
            "{} files, {}",
            cache.total_files,
            human_bytes(cache.total_bytes)
        ),
    );
    cli_style::print_key_value(
        "Export bundle",
        &format!(
            "{} files, {}",
            bundle.total_files,
            human_bytes(bundle.total_bytes)
        ),
    );
    cli_style::print_section_footer();
    Ok(())
}

async fn cmd_clear_cache(config: &AppConfig) -> Result<()> {
    let acquisition = AcquisitionManager::new(vec![], config.cache_dir())
        .context("Failed to open the download cache")?;
    acquisition
        .clear_cache()
        .await
        .context("Failed to clear the download cache")?;

    let exporter = UsbExporter::new(config.usb_dir());
    exporter.clear().await?;

    cli_style::print_success("Cleared download cache and export bundle");
    Ok(())
}

fn print_tool_line(name: &str, available: bool) {
    if available {
        cli_style::print_success(&format!("{} available", name));
    } else {
        cli_style::print_warning(&format!("{} not found", name));
    }
}

fn print_track_table(tracks: &[Track]) {
    let mut table = TableBuilder::new(vec![
        "#", "Artist", "Title", "BPM", "Key", "Label", "Score",
    ]);

    for (i, track) in tracks.iter().enumerate() {
        let index = (i + 1).to_string();
        let bpm = track
            .bpm
            .map(|b| b.to_string())
            .unwrap_or_else(|| "?".to_string());
        let key = track.key.clone().unwrap_or_else(|| "?".to_string());
        let label = track.label.clone().unwrap_or_else(|| "Unknown".to_string());
        let score = format!("{:.2}", track.style_score);

        table.add_row(vec![
            index.as_str(),
            truncate(&track.artist, 18),
            truncate(&track.title, 24),
            bpm.as_str(),
            key.as_str(),
            truncate(&label, 16),
            score.as_str(),
        ]);
    }

    table.print();
}

/// Truncate display strings so one long title doesn't blow up the table.
fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

fn human_bytes(bytes: u64) -> String {
    format!(
        "{:.2}",
        byte_unit::Byte::from_u64(bytes).get_appropriate_unit(byte_unit::UnitType::Decimal)
    )
}
