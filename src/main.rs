//! MLBB Stats
//!
//! Reads Mobile Legends: Bang Bang end-of-match scoreboard screenshots and
//! exports each player's nickname, hero, K/D/A, gold, medal and rating.

mod cli;
mod config;
mod debug;
mod export;
mod extract;
mod hero;
mod ocr;
mod paths;
mod pipeline;

use anyhow::{bail, Context, Result};
use chrono::Local;
use clap::Parser;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use cli::{Cli, Commands, ExtractArgs};
use config::{ExtractorConfig, ResolutionProfile, CONFIG_FILE_NAME};
use extract::{Extractor, NicknameMappings, PlayerRecord};
use hero::catalog::ReferenceCatalog;
use ocr::preprocess::crop_region;
use ocr::Tesseract;

/// Log output that goes to stderr and, when available, a log file.
struct TeeWriter {
    file: Option<File>,
}

impl Write for TeeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stderr().write_all(buf)?;
        if let Some(file) = &mut self.file {
            // Log file errors are ignored.
            let _ = file.write_all(buf);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()?;
        if let Some(file) = &mut self.file {
            let _ = file.flush();
        }
        Ok(())
    }
}

fn open_log_file(path: &Path) -> Option<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).ok()?;
    }
    OpenOptions::new().create(true).append(true).open(path).ok()
}

/// Sets up `log` with timestamped lines on stderr and in the log file.
/// `RUST_LOG` overrides the level chosen by `verbose`.
fn init_logging(verbose: bool, log_file: Option<&Path>) {
    let path = log_file
        .map(Path::to_path_buf)
        .unwrap_or_else(paths::get_default_log_file);
    let file = open_log_file(&path);
    let file_missing = file.is_none();

    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] {:<5} {}",
                Local::now().format("%H:%M:%S%.3f"),
                record.level(),
                record.args()
            )
        })
        .target(env_logger::Target::Pipe(Box::new(TeeWriter { file })))
        .init();

    if file_missing {
        log::warn!("Could not open log file {}", path.display());
    }
}

fn install_panic_hook() {
    std::panic::set_hook(Box::new(|panic_info| {
        let msg = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };
        let location = panic_info
            .location()
            .map(|loc| format!(" at {}:{}:{}", loc.file(), loc.line(), loc.column()))
            .unwrap_or_default();
        log::error!("[PANIC]{} {}", location, msg);
    }));
}

fn load_catalog(config: &ExtractorConfig) -> Result<ReferenceCatalog> {
    ReferenceCatalog::load_or_empty(
        &config.heroes_map,
        &config.hero_image_root(),
        &config.hero_matcher,
    )
    .context("Failed to load hero catalog")
}

fn build_extractor(config: ExtractorConfig) -> Result<Extractor> {
    let tesseract = Tesseract::locate(config.tesseract_cmd.as_deref())
        .context("Tesseract is required; run `mlbb-stats setup` or pass --tesseract-cmd")?;
    let catalog = load_catalog(&config)?;
    let nicknames = NicknameMappings::load(&config.nickname_mappings);
    Ok(Extractor::new(
        config,
        Box::new(tesseract),
        Arc::new(catalog),
        nicknames,
    ))
}

fn print_records(records: &[PlayerRecord]) {
    let mut current_source: Option<&str> = None;
    for record in records {
        if current_source != Some(record.source_image.as_str()) {
            println!(
                "\n{}  {}  {} - {}  {}",
                record.source_image,
                record.result,
                record.my_team_score,
                record.adversary_team_score,
                record.duration
            );
            current_source = Some(record.source_image.as_str());
        }
        println!(
            "  {}. {:<20} {:<14} {:>2}/{:>2}/{:>2} {:>6}  {:<6} {:>4.1}",
            record.position,
            record.nickname,
            record.hero,
            record.kills,
            record.deaths,
            record.assists,
            record.gold,
            record.medal.to_string(),
            record.ratio
        );
    }
}

fn run_extract(mut config: ExtractorConfig, args: ExtractArgs) -> Result<()> {
    if let Some(profile) = &args.profile {
        config.set_active_profile(profile)?;
        config.auto_select_profile = false;
    }
    if args.debug {
        config.debug_mode = true;
    }
    if let Some(cmd) = args.tesseract_cmd {
        config.tesseract_cmd = Some(cmd);
    }
    let output_dir = args.output.unwrap_or_else(|| config.output_dir.clone());

    let images: Vec<PathBuf> = match &args.dir {
        Some(dir) => pipeline::collect_images(dir)?,
        None => args.image,
    };
    if images.is_empty() {
        bail!("No screenshots to process");
    }

    let extractor = build_extractor(config)?;
    let jobs = args.jobs.unwrap_or_else(pipeline::default_jobs);
    let report = pipeline::process_images(&extractor, &images, args.player.as_deref(), jobs);

    print_records(&report.records);
    println!(
        "\nProcessed {}/{} screenshots, {} records",
        report.processed,
        images.len(),
        report.records.len()
    );
    for (path, reason) in &report.failures {
        println!("  failed: {} ({})", path.display(), reason);
    }
    for path in &report.not_found {
        println!("  player not found: {}", path.display());
    }

    if report.processed == 0 {
        bail!("No screenshot could be processed");
    }
    if report.records.is_empty() {
        log::warn!("No records extracted, nothing exported");
        return Ok(());
    }

    let base_name = args.name.unwrap_or_else(|| {
        if args.append {
            "mlbb_stats".to_string()
        } else {
            format!("mlbb_stats_{}", Local::now().format("%Y%m%d_%H%M%S"))
        }
    });
    let written = export::export_all(
        &report.records,
        &output_dir,
        &base_name,
        &args.format,
        args.append,
    )?;
    for (format, path) in written {
        println!("Saved {}: {}", format, path.display());
    }
    Ok(())
}

fn run_heroes(config: &ExtractorConfig, image: Option<&Path>) -> Result<()> {
    let catalog = load_catalog(config)?;

    let Some(image_path) = image else {
        if catalog.is_empty() {
            println!(
                "No hero references loaded (mapping file: {})",
                config.heroes_map.display()
            );
            return Ok(());
        }
        println!("{} hero references:", catalog.len());
        for entry in catalog.entries() {
            println!(
                "  {:<20} {:>4}x{:<4} {:>3} keypoints",
                entry.name,
                entry.image.width(),
                entry.image.height(),
                entry.features.len()
            );
        }
        return Ok(());
    };

    let img = image::open(image_path)
        .with_context(|| format!("Failed to open screenshot {}", image_path.display()))?
        .to_rgb8();
    let profile = config.profile_for_image(img.width(), img.height());
    println!("Profile: {}", profile.name);
    for (index, regions) in profile.players.iter().enumerate() {
        let Some(region) = &regions.hero else {
            println!("  Player {}: no hero region", index + 1);
            continue;
        };
        let portrait = crop_region(&img, region);
        let result = hero::classify(&portrait, &catalog, &config.hero_matcher);
        println!(
            "  Player {}: {} ({:.3})",
            index + 1,
            result.label,
            result.confidence
        );
    }
    Ok(())
}

fn print_profiles(config: &ExtractorConfig) {
    for profile in &config.profiles {
        let marker = if profile.name == config.active_profile {
            "*"
        } else {
            " "
        };
        println!(
            "{} {:<24} {}x{}  {}",
            marker,
            profile.name,
            profile.reference_width,
            profile.reference_height,
            profile.description
        );
    }
    if config.auto_select_profile {
        println!("(profile is chosen per screenshot by aspect ratio)");
    }
}

struct ProfileChanges {
    activate: Option<String>,
    auto: bool,
    import: Option<PathBuf>,
    remove: Option<String>,
}

impl ProfileChanges {
    fn is_empty(&self) -> bool {
        self.activate.is_none() && !self.auto && self.import.is_none() && self.remove.is_none()
    }
}

/// Applies profile changes and saves them to `config_path`, then lists the profiles.
///
/// Changes are made to the file at `config_path` as it is on disk; `config`
/// is only used when that file does not exist yet.
fn run_profiles(
    config: ExtractorConfig,
    config_path: &Path,
    changes: ProfileChanges,
) -> Result<()> {
    if changes.is_empty() {
        print_profiles(&config);
        return Ok(());
    }

    let mut config = ExtractorConfig::load_for_update(config_path, config)?;
    let mut changed = false;
    if let Some(path) = &changes.import {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read profile {}", path.display()))?;
        let profile: ResolutionProfile = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse profile {}", path.display()))?;
        log::info!("Imported profile '{}'", profile.name);
        config.add_profile(profile);
        changed = true;
    }
    if let Some(name) = &changes.activate {
        config.set_active_profile(name)?;
        config.auto_select_profile = false;
        changed = true;
    }
    if changes.auto {
        config.auto_select_profile = true;
        changed = true;
    }
    if let Some(name) = &changes.remove {
        config.remove_profile(name)?;
        changed = true;
    }

    if changed {
        config.save(config_path)?;
        println!("Saved {}", config_path.display());
    }
    print_profiles(&config);
    Ok(())
}

fn run_init_config(config: &ExtractorConfig, path: &Path) -> Result<()> {
    if path.exists() {
        bail!("{} already exists", path.display());
    }
    config.save(path)?;
    println!("Configuration written to {}", path.display());
    Ok(())
}

fn run_setup(config: &ExtractorConfig) -> Result<()> {
    let found = ocr::setup::ensure_tesseract(config.tesseract_cmd.as_deref())?;
    println!("Tesseract: {}", found.executable.display());
    println!("Tessdata:  {}", found.tessdata.display());
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_file.as_deref());
    install_panic_hook();

    let config = ExtractorConfig::load_or_default(cli.config.as_deref())?;

    match cli.command {
        Commands::Extract(args) => run_extract(config, args),
        Commands::Heroes { image } => run_heroes(&config, image.as_deref()),
        Commands::Profiles {
            activate,
            auto,
            import,
            remove,
        } => {
            let config_path = cli
                .config
                .clone()
                .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME));
            run_profiles(
                config,
                &config_path,
                ProfileChanges {
                    activate,
                    auto,
                    import,
                    remove,
                },
            )
        }
        Commands::InitConfig { path } => run_init_config(&config, &path),
        Commands::Setup => run_setup(&config),
    }
}
