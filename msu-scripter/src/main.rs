//! MSU Scripter (msu-scripter) - Main entry point
//!
//! Command-line front end for MSU project management: creating projects,
//! converting between MSU types, splitting combined packs, exchanging
//! renderer configs, and checking song loudness.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use msu_common::config::TomlConfig;
use msu_common::{EventBus, ScripterEvent};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use msu_scripter::config::{load_config, log_directive, resolve_registry};
use msu_scripter::models::MsuDetails;
use msu_scripter::services::{
    analysis_rows, convert_msu_details, export_project, recover_interrupted_swaps, AnalysisRunner,
    DirectoryPackReader, LocalFileSystem, LoudnessAnalyzer, MetadataExtractor, PcmLoudnessMeter,
    ProjectService, ScriptWriter, SplitEngine, TypeConverter,
};
use msu_scripter::Project;

/// Extension used for project files written by this tool
const PROJECT_EXTENSION: &str = "msup";

/// Command-line arguments for msu-scripter
#[derive(Parser, Debug)]
#[command(name = "msu-scripter")]
#[command(about = "MSU audio pack project tool")]
#[command(version)]
struct Args {
    /// TOML config file
    #[arg(short, long, global = true, env = "MSU_SCRIPTER_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a project, importing an existing pack and renderer config
    New {
        #[arg(long)]
        project: PathBuf,
        #[arg(long)]
        msu_type: String,
        #[arg(long)]
        msu: PathBuf,
        #[arg(long)]
        renderer_config: Option<PathBuf>,
        #[arg(long)]
        working_dir: Option<PathBuf>,
    },
    /// Convert a project to another MSU type
    Convert {
        #[arg(long)]
        project: PathBuf,
        #[arg(long)]
        to: String,
        /// Rename the PCM files on disk to match the new numbers
        #[arg(long)]
        swap_files: bool,
    },
    /// Split a combined SMZ3 project into Super Metroid and ALttP projects
    Split {
        #[arg(long)]
        project: PathBuf,
    },
    /// Attach a renderer config's settings to the project's songs
    ImportConfig {
        #[arg(long)]
        project: PathBuf,
        #[arg(long)]
        file: PathBuf,
        #[arg(long)]
        working_dir: Option<PathBuf>,
        /// Overwrite song metadata with audio tags
        #[arg(long)]
        force: bool,
    },
    /// Write a renderer config for the project
    ExportConfig {
        #[arg(long)]
        project: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },
    /// Measure every song and flag loudness outliers
    Analyze {
        #[arg(long)]
        project: PathBuf,
    },
    /// Write the alternate track swapper script
    AltScript {
        #[arg(long)]
        project: PathBuf,
    },
    /// Finish file swaps interrupted by a crash
    Recover {
        #[arg(long)]
        dir: PathBuf,
    },
    /// Write the MSU details YAML next to the pack
    ExportDetails {
        #[arg(long)]
        project: PathBuf,
    },
    /// Re-key an MSU details YAML for another MSU type
    ConvertDetails {
        #[arg(long)]
        details: PathBuf,
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        #[arg(long)]
        old_msu: PathBuf,
        #[arg(long)]
        new_msu: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },
    /// Delete every PCM file referenced by the project
    RemovePcms {
        #[arg(long)]
        project: PathBuf,
    },
    /// List the known MSU types
    ListTypes,
}

fn init_tracing(config: &TomlConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_new(log_directive(config))
        .unwrap_or_else(|_| "info".into());

    let file_layer = match &config.logging.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Arc::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(args.config.clone());
    init_tracing(&config)?;

    let registry = Arc::new(resolve_registry(&config).context("Failed to load MSU types")?);
    let fs = Arc::new(LocalFileSystem);
    let service = ProjectService::new(
        registry.clone(),
        fs.clone(),
        Arc::new(DirectoryPackReader),
        Arc::new(MetadataExtractor::new()),
    );
    let scripts = ScriptWriter::new(&LocalFileSystem, config.scripts.flavor);

    match args.command {
        Command::New {
            project,
            msu_type,
            msu,
            renderer_config,
            working_dir,
        } => {
            let project = service
                .new_project(
                    &project,
                    &msu_type,
                    &msu,
                    renderer_config.as_deref(),
                    working_dir.as_deref(),
                )
                .context("Failed to create project")?;
            println!(
                "Created {} with {} songs",
                project.project_file_path.display(),
                project.song_count()
            );
        }

        Command::Convert {
            project,
            to,
            swap_files,
        } => {
            let mut project = load(&service, &project)?;
            service.save_backup(&project)?;
            let destination = registry.lookup(&to)?;
            let bus = EventBus::default();
            let logger = spawn_event_logger(&bus);
            let report = TypeConverter::new(&registry, &LocalFileSystem)
                .with_events(&bus)
                .convert(&mut project, &destination, swap_files);
            drop(bus);
            finish_event_logger(logger).await;
            let report = report.context("Conversion failed")?;
            service.save(&mut project)?;
            println!(
                "Converted to {}: {} tracks dropped, {} songs skipped, {} swapped, {} moved",
                destination.name(),
                report.dropped_tracks.len(),
                report.skipped_songs.len(),
                report.swapped_files,
                report.moved_files
            );
            for (path, error) in &report.failures {
                eprintln!("failed: {}: {}", path.display(), error);
            }
        }

        Command::Split { project } => {
            let project = load(&service, &project)?;
            let result = SplitEngine::new(&registry, &LocalFileSystem)
                .split(&project)
                .context("Split failed")?;

            let mut derived = Vec::with_capacity(result.projects.len());
            for mut split in result.projects {
                split.project_file_path = split.msu_path.with_extension(PROJECT_EXTENSION);
                service.save(&mut split)?;
                println!("Wrote {}", split.project_file_path.display());
                derived.push(split);
            }

            if project.basic_info.create_split_smz3_script {
                let path = scripts.write_split_script(&project, &result.translations)?;
                println!("Wrote {}", path.display());
            }
            if project.basic_info.create_alt_swapper {
                if let Some(path) = scripts.write_alt_swapper(&project, &derived)? {
                    println!("Wrote {}", path.display());
                }
            }
            for (path, error) in &result.failures {
                eprintln!("failed: {}: {}", path.display(), error);
            }
        }

        Command::ImportConfig {
            project,
            file,
            working_dir,
            force,
        } => {
            let mut project = load(&service, &project)?;
            let working_dir = working_dir
                .or_else(|| file.parent().map(Path::to_path_buf))
                .unwrap_or_default();
            let report = service.import_render_config(&mut project, &file, &working_dir, force)?;
            service.save(&mut project)?;
            println!(
                "Updated {} songs, created {} songs",
                report.updated_songs, report.created_songs
            );
            if !report.unknown_tracks.is_empty() {
                warn!(tracks = ?report.unknown_tracks, "Config tracks not in project");
            }
        }

        Command::ExportConfig { project, output } => {
            let project = load(&service, &project)?;
            let config = export_project(&project);
            msu_scripter::services::render_config::save_config(&config, &output)?;
            println!("Wrote {} tracks to {}", config.tracks.len(), output.display());
        }

        Command::Analyze { project } => {
            let project = load(&service, &project)?;
            analyze(&project, &config).await?;
        }

        Command::AltScript { project } => {
            let project = load(&service, &project)?;
            match scripts.write_alt_swapper(&project, &[])? {
                Some(path) => println!("Wrote {}", path.display()),
                None => println!("No tracks with alternates"),
            }
        }

        Command::Recover { dir } => {
            let report = recover_interrupted_swaps(&LocalFileSystem, &dir)?;
            println!("Recovered {} swaps", report.recovered.len());
            for (marker, error) in &report.failed {
                eprintln!("failed: {}: {}", marker.display(), error);
            }
            if !report.failed.is_empty() {
                bail!("{} swaps could not be recovered", report.failed.len());
            }
        }

        Command::ExportDetails { project } => {
            let project = load(&service, &project)?;
            let path = service.export_msu_details(&project)?;
            println!("Wrote {}", path.display());
        }

        Command::ConvertDetails {
            details,
            from,
            to,
            old_msu,
            new_msu,
            output,
        } => {
            let yaml = std::fs::read_to_string(&details)
                .with_context(|| format!("Failed to read {}", details.display()))?;
            let parsed: MsuDetails = serde_yaml::from_str(&yaml)
                .with_context(|| format!("Failed to parse {}", details.display()))?;
            let from = registry.lookup(&from)?;
            let to = registry.lookup(&to)?;
            let converted = convert_msu_details(&registry, &parsed, &from, &to, &old_msu, &new_msu)?;
            std::fs::write(&output, serde_yaml::to_string(&converted)?)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            println!("Wrote {} tracks to {}", converted.tracks.len(), output.display());
        }

        Command::RemovePcms { project } => {
            let project = load(&service, &project)?;
            let removed = service.remove_pcms(&project);
            println!("Removed {} PCM files", removed);
        }

        Command::ListTypes => {
            for name in registry.names() {
                println!("{}", name);
            }
        }
    }

    Ok(())
}

/// Log bus events until every sender is dropped
fn spawn_event_logger(bus: &EventBus) -> JoinHandle<()> {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(ScripterEvent::FileRelocated { from, to, kind }) => {
                    info!(from = %from.display(), to = %to.display(), ?kind, "Relocated file");
                }
                Ok(ScripterEvent::SongMeasured {
                    path,
                    completed,
                    total_songs,
                    ..
                }) => {
                    info!(file = %path.display(), completed, total_songs, "Measured");
                }
                Ok(event) => debug!(?event, "Event"),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Event logger lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    })
}

/// Wait for the event logger to drain; a panicked logger is only reported
async fn finish_event_logger(logger: JoinHandle<()>) {
    if let Err(e) = logger.await {
        warn!(error = %e, "Event logger task failed");
    }
}

fn load(service: &ProjectService, path: &Path) -> Result<Project> {
    service
        .load(path)
        .with_context(|| format!("Failed to load project {}", path.display()))
}

async fn analyze(project: &Project, config: &TomlConfig) -> Result<()> {
    let bus = EventBus::default();
    let logger = spawn_event_logger(&bus);
    let runner = AnalysisRunner::new(
        Arc::new(PcmLoudnessMeter),
        LoudnessAnalyzer::new(config.analysis.outlier_threshold_db),
        config.analysis.max_concurrent_measurements,
    )
    .with_events(bus);

    let cancel = CancellationToken::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupt received, cancelling analysis");
                cancel.cancel();
            }
        })
    };

    let outcome = runner.run(analysis_rows(project), &cancel).await;
    ctrl_c.abort();
    drop(runner);
    finish_event_logger(logger).await;

    let Some(outcome) = outcome else {
        bail!("Analysis cancelled");
    };

    let folder = project.pack_paths().dir;
    for row in &outcome.rows {
        let name = row.path.strip_prefix(&folder).unwrap_or(&row.path);
        let level = match (row.average_db, row.peak_db) {
            (Some(avg), Some(peak)) => format!("{:>8.2} dB avg {:>8.2} dB peak", avg, peak),
            _ => "not measured".to_string(),
        };
        println!("{:>4} {:<40} {}", row.track_number, name.display(), level);
        if let Some(warning) = &row.warning {
            println!("     ! {}", warning);
        }
    }
    println!(
        "{} Total Average Decibels | {} Average Peak Decibels | {} flagged",
        outcome.summary.average_db, outcome.summary.average_peak_db, outcome.summary.flagged_songs
    );
    Ok(())
}
