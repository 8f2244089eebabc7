//! artifact-modelling-cli
//!
//! Import artifacts into an in-memory tree store, print them as JSON or
//! export them again.

mod output;

use anyhow::{Context, Result};
use artifact_modelling_sdk::{
    ExportPipeline, FileSystemArtifactSource, ImportPipeline, MemoryTreeStore, MetamodelRegistry,
    Model, SdkConfig,
};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "artifact-modelling-cli", version, about = "Import, inspect and export artifacts")]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List installable categories and their metamodels
    Categories,
    /// Import an artifact and print the model tree as JSON
    Import {
        path: PathBuf,
        /// Metamodel id; probed from the artifact when omitted
        #[arg(long)]
        metamodel: Option<String>,
        /// Keep dependency models in the store
        #[arg(long)]
        persist_dependencies: bool,
    },
    /// Import an artifact and export it again
    Export {
        path: PathBuf,
        #[arg(long)]
        metamodel: Option<String>,
        /// Output file, `-` for stdout
        #[arg(long, short)]
        output: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => SdkConfig::from_file(path)?,
        None => SdkConfig::default(),
    };
    let registry = Arc::new(MetamodelRegistry::from_config(&config)?);
    // Without an install list everything the repositories offer is usable
    if config.install.is_empty() {
        for category in registry.installable_categories()? {
            registry.install(&category)?;
        }
    }

    match cli.command {
        Command::Categories => {
            let mut categories = Vec::new();
            for category in registry.installable_categories()? {
                let metamodels = registry.metamodels_for_category(&category)?;
                categories.push((category, metamodels));
            }
            print!("{}", output::format_categories(&categories));
        }
        Command::Import {
            path,
            metamodel,
            persist_dependencies,
        } => {
            let (pipeline, model) =
                import(registry, config, &path, metamodel.as_deref(), persist_dependencies)?;
            let session = pipeline.open_session()?;
            let tree = model.tree(&session)?;
            println!("{}", output::format_model_json(&model, &tree)?);
        }
        Command::Export {
            path,
            metamodel,
            output,
        } => {
            let (pipeline, model) = import(registry.clone(), config, &path, metamodel.as_deref(), false)?;
            let exporter = ExportPipeline::new(registry, pipeline.store().clone());
            if output == "-" {
                let stdout = std::io::stdout();
                exporter.export(&model, &mut stdout.lock())?;
            } else {
                let bytes = exporter.export_to_vec(&model)?;
                let mut file = std::fs::File::create(&output)
                    .with_context(|| format!("Failed to create {}", output))?;
                file.write_all(&bytes)?;
                eprintln!("Wrote {} bytes to {}", bytes.len(), output);
            }
        }
    }
    Ok(())
}

/// Import `path` with its directory as artifact base, so relative
/// dependency references resolve next to it
fn import(
    registry: Arc<MetamodelRegistry>,
    config: SdkConfig,
    path: &Path,
    metamodel: Option<&str>,
    persist: bool,
) -> Result<(ImportPipeline, Model)> {
    let base = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("Not a file path: {}", path.display()))?;

    let store = Arc::new(MemoryTreeStore::new());
    let pipeline = ImportPipeline::new(
        registry,
        store,
        Arc::new(FileSystemArtifactSource::new(base)),
        config,
    )?;
    let model = pipeline
        .import_path(file_name, metamodel, persist)
        .with_context(|| format!("Failed to import {}", path.display()))?;
    Ok((pipeline, model))
}
