use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use mockgen::pipeline::read_units;
use mockgen::{harness_for, FileWalker, Generator, GeneratorConfig, MergedModel, Pipeline};
use protocol::InterfaceModel;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mockgen")]
#[command(about = "Generate gMock classes for pure-virtual C++ interfaces", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file layered above ./mockgen.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Conditional-compilation symbol, may be repeated
    #[arg(short = 'D', long = "define", global = true)]
    defines: Vec<String>,

    #[arg(short, long, global = true)]
    verbose: bool,

    /// Worker threads for extraction
    #[arg(short, long, global = true)]
    jobs: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write one mock per interface into DIR
    Generate {
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,

        /// Only interfaces whose qualified name starts with this prefix
        #[arg(short, long, default_value = "")]
        expr: String,

        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Print the Interface Model as JSON
    Model {
        #[arg(short, long, default_value = "")]
        expr: String,

        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Some(jobs) = cli.jobs {
        rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build_global()
            .context("failed to configure the worker pool")?;
    }

    let config = GeneratorConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Generate { dir, expr, paths } => {
            let merged = extract(&config, &cli.defines, &paths)?;
            let written = Generator::new(&config, &dir).generate(&merged.model, &expr)?;
            println!(
                "Generated {} files for {} of {} interfaces ({} warnings)",
                written.len(),
                merged.model.matching(&expr).count(),
                merged.model.len(),
                merged.diagnostics.len()
            );
        }

        Commands::Model { expr, paths } => {
            let mut merged = extract(&config, &cli.defines, &paths)?;
            merged.model = InterfaceModel::new(merged.model.matching(&expr).cloned().collect());
            println!("{}", serde_json::to_string_pretty(&merged)?);
        }
    }

    Ok(())
}

fn extract(config: &GeneratorConfig, defines: &[String], paths: &[PathBuf]) -> Result<MergedModel> {
    let files = FileWalker::new(&config.extensions, &config.exclude)?.collect(paths)?;
    let units = read_units(&files)?;
    info!("Processing {} units", units.len());

    Pipeline::new(harness_for(config, defines))
        .run(&units)
        .map_err(|err| anyhow!("{}", err.to_diagnostic()))
}
