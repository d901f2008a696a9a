//! nativeconf CLI
//!
//! Probes the host toolchain and writes the platform configuration.

use anyhow::{Context, Result};
use clap::Parser;
use nativeconf_core::{ConfigSink, GeneratorConfig, Platform, SinkKind};
use nativeconf_emit::{EmbeddedPatchSink, FlatSink};
use nativeconf_probe::{Catalog, Orchestrator, ProbeCompiler, RunSummary};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "nativeconf")]
#[command(author, version, about = "Native platform configuration generator", long_about = None)]
struct Cli {
    /// Generator configuration (YAML)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Probe catalog replacing the built-in one (YAML)
    #[arg(long, value_name = "FILE")]
    catalog: Option<PathBuf>,

    /// Sink to write to (flat, embedded)
    #[arg(short, long)]
    sink: Option<SinkKind>,

    /// Output file of the flat sink
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Source file patched by the embedded sink
    #[arg(short, long, value_name = "FILE")]
    target: Option<PathBuf>,

    /// Print the run summary as JSON
    #[arg(long)]
    summary_json: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(&cli)?;
    let catalog = match &cli.catalog {
        Some(path) => Catalog::load_yaml(path)
            .with_context(|| format!("loading catalog {}", path.display()))?,
        None => Catalog::builtin(),
    };

    let platform = Platform::detect()?;
    let compiler = ProbeCompiler::from_config(&config, platform);
    info!(
        "Probing {} with {}",
        platform,
        compiler.compiler()
    );

    let mut sink = open_sink(&config, platform)?;
    let summary = Orchestrator::new(&compiler, platform)
        .run(&catalog, sink.as_mut())
        .context("probe run failed")?;

    print_summary(&summary, cli.summary_json)?;
    Ok(())
}

fn load_config(cli: &Cli) -> Result<GeneratorConfig> {
    let mut config = match &cli.config {
        Some(path) => GeneratorConfig::from_yaml_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => GeneratorConfig::default(),
    };

    if let Some(sink) = cli.sink {
        config.sink = sink;
    }
    if let Some(output) = &cli.output {
        config.flat_output = output.clone();
    }
    if let Some(target) = &cli.target {
        config.patch.target = Some(target.clone());
    }
    Ok(config)
}

fn open_sink(config: &GeneratorConfig, platform: Platform) -> Result<Box<dyn ConfigSink>> {
    match config.sink {
        SinkKind::Flat => {
            let sink = FlatSink::create(&config.flat_output, config.prefix.clone())
                .with_context(|| format!("creating {}", config.flat_output.display()))?;
            info!("Writing {}", sink.path().display());
            Ok(Box::new(sink))
        }
        SinkKind::Embedded => {
            let target = config.patch_target(platform);
            let sink = EmbeddedPatchSink::open(
                &target,
                &config.patch,
                config.prefix.clone(),
                platform,
            )
            .with_context(|| format!("opening {}", target.display()))?;
            info!("Patching {}", sink.path().display());
            Ok(Box::new(sink))
        }
    }
}

fn print_summary(summary: &RunSummary, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
        return Ok(());
    }

    println!("Platform: {}", summary.platform);
    println!("Sink: {}", summary.sink);
    for probe in &summary.probes {
        println!("   {:<16} {:>4} entries", probe.name, probe.entries);
    }
    println!("Total: {} entries", summary.total_entries());
    Ok(())
}
