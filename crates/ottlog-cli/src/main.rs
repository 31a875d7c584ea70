use chrono_tz::Tz;
use clap::{Parser, Subcommand};
use ottlog_catalog::MemoryCatalog;
use ottlog_core::config::{Config, ConfigError, SinkConfig};
use ottlog_core::traits::EventSink;
use ottlog_engine::{Pipeline, RunSummary};
use ottlog_sinks_file::{FileSink, LocalObjectStore, ObjectStorageSink};
use ottlog_sinks_stream::{StdoutTransport, StreamSink};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "ottlog")]
#[command(about = "Synthetic OTT user-behavior log generator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Generate logs in the configured batch or streaming mode.
    Gen {
        #[arg(short, long)]
        config: PathBuf,
        /// Overrides the sink output directory.
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Print the loaded config and exit.
        #[arg(long)]
        dry_run: bool,
        /// Stop after this many emitted logs.
        #[arg(long)]
        max_events: Option<u64>,
    },
    /// Seed a catalog population and write it as a JSON fixture.
    Catalog {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(err) = run(Cli::parse()) {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Gen {
            config,
            output,
            dry_run,
            max_events,
        } => {
            let mut loaded = Config::from_path(&config)?;

            if let Some(dir) = output {
                let dir = dir.to_string_lossy().to_string();
                match &mut loaded.sink {
                    SinkConfig::File(sink) => sink.output_dir = dir,
                    SinkConfig::S3(sink) => sink.output_dir = dir,
                    SinkConfig::Kinesis(_) => {}
                }
            }

            if dry_run {
                println!("config loaded: {loaded:#?}");
                return Ok(());
            }

            let running = Arc::new(AtomicBool::new(true));
            {
                let running = Arc::clone(&running);
                ctrlc::set_handler(move || {
                    running.store(false, Ordering::Relaxed);
                })?;
            }

            let catalog = MemoryCatalog::from_config(&loaded.catalog, loaded.seed)?;
            info!(
                accounts = catalog.account_count(),
                contents = catalog.content_count(),
                "catalog ready"
            );

            let tz = Tz::from_str(&loaded.global.timezone)
                .map_err(|_| format!("unknown timezone {:?}", loaded.global.timezone))?;

            let summary = match loaded.sink.clone() {
                SinkConfig::File(sink_config) => {
                    let sink = FileSink::new(&sink_config.output_dir, &sink_config.topic, tz)
                        .map_err(ConfigError::Io)?;
                    info!(
                        output_dir = %sink_config.output_dir,
                        topic = %sink_config.topic,
                        "writing hour-partitioned files"
                    );
                    run_pipeline(&loaded, catalog, sink, running, max_events)?
                }
                SinkConfig::S3(sink_config) => {
                    let root = PathBuf::from(&sink_config.output_dir).join(&sink_config.s3_bucket);
                    let store = LocalObjectStore::new(root).map_err(ConfigError::Io)?;
                    let sink = ObjectStorageSink::new(
                        store,
                        sink_config.s3_prefix.clone(),
                        sink_config.topic.clone(),
                        tz,
                    );
                    info!(
                        bucket = %sink_config.s3_bucket,
                        prefix = %sink_config.s3_prefix,
                        "staging object uploads locally"
                    );
                    run_pipeline(&loaded, catalog, sink, running, max_events)?
                }
                SinkConfig::Kinesis(sink_config) => {
                    info!(
                        stream = %sink_config.kinesis_stream_name,
                        region = %sink_config.kinesis_region,
                        "publishing records on the stdout transport"
                    );
                    let sink = StreamSink::new(StdoutTransport::new());
                    run_pipeline(&loaded, catalog, sink, running, max_events)?
                }
            };

            info!(
                emitted = summary.emitted,
                skipped = summary.skipped,
                sink_errors = summary.sink_errors,
                "generation finished"
            );
        }
        Commands::Catalog { config, output } => {
            let loaded = Config::from_path(&config)?;
            let catalog = MemoryCatalog::seeded(&loaded.catalog, loaded.seed);
            catalog.save_fixture(&output)?;
            println!("catalog fixture written to {}", output.display());
        }
    }

    Ok(())
}

fn run_pipeline<S: EventSink>(
    config: &Config,
    catalog: MemoryCatalog,
    sink: S,
    running: Arc<AtomicBool>,
    max_events: Option<u64>,
) -> Result<RunSummary, ConfigError> {
    let mut pipeline = Pipeline::from_config(config, catalog, sink, running)?;
    pipeline.run(max_events)
}
