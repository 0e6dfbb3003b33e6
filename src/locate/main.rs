//! Batch location extraction.
//!
//! Reads JSON-lines documents (`{"id", "text", "spans"}`), resolves their
//! spans against a gazetteer and writes one `{"id", "annotations"}` line per
//! document.

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use toponym::source::{CachingLocationSource, HttpLocationSource, InMemoryLocationSource, LocationSource};
use toponym::{EngineConfig, InputDocument, LocationAnnotation, LocationExtractor, StrategyKind};

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Parser, Debug)]
#[command(name = "locate")]
#[command(about = "Resolve place-name spans in JSON-lines documents")]
struct Args {
    /// JSON-lines input, one document per line
    #[arg(short, long)]
    input: PathBuf,

    /// Output file (stdout if omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// TOML engine configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Disambiguation strategy (baseline, proximity, hierarchy, feature_scored)
    #[arg(long)]
    strategy: Option<StrategyKind>,

    /// Gazetteer TSV file (optionally gzipped)
    #[arg(long)]
    gazetteer: Option<PathBuf>,

    /// Remote gazetteer base URL, used when no TSV file is given
    #[arg(long)]
    gazetteer_url: Option<String>,

    /// Gazetteer lookup timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Tree-ensemble scorer model (JSON, optionally gzipped)
    #[arg(long)]
    scorer: Option<PathBuf>,

    /// Context model TSV
    #[arg(long)]
    context: Option<PathBuf>,

    /// Directory of extra abbreviation files
    #[arg(long)]
    abbreviations: Option<PathBuf>,

    /// Skip coordinate-literal tagging
    #[arg(long)]
    no_coordinates: bool,

    /// Documents per parallel batch
    #[arg(long, default_value = "256")]
    batch_size: usize,
}

impl Args {
    /// Command-line values take precedence over the config file.
    fn apply(&self, config: &mut EngineConfig) {
        let engine = &mut config.engine;
        if let Some(strategy) = self.strategy {
            engine.strategy = strategy;
        }
        if let Some(timeout_ms) = self.timeout_ms {
            engine.lookup_timeout_ms = timeout_ms;
        }
        if self.gazetteer.is_some() {
            engine.gazetteer = self.gazetteer.clone();
        }
        if self.gazetteer_url.is_some() {
            engine.gazetteer_url = self.gazetteer_url.clone();
        }
        if self.scorer.is_some() {
            engine.scorer_model = self.scorer.clone();
        }
        if self.context.is_some() {
            engine.context_model = self.context.clone();
        }
        if self.abbreviations.is_some() {
            engine.abbreviations_dir = self.abbreviations.clone();
        }
    }
}

#[derive(Serialize)]
struct OutputRecord<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<&'a str>,
    annotations: &'a [LocationAnnotation],
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => EngineConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    args.apply(&mut config);

    info!("Toponym locate");
    info!("Input: {}", args.input.display());
    let documents = read_documents(&args.input)?;
    info!("Read {} documents", documents.len());

    let output: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(
            File::create(path).with_context(|| format!("Failed to create {}", path.display()))?,
        ),
        None => Box::new(io::stdout().lock()),
    };
    let mut output = BufWriter::new(output);

    if let Some(path) = config.engine.gazetteer.clone() {
        let source = InMemoryLocationSource::load_tsv(&path)
            .with_context(|| format!("Failed to load gazetteer {}", path.display()))?;
        let extractor = build_extractor(source, &config, &args)?;
        run(&extractor, &documents, args.batch_size, &mut output).await?;
    } else if let Some(url) = config.engine.gazetteer_url.clone() {
        info!("Using remote gazetteer at {}", url);
        let http = HttpLocationSource::new(&url, config.lookup_timeout())
            .context("Failed to build gazetteer client")?;
        let extractor = build_extractor(CachingLocationSource::new(http), &config, &args)?;
        run(&extractor, &documents, args.batch_size, &mut output).await?;

        let stats = extractor.source().metrics().snapshot();
        info!(
            "Gazetteer cache: {} hits, {} misses ({:.1}% hit rate)",
            stats.hits,
            stats.misses,
            stats.hit_rate() * 100.0
        );
    } else {
        anyhow::bail!("No gazetteer configured; pass --gazetteer or --gazetteer-url");
    }

    output.flush().context("Failed to flush output")?;
    Ok(())
}

fn build_extractor<S: LocationSource>(
    source: S,
    config: &EngineConfig,
    args: &Args,
) -> Result<LocationExtractor<S>> {
    let extractor = LocationExtractor::from_config(source, config)
        .context("Failed to initialize extractor")?
        .with_coordinate_tagging(!args.no_coordinates);
    Ok(extractor)
}

fn read_documents(path: &Path) -> Result<Vec<InputDocument>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut documents = Vec::new();
    for (number, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read line {}", number + 1))?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<InputDocument>(&line) {
            Ok(document) => documents.push(document),
            Err(e) => warn!("Skipping line {}: {}", number + 1, e),
        }
    }
    Ok(documents)
}

async fn run<S: LocationSource, W: Write>(
    extractor: &LocationExtractor<S>,
    documents: &[InputDocument],
    batch_size: usize,
    output: &mut W,
) -> Result<()> {
    let pb = ProgressBar::new(documents.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")?
            .progress_chars("#>-"),
    );

    let mut located = 0usize;
    for chunk in documents.chunks(batch_size.max(1)) {
        let results = extractor.extract_batch(chunk).await;
        for (document, annotations) in chunk.iter().zip(&results) {
            located += annotations.len();
            let record = OutputRecord {
                id: document.id.as_deref(),
                annotations,
            };
            serde_json::to_writer(&mut *output, &record).context("Failed to write output")?;
            output.write_all(b"\n").context("Failed to write output")?;
        }
        pb.inc(chunk.len() as u64);
    }

    pb.finish_with_message("Processing complete");
    info!("Located {} mentions in {} documents", located, documents.len());
    Ok(())
}
