use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use citesync_core::{AppConfig, Catalog, ExitCode, Paper, SqliteCatalog};
use citesync_harvest::{Doi, HarvestConfig, HarvestError, Harvester};

// ─── CLI Definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "citesync",
    about = "Harvest DOI metadata into a local paper catalog",
    version,
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output in JSON format. Also enabled by setting CITESYNC_JSON=1.
    #[arg(long, global = true)]
    json: bool,

    /// Config file (defaults to ~/.config/citesync/config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the raw citeproc record for a DOI without saving it.
    Fetch { doi: String },

    /// Fetch and save a list of DOIs.
    Ingest {
        dois: Vec<String>,
        /// Read DOIs from a file, one per line.
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Ingest the results of a registry search.
    Search {
        query: String,
        /// Registry filter as key=value, e.g. from-pub-date=2020.
        #[arg(long = "filter", action = clap::ArgAction::Append)]
        filters: Vec<String>,
        #[arg(long)]
        max_pages: Option<usize>,
    },

    /// Pull abstract and PDF links for a stored publication.
    Consolidate { doi: String },

    /// Show the stored paper owning a DOI.
    Paper { doi: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let start = Instant::now();
    let cli = Cli::parse();
    let json_output = cli.json || std::env::var("CITESYNC_JSON").as_deref() == Ok("1");

    let (config, harvest_config) = load_config(cli.config.as_deref())?;
    init_tracing(&config);

    let catalog = Arc::new(SqliteCatalog::open(&config.database_path())?);
    let harvester = match Harvester::new(harvest_config, catalog.clone()) {
        Ok(h) => h,
        Err(e) => fail(json_output, ExitCode::InvalidArgs, "invalid_config", &e.to_string(), start),
    };

    match cli.command {
        Commands::Fetch { doi } => {
            let record = match harvester.fetcher().fetch_single(&doi).await {
                Ok(r) => r,
                Err(e) => fail_harvest(json_output, &e, start),
            };
            let Some(record) = record else {
                fail(json_output, ExitCode::NotFound, "not_found", &format!("DOI not resolved: {doi}"), start);
            };
            if json_output {
                print_json(&serde_json::json!({"status":"ok","data":record,"meta":meta(start)}))?;
            } else {
                println!("{}", serde_json::to_string_pretty(&record)?);
            }
        }

        Commands::Ingest { mut dois, file } => {
            if let Some(path) = file {
                let contents = std::fs::read_to_string(&path)
                    .with_context(|| format!("reading {}", path.display()))?;
                dois.extend(
                    contents
                        .lines()
                        .map(str::trim)
                        .filter(|l| !l.is_empty() && !l.starts_with('#'))
                        .map(String::from),
                );
            }
            if dois.is_empty() {
                fail(json_output, ExitCode::InvalidArgs, "invalid_args", "No DOIs given", start);
            }

            let report = match harvester.ingest_dois(&dois).await {
                Ok(r) => r,
                Err(e) => fail_harvest(json_output, &e, start),
            };
            if json_output {
                print_json(&serde_json::json!({"status":"ok","data":report,"meta":meta(start)}))?;
            } else {
                println!("{report}");
            }
        }

        Commands::Search { query, filters, max_pages } => {
            let mut parsed = Vec::with_capacity(filters.len());
            for filter in &filters {
                match filter.split_once('=') {
                    Some((k, v)) if !k.trim().is_empty() => {
                        parsed.push((k.trim().to_string(), v.trim().to_string()))
                    }
                    _ => fail(
                        json_output,
                        ExitCode::InvalidArgs,
                        "invalid_args",
                        &format!("Filter must be key=value: {filter}"),
                        start,
                    ),
                }
            }

            let cancel = CancellationToken::new();
            let on_signal = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("interrupted, finishing the current record");
                    on_signal.cancel();
                }
            });

            let report = match harvester
                .ingest_search(Some(&query), parsed, max_pages, cancel)
                .await
            {
                Ok(r) => r,
                Err(e) => fail_harvest(json_output, &e, start),
            };
            if json_output {
                print_json(&serde_json::json!({"status":"ok","data":report,"meta":meta(start)}))?;
            } else {
                println!("{report}");
            }
        }

        Commands::Consolidate { doi } => {
            let consolidation = match harvester.consolidate(&doi).await {
                Ok(c) => c,
                Err(e) => fail_harvest(json_output, &e, start),
            };
            let Some(consolidation) = consolidation else {
                fail(json_output, ExitCode::NotFound, "not_found", &format!("No publication stored for {doi}"), start);
            };
            if json_output {
                print_json(&serde_json::json!({"status":"ok","data":consolidation,"meta":meta(start)}))?;
            } else if consolidation.changed() {
                println!("Updated {}: {}", doi, consolidation.fields_updated.join(", "));
            } else {
                println!("Nothing new for {doi}");
            }
        }

        Commands::Paper { doi } => {
            let doi = match Doi::parse(&doi) {
                Ok(d) => d,
                Err(e) => fail_harvest(json_output, &e, start),
            };
            let Some(publication) = catalog.find_publication_by_doi(doi.as_str())? else {
                fail(json_output, ExitCode::NotFound, "not_found", &format!("No publication stored for {doi}"), start);
            };
            let Some(paper) = catalog.get_paper(&publication.paper_id)? else {
                fail(json_output, ExitCode::NotFound, "not_found", &format!("Paper missing for {doi}"), start);
            };
            let publications = catalog.publications_for_paper(&paper.id)?;

            if json_output {
                print_json(&serde_json::json!({
                    "status": "ok",
                    "data": { "paper": paper, "publications": publications },
                    "meta": meta(start)
                }))?;
            } else {
                print_paper(&paper);
                for publication in &publications {
                    let doi = publication.doi.as_deref().unwrap_or("-");
                    println!("  {doi}  {}", publication.journal_title);
                }
            }
        }
    }

    Ok(())
}

// ─── Helpers ────────────────────────────────────────────────────────────────

fn load_config(path: Option<&Path>) -> Result<(AppConfig, HarvestConfig)> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(AppConfig::config_path);
    let mut config = AppConfig::load_from(&path)
        .with_context(|| format!("loading {}", path.display()))?;
    config.apply_env_overrides();
    let mut harvest = HarvestConfig::load_from(&path)
        .with_context(|| format!("loading [harvest] from {}", path.display()))?;
    harvest.apply_env_overrides();
    Ok((config, harvest))
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if config.logging.format == "json" {
        builder.json().init();
    } else {
        builder.with_target(false).init();
    }
}

fn print_paper(paper: &Paper) {
    println!("{}  ({})", paper.title, paper.year());
    println!("  {}", paper.author_names().join(", "));
    if let Some(url) = &paper.pdf_url {
        println!("  pdf: {url}");
    }
}

fn meta(start: Instant) -> serde_json::Value {
    serde_json::json!({ "duration_ms": start.elapsed().as_millis() })
}

fn print_json(val: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(val)?);
    Ok(())
}

fn fail_harvest(json_output: bool, err: &HarvestError, start: Instant) -> ! {
    let (code, kind) = match err {
        HarvestError::MetadataSource { .. } => (ExitCode::NetworkError, "network"),
        HarvestError::InvalidDoi(_) | HarvestError::InvalidOrcid(_) => {
            (ExitCode::InvalidArgs, "invalid_args")
        }
        HarvestError::Catalog(e) if e.is_persistence_conflict() => (ExitCode::Conflict, "conflict"),
        _ => (ExitCode::GeneralError, "error"),
    };
    fail(json_output, code, kind, &err.to_string(), start)
}

fn fail(json_output: bool, code: ExitCode, kind: &str, message: &str, start: Instant) -> ! {
    if json_output {
        let body = serde_json::json!({"status":"error","error":kind,"message":message,"meta":meta(start)});
        println!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
    } else {
        eprintln!("{message}");
    }
    std::process::exit(code as i32)
}
