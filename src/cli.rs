//! Command-line surface
//!
//! Thin front-end over the library: `init`, `index`, `status`, `watch`,
//! `search`, `complexity`. Exit codes: 0 success (no violations above the `--fail-on`
//! threshold), 1 violation threshold tripped or fatal error, 2 invalid
//! flags (clap's parse failure code). Command output goes to stdout;
//! diagnostics go to stderr through `tracing`.

use crate::application::analysis::complexity::Severity;
use crate::application::analysis::{ComplexityAnalyzer, ComplexityReport, ComplexityThresholds};
use crate::application::indexing::{IndexingOptions, Phase, ProgressEvent};
use crate::domain::error::Result;
use crate::domain::ports::VectorStore;
use crate::factory::ProjectContext;
use crate::infrastructure::config::{config_path, GlobalConfig};
use crate::infrastructure::manifest::MANIFEST_FILE;
use crate::infrastructure::version::VersionFile;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;

/// Semantic code indexing and analysis engine.
#[derive(Parser, Debug)]
#[command(name = "codescope")]
#[command(about = "Codescope - semantic code indexing and analysis")]
#[command(version)]
pub struct Cli {
    /// Project root (defaults to the current directory)
    #[arg(short = 'C', long, global = true)]
    pub root: Option<PathBuf>,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create the tool home and a default config file
    Init,
    /// Index the project (incremental unless --force)
    Index {
        /// Emit per-file progress
        #[arg(long)]
        verbose: bool,
        /// Clear the index and rebuild from scratch
        #[arg(long)]
        force: bool,
    },
    /// Show index state for the project
    Status,
    /// Watch the project and reindex incrementally on changes
    Watch {
        /// Also observe `.git` and reindex on branch/commit changes
        #[arg(long)]
        git: bool,
    },
    /// Semantic search over the index
    Search {
        /// Query text
        query: String,
        /// Maximum results
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Run the complexity analyzer
    Complexity {
        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
        /// Exit 1 when violations at or above this severity exist
        #[arg(long, value_enum)]
        fail_on: Option<FailOn>,
        /// Restrict analysis to these files
        #[arg(long, num_args = 1..)]
        files: Vec<String>,
    },
}

/// Complexity report formats.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable summary
    Text,
    /// Full report as JSON
    Json,
    /// SARIF 2.1.0 for code scanning integrations
    Sarif,
}

/// Severity gate for the exit code.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum FailOn {
    /// Fail on error-severity violations only
    Error,
    /// Fail on warnings and errors
    Warning,
}

/// Run a parsed CLI invocation; returns the process exit code.
pub async fn run(cli: Cli) -> i32 {
    match dispatch(cli).await {
        Ok(code) => code,
        Err(err) => {
            tracing::error!(error = %err, "command failed");
            eprintln!("error: {err}");
            1
        }
    }
}

async fn dispatch(cli: Cli) -> Result<i32> {
    let root = match cli.root {
        Some(root) => root,
        None => std::env::current_dir()?,
    };

    match cli.command {
        Command::Init => init(),
        Command::Index { verbose, force } => index(&root, verbose, force).await,
        Command::Status => status(&root).await,
        Command::Watch { git } => watch(&root, git).await,
        Command::Search { query, limit } => search(&root, &query, limit).await,
        Command::Complexity {
            format,
            fail_on,
            files,
        } => complexity(&root, format, fail_on, files).await,
    }
}

fn init() -> Result<i32> {
    let path = config_path();
    if path.exists() {
        println!("config already exists at {}", path.display());
        return Ok(0);
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, GlobalConfig::default().to_toml())?;
    println!("wrote default config to {}", path.display());
    Ok(0)
}

async fn index(root: &std::path::Path, verbose: bool, force: bool) -> Result<i32> {
    let config = GlobalConfig::load()?;
    let context = ProjectContext::build(config, root).await?;
    let indexer = context.indexer();

    let mut options = IndexingOptions::new(root);
    options.verbose = verbose;
    options.force = force;
    if verbose {
        let callback: crate::application::indexing::ProgressCallback =
            Arc::new(|event: ProgressEvent| {
                if event.phase == Phase::Complete {
                    eprintln!("{}", event.message);
                }
            });
        options.on_progress = Some(callback);
    }

    let result = indexer.index_codebase(&options).await;
    if result.success {
        println!(
            "indexed {} files ({} chunks) in {}ms{}",
            result.files_indexed,
            result.chunks_created,
            result.duration_ms,
            if result.incremental { " [incremental]" } else { "" },
        );
        Ok(0)
    } else {
        eprintln!(
            "indexing failed: {}",
            result.error.as_deref().unwrap_or("unknown error")
        );
        Ok(1)
    }
}

async fn status(root: &std::path::Path) -> Result<i32> {
    let config = GlobalConfig::load()?;
    let context = ProjectContext::build(config, root).await?;

    println!("project:  {}", context.project_root.display());
    println!("index:    {}", context.index_root.display());
    println!("backend:  {}", context.store.backend_name());
    println!(
        "scope:    {}/{} @ {} ({})",
        context.scope.org_id, context.scope.repo_id, context.scope.branch, context.scope.commit_sha
    );

    match context.manifest.load().await {
        Some(manifest) => {
            let chunk_total: u32 = manifest.files.values().map(|f| f.chunk_count).sum();
            println!("files:    {}", manifest.files.len());
            println!("chunks:   {chunk_total}");
            println!(
                "indexed:  {}",
                chrono::DateTime::from_timestamp_millis(manifest.last_indexed as i64)
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "unknown".to_string())
            );
            if let Some(git) = manifest.git_state {
                println!("git:      {} @ {}", git.branch, git.commit);
            }
        }
        None => {
            println!(
                "no index yet (missing {MANIFEST_FILE}); run `codescope index`"
            );
        }
    }

    let version = VersionFile::new(&context.index_root).read().unwrap_or(0);
    println!("version:  {version}");
    Ok(0)
}

async fn watch(root: &std::path::Path, git: bool) -> Result<i32> {
    use crate::application::indexing::{ScannerOptions, WatchService};
    use crate::infrastructure::watcher::WatcherOptions;

    let config = GlobalConfig::load()?;
    let max_file_size_bytes = config.indexing.max_file_size_bytes;
    let context = ProjectContext::build(config, root).await?;
    let indexer = Arc::new(context.indexer());

    // Baseline pass so the watcher only handles deltas.
    let result = indexer.index_codebase(&IndexingOptions::new(root)).await;
    if !result.success {
        eprintln!(
            "initial indexing failed: {}",
            result.error.as_deref().unwrap_or("unknown error")
        );
        return Ok(1);
    }
    println!(
        "watching {} ({} files indexed)",
        root.display(),
        result.files_indexed
    );

    let mut service = WatchService::new(
        indexer,
        root,
        WatcherOptions {
            watch_git: git,
            ..Default::default()
        },
        ScannerOptions {
            max_file_size_bytes,
            index_root: Some(context.index_root.clone()),
        },
    );
    service.start()?;

    tokio::signal::ctrl_c().await.ok();
    eprintln!("shutting down watcher");
    service.stop().await;
    Ok(0)
}

async fn search(root: &std::path::Path, query: &str, limit: usize) -> Result<i32> {
    use crate::application::SearchService;

    let config = GlobalConfig::load()?;
    let context = ProjectContext::build(config, root).await?;
    context.store.initialize().await?;

    let service = SearchService::new(context.store.clone(), context.embedder.clone());
    let results = service.search_code(query, limit).await?;
    if results.is_empty() {
        println!("no results");
        return Ok(0);
    }
    for result in results {
        println!(
            "{:<18} {:.3}  {}:{}-{}  {}",
            format!("[{:?}]", result.relevance),
            result.score,
            result.metadata.file,
            result.metadata.start_line,
            result.metadata.end_line,
            result.metadata.symbol_name.as_deref().unwrap_or(""),
        );
        let preview: String = result.content.lines().take(2).collect::<Vec<_>>().join(" | ");
        println!("    {preview}");
    }
    Ok(0)
}

async fn complexity(
    root: &std::path::Path,
    format: OutputFormat,
    fail_on: Option<FailOn>,
    files: Vec<String>,
) -> Result<i32> {
    let config = GlobalConfig::load()?;
    let context = ProjectContext::build(config, root).await?;
    context.store.initialize().await?;

    let analyzer = ComplexityAnalyzer::new(context.store.clone());
    let thresholds = ComplexityThresholds::default();
    let file_filter = (!files.is_empty()).then_some(files);
    let report = analyzer.analyze(file_filter.as_deref(), &thresholds).await?;

    match format {
        OutputFormat::Text => print_text(&report),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Sarif => println!("{}", serde_json::to_string_pretty(&to_sarif(&report))?),
    }

    let tripped = match fail_on {
        Some(FailOn::Error) => report.violations_at_least(Severity::Error) > 0,
        Some(FailOn::Warning) => report.violations_at_least(Severity::Warning) > 0,
        None => false,
    };
    Ok(if tripped { 1 } else { 0 })
}

fn print_text(report: &ComplexityReport) {
    let s = &report.summary;
    println!(
        "{} files analyzed, {} violations ({} errors, {} warnings)",
        s.files_analyzed, s.total_violations, s.errors, s.warnings
    );
    println!(
        "avg complexity {:.1}, max {}",
        s.avg_complexity, s.max_complexity
    );
    for (file, details) in &report.files {
        println!("\n{file} [{:?}]", details.risk_level);
        for violation in &details.violations {
            println!(
                "  {:?} {:?} {} = {:.1} (threshold {:.1}) at lines {}-{}",
                violation.severity,
                violation.metric,
                violation.symbol.as_deref().unwrap_or("<anonymous>"),
                violation.value,
                violation.threshold,
                violation.start_line,
                violation.end_line,
            );
        }
        if details.dependent_count > 0 {
            println!("  {} dependents", details.dependent_count);
        }
    }
}

fn to_sarif(report: &ComplexityReport) -> serde_json::Value {
    let results: Vec<serde_json::Value> = report
        .files
        .values()
        .flat_map(|f| &f.violations)
        .map(|violation| {
            serde_json::json!({
                "ruleId": format!("codescope/{:?}", violation.metric).to_lowercase(),
                "level": match violation.severity {
                    Severity::Error => "error",
                    Severity::Warning => "warning",
                },
                "message": {
                    "text": format!(
                        "{} {:?} is {:.1} (threshold {:.1})",
                        violation.symbol.as_deref().unwrap_or("<anonymous>"),
                        violation.metric,
                        violation.value,
                        violation.threshold,
                    )
                },
                "locations": [{
                    "physicalLocation": {
                        "artifactLocation": {"uri": violation.file},
                        "region": {
                            "startLine": violation.start_line,
                            "endLine": violation.end_line,
                        }
                    }
                }]
            })
        })
        .collect();

    serde_json::json!({
        "$schema": "https://raw.githubusercontent.com/oasis-tcs/sarif-spec/master/Schemata/sarif-schema-2.1.0.json",
        "version": "2.1.0",
        "runs": [{
            "tool": {
                "driver": {
                    "name": "codescope",
                    "version": env!("CARGO_PKG_VERSION"),
                    "informationUri": "https://github.com/codescope-dev/codescope",
                }
            },
            "results": results,
        }]
    })
}
