use anyhow::{Context, Result};
use artifact_patcher::{
    classify, load_from_path, parse_edits, read_document, atomic_write, ApplyOptions,
    CompressOptions, Compressor, Document, EditIntent, EditOutcome, EngineConfig, PatchApplier,
    PatchStats,
};
use clap::{ArgAction, Parser, Subcommand};
use colored::Colorize;
use similar::{ChangeTag, TextDiff};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Overrides the `-v` derived log filter when set.
const LOG_ENV: &str = "ARTIFACT_PATCHER_LOG";

#[derive(Parser)]
#[command(name = "artifact-patcher")]
#[command(about = "Apply LLM search/replace edits to generated documents", long_about = None)]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply edit blocks to a document
    Apply {
        /// Document to patch
        #[arg(short, long)]
        document: PathBuf,

        /// File holding the edit blocks
        #[arg(short, long)]
        edits: PathBuf,

        /// Accept weaker fuzzy matches
        #[arg(long)]
        relaxed: bool,

        /// Restrict matching to these top-level declarations
        #[arg(long, value_name = "NAME")]
        scope: Vec<String>,

        /// Engine config TOML
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Dry run - report without writing the document
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Show unified diff of changes
        #[arg(long)]
        diff: bool,

        /// Print stats as JSON
        #[arg(long)]
        json: bool,
    },

    /// Compress a document before sending it to the model
    Compress {
        /// Document to compress
        #[arg(short, long)]
        file: PathBuf,

        /// Edit request; used to pick the intent and keep mentioned declarations
        #[arg(short, long)]
        request: Option<String>,

        /// Intent to compress for (style, content, bugfix, feature, refactor, unknown)
        #[arg(short, long)]
        intent: Option<EditIntent>,

        /// Skip compression for documents with fewer lines
        #[arg(long)]
        min_lines: Option<usize>,

        /// Engine config TOML
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Classify an edit request
    Classify {
        /// The request text
        #[arg(required = true)]
        text: Vec<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Apply {
            document,
            edits,
            relaxed,
            scope,
            config,
            dry_run,
            diff,
            json,
        } => cmd_apply(ApplyArgs {
            document,
            edits,
            relaxed,
            scope,
            config,
            dry_run,
            diff,
            json,
        }),

        Commands::Compress {
            file,
            request,
            intent,
            min_lines,
            config,
        } => cmd_compress(&file, request.as_deref(), intent, min_lines, config.as_deref()),

        Commands::Classify { text } => cmd_classify(&text.join(" ")),
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "artifact_patcher=debug",
        _ => "artifact_patcher=trace",
    };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => Ok(load_from_path(path)?),
        None => Ok(EngineConfig::default()),
    }
}

struct ApplyArgs {
    document: PathBuf,
    edits: PathBuf,
    relaxed: bool,
    scope: Vec<String>,
    config: Option<PathBuf>,
    dry_run: bool,
    diff: bool,
    json: bool,
}

fn cmd_apply(args: ApplyArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let text = read_document(&args.document)
        .with_context(|| format!("failed to read {}", args.document.display()))?;
    let wire = fs::read_to_string(&args.edits)
        .with_context(|| format!("failed to read {}", args.edits.display()))?;
    let edits = parse_edits(&wire).with_context(|| format!("invalid edit blocks in {}", args.edits.display()))?;

    let options = ApplyOptions {
        relaxed: args.relaxed,
        scope: args.scope,
    };
    let mut document = Document::new(text);
    let stats = PatchApplier::new(config).apply(&mut document, &edits, &options);

    let written = document.is_modified() && !args.dry_run;
    if written {
        atomic_write(&args.document, document.text().as_bytes())
            .with_context(|| format!("failed to write {}", args.document.display()))?;
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&stats_json(&stats, written))?);
    } else {
        print_stats(&args.document, &stats, args.dry_run);
    }
    if args.diff && document.is_modified() {
        display_diff(&args.document, document.original(), document.text());
    }

    if stats.is_total_failure() {
        std::process::exit(1);
    }
    Ok(())
}

fn stats_json(stats: &PatchStats, written: bool) -> serde_json::Value {
    let edits: Vec<_> = stats
        .reports
        .iter()
        .map(|r| {
            serde_json::json!({
                "index": r.index,
                "outcome": outcome_name(r.outcome),
                "strategy": r.strategy.map(|s| s.as_str()),
                "score": r.score,
            })
        })
        .collect();
    let failures: Vec<_> = stats
        .failures
        .iter()
        .map(|f| {
            serde_json::json!({
                "edit": f.edit_index,
                "kind": f.kind.to_string(),
                "message": f.message,
            })
        })
        .collect();
    serde_json::json!({
        "total": stats.total,
        "succeeded": stats.succeeded,
        "failed": stats.failed,
        "reverted": stats.reverted,
        "written": written,
        "edits": edits,
        "failures": failures,
        "warnings": stats.warnings,
    })
}

fn outcome_name(outcome: EditOutcome) -> &'static str {
    match outcome {
        EditOutcome::Applied => "applied",
        EditOutcome::Unchanged => "unchanged",
        EditOutcome::Failed => "failed",
    }
}

fn print_stats(document: &Path, stats: &PatchStats, dry_run: bool) {
    if dry_run {
        println!("{}", "[DRY RUN - document not written]".cyan());
    }
    println!("Document: {}", document.display());
    println!();

    for report in &stats.reports {
        let number = report.index + 1;
        match (report.outcome, report.strategy, report.score) {
            (EditOutcome::Applied, Some(strategy), Some(score)) => {
                println!("{} edit #{number}: applied ({strategy}, {score:.2})", "✓".green());
            }
            (EditOutcome::Applied, _, _) => println!("{} edit #{number}: applied", "✓".green()),
            (EditOutcome::Unchanged, _, _) => {
                println!("{} edit #{number}: unchanged", "⊙".yellow());
            }
            (EditOutcome::Failed, _, _) => {}
        }
    }
    for failure in &stats.failures {
        eprintln!("{} {}", "✗".red(), failure);
    }
    for warning in &stats.warnings {
        eprintln!("{} {}", "!".yellow(), warning);
    }

    println!();
    println!("{}", "Summary:".bold());
    println!("  {} applied", stats.succeeded.to_string().green());
    println!("  {} failed", stats.failed.to_string().red());
    if stats.reverted {
        println!("  {}", "batch reverted by final validation".red());
    }
}

/// Helper: Show unified diff between original and patched content
fn display_diff(file: &Path, original: &str, modified: &str) {
    println!("\n{}", format!("--- {} (original)", file.display()).dimmed());
    println!("{}", format!("+++ {} (patched)", file.display()).dimmed());

    let diff = TextDiff::from_lines(original, modified);
    for hunk in diff.unified_diff().context_radius(3).iter_hunks() {
        println!("{}", hunk.header().to_string().cyan());
        for change in hunk.iter_changes() {
            let line = match change.tag() {
                ChangeTag::Delete => format!("-{change}").red(),
                ChangeTag::Insert => format!("+{change}").green(),
                ChangeTag::Equal => format!(" {change}").normal(),
            };
            print!("{line}");
            if change.missing_newline() {
                println!();
            }
        }
    }
}

fn cmd_compress(
    file: &Path,
    request: Option<&str>,
    intent: Option<EditIntent>,
    min_lines: Option<usize>,
    config: Option<&Path>,
) -> Result<()> {
    let config = load_config(config)?;
    let code = read_document(file).with_context(|| format!("failed to read {}", file.display()))?;

    let intent = intent
        .or_else(|| request.map(|r| classify(r).intent))
        .unwrap_or(EditIntent::Unknown);
    let mut options = CompressOptions::new(intent);
    if let Some(min_lines) = min_lines {
        options = options.with_min_lines(min_lines);
    }
    if let Some(request) = request {
        options = options.with_request(request);
    }

    let compressed = Compressor::new(&config.compressor).compress(&code, &options);
    print!("{}", compressed.code);

    let stats = &compressed.stats;
    eprintln!(
        "{} {} -> {} lines, {} hidden ({}, intent {})",
        "compressed".bold(),
        stats.original_lines,
        stats.result_lines,
        stats.hidden,
        stats.mode.as_str(),
        intent
    );
    Ok(())
}

fn cmd_classify(text: &str) -> Result<()> {
    let result = classify(text);
    println!("intent: {}", result.intent.to_string().bold());
    println!("confidence: {:.2}", result.confidence);
    Ok(())
}
