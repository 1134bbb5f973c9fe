//! citeweave CLI - citation integration tool

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use citeweave::integrate::providers::{build_generator, ProviderKind, ProviderSettings};
use citeweave::render::{report_to_json, to_json};
use citeweave::{
    extract_citations, load_candidates, load_local_references, load_reference_list,
    CitationRenumberer, EchoGenerator, FnObserver, IntegrationOptions, Integrator, JsonFormat,
    LocalReferences, SectionStatus, Severity, Strictness, TextGenerator, ValidationReport,
};

type CliResult = Result<i32, Box<dyn std::error::Error>>;

/// Exit code when the validation report contains blocking findings.
const EXIT_BLOCKING: i32 = 2;

#[derive(Parser)]
#[command(name = "citeweave")]
#[command(author = "citeweave contributors")]
#[command(version)]
#[command(about = "Weave external citations into IEEE-style Markdown articles", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Integrate candidate references into an article
    Integrate {
        /// Markdown article
        #[arg(value_name = "ARTICLE")]
        article: PathBuf,

        /// Local references JSON (map or list)
        #[arg(short, long, value_name = "FILE")]
        local: PathBuf,

        /// External candidates JSON
        #[arg(short, long, value_name = "FILE")]
        candidates: PathBuf,

        /// Output directory
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,

        /// Text-generation provider
        #[arg(long, value_enum, default_value = "openai")]
        provider: Provider,

        /// Model name (provider default if not specified)
        #[arg(long)]
        model: Option<String>,

        /// API key (falls back to OPENAI_API_KEY / ANTHROPIC_API_KEY)
        #[arg(long, env = "CITEWEAVE_API_KEY", hide_env_values = true)]
        api_key: Option<String>,

        /// Provider endpoint override
        #[arg(long, value_name = "URL")]
        base_url: Option<String>,

        /// Per-section call timeout in seconds
        #[arg(long, default_value = "120")]
        timeout: u64,

        /// Sections processed in parallel (1 = sequential)
        #[arg(short, long, default_value = "1")]
        jobs: usize,

        /// Response validation strictness
        #[arg(long, value_enum, default_value = "standard")]
        strictness: StrictnessLevel,

        /// Maximum new citations per section
        #[arg(long, default_value = "3")]
        max_new: usize,

        /// Keep the original References section in the article body
        #[arg(long)]
        keep_references: bool,

        /// Use the echo generator instead of a provider
        #[arg(long)]
        dry_run: bool,
    },

    /// Renumber an article's citations to 1..N by first appearance
    Renumber {
        /// Markdown article
        #[arg(value_name = "ARTICLE")]
        article: PathBuf,

        /// Local references JSON, used to label origins
        #[arg(short, long, value_name = "FILE")]
        local: Option<PathBuf>,

        /// Output file (stdout if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Write the old-to-new mapping as JSON
        #[arg(long, value_name = "FILE")]
        mapping: Option<PathBuf>,
    },

    /// List distinct citation numbers in order of first appearance
    Citations {
        /// Markdown article
        #[arg(value_name = "ARTICLE")]
        article: PathBuf,
    },

    /// Validate an article against a reference list
    Validate {
        /// Markdown article
        #[arg(value_name = "ARTICLE")]
        article: PathBuf,

        /// Reference list JSON
        #[arg(short, long, value_name = "FILE")]
        references: PathBuf,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show version information
    Version,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum Provider {
    /// OpenAI-compatible chat completions
    Openai,
    /// Anthropic messages API
    Anthropic,
    /// Local Ollama server
    Ollama,
}

impl From<Provider> for ProviderKind {
    fn from(provider: Provider) -> Self {
        match provider {
            Provider::Openai => ProviderKind::OpenAi,
            Provider::Anthropic => ProviderKind::Anthropic,
            Provider::Ollama => ProviderKind::Ollama,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum StrictnessLevel {
    /// Generous length budget, no prose check
    Lenient,
    /// Default budget with prose check
    Standard,
    /// Tight budget with prose check
    Strict,
}

impl From<StrictnessLevel> for Strictness {
    fn from(level: StrictnessLevel) -> Self {
        match level {
            StrictnessLevel::Lenient => Strictness::Lenient,
            StrictnessLevel::Standard => Strictness::Standard,
            StrictnessLevel::Strict => Strictness::Strict,
        }
    }
}

struct IntegrateArgs {
    article: PathBuf,
    local: PathBuf,
    candidates: PathBuf,
    output: Option<PathBuf>,
    provider: Provider,
    model: Option<String>,
    api_key: Option<String>,
    base_url: Option<String>,
    timeout: u64,
    jobs: usize,
    strictness: StrictnessLevel,
    max_new: usize,
    keep_references: bool,
    dry_run: bool,
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Some(Commands::Integrate {
            article,
            local,
            candidates,
            output,
            provider,
            model,
            api_key,
            base_url,
            timeout,
            jobs,
            strictness,
            max_new,
            keep_references,
            dry_run,
        }) => cmd_integrate(IntegrateArgs {
            article,
            local,
            candidates,
            output,
            provider,
            model,
            api_key,
            base_url,
            timeout,
            jobs,
            strictness,
            max_new,
            keep_references,
            dry_run,
        }),
        Some(Commands::Renumber {
            article,
            local,
            output,
            mapping,
        }) => cmd_renumber(
            &article,
            local.as_deref(),
            output.as_deref(),
            mapping.as_deref(),
        ),
        Some(Commands::Citations { article }) => cmd_citations(&article),
        Some(Commands::Validate {
            article,
            references,
            json,
        }) => cmd_validate(&article, &references, json),
        Some(Commands::Version) => {
            cmd_version();
            Ok(0)
        }
        None => {
            println!(
                "{}",
                "Usage: citeweave integrate <ARTICLE> -l <LOCAL> -c <CANDIDATES>".yellow()
            );
            println!("       citeweave --help for more information");
            Ok(0)
        }
    };

    match result {
        Ok(0) => {}
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{}: {}", "Error".red().bold(), e);
            std::process::exit(1);
        }
    }
}

fn resolve_api_key(provider: Provider, explicit: Option<String>) -> Option<String> {
    explicit.or_else(|| {
        let var = match provider {
            Provider::Openai => "OPENAI_API_KEY",
            Provider::Anthropic => "ANTHROPIC_API_KEY",
            Provider::Ollama => return None,
        };
        std::env::var(var).ok()
    })
}

fn build_provider(args: &IntegrateArgs) -> Result<Arc<dyn TextGenerator>, Box<dyn std::error::Error>> {
    if args.dry_run {
        let echo: Arc<dyn TextGenerator> = Arc::new(EchoGenerator::new());
        return Ok(echo);
    }

    let mut settings =
        ProviderSettings::new(args.provider.into()).with_timeout(Duration::from_secs(args.timeout));
    if let Some(key) = resolve_api_key(args.provider, args.api_key.clone()) {
        settings = settings.with_api_key(key);
    }
    if let Some(model) = &args.model {
        settings = settings.with_model(model.clone());
    }
    if let Some(url) = &args.base_url {
        settings = settings.with_base_url(url.clone());
    }
    Ok(build_generator(settings)?)
}

fn cmd_integrate(args: IntegrateArgs) -> CliResult {
    let output_dir = args.output.clone().unwrap_or_else(|| {
        let stem = args.article.file_stem().unwrap_or_default().to_string_lossy();
        PathBuf::from(format!("{}_enhanced", stem))
    });
    fs::create_dir_all(&output_dir)?;

    let text = fs::read_to_string(&args.article)?;
    let local = load_local_references(&args.local)?;
    let candidates = load_candidates(&args.candidates)?;
    log::info!(
        "{} local references, {} candidates",
        local.len(),
        candidates.len()
    );

    let mut options = IntegrationOptions::from_strictness(args.strictness.into())
        .with_timeout(Duration::from_secs(args.timeout))
        .with_max_new_citations(args.max_new)
        .with_strip_reference_section(!args.keep_references);
    if args.jobs > 1 {
        options = options.concurrent(args.jobs);
    }

    let generator = build_provider(&args)?;

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );
    pb.set_message("Integrating sections...");

    let observer_pb = pb.clone();
    let observer = FnObserver::new(move |_index, total, status: &SectionStatus| {
        observer_pb.set_length(total as u64);
        observer_pb.set_message(status.label());
        observer_pb.inc(1);
    });

    let outcome = Integrator::from_arc(generator)
        .with_options(options)
        .with_observer(observer)
        .run(&text, &local, candidates)?;
    pb.finish_with_message("Done!");

    fs::write(output_dir.join("article.md"), &outcome.article)?;
    fs::write(output_dir.join("references.md"), outcome.references_markdown())?;
    fs::write(
        output_dir.join("report.json"),
        report_to_json(&outcome.report, JsonFormat::Pretty)?,
    )?;
    fs::write(
        output_dir.join("outcome.json"),
        to_json(&outcome, JsonFormat::Pretty)?,
    )?;

    println!("\n{}", "Sections".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());
    for section in &outcome.sections {
        let title = if section.title.is_empty() {
            "(untitled)"
        } else {
            section.title.as_str()
        };
        let label = match &section.status {
            SectionStatus::Enhanced { .. } | SectionStatus::Fallback { .. } => {
                section.status.label().green()
            }
            SectionStatus::Reverted { .. } | SectionStatus::Failed { .. } => {
                section.status.label().yellow()
            }
            _ => section.status.label().dimmed(),
        };
        println!("  {:<10} {}", label, title);
    }

    println!();
    print_report(&outcome.report);
    println!(
        "{}: {} calls, {} tokens{}, {} ms",
        "Usage".bold(),
        outcome.usage.calls,
        outcome.usage.total_tokens(),
        if outcome.usage.estimated { " (estimated)" } else { "" },
        outcome.usage.elapsed_ms
    );

    println!("\n{}", "Output files:".green().bold());
    println!("  {} article.md", "├─".dimmed());
    println!("  {} references.md", "├─".dimmed());
    println!("  {} report.json", "├─".dimmed());
    println!("  {} outcome.json", "└─".dimmed());

    Ok(if outcome.is_exportable() { 0 } else { EXIT_BLOCKING })
}

fn cmd_renumber(
    article: &Path,
    local: Option<&Path>,
    output: Option<&Path>,
    mapping: Option<&Path>,
) -> CliResult {
    let text = fs::read_to_string(article)?;
    let local = match local {
        Some(path) => load_local_references(path)?,
        None => LocalReferences::new(),
    };

    let renumberer = if local.is_empty() {
        CitationRenumberer::new(extract_citations(&text))
    } else {
        CitationRenumberer::for_local(&local)
    };
    let result = renumberer.renumber(&text);

    if let Some(path) = mapping {
        fs::write(path, serde_json::to_string_pretty(&result.entries)?)?;
    }

    if let Some(path) = output {
        fs::write(path, &result.text)?;
        println!("{} {}", "Saved to".green(), path.display());
        for entry in &result.entries {
            println!(
                "  [{}] {} {} [{}]",
                entry.old_number,
                entry.old_origin,
                "→".dimmed(),
                entry.new_number
            );
        }
    } else {
        print!("{}", result.text);
    }

    Ok(0)
}

fn cmd_citations(article: &Path) -> CliResult {
    let text = fs::read_to_string(article)?;
    let numbers = extract_citations(&text);

    println!("{}", "Citations".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());
    println!("{}: {}", "Distinct".bold(), numbers.len());
    if !numbers.is_empty() {
        let list: Vec<String> = numbers.iter().map(|n| n.to_string()).collect();
        println!("{}: {}", "Order".bold(), list.join(", "));
    }

    Ok(0)
}

fn cmd_validate(article: &Path, references: &Path, json: bool) -> CliResult {
    let text = fs::read_to_string(article)?;
    let references = load_reference_list(references)?;
    let report = citeweave::validate(&text, &references);

    if json {
        println!("{}", report_to_json(&report, JsonFormat::Pretty)?);
    } else {
        print_report(&report);
    }

    Ok(if report.is_blocking() { EXIT_BLOCKING } else { 0 })
}

fn print_report(report: &ValidationReport) {
    println!("{}", "Validation".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());
    println!(
        "{}: {} → {} ({} added)",
        "Citations".bold(),
        report.citations_before,
        report.citations_after,
        report.citations_added()
    );
    if report.selected_total > 0 {
        println!(
            "{}: {}/{} ({:.0}%)",
            "Candidates used".bold(),
            report.selected_used,
            report.selected_total,
            report.success_rate * 100.0
        );
        println!(
            "{}: {:.0}%",
            "External ratio".bold(),
            report.external_ratio * 100.0
        );
    }

    if report.findings.is_empty() {
        println!("{}", "No findings".green());
        return;
    }
    for finding in &report.findings {
        let tag = match finding.severity {
            Severity::Blocking => "BLOCKING".red().bold(),
            Severity::Warning => "WARNING".yellow(),
            Severity::Info => "INFO".dimmed(),
        };
        println!("  {} {}: {}", tag, finding.code, finding.message);
    }
}

fn cmd_version() {
    println!("{} {}", "citeweave".cyan().bold(), env!("CARGO_PKG_VERSION"));
    println!("Citation integration tool for Markdown articles");
    println!();
    println!("License: MIT");
}
