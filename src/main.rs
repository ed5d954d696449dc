use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use reference_assistant::config::{default_config_file, load_config, Config};
use reference_assistant::models::{Record, SearchFilters, SearchMode};
use reference_assistant::orchestrator::SearchOrchestrator;
use reference_assistant::utils::ResultCache;
use std::io::IsTerminal;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Reference Assistant - find bibliographic records across metadata providers
#[derive(Parser, Debug)]
#[command(name = "reference-assistant")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Find bibliographic records across metadata providers", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging (-v, -vv)
    #[arg(long, short, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Output format
    #[arg(long, short, value_enum, global = true, default_value_t = OutputFormat::Auto)]
    output: OutputFormat,

    /// Configuration file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Bypass the result cache for this command
    #[arg(long, global = true, default_value_t = false)]
    no_cache: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Output format for results
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    /// Plain text on a terminal, JSON otherwise
    Auto,
    /// JSON (machine-readable)
    Json,
    /// Plain text
    Plain,
}

#[derive(Args, Debug, Clone, Default)]
struct FilterArgs {
    /// Earliest publication year
    #[arg(long)]
    year_from: Option<i32>,

    /// Latest publication year
    #[arg(long)]
    year_to: Option<i32>,

    /// Document type (e.g. "book", "journal-article")
    #[arg(long = "type")]
    document_type: Option<String>,

    /// Language code forwarded to providers
    #[arg(long)]
    language: Option<String>,

    /// Restrict to open-access works where supported
    #[arg(long)]
    open_access: bool,
}

impl From<FilterArgs> for SearchFilters {
    fn from(args: FilterArgs) -> Self {
        let mut filters = SearchFilters::new().open_access(args.open_access);
        if let Some(year) = args.year_from {
            filters = filters.year_from(year);
        }
        if let Some(year) = args.year_to {
            filters = filters.year_to(year);
        }
        if let Some(doc_type) = args.document_type {
            filters = filters.document_type(doc_type);
        }
        if let Some(language) = args.language {
            filters = filters.language(language);
        }
        filters
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Search all providers and print the merged, ranked list
    #[command(visible_alias = "s")]
    Search {
        /// Free-text query
        query: String,

        /// Results requested from each provider
        #[arg(long, short = 'n')]
        limit: Option<usize>,

        /// Treat the query as a title and drop weak title matches
        #[arg(long)]
        title: bool,

        #[command(flatten)]
        filters: FilterArgs,
    },

    /// Find the single best record for a title or DOI
    #[command(visible_alias = "l")]
    Lookup {
        /// Title, citation text or DOI
        query: String,

        /// Re-fetch the record to repair truncated metadata
        #[arg(long)]
        enrich: bool,
    },

    /// List works by an author
    #[command(visible_alias = "a")]
    Author {
        /// Author name ("Given Family" or "Family, Given")
        name: String,

        #[command(flatten)]
        filters: FilterArgs,
    },

    /// Inspect or clear the result cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// List enabled providers and their capabilities
    Sources,
}

#[derive(Subcommand, Debug)]
enum CacheAction {
    /// Show cache statistics
    Stats,
    /// Remove every cache entry
    Clear,
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Write a default configuration file
    Init {
        /// Destination (defaults to the platform config directory)
        #[arg(long)]
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the effective configuration as TOML
    Show,
}

fn init_tracing(cli: &Cli, config: &Config) {
    let level = if cli.quiet {
        "error".to_string()
    } else {
        match cli.verbose {
            0 => config.logging.level.clone(),
            1 => "debug".to_string(),
            _ => "trace".to_string(),
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("reference_assistant={}", level)));

    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.format.as_deref() == Some("json") {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref()).context("Failed to load configuration")?;
    if cli.no_cache {
        config.cache.enabled = false;
    }
    init_tracing(&cli, &config);

    match cli.command {
        Commands::Search {
            query,
            limit,
            title,
            filters,
        } => {
            let orchestrator = SearchOrchestrator::from_config(&config)?;
            let limit = limit.unwrap_or(config.search.default_limit);
            let mode = if title {
                SearchMode::Title
            } else {
                SearchMode::General
            };
            let records = orchestrator
                .search_with_mode(&query, limit, &filters.into(), mode)
                .await?;
            if !cli.quiet {
                eprintln!("Found {} records", records.len());
            }
            output_records(&records, cli.output)?;
        }

        Commands::Lookup { query, enrich } => {
            let orchestrator = SearchOrchestrator::from_config(&config)?;
            match orchestrator.search_single(&query).await? {
                Some(record) => {
                    let record = if enrich {
                        orchestrator.enrich(&record).await
                    } else {
                        record
                    };
                    output_records(std::slice::from_ref(&record), cli.output)?;
                }
                None => {
                    if !cli.quiet {
                        eprintln!("No record found for \"{}\"", query);
                    }
                    std::process::exit(1);
                }
            }
        }

        Commands::Author { name, filters } => {
            let orchestrator = SearchOrchestrator::from_config(&config)?;
            let records = orchestrator
                .search_by_author(&name, &filters.into())
                .await?;
            if !cli.quiet {
                eprintln!("Found {} works", records.len());
            }
            output_records(&records, cli.output)?;
        }

        Commands::Cache { action } => {
            let cache = ResultCache::from_config(&config.cache);
            match action {
                CacheAction::Stats => {
                    let stats = cache.stats();
                    if let Some(path) = &stats.path {
                        println!("File:    {}", path.display());
                    }
                    println!("Entries: {}", stats.entries);
                    println!("Legacy:  {}", stats.legacy_entries);
                    println!("Stale:   {}", stats.stale_entries);
                    println!("TTL:     {}s", stats.ttl.as_secs());
                }
                CacheAction::Clear => {
                    let removed = cache.len();
                    cache.clear();
                    cache.persist().context("Failed to write cache file")?;
                    println!("Removed {} entries", removed);
                }
            }
        }

        Commands::Config { action } => match action {
            ConfigAction::Init { path, force } => {
                let path = path
                    .or_else(default_config_file)
                    .context("No configuration directory available; pass --path")?;
                if path.exists() && !force {
                    anyhow::bail!(
                        "{} already exists (use --force to overwrite)",
                        path.display()
                    );
                }
                Config::default().save(&path)?;
                println!("Wrote {}", path.display());
            }
            ConfigAction::Show => {
                print!("{}", toml::to_string_pretty(&config)?);
            }
        },

        Commands::Sources => {
            let orchestrator = SearchOrchestrator::from_config(&config)?;
            for source in orchestrator.registry().all() {
                println!(
                    "{:<14} {:<16} {:?}",
                    source.id(),
                    source.name(),
                    source.capabilities()
                );
            }
        }
    }

    Ok(())
}

fn output_records(records: &[Record], format: OutputFormat) -> Result<()> {
    let format = match format {
        OutputFormat::Auto if std::io::stdout().is_terminal() => OutputFormat::Plain,
        OutputFormat::Auto => OutputFormat::Json,
        other => other,
    };

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(records)?),
        _ => {
            for record in records {
                let marker = if record.is_selected { "*" } else { " " };
                println!("{} {} ({})", marker, record.title, record.year);
                if !record.authors.is_empty() {
                    println!("    {}", record.authors.join("; "));
                }
                if let Some(venue) = record.journal.as_ref().or(record.publisher.as_ref()) {
                    println!("    {}", venue);
                }
                if let Some(doi) = record.identifier() {
                    println!("    DOI: {}", doi);
                }
                println!(
                    "    {} | {} | confidence {:.2}",
                    record.source, record.match_type, record.confidence_score
                );
                println!();
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_filter_args_conversion() {
        let cli = Cli::parse_from([
            "reference-assistant",
            "search",
            "deep learning",
            "--year-from",
            "2015",
            "--type",
            "book",
        ]);
        let Commands::Search { filters, .. } = cli.command else {
            panic!("expected search command");
        };
        let filters: SearchFilters = filters.into();
        assert_eq!(filters.year_from, Some(2015));
        assert_eq!(filters.year_to, None);
        assert_eq!(filters.document_type.as_deref(), Some("book"));
    }

    #[test]
    fn test_title_mode_flag() {
        let cli = Cli::parse_from(["reference-assistant", "search", "Deep Learning", "--title"]);
        let Commands::Search { title, .. } = cli.command else {
            panic!("expected search command");
        };
        assert!(title);

        let cli = Cli::parse_from(["reference-assistant", "lookup", "Deep Learn", "--enrich"]);
        assert!(matches!(cli.command, Commands::Lookup { enrich: true, .. }));
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["reference-assistant", "lookup", "10.1/x", "--no-cache", "-o", "json"]);
        assert!(cli.no_cache);
        assert_eq!(cli.output, OutputFormat::Json);
    }
}
