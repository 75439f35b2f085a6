use std::path::PathBuf;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use groundcheck_core::types::Collection;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "groundcheck")]
#[command(about = "Grounding and safety checks for assistant answers", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Directory relative config paths resolve against (defaults to the working directory)
    #[arg(long, global = true, env = "GROUNDCHECK_HOME")]
    home: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Retrieve context for a query, validate a draft against it and print the final answer
    Check {
        #[arg(short, long)]
        query: String,

        /// Draft answer text
        #[arg(short, long, conflicts_with = "draft_file")]
        draft: Option<String>,

        /// Read the draft from a file
        #[arg(long)]
        draft_file: Option<PathBuf>,

        /// Print the retrieved context alongside the answer
        #[arg(long)]
        show_context: bool,
    },

    /// Chunk, embed and store .txt files, then log the learning cycle
    Ingest {
        dir: PathBuf,

        #[arg(short, long, value_enum, default_value_t = CollectionArg::Knowledge)]
        collection: CollectionArg,

        /// Name recorded in the learning log (defaults to the directory name)
        #[arg(short, long)]
        source: Option<String>,

        /// Only ingest the first N files
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Failure patterns over the validation history
    Analyze {
        #[arg(long)]
        window_days: Option<u32>,
    },

    /// Learning suggestions derived from the validation history
    Suggest {
        #[arg(long)]
        window_days: Option<u32>,
    },

    /// Learning and validation metrics
    Metrics {
        #[command(subcommand)]
        view: MetricsView,
    },

    /// Check the hash chains of both logs
    VerifyLog,
}

#[derive(Subcommand)]
enum MetricsView {
    Summary,
    Daily {
        /// YYYY-MM-DD, defaults to today (UTC)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    Range {
        #[arg(long)]
        from: NaiveDate,
        #[arg(long)]
        to: NaiveDate,
    },
    Validators,
    Reasons,
    Sources,
}

#[derive(Clone, Copy, ValueEnum)]
enum CollectionArg {
    Knowledge,
    Conversation,
}

impl From<CollectionArg> for Collection {
    fn from(arg: CollectionArg) -> Self {
        match arg {
            CollectionArg::Knowledge => Collection::Knowledge,
            CollectionArg::Conversation => Collection::Conversation,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // logs go to stderr so stdout stays machine-readable
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = groundcheck_core::Config::load()?.settings().context("loading settings")?;
    let home = match cli.home {
        Some(home) => home,
        None => std::env::current_dir().context("resolving working directory")?,
    };
    let app = commands::App { settings, home };

    match cli.command {
        Commands::Check { query, draft, draft_file, show_context } => {
            let draft = match (draft, draft_file) {
                (Some(draft), _) => draft,
                (None, Some(path)) => std::fs::read_to_string(&path)
                    .with_context(|| format!("reading draft from {}", path.display()))?,
                (None, None) => anyhow::bail!("either --draft or --draft-file is required"),
            };
            app.check(&query, draft, show_context).await
        }
        Commands::Ingest { dir, collection, source, limit } => {
            app.ingest(&dir, collection.into(), source, limit).await
        }
        Commands::Analyze { window_days } => app.analyze(window_days).await,
        Commands::Suggest { window_days } => app.suggest(window_days).await,
        Commands::Metrics { view } => match view {
            MetricsView::Summary => app.summary().await,
            MetricsView::Daily { date } => app.daily(date).await,
            MetricsView::Range { from, to } => app.range(from, to).await,
            MetricsView::Validators => app.validators().await,
            MetricsView::Reasons => app.reasons().await,
            MetricsView::Sources => app.sources().await,
        },
        Commands::VerifyLog => app.verify().await,
    }
}
