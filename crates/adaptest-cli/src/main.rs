//! adaptest CLI: the user-facing command-line interface.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "adaptest",
    version,
    about = "Adaptive psychometric testing and validation"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate adaptive sessions against an item bank
    Simulate {
        /// Path to .toml item bank or directory
        #[arg(long)]
        bank: PathBuf,

        /// Simulate this many N(0, 1) respondents instead of the configured groups
        #[arg(long)]
        respondents: Option<usize>,

        /// Max concurrent respondents
        #[arg(long)]
        parallelism: Option<usize>,

        /// Base random seed
        #[arg(long)]
        seed: Option<u64>,

        /// Selection strategy: max-information, balanced
        #[arg(long, default_value = "max-information")]
        strategy: String,

        /// Output directory (default: `output_dir` from the config)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Build a psychometric report from a simulation
    Report {
        /// Simulation JSON produced by `simulate`
        #[arg(long)]
        simulation: PathBuf,

        /// Item bank the simulation ran against
        #[arg(long)]
        bank: PathBuf,

        /// Output directory (default: `output_dir` from the config)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Output format: json, markdown, html, csv, all
        #[arg(long, default_value = "json")]
        format: String,

        /// Cross-validation folds
        #[arg(long)]
        cv_folds: Option<usize>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Compare two psychometric reports
    Compare {
        /// Baseline report JSON
        #[arg(long)]
        baseline: PathBuf,

        /// Current report JSON
        #[arg(long)]
        current: PathBuf,

        /// Regression threshold
        #[arg(long, default_value = "0.05")]
        threshold: f64,

        /// Exit code 1 if regressions found
        #[arg(long)]
        fail_on_regression: bool,

        /// Output format: text, json, markdown
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Validate item bank TOML files
    Validate {
        /// Path to item bank file or directory
        #[arg(long)]
        bank: PathBuf,
    },

    /// List the items of a bank
    ListItems {
        /// Path to item bank file or directory
        #[arg(long)]
        bank: PathBuf,

        /// Only show one category
        #[arg(long)]
        category: Option<String>,
    },

    /// Create starter config and example item bank
    Init,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(
                "adaptest=info"
                    .parse()
                    .unwrap_or_else(|_| tracing_subscriber::filter::LevelFilter::INFO.into()),
            ),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Simulate {
            bank,
            respondents,
            parallelism,
            seed,
            strategy,
            output,
            config,
        } => {
            commands::simulate::execute(
                bank,
                respondents,
                parallelism,
                seed,
                strategy,
                output,
                config,
            )
            .await
        }
        Commands::Report {
            simulation,
            bank,
            output,
            format,
            cv_folds,
            config,
        } => commands::report::execute(simulation, bank, output, format, cv_folds, config),
        Commands::Compare {
            baseline,
            current,
            threshold,
            fail_on_regression,
            format,
        } => commands::compare::execute(baseline, current, threshold, fail_on_regression, format),
        Commands::Validate { bank } => commands::validate::execute(bank),
        Commands::ListItems { bank, category } => commands::list_items::execute(bank, category),
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
