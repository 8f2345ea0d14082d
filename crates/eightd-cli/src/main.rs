//! eightd command line interface
//!
//! Usage:
//!   eightd sections [--step D2]                     - Print the section catalog
//!   eightd check-team <data.json>                   - Run the local D1 team rules
//!   eightd precheck --step D4 <data.json>           - Required-fields pre-check
//!   eightd prompt --step D2 --data f --coaching f   - Render a validation prompt
//!   eightd parse <response.txt>                     - Parse a raw model reply
//!   eightd coach --step D2 --data f                 - Model-backed validation
//!   eightd providers                                - List model provider types
//!
//! JSON goes to stdout, logs to stderr. Exit code 1 on a failed check or error.

use clap::{Parser, Subcommand};
use eightd_core::StepCode;
use std::path::PathBuf;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "eightd")]
#[command(about = "8D step validation and coaching")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the section catalog as JSON
    Sections {
        /// Only the sections of this step
        #[arg(short, long)]
        step: Option<StepCode>,
    },

    /// Validate a D1 team document with the local rules
    CheckTeam {
        /// JSON file with the D1 step data
        data: PathBuf,
    },

    /// Run the required-fields pre-check for a step
    Precheck {
        /// Step code (D1..D8)
        #[arg(short, long)]
        step: StepCode,
        /// JSON file with the step data
        data: PathBuf,
    },

    /// Render the validation prompt without calling a model
    Prompt {
        /// Step code (D2..D8)
        #[arg(short, long)]
        step: StepCode,
        /// Section key; the whole step when omitted
        #[arg(long)]
        section: Option<String>,
        /// JSON file with the step data
        #[arg(short, long)]
        data: PathBuf,
        /// Coaching document
        #[arg(long)]
        coaching: PathBuf,
        /// Floor-compliance rules document
        #[arg(long)]
        rules: Option<PathBuf>,
        /// JSON file with the complaint context
        #[arg(long)]
        complaint: Option<PathBuf>,
    },

    /// Parse a raw model reply into a verdict
    Parse {
        /// File holding the model's raw text
        response: PathBuf,
    },

    /// Validate a step or section with the configured model
    Coach {
        /// Step code (D2..D8)
        #[arg(short, long)]
        step: StepCode,
        /// Section key; the whole step when omitted
        #[arg(long)]
        section: Option<String>,
        /// JSON file with the step data
        #[arg(short, long)]
        data: PathBuf,
        /// JSON file with the complaint context
        #[arg(long)]
        complaint: Option<PathBuf>,
        /// Runtime configuration file
        #[arg(short, long, default_value = "eightd.yaml")]
        config: PathBuf,
    },

    /// List the model provider types this build supports
    Providers,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run_command(cli).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Returns whether the command's check passed.
async fn run_command(cli: Cli) -> anyhow::Result<bool> {
    match cli.command {
        Commands::Sections { step } => commands::sections(step),
        Commands::CheckTeam { data } => commands::check_team(&data),
        Commands::Precheck { step, data } => commands::precheck(step, &data),
        Commands::Prompt {
            step,
            section,
            data,
            coaching,
            rules,
            complaint,
        } => commands::prompt(commands::PromptArgs {
            step,
            section,
            data,
            coaching,
            rules,
            complaint,
        }),
        Commands::Parse { response } => commands::parse(&response),
        Commands::Coach {
            step,
            section,
            data,
            complaint,
            config,
        } => commands::coach(step, section.as_deref(), &data, complaint.as_deref(), &config).await,
        Commands::Providers => commands::providers(),
    }
}
