use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use ftp_batch::{dispatcher, FailurePolicy, FtpConfig, FtpConnector, Job};

/// Run FTP/FTPS operations in batch, one per input record
#[derive(Parser)]
#[command(name = "ftp-batch")]
#[command(version)]
#[command(after_help = "EXAMPLES:
    # List a folder per record, keep going on failures
    ftp-batch run list-job.json

    # Write output records to a file
    ftp-batch run download-job.json --output out.json

    # Check credentials
    ftp-batch test credentials.json")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a job file and print the output records as JSON
    Run {
        /// Job file (credentials, operation, parameters, items)
        job: PathBuf,

        /// Write output here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Connect with the given credentials and disconnect again
    Test {
        /// Credentials file
        credentials: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // stdout carries the JSON output; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Run { job, output } => run(&job, output.as_deref()),
        Commands::Test { credentials } => test(&credentials),
    }
}

fn run(path: &Path, output: Option<&Path>) -> Result<()> {
    let job = Job::load(path).with_context(|| format!("Failed to load job {}", path.display()))?;
    let policy = FailurePolicy::from_continue_on_fail(job.continue_on_fail);

    let records = dispatcher::execute(
        &FtpConnector,
        &job.credentials,
        &job.parameters,
        job.items,
        policy,
    )
    .with_context(|| format!("FTP {} failed", job.parameters.operation))?;

    let rendered = serde_json::to_string_pretty(&records)?;
    match output {
        Some(out) => {
            fs::write(out, rendered).with_context(|| format!("Failed to write {}", out.display()))?;
            info!(records = records.len(), file = %out.display(), "output written");
        }
        None => println!("{}", rendered),
    }
    Ok(())
}

fn test(path: &Path) -> Result<()> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read credentials {}", path.display()))?;
    let config: FtpConfig = serde_json::from_str(&content)
        .with_context(|| format!("Invalid credentials in {}", path.display()))?;

    let check = ftp_batch::test_credentials(&FtpConnector, &config);
    println!("{}", serde_json::to_string_pretty(&check)?);
    if !check.is_ok() {
        process::exit(1);
    }
    Ok(())
}
