//! Soundcheck CLI - Main Entry Point
//!
//! Runs the browser suites against the music-streaming app, checks the
//! local environment and imports audio into the app's object storage.

use clap::{Parser, Subcommand};

use soundcheck_cli::commands::{build_info, doctor, library, list, run};
use soundcheck_cli::output::{self, print_error};

/// Soundcheck - E2E harness for the music-streaming web app
#[derive(Parser)]
#[command(name = "soundcheck")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: output::OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the browser suites
    Run(run::RunArgs),

    /// List suites and tests
    List(list::ListArgs),

    /// Check credentials, Playwright and the app URL
    Doctor(doctor::DoctorArgs),

    /// Parse a build-info label such as "v1.3.0 #e3519ee · prod · 2025-12-01T23:48Z"
    BuildInfo {
        label: String,
    },

    /// Import audio into object storage
    #[command(subcommand)]
    Library(library::LibraryCommands),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Run(args) => run::execute(args, cli.format).await,
        Commands::List(args) => list::execute(args, cli.format),
        Commands::Doctor(args) => doctor::execute(args, cli.format).await,
        Commands::BuildInfo { label } => build_info::execute(&label, cli.format),
        Commands::Library(cmd) => library::execute(cmd, cli.format).await,
    };

    if let Err(e) = result {
        print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
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
    fn test_parse_run_filters() {
        let cli = Cli::parse_from(["soundcheck", "--format", "json", "run", "--suite", "admin", "-w", "2"]);
        assert_eq!(cli.format, output::OutputFormat::Json);
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.suite.as_deref(), Some("admin"));
                assert_eq!(args.workers, Some(2));
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_parse_clean_slate() {
        let cli = Cli::parse_from(["soundcheck", "library", "clean-slate", "mp3s", "meta", "--yes"]);
        match cli.command {
            Commands::Library(library::LibraryCommands::CleanSlate(args)) => {
                assert!(args.yes);
                assert_eq!(args.bucket, "audio-files");
            }
            _ => panic!("expected library clean-slate"),
        }
    }
}
