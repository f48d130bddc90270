use clap::{Parser, Subcommand};
use std::process::ExitCode;
use tokio::runtime::Runtime;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "bookforge")]
#[command(
    version,
    about = "AI orchestration and state-sync server for guided book authoring"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, global = true)]
    verbose: bool,

    #[arg(long, short, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API
    Serve {
        #[arg(long, help = "Address to bind, overriding server.bind")]
        bind: Option<String>,
    },

    /// Run QA analysis over one book and print the report
    Qa {
        #[arg(help = "Book ID")]
        book_id: String,
        #[arg(
            short = 'f',
            long,
            default_value = "text",
            help = "Output format: text, json"
        )]
        format: String,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration (merged from all sources)
    Show {
        #[arg(
            short = 'f',
            long,
            default_value = "toml",
            help = "Output format: toml, json"
        )]
        format: String,
    },
    /// Show configuration file paths
    Path,
    /// Write a starter configuration file
    Init {
        #[arg(long, short, help = "Initialize global config")]
        global: bool,
        #[arg(long, help = "Overwrite existing config")]
        force: bool,
    },
}

fn main() -> ExitCode {
    match run_cli() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("\x1b[31mError:\x1b[0m {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Commands::Serve { bind } => {
            let rt = Runtime::new()?;
            rt.block_on(bookforge::cli::commands::serve::run(bind))?;
        }
        Commands::Qa { book_id, format } => {
            let rt = Runtime::new()?;
            rt.block_on(bookforge::cli::commands::qa::run(&book_id, &format))?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Show { format } => {
                bookforge::cli::commands::config::show(&format)?;
            }
            ConfigAction::Path => {
                bookforge::cli::commands::config::path()?;
            }
            ConfigAction::Init { global, force } => {
                bookforge::cli::commands::config::init(global, force)?;
            }
        },
    }

    Ok(())
}
