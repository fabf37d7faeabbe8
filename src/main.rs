mod commands;

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use scriptref::diagnostics;
use scriptref::error::Error;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "scriptref", about = "Resolve scripture citations against text modules")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the book names a module's citations are parsed with
    Books {
        /// Module name or path to a module file
        module: String,
        /// Parse with the module's own book names
        #[arg(long)]
        module_names: bool,
    },
    /// Print the verses a citation denotes
    Fetch {
        /// Module name or path to a module file
        module: String,
        /// Citation such as "John 3:16-18; 4:1"
        citation: String,
        /// Parse with the module's own book names
        #[arg(long)]
        module_names: bool,
    },
    /// Build or load a module's chapter index
    Index {
        /// Module name or path to a module file
        module: String,
        /// Discard any cached index first
        #[arg(long)]
        rebuild: bool,
    },
    /// List modules in the configured module directory
    Modules,
    /// Resolve a citation into verse ranges with counts
    Parse {
        /// Module name or path to a module file
        module: String,
        /// Citation such as "John 3:16-18; 4:1"
        citation: String,
        /// Print ranges as JSON
        #[arg(long)]
        json: bool,
        /// Parse with the module's own book names
        #[arg(long)]
        module_names: bool,
    },
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Books { module, module_names } => commands::books(&module, module_names),
        Commands::Fetch { module, citation, module_names } => commands::fetch(&module, &citation, module_names),
        Commands::Index { module, rebuild } => commands::index(&module, rebuild),
        Commands::Modules => commands::modules(),
        Commands::Parse { module, citation, json, module_names } => {
            commands::parse(&module, &citation, json, module_names)
        },
    };

    return match result {
        Ok(()) => ExitCode::SUCCESS,
        // Exit code priority: rejected citation (2) over any other failure (1).
        Err(e @ Error::Citation(_)) => {
            diagnostics::print_error(&e);
            ExitCode::from(2)
        },
        Err(e) => {
            diagnostics::print_error(&e);
            ExitCode::FAILURE
        },
    };
}

/// Log to stderr, `warn` and above unless `RUST_LOG` says otherwise.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
