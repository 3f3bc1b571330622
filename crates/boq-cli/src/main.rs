#![forbid(unsafe_code)]

mod cmd;
mod output;

use boq_core::ErrorCode;
use boq_core::config::{self, EffectiveConfig};
use clap::{CommandFactory, Parser, Subcommand};
use output::{CliError, OutputMode, render_error};
use std::env;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "boq: Bill-of-Quantities store with consistent roll-ups",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    /// Project root holding `.boq/` (defaults to the current directory).
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        about = "Initialize a boq store",
        long_about = "Create .boq/ with a migrated store and a default config.",
        after_help = "EXAMPLES:\n    boq init\n    boq init --force --json"
    )]
    Init(cmd::init::InitArgs),

    #[command(
        about = "Manage projects",
        after_help = "EXAMPLES:\n    boq project create --name \"Clinic\" --code CL --budget 2500000\n    boq project stats prj-1a2b3c4d5e6f"
    )]
    Project(cmd::project::ProjectArgs),

    #[command(
        about = "Manage bills and contingency",
        after_help = "EXAMPLES:\n    boq bill create --project prj-1a2b3c4d5e6f --number 1 --title Substructure\n    boq bill contingency bil-1a2b3c4d5e6f 10\n    boq bill reconcile bil-1a2b3c4d5e6f"
    )]
    Bill(cmd::bill::BillArgs),

    #[command(
        about = "Manage sections",
        after_help = "EXAMPLES:\n    boq section create --project prj-1a2b3c4d5e6f --bill bil-1a2b3c4d5e6f --code A --title Excavation\n    boq section copy sec-1a2b3c4d5e6f --to-bill bil-6f5e4d3c2b1a"
    )]
    Section(cmd::section::SectionArgs),

    #[command(
        about = "Manage priced items",
        after_help = "EXAMPLES:\n    boq item create --project prj-1a2b3c4d5e6f --section sec-1a2b3c4d5e6f --description \"Blockwork\" --quantity 120 --unit m2 --rate 850\n    boq item import --file items.json"
    )]
    Item(cmd::item::ItemArgs),

    #[command(about = "Manage collection references")]
    Collection(cmd::collection::CollectionArgs),

    #[command(about = "Generate shell completions")]
    Completions(cmd::completions::CompletionsArgs),
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("BOQ_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose || env::var("DEBUG").is_ok() {
            "boq=debug,info"
        } else {
            "boq=info,warn"
        })
    });

    let format = env::var("BOQ_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn run(cli: Cli, config: &EffectiveConfig, output: OutputMode, root: &Path) -> anyhow::Result<()> {
    let open = || cmd::open_store(root, &config.project);
    match cli.command {
        Commands::Init(args) => cmd::init::run_init(&args, output, root),
        Commands::Project(args) => cmd::project::run_project(&args, &open()?, output),
        Commands::Bill(args) => cmd::bill::run_bill(&args, &open()?, output),
        Commands::Section(args) => cmd::section::run_section(&args, &open()?, output),
        Commands::Item(args) => cmd::item::run_item(&args, &open()?, output),
        Commands::Collection(args) => cmd::collection::run_collection(&args, &open()?, output),
        Commands::Completions(args) => {
            let mut command = Cli::command();
            cmd::completions::run_completions(args.shell, &mut command)
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Until the config is read only --json can pick the error format.
    let early_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Text
    };

    let root = match cli.root.clone().map_or_else(env::current_dir, Ok) {
        Ok(root) => root,
        Err(err) => {
            render_error(
                early_mode,
                &CliError::with_code(
                    format!("cannot resolve working directory: {err}"),
                    ErrorCode::InternalUnexpected,
                ),
            );
            return ExitCode::FAILURE;
        }
    };

    let config = match config::resolve_config(&root, cli.json) {
        Ok(config) => config,
        Err(err) => {
            render_error(
                early_mode,
                &CliError::with_code(format!("{err:#}"), ErrorCode::ConfigParseError),
            );
            return ExitCode::FAILURE;
        }
    };
    let output = OutputMode::from_resolved(&config.resolved_output);
    debug!(root = %root.display(), output = %config.resolved_output, "resolved config");

    if cli.verbose {
        info!("Verbose mode enabled");
    }

    match run(cli, &config, output, &root) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            render_error(output, &CliError::from_anyhow(&err));
            ExitCode::FAILURE
        }
    }
}
