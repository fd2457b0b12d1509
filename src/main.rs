//! Decoda SCC - command line driver for the source control dispatcher
//!
//! # Overview
//!
//! This binary binds one source control provider through [`SourceControl`]
//! and runs a single operation against it. It initializes:
//! - Logging infrastructure (file rotation + optional console output)
//! - Configuration loading ([`ConfigManager`]) from `Decoda Data/`
//! - The provider binding (one worker thread owns the provider module)
//!
//! # Execution Flow
//!
//! 1. Load `Decoda SCC.yaml` → provider, caller name, last project
//! 2. Initialize logging → logs/decoda-scc.<date>
//! 3. Resolve and initialize the provider
//! 4. Open the configured project (if any)
//! 5. Run the requested subcommand
//! 6. Shut the provider down (closes the project, drains the worker)
//!
//! The facade blocks the calling thread, so no async runtime is started here.

use anyhow::{Context, Result, bail};
use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use decoda_scc::{APP_NAME, ConfigManager, SourceControl, SourceControlOptions, VERSION};
use decoda_scc::models::{SccConfig, WindowHandle};

#[derive(Parser)]
#[command(name = "decoda-scc", version)]
#[command(about = "Drive a source control provider the way the debugger does", long_about = None)]
struct Cli {
    /// Configuration directory containing `Decoda SCC.yaml`
    #[arg(short, long, default_value = "Decoda Data")]
    config_dir: Utf8PathBuf,

    /// Provider to bind, overriding the configured one
    #[arg(short, long)]
    provider: Option<String>,

    /// Also log to stderr
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List installed source control providers
    Providers,

    /// Show the status of files
    Status {
        #[arg(required = true)]
        files: Vec<String>,
    },

    /// Check files out
    Checkout {
        #[arg(short, long, default_value = "")]
        comment: String,
        #[arg(required = true)]
        files: Vec<String>,
    },

    /// Check files in
    Checkin {
        #[arg(short, long, default_value = "")]
        comment: String,
        /// Leave the files checked out after checking in
        #[arg(short, long)]
        keep: bool,
        #[arg(required = true)]
        files: Vec<String>,
    },

    /// Undo a check out
    Undo {
        #[arg(required = true)]
        files: Vec<String>,
    },

    /// Add files to source control
    Add {
        #[arg(short, long, default_value = "")]
        comment: String,
        #[arg(required = true)]
        files: Vec<String>,
    },

    /// Remove files from source control
    Remove {
        #[arg(short, long, default_value = "")]
        comment: String,
        #[arg(required = true)]
        files: Vec<String>,
    },

    /// Show the provider's diff for a file
    Diff { file: String },

    /// Show the provider's history for files
    History {
        #[arg(required = true)]
        files: Vec<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_manager = ConfigManager::new(&cli.config_dir)?;
    let config = config_manager.load_config()?;

    let _guard = decoda_scc::logging::setup_from_settings(&config.source_control, cli.verbose)?;
    tracing::info!("Starting {} v{}", APP_NAME, VERSION);

    if let Command::Providers = cli.command {
        for (index, provider) in config_manager.providers(&config).iter().enumerate() {
            println!("{index}: {provider}");
        }
        return Ok(());
    }

    let scc = bind(&config_manager, &config, cli.provider.as_deref())?;
    let result = run(&scc, cli.command);

    scc.shutdown();
    tracing::info!("Shutdown complete");
    result
}

/// Initialize the selected provider and open the configured project.
fn bind(
    config_manager: &ConfigManager,
    config: &SccConfig,
    override_name: Option<&str>,
) -> Result<SourceControl> {
    let settings = &config.source_control;
    let name = override_name.unwrap_or(&settings.provider);
    if name.is_empty() {
        bail!(
            "No source control provider configured in {}",
            config_manager.config_path()
        );
    }

    let provider = match override_name {
        Some(name) => config_manager.providers(config).find(name).cloned(),
        None => config_manager.selected_provider(config),
    }
    .with_context(|| format!("Source control provider not found: {name}"))?;

    let scc = SourceControl::with_options(SourceControlOptions::from(settings));
    if !scc.initialize(&provider, WindowHandle::NONE) {
        bail!("Failed to initialize source control provider {provider}");
    }

    if !settings.project.is_empty() && !scc.open_project(&settings.project) {
        tracing::warn!(
            "Could not open project {}, continuing without one",
            settings.project.project_name
        );
    }

    Ok(scc)
}

fn run(scc: &SourceControl, command: Command) -> Result<()> {
    let ok = match command {
        Command::Providers => true,
        Command::Status { files } => {
            for (file, status) in files.iter().zip(scc.get_files_status(&files)) {
                println!("{status:>20}  {file}");
            }
            true
        }
        Command::Checkout { comment, files } => scc.check_out(&files, &comment),
        Command::Checkin {
            comment,
            keep,
            files,
        } => {
            if keep {
                scc.check_in_keep(&files, &comment)
            } else {
                scc.check_in(&files, &comment)
            }
        }
        Command::Undo { files } => scc.undo_check_out(&files),
        Command::Add { comment, files } => scc.add_files(&files, &comment),
        Command::Remove { comment, files } => scc.remove_files(&files, &comment),
        Command::Diff { file } => scc.show_diff(&file),
        Command::History { files } => scc.show_history(&files),
    };

    if !ok {
        bail!("Source control operation failed, see the log for details");
    }
    Ok(())
}
