use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use provisioner::config::{self, ProvisionerConfig};
use provisioner::engine::{self, password, Options};
use provisioner::output::formatter;
use provisioner::params::Phase;
use provisioner::state::models::StateRecord;
use provisioner::state::sqlite::SqliteStorage;
use provisioner::state::{StateData, StateStorage};

/// Reset SIGPIPE to default behavior so piping (e.g. `provisioner state list | head`)
/// exits cleanly instead of panicking on broken pipe.
#[cfg(unix)]
fn reset_sigpipe() {
    unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_DFL);
    }
}

/// provisioner - stateful provisioning of managed databases and caches
#[derive(Parser)]
#[command(name = "provisioner", version, about, long_about = None)]
struct Cli {
    /// Path to the YAML config file
    #[arg(short, long, default_value = config::loader::DEFAULT_CONFIG_FILE)]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// State database path (overrides state.path from the config)
    #[arg(short, long)]
    state: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect and manage stored state
    State {
        #[command(subcommand)]
        command: StateCommands,
    },

    /// Show the parameter metadata of a resource kind
    Params {
        /// Resource kind: rds, redis or memcached
        kind: String,

        /// Lifecycle phase: install, update, import, read-replica, restore-from-snapshot
        #[arg(short, long, default_value = "install")]
        phase: String,
    },

    /// Plan an install offline: apply defaults and check required and unknown keys
    Validate {
        /// Resource kind: rds, redis or memcached
        kind: String,

        /// Resource id the plan is made for
        #[arg(long, default_value = "resource")]
        id: String,

        /// Option as KEY=VALUE (repeatable)
        #[arg(short = 'o', long = "option")]
        options: Vec<String>,
    },

    /// Generate a password the way installs do
    Password {
        /// Password length (defaults to password.length from the config)
        #[arg(short, long)]
        length: Option<usize>,
    },
}

#[derive(Subcommand)]
enum StateCommands {
    /// List all stored states
    List,

    /// Show one state with its parameters
    Show {
        /// Resource id
        id: String,
    },

    /// Show the progress log of a state
    Logs {
        /// Resource id
        id: String,
    },

    /// Lock a state
    Lock {
        /// Resource id
        id: String,

        /// Why the state is locked
        #[arg(short, long)]
        reason: String,
    },

    /// Unlock a state
    Unlock {
        /// Resource id
        id: String,
    },

    /// Remove a state without touching the cloud resources
    Rm {
        /// Resource id
        id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    #[cfg(unix)]
    reset_sigpipe();

    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("warn")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::State { ref command } => cmd_state(&cli, &cfg, command).await,
        Commands::Params {
            ref kind,
            ref phase,
        } => cmd_params(kind, phase),
        Commands::Validate {
            ref kind,
            ref id,
            ref options,
        } => cmd_validate(&cfg, kind, id, options),
        Commands::Password { length } => cmd_password(&cfg, length),
    }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn open_storage(cli: &Cli, cfg: &ProvisionerConfig) -> Result<SqliteStorage> {
    let path = cli.state.as_deref().unwrap_or(&cfg.state.path);
    let storage = SqliteStorage::open(path)?;
    storage.initialize()?;
    Ok(storage)
}

fn find_record(storage: &SqliteStorage, id: &str) -> Result<StateRecord> {
    storage
        .list_states()?
        .into_iter()
        .find(|r| r.id == id)
        .with_context(|| format!("State '{}' not found.", id))
}

async fn load_state(storage: &SqliteStorage, id: &str) -> Result<StateData> {
    let bytes = storage
        .get_state(id)
        .await
        .with_context(|| format!("State '{}' not found.", id))?;
    Ok(StateData::load(&bytes)?)
}

async fn save_state(storage: &SqliteStorage, provisioner: &str, state: &mut StateData) -> Result<()> {
    let expected = state.revision;
    state.revision = expected + 1;
    let bytes = state.to_bytes()?;
    storage
        .save_state(&state.id, &bytes, provisioner, expected)
        .await
        .with_context(|| format!("Failed to save state '{}'", state.id))?;
    Ok(())
}

/// Parse `KEY=VALUE` arguments; later duplicates win.
fn parse_options(raw: &[String]) -> Result<Options> {
    let mut options = Options::new();
    for item in raw {
        let Some((key, value)) = item.split_once('=') else {
            bail!("Option '{}' must be of the form KEY=VALUE", item);
        };
        let key = key.trim();
        if key.is_empty() {
            bail!("Option '{}' has an empty key", item);
        }
        options.insert(key.to_string(), value.trim().to_string());
    }
    Ok(options)
}

// ─── Commands ────────────────────────────────────────────────────────────────

async fn cmd_state(cli: &Cli, cfg: &ProvisionerConfig, command: &StateCommands) -> Result<()> {
    let storage = open_storage(cli, cfg)?;

    match command {
        StateCommands::List => {
            let records = storage.list_states()?;
            formatter::print_state_list(&records);
        }

        StateCommands::Show { id } => {
            let state = load_state(&storage, id).await?;
            formatter::print_state_detail(&state);
        }

        StateCommands::Logs { id } => {
            let entries = storage.state_logs(id)?;
            formatter::print_logs(id, &entries);
        }

        StateCommands::Lock { id, reason } => {
            let record = find_record(&storage, id)?;
            let mut state = load_state(&storage, id).await?;
            state.lock(reason)?;
            save_state(&storage, &record.provisioner, &mut state).await?;
            formatter::print_success(&format!("Locked {} ({}).", id, reason));
        }

        StateCommands::Unlock { id } => {
            let record = find_record(&storage, id)?;
            let mut state = load_state(&storage, id).await?;
            if !state.locked {
                println!("{}", format!("{} is not locked.", id).dimmed());
                return Ok(());
            }
            state.unlock();
            save_state(&storage, &record.provisioner, &mut state).await?;
            formatter::print_success(&format!("Unlocked {}.", id));
        }

        StateCommands::Rm { id } => {
            find_record(&storage, id)?;
            storage.delete_state(id).await?;
            formatter::print_success(&format!(
                "Removed {} from state (cloud resources unchanged).",
                id
            ));
        }
    }

    Ok(())
}

fn cmd_params(kind: &str, phase: &str) -> Result<()> {
    let Some(phase) = Phase::parse(phase) else {
        bail!("Unknown phase '{}'.", phase);
    };
    let table = engine::metadata_table(kind, phase)?;
    formatter::print_metadata_table(kind, phase, &table);
    Ok(())
}

fn cmd_validate(cfg: &ProvisionerConfig, kind: &str, id: &str, raw: &[String]) -> Result<()> {
    if !engine::RESOURCE_KINDS.contains(&kind) {
        bail!(
            "Unknown resource kind '{}'. Expected one of: {}",
            kind,
            engine::RESOURCE_KINDS.join(", ")
        );
    }
    let options = parse_options(raw)?;

    match engine::plan_install(kind, id, &options, cfg.password.length) {
        Ok(params) => {
            formatter::print_plan(kind, &params);
            formatter::print_success("Parameters are valid.");
            Ok(())
        }
        Err(e) => {
            formatter::print_error(&e.to_string());
            Err(e.into())
        }
    }
}

fn cmd_password(cfg: &ProvisionerConfig, length: Option<usize>) -> Result<()> {
    let length = length.unwrap_or(cfg.password.length);
    let password = password::generate_secure_password(length)?;
    println!("{}", password);
    Ok(())
}
