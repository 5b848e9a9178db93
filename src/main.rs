//! Mnemosyne - belief-state memory for strategic content decisions
//!
//! CLI entry point with global panic handler.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use mnemosyne::config::{mnemosyne_home, Config};
use mnemosyne::error::{exit_codes, MnemosyneError};
use mnemosyne::memory::BeliefStore;
use mnemosyne::storage::FileMemoryStore;

// =============================================================================
// CLI Definition
// =============================================================================

/// Mnemosyne - belief-state memory for strategic content decisions
#[derive(Parser)]
#[command(name = "mnemosyne")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List assumptions and insights with confidence and risk
    Beliefs {
        /// Output as JSON
        #[arg(long, short)]
        json: bool,
        /// Suppress output
        #[arg(long, short)]
        quiet: bool,
        /// Show only HIGH-risk assumptions
        #[arg(long)]
        at_risk: bool,
        /// Maximum number of results
        #[arg(long, short = 'n')]
        limit: Option<usize>,
    },

    /// Record an assumption (replaces one with the same id)
    Assume {
        /// Assumption id
        id: String,
        /// The claim being held
        statement: String,
        /// Starting confidence in [0, 1] (default: 1.0)
        #[arg(long)]
        confidence: Option<f64>,
        /// Per-day decay rate (default: from config)
        #[arg(long)]
        decay_rate: Option<f64>,
        /// Pre-computed embedding of the statement, comma-separated
        #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
        embedding: Option<Vec<f32>>,
        /// Output as JSON
        #[arg(long, short)]
        json: bool,
        /// Suppress output
        #[arg(long, short)]
        quiet: bool,
    },

    /// Process a JSON array of contradictions as one capped batch
    Contradict {
        /// Path to the JSON file
        file: PathBuf,
        /// Output as JSON
        #[arg(long, short)]
        json: bool,
        /// Suppress output
        #[arg(long, short)]
        quiet: bool,
    },

    /// Apply time-based confidence decay now
    Decay {
        /// Output as JSON
        #[arg(long, short)]
        json: bool,
        /// Suppress output
        #[arg(long, short)]
        quiet: bool,
    },

    /// Record a human governance override
    Override {
        /// Belief, organization or decision being overridden
        target: String,
        /// What was decided instead
        #[arg(long)]
        action: String,
        /// Why the system's judgment is overridden
        #[arg(long)]
        rationale: String,
        /// Who authorized the override
        #[arg(long)]
        authority: String,
        /// Snapshot of the overridden state (default: the belief's current state)
        #[arg(long)]
        previous_state: Option<String>,
        /// Output as JSON
        #[arg(long, short)]
        json: bool,
        /// Suppress output
        #[arg(long, short)]
        quiet: bool,
    },

    /// List active overrides (override debt)
    Debt {
        /// Resolve this override id before listing
        #[arg(long)]
        resolve: Option<String>,
        /// Output as JSON
        #[arg(long, short)]
        json: bool,
        /// Suppress output
        #[arg(long, short)]
        quiet: bool,
    },

    /// Run the reasoning loop for an organization
    Cycle {
        /// Organization id
        #[arg(long)]
        org: String,
        /// JSON array of feedback records observed by the first cycle
        #[arg(long)]
        feedback: Option<PathBuf>,
        /// Stage advancements to run (default: 6, one full cycle)
        #[arg(long)]
        advances: Option<usize>,
        /// Create the organization under this name if it does not exist
        #[arg(long)]
        org_name: Option<String>,
        /// Plan without an active assumption, recording this reason
        #[arg(long)]
        override_reason: Option<String>,
        /// Output as JSON
        #[arg(long, short)]
        json: bool,
        /// Suppress output
        #[arg(long, short)]
        quiet: bool,
    },

    /// Analyze a belief's confidence trajectory
    Trajectory {
        /// Assumption or insight id
        id: String,
        /// Days of history to analyze (default: from config)
        #[arg(long)]
        lookback_days: Option<u32>,
        /// Output as JSON
        #[arg(long, short)]
        json: bool,
        /// Suppress output
        #[arg(long, short)]
        quiet: bool,
    },
}

// =============================================================================
// Main Entry Point
// =============================================================================

fn main() -> ExitCode {
    // Set up panic handler
    setup_panic_handler();

    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("mnemosyne error: {}", e);
            ExitCode::from(exit_codes::ERROR as u8)
        }
    }
}

/// Set up the global panic handler.
///
/// On panic, logs to ~/.mnemosyne/crash.log and exits with code 3.
fn setup_panic_handler() {
    std::panic::set_hook(Box::new(|info| {
        eprintln!("mnemosyne panic: {}", info);

        if let Some(home) = mnemosyne_home() {
            let crash_log = home.join("crash.log");
            if let Ok(mut file) = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&crash_log)
            {
                let timestamp = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
                let _ = writeln!(file, "[{}] {}", timestamp, info);
            }
        }

        std::process::exit(exit_codes::INTERNAL);
    }));
}

/// Run the CLI and return the exit code.
fn run() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = Config::load();

    match cli.command {
        Commands::Beliefs {
            json,
            quiet,
            at_risk,
            limit,
        } => run_beliefs(json, quiet, at_risk, limit, config),
        Commands::Assume {
            id,
            statement,
            confidence,
            decay_rate,
            embedding,
            json,
            quiet,
        } => run_assume(
            &id,
            &statement,
            confidence,
            decay_rate,
            embedding,
            json,
            quiet,
            config,
        ),
        Commands::Contradict { file, json, quiet } => run_contradict(&file, json, quiet, config),
        Commands::Decay { json, quiet } => run_decay(json, quiet, config),
        Commands::Override {
            target,
            action,
            rationale,
            authority,
            previous_state,
            json,
            quiet,
        } => run_override(
            &target,
            action,
            rationale,
            authority,
            previous_state,
            json,
            quiet,
            config,
        ),
        Commands::Debt {
            resolve,
            json,
            quiet,
        } => run_debt(resolve, json, quiet, config),
        Commands::Cycle {
            org,
            feedback,
            advances,
            org_name,
            override_reason,
            json,
            quiet,
        } => run_cycle(
            &org,
            feedback.as_deref(),
            advances,
            org_name,
            override_reason,
            json,
            quiet,
            config,
        ),
        Commands::Trajectory {
            id,
            lookback_days,
            json,
            quiet,
        } => run_trajectory(&id, lookback_days, json, quiet, config),
    }
}

// =============================================================================
// Command Implementations
// =============================================================================

/// Open the belief store configured for this invocation.
///
/// Load failures are reported instead of silently starting empty, so a
/// damaged store is never overwritten by a CLI mutation.
fn open_store(config: &Config) -> Result<BeliefStore, MnemosyneError> {
    let dir = config.storage_dir().ok_or_else(|| {
        MnemosyneError::config("Could not determine storage directory (no home directory)")
    })?;
    let backend = FileMemoryStore::with_dir(dir)?
        .with_retained_generations(config.memory.retained_generations);
    BeliefStore::try_open(backend)
}

/// Convert a success boolean to an exit code.
fn success_to_exit_code(success: bool) -> ExitCode {
    if success {
        ExitCode::from(exit_codes::OK as u8)
    } else {
        ExitCode::from(exit_codes::ERROR as u8)
    }
}

fn print_formatted(formatted: String) {
    if !formatted.is_empty() {
        println!("{}", formatted.trim_end());
    }
}

fn run_beliefs(
    json: bool,
    quiet: bool,
    at_risk: bool,
    limit: Option<usize>,
    config: Config,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    use mnemosyne::cli::beliefs::{BeliefsCommand, BeliefsOptions};

    let store = open_store(&config)?;
    let cmd = BeliefsCommand::new(store, config);
    let options = BeliefsOptions {
        json,
        quiet,
        at_risk,
        limit,
    };

    let output = cmd.run(&options);
    print_formatted(cmd.format_output(&output, &options));

    Ok(success_to_exit_code(output.success))
}

#[allow(clippy::too_many_arguments)]
fn run_assume(
    id: &str,
    statement: &str,
    confidence: Option<f64>,
    decay_rate: Option<f64>,
    embedding: Option<Vec<f32>>,
    json: bool,
    quiet: bool,
    config: Config,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    use mnemosyne::cli::assume::{AssumeCommand, AssumeOptions};

    let store = open_store(&config)?;
    let mut cmd = AssumeCommand::new(store, config);
    let options = AssumeOptions {
        json,
        quiet,
        confidence,
        decay_rate,
        embedding,
    };

    let output = cmd.run(id, statement, &options);
    print_formatted(cmd.format_output(&output, &options));

    Ok(success_to_exit_code(output.success))
}

fn run_contradict(
    file: &Path,
    json: bool,
    quiet: bool,
    config: Config,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    use mnemosyne::cli::contradict::{ContradictCommand, ContradictOptions};

    let store = open_store(&config)?;
    let mut cmd = ContradictCommand::new(store, config);
    let options = ContradictOptions { json, quiet };

    let output = cmd.run(file, &options);
    print_formatted(cmd.format_output(&output, &options));

    Ok(success_to_exit_code(output.success))
}

fn run_decay(json: bool, quiet: bool, config: Config) -> Result<ExitCode, Box<dyn std::error::Error>> {
    use mnemosyne::cli::decay::{DecayCommand, DecayOptions};

    let store = open_store(&config)?;
    let mut cmd = DecayCommand::new(store, config);
    let options = DecayOptions { json, quiet };

    let output = cmd.run(&options);
    print_formatted(cmd.format_output(&output, &options));

    Ok(success_to_exit_code(output.success))
}

#[allow(clippy::too_many_arguments)]
fn run_override(
    target: &str,
    action: String,
    rationale: String,
    authority: String,
    previous_state: Option<String>,
    json: bool,
    quiet: bool,
    config: Config,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    use mnemosyne::cli::override_cmd::{OverrideCommand, OverrideOptions};

    let store = open_store(&config)?;
    let mut cmd = OverrideCommand::new(store, config);
    let options = OverrideOptions {
        json,
        quiet,
        action,
        rationale,
        authority,
        previous_state,
    };

    let output = cmd.run(target, &options);
    print_formatted(cmd.format_output(&output, &options));

    Ok(success_to_exit_code(output.success))
}

fn run_debt(
    resolve: Option<String>,
    json: bool,
    quiet: bool,
    config: Config,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    use mnemosyne::cli::debt::{DebtCommand, DebtOptions};

    let store = open_store(&config)?;
    let mut cmd = DebtCommand::new(store, config);
    let options = DebtOptions {
        json,
        quiet,
        resolve,
    };

    let output = cmd.run(&options);
    print_formatted(cmd.format_output(&output, &options));

    Ok(success_to_exit_code(output.success))
}

#[allow(clippy::too_many_arguments)]
fn run_cycle(
    org: &str,
    feedback: Option<&Path>,
    advances: Option<usize>,
    org_name: Option<String>,
    override_reason: Option<String>,
    json: bool,
    quiet: bool,
    config: Config,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    use mnemosyne::cli::cycle::{CycleCommand, CycleOptions};

    let store = open_store(&config)?;
    let mut cmd = CycleCommand::new(store, config);
    let options = CycleOptions {
        json,
        quiet,
        advances,
        org_name,
        override_reason,
    };

    let output = cmd.run(org, feedback, &options);
    print_formatted(cmd.format_output(&output, &options));

    Ok(success_to_exit_code(output.success))
}

fn run_trajectory(
    id: &str,
    lookback_days: Option<u32>,
    json: bool,
    quiet: bool,
    config: Config,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    use mnemosyne::cli::trajectory::{TrajectoryCommand, TrajectoryOptions};

    let store = open_store(&config)?;
    let cmd = TrajectoryCommand::new(store, config);
    let options = TrajectoryOptions {
        json,
        quiet,
        lookback_days,
    };

    let output = cmd.run(id, &options);
    print_formatted(cmd.format_output(&output, &options));

    Ok(success_to_exit_code(output.success))
}
