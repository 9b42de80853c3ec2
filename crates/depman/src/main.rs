mod report;
mod scenario;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use depman_core::config::{ManagerConfig, TopologyConfig};
use depman_core::registry::SharedServiceRegistry;
use depman_core::{DependencyManager, Error, InMemoryServiceRegistry, Result};
use log::{error, info};

use scenario::Scenario;

/// Depman: run component graphs against an in-memory service registry
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct CliArgs {
    /// Print "pong" and exit
    #[arg(long)]
    ping: bool,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run one of the built-in scenarios
    Scenario {
        #[arg(value_enum)]
        name: Scenario,
        /// Publish/withdraw rounds for the churn scenario
        #[arg(long, default_value_t = 5)]
        rounds: usize,
    },
    /// Install a topology file (json, toml or yaml) and report the result
    Run {
        /// Path to the topology file
        file: PathBuf,
    },
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    let env = env_logger::Env::default().default_filter_or(default_filter);
    if let Err(e) = env_logger::Builder::from_env(env).try_init() {
        eprintln!("Failed to initialize logging: {}", e);
    }
}

fn new_manager(config: ManagerConfig) -> DependencyManager {
    let registry: SharedServiceRegistry = Arc::new(InMemoryServiceRegistry::new());
    DependencyManager::with_config(registry, config)
}

async fn run_scenario(name: Scenario, rounds: usize) -> Result<()> {
    let manager = new_manager(ManagerConfig::default());
    let outcome = async {
        scenario::run(&manager, name, rounds).await?;
        manager.settle().await?;
        report::print(&manager).await;
        Ok::<(), Error>(())
    }
    .await;
    manager.shutdown().await?;
    outcome
}

async fn run_topology(file: PathBuf) -> Result<()> {
    let topology = TopologyConfig::load(&file)?;
    info!("Loaded topology '{}' from {}", topology.manager.name, file.display());
    let manager = new_manager(topology.manager.clone());
    let outcome = async {
        topology.install(&manager).await?;
        manager.settle().await?;
        report::print(&manager).await;
        Ok::<(), Error>(())
    }
    .await;
    manager.shutdown().await?;
    outcome
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();

    if args.ping {
        println!("pong");
        return ExitCode::SUCCESS;
    }

    init_logging(args.verbose);

    let result = match args.command {
        Some(Commands::Scenario { name, rounds }) => run_scenario(name, rounds).await,
        Some(Commands::Run { file }) => run_topology(file).await,
        None => {
            println!("No command specified. Use --help for usage.");
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
