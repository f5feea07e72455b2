use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use clap::Subcommand;
use ihcd::Config;
use ihcd::Engine;
use ihcd::integrations::ihc::report::ScanReport;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "ihcd", version, about = "IHC controller integration daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the engine, the configured integrations and the HTTP API
    Run {
        #[arg(short, long, default_value = "ihcd.toml")]
        config: PathBuf,
    },

    /// Print the devices auto-setup would discover in a project document
    Scan { project: PathBuf },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    match Cli::parse().command {
        Command::Run { config } => run(&config).await,
        Command::Scan { project } => scan(&project),
    }
}

fn scan(project: &Path) -> anyhow::Result<()> {
    let xml = std::fs::read_to_string(project)
        .with_context(|| format!("Failed to read {}", project.display()))?;
    let report = ScanReport::from_project(&xml)
        .with_context(|| format!("Failed to scan {}", project.display()))?;
    print!("{}", report);
    Ok(())
}

async fn run(config_path: &Path) -> anyhow::Result<()> {
    let config = Config::from_file(config_path)?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(config.logging.filter())
        .init();

    tracing::info!("ihcd starting");
    tracing::info!("Loaded config from: {}", config_path.display());

    let mut engine = Engine::new();
    engine.register_integrations_from_config(&config);
    tracing::info!("Integrations: {:?}", engine.integration_names());
    let engine = Arc::new(engine);

    let runner = engine.clone();
    let engine_task = tokio::spawn(async move {
        if let Err(e) = runner.run().await {
            tracing::error!("Engine stopped: {}", e);
        }
    });

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let api_task = config.api.clone().map(|api| {
        let engine = engine.clone();
        tokio::spawn(async move {
            if let Err(e) = ihcd::api::serve(api.listen, api.port, engine, shutdown_rx).await {
                tracing::error!("HTTP API failed: {:#}", e);
            }
        })
    });

    tracing::info!("Press Ctrl+C to exit");
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Received shutdown signal"),
        Err(e) => tracing::error!("Failed to listen for shutdown signal: {}", e),
    }

    let _ = shutdown_tx.send(());
    if let Some(task) = api_task {
        if let Err(e) = task.await {
            tracing::error!("HTTP API task failed: {}", e);
        }
    }
    engine_task.abort();

    tracing::info!("ihcd shutdown complete");
    Ok(())
}
