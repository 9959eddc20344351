use anyhow::Context;
use clap::Parser;
use hypercopy::cli::{self, Cli, Commands};
use hypercopy::execution::IntentLanes;
use hypercopy::{IntentOutcome, TradeIntent};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing::{error, info, warn};

mod main_runtime;

use main_runtime::{bootstrap, init_logging, load_config, Runtime};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.config_dir)?;
    init_logging(&config.logging);

    let runtime = bootstrap(config).await?;

    match &cli.command {
        Commands::Check => run_check(&runtime),
        Commands::Apply { file } => {
            let text = tokio::fs::read_to_string(file)
                .await
                .with_context(|| format!("failed to read {}", file.display()))?;
            let intents = cli::parse_intents(&text)?;
            info!("Applying {} intents from {}", intents.len(), file.display());
            let outcomes = runtime.orchestrator.handle_batch(intents).await;
            print_outcomes(&outcomes)?;
        }
        Commands::Run => run_stdin(&runtime).await?,
        Commands::Intent { .. } => {
            let intent = cli
                .command
                .to_intent()
                .context("intent flags did not form an intent")?;
            let outcome = runtime.orchestrator.handle(&intent).await;
            print_outcomes(std::slice::from_ref(&outcome))?;
        }
        Commands::State { trader, symbol } => run_state(&runtime, trader, symbol).await?,
    }

    runtime.orchestrator.events().log_summary();
    Ok(())
}

fn run_check(runtime: &Runtime) {
    println!("\x1b[32m✓ {} trader(s) connected\x1b[0m", runtime.registry.len());
    for account in runtime.registry.accounts() {
        println!(
            "  {:<12} owner {:?}  signer {:?}  sub-account {:?}",
            account.trader_name,
            account.owner_address,
            account.signer_address,
            account.subaccount_address
        );
    }
}

async fn run_state(runtime: &Runtime, trader: &str, symbol: &str) -> anyhow::Result<()> {
    let account = runtime.registry.resolve(trader)?;
    let symbol = runtime.orchestrator.normalizer().normalize(symbol);

    let (orders, position) = tokio::try_join!(
        runtime
            .reader
            .fetch_open_orders(account.subaccount_address, &symbol),
        runtime
            .reader
            .fetch_position(account.subaccount_address, &symbol),
    )?;

    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "trader": account.trader_name,
            "subaccount": format!("{:?}", account.subaccount_address),
            "symbol": symbol,
            "open_orders": orders,
            "position": position,
        }))?
    );
    Ok(())
}

/// One intent per line. Each (trader, symbol) key gets its own lane, so
/// intents for different keys overlap while one key's intents stay in order.
async fn run_stdin(runtime: &Runtime) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    info!("Reading intents from stdin. Press Ctrl+C to stop.");
    let (mut lanes, mut outcomes) = IntentLanes::new(runtime.orchestrator.clone());
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let line = line.trim();
                if line.is_empty() || line.starts_with('#') {
                    continue;
                }
                match serde_json::from_str::<TradeIntent>(line) {
                    Ok(intent) => lanes.submit(intent).await,
                    Err(e) => warn!("Ignoring malformed intent: {}", e),
                }
            }
            Some(outcome) = outcomes.recv() => {
                print_outcomes(std::slice::from_ref(&outcome))?;
            }
            _ = &mut shutdown => {
                println!("\n\x1b[33mShutting down...\x1b[0m");
                break;
            }
        }
    }

    // Intents already queued run to completion.
    info!("Waiting for {} lane(s) to finish", lanes.lane_count());
    let printer = async {
        while let Some(outcome) = outcomes.recv().await {
            print_outcomes(std::slice::from_ref(&outcome))?;
        }
        anyhow::Ok(())
    };
    let ((), printed) = tokio::join!(lanes.drain(), printer);
    printed
}

fn print_outcomes(outcomes: &[IntentOutcome]) -> anyhow::Result<()> {
    for outcome in outcomes {
        println!("{}", serde_json::to_string(outcome)?);
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => error!("Failed to install SIGTERM handler: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
