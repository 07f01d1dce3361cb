use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use clap::Parser;
use futures::future::join_all;
use serde::Serialize;
use tokio::runtime::Handle;
use tracing::{debug, info};

use ratekeeper::config::{LogFormat, RatekeeperConfig};
use ratekeeper::logging;
use ratekeeper::ratelimit::{Algorithm, ClientRegistry, StrategyFactory};

/// Drive concurrent requests through per-client rate limiters.
#[derive(Parser, Debug)]
#[command(name = "ratekeeper", version, about)]
struct Args {
    /// Configuration file (YAML, TOML or JSON). Uses sample clients if omitted.
    #[arg(short, long)]
    config: Option<String>,

    /// Number of concurrent workers
    #[arg(long)]
    workers: Option<usize>,

    /// Requests issued per client
    #[arg(long)]
    rounds: Option<usize>,

    /// Log level filter, e.g. `debug` or `ratekeeper=trace`
    #[arg(long)]
    log_level: Option<String>,

    /// Log output format
    #[arg(long, value_enum)]
    log_format: Option<LogFormat>,

    /// Print the summary as JSON
    #[arg(long)]
    json: bool,
}

/// Per-client outcome of the run.
#[derive(Debug, Default, Serialize)]
struct Tally {
    algorithm: Option<Algorithm>,
    allowed: u64,
    rejected: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => RatekeeperConfig::from_file(path)?,
        None => RatekeeperConfig::with_demo_clients(),
    };
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }
    if let Some(format) = args.log_format {
        config.logging.format = format;
    }
    if let Some(workers) = args.workers {
        config.demo.workers = workers;
    }
    if let Some(rounds) = args.rounds {
        config.demo.rounds = rounds;
    }

    logging::init(&config.logging)?;

    info!("Starting Ratekeeper admission demo");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let factory = StrategyFactory::with_algorithms(
        Handle::current(),
        config.limiter.algorithms.iter().copied(),
    );
    let registry = Arc::new(ClientRegistry::new(factory));

    let client_ids = register_clients(&registry, &config)?;
    info!(clients = client_ids.len(), "Clients registered");

    let summary = run(
        Arc::clone(&registry),
        &client_ids,
        config.demo.workers.max(1),
        config.demo.rounds,
    )
    .await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        for (client_id, tally) in &summary {
            let algorithm = tally.algorithm.map(|a| a.to_string()).unwrap_or_default();
            println!(
                "{client_id:<12} {algorithm:<16} allowed={:<6} rejected={}",
                tally.allowed, tally.rejected
            );
        }
    }

    registry.shutdown();
    info!("Ratekeeper admission demo finished");
    Ok(())
}

/// Register every configured client and return the distinct ids, sorted.
///
/// A repeated `client_id` replaces the earlier registration, so it appears once.
fn register_clients(
    registry: &ClientRegistry,
    config: &RatekeeperConfig,
) -> anyhow::Result<Vec<String>> {
    for client in config.client_configs()? {
        registry.register(client)?;
    }
    Ok(registry
        .clients()
        .into_iter()
        .map(|client| client.client_id)
        .collect())
}

/// Issue `rounds` requests per client, interleaved across clients, from
/// `workers` blocking tasks pulling off a shared cursor.
async fn run(
    registry: Arc<ClientRegistry>,
    client_ids: &[String],
    workers: usize,
    rounds: usize,
) -> anyhow::Result<BTreeMap<String, Tally>> {
    let jobs: Arc<Vec<String>> = Arc::new(
        (0..rounds)
            .flat_map(|_| client_ids.iter().cloned())
            .collect(),
    );
    let cursor = Arc::new(AtomicUsize::new(0));

    let handles = (0..workers).map(|worker| {
        let registry = Arc::clone(&registry);
        let jobs = Arc::clone(&jobs);
        let cursor = Arc::clone(&cursor);

        tokio::task::spawn_blocking(move || -> ratekeeper::Result<Vec<(String, bool)>> {
            let mut outcomes = Vec::new();
            loop {
                let next = cursor.fetch_add(1, Ordering::Relaxed);
                let Some(client_id) = jobs.get(next) else {
                    break;
                };
                let admitted = registry.admit(client_id)?;
                debug!(worker, client_id = %client_id, admitted, "Request decided");
                outcomes.push((client_id.clone(), admitted));
            }
            Ok(outcomes)
        })
    });

    let mut summary: BTreeMap<String, Tally> = BTreeMap::new();
    for result in join_all(handles).await {
        for (client_id, admitted) in result?? {
            let tally = summary.entry(client_id.clone()).or_default();
            if tally.algorithm.is_none() {
                tally.algorithm = registry.configuration(&client_id).map(|c| c.algorithm());
            }
            if admitted {
                tally.allowed += 1;
            } else {
                tally.rejected += 1;
            }
        }
    }

    Ok(summary)
}
