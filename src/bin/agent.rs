use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info, level_filters::LevelFilter, trace};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};
use uptime_mesh::{
    agent::{AgentIdentity, AgentRuntime, RuntimeOptions},
    alerts::{AlertBus, LogBus, WebhookBus},
    config::{BusConfig, Config, StorageConfig, read_config_file},
    storage::{MemoryBackend, StorageBackend},
};

#[derive(Debug, Clone, Parser)]
struct Args {
    /// Config file
    #[arg(short)]
    file: String,
}

fn init() {
    let filter = filter::Targets::new().with_targets(vec![
        ("uptime_mesh", LevelFilter::DEBUG),
        ("uptime_agent", LevelFilter::TRACE),
    ]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init();
    let args = Args::parse();
    trace!("started with args: {args:?}");

    let config = read_config_file(&args.file)?.apply_env_overrides()?;

    let storage = open_storage(&config).await?;
    let bus = build_bus(&config)?;

    let identity = AgentIdentity::from_config(&config);
    info!(
        "starting agent '{}' on {} (region: {:?})",
        identity.id, identity.hostname, identity.region
    );

    let runtime = Arc::new(AgentRuntime::new(
        identity,
        RuntimeOptions::from_config(&config),
        storage.clone(),
        bus,
    ));

    #[cfg(feature = "api")]
    if config.api.enabled {
        let state = uptime_mesh::api::ApiState::new(runtime.clone());
        uptime_mesh::api::spawn_api_server(config.api.bind, state).await?;
    }

    drive(runtime, &config).await;

    storage.close().await?;
    Ok(())
}

async fn open_storage(config: &Config) -> anyhow::Result<Arc<dyn StorageBackend>> {
    match &config.storage {
        StorageConfig::Memory => {
            let backend = MemoryBackend::new();
            for monitor in &config.monitors {
                backend.insert_monitor(monitor.clone()).await;
            }
            for seed in &config.notifications {
                backend
                    .add_notification_target(seed.monitor_id, seed.notification_id)
                    .await;
            }
            Ok(Arc::new(backend))
        }
        #[cfg(feature = "storage-sqlite")]
        StorageConfig::Sqlite { path } => {
            let backend = uptime_mesh::storage::sqlite::SqliteBackend::new(path)
                .await
                .with_context(|| format!("failed to open database at {}", path.display()))?;
            for monitor in &config.monitors {
                backend.insert_monitor(monitor).await?;
            }
            for seed in &config.notifications {
                backend
                    .add_notification_target(seed.monitor_id, seed.notification_id)
                    .await?;
            }
            Ok(Arc::new(backend))
        }
        #[cfg(not(feature = "storage-sqlite"))]
        StorageConfig::Sqlite { .. } => {
            anyhow::bail!("sqlite storage requested but the storage-sqlite feature is disabled")
        }
    }
}

fn build_bus(config: &Config) -> anyhow::Result<Arc<dyn AlertBus>> {
    let bus: Arc<dyn AlertBus> = match &config.bus {
        BusConfig::Log => Arc::new(LogBus),
        BusConfig::Webhook {
            url,
            token,
            timeout_secs,
        } => Arc::new(
            WebhookBus::new(url, token.clone(), Duration::from_secs(*timeout_secs))
                .context("failed to build webhook client")?,
        ),
    };
    Ok(bus)
}

/// Drive the entry points from their timers until Ctrl-C
///
/// Every tick runs in its own task so a long check cycle never delays a
/// heartbeat.
async fn drive(runtime: Arc<AgentRuntime>, config: &Config) {
    let mut heartbeat = ticker(config.cadence.heartbeat_secs);
    let mut election = ticker(config.cadence.election_secs);
    let mut checks = ticker(config.cadence.check_secs);

    loop {
        tokio::select! {
            _ = heartbeat.tick() => {
                let runtime = runtime.clone();
                tokio::spawn(async move {
                    if let Err(e) = runtime.run_heartbeat().await {
                        error!("heartbeat failed: {e}");
                    }
                });
            }

            _ = election.tick() => {
                let runtime = runtime.clone();
                tokio::spawn(async move {
                    if let Err(e) = runtime.run_master_election_and_distribution().await {
                        error!("election failed: {e}");
                    }
                });
            }

            _ = checks.tick() => {
                let runtime = runtime.clone();
                tokio::spawn(async move {
                    match runtime.run_check_cycle().await {
                        Ok(report) => debug!("check cycle: {report:?}"),
                        Err(e) => error!("check cycle failed: {e}"),
                    }
                });
            }

            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    error!("failed to listen for shutdown signal: {e}");
                }
                info!("shutting down");
                break;
            }
        }
    }
}

fn ticker(secs: u64) -> tokio::time::Interval {
    let mut ticker = interval(Duration::from_secs(secs.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}
