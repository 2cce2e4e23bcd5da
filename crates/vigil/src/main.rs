mod config;
mod invocation;

use anyhow::Context;
use clap::{Parser, Subcommand};
use common::domain::{AlertPublisher, DeviceDirectory};
use common::nats::NatsClient;
use common::postgres::{PostgresClient, PostgresDeviceDirectory};
use common::telemetry::{init_telemetry, shutdown_telemetry, TelemetryGuard};
use config::ServiceConfig;
use enrichment_worker::enrichment_worker::{build_pipeline, EnrichmentWorker};
use enrichment_worker::nats::NatsAlertPublisher;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Parser)]
#[command(name = "vigil", version, about = "Telemetry enrichment and anomaly detection")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Consume the telemetry stream until interrupted (default)
    Serve,
    /// Enrich one batch and print the result as JSON
    Enrich {
        /// Batch file; reads stdin when omitted
        #[arg(short, long)]
        input: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match ServiceConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let telemetry_guard = match init_telemetry(&config.telemetry_config()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize telemetry: {}", e);
            std::process::exit(1);
        }
    };

    debug!("Configuration: {:?}", config);

    let result = match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(&config).await,
        Command::Enrich { input } => enrich(&config, input).await,
    };

    finish(result, telemetry_guard);
}

fn finish(result: anyhow::Result<()>, telemetry_guard: Option<TelemetryGuard>) {
    let code = match result {
        Ok(()) => 0,
        Err(e) => {
            error!(error = %format!("{:#}", e), "vigil exiting with error");
            1
        }
    };

    shutdown_telemetry(telemetry_guard);
    std::process::exit(code);
}

async fn serve(config: &ServiceConfig) -> anyhow::Result<()> {
    info!(
        otel_enabled = config.otel_enabled,
        telemetry_stream = %config.telemetry_stream,
        "starting vigil enrichment service"
    );

    let nats_client = connect_nats(config).await?;
    ensure_nats_streams(&nats_client, config).await?;

    let directory = connect_directory(config).await?;
    let alerts = alert_publisher(&nats_client, config);

    let service = Arc::new(build_pipeline(directory, alerts, &config.pipeline_settings())?);
    let worker =
        EnrichmentWorker::new(Arc::clone(&service), &nats_client, config.worker_config()).await?;

    let token = CancellationToken::new();
    spawn_signal_handlers(token.clone());

    let mut worker_task = tokio::spawn({
        let token = token.clone();
        async move { worker.run(token).await }
    });

    let worker_result = tokio::select! {
        _ = token.cancelled() => None,
        joined = &mut worker_task => Some(joined),
    };

    if worker_result.is_none() {
        info!(
            timeout_secs = config.shutdown_timeout_secs,
            "waiting for in-flight batch and alerts to finish"
        );
    }

    let shutdown = async {
        let joined = match worker_result {
            Some(joined) => joined,
            None => (&mut worker_task).await,
        };
        service.wait_for_alerts().await;
        joined
    };
    let outcome = tokio::time::timeout(config.shutdown_timeout(), shutdown).await;

    let Ok(joined) = outcome else {
        warn!("worker did not stop within the shutdown timeout");
        worker_task.abort();
        return Ok(());
    };

    joined.context("Worker task panicked")??;
    info!("vigil stopped");
    Ok(())
}

async fn enrich(config: &ServiceConfig, input: Option<PathBuf>) -> anyhow::Result<()> {
    let raw = invocation::read_input(input.as_deref())?;
    let envelopes = invocation::parse_batch(&raw)?;

    let directory = connect_directory(config).await?;
    let alerts = match config.alert_subject() {
        Some(_) => {
            let nats_client = connect_nats(config).await?;
            alert_publisher(&nats_client, config)
        }
        None => None,
    };

    let service = build_pipeline(directory, alerts, &config.pipeline_settings())?;
    let result = service.process_batch(&envelopes).await;
    service.wait_for_alerts().await;

    let output = serde_json::to_string_pretty(&result).context("Failed to serialize result")?;
    println!("{}", output);
    Ok(())
}

async fn connect_nats(config: &ServiceConfig) -> anyhow::Result<NatsClient> {
    NatsClient::connect(&config.nats_url, config.startup_timeout()).await
}

async fn ensure_nats_streams(client: &NatsClient, config: &ServiceConfig) -> anyhow::Result<()> {
    client
        .ensure_stream(
            &config.telemetry_stream,
            &config.telemetry_stream,
            "Raw device telemetry envelopes",
        )
        .await?;
    client
        .ensure_stream(
            &config.enriched_stream,
            &config.enriched_stream,
            "Enriched telemetry records",
        )
        .await?;
    if let Some(alert_subject) = config.alert_subject() {
        client
            .ensure_stream(&config.alert_stream, alert_subject, "Critical anomaly alerts")
            .await?;
    }
    Ok(())
}

async fn connect_directory(
    config: &ServiceConfig,
) -> anyhow::Result<Option<Arc<dyn DeviceDirectory>>> {
    let Some(table) = config.directory_table() else {
        info!("no device directory configured, metadata lookup disabled");
        return Ok(None);
    };

    info!(table = %table, host = %config.postgres_host, "connecting to device directory");
    let client = PostgresClient::new(&config.postgres_config())?;
    tokio::time::timeout(config.startup_timeout(), client.ping())
        .await
        .context("Timed out connecting to PostgreSQL")??;

    let directory = PostgresDeviceDirectory::new(client, table)?;
    Ok(Some(Arc::new(directory)))
}

fn alert_publisher(
    client: &NatsClient,
    config: &ServiceConfig,
) -> Option<Arc<dyn AlertPublisher>> {
    let Some(alert_subject) = config.alert_subject() else {
        info!("no alert subject configured, alerting disabled");
        return None;
    };

    Some(Arc::new(NatsAlertPublisher::new(
        client.create_publisher_client(),
        alert_subject.to_string(),
    )))
}

fn spawn_signal_handlers(token: CancellationToken) {
    let ctrl_c_token = token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received shutdown signal");
                ctrl_c_token.cancel();
            }
            Err(e) => error!(error = %e, "error setting up signal handler"),
        }
    });

    #[cfg(unix)]
    tokio::spawn(async move {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                info!("received SIGTERM signal");
                token.cancel();
            }
            Err(e) => error!(error = %e, "error setting up SIGTERM handler"),
        }
    });
}
