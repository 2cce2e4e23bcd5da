use common::postgres::PostgresConfig;
use common::telemetry::TelemetryConfig;
use config::{Config, ConfigError, Environment};
use enrichment_worker::domain::AnomalyThresholds;
use enrichment_worker::enrichment_worker::{EnrichmentWorkerConfig, PipelineSettings};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

#[derive(Deserialize, Serialize, Clone)]
pub struct ServiceConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    // NATS configuration
    /// NATS server URL
    #[serde(default = "default_nats_url")]
    pub nats_url: String,

    /// Stream carrying raw telemetry envelopes
    #[serde(default = "default_telemetry_stream")]
    pub telemetry_stream: String,

    /// Subject filter for the telemetry consumer
    #[serde(default = "default_telemetry_subject")]
    pub telemetry_subject: String,

    /// Durable consumer name
    #[serde(default = "default_nats_consumer_name")]
    pub nats_consumer_name: String,

    /// Stream receiving enriched records
    #[serde(default = "default_enriched_stream")]
    pub enriched_stream: String,

    /// Alert subject prefix; empty disables alerting
    #[serde(default)]
    pub alert_subject: String,

    /// Stream capturing `{alert_subject}.>`
    #[serde(default = "default_alert_stream")]
    pub alert_stream: String,

    /// Batch size for consumer
    #[serde(default = "default_nats_batch_size")]
    pub nats_batch_size: usize,

    /// Max wait time for batches in seconds
    #[serde(default = "default_nats_batch_wait_secs")]
    pub nats_batch_wait_secs: u64,

    // Device directory configuration
    /// Directory table (`name` or `schema.name`); empty disables metadata lookup
    #[serde(default)]
    pub device_directory_table: String,

    #[serde(default = "default_postgres_host")]
    pub postgres_host: String,

    #[serde(default = "default_postgres_port")]
    pub postgres_port: u16,

    #[serde(default = "default_postgres_database")]
    pub postgres_database: String,

    #[serde(default = "default_postgres_username")]
    pub postgres_username: String,

    #[serde(default = "default_postgres_password")]
    pub postgres_password: String,

    #[serde(default = "default_postgres_max_pool_size")]
    pub postgres_max_pool_size: usize,

    // Anomaly thresholds
    #[serde(default = "default_temperature_high_threshold")]
    pub temperature_high_threshold: f64,

    #[serde(default = "default_temperature_low_threshold")]
    pub temperature_low_threshold: f64,

    #[serde(default = "default_humidity_high_threshold")]
    pub humidity_high_threshold: f64,

    // Collaborator timeouts
    #[serde(default = "default_directory_lookup_timeout_ms")]
    pub directory_lookup_timeout_ms: u64,

    #[serde(default = "default_alert_publish_timeout_ms")]
    pub alert_publish_timeout_ms: u64,

    /// Startup timeout for initialization operations in seconds
    #[serde(default = "default_startup_timeout_secs")]
    pub startup_timeout_secs: u64,

    /// Budget for graceful shutdown in seconds
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,

    // OpenTelemetry configuration
    /// OpenTelemetry OTLP endpoint (gRPC)
    #[serde(default = "default_otel_endpoint")]
    pub otel_endpoint: String,

    /// Enable OpenTelemetry export
    #[serde(default)]
    pub otel_enabled: bool,

    /// Service name for OpenTelemetry resource
    #[serde(default = "default_otel_service_name")]
    pub otel_service_name: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

// NATS defaults
fn default_nats_url() -> String {
    "nats://localhost:4222".to_string()
}

fn default_telemetry_stream() -> String {
    "telemetry".to_string()
}

fn default_telemetry_subject() -> String {
    "telemetry.>".to_string()
}

fn default_nats_consumer_name() -> String {
    "vigil-enrichment".to_string()
}

fn default_enriched_stream() -> String {
    "enriched_telemetry".to_string()
}

fn default_alert_stream() -> String {
    "alerts".to_string()
}

fn default_nats_batch_size() -> usize {
    100
}

fn default_nats_batch_wait_secs() -> u64 {
    5
}

// PostgreSQL defaults
fn default_postgres_host() -> String {
    "localhost".to_string()
}

fn default_postgres_port() -> u16 {
    5432
}

fn default_postgres_database() -> String {
    "vigil".to_string()
}

fn default_postgres_username() -> String {
    "vigil".to_string()
}

fn default_postgres_password() -> String {
    "vigil".to_string()
}

fn default_postgres_max_pool_size() -> usize {
    8
}

// Threshold defaults
fn default_temperature_high_threshold() -> f64 {
    85.0
}

fn default_temperature_low_threshold() -> f64 {
    5.0
}

fn default_humidity_high_threshold() -> f64 {
    90.0
}

fn default_directory_lookup_timeout_ms() -> u64 {
    2000
}

fn default_alert_publish_timeout_ms() -> u64 {
    2000
}

fn default_startup_timeout_secs() -> u64 {
    30
}

fn default_shutdown_timeout_secs() -> u64 {
    10
}

// OpenTelemetry defaults
fn default_otel_endpoint() -> String {
    "http://localhost:4317".to_string()
}

fn default_otel_service_name() -> String {
    "vigil".to_string()
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let config: Self = Config::builder()
            .add_source(Environment::with_prefix("VIGIL"))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject stream names JetStream would refuse at startup
    fn validate(&self) -> Result<(), ConfigError> {
        let mut streams = vec![
            ("VIGIL_TELEMETRY_STREAM", self.telemetry_stream.as_str()),
            ("VIGIL_ENRICHED_STREAM", self.enriched_stream.as_str()),
        ];
        if self.alert_subject().is_some() {
            streams.push(("VIGIL_ALERT_STREAM", self.alert_stream.as_str()));
        }

        for (var, name) in streams {
            if !is_valid_stream_name(name) {
                return Err(ConfigError::Message(format!(
                    "{} is not a valid JetStream stream name: {:?}",
                    var, name
                )));
            }
        }
        Ok(())
    }

    /// Device directory table, when one is configured
    pub fn directory_table(&self) -> Option<&str> {
        non_empty(&self.device_directory_table)
    }

    /// Alert subject prefix, when alerting is configured
    pub fn alert_subject(&self) -> Option<&str> {
        non_empty(&self.alert_subject)
    }

    pub fn telemetry_config(&self) -> TelemetryConfig {
        TelemetryConfig {
            service_name: self.otel_service_name.clone(),
            otel_endpoint: self.otel_endpoint.clone(),
            otel_enabled: self.otel_enabled,
            log_level: self.log_level.clone(),
        }
    }

    pub fn postgres_config(&self) -> PostgresConfig {
        PostgresConfig {
            host: self.postgres_host.clone(),
            port: self.postgres_port,
            database: self.postgres_database.clone(),
            username: self.postgres_username.clone(),
            password: self.postgres_password.clone(),
            max_pool_size: self.postgres_max_pool_size,
            connect_timeout: self.startup_timeout(),
        }
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            thresholds: AnomalyThresholds {
                temperature_high: self.temperature_high_threshold,
                temperature_low: self.temperature_low_threshold,
                humidity_high: self.humidity_high_threshold,
            },
            directory_lookup_timeout: Duration::from_millis(self.directory_lookup_timeout_ms),
            alert_publish_timeout: Duration::from_millis(self.alert_publish_timeout_ms),
        }
    }

    pub fn worker_config(&self) -> EnrichmentWorkerConfig {
        EnrichmentWorkerConfig {
            telemetry_stream: self.telemetry_stream.clone(),
            telemetry_subject: self.telemetry_subject.clone(),
            enriched_stream: self.enriched_stream.clone(),
            consumer_name: self.nats_consumer_name.clone(),
            nats_batch_size: self.nats_batch_size,
            nats_batch_wait_secs: self.nats_batch_wait_secs,
        }
    }

    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

fn is_valid_stream_name(name: &str) -> bool {
    !name.is_empty()
        && !name
            .chars()
            .any(|c| matches!(c, '.' | '*' | '>' | '/' | '\\') || c.is_whitespace())
}

impl fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("log_level", &self.log_level)
            .field("nats_url", &self.nats_url)
            .field("telemetry_stream", &self.telemetry_stream)
            .field("telemetry_subject", &self.telemetry_subject)
            .field("nats_consumer_name", &self.nats_consumer_name)
            .field("enriched_stream", &self.enriched_stream)
            .field("alert_subject", &self.alert_subject)
            .field("alert_stream", &self.alert_stream)
            .field("nats_batch_size", &self.nats_batch_size)
            .field("nats_batch_wait_secs", &self.nats_batch_wait_secs)
            .field("device_directory_table", &self.device_directory_table)
            .field("postgres_host", &self.postgres_host)
            .field("postgres_port", &self.postgres_port)
            .field("postgres_database", &self.postgres_database)
            .field("postgres_username", &self.postgres_username)
            .field("postgres_password", &"<redacted>")
            .field("postgres_max_pool_size", &self.postgres_max_pool_size)
            .field("temperature_high_threshold", &self.temperature_high_threshold)
            .field("temperature_low_threshold", &self.temperature_low_threshold)
            .field("humidity_high_threshold", &self.humidity_high_threshold)
            .field("directory_lookup_timeout_ms", &self.directory_lookup_timeout_ms)
            .field("alert_publish_timeout_ms", &self.alert_publish_timeout_ms)
            .field("startup_timeout_secs", &self.startup_timeout_secs)
            .field("shutdown_timeout_secs", &self.shutdown_timeout_secs)
            .field("otel_endpoint", &self.otel_endpoint)
            .field("otel_enabled", &self.otel_enabled)
            .field("otel_service_name", &self.otel_service_name)
            .finish()
    }
}

fn non_empty(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}
