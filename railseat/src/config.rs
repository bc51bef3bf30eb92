//! Configuration management.
//!
//! Loads configuration from `RAILSEAT_*` environment variables with sensible
//! defaults. Unlike plain `unwrap_or` parsing, a variable that is set but
//! unparseable is an error naming the variable.

use crate::runtime::handlers::{FailurePolicy, TopicPolicies};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// A variable was set to something unusable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid value '{value}' for {variable}: {reason}")]
pub struct ConfigError {
    /// Variable name
    pub variable: &'static str,
    /// Raw value
    pub value: String,
    /// Why it was rejected
    pub reason: String,
}

/// How the orchestrator reaches seat and train state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Topology {
    /// Events over the broker; seat and train update in consumers
    Choreography,
    /// One unit of work, no events
    SingleProcess,
}

impl FromStr for Topology {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "choreography" => Ok(Self::Choreography),
            "single-process" => Ok(Self::SingleProcess),
            _ => Err("expected choreography or single-process".to_string()),
        }
    }
}

/// Which transport carries the events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrokerKind {
    /// In-process durable queues
    Memory,
    /// Kafka (requires the `kafka` feature)
    Kafka,
}

impl FromStr for BrokerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "kafka" => Ok(Self::Kafka),
            _ => Err("expected memory or kafka".to_string()),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server
    pub server: ServerConfig,
    /// Topology and transport
    pub broker: BrokerConfig,
    /// Consumer behaviour
    pub consumers: ConsumerConfig,
    /// Remote collaborator URLs; unset means in-process
    pub collaborators: CollaboratorConfig,
    /// Expose `/metrics`
    pub metrics_enabled: bool,
    /// JSON file with trains, seats and riders
    pub seed_path: Option<PathBuf>,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to bind to
    pub port: u16,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout: u64,
}

impl ServerConfig {
    /// `host:port`.
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Shutdown timeout as a `Duration`.
    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout)
    }
}

/// Topology and transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Choreography or single process
    pub topology: Topology,
    /// Transport
    pub kind: BrokerKind,
    /// Kafka bootstrap servers
    pub kafka_brokers: String,
}

/// Consumer behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumerConfig {
    /// Delay before a consumer reattaches to its queue, in milliseconds
    pub retry_delay_ms: u64,
    /// Seat store failure policies
    #[serde(skip, default = "TopicPolicies::seat_defaults")]
    pub seat: TopicPolicies,
    /// Train inventory failure policies
    #[serde(skip, default = "TopicPolicies::train_defaults")]
    pub train: TopicPolicies,
    /// Skip redelivered events
    pub dedupe_events: bool,
}

impl ConsumerConfig {
    /// Reattach delay as a `Duration`.
    #[must_use]
    pub const fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Remote collaborator base URLs (e.g. `http://trains:8080/api/v1`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollaboratorConfig {
    /// Train inventory
    pub train_service_url: Option<String>,
    /// Seat store
    pub seat_service_url: Option<String>,
    /// User directory
    pub user_service_url: Option<String>,
}

impl CollaboratorConfig {
    /// The seat store runs in this process and drains its own queue.
    #[must_use]
    pub const fn seats_local(&self) -> bool {
        self.seat_service_url.is_none()
    }

    /// The train inventory runs in this process and drains its own queue.
    #[must_use]
    pub const fn trains_local(&self) -> bool {
        self.train_service_url.is_none()
    }

    /// Any collaborator is remote.
    #[must_use]
    pub const fn any_remote(&self) -> bool {
        self.train_service_url.is_some()
            || self.seat_service_url.is_some()
            || self.user_service_url.is_some()
    }
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for the first variable that does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through `lookup`, which maps a variable name to
    /// its value.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for the first variable that does not parse.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Lookup(lookup);

        Ok(Self {
            server: ServerConfig {
                host: env.string("RAILSEAT_HOST", "0.0.0.0"),
                port: env.parse("RAILSEAT_PORT", 8080)?,
                shutdown_timeout: env.parse("RAILSEAT_SHUTDOWN_TIMEOUT_SECS", 10)?,
            },
            broker: BrokerConfig {
                topology: env.parse("RAILSEAT_TOPOLOGY", Topology::Choreography)?,
                kind: env.parse("RAILSEAT_BROKER", BrokerKind::Memory)?,
                kafka_brokers: env.string("RAILSEAT_KAFKA_BROKERS", "localhost:9092"),
            },
            consumers: ConsumerConfig {
                retry_delay_ms: env.parse("RAILSEAT_CONSUMER_RETRY_MS", 1000)?,
                seat: TopicPolicies {
                    on_requested: env
                        .parse("RAILSEAT_SEAT_ON_REQUESTED", FailurePolicy::DropAndLog)?,
                    on_cancelled: env
                        .parse("RAILSEAT_SEAT_ON_CANCELLED", FailurePolicy::Propagate)?,
                },
                train: TopicPolicies {
                    on_requested: env
                        .parse("RAILSEAT_TRAIN_ON_REQUESTED", FailurePolicy::Propagate)?,
                    on_cancelled: env
                        .parse("RAILSEAT_TRAIN_ON_CANCELLED", FailurePolicy::Propagate)?,
                },
                dedupe_events: env.parse("RAILSEAT_DEDUPE_EVENTS", false)?,
            },
            collaborators: CollaboratorConfig {
                train_service_url: env.optional("RAILSEAT_TRAIN_SERVICE_URL"),
                seat_service_url: env.optional("RAILSEAT_SEAT_SERVICE_URL"),
                user_service_url: env.optional("RAILSEAT_USER_SERVICE_URL"),
            },
            metrics_enabled: env.parse("RAILSEAT_METRICS_ENABLED", true)?,
            seed_path: env.optional("RAILSEAT_SEED_PATH").map(PathBuf::from),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                shutdown_timeout: 10,
            },
            broker: BrokerConfig {
                topology: Topology::Choreography,
                kind: BrokerKind::Memory,
                kafka_brokers: "localhost:9092".to_string(),
            },
            consumers: ConsumerConfig {
                retry_delay_ms: 1000,
                seat: TopicPolicies::seat_defaults(),
                train: TopicPolicies::train_defaults(),
                dedupe_events: false,
            },
            collaborators: CollaboratorConfig::default(),
            metrics_enabled: true,
            seed_path: None,
        }
    }
}

struct Lookup<F>(F);

impl<F> Lookup<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn optional(&self, variable: &str) -> Option<String> {
        (self.0)(variable).filter(|value| !value.trim().is_empty())
    }

    fn string(&self, variable: &str, default: &str) -> String {
        self.optional(variable)
            .unwrap_or_else(|| default.to_string())
    }

    fn parse<T>(&self, variable: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.optional(variable) {
            None => Ok(default),
            Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError {
                variable,
                reason: e.to_string(),
                value,
            }),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_match_the_documented_policies() {
        let config = load(&[]).unwrap();

        assert_eq!(config.server.address(), "0.0.0.0:8080");
        assert_eq!(config.broker.topology, Topology::Choreography);
        assert_eq!(config.consumers.seat, TopicPolicies::seat_defaults());
        assert_eq!(config.consumers.train, TopicPolicies::train_defaults());
        assert!(!config.consumers.dedupe_events);
        assert!(config.collaborators.seat_service_url.is_none());
    }

    #[test]
    fn overrides_are_applied() {
        let config = load(&[
            ("RAILSEAT_PORT", "9000"),
            ("RAILSEAT_TOPOLOGY", "single-process"),
            ("RAILSEAT_SEAT_ON_REQUESTED", "propagate"),
            ("RAILSEAT_DEDUPE_EVENTS", "true"),
            ("RAILSEAT_SEAT_SERVICE_URL", "http://seats:8080/api/v1"),
        ])
        .unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.broker.topology, Topology::SingleProcess);
        assert_eq!(config.consumers.seat.on_requested, FailurePolicy::Propagate);
        assert!(config.consumers.dedupe_events);
        assert_eq!(
            config.collaborators.seat_service_url.as_deref(),
            Some("http://seats:8080/api/v1")
        );
    }

    #[test]
    fn bad_value_names_the_variable() {
        let error = load(&[("RAILSEAT_TRAIN_ON_CANCELLED", "retry")]).unwrap_err();
        assert_eq!(error.variable, "RAILSEAT_TRAIN_ON_CANCELLED");
        assert_eq!(error.value, "retry");
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let config = load(&[("RAILSEAT_PORT", "  ")]).unwrap();
        assert_eq!(config.server.port, 8080);
    }
}
