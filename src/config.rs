//! Configuration module for vaporns.
//!
//! Loads configuration from environment variables with sensible defaults.
//! Invalid values are rejected so the service never starts half-configured.

use crate::ingest::{Policy, Reconciler, UnknownPolicy, DEFAULT_STALENESS};
use crate::store::{BuildOptions, Liveness, UnknownLiveness, Zones};

use std::env;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

/// Longest accepted staleness horizon.
pub const MAX_STALENESS_SECS: u64 = 86_400;

/// Configuration error types.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{key}={value}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: &'static str,
    },
    #[error(transparent)]
    Policy(#[from] UnknownPolicy),
    #[error(transparent)]
    Liveness(#[from] UnknownLiveness),
}

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the HTTP listener binds to (default: 127.0.0.1:8080)
    pub listen: SocketAddr,
    /// Path prefix for batch ingestion (default: "/input")
    pub path: String,
    /// Zones served; empty serves every name
    pub zones: Zones,
    /// Scoring policy (default: avg_ping_time)
    pub policy: Policy,
    /// Age after which a winner is replaced regardless of score (default: 60s)
    pub staleness: Duration,
    /// Build reverse entries (default: true)
    pub auto_reverse: bool,
    /// TTL reported with answers, in seconds (default: 3600)
    pub ttl: u32,
    /// Which measurements count as live (default: replied)
    pub liveness: Liveness,
    /// Webhook creating probes for missed names
    pub provision_url: Option<String>,
    /// Agents the provisioned probes should run from
    pub provision_agents: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([127, 0, 0, 1], 8080)),
            path: "/input".to_string(),
            zones: Zones::default(),
            policy: Policy::default(),
            staleness: DEFAULT_STALENESS,
            auto_reverse: true,
            ttl: 3600,
            liveness: Liveness::default(),
            provision_url: None,
            provision_agents: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `VAPORNS_LISTEN`: listen address (default: 127.0.0.1:8080)
    /// - `VAPORNS_PATH`: ingestion path prefix (default: "/input")
    /// - `VAPORNS_ZONES`: comma or space separated zones (default: all)
    /// - `VAPORNS_POLICY`: avg_ping_time, max_ping_time, min_packet_loss or all_up
    /// - `VAPORNS_STALENESS_SECS`: staleness horizon, 1 to 86400 (default: 60)
    /// - `VAPORNS_NO_REVERSE`: "1" or "true" disables reverse entries
    /// - `VAPORNS_TTL`: answer TTL, 1 to 65535 (default: 3600)
    /// - `VAPORNS_LIVENESS`: replied or always (default: replied)
    /// - `VAPORNS_PROVISION_URL`: provisioning webhook (default: none)
    /// - `VAPORNS_PROVISION_AGENTS`: comma separated agent ids
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(listen) = lookup("VAPORNS_LISTEN") {
            cfg.listen = listen.parse().map_err(|_| ConfigError::Invalid {
                key: "VAPORNS_LISTEN",
                value: listen.clone(),
                reason: "listen needs an address and port",
            })?;
        }

        if let Some(path) = lookup("VAPORNS_PATH") {
            if !path.starts_with('/') {
                return Err(ConfigError::Invalid {
                    key: "VAPORNS_PATH",
                    value: path,
                    reason: "path must start with '/'",
                });
            }
            cfg.path = path.trim_end_matches('/').to_string();
        }

        if let Some(zones) = lookup("VAPORNS_ZONES") {
            cfg.zones = Zones::new(split_list(&zones));
        }

        if let Some(policy) = lookup("VAPORNS_POLICY") {
            cfg.policy = policy.trim().parse()?;
        }

        if let Some(secs) = lookup("VAPORNS_STALENESS_SECS") {
            let parsed = secs
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|s| (1..=MAX_STALENESS_SECS).contains(s))
                .ok_or_else(|| ConfigError::Invalid {
                    key: "VAPORNS_STALENESS_SECS",
                    value: secs.clone(),
                    reason: "staleness must be between 1 and 86400 seconds",
                })?;
            cfg.staleness = Duration::from_secs(parsed);
        }

        if let Some(flag) = lookup("VAPORNS_NO_REVERSE") {
            cfg.auto_reverse = !matches!(flag.trim(), "1" | "true" | "yes");
        }

        if let Some(ttl) = lookup("VAPORNS_TTL") {
            cfg.ttl = ttl
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|t| (1..=65535).contains(t))
                .ok_or_else(|| ConfigError::Invalid {
                    key: "VAPORNS_TTL",
                    value: ttl.clone(),
                    reason: "ttl must be between 1 and 65535 seconds",
                })?;
        }

        if let Some(liveness) = lookup("VAPORNS_LIVENESS") {
            cfg.liveness = liveness.trim().parse()?;
        }

        cfg.provision_url = lookup("VAPORNS_PROVISION_URL").filter(|u| !u.trim().is_empty());

        if let Some(agents) = lookup("VAPORNS_PROVISION_AGENTS") {
            cfg.provision_agents = split_list(&agents).map(str::to_string).collect();
        }

        if let Some(url) = &cfg.provision_url {
            if cfg.provision_agents.is_empty() {
                return Err(ConfigError::Invalid {
                    key: "VAPORNS_PROVISION_AGENTS",
                    value: url.clone(),
                    reason: "provisioning needs at least one agent id",
                });
            }
        }

        Ok(cfg)
    }

    pub fn reconciler(&self) -> Reconciler {
        Reconciler::new(self.policy, self.staleness, self.liveness)
    }

    pub fn build_options(&self) -> BuildOptions {
        BuildOptions {
            zones: self.zones.clone(),
            auto_reverse: self.auto_reverse,
        }
    }

    /// Full route of the batch ingestion endpoint.
    pub fn batch_route(&self) -> String {
        format!("{}/batch", self.path)
    }
}

fn split_list(s: &str) -> impl Iterator<Item = &str> {
    s.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|part| !part.is_empty())
}
