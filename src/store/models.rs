//! Measurement and winner model types.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::net::IpAddr;
use std::str::FromStr;
use thiserror::Error;

/// Loss value used when a probe sent no packets at all.
pub const MAX_LOSS: f64 = 110.0;

/// A single probe report as exported by a probing agent.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Measurement {
    #[serde(rename = "dst_addr")]
    pub ip: IpAddr,
    #[serde(rename = "test_name")]
    pub host: String,
    #[serde(rename = "ping_std_rtt", default)]
    pub ping_std: f64,
    #[serde(rename = "ping_max_rtt", default)]
    pub ping_max: f64,
    #[serde(rename = "ping_jit_rtt", default)]
    pub ping_jitter: f64,
    #[serde(rename = "ping_avg_rtt", default)]
    pub ping_avg: f64,
    #[serde(default)]
    pub test_id: i64,
    #[serde(default)]
    pub task_id: i64,
    #[serde(rename = "result_type_str", default)]
    pub result_type: String,
    #[serde(default)]
    pub agent_name: String,
    #[serde(rename = "fetch_status_|_ping_sent_|_trace_time", default)]
    pub ping_sent: i64,
    #[serde(rename = "fetch_ttlb_|_ping_lost", default)]
    pub ping_lost: i64,
}

impl Measurement {
    /// Create a measurement carrying only an address and a hostname.
    #[cfg(test)]
    pub fn new(ip: IpAddr, host: &str) -> Self {
        Self {
            ip,
            host: host.to_string(),
            ping_std: 0.0,
            ping_max: 0.0,
            ping_jitter: 0.0,
            ping_avg: 0.0,
            test_id: 0,
            task_id: 0,
            result_type: String::new(),
            agent_name: String::new(),
            ping_sent: 0,
            ping_lost: 0,
        }
    }

    /// Packet loss in percent, or [`MAX_LOSS`] when nothing was sent.
    pub fn loss_percent(&self) -> f64 {
        if self.ping_sent <= 0 {
            return MAX_LOSS;
        }
        let lost = self.ping_lost.clamp(0, self.ping_sent);
        (lost as f64 / self.ping_sent as f64) * 100.0
    }
}

/// Predicate deciding whether a measurement describes a reachable target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Liveness {
    /// At least one probe packet was answered.
    #[default]
    Replied,
    /// Every decodable measurement counts as live.
    Always,
}

#[derive(Error, Debug, PartialEq)]
#[error("invalid liveness rule: {0}")]
pub struct UnknownLiveness(pub String);

impl Liveness {
    pub fn is_live(&self, m: &Measurement) -> bool {
        match self {
            Liveness::Replied => m.ping_sent > 0 && m.ping_lost < m.ping_sent,
            Liveness::Always => true,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Liveness::Replied => "replied",
            Liveness::Always => "always",
        }
    }
}

impl FromStr for Liveness {
    type Err = UnknownLiveness;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "replied" => Ok(Liveness::Replied),
            "always" => Ok(Liveness::Always),
            other => Err(UnknownLiveness(other.to_string())),
        }
    }
}

/// The measurement currently retained as the answer for a hostname.
#[derive(Debug, Clone, PartialEq)]
pub struct Winner {
    pub measurement: Measurement,
    /// When this winner was last accepted.
    pub seen: DateTime<Utc>,
    /// Addresses served for the hostname, own address first.
    pub addresses: Vec<IpAddr>,
    /// Derived packet loss, refreshed by [`Winner::finalize`].
    pub packet_loss: f64,
}

impl Winner {
    pub fn new(measurement: Measurement, seen: DateTime<Utc>) -> Self {
        let addresses = vec![measurement.ip];
        let packet_loss = measurement.loss_percent();
        Self {
            measurement,
            seen,
            addresses,
            packet_loss,
        }
    }

    /// Add an address to the served set. Returns false if already present.
    pub fn merge_address(&mut self, ip: IpAddr) -> bool {
        if self.addresses.contains(&ip) {
            return false;
        }
        self.addresses.push(ip);
        true
    }

    pub fn is_stale(&self, cutoff: DateTime<Utc>) -> bool {
        self.seen < cutoff
    }

    /// Recompute derived fields.
    pub fn finalize(&mut self) {
        self.packet_loss = self.measurement.loss_percent();
    }
}

/// Winners keyed by normalized hostname.
pub type WinnerMap = BTreeMap<String, Winner>;
