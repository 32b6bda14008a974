//! HTTP client asking an external provisioning service to create probes.

use super::ProbeError;

use serde::Serialize;
use std::net::IpAddr;
use std::time::Duration;

/// Request timeout for the provisioning webhook.
pub const PROVISION_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PingSettings {
    pub protocol: String,
    pub count: u32,
    /// Milliseconds between packets.
    pub delay: u32,
    /// Milliseconds.
    pub timeout: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceSettings {
    pub protocol: String,
    pub count: u32,
    /// Milliseconds.
    pub timeout: u32,
    pub limit: u32,
}

/// Probe test definition posted to the provisioning webhook.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub test_type: String,
    /// Seconds between test runs.
    pub period: u32,
    pub tasks: Vec<String>,
    pub ping: PingSettings,
    pub trace: TraceSettings,
    pub targets: Vec<String>,
    pub agent_ids: Vec<String>,
}

impl TestRequest {
    /// Build a ping test for `name` against its IPv4 addresses.
    ///
    /// Returns `None` when there is no IPv4 address to probe.
    pub fn for_host(name: &str, addrs: &[IpAddr], agent_ids: &[String]) -> Option<Self> {
        let targets: Vec<String> = addrs
            .iter()
            .map(|ip| ip.to_canonical())
            .filter(IpAddr::is_ipv4)
            .map(|ip| ip.to_string())
            .collect();
        if targets.is_empty() {
            return None;
        }

        Some(Self {
            name: name.trim_end_matches('.').to_string(),
            test_type: "ip".to_string(),
            period: 60,
            tasks: vec!["ping".to_string()],
            ping: PingSettings {
                protocol: "icmp".to_string(),
                count: 5,
                delay: 0,
                timeout: 1000,
            },
            trace: TraceSettings {
                protocol: "udp".to_string(),
                count: 3,
                timeout: 22500,
                limit: 20,
            },
            targets,
            agent_ids: agent_ids.to_vec(),
        })
    }
}

/// Client for the provisioning webhook.
#[derive(Clone)]
pub struct Provisioner {
    client: reqwest::Client,
    url: String,
    agent_ids: Vec<String>,
}

impl Provisioner {
    pub fn new(url: &str, agent_ids: Vec<String>) -> Result<Self, ProbeError> {
        let client = reqwest::Client::builder()
            .timeout(PROVISION_TIMEOUT)
            .build()
            .map_err(|e| ProbeError::Network(e.to_string()))?;

        Ok(Self {
            client,
            url: url.to_string(),
            agent_ids,
        })
    }

    /// Resolve `name` with the system resolver and request probes for it.
    pub async fn provision(&self, name: &str) -> Result<(), ProbeError> {
        let addrs = resolve_host(name).await?;
        let request = TestRequest::for_host(name, &addrs, &self.agent_ids)
            .ok_or_else(|| ProbeError::NoTargets(name.to_string()))?;

        tracing::info!("Creating probe test for {}", request.name);
        self.submit(&request).await
    }

    /// Post a test definition to the webhook.
    pub async fn submit(&self, request: &TestRequest) -> Result<(), ProbeError> {
        let response = self
            .client
            .post(&self.url)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProbeError::Timeout(PROVISION_TIMEOUT)
                } else {
                    ProbeError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProbeError::Rejected(status.as_u16()));
        }
        Ok(())
    }
}

async fn resolve_host(name: &str) -> Result<Vec<IpAddr>, ProbeError> {
    let host = name.trim_end_matches('.');
    let addrs = tokio::net::lookup_host((host, 0))
        .await
        .map_err(|e| ProbeError::Resolve(host.to_string(), e.to_string()))?;
    Ok(addrs.map(|sa| sa.ip()).collect())
}
