//! Read side of the table: forward and reverse resolution against the
//! currently published generation.

use crate::probe::MissNotifier;
use crate::store::{normalize_name, Family, GenerationSource, Zones};

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::Arc;

/// Thread-safe lookup API. Cheap to clone.
#[derive(Clone)]
pub struct LookupService {
    source: Arc<dyn GenerationSource>,
    misses: Option<MissNotifier>,
    zones: Zones,
}

impl LookupService {
    pub fn new(source: Arc<dyn GenerationSource>) -> Self {
        Self {
            source,
            misses: None,
            zones: Zones::default(),
        }
    }

    /// Report forward misses for names inside `zones` to `notifier`.
    pub fn with_miss_notifier(mut self, notifier: MissNotifier, zones: Zones) -> Self {
        self.misses = Some(notifier);
        self.zones = zones;
        self
    }

    pub fn resolve_v4(&self, name: &str) -> Option<Vec<Ipv4Addr>> {
        let ips = self.forward(name, Family::V4)?;
        Some(
            ips.into_iter()
                .filter_map(|ip| match ip {
                    IpAddr::V4(v4) => Some(v4),
                    IpAddr::V6(_) => None,
                })
                .collect(),
        )
    }

    pub fn resolve_v6(&self, name: &str) -> Option<Vec<Ipv6Addr>> {
        let ips = self.forward(name, Family::V6)?;
        Some(
            ips.into_iter()
                .filter_map(|ip| match ip {
                    IpAddr::V6(v6) => Some(v6),
                    IpAddr::V4(_) => None,
                })
                .collect(),
        )
    }

    pub fn resolve_reverse(&self, addr: &str) -> Option<Vec<String>> {
        self.source.current()?.lookup_reverse(addr)
    }

    fn forward(&self, name: &str, family: Family) -> Option<Vec<IpAddr>> {
        let name = normalize_name(name);
        let answers = self
            .source
            .current()
            .and_then(|g| g.lookup_forward(&name, family));

        if answers.is_none() && self.zones.contains(&name) {
            if let Some(misses) = &self.misses {
                misses.notify(&name);
            }
        }
        answers
    }
}
