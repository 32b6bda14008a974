//! Immutable forward and reverse lookup indices.

use super::models::WinnerMap;
use super::zones::{normalize_name, Zones};

use std::collections::HashMap;
use std::net::IpAddr;

/// Address family selecting a forward index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    V4,
    V6,
}

impl Family {
    pub fn of(ip: &IpAddr) -> Self {
        match ip {
            IpAddr::V4(_) => Family::V4,
            IpAddr::V6(_) => Family::V6,
        }
    }
}

/// Options controlling which winners end up in a generation.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub zones: Zones,
    /// Generate address to hostname entries alongside forward ones.
    pub auto_reverse: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            zones: Zones::default(),
            auto_reverse: true,
        }
    }
}

/// One published snapshot of the lookup table. Never mutated after build.
#[derive(Debug, Default, PartialEq)]
pub struct Generation {
    // Keyed by normalized hostname.
    name4: HashMap<String, Vec<IpAddr>>,
    name6: HashMap<String, Vec<IpAddr>>,
    // Keyed by canonical address text.
    addr: HashMap<String, Vec<String>>,
}

impl Generation {
    /// Build a generation from a winners map.
    ///
    /// Winners outside the configured zones or without a usable address are
    /// left out.
    pub fn build(winners: &WinnerMap, options: &BuildOptions) -> Self {
        let mut generation = Self::default();

        for (name, winner) in winners {
            if !options.zones.contains(name) {
                continue;
            }

            for ip in &winner.addresses {
                let ip = ip.to_canonical();
                if ip.is_unspecified() {
                    continue;
                }

                let index = match Family::of(&ip) {
                    Family::V4 => &mut generation.name4,
                    Family::V6 => &mut generation.name6,
                };
                let addrs = index.entry(name.clone()).or_default();
                if addrs.contains(&ip) {
                    continue;
                }
                addrs.push(ip);

                if options.auto_reverse {
                    generation
                        .addr
                        .entry(ip.to_string())
                        .or_default()
                        .push(name.clone());
                }
            }
        }

        generation
    }

    /// Forward lookup. `None` means the name is not in the index.
    pub fn lookup_forward(&self, name: &str, family: Family) -> Option<Vec<IpAddr>> {
        let index = match family {
            Family::V4 => &self.name4,
            Family::V6 => &self.name6,
        };
        index.get(&normalize_name(name)).cloned()
    }

    /// Reverse lookup of a literal address.
    pub fn lookup_reverse(&self, addr: &str) -> Option<Vec<String>> {
        let ip: IpAddr = addr.trim().parse().ok()?;
        self.addr.get(&ip.to_canonical().to_string()).cloned()
    }

    /// Total number of entries across all indices.
    pub fn len(&self) -> usize {
        self.name4.values().map(Vec::len).sum::<usize>()
            + self.name6.values().map(Vec::len).sum::<usize>()
            + self.addr.values().map(Vec::len).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
