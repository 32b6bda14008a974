//! Scoring policies used to pick a winner per hostname.

use crate::store::Measurement;

use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
#[error("invalid optimizing policy: {0}")]
pub struct UnknownPolicy(pub String);

/// How competing measurements for one hostname are ranked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Policy {
    /// Lowest average round trip time wins.
    #[default]
    #[serde(rename = "avg_ping_time")]
    LowestAvgPingTime,
    /// Lowest maximum round trip time wins.
    #[serde(rename = "max_ping_time")]
    LowestMaxPingTime,
    /// Lowest packet loss wins.
    #[serde(rename = "min_packet_loss")]
    MinPacketLoss,
    /// Never replaces; every live address is served.
    #[serde(rename = "all_up")]
    AllUp,
}

impl Policy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Policy::LowestAvgPingTime => "avg_ping_time",
            Policy::LowestMaxPingTime => "max_ping_time",
            Policy::MinPacketLoss => "min_packet_loss",
            Policy::AllUp => "all_up",
        }
    }

    /// Score of a measurement, lower is better. `None` for aggregating policies.
    pub fn score(&self, m: &Measurement) -> Option<f64> {
        match self {
            Policy::LowestAvgPingTime => Some(m.ping_avg),
            Policy::LowestMaxPingTime => Some(m.ping_max),
            Policy::MinPacketLoss => Some(m.loss_percent()),
            Policy::AllUp => None,
        }
    }

    /// True if `candidate` should replace `incumbent`. Ties keep the incumbent.
    pub fn prefers(&self, candidate: &Measurement, incumbent: &Measurement) -> bool {
        match (self.score(candidate), self.score(incumbent)) {
            (Some(new), Some(old)) => new < old,
            _ => false,
        }
    }

    pub fn aggregates(&self) -> bool {
        matches!(self, Policy::AllUp)
    }
}

impl FromStr for Policy {
    type Err = UnknownPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "avg_ping_time" => Ok(Policy::LowestAvgPingTime),
            "max_ping_time" => Ok(Policy::LowestMaxPingTime),
            "min_packet_loss" => Ok(Policy::MinPacketLoss),
            "all_up" => Ok(Policy::AllUp),
            other => Err(UnknownPolicy(other.to_string())),
        }
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probe(avg: f64, max: f64, sent: i64, lost: i64) -> Measurement {
        Measurement {
            ping_avg: avg,
            ping_max: max,
            ping_sent: sent,
            ping_lost: lost,
            ..Measurement::new("10.0.0.1".parse().unwrap(), "example.org")
        }
    }

    #[test]
    fn test_parse_policy() {
        for p in [
            Policy::LowestAvgPingTime,
            Policy::LowestMaxPingTime,
            Policy::MinPacketLoss,
            Policy::AllUp,
        ] {
            assert_eq!(p.as_str().parse::<Policy>(), Ok(p));
        }
        assert_eq!(
            "fastest".parse::<Policy>(),
            Err(UnknownPolicy("fastest".to_string()))
        );
    }

    #[test]
    fn test_lower_score_replaces() {
        let fast = probe(5.0, 30.0, 5, 1);
        let slow = probe(9.0, 10.0, 5, 0);

        assert!(Policy::LowestAvgPingTime.prefers(&fast, &slow));
        assert!(!Policy::LowestAvgPingTime.prefers(&slow, &fast));
        assert!(Policy::LowestMaxPingTime.prefers(&slow, &fast));
        assert!(Policy::MinPacketLoss.prefers(&slow, &fast));
    }

    #[test]
    fn test_ties_keep_incumbent() {
        let a = probe(5.0, 5.0, 5, 0);
        let b = probe(5.0, 5.0, 5, 0);
        assert!(!Policy::LowestAvgPingTime.prefers(&a, &b));
        assert!(!Policy::MinPacketLoss.prefers(&a, &b));
    }

    #[test]
    fn test_nan_never_replaces() {
        let nan = probe(f64::NAN, f64::NAN, 5, 0);
        let ok = probe(100.0, 100.0, 5, 0);
        assert!(!Policy::LowestAvgPingTime.prefers(&nan, &ok));
    }

    #[test]
    fn test_loss_sentinel_scores_worst() {
        let silent = probe(0.0, 0.0, 0, 0);
        let clean = probe(50.0, 50.0, 3, 0);
        let lossy = probe(50.0, 50.0, 3, 3);

        assert!(!Policy::MinPacketLoss.prefers(&silent, &clean));
        assert!(Policy::MinPacketLoss.prefers(&clean, &silent));
        // Even total loss beats nothing sent.
        assert!(Policy::MinPacketLoss.prefers(&lossy, &silent));
    }

    #[test]
    fn test_all_up_never_replaces() {
        let a = probe(1.0, 1.0, 5, 0);
        let b = probe(100.0, 100.0, 5, 5);
        assert!(!Policy::AllUp.prefers(&a, &b));
        assert!(Policy::AllUp.aggregates());
        assert_eq!(Policy::AllUp.score(&a), None);
    }
}
