//! Batch reconciliation: merges a batch of measurements with the retained
//! winners.
//!
//! Reconciliation runs in two passes. The admission pass walks the batch in
//! order, drops dead records and settles every hostname that has no winner
//! yet, or whose winner has gone stale, by taking the new record outright.
//! The scoring pass then lets the policy decide for the remaining records,
//! whose hostnames already have a fresh winner.

use super::policy::Policy;
use crate::store::{normalize_name, Liveness, Measurement, Winner, WinnerMap};

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::time::Duration;

/// Default age after which a winner is replaced regardless of score.
pub const DEFAULT_STALENESS: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct Reconciler {
    pub policy: Policy,
    pub staleness: ChronoDuration,
    pub liveness: Liveness,
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new(Policy::default(), DEFAULT_STALENESS, Liveness::default())
    }
}

impl Reconciler {
    pub fn new(policy: Policy, staleness: Duration, liveness: Liveness) -> Self {
        Self {
            policy,
            staleness: ChronoDuration::milliseconds(staleness.as_millis() as i64),
            liveness,
        }
    }

    /// Reconcile `batch` against `winners` at time `now`.
    ///
    /// Returns `None` when nothing changed or the result is empty; the caller
    /// keeps its previous state in that case.
    pub fn reconcile(
        &self,
        batch: Vec<Measurement>,
        mut winners: WinnerMap,
        now: DateTime<Utc>,
    ) -> Option<WinnerMap> {
        let received = batch.len();
        let cutoff = now - self.staleness;
        let mut changed = 0usize;
        let mut contested = Vec::with_capacity(batch.len());

        for mut m in batch {
            if m.host.trim().is_empty() || !self.liveness.is_live(&m) {
                continue;
            }
            m.ip = m.ip.to_canonical();
            let name = normalize_name(&m.host);

            match winners.get(&name).map(|w| w.is_stale(cutoff)) {
                Some(false) => contested.push((name, m)),
                Some(true) => {
                    tracing::debug!(
                        "Replacing stale winner for {} with report from {}",
                        name,
                        m.agent_name
                    );
                    winners.insert(name, Winner::new(m, now));
                    changed += 1;
                }
                None => {
                    winners.insert(name, Winner::new(m, now));
                    changed += 1;
                }
            }
        }

        for (name, m) in contested {
            let Some(winner) = winners.get_mut(&name) else {
                continue;
            };
            if self.policy.aggregates() {
                if winner.merge_address(m.ip) {
                    changed += 1;
                }
            } else if self.policy.prefers(&m, &winner.measurement) {
                *winner = Winner::new(m, now);
                changed += 1;
            }
        }

        for winner in winners.values_mut() {
            winner.finalize();
        }

        tracing::debug!(
            "Reconciled {} records into {} winners ({} changed) with policy {}",
            received,
            winners.len(),
            changed,
            self.policy
        );

        if changed == 0 || winners.is_empty() {
            return None;
        }
        Some(winners)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::IpAddr;

    fn probe(host: &str, ip: &str, avg: f64) -> Measurement {
        Measurement {
            ping_avg: avg,
            ping_max: avg * 2.0,
            ping_sent: 5,
            ping_lost: 0,
            ..Measurement::new(ip.parse().unwrap(), host)
        }
    }

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_best_average_wins_within_batch() {
        let r = Reconciler::default();
        let now = Utc::now();

        for batch in [
            vec![probe("example.org", "10.0.0.9", 9.0), probe("example.org", "10.0.0.5", 5.0)],
            vec![probe("example.org", "10.0.0.5", 5.0), probe("example.org", "10.0.0.9", 9.0)],
        ] {
            let winners = r.reconcile(batch, WinnerMap::new(), now).unwrap();
            let w = &winners["example.org."];
            assert_eq!(w.measurement.ping_avg, 5.0);
            assert_eq!(w.addresses, vec![ip("10.0.0.5")]);
        }
    }

    #[test]
    fn test_dead_records_dropped() {
        let r = Reconciler::default();
        let mut dead = probe("example.org", "10.0.0.1", 1.0);
        dead.ping_lost = dead.ping_sent;
        let blank = probe("  ", "10.0.0.2", 1.0);

        assert_eq!(r.reconcile(vec![dead, blank], WinnerMap::new(), Utc::now()), None);
    }

    #[test]
    fn test_empty_batch_is_no_change() {
        let r = Reconciler::default();
        let now = Utc::now();
        let winners = r
            .reconcile(vec![probe("a.test", "10.0.0.1", 3.0)], WinnerMap::new(), now)
            .unwrap();

        assert_eq!(r.reconcile(vec![], winners.clone(), now), None);
        assert_eq!(r.reconcile(vec![], WinnerMap::new(), now), None);
    }

    #[test]
    fn test_worse_fresh_record_is_no_change() {
        let r = Reconciler::default();
        let t0 = Utc::now();
        let winners = r
            .reconcile(vec![probe("a.test", "10.0.0.1", 3.0)], WinnerMap::new(), t0)
            .unwrap();

        let later = t0 + ChronoDuration::seconds(10);
        assert_eq!(
            r.reconcile(vec![probe("a.test", "10.0.0.2", 30.0)], winners, later),
            None
        );
    }

    #[test]
    fn test_carry_forward() {
        let r = Reconciler::default();
        let t0 = Utc::now();
        let winners = r
            .reconcile(
                vec![probe("a.test", "10.0.0.1", 3.0), probe("b.test", "10.0.0.2", 4.0)],
                WinnerMap::new(),
                t0,
            )
            .unwrap();

        // Far beyond the horizon, unmentioned hosts are still retained.
        let later = t0 + ChronoDuration::hours(2);
        let next = r
            .reconcile(vec![probe("c.test", "10.0.0.3", 5.0)], winners.clone(), later)
            .unwrap();
        assert_eq!(next.len(), 3);
        assert_eq!(next["a.test."], winners["a.test."]);
        assert_eq!(next["b.test."], winners["b.test."]);
    }

    #[test]
    fn test_stale_winner_replaced_by_worse_record() {
        let r = Reconciler::default();
        let t0 = Utc::now();
        let winners = r
            .reconcile(vec![probe("x", "10.0.0.1", 1.0)], WinnerMap::new(), t0)
            .unwrap();

        let t1 = t0 + ChronoDuration::seconds(61);
        let next = r
            .reconcile(vec![probe("x", "10.0.0.2", 50.0)], winners, t1)
            .unwrap();
        let w = &next["x."];
        assert_eq!(w.measurement.ping_avg, 50.0);
        assert_eq!(w.seen, t1);
        assert_eq!(w.addresses, vec![ip("10.0.0.2")]);
    }

    #[test]
    fn test_not_yet_stale_keeps_better_winner() {
        let r = Reconciler::default();
        let t0 = Utc::now();
        let winners = r
            .reconcile(vec![probe("x", "10.0.0.1", 1.0)], WinnerMap::new(), t0)
            .unwrap();

        // Exactly at the horizon is not yet stale.
        let t1 = t0 + ChronoDuration::seconds(60);
        assert_eq!(r.reconcile(vec![probe("x", "10.0.0.2", 50.0)], winners, t1), None);
    }

    #[test]
    fn test_stale_replacement_then_scoring_in_same_batch() {
        let r = Reconciler::default();
        let t0 = Utc::now();
        let winners = r
            .reconcile(vec![probe("x", "10.0.0.1", 1.0)], WinnerMap::new(), t0)
            .unwrap();

        let t1 = t0 + ChronoDuration::minutes(5);
        let next = r
            .reconcile(
                vec![probe("x", "10.0.0.2", 50.0), probe("x", "10.0.0.3", 20.0)],
                winners,
                t1,
            )
            .unwrap();
        assert_eq!(next["x."].measurement.ping_avg, 20.0);
    }

    #[test]
    fn test_all_up_accumulates_addresses() {
        let r = Reconciler::new(Policy::AllUp, DEFAULT_STALENESS, Liveness::Replied);
        let now = Utc::now();
        let winners = r
            .reconcile(
                vec![
                    probe("y", "10.0.0.1", 1.0),
                    probe("y", "2001:db8::1", 80.0),
                    probe("y", "10.0.0.1", 2.0),
                ],
                WinnerMap::new(),
                now,
            )
            .unwrap();

        let w = &winners["y."];
        assert_eq!(w.measurement.ping_avg, 1.0);
        assert_eq!(w.addresses, vec![ip("10.0.0.1"), ip("2001:db8::1")]);

        // A known address adds nothing.
        assert_eq!(r.reconcile(vec![probe("y", "10.0.0.1", 9.0)], winners, now), None);
    }

    #[test]
    fn test_mapped_address_canonicalized() {
        let r = Reconciler::default();
        let winners = r
            .reconcile(
                vec![probe("example.com", "::ffff:10.0.0.2", 1.0)],
                WinnerMap::new(),
                Utc::now(),
            )
            .unwrap();
        assert_eq!(winners["example.com."].measurement.ip, ip("10.0.0.2"));
    }

    #[test]
    fn test_hostnames_normalized() {
        let r = Reconciler::default();
        let winners = r
            .reconcile(
                vec![probe("Example.ORG", "10.0.0.1", 4.0), probe("example.org.", "10.0.0.2", 2.0)],
                WinnerMap::new(),
                Utc::now(),
            )
            .unwrap();
        assert_eq!(winners.len(), 1);
        assert_eq!(winners["example.org."].measurement.ip, ip("10.0.0.2"));
    }

    #[test]
    fn test_min_packet_loss_ignores_silent_probe() {
        let r = Reconciler::new(Policy::MinPacketLoss, DEFAULT_STALENESS, Liveness::Always);
        let now = Utc::now();
        let mut clean = probe("z", "10.0.0.1", 9.0);
        clean.ping_sent = 4;
        let mut silent = probe("z", "10.0.0.2", 1.0);
        silent.ping_sent = 0;

        for batch in [vec![clean.clone(), silent.clone()], vec![silent, clean]] {
            let winners = r.reconcile(batch, WinnerMap::new(), now).unwrap();
            assert_eq!(winners["z."].measurement.ip, ip("10.0.0.1"));
            assert_eq!(winners["z."].packet_loss, 0.0);
        }
    }

    #[test]
    fn test_retained_average_is_minimum() {
        let r = Reconciler::default();
        let avgs = [7.5, 3.25, 11.0, 3.25, 9.0, 4.0];
        let batch: Vec<_> = avgs
            .iter()
            .enumerate()
            .map(|(i, avg)| probe("m.test", &format!("10.0.1.{}", i + 1), *avg))
            .collect();

        let winners = r.reconcile(batch, WinnerMap::new(), Utc::now()).unwrap();
        let w = &winners["m.test."];
        assert!(avgs.iter().all(|a| w.measurement.ping_avg <= *a));
        // First of the tied records is kept.
        assert_eq!(w.measurement.ip, ip("10.0.1.2"));
    }
}
