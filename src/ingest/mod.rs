//! Ingestion of measurement batches.
//!
//! The [`IngestionGateway`] owns the current winners and the published
//! generation. Batches are reconciled against a private copy of the winners
//! and only the final swap happens under the write lock.

mod policy;
mod reconcile;

pub use policy::*;
pub use reconcile::*;

use crate::store::{
    normalize_name, BuildOptions, Generation, GenerationSource, Measurement, WinnerMap,
};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;

/// Result of submitting one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Nothing changed; the previous generation stays published.
    Unchanged,
    /// A new generation was published.
    Published { serial: u64, entries: usize },
}

/// Point-in-time view of the gateway for status reporting.
#[derive(Debug, Clone, Serialize)]
pub struct GatewayStatus {
    pub entries: usize,
    pub generations: u64,
    pub last_update: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct Published {
    winners: Arc<WinnerMap>,
    generation: Option<Arc<Generation>>,
    serial: u64,
    updated_at: Option<DateTime<Utc>>,
}

/// Single entry point for measurement batches.
pub struct IngestionGateway {
    state: RwLock<Published>,
    reconciler: Reconciler,
    options: BuildOptions,
}

impl IngestionGateway {
    pub fn new(reconciler: Reconciler, options: BuildOptions) -> Self {
        Self {
            state: RwLock::new(Published::default()),
            reconciler,
            options,
        }
    }

    pub fn policy(&self) -> Policy {
        self.reconciler.policy
    }

    /// Reconcile and publish a batch received now.
    pub fn submit(&self, batch: Vec<Measurement>) -> SubmitOutcome {
        self.submit_at(batch, Utc::now())
    }

    /// Reconcile and publish a batch as of `now`.
    pub fn submit_at(&self, batch: Vec<Measurement>, now: DateTime<Utc>) -> SubmitOutcome {
        let received = batch.len();
        let current = self.state.read().winners.clone();

        let batch: Vec<_> = batch
            .into_iter()
            .filter(|m| self.options.zones.contains(&normalize_name(&m.host)))
            .collect();

        let Some(winners) = self.reconciler.reconcile(batch, (*current).clone(), now) else {
            tracing::debug!("Batch of {} records changed nothing", received);
            return SubmitOutcome::Unchanged;
        };

        let generation = Generation::build(&winners, &self.options);
        if generation.is_empty() {
            tracing::debug!("Batch of {} records built an empty table, keeping current", received);
            return SubmitOutcome::Unchanged;
        }
        let entries = generation.len();
        let hosts = winners.len();

        let serial = {
            let mut state = self.state.write();
            state.winners = Arc::new(winners);
            state.generation = Some(Arc::new(generation));
            state.serial += 1;
            state.updated_at = Some(now);
            state.serial
        };

        tracing::info!(
            "Published generation {} from {} records: {} hosts, {} entries",
            serial,
            received,
            hosts,
            entries
        );
        SubmitOutcome::Published { serial, entries }
    }

    /// Snapshot of the current winners.
    pub fn winners(&self) -> Arc<WinnerMap> {
        self.state.read().winners.clone()
    }

    pub fn status(&self) -> GatewayStatus {
        let state = self.state.read();
        GatewayStatus {
            entries: state.generation.as_ref().map_or(0, |g| g.len()),
            generations: state.serial,
            last_update: state.updated_at,
        }
    }
}

impl GenerationSource for IngestionGateway {
    fn current(&self) -> Option<Arc<Generation>> {
        self.state.read().generation.clone()
    }
}

/// Decode a batch record by record. Returns the measurements and the number
/// of records that could not be decoded.
pub fn decode_batch(records: Vec<serde_json::Value>) -> (Vec<Measurement>, usize) {
    let mut skipped = 0;
    let mut batch = Vec::with_capacity(records.len());

    for record in records {
        match serde_json::from_value::<Measurement>(record) {
            Ok(m) => batch.push(m),
            Err(e) => {
                tracing::warn!("Skipping malformed record: {}", e);
                skipped += 1;
            }
        }
    }

    (batch, skipped)
}
