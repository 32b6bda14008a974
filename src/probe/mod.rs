//! Probe provisioning for hostnames that missed lookup.
//!
//! Forward lookup misses are reported through a [`MissNotifier`]. Each name is
//! reported once per process; the background handler then asks the
//! provisioning webhook, if one is configured, to start probing it.

mod http;

pub use http::*;

use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};

/// Pending miss events held before new ones are dropped.
pub const MISS_QUEUE_DEPTH: usize = 1000;

/// Probe provisioning error types.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("provisioning timed out after {0:?}")]
    Timeout(Duration),
    #[error("network error: {0}")]
    Network(String),
    #[error("could not resolve {0}: {1}")]
    Resolve(String, String),
    #[error("no usable targets for {0}")]
    NoTargets(String),
    #[error("provisioning rejected with status {0}")]
    Rejected(u16),
}

/// Fire-and-forget sink for names that missed forward lookup.
#[derive(Clone)]
pub struct MissNotifier {
    // Never pruned; bounded by the in-zone names clients ask for.
    seen: Arc<Mutex<HashSet<String>>>,
    tx: mpsc::Sender<String>,
}

impl MissNotifier {
    /// Create a notifier and the receiving end for [`run_miss_handler`].
    pub fn channel() -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(MISS_QUEUE_DEPTH);
        let notifier = Self {
            seen: Arc::new(Mutex::new(HashSet::new())),
            tx,
        };
        (notifier, rx)
    }

    /// Report a missed name. Never blocks.
    pub fn notify(&self, name: &str) {
        if !self.seen.lock().insert(name.to_string()) {
            return;
        }

        match self.tx.try_send(name.to_string()) {
            Ok(()) => {}
            Err(TrySendError::Full(name)) => {
                tracing::warn!("Miss queue full, dropping {}", name);
                // Allow a later miss to retry.
                self.seen.lock().remove(&name);
            }
            Err(TrySendError::Closed(name)) => {
                tracing::debug!("Miss handler gone, ignoring {}", name);
            }
        }
    }
}

/// Consume missed names until every notifier is dropped.
pub async fn run_miss_handler(mut rx: mpsc::Receiver<String>, provisioner: Option<Provisioner>) {
    tracing::info!("Starting miss handler");

    while let Some(name) = rx.recv().await {
        let Some(provisioner) = provisioner.clone() else {
            tracing::debug!("No provisioner configured, ignoring miss for {}", name);
            continue;
        };

        tokio::spawn(async move {
            match provisioner.provision(&name).await {
                Ok(()) => tracing::info!("Requested probes for {}", name),
                Err(e) => tracing::error!("Cannot provision probes for {}: {}", name, e),
            }
        });
    }

    tracing::info!("Miss handler stopped");
}
