//! HTTP request handlers.

use super::AppState;
use crate::ingest::{decode_batch, Policy, SubmitOutcome};
use crate::store::normalize_name;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::Ordering;

// ============================================================================
// Ingestion
// ============================================================================

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct BatchResponse {
    pub received: usize,
    pub skipped: usize,
    pub published: bool,
    pub entries: usize,
}

pub async fn handle_batch(State(state): State<AppState>, body: Bytes) -> impl IntoResponse {
    let records: Vec<serde_json::Value> = match serde_json::from_slice(&body) {
        Ok(records) => records,
        Err(e) => {
            state.errors.fetch_add(1, Ordering::Relaxed);
            tracing::warn!("Rejecting batch: {}", e);
            return (StatusCode::BAD_REQUEST, format!("invalid batch: {}", e)).into_response();
        }
    };

    let received = records.len();
    let (batch, skipped) = decode_batch(records);
    if skipped > 0 {
        tracing::warn!("Skipped {} of {} records in batch", skipped, received);
    }

    let (published, entries) = match state.gateway.submit(batch) {
        SubmitOutcome::Published { serial, entries } => {
            tracing::debug!("Batch published as generation {}", serial);
            (true, entries)
        }
        SubmitOutcome::Unchanged => (false, state.gateway.status().entries),
    };

    Json(BatchResponse {
        received,
        skipped,
        published,
        entries,
    })
    .into_response()
}

// ============================================================================
// Lookups
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ResolveQuery {
    pub name: String,
    #[serde(rename = "type", default = "default_record_type")]
    pub record_type: String,
}

fn default_record_type() -> String {
    "A".to_string()
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ResolveResponse {
    pub name: String,
    #[serde(rename = "type")]
    pub record_type: String,
    pub ttl: u32,
    pub answers: Vec<String>,
}

pub async fn handle_resolve(
    State(state): State<AppState>,
    Query(query): Query<ResolveQuery>,
) -> impl IntoResponse {
    let record_type = query.record_type.to_ascii_uppercase();
    let answers: Option<Vec<String>> = match record_type.as_str() {
        "A" => state
            .lookup
            .resolve_v4(&query.name)
            .map(|ips| ips.iter().map(ToString::to_string).collect()),
        "AAAA" => state
            .lookup
            .resolve_v6(&query.name)
            .map(|ips| ips.iter().map(ToString::to_string).collect()),
        _ => return (StatusCode::BAD_REQUEST, "Unsupported record type").into_response(),
    };

    match answers {
        Some(answers) => Json(ResolveResponse {
            name: normalize_name(&query.name),
            record_type,
            ttl: state.config.ttl,
            answers,
        })
        .into_response(),
        None => (StatusCode::NOT_FOUND, "Name not found").into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct ReverseQuery {
    pub addr: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ReverseResponse {
    pub addr: String,
    pub ttl: u32,
    pub names: Vec<String>,
}

pub async fn handle_reverse(
    State(state): State<AppState>,
    Query(query): Query<ReverseQuery>,
) -> impl IntoResponse {
    match state.lookup.resolve_reverse(&query.addr) {
        Some(names) => Json(ReverseResponse {
            addr: query.addr,
            ttl: state.config.ttl,
            names,
        })
        .into_response(),
        None => (StatusCode::NOT_FOUND, "Address not found").into_response(),
    }
}

// ============================================================================
// Status
// ============================================================================

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub policy: Policy,
    pub hosts: usize,
    pub entries: usize,
    pub generations: u64,
    pub last_update: Option<DateTime<Utc>>,
    pub errors: u64,
}

pub async fn handle_status(State(state): State<AppState>) -> impl IntoResponse {
    let status = state.gateway.status();

    Json(StatusResponse {
        policy: state.gateway.policy(),
        hosts: state.gateway.winners().len(),
        entries: status.entries,
        generations: status.generations,
        last_update: status.last_update,
        errors: state.errors.load(Ordering::Relaxed),
    })
}
