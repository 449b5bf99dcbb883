//! Enrichment handlers

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{AppError, AppState};
use txenrich_core::models::{EnrichedTransaction, HistoryEntry, RawTransaction};

/// Body for POST /enrich
#[derive(Debug, Deserialize)]
pub struct EnrichRequest {
    pub transaction: RawTransaction,
    /// Overrides the transaction's own account for history purposes
    #[serde(default)]
    pub account_guid: Option<String>,
    /// When present, used instead of the stored history
    #[serde(default)]
    pub history: Option<Vec<HistoryEntry>>,
}

#[derive(Debug, Serialize)]
pub struct EnrichResponse {
    pub transaction: EnrichedTransaction,
    pub processing_time_ms: f64,
}

/// Body for POST /enrich/batch
#[derive(Debug, Deserialize)]
pub struct BatchEnrichRequest {
    pub transactions: Vec<RawTransaction>,
    #[serde(default)]
    pub account_guid: Option<String>,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

#[derive(Debug, Serialize)]
pub struct BatchEnrichResponse {
    pub transactions: Vec<EnrichedTransaction>,
    pub processing_time_ms: f64,
    pub count: usize,
}

fn account_override(account_guid: Option<String>) -> Result<Option<String>, AppError> {
    match account_guid {
        Some(a) if a.trim().is_empty() => Err(AppError::bad_request("account_guid must not be empty")),
        other => Ok(other),
    }
}

/// POST /enrich - Enrich one transaction and queue its history append
pub async fn enrich(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<EnrichRequest>, JsonRejection>,
) -> Result<Json<EnrichResponse>, AppError> {
    let started = Instant::now();
    let Json(request) = payload?;
    let account_guid = account_override(request.account_guid)?;

    let transaction = state
        .enricher
        .enrich(request.transaction, account_guid, request.history)
        .await?;

    Ok(Json(EnrichResponse {
        transaction,
        processing_time_ms: started.elapsed().as_secs_f64() * 1000.0,
    }))
}

/// POST /enrich/batch - Enrich a list in parallel; results keep input order
pub async fn enrich_batch(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<BatchEnrichRequest>, JsonRejection>,
) -> Result<Json<BatchEnrichResponse>, AppError> {
    let started = Instant::now();
    let Json(request) = payload?;
    let account_guid = account_override(request.account_guid)?;

    let transactions = state
        .enricher
        .enrich_batch(request.transactions, account_guid, request.history)
        .await?;

    let count = transactions.len();
    debug!(count, "Batch request complete");

    Ok(Json(BatchEnrichResponse {
        transactions,
        processing_time_ms: started.elapsed().as_secs_f64() * 1000.0,
        count,
    }))
}
