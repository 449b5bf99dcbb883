//! Merchant lookup handlers

use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::{AppError, AppState};
use txenrich_core::models::Merchant;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: String,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub merchant: Option<Merchant>,
    pub confidence: f64,
    pub matched_by: &'static str,
}

/// GET /merchant/search?q= - Run the merchant matcher on free text
pub async fn search_merchant(
    State(state): State<Arc<AppState>>,
    query: Result<Query<SearchQuery>, QueryRejection>,
) -> Result<Json<SearchResponse>, AppError> {
    let Query(query) = query.map_err(|e| AppError::bad_request(&e.body_text()))?;
    if query.q.trim().is_empty() {
        return Err(AppError::bad_request("q must not be empty"));
    }

    let result = state.enricher.search_merchant(&query.q);

    Ok(Json(SearchResponse {
        query: query.q,
        confidence: result.confidence,
        matched_by: result.matched_by.as_str(),
        merchant: result.merchant,
    }))
}

/// GET /merchant/:guid - Stored merchant with its locations
pub async fn get_merchant(
    State(state): State<Arc<AppState>>,
    Path(guid): Path<String>,
) -> Result<Json<Merchant>, AppError> {
    state
        .enricher
        .get_merchant(&guid)?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Merchant not found"))
}
