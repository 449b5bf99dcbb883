//! Subscription handlers

use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::{AppError, AppState};
use txenrich_core::models::RecurringPattern;

/// Query params identifying the account
#[derive(Debug, Deserialize)]
pub struct AccountQuery {
    pub account_guid: String,
}

fn account_from(query: Result<Query<AccountQuery>, QueryRejection>) -> Result<String, AppError> {
    let Query(query) = query.map_err(|e| AppError::bad_request(&e.body_text()))?;
    if query.account_guid.trim().is_empty() {
        return Err(AppError::bad_request("account_guid must not be empty"));
    }
    Ok(query.account_guid)
}

#[derive(Debug, Serialize)]
pub struct SubscriptionsResponse {
    pub subscriptions: Vec<RecurringPattern>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// GET /subscriptions?account_guid= - Active subscriptions for an account
pub async fn list_subscriptions(
    State(state): State<Arc<AppState>>,
    query: Result<Query<AccountQuery>, QueryRejection>,
) -> Result<Json<SubscriptionsResponse>, AppError> {
    let account_guid = account_from(query)?;
    let subscriptions = state.enricher.list_subscriptions(&account_guid);

    let message = subscriptions
        .is_empty()
        .then(|| "No recurring subscriptions detected in this account's history".to_string());

    Ok(Json(SubscriptionsResponse {
        subscriptions,
        message,
    }))
}

/// Response for cancelling a subscription
#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub success: bool,
    pub id: String,
}

/// DELETE /subscriptions/:id?account_guid= - Stop tracking a pattern
pub async fn cancel_subscription(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    query: Result<Query<AccountQuery>, QueryRejection>,
) -> Result<Json<CancelResponse>, AppError> {
    let account_guid = account_from(query)?;

    if !state.enricher.cancel_subscription(&account_guid, &id)? {
        return Err(AppError::not_found("Subscription not found"));
    }

    Ok(Json(CancelResponse { success: true, id }))
}
