//! Loyalty tier REST API endpoints.

use crate::rest::{ApiError, ErrorResponse};
use axum::extract::{Path, State};
use axum::Json;
use std::sync::Arc;
use tier_core::loyalty::*;
use tier_loyalty::LoyaltyService;
use tracing::info;
use uuid::Uuid;

/// Shared state for loyalty endpoints.
#[derive(Clone)]
pub struct LoyaltyState {
    pub service: Arc<LoyaltyService>,
}

/// POST /v1/loyalty/transactions — Fold a transaction into the customer's tier.
#[utoipa::path(
    post,
    path = "/v1/loyalty/transactions",
    tag = "Loyalty",
    request_body = TransactionEvent,
    responses(
        (status = 200, description = "Transaction processed", body = ProcessedTransaction),
        (status = 409, description = "Transaction already processed", body = ErrorResponse),
        (status = 422, description = "Transaction predates the customer's last one", body = ErrorResponse),
        (status = 500, description = "Reference data or processing failure", body = ErrorResponse),
    )
)]
pub async fn handle_transaction(
    State(state): State<LoyaltyState>,
    Json(event): Json<TransactionEvent>,
) -> Result<Json<ProcessedTransaction>, ApiError> {
    let result = state.service.process_transaction(event).await?;
    metrics::counter!("loyalty.api.transactions").increment(1);
    info!(
        customer_id = %result.customer_id,
        transaction_id = %result.transaction_id,
        tier = %result.tier,
        remark = %result.remark_text,
        "Loyalty transaction written"
    );
    Ok(Json(result))
}

/// GET /v1/loyalty/customers/:customer_id — Current tier and progress.
#[utoipa::path(
    get,
    path = "/v1/loyalty/customers/{customer_id}",
    tag = "Loyalty",
    params(("customer_id" = Uuid, Path, description = "Customer identifier")),
    responses(
        (status = 200, description = "Customer tier summary", body = CustomerSummary),
        (status = 500, description = "Reference data failure", body = ErrorResponse),
    )
)]
pub async fn handle_customer_summary(
    State(state): State<LoyaltyState>,
    Path(customer_id): Path<Uuid>,
) -> Result<Json<CustomerSummary>, ApiError> {
    let summary = state.service.customer_summary(customer_id)?;
    metrics::counter!("loyalty.api.summaries").increment(1);
    Ok(Json(summary))
}

/// GET /v1/loyalty/customers/:customer_id/history — Processed transactions, newest first.
#[utoipa::path(
    get,
    path = "/v1/loyalty/customers/{customer_id}/history",
    tag = "Loyalty",
    params(("customer_id" = Uuid, Path, description = "Customer identifier")),
    responses(
        (status = 200, description = "Transaction history", body = [HistoryRecord]),
    )
)]
pub async fn handle_customer_history(
    State(state): State<LoyaltyState>,
    Path(customer_id): Path<Uuid>,
) -> Result<Json<Vec<HistoryRecord>>, ApiError> {
    Ok(Json(state.service.customer_history(customer_id)?))
}

/// GET /v1/loyalty/tiers — Tier program with point checkpoints.
#[utoipa::path(
    get,
    path = "/v1/loyalty/tiers",
    tag = "Loyalty",
    responses(
        (status = 200, description = "Tiers ordered by level", body = [TierWithPoints]),
    )
)]
pub async fn handle_tiers(State(state): State<LoyaltyState>) -> Json<Vec<TierWithPoints>> {
    Json(state.service.tier_program())
}
