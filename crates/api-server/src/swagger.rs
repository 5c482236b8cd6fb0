//! OpenAPI specification and Swagger UI configuration.

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Loyalty Tier Service API",
        version = "0.1.0",
        description = "Keeps each customer's loyalty tier, transaction counter, and checkpoint points up to date as purchases arrive.",
        license(name = "MIT"),
    ),
    tags(
        (name = "Loyalty", description = "Tier transitions, customer standing, history, and the tier program"),
        (name = "Operations", description = "Health, readiness, and liveness probes"),
    ),
    paths(
        // Loyalty
        crate::loyalty_rest::handle_transaction,
        crate::loyalty_rest::handle_customer_summary,
        crate::loyalty_rest::handle_customer_history,
        crate::loyalty_rest::handle_tiers,
        // Operations
        crate::rest::health_check,
        crate::rest::readiness,
        crate::rest::liveness,
    ),
    components(schemas(
        tier_core::loyalty::TierName,
        tier_core::loyalty::Tier,
        tier_core::loyalty::PointScheduleEntry,
        tier_core::loyalty::TierWithPoints,
        tier_core::loyalty::TierRemark,
        tier_core::loyalty::TierStatus,
        tier_core::loyalty::TransactionEvent,
        tier_core::loyalty::ProcessedTransaction,
        tier_core::loyalty::CustomerSummary,
        tier_core::loyalty::HistoryRecord,
        crate::rest::ErrorResponse,
        crate::rest::HealthResponse,
    ))
)]
pub struct ApiDoc;
