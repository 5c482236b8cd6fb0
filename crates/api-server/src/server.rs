//! API server: HTTP routes, Swagger UI and the metrics exporter.

use crate::loyalty_rest::{self, LoyaltyState};
use crate::rest::{self, AppState};
use crate::swagger::ApiDoc;
use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tier_core::config::AppConfig;
use tier_loyalty::LoyaltyService;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub struct ApiServer {
    config: AppConfig,
    service: Arc<LoyaltyService>,
}

impl ApiServer {
    pub fn new(config: AppConfig, service: Arc<LoyaltyService>) -> Self {
        Self { config, service }
    }

    /// All routes with middleware applied.
    pub fn router(&self) -> Router {
        let loyalty = Router::new()
            .route("/v1/loyalty/transactions", post(loyalty_rest::handle_transaction))
            .route(
                "/v1/loyalty/customers/:customer_id",
                get(loyalty_rest::handle_customer_summary),
            )
            .route(
                "/v1/loyalty/customers/:customer_id/history",
                get(loyalty_rest::handle_customer_history),
            )
            .route("/v1/loyalty/tiers", get(loyalty_rest::handle_tiers))
            .with_state(LoyaltyState {
                service: self.service.clone(),
            });

        let operations = Router::new()
            .route("/health", get(rest::health_check))
            .route("/ready", get(rest::readiness))
            .route("/live", get(rest::liveness))
            .with_state(AppState {
                node_id: self.config.node_id.clone(),
                start_time: Instant::now(),
            });

        Router::new()
            .merge(loyalty)
            .merge(operations)
            .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
            .layer(CompressionLayer::new())
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
    }

    /// Start the HTTP REST server.
    pub async fn start_http(&self) -> anyhow::Result<()> {
        let app = self.router();

        let addr = SocketAddr::new(self.config.api.host.parse()?, self.config.api.http_port);

        info!(addr = %addr, "Starting HTTP server");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }

    /// Start the metrics server on a separate port.
    pub fn start_metrics(&self) -> anyhow::Result<()> {
        if !self.config.metrics.enabled {
            info!("Metrics exporter disabled");
            return Ok(());
        }

        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(SocketAddr::new(
                self.config.api.host.parse()?,
                self.config.metrics.port,
            ))
            .install()?;

        info!(port = self.config.metrics.port, "Metrics exporter started");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tier_core::config::LoyaltyConfig;
    use tower::ServiceExt;
    use uuid::Uuid;

    fn router() -> Router {
        let service = LoyaltyService::from_config(&LoyaltyConfig::default()).unwrap();
        ApiServer::new(AppConfig::default(), Arc::new(service)).router()
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn post_transaction(body: &Value) -> Request<Body> {
        Request::post("/v1/loyalty/transactions")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_transaction_round() {
        let app = router();
        let customer_id = Uuid::new_v4();
        let body = json!({
            "customer_id": customer_id,
            "transaction_id": Uuid::new_v4(),
            "transaction_time": "2023-01-05T10:00:00Z",
        });

        let (status, result) = send(&app, post_transaction(&body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(result["tier"], "BRONZE");
        assert_eq!(result["total_trx"], 1);
        assert_eq!(result["point"], 0);
        assert_eq!(result["remark"], "FIRST_TRANSACTION");
        assert_eq!(result["status"], "enrolled");

        let (status, _) = send(&app, post_transaction(&body)).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let uri = format!("/v1/loyalty/customers/{customer_id}");
        let (status, summary) = send(&app, Request::get(uri).body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(summary["tier"], "BRONZE");
        assert_eq!(summary["total_trx"], 1);
        assert_eq!(summary["max_trx"], 7);

        let uri = format!("/v1/loyalty/customers/{customer_id}/history");
        let (status, history) = send(&app, Request::get(uri).body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(history.as_array().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn test_out_of_order_is_unprocessable() {
        let app = router();
        let customer_id = Uuid::new_v4();
        for (time, expected) in [
            ("2023-01-05T10:00:00Z", StatusCode::OK),
            ("2023-01-01T10:00:00Z", StatusCode::UNPROCESSABLE_ENTITY),
        ] {
            let body = json!({
                "customer_id": customer_id,
                "transaction_id": Uuid::new_v4(),
                "transaction_time": time,
            });
            let (status, _) = send(&app, post_transaction(&body)).await;
            assert_eq!(status, expected);
        }
    }

    #[tokio::test]
    async fn test_malformed_transaction_rejected() {
        let app = router();
        let body = json!({
            "customer_id": "not-a-uuid",
            "transaction_id": Uuid::new_v4(),
            "transaction_time": "yesterday",
        });
        let (status, _) = send(&app, post_transaction(&body)).await;
        assert!(status.is_client_error());
    }

    #[tokio::test]
    async fn test_tiers_and_health() {
        let app = router();

        let (status, tiers) =
            send(&app, Request::get("/v1/loyalty/tiers").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(tiers[0]["name"], "BRONZE");
        assert_eq!(tiers[2]["name"], "GOLD");
        assert_eq!(tiers[0]["points"][0]["at_trx"], 7);

        let (status, health) =
            send(&app, Request::get("/health").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(health["status"], "healthy");
    }
}
