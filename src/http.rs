use actix_web::{http::StatusCode, web, App, HttpResponse, HttpServer, ResponseError};
use std::sync::Arc;

use crate::errors::OrderError;
use crate::gateway::IngestionGateway;
use crate::metrics::Metrics;
use crate::service::OrderService;

// ============================================================================
// HTTP Surface
// ============================================================================
//
//   GET  /order/{order_uid}  cache-first lookup
//   POST /save               validate and publish a submitted order
//   GET  /health             liveness
//   GET  /metrics            Prometheus scrape endpoint
//
// ============================================================================

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<OrderService>,
    pub gateway: Arc<IngestionGateway>,
    pub metrics: Arc<Metrics>,
}

impl ResponseError for OrderError {
    fn status_code(&self) -> StatusCode {
        match self {
            OrderError::Validation(_) => StatusCode::BAD_REQUEST,
            OrderError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "error": self.to_string(),
        }))
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/order/{order_uid}", web::get().to(get_order))
        .route("/save", web::post().to(save_order))
        .route("/save/", web::post().to(save_order))
        .route("/health", web::get().to(health_handler))
        .route("/metrics", web::get().to(metrics_handler));
}

/// Serve until the process receives SIGINT/SIGTERM.
pub async fn serve(state: AppState, host: &str, port: u16) -> std::io::Result<()> {
    tracing::info!("🌐 Starting HTTP server on http://{}:{}", host, port);

    let data = web::Data::new(state);

    HttpServer::new(move || App::new().app_data(data.clone()).configure(configure))
        .bind((host, port))?
        .run()
        .await
}

async fn get_order(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, OrderError> {
    let order = state.service.get_by_id(&path).await?;
    Ok(HttpResponse::Ok().json(order.as_ref()))
}

async fn save_order(state: web::Data<AppState>, body: web::Bytes) -> Result<HttpResponse, OrderError> {
    let order_uid = state.gateway.submit(&body).await?;
    Ok(HttpResponse::Created().json(serde_json::json!({
        "status": "accepted",
        "order_uid": order_uid,
    })))
}

async fn health_handler(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "order-service",
        "cached_orders": state.service.cache().len().await,
    }))
}

async fn metrics_handler(state: web::Data<AppState>) -> HttpResponse {
    match state.metrics.encode() {
        Ok(buffer) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(buffer),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            HttpResponse::InternalServerError().finish()
        }
    }
}
