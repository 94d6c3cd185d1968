mod handlers;

use actix_web::dev::Server;
use actix_web::{web, App, HttpServer};
use std::sync::Arc;

use crate::config::ServerConfig;
use crate::metrics::{metrics_handler, Metrics};

pub use handlers::ApiState;

// ============================================================================
// HTTP surface
// ============================================================================
//
//   POST /api/orders/send          submit an order
//   POST /api/orders/send-random   submit a synthesized order
//   GET  /api/orders/stats         running aggregation
//   POST /api/orders/stats/reset   zero the aggregation
//   GET  /api/orders/health        liveness
//   GET  /metrics                  prometheus exposition
//
// ============================================================================

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/orders")
            .route("/send", web::post().to(handlers::send_order))
            .route("/send-random", web::post().to(handlers::send_random_order))
            .route("/stats", web::get().to(handlers::get_stats))
            .route("/stats/reset", web::post().to(handlers::reset_stats))
            .route("/health", web::get().to(handlers::health)),
    );
}

/// Bind the HTTP server. The returned future completes after a graceful stop
/// (SIGINT/SIGTERM are handled by actix-web).
pub fn start_http_server(
    config: &ServerConfig,
    state: web::Data<ApiState>,
    metrics: Arc<Metrics>,
) -> std::io::Result<Server> {
    tracing::info!("Starting HTTP server on http://{}:{}", config.host, config.port);

    let server = HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .app_data(web::Data::new(metrics.clone()))
            .configure(configure)
            .route("/metrics", web::get().to(metrics_handler))
    })
    .bind((config.host.as_str(), config.port))?
    .run();

    Ok(server)
}
