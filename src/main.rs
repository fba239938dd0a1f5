use axum::{
    extract::Extension,
    http::{header, Method},
    middleware as axum_middleware,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::net::SocketAddr;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod config;
mod db;
mod error;
mod models;
mod services;

#[tokio::main]
async fn main() {
    // Load configuration first (needed for log_level)
    let config = config::Config::from_env().expect("Failed to load configuration");

    // Initialize tracing with log_level from config
    let log_filter = format!("meat_erp_core={},tower_http=info", config.log_level);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Create database connection pool with configuration
    let db_pool = db::create_pool(
        &config.database_connection_string(),
        config.database_max_connections,
        config.database_min_connections,
        config.database_connection_timeout_secs,
    )
    .await
    .expect("Failed to create database connection pool");

    tracing::info!("Database connection pool created successfully");

    // Configure CORS with allowed origins from config
    // Note: Cannot use Any (wildcard) for headers when credentials are enabled
    let cors = CorsLayer::new()
        .allow_origin(
            config
                .cors_allowed_origins
                .iter()
                .map(|origin| origin.parse().expect("Invalid CORS origin"))
                .collect::<Vec<_>>(),
        )
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .allow_credentials(true);

    // Create middleware layer to inject Config into request extensions
    let config_clone = config.clone();
    let add_config = axum_middleware::from_fn(
        move |mut req: axum::http::Request<axum::body::Body>, next: axum::middleware::Next| {
            let config = config_clone.clone();
            async move {
                req.extensions_mut().insert(config);
                next.run(req).await
            }
        },
    );

    // All core command/read routes. No authentication layer: the core
    // trusts its callers and records the acting identity explicitly via
    // `performed_by` on every write (§1 Non-goals).
    let core_routes = Router::new()
        .route("/receiving", post(api::receiving::create_lot_endpoint))
        .route("/breakdown", post(api::breakdown::breakdown_endpoint))
        .route("/mixing", post(api::mixing::mix_endpoint))
        .route("/rework", post(api::rework::rework_endpoint))
        .route("/qa-checks", post(api::qa::qa_check_endpoint))
        .route("/aging/start", post(api::aging::start_aging_endpoint))
        .route("/aging/release", post(api::aging::release_aging_endpoint))
        .route(
            "/reservations",
            post(api::reservations::create_reservation_endpoint).get(
                api::reservations::list_reservations_endpoint,
            ),
        )
        .route(
            "/reservations/:id/cancel",
            post(api::reservations::cancel_reservation_endpoint),
        )
        .route("/sales", post(api::sales::create_sale_endpoint))
        .route(
            "/recall/:lotId/report",
            get(api::recall::recall_report_endpoint),
        )
        .route(
            "/recall/:lotId/quarantine-forward",
            post(api::recall::quarantine_forward_endpoint),
        )
        .route("/offline/submit", post(api::offline::submit_endpoint))
        .route("/offline/apply", post(api::offline::apply_endpoint))
        .route(
            "/offline/conflicts",
            get(api::offline::list_conflicts_endpoint),
        )
        .route(
            "/offline/:id/resolve",
            post(api::offline::resolve_endpoint),
        )
        .route("/lots/:lotId", get(api::reports::lot_detail_endpoint))
        .route("/reports/at-risk", get(api::reports::at_risk_endpoint))
        .route("/reports/stock", get(api::reports::stock_endpoint))
        .with_state(db_pool.clone());

    // Build application routes with middleware
    let mut app = Router::new()
        .route("/", get(health_check))
        .route("/api/health", get(health_check))
        .nest("/api", core_routes)
        .layer(add_config);

    // Conditionally add request logging based on config
    if config.enable_request_logging {
        app = app.layer(TraceLayer::new_for_http());
    }

    app = app.layer(cors);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app).await.expect("Server error");
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    app_name: String,
    version: String,
    company: String,
}

async fn health_check(Extension(config): Extension<config::Config>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK",
        app_name: config.app_name,
        version: config.app_version,
        company: config.company_name,
    })
}
