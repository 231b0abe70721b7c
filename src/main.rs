//! Stockroom Server - Equipment Reservation System
//!
//! REST API server for laboratory equipment borrowing.

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stockroom_server::{
    api, config::AppConfig, repository::Repository, services::Services, AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load().expect("Failed to load configuration");

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("stockroom_server={},tower_http=debug", config.logging.level).into()
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Stockroom Server v{}", env!("CARGO_PKG_VERSION"));

    // Create database connection pool
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .connect(&config.database.url)
        .await
        .expect("Failed to connect to database");

    tracing::info!("Connected to database");

    // Run migrations
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run database migrations");

    tracing::info!("Database migrations completed");

    // Save server address before moving config
    let server_host = config.server.host.clone();
    let server_port = config.server.port;

    // Create repository and services
    let repository = Repository::new(pool);
    let services = Services::new(repository, &config);

    // Create application state
    let state = AppState {
        config: Arc::new(config),
        services: Arc::new(services),
    };

    // Build router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(
        server_host.parse().expect("Invalid host address"),
        server_port,
    );

    tracing::info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes
fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // API v1 routes
    let api_v1 = Router::new()
        // Health check
        .route("/health", get(api::health::health_check))
        .route("/ready", get(api::health::readiness_check))
        // Equipment
        .route("/equipment", get(api::equipment::list_equipment))
        .route("/equipment", post(api::equipment::create_equipment))
        .route("/equipment/:id", get(api::equipment::get_equipment))
        .route("/equipment/:id", put(api::equipment::update_equipment))
        .route("/equipment/:id", delete(api::equipment::delete_equipment))
        .route(
            "/equipment/:id/availability",
            get(api::equipment::check_availability),
        )
        .route(
            "/equipment/:id/unavailable-dates",
            get(api::equipment::unavailable_dates),
        )
        .route(
            "/equipment/:id/activity",
            get(api::equipment::get_activity_log),
        )
        .route("/equipment/:id/usage", get(api::equipment::get_usage))
        .route(
            "/equipment/:id/maintenance",
            post(api::equipment::add_maintenance_entry),
        )
        .route("/equipment/:id/notes", post(api::equipment::add_note))
        // Borrows
        .route("/borrows", post(api::borrows::create_borrow))
        .route("/borrows/sweep-overdue", post(api::borrows::sweep_overdue))
        .route("/borrows/:id", get(api::borrows::get_borrow))
        .route("/borrows/:id/approve", post(api::borrows::approve_borrow))
        .route("/borrows/:id/reject", post(api::borrows::reject_borrow))
        .route("/borrows/:id/cancel", post(api::borrows::cancel_borrow))
        .route("/borrows/:id/checkout", post(api::borrows::checkout_borrow))
        .route(
            "/borrows/:id/reject-approved",
            post(api::borrows::reject_approved_borrow),
        )
        .route(
            "/borrows/:id/request-return",
            post(api::borrows::request_return),
        )
        .route(
            "/borrows/:id/confirm-return",
            post(api::borrows::confirm_return),
        )
        .route(
            "/borrows/:id/deficiencies",
            get(api::borrows::list_deficiencies),
        )
        .route(
            "/borrows/:id/data-request",
            put(api::borrows::update_data_request),
        )
        // Borrow groups
        .route(
            "/borrow-groups/:group_id/:action",
            post(api::borrows::group_action),
        )
        // Deficiencies
        .route(
            "/deficiencies/:id/resolve",
            post(api::borrows::resolve_deficiency),
        )
        // Users
        .route("/users/:id/borrows", get(api::borrows::get_user_borrows))
        .route("/users/:id/dashboard", get(api::borrows::get_dashboard))
        .with_state(state.clone());

    // OpenAPI documentation
    let openapi = api::openapi::create_openapi_router();

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
