use crate::{
    auth_handlers, customer_handlers, handlers, ledger_handlers, middleware, transaction_handlers,
    waste_handlers, AppState,
};
use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use http::HeaderValue;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if allowed_origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}

pub fn create_router(state: AppState) -> Router {
    crate::metrics::register_metrics();

    let public = Router::new()
        // Health and metrics
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics_handler))
        // Auth
        .route("/auth/register", post(auth_handlers::register))
        .route("/auth/login", post(auth_handlers::login))
        .route("/auth/refresh", post(auth_handlers::refresh))
        .route("/auth/logout", post(auth_handlers::logout));

    let protected = Router::new()
        // Customers
        .route(
            "/customers",
            get(customer_handlers::list_customers).post(customer_handlers::create_customer),
        )
        .route("/customers/names", get(customer_handlers::customer_names))
        .route("/customers/search", get(customer_handlers::search_customers))
        .route(
            "/customers/{id}",
            get(customer_handlers::get_customer)
                .put(customer_handlers::update_customer)
                .delete(customer_handlers::delete_customer),
        )
        // Waste catalog
        .route(
            "/wastetypes",
            get(waste_handlers::list_waste_types).post(waste_handlers::create_waste_type),
        )
        .route("/wastetypes/search", get(waste_handlers::search_waste_types))
        .route(
            "/wastetypes/{id}",
            get(waste_handlers::get_waste_type)
                .put(waste_handlers::update_waste_type)
                .delete(waste_handlers::delete_waste_type),
        )
        // Deposits and withdrawals
        .route("/transactions", get(transaction_handlers::list_transactions))
        .route("/transactions/deposit", post(transaction_handlers::create_deposit))
        .route("/transactions/withdraw", post(transaction_handlers::create_withdrawal))
        .route("/transactions/search", get(transaction_handlers::search_transactions))
        .route("/transactions/{id}", get(transaction_handlers::get_transaction))
        .route("/withdrawals", get(transaction_handlers::list_withdrawals))
        // Ledger and stock
        .route("/balances", get(ledger_handlers::list_balances))
        .route("/balances/{name}", get(ledger_handlers::get_balance))
        .route("/balances/{name}/history", get(ledger_handlers::balance_history))
        .route("/stock", get(ledger_handlers::list_stock))
        .route("/stock/remove", post(ledger_handlers::remove_stock))
        .route_layer(from_fn_with_state(state.clone(), middleware::require_auth));

    let cors = cors_layer(&state.settings.security.allowed_origins);

    public
        .merge(protected)
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(from_fn(middleware::record_metrics))
                .layer(from_fn(middleware::security_headers)),
        )
}
