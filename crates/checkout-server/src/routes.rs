//! Router

use axum::{
    Router,
    routing::{get, patch, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::handlers::{
    drop_off, go_to_step, health_check, open_checkout, order_confirmation, pay, save_address, update_section,
    wallet_token,
};
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health
        .route("/health", get(health_check))

        // Checkout
        .route("/checkout/{deal_id}", get(open_checkout))
        .route("/checkout/{deal_id}/sections/{section}", patch(update_section))
        .route("/checkout/{deal_id}/step", post(go_to_step))
        .route("/checkout/{deal_id}/address", post(save_address))
        .route("/checkout/{deal_id}/drop-off", post(drop_off))

        // Payments
        .route("/checkout/{deal_id}/pay", post(pay))
        .route("/checkout/{deal_id}/wallet", post(wallet_token))
        .route("/orders/{order_id}", get(order_confirmation))

        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
