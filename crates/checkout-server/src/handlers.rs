//! HTTP Handlers

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, RawQuery, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use checkout_core::persistence::clear_add_on_selections;
use checkout_core::{CheckoutError, DealId, FieldErrors, PaymentMethod, SectionUpdate};
use checkout_payments::backend::AddressRequest;
use checkout_payments::{Authorization, CardCapture, OrderConfirmation, PaymentError, PreparedOrder};

use crate::session::{CheckoutSession, SessionSlot, SessionView};
use crate::state::AppState;

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub mock_backend: bool,
    pub open_sessions: usize,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,

    /// Per-field validation messages
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<FieldErrors>,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

#[derive(Debug, Deserialize)]
pub struct StepRequest {
    pub step: String,
}

#[derive(Debug, Deserialize)]
pub struct PayRequest {
    /// Card form result; absent for cheque payments
    #[serde(default)]
    pub card: Option<CardCapture>,
}

#[derive(Debug, Deserialize)]
pub struct WalletRequest {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct OrderQuery {
    pub deal_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub order_id: String,
    pub deal_id: Option<String>,
    pub message: &'static str,
}

// ============================================================================
// Error Mapping
// ============================================================================

fn error(status: StatusCode, code: &str, message: String) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message,
            code: code.into(),
            fields: None,
        }),
    )
}

fn checkout_error(e: CheckoutError) -> ApiError {
    let message = e.user_message();
    match e {
        CheckoutError::Validation(fields) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ErrorResponse {
                error: message,
                code: "VALIDATION_FAILED".into(),
                fields: Some(fields),
            }),
        ),
        CheckoutError::UnknownStep(_) => error(StatusCode::BAD_REQUEST, "UNKNOWN_STEP", message),
        CheckoutError::UnknownSection(_) => error(StatusCode::NOT_FOUND, "UNKNOWN_SECTION", e.to_string()),
        CheckoutError::InvalidSectionData { .. } => {
            error(StatusCode::UNPROCESSABLE_ENTITY, "INVALID_SECTION_DATA", e.to_string())
        }
        CheckoutError::NotSelectable(_) => error(StatusCode::CONFLICT, "NOT_SELECTABLE", message),
        CheckoutError::ZeroTotal => error(StatusCode::UNPROCESSABLE_ENTITY, "ZERO_TOTAL", message),
        CheckoutError::Persistence(_) | CheckoutError::Json(_) => {
            tracing::error!(error = %e, "Checkout state error");
            error(StatusCode::INTERNAL_SERVER_ERROR, "CHECKOUT_ERROR", message)
        }
    }
}

fn payment_error(e: PaymentError) -> ApiError {
    match e {
        PaymentError::Core(inner) => checkout_error(inner),
        PaymentError::DealNotFound(_) => error(StatusCode::NOT_FOUND, "DEAL_NOT_FOUND", e.user_message()),
        PaymentError::SubmissionInFlight => error(StatusCode::CONFLICT, "SUBMISSION_IN_FLIGHT", e.user_message()),
        PaymentError::Gateway(_) => error(StatusCode::PAYMENT_REQUIRED, "PAYMENT_DECLINED", e.user_message()),
        PaymentError::Backend { .. } => error(StatusCode::BAD_GATEWAY, "PAYMENT_FAILED", e.user_message()),
        PaymentError::MethodMismatch(_) => error(StatusCode::BAD_REQUEST, "METHOD_MISMATCH", e.user_message()),
        _ => {
            tracing::error!(error = %e, "Payment error");
            error(StatusCode::BAD_GATEWAY, "PAYMENT_ERROR", e.user_message())
        }
    }
}

fn no_session(deal_id: &DealId) -> ApiError {
    error(
        StatusCode::NOT_FOUND,
        "SESSION_NOT_FOUND",
        format!("No open checkout for deal {deal_id}"),
    )
}

/// The open slot and session for a deal
fn open_session(state: &AppState, deal_id: &DealId) -> Result<(Arc<SessionSlot>, Arc<Mutex<CheckoutSession>>), ApiError> {
    let slot = state.sessions.get(deal_id).ok_or_else(|| no_session(deal_id))?;
    let session = slot.session().ok_or_else(|| no_session(deal_id))?;
    Ok((slot, session))
}

async fn render(state: &AppState, slot: &SessionSlot, session: &Arc<Mutex<CheckoutSession>>) -> SessionView {
    let locked = session.lock().await;
    slot.refresh_wallet(state, session, &locked);
    locked.view(&state.engine, &slot.wallet, slot.guard.is_in_flight())
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        mock_backend: state.mock_backend,
        open_sessions: state.sessions.len(),
    })
}

/// Open (or resume) the checkout for a deal; a failed load ends the session
pub async fn open_checkout(
    State(state): State<AppState>,
    Path(deal_id): Path<String>,
    RawQuery(query): RawQuery,
) -> Result<Json<SessionView>, ApiError> {
    let deal_id = DealId::from_string(deal_id);
    let slot = state.sessions.slot(&deal_id);
    let session = match slot.open(&state, query.as_deref().unwrap_or_default()).await {
        Ok(session) => session,
        Err(e) => {
            state.sessions.remove(&deal_id);
            return Err(payment_error(e));
        }
    };

    Ok(Json(render(&state, &slot, &session).await))
}

/// Shallow-merge a partial update into one section
pub async fn update_section(
    State(state): State<AppState>,
    Path((deal_id, section)): Path<(String, String)>,
    Json(payload): Json<serde_json::Value>,
) -> Result<Json<SessionView>, ApiError> {
    let deal_id = DealId::from_string(deal_id);
    let (slot, session) = open_session(&state, &deal_id)?;

    let update = SectionUpdate::from_json(&section, payload).map_err(checkout_error)?;
    session
        .lock()
        .await
        .store
        .update_section(update)
        .map_err(checkout_error)?;

    Ok(Json(render(&state, &slot, &session).await))
}

/// Move to a named step
pub async fn go_to_step(
    State(state): State<AppState>,
    Path(deal_id): Path<String>,
    Json(payload): Json<StepRequest>,
) -> Result<Json<SessionView>, ApiError> {
    let deal_id = DealId::from_string(deal_id);
    let (slot, session) = open_session(&state, &deal_id)?;

    session
        .lock()
        .await
        .go_to_named(&payload.step)
        .map_err(checkout_error)?;

    Ok(Json(render(&state, &slot, &session).await))
}

/// Validate and save the shipping address, then continue to add-ons
pub async fn save_address(
    State(state): State<AppState>,
    Path(deal_id): Path<String>,
) -> Result<Json<SessionView>, ApiError> {
    let deal_id = DealId::from_string(deal_id);
    let (slot, session) = open_session(&state, &deal_id)?;

    let request = {
        let mut locked = session.lock().await;
        locked
            .store
            .validate_step(checkout_core::Step::Shipping)
            .map_err(checkout_error)?;
        AddressRequest {
            uuid: deal_id.to_string(),
            shipping: locked.store.state().shipping.clone(),
        }
    };

    let response = state.backend.save_address(&request).await.map_err(payment_error)?;
    if !response.success {
        let message = response
            .message
            .unwrap_or_else(|| "We couldn't save your address. Please try again.".into());
        return Err(error(StatusCode::BAD_GATEWAY, "ADDRESS_NOT_SAVED", message));
    }

    {
        let mut locked = session.lock().await;
        if let Some(next) = locked.flow.current().next() {
            locked.go_to(next);
        }
    }

    Ok(Json(render(&state, &slot, &session).await))
}

/// Submit a card or cheque payment
pub async fn pay(
    State(state): State<AppState>,
    Path(deal_id): Path<String>,
    Json(payload): Json<PayRequest>,
) -> Result<Json<OrderConfirmation>, ApiError> {
    let deal_id = DealId::from_string(deal_id);
    let (slot, session) = open_session(&state, &deal_id)?;

    let held = slot.guard.try_acquire().map_err(payment_error)?;

    let (order, authorization) = {
        let mut locked = session.lock().await;
        let order = PreparedOrder::from_store(&mut locked.store, &state.engine).map_err(payment_error)?;
        let authorization = match (order.method, payload.card) {
            (PaymentMethod::Check, _) => Authorization::Cheque,
            (PaymentMethod::Card, Some(card)) => Authorization::Card(card),
            (PaymentMethod::Card, None) => {
                return Err(error(
                    StatusCode::BAD_REQUEST,
                    "CARD_REQUIRED",
                    "Please enter your card details.".into(),
                ));
            }
            (PaymentMethod::Wallet, _) => {
                return Err(error(
                    StatusCode::BAD_REQUEST,
                    "USE_WALLET",
                    "Complete the payment with the wallet button.".into(),
                ));
            }
        };
        (order, authorization)
    };

    let confirmation = state
        .submitter
        .submit(held, order, authorization)
        .await
        .map_err(payment_error)?;

    Ok(Json(confirmation))
}

/// Wallet token delivery
pub async fn wallet_token(
    State(state): State<AppState>,
    Path(deal_id): Path<String>,
    Json(payload): Json<WalletRequest>,
) -> Result<Json<OrderConfirmation>, ApiError> {
    let deal_id = DealId::from_string(deal_id);
    let (slot, _) = open_session(&state, &deal_id)?;

    let confirmation = slot.wallet.deliver(payload.token).await.map_err(payment_error)?;
    Ok(Json(confirmation))
}

/// Unload beacon; ends the session so the next visit mounts afresh
pub async fn drop_off(State(state): State<AppState>, Path(deal_id): Path<String>) -> StatusCode {
    let deal_id = DealId::from_string(deal_id);
    if let Ok((slot, session)) = open_session(&state, &deal_id) {
        session.lock().await.flow.drop_off();
        // a running submission keeps its slot and guard
        if !slot.guard.is_in_flight() {
            state.sessions.remove(&deal_id);
        }
    }
    StatusCode::NO_CONTENT
}

/// Order confirmation; clears the deal's persisted add-on selections
pub async fn order_confirmation(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
    Query(query): Query<OrderQuery>,
) -> Json<OrderResponse> {
    if let Some(deal_id) = query.deal_id.as_deref().map(DealId::from_string) {
        if let Err(e) = clear_add_on_selections(state.selections.as_ref(), &deal_id) {
            tracing::warn!(deal_id = %deal_id, error = %e, "Failed to clear add-on selections");
        }
        state.sessions.remove(&deal_id);
    }

    Json(OrderResponse {
        order_id,
        deal_id: query.deal_id,
        message: "Thank you! Your order has been received.",
    })
}
