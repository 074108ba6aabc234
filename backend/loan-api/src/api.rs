//! Axum REST API handlers.
//!
//! Each transition handler performs the same load → guard → validate →
//! save sequence. The state guard runs before the body is inspected so a
//! loan in the wrong state is always reported as such.

use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::errors::{LoanError, Result};
use crate::lifecycle;
use crate::loan::{Approval, Disbursement, LoanState};
use crate::roi;
use crate::store::LoanStore;

#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<dyn LoanStore>,
}

/// Build the application router with CORS and request tracing.
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/loans", post(create_loan))
        .route("/loans/:id", get(get_loan))
        .route("/loans/:id/approve", post(approve_loan))
        .route("/loans/:id/invest", post(invest_loan))
        .route("/loans/:id/disburse", post(disburse_loan))
        .route("/loans/:id/roi", get(get_loan_roi))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ─────────────────────────────────────────────────────────
// Request / response shapes
// ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLoanRequest {
    pub borrower_id: String,
    #[serde(rename = "principalAmount", with = "rust_decimal::serde::float")]
    pub principal: Decimal,
    /// Annual rate in percent.
    #[serde(with = "rust_decimal::serde::float")]
    pub rate: Decimal,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvestRequest {
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    #[serde(default)]
    pub investor_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoiQuery {
    pub as_of: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct RoiResponse {
    #[serde(rename = "loanId")]
    pub loan_id: i64,
    #[serde(rename = "ROI", with = "rust_decimal::serde::float")]
    pub roi: Decimal,
    #[serde(rename = "asOf")]
    pub as_of: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

fn bad_body(rejection: JsonRejection) -> LoanError {
    LoanError::Validation(rejection.body_text())
}

fn loan_id(path: std::result::Result<Path<i64>, PathRejection>) -> Result<i64> {
    path.map(|Path(id)| id)
        .map_err(|rejection| LoanError::Validation(rejection.body_text()))
}

// ─────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────

/// `GET /health`
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// `POST /loans`
pub async fn create_loan(
    State(state): State<Arc<ApiState>>,
    payload: std::result::Result<Json<CreateLoanRequest>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let Json(req) = payload.map_err(bad_body)?;
    let draft = lifecycle::propose(&req.borrower_id, req.principal, req.rate)?;
    let loan = state.store.create(draft).await?;

    info!(
        "Loan {} proposed for borrower {} ({} at {}%)",
        loan.id, loan.borrower_id, loan.principal, loan.rate
    );
    Ok((StatusCode::CREATED, Json(loan)))
}

/// `GET /loans/:id`
pub async fn get_loan(
    State(state): State<Arc<ApiState>>,
    path: std::result::Result<Path<i64>, PathRejection>,
) -> Result<impl IntoResponse> {
    let id = loan_id(path)?;
    let loan = state.store.find_by_id(id).await?;
    Ok(Json(loan))
}

/// `POST /loans/:id/approve`
pub async fn approve_loan(
    State(state): State<Arc<ApiState>>,
    path: std::result::Result<Path<i64>, PathRejection>,
    payload: std::result::Result<Json<Approval>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let id = loan_id(path)?;
    let mut loan = state.store.find_by_id(id).await?;
    loan.ensure_state(LoanState::Proposed)?;
    let Json(approval) = payload.map_err(bad_body)?;

    loan.approve(approval)?;
    let loan = state.store.save(&loan).await?;

    info!("Loan {id} approved");
    Ok(Json(loan))
}

/// `POST /loans/:id/invest`
pub async fn invest_loan(
    State(state): State<Arc<ApiState>>,
    path: std::result::Result<Path<i64>, PathRejection>,
    payload: std::result::Result<Json<InvestRequest>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let id = loan_id(path)?;
    let mut loan = state.store.find_by_id(id).await?;
    loan.ensure_state(LoanState::Approved)?;
    let Json(req) = payload.map_err(bad_body)?;

    loan.invest(req.amount, req.investor_id)?;
    let loan = state.store.save(&loan).await?;

    info!("Loan {id} invested ({} of {})", loan.invested_amount, loan.principal);
    Ok(Json(loan))
}

/// `POST /loans/:id/disburse`
pub async fn disburse_loan(
    State(state): State<Arc<ApiState>>,
    path: std::result::Result<Path<i64>, PathRejection>,
    payload: std::result::Result<Json<Disbursement>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let id = loan_id(path)?;
    let mut loan = state.store.find_by_id(id).await?;
    loan.ensure_state(LoanState::Invested)?;
    let Json(disbursement) = payload.map_err(bad_body)?;

    loan.disburse(disbursement)?;
    let loan = state.store.save(&loan).await?;

    info!("Loan {id} disbursed");
    Ok(Json(loan))
}

/// `GET /loans/:id/roi[?asOf=<RFC 3339>]`
pub async fn get_loan_roi(
    State(state): State<Arc<ApiState>>,
    path: std::result::Result<Path<i64>, PathRejection>,
    query: std::result::Result<Query<RoiQuery>, QueryRejection>,
) -> Result<impl IntoResponse> {
    let id = loan_id(path)?;
    let loan = state.store.find_by_id(id).await?;
    let Query(query) = query.map_err(|e| LoanError::Validation(e.body_text()))?;

    let as_of = query.as_of.unwrap_or_else(Utc::now);
    let roi = roi::compute_roi(&loan, as_of)?;

    Ok(Json(RoiResponse {
        loan_id: loan.id,
        roi,
        as_of,
    }))
}
