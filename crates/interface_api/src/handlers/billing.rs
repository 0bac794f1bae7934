//! Billing handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;

use core_kernel::{ClientId, InvoiceId, PaymentRequestId, Store};
use domain_billing::{BillingPeriod, BillingRunReport, BillingTx, Invoice, PaymentRequest};
use domain_booking::Booking;

use crate::dto::billing::{
    InvoiceQuery, ManualInvoiceRequest, OverdueRequest, OverdueResponse, PaymentRequestQuery, PeriodRequest,
    RecordPaymentRequest,
};
use crate::dto::bookings::DateRangeQuery;
use crate::error::ApiError;
use crate::extract::ValidatedJson;
use crate::AppState;

/// Billing window for a calendar month under the configured billing day
pub async fn get_period<S>(
    State(state): State<AppState<S>>,
    Path((year, month)): Path<(i32, u32)>,
) -> Result<Json<BillingPeriod>, ApiError>
where
    S: Store,
    S::Tx: BillingTx,
{
    Ok(Json(state.billing.billing_period(year, month)?))
}

/// Sessions in the range that would be billed, without issuing anything
pub async fn unbilled_sessions<S>(
    State(state): State<AppState<S>>,
    Path(client_id): Path<ClientId>,
    Query(query): Query<DateRangeQuery>,
) -> Result<Json<Vec<Booking>>, ApiError>
where
    S: Store,
    S::Tx: BillingTx,
{
    Ok(Json(state.billing.sweep_unbilled(client_id, query.into_range()?).await?))
}

/// Issues one client's payment requests for a period
pub async fn generate_for_client<S>(
    State(state): State<AppState<S>>,
    Path(client_id): Path<ClientId>,
    ValidatedJson(request): ValidatedJson<PeriodRequest>,
) -> Result<(StatusCode, Json<Vec<PaymentRequest>>), ApiError>
where
    S: Store,
    S::Tx: BillingTx,
{
    let period = state.billing.billing_period(request.year, request.month)?;
    let issued = state.billing.generate_for_client(client_id, &period).await?;
    Ok((StatusCode::CREATED, Json(issued)))
}

/// Runs billing for every postpaid client
pub async fn run_period<S>(
    State(state): State<AppState<S>>,
    ValidatedJson(request): ValidatedJson<PeriodRequest>,
) -> Result<Json<BillingRunReport>, ApiError>
where
    S: Store,
    S::Tx: BillingTx,
{
    Ok(Json(state.billing.generate_for_period(request.year, request.month).await?))
}

pub async fn mark_overdue<S>(
    State(state): State<AppState<S>>,
    ValidatedJson(request): ValidatedJson<OverdueRequest>,
) -> Result<Json<OverdueResponse>, ApiError>
where
    S: Store,
    S::Tx: BillingTx,
{
    let as_of = request.as_of.unwrap_or_else(|| state.practice_today());
    let marked = state.billing.mark_overdue(as_of).await?;
    Ok(Json(OverdueResponse { marked }))
}

pub async fn list_payment_requests<S>(
    State(state): State<AppState<S>>,
    Query(query): Query<PaymentRequestQuery>,
) -> Result<Json<Vec<PaymentRequest>>, ApiError>
where
    S: Store,
    S::Tx: BillingTx,
{
    Ok(Json(state.billing.list_payment_requests(query.into()).await?))
}

pub async fn get_payment_request<S>(
    State(state): State<AppState<S>>,
    Path(id): Path<PaymentRequestId>,
) -> Result<Json<PaymentRequest>, ApiError>
where
    S: Store,
    S::Tx: BillingTx,
{
    Ok(Json(state.billing.get_payment_request(id).await?))
}

/// Marks a payment request paid and issues its invoice
pub async fn record_payment<S>(
    State(state): State<AppState<S>>,
    Path(id): Path<PaymentRequestId>,
    ValidatedJson(request): ValidatedJson<RecordPaymentRequest>,
) -> Result<(StatusCode, Json<Invoice>), ApiError>
where
    S: Store,
    S::Tx: BillingTx,
{
    let paid_at = request.paid_at.unwrap_or_else(Utc::now);
    let invoice = state.billing.record_payment(id, request.reference, paid_at).await?;
    Ok((StatusCode::CREATED, Json(invoice)))
}

pub async fn void_payment_request<S>(
    State(state): State<AppState<S>>,
    Path(id): Path<PaymentRequestId>,
) -> Result<Json<PaymentRequest>, ApiError>
where
    S: Store,
    S::Tx: BillingTx,
{
    Ok(Json(state.billing.void_payment_request(id).await?))
}

pub async fn list_invoices<S>(
    State(state): State<AppState<S>>,
    Query(query): Query<InvoiceQuery>,
) -> Result<Json<Vec<Invoice>>, ApiError>
where
    S: Store,
    S::Tx: BillingTx,
{
    Ok(Json(state.billing.list_invoices(query.client_id).await?))
}

pub async fn get_invoice<S>(
    State(state): State<AppState<S>>,
    Path(id): Path<InvoiceId>,
) -> Result<Json<Invoice>, ApiError>
where
    S: Store,
    S::Tx: BillingTx,
{
    Ok(Json(state.billing.get_invoice(id).await?))
}

/// Invoices sessions directly, skipping the payment request
pub async fn create_manual_invoice<S>(
    State(state): State<AppState<S>>,
    ValidatedJson(request): ValidatedJson<ManualInvoiceRequest>,
) -> Result<(StatusCode, Json<Invoice>), ApiError>
where
    S: Store,
    S::Tx: BillingTx,
{
    let invoice = state
        .billing
        .create_manual_invoice(request.client_id, &request.booking_ids, request.reference)
        .await?;
    Ok((StatusCode::CREATED, Json(invoice)))
}

pub async fn void_invoice<S>(
    State(state): State<AppState<S>>,
    Path(id): Path<InvoiceId>,
) -> Result<Json<Invoice>, ApiError>
where
    S: Store,
    S::Tx: BillingTx,
{
    Ok(Json(state.billing.void_invoice(id).await?))
}
