//! Booking handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::Utc;

use core_kernel::{BookingId, ClientId, SeriesId, Store};
use domain_billing::BillingTx;
use domain_booking::{Booking, SeriesCancellation, SeriesResult};

use crate::auth::{Capability, Claims};
use crate::dto::bookings::{
    CancelRequest, CancelSeriesRequest, CreateBookingRequest, DateRangeQuery, RecurringBookingRequest, SlotRequest,
};
use crate::error::ApiError;
use crate::extract::ValidatedJson;
use crate::AppState;

/// Books one session
pub async fn create_booking<S>(
    State(state): State<AppState<S>>,
    ValidatedJson(request): ValidatedJson<CreateBookingRequest>,
) -> Result<(StatusCode, Json<Booking>), ApiError>
where
    S: Store,
    S::Tx: BillingTx,
{
    let booking = state.scheduler.create_single(request.into_new_booking()?).await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

/// Books a recurring series; occurrences that cannot be booked are reported, not fatal
pub async fn create_series<S>(
    State(state): State<AppState<S>>,
    ValidatedJson(request): ValidatedJson<RecurringBookingRequest>,
) -> Result<(StatusCode, Json<SeriesResult>), ApiError>
where
    S: Store,
    S::Tx: BillingTx,
{
    let result = state.scheduler.create_recurring_series(request.into()).await?;
    Ok((StatusCode::CREATED, Json(result)))
}

pub async fn get_booking<S>(
    State(state): State<AppState<S>>,
    Path(booking_id): Path<BookingId>,
) -> Result<Json<Booking>, ApiError>
where
    S: Store,
    S::Tx: BillingTx,
{
    Ok(Json(state.scheduler.get_booking(booking_id).await?))
}

pub async fn reschedule<S>(
    State(state): State<AppState<S>>,
    Path(booking_id): Path<BookingId>,
    ValidatedJson(request): ValidatedJson<SlotRequest>,
) -> Result<Json<Booking>, ApiError>
where
    S: Store,
    S::Tx: BillingTx,
{
    Ok(Json(state.scheduler.reschedule(booking_id, request.into_slot()?).await?))
}

/// Admin cancellation
pub async fn cancel<S>(
    State(state): State<AppState<S>>,
    Path(booking_id): Path<BookingId>,
    ValidatedJson(request): ValidatedJson<CancelRequest>,
) -> Result<Json<Booking>, ApiError>
where
    S: Store,
    S::Tx: BillingTx,
{
    Ok(Json(state.scheduler.cancel(booking_id, request.refund).await?))
}

/// Client cancellation under the late-cancel window
///
/// Callers without booking management rights may only cancel their own
/// sessions; their token subject is their client id.
pub async fn cancel_by_client<S>(
    State(state): State<AppState<S>>,
    Extension(claims): Extension<Claims>,
    Path(booking_id): Path<BookingId>,
) -> Result<Json<Booking>, ApiError>
where
    S: Store,
    S::Tx: BillingTx,
{
    if !claims.can(Capability::ManageBookings) {
        let booking = state.scheduler.get_booking(booking_id).await?;
        if claims.sub.parse::<ClientId>().ok() != Some(booking.client_id) {
            return Err(ApiError::Forbidden("booking belongs to another client".into()));
        }
    }
    Ok(Json(state.scheduler.cancel_by_client(booking_id, Utc::now()).await?))
}

pub async fn confirm<S>(
    State(state): State<AppState<S>>,
    Path(booking_id): Path<BookingId>,
) -> Result<Json<Booking>, ApiError>
where
    S: Store,
    S::Tx: BillingTx,
{
    Ok(Json(state.scheduler.confirm(booking_id).await?))
}

pub async fn complete<S>(
    State(state): State<AppState<S>>,
    Path(booking_id): Path<BookingId>,
) -> Result<Json<Booking>, ApiError>
where
    S: Store,
    S::Tx: BillingTx,
{
    Ok(Json(state.scheduler.complete(booking_id).await?))
}

pub async fn mark_no_show<S>(
    State(state): State<AppState<S>>,
    Path(booking_id): Path<BookingId>,
) -> Result<Json<Booking>, ApiError>
where
    S: Store,
    S::Tx: BillingTx,
{
    Ok(Json(state.scheduler.mark_no_show(booking_id).await?))
}

/// Hard-deletes a booking, refunding an unused credit first
pub async fn erase<S>(
    State(state): State<AppState<S>>,
    Path(booking_id): Path<BookingId>,
) -> Result<Json<Booking>, ApiError>
where
    S: Store,
    S::Tx: BillingTx,
{
    Ok(Json(state.scheduler.erase(booking_id).await?))
}

pub async fn get_series<S>(
    State(state): State<AppState<S>>,
    Path(series_id): Path<SeriesId>,
) -> Result<Json<Vec<Booking>>, ApiError>
where
    S: Store,
    S::Tx: BillingTx,
{
    let bookings = state.scheduler.series(series_id).await?;
    if bookings.is_empty() {
        return Err(ApiError::NotFound(format!("Series not found: {}", series_id)));
    }
    Ok(Json(bookings))
}

pub async fn cancel_series<S>(
    State(state): State<AppState<S>>,
    Path(series_id): Path<SeriesId>,
    ValidatedJson(request): ValidatedJson<CancelSeriesRequest>,
) -> Result<Json<SeriesCancellation>, ApiError>
where
    S: Store,
    S::Tx: BillingTx,
{
    let from = request.from.unwrap_or_else(|| state.practice_today());
    Ok(Json(state.scheduler.cancel_series(series_id, request.refund, from).await?))
}

pub async fn client_bookings<S>(
    State(state): State<AppState<S>>,
    Path(client_id): Path<ClientId>,
    Query(query): Query<DateRangeQuery>,
) -> Result<Json<Vec<Booking>>, ApiError>
where
    S: Store,
    S::Tx: BillingTx,
{
    Ok(Json(state.scheduler.client_bookings(client_id, query.into_range()?).await?))
}
