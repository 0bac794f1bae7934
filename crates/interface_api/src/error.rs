//! API error handling
//!
//! Every domain error maps onto one [`ApiError`] variant, and every
//! variant onto a stable `error` code in the response body.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use core_kernel::PortError;
use domain_billing::BillingError;
use domain_booking::BookingError;
use domain_client::ClientError;
use domain_credit::LedgerError;

/// API error types
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Insufficient credit: {0}")]
    InsufficientCredit(String),

    #[error("Slot unavailable: {0}")]
    SlotUnavailable(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Invalid relationship: {0}")]
    InvalidRelationship(String),

    #[error("Nothing to bill: {0}")]
    NoUnbilledSessions(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<String>>,
}

impl ApiError {
    /// HTTP status and machine-readable code
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized"),
            ApiError::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden"),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
            ApiError::InsufficientCredit(_) => (StatusCode::PAYMENT_REQUIRED, "insufficient_credit"),
            ApiError::SlotUnavailable(_) => (StatusCode::CONFLICT, "slot_unavailable"),
            ApiError::InvalidTransition(_) => (StatusCode::CONFLICT, "invalid_transition"),
            ApiError::InvalidRelationship(_) => (StatusCode::UNPROCESSABLE_ENTITY, "invalid_relationship"),
            ApiError::NoUnbilledSessions(_) => (StatusCode::UNPROCESSABLE_ENTITY, "no_unbilled_sessions"),
            ApiError::Unavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
            ApiError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "validation_error"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type) = self.status_and_code();
        let message = match &self {
            ApiError::Unauthorized => "Unauthorized".to_string(),
            ApiError::Internal(detail) => {
                error!(detail = %detail, "request failed");
                "An internal error occurred".to_string()
            }
            ApiError::NotFound(msg)
            | ApiError::BadRequest(msg)
            | ApiError::Forbidden(msg)
            | ApiError::Conflict(msg)
            | ApiError::InsufficientCredit(msg)
            | ApiError::SlotUnavailable(msg)
            | ApiError::InvalidTransition(msg)
            | ApiError::InvalidRelationship(msg)
            | ApiError::NoUnbilledSessions(msg)
            | ApiError::Unavailable(msg)
            | ApiError::Validation(msg) => msg.clone(),
        };

        let body = ErrorResponse {
            error: error_type.to_string(),
            message,
            details: None,
        };

        (status, Json(body)).into_response()
    }
}

impl From<PortError> for ApiError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            PortError::Validation { message, .. } => ApiError::Validation(message),
            PortError::Conflict { message } => ApiError::Conflict(message),
            PortError::Connection { .. } | PortError::Timeout { .. } | PortError::ServiceUnavailable { .. } => {
                ApiError::Unavailable(err.to_string())
            }
            PortError::Internal { .. } => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InsufficientCredit { .. } => ApiError::InsufficientCredit(err.to_string()),
            LedgerError::InvalidAmount(_) => ApiError::Validation(err.to_string()),
            LedgerError::Overflow(_) => ApiError::Conflict(err.to_string()),
            LedgerError::Port(e) => e.into(),
        }
    }
}

impl From<ClientError> for ApiError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            ClientError::InvalidRelationship { .. } => ApiError::InvalidRelationship(err.to_string()),
            ClientError::Validation(msg) => ApiError::Validation(msg),
            ClientError::Port(e) => e.into(),
        }
    }
}

impl From<BookingError> for ApiError {
    fn from(err: BookingError) -> Self {
        match err {
            BookingError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            BookingError::SlotUnavailable { .. } => ApiError::SlotUnavailable(err.to_string()),
            BookingError::InsufficientCredit { .. } => ApiError::InsufficientCredit(err.to_string()),
            BookingError::InvalidTransition { .. } => ApiError::InvalidTransition(err.to_string()),
            BookingError::AlreadyBilled(_) => ApiError::Conflict(err.to_string()),
            BookingError::Validation(msg) => ApiError::Validation(msg),
            BookingError::Ledger(e) => e.into(),
            BookingError::Client(e) => e.into(),
            BookingError::Port(e) => e.into(),
        }
    }
}

impl From<BillingError> for ApiError {
    fn from(err: BillingError) -> Self {
        match err {
            BillingError::NoUnbilledSessions { .. } => ApiError::NoUnbilledSessions(err.to_string()),
            BillingError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            BillingError::InvalidRelationship { .. } => ApiError::InvalidRelationship(err.to_string()),
            BillingError::InvalidStatus { .. } => ApiError::InvalidTransition(err.to_string()),
            BillingError::AlreadyBilled(_) => ApiError::Conflict(err.to_string()),
            BillingError::Validation(msg) => ApiError::Validation(msg),
            BillingError::Money(e) => ApiError::Validation(e.to_string()),
            BillingError::Port(e) => e.into(),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<String> = errors
            .field_errors()
            .iter()
            .map(|(field, errs)| {
                let codes: Vec<&str> = errs.iter().map(|e| e.code.as_ref()).collect();
                format!("{}: {}", field, codes.join(", "))
            })
            .collect();
        fields.sort();
        ApiError::Validation(fields.join("; "))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};
    use core_kernel::ClientId;
    use domain_booking::BookingStatus;

    #[test]
    fn test_booking_errors_map_to_codes() {
        let slot = BookingError::SlotUnavailable {
            date: NaiveDate::from_ymd_opt(2025, 3, 3).unwrap(),
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        };
        assert_eq!(ApiError::from(slot).status_and_code(), (StatusCode::CONFLICT, "slot_unavailable"));

        let transition = BookingError::InvalidTransition {
            from: BookingStatus::Cancelled,
            action: "confirm".into(),
        };
        assert_eq!(ApiError::from(transition).status_and_code().1, "invalid_transition");
    }

    #[test]
    fn test_nested_ledger_error_keeps_its_code() {
        let err = BookingError::Ledger(LedgerError::InsufficientCredit {
            client_id: ClientId::new(),
            balance: 0,
        });
        assert_eq!(
            ApiError::from(err).status_and_code(),
            (StatusCode::PAYMENT_REQUIRED, "insufficient_credit")
        );
    }

    #[test]
    fn test_transient_port_errors_are_unavailable() {
        let err = ApiError::from(PortError::unavailable("postgres"));
        assert_eq!(err.status_and_code().0, StatusCode::SERVICE_UNAVAILABLE);
        let err = ApiError::from(PortError::conflict("slot taken"));
        assert_eq!(err.status_and_code().1, "conflict");
    }

    #[test]
    fn test_billing_errors_map_to_codes() {
        let err = BillingError::NoUnbilledSessions { client_id: ClientId::new() };
        assert_eq!(ApiError::from(err).status_and_code().1, "no_unbilled_sessions");
    }
}
