//! HTTP API Tests
//!
//! Drives the router end to end over the in-memory store:
//! - authentication and per-group capability checks
//! - domain errors surface with stable error codes
//! - a postpaid month from booking to invoice

use std::sync::Arc;

use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::{json, Value};

use core_kernel::ClientId;
use domain_billing::{Invoice, PaymentRequest, PaymentRequestStatus};
use domain_booking::{Booking, BookingStatus, SessionType};
use domain_client::Client;
use interface_api::auth::{create_token, roles};
use interface_api::config::ApiConfig;
use interface_api::dto::credits::BalanceResponse;
use interface_api::{create_router, AppState};
use test_utils::{slot, ClientFixtures, TestPractice};

// ============================================================================
// TEST FIXTURES
// ============================================================================

const SECRET: &str = "api-test-secret";

struct Api {
    server: TestServer,
    practice: TestPractice,
}

fn api() -> Api {
    let practice = TestPractice::new();
    let state = AppState {
        ledger: practice.ledger.clone(),
        clients: practice.clients.clone(),
        scheduler: practice.scheduler.clone(),
        billing: practice.billing.clone(),
        config: Arc::new(ApiConfig {
            jwt_secret: SECRET.to_string(),
            ..ApiConfig::default()
        }),
        health: Arc::new(Vec::new()),
    };
    let server = TestServer::new(create_router(state)).unwrap();
    Api { server, practice }
}

fn token(sub: &str, role: &str) -> String {
    create_token(sub, vec![role.to_string()], SECRET, 3600).unwrap()
}

fn admin() -> String {
    token("admin-1", roles::ADMIN)
}

fn booking_body(client_id: ClientId, date: &str, pay_with_credit: bool) -> Value {
    json!({
        "client_id": client_id,
        "session_type": "individual",
        "date": date,
        "start_time": "10:00:00",
        "end_time": "11:00:00",
        "pay_with_credit": pay_with_credit,
    })
}

// ============================================================================
// AUTHENTICATION AND CAPABILITIES
// ============================================================================

#[tokio::test]
async fn test_health_is_public() {
    let api = api();
    let response = api.server.get("/health").await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let ready = api.server.get("/health/ready").await;
    assert_eq!(ready.status_code(), StatusCode::OK);
    assert_eq!(ready.json::<Value>()["status"], "healthy");
}

#[tokio::test]
async fn test_missing_token_is_unauthorized() {
    let api = api();
    let response = api.server.get(&format!("/api/v1/clients/{}", ClientId::new().as_uuid())).await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
    assert_eq!(response.json::<Value>()["error"], "unauthorized");
}

#[tokio::test]
async fn test_client_role_cannot_grant_credits() {
    let api = api();
    let client = api.practice.register(ClientFixtures::prepaid()).await;

    let response = api
        .server
        .post(&format!("/api/v1/clients/{}/credits/grants", client.id.as_uuid()))
        .authorization_bearer(token("someone", roles::CLIENT))
        .json(&json!({"amount": 5, "source": "admin_grant", "description": "Free credits"}))
        .await;

    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);
    assert_eq!(api.practice.ledger.get_balance(client.id).await.unwrap(), 0);
}

// ============================================================================
// CLIENTS AND CREDITS
// ============================================================================

#[tokio::test]
async fn test_register_client_and_grant_credits() {
    let api = api();

    let response = api
        .server
        .post("/api/v1/clients")
        .authorization_bearer(admin())
        .json(&json!({
            "full_name": "Thandi Nkosi",
            "email": "thandi@example.com",
            "discount": {"percent": "10"}
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    let client: Client = response.json();
    assert!(client.standing_discount.percent.is_some());

    let granted = api
        .server
        .post(&format!("/api/v1/clients/{}/credits/grants", client.id.as_uuid()))
        .authorization_bearer(token("books-1", roles::BOOKKEEPER))
        .json(&json!({"amount": 4, "source": "purchase", "order_id": null, "description": "Bundle of 4"}))
        .await;
    assert_eq!(granted.status_code(), StatusCode::CREATED);
    assert_eq!(granted.json::<BalanceResponse>().balance, 4);

    let log = api
        .server
        .get(&format!("/api/v1/clients/{}/credits/transactions", client.id.as_uuid()))
        .authorization_bearer(admin())
        .await;
    assert_eq!(log.json::<Vec<Value>>().len(), 1);
}

#[tokio::test]
async fn test_invalid_email_is_a_validation_error() {
    let api = api();
    let response = api
        .server
        .post("/api/v1/clients")
        .authorization_bearer(admin())
        .json(&json!({"full_name": "Nobody", "email": "not-an-email"}))
        .await;
    assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response.json::<Value>()["error"], "validation_error");
}

#[tokio::test]
async fn test_couples_assignment_through_api() {
    let api = api();
    let a = api.practice.register(ClientFixtures::postpaid()).await;
    let b = api.practice.register(ClientFixtures::postpaid()).await;
    let partner = api.practice.partners(a.id, b.id).await;

    let response = api
        .server
        .put(&format!("/api/v1/clients/{}/billing/couples", a.id.as_uuid()))
        .authorization_bearer(admin())
        .json(&json!({"relationship_id": partner.id}))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let contact = api
        .server
        .get(&format!("/api/v1/clients/{}/billing/couples", b.id.as_uuid()))
        .authorization_bearer(admin())
        .await
        .json::<Value>();
    assert_eq!(contact["type"], "self_pay");
    assert_eq!(contact["client_id"], json!(b.id));
}

// ============================================================================
// BOOKINGS
// ============================================================================

#[tokio::test]
async fn test_credit_booking_without_balance_is_payment_required() {
    let api = api();
    let client = api.practice.register(ClientFixtures::prepaid()).await;

    let response = api
        .server
        .post("/api/v1/bookings")
        .authorization_bearer(admin())
        .json(&booking_body(client.id, "2025-03-03", true))
        .await;

    assert_eq!(response.status_code(), StatusCode::PAYMENT_REQUIRED);
    assert_eq!(response.json::<Value>()["error"], "insufficient_credit");
}

#[tokio::test]
async fn test_double_booking_is_a_slot_conflict() {
    let api = api();
    let a = api.practice.register(ClientFixtures::postpaid()).await;
    let b = api.practice.register(ClientFixtures::postpaid()).await;

    let first = api
        .server
        .post("/api/v1/bookings")
        .authorization_bearer(admin())
        .json(&booking_body(a.id, "2025-03-03", false))
        .await;
    assert_eq!(first.status_code(), StatusCode::CREATED);

    let second = api
        .server
        .post("/api/v1/bookings")
        .authorization_bearer(admin())
        .json(&booking_body(b.id, "2025-03-03", false))
        .await;
    assert_eq!(second.status_code(), StatusCode::CONFLICT);
    assert_eq!(second.json::<Value>()["error"], "slot_unavailable");
}

#[tokio::test]
async fn test_series_horizon_is_validated() {
    let api = api();
    let client = api.practice.register(ClientFixtures::postpaid()).await;

    let response = api
        .server
        .post("/api/v1/bookings/recurring")
        .authorization_bearer(admin())
        .json(&json!({
            "client_id": client.id,
            "session_type": "individual",
            "start_date": "2025-03-03",
            "start_time": "09:00:00",
            "end_time": "10:00:00",
            "pattern": "weekly",
            "horizon_months": 13
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_clients_may_only_cancel_their_own_bookings() {
    let api = api();
    let owner = api.practice.register(ClientFixtures::postpaid()).await;
    let other = api.practice.register(ClientFixtures::postpaid()).await;
    let booking = api
        .practice
        .book(owner.id, SessionType::Individual, slot(2030, 6, 3, 10), false)
        .await;
    let url = format!("/api/v1/bookings/{}/client-cancel", booking.id.as_uuid());

    let denied = api
        .server
        .post(&url)
        .authorization_bearer(token(&other.id.to_string(), roles::CLIENT))
        .await;
    assert_eq!(denied.status_code(), StatusCode::FORBIDDEN);

    let allowed = api
        .server
        .post(&url)
        .authorization_bearer(token(&owner.id.to_string(), roles::CLIENT))
        .await;
    assert_eq!(allowed.status_code(), StatusCode::OK);
    let cancelled: Booking = allowed.json();
    assert_eq!(cancelled.status, BookingStatus::Cancelled);
    assert!(!cancelled.is_late_cancel);
}

#[tokio::test]
async fn test_completed_booking_cannot_be_confirmed() {
    let api = api();
    let client = api.practice.register(ClientFixtures::postpaid()).await;
    let booking = api
        .practice
        .book(client.id, SessionType::Individual, slot(2025, 3, 3, 10), false)
        .await;
    api.practice.complete(booking.id).await;

    let response = api
        .server
        .post(&format!("/api/v1/bookings/{}/confirm", booking.id.as_uuid()))
        .authorization_bearer(admin())
        .await;
    assert_eq!(response.status_code(), StatusCode::CONFLICT);
    assert_eq!(response.json::<Value>()["error"], "invalid_transition");
}

// ============================================================================
// BILLING
// ============================================================================

#[tokio::test]
async fn test_month_from_booking_to_invoice() {
    let api = api();
    let client = api.practice.register(ClientFixtures::postpaid()).await;
    for day in [3, 10] {
        let booking = api
            .practice
            .book(client.id, SessionType::Individual, slot(2025, 3, day, 10), false)
            .await;
        api.practice.complete(booking.id).await;
    }
    let bookkeeper = token("books-1", roles::BOOKKEEPER);

    let issued = api
        .server
        .post(&format!("/api/v1/clients/{}/payment-requests", client.id.as_uuid()))
        .authorization_bearer(bookkeeper.clone())
        .json(&json!({"year": 2025, "month": 3}))
        .await;
    assert_eq!(issued.status_code(), StatusCode::CREATED);
    let requests: Vec<PaymentRequest> = issued.json();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].line_items.len(), 2);
    assert!(requests[0].number.starts_with("PR-202503-"));

    let paid = api
        .server
        .post(&format!("/api/v1/payment-requests/{}/payments", requests[0].id.as_uuid()))
        .authorization_bearer(bookkeeper.clone())
        .json(&json!({"reference": "EFT-1001"}))
        .await;
    assert_eq!(paid.status_code(), StatusCode::CREATED);
    let invoice: Invoice = paid.json();
    assert_eq!(invoice.total, requests[0].total);

    let listed = api
        .server
        .get("/api/v1/payment-requests")
        .add_query_param("status", "paid")
        .authorization_bearer(bookkeeper.clone())
        .await
        .json::<Vec<PaymentRequest>>();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].status, PaymentRequestStatus::Paid);

    let again = api
        .server
        .post(&format!("/api/v1/payment-requests/{}/void", requests[0].id.as_uuid()))
        .authorization_bearer(bookkeeper)
        .await;
    assert_eq!(again.status_code(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_nothing_to_bill_is_reported() {
    let api = api();
    let client = api.practice.register(ClientFixtures::postpaid()).await;

    let response = api
        .server
        .post(&format!("/api/v1/clients/{}/payment-requests", client.id.as_uuid()))
        .authorization_bearer(admin())
        .json(&json!({"year": 2025, "month": 3}))
        .await;
    assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response.json::<Value>()["error"], "no_unbilled_sessions");
}

#[tokio::test]
async fn test_practitioner_cannot_run_billing() {
    let api = api();
    let response = api
        .server
        .post("/api/v1/billing/runs")
        .authorization_bearer(token("dr-1", roles::PRACTITIONER))
        .json(&json!({"year": 2025, "month": 3}))
        .await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);
}
