//! HTTP API Layer
//!
//! REST API for the practice billing core using Axum.
//!
//! # Architecture
//!
//! - **Handlers**: one module per route group (credits, clients, bookings, billing)
//! - **Middleware**: JWT authentication, per-group capability gates, audit logging
//! - **DTOs**: request payloads and the few non-aggregate responses
//! - **Adapters**: default notifier, calendar and pricing collaborators
//! - **Error Handling**: every domain error maps to a stable error code
//!
//! The router is generic over the [`Store`], so the same routes run on
//! PostgreSQL in production and on the in-memory store in tests.
//!
//! # Example
//!
//! ```rust,ignore
//! use interface_api::{create_router, AppState, Collaborators};
//!
//! let state = AppState::new(Arc::new(store), collaborators, config);
//! axum::serve(listener, create_router(state)).await?;
//! ```

pub mod config;
pub mod error;
pub mod middleware;
pub mod handlers;
pub mod dto;
pub mod auth;
pub mod extract;
pub mod adapters;

use std::sync::Arc;

use axum::{
    middleware as axum_middleware,
    routing::{get, patch, post, put},
    Router,
};
use chrono::{NaiveDate, Utc};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use core_kernel::{HealthCheckable, Store};
use domain_billing::{BillingService, BillingTx, PricingPort};
use domain_booking::{AvailabilityPort, CalendarPort, NotificationPort, Scheduler};
use domain_client::ClientService;
use domain_credit::Ledger;

use crate::auth::Capability;
use crate::config::ApiConfig;
use crate::handlers::{billing, bookings, clients, credits, health};
use crate::middleware::{audit_middleware, auth_middleware, capability_gate, AuthKey};

/// External collaborators the services are wired to
pub struct Collaborators {
    pub availability: Arc<dyn AvailabilityPort>,
    pub calendar: Arc<dyn CalendarPort>,
    pub notifier: Arc<dyn NotificationPort>,
    pub pricing: Arc<dyn PricingPort>,
    /// Adapters reported by `/health/ready`
    pub health: Vec<Arc<dyn HealthCheckable>>,
}

/// Application state shared across handlers
pub struct AppState<S> {
    pub ledger: Ledger<S>,
    pub clients: ClientService<S>,
    pub scheduler: Scheduler<S>,
    pub billing: BillingService<S>,
    pub config: Arc<ApiConfig>,
    pub health: Arc<Vec<Arc<dyn HealthCheckable>>>,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            ledger: self.ledger.clone(),
            clients: self.clients.clone(),
            scheduler: self.scheduler.clone(),
            billing: self.billing.clone(),
            config: Arc::clone(&self.config),
            health: Arc::clone(&self.health),
        }
    }
}

impl<S> AppState<S>
where
    S: Store,
    S::Tx: BillingTx,
{
    /// Wires every service over one store
    pub fn new(store: Arc<S>, collaborators: Collaborators, config: ApiConfig) -> Self {
        let scheduler = Scheduler::new(
            Arc::clone(&store),
            collaborators.availability,
            collaborators.calendar,
            Arc::clone(&collaborators.notifier),
        )
        .with_policy(config.scheduling.clone());
        let billing = BillingService::new(
            Arc::clone(&store),
            collaborators.pricing,
            collaborators.notifier,
            config.billing.clone(),
        );

        Self {
            ledger: Ledger::new(Arc::clone(&store)),
            clients: ClientService::new(store),
            scheduler,
            billing,
            config: Arc::new(config),
            health: Arc::new(collaborators.health),
        }
    }
}

impl<S> AppState<S> {
    /// Today's date in the practice timezone
    pub fn practice_today(&self) -> NaiveDate {
        self.config.scheduling.timezone.to_local(Utc::now()).date_naive()
    }
}

/// Creates the main API router
///
/// # Arguments
///
/// * `state` - Wired services and configuration
///
/// # Returns
///
/// Configured Axum router with all routes and middleware
pub fn create_router<S>(state: AppState<S>) -> Router
where
    S: Store,
    S::Tx: BillingTx,
{
    let auth_key = AuthKey(state.config.jwt_secret.clone());

    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check::<S>));

    // Credit ledger
    let credit_read_routes = Router::new()
        .route("/clients/:id/credits", get(credits::get_balance::<S>))
        .route("/clients/:id/credits/transactions", get(credits::list_transactions::<S>))
        .route("/clients/:id/credits/replay", get(credits::verify_replay::<S>))
        .route_layer(axum_middleware::from_fn_with_state(Capability::ViewCredits, capability_gate));

    let credit_write_routes = Router::new()
        .route("/clients/:id/credits/grants", post(credits::grant_credits::<S>))
        .route_layer(axum_middleware::from_fn_with_state(Capability::ManageCredits, capability_gate));

    // Clients, billing entities and payer assignments
    let client_routes = Router::new()
        .route("/clients", post(clients::register_client::<S>))
        .route("/clients/:id", get(clients::get_client::<S>))
        .route("/clients/:id/billing-profile", patch(clients::update_billing_profile::<S>))
        .route(
            "/clients/:id/relationships",
            get(clients::list_relationships::<S>).post(clients::relate::<S>),
        )
        .route(
            "/clients/:id/billing/:category",
            get(clients::resolve_contact::<S>).put(clients::assign_billing::<S>),
        )
        .route("/billing-entities", post(clients::register_entity::<S>))
        .route("/billing-entities/:id", get(clients::get_entity::<S>))
        .route_layer(axum_middleware::from_fn_with_state(Capability::ManageClients, capability_gate));

    // Bookings and series
    let booking_routes = Router::new()
        .route("/bookings", post(bookings::create_booking::<S>))
        .route("/bookings/recurring", post(bookings::create_series::<S>))
        .route(
            "/bookings/:id",
            get(bookings::get_booking::<S>).delete(bookings::erase::<S>),
        )
        .route("/bookings/:id/reschedule", post(bookings::reschedule::<S>))
        .route("/bookings/:id/cancel", post(bookings::cancel::<S>))
        .route("/bookings/:id/confirm", post(bookings::confirm::<S>))
        .route("/bookings/:id/complete", post(bookings::complete::<S>))
        .route("/bookings/:id/no-show", post(bookings::mark_no_show::<S>))
        .route("/series/:id", get(bookings::get_series::<S>))
        .route("/series/:id/cancel", post(bookings::cancel_series::<S>))
        .route("/clients/:id/bookings", get(bookings::client_bookings::<S>))
        .route_layer(axum_middleware::from_fn_with_state(Capability::ManageBookings, capability_gate));

    let self_service_routes = Router::new()
        .route("/bookings/:id/client-cancel", post(bookings::cancel_by_client::<S>))
        .route_layer(axum_middleware::from_fn_with_state(Capability::CancelOwnBooking, capability_gate));

    // Payment requests and invoices
    let billing_routes = Router::new()
        .route("/billing/periods/:year/:month", get(billing::get_period::<S>))
        .route("/billing/runs", post(billing::run_period::<S>))
        .route("/billing/overdue", post(billing::mark_overdue::<S>))
        .route("/clients/:id/unbilled", get(billing::unbilled_sessions::<S>))
        .route("/clients/:id/payment-requests", post(billing::generate_for_client::<S>))
        .route("/payment-requests", get(billing::list_payment_requests::<S>))
        .route("/payment-requests/:id", get(billing::get_payment_request::<S>))
        .route("/payment-requests/:id/payments", post(billing::record_payment::<S>))
        .route("/payment-requests/:id/void", post(billing::void_payment_request::<S>))
        .route(
            "/invoices",
            get(billing::list_invoices::<S>).post(billing::create_manual_invoice::<S>),
        )
        .route("/invoices/:id", get(billing::get_invoice::<S>))
        .route("/invoices/:id/void", post(billing::void_invoice::<S>))
        .route_layer(axum_middleware::from_fn_with_state(Capability::ManageBilling, capability_gate));

    // Protected API routes
    let api_routes = Router::new()
        .merge(credit_read_routes)
        .merge(credit_write_routes)
        .merge(client_routes)
        .merge(booking_routes)
        .merge(self_service_routes)
        .merge(billing_routes)
        .layer(axum_middleware::from_fn(audit_middleware))
        .layer(axum_middleware::from_fn_with_state(auth_key, auth_middleware));

    // Combine all routes
    Router::new()
        .merge(public_routes)
        .nest("/api/v1", api_routes)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id()),
        )
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
