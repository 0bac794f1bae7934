//! Billing Domain - postpaid billing for therapy sessions
//!
//! This crate turns unbilled sessions into bills:
//!
//! - **BillingPeriod**: cycle boundaries anchored on a billing day
//! - **Sweep**: unbilled, uncancelled, not credit-paid sessions in a period
//! - **Pricing**: session rates, standing discounts (larger wins) and VAT
//! - **PaymentRequest**: pending bill with an immutable line-item snapshot
//! - **Invoice**: the paid counterpart, or a manual ad-hoc invoice
//!
//! Every issued document stamps its bookings; voiding unlinks them.

pub mod period;
pub mod config;
pub mod pricing;
pub mod document;
pub mod ports;
pub mod generator;
pub mod error;

pub use period::{BillingPeriod, billing_period};
pub use config::{BillingConfig, VatConfig};
pub use pricing::{PricingPort, AppliedDiscount, Totals, line_discount, prorate};
pub use document::{
    LineItem, PaymentRequest, PaymentRequestDraft, PaymentRequestStatus, Invoice, InvoiceStatus,
};
pub use ports::{BillingTx, BillingLink, PaymentRequestFilter};
pub use generator::{BillingService, BillingRunReport, ClientFailure, is_billable, sweep_unbilled};
pub use error::BillingError;
