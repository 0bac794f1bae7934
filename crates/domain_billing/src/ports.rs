//! Storage port for billing documents

use async_trait::async_trait;

use core_kernel::{BookingId, ClientId, DateRange, InvoiceId, PaymentRequestId, PortError};
use domain_booking::{Booking, BookingTx};
use crate::document::{Invoice, PaymentRequest, PaymentRequestStatus};

/// Which document a booking is linked to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BillingLink {
    PaymentRequest(PaymentRequestId),
    Invoice(InvoiceId),
}

/// Filter for listing payment requests
#[derive(Debug, Clone, Copy, Default)]
pub struct PaymentRequestFilter {
    pub client_id: Option<ClientId>,
    pub status: Option<PaymentRequestStatus>,
}

/// Billing storage available inside a unit of work
#[async_trait]
pub trait BillingTx: BookingTx {
    async fn insert_payment_request(&mut self, request: &PaymentRequest) -> Result<(), PortError>;

    /// Writes status and payment metadata; the snapshot is never rewritten
    async fn update_payment_request(&mut self, request: &PaymentRequest) -> Result<(), PortError>;

    /// Loads a payment request, locking it until the unit of work ends
    async fn get_payment_request(&mut self, id: PaymentRequestId) -> Result<Option<PaymentRequest>, PortError>;

    /// Lists payment requests, newest first
    async fn list_payment_requests(&mut self, filter: PaymentRequestFilter) -> Result<Vec<PaymentRequest>, PortError>;

    async fn insert_invoice(&mut self, invoice: &Invoice) -> Result<(), PortError>;

    async fn update_invoice(&mut self, invoice: &Invoice) -> Result<(), PortError>;

    async fn get_invoice(&mut self, id: InvoiceId) -> Result<Option<Invoice>, PortError>;

    /// Lists invoices, newest first
    async fn list_invoices(&mut self, client_id: Option<ClientId>) -> Result<Vec<Invoice>, PortError>;

    /// Bookings currently linked to a document
    async fn linked_bookings(&mut self, link: BillingLink) -> Result<Vec<Booking>, PortError>;

    /// A client's unlinked, non-cancelled bookings in `range`, locked until
    /// the unit of work ends
    async fn unbilled_bookings(&mut self, client_id: ClientId, range: DateRange) -> Result<Vec<Booking>, PortError>;

    /// Stamps one booking with a document link
    ///
    /// Only the link column is written. Returns `Conflict` if the booking
    /// has been cancelled or linked since it was read.
    async fn link_booking(&mut self, booking_id: BookingId, link: BillingLink) -> Result<(), PortError>;
}
