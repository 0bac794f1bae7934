//! Payment request and invoice generation
//!
//! A sweep collects a client's unbilled sessions for a period. Sessions are
//! grouped by resolved payer, and each group becomes one payment request
//! whose line items are a priced snapshot. Every swept booking is stamped
//! with its request id in the same unit of work, so it cannot be swept
//! twice. Voiding a document unlinks its bookings again.

use std::collections::HashMap;
use std::sync::Arc;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use core_kernel::{best_effort, uow, BookingId, ClientId, DateRange, InvoiceId, Money, PaymentRequestId, Store};
use domain_booking::{templates, Booking, BookingStatus, BookingTx, Notification, NotificationPort};
use domain_client::{payer_details, resolve, BillingContact, BillingType, Client, ClientTx, SessionCategory, StandingDiscount};
use crate::config::BillingConfig;
use crate::document::{Invoice, InvoiceStatus, LineItem, PaymentRequest, PaymentRequestDraft, PaymentRequestStatus};
use crate::error::BillingError;
use crate::period::{billing_period, BillingPeriod};
use crate::ports::{BillingLink, BillingTx, PaymentRequestFilter};
use crate::pricing::{line_discount, prorate, PricingPort};

/// Returns true if a booking still needs to be billed
///
/// Cancelled, already linked, credit-paid and complimentary sessions are
/// never swept.
pub fn is_billable(booking: &Booking) -> bool {
    booking.is_unbilled()
        && booking.status != BookingStatus::Cancelled
        && !booking.credit_deducted
        && booking.session_type.is_chargeable()
}

/// A client the batch run could not bill
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientFailure {
    pub client_id: ClientId,
    pub reason: String,
}

/// Outcome of billing every postpaid client for one period
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingRunReport {
    pub period: BillingPeriod,
    pub issued: Vec<PaymentRequest>,
    pub nothing_to_bill: Vec<ClientId>,
    pub failed: Vec<ClientFailure>,
}

async fn load_client<T: BillingTx>(tx: &mut T, client_id: ClientId) -> Result<Client, BillingError> {
    tx.get_client(client_id)
        .await?
        .ok_or_else(|| BillingError::not_found("Client", client_id))
}

async fn load_request<T: BillingTx>(tx: &mut T, id: PaymentRequestId) -> Result<PaymentRequest, BillingError> {
    tx.get_payment_request(id)
        .await?
        .ok_or_else(|| BillingError::not_found("PaymentRequest", id))
}

async fn load_invoice<T: BillingTx>(tx: &mut T, id: InvoiceId) -> Result<Invoice, BillingError> {
    tx.get_invoice(id)
        .await?
        .ok_or_else(|| BillingError::not_found("Invoice", id))
}

/// Billable bookings for a client within `range`
pub async fn sweep_unbilled<T: BillingTx>(
    tx: &mut T,
    client_id: ClientId,
    range: DateRange,
) -> Result<Vec<Booking>, BillingError> {
    let bookings = tx.unbilled_bookings(client_id, range).await?;
    Ok(bookings.into_iter().filter(is_billable).collect())
}

/// Issues payment requests and invoices
pub struct BillingService<S> {
    store: Arc<S>,
    pricing: Arc<dyn PricingPort>,
    notifier: Arc<dyn NotificationPort>,
    config: BillingConfig,
}

impl<S> Clone for BillingService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            pricing: Arc::clone(&self.pricing),
            notifier: Arc::clone(&self.notifier),
            config: self.config.clone(),
        }
    }
}

impl<S> BillingService<S>
where
    S: Store,
    S::Tx: BillingTx,
{
    pub fn new(
        store: Arc<S>,
        pricing: Arc<dyn PricingPort>,
        notifier: Arc<dyn NotificationPort>,
        config: BillingConfig,
    ) -> Self {
        Self {
            store,
            pricing,
            notifier,
            config,
        }
    }

    pub fn config(&self) -> &BillingConfig {
        &self.config
    }

    /// The practice's billing period for `year`/`month`
    pub fn billing_period(&self, year: i32, month: u32) -> Result<BillingPeriod, BillingError> {
        billing_period(year, month, self.config.billing_day)
    }

    /// Lists the client's billable sessions without billing them
    pub async fn sweep_unbilled(&self, client_id: ClientId, range: DateRange) -> Result<Vec<Booking>, BillingError> {
        let mut tx = self.store.begin().await?;
        let result = sweep_unbilled(&mut tx, client_id, range).await;
        uow::finish(tx, result).await
    }

    /// Bills a client's unbilled sessions for one period
    ///
    /// Returns one payment request per distinct payer: individual and
    /// couples sessions paid by the same party share a request, sessions
    /// paid by different parties never do.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the client does not exist
    /// - `NoUnbilledSessions` if the sweep finds nothing
    #[instrument(skip(self, period), fields(client_id = %client_id, period = %period.stamp()))]
    pub async fn generate_for_client(
        &self,
        client_id: ClientId,
        period: &BillingPeriod,
    ) -> Result<Vec<PaymentRequest>, BillingError> {
        let mut tx = self.store.begin().await?;
        let result = async {
            let client = load_client(&mut tx, client_id).await?;
            self.bill_client(&mut tx, &client, period).await
        }
        .await;
        let issued = uow::finish(tx, result).await?;

        for request in &issued {
            info!(
                payment_request_id = %request.id,
                number = %request.number,
                lines = request.line_items.len(),
                total = %request.total,
                "payment request issued"
            );
            self.notify_payer(request).await;
        }
        Ok(issued)
    }

    /// Bills every postpaid client for the period named by `year`/`month`
    ///
    /// Each client is billed in its own unit of work; a failure is recorded
    /// in the report and the run continues.
    #[instrument(skip(self))]
    pub async fn generate_for_period(&self, year: i32, month: u32) -> Result<BillingRunReport, BillingError> {
        let period = self.billing_period(year, month)?;

        let mut tx = self.store.begin().await?;
        let result = tx
            .list_clients(Some(BillingType::Postpaid))
            .await
            .map_err(BillingError::from);
        let clients = uow::finish(tx, result).await?;

        let mut report = BillingRunReport {
            period,
            issued: Vec::new(),
            nothing_to_bill: Vec::new(),
            failed: Vec::new(),
        };

        for client in clients {
            match self.generate_for_client(client.id, &period).await {
                Ok(mut issued) => report.issued.append(&mut issued),
                Err(BillingError::NoUnbilledSessions { client_id }) => report.nothing_to_bill.push(client_id),
                Err(error) => {
                    warn!(client_id = %client.id, error = %error, "client billing failed");
                    report.failed.push(ClientFailure {
                        client_id: client.id,
                        reason: error.to_string(),
                    });
                }
            }
        }

        info!(
            period = %period.stamp(),
            issued = report.issued.len(),
            nothing_to_bill = report.nothing_to_bill.len(),
            failed = report.failed.len(),
            "billing run finished"
        );
        Ok(report)
    }

    /// Moves pending requests due before `as_of` to overdue
    #[instrument(skip(self))]
    pub async fn mark_overdue(&self, as_of: NaiveDate) -> Result<Vec<PaymentRequestId>, BillingError> {
        let mut tx = self.store.begin().await?;
        let result = async {
            let filter = PaymentRequestFilter {
                status: Some(PaymentRequestStatus::Pending),
                ..Default::default()
            };
            let mut marked = Vec::new();
            for mut request in tx.list_payment_requests(filter).await? {
                if request.is_past_due(as_of) {
                    request.status = PaymentRequestStatus::Overdue;
                    tx.update_payment_request(&request).await?;
                    marked.push(request.id);
                }
            }
            Ok::<_, BillingError>(marked)
        }
        .await;
        let marked = uow::finish(tx, result).await?;
        info!(count = marked.len(), "payment requests marked overdue");
        Ok(marked)
    }

    /// Records payment of a request and issues its invoice
    ///
    /// The invoice copies the request's snapshot, and every booking on the
    /// request is linked to it.
    #[instrument(skip(self, reference))]
    pub async fn record_payment(
        &self,
        id: PaymentRequestId,
        reference: Option<String>,
        paid_at: DateTime<Utc>,
    ) -> Result<Invoice, BillingError> {
        let mut tx = self.store.begin().await?;
        let result = async {
            let mut request = load_request(&mut tx, id).await?;
            if !request.status.is_open() {
                return Err(BillingError::InvalidStatus {
                    document: "payment request",
                    number: request.number.clone(),
                    status: request.status.to_string(),
                    action: "record payment on",
                });
            }

            let invoice = Invoice::settle(&request, reference.clone(), paid_at);
            tx.insert_invoice(&invoice).await?;

            request.status = PaymentRequestStatus::Paid;
            request.paid_at = Some(paid_at);
            request.payment_reference = reference;
            request.invoice_id = Some(invoice.id);
            tx.update_payment_request(&request).await?;

            for mut booking in tx.linked_bookings(BillingLink::PaymentRequest(id)).await? {
                booking.invoice_id = Some(invoice.id);
                booking.updated_at = Utc::now();
                tx.update_booking(&booking).await?;
            }
            Ok::<_, BillingError>(invoice)
        }
        .await;
        let invoice = uow::finish(tx, result).await?;

        info!(invoice_id = %invoice.id, number = %invoice.number, "payment recorded");
        Ok(invoice)
    }

    /// Cancels an unpaid request and returns its bookings to the unbilled pool
    #[instrument(skip(self))]
    pub async fn void_payment_request(&self, id: PaymentRequestId) -> Result<PaymentRequest, BillingError> {
        let mut tx = self.store.begin().await?;
        let result = async {
            let mut request = load_request(&mut tx, id).await?;
            if !request.status.is_open() {
                return Err(BillingError::InvalidStatus {
                    document: "payment request",
                    number: request.number.clone(),
                    status: request.status.to_string(),
                    action: "void",
                });
            }

            request.status = PaymentRequestStatus::Cancelled;
            request.cancelled_at = Some(Utc::now());
            tx.update_payment_request(&request).await?;

            for mut booking in tx.linked_bookings(BillingLink::PaymentRequest(id)).await? {
                booking.payment_request_id = None;
                booking.updated_at = Utc::now();
                tx.update_booking(&booking).await?;
            }
            Ok::<_, BillingError>(request)
        }
        .await;
        let request = uow::finish(tx, result).await?;

        info!(number = %request.number, "payment request voided");
        Ok(request)
    }

    /// Cancels an invoice and returns its bookings to the unbilled pool
    ///
    /// The payment request it settled, if any, is cancelled with it.
    #[instrument(skip(self))]
    pub async fn void_invoice(&self, id: InvoiceId) -> Result<Invoice, BillingError> {
        let mut tx = self.store.begin().await?;
        let result = async {
            let mut invoice = load_invoice(&mut tx, id).await?;
            if invoice.status != InvoiceStatus::Paid {
                return Err(BillingError::InvalidStatus {
                    document: "invoice",
                    number: invoice.number.clone(),
                    status: invoice.status.to_string(),
                    action: "void",
                });
            }

            let now = Utc::now();
            invoice.status = InvoiceStatus::Cancelled;
            invoice.cancelled_at = Some(now);
            tx.update_invoice(&invoice).await?;

            if let Some(request_id) = invoice.payment_request_id {
                let mut request = load_request(&mut tx, request_id).await?;
                request.status = PaymentRequestStatus::Cancelled;
                request.cancelled_at = Some(now);
                tx.update_payment_request(&request).await?;
            }

            for mut booking in tx.linked_bookings(BillingLink::Invoice(id)).await? {
                booking.invoice_id = None;
                booking.payment_request_id = None;
                booking.updated_at = now;
                tx.update_booking(&booking).await?;
            }
            Ok::<_, BillingError>(invoice)
        }
        .await;
        let invoice = uow::finish(tx, result).await?;

        info!(number = %invoice.number, "invoice voided");
        Ok(invoice)
    }

    /// Issues a paid invoice for specific sessions, outside the monthly cycle
    ///
    /// # Errors
    ///
    /// - `Validation` for an empty list, another client's booking, a
    ///   cancelled or complimentary session, or sessions with different payers
    /// - `AlreadyBilled` if a booking is linked to a document
    #[instrument(skip(self, booking_ids, reference), fields(client_id = %client_id, bookings = booking_ids.len()))]
    pub async fn create_manual_invoice(
        &self,
        client_id: ClientId,
        booking_ids: &[BookingId],
        reference: Option<String>,
    ) -> Result<Invoice, BillingError> {
        if booking_ids.is_empty() {
            return Err(BillingError::Validation("At least one booking is required".into()));
        }

        let mut tx = self.store.begin().await?;
        let result = async {
            let client = load_client(&mut tx, client_id).await?;

            let mut bookings: Vec<Booking> = Vec::with_capacity(booking_ids.len());
            for id in booking_ids {
                if bookings.iter().any(|b| b.id == *id) {
                    continue;
                }
                let booking = tx
                    .get_booking(*id)
                    .await?
                    .ok_or_else(|| BillingError::not_found("Booking", id))?;
                if booking.client_id != client_id {
                    return Err(BillingError::Validation(format!(
                        "Booking {} belongs to another client",
                        id
                    )));
                }
                if !booking.is_unbilled() {
                    return Err(BillingError::AlreadyBilled(booking.id));
                }
                if booking.status == BookingStatus::Cancelled || !booking.session_type.is_chargeable() {
                    return Err(BillingError::Validation(format!("Booking {} is not billable", id)));
                }
                bookings.push(booking);
            }

            let mut contact: Option<BillingContact> = None;
            for booking in &bookings {
                let category = self.category_of(booking)?;
                let resolved = resolve(&mut tx, client_id, category).await?;
                match contact {
                    Some(existing) if existing.payer() != resolved.payer() => {
                        return Err(BillingError::Validation(
                            "Bookings on one invoice must share a payer".into(),
                        ));
                    }
                    Some(_) => {}
                    None => contact = Some(resolved),
                }
            }
            let contact = contact.ok_or_else(|| BillingError::Validation("No billable bookings".into()))?;

            let payer = payer_details(&mut tx, &contact).await?;
            let line_items = self.price(&bookings, &client.standing_discount).await?;
            let invoice = Invoice::manual(
                client_id,
                payer,
                self.config.currency,
                line_items,
                self.config.vat.rate()?,
                reference,
            )?;
            tx.insert_invoice(&invoice).await?;

            for booking in &bookings {
                tx.link_booking(booking.id, BillingLink::Invoice(invoice.id)).await?;
            }
            Ok::<_, BillingError>(invoice)
        }
        .await;
        let invoice = uow::finish(tx, result).await?;

        info!(invoice_id = %invoice.id, number = %invoice.number, total = %invoice.total, "manual invoice issued");
        Ok(invoice)
    }

    pub async fn get_payment_request(&self, id: PaymentRequestId) -> Result<PaymentRequest, BillingError> {
        let mut tx = self.store.begin().await?;
        let result = load_request(&mut tx, id).await;
        uow::finish(tx, result).await
    }

    pub async fn list_payment_requests(&self, filter: PaymentRequestFilter) -> Result<Vec<PaymentRequest>, BillingError> {
        let mut tx = self.store.begin().await?;
        let result = tx.list_payment_requests(filter).await.map_err(BillingError::from);
        uow::finish(tx, result).await
    }

    pub async fn get_invoice(&self, id: InvoiceId) -> Result<Invoice, BillingError> {
        let mut tx = self.store.begin().await?;
        let result = load_invoice(&mut tx, id).await;
        uow::finish(tx, result).await
    }

    pub async fn list_invoices(&self, client_id: Option<ClientId>) -> Result<Vec<Invoice>, BillingError> {
        let mut tx = self.store.begin().await?;
        let result = tx.list_invoices(client_id).await.map_err(BillingError::from);
        uow::finish(tx, result).await
    }

    fn category_of(&self, booking: &Booking) -> Result<SessionCategory, BillingError> {
        booking
            .session_type
            .category()
            .ok_or_else(|| BillingError::Validation(format!("Booking {} is not billable", booking.id)))
    }

    /// Sweeps, groups by payer and issues requests inside `tx`
    async fn bill_client(
        &self,
        tx: &mut S::Tx,
        client: &Client,
        period: &BillingPeriod,
    ) -> Result<Vec<PaymentRequest>, BillingError> {
        let bookings = sweep_unbilled(tx, client.id, period.range()).await?;
        if bookings.is_empty() {
            return Err(BillingError::NoUnbilledSessions { client_id: client.id });
        }

        let mut contacts: HashMap<SessionCategory, BillingContact> = HashMap::new();
        let mut groups: Vec<(BillingContact, Vec<Booking>)> = Vec::new();
        for booking in bookings {
            let category = self.category_of(&booking)?;
            let contact = match contacts.get(&category) {
                Some(contact) => *contact,
                None => {
                    let contact = resolve(tx, client.id, category).await?;
                    contacts.insert(category, contact);
                    contact
                }
            };

            match groups.iter_mut().find(|(c, _)| c.payer() == contact.payer()) {
                Some((_, group)) => group.push(booking),
                None => groups.push((contact, vec![booking])),
            }
        }

        let vat_rate = self.config.vat.rate()?;
        let mut issued = Vec::with_capacity(groups.len());
        for (contact, bookings) in groups {
            let payer = payer_details(tx, &contact).await?;
            let line_items = self.price(&bookings, &client.standing_discount).await?;
            let request = PaymentRequest::issue(PaymentRequestDraft {
                client_id: client.id,
                contact,
                payer,
                period_start: period.start,
                period_end: period.end,
                stamp: period.stamp(),
                currency: self.config.currency,
                line_items,
                vat_rate,
                payment_terms_days: self.config.payment_terms_days,
            })?;
            tx.insert_payment_request(&request).await?;

            for booking in &bookings {
                tx.link_booking(booking.id, BillingLink::PaymentRequest(request.id)).await?;
            }
            issued.push(request);
        }
        Ok(issued)
    }

    /// Prices each booking as a line item snapshot
    async fn price(&self, bookings: &[Booking], discount: &StandingDiscount) -> Result<Vec<LineItem>, BillingError> {
        let mut rates: HashMap<SessionCategory, Money> = HashMap::new();
        let mut lines = Vec::with_capacity(bookings.len());

        for booking in bookings {
            let category = self.category_of(booking)?;
            let rate = match rates.get(&category) {
                Some(rate) => *rate,
                None => {
                    let rate = self.pricing.session_rate(category, self.config.currency).await?;
                    rates.insert(category, rate);
                    rate
                }
            };

            let unit_price = if self.config.prorate_by_duration {
                prorate(rate, booking.slot.duration_minutes(), self.config.standard_session_minutes)?
            } else {
                rate
            };
            let (discount_amount, applied) = line_discount(unit_price, discount)?;
            lines.push(LineItem::for_booking(booking, unit_price, discount_amount, applied)?);
        }
        Ok(lines)
    }

    async fn notify_payer(&self, request: &PaymentRequest) {
        let notice = Notification::new(templates::PAYMENT_REQUEST_ISSUED, request.payer.email.clone())
            .var("payer_name", &request.payer.name)
            .var("number", &request.number)
            .var("total", request.total)
            .var("due_date", request.due_date)
            .var("period_start", request.period_start)
            .var("period_end", request.period_end)
            .var("sessions", request.line_items.len());
        best_effort("notify", self.notifier.notify(notice)).await;
    }
}
