//! Payment requests and invoices
//!
//! Both documents carry a snapshot of their line items. Later price or
//! discount changes never alter an issued document; only status and
//! payment metadata change after creation.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use core_kernel::{BookingId, ClientId, Currency, InvoiceId, LineItemId, Money, MoneyError, PaymentRequestId, Rate};
use domain_booking::Booking;
use domain_client::{BillingContact, Payer};
use crate::pricing::{AppliedDiscount, Totals};

/// One billed session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub id: LineItemId,
    pub booking_id: BookingId,
    pub description: String,
    /// Date and time of the session
    pub sub_line: String,
    pub unit_price: Money,
    pub discount: Money,
    pub applied_discount: Option<AppliedDiscount>,
    pub total: Money,
}

impl LineItem {
    /// Prices `booking` at `unit_price` less `discount`
    pub fn for_booking(
        booking: &Booking,
        unit_price: Money,
        discount: Money,
        applied_discount: Option<AppliedDiscount>,
    ) -> Result<Self, MoneyError> {
        Ok(Self {
            id: LineItemId::new_v7(),
            booking_id: booking.id,
            description: booking.session_type.label().to_string(),
            sub_line: format!(
                "{} {}-{}",
                booking.slot.date.format("%a %d %b %Y"),
                booking.slot.start_time.format("%H:%M"),
                booking.slot.end_time.format("%H:%M")
            ),
            unit_price,
            discount,
            applied_discount,
            total: unit_price.checked_sub(&discount)?,
        })
    }
}

/// Payment request status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentRequestStatus {
    Pending,
    Overdue,
    Paid,
    Cancelled,
}

impl PaymentRequestStatus {
    /// Pending and overdue requests are still awaiting payment
    pub fn is_open(&self) -> bool {
        matches!(self, PaymentRequestStatus::Pending | PaymentRequestStatus::Overdue)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentRequestStatus::Pending => "pending",
            PaymentRequestStatus::Overdue => "overdue",
            PaymentRequestStatus::Paid => "paid",
            PaymentRequestStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for PaymentRequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PaymentRequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentRequestStatus::Pending),
            "overdue" => Ok(PaymentRequestStatus::Overdue),
            "paid" => Ok(PaymentRequestStatus::Paid),
            "cancelled" => Ok(PaymentRequestStatus::Cancelled),
            other => Err(format!("unknown payment request status: {}", other)),
        }
    }
}

/// A bill awaiting payment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub id: PaymentRequestId,
    pub number: String,
    /// Client whose sessions are billed
    pub client_id: ClientId,
    pub contact: BillingContact,
    pub payer: Payer,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub currency: Currency,
    pub line_items: Vec<LineItem>,
    pub gross: Money,
    pub discount_total: Money,
    pub subtotal: Money,
    pub vat_rate: Option<Rate>,
    pub vat_amount: Money,
    pub total: Money,
    pub status: PaymentRequestStatus,
    pub due_date: NaiveDate,
    pub issued_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub payment_reference: Option<String>,
    pub invoice_id: Option<InvoiceId>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

/// Everything needed to issue a payment request
#[derive(Debug, Clone)]
pub struct PaymentRequestDraft {
    pub client_id: ClientId,
    pub contact: BillingContact,
    pub payer: Payer,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    /// `YYYYMM` used in the document number
    pub stamp: String,
    pub currency: Currency,
    pub line_items: Vec<LineItem>,
    pub vat_rate: Option<Rate>,
    pub payment_terms_days: i64,
}

impl PaymentRequest {
    /// Issues a pending payment request from a draft
    pub fn issue(draft: PaymentRequestDraft) -> Result<Self, MoneyError> {
        let totals = totals_of(draft.currency, &draft.line_items, draft.vat_rate)?;
        let id = PaymentRequestId::new_v7();
        let issued_at = Utc::now();

        Ok(Self {
            id,
            number: format!("PR-{}-{}", draft.stamp, id.short()),
            client_id: draft.client_id,
            contact: draft.contact,
            payer: draft.payer,
            period_start: draft.period_start,
            period_end: draft.period_end,
            currency: draft.currency,
            line_items: draft.line_items,
            gross: totals.gross,
            discount_total: totals.discount,
            subtotal: totals.subtotal,
            vat_rate: totals.vat_rate,
            vat_amount: totals.vat,
            total: totals.total,
            status: PaymentRequestStatus::Pending,
            due_date: issued_at.date_naive() + Duration::days(draft.payment_terms_days),
            issued_at,
            paid_at: None,
            payment_reference: None,
            invoice_id: None,
            cancelled_at: None,
        })
    }

    pub fn booking_ids(&self) -> Vec<BookingId> {
        self.line_items.iter().map(|line| line.booking_id).collect()
    }

    /// Pending and past its due date on `as_of`
    pub fn is_past_due(&self, as_of: NaiveDate) -> bool {
        self.status == PaymentRequestStatus::Pending && self.due_date < as_of
    }
}

/// Invoice status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Paid,
    Cancelled,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for InvoiceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "paid" => Ok(InvoiceStatus::Paid),
            "cancelled" => Ok(InvoiceStatus::Cancelled),
            other => Err(format!("unknown invoice status: {}", other)),
        }
    }
}

/// A finalized, paid bill
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    pub number: String,
    pub client_id: ClientId,
    /// Set when the invoice settles a payment request
    pub payment_request_id: Option<PaymentRequestId>,
    pub payer: Payer,
    pub currency: Currency,
    pub line_items: Vec<LineItem>,
    pub gross: Money,
    pub discount_total: Money,
    pub subtotal: Money,
    pub vat_rate: Option<Rate>,
    pub vat_amount: Money,
    pub total: Money,
    pub status: InvoiceStatus,
    pub payment_reference: Option<String>,
    pub issued_at: DateTime<Utc>,
    pub paid_at: DateTime<Utc>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Invoice {
    /// Finalizes a paid payment request, copying its snapshot
    pub fn settle(request: &PaymentRequest, reference: Option<String>, paid_at: DateTime<Utc>) -> Self {
        let id = InvoiceId::new_v7();
        Self {
            id,
            number: format!("INV-{}-{}", request.period_start.format("%Y%m"), id.short()),
            client_id: request.client_id,
            payment_request_id: Some(request.id),
            payer: request.payer.clone(),
            currency: request.currency,
            line_items: request.line_items.clone(),
            gross: request.gross,
            discount_total: request.discount_total,
            subtotal: request.subtotal,
            vat_rate: request.vat_rate,
            vat_amount: request.vat_amount,
            total: request.total,
            status: InvoiceStatus::Paid,
            payment_reference: reference,
            issued_at: paid_at,
            paid_at,
            cancelled_at: None,
        }
    }

    /// Issues a paid invoice directly, without a payment request
    pub fn manual(
        client_id: ClientId,
        payer: Payer,
        currency: Currency,
        line_items: Vec<LineItem>,
        vat_rate: Option<Rate>,
        reference: Option<String>,
    ) -> Result<Self, MoneyError> {
        let totals = totals_of(currency, &line_items, vat_rate)?;
        let id = InvoiceId::new_v7();
        let paid_at = Utc::now();

        Ok(Self {
            id,
            number: format!("INV-{}-{}", paid_at.format("%Y%m"), id.short()),
            client_id,
            payment_request_id: None,
            payer,
            currency,
            line_items,
            gross: totals.gross,
            discount_total: totals.discount,
            subtotal: totals.subtotal,
            vat_rate: totals.vat_rate,
            vat_amount: totals.vat,
            total: totals.total,
            status: InvoiceStatus::Paid,
            payment_reference: reference,
            issued_at: paid_at,
            paid_at,
            cancelled_at: None,
        })
    }

    pub fn booking_ids(&self) -> Vec<BookingId> {
        self.line_items.iter().map(|line| line.booking_id).collect()
    }
}

fn totals_of(currency: Currency, line_items: &[LineItem], vat_rate: Option<Rate>) -> Result<Totals, MoneyError> {
    let amounts: Vec<(Money, Money)> = line_items
        .iter()
        .map(|line| (line.unit_price, line.discount))
        .collect();
    Totals::compute(currency, &amounts, vat_rate)
}
