//! Payment requests and invoices
//!
//! Contact, payer and line items are stored as JSONB snapshots written once
//! at insert. Updates only touch status and payment metadata.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use tracing::instrument;
use uuid::Uuid;

use core_kernel::{BookingId, ClientId, Currency, DateRange, InvoiceId, Money, PaymentRequestId, PortError, Rate};
use domain_billing::{BillingLink, BillingTx, Invoice, LineItem, PaymentRequest, PaymentRequestFilter};
use domain_booking::Booking;
use domain_client::{BillingContact, Payer};

use crate::error::{port_err, DatabaseError};
use crate::repositories::booking::{rows_to_bookings, BookingRow, BOOKING_COLUMNS};
use crate::repositories::parse_column;
use crate::store::PgUnitOfWork;

const PAYMENT_REQUEST_COLUMNS: &str = "id, number, client_id, contact, payer, period_start, period_end, \
     currency, line_items, gross_minor, discount_minor, subtotal_minor, vat_rate, vat_minor, total_minor, \
     status, due_date, issued_at, paid_at, payment_reference, invoice_id, cancelled_at";

const INVOICE_COLUMNS: &str = "id, number, client_id, payment_request_id, payer, currency, line_items, \
     gross_minor, discount_minor, subtotal_minor, vat_rate, vat_minor, total_minor, status, \
     payment_reference, issued_at, paid_at, cancelled_at";

/// Amount columns shared by both documents
struct Amounts {
    currency: Currency,
    gross: Money,
    discount_total: Money,
    subtotal: Money,
    vat_rate: Option<Rate>,
    vat_amount: Money,
    total: Money,
}

impl Amounts {
    fn read(
        table: &str,
        currency: &str,
        [gross, discount, subtotal, vat, total]: [i64; 5],
        vat_rate: Option<Decimal>,
    ) -> Result<Self, DatabaseError> {
        let currency: Currency = parse_column(&format!("{table}.currency"), currency)?;
        let vat_rate = vat_rate
            .map(Rate::new)
            .transpose()
            .map_err(|e| DatabaseError::corrupt(&format!("{table}.vat_rate"), e))?;
        let money = |minor| Money::from_minor(minor, currency);
        Ok(Self {
            currency,
            gross: money(gross),
            discount_total: money(discount),
            subtotal: money(subtotal),
            vat_rate,
            vat_amount: money(vat),
            total: money(total),
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct PaymentRequestRow {
    pub id: Uuid,
    pub number: String,
    pub client_id: Uuid,
    pub contact: Json<BillingContact>,
    pub payer: Json<Payer>,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub currency: String,
    pub line_items: Json<Vec<LineItem>>,
    pub gross_minor: i64,
    pub discount_minor: i64,
    pub subtotal_minor: i64,
    pub vat_rate: Option<Decimal>,
    pub vat_minor: i64,
    pub total_minor: i64,
    pub status: String,
    pub due_date: NaiveDate,
    pub issued_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub payment_reference: Option<String>,
    pub invoice_id: Option<Uuid>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl TryFrom<PaymentRequestRow> for PaymentRequest {
    type Error = DatabaseError;

    fn try_from(row: PaymentRequestRow) -> Result<Self, Self::Error> {
        let amounts = Amounts::read(
            "payment_requests",
            &row.currency,
            [row.gross_minor, row.discount_minor, row.subtotal_minor, row.vat_minor, row.total_minor],
            row.vat_rate,
        )?;

        Ok(PaymentRequest {
            id: PaymentRequestId::from_uuid(row.id),
            number: row.number,
            client_id: ClientId::from_uuid(row.client_id),
            contact: row.contact.0,
            payer: row.payer.0,
            period_start: row.period_start,
            period_end: row.period_end,
            currency: amounts.currency,
            line_items: row.line_items.0,
            gross: amounts.gross,
            discount_total: amounts.discount_total,
            subtotal: amounts.subtotal,
            vat_rate: amounts.vat_rate,
            vat_amount: amounts.vat_amount,
            total: amounts.total,
            status: parse_column("payment_requests.status", &row.status)?,
            due_date: row.due_date,
            issued_at: row.issued_at,
            paid_at: row.paid_at,
            payment_reference: row.payment_reference,
            invoice_id: row.invoice_id.map(InvoiceId::from_uuid),
            cancelled_at: row.cancelled_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct InvoiceRow {
    pub id: Uuid,
    pub number: String,
    pub client_id: Uuid,
    pub payment_request_id: Option<Uuid>,
    pub payer: Json<Payer>,
    pub currency: String,
    pub line_items: Json<Vec<LineItem>>,
    pub gross_minor: i64,
    pub discount_minor: i64,
    pub subtotal_minor: i64,
    pub vat_rate: Option<Decimal>,
    pub vat_minor: i64,
    pub total_minor: i64,
    pub status: String,
    pub payment_reference: Option<String>,
    pub issued_at: DateTime<Utc>,
    pub paid_at: DateTime<Utc>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl TryFrom<InvoiceRow> for Invoice {
    type Error = DatabaseError;

    fn try_from(row: InvoiceRow) -> Result<Self, Self::Error> {
        let amounts = Amounts::read(
            "invoices",
            &row.currency,
            [row.gross_minor, row.discount_minor, row.subtotal_minor, row.vat_minor, row.total_minor],
            row.vat_rate,
        )?;

        Ok(Invoice {
            id: InvoiceId::from_uuid(row.id),
            number: row.number,
            client_id: ClientId::from_uuid(row.client_id),
            payment_request_id: row.payment_request_id.map(PaymentRequestId::from_uuid),
            payer: row.payer.0,
            currency: amounts.currency,
            line_items: row.line_items.0,
            gross: amounts.gross,
            discount_total: amounts.discount_total,
            subtotal: amounts.subtotal,
            vat_rate: amounts.vat_rate,
            vat_amount: amounts.vat_amount,
            total: amounts.total,
            status: parse_column("invoices.status", &row.status)?,
            payment_reference: row.payment_reference,
            issued_at: row.issued_at,
            paid_at: row.paid_at,
            cancelled_at: row.cancelled_at,
        })
    }
}

#[async_trait]
impl BillingTx for PgUnitOfWork {
    #[instrument(skip(self, request), fields(payment_request_id = %request.id, number = %request.number))]
    async fn insert_payment_request(&mut self, request: &PaymentRequest) -> Result<(), PortError> {
        sqlx::query(
            "INSERT INTO payment_requests (id, number, client_id, contact, payer, period_start, period_end, \
                 currency, line_items, gross_minor, discount_minor, subtotal_minor, vat_rate, vat_minor, \
                 total_minor, status, due_date, issued_at, paid_at, payment_reference, invoice_id, cancelled_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, \
                 $19, $20, $21, $22)",
        )
        .bind(request.id.as_uuid())
        .bind(&request.number)
        .bind(request.client_id.as_uuid())
        .bind(Json(&request.contact))
        .bind(Json(&request.payer))
        .bind(request.period_start)
        .bind(request.period_end)
        .bind(request.currency.code())
        .bind(Json(&request.line_items))
        .bind(request.gross.minor())
        .bind(request.discount_total.minor())
        .bind(request.subtotal.minor())
        .bind(request.vat_rate.map(|r| r.as_decimal()))
        .bind(request.vat_amount.minor())
        .bind(request.total.minor())
        .bind(request.status.as_str())
        .bind(request.due_date)
        .bind(request.issued_at)
        .bind(request.paid_at)
        .bind(&request.payment_reference)
        .bind(request.invoice_id.map(Uuid::from))
        .bind(request.cancelled_at)
        .execute(&mut *self.tx)
        .await
        .map_err(port_err)?;
        Ok(())
    }

    #[instrument(skip(self, request), fields(payment_request_id = %request.id, status = request.status.as_str()))]
    async fn update_payment_request(&mut self, request: &PaymentRequest) -> Result<(), PortError> {
        let result = sqlx::query(
            "UPDATE payment_requests SET status = $2, paid_at = $3, payment_reference = $4, \
                 invoice_id = $5, cancelled_at = $6 \
             WHERE id = $1",
        )
        .bind(request.id.as_uuid())
        .bind(request.status.as_str())
        .bind(request.paid_at)
        .bind(&request.payment_reference)
        .bind(request.invoice_id.map(Uuid::from))
        .bind(request.cancelled_at)
        .execute(&mut *self.tx)
        .await
        .map_err(port_err)?;

        if result.rows_affected() == 0 {
            return Err(PortError::not_found("PaymentRequest", request.id));
        }
        Ok(())
    }

    async fn get_payment_request(&mut self, id: PaymentRequestId) -> Result<Option<PaymentRequest>, PortError> {
        let sql = format!("SELECT {PAYMENT_REQUEST_COLUMNS} FROM payment_requests WHERE id = $1 FOR UPDATE");
        let row = sqlx::query_as::<_, PaymentRequestRow>(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(port_err)?;

        row.map(PaymentRequest::try_from).transpose().map_err(PortError::from)
    }

    async fn list_payment_requests(&mut self, filter: PaymentRequestFilter) -> Result<Vec<PaymentRequest>, PortError> {
        let sql = format!(
            "SELECT {PAYMENT_REQUEST_COLUMNS} FROM payment_requests \
             WHERE ($1::uuid IS NULL OR client_id = $1) AND ($2::text IS NULL OR status = $2) \
             ORDER BY issued_at DESC, id DESC"
        );
        let rows = sqlx::query_as::<_, PaymentRequestRow>(&sql)
            .bind(filter.client_id.map(Uuid::from))
            .bind(filter.status.map(|s| s.as_str()))
            .fetch_all(&mut *self.tx)
            .await
            .map_err(port_err)?;

        rows.into_iter()
            .map(|row| PaymentRequest::try_from(row).map_err(PortError::from))
            .collect()
    }

    #[instrument(skip(self, invoice), fields(invoice_id = %invoice.id, number = %invoice.number))]
    async fn insert_invoice(&mut self, invoice: &Invoice) -> Result<(), PortError> {
        sqlx::query(
            "INSERT INTO invoices (id, number, client_id, payment_request_id, payer, currency, line_items, \
                 gross_minor, discount_minor, subtotal_minor, vat_rate, vat_minor, total_minor, status, \
                 payment_reference, issued_at, paid_at, cancelled_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)",
        )
        .bind(invoice.id.as_uuid())
        .bind(&invoice.number)
        .bind(invoice.client_id.as_uuid())
        .bind(invoice.payment_request_id.map(Uuid::from))
        .bind(Json(&invoice.payer))
        .bind(invoice.currency.code())
        .bind(Json(&invoice.line_items))
        .bind(invoice.gross.minor())
        .bind(invoice.discount_total.minor())
        .bind(invoice.subtotal.minor())
        .bind(invoice.vat_rate.map(|r| r.as_decimal()))
        .bind(invoice.vat_amount.minor())
        .bind(invoice.total.minor())
        .bind(invoice.status.as_str())
        .bind(&invoice.payment_reference)
        .bind(invoice.issued_at)
        .bind(invoice.paid_at)
        .bind(invoice.cancelled_at)
        .execute(&mut *self.tx)
        .await
        .map_err(port_err)?;
        Ok(())
    }

    #[instrument(skip(self, invoice), fields(invoice_id = %invoice.id, status = invoice.status.as_str()))]
    async fn update_invoice(&mut self, invoice: &Invoice) -> Result<(), PortError> {
        let result = sqlx::query(
            "UPDATE invoices SET status = $2, payment_reference = $3, cancelled_at = $4 WHERE id = $1",
        )
        .bind(invoice.id.as_uuid())
        .bind(invoice.status.as_str())
        .bind(&invoice.payment_reference)
        .bind(invoice.cancelled_at)
        .execute(&mut *self.tx)
        .await
        .map_err(port_err)?;

        if result.rows_affected() == 0 {
            return Err(PortError::not_found("Invoice", invoice.id));
        }
        Ok(())
    }

    async fn get_invoice(&mut self, id: InvoiceId) -> Result<Option<Invoice>, PortError> {
        let sql = format!("SELECT {INVOICE_COLUMNS} FROM invoices WHERE id = $1 FOR UPDATE");
        let row = sqlx::query_as::<_, InvoiceRow>(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(port_err)?;

        row.map(Invoice::try_from).transpose().map_err(PortError::from)
    }

    async fn list_invoices(&mut self, client_id: Option<ClientId>) -> Result<Vec<Invoice>, PortError> {
        let sql = format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices \
             WHERE ($1::uuid IS NULL OR client_id = $1) ORDER BY issued_at DESC, id DESC"
        );
        let rows = sqlx::query_as::<_, InvoiceRow>(&sql)
            .bind(client_id.map(Uuid::from))
            .fetch_all(&mut *self.tx)
            .await
            .map_err(port_err)?;

        rows.into_iter()
            .map(|row| Invoice::try_from(row).map_err(PortError::from))
            .collect()
    }

    async fn linked_bookings(&mut self, link: BillingLink) -> Result<Vec<Booking>, PortError> {
        let (column, id): (&str, Uuid) = match link {
            BillingLink::PaymentRequest(id) => ("payment_request_id", id.into()),
            BillingLink::Invoice(id) => ("invoice_id", id.into()),
        };
        let sql = format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE {column} = $1 \
             ORDER BY session_date, start_time FOR UPDATE"
        );
        let rows = sqlx::query_as::<_, BookingRow>(&sql)
            .bind(id)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(port_err)?;

        rows_to_bookings(rows)
    }

    #[instrument(skip(self), fields(client_id = %client_id))]
    async fn unbilled_bookings(&mut self, client_id: ClientId, range: DateRange) -> Result<Vec<Booking>, PortError> {
        let sql = format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings \
             WHERE client_id = $1 AND session_date BETWEEN $2 AND $3 \
               AND payment_request_id IS NULL AND invoice_id IS NULL AND status <> 'cancelled' \
             ORDER BY session_date, start_time FOR UPDATE"
        );
        let rows = sqlx::query_as::<_, BookingRow>(&sql)
            .bind(client_id.as_uuid())
            .bind(range.start)
            .bind(range.end)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(port_err)?;

        rows_to_bookings(rows)
    }

    #[instrument(skip(self), fields(booking_id = %booking_id))]
    async fn link_booking(&mut self, booking_id: BookingId, link: BillingLink) -> Result<(), PortError> {
        let (column, id): (&str, Uuid) = match link {
            BillingLink::PaymentRequest(id) => ("payment_request_id", id.into()),
            BillingLink::Invoice(id) => ("invoice_id", id.into()),
        };
        let sql = format!(
            "UPDATE bookings SET {column} = $2, updated_at = NOW() \
             WHERE id = $1 AND payment_request_id IS NULL AND invoice_id IS NULL AND status <> 'cancelled'"
        );
        let result = sqlx::query(&sql)
            .bind(booking_id.as_uuid())
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .map_err(port_err)?;

        if result.rows_affected() == 0 {
            return Err(PortError::conflict(format!(
                "booking {} was cancelled or billed concurrently",
                booking_id
            )));
        }
        Ok(())
    }
}
