//! Bookings
//!
//! Slot exclusivity is enforced by the `bookings_active_slot` unique index
//! and the `bookings_no_overlap` exclusion constraint; a write that would
//! double-book fails with `PortError::Conflict`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use tracing::instrument;
use uuid::Uuid;

use core_kernel::{BookingId, ClientId, DateRange, InvoiceId, PaymentRequestId, PortError, SeriesId, TimeSlot};
use domain_booking::{Booking, BookingTx, CalendarEventRef};

use crate::error::{port_err, DatabaseError};
use crate::repositories::parse_column;
use crate::store::PgUnitOfWork;

pub(crate) const BOOKING_COLUMNS: &str = "id, client_id, session_type, session_date, start_time, end_time, \
     status, series_id, original_date, original_start_time, reschedule_count, cancelled_by, \
     is_late_cancel, credit_deducted, credit_refunded, calendar_event_id, meeting_url, \
     payment_request_id, invoice_id, notes, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
pub struct BookingRow {
    pub id: Uuid,
    pub client_id: Uuid,
    pub session_type: String,
    pub session_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub status: String,
    pub series_id: Option<Uuid>,
    pub original_date: Option<NaiveDate>,
    pub original_start_time: Option<NaiveTime>,
    pub reschedule_count: i32,
    pub cancelled_by: Option<String>,
    pub is_late_cancel: bool,
    pub credit_deducted: bool,
    pub credit_refunded: bool,
    pub calendar_event_id: Option<String>,
    pub meeting_url: Option<String>,
    pub payment_request_id: Option<Uuid>,
    pub invoice_id: Option<Uuid>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<BookingRow> for Booking {
    type Error = DatabaseError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        let slot = TimeSlot::new(row.session_date, row.start_time, row.end_time)
            .map_err(|e| DatabaseError::corrupt("bookings.start_time", e))?;
        let cancelled_by = row
            .cancelled_by
            .as_deref()
            .map(|value| parse_column("bookings.cancelled_by", value))
            .transpose()?;
        let reschedule_count = u32::try_from(row.reschedule_count)
            .map_err(|e| DatabaseError::corrupt("bookings.reschedule_count", e))?;

        Ok(Booking {
            id: BookingId::from_uuid(row.id),
            client_id: ClientId::from_uuid(row.client_id),
            session_type: parse_column("bookings.session_type", &row.session_type)?,
            slot,
            status: parse_column("bookings.status", &row.status)?,
            series_id: row.series_id.map(SeriesId::from_uuid),
            original_date: row.original_date,
            original_start_time: row.original_start_time,
            reschedule_count,
            cancelled_by,
            is_late_cancel: row.is_late_cancel,
            credit_deducted: row.credit_deducted,
            credit_refunded: row.credit_refunded,
            calendar_event: row.calendar_event_id.map(|event_id| CalendarEventRef {
                event_id,
                meeting_url: row.meeting_url,
            }),
            payment_request_id: row.payment_request_id.map(PaymentRequestId::from_uuid),
            invoice_id: row.invoice_id.map(InvoiceId::from_uuid),
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

pub(crate) fn rows_to_bookings(rows: Vec<BookingRow>) -> Result<Vec<Booking>, PortError> {
    rows.into_iter()
        .map(|row| Booking::try_from(row).map_err(PortError::from))
        .collect()
}

#[async_trait]
impl BookingTx for PgUnitOfWork {
    #[instrument(skip(self), fields(booking_id = %id))]
    async fn get_booking(&mut self, id: BookingId) -> Result<Option<Booking>, PortError> {
        let sql = format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1 FOR UPDATE");
        let row = sqlx::query_as::<_, BookingRow>(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(port_err)?;

        row.map(Booking::try_from).transpose().map_err(PortError::from)
    }

    #[instrument(skip(self, booking), fields(booking_id = %booking.id, client_id = %booking.client_id))]
    async fn insert_booking(&mut self, booking: &Booking) -> Result<(), PortError> {
        sqlx::query(
            "INSERT INTO bookings (id, client_id, session_type, session_date, start_time, end_time, \
                 status, series_id, original_date, original_start_time, reschedule_count, cancelled_by, \
                 is_late_cancel, credit_deducted, credit_refunded, calendar_event_id, meeting_url, \
                 payment_request_id, invoice_id, notes, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, \
                 $18, $19, $20, $21, $22)",
        )
        .bind(booking.id.as_uuid())
        .bind(booking.client_id.as_uuid())
        .bind(booking.session_type.as_str())
        .bind(booking.slot.date)
        .bind(booking.slot.start_time)
        .bind(booking.slot.end_time)
        .bind(booking.status.as_str())
        .bind(booking.series_id.map(Uuid::from))
        .bind(booking.original_date)
        .bind(booking.original_start_time)
        .bind(booking.reschedule_count as i32)
        .bind(booking.cancelled_by.map(|c| c.as_str()))
        .bind(booking.is_late_cancel)
        .bind(booking.credit_deducted)
        .bind(booking.credit_refunded)
        .bind(booking.calendar_event.as_ref().map(|e| e.event_id.as_str()))
        .bind(booking.calendar_event.as_ref().and_then(|e| e.meeting_url.as_deref()))
        .bind(booking.payment_request_id.map(Uuid::from))
        .bind(booking.invoice_id.map(Uuid::from))
        .bind(&booking.notes)
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(port_err)?;
        Ok(())
    }

    #[instrument(skip(self, booking), fields(booking_id = %booking.id, status = booking.status.as_str()))]
    async fn update_booking(&mut self, booking: &Booking) -> Result<(), PortError> {
        let result = sqlx::query(
            "UPDATE bookings SET session_type = $2, session_date = $3, start_time = $4, end_time = $5, \
                 status = $6, original_date = $7, original_start_time = $8, reschedule_count = $9, \
                 cancelled_by = $10, is_late_cancel = $11, credit_deducted = $12, credit_refunded = $13, \
                 calendar_event_id = $14, meeting_url = $15, payment_request_id = $16, invoice_id = $17, \
                 notes = $18, updated_at = $19 \
             WHERE id = $1",
        )
        .bind(booking.id.as_uuid())
        .bind(booking.session_type.as_str())
        .bind(booking.slot.date)
        .bind(booking.slot.start_time)
        .bind(booking.slot.end_time)
        .bind(booking.status.as_str())
        .bind(booking.original_date)
        .bind(booking.original_start_time)
        .bind(booking.reschedule_count as i32)
        .bind(booking.cancelled_by.map(|c| c.as_str()))
        .bind(booking.is_late_cancel)
        .bind(booking.credit_deducted)
        .bind(booking.credit_refunded)
        .bind(booking.calendar_event.as_ref().map(|e| e.event_id.as_str()))
        .bind(booking.calendar_event.as_ref().and_then(|e| e.meeting_url.as_deref()))
        .bind(booking.payment_request_id.map(Uuid::from))
        .bind(booking.invoice_id.map(Uuid::from))
        .bind(&booking.notes)
        .bind(booking.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(port_err)?;

        if result.rows_affected() == 0 {
            return Err(PortError::not_found("Booking", booking.id));
        }
        Ok(())
    }

    #[instrument(skip(self), fields(booking_id = %id))]
    async fn delete_booking(&mut self, id: BookingId) -> Result<(), PortError> {
        sqlx::query("DELETE FROM bookings WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *self.tx)
            .await
            .map_err(port_err)?;
        Ok(())
    }

    async fn series_bookings(&mut self, series_id: SeriesId) -> Result<Vec<Booking>, PortError> {
        let sql = format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE series_id = $1 ORDER BY session_date, start_time"
        );
        let rows = sqlx::query_as::<_, BookingRow>(&sql)
            .bind(series_id.as_uuid())
            .fetch_all(&mut *self.tx)
            .await
            .map_err(port_err)?;

        rows_to_bookings(rows)
    }

    async fn client_bookings(&mut self, client_id: ClientId, range: DateRange) -> Result<Vec<Booking>, PortError> {
        let sql = format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings \
             WHERE client_id = $1 AND session_date BETWEEN $2 AND $3 \
             ORDER BY session_date, start_time"
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

    async fn overlapping_bookings(
        &mut self,
        slot: &TimeSlot,
        ignore: Option<BookingId>,
    ) -> Result<Vec<Booking>, PortError> {
        let sql = format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings \
             WHERE session_date = $1 AND status <> 'cancelled' \
               AND start_time < $3 AND $2 < end_time AND ($4::uuid IS NULL OR id <> $4) \
             ORDER BY start_time"
        );
        let rows = sqlx::query_as::<_, BookingRow>(&sql)
            .bind(slot.date)
            .bind(slot.start_time)
            .bind(slot.end_time)
            .bind(ignore.map(Uuid::from))
            .fetch_all(&mut *self.tx)
            .await
            .map_err(port_err)?;

        rows_to_bookings(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain_booking::{BookingStatus, CancelledBy, SessionType};

    fn row() -> BookingRow {
        BookingRow {
            id: Uuid::now_v7(),
            client_id: Uuid::now_v7(),
            session_type: "couples".into(),
            session_date: NaiveDate::from_ymd_opt(2025, 3, 3).unwrap(),
            start_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(11, 0, 0).unwrap(),
            status: "cancelled".into(),
            series_id: None,
            original_date: None,
            original_start_time: None,
            reschedule_count: 1,
            cancelled_by: Some("client".into()),
            is_late_cancel: true,
            credit_deducted: true,
            credit_refunded: false,
            calendar_event_id: Some("evt-1".into()),
            meeting_url: None,
            payment_request_id: None,
            invoice_id: None,
            notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_booking_row_maps_enums_and_event() {
        let booking = Booking::try_from(row()).unwrap();
        assert_eq!(booking.session_type, SessionType::Couples);
        assert_eq!(booking.status, BookingStatus::Cancelled);
        assert_eq!(booking.cancelled_by, Some(CancelledBy::Client));
        assert_eq!(booking.calendar_event.unwrap().event_id, "evt-1");
        assert_eq!(booking.slot.duration_minutes(), 60);
    }

    #[test]
    fn test_inverted_slot_is_rejected() {
        let mut bad = row();
        bad.end_time = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
        assert!(Booking::try_from(bad).is_err());
    }

    #[test]
    fn test_negative_reschedule_count_is_rejected() {
        let mut bad = row();
        bad.reschedule_count = -1;
        assert!(Booking::try_from(bad).is_err());
    }
}
