//! Slot availability backed by PostgreSQL
//!
//! A slot is available when it falls on a working day inside business
//! hours, no admin day block covers it, and no active booking overlaps it.
//! The check runs on its own pooled connection. The scheduler repeats the
//! overlap test inside its unit of work before consulting this adapter, and
//! the booking constraints decide between two concurrent inserts.

use async_trait::async_trait;
use chrono::{NaiveTime, Utc, Weekday, Datelike};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use uuid::Uuid;

use core_kernel::{
    AdapterHealth, BookingId, DomainPort, HealthCheckResult, HealthCheckable, PortError, TimeSlot,
};
use domain_booking::{AvailabilityPort, SessionType};

use crate::error::port_err;
use crate::pool::DatabasePool;

/// Opening hours of the practice
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusinessHours {
    pub opens_at: NaiveTime,
    pub closes_at: NaiveTime,
    pub working_days: Vec<Weekday>,
}

impl Default for BusinessHours {
    fn default() -> Self {
        Self {
            opens_at: NaiveTime::from_hms_opt(8, 0, 0).unwrap_or(NaiveTime::MIN),
            closes_at: NaiveTime::from_hms_opt(18, 0, 0).unwrap_or(NaiveTime::MIN),
            working_days: vec![Weekday::Mon, Weekday::Tue, Weekday::Wed, Weekday::Thu, Weekday::Fri],
        }
    }
}

impl BusinessHours {
    /// Returns true if the whole slot lies inside opening hours on a working day
    pub fn admits(&self, slot: &TimeSlot) -> bool {
        self.working_days.contains(&slot.date.weekday())
            && slot.start_time >= self.opens_at
            && slot.end_time <= self.closes_at
    }
}

/// Availability adapter over `day_blocks` and `bookings`
#[derive(Debug, Clone)]
pub struct PgAvailability {
    pool: DatabasePool,
    hours: BusinessHours,
}

impl PgAvailability {
    pub fn new(pool: DatabasePool, hours: BusinessHours) -> Self {
        Self { pool, hours }
    }

    /// Blocks part of a day, or the whole day when no times are given
    #[instrument(skip(self, reason))]
    pub async fn block(
        &self,
        date: chrono::NaiveDate,
        times: Option<(NaiveTime, NaiveTime)>,
        reason: Option<String>,
    ) -> Result<Uuid, PortError> {
        let id = Uuid::now_v7();
        sqlx::query(
            "INSERT INTO day_blocks (id, block_date, start_time, end_time, reason) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(id)
        .bind(date)
        .bind(times.map(|(start, _)| start))
        .bind(times.map(|(_, end)| end))
        .bind(reason)
        .execute(&self.pool)
        .await
        .map_err(port_err)?;
        Ok(id)
    }
}

impl DomainPort for PgAvailability {}

#[async_trait]
impl AvailabilityPort for PgAvailability {
    #[instrument(skip(self), fields(date = %slot.date, start = %slot.start_time))]
    async fn is_slot_available(
        &self,
        slot: &TimeSlot,
        session_type: SessionType,
        ignore: Option<BookingId>,
    ) -> Result<bool, PortError> {
        if !self.hours.admits(slot) {
            debug!("outside business hours");
            return Ok(false);
        }

        let blocked: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM day_blocks WHERE block_date = $1 \
                 AND (start_time IS NULL OR (start_time < $3 AND $2 < end_time)))",
        )
        .bind(slot.date)
        .bind(slot.start_time)
        .bind(slot.end_time)
        .fetch_one(&self.pool)
        .await
        .map_err(port_err)?;
        if blocked {
            debug!("day block covers slot");
            return Ok(false);
        }

        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM bookings WHERE session_date = $1 AND status <> 'cancelled' \
                 AND start_time < $3 AND $2 < end_time AND ($4::uuid IS NULL OR id <> $4))",
        )
        .bind(slot.date)
        .bind(slot.start_time)
        .bind(slot.end_time)
        .bind(ignore.map(Uuid::from))
        .fetch_one(&self.pool)
        .await
        .map_err(port_err)?;

        debug!(session_type = session_type.as_str(), taken, "slot checked");
        Ok(!taken)
    }
}

#[async_trait]
impl HealthCheckable for PgAvailability {
    async fn health_check(&self) -> HealthCheckResult {
        let start = std::time::Instant::now();
        let result = sqlx::query_scalar::<_, i64>("SELECT count(*) FROM day_blocks WHERE block_date >= CURRENT_DATE")
            .fetch_one(&self.pool)
            .await;
        let latency_ms = start.elapsed().as_millis() as u64;

        let (status, message) = match result {
            Ok(_) => (AdapterHealth::Healthy, None),
            Err(e) => (AdapterHealth::Unhealthy, Some(format!("Database error: {}", e))),
        };
        HealthCheckResult {
            adapter_id: "postgres-availability".to_string(),
            status,
            latency_ms,
            message,
            checked_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn slot(day: u32, start: u32, end: u32) -> TimeSlot {
        TimeSlot::new(
            NaiveDate::from_ymd_opt(2025, 3, day).unwrap(),
            NaiveTime::from_hms_opt(start, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(end, 0, 0).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_business_hours_admit_weekday_slot() {
        let hours = BusinessHours::default();
        // 2025-03-03 is a Monday
        assert!(hours.admits(&slot(3, 8, 9)));
        assert!(hours.admits(&slot(3, 17, 18)));
    }

    #[test]
    fn test_business_hours_reject_edges_and_weekends() {
        let hours = BusinessHours::default();
        assert!(!hours.admits(&slot(3, 7, 8)));
        assert!(!hours.admits(&slot(3, 17, 19)));
        assert!(!hours.admits(&slot(8, 10, 11)));
    }

    #[test]
    fn test_business_hours_deserialize_with_defaults() {
        let hours: BusinessHours = serde_json::from_str(r#"{"working_days": ["Sat"]}"#).unwrap();
        assert_eq!(hours.working_days, vec![Weekday::Sat]);
        assert_eq!(hours.opens_at, NaiveTime::from_hms_opt(8, 0, 0).unwrap());
    }
}
