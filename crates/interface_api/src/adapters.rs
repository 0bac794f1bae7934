//! Default collaborator adapters
//!
//! Used when no external calendar or mail provider is wired in:
//! notifications go to the log, calendar events get local ids, and
//! session rates come from configuration.

use async_trait::async_trait;
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use core_kernel::{
    AdapterHealth, Currency, DomainPort, HealthCheckResult, HealthCheckable, Money, PortError,
};
use domain_billing::PricingPort;
use domain_booking::{CalendarEvent, CalendarEventRequest, CalendarPort, Notification, NotificationPort};
use domain_client::SessionCategory;

use crate::config::PricingConfig;

/// Writes each notification to the log instead of sending it
#[derive(Debug, Default, Clone)]
pub struct LoggingNotifier;

impl DomainPort for LoggingNotifier {}

#[async_trait]
impl NotificationPort for LoggingNotifier {
    async fn notify(&self, notification: Notification) -> Result<(), PortError> {
        info!(
            template = %notification.template_key,
            recipient = %notification.recipient,
            variables = ?notification.variables,
            "notification"
        );
        Ok(())
    }
}

/// Calendar without a provider: events exist only as local ids
#[derive(Debug, Default, Clone)]
pub struct LocalCalendar;

impl DomainPort for LocalCalendar {}

#[async_trait]
impl CalendarPort for LocalCalendar {
    async fn create_event(&self, request: &CalendarEventRequest) -> Result<CalendarEvent, PortError> {
        let event_id = format!("local-{}", Uuid::new_v4().simple());
        info!(event_id = %event_id, subject = %request.subject, starts_at = %request.starts_at, "calendar event");
        Ok(CalendarEvent {
            event_id,
            meeting_url: None,
        })
    }

    async fn cancel_event(&self, event_id: &str) -> Result<(), PortError> {
        info!(event_id = %event_id, "calendar event cancelled");
        Ok(())
    }
}

/// Flat session rates from [`PricingConfig`]
#[derive(Debug, Clone)]
pub struct ConfiguredPricing {
    config: PricingConfig,
}

impl ConfiguredPricing {
    pub fn new(config: PricingConfig) -> Self {
        Self { config }
    }
}

impl DomainPort for ConfiguredPricing {}

#[async_trait]
impl PricingPort for ConfiguredPricing {
    async fn session_rate(&self, category: SessionCategory, currency: Currency) -> Result<Money, PortError> {
        if currency != self.config.currency {
            return Err(PortError::validation(format!(
                "no session rate configured in {}",
                currency.code()
            )));
        }
        let minor = match category {
            SessionCategory::Individual => self.config.individual_minor,
            SessionCategory::Couples => self.config.couples_minor,
        };
        Ok(Money::from_minor(minor, currency))
    }
}

#[async_trait]
impl HealthCheckable for ConfiguredPricing {
    async fn health_check(&self) -> HealthCheckResult {
        let configured = self.config.individual_minor > 0 && self.config.couples_minor > 0;
        HealthCheckResult {
            adapter_id: "configured-pricing".to_string(),
            status: if configured { AdapterHealth::Healthy } else { AdapterHealth::Degraded },
            latency_ms: 0,
            message: (!configured).then(|| "a session rate is zero".to_string()),
            checked_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_configured_rates() {
        let pricing = ConfiguredPricing::new(PricingConfig::default());
        let rate = pricing.session_rate(SessionCategory::Couples, Currency::ZAR).await.unwrap();
        assert_eq!(rate, Money::from_minor(120_000, Currency::ZAR));
    }

    #[tokio::test]
    async fn test_unconfigured_currency_is_rejected() {
        let pricing = ConfiguredPricing::new(PricingConfig::default());
        let err = pricing.session_rate(SessionCategory::Individual, Currency::USD).await.unwrap_err();
        assert!(matches!(err, PortError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_zero_rate_degrades_health() {
        let pricing = ConfiguredPricing::new(PricingConfig {
            couples_minor: 0,
            ..PricingConfig::default()
        });
        assert_eq!(pricing.health_check().await.status, AdapterHealth::Degraded);
    }

    #[tokio::test]
    async fn test_local_calendar_ids_are_unique() {
        let calendar = LocalCalendar;
        let request = CalendarEventRequest {
            subject: "Session".into(),
            starts_at: chrono::NaiveDate::from_ymd_opt(2025, 3, 3).unwrap().and_hms_opt(9, 0, 0).unwrap(),
            ends_at: chrono::NaiveDate::from_ymd_opt(2025, 3, 3).unwrap().and_hms_opt(10, 0, 0).unwrap(),
            time_zone: "Africa/Johannesburg".into(),
            attendee: "client@example.com".into(),
        };
        let a = calendar.create_event(&request).await.unwrap();
        let b = calendar.create_event(&request).await.unwrap();
        assert_ne!(a.event_id, b.event_id);
    }
}
