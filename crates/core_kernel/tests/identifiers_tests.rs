//! Unit tests for the Identifiers module
//!
//! Tests cover identifier creation, parsing, conversion, and the short
//! form used in document numbers.

use core_kernel::{
    ClientId, RelationshipId, BillingEntityId, BookingId, SeriesId,
    CreditTransactionId, OrderId, PaymentRequestId, InvoiceId, LineItemId,
};
use uuid::Uuid;

mod booking_id_tests {
    use super::*;

    #[test]
    fn test_new_generates_unique_ids() {
        let id1 = BookingId::new();
        let id2 = BookingId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_new_v7_generates_time_ordered_ids() {
        let id1 = BookingId::new_v7();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let id2 = BookingId::new_v7();
        let uuid1: Uuid = id1.into();
        let uuid2: Uuid = id2.into();
        assert!(uuid1 < uuid2);
    }

    #[test]
    fn test_from_str_with_and_without_prefix() {
        let original = BookingId::new();
        let with_prefix: BookingId = original.to_string().parse().unwrap();
        let bare: BookingId = original.as_uuid().to_string().parse().unwrap();
        assert_eq!(original, with_prefix);
        assert_eq!(original, bare);
    }

    #[test]
    fn test_from_str_rejects_garbage() {
        assert!("BKG-not-a-uuid".parse::<BookingId>().is_err());
    }
}

mod prefixes {
    use super::*;

    #[test]
    fn test_all_prefixes() {
        assert_eq!(ClientId::prefix(), "CLI");
        assert_eq!(RelationshipId::prefix(), "REL");
        assert_eq!(BillingEntityId::prefix(), "BEN");
        assert_eq!(BookingId::prefix(), "BKG");
        assert_eq!(SeriesId::prefix(), "SER");
        assert_eq!(CreditTransactionId::prefix(), "CTX");
        assert_eq!(OrderId::prefix(), "ORD");
        assert_eq!(PaymentRequestId::prefix(), "PRQ");
        assert_eq!(InvoiceId::prefix(), "INV");
        assert_eq!(LineItemId::prefix(), "LIN");
    }
}

mod short_form {
    use super::*;

    #[test]
    fn test_short_is_eight_uppercase_hex_digits() {
        let id = PaymentRequestId::new_v7();
        let short = id.short();
        assert_eq!(short.len(), 8);
        assert!(short.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
    }

    #[test]
    fn test_short_uses_trailing_digits() {
        let uuid = Uuid::parse_str("0190f3a2-0000-7000-8000-00000000abcd").unwrap();
        assert_eq!(InvoiceId::from_uuid(uuid).short(), "0000ABCD");
    }
}

mod serde_tests {
    use super::*;

    #[test]
    fn test_serializes_transparently() {
        let uuid = Uuid::new_v4();
        let id = ClientId::from(uuid);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", uuid));
    }
}
