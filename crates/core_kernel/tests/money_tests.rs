//! Unit tests for the Money module
//!
//! Tests cover minor-unit arithmetic, rates, and the rounding rules the
//! billing documents rely on.

use core_kernel::{Money, Currency, MoneyError, Rate};
use rust_decimal_macros::dec;

mod creation {
    use super::*;

    #[test]
    fn test_from_minor_keeps_cents() {
        let m = Money::from_minor(85000, Currency::ZAR);
        assert_eq!(m.minor(), 85000);
        assert_eq!(m.amount(), dec!(850.00));
        assert_eq!(m.currency(), Currency::ZAR);
    }

    #[test]
    fn test_default_currency_is_zar() {
        assert_eq!(Currency::default(), Currency::ZAR);
    }

    #[test]
    fn test_zero() {
        let m = Money::zero(Currency::EUR);
        assert!(m.is_zero());
        assert!(!m.is_positive());
        assert!(!m.is_negative());
    }
}

mod arithmetic {
    use super::*;

    #[test]
    fn test_checked_add_and_sub() {
        let a = Money::zar(85000);
        let b = Money::zar(10000);

        assert_eq!(a.checked_add(&b).unwrap().minor(), 95000);
        assert_eq!(a.checked_sub(&b).unwrap().minor(), 75000);
        assert!(b.checked_sub(&a).unwrap().is_negative());
    }

    #[test]
    fn test_overflow_is_reported() {
        let a = Money::zar(i64::MAX);
        assert_eq!(a.checked_add(&Money::zar(1)), Err(MoneyError::Overflow));
    }

    #[test]
    fn test_max_and_min() {
        let a = Money::zar(8500);
        let b = Money::zar(10000);
        assert_eq!(a.max(b).unwrap(), b);
        assert_eq!(a.min(b).unwrap(), a);
    }

    #[test]
    fn test_max_rejects_mixed_currency() {
        let a = Money::zar(1);
        let b = Money::from_minor(1, Currency::GBP);
        assert!(matches!(a.max(b), Err(MoneyError::CurrencyMismatch(_, _))));
    }

    #[test]
    fn test_sum() {
        let items = vec![Money::zar(100), Money::zar(250), Money::zar(-50)];
        assert_eq!(Money::sum(Currency::ZAR, &items).unwrap().minor(), 300);
    }

    #[test]
    fn test_scale_rounds_half_away_from_zero() {
        // 85000 * 1.5 = 127500
        assert_eq!(Money::zar(85000).scale(dec!(1.5)).unwrap().minor(), 127500);
        // 101 * 0.5 = 50.5 -> 51
        assert_eq!(Money::zar(101).scale(dec!(0.5)).unwrap().minor(), 51);
    }
}

mod rates {
    use super::*;

    #[test]
    fn test_ten_percent_of_session() {
        let rate = Rate::from_percentage(dec!(10)).unwrap();
        assert_eq!(rate.apply(&Money::zar(85000)).unwrap().minor(), 8500);
    }

    #[test]
    fn test_vat_fifteen_percent() {
        let vat = Rate::from_percentage(dec!(15)).unwrap();
        assert_eq!(vat.apply(&Money::zar(76500)).unwrap().minor(), 11475);
    }

    #[test]
    fn test_rate_display() {
        let rate = Rate::from_percentage(dec!(12.5)).unwrap();
        assert_eq!(rate.to_string(), "12.5%");
    }

    #[test]
    fn test_zero_rate() {
        assert!(Rate::zero().is_zero());
        assert!(Rate::zero().apply(&Money::zar(1000)).unwrap().is_zero());
    }
}
