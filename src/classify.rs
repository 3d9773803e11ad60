//! Due-status classification and early-payment discount windows

use bigdecimal::BigDecimal;
use chrono::NaiveDate;

use crate::normalize::mismatch_tolerance;
use crate::types::DueStatus;

/// Signed days from `today` until `due_date`; negative when past due
pub fn days_to_due(due_date: NaiveDate, today: NaiveDate) -> i64 {
    due_date.signed_duration_since(today).num_days()
}

/// Classify an invoice by how close its due date is.
///
/// Boundaries: `-1` is overdue, `0` and `7` are due soon, `8` is current.
pub fn classify_due(days_to_due: i64) -> DueStatus {
    if days_to_due < 0 {
        DueStatus::Overdue
    } else if days_to_due <= 7 {
        DueStatus::DueSoon
    } else {
        DueStatus::Current
    }
}

/// Compute the payable amount under an early-payment discount offer.
///
/// Within the deadline (inclusive) the discount applies; past it the
/// full amount is charged. A missing percentage or deadline means no
/// discount program applies. Returns the payable amount together with
/// the effective percentage (zero when the discount did not apply).
pub fn compute_discount(
    total_amount: &BigDecimal,
    discount_pct: Option<&BigDecimal>,
    deadline: Option<NaiveDate>,
    today: NaiveDate,
) -> (BigDecimal, BigDecimal) {
    match (discount_pct, deadline) {
        (Some(pct), Some(deadline)) if today <= deadline => {
            let discounted = total_amount * (BigDecimal::from(1) - pct);
            (discounted, pct.clone())
        }
        _ => (total_amount.clone(), BigDecimal::from(0)),
    }
}

/// Whether two cross-source amounts disagree beyond the fixed tolerance
pub fn amounts_mismatch(a: &BigDecimal, b: &BigDecimal) -> bool {
    (a - b).abs() > mismatch_tolerance()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    #[test]
    fn status_boundaries() {
        assert_eq!(classify_due(-1), DueStatus::Overdue);
        assert_eq!(classify_due(0), DueStatus::DueSoon);
        assert_eq!(classify_due(7), DueStatus::DueSoon);
        assert_eq!(classify_due(8), DueStatus::Current);
    }

    #[test]
    fn days_to_due_is_signed() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 10).unwrap();
        let due = NaiveDate::from_ymd_opt(2024, 6, 7).unwrap();
        assert_eq!(days_to_due(due, today), -3);
        assert_eq!(days_to_due(today, today), 0);
    }

    #[test]
    fn discount_applies_through_deadline_inclusive() {
        let total = dec("1000");
        let pct = dec("0.02");
        let deadline = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();

        let (on_deadline, applied) =
            compute_discount(&total, Some(&pct), Some(deadline), deadline);
        assert_eq!(on_deadline, dec("980.00"));
        assert_eq!(applied, pct);

        let day_after = deadline.succ_opt().unwrap();
        let (expired, applied) = compute_discount(&total, Some(&pct), Some(deadline), day_after);
        assert_eq!(expired, total);
        assert_eq!(applied, BigDecimal::from(0));
    }

    #[test]
    fn missing_offer_means_full_amount() {
        let total = dec("500");
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let deadline = NaiveDate::from_ymd_opt(2024, 6, 30).unwrap();

        let (amount, pct) = compute_discount(&total, None, Some(deadline), today);
        assert_eq!(amount, total);
        assert_eq!(pct, BigDecimal::from(0));

        let (amount, pct) = compute_discount(&total, Some(&dec("0.05")), None, today);
        assert_eq!(amount, total);
        assert_eq!(pct, BigDecimal::from(0));
    }

    #[test]
    fn mismatch_tolerance_is_exactly_one_cent() {
        assert!(!amounts_mismatch(&dec("100.00"), &dec("100.01")));
        assert!(amounts_mismatch(&dec("100.00"), &dec("100.011")));
        assert!(!amounts_mismatch(&dec("100.00"), &dec("100.00")));
    }
}
