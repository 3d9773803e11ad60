//! Payment suggestion engine: strategy-ordered greedy budget fill
//!
//! This is a documented heuristic, not a true optimizer. Candidates are
//! totally ordered by the chosen strategy and then accumulated greedily;
//! an invoice that does not fit is skipped, not a stopping point, so
//! later smaller invoices may still be taken. The returned set is not
//! guaranteed to maximize count or savings near budget exhaustion - an
//! exact bounded knapsack solve would be the replacement if that ever
//! becomes a requirement.

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

use crate::types::{LedgerInvoice, PaymentState};

/// Total ordering applied to candidates before the greedy fill
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Strategy {
    /// Largest early-payment savings first
    MaximizeSavings,
    /// Most urgent due date first; overdue (negative days) sorts first
    AvoidOverdue,
    /// Oldest issue date first; unknown issue dates sort last
    PrioritizeAge,
}

/// Select pending invoices to pay within `budget` under `strategy`.
///
/// Only invoices with `payment_state == Pending` and a positive amount
/// are eligible; a zero amount means the source value never parsed and
/// must not be paid on. The result is advisory - callers may add or
/// remove invoices before confirming a batch - and the function has no
/// side effects. The sum of selected discounted amounts never exceeds
/// the budget.
pub fn suggest(
    candidates: &[LedgerInvoice],
    budget: &BigDecimal,
    strategy: Strategy,
) -> Vec<String> {
    let mut eligible: Vec<&LedgerInvoice> = candidates
        .iter()
        .filter(|inv| {
            inv.payment_state == PaymentState::Pending && inv.total_amount > BigDecimal::from(0)
        })
        .collect();

    // Vec::sort_by is stable, so ties keep the caller's input order.
    match strategy {
        Strategy::MaximizeSavings => {
            eligible.sort_by(|a, b| b.savings().cmp(&a.savings()));
        }
        Strategy::AvoidOverdue => {
            eligible.sort_by(|a, b| match (a.days_to_due, b.days_to_due) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            });
        }
        Strategy::PrioritizeAge => {
            eligible.sort_by(|a, b| match (a.issue_date, b.issue_date) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            });
        }
    }

    let mut running_total = BigDecimal::from(0);
    let mut selected = Vec::new();
    for inv in eligible {
        let with_invoice = &running_total + &inv.discounted_amount;
        if with_invoice <= *budget {
            running_total = with_invoice;
            selected.push(inv.invoice_id.clone());
        }
    }
    selected
}
