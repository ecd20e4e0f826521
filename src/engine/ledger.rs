//! Greedy, component-scoped allocation of repayments onto a schedule.
//!
//! The ledger is always rebuilt from the full event set; nothing here keeps a
//! running total between calls.

use crate::domain::repayment::sort_events_deterministic;
use crate::domain::{
    Component, ComponentAmounts, Decimal, PaymentStatus, RepaymentEvent, ScheduleEntry,
};
use chrono::NaiveDate;

/// How much of one installment the event set covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryCoverage {
    pub installment_number: u32,
    pub due_date: NaiveDate,
    pub due: ComponentAmounts,
    pub covered: ComponentAmounts,
    /// Per component: payment date that finished covering it.
    completed_on: [Option<NaiveDate>; 3],
}

impl EntryCoverage {
    pub fn total_due(&self) -> Decimal {
        self.due.total()
    }

    pub fn total_covered(&self) -> Decimal {
        self.covered.total()
    }

    pub fn is_paid(&self) -> bool {
        self.covered == self.due
    }

    /// Date the installment became fully covered.
    ///
    /// Zero-amount installments count as covered on their due date.
    pub fn fully_covered_on(&self) -> Option<NaiveDate> {
        if !self.is_paid() {
            return None;
        }
        Some(
            self.completed_on
                .iter()
                .flatten()
                .max()
                .copied()
                .unwrap_or(self.due_date),
        )
    }

    /// Matured (due before `as_of`) and not covered by its due date.
    pub fn is_late(&self, as_of: NaiveDate) -> bool {
        if self.due_date >= as_of {
            return false;
        }
        match self.fully_covered_on() {
            Some(date) => date > self.due_date,
            None => true,
        }
    }

    pub fn status(&self, as_of: NaiveDate) -> PaymentStatus {
        if self.is_paid() {
            PaymentStatus::Paid
        } else if self.due_date < as_of {
            PaymentStatus::Overdue
        } else if self.total_covered().is_positive() {
            PaymentStatus::Partial
        } else {
            PaymentStatus::Pending
        }
    }
}

/// Result of applying every counted event to a schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerPosition {
    pub paid: ComponentAmounts,
    pub penalty_paid: Decimal,
    pub entries: Vec<EntryCoverage>,
    pub first_payment_date: Option<NaiveDate>,
    pub last_payment_date: Option<NaiveDate>,
}

impl LedgerPosition {
    pub fn total_paid(&self) -> Decimal {
        self.paid.total() + self.penalty_paid
    }

    pub fn total_due(&self) -> ComponentAmounts {
        self.entries
            .iter()
            .fold(ComponentAmounts::default(), |acc, e| acc + e.due)
    }

    pub fn outstanding(&self) -> ComponentAmounts {
        self.total_due().saturating_sub(&self.paid)
    }

    /// Earliest installment not yet fully covered.
    pub fn earliest_unpaid(&self) -> Option<&EntryCoverage> {
        self.entries.iter().find(|e| !e.is_paid())
    }
}

/// Totals over counted events, independent of any schedule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PaymentTotals {
    pub paid: ComponentAmounts,
    pub penalty_paid: Decimal,
    pub first_payment_date: Option<NaiveDate>,
    pub last_payment_date: Option<NaiveDate>,
}

impl PaymentTotals {
    pub fn from_events(events: &[RepaymentEvent]) -> Self {
        let mut totals = PaymentTotals::default();
        for event in events.iter().filter(|e| e.counts()) {
            totals.paid.principal += event.allocation.principal;
            totals.paid.interest += event.allocation.interest;
            totals.paid.fees += event.allocation.fees;
            totals.penalty_paid += event.allocation.penalty;
            totals.first_payment_date = Some(match totals.first_payment_date {
                Some(d) => d.min(event.payment_date),
                None => event.payment_date,
            });
            totals.last_payment_date = Some(match totals.last_payment_date {
                Some(d) => d.max(event.payment_date),
                None => event.payment_date,
            });
        }
        totals
    }

    pub fn total_paid(&self) -> Decimal {
        self.paid.total() + self.penalty_paid
    }
}

/// Applies repayment events to a schedule.
pub struct LedgerApplier;

impl LedgerApplier {
    /// Pour every counted event, in `(payment_date, repayment_id)` order, into
    /// the schedule one component stream at a time.
    ///
    /// Submission order of `events` never matters.
    pub fn apply(schedule: &[ScheduleEntry], events: &[RepaymentEvent]) -> LedgerPosition {
        let mut ordered: Vec<RepaymentEvent> =
            events.iter().filter(|e| e.counts()).cloned().collect();
        sort_events_deterministic(&mut ordered);

        let mut sorted_schedule: Vec<&ScheduleEntry> = schedule.iter().collect();
        sorted_schedule.sort_by_key(|e| (e.due_date, e.installment_number));

        let mut entries: Vec<EntryCoverage> = sorted_schedule
            .into_iter()
            .map(|e| EntryCoverage {
                installment_number: e.installment_number,
                due_date: e.due_date,
                due: e.due,
                covered: ComponentAmounts::default(),
                completed_on: [None; 3],
            })
            .collect();

        let totals = PaymentTotals::from_events(&ordered);
        let mut cursors = [0usize; 3];

        for event in &ordered {
            let amounts = ComponentAmounts::new(
                event.allocation.principal,
                event.allocation.interest,
                event.allocation.fees,
            );
            for (slot, component) in Component::ALL.into_iter().enumerate() {
                let mut remaining = amounts.get(component);
                let cursor = &mut cursors[slot];

                while remaining.is_positive() && *cursor < entries.len() {
                    let entry = &mut entries[*cursor];
                    let need = entry.due.get(component) - entry.covered.get(component);
                    if !need.is_positive() {
                        *cursor += 1;
                        continue;
                    }

                    let take = remaining.min(need);
                    *entry.covered.get_mut(component) += take;
                    remaining -= take;

                    if take == need {
                        entry.completed_on[slot] = Some(event.payment_date);
                        *cursor += 1;
                    }
                }
            }
        }

        LedgerPosition {
            paid: totals.paid,
            penalty_paid: totals.penalty_paid,
            entries,
            first_payment_date: totals.first_payment_date,
            last_payment_date: totals.last_payment_date,
        }
    }
}
