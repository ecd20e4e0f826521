//! Derived loan state: DPD, outstanding, tags and scores.

use crate::domain::primitives::days_between;
use crate::domain::{
    Decimal, DerivedLoanState, FimrState, Loan, LoanStatus, PaymentStatus, RepaymentEvent,
    ScheduleEntry,
};
use crate::engine::ledger::{LedgerApplier, LedgerPosition, PaymentTotals};
use crate::engine::schedule::schedule_reconciles;
use crate::engine::scoring::ScoreWeights;
use chrono::NaiveDate;

/// Upper bound (inclusive) of the early-delinquency window, in days past due.
pub const EARLY_INDICATOR_MAX_DPD: i64 = 30;

/// Derived state plus the display status of each installment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub state: DerivedLoanState,
    /// `(installment_number, status)`; empty when degraded.
    pub entry_statuses: Vec<(u32, PaymentStatus)>,
}

/// Pure recomputation of a loan's derived state.
pub struct DerivedStateCalculator;

impl DerivedStateCalculator {
    pub fn recompute(
        loan: &Loan,
        schedule: Option<&[ScheduleEntry]>,
        events: &[RepaymentEvent],
        previous: Option<&DerivedLoanState>,
        today: NaiveDate,
        weights: &ScoreWeights,
    ) -> DerivedLoanState {
        Self::evaluate(loan, schedule, events, previous, today, weights).state
    }

    /// Recompute from the loan, its schedule, every event and the clock.
    ///
    /// Never fails. A missing or unreconcilable schedule yields a degraded
    /// state with the schedule-dependent fields unknown.
    pub fn evaluate(
        loan: &Loan,
        schedule: Option<&[ScheduleEntry]>,
        events: &[RepaymentEvent],
        previous: Option<&DerivedLoanState>,
        today: NaiveDate,
        weights: &ScoreWeights,
    ) -> Evaluation {
        let fimr_state =
            fimr_transition(loan.first_payment_due_date, events, previous, today);

        let degraded_reason = match schedule {
            None => Some("no schedule for loan"),
            Some([]) => Some("schedule is empty"),
            Some(entries) if !schedule_reconciles(loan, entries) => {
                Some("schedule does not reconcile to loan terms")
            }
            Some(_) => None,
        };

        match (schedule, degraded_reason) {
            (Some(entries), None) => {
                let position = LedgerApplier::apply(entries, events);
                priced(loan, &position, fimr_state, previous, today, weights)
            }
            (_, reason) => Evaluation {
                state: degraded(
                    loan,
                    events,
                    fimr_state,
                    previous,
                    today,
                    reason.unwrap_or("no schedule for loan"),
                ),
                entry_statuses: Vec::new(),
            },
        }
    }
}

/// FIMR state machine.
///
/// `Met` is terminal. A payment on or before the first due date resolves to
/// `Met` even if the loan was previously `Missed`; a later payment never does.
pub fn fimr_transition(
    first_due: Option<NaiveDate>,
    events: &[RepaymentEvent],
    previous: Option<&DerivedLoanState>,
    today: NaiveDate,
) -> FimrState {
    if previous.map(|p| p.fimr_state) == Some(FimrState::Met) {
        return FimrState::Met;
    }
    let Some(first_due) = first_due else {
        return FimrState::Missed;
    };
    let qualifying = events
        .iter()
        .any(|e| e.counts() && e.payment_date <= first_due);
    if qualifying {
        FimrState::Met
    } else if first_due < today {
        FimrState::Missed
    } else if previous.map(|p| p.fimr_state) == Some(FimrState::Missed) {
        FimrState::Missed
    } else {
        FimrState::Undetermined
    }
}

fn days_since_last_repayment(loan: &Loan, last: Option<NaiveDate>, today: NaiveDate) -> i64 {
    let since = last.unwrap_or(loan.disbursement_date);
    days_between(since, today).max(0)
}

/// `loan.status` is the ingested status; only a `Closed` or `Defaulted`
/// given by the source of record overrides what the ledger says.
fn lifecycle_status(loan: &Loan, outstanding: Option<Decimal>, today: NaiveDate) -> LoanStatus {
    if loan.status.is_sticky() {
        return loan.status;
    }
    if outstanding.is_some_and(|o| o.is_zero()) {
        LoanStatus::Closed
    } else if loan.maturity_date < today {
        LoanStatus::PastMaturity
    } else {
        LoanStatus::Active
    }
}

fn priced(
    loan: &Loan,
    position: &LedgerPosition,
    fimr_state: FimrState,
    previous: Option<&DerivedLoanState>,
    today: NaiveDate,
    weights: &ScoreWeights,
) -> Evaluation {
    let outstanding = position.outstanding();
    let total_outstanding = outstanding.total();

    let current_dpd = match position.earliest_unpaid() {
        Some(entry) if entry.due_date < today => days_between(entry.due_date, today),
        _ => 0,
    };
    let max_dpd_ever = previous
        .and_then(|p| p.max_dpd_ever)
        .unwrap_or(0)
        .max(current_dpd);

    let matured: Vec<_> = position.entries.iter().filter(|e| e.due_date < today).collect();
    let late = matured.iter().filter(|e| e.is_late(today)).count();
    let delay_rate = if matured.is_empty() {
        Decimal::zero()
    } else {
        Decimal::from_i64(late as i64) / Decimal::from_i64(matured.len() as i64)
    };

    let (due_so_far, covered_so_far) = position
        .entries
        .iter()
        .filter(|e| e.due_date <= today)
        .fold((Decimal::zero(), Decimal::zero()), |(due, covered), e| {
            (due + e.total_due(), covered + e.total_covered())
        });
    let collection_ratio = covered_so_far
        .checked_div(due_so_far)
        .unwrap_or_else(Decimal::one)
        .clamp(Decimal::zero(), Decimal::one());

    let days_since_last = days_since_last_repayment(loan, position.last_payment_date, today);
    let timeliness = weights.timeliness(days_since_last, delay_rate);
    let health = weights.health(timeliness, collection_ratio, delay_rate);

    let state = DerivedLoanState {
        loan_id: loan.loan_id.clone(),
        as_of: today,
        lifecycle_status: lifecycle_status(loan, Some(total_outstanding), today),
        principal_outstanding: Some(outstanding.principal),
        interest_outstanding: Some(outstanding.interest),
        fees_outstanding: Some(outstanding.fees),
        total_outstanding: Some(total_outstanding),
        total_principal_paid: position.paid.principal,
        total_interest_paid: position.paid.interest,
        total_fees_paid: position.paid.fees,
        total_penalty_paid: position.penalty_paid,
        total_repayments: position.total_paid(),
        current_dpd: Some(current_dpd),
        max_dpd_ever: Some(max_dpd_ever),
        fimr_state,
        first_payment_missed: fimr_state.first_payment_missed(),
        fimr_tagged: fimr_state.fimr_tagged(),
        early_indicator_tagged: Some(current_dpd > 0 && current_dpd <= EARLY_INDICATOR_MAX_DPD),
        first_payment_received_date: position.first_payment_date,
        last_payment_date: position.last_payment_date,
        days_since_last_repayment: days_since_last,
        repayment_delay_rate: Some(delay_rate.round_dp(4)),
        timeliness_score: Some(timeliness),
        repayment_health: Some(health),
        degraded: false,
        degraded_reason: None,
    };

    let entry_statuses = position
        .entries
        .iter()
        .map(|e| (e.installment_number, e.status(today)))
        .collect();

    Evaluation {
        state,
        entry_statuses,
    }
}

fn degraded(
    loan: &Loan,
    events: &[RepaymentEvent],
    fimr_state: FimrState,
    previous: Option<&DerivedLoanState>,
    today: NaiveDate,
    reason: &str,
) -> DerivedLoanState {
    let totals = PaymentTotals::from_events(events);
    DerivedLoanState {
        loan_id: loan.loan_id.clone(),
        as_of: today,
        lifecycle_status: lifecycle_status(loan, None, today),
        principal_outstanding: None,
        interest_outstanding: None,
        fees_outstanding: None,
        total_outstanding: None,
        total_principal_paid: totals.paid.principal,
        total_interest_paid: totals.paid.interest,
        total_fees_paid: totals.paid.fees,
        total_penalty_paid: totals.penalty_paid,
        total_repayments: totals.total_paid(),
        current_dpd: None,
        max_dpd_ever: previous.and_then(|p| p.max_dpd_ever),
        fimr_state,
        first_payment_missed: fimr_state.first_payment_missed(),
        fimr_tagged: fimr_state.fimr_tagged(),
        early_indicator_tagged: None,
        first_payment_received_date: totals.first_payment_date,
        last_payment_date: totals.last_payment_date,
        days_since_last_repayment: days_since_last_repayment(
            loan,
            totals.last_payment_date,
            today,
        ),
        repayment_delay_rate: None,
        timeliness_score: None,
        repayment_health: None,
        degraded: true,
        degraded_reason: Some(reason.to_string()),
    }
}
