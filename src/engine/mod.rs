//! Pure computation engine for loan schedules and derived state.
//!
//! Nothing in here touches storage or the clock directly; callers pass the
//! loan, its schedule, the full event set and "today".

pub mod calculator;
pub mod ledger;
pub mod schedule;
pub mod scoring;

pub use calculator::{fimr_transition, DerivedStateCalculator, Evaluation};
pub use ledger::{EntryCoverage, LedgerApplier, LedgerPosition, PaymentTotals};
pub use schedule::{schedule_reconciles, ScheduleGenerator};
pub use scoring::ScoreWeights;
