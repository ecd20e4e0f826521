//! Domain types for the loan ledger.
//!
//! This module provides:
//! - Lossless money handling via the Decimal wrapper
//! - Identifiers and date helpers
//! - Customer, officer, loan, schedule, repayment and derived-state records
//! - Ingest validation errors

pub mod customer;
pub mod decimal;
pub mod derived;
pub mod loan;
pub mod officer;
pub mod primitives;
pub mod repayment;
pub mod schedule;
pub mod validation;

pub use customer::{Customer, CustomerInput};
pub use decimal::{Decimal, MONEY_DP};
pub use derived::{DerivedLoanState, FimrState};
pub use loan::{Loan, LoanInput, LoanStatus};
pub use officer::{Officer, OfficerInput};
pub use primitives::{CustomerId, DateParseError, LoanId, OfficerId, RepaymentId};
pub use repayment::{sort_events_deterministic, Allocation, RepaymentEvent, RepaymentInput};
pub use schedule::{Component, ComponentAmounts, PaymentStatus, ScheduleEntry};
pub use validation::ValidationError;
