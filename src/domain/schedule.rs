//! Installment schedule entries.

use crate::domain::primitives::LoanId;
use crate::domain::{Decimal, ValidationError};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Loan component streams the ledger allocates independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Component {
    Principal,
    Interest,
    Fees,
}

impl Component {
    pub const ALL: [Component; 3] = [Component::Principal, Component::Interest, Component::Fees];
}

/// Principal / interest / fee amounts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentAmounts {
    pub principal: Decimal,
    pub interest: Decimal,
    pub fees: Decimal,
}

impl ComponentAmounts {
    pub fn new(principal: Decimal, interest: Decimal, fees: Decimal) -> Self {
        Self {
            principal,
            interest,
            fees,
        }
    }

    pub fn get(&self, component: Component) -> Decimal {
        match component {
            Component::Principal => self.principal,
            Component::Interest => self.interest,
            Component::Fees => self.fees,
        }
    }

    pub fn get_mut(&mut self, component: Component) -> &mut Decimal {
        match component {
            Component::Principal => &mut self.principal,
            Component::Interest => &mut self.interest,
            Component::Fees => &mut self.fees,
        }
    }

    pub fn total(&self) -> Decimal {
        self.principal + self.interest + self.fees
    }

    /// Component-wise `max(self - other, 0)`.
    pub fn saturating_sub(&self, other: &ComponentAmounts) -> ComponentAmounts {
        ComponentAmounts {
            principal: (self.principal - other.principal).floor_zero(),
            interest: (self.interest - other.interest).floor_zero(),
            fees: (self.fees - other.fees).floor_zero(),
        }
    }
}

impl std::ops::Add for ComponentAmounts {
    type Output = ComponentAmounts;

    fn add(self, rhs: ComponentAmounts) -> ComponentAmounts {
        ComponentAmounts {
            principal: self.principal + rhs.principal,
            interest: self.interest + rhs.interest,
            fees: self.fees + rhs.fees,
        }
    }
}

/// Display status of an installment. Derived, never authoritative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentStatus {
    Pending,
    Partial,
    Paid,
    Overdue,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "Pending",
            PaymentStatus::Partial => "Partial",
            PaymentStatus::Paid => "Paid",
            PaymentStatus::Overdue => "Overdue",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(PaymentStatus::Pending),
            "Partial" => Ok(PaymentStatus::Partial),
            "Paid" => Ok(PaymentStatus::Paid),
            "Overdue" => Ok(PaymentStatus::Overdue),
            other => Err(ValidationError::invalid(
                "payment_status",
                format!("unknown payment status '{}'", other),
            )),
        }
    }
}

/// One installment of a loan's schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub loan_id: LoanId,
    /// 1-based.
    pub installment_number: u32,
    pub due_date: NaiveDate,
    pub due: ComponentAmounts,
    pub payment_status: PaymentStatus,
}

impl ScheduleEntry {
    pub fn total_due(&self) -> Decimal {
        self.due.total()
    }
}
