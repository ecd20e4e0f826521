//! Mock source of record for testing without network calls.

use super::{DataSourceError, SourceLoan, SourceOfRecord, SourceRecord, SourceRepayment};
use crate::domain::{CustomerInput, OfficerInput};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Mock source that serves predefined records.
///
/// Clones share the same records, so a test can keep a handle and add
/// repayments after the reconciler has been built.
#[derive(Debug, Clone, Default)]
pub struct MockSourceOfRecord {
    customers: Vec<SourceRecord<CustomerInput>>,
    officers: Vec<SourceRecord<OfficerInput>>,
    loans: Vec<SourceRecord<SourceLoan>>,
    repayments: Arc<Mutex<Vec<SourceRecord<SourceRepayment>>>>,
    fail_with: Option<DataSourceError>,
    repayment_fetches: Arc<AtomicUsize>,
}

impl MockSourceOfRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_customer(mut self, customer: CustomerInput) -> Self {
        self.customers.push(SourceRecord::Parsed(customer));
        self
    }

    pub fn with_officer(mut self, officer: OfficerInput) -> Self {
        self.officers.push(SourceRecord::Parsed(officer));
        self
    }

    pub fn with_loan(mut self, loan: SourceLoan) -> Self {
        self.loans.push(SourceRecord::Parsed(loan));
        self
    }

    pub fn with_loans(mut self, loans: Vec<SourceLoan>) -> Self {
        self.loans.extend(loans.into_iter().map(SourceRecord::Parsed));
        self
    }

    pub fn with_repayment(self, repayment: SourceRepayment) -> Self {
        self.push_repayment(repayment);
        self
    }

    pub fn with_repayments(self, repayments: Vec<SourceRepayment>) -> Self {
        for repayment in repayments {
            self.push_repayment(repayment);
        }
        self
    }

    /// Serve a raw JSON repayment, decoded the way an HTTP page would be.
    pub fn with_raw_repayment(self, value: serde_json::Value) -> Self {
        self.repayments
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(SourceRecord::decode(value, "id"));
        self
    }

    /// Every fetch fails with `err`.
    pub fn failing(mut self, err: DataSourceError) -> Self {
        self.fail_with = Some(err);
        self
    }

    /// Add a repayment visible to later fetches.
    pub fn push_repayment(&self, repayment: SourceRepayment) {
        self.repayments
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(SourceRecord::Parsed(repayment));
    }

    /// Number of repayment page fetches served so far.
    pub fn repayment_fetches(&self) -> usize {
        self.repayment_fetches.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), DataSourceError> {
        match &self.fail_with {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

fn page<T: Clone>(items: &[T], offset: i64, limit: i64) -> Vec<T> {
    items
        .iter()
        .skip(offset.max(0) as usize)
        .take(limit.max(0) as usize)
        .cloned()
        .collect()
}

#[async_trait]
impl SourceOfRecord for MockSourceOfRecord {
    async fn fetch_customers(
        &self,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<SourceRecord<CustomerInput>>, DataSourceError> {
        self.check()?;
        Ok(page(&self.customers, offset, limit))
    }

    async fn fetch_officers(
        &self,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<SourceRecord<OfficerInput>>, DataSourceError> {
        self.check()?;
        Ok(page(&self.officers, offset, limit))
    }

    async fn fetch_loans(
        &self,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<SourceRecord<SourceLoan>>, DataSourceError> {
        self.check()?;
        Ok(page(&self.loans, offset, limit))
    }

    async fn fetch_repayments_after(
        &self,
        after_id: i64,
        limit: i64,
    ) -> Result<Vec<SourceRecord<SourceRepayment>>, DataSourceError> {
        self.check()?;
        self.repayment_fetches.fetch_add(1, Ordering::SeqCst);

        let repayments = self.repayments.lock().unwrap_or_else(|e| e.into_inner());
        let mut matching: Vec<i64> = repayments
            .iter()
            .filter_map(|r| r.repayment_id())
            .filter(|id| *id > after_id)
            .collect();
        matching.sort_unstable();
        matching.truncate(limit.max(0) as usize);

        // Served in insertion order within the page to mimic an unordered upstream.
        Ok(repayments
            .iter()
            .filter(|r| r.repayment_id().is_some_and(|id| matching.contains(&id)))
            .cloned()
            .collect())
    }

    async fn fetch_loan_repayments(
        &self,
        loan_id: &str,
    ) -> Result<Vec<SourceRecord<SourceRepayment>>, DataSourceError> {
        self.check()?;
        let repayments = self.repayments.lock().unwrap_or_else(|e| e.into_inner());
        Ok(repayments
            .iter()
            .filter(|r| {
                matches!(r, SourceRecord::Parsed(record) if record.loan_id.as_deref() == Some(loan_id))
            })
            .cloned()
            .collect())
    }
}
