//! Pulls customers, officers, loans and repayments from the source of record.

use crate::datasource::{DataSourceError, SourceOfRecord, SourceRecord, SourceRepayment};
use crate::domain::LoanId;
use crate::orchestration::ingest::{EventIngestor, IngestError};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Sync-state row holding the repayment high-water mark.
pub const REPAYMENTS_MARK: &str = "repayments";

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("source of record failed: {0}")]
    Source(#[from] DataSourceError),
    #[error("loan not found: {0}")]
    LoanNotFound(LoanId),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncRecordError {
    pub record_type: &'static str,
    pub id: Option<String>,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct IncrementalSyncResult {
    pub total_synced: usize,
    pub total_unchanged: usize,
    pub total_errors: usize,
    pub last_id_synced: i64,
    pub previous_max_id: i64,
    pub errors: Vec<SyncRecordError>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FullSyncResult {
    pub customers_synced: usize,
    pub officers_synced: usize,
    pub loans_synced: usize,
    pub repayments_synced: usize,
    pub total_errors: usize,
    pub last_id_synced: i64,
    pub errors: Vec<SyncRecordError>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoanSyncResult {
    pub loan_id: LoanId,
    pub total_fetched: usize,
    pub total_synced: usize,
    pub total_errors: usize,
    pub errors: Vec<SyncRecordError>,
}

/// Outcome of paging through repayments after a cursor.
#[derive(Debug, Default)]
struct RepaymentPass {
    synced: usize,
    unchanged: usize,
    succeeded: Vec<i64>,
    failed: Vec<i64>,
    errors: Vec<SyncRecordError>,
}

impl RepaymentPass {
    /// Highest id that can be recorded as done: the largest succeeded id below
    /// the lowest failure, never below `previous`.
    fn frontier(&self, previous: i64) -> i64 {
        let lowest_failed = self.failed.iter().copied().min();
        self.succeeded
            .iter()
            .copied()
            .filter(|id| lowest_failed.map_or(true, |f| *id < f))
            .max()
            .map_or(previous, |id| id.max(previous))
    }
}

#[derive(Debug, Clone)]
pub struct SyncReconciler {
    source: Arc<dyn SourceOfRecord>,
    ingestor: EventIngestor,
    page_size: i64,
}

impl SyncReconciler {
    pub fn new(source: Arc<dyn SourceOfRecord>, ingestor: EventIngestor, page_size: i64) -> Self {
        Self {
            source,
            ingestor,
            page_size: page_size.max(1),
        }
    }

    /// Pull repayments newer than the stored mark.
    pub async fn sync_incremental(&self) -> Result<IncrementalSyncResult, SyncError> {
        let previous_max_id = self.current_mark().await?;
        info!(previous_max_id, "Starting incremental repayment sync");

        let (pass, fetch_error) = self.pull_repayments(previous_max_id).await;
        let last_id_synced = self.persist_mark(&pass, previous_max_id).await?;
        if let Some(err) = fetch_error {
            return Err(err.into());
        }

        info!(
            synced = pass.synced,
            errors = pass.errors.len(),
            last_id_synced,
            "Incremental repayment sync finished"
        );
        Ok(IncrementalSyncResult {
            total_synced: pass.synced,
            total_unchanged: pass.unchanged,
            total_errors: pass.errors.len(),
            last_id_synced,
            previous_max_id,
            errors: pass.errors,
        })
    }

    /// Customers, officers, then loans, then every repayment from the
    /// beginning.
    pub async fn sync_full(&self) -> Result<FullSyncResult, SyncError> {
        let mut errors = Vec::new();

        let mut customers_synced = 0;
        let mut offset = 0;
        loop {
            let page = self.source.fetch_customers(offset, self.page_size).await?;
            let len = page.len();
            for record in page {
                let input = match record {
                    SourceRecord::Parsed(input) => input,
                    SourceRecord::Malformed { id, error } => {
                        errors.push(malformed("customer", id, error));
                        continue;
                    }
                };
                let id = input.customer_id.clone();
                match self.ingestor.upsert_customer(input).await {
                    Ok(_) => customers_synced += 1,
                    Err(e) => errors.push(record_error("customer", Some(id), &e)),
                }
            }
            if (len as i64) < self.page_size {
                break;
            }
            offset += len as i64;
        }

        let mut officers_synced = 0;
        let mut offset = 0;
        loop {
            let page = self.source.fetch_officers(offset, self.page_size).await?;
            let len = page.len();
            for record in page {
                let input = match record {
                    SourceRecord::Parsed(input) => input,
                    SourceRecord::Malformed { id, error } => {
                        errors.push(malformed("officer", id, error));
                        continue;
                    }
                };
                let id = input.officer_id.clone();
                match self.ingestor.upsert_officer(input).await {
                    Ok(_) => officers_synced += 1,
                    Err(e) => errors.push(record_error("officer", Some(id), &e)),
                }
            }
            if (len as i64) < self.page_size {
                break;
            }
            offset += len as i64;
        }

        let mut loans_synced = 0;
        let mut offset = 0;
        loop {
            let page = self.source.fetch_loans(offset, self.page_size).await?;
            let len = page.len();
            for record in page {
                let record = match record {
                    SourceRecord::Parsed(record) => record,
                    SourceRecord::Malformed { id, error } => {
                        errors.push(malformed("loan", id, error));
                        continue;
                    }
                };
                let id = record.loan_id.clone();
                let result = match record.into_input() {
                    Ok(input) => self.ingestor.create_loan(input).await.map(|_| ()),
                    Err(e) => Err(IngestError::Validation(e)),
                };
                match result {
                    Ok(()) => loans_synced += 1,
                    Err(e) => errors.push(record_error("loan", id, &e)),
                }
            }
            if (len as i64) < self.page_size {
                break;
            }
            offset += len as i64;
        }

        let previous = self.current_mark().await?;
        let (mut pass, fetch_error) = self.pull_repayments(0).await;
        let last_id_synced = self.persist_mark(&pass, previous).await?;
        if let Some(err) = fetch_error {
            return Err(err.into());
        }

        errors.append(&mut pass.errors);
        info!(
            customers_synced,
            officers_synced,
            loans_synced,
            repayments_synced = pass.synced,
            errors = errors.len(),
            "Full sync finished"
        );
        Ok(FullSyncResult {
            customers_synced,
            officers_synced,
            loans_synced,
            repayments_synced: pass.synced,
            total_errors: errors.len(),
            last_id_synced,
            errors,
        })
    }

    /// Pull every repayment of one loan. The high-water mark is not touched.
    pub async fn sync_loan_repayments(&self, loan_id: &LoanId) -> Result<LoanSyncResult, SyncError> {
        let repo = self.ingestor.recomputer().repo();
        if !repo.loan_exists(loan_id).await? {
            return Err(SyncError::LoanNotFound(loan_id.clone()));
        }

        let records = self.source.fetch_loan_repayments(loan_id.as_str()).await?;
        let total_fetched = records.len();
        let mut pass = RepaymentPass::default();
        for record in records {
            self.ingest_repayment(record, &mut pass).await;
        }

        Ok(LoanSyncResult {
            loan_id: loan_id.clone(),
            total_fetched,
            total_synced: pass.synced,
            total_errors: pass.errors.len(),
            errors: pass.errors,
        })
    }

    async fn current_mark(&self) -> Result<i64, SyncError> {
        let repo = self.ingestor.recomputer().repo();
        if let Some(mark) = repo.get_sync_mark(REPAYMENTS_MARK).await? {
            return Ok(mark);
        }
        Ok(repo.max_numeric_repayment_id().await?.unwrap_or(0))
    }

    async fn persist_mark(&self, pass: &RepaymentPass, previous: i64) -> Result<i64, SyncError> {
        let mark = pass.frontier(previous);
        self.ingestor
            .recomputer()
            .repo()
            .advance_sync_mark(REPAYMENTS_MARK, mark)
            .await?;
        Ok(mark)
    }

    /// Page through repayments with `id > after_id`. A fetch failure ends the
    /// pass but keeps what was already ingested.
    async fn pull_repayments(&self, after_id: i64) -> (RepaymentPass, Option<DataSourceError>) {
        let mut pass = RepaymentPass::default();
        let mut cursor = after_id;

        loop {
            let page = match self
                .source
                .fetch_repayments_after(cursor, self.page_size)
                .await
            {
                Ok(page) => page,
                Err(e) => {
                    warn!(cursor, error = %e, "Repayment page fetch failed");
                    return (pass, Some(e));
                }
            };
            if page.is_empty() {
                break;
            }

            let len = page.len();
            let page_max = page.iter().filter_map(|r| r.repayment_id()).max();
            for record in page {
                self.ingest_repayment(record, &mut pass).await;
            }

            match page_max {
                Some(max) if max > cursor => cursor = max,
                _ => break,
            }
            if (len as i64) < self.page_size {
                break;
            }
        }

        (pass, None)
    }

    /// Ingest one upstream repayment. A malformed record with a numeric id
    /// counts as failed, so it holds the mark and is fetched again next run.
    async fn ingest_repayment(
        &self,
        record: SourceRecord<SourceRepayment>,
        pass: &mut RepaymentPass,
    ) {
        let numeric_id = record.repayment_id();
        let record = match record {
            SourceRecord::Parsed(record) => record,
            SourceRecord::Malformed { id, error } => {
                warn!(repayment_id = ?id, error = %error, "Malformed repayment record");
                if let Some(numeric_id) = numeric_id {
                    pass.failed.push(numeric_id);
                }
                pass.errors.push(malformed("repayment", id, error));
                return;
            }
        };
        let Some(id) = record.id else {
            pass.errors.push(SyncRecordError {
                record_type: "repayment",
                id: None,
                error: "missing required field: id".to_string(),
            });
            return;
        };

        let result = match record.into_input() {
            Ok(input) => self.ingestor.create_repayment(input).await,
            Err(e) => Err(IngestError::Validation(e)),
        };
        match result {
            Ok(ingested) => {
                if ingested.outcome.changed() {
                    pass.synced += 1;
                } else {
                    pass.unchanged += 1;
                }
                pass.succeeded.push(id);
            }
            Err(e) => {
                warn!(repayment_id = id, error = %e, "Repayment sync failed");
                pass.failed.push(id);
                pass.errors
                    .push(record_error("repayment", Some(id.to_string()), &e));
            }
        }
    }
}

fn malformed(record_type: &'static str, id: Option<String>, error: String) -> SyncRecordError {
    SyncRecordError {
        record_type,
        id,
        error: format!("malformed record: {}", error),
    }
}

fn record_error(record_type: &'static str, id: Option<String>, err: &IngestError) -> SyncRecordError {
    SyncRecordError {
        record_type,
        id,
        error: err.to_string(),
    }
}
