//! Write paths and background work around the derived-state engine.

pub mod ingest;
pub mod locks;
pub mod recalc;
pub mod recompute;
pub mod sync;

pub use ingest::{
    BatchCounts, BatchRecordError, BatchStatus, BatchSyncResult, EventIngestor, IngestError,
    LoanIngested, RepaymentIngested,
};
pub use locks::{LoanGuard, LoanLocks};
pub use recalc::{
    JobState, RecalcJobStatus, RecalcJobs, RecalcLoanError, RecalcSummary,
    RecalculationOrchestrator,
};
pub use recompute::{LoanRecomputer, RecomputeError};
pub use sync::{
    FullSyncResult, IncrementalSyncResult, LoanSyncResult, SyncError, SyncReconciler,
    SyncRecordError, REPAYMENTS_MARK,
};
