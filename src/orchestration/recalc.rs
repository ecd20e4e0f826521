//! Batch recompute of every loan, run as a background job.

use crate::domain::LoanId;
use crate::orchestration::recompute::LoanRecomputer;
use chrono::{DateTime, Duration, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RecalcLoanError {
    pub loan_id: LoanId,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RecalcSummary {
    pub total_loans_processed: usize,
    pub loans_updated: usize,
    pub loans_degraded: usize,
    pub loans_failed: usize,
    pub errors: Vec<RecalcLoanError>,
    pub execution_time_ms: u64,
    pub cancelled: bool,
    /// Every loan id up to and including this one has been processed.
    pub last_checkpoint: Option<LoanId>,
}

enum LoanOutcome {
    Updated,
    Degraded(String),
    Failed(String),
    Skipped,
}

#[derive(Debug, Clone)]
pub struct RecalculationOrchestrator {
    recomputer: LoanRecomputer,
    batch_size: i64,
    concurrency: usize,
}

impl RecalculationOrchestrator {
    pub fn new(recomputer: LoanRecomputer, batch_size: i64, concurrency: usize) -> Self {
        Self {
            recomputer,
            batch_size: batch_size.max(1),
            concurrency: concurrency.max(1),
        }
    }

    /// Recompute loans with ids after `resume_after`, in ascending id order.
    ///
    /// `progress` is called after each chunk with the running summary.
    pub async fn run<F>(
        &self,
        resume_after: Option<LoanId>,
        cancel: &AtomicBool,
        mut progress: F,
    ) -> Result<RecalcSummary, sqlx::Error>
    where
        F: FnMut(&RecalcSummary),
    {
        let started = Instant::now();
        let repo = self.recomputer.repo();
        let mut summary = RecalcSummary {
            last_checkpoint: resume_after.clone(),
            ..RecalcSummary::default()
        };
        let mut after = resume_after;

        loop {
            let ids = repo
                .list_loan_ids_after(after.as_ref(), self.batch_size)
                .await?;
            if ids.is_empty() {
                break;
            }

            let mut outcomes: Vec<(LoanId, LoanOutcome)> = stream::iter(ids.iter().cloned())
                .map(|loan_id| async move {
                    if cancel.load(Ordering::SeqCst) {
                        return (loan_id, LoanOutcome::Skipped);
                    }
                    let outcome = match self.recomputer.recompute(&loan_id).await {
                        Ok(state) if state.degraded => LoanOutcome::Degraded(
                            state
                                .degraded_reason
                                .unwrap_or_else(|| "degraded".to_string()),
                        ),
                        Ok(_) => LoanOutcome::Updated,
                        Err(e) => LoanOutcome::Failed(e.to_string()),
                    };
                    (loan_id, outcome)
                })
                .buffer_unordered(self.concurrency)
                .collect()
                .await;
            outcomes.sort_by(|a, b| a.0.cmp(&b.0));

            let mut contiguous = true;
            for (loan_id, outcome) in outcomes {
                match outcome {
                    LoanOutcome::Skipped => {
                        contiguous = false;
                        continue;
                    }
                    LoanOutcome::Updated => summary.loans_updated += 1,
                    LoanOutcome::Degraded(reason) => {
                        warn!(loan_id = %loan_id, reason = %reason, "Loan recomputed degraded");
                        summary.loans_degraded += 1;
                        summary.errors.push(RecalcLoanError {
                            loan_id: loan_id.clone(),
                            error: reason,
                        });
                    }
                    LoanOutcome::Failed(err) => {
                        error!(loan_id = %loan_id, error = %err, "Loan recompute failed");
                        summary.loans_failed += 1;
                        summary.errors.push(RecalcLoanError {
                            loan_id: loan_id.clone(),
                            error: err,
                        });
                    }
                }
                summary.total_loans_processed += 1;
                if contiguous {
                    summary.last_checkpoint = Some(loan_id);
                }
            }
            summary.execution_time_ms = started.elapsed().as_millis() as u64;
            progress(&summary);

            if cancel.load(Ordering::SeqCst) {
                summary.cancelled = true;
                break;
            }
            if (ids.len() as i64) < self.batch_size {
                break;
            }
            after = ids.last().cloned();
        }

        summary.execution_time_ms = started.elapsed().as_millis() as u64;
        info!(
            processed = summary.total_loans_processed,
            updated = summary.loans_updated,
            degraded = summary.loans_degraded,
            failed = summary.loans_failed,
            cancelled = summary.cancelled,
            elapsed_ms = summary.execution_time_ms,
            "Recalculation finished"
        );
        Ok(summary)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Running,
    Completed,
    Cancelled,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecalcJobStatus {
    pub job_id: String,
    pub state: JobState,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub resume_after: Option<LoanId>,
    pub progress: RecalcSummary,
    pub error: Option<String>,
}

#[derive(Debug)]
struct JobHandle {
    cancel: AtomicBool,
    status: Mutex<RecalcJobStatus>,
}

impl JobHandle {
    fn update(&self, f: impl FnOnce(&mut RecalcJobStatus)) {
        let mut status = self.status.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut status);
    }

    fn snapshot(&self) -> RecalcJobStatus {
        self.status.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

/// How long a finished job stays queryable.
pub const DEFAULT_JOB_RETENTION_HOURS: i64 = 24;

/// In-memory registry of recompute jobs.
///
/// Finished jobs are dropped once older than the retention window; pruning
/// happens whenever a new job starts.
#[derive(Debug, Clone)]
pub struct RecalcJobs {
    orchestrator: RecalculationOrchestrator,
    jobs: Arc<Mutex<HashMap<String, Arc<JobHandle>>>>,
    retention: Duration,
}

impl RecalcJobs {
    pub fn new(orchestrator: RecalculationOrchestrator) -> Self {
        Self {
            orchestrator,
            jobs: Arc::new(Mutex::new(HashMap::new())),
            retention: Duration::hours(DEFAULT_JOB_RETENTION_HOURS),
        }
    }

    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    fn prune_finished(&self, jobs: &mut HashMap<String, Arc<JobHandle>>) {
        let cutoff = Utc::now() - self.retention;
        let before = jobs.len();
        jobs.retain(|_, handle| {
            handle
                .snapshot()
                .finished_at
                .map_or(true, |finished| finished > cutoff)
        });
        let pruned = before - jobs.len();
        if pruned > 0 {
            debug!(pruned, "Dropped finished recalculation jobs");
        }
    }

    /// Spawn a job and return its id immediately.
    pub fn start(&self, resume_after: Option<LoanId>) -> String {
        let job_id = uuid::Uuid::new_v4().to_string();
        let handle = Arc::new(JobHandle {
            cancel: AtomicBool::new(false),
            status: Mutex::new(RecalcJobStatus {
                job_id: job_id.clone(),
                state: JobState::Running,
                started_at: Utc::now(),
                finished_at: None,
                resume_after: resume_after.clone(),
                progress: RecalcSummary::default(),
                error: None,
            }),
        });
        {
            let mut jobs = self.jobs.lock().unwrap_or_else(|e| e.into_inner());
            self.prune_finished(&mut jobs);
            jobs.insert(job_id.clone(), handle.clone());
        }

        let orchestrator = self.orchestrator.clone();
        info!(job_id = %job_id, resume_after = ?resume_after, "Recalculation job started");
        tokio::spawn(async move {
            let result = orchestrator
                .run(resume_after, &handle.cancel, |summary| {
                    handle.update(|s| s.progress = summary.clone());
                })
                .await;
            handle.update(|s| {
                s.finished_at = Some(Utc::now());
                match result {
                    Ok(summary) => {
                        s.state = if summary.cancelled {
                            JobState::Cancelled
                        } else {
                            JobState::Completed
                        };
                        s.progress = summary;
                    }
                    Err(e) => {
                        error!(job_id = %s.job_id, error = %e, "Recalculation job failed");
                        s.state = JobState::Failed;
                        s.error = Some(e.to_string());
                    }
                }
            });
        });

        job_id
    }

    pub fn status(&self, job_id: &str) -> Option<RecalcJobStatus> {
        let jobs = self.jobs.lock().unwrap_or_else(|e| e.into_inner());
        jobs.get(job_id).map(|handle| handle.snapshot())
    }

    /// Request cancellation. Returns false for unknown jobs.
    pub fn cancel(&self, job_id: &str) -> bool {
        let jobs = self.jobs.lock().unwrap_or_else(|e| e.into_inner());
        match jobs.get(job_id) {
            Some(handle) => {
                handle.cancel.store(true, Ordering::SeqCst);
                info!(job_id = %job_id, "Recalculation cancel requested");
                true
            }
            None => false,
        }
    }
}
