//! Per-loan async locks.

use crate::domain::LoanId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type LockMap = HashMap<LoanId, Arc<AsyncMutex<()>>>;

/// One async mutex per loan id, created on demand and dropped once unused.
#[derive(Debug, Clone, Default)]
pub struct LoanLocks {
    inner: Arc<Mutex<LockMap>>,
}

impl LoanLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `loan_id`.
    pub async fn lock(&self, loan_id: &LoanId) -> LoanGuard {
        let mutex = {
            let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            map.entry(loan_id.clone())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        let guard = mutex.lock_owned().await;
        LoanGuard {
            guard: Some(guard),
            locks: self.clone(),
            loan_id: loan_id.clone(),
        }
    }

    /// Number of loans with a live lock entry.
    #[cfg(test)]
    pub(crate) fn active(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// Held while a loan is being recomputed.
#[derive(Debug)]
pub struct LoanGuard {
    guard: Option<OwnedMutexGuard<()>>,
    locks: LoanLocks,
    loan_id: LoanId,
}

impl Drop for LoanGuard {
    fn drop(&mut self) {
        let mut map = self.locks.inner.lock().unwrap_or_else(|e| e.into_inner());
        // Release first so the count below only sees the map and any waiters.
        self.guard.take();
        if let Some(mutex) = map.get(&self.loan_id) {
            if Arc::strong_count(mutex) == 1 {
                map.remove(&self.loan_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_loan_is_serialized() {
        let locks = LoanLocks::new();
        let in_section = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let locks = locks.clone();
            let in_section = in_section.clone();
            let max_seen = max_seen.clone();
            handles.push(tokio::spawn(async move {
                let _guard = locks.lock(&LoanId::new("L-1")).await;
                let now = in_section.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(2)).await;
                in_section.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
        assert_eq!(locks.active(), 0);
    }

    #[tokio::test]
    async fn test_different_loans_do_not_block() {
        let locks = LoanLocks::new();
        let _a = locks.lock(&LoanId::new("L-1")).await;
        let b = tokio::time::timeout(Duration::from_millis(200), locks.lock(&LoanId::new("L-2")))
            .await;
        assert!(b.is_ok());
        assert_eq!(locks.active(), 2);
    }
}
