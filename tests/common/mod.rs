#![allow(dead_code)]

use chrono::NaiveDate;
use loanledger::datasource::{MockSourceOfRecord, SourceRepayment};
use loanledger::db::init_db;
use loanledger::domain::{CustomerInput, Decimal, LoanInput, RepaymentInput};
use loanledger::engine::ScoreWeights;
use loanledger::orchestration::{
    EventIngestor, LoanRecomputer, RecalcJobs, RecalculationOrchestrator, SyncReconciler,
};
use loanledger::{api, Clock, FixedClock, Repository, SourceOfRecord};
use std::str::FromStr;
use std::sync::Arc;
use tempfile::TempDir;

pub struct TestEnv {
    pub repo: Arc<Repository>,
    pub clock: Arc<FixedClock>,
    pub recomputer: LoanRecomputer,
    pub ingestor: EventIngestor,
    pub source: MockSourceOfRecord,
    pub sync: SyncReconciler,
    pub _temp: TempDir,
}

impl TestEnv {
    pub fn orchestrator(&self, batch_size: i64, concurrency: usize) -> RecalculationOrchestrator {
        RecalculationOrchestrator::new(self.recomputer.clone(), batch_size, concurrency)
    }

    pub fn router(&self) -> axum::Router {
        let jobs = RecalcJobs::new(self.orchestrator(4, 2));
        let state = api::AppState::new(
            self.repo.clone(),
            self.ingestor.clone(),
            self.sync.clone(),
            jobs,
        );
        api::create_router(state)
    }
}

pub async fn setup(today: &str, source: MockSourceOfRecord, page_size: i64) -> TestEnv {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir
        .path()
        .join("test.db")
        .to_string_lossy()
        .to_string();
    let pool = init_db(&db_path).await.expect("init_db failed");
    let repo = Arc::new(Repository::new(pool));
    let clock = Arc::new(FixedClock::new(date(today)));

    let recomputer = LoanRecomputer::new(
        repo.clone(),
        clock.clone() as Arc<dyn Clock>,
        ScoreWeights::default(),
    );
    let ingestor = EventIngestor::new(recomputer.clone());
    let sync = SyncReconciler::new(
        Arc::new(source.clone()) as Arc<dyn SourceOfRecord>,
        ingestor.clone(),
        page_size,
    );

    TestEnv {
        repo,
        clock,
        recomputer,
        ingestor,
        source,
        sync,
        _temp: temp_dir,
    }
}

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

pub fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

pub fn customer_input(id: &str) -> CustomerInput {
    CustomerInput {
        customer_id: id.to_string(),
        customer_name: format!("Customer {}", id),
        customer_phone: Some("08030000000".to_string()),
        customer_email: None,
        date_of_birth: None,
        state: Some("Lagos".to_string()),
        lga: None,
        kyc_status: None,
    }
}

/// 1,000,000 principal at 30% with 50,000 fees over 90 days, disbursed 2024-01-01.
/// No customer is attached; see [`customer_input`].
pub fn loan_input(id: &str) -> LoanInput {
    LoanInput {
        loan_id: id.to_string(),
        customer_id: None,
        officer_id: None,
        principal: dec("1000000"),
        interest_rate: Some(dec("0.3")),
        fee_amount: Some(dec("50000")),
        disbursement_date: "2024-01-01".to_string(),
        loan_term_days: 90,
        maturity_date: None,
        status: None,
    }
}

pub fn repayment_input(id: &str, loan_id: &str, day: &str, p: &str, i: &str, f: &str) -> RepaymentInput {
    let (p, i, f) = (dec(p), dec(i), dec(f));
    RepaymentInput {
        repayment_id: id.to_string(),
        loan_id: loan_id.to_string(),
        payment_date: day.to_string(),
        payment_amount: p + i + f,
        principal_paid: p,
        interest_paid: i,
        fees_paid: f,
        penalty_paid: Decimal::zero(),
        payment_method: Some("transfer".to_string()),
        is_reversed: false,
        is_backdated: false,
    }
}

pub fn source_repayment(id: i64, loan_id: &str, day: &str, amount: &str) -> SourceRepayment {
    SourceRepayment {
        id: Some(id),
        loan_id: Some(loan_id.to_string()),
        payment_date: Some(day.to_string()),
        payment_amount: Some(dec(amount)),
        ..SourceRepayment::default()
    }
}
