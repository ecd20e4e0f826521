mod common;

use common::{customer_input, dec, loan_input, setup, source_repayment};
use loanledger::datasource::{MockSourceOfRecord, SourceLoan, SourceRepayment};
use loanledger::domain::OfficerInput;
use loanledger::orchestration::REPAYMENTS_MARK;
use loanledger::LoanId;
use serde_json::json;
use tokio_test::{assert_err, assert_ok};

#[tokio::test]
async fn repeated_sync_with_nothing_new_is_a_noop() {
    let source = MockSourceOfRecord::new().with_repayments(vec![
        source_repayment(1, "L-1", "2024-01-02", "100"),
        source_repayment(2, "L-1", "2024-01-03", "100"),
    ]);
    let env = setup("2024-01-05", source, 10).await;
    env.ingestor.create_loan(loan_input("L-1")).await.unwrap();

    let first = assert_ok!(env.sync.sync_incremental().await);
    assert_eq!(first.total_synced, 2);
    assert_eq!(first.last_id_synced, 2);

    for _ in 0..2 {
        let again = assert_ok!(env.sync.sync_incremental().await);
        assert_eq!(again.total_synced, 0);
        assert_eq!(again.total_errors, 0);
        assert_eq!(again.previous_max_id, 2);
        assert_eq!(again.last_id_synced, 2);
    }
    assert_eq!(env.repo.count_repayments().await.unwrap(), 2);
    assert_eq!(env.repo.get_sync_mark(REPAYMENTS_MARK).await.unwrap(), Some(2));
}

#[tokio::test]
async fn out_of_order_ids_with_gaps_are_all_ingested() {
    let source = MockSourceOfRecord::new().with_repayments(vec![
        source_repayment(40, "L-1", "2024-01-04", "10"),
        source_repayment(7, "L-1", "2024-01-02", "10"),
        source_repayment(23, "L-1", "2024-01-03", "10"),
        source_repayment(3, "L-1", "2024-01-02", "10"),
        source_repayment(51, "L-1", "2024-01-04", "10"),
    ]);
    let env = setup("2024-01-05", source.clone(), 2).await;
    env.ingestor.create_loan(loan_input("L-1")).await.unwrap();

    let result = env.sync.sync_incremental().await.unwrap();
    assert_eq!(result.total_synced, 5);
    assert_eq!(result.last_id_synced, 51);
    assert_eq!(source.repayment_fetches(), 3);

    let state = env
        .repo
        .get_derived_state(&LoanId::new("L-1"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(state.total_principal_paid, dec("50"));
}

#[tokio::test]
async fn failed_record_holds_mark_and_is_retried() {
    let source = MockSourceOfRecord::new().with_repayments(vec![
        source_repayment(10, "L-1", "2024-01-02", "10"),
        source_repayment(15, "L-2", "2024-01-02", "10"),
        source_repayment(20, "L-1", "2024-01-03", "10"),
    ]);
    let env = setup("2024-01-05", source, 100).await;
    env.ingestor.create_loan(loan_input("L-1")).await.unwrap();

    let first = env.sync.sync_incremental().await.unwrap();
    assert_eq!(first.total_synced, 2);
    assert_eq!(first.total_errors, 1);
    assert_eq!(first.errors[0].id.as_deref(), Some("15"));
    assert_eq!(first.last_id_synced, 10);

    env.ingestor.create_loan(loan_input("L-2")).await.unwrap();
    let retry = env.sync.sync_incremental().await.unwrap();
    assert_eq!(retry.previous_max_id, 10);
    assert_eq!(retry.total_synced, 1);
    assert_eq!(retry.total_unchanged, 1);
    assert_eq!(retry.total_errors, 0);
    assert_eq!(retry.last_id_synced, 20);
}

#[tokio::test]
async fn incomplete_record_is_a_per_record_error() {
    let source = MockSourceOfRecord::new().with_repayments(vec![
        source_repayment(1, "L-1", "2024-01-02", "10"),
        SourceRepayment {
            id: Some(2),
            loan_id: Some("L-1".to_string()),
            payment_amount: Some(dec("10")),
            ..SourceRepayment::default()
        },
    ]);
    let env = setup("2024-01-05", source, 100).await;
    env.ingestor.create_loan(loan_input("L-1")).await.unwrap();

    let result = env.sync.sync_incremental().await.unwrap();
    assert_eq!(result.total_synced, 1);
    assert_eq!(result.total_errors, 1);
    assert!(result.errors[0].error.contains("payment_date"));
    assert_eq!(result.last_id_synced, 1);
}

#[tokio::test]
async fn malformed_record_is_reported_and_the_rest_of_the_page_lands() {
    let row = |id: i64, extra: serde_json::Value| {
        let mut value = json!({
            "id": id,
            "loan_id": "L-1",
            "payment_date": "2024-01-02",
            "payment_amount": 10,
        });
        if let (Some(obj), Some(extra)) = (value.as_object_mut(), extra.as_object()) {
            obj.extend(extra.clone());
        }
        value
    };
    let source = MockSourceOfRecord::new()
        .with_repayment(source_repayment(1, "L-1", "2024-01-02", "10"))
        .with_raw_repayment(row(2, json!({"is_reversed": 0, "is_backdated": 1})))
        .with_raw_repayment(row(3, json!({"is_backdated": "sometimes"})))
        .with_repayment(source_repayment(4, "L-1", "2024-01-03", "10"));
    let env = setup("2024-01-05", source, 100).await;
    env.ingestor.create_loan(loan_input("L-1")).await.unwrap();

    let first = assert_ok!(env.sync.sync_incremental().await);
    assert_eq!(first.total_synced, 3);
    assert_eq!(first.total_errors, 1);
    assert_eq!(first.errors[0].id.as_deref(), Some("3"));
    assert!(first.errors[0].error.contains("malformed"));
    assert_eq!(first.last_id_synced, 2);

    let again = assert_ok!(env.sync.sync_incremental().await);
    assert_eq!(again.previous_max_id, 2);
    assert_eq!(again.total_synced, 0);
    assert_eq!(again.total_unchanged, 1);
    assert_eq!(again.total_errors, 1);
    assert_eq!(again.last_id_synced, 2);

    let state = env
        .repo
        .get_derived_state(&LoanId::new("L-1"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(state.total_principal_paid, dec("30"));
}

#[tokio::test]
async fn mark_falls_back_to_stored_repayments() {
    let source = MockSourceOfRecord::new()
        .with_repayments(vec![source_repayment(5, "L-1", "2024-01-02", "10")]);
    let env = setup("2024-01-05", source, 100).await;
    env.ingestor.create_loan(loan_input("L-1")).await.unwrap();
    env.ingestor
        .create_repayment(common::repayment_input("8", "L-1", "2024-01-02", "10", "0", "0"))
        .await
        .unwrap();

    let result = env.sync.sync_incremental().await.unwrap();
    assert_eq!(result.previous_max_id, 8);
    assert_eq!(result.total_synced, 0);
    assert_eq!(result.last_id_synced, 8);
}

#[tokio::test]
async fn full_sync_pulls_customers_officers_loans_and_repayments() {
    let source = MockSourceOfRecord::new()
        .with_customer(customer_input("C-1"))
        .with_officer(OfficerInput {
            officer_id: "OF-1".to_string(),
            name: "Ada".to_string(),
            branch: None,
            region: None,
        })
        .with_loans(vec![
            SourceLoan {
                loan_id: Some("L-1".to_string()),
                customer_id: Some("C-1".to_string()),
                officer_id: Some("OF-1".to_string()),
                principal: Some(dec("9000")),
                interest_rate: Some(dec("0.1")),
                fee_amount: Some(dec("90")),
                disbursement_date: Some("2024-01-01".to_string()),
                loan_term_days: Some(3),
                ..SourceLoan::default()
            },
            SourceLoan {
                loan_id: Some("L-broken".to_string()),
                ..SourceLoan::default()
            },
            SourceLoan {
                loan_id: Some("L-orphan".to_string()),
                customer_id: Some("C-404".to_string()),
                principal: Some(dec("9000")),
                disbursement_date: Some("2024-01-01".to_string()),
                loan_term_days: Some(3),
                ..SourceLoan::default()
            },
        ])
        .with_repayments(vec![
            source_repayment(1, "L-1", "2024-01-02", "3363"),
            source_repayment(2, "L-1", "2024-01-03", "3363"),
        ]);
    let env = setup("2024-01-05", source, 1).await;

    let result = env.sync.sync_full().await.unwrap();
    assert_eq!(result.customers_synced, 1);
    assert_eq!(result.officers_synced, 1);
    assert_eq!(result.loans_synced, 1);
    assert_eq!(result.repayments_synced, 2);
    assert_eq!(result.total_errors, 2);
    assert_eq!(result.last_id_synced, 2);
    assert!(result
        .errors
        .iter()
        .any(|e| e.id.as_deref() == Some("L-orphan") && e.error.contains("C-404")));

    let loan = env.repo.get_loan(&LoanId::new("L-1")).await.unwrap().unwrap();
    assert_eq!(loan.officer_id.map(|o| o.0), Some("OF-1".to_string()));
    assert_eq!(loan.customer_id.map(|c| c.0), Some("C-1".to_string()));
    let state = env
        .repo
        .get_derived_state(&loan.loan_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(state.total_principal_paid, dec("6726"));
}

#[tokio::test]
async fn loan_sync_leaves_mark_alone() {
    let source = MockSourceOfRecord::new().with_repayments(vec![
        source_repayment(9, "L-1", "2024-01-02", "10"),
        source_repayment(12, "L-2", "2024-01-02", "10"),
    ]);
    let env = setup("2024-01-05", source, 100).await;
    env.ingestor.create_loan(loan_input("L-1")).await.unwrap();

    let result = env
        .sync
        .sync_loan_repayments(&LoanId::new("L-1"))
        .await
        .unwrap();
    assert_eq!(result.total_fetched, 1);
    assert_eq!(result.total_synced, 1);
    assert_eq!(env.repo.get_sync_mark(REPAYMENTS_MARK).await.unwrap(), None);

    assert_err!(env.sync.sync_loan_repayments(&LoanId::new("L-9")).await);
}
