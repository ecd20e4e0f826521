//! Source-of-record abstraction for pulling customers, officers, loans and
//! repayments.

use crate::domain::{CustomerInput, OfficerInput};
use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

pub mod http;
pub mod mock;
pub mod records;

pub use http::HttpSourceOfRecord;
pub use mock::MockSourceOfRecord;
pub use records::{SourceLoan, SourceRecord, SourceRepayment};

/// Upstream system of record.
///
/// Implementations must handle retry/backoff and rate limiting. A page that
/// arrives but holds undecodable elements is still `Ok`; those elements come
/// back as [`SourceRecord::Malformed`].
#[async_trait]
pub trait SourceOfRecord: Send + Sync + fmt::Debug {
    /// One page of customers.
    async fn fetch_customers(
        &self,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<SourceRecord<CustomerInput>>, DataSourceError>;

    /// One page of officers.
    async fn fetch_officers(
        &self,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<SourceRecord<OfficerInput>>, DataSourceError>;

    /// One page of loans, in the source's stable order.
    async fn fetch_loans(
        &self,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<SourceRecord<SourceLoan>>, DataSourceError>;

    /// Repayments with `id > after_id`, at most `limit`.
    ///
    /// Ids are not guaranteed contiguous and a page may be unordered.
    async fn fetch_repayments_after(
        &self,
        after_id: i64,
        limit: i64,
    ) -> Result<Vec<SourceRecord<SourceRepayment>>, DataSourceError>;

    /// Every repayment recorded against one loan.
    async fn fetch_loan_repayments(
        &self,
        loan_id: &str,
    ) -> Result<Vec<SourceRecord<SourceRepayment>>, DataSourceError>;
}

/// Error type for source-of-record operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DataSourceError {
    /// Connection failure, timeout, DNS.
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("HTTP error {status}: {message}")]
    HttpError { status: u16, message: String },
    /// Malformed response body.
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("Rate limited")]
    RateLimited,
    #[error("Error: {0}")]
    Other(String),
}
