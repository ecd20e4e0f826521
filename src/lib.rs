pub mod api;
pub mod clock;
pub mod config;
pub mod datasource;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;
pub mod orchestration;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::Config;
pub use datasource::{DataSourceError, HttpSourceOfRecord, MockSourceOfRecord, SourceOfRecord};
pub use db::{init_db, Repository};
pub use domain::{Decimal, DerivedLoanState, FimrState, LoanId, LoanStatus};
pub use error::AppError;
