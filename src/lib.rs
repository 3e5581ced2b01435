pub mod config;
pub mod error;
pub mod input_loader;
pub mod record;
pub mod record_store;
pub mod search_api;
pub mod query_runner;
pub mod resume_manager;
pub mod delay_manager;
pub mod logger;

// Exporting types for convenience
pub use config::Config;
pub use error::{ConfigError, FetchError, InputError, RunError, StoreError};
pub use record::SaleRecord;
pub use record_store::{CsvRecordStore, RecordStore};
pub use search_api::{HttpTransport, PageFetcher, PageResult, Retrying, SearchTransport};
pub use query_runner::{QueryOutcome, QueryRunner};
pub use resume_manager::{ResumeController, RunSummary};
pub use delay_manager::DelayManager;
