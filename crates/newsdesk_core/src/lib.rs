//! Verdict pipeline and reliability ledger for the newsdesk service.
//!
//! Local articles are fact-checked once by an external oracle (or a
//! deterministic stand-in); each resolved verdict is folded into a per-source
//! reliability score. `news` merges stored articles with an upstream listing.

pub mod articles;
pub mod config;
pub mod db;
pub mod error;
pub mod ledger;
pub mod news;
pub mod oracle;
pub mod schema;
pub mod verdict;

pub use config::AppConfig;
pub use db::Store;
pub use error::PipelineError;
pub use ledger::ReliabilityLedger;
pub use news::{GNewsClient, ListingQuery, NewsDesk, NewsFilter, NewsListing};
pub use oracle::{FactChecker, GeminiOracle, OracleMode, StandInOracle};
pub use verdict::VerdictPipeline;
