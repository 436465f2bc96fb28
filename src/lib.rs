// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod balance;
pub mod config;
pub mod curator;
pub mod enrich;
pub mod filter;
pub mod history;
pub mod ingest;
pub mod notify;
pub mod oracle;
pub mod report;
pub mod telemetry;

// ---- Re-exports for stable public API ----
pub use crate::config::AppConfig;
pub use crate::curator::{Curator, CuratorSettings, RunReport};
pub use crate::filter::{Rejection, RuleFilter, RulePolicy, Verdict};
pub use crate::history::{DuplicateLookup, HistoryStore, RecentStore};
pub use crate::ingest::types::{Candidate, FeedProvider, RawRecord, Source};
pub use crate::oracle::{OracleDecision, Origin, Outcome, SelectionOracle};
