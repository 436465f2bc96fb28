// src/config/mod.rs
pub mod app;

pub use app::{
    AppConfig, CurationConfig, EnrichmentConfig, FeedConfig, FeedKind, OracleConfig,
    ReportConfig, StorageConfig,
};
