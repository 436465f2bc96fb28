// src/ingest/providers/mod.rs
pub mod json_feed;
pub mod rss;

pub use json_feed::JsonFeedProvider;
pub use rss::RssFeedProvider;
