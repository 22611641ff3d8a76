//! Listing Cache - memoizing gateway for marketplace scrapes and AI verdicts
//!
//! Scraping a listing and asking a model to judge filters against it are
//! slow and costly. This crate puts a cache with in-flight collapsing and
//! detail-level reuse in front of both, over interchangeable backends.

pub mod api;
pub mod cache;
pub mod collab;
pub mod config;
pub mod error;
pub mod gateway;
pub mod models;
pub mod tasks;

pub use api::AppState;
pub use config::Config;
pub use gateway::CacheGateway;
pub use tasks::spawn_sweeper;
