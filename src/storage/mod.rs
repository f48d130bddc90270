//! Persistence for books, outlines, conversations, chapters and QA reports.

pub mod database;

pub use database::{Database, PoolConfig, SharedDatabase};
