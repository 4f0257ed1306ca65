//! Durable storage for meter readings.

pub mod sqlite_store;

pub use sqlite_store::SqliteReadingStore;
