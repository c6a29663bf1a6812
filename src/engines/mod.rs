//! Storage engine interface
//!
//! The executor talks to storage only through [`ObjectStoreEngine`], so the
//! built-in [`StorageEngine`](crate::storage::StorageEngine) can be swapped
//! for another engine, or wrapped to inject failures in tests.

pub mod handler;

pub use handler::ObjectStoreEngine;
