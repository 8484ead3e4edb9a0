//! Data synchronization core for the rotation portal client
//!
//! This crate provides the core functionality for:
//! - A normalized store of projects, users, rotations and emails
//! - A request pipeline that de-duplicates reads and normalizes errors
//! - Sync operations that keep the store consistent with the API
//! - Optimistic project updates
//! - Metrics and structured logging

pub mod error;
pub mod models;
pub mod observability;
pub mod optimistic;
pub mod pipeline;
pub mod store;
pub mod sync;

pub use error::{ApiError, SyncError, NOT_UPLOADED_MESSAGE};
pub use models::*;
pub use observability::{StructuredLogger, SyncMetrics};
pub use store::{Email, EntityStore, Project, Resource, Rotation, Singleton, User};
pub use sync::{Hooks, ListOutcome, SyncClient, SyncClientBuilder, SyncConfig, UserProjects};
