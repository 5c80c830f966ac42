//! verdict-core library.
//!
//! Reviewer-partitioned annotation of claim-pair predictions: a read-only
//! [`dataset::Dataset`], a per-reviewer [`store::RecordStore`] persisted as
//! CSV snapshots, the [`session::SessionState`] machine that gates which
//! fields are editable, and [`navigate::Navigator`], which saves on every
//! move and pushes the snapshot to an optional [`sync::RemoteSync`].
//!
//! # Conventions
//!
//! - **Errors**: one `thiserror` enum per module, each with `code()` mapping
//!   to a stable [`error::ErrorCode`].
//! - **Logging**: `tracing` macros (`debug!` for state transitions, `info!`
//!   for saves and pushes, `warn!` for sync failures and discarded edits).

pub mod config;
pub mod dataset;
pub mod error;
pub mod lock;
pub mod model;
pub mod navigate;
pub mod reviewer;
pub mod session;
pub mod store;
pub mod sync;
