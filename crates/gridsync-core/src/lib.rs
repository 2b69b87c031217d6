//! gridsync-core - Offline layer for row/column data grids
//!
//! This crate keeps a data-grid client working without a network: local
//! mutations are recorded in a durable queue, remote rows are cached for
//! offline reads, and the queue is replayed against the system of record once
//! connectivity returns.
//!
//! Components, leaves first: [`LocalStore`], [`PendingQueue`], [`SyncEngine`]
//! and [`ConnectivityController`].

pub mod config;
pub mod connectivity;
pub mod controller;
pub mod db;
pub mod error;
mod listeners;
pub mod models;
pub mod queue;
pub mod remote;
pub mod store;
pub mod sync;
pub mod util;

pub use config::{RemoteConfig, RetryPolicy, StoreLocation, SyncConfig};
pub use connectivity::{Connectivity, ConnectivitySignal, ReachabilityProbe, Subscription};
pub use controller::{ConnectivityBinding, ConnectivityController};
pub use error::{Error, Result};
pub use models::{
    CachedRow, Operation, PendingChange, PendingChangeId, Row, StorageEstimate, SyncFailure,
    SyncOutcome, SyncStatus,
};
pub use queue::PendingQueue;
pub use remote::{MemoryRemoteStore, RemoteError, RemoteStore, RestRemoteStore};
pub use store::{LocalStore, StoreCollection};
pub use sync::SyncEngine;
