//! Vigil Persist - the SQL persister
//!
//! Ingests the monitoring event stream into the relational store. The hard
//! part is ordering: statements for one poller must apply in event order
//! while unrelated pollers proceed in parallel. The [`ConnectionPool`] gives
//! every logical connection its own worker executing submitted statements
//! FIFO, with action-mask barriers for the cases where one object family
//! depends on another's pending writes.
//!
//! On top of that sit the entity caches (index ids, metric ids, resource
//! surrogates, command hashes) that keep the hot perfdata path at O(1), the
//! staging queues bulk-flushed on a timer, the perfdata parser feeding the
//! RRD writer through derived `metric`/`status` events, and the per-kind
//! handlers with their idempotent upserts.

mod actions;
mod cache;
mod error;
mod perfdata;
mod persister;
mod pool;
mod queues;
mod schema;

pub use actions::Action;
pub use cache::Caches;
pub use error::PersistError;
pub use perfdata::{parse_perfdata, PerfMetric, ValueType};
pub use persister::{Persister, PersisterConfig, PersisterStats, PersisterStatsHandle};
pub use pool::{ConnectionPool, SpecialConn, ALL_CONNECTIONS};

/// Result type for persister operations
pub type Result<T> = std::result::Result<T, PersistError>;

/// Status events older than this (relative to their own `next_check`) are
/// dropped as stale
pub const STALE_STATUS_WINDOW_SECS: i64 = 5 * 60;

#[cfg(test)]
mod perfdata_test;
#[cfg(test)]
mod pool_test;
#[cfg(test)]
mod persister_test;
