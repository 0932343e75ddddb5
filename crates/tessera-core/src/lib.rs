//! # Tessera
//!
//! A typed, optimistic-concurrency row layer over a wide-column key-value
//! backend with composite `(partition, sort)` primary keys.
//!
//! Heterogeneous, versioned rows coexist under a common partition: every
//! row carries an immutable create date, a monotonically increasing row
//! version, and a stable row-type tag naming its payload schema. Updates
//! and conditional deletes are guarded by `(rowVersion, createDate)`, so
//! lost updates fail fast instead of silently clobbering. Bulk writes are
//! rendered into the backend's statement dialect, chunked to its per-call
//! limit, and dispatched concurrently with aggregated partial errors.
//!
//! The backend itself is an opaque RPC client behind the
//! [`backend::StoreClient`] trait; the bundled [`MemoryStore`] implements
//! the same operation contract in memory for tests and semantics
//! validation.
//!
//! ## Quick Start
//!
//! ```no_run
//! use serde::{Deserialize, Serialize};
//! use tessera_core::{KeySchema, MemoryStore, Query, Row, RowKey, RowPayload, SortCondition};
//!
//! struct Keys;
//! impl KeySchema for Keys {
//!     const PARTITION_KEY: &'static str = "PK";
//!     const SORT_KEY: &'static str = "SK";
//! }
//!
//! #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
//! struct Contact {
//!     name: String,
//!     age: u32,
//! }
//! impl RowPayload for Contact {
//!     const ROW_TYPE: &'static str = "Contact";
//! }
//!
//! # async fn demo() -> tessera_core::Result<()> {
//! let store = MemoryStore::new();
//!
//! // Insert, then update under the version guard.
//! let row: Row<Keys, Contact> = Row::new(
//!     RowKey::new("TENANT#1", "CONTACT#alice"),
//!     Contact { name: "Alice".into(), age: 30 },
//! );
//! store.insert(&row).await?;
//!
//! let next = row.updated(Contact { name: "Alice".into(), age: 31 });
//! store.update(&next, &row).await?;
//!
//! // Query every contact in the partition.
//! let page = store
//!     .query::<Row<Keys, Contact>>(
//!         Query::partition("TENANT#1").sort_condition(SortCondition::begins_with("CONTACT#")),
//!     )
//!     .await?;
//! assert_eq!(page.rows.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod error;
pub mod expr;
pub mod mem;
pub mod row;
pub mod table;
pub mod types;
pub mod value;

pub use error::{Error, Result};
pub use expr::ConditionExpression;
pub use expr::diff::{AttrEdit, diff};
pub use mem::MemoryStore;
pub use row::{KeySchema, Row, RowKey, RowPayload, RowStatus};
pub use table::bulk::MAX_STATEMENTS_PER_BATCH;
pub use table::read::{RowProvider, RowUnion, decode_row};
pub use table::{Table, WriteEntry, WriteStatement};
pub use types::{Query, QueryResult, SortCondition};
pub use value::{AttrMap, AttrValue};
