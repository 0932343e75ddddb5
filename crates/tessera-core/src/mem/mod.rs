//! In-memory reference store.
//!
//! A serialized two-level map implementing the facade's contract, used to
//! validate conditional-check, query, and bulk-write semantics without a
//! backend. Every public operation enqueues a critical section onto a
//! single consumer task and awaits its reply, so concurrent callers see a
//! total order consistent with arrival.

use std::collections::{BTreeMap, HashMap};

use tokio::sync::{mpsc, oneshot};

use crate::error::{Error, Result};
use crate::row::{ATTR_CREATE_DATE, ATTR_ROW_VERSION, KeySchema, Row, RowKey, RowPayload, format_instant};
use crate::table::WriteEntry;
use crate::table::read::{RowUnion, decode_row};
use crate::types::{Query, QueryResult};
use crate::value::{AttrMap, AttrValue};

/// A critical section over the store state.
type Job = Box<dyn FnOnce(&mut StoreState) + Send>;

/// A stored row: the encoded attribute map, tag included, exactly as the
/// writer produced it. Reads decode what was written, enabling exact
/// equality checks.
#[derive(Debug, Clone)]
struct StoredRow {
    attrs: AttrMap,
}

impl StoredRow {
    fn row_version(&self) -> Option<u64> {
        self.attrs
            .get(ATTR_ROW_VERSION)
            .and_then(AttrValue::as_n)
            .and_then(|n| n.parse().ok())
    }

    fn create_date(&self) -> Option<&str> {
        self.attrs.get(ATTR_CREATE_DATE).and_then(AttrValue::as_s)
    }
}

#[derive(Default)]
struct StoreState {
    /// partition key -> sort key -> stored row
    partitions: BTreeMap<String, BTreeMap<String, StoredRow>>,
}

impl StoreState {
    fn row(&self, key: &RowKey) -> Option<&StoredRow> {
        self.partitions.get(&key.partition)?.get(&key.sort)
    }

    fn put(&mut self, key: RowKey, row: StoredRow) {
        self.partitions
            .entry(key.partition)
            .or_default()
            .insert(key.sort, row);
    }

    fn remove(&mut self, key: &RowKey) {
        if let Some(rows) = self.partitions.get_mut(&key.partition) {
            rows.remove(&key.sort);
        }
    }
}

/// The serialized in-memory store.
///
/// Cloning the handle shares the same store; all clones funnel through one
/// consumer task. Must be created inside a tokio runtime.
#[derive(Clone)]
pub struct MemoryStore {
    jobs: mpsc::Sender<Job>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let (jobs, mut queue) = mpsc::channel::<Job>(64);
        tokio::spawn(async move {
            let mut state = StoreState::default();
            while let Some(job) = queue.recv().await {
                job(&mut state);
            }
        });
        Self { jobs }
    }

    /// Run one critical section on the consumer task and await its result.
    async fn run<T, F>(&self, section: F) -> T
    where
        T: Send + 'static,
        F: FnOnce(&mut StoreState) -> T + Send + 'static,
    {
        let (reply, response) = oneshot::channel();
        self.jobs
            .send(Box::new(move |state| {
                let _ = reply.send(section(state));
            }))
            .await
            .expect("reference store task is gone");
        response.await.expect("reference store dropped its reply")
    }

    /// Insert a fresh row. Fails `ConditionalCheckFailed` if the slot is
    /// occupied.
    pub async fn insert<A: KeySchema, P: RowPayload>(&self, row: &Row<A, P>) -> Result<()> {
        let attrs = row.to_attrs()?;
        let key = row.key.clone();
        self.run(move |state| {
            if state.row(&key).is_some() {
                return Err(Error::conditional_check(
                    key.partition,
                    key.sort,
                    "Row already exists.",
                ));
            }
            state.put(key, StoredRow { attrs });
            Ok(())
        })
        .await
    }

    /// Write a row unconditionally.
    pub async fn clobber<A: KeySchema, P: RowPayload>(&self, row: &Row<A, P>) -> Result<()> {
        let attrs = row.to_attrs()?;
        let key = row.key.clone();
        self.run(move |state| {
            state.put(key, StoredRow { attrs });
        })
        .await;
        Ok(())
    }

    /// Replace `existing` with `new`, guarded by `existing`'s
    /// `(rowVersion, createDate)`.
    pub async fn update<A: KeySchema, P: RowPayload>(
        &self,
        new: &Row<A, P>,
        existing: &Row<A, P>,
    ) -> Result<()> {
        let attrs = new.to_attrs()?;
        let key = new.key.clone();
        let expected_version = existing.status.row_version;
        let expected_create_date = format_instant(&existing.create_date);
        self.run(move |state| {
            let mismatch = match state.row(&key) {
                None => {
                    return Err(Error::conditional_check(
                        key.partition,
                        key.sort,
                        "Existing item does not exist.",
                    ));
                }
                Some(stored) => {
                    stored.row_version() != Some(expected_version)
                        || stored.create_date() != Some(expected_create_date.as_str())
                }
            };
            if mismatch {
                return Err(Error::conditional_check(
                    key.partition,
                    key.sort,
                    "Trying to overwrite incorrect version.",
                ));
            }
            state.put(key, StoredRow { attrs });
            Ok(())
        })
        .await
    }

    /// Read one row. Returns `None` if the partition or slot is missing;
    /// fails `UnexpectedResponse` if the stored row's type disagrees with
    /// `P`.
    pub async fn get<A: KeySchema, P: RowPayload>(
        &self,
        key: &RowKey,
    ) -> Result<Option<Row<A, P>>> {
        let key = key.clone();
        let attrs = self
            .run(move |state| state.row(&key).map(|stored| stored.attrs.clone()))
            .await;
        match attrs {
            Some(attrs) => Ok(Some(Row::from_attrs(&attrs)?)),
            None => Ok(None),
        }
    }

    /// Read several rows from one consistent critical section. The returned
    /// map contains only the keys that existed.
    pub async fn batch_get<A: KeySchema, P: RowPayload>(
        &self,
        keys: &[RowKey],
    ) -> Result<HashMap<RowKey, Row<A, P>>> {
        let wanted = keys.to_vec();
        let found: Vec<(RowKey, AttrMap)> = self
            .run(move |state| {
                wanted
                    .into_iter()
                    .filter_map(|key| {
                        state
                            .row(&key)
                            .map(|stored| (key, stored.attrs.clone()))
                    })
                    .collect()
            })
            .await;
        found
            .into_iter()
            .map(|(key, attrs)| Row::from_attrs(&attrs).map(|row| (key, row)))
            .collect()
    }

    /// Delete by key. Idempotent: deleting an absent row succeeds.
    pub async fn delete_at_key(&self, key: &RowKey) -> Result<()> {
        let key = key.clone();
        self.run(move |state| state.remove(&key)).await;
        Ok(())
    }

    /// Delete a row the caller has read, guarded by its
    /// `(rowVersion, createDate)`.
    pub async fn delete_item<A: KeySchema, P: RowPayload>(
        &self,
        existing: &Row<A, P>,
    ) -> Result<()> {
        let key = existing.key.clone();
        let expected_version = existing.status.row_version;
        let expected_create_date = format_instant(&existing.create_date);
        self.run(move |state| {
            let mismatch = match state.row(&key) {
                None => {
                    return Err(Error::conditional_check(
                        key.partition,
                        key.sort,
                        "Existing item does not exist.",
                    ));
                }
                Some(stored) => {
                    stored.row_version() != Some(expected_version)
                        || stored.create_date() != Some(expected_create_date.as_str())
                }
            };
            if mismatch {
                return Err(Error::conditional_check(
                    key.partition,
                    key.sort,
                    "Trying to delete incorrect version.",
                ));
            }
            state.remove(&key);
            Ok(())
        })
        .await
    }

    /// Query a partition: rows sorted ascending by sort key, filtered by
    /// the sort condition, paged by decimal-index tokens, decoded through
    /// the result type's provider registry.
    ///
    /// # Panics
    ///
    /// Panics on a malformed `start_token` — a token not produced by this
    /// store is a programmer error, not a recoverable failure.
    pub async fn query<R: RowUnion>(&self, query: Query) -> Result<QueryResult<R>> {
        let partition = query.partition.clone();
        let condition = query.sort_condition.clone();
        let mut items: Vec<AttrMap> = self
            .run(move |state| {
                state
                    .partitions
                    .get(&partition)
                    .map(|rows| {
                        rows.iter()
                            .filter(|(sort_key, _)| {
                                condition
                                    .as_ref()
                                    .is_none_or(|cond| cond.matches(sort_key))
                            })
                            .map(|(_, stored)| stored.attrs.clone())
                            .collect()
                    })
                    .unwrap_or_default()
            })
            .await;

        if !query.scan_forward {
            items.reverse();
        }

        let start = query
            .start_token
            .as_deref()
            .map(|token| {
                token
                    .parse::<usize>()
                    .expect("query start token must be a decimal row index")
            })
            .unwrap_or(0)
            .min(items.len());
        let end = match query.limit {
            Some(limit) => items.len().min(start.saturating_add(limit)),
            None => items.len(),
        };
        let next_token = (end < items.len()).then(|| end.to_string());

        let rows = items[start..end]
            .iter()
            .map(decode_row::<R>)
            .collect::<Result<Vec<_>>>()?;
        Ok(QueryResult { rows, next_token })
    }

    /// Apply write entries one at a time, in input order, stopping at the
    /// first failure. Earlier successes stay applied.
    pub async fn bulk_write<A: KeySchema, P: RowPayload>(
        &self,
        entries: &[WriteEntry<A, P>],
    ) -> Result<()> {
        for entry in entries {
            match entry {
                WriteEntry::Insert(row) => self.insert(row).await?,
                WriteEntry::Update { new, existing } => self.update(new, existing).await?,
                WriteEntry::DeleteAtKey(key) => self.delete_at_key(key).await?,
                WriteEntry::DeleteItem(row) => self.delete_item(row).await?,
            }
        }
        Ok(())
    }
}
