//! The table facade: typed operations over one backend table.
//!
//! A [`Table`] is immutable configuration (table name, key schema marker,
//! RPC client handle) and is safe to share across tasks. Every operation
//! either returns its value or the first failure; nothing is retried here.

pub mod bulk;
pub mod read;

use std::collections::HashMap;
use std::marker::PhantomData;

use tracing::debug;

use crate::backend::{
    BatchGetItemInput, DeleteItemInput, GetItemInput, KeysAndAttributes, PutItemInput, QueryInput,
    StoreClient,
};
use crate::error::Result;
use crate::expr;
use crate::expr::ConditionExpression;
use crate::expr::diff::diff;
use crate::row::{KeySchema, Row, RowKey, RowPayload};
use crate::types::{Query, QueryResult};
use crate::value::{AttrMap, AttrValue};

use read::{RowUnion, decode_row};

/// A rendered write statement, ready for a bulk call.
///
/// Produced by [`WriteEntry::render`]; statements for different payload
/// types can be mixed in one [`Table::bulk_write`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteStatement(String);

impl WriteStatement {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub(crate) fn into_inner(self) -> String {
        self.0
    }
}

/// One entry of a bulk write.
pub enum WriteEntry<A, P> {
    /// Insert a fresh row (fails if the key is occupied).
    Insert(Row<A, P>),
    /// Replace `existing` with `new`, guarded by `existing`'s version.
    Update { new: Row<A, P>, existing: Row<A, P> },
    /// Delete by key, unconditionally.
    DeleteAtKey(RowKey),
    /// Delete a row the caller has read, guarded by its version.
    DeleteItem(Row<A, P>),
}

impl<A: KeySchema, P: RowPayload> WriteEntry<A, P> {
    /// Render this entry as the statement the bulk path will issue against
    /// `table`.
    pub fn render(&self, table: &str) -> Result<WriteStatement> {
        let statement = match self {
            WriteEntry::Insert(row) => expr::insert_statement(table, &row.to_attrs()?)?,
            WriteEntry::Update { new, existing } => {
                let edits = diff(&new.to_attrs()?, &existing.to_attrs()?)?;
                expr::update_statement::<A>(table, &new.key, existing.status.row_version, &edits)
            }
            WriteEntry::DeleteAtKey(key) => expr::delete_by_key_statement::<A>(table, key),
            WriteEntry::DeleteItem(row) => {
                expr::delete_item_statement::<A>(table, &row.key, row.status.row_version)
            }
        };
        Ok(WriteStatement(statement))
    }
}

/// Typed operations over one backend table.
pub struct Table<A, C> {
    client: C,
    name: String,
    schema: PhantomData<fn() -> A>,
}

impl<A, C: Clone> Clone for Table<A, C> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            name: self.name.clone(),
            schema: PhantomData,
        }
    }
}

impl<A: KeySchema, C: StoreClient> Table<A, C> {
    pub fn new(client: C, name: impl Into<String>) -> Self {
        Self {
            client,
            name: name.into(),
            schema: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Insert a fresh row. The row's version must be 1 (the caller's
    /// responsibility; [`Row::new`] guarantees it). Fails
    /// `ConditionalCheckFailed` if the key is already occupied.
    pub async fn insert<P: RowPayload>(&self, row: &Row<A, P>) -> Result<()> {
        let item = row.to_attrs()?;
        debug!(
            table = %self.name,
            partition = %row.key.partition,
            sort = %row.key.sort,
            "insert row"
        );
        let condition = expr::insert_condition::<A>();
        self.client
            .put_item(PutItemInput {
                table: self.name.clone(),
                item,
                condition_expression: Some(condition.expression),
                expression_attribute_names: Some(condition.names),
                expression_attribute_values: None,
            })
            .await?;
        Ok(())
    }

    /// Write a row unconditionally, replacing whatever the key held.
    pub async fn clobber<P: RowPayload>(&self, row: &Row<A, P>) -> Result<()> {
        let item = row.to_attrs()?;
        debug!(
            table = %self.name,
            partition = %row.key.partition,
            sort = %row.key.sort,
            "clobber row"
        );
        self.client
            .put_item(PutItemInput {
                table: self.name.clone(),
                item,
                condition_expression: None,
                expression_attribute_names: None,
                expression_attribute_values: None,
            })
            .await?;
        Ok(())
    }

    /// Replace `existing` with `new`, guarded by `existing`'s
    /// `(rowVersion, createDate)`. The caller must have built `new` as
    /// `existing`'s successor (see [`Row::updated`]). Fails
    /// `ConditionalCheckFailed` if the stored row moved on.
    pub async fn update<P: RowPayload>(
        &self,
        new: &Row<A, P>,
        existing: &Row<A, P>,
    ) -> Result<()> {
        let item = new.to_attrs()?;
        debug!(
            table = %self.name,
            partition = %new.key.partition,
            sort = %new.key.sort,
            expected_version = existing.status.row_version,
            "update row"
        );
        let condition = version_condition_for(existing);
        self.client
            .put_item(PutItemInput {
                table: self.name.clone(),
                item,
                condition_expression: Some(condition.expression),
                expression_attribute_names: Some(condition.names),
                expression_attribute_values: Some(condition.values),
            })
            .await?;
        Ok(())
    }

    /// Read one row with a strongly consistent `GetItem`. Returns `None` if
    /// absent; fails `UnexpectedResponse` if the stored row-type tag does
    /// not match `P`.
    pub async fn get<P: RowPayload>(&self, key: &RowKey) -> Result<Option<Row<A, P>>> {
        let output = self
            .client
            .get_item(GetItemInput {
                table: self.name.clone(),
                key: key_attrs::<A>(key),
                consistent_read: true,
            })
            .await?;
        match output.item {
            Some(attrs) => Ok(Some(Row::from_attrs(&attrs)?)),
            None => Ok(None),
        }
    }

    /// Read several rows in a single `BatchGetItem` call. The returned map
    /// contains only the keys that existed. Does not paginate; the caller
    /// bounds the key count.
    pub async fn batch_get<P: RowPayload>(
        &self,
        keys: &[RowKey],
    ) -> Result<HashMap<RowKey, Row<A, P>>> {
        if keys.is_empty() {
            return Ok(HashMap::new());
        }
        let output = self
            .client
            .batch_get_item(BatchGetItemInput {
                request_items: HashMap::from([(
                    self.name.clone(),
                    KeysAndAttributes {
                        keys: keys.iter().map(key_attrs::<A>).collect(),
                        consistent_read: true,
                    },
                )]),
            })
            .await?;

        let mut rows = HashMap::new();
        for attrs in output
            .responses
            .get(&self.name)
            .map(Vec::as_slice)
            .unwrap_or_default()
        {
            let row: Row<A, P> = Row::from_attrs(attrs)?;
            rows.insert(row.key.clone(), row);
        }
        Ok(rows)
    }

    /// Delete by key, unconditionally. Idempotent.
    pub async fn delete_at_key(&self, key: &RowKey) -> Result<()> {
        debug!(
            table = %self.name,
            partition = %key.partition,
            sort = %key.sort,
            "delete at key"
        );
        self.client
            .delete_item(DeleteItemInput {
                table: self.name.clone(),
                key: key_attrs::<A>(key),
                condition_expression: None,
                expression_attribute_names: None,
                expression_attribute_values: None,
            })
            .await?;
        Ok(())
    }

    /// Delete a row the caller has read, guarded by its
    /// `(rowVersion, createDate)`.
    pub async fn delete_item<P: RowPayload>(&self, existing: &Row<A, P>) -> Result<()> {
        debug!(
            table = %self.name,
            partition = %existing.key.partition,
            sort = %existing.key.sort,
            expected_version = existing.status.row_version,
            "delete row"
        );
        let condition = version_condition_for(existing);
        self.client
            .delete_item(DeleteItemInput {
                table: self.name.clone(),
                key: key_attrs::<A>(&existing.key),
                condition_expression: Some(condition.expression),
                expression_attribute_names: Some(condition.names),
                expression_attribute_values: Some(condition.values),
            })
            .await?;
        Ok(())
    }

    /// Delete many keys unconditionally via the bulk path.
    pub async fn delete_at_keys(&self, keys: &[RowKey]) -> Result<()> {
        let statements = keys
            .iter()
            .map(|key| WriteStatement(expr::delete_by_key_statement::<A>(&self.name, key)))
            .collect();
        self.bulk_write(statements).await
    }

    /// Delete many read rows, each guarded by its version, via the bulk
    /// path.
    pub async fn delete_items<P: RowPayload>(&self, rows: &[Row<A, P>]) -> Result<()> {
        let statements = rows
            .iter()
            .map(|row| {
                WriteStatement(expr::delete_item_statement::<A>(
                    &self.name,
                    &row.key,
                    row.status.row_version,
                ))
            })
            .collect();
        self.bulk_write(statements).await
    }

    /// Query a partition. Results decode through the result type's provider
    /// registry, so one query can return a union of payload shapes.
    pub async fn query<R>(&self, query: Query) -> Result<QueryResult<R>>
    where
        R: RowUnion<Schema = A>,
    {
        let output = self
            .client
            .query(QueryInput {
                table: self.name.clone(),
                partition_key: A::PARTITION_KEY.to_string(),
                partition_value: query.partition,
                sort_key: A::SORT_KEY.to_string(),
                sort_condition: query.sort_condition,
                limit: query.limit,
                scan_forward: query.scan_forward,
                start_token: query.start_token,
                consistent_read: query.consistent_read,
            })
            .await?;
        let rows = output
            .items
            .iter()
            .map(decode_row::<R>)
            .collect::<Result<Vec<_>>>()?;
        Ok(QueryResult {
            rows,
            next_token: output.next_token,
        })
    }

    /// Issue pre-rendered write statements in chunks of at most
    /// [`bulk::MAX_STATEMENTS_PER_BATCH`], all chunks in flight
    /// concurrently. Statements for different payload types can be mixed.
    pub async fn bulk_write(&self, statements: Vec<WriteStatement>) -> Result<()> {
        bulk::execute_statements(&self.client, statements).await
    }

    /// Render and issue a homogeneous list of write entries.
    pub async fn bulk_write_rows<P: RowPayload>(
        &self,
        entries: &[WriteEntry<A, P>],
    ) -> Result<()> {
        let statements = entries
            .iter()
            .map(|entry| entry.render(&self.name))
            .collect::<Result<Vec<_>>>()?;
        self.bulk_write(statements).await
    }
}

/// The two key attributes of `key` as an attribute map.
fn key_attrs<A: KeySchema>(key: &RowKey) -> AttrMap {
    AttrMap::from([
        (
            A::PARTITION_KEY.to_string(),
            AttrValue::S(key.partition.clone()),
        ),
        (A::SORT_KEY.to_string(), AttrValue::S(key.sort.clone())),
    ])
}

/// The optimistic-concurrency condition guarding writes against `existing`.
fn version_condition_for<A: KeySchema, P: RowPayload>(
    existing: &Row<A, P>,
) -> ConditionExpression {
    expr::version_condition(existing.status.row_version, &existing.create_date)
}
