//! Backend RPC surface: request/response shapes and the client trait.
//!
//! The wire client to the backing store is an external collaborator. This
//! module fixes only the shapes the facade produces and consumes; the trait
//! is kept as minimal and close as possible to the real client so that it
//! can be swapped with a scripted implementation in tests. Retry and
//! timeout policy belong to implementations, not to this layer.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::SortCondition;
use crate::value::AttrMap;

/// `PutItem`: write one item, optionally guarded by a condition expression.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PutItemInput {
    pub table: String,
    pub item: AttrMap,
    pub condition_expression: Option<String>,
    pub expression_attribute_names: Option<HashMap<String, String>>,
    pub expression_attribute_values: Option<AttrMap>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PutItemOutput {}

/// `GetItem`: read one item by its full key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetItemInput {
    pub table: String,
    pub key: AttrMap,
    pub consistent_read: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetItemOutput {
    pub item: Option<AttrMap>,
}

/// Keys requested from a single table in a `BatchGetItem` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeysAndAttributes {
    pub keys: Vec<AttrMap>,
    pub consistent_read: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchGetItemInput {
    pub request_items: HashMap<String, KeysAndAttributes>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchGetItemOutput {
    pub responses: HashMap<String, Vec<AttrMap>>,
}

/// `DeleteItem`: delete one item by key, optionally guarded by a condition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteItemInput {
    pub table: String,
    pub key: AttrMap,
    pub condition_expression: Option<String>,
    pub expression_attribute_names: Option<HashMap<String, String>>,
    pub expression_attribute_values: Option<AttrMap>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeleteItemOutput {}

/// `Query`: read a partition with native paging.
///
/// `start_token`/`next_token` are opaque to this layer and are passed
/// through unchanged; tokens are not interchangeable across backend
/// implementations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryInput {
    pub table: String,
    pub partition_key: String,
    pub partition_value: String,
    pub sort_key: String,
    pub sort_condition: Option<SortCondition>,
    pub limit: Option<usize>,
    pub scan_forward: bool,
    pub start_token: Option<String>,
    pub consistent_read: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryOutput {
    pub items: Vec<AttrMap>,
    pub next_token: Option<String>,
}

/// One statement of a `BatchExecuteStatement` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchStatementRequest {
    pub statement: String,
    pub consistent_read: bool,
}

/// Per-statement error returned by the backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchStatementError {
    pub code: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchStatementResponse {
    pub error: Option<BatchStatementError>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchExecuteStatementInput {
    pub statements: Vec<BatchStatementRequest>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchExecuteStatementOutput {
    pub responses: Vec<BatchStatementResponse>,
}

/// The opaque RPC client the table facade drives.
///
/// Implementations map their native failures onto [`crate::Error`]:
/// conditional-write rejections become `ConditionalCheckFailed`, everything
/// transport-shaped becomes `Transport`.
#[async_trait]
pub trait StoreClient: Send + Sync {
    async fn put_item(&self, input: PutItemInput) -> Result<PutItemOutput>;

    async fn get_item(&self, input: GetItemInput) -> Result<GetItemOutput>;

    async fn batch_get_item(&self, input: BatchGetItemInput) -> Result<BatchGetItemOutput>;

    async fn delete_item(&self, input: DeleteItemInput) -> Result<DeleteItemOutput>;

    async fn query(&self, input: QueryInput) -> Result<QueryOutput>;

    async fn batch_execute_statement(
        &self,
        input: BatchExecuteStatementInput,
    ) -> Result<BatchExecuteStatementOutput>;
}
