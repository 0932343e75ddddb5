//! Bulk-write coordination: chunking, concurrent dispatch, aggregation.
//!
//! Entries are chunked to the backend's per-call statement limit and every
//! chunk is dispatched concurrently; within a chunk the statement order
//! matches the input, across chunks there is no ordering guarantee. Partial
//! failures are aggregated, never retried here; retry policy belongs to the
//! RPC client.

use std::collections::HashMap;

use futures::future;
use tracing::{debug, warn};

use crate::backend::{
    BatchExecuteStatementInput, BatchStatementError, BatchStatementRequest, StoreClient,
};
use crate::error::{Error, Result};

use super::WriteStatement;

/// The backend accepts at most this many statements per batch call.
pub const MAX_STATEMENTS_PER_BATCH: usize = 25;

/// Issue `statements` in concurrent chunks and aggregate partial errors.
///
/// An empty input returns without any RPC. Transport failures surface
/// verbatim (first failure); statement-level errors are counted into a
/// `BatchErrorsReturned` with a frequency map of `code:message` signatures.
/// The caller must assume partial application on failure.
pub(crate) async fn execute_statements<C: StoreClient>(
    client: &C,
    statements: Vec<WriteStatement>,
) -> Result<()> {
    if statements.is_empty() {
        return Ok(());
    }

    let requests: Vec<BatchStatementRequest> = statements
        .into_iter()
        .map(|statement| BatchStatementRequest {
            statement: statement.into_inner(),
            consistent_read: true,
        })
        .collect();
    let chunks: Vec<BatchExecuteStatementInput> = requests
        .chunks(MAX_STATEMENTS_PER_BATCH)
        .map(|chunk| BatchExecuteStatementInput {
            statements: chunk.to_vec(),
        })
        .collect();

    debug!(
        statements = requests.len(),
        chunks = chunks.len(),
        "dispatching bulk write"
    );

    let outputs = future::try_join_all(
        chunks
            .into_iter()
            .map(|input| client.batch_execute_statement(input)),
    )
    .await?;

    let mut error_count = 0;
    let mut message_map: HashMap<String, usize> = HashMap::new();
    for output in &outputs {
        for response in &output.responses {
            if let Some(error) = &response.error {
                error_count += 1;
                *message_map.entry(message_key(error)).or_insert(0) += 1;
            }
        }
    }

    if error_count > 0 {
        warn!(error_count, "bulk write returned statement errors");
        return Err(Error::BatchErrorsReturned {
            error_count,
            message_map,
        });
    }
    Ok(())
}

/// The aggregation key for a statement error: its non-empty `code` and
/// `message` parts joined with `:`.
fn message_key(error: &BatchStatementError) -> String {
    [error.code.as_deref(), error.message.as_deref()]
        .into_iter()
        .flatten()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(":")
}
