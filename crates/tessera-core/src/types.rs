//! Common query types: sort-key conditions, query parameters, result pages.

use serde::{Deserialize, Serialize};

/// A condition on the sort key of a partition's rows.
///
/// All comparisons are lexicographic on the sort-key string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortCondition {
    Equals(String),
    LessThan(String),
    LessThanOrEqual(String),
    GreaterThan(String),
    GreaterThanOrEqual(String),
    /// Strict on both ends: `lo < sortKey < hi`. The backend's native
    /// BETWEEN is inclusive; this layer's contract is exclusive.
    Between(String, String),
    BeginsWith(String),
}

impl SortCondition {
    /// `sortKey == value`
    pub fn equals(value: impl Into<String>) -> Self {
        SortCondition::Equals(value.into())
    }

    /// `sortKey < value`
    pub fn less_than(value: impl Into<String>) -> Self {
        SortCondition::LessThan(value.into())
    }

    /// `sortKey <= value`
    pub fn less_than_or_equal(value: impl Into<String>) -> Self {
        SortCondition::LessThanOrEqual(value.into())
    }

    /// `sortKey > value`
    pub fn greater_than(value: impl Into<String>) -> Self {
        SortCondition::GreaterThan(value.into())
    }

    /// `sortKey >= value`
    pub fn greater_than_or_equal(value: impl Into<String>) -> Self {
        SortCondition::GreaterThanOrEqual(value.into())
    }

    /// `lo < sortKey < hi`
    pub fn between(lo: impl Into<String>, hi: impl Into<String>) -> Self {
        SortCondition::Between(lo.into(), hi.into())
    }

    /// `sortKey` starts with `prefix`
    pub fn begins_with(prefix: impl Into<String>) -> Self {
        SortCondition::BeginsWith(prefix.into())
    }

    /// Evaluate this condition against a sort-key value.
    pub fn matches(&self, sort_key: &str) -> bool {
        match self {
            SortCondition::Equals(value) => sort_key == value,
            SortCondition::LessThan(value) => sort_key < value.as_str(),
            SortCondition::LessThanOrEqual(value) => sort_key <= value.as_str(),
            SortCondition::GreaterThan(value) => sort_key > value.as_str(),
            SortCondition::GreaterThanOrEqual(value) => sort_key >= value.as_str(),
            SortCondition::Between(lo, hi) => lo.as_str() < sort_key && sort_key < hi.as_str(),
            SortCondition::BeginsWith(prefix) => sort_key.starts_with(prefix.as_str()),
        }
    }
}

/// Parameters of a partition query.
///
/// Defaults: ascending sort order, strongly consistent read, no limit.
#[derive(Debug, Clone)]
pub struct Query {
    pub partition: String,
    pub sort_condition: Option<SortCondition>,
    pub limit: Option<usize>,
    pub scan_forward: bool,
    pub start_token: Option<String>,
    pub consistent_read: bool,
}

impl Query {
    /// A query over all rows of `partition`.
    pub fn partition(value: impl Into<String>) -> Self {
        Self {
            partition: value.into(),
            sort_condition: None,
            limit: None,
            scan_forward: true,
            start_token: None,
            consistent_read: true,
        }
    }

    /// Restrict the query to sort keys matching `condition`.
    pub fn sort_condition(mut self, condition: SortCondition) -> Self {
        self.sort_condition = Some(condition);
        self
    }

    /// Return at most `n` rows per page.
    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    /// Set scan direction (default: forward/ascending).
    pub fn scan_forward(mut self, forward: bool) -> Self {
        self.scan_forward = forward;
        self
    }

    /// Resume from the page token returned by a previous query.
    pub fn start_token(mut self, token: impl Into<String>) -> Self {
        self.start_token = Some(token.into());
        self
    }

    /// Toggle strongly consistent reads (default: on).
    pub fn consistent_read(mut self, consistent: bool) -> Self {
        self.consistent_read = consistent;
        self
    }
}

/// One page of query results.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult<R> {
    pub rows: Vec<R>,
    /// Opaque token for the next page; `None` on the last page.
    pub next_token: Option<String>,
}

impl<R> QueryResult<R> {
    pub fn is_last_page(&self) -> bool {
        self.next_token.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_between_is_strict_on_both_ends() {
        let cond = SortCondition::between("a", "c");
        assert!(!cond.matches("a"));
        assert!(cond.matches("b"));
        assert!(!cond.matches("c"));
    }

    #[test]
    fn test_begins_with() {
        let cond = SortCondition::begins_with("CONTACT#");
        assert!(cond.matches("CONTACT#alice"));
        assert!(!cond.matches("EVENT#1"));
    }

    #[test]
    fn test_comparisons() {
        assert!(SortCondition::equals("b").matches("b"));
        assert!(SortCondition::less_than("b").matches("a"));
        assert!(!SortCondition::less_than("b").matches("b"));
        assert!(SortCondition::less_than_or_equal("b").matches("b"));
        assert!(SortCondition::greater_than("b").matches("c"));
        assert!(SortCondition::greater_than_or_equal("b").matches("b"));
    }

    #[test]
    fn test_query_builder_defaults() {
        let query = Query::partition("P");
        assert!(query.scan_forward);
        assert!(query.consistent_read);
        assert!(query.limit.is_none());
        assert!(query.start_token.is_none());
    }
}
