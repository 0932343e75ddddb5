//! Statement rendering and conditional request shapes.
//!
//! Four statement families cover the write paths: `INSERT` of a flattened
//! item, `UPDATE` driven by a list of diff edits, and the two `DELETE`
//! forms (by key, and by key plus expected version). Single-item calls use
//! [`ConditionExpression`] shapes instead of statements.

pub mod diff;

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::row::{ATTR_CREATE_DATE, ATTR_ROW_VERSION, KeySchema, RowKey, format_instant};
use crate::value::{AttrMap, AttrValue, unsupported_attribute};

use diff::AttrEdit;

/// A condition expression plus its name and value substitutions, attached
/// to single-item `PutItem`/`DeleteItem` requests.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionExpression {
    pub expression: String,
    pub names: HashMap<String, String>,
    pub values: AttrMap,
}

/// Condition for inserts: the row must not already exist.
pub fn insert_condition<A: KeySchema>() -> ConditionExpression {
    ConditionExpression {
        expression: "attribute_not_exists(#pk) AND attribute_not_exists(#sk)".to_string(),
        names: HashMap::from([
            ("#pk".to_string(), A::PARTITION_KEY.to_string()),
            ("#sk".to_string(), A::SORT_KEY.to_string()),
        ]),
        values: AttrMap::new(),
    }
}

/// Condition for updates and conditional deletes: the stored row must still
/// carry the caller's snapshot of `(rowVersion, createDate)`.
pub fn version_condition(row_version: u64, create_date: &DateTime<Utc>) -> ConditionExpression {
    ConditionExpression {
        expression: "#rowversion = :versionnumber AND #createdate = :creationdate".to_string(),
        names: HashMap::from([
            ("#rowversion".to_string(), ATTR_ROW_VERSION.to_string()),
            ("#createdate".to_string(), ATTR_CREATE_DATE.to_string()),
        ]),
        values: AttrMap::from([
            (
                ":versionnumber".to_string(),
                AttrValue::N(row_version.to_string()),
            ),
            (
                ":creationdate".to_string(),
                AttrValue::S(format_instant(create_date)),
            ),
        ]),
    }
}

/// `INSERT INTO "<table>" value <flattened item>`
pub fn insert_statement(table: &str, item: &AttrMap) -> Result<String> {
    Ok(format!(
        "INSERT INTO \"{table}\" value {}",
        render_map(item)?
    ))
}

/// `UPDATE "<table>" <edit clauses> WHERE <key> AND rowVersion=<expected>`
///
/// Clauses appear in the order the diff engine emitted them, joined by
/// single spaces.
pub fn update_statement<A: KeySchema>(
    table: &str,
    key: &RowKey,
    expected_version: u64,
    edits: &[AttrEdit],
) -> String {
    let mut parts = vec![format!("UPDATE \"{table}\"")];
    for edit in edits {
        parts.push(match edit {
            AttrEdit::Update { path, value } => format!("SET \"{path}\"={value}"),
            AttrEdit::Remove { path } => format!("REMOVE \"{path}\""),
            AttrEdit::ListAppend { path, value } => {
                format!("SET \"{path}\"=list_append({path},{value})")
            }
        });
    }
    parts.push(format!(
        "WHERE {}",
        where_key::<A>(key, Some(expected_version))
    ));
    parts.join(" ")
}

/// `DELETE FROM "<table>" WHERE <key>`
pub fn delete_by_key_statement<A: KeySchema>(table: &str, key: &RowKey) -> String {
    format!("DELETE FROM \"{table}\" WHERE {}", where_key::<A>(key, None))
}

/// `DELETE FROM "<table>" WHERE <key> AND rowVersion=<expected>`
pub fn delete_item_statement<A: KeySchema>(
    table: &str,
    key: &RowKey,
    expected_version: u64,
) -> String {
    format!(
        "DELETE FROM \"{table}\" WHERE {}",
        where_key::<A>(key, Some(expected_version))
    )
}

fn where_key<A: KeySchema>(key: &RowKey, expected_version: Option<u64>) -> String {
    let mut clause = format!(
        "{}={} AND {}={}",
        A::PARTITION_KEY,
        quote(&key.partition),
        A::SORT_KEY,
        quote(&key.sort)
    );
    if let Some(version) = expected_version {
        clause.push_str(&format!(" AND {ATTR_ROW_VERSION}={version}"));
    }
    clause
}

/// Render a value as its statement literal.
///
/// `None` means the value renders to nothing: nulls are absent from
/// flattened maps (and turn into `REMOVE` in diffs). Binary and set
/// variants fail `UnableToUpdate`.
///
/// Single quotes inside string literals are escaped by doubling, per the
/// backing store's quoting rules.
pub fn render_value(value: &AttrValue) -> Result<Option<String>> {
    match value {
        AttrValue::S(s) => Ok(Some(quote(s))),
        AttrValue::N(n) => Ok(Some(n.clone())),
        AttrValue::Bool(b) => Ok(Some(b.to_string())),
        AttrValue::Null => Ok(None),
        AttrValue::L(items) => Ok(Some(render_list(items)?)),
        AttrValue::M(map) => Ok(Some(render_map(map)?)),
        other => Err(unsupported_attribute(other)),
    }
}

/// Render a list literal: `[v1, v2, ...]`. Null elements are omitted.
pub(crate) fn render_list(items: &[AttrValue]) -> Result<String> {
    let mut parts = Vec::with_capacity(items.len());
    for item in items {
        if let Some(rendered) = render_value(item)? {
            parts.push(rendered);
        }
    }
    Ok(format!("[{}]", parts.join(", ")))
}

/// Render a map literal: `{'k1': v1, 'k2': v2}`. Null-valued entries are
/// omitted; keys appear in sorted order.
fn render_map(map: &AttrMap) -> Result<String> {
    let mut parts = Vec::with_capacity(map.len());
    for (name, value) in map {
        if let Some(rendered) = render_value(value)? {
            parts.push(format!("{}: {rendered}", quote(name)));
        }
    }
    Ok(format!("{{{}}}", parts.join(", ")))
}

fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use chrono::TimeZone;

    struct Keys;
    impl KeySchema for Keys {
        const PARTITION_KEY: &'static str = "PK";
        const SORT_KEY: &'static str = "SK";
    }

    #[test]
    fn test_insert_statement() {
        let item = AttrMap::from([
            ("PK".to_string(), AttrValue::S("P".into())),
            ("SK".to_string(), AttrValue::S("S".into())),
            ("age".to_string(), AttrValue::N("30".into())),
            ("name".to_string(), AttrValue::S("Alice".into())),
        ]);
        assert_eq!(
            insert_statement("contacts", &item).unwrap(),
            "INSERT INTO \"contacts\" value {'PK': 'P', 'SK': 'S', 'age': 30, 'name': 'Alice'}"
        );
    }

    #[test]
    fn test_update_statement_clause_order() {
        let edits = vec![
            AttrEdit::Update {
                path: "a".into(),
                value: "1".into(),
            },
            AttrEdit::Remove { path: "b.c".into() },
            AttrEdit::ListAppend {
                path: "list".into(),
                value: "[4]".into(),
            },
        ];
        assert_eq!(
            update_statement::<Keys>("t", &RowKey::new("p", "s"), 3, &edits),
            "UPDATE \"t\" SET \"a\"=1 REMOVE \"b.c\" SET \"list\"=list_append(list,[4]) \
             WHERE PK='p' AND SK='s' AND rowVersion=3"
        );
    }

    #[test]
    fn test_delete_statements() {
        let key = RowKey::new("p", "s");
        assert_eq!(
            delete_by_key_statement::<Keys>("t", &key),
            "DELETE FROM \"t\" WHERE PK='p' AND SK='s'"
        );
        assert_eq!(
            delete_item_statement::<Keys>("t", &key, 7),
            "DELETE FROM \"t\" WHERE PK='p' AND SK='s' AND rowVersion=7"
        );
    }

    #[test]
    fn test_render_nested_values() {
        let value = AttrValue::M(AttrMap::from([
            (
                "list".to_string(),
                AttrValue::L(vec![
                    AttrValue::N("1".into()),
                    AttrValue::Bool(true),
                    AttrValue::Null,
                ]),
            ),
            ("gone".to_string(), AttrValue::Null),
        ]));
        // Nulls vanish from both the list and the map.
        assert_eq!(
            render_value(&value).unwrap().unwrap(),
            "{'list': [1, true]}"
        );
    }

    #[test]
    fn test_single_quotes_are_doubled() {
        assert_eq!(
            render_value(&AttrValue::S("O'Brien".into())).unwrap().unwrap(),
            "'O''Brien'"
        );
    }

    #[test]
    fn test_render_rejects_binary() {
        let err = render_value(&AttrValue::B(vec![1, 2])).unwrap_err();
        match err {
            Error::UnableToUpdate { reason } => {
                assert_eq!(reason, "Unable to handle Binary types.");
            }
            other => panic!("expected UnableToUpdate, got {other:?}"),
        }
    }

    #[test]
    fn test_insert_condition_shape() {
        let condition = insert_condition::<Keys>();
        assert_eq!(
            condition.expression,
            "attribute_not_exists(#pk) AND attribute_not_exists(#sk)"
        );
        assert_eq!(condition.names["#pk"], "PK");
        assert_eq!(condition.names["#sk"], "SK");
        assert!(condition.values.is_empty());
    }

    #[test]
    fn test_version_condition_shape() {
        let create_date = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let condition = version_condition(4, &create_date);
        assert_eq!(
            condition.expression,
            "#rowversion = :versionnumber AND #createdate = :creationdate"
        );
        assert_eq!(condition.names["#rowversion"], "rowVersion");
        assert_eq!(condition.names["#createdate"], "createDate");
        assert_eq!(condition.values[":versionnumber"], AttrValue::N("4".into()));
        assert_eq!(
            condition.values[":creationdate"],
            AttrValue::S("2024-01-01T00:00:00.000000Z".into())
        );
    }
}
