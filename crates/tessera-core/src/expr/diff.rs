//! Structural diff between two attribute maps.
//!
//! The diff is the minimal ordered edit list that rewrites `existing` into
//! `new`, expressed as path-scoped `SET`/`REMOVE`/`list_append` operations.
//! Paths are dotted for map keys and bracketed for list indices
//! (e.g. `a.b[3].c`), rooted at the top of the item.

use std::collections::BTreeSet;

use crate::error::Result;
use crate::value::{AttrMap, AttrValue, unsupported_attribute};

use super::{render_list, render_value};

/// A single path-scoped edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrEdit {
    /// Set the attribute at `path` to the rendered literal `value`.
    Update { path: String, value: String },
    /// Remove the attribute at `path`.
    Remove { path: String },
    /// Append the rendered list literal `value` to the list at `path`.
    ListAppend { path: String, value: String },
}

/// Compute the edits that rewrite `existing` into `new`.
///
/// Map keys are visited in sorted order, so the output is deterministic for
/// identical inputs. Fails `UnableToUpdate` when either side contains a
/// binary or set variant.
pub fn diff(new: &AttrMap, existing: &AttrMap) -> Result<Vec<AttrEdit>> {
    let mut edits = Vec::new();
    diff_map(None, new, existing, &mut edits)?;
    Ok(edits)
}

fn diff_map(
    path: Option<&str>,
    new: &AttrMap,
    existing: &AttrMap,
    edits: &mut Vec<AttrEdit>,
) -> Result<()> {
    let keys: BTreeSet<&str> = new
        .keys()
        .chain(existing.keys())
        .map(String::as_str)
        .collect();
    for key in keys {
        let child = child_path(path, key);
        match (new.get(key), existing.get(key)) {
            (Some(new_value), Some(existing_value)) => {
                diff_value(&child, new_value, existing_value, edits)?;
            }
            (Some(new_value), None) => update_or_remove(child, new_value, edits)?,
            (None, Some(_)) => edits.push(AttrEdit::Remove { path: child }),
            (None, None) => {}
        }
    }
    Ok(())
}

fn diff_value(
    path: &str,
    new: &AttrValue,
    existing: &AttrValue,
    edits: &mut Vec<AttrEdit>,
) -> Result<()> {
    if !new.is_diffable() {
        return Err(unsupported_attribute(new));
    }
    if !existing.is_diffable() {
        return Err(unsupported_attribute(existing));
    }

    match (new, existing) {
        (AttrValue::S(_), AttrValue::S(_))
        | (AttrValue::N(_), AttrValue::N(_))
        | (AttrValue::Bool(_), AttrValue::Bool(_)) => {
            let rendered_new = render_value(new)?;
            if rendered_new != render_value(existing)? {
                if let Some(value) = rendered_new {
                    edits.push(AttrEdit::Update {
                        path: path.to_string(),
                        value,
                    });
                }
            }
            Ok(())
        }
        (AttrValue::Null, AttrValue::Null) => Ok(()),
        (AttrValue::L(new_items), AttrValue::L(existing_items)) => {
            diff_list(path, new_items, existing_items, edits)
        }
        (AttrValue::M(new_map), AttrValue::M(existing_map)) => {
            diff_map(Some(path), new_map, existing_map, edits)
        }
        // Type changed: recompute the attribute from scratch.
        _ => update_or_remove(path.to_string(), new, edits),
    }
}

fn diff_list(
    path: &str,
    new: &[AttrValue],
    existing: &[AttrValue],
    edits: &mut Vec<AttrEdit>,
) -> Result<()> {
    let len = new.len().max(existing.len());
    for i in 0..len {
        match (new.get(i), existing.get(i)) {
            (Some(new_item), Some(existing_item)) => {
                diff_value(&format!("{path}[{i}]"), new_item, existing_item, edits)?;
            }
            (None, Some(_)) => edits.push(AttrEdit::Remove {
                path: format!("{path}[{i}]"),
            }),
            (Some(_), None) => {
                // All surplus elements fold into a single list_append.
                edits.push(AttrEdit::ListAppend {
                    path: path.to_string(),
                    value: render_list(&new[i..])?,
                });
                break;
            }
            (None, None) => {}
        }
    }
    Ok(())
}

/// Emit `Update` if the value renders to a literal, `Remove` if it renders
/// to nothing (null).
fn update_or_remove(path: String, new: &AttrValue, edits: &mut Vec<AttrEdit>) -> Result<()> {
    match render_value(new)? {
        Some(value) => edits.push(AttrEdit::Update { path, value }),
        None => edits.push(AttrEdit::Remove { path }),
    }
    Ok(())
}

fn child_path(parent: Option<&str>, key: &str) -> String {
    match parent {
        Some(parent) => format!("{parent}.{key}"),
        None => key.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use serde_json::json;

    fn attrs(value: serde_json::Value) -> AttrMap {
        match AttrValue::from_json(value) {
            AttrValue::M(map) => map,
            other => panic!("expected a map, got {other:?}"),
        }
    }

    #[test]
    fn test_identical_maps_produce_no_edits() {
        let item = attrs(json!({"a": "x", "n": 3, "nested": {"k": true, "l": [1, 2]}}));
        assert!(diff(&item, &item).unwrap().is_empty());
    }

    #[test]
    fn test_nested_edits() {
        let new = attrs(json!({"a": "x", "list": [1, 2, 3, 4], "nested": {"k": true}}));
        let existing = attrs(json!({"a": "x", "list": [1, 9, 3], "nested": {"k": false, "gone": "z"}}));

        let edits = diff(&new, &existing).unwrap();
        assert_eq!(edits.len(), 4, "{edits:?}");
        assert!(edits.contains(&AttrEdit::Update {
            path: "list[1]".into(),
            value: "2".into(),
        }));
        assert!(edits.contains(&AttrEdit::ListAppend {
            path: "list".into(),
            value: "[4]".into(),
        }));
        assert!(edits.contains(&AttrEdit::Update {
            path: "nested.k".into(),
            value: "true".into(),
        }));
        assert!(edits.contains(&AttrEdit::Remove {
            path: "nested.gone".into(),
        }));
    }

    #[test]
    fn test_surplus_elements_fold_into_one_append() {
        let new = attrs(json!({"list": [1, 2, 3, 4, 5]}));
        let existing = attrs(json!({"list": [1, 2]}));
        let edits = diff(&new, &existing).unwrap();
        assert_eq!(
            edits,
            vec![AttrEdit::ListAppend {
                path: "list".into(),
                value: "[3, 4, 5]".into(),
            }]
        );
    }

    #[test]
    fn test_shrunk_list_removes_each_index() {
        let new = attrs(json!({"list": [1]}));
        let existing = attrs(json!({"list": [1, 2, 3]}));
        let edits = diff(&new, &existing).unwrap();
        assert_eq!(
            edits,
            vec![
                AttrEdit::Remove {
                    path: "list[1]".into()
                },
                AttrEdit::Remove {
                    path: "list[2]".into()
                },
            ]
        );
    }

    #[test]
    fn test_type_change_recomputes() {
        let new = attrs(json!({"a": 3}));
        let existing = attrs(json!({"a": "three"}));
        assert_eq!(
            diff(&new, &existing).unwrap(),
            vec![AttrEdit::Update {
                path: "a".into(),
                value: "3".into(),
            }]
        );
    }

    #[test]
    fn test_value_nulled_out_becomes_remove() {
        let new = attrs(json!({"a": null}));
        let existing = attrs(json!({"a": "x"}));
        assert_eq!(
            diff(&new, &existing).unwrap(),
            vec![AttrEdit::Remove { path: "a".into() }]
        );
    }

    #[test]
    fn test_added_null_key_becomes_remove() {
        // A fresh null attribute renders to nothing, so the recompute path
        // emits a remove for a path the store never had. Harmless.
        let new = attrs(json!({"a": null}));
        let existing = attrs(json!({}));
        assert_eq!(
            diff(&new, &existing).unwrap(),
            vec![AttrEdit::Remove { path: "a".into() }]
        );
    }

    #[test]
    fn test_deeply_nested_paths() {
        let new = attrs(json!({"a": {"b": [{"c": 1}, {"c": 2}]}}));
        let existing = attrs(json!({"a": {"b": [{"c": 1}, {"c": 9}]}}));
        assert_eq!(
            diff(&new, &existing).unwrap(),
            vec![AttrEdit::Update {
                path: "a.b[1].c".into(),
                value: "2".into(),
            }]
        );
    }

    #[test]
    fn test_deterministic_order() {
        let new = attrs(json!({"z": 1, "a": 2, "m": 3}));
        let existing = attrs(json!({"z": 0, "a": 0, "m": 0}));
        let paths: Vec<String> = diff(&new, &existing)
            .unwrap()
            .into_iter()
            .map(|edit| match edit {
                AttrEdit::Update { path, .. } => path,
                other => panic!("unexpected edit {other:?}"),
            })
            .collect();
        assert_eq!(paths, vec!["a", "m", "z"]);
    }

    #[test]
    fn test_binary_attribute_fails() {
        let mut new = attrs(json!({"a": 1}));
        new.insert("blob".to_string(), AttrValue::B(vec![0xFF]));
        let existing = attrs(json!({"a": 1}));

        let err = diff(&new, &existing).unwrap_err();
        match err {
            Error::UnableToUpdate { reason } => {
                assert_eq!(reason, "Unable to handle Binary types.");
            }
            other => panic!("expected UnableToUpdate, got {other:?}"),
        }
    }

    #[test]
    fn test_string_set_attribute_fails() {
        let new = attrs(json!({"a": 1, "tags": "none"}));
        let mut existing = attrs(json!({"a": 1}));
        existing.insert("tags".to_string(), AttrValue::Ss(vec!["x".into()]));

        let err = diff(&new, &existing).unwrap_err();
        assert!(
            format!("{err}").contains("Unable to handle String Set types."),
            "{err}"
        );
    }
}
