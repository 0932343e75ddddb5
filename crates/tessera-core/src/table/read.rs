//! Polymorphic read dispatch: row-type tag to decoder.
//!
//! A query over a partition can return rows of several payload schemas. The
//! caller declares a result type carrying a registry of providers keyed by
//! row-type tag; each stored row is decoded by the provider matching its
//! tag. A tag with no provider fails `UnexpectedType`.

use crate::error::{Error, Result};
use crate::row::{ATTR_ROW_TYPE, KeySchema, Row, RowPayload};
use crate::value::{AttrMap, AttrValue};

/// One registry entry: a row-type tag and the function decoding a stored
/// attribute map into the result type.
pub struct RowProvider<R> {
    pub row_type: &'static str,
    pub decode: fn(&AttrMap) -> Result<R>,
}

/// A read result type: a closed union over payload schemas coexisting under
/// one partition.
///
/// ```
/// use serde::{Deserialize, Serialize};
/// use tessera_core::{KeySchema, Row, RowPayload, RowProvider, RowUnion};
///
/// struct Keys;
/// impl KeySchema for Keys {
///     const PARTITION_KEY: &'static str = "PK";
///     const SORT_KEY: &'static str = "SK";
/// }
///
/// #[derive(Serialize, Deserialize)]
/// struct Contact { name: String }
/// impl RowPayload for Contact {
///     const ROW_TYPE: &'static str = "Contact";
/// }
///
/// #[derive(Serialize, Deserialize)]
/// struct Event { what: String }
/// impl RowPayload for Event {
///     const ROW_TYPE: &'static str = "Event";
/// }
///
/// enum TenantRow {
///     Contact(Row<Keys, Contact>),
///     Event(Row<Keys, Event>),
/// }
///
/// impl RowUnion for TenantRow {
///     type Schema = Keys;
///
///     fn providers() -> Vec<RowProvider<Self>> {
///         vec![
///             RowProvider {
///                 row_type: Contact::ROW_TYPE,
///                 decode: |attrs| Row::from_attrs(attrs).map(TenantRow::Contact),
///             },
///             RowProvider {
///                 row_type: Event::ROW_TYPE,
///                 decode: |attrs| Row::from_attrs(attrs).map(TenantRow::Event),
///             },
///         ]
///     }
/// }
/// ```
pub trait RowUnion: Sized {
    /// The key attribute schema shared by every variant.
    type Schema: KeySchema;

    /// The tag registry. Order is irrelevant; tags must be distinct.
    fn providers() -> Vec<RowProvider<Self>>;
}

/// A single-payload result type is the trivial union.
impl<A: KeySchema, P: RowPayload> RowUnion for Row<A, P> {
    type Schema = A;

    fn providers() -> Vec<RowProvider<Self>> {
        vec![RowProvider {
            row_type: P::ROW_TYPE,
            decode: Row::from_attrs,
        }]
    }
}

/// Decode a stored attribute map into the requested result type.
pub fn decode_row<R: RowUnion>(attrs: &AttrMap) -> Result<R> {
    let provided = match attrs.get(ATTR_ROW_TYPE) {
        Some(AttrValue::S(tag)) => tag.clone(),
        _ => {
            return Err(Error::unexpected_response(
                "stored row is missing its row type attribute",
            ));
        }
    };
    match R::providers().into_iter().find(|p| p.row_type == provided) {
        Some(provider) => (provider.decode)(attrs),
        None => Err(Error::UnexpectedType { provided }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row::RowKey;
    use serde::{Deserialize, Serialize};

    struct Keys;
    impl KeySchema for Keys {
        const PARTITION_KEY: &'static str = "PK";
        const SORT_KEY: &'static str = "SK";
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Contact {
        name: String,
    }
    impl RowPayload for Contact {
        const ROW_TYPE: &'static str = "Contact";
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Event {
        what: String,
    }
    impl RowPayload for Event {
        const ROW_TYPE: &'static str = "Event";
    }

    #[derive(Debug, PartialEq)]
    enum TenantRow {
        Contact(Row<Keys, Contact>),
        Event(Row<Keys, Event>),
    }

    impl RowUnion for TenantRow {
        type Schema = Keys;

        fn providers() -> Vec<RowProvider<Self>> {
            vec![
                RowProvider {
                    row_type: Contact::ROW_TYPE,
                    decode: |attrs| Row::from_attrs(attrs).map(TenantRow::Contact),
                },
                RowProvider {
                    row_type: Event::ROW_TYPE,
                    decode: |attrs| Row::from_attrs(attrs).map(TenantRow::Event),
                },
            ]
        }
    }

    #[test]
    fn test_dispatch_selects_matching_provider() {
        let contact: Row<Keys, Contact> = Row::new(
            RowKey::new("P", "C#1"),
            Contact {
                name: "Alice".into(),
            },
        );
        let event: Row<Keys, Event> = Row::new(
            RowKey::new("P", "E#1"),
            Event {
                what: "signup".into(),
            },
        );

        let decoded: TenantRow = decode_row(&contact.to_attrs().unwrap()).unwrap();
        assert_eq!(decoded, TenantRow::Contact(contact));

        let decoded: TenantRow = decode_row(&event.to_attrs().unwrap()).unwrap();
        assert_eq!(decoded, TenantRow::Event(event));
    }

    #[test]
    fn test_unknown_tag_fails_with_provided_type() {
        let contact: Row<Keys, Contact> = Row::new(
            RowKey::new("P", "C#1"),
            Contact {
                name: "Alice".into(),
            },
        );
        // A result type whose registry only knows events.
        let err = decode_row::<Row<Keys, Event>>(&contact.to_attrs().unwrap()).unwrap_err();
        match err {
            Error::UnexpectedType { provided } => assert_eq!(provided, "Contact"),
            other => panic!("expected UnexpectedType, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_tag_attribute() {
        let err = decode_row::<Row<Keys, Contact>>(&AttrMap::new()).unwrap_err();
        assert!(matches!(err, Error::UnexpectedResponse { .. }), "{err}");
    }
}
