//! The versioned row envelope and its attribute-map encoding.
//!
//! Every stored row carries its composite key, an immutable create date, a
//! monotonically increasing row version, and a stable row-type tag naming
//! the payload's schema. The version and create date together form the
//! optimistic-concurrency precondition for updates and conditional deletes.

use std::marker::PhantomData;

use chrono::{DateTime, SecondsFormat, Timelike, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::value::{AttrMap, AttrValue};

/// Reserved attribute name: the row version (stored as a number).
pub const ATTR_ROW_VERSION: &str = "rowVersion";
/// Reserved attribute name: the immutable create date.
pub const ATTR_CREATE_DATE: &str = "createDate";
/// Reserved attribute name: the last update date.
pub const ATTR_LAST_UPDATE_DATE: &str = "lastUpdateDate";
/// Reserved attribute name: the row-type tag.
pub const ATTR_ROW_TYPE: &str = "rowType";

/// Names of the two key attributes of a table.
///
/// Implemented by zero-size marker types; the marker travels as a type
/// parameter so rows, tables, and polymorphic result types agree on the
/// attribute names at compile time.
pub trait KeySchema {
    /// Attribute name of the partition key (e.g. `"PK"`).
    const PARTITION_KEY: &'static str;
    /// Attribute name of the sort key (e.g. `"SK"`).
    const SORT_KEY: &'static str;
}

/// A serializable payload record with a stable row-type tag.
///
/// The tag is stored alongside the payload's flattened attributes and
/// drives polymorphic read dispatch; it must never change for a given
/// payload schema.
pub trait RowPayload: Serialize + DeserializeOwned {
    /// Stable identifier of this payload's schema.
    const ROW_TYPE: &'static str;
}

/// Values of the composite primary key.
///
/// Keys are total-ordered by sort key within a partition; partitions are
/// independent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowKey {
    pub partition: String,
    pub sort: String,
}

impl RowKey {
    pub fn new(partition: impl Into<String>, sort: impl Into<String>) -> Self {
        Self {
            partition: partition.into(),
            sort: sort.into(),
        }
    }
}

/// Mutable row metadata: version plus last update date.
#[derive(Debug, Clone, PartialEq)]
pub struct RowStatus {
    /// Starts at 1 on insert, increases by exactly 1 per successful update.
    pub row_version: u64,
    pub last_update_date: DateTime<Utc>,
}

/// A typed row: composite key, envelope metadata, and payload.
///
/// `A` names the key attributes; `P` is the payload schema. The stored
/// attribute map contains the two key attributes, the four reserved
/// envelope attributes, and the payload's flattened top-level fields.
pub struct Row<A, P> {
    pub key: RowKey,
    /// Immutable after insert.
    pub create_date: DateTime<Utc>,
    pub status: RowStatus,
    pub payload: P,
    schema: PhantomData<fn() -> A>,
}

impl<A, P> Row<A, P> {
    /// A fresh row at version 1, created now.
    pub fn new(key: RowKey, payload: P) -> Self {
        Self::new_at(key, payload, Utc::now())
    }

    /// A fresh row at version 1 with an explicit create instant.
    pub fn new_at(key: RowKey, payload: P, at: DateTime<Utc>) -> Self {
        let at = truncate_to_micros(at);
        Self {
            key,
            create_date: at,
            status: RowStatus {
                row_version: 1,
                last_update_date: at,
            },
            payload,
            schema: PhantomData,
        }
    }

    /// The successor of this row: same key and create date, version + 1,
    /// refreshed last update date, new payload.
    ///
    /// Pass the result as `new` and `self` as `existing` to `update`.
    pub fn updated(&self, payload: P) -> Self {
        self.updated_at(payload, Utc::now())
    }

    /// Like [`Row::updated`] with an explicit update instant.
    pub fn updated_at(&self, payload: P, at: DateTime<Utc>) -> Self {
        Self {
            key: self.key.clone(),
            create_date: self.create_date,
            status: RowStatus {
                row_version: self.status.row_version + 1,
                last_update_date: truncate_to_micros(at),
            },
            payload,
            schema: PhantomData,
        }
    }
}

impl<A: KeySchema, P: RowPayload> Row<A, P> {
    /// Encode this row as the stored attribute map.
    ///
    /// Fails `UnableToUpdate` if the payload does not serialize to a map or
    /// uses one of the reserved attribute names.
    pub fn to_attrs(&self) -> Result<AttrMap> {
        let payload = serde_json::to_value(&self.payload).map_err(|e| Error::UnableToUpdate {
            reason: format!("payload is not representable: {e}"),
        })?;
        let Value::Object(fields) = payload else {
            return Err(Error::UnableToUpdate {
                reason: "payload must serialize to a map of attributes".to_string(),
            });
        };

        let mut attrs = AttrMap::new();
        for (name, value) in fields {
            if is_reserved::<A>(&name) {
                return Err(Error::UnableToUpdate {
                    reason: format!("payload attribute name '{name}' is reserved"),
                });
            }
            attrs.insert(name, AttrValue::from_json(value));
        }

        attrs.insert(
            A::PARTITION_KEY.to_string(),
            AttrValue::S(self.key.partition.clone()),
        );
        attrs.insert(A::SORT_KEY.to_string(), AttrValue::S(self.key.sort.clone()));
        attrs.insert(
            ATTR_ROW_VERSION.to_string(),
            AttrValue::N(self.status.row_version.to_string()),
        );
        attrs.insert(
            ATTR_CREATE_DATE.to_string(),
            AttrValue::S(format_instant(&self.create_date)),
        );
        attrs.insert(
            ATTR_LAST_UPDATE_DATE.to_string(),
            AttrValue::S(format_instant(&self.status.last_update_date)),
        );
        attrs.insert(
            ATTR_ROW_TYPE.to_string(),
            AttrValue::S(P::ROW_TYPE.to_string()),
        );
        Ok(attrs)
    }

    /// Decode a stored attribute map back into a typed row.
    ///
    /// Fails `UnexpectedResponse` if the stored row-type tag does not match
    /// `P::ROW_TYPE` or the envelope attributes are missing or malformed.
    pub fn from_attrs(attrs: &AttrMap) -> Result<Self> {
        let tag = string_attr(attrs, ATTR_ROW_TYPE)?;
        if tag != P::ROW_TYPE {
            return Err(Error::unexpected_response(format!(
                "stored row type '{tag}' does not match expected '{}'",
                P::ROW_TYPE
            )));
        }

        let partition = string_attr(attrs, A::PARTITION_KEY)?;
        let sort = string_attr(attrs, A::SORT_KEY)?;
        let row_version = match attrs.get(ATTR_ROW_VERSION) {
            Some(AttrValue::N(n)) => n.parse::<u64>().map_err(|_| {
                Error::unexpected_response(format!("invalid row version literal '{n}'"))
            })?,
            _ => {
                return Err(Error::unexpected_response(format!(
                    "missing or non-numeric '{ATTR_ROW_VERSION}' attribute"
                )));
            }
        };
        let create_date = parse_instant(string_attr(attrs, ATTR_CREATE_DATE)?)?;
        let last_update_date = parse_instant(string_attr(attrs, ATTR_LAST_UPDATE_DATE)?)?;

        let mut fields = serde_json::Map::new();
        for (name, value) in attrs {
            if is_reserved::<A>(name) {
                continue;
            }
            fields.insert(name.clone(), value.clone().into_json()?);
        }
        let payload = serde_json::from_value(Value::Object(fields)).map_err(|e| {
            Error::unexpected_response(format!("failed to decode '{tag}' payload: {e}"))
        })?;

        Ok(Self {
            key: RowKey::new(partition, sort),
            create_date,
            status: RowStatus {
                row_version,
                last_update_date,
            },
            payload,
            schema: PhantomData,
        })
    }
}

// Manual impls: `A` is a marker and should not be required to implement
// anything for rows to be cloned, compared, or printed.

impl<A, P: Clone> Clone for Row<A, P> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            create_date: self.create_date,
            status: self.status.clone(),
            payload: self.payload.clone(),
            schema: PhantomData,
        }
    }
}

impl<A, P: PartialEq> PartialEq for Row<A, P> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
            && self.create_date == other.create_date
            && self.status == other.status
            && self.payload == other.payload
    }
}

impl<A, P: std::fmt::Debug> std::fmt::Debug for Row<A, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Row")
            .field("key", &self.key)
            .field("create_date", &self.create_date)
            .field("status", &self.status)
            .field("payload", &self.payload)
            .finish()
    }
}

/// Whether `name` is one of the six reserved attribute names for schema `A`.
fn is_reserved<A: KeySchema>(name: &str) -> bool {
    name == A::PARTITION_KEY
        || name == A::SORT_KEY
        || name == ATTR_ROW_VERSION
        || name == ATTR_CREATE_DATE
        || name == ATTR_LAST_UPDATE_DATE
        || name == ATTR_ROW_TYPE
}

fn string_attr<'a>(attrs: &'a AttrMap, name: &str) -> Result<&'a str> {
    attrs
        .get(name)
        .and_then(AttrValue::as_s)
        .ok_or_else(|| Error::unexpected_response(format!("missing string attribute '{name}'")))
}

/// Render an instant as RFC 3339 UTC with microsecond fractional seconds.
pub(crate) fn format_instant(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_instant(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| Error::unexpected_response(format!("invalid instant '{s}': {e}")))
}

/// Drop sub-microsecond precision so instants survive the stored rendering
/// exactly.
fn truncate_to_micros(at: DateTime<Utc>) -> DateTime<Utc> {
    let micros = at.nanosecond() / 1_000 * 1_000;
    at.with_nanosecond(micros).unwrap_or(at)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde::Deserialize;

    struct Keys;
    impl KeySchema for Keys {
        const PARTITION_KEY: &'static str = "PK";
        const SORT_KEY: &'static str = "SK";
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Contact {
        name: String,
        age: u32,
    }
    impl RowPayload for Contact {
        const ROW_TYPE: &'static str = "Contact";
    }

    fn contact_row() -> Row<Keys, Contact> {
        Row::new_at(
            RowKey::new("TENANT#1", "CONTACT#alice"),
            Contact {
                name: "Alice".into(),
                age: 30,
            },
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        )
    }

    #[test]
    fn test_attrs_round_trip() {
        let row = contact_row();
        let attrs = row.to_attrs().unwrap();

        assert_eq!(attrs["PK"], AttrValue::S("TENANT#1".into()));
        assert_eq!(attrs["SK"], AttrValue::S("CONTACT#alice".into()));
        assert_eq!(attrs[ATTR_ROW_VERSION], AttrValue::N("1".into()));
        assert_eq!(
            attrs[ATTR_CREATE_DATE],
            AttrValue::S("2024-01-01T00:00:00.000000Z".into())
        );
        assert_eq!(attrs[ATTR_ROW_TYPE], AttrValue::S("Contact".into()));
        assert_eq!(attrs["name"], AttrValue::S("Alice".into()));

        let decoded: Row<Keys, Contact> = Row::from_attrs(&attrs).unwrap();
        assert_eq!(decoded, row);
    }

    #[test]
    fn test_round_trip_after_now() {
        // Timestamps taken from the wall clock must survive the stored
        // rendering exactly.
        let row: Row<Keys, Contact> = Row::new(
            RowKey::new("p", "s"),
            Contact {
                name: "Bob".into(),
                age: 1,
            },
        );
        let decoded: Row<Keys, Contact> = Row::from_attrs(&row.to_attrs().unwrap()).unwrap();
        assert_eq!(decoded, row);
    }

    #[test]
    fn test_updated_bumps_version_and_keeps_create_date() {
        let row = contact_row();
        let later = Utc.with_ymd_and_hms(2024, 2, 1, 12, 0, 0).unwrap();
        let next = row.updated_at(
            Contact {
                name: "Alice".into(),
                age: 31,
            },
            later,
        );

        assert_eq!(next.status.row_version, 2);
        assert_eq!(next.create_date, row.create_date);
        assert_eq!(next.status.last_update_date, later);
        assert_eq!(next.key, row.key);
    }

    #[test]
    fn test_row_type_mismatch() {
        #[derive(Debug, Serialize, Deserialize)]
        struct Event {
            what: String,
        }
        impl RowPayload for Event {
            const ROW_TYPE: &'static str = "Event";
        }

        let attrs = contact_row().to_attrs().unwrap();
        let err = Row::<Keys, Event>::from_attrs(&attrs).unwrap_err();
        assert!(matches!(err, Error::UnexpectedResponse { .. }), "{err}");
        assert!(format!("{err}").contains("'Contact'"), "{err}");
    }

    #[test]
    fn test_reserved_payload_attribute_rejected() {
        #[derive(Debug, Serialize, Deserialize)]
        struct Clash {
            #[serde(rename = "rowVersion")]
            version: u64,
        }
        impl RowPayload for Clash {
            const ROW_TYPE: &'static str = "Clash";
        }

        let row: Row<Keys, Clash> =
            Row::new(RowKey::new("p", "s"), Clash { version: 9 });
        let err = row.to_attrs().unwrap_err();
        assert!(matches!(err, Error::UnableToUpdate { .. }), "{err}");
        assert!(format!("{err}").contains("reserved"), "{err}");
    }

    #[test]
    fn test_non_map_payload_rejected() {
        #[derive(Debug, Serialize, Deserialize)]
        struct Bare(u32);
        impl RowPayload for Bare {
            const ROW_TYPE: &'static str = "Bare";
        }

        let row: Row<Keys, Bare> = Row::new(RowKey::new("p", "s"), Bare(7));
        let err = row.to_attrs().unwrap_err();
        assert!(
            format!("{err}").contains("must serialize to a map"),
            "{err}"
        );
    }
}
