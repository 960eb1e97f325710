//! Typed master records.
//!
//! Each kind has its own payload struct; [`MasterRecord`] wraps a payload with
//! the base fields every row carries and the parents a list join embedded.
//! Generic views never look inside the payload directly: they project the
//! record to JSON and address it by dot-path.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::form::FormData;
use crate::kind::MasterKind;
use crate::schema::SchemaRegistry;

/// A country.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Country {
    /// Country name.
    pub name: String,
    /// Short code, e.g. `IN`.
    pub code: Option<String>,
}

/// A state or province.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    /// Owning country.
    pub country_id: String,
    /// State name.
    pub name: String,
    /// Short code, e.g. `KA`.
    pub code: Option<String>,
}

/// A city.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct City {
    /// Owning state.
    pub state_id: Option<String>,
    /// City name.
    pub name: String,
}

/// A transport company.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transporter {
    /// Company name.
    pub name: String,
    /// Person to contact.
    pub contact_person: Option<String>,
    /// Phone number.
    pub phone: Option<String>,
    /// Email address.
    pub email: Option<String>,
    /// Postal address.
    pub address: Option<String>,
    /// City the company is based in.
    pub city_id: Option<String>,
    /// GST identification number.
    pub gstin: Option<String>,
}

/// The kind-specific body of a record, as sent on create and update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MasterPayload {
    /// A country body.
    Country(Country),
    /// A state body.
    State(State),
    /// A city body.
    City(City),
    /// A transporter body.
    Transporter(Transporter),
}

impl MasterPayload {
    /// Kind this payload belongs to.
    #[must_use]
    pub fn kind(&self) -> MasterKind {
        match self {
            Self::Country(_) => MasterKind::Countries,
            Self::State(_) => MasterKind::States,
            Self::City(_) => MasterKind::Cities,
            Self::Transporter(_) => MasterKind::Transporters,
        }
    }

    /// Display name of the record.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Country(c) => &c.name,
            Self::State(s) => &s.name,
            Self::City(c) => &c.name,
            Self::Transporter(t) => &t.name,
        }
    }

    /// Parse a payload of `kind` out of a JSON object. Unknown keys are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if required keys are missing or have the wrong type.
    pub fn from_value(kind: MasterKind, value: Value) -> Result<Self> {
        Ok(match kind {
            MasterKind::Countries => Self::Country(serde_json::from_value(value)?),
            MasterKind::States => Self::State(serde_json::from_value(value)?),
            MasterKind::Cities => Self::City(serde_json::from_value(value)?),
            MasterKind::Transporters => Self::Transporter(serde_json::from_value(value)?),
        })
    }

    /// The wire body: every payload field, `null` for unset optionals.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let value = match self {
            Self::Country(c) => serde_json::to_value(c),
            Self::State(s) => serde_json::to_value(s),
            Self::City(c) => serde_json::to_value(c),
            Self::Transporter(t) => serde_json::to_value(t),
        };
        value.unwrap_or_default()
    }

    /// Build a payload of `kind` from submitted form values.
    ///
    /// Values are trimmed. Empty optional fields become `null`; empty required
    /// fields stay empty strings (validation rejects them before this point).
    ///
    /// # Errors
    ///
    /// Returns an error if the values cannot form a payload of `kind`.
    pub fn from_form(kind: MasterKind, form: &FormData) -> Result<Self> {
        let schema = SchemaRegistry::get(kind);
        let mut object = Map::new();
        for field in &schema.fields {
            let raw = form.get(&field.name).trim();
            let value = if raw.is_empty() && !field.required {
                Value::Null
            } else {
                Value::String(raw.to_string())
            };
            object.insert(field.name.clone(), value);
        }
        Self::from_value(kind, Value::Object(object))
    }

    /// Form values for editing this payload.
    #[must_use]
    pub fn to_form(&self) -> FormData {
        let Value::Object(object) = self.to_value() else {
            return FormData::default();
        };
        object
            .into_iter()
            .map(|(key, value)| (key, display_value(&value)))
            .collect()
    }
}

/// A parent embedded by a list join, projected to its name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parent {
    /// Parent's display name.
    pub name: String,
    /// Grandparents, keyed by singular kind name.
    #[serde(flatten)]
    pub parents: BTreeMap<String, Option<Parent>>,
}

/// A persisted record of any kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterRecord {
    /// Backend-assigned identifier.
    pub id: String,
    /// Creation time; lists are sorted on it, newest first.
    pub created_at: DateTime<Utc>,
    /// Last update time, if the backend tracks it.
    pub updated_at: Option<DateTime<Utc>>,
    /// Kind-specific fields.
    pub payload: MasterPayload,
    /// Parents embedded by the list join, keyed by singular kind name.
    /// `None` when the foreign key is unset.
    pub joins: BTreeMap<String, Option<Parent>>,
}

impl MasterRecord {
    /// Kind of this record.
    #[must_use]
    pub fn kind(&self) -> MasterKind {
        self.payload.kind()
    }

    /// Display name of this record.
    #[must_use]
    pub fn name(&self) -> &str {
        self.payload.name()
    }

    /// Parse a backend row of `kind`.
    ///
    /// The row must carry `id` and `created_at`; keys named after the kind's
    /// join parents are lifted into [`MasterRecord::joins`].
    ///
    /// # Errors
    ///
    /// Returns an error if the row is not an object, lacks base fields, or
    /// does not fit the payload of `kind`.
    pub fn from_value(kind: MasterKind, value: Value) -> Result<Self> {
        let Value::Object(mut object) = value else {
            return Err(Error::malformed(kind, "expected a JSON object"));
        };

        let id = match object.remove("id") {
            Some(Value::String(id)) => id,
            Some(Value::Number(id)) => id.to_string(),
            _ => return Err(Error::malformed(kind, "missing id")),
        };
        let created_at = match object.remove("created_at") {
            Some(value @ Value::String(_)) => serde_json::from_value(value)?,
            _ => return Err(Error::malformed(kind, "missing created_at")),
        };
        let updated_at = match object.remove("updated_at") {
            None | Some(Value::Null) => None,
            Some(value) => Some(serde_json::from_value(value)?),
        };

        let mut joins = BTreeMap::new();
        for join in kind.joins() {
            if let Some(value) = object.remove(join.field()) {
                joins.insert(join.field().to_string(), serde_json::from_value(value)?);
            }
        }

        let payload = MasterPayload::from_value(kind, Value::Object(object))?;
        Ok(Self {
            id,
            created_at,
            updated_at,
            payload,
            joins,
        })
    }

    /// Structural view of the record: payload, base fields and joins.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut object = match self.payload.to_value() {
            Value::Object(object) => object,
            _ => Map::new(),
        };
        object.insert("id".to_string(), Value::String(self.id.clone()));
        object.insert(
            "created_at".to_string(),
            Value::String(self.created_at.to_rfc3339()),
        );
        object.insert(
            "updated_at".to_string(),
            self.updated_at
                .map_or(Value::Null, |at| Value::String(at.to_rfc3339())),
        );
        for (key, parent) in &self.joins {
            object.insert(
                key.clone(),
                serde_json::to_value(parent).unwrap_or_default(),
            );
        }
        Value::Object(object)
    }

    /// Value at a dot-path such as `state.country.name`.
    #[must_use]
    pub fn get_path(&self, path: &str) -> Option<Value> {
        lookup_path(&self.to_value(), path).cloned()
    }
}

impl Serialize for MasterRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

/// Walk a dot-path through nested JSON objects.
#[must_use]
pub fn lookup_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(value, |current, segment| current.get(segment))
}

/// Text used to show a JSON value in a cell or an input.
#[must_use]
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn city_row() -> Value {
        json!({
            "id": "c-1",
            "state_id": "s-1",
            "name": "Bengaluru",
            "created_at": "2024-03-01T10:00:00.123456+00:00",
            "updated_at": "2024-03-02T10:00:00+00:00",
            "state": {"name": "Karnataka", "country": {"name": "India"}}
        })
    }

    #[test]
    fn test_city_row_with_two_level_join() {
        let record = MasterRecord::from_value(MasterKind::Cities, city_row()).unwrap();
        assert_eq!(record.id, "c-1");
        assert_eq!(record.name(), "Bengaluru");
        assert_eq!(record.kind(), MasterKind::Cities);
        assert!(record.updated_at.is_some());
        assert_eq!(record.get_path("state.name"), Some(json!("Karnataka")));
        assert_eq!(record.get_path("state.country.name"), Some(json!("India")));
    }

    #[test]
    fn test_null_join_is_kept_as_none() {
        let row = json!({
            "id": "c-2",
            "state_id": null,
            "name": "Nowhere",
            "created_at": "2024-03-01T10:00:00Z",
            "state": null
        });
        let record = MasterRecord::from_value(MasterKind::Cities, row).unwrap();
        assert_eq!(record.joins.get("state"), Some(&None));
        assert_eq!(record.get_path("state.name"), None);
        assert!(record.updated_at.is_none());
    }

    #[test]
    fn test_missing_id_is_malformed() {
        let row = json!({"name": "India", "created_at": "2024-03-01T10:00:00Z"});
        let err = MasterRecord::from_value(MasterKind::Countries, row).unwrap_err();
        assert!(matches!(err, Error::MalformedRecord { .. }));
    }

    #[test]
    fn test_missing_created_at_is_malformed() {
        let row = json!({"id": "x", "name": "India"});
        let err = MasterRecord::from_value(MasterKind::Countries, row).unwrap_err();
        assert!(err.to_string().contains("created_at"));
    }

    #[test]
    fn test_non_object_row_is_malformed() {
        let err = MasterRecord::from_value(MasterKind::Countries, json!([1, 2])).unwrap_err();
        assert!(matches!(err, Error::MalformedRecord { .. }));
    }

    #[test]
    fn test_state_requires_country_id() {
        let row = json!({"id": "s", "name": "Goa", "created_at": "2024-03-01T10:00:00Z"});
        assert!(MasterRecord::from_value(MasterKind::States, row).is_err());
    }

    #[test]
    fn test_payload_to_value_sends_nulls_for_unset_optionals() {
        let payload = MasterPayload::Country(Country {
            name: "India".to_string(),
            code: None,
        });
        assert_eq!(payload.to_value(), json!({"name": "India", "code": null}));
    }

    #[test]
    fn test_to_value_contains_base_fields_and_joins() {
        let record = MasterRecord::from_value(MasterKind::Cities, city_row()).unwrap();
        let value = record.to_value();
        assert_eq!(value["id"], "c-1");
        assert_eq!(value["state"]["country"]["name"], "India");
        assert!(value["created_at"].as_str().unwrap().starts_with("2024-03-01"));
    }

    #[test]
    fn test_from_form_blanks_optional_fields() {
        let form: FormData = [
            ("name", " Acme Roadways "),
            ("phone", ""),
            ("city_id", ""),
        ]
        .into_iter()
        .collect();
        let payload = MasterPayload::from_form(MasterKind::Transporters, &form).unwrap();
        let MasterPayload::Transporter(t) = payload else {
            panic!("expected a transporter payload");
        };
        assert_eq!(t.name, "Acme Roadways");
        assert_eq!(t.phone, None);
        assert_eq!(t.city_id, None);
    }

    #[test]
    fn test_to_form_round_trips_through_from_form() {
        let payload = MasterPayload::State(State {
            country_id: "IN".to_string(),
            name: "Karnataka".to_string(),
            code: Some("KA".to_string()),
        });
        let form = payload.to_form();
        assert_eq!(form.get("country_id"), "IN");
        assert_eq!(form.get("code"), "KA");
        assert_eq!(
            MasterPayload::from_form(MasterKind::States, &form).unwrap(),
            payload
        );
    }

    #[test]
    fn test_lookup_path_stops_at_non_objects() {
        let value = json!({"a": {"b": "c"}});
        assert_eq!(lookup_path(&value, "a.b"), Some(&json!("c")));
        assert_eq!(lookup_path(&value, "a.b.c"), None);
        assert_eq!(lookup_path(&value, "missing"), None);
    }

    #[test]
    fn test_display_value() {
        assert_eq!(display_value(&Value::Null), "");
        assert_eq!(display_value(&json!("x")), "x");
        assert_eq!(display_value(&json!(3)), "3");
    }

    #[test]
    fn test_record_serializes_structurally() {
        let record = MasterRecord::from_value(MasterKind::Cities, city_row()).unwrap();
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["name"], "Bengaluru");
        assert_eq!(json["state"]["name"], "Karnataka");
    }
}
