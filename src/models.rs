//! Core data types: schemaless documents and find selectors.
//!
//! A [`Document`] is a JSON object carrying an application-level `type` tag
//! and arbitrary fields. The storage layer assigns the reserved `_id` and
//! `_rev` fields on insert; before that they are simply absent.
//!
//! A [`Selector`] is the declarative filter sent to the document service's
//! find operation. It is an explicit tagged structure rather than a free-form
//! JSON object, so the three query shapes the store uses are the only ones
//! that can be expressed.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Reserved field holding the storage-assigned document id.
pub const ID_FIELD: &str = "_id";
/// Reserved field holding the storage-assigned revision token.
pub const REV_FIELD: &str = "_rev";
/// Application-level type tag carried by every domain document.
pub const TYPE_FIELD: &str = "type";

/// A schemaless document: field names mapped to JSON values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(Map<String, Value>);

impl Document {
    /// Create an empty document tagged with `doc_type`.
    pub fn of_type(doc_type: &str) -> Self {
        let mut doc = Self::default();
        doc.set(TYPE_FIELD, json!(doc_type));
        doc
    }

    /// Build a document from a JSON value. Returns `None` when the value is
    /// not an object.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    /// Set a field, replacing any previous value.
    pub fn set(&mut self, field: &str, value: Value) {
        self.0.insert(field.to_string(), value);
    }

    /// Builder-style [`set`](Self::set).
    pub fn with(mut self, field: &str, value: Value) -> Self {
        self.set(field, value);
        self
    }

    /// Look up a field by name.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// The storage-assigned id, if the document has been persisted.
    pub fn id(&self) -> Option<&str> {
        self.0.get(ID_FIELD).and_then(Value::as_str)
    }

    /// The storage-assigned revision, if the document has been persisted.
    pub fn rev(&self) -> Option<&str> {
        self.0.get(REV_FIELD).and_then(Value::as_str)
    }

    /// The application-level type tag.
    pub fn doc_type(&self) -> Option<&str> {
        self.0.get(TYPE_FIELD).and_then(Value::as_str)
    }

    /// Stamp the storage-assigned id.
    pub fn set_id(&mut self, id: &str) {
        self.set(ID_FIELD, json!(id));
    }

    /// Stamp the storage-assigned revision.
    pub fn set_rev(&mut self, rev: &str) {
        self.set(REV_FIELD, json!(rev));
    }
}

/// A declarative filter for the document service's find operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Selector {
    /// Exact match on the document id.
    Id(String),
    /// All documents with the given type tag.
    Type(String),
    /// Documents of `doc_type` whose `field` equals `value`. Also constrains
    /// on a non-null id so the service can take an indexed path.
    Field {
        doc_type: String,
        field: String,
        value: Value,
    },
}

impl Selector {
    /// Build a [`Selector::Field`], validating the field name.
    ///
    /// The field must be non-empty and must not name one of the reserved
    /// fields, which have dedicated selector forms.
    pub fn field(doc_type: &str, field: &str, value: Value) -> Result<Self> {
        if field.is_empty() {
            bail!("selector field name must not be empty");
        }
        if field == ID_FIELD || field == REV_FIELD || field == TYPE_FIELD {
            bail!("selector field name '{}' is reserved", field);
        }
        Ok(Self::Field {
            doc_type: doc_type.to_string(),
            field: field.to_string(),
            value,
        })
    }

    /// Render the Mango-style JSON the document service consumes.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Id(id) => json!({ ID_FIELD: id }),
            Self::Type(doc_type) => json!({ TYPE_FIELD: doc_type }),
            Self::Field {
                doc_type,
                field,
                value,
            } => {
                let mut map = Map::new();
                map.insert(ID_FIELD.to_string(), json!({ "$gt": null }));
                map.insert(TYPE_FIELD.to_string(), json!(doc_type));
                map.insert(field.clone(), value.clone());
                Value::Object(map)
            }
        }
    }

    /// Whether `doc` satisfies this selector. This is the reference semantics
    /// used by the in-memory service.
    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Self::Id(id) => doc.id() == Some(id.as_str()),
            Self::Type(doc_type) => doc.doc_type() == Some(doc_type.as_str()),
            Self::Field {
                doc_type,
                field,
                value,
            } => {
                doc.id().is_some()
                    && doc.doc_type() == Some(doc_type.as_str())
                    && doc.get(field) == Some(value)
            }
        }
    }
}
