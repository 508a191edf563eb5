//! Query packs, queue messages, and message validation.
//!
//! A query pack is a JSON document uploaded to the blob store:
//!
//! ```json
//! {"queries": {"q1": {"query": "foo", "category": "c", "notes": "", "snippet": "yes"}}}
//! ```
//!
//! The dispatcher forwards each `(id, definition)` pair verbatim; the worker
//! is the only place where a definition's shape is checked.

use pw3_search::ExportFormat;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field names a query definition must carry, and nothing else.
pub const REQUIRED_FIELDS: [&str; 4] = ["query", "category", "notes", "snippet"];

/// A parsed query pack.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPack {
    /// Storage key the pack was read from.
    pub name: String,
    /// Query id → raw definition, in document order.
    pub queries: Map<String, Value>,
}

#[derive(Deserialize)]
struct PackDocument {
    queries: Map<String, Value>,
}

impl QueryPack {
    /// Parse a pack document read from `name`.
    ///
    /// # Errors
    ///
    /// Fails if the body is not JSON or has no `queries` object.
    pub fn parse(name: impl Into<String>, body: &[u8]) -> serde_json::Result<Self> {
        let doc: PackDocument = serde_json::from_slice(body)?;
        Ok(Self {
            name: name.into(),
            queries: doc.queries,
        })
    }

    /// Number of queries in the pack.
    pub fn len(&self) -> usize {
        self.queries.len()
    }

    /// `true` when the pack has no queries.
    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    /// Queue messages for every query, in document order.
    pub fn messages(&self) -> impl Iterator<Item = QueueMessage> + '_ {
        self.queries.iter().map(|(id, definition)| QueueMessage {
            query_id: id.clone(),
            definition: definition.clone(),
        })
    }
}

/// A validated query definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryDefinition {
    /// Search string sent to the provider.
    pub query: String,
    /// Classification label copied onto results.
    pub category: String,
    /// Free text copied onto results.
    pub notes: String,
    /// `"yes"` (any case) requests snippets.
    pub snippet: String,
}

impl QueryDefinition {
    /// Export format selected by the snippet flag.
    pub fn export_format(&self) -> ExportFormat {
        ExportFormat::from_snippet_flag(&self.snippet)
    }
}

/// Wire form of one dispatched query: `[queryId, definition]`.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueMessage {
    /// Query identifier from the pack.
    pub query_id: String,
    /// Definition exactly as it appeared in the pack.
    pub definition: Value,
}

impl QueueMessage {
    /// Serialize as a two-element JSON array.
    pub fn to_body(&self) -> serde_json::Result<String> {
        serde_json::to_string(&(&self.query_id, &self.definition))
    }
}

/// A message that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedQuery {
    /// Query identifier.
    pub query_id: String,
    /// Checked definition.
    pub definition: QueryDefinition,
}

/// Why a dequeued message was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Body is not JSON.
    #[error("body is not valid JSON: {0}")]
    NotJson(String),
    /// Body is not a JSON array.
    #[error("expected a two-element array")]
    NotAnArray,
    /// Array does not have exactly two elements.
    #[error("expected 2 elements, found {0}")]
    WrongArity(usize),
    /// First element is not a string.
    #[error("query id must be a string")]
    BadQueryId,
    /// Second element is not a JSON object.
    #[error("definition must be an object")]
    DefinitionNotObject,
    /// Definition key set differs from the required fields.
    #[error("definition fields {found:?} do not match {expected:?}")]
    FieldMismatch {
        /// Keys present in the message, sorted.
        found: Vec<String>,
        /// Required keys, sorted.
        expected: Vec<String>,
    },
    /// A required field holds something other than a string.
    #[error("field `{0}` must be a string")]
    FieldNotString(String),
}

/// Validate a raw message body.
///
/// The body must be `[string, object]` and the object's key set must equal
/// [`REQUIRED_FIELDS`] exactly, each holding a string.
pub fn validate_message(body: &str) -> Result<ValidatedQuery, ValidationError> {
    let value: Value =
        serde_json::from_str(body).map_err(|e| ValidationError::NotJson(e.to_string()))?;
    validate_value(value)
}

/// Validate an already-decoded message.
pub fn validate_value(value: Value) -> Result<ValidatedQuery, ValidationError> {
    let Value::Array(items) = value else {
        return Err(ValidationError::NotAnArray);
    };
    let [id, definition]: [Value; 2] = items
        .try_into()
        .map_err(|items: Vec<Value>| ValidationError::WrongArity(items.len()))?;

    let Value::String(query_id) = id else {
        return Err(ValidationError::BadQueryId);
    };
    let Value::Object(fields) = definition else {
        return Err(ValidationError::DefinitionNotObject);
    };

    let mut found: Vec<String> = fields.keys().cloned().collect();
    found.sort();
    let mut expected: Vec<String> = REQUIRED_FIELDS.iter().map(|f| (*f).to_owned()).collect();
    expected.sort();
    if found != expected {
        return Err(ValidationError::FieldMismatch { found, expected });
    }

    let field = |name: &str| -> Result<String, ValidationError> {
        fields
            .get(name)
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| ValidationError::FieldNotString(name.to_owned()))
    };

    Ok(ValidatedQuery {
        query_id,
        definition: QueryDefinition {
            query: field("query")?,
            category: field("category")?,
            notes: field("notes")?,
            snippet: field("snippet")?,
        },
    })
}
