/// Owned records
///
/// Every business collection (invoices, contacts, products, ...) holds
/// records tagged with the `user_id` of the actor that owns them. Generic
/// collections are handled as [`Document`]s, which keep every field they do
/// not know about untouched.
///
/// Data written by older clients is loose: ids may be numbers, and owner
/// references may be missing, empty, or point at actors that no longer
/// exist. Those records are *orphans* until reconciliation assigns them an
/// owner.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// A record with a single owner
pub trait OwnedRecord {
    /// Record identifier as stored
    fn record_id(&self) -> String;

    /// Owner reference as stored (may be dangling)
    fn owner_ref(&self) -> Option<String>;

    /// Points the record at a new owner
    fn set_owner(&mut self, owner: Uuid);

    /// The owner as an actor id, if it parses
    fn owner_id(&self) -> Option<Uuid> {
        self.owner_ref().and_then(|o| Uuid::parse_str(&o).ok())
    }
}

/// Generic owned record
///
/// `id` and `user_id` are the only fields the core interprets; everything
/// else is carried in `fields`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default = "new_record_id", deserialize_with = "lenient_id")]
    pub id: String,

    #[serde(default, deserialize_with = "lenient_owner")]
    pub user_id: Option<String>,

    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Document {
    /// Creates a document owned by `owner`
    ///
    /// `id` and `user_id` keys in `fields` are ignored.
    pub fn new(owner: Uuid, mut fields: Map<String, Value>) -> Self {
        fields.remove("id");
        fields.remove("user_id");
        Self {
            id: new_record_id(),
            user_id: Some(owner.to_string()),
            fields,
        }
    }
}

impl OwnedRecord for Document {
    fn record_id(&self) -> String {
        self.id.clone()
    }

    fn owner_ref(&self) -> Option<String> {
        self.user_id.clone()
    }

    fn set_owner(&mut self, owner: Uuid) {
        self.user_id = Some(owner.to_string());
    }
}

/// Generates a fresh record id
pub fn new_record_id() -> String {
    Uuid::new_v4().to_string()
}

/// Accepts string or numeric ids
///
/// Stored owned collections get stable ids on load; a fresh id here only
/// covers values decoded from elsewhere.
pub fn lenient_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) if !s.is_empty() => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        _ => Ok(new_record_id()),
    }
}

/// Accepts string, numeric, empty, or null owner references
pub fn lenient_owner<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) if !s.is_empty() => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Owner reference for typed records; anything that is not a UUID loads
/// as an orphan
pub fn lenient_owner_uuid<'de, D>(deserializer: D) -> Result<Option<Uuid>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_owner(deserializer)?.and_then(|s| Uuid::parse_str(&s).ok()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_document_keeps_unknown_fields() {
        let value = json!({"id": "d1", "user_id": "u1", "amount": 42, "tags": ["a"]});
        let doc: Document = serde_json::from_value(value.clone()).unwrap();
        assert_eq!(doc.id, "d1");
        assert_eq!(doc.user_id.as_deref(), Some("u1"));
        assert_eq!(doc.fields["amount"], 42);
        assert_eq!(serde_json::to_value(&doc).unwrap(), value);
    }

    #[test]
    fn test_document_accepts_loose_legacy_values() {
        let doc: Document = serde_json::from_value(json!({"id": 1700000000000u64, "user_id": ""})).unwrap();
        assert_eq!(doc.id, "1700000000000");
        assert!(doc.user_id.is_none());

        let doc: Document = serde_json::from_value(json!({"name": "no id"})).unwrap();
        assert!(!doc.id.is_empty());
        assert!(doc.user_id.is_none());
    }

    #[test]
    fn test_owner_id_parsing() {
        let owner = Uuid::new_v4();
        let mut doc = Document::new(owner, Map::new());
        assert_eq!(doc.owner_id(), Some(owner));

        doc.user_id = Some("legacy-42".to_string());
        assert_eq!(doc.owner_id(), None);
        assert_eq!(doc.owner_ref().as_deref(), Some("legacy-42"));
    }

    #[test]
    fn test_new_document_ignores_reserved_fields() {
        let owner = Uuid::new_v4();
        let mut fields = Map::new();
        fields.insert("id".into(), json!("forged"));
        fields.insert("user_id".into(), json!("someone-else"));
        fields.insert("name".into(), json!("Widget"));

        let doc = Document::new(owner, fields);
        assert_ne!(doc.id, "forged");
        assert_eq!(doc.owner_id(), Some(owner));
        assert_eq!(doc.fields.len(), 1);
    }
}
