//! Payload validation
//!
//! Request bodies arrive as loose JSON. These parsers check every field's
//! shape before anything reaches a backend, so a rejected write never touches
//! storage.

use serde_json::{Map, Value};

use super::{NewResource, ResourcePatch, DEFAULT_KIND, MAX_TAGS, MAX_TAG_CHARS};
use crate::error::InputError;

type Fields = Map<String, Value>;

impl NewResource {
    /// Validate a create payload.
    pub fn from_json(body: &Value) -> Result<Self, InputError> {
        let fields = body.as_object().ok_or(InputError::InvalidBody)?;

        let name = match fields.get("name") {
            Some(value) => parse_name(value)?,
            None => return Err(InputError::MissingName),
        };

        Ok(Self {
            id: parse_id(fields)?,
            name,
            kind: opt(fields, "type", parse_kind)?.unwrap_or_else(|| DEFAULT_KIND.to_string()),
            quantity: fields.get("quantity").map(coerce_quantity).unwrap_or(0.0),
            description: opt(fields, "description", parse_description)?.flatten(),
            tags: opt(fields, "tags", parse_tags)?.unwrap_or_default(),
            owner: opt(fields, "owner", parse_owner)?.flatten(),
            public: opt(fields, "public", parse_public)?.unwrap_or(false),
            metadata: opt(fields, "metadata", parse_metadata)?.unwrap_or_default(),
        })
    }
}

impl ResourcePatch {
    /// Validate an update payload. Only fields present in `body` are checked
    /// and carried; server-managed fields (`id`, `tag`, timestamps) are ignored.
    pub fn from_json(body: &Value) -> Result<Self, InputError> {
        let fields = body.as_object().ok_or(InputError::InvalidBody)?;

        Ok(Self {
            name: opt(fields, "name", parse_name)?,
            kind: opt(fields, "type", parse_kind)?,
            quantity: fields.get("quantity").map(coerce_quantity),
            description: opt(fields, "description", parse_description)?,
            tags: opt(fields, "tags", parse_tags)?,
            owner: opt(fields, "owner", parse_owner)?,
            public: opt(fields, "public", parse_public)?,
            metadata: opt(fields, "metadata", parse_metadata)?,
        })
    }
}

fn opt<T>(
    fields: &Fields,
    key: &str,
    parse: fn(&Value) -> Result<T, InputError>,
) -> Result<Option<T>, InputError> {
    fields.get(key).map(parse).transpose()
}

fn parse_id(fields: &Fields) -> Result<Option<String>, InputError> {
    match fields.get("id") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(Some(s.clone())),
        Some(_) => Err(InputError::InvalidId),
    }
}

fn parse_name(value: &Value) -> Result<String, InputError> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Ok(s.clone()),
        _ => Err(InputError::MissingName),
    }
}

fn parse_kind(value: &Value) -> Result<String, InputError> {
    match value {
        Value::String(s) if s.trim().is_empty() => Ok(DEFAULT_KIND.to_string()),
        Value::String(s) => Ok(s.clone()),
        Value::Null => Ok(DEFAULT_KIND.to_string()),
        _ => Err(InputError::InvalidType),
    }
}

fn parse_description(value: &Value) -> Result<Option<String>, InputError> {
    match value {
        Value::String(s) => Ok(Some(s.clone())),
        Value::Null => Ok(None),
        _ => Err(InputError::InvalidDescription),
    }
}

fn parse_owner(value: &Value) -> Result<Option<String>, InputError> {
    match value {
        Value::String(s) if s.is_empty() => Ok(None),
        Value::String(s) => Ok(Some(s.clone())),
        Value::Null => Ok(None),
        _ => Err(InputError::InvalidOwner),
    }
}

fn parse_public(value: &Value) -> Result<bool, InputError> {
    value.as_bool().ok_or(InputError::InvalidPublic)
}

fn parse_metadata(value: &Value) -> Result<Map<String, Value>, InputError> {
    match value {
        Value::Object(map) => Ok(map.clone()),
        Value::Null => Ok(Map::new()),
        _ => Err(InputError::InvalidMetadata),
    }
}

/// Tags must all be valid or the whole write is rejected. Entries are stored
/// trimmed.
fn parse_tags(value: &Value) -> Result<Vec<String>, InputError> {
    let items = value.as_array().ok_or(InputError::InvalidTags)?;
    if items.len() > MAX_TAGS {
        return Err(InputError::InvalidTags);
    }
    items
        .iter()
        .map(|item| {
            let tag = item.as_str().map(str::trim).ok_or(InputError::InvalidTags)?;
            if tag.is_empty() || tag.chars().count() > MAX_TAG_CHARS {
                return Err(InputError::InvalidTags);
            }
            Ok(tag.to_string())
        })
        .collect()
}

/// Numbers and numeric strings are accepted; anything else, negative or
/// non-finite, becomes 0.
fn coerce_quantity(value: &Value) -> f64 {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match n {
        Some(n) if n.is_finite() && n > 0.0 => n,
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_create_defaults() {
        let new = NewResource::from_json(&json!({ "name": "Rice" })).unwrap();
        assert_eq!(new.name, "Rice");
        assert_eq!(new.kind, "generic");
        assert_eq!(new.quantity, 0.0);
        assert!(new.id.is_none());
        assert!(new.description.is_none());
        assert!(new.tags.is_empty());
        assert!(new.owner.is_none());
        assert!(!new.public);
        assert!(new.metadata.is_empty());
    }

    #[test]
    fn test_create_requires_name() {
        for body in [
            json!({}),
            json!({ "name": "" }),
            json!({ "name": "   " }),
            json!({ "name": 12 }),
            json!({ "name": null }),
        ] {
            assert_eq!(
                NewResource::from_json(&body).unwrap_err(),
                InputError::MissingName,
                "body: {}",
                body
            );
        }
    }

    #[test]
    fn test_non_object_body() {
        assert_eq!(
            NewResource::from_json(&json!(["name"])).unwrap_err(),
            InputError::InvalidBody
        );
        assert_eq!(
            ResourcePatch::from_json(&json!("x")).unwrap_err(),
            InputError::InvalidBody
        );
    }

    #[test]
    fn test_description_must_be_string() {
        let err = NewResource::from_json(&json!({ "name": "a", "description": 5 })).unwrap_err();
        assert_eq!(err, InputError::InvalidDescription);

        let ok = NewResource::from_json(&json!({ "name": "a", "description": null })).unwrap();
        assert!(ok.description.is_none());
    }

    #[test]
    fn test_public_must_be_bool() {
        let err = NewResource::from_json(&json!({ "name": "a", "public": "yes" })).unwrap_err();
        assert_eq!(err, InputError::InvalidPublic);

        let err = ResourcePatch::from_json(&json!({ "public": 1 })).unwrap_err();
        assert_eq!(err, InputError::InvalidPublic);
    }

    #[test]
    fn test_tags_validation() {
        let ok = NewResource::from_json(&json!({ "name": "a", "tags": [" water ", "food"] })).unwrap();
        assert_eq!(ok.tags, vec!["water", "food"]);

        let too_long = "x".repeat(MAX_TAG_CHARS + 1);
        let exactly = "y".repeat(MAX_TAG_CHARS);
        let too_many: Vec<String> = (0..=MAX_TAGS).map(|i| format!("t{}", i)).collect();

        for tags in [
            json!("water"),
            json!(["ok", ""]),
            json!(["ok", "   "]),
            json!(["ok", 3]),
            json!([too_long]),
            json!(too_many),
            json!(null),
        ] {
            let err = NewResource::from_json(&json!({ "name": "a", "tags": tags })).unwrap_err();
            assert_eq!(err, InputError::InvalidTags);
        }

        let ok = NewResource::from_json(&json!({ "name": "a", "tags": [exactly] })).unwrap();
        assert_eq!(ok.tags.len(), 1);
    }

    #[test]
    fn test_quantity_coercion() {
        let q = |v: Value| NewResource::from_json(&json!({ "name": "a", "quantity": v })).unwrap().quantity;
        assert_eq!(q(json!(4)), 4.0);
        assert_eq!(q(json!(2.5)), 2.5);
        assert_eq!(q(json!("12")), 12.0);
        assert_eq!(q(json!("many")), 0.0);
        assert_eq!(q(json!(-3)), 0.0);
        assert_eq!(q(json!(null)), 0.0);
        assert_eq!(q(json!(true)), 0.0);
    }

    #[test]
    fn test_other_field_shapes() {
        let cases = [
            (json!({ "name": "a", "id": 7 }), InputError::InvalidId),
            (json!({ "name": "a", "id": "" }), InputError::InvalidId),
            (json!({ "name": "a", "type": 1 }), InputError::InvalidType),
            (json!({ "name": "a", "owner": 1 }), InputError::InvalidOwner),
            (json!({ "name": "a", "metadata": [1] }), InputError::InvalidMetadata),
        ];
        for (body, expected) in cases {
            assert_eq!(NewResource::from_json(&body).unwrap_err(), expected);
        }
    }

    #[test]
    fn test_empty_owner_is_ownerless() {
        let new = NewResource::from_json(&json!({ "name": "a", "owner": "" })).unwrap();
        assert!(new.owner.is_none());
    }

    #[test]
    fn test_patch_only_carries_present_fields() {
        let patch = ResourcePatch::from_json(&json!({ "public": true })).unwrap();
        assert_eq!(patch.public, Some(true));
        assert!(patch.name.is_none());
        assert!(patch.tags.is_none());
        assert!(patch.description.is_none());

        assert!(ResourcePatch::from_json(&json!({})).unwrap().is_empty());
    }

    #[test]
    fn test_patch_ignores_server_managed_fields() {
        let patch = ResourcePatch::from_json(&json!({
            "id": "other",
            "tag": "x",
            "createdAt": "2020-01-01T00:00:00Z",
        }))
        .unwrap();
        assert!(patch.is_empty());
    }

    #[test]
    fn test_patch_rejects_empty_name() {
        assert_eq!(
            ResourcePatch::from_json(&json!({ "name": "" })).unwrap_err(),
            InputError::MissingName
        );
    }

    #[test]
    fn test_patch_null_description_clears() {
        let patch = ResourcePatch::from_json(&json!({ "description": null })).unwrap();
        assert_eq!(patch.description, Some(None));
    }
}
