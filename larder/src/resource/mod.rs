//! Resource record model
//!
//! A [`Resource`] is the unit of storage shared by every backend. Writes enter
//! as a validated [`NewResource`] or [`ResourcePatch`] (see [`validation`]);
//! reads are scoped by a [`ListFilter`].

mod filter;
pub mod validation;

pub use filter::ListFilter;
pub(crate) use filter::sort_for_listing;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Maximum number of tags on a single resource
pub const MAX_TAGS: usize = 10;

/// Maximum length of a single tag, in characters
pub const MAX_TAG_CHARS: usize = 32;

/// Prefix of server-generated ids
pub const ID_PREFIX: &str = "res_";

/// Default value of `type` when the caller leaves it out
pub const DEFAULT_KIND: &str = "generic";

/// A stored resource.
///
/// Field names serialize in camelCase; `kind` is exposed as `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub quantity: f64,
    pub description: Option<String>,
    pub tags: Vec<String>,
    /// First element of `tags`, kept so backends can index a single scalar.
    pub tag: Option<String>,
    pub owner: Option<String>,
    pub public: bool,
    pub metadata: Map<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A validated create payload.
#[derive(Debug, Clone, PartialEq)]
pub struct NewResource {
    pub id: Option<String>,
    pub name: String,
    pub kind: String,
    pub quantity: f64,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub owner: Option<String>,
    pub public: bool,
    pub metadata: Map<String, Value>,
}

/// A validated partial update. `None` leaves the stored value untouched;
/// for nullable fields `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourcePatch {
    pub name: Option<String>,
    pub kind: Option<String>,
    pub quantity: Option<f64>,
    pub description: Option<Option<String>>,
    pub tags: Option<Vec<String>>,
    pub owner: Option<Option<String>>,
    pub public: Option<bool>,
    pub metadata: Option<Map<String, Value>>,
}

/// Current time at millisecond precision, matching the stored timestamp format.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// Generate a fresh resource id (`res_<uuid>`).
pub fn generate_id() -> String {
    format!("{}{}", ID_PREFIX, uuid::Uuid::new_v4())
}

impl NewResource {
    /// Minimal payload with defaults for everything but the name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            kind: DEFAULT_KIND.to_string(),
            quantity: 0.0,
            description: None,
            tags: Vec::new(),
            owner: None,
            public: false,
            metadata: Map::new(),
        }
    }

    /// Materialize the record, assigning an id when the caller did not.
    pub fn into_resource(self, at: DateTime<Utc>) -> Resource {
        let tag = self.tags.first().cloned();
        Resource {
            id: self.id.unwrap_or_else(generate_id),
            name: self.name,
            kind: self.kind,
            quantity: self.quantity,
            description: self.description,
            tags: self.tags,
            tag,
            owner: self.owner,
            public: self.public,
            metadata: self.metadata,
            created_at: at,
            updated_at: at,
        }
    }
}

impl ResourcePatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl Resource {
    /// Merge a patch into this record and refresh `updated_at`.
    pub fn apply(&mut self, patch: ResourcePatch, at: DateTime<Utc>) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(kind) = patch.kind {
            self.kind = kind;
        }
        if let Some(quantity) = patch.quantity {
            self.quantity = quantity;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(tags) = patch.tags {
            self.set_tags(tags);
        }
        if let Some(owner) = patch.owner {
            self.owner = owner;
        }
        if let Some(public) = patch.public {
            self.public = public;
        }
        if let Some(metadata) = patch.metadata {
            self.metadata = metadata;
        }
        // Clock skew must not break updated_at >= created_at
        self.updated_at = at.max(self.created_at);
    }

    /// Replace the tag list and recompute the `tag` scalar.
    pub fn set_tags(&mut self, tags: Vec<String>) {
        self.tag = tags.first().cloned();
        self.tags = tags;
    }

    /// Case-insensitive match against the `tag` scalar or any entry of `tags`.
    /// `needle` must already be lowercased.
    pub fn has_tag(&self, needle: &str) -> bool {
        self.tag
            .iter()
            .chain(self.tags.iter())
            .any(|t| t.to_lowercase() == needle)
    }

    /// Canonical JSON text of the record. Every backend persists exactly
    /// this string, which is what free-text matching runs over.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Case-folded flattened text used for substring queries.
    pub fn search_text(&self) -> String {
        self.to_json().unwrap_or_default().to_lowercase()
    }
}

/// Case folding shared by every backend for tag and text comparison.
pub fn fold(s: &str) -> String {
    s.to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Resource {
        let mut new = NewResource::named("Water");
        new.tags = vec!["water".into(), "drink".into()];
        new.owner = Some("alice".into());
        new.into_resource(now())
    }

    #[test]
    fn test_generated_id_has_prefix() {
        let r = NewResource::named("x").into_resource(now());
        assert!(r.id.starts_with(ID_PREFIX));
        assert!(r.id.len() > ID_PREFIX.len());
    }

    #[test]
    fn test_caller_id_is_kept() {
        let mut new = NewResource::named("x");
        new.id = Some("custom-1".into());
        assert_eq!(new.into_resource(now()).id, "custom-1");
    }

    #[test]
    fn test_timestamps_equal_on_create() {
        let r = sample();
        assert_eq!(r.created_at, r.updated_at);
    }

    #[test]
    fn test_tag_tracks_first_tag() {
        let mut r = sample();
        assert_eq!(r.tag.as_deref(), Some("water"));

        r.set_tags(vec!["food".into()]);
        assert_eq!(r.tag.as_deref(), Some("food"));

        r.set_tags(Vec::new());
        assert!(r.tag.is_none());
    }

    #[test]
    fn test_apply_keeps_omitted_fields() {
        let mut r = sample();
        let before = r.clone();
        let patch = ResourcePatch {
            quantity: Some(7.0),
            ..Default::default()
        };
        r.apply(patch, now());

        assert_eq!(r.quantity, 7.0);
        assert_eq!(r.name, before.name);
        assert_eq!(r.tags, before.tags);
        assert_eq!(r.owner, before.owner);
        assert_eq!(r.created_at, before.created_at);
        assert!(r.updated_at >= r.created_at);
    }

    #[test]
    fn test_apply_clears_nullable_fields() {
        let mut r = sample();
        r.description = Some("old".into());
        let patch = ResourcePatch {
            description: Some(None),
            owner: Some(None),
            ..Default::default()
        };
        r.apply(patch, now());
        assert!(r.description.is_none());
        assert!(r.owner.is_none());
    }

    #[test]
    fn test_apply_never_moves_updated_before_created() {
        let mut r = sample();
        let earlier = r.created_at - chrono::Duration::seconds(30);
        r.apply(ResourcePatch::default(), earlier);
        assert_eq!(r.updated_at, r.created_at);
    }

    #[test]
    fn test_has_tag_is_case_insensitive() {
        let r = sample();
        assert!(r.has_tag("water"));
        assert!(r.has_tag(&fold("DRINK")));
        assert!(!r.has_tag("food"));
    }

    #[test]
    fn test_serialized_field_names() {
        let r = sample();
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["type"], json!("generic"));
        assert_eq!(v["tag"], json!("water"));
        assert_eq!(v["public"], json!(false));
        assert!(v["createdAt"].is_string());
        assert!(v["updatedAt"].is_string());
        assert!(v.get("kind").is_none());
    }

    #[test]
    fn test_search_text_covers_metadata() {
        let mut r = sample();
        r.metadata.insert("shelf".into(), json!("Basement-B"));
        assert!(r.search_text().contains("basement-b"));
    }
}
