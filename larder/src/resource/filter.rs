//! List filter shared by every backend

use super::{fold, Resource};

/// Normalized `list` filter.
///
/// Blank values are dropped, and `tag`/`query` are stored case-folded so
/// backends can compare them directly. `public_only` is derived: it is set
/// when a free-text query runs without an owner, or when the caller forces it
/// with [`ListFilter::restrict_to_public`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListFilter {
    owner: Option<String>,
    tag: Option<String>,
    query: Option<String>,
    public_only: bool,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl ListFilter {
    pub fn new(owner: Option<String>, tag: Option<String>, query: Option<String>) -> Self {
        let owner = non_blank(owner);
        let tag = non_blank(tag).map(|t| fold(t.trim()));
        let query = non_blank(query).map(|q| fold(q.trim()));
        let public_only = owner.is_none() && query.is_some();
        Self {
            owner,
            tag,
            query,
            public_only,
        }
    }

    /// Filter that matches every record.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn public_only(&self) -> bool {
        self.public_only
    }

    /// Hide private records from an owner-less listing.
    pub fn restrict_to_public(mut self) -> Self {
        if self.owner.is_none() {
            self.public_only = true;
        }
        self
    }

    /// Same scope with the text condition removed. Used to re-check hits
    /// from an external index, whose matching is not substring based.
    pub fn without_query(&self) -> Self {
        Self {
            query: None,
            ..self.clone()
        }
    }

    /// Reference predicate. Backends that cannot push a clause down to the
    /// engine evaluate it with this.
    pub fn matches(&self, resource: &Resource) -> bool {
        if let Some(owner) = &self.owner {
            if resource.owner.as_deref() != Some(owner.as_str()) {
                return false;
            }
        }
        if self.public_only && !resource.public {
            return false;
        }
        if let Some(tag) = &self.tag {
            if !resource.has_tag(tag) {
                return false;
            }
        }
        if let Some(query) = &self.query {
            if !resource.search_text().contains(query.as_str()) {
                return false;
            }
        }
        true
    }
}

/// Order used by every backend for `list` output: oldest first, id as tiebreak.
pub(crate) fn sort_for_listing(resources: &mut [Resource]) {
    resources.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.id.cmp(&b.id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{now, NewResource};

    fn resource(name: &str, owner: Option<&str>, public: bool, tags: &[&str]) -> Resource {
        let mut new = NewResource::named(name);
        new.owner = owner.map(String::from);
        new.public = public;
        new.tags = tags.iter().map(|t| t.to_string()).collect();
        new.into_resource(now())
    }

    #[test]
    fn test_blank_values_are_absent() {
        let f = ListFilter::new(Some("".into()), Some("  ".into()), Some("\t".into()));
        assert_eq!(f, ListFilter::all());
        assert!(!f.public_only());
    }

    #[test]
    fn test_query_without_owner_is_public_only() {
        let f = ListFilter::new(None, None, Some("Water".into()));
        assert!(f.public_only());
        assert_eq!(f.query(), Some("water"));

        let f = ListFilter::new(Some("alice".into()), None, Some("Water".into()));
        assert!(!f.public_only());
    }

    #[test]
    fn test_tag_only_has_no_visibility_restriction() {
        let f = ListFilter::new(None, Some("water".into()), None);
        assert!(!f.public_only());
        assert!(f.matches(&resource("a", Some("bob"), false, &["Water"])));
    }

    #[test]
    fn test_owner_is_case_sensitive() {
        let f = ListFilter::new(Some("Alice".into()), None, None);
        assert!(!f.matches(&resource("a", Some("alice"), true, &[])));
        assert!(f.matches(&resource("a", Some("Alice"), false, &[])));
    }

    #[test]
    fn test_anonymous_query_hides_private() {
        let f = ListFilter::new(None, None, Some("shared".into()));
        assert!(f.matches(&resource("shared-public", Some("b"), true, &[])));
        assert!(!f.matches(&resource("shared-private", Some("a"), false, &[])));
    }

    #[test]
    fn test_owner_query_sees_own_private() {
        let f = ListFilter::new(Some("a".into()), None, Some("shared".into()));
        assert!(f.matches(&resource("shared-private", Some("a"), false, &[])));
        assert!(!f.matches(&resource("shared-public", Some("b"), true, &[])));
    }

    #[test]
    fn test_restrict_to_public_ignores_owner_scoped() {
        let f = ListFilter::new(Some("a".into()), None, None).restrict_to_public();
        assert!(!f.public_only());

        let f = ListFilter::all().restrict_to_public();
        assert!(f.public_only());
        assert!(!f.matches(&resource("x", None, false, &[])));
    }

    #[test]
    fn test_without_query_keeps_visibility() {
        let f = ListFilter::new(None, Some("tea".into()), Some("green".into())).without_query();
        assert_eq!(f.query(), None);
        assert!(f.public_only());
        assert!(f.matches(&resource("oolong", None, true, &["tea"])));
        assert!(!f.matches(&resource("oolong", None, false, &["tea"])));
    }

    #[test]
    fn test_sort_for_listing() {
        let mut a = resource("a", None, true, &[]);
        let mut b = resource("b", None, true, &[]);
        a.id = "res_b".into();
        b.id = "res_a".into();
        b.created_at = a.created_at;
        let mut items = vec![a.clone(), b.clone()];
        sort_for_listing(&mut items);
        assert_eq!(items[0].id, "res_a");
    }
}
