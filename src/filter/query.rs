use super::FindOption;
use crate::proto::{Label, RelationDirection, RelationFilter, SortKey, VendorApp};

pub fn sort_by(property: impl Into<String>, descending: bool) -> FindOption {
    FindOption::Sort(SortKey {
        property: property.into(),
        descending,
        nulls_first: false,
    })
}

pub fn sort_by_nulls_first(property: impl Into<String>, descending: bool) -> FindOption {
    FindOption::Sort(SortKey {
        property: property.into(),
        descending,
        nulls_first: true,
    })
}

pub fn with_label(name: impl Into<String>, value: impl Into<String>) -> FindOption {
    FindOption::Labels(vec![Label::new(name, value)])
}

pub fn with_labels(labels: impl IntoIterator<Item = Label>) -> FindOption {
    FindOption::Labels(labels.into_iter().collect())
}

pub fn with_entity_ids<S: Into<String>>(ids: impl IntoIterator<Item = S>) -> FindOption {
    FindOption::EntityIds(ids.into_iter().map(Into::into).collect())
}

/// Children of `parent_id` only.
pub fn with_parent(parent_id: impl Into<String>) -> FindOption {
    FindOption::Parent(parent_id.into())
}

pub fn limit(per_page: i32) -> FindOption {
    FindOption::PerPage(per_page)
}

pub fn page(page: i32) -> FindOption {
    FindOption::Page(page)
}

pub fn with_object_paths<S: Into<String>>(paths: impl IntoIterator<Item = S>) -> FindOption {
    FindOption::ObjectPaths(paths.into_iter().map(Into::into).collect())
}

fn relation(
    entity_id: impl Into<String>,
    relationship_type: impl Into<String>,
    source: VendorApp,
    direction: RelationDirection,
) -> FindOption {
    FindOption::Relation(RelationFilter {
        entity_id: entity_id.into(),
        relationship_type: relationship_type.into(),
        source,
        direction,
    })
}

/// Entities related to `source_id` through a relationship owned by
/// `vendor`/`app`.
pub fn relation_of(
    source_id: impl Into<String>,
    relationship_type: impl Into<String>,
    vendor_id: impl Into<String>,
    app_id: impl Into<String>,
) -> FindOption {
    relation(
        source_id,
        relationship_type,
        VendorApp::new(vendor_id, app_id),
        RelationDirection::Of,
    )
}

/// Entities pointing at `target_id`.
pub fn relation_to(
    target_id: impl Into<String>,
    relationship_type: impl Into<String>,
    vendor_id: impl Into<String>,
    app_id: impl Into<String>,
) -> FindOption {
    relation(
        target_id,
        relationship_type,
        VendorApp::new(vendor_id, app_id),
        RelationDirection::To,
    )
}

/// [`relation_of`] for relationships owned by the calling app.
pub fn sibling_relation_of(
    source_id: impl Into<String>,
    relationship_type: impl Into<String>,
) -> FindOption {
    relation(source_id, relationship_type, VendorApp::default(), RelationDirection::Of)
}

pub fn sibling_relation_to(
    target_id: impl Into<String>,
    relationship_type: impl Into<String>,
) -> FindOption {
    relation(target_id, relationship_type, VendorApp::default(), RelationDirection::To)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterRequest;

    #[test]
    fn sibling_relations_leave_source_empty() {
        let request = FilterRequest::new([
            sibling_relation_of("e1", "owns"),
            relation_to("e2", "member", "acme", "crm"),
        ]);
        assert!(request.relations[0].source.is_empty());
        assert_eq!(request.relations[0].direction, RelationDirection::Of);
        assert_eq!(request.relations[1].source, VendorApp::new("acme", "crm"));
        assert_eq!(request.relations[1].direction, RelationDirection::To);
    }

    #[test]
    fn sort_keys_keep_order() {
        let request = FilterRequest::new([sort_by("name", false), sort_by_nulls_first("score", true)]);
        assert_eq!(request.sort.len(), 2);
        assert!(request.sort[1].descending && request.sort[1].nulls_first);
        let request = FilterRequest::new([with_parent("p1"), with_object_paths(["a/b"])]);
        assert_eq!(request.parent_id, "p1");
        assert_eq!(request.object_paths, vec!["a/b"]);
    }
}
