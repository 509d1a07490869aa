//! Query builders lowering into the wire filter messages.
//!
//! Every helper returns a [`FindOption`] (or `Option<FindOption>` when the
//! arguments may not describe a predicate at all); a [`FilterRequest`]
//! accumulates them. Options are plain values, so an option list applies the
//! same way regardless of who built it.

mod predicates;
mod query;
mod states;

pub use predicates::{
    and, contains, ends_with, eq, gt, gte, is_not_null, is_null, lt, lte, ne, not_contains, or,
    parse_operator, starts_with, where_between, where_in, where_not_in, where_op, OperatorToken,
};
pub use query::{
    limit, page, relation_of, relation_to, sibling_relation_of, sibling_relation_to, sort_by,
    sort_by_nulls_first, with_entity_ids, with_label, with_labels, with_object_paths, with_parent,
};
pub use states::{
    STATE_PROPERTY, all_states, include_archived, only_active, only_archived, with_state, with_states,
};

use crate::proto::{
    EntityView, FindRequest, GroupCountRequest, Label, Pagination, PropertyFilter, RelationFilter,
    SortKey,
};

/// One contribution to a [`FilterRequest`].
#[derive(Debug, Clone, PartialEq)]
pub enum FindOption {
    /// A leaf predicate or an AND / OR group.
    Predicate(PropertyFilter),
    Sort(SortKey),
    Labels(Vec<Label>),
    EntityIds(Vec<String>),
    Parent(String),
    Relation(RelationFilter),
    PerPage(i32),
    Page(i32),
    ObjectPaths(Vec<String>),
}

/// Accumulated query-side state: predicates, sort keys, labels, id and
/// relationship restrictions, parent, pagination and object paths.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterRequest {
    pub filters: Vec<PropertyFilter>,
    pub sort: Vec<SortKey>,
    pub labels: Vec<Label>,
    pub entity_ids: Vec<String>,
    pub relations: Vec<RelationFilter>,
    pub parent_id: String,
    pub page: Option<Pagination>,
    pub object_paths: Vec<String>,
}

impl FilterRequest {
    /// Applies every present option in order; `None` entries are skipped.
    pub fn new<I, O>(options: I) -> Self
    where
        I: IntoIterator<Item = O>,
        O: Into<Option<FindOption>>,
    {
        let mut request = Self::default();
        for option in options.into_iter().filter_map(Into::into) {
            request.apply(option);
        }
        request
    }

    pub fn apply(&mut self, option: FindOption) {
        match option {
            FindOption::Predicate(filter) => self.filters.push(filter),
            FindOption::Sort(key) => self.sort.push(key),
            FindOption::Labels(labels) => {
                for label in labels {
                    if !self.labels.contains(&label) {
                        self.labels.push(label);
                    }
                }
            }
            FindOption::EntityIds(ids) => {
                for id in ids {
                    if !self.entity_ids.contains(&id) {
                        self.entity_ids.push(id);
                    }
                }
            }
            FindOption::Parent(parent_id) => self.parent_id = parent_id,
            FindOption::Relation(relation) => self.relations.push(relation),
            FindOption::PerPage(per_page) => {
                self.page.get_or_insert_with(Pagination::default).per_page = per_page;
            }
            FindOption::Page(page) => {
                self.page.get_or_insert_with(Pagination::default).page = page;
            }
            FindOption::ObjectPaths(paths) => self.object_paths.extend(paths),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Moves the accumulated state into a find request.
    pub fn into_find_request(self, view: EntityView) -> FindRequest {
        FindRequest {
            filters: self.filters,
            sort: self.sort,
            labels: self.labels,
            entity_ids: self.entity_ids,
            relations: self.relations,
            parent_id: self.parent_id,
            page: self.page,
            object_paths: self.object_paths,
            view,
            ..FindRequest::default()
        }
    }

    /// Group counts only honour predicates and labels.
    pub fn into_group_count_request(self, properties: Vec<String>) -> GroupCountRequest {
        GroupCountRequest {
            filters: self.filters,
            labels: self.labels,
            properties,
            ..GroupCountRequest::default()
        }
    }
}
