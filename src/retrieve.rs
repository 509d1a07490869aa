//! Read-side view options for `get` and `find`.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::proto::{
    DocumentRequest, EntityRequest, EntityResponse, EntityView, LockRequest, PropertyRequest,
    RelationshipRequest, VendorApp, VerifyRequest,
};

/// Shapes the view of a retrieval. Options that also change the enclosing
/// request (locks, verification probes) override [`apply_request`]; options
/// that read the response override [`observe_retrieve`].
///
/// [`apply_request`]: RetrieveOption::apply_request
/// [`observe_retrieve`]: RetrieveOption::observe_retrieve
pub trait RetrieveOption: Send + Sync {
    fn apply_view(&self, view: &mut EntityView);

    fn apply_request(&self, _request: &mut EntityRequest) {}

    fn observe_retrieve(&self, _response: &EntityResponse) {}
}

/// Builds a view from `options`.
pub fn build_view(options: &[Box<dyn RetrieveOption>]) -> EntityView {
    let mut view = EntityView::default();
    for option in options {
        option.apply_view(&mut view);
    }
    view
}

#[derive(Debug, Clone, PartialEq)]
enum ViewOption {
    Properties { properties: Vec<String>, decrypt: bool },
    Relationships { types: Vec<String>, source: Option<VendorApp> },
    Labels,
    Summary,
    ChildSummary,
    DescendantCount,
    RelationshipCount(Vec<String>),
    Document(DocumentRequest),
    Objects,
    ObjectPaths(Vec<String>),
}

impl RetrieveOption for ViewOption {
    fn apply_view(&self, view: &mut EntityView) {
        match self {
            Self::Properties { properties, decrypt } => view.properties.push(PropertyRequest {
                properties: properties.clone(),
                decrypt: *decrypt,
                schema: None,
            }),
            Self::Relationships { types, source } => {
                view.relationships
                    .extend(types.iter().map(|relationship_type| RelationshipRequest {
                        relationship_type: relationship_type.clone(),
                        source: source.clone(),
                    }))
            }
            Self::Labels => view.labels = true,
            Self::Summary => view.summary = true,
            Self::ChildSummary => view.child_summary = true,
            Self::DescendantCount => view.descendant_count = true,
            Self::RelationshipCount(types) => {
                view.relationship_count = true;
                for relationship_type in types {
                    if !view.relationship_count_types.contains(relationship_type) {
                        view.relationship_count_types.push(relationship_type.clone());
                    }
                }
            }
            Self::Document(request) => view.documents.push(request.clone()),
            Self::Objects => view.objects = true,
            Self::ObjectPaths(paths) => {
                view.objects = true;
                view.object_paths.extend(paths.iter().cloned());
            }
        }
    }
}

fn strings<S: Into<String>>(values: impl IntoIterator<Item = S>) -> Vec<String> {
    values.into_iter().map(Into::into).collect()
}

/// Hydrates only `properties`; masked values stay masked.
pub fn with_properties<S: Into<String>>(properties: impl IntoIterator<Item = S>) -> Box<dyn RetrieveOption> {
    Box::new(ViewOption::Properties {
        properties: strings(properties),
        decrypt: false,
    })
}

/// Hydrates `properties` with secure values decrypted.
pub fn with_decrypted_properties<S: Into<String>>(
    properties: impl IntoIterator<Item = S>,
) -> Box<dyn RetrieveOption> {
    Box::new(ViewOption::Properties {
        properties: strings(properties),
        decrypt: true,
    })
}

pub fn with_relationships<S: Into<String>>(types: impl IntoIterator<Item = S>) -> Box<dyn RetrieveOption> {
    Box::new(ViewOption::Relationships {
        types: strings(types),
        source: None,
    })
}

/// Relationships of `types` owned by another vendor application.
pub fn with_foreign_relationships<S: Into<String>>(
    vendor_id: impl Into<String>,
    app_id: impl Into<String>,
    types: impl IntoIterator<Item = S>,
) -> Box<dyn RetrieveOption> {
    Box::new(ViewOption::Relationships {
        types: strings(types),
        source: Some(VendorApp::new(vendor_id, app_id)),
    })
}

pub fn with_labels() -> Box<dyn RetrieveOption> {
    Box::new(ViewOption::Labels)
}

pub fn with_summary() -> Box<dyn RetrieveOption> {
    Box::new(ViewOption::Summary)
}

pub fn with_child_summary() -> Box<dyn RetrieveOption> {
    Box::new(ViewOption::ChildSummary)
}

pub fn with_descendant_count() -> Box<dyn RetrieveOption> {
    Box::new(ViewOption::DescendantCount)
}

/// Relationship counts; with no types the server returns the total only.
pub fn with_relationship_count<S: Into<String>>(types: impl IntoIterator<Item = S>) -> Box<dyn RetrieveOption> {
    Box::new(ViewOption::RelationshipCount(strings(types)))
}

pub fn with_latest_document(name: impl Into<String>) -> Box<dyn RetrieveOption> {
    Box::new(ViewOption::Document(DocumentRequest {
        name: name.into(),
        latest: true,
        ..DocumentRequest::default()
    }))
}

pub fn with_document_revision(name: impl Into<String>, revision: impl Into<String>) -> Box<dyn RetrieveOption> {
    Box::new(ViewOption::Document(DocumentRequest {
        name: name.into(),
        revision: revision.into(),
        ..DocumentRequest::default()
    }))
}

/// Lists the revisions of a document without their content.
pub fn with_document_revisions(name: impl Into<String>) -> Box<dyn RetrieveOption> {
    Box::new(ViewOption::Document(DocumentRequest {
        name: name.into(),
        list_revisions: true,
        ..DocumentRequest::default()
    }))
}

pub fn with_objects() -> Box<dyn RetrieveOption> {
    Box::new(ViewOption::Objects)
}

pub fn with_object_paths<S: Into<String>>(paths: impl IntoIterator<Item = S>) -> Box<dyn RetrieveOption> {
    Box::new(ViewOption::ObjectPaths(strings(paths)))
}

/// Acquires a lock on the entity for `duration` as part of the read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithLock {
    duration: Duration,
    message: String,
}

impl RetrieveOption for WithLock {
    fn apply_view(&self, _view: &mut EntityView) {}

    fn apply_request(&self, request: &mut EntityRequest) {
        request.lock = Some(LockRequest {
            duration_seconds: i64::try_from(self.duration.as_secs()).unwrap_or(i64::MAX),
            message: self.message.clone(),
        });
    }
}

pub fn with_lock(duration: Duration, message: impl Into<String>) -> Box<dyn RetrieveOption> {
    Box::new(WithLock {
        duration,
        message: message.into(),
    })
}

/// Asks the server whether `property` matches a candidate value. Clone the
/// probe before boxing it to read the outcome after the call.
#[derive(Debug, Clone)]
pub struct VerifyProperty {
    property: String,
    value: String,
    outcome: Arc<Mutex<Option<bool>>>,
}

impl VerifyProperty {
    pub fn new(property: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            value: value.into(),
            outcome: Arc::new(Mutex::new(None)),
        }
    }

    /// `None` until a response mentioning the property was observed.
    pub fn matched(&self) -> Option<bool> {
        *self.outcome.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn boxed(&self) -> Box<dyn RetrieveOption> {
        Box::new(self.clone())
    }
}

impl RetrieveOption for VerifyProperty {
    fn apply_view(&self, _view: &mut EntityView) {}

    fn apply_request(&self, request: &mut EntityRequest) {
        request.verify.push(VerifyRequest {
            property: self.property.clone(),
            value: self.value.clone(),
        });
    }

    fn observe_retrieve(&self, response: &EntityResponse) {
        if let Some(result) = response
            .verified
            .iter()
            .find(|result| result.property == self.property)
        {
            *self.outcome.lock().unwrap_or_else(PoisonError::into_inner) = Some(result.matched);
        }
    }
}

pub fn verify_property(property: impl Into<String>, value: impl Into<String>) -> VerifyProperty {
    VerifyProperty::new(property, value)
}
