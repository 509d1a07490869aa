//! Write-side options for `Actor::mutate`.

use crate::core::{KeystoneError, Property, Result, Value};
use crate::proto::{EntityState, IdLookup, Label, MutateFlag, MutateRequest, MutateResponse};
use crate::watcher::Watcher;

/// Adjusts a mutation. Options that force properties into the change set
/// override [`prepare_watcher`]; options that read the response override
/// [`observe_mutation`].
///
/// [`prepare_watcher`]: MutateOption::prepare_watcher
/// [`observe_mutation`]: MutateOption::observe_mutation
pub trait MutateOption: Send + Sync {
    fn apply(&self, request: &mut MutateRequest);

    /// Runs on the watcher before changes are computed.
    fn prepare_watcher(&self, _watcher: &mut Watcher) {}

    /// Runs after a successful response.
    fn observe_mutation(&self, _response: &MutateResponse) {}
}

#[derive(Debug, Clone, PartialEq)]
enum RequestOption {
    PiiToken(String),
    Flag(MutateFlag),
    State(EntityState),
    MatchUnique(IdLookup),
    Labels(Vec<Label>),
    Comment(String),
}

impl MutateOption for RequestOption {
    fn apply(&self, request: &mut MutateRequest) {
        match self {
            Self::PiiToken(token) => request.mutation.pii_token = token.clone(),
            Self::Flag(flag) => {
                if !request.flags.contains(flag) {
                    request.flags.push(*flag);
                }
            }
            Self::State(state) => request.mutation.state = *state,
            Self::MatchUnique(lookup) => request.match_unique = Some(lookup.clone()),
            Self::Labels(labels) => request.mutation.labels.extend(labels.iter().cloned()),
            Self::Comment(comment) => request.mutation.comment = comment.clone(),
        }
    }
}

/// Token identifying the personal-data subject of the written values.
pub fn with_pii_token(token: impl Into<String>) -> Box<dyn MutateOption> {
    Box::new(RequestOption::PiiToken(token.into()))
}

/// Lets the server update indexes after acknowledging the write.
pub fn background_index() -> Box<dyn MutateOption> {
    Box::new(RequestOption::Flag(MutateFlag::BackgroundIndex))
}

pub fn on_conflict_ignore() -> Box<dyn MutateOption> {
    Box::new(RequestOption::Flag(MutateFlag::OnConflictIgnore))
}

pub fn on_conflict_update() -> Box<dyn MutateOption> {
    Box::new(RequestOption::Flag(MutateFlag::OnConflictUpdate))
}

/// Moves the entity to `state`; `Invalid` and `Removed` are refused.
pub fn with_state(state: EntityState) -> Result<Box<dyn MutateOption>> {
    if !state.is_client_settable() {
        return Err(KeystoneError::InvalidState(format!("{:?}", state)));
    }
    Ok(Box::new(RequestOption::State(state)))
}

/// Upserts the entity whose unique `property` equals `value`.
pub fn match_unique(property: impl Into<String>, value: impl Into<Value>) -> Box<dyn MutateOption> {
    Box::new(RequestOption::MatchUnique(IdLookup {
        property: property.into(),
        value: value.into(),
    }))
}

pub fn with_labels(labels: impl IntoIterator<Item = Label>) -> Box<dyn MutateOption> {
    Box::new(RequestOption::Labels(labels.into_iter().collect()))
}

/// Audit comment; mandatory for schemas that require comments.
pub fn with_comment(comment: impl Into<String>) -> Box<dyn MutateOption> {
    Box::new(RequestOption::Comment(comment.into()))
}

/// Sends the current value of each named property even when unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutateProperties {
    properties: Vec<Property>,
}

impl MutateOption for MutateProperties {
    fn apply(&self, _request: &mut MutateRequest) {}

    fn prepare_watcher(&self, watcher: &mut Watcher) {
        for property in &self.properties {
            watcher.prune(property);
        }
    }
}

pub fn mutate_properties<S: AsRef<str>>(properties: impl IntoIterator<Item = S>) -> Box<dyn MutateOption> {
    Box::new(MutateProperties {
        properties: properties
            .into_iter()
            .map(|property| Property::parse(property.as_ref()))
            .collect(),
    })
}

/// Sends every property regardless of the watcher snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FullMutation;

impl MutateOption for FullMutation {
    fn apply(&self, _request: &mut MutateRequest) {}

    fn prepare_watcher(&self, watcher: &mut Watcher) {
        *watcher = Watcher::default();
    }
}

pub fn full_mutation() -> Box<dyn MutateOption> {
    Box::new(FullMutation)
}
