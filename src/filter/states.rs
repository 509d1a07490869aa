use super::FindOption;
use crate::core::{KeystoneError, Result, Value};
use crate::proto::{EntityState, Operator, PropertyFilter};

/// Reserved property the server reads entity state filters from. Record
/// types may not map a field to it.
pub const STATE_PROPERTY: &str = "_state";

fn state_filter(states: &[EntityState]) -> FindOption {
    FindOption::Predicate(PropertyFilter {
        property: STATE_PROPERTY.to_string(),
        operator: Operator::In,
        values: states.iter().map(|state| Value::int(state.as_i64())).collect(),
        ..PropertyFilter::default()
    })
}

/// Restricts results to `states`. An empty list yields `None` (server
/// default: active only); `Invalid` and `Removed` are refused.
pub fn with_states(states: &[EntityState]) -> Result<Option<FindOption>> {
    if let Some(state) = states.iter().find(|state| !state.is_client_settable()) {
        return Err(KeystoneError::InvalidState(format!(
            "{:?} cannot be used as a filter",
            state
        )));
    }
    if states.is_empty() {
        return Ok(None);
    }
    Ok(Some(state_filter(states)))
}

pub fn with_state(state: EntityState) -> Result<FindOption> {
    if !state.is_client_settable() {
        return Err(KeystoneError::InvalidState(format!(
            "{:?} cannot be used as a filter",
            state
        )));
    }
    Ok(state_filter(&[state]))
}

pub fn only_active() -> FindOption {
    state_filter(&[EntityState::Active])
}

pub fn only_archived() -> FindOption {
    state_filter(&[EntityState::Archived])
}

pub fn include_archived() -> FindOption {
    state_filter(&[EntityState::Active, EntityState::Archived])
}

pub fn all_states() -> FindOption {
    state_filter(&[
        EntityState::Active,
        EntityState::Offline,
        EntityState::Corrupt,
        EntityState::Archived,
    ])
}
