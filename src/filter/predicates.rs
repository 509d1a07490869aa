use std::collections::HashMap;

use lazy_static::lazy_static;

use super::{FilterRequest, FindOption};
use crate::core::Value;
use crate::proto::{Operator, PropertyFilter};

/// What a free-form operator token lowers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorToken {
    Compare(Operator),
    /// Lowered to a single `NotEqual` predicate carrying every value.
    NotIn,
}

lazy_static! {
    static ref OPERATOR_TOKENS: HashMap<&'static str, OperatorToken> = {
        use OperatorToken::*;
        let mut tokens = HashMap::new();
        for token in ["eq", "=", "=="] {
            tokens.insert(token, Compare(Operator::Equal));
        }
        for token in ["ne", "neq", "!=", "<>"] {
            tokens.insert(token, Compare(Operator::NotEqual));
        }
        for token in ["gt", ">"] {
            tokens.insert(token, Compare(Operator::GreaterThan));
        }
        for token in ["gte", ">="] {
            tokens.insert(token, Compare(Operator::GreaterThanOrEqual));
        }
        for token in ["lt", "<"] {
            tokens.insert(token, Compare(Operator::LessThan));
        }
        for token in ["lte", "<="] {
            tokens.insert(token, Compare(Operator::LessThanOrEqual));
        }
        for token in ["c", "contains"] {
            tokens.insert(token, Compare(Operator::Contains));
        }
        for token in ["nc", "notcontains"] {
            tokens.insert(token, Compare(Operator::NotContains));
        }
        for token in ["sw", "startswith"] {
            tokens.insert(token, Compare(Operator::StartsWith));
        }
        for token in ["ew", "endswith"] {
            tokens.insert(token, Compare(Operator::EndsWith));
        }
        tokens.insert("in", Compare(Operator::In));
        tokens.insert("notin", NotIn);
        for token in ["btw", "between", "><"] {
            tokens.insert(token, Compare(Operator::Between));
        }
        for token in ["null", "isnull"] {
            tokens.insert(token, Compare(Operator::IsNull));
        }
        for token in ["notnull", "isnotnull"] {
            tokens.insert(token, Compare(Operator::IsNotNull));
        }
        tokens
    };
}

/// Resolves a short operator token such as `gte` or `><`.
pub fn parse_operator(token: &str) -> Option<OperatorToken> {
    OPERATOR_TOKENS
        .get(token.trim().to_ascii_lowercase().as_str())
        .copied()
}

fn leaf(property: impl Into<String>, operator: Operator, values: Vec<Value>) -> FindOption {
    FindOption::Predicate(PropertyFilter {
        property: property.into(),
        operator,
        values,
        ..PropertyFilter::default()
    })
}

pub fn eq(property: impl Into<String>, value: impl Into<Value>) -> FindOption {
    leaf(property, Operator::Equal, vec![value.into()])
}

pub fn ne(property: impl Into<String>, value: impl Into<Value>) -> FindOption {
    leaf(property, Operator::NotEqual, vec![value.into()])
}

pub fn gt(property: impl Into<String>, value: impl Into<Value>) -> FindOption {
    leaf(property, Operator::GreaterThan, vec![value.into()])
}

pub fn gte(property: impl Into<String>, value: impl Into<Value>) -> FindOption {
    leaf(property, Operator::GreaterThanOrEqual, vec![value.into()])
}

pub fn lt(property: impl Into<String>, value: impl Into<Value>) -> FindOption {
    leaf(property, Operator::LessThan, vec![value.into()])
}

pub fn lte(property: impl Into<String>, value: impl Into<Value>) -> FindOption {
    leaf(property, Operator::LessThanOrEqual, vec![value.into()])
}

pub fn contains(property: impl Into<String>, value: impl Into<Value>) -> FindOption {
    leaf(property, Operator::Contains, vec![value.into()])
}

pub fn not_contains(property: impl Into<String>, value: impl Into<Value>) -> FindOption {
    leaf(property, Operator::NotContains, vec![value.into()])
}

pub fn starts_with(property: impl Into<String>, value: impl Into<Value>) -> FindOption {
    leaf(property, Operator::StartsWith, vec![value.into()])
}

pub fn ends_with(property: impl Into<String>, value: impl Into<Value>) -> FindOption {
    leaf(property, Operator::EndsWith, vec![value.into()])
}

pub fn where_in<V: Into<Value>>(
    property: impl Into<String>,
    values: impl IntoIterator<Item = V>,
) -> FindOption {
    leaf(property, Operator::In, values.into_iter().map(Into::into).collect())
}

/// A single `NotEqual` predicate carrying all of `values`.
pub fn where_not_in<V: Into<Value>>(
    property: impl Into<String>,
    values: impl IntoIterator<Item = V>,
) -> FindOption {
    leaf(property, Operator::NotEqual, values.into_iter().map(Into::into).collect())
}

/// `None` unless both bounds are present.
pub fn where_between<V: Into<Value>>(
    property: impl Into<String>,
    low: Option<V>,
    high: Option<V>,
) -> Option<FindOption> {
    match (low, high) {
        (Some(low), Some(high)) => Some(leaf(
            property,
            Operator::Between,
            vec![low.into(), high.into()],
        )),
        _ => None,
    }
}

pub fn is_null(property: impl Into<String>) -> FindOption {
    leaf(property, Operator::IsNull, Vec::new())
}

pub fn is_not_null(property: impl Into<String>) -> FindOption {
    leaf(property, Operator::IsNotNull, Vec::new())
}

/// Free-form predicate: `where_op("age", "gte", [18])`.
///
/// Unknown operator tokens, and `between` without exactly two values, yield
/// `None`.
pub fn where_op<V: Into<Value>>(
    property: impl Into<String>,
    operator: &str,
    values: impl IntoIterator<Item = V>,
) -> Option<FindOption> {
    let values: Vec<Value> = values.into_iter().map(Into::into).collect();
    match parse_operator(operator)? {
        OperatorToken::NotIn => Some(leaf(property, Operator::NotEqual, values)),
        OperatorToken::Compare(Operator::Between) if values.len() != 2 => None,
        OperatorToken::Compare(operator @ (Operator::IsNull | Operator::IsNotNull)) => {
            Some(leaf(property, operator, Vec::new()))
        }
        OperatorToken::Compare(operator) => Some(leaf(property, operator, values)),
    }
}

fn group<I, O>(options: I, or: bool) -> FindOption
where
    I: IntoIterator<Item = O>,
    O: Into<Option<FindOption>>,
{
    FindOption::Predicate(PropertyFilter {
        nested: FilterRequest::new(options).filters,
        or,
        ..PropertyFilter::default()
    })
}

/// One nested predicate requiring every sub-predicate. Non-predicate options
/// passed here are ignored.
pub fn and<I, O>(options: I) -> FindOption
where
    I: IntoIterator<Item = O>,
    O: Into<Option<FindOption>>,
{
    group(options, false)
}

/// One nested predicate requiring any sub-predicate.
pub fn or<I, O>(options: I) -> FindOption
where
    I: IntoIterator<Item = O>,
    O: Into<Option<FindOption>>,
{
    group(options, true)
}
