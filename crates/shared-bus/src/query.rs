//! # Subscription Queries
//!
//! A minimal filter language over flattened event attribute maps:
//!
//! ```text
//! tm.event='Tx' AND message.module='evm'
//! tm.event='NewBlock' AND fee_market.base_fee EXISTS
//! ```
//!
//! A query is a conjunction of conditions. `key='value'` holds when any value
//! recorded under `key` equals `value`; `key EXISTS` holds when `key` is
//! present at all.

use crate::events::EVENT_TYPE_KEY;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const AND: &str = " AND ";
const EXISTS: &str = " EXISTS";

/// Errors from parsing a query string.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("empty query")]
    Empty,

    #[error("invalid condition: {0}")]
    InvalidCondition(String),

    #[error("unterminated quote in: {0}")]
    UnterminatedQuote(String),
}

/// One clause of a query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Condition {
    Equals { key: String, value: String },
    Exists { key: String },
}

impl Condition {
    /// Attribute key the condition inspects.
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::Equals { key, .. } | Self::Exists { key } => key,
        }
    }

    fn matches(&self, events: &BTreeMap<String, Vec<String>>) -> bool {
        match self {
            Self::Equals { key, value } => events
                .get(key)
                .is_some_and(|values| values.iter().any(|v| v == value)),
            Self::Exists { key } => events.contains_key(key),
        }
    }

    fn parse(clause: &str) -> Result<Self, QueryError> {
        let clause = clause.trim();
        if let Some(key) = clause.strip_suffix(EXISTS) {
            let key = key.trim();
            if !is_valid_key(key) {
                return Err(QueryError::InvalidCondition(clause.to_string()));
            }
            return Ok(Self::Exists {
                key: key.to_string(),
            });
        }

        let (key, value) = clause
            .split_once('=')
            .ok_or_else(|| QueryError::InvalidCondition(clause.to_string()))?;
        let key = key.trim();
        let value = value.trim();
        if !is_valid_key(key) {
            return Err(QueryError::InvalidCondition(clause.to_string()));
        }

        let inner = value
            .strip_prefix('\'')
            .ok_or_else(|| QueryError::InvalidCondition(clause.to_string()))?;
        let inner = inner
            .strip_suffix('\'')
            .ok_or_else(|| QueryError::UnterminatedQuote(clause.to_string()))?;
        if inner.contains('\'') {
            return Err(QueryError::InvalidCondition(clause.to_string()));
        }

        Ok(Self::Equals {
            key: key.to_string(),
            value: inner.to_string(),
        })
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Equals { key, value } => write!(f, "{key}='{value}'"),
            Self::Exists { key } => write!(f, "{key}{EXISTS}"),
        }
    }
}

fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

/// A parsed subscription query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Query {
    conditions: Vec<Condition>,
}

impl Query {
    /// `tm.event='<kind>'`.
    #[must_use]
    pub fn for_event(kind: &str) -> Self {
        Self {
            conditions: vec![Condition::Equals {
                key: EVENT_TYPE_KEY.to_string(),
                value: kind.to_string(),
            }],
        }
    }

    /// Adds a `key='value'` clause.
    #[must_use]
    pub fn and_equals(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.conditions.push(Condition::Equals {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    /// Adds a `key EXISTS` clause.
    #[must_use]
    pub fn and_exists(mut self, key: impl Into<String>) -> Self {
        self.conditions.push(Condition::Exists { key: key.into() });
        self
    }

    #[must_use]
    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// True when every condition holds for `events`.
    #[must_use]
    pub fn matches(&self, events: &BTreeMap<String, Vec<String>>) -> bool {
        self.conditions.iter().all(|c| c.matches(events))
    }
}

impl FromStr for Query {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err(QueryError::Empty);
        }
        let conditions = split_clauses(s)?
            .into_iter()
            .map(Condition::parse)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { conditions })
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, condition) in self.conditions.iter().enumerate() {
            if i > 0 {
                f.write_str(AND)?;
            }
            write!(f, "{condition}")?;
        }
        Ok(())
    }
}

/// Splits on ` AND ` outside single-quoted values.
fn split_clauses(s: &str) -> Result<Vec<&str>, QueryError> {
    let mut clauses = Vec::new();
    let mut in_quote = false;
    let mut start = 0;
    let mut i = 0;
    let bytes = s.as_bytes();

    while i < bytes.len() {
        if bytes[i] == b'\'' {
            in_quote = !in_quote;
        } else if !in_quote && bytes[i..].starts_with(AND.as_bytes()) {
            clauses.push(&s[start..i]);
            i += AND.len();
            start = i;
            continue;
        }
        i += 1;
    }
    if in_quote {
        return Err(QueryError::UnterminatedQuote(s.to_string()));
    }
    clauses.push(&s[start..]);
    Ok(clauses)
}
