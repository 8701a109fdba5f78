//! Condition evaluation for IAM policies
//!
//! Conditions allow fine-grained control based on the resolved key snapshot:
//! - String operations (Equals, EqualsIgnoreCase, Like, and their negations)
//! - Numeric operations (Equals, NotEquals, LessThan, GreaterThan, ...)
//! - Date operations (RFC 3339 or epoch seconds)
//! - Bool and IP-range operations
//!
//! A condition holds when the current value satisfies the operator against
//! any expected value; negated operators require that none match. A key that
//! is missing from the snapshot, or a value that does not parse for the
//! operator, always fails the condition.

use super::keys::KeySnapshot;
use super::pattern::{CaseSensitivity, PatternMatcher};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::net::IpAddr;

/// Condition operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConditionOperator {
    /// String equals (case-sensitive)
    StringEquals,
    /// String not equals (case-sensitive)
    StringNotEquals,
    StringEqualsIgnoreCase,
    StringNotEqualsIgnoreCase,
    /// String matches pattern (supports `*` and `?`)
    StringLike,
    StringNotLike,
    NumericEquals,
    NumericNotEquals,
    NumericLessThan,
    NumericLessThanEquals,
    NumericGreaterThan,
    NumericGreaterThanEquals,
    DateEquals,
    DateLessThan,
    DateGreaterThan,
    Bool,
    /// Address inside one of the CIDR ranges
    IpAddress,
    NotIpAddress,
}

impl ConditionOperator {
    /// Negated operators succeed only when no expected value matches
    fn is_negated(self) -> bool {
        matches!(
            self,
            ConditionOperator::StringNotEquals
                | ConditionOperator::StringNotEqualsIgnoreCase
                | ConditionOperator::StringNotLike
                | ConditionOperator::NumericNotEquals
                | ConditionOperator::NotIpAddress
        )
    }
}

/// A single condition: `operator(key, values)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Condition {
    pub operator: ConditionOperator,
    pub key: String,
    pub values: Vec<String>,
}

impl Condition {
    /// Create a new condition
    pub fn new<I, V>(operator: ConditionOperator, key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        Condition {
            operator,
            key: key.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Evaluate this condition against a key snapshot
    pub fn evaluate(&self, snapshot: &KeySnapshot, matcher: &PatternMatcher) -> bool {
        let actual = match snapshot.get(&self.key) {
            Some(v) => v,
            None => return false, // Key not in snapshot - condition fails
        };

        if self.values.is_empty() {
            return false;
        }

        let mut outcomes = self.values.iter().map(|expected| self.compare(expected, actual, matcher));

        if self.operator.is_negated() {
            // Any unparseable operand poisons a negation rather than passing it
            outcomes.all(|outcome| outcome == Some(false))
        } else {
            outcomes.any(|outcome| outcome == Some(true))
        }
    }

    /// Compare one expected value; `None` when an operand does not parse
    fn compare(&self, expected: &str, actual: &str, matcher: &PatternMatcher) -> Option<bool> {
        use ConditionOperator::*;

        match self.operator {
            StringEquals | StringNotEquals => Some(expected == actual),
            StringEqualsIgnoreCase | StringNotEqualsIgnoreCase => {
                Some(expected.to_lowercase() == actual.to_lowercase())
            }
            StringLike | StringNotLike => {
                Some(matcher.matches(expected, actual, CaseSensitivity::Sensitive))
            }
            NumericEquals | NumericNotEquals => Some(compare_numbers(actual, expected)?.is_eq()),
            NumericLessThan => Some(compare_numbers(actual, expected)?.is_lt()),
            NumericLessThanEquals => Some(compare_numbers(actual, expected)?.is_le()),
            NumericGreaterThan => Some(compare_numbers(actual, expected)?.is_gt()),
            NumericGreaterThanEquals => Some(compare_numbers(actual, expected)?.is_ge()),
            DateEquals => Some(parse_date(actual)? == parse_date(expected)?),
            DateLessThan => Some(parse_date(actual)? < parse_date(expected)?),
            DateGreaterThan => Some(parse_date(actual)? > parse_date(expected)?),
            Bool => Some(parse_bool(actual)? == parse_bool(expected)?),
            IpAddress | NotIpAddress => {
                let range = CidrRange::parse(expected)?;
                let addr: IpAddr = actual.trim().parse().ok()?;
                Some(range.contains(addr))
            }
        }
    }
}

/// Integers compare exactly; anything else falls back to finite `f64`
fn compare_numbers(actual: &str, expected: &str) -> Option<Ordering> {
    let (actual, expected) = (actual.trim(), expected.trim());
    if let (Ok(actual), Ok(expected)) = (actual.parse::<i128>(), expected.parse::<i128>()) {
        return Some(actual.cmp(&expected));
    }
    parse_number(actual)?.partial_cmp(&parse_number(expected)?)
}

fn parse_number(raw: &str) -> Option<f64> {
    raw.parse::<f64>().ok().filter(|n| n.is_finite())
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

/// RFC 3339 timestamps, or integer seconds since the epoch
fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    raw.parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
}

/// An IPv4 or IPv6 network in CIDR notation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CidrRange {
    network: IpAddr,
    prefix: u8,
}

impl CidrRange {
    /// Parse `addr/prefix`; a bare address is a single-host range
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let (addr, prefix) = match raw.split_once('/') {
            Some((addr, prefix)) => (addr, Some(prefix)),
            None => (raw, None),
        };
        let network: IpAddr = addr.parse().ok()?;
        let max = match network {
            IpAddr::V4(_) => 32,
            IpAddr::V6(_) => 128,
        };
        let prefix = match prefix {
            Some(p) => p.parse::<u8>().ok().filter(|p| *p <= max)?,
            None => max,
        };
        Some(CidrRange { network, prefix })
    }

    pub fn contains(&self, addr: IpAddr) -> bool {
        match (self.network, addr) {
            (IpAddr::V4(net), IpAddr::V4(addr)) => {
                let mask = u32::MAX.checked_shl(32 - u32::from(self.prefix)).unwrap_or(0);
                u32::from(net) & mask == u32::from(addr) & mask
            }
            (IpAddr::V6(net), IpAddr::V6(addr)) => {
                let mask = u128::MAX.checked_shl(128 - u32::from(self.prefix)).unwrap_or(0);
                u128::from(net) & mask == u128::from(addr) & mask
            }
            _ => false,
        }
    }
}
