//! Attribute filters guarding style rules and feature queries.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    feature::Feature,
    value::{as_number, as_text, loose_eq},
};

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    /// `==` with numeric coercion when both sides are numbers.
    Equal,
    /// Negation of [`FilterOp::Equal`].
    NotEqual,
    /// Numeric `<`.
    Less,
    /// Numeric `<=`.
    LessOrEqual,
    /// Numeric `>`.
    Greater,
    /// Numeric `>=`.
    GreaterOrEqual,
    /// Inclusive numeric range, operand `[lo, hi]`.
    Between,
    /// Substring test on string forms.
    Contains,
    /// Membership in a comma-separated operand list.
    In,
    /// Negation of [`FilterOp::In`].
    NotIn,
    /// Exact match on string forms.
    Like,
    /// Negation of [`FilterOp::Like`].
    NotLike,
}

/// `(attribute, operator, operand)` triple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    /// Property key.
    pub attribute: String,
    /// Operator.
    pub op: FilterOp,
    /// Right-hand side.
    pub operand: Value,
}

impl Filter {
    /// New filter.
    pub fn new(attribute: impl Into<String>, op: FilterOp, operand: impl Into<Value>) -> Self {
        Self {
            attribute: attribute.into(),
            op,
            operand: operand.into(),
        }
    }

    /// Load-time shape check for the operand.
    pub fn validate(&self) -> Result<(), String> {
        if self.op == FilterOp::Between {
            let ok = self
                .operand
                .as_array()
                .is_some_and(|a| a.len() == 2 && a.iter().all(|v| as_number(v).is_some()));
            if !ok {
                return Err(format!(
                    "filter on `{}`: between expects a two-element numeric operand, got {}",
                    self.attribute, self.operand
                ));
            }
        }
        Ok(())
    }

    /// Tests one feature. A missing attribute never matches.
    pub fn matches(&self, feature: &Feature) -> bool {
        match feature.get(&self.attribute) {
            Some(value) => self.test(value),
            None => false,
        }
    }

    /// Tests a raw attribute value.
    pub fn test(&self, value: &Value) -> bool {
        if value.is_null() {
            return false;
        }
        match self.op {
            FilterOp::Equal => loose_eq(value, &self.operand),
            FilterOp::NotEqual => !loose_eq(value, &self.operand),
            FilterOp::Less => self.compare(value, |a, b| a < b),
            FilterOp::LessOrEqual => self.compare(value, |a, b| a <= b),
            FilterOp::Greater => self.compare(value, |a, b| a > b),
            FilterOp::GreaterOrEqual => self.compare(value, |a, b| a >= b),
            FilterOp::Between => {
                let Some(v) = as_number(value) else {
                    return false;
                };
                let Some([lo, hi]) = self.bounds() else {
                    return false;
                };
                v >= lo && v <= hi
            }
            FilterOp::Contains => as_text(value).contains(&as_text(&self.operand)),
            FilterOp::In => self.member(value),
            FilterOp::NotIn => !self.member(value),
            FilterOp::Like => as_text(value) == as_text(&self.operand),
            FilterOp::NotLike => as_text(value) != as_text(&self.operand),
        }
    }

    fn compare(&self, value: &Value, cmp: impl Fn(f64, f64) -> bool) -> bool {
        match (as_number(value), as_number(&self.operand)) {
            (Some(a), Some(b)) => cmp(a, b),
            _ => false,
        }
    }

    fn bounds(&self) -> Option<[f64; 2]> {
        let arr = self.operand.as_array()?;
        if arr.len() != 2 {
            return None;
        }
        Some([as_number(&arr[0])?, as_number(&arr[1])?])
    }

    fn member(&self, value: &Value) -> bool {
        let needle = as_text(value);
        match &self.operand {
            Value::Array(items) => items.iter().any(|v| as_text(v).trim() == needle),
            other => as_text(other).split(',').any(|tok| tok.trim() == needle),
        }
    }
}

/// Logical AND over `filters`. An empty list matches everything.
pub fn matches_all(filters: &[Filter], feature: &Feature) -> bool {
    filters.iter().all(|f| f.matches(feature))
}
