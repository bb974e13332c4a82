//! Query description shared by all store backends

use serde_json::Value;
use std::cmp::Ordering;

/// Filter comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Gt,
    /// Field equals any element of an array value
    In,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

impl Filter {
    /// Whether a document field satisfies this filter. A missing field
    /// never matches.
    pub fn matches(&self, actual: Option<&Value>) -> bool {
        let Some(actual) = actual else {
            return false;
        };

        match self.op {
            FilterOp::Eq => compare_values(actual, &self.value) == Some(Ordering::Equal),
            FilterOp::Gt => compare_values(actual, &self.value) == Some(Ordering::Greater),
            FilterOp::In => match &self.value {
                Value::Array(candidates) => candidates
                    .iter()
                    .any(|c| compare_values(actual, c) == Some(Ordering::Equal)),
                _ => false,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

/// Conjunction of filters with optional ordering and limit
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: Vec<Filter>,
    pub order_by: Option<(String, Direction)>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn where_eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter {
            field: field.to_string(),
            op: FilterOp::Eq,
            value: value.into(),
        });
        self
    }

    pub fn where_gt(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter {
            field: field.to_string(),
            op: FilterOp::Gt,
            value: value.into(),
        });
        self
    }

    pub fn where_in<I, V>(mut self, field: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.filters.push(Filter {
            field: field.to_string(),
            op: FilterOp::In,
            value: Value::Array(values.into_iter().map(Into::into).collect()),
        });
        self
    }

    pub fn order_by(mut self, field: &str, direction: Direction) -> Self {
        self.order_by = Some((field.to_string(), direction));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Largest `IN` list in this query
    pub fn max_in_len(&self) -> usize {
        self.filters
            .iter()
            .filter(|f| f.op == FilterOp::In)
            .map(|f| f.value.as_array().map_or(0, Vec::len))
            .max()
            .unwrap_or(0)
    }
}

/// Order two JSON values of the same kind. Numbers compare numerically,
/// strings lexically, booleans false < true. Mixed kinds are unordered.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_numbers_compare_across_representations() {
        assert_eq!(compare_values(&json!(1), &json!(1.0)), Some(Ordering::Equal));
        assert_eq!(compare_values(&json!(500000), &json!(0)), Some(Ordering::Greater));
    }

    #[test]
    fn test_mixed_kinds_do_not_match() {
        let filter = Filter {
            field: "balance".into(),
            op: FilterOp::Gt,
            value: json!(0),
        };
        assert!(!filter.matches(Some(&json!("100"))));
        assert!(!filter.matches(None));
        assert!(filter.matches(Some(&json!(100))));
    }

    #[test]
    fn test_in_filter() {
        let query = Query::new().where_in("tenantId", ["t1", "t2"]);
        assert_eq!(query.max_in_len(), 2);
        assert!(query.filters[0].matches(Some(&json!("t2"))));
        assert!(!query.filters[0].matches(Some(&json!("t3"))));
    }
}
