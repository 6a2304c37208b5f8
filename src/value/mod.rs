//! # Attribute Value Type System
//!
//! Core value types for node and edge attributes: Null, Bool, Int64,
//! Double, String, Array, Map, Vector, plus graph references (Node, Edge,
//! Path). Values form a tagged union; all attribute-set operations work
//! over this sum type rather than virtual dispatch.
//!
//! ## Usage
//!
//! ```rust
//! use deltagraph::value::Value;
//!
//! let v = Value::Array(vec![
//!     Value::Int64(1),
//!     Value::String("hello".into()),
//!     Value::Double(3.14),
//! ]);
//! assert!(!v.is_null());
//! ```

pub mod attribute_set;

pub use attribute_set::AttributeSet;

use crate::error::{GraphError, GraphResult};
use crate::ids::{EdgeId, NodeId};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A single attribute value.
///
/// `Map` keeps insertion order as a vector of pairs; lookup is linear,
/// which matches the small arity of real-world entities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    /// Absent value; assigning it to an attribute removes the attribute
    Null,
    Bool(bool),
    Int64(i64),
    Double(f64),
    String(String),
    Array(Vec<Value>),
    Map(Vec<(String, Value)>),
    /// Dense float vector
    Vector(Vec<f32>),
    /// Reference to a node by id
    Node(NodeId),
    /// Reference to an edge by id
    Edge(EdgeId),
    /// Materialised path: node ids and the edge ids connecting them
    Path {
        nodes: Vec<NodeId>,
        edges: Vec<EdgeId>,
    },
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric coercion used by the arithmetic paths; `None` for
    /// non-numeric values.
    fn as_double(&self) -> Option<f64> {
        match self {
            Value::Int64(i) => Some(*i as f64),
            Value::Double(d) => Some(*d),
            _ => None,
        }
    }

    /// Checked addition over numerics.
    pub fn checked_add(&self, other: &Value) -> GraphResult<Value> {
        match (self, other) {
            (Value::Int64(a), Value::Int64(b)) => {
                a.checked_add(*b).map(Value::Int64).ok_or(GraphError::Overflow)
            }
            _ => match (self.as_double(), other.as_double()) {
                (Some(a), Some(b)) => Ok(Value::Double(a + b)),
                _ => Err(GraphError::invalid("addition over non-numeric values")),
            },
        }
    }

    /// Checked subtraction over numerics.
    pub fn checked_sub(&self, other: &Value) -> GraphResult<Value> {
        match (self, other) {
            (Value::Int64(a), Value::Int64(b)) => {
                a.checked_sub(*b).map(Value::Int64).ok_or(GraphError::Overflow)
            }
            _ => match (self.as_double(), other.as_double()) {
                (Some(a), Some(b)) => Ok(Value::Double(a - b)),
                _ => Err(GraphError::invalid("subtraction over non-numeric values")),
            },
        }
    }

    /// Checked multiplication over numerics.
    pub fn checked_mul(&self, other: &Value) -> GraphResult<Value> {
        match (self, other) {
            (Value::Int64(a), Value::Int64(b)) => {
                a.checked_mul(*b).map(Value::Int64).ok_or(GraphError::Overflow)
            }
            _ => match (self.as_double(), other.as_double()) {
                (Some(a), Some(b)) => Ok(Value::Double(a * b)),
                _ => Err(GraphError::invalid("multiplication over non-numeric values")),
            },
        }
    }

    /// Checked division. Integer division by zero and float division of
    /// zero by zero both report [`GraphError::DivisionByZero`]; the core
    /// never aborts on these.
    pub fn checked_div(&self, other: &Value) -> GraphResult<Value> {
        match (self, other) {
            (Value::Int64(a), Value::Int64(b)) => {
                if *b == 0 {
                    return Err(GraphError::DivisionByZero);
                }
                a.checked_div(*b).map(Value::Int64).ok_or(GraphError::Overflow)
            }
            _ => match (self.as_double(), other.as_double()) {
                (Some(a), Some(b)) => {
                    if b == 0.0 && a == 0.0 {
                        Err(GraphError::DivisionByZero)
                    } else {
                        Ok(Value::Double(a / b))
                    }
                }
                _ => Err(GraphError::invalid("division over non-numeric values")),
            },
        }
    }

    /// Order rank of the value's type; values of different types order by
    /// rank, values of the same type order by content.
    fn type_rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Int64(_) | Value::Double(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Map(_) => 5,
            Value::Vector(_) => 6,
            Value::Node(_) => 7,
            Value::Edge(_) => 8,
            Value::Path { .. } => 9,
        }
    }

    /// Total comparison across heterogeneous values.
    pub fn compare(&self, other: &Value) -> Ordering {
        let rank = self.type_rank().cmp(&other.type_rank());
        if rank != Ordering::Equal {
            return rank;
        }
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Node(a), Value::Node(b)) | (Value::Edge(a), Value::Edge(b)) => a.cmp(b),
            (Value::Array(a), Value::Array(b)) => {
                for (x, y) in a.iter().zip(b.iter()) {
                    let ord = x.compare(y);
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                a.len().cmp(&b.len())
            }
            (Value::Map(a), Value::Map(b)) => a.len().cmp(&b.len()),
            (Value::Vector(a), Value::Vector(b)) => a
                .iter()
                .zip(b.iter())
                .find_map(|(x, y)| x.partial_cmp(y).filter(|o| *o != Ordering::Equal))
                .unwrap_or_else(|| a.len().cmp(&b.len())),
            (
                Value::Path { nodes: an, edges: ae },
                Value::Path { nodes: bn, edges: be },
            ) => an.cmp(bn).then_with(|| ae.cmp(be)),
            // numerics compare through f64
            _ => {
                let a = self.as_double().unwrap_or(f64::NAN);
                let b = other.as_double().unwrap_or(f64::NAN);
                a.partial_cmp(&b).unwrap_or(Ordering::Equal)
            }
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            // Int64/Double cross-compare numerically
            (Value::Int64(_) | Value::Double(_), Value::Int64(_) | Value::Double(_)) => {
                self.as_double() == other.as_double()
            }
            _ => self.compare(other) == Ordering::Equal && self.type_rank() == other.type_rank(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int64(i) => write!(f, "{i}"),
            Value::Double(d) => write!(f, "{d}"),
            Value::String(s) => write!(f, "\"{s}\""),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, v) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, "]")
            }
            Value::Map(pairs) => {
                write!(f, "{{")?;
                for (i, (k, v)) in pairs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
            Value::Vector(v) => write!(f, "vecf32({})", v.len()),
            Value::Node(id) => write!(f, "(node:{id})"),
            Value::Edge(id) => write!(f, "[edge:{id}]"),
            Value::Path { nodes, edges } => {
                write!(f, "path(nodes:{}, edges:{})", nodes.len(), edges.len())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_cross_type_equality() {
        assert_eq!(Value::Int64(3), Value::Double(3.0));
        assert_ne!(Value::Int64(3), Value::Double(3.5));
    }

    #[test]
    fn test_checked_div_by_zero() {
        let err = Value::Int64(1).checked_div(&Value::Int64(0));
        assert_eq!(err, Err(GraphError::DivisionByZero));
    }

    #[test]
    fn test_checked_add_overflow() {
        let err = Value::Int64(i64::MAX).checked_add(&Value::Int64(1));
        assert_eq!(err, Err(GraphError::Overflow));
    }

    #[test]
    fn test_order_across_types() {
        assert_eq!(Value::Null.compare(&Value::Bool(false)), Ordering::Less);
        assert_eq!(
            Value::String("a".into()).compare(&Value::Int64(10)),
            Ordering::Greater
        );
    }
}
