//! User-authored segment definitions, as submitted by the campaign builder.
//!
//! Field and operator names stay as plain strings here; the compiler checks
//! them against the allow-list so that unknown input surfaces as a
//! [`crm_core::CompileError`] instead of a deserialization failure.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalOperator {
    #[default]
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub field: String,
    pub operator: String,
    pub value: serde_json::Value,
}

impl Filter {
    pub fn new(
        field: impl Into<String>,
        operator: impl Into<String>,
        value: serde_json::Value,
    ) -> Self {
        Self {
            field: field.into(),
            operator: operator.into(),
            value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentNode {
    Filter(Filter),
    And(Vec<SegmentNode>),
    Or(Vec<SegmentNode>),
    Not(Box<SegmentNode>),
}

impl SegmentNode {
    pub fn not(node: SegmentNode) -> Self {
        SegmentNode::Not(Box::new(node))
    }
}

impl From<Filter> for SegmentNode {
    fn from(filter: Filter) -> Self {
        SegmentNode::Filter(filter)
    }
}

/// Root of a segment: top-level filters joined by `logic`.
///
/// An empty filter list selects every contact.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SegmentDefinition {
    #[serde(default)]
    pub logic: LogicalOperator,
    #[serde(default)]
    pub filters: Vec<SegmentNode>,
}
