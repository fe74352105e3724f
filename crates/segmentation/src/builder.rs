//! Segment builder: fluent API for constructing segment definitions in code.

use chrono::{DateTime, Utc};
use crm_core::ContactStatus;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::definition::{Filter, LogicalOperator, SegmentDefinition, SegmentNode};
use crate::fields::{Field, Operator};

#[derive(Debug, Clone, Default)]
pub struct SegmentBuilder {
    logic: LogicalOperator,
    filters: Vec<SegmentNode>,
}

impl SegmentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join top-level filters with OR instead of AND.
    pub fn with_or(mut self) -> Self {
        self.logic = LogicalOperator::Or;
        self
    }

    fn push(mut self, field: Field, operator: Operator, value: Value) -> Self {
        self.filters.push(SegmentNode::Filter(Filter::new(
            field.as_str(),
            operator.as_str(),
            value,
        )));
        self
    }

    pub fn status(self, status: ContactStatus) -> Self {
        self.push(Field::Status, Operator::Equals, json!(status.as_str()))
    }

    pub fn status_in(self, statuses: &[ContactStatus]) -> Self {
        let names: Vec<_> = statuses.iter().map(|s| s.as_str()).collect();
        self.push(Field::Status, Operator::In, json!(names))
    }

    pub fn tags_any<S: AsRef<str>>(self, tags: &[S]) -> Self {
        let tags: Vec<_> = tags.iter().map(|t| t.as_ref()).collect();
        self.push(Field::Tags, Operator::ContainsAny, json!(tags))
    }

    pub fn tags_all<S: AsRef<str>>(self, tags: &[S]) -> Self {
        let tags: Vec<_> = tags.iter().map(|t| t.as_ref()).collect();
        self.push(Field::Tags, Operator::ContainsAll, json!(tags))
    }

    pub fn score_at_least(self, min: f64) -> Self {
        self.push(Field::EngagementScore, Operator::Gte, json!(min))
    }

    pub fn score_at_most(self, max: f64) -> Self {
        self.push(Field::EngagementScore, Operator::Lte, json!(max))
    }

    pub fn score_between(self, lo: f64, hi: f64) -> Self {
        self.push(Field::EngagementScore, Operator::Between, json!([lo, hi]))
    }

    pub fn company(self, company_id: Uuid) -> Self {
        self.push(Field::CompanyId, Operator::Equals, json!(company_id.to_string()))
    }

    pub fn created_before(self, at: DateTime<Utc>) -> Self {
        self.push(Field::CreatedAt, Operator::Before, json!(at.to_rfc3339()))
    }

    pub fn created_after(self, at: DateTime<Utc>) -> Self {
        self.push(Field::CreatedAt, Operator::After, json!(at.to_rfc3339()))
    }

    pub fn created_between(self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.push(
            Field::CreatedAt,
            Operator::Between,
            json!([start.to_rfc3339(), end.to_rfc3339()]),
        )
    }

    pub fn email_domain(self, domain: &str) -> Self {
        self.push(Field::EmailDomain, Operator::Equals, json!(domain))
    }

    pub fn email_domain_suffix(self, suffix: &str) -> Self {
        self.push(Field::EmailDomain, Operator::Suffix, json!(suffix))
    }

    /// Adds an arbitrary nested group, e.g. an `Or` or `Not` node.
    pub fn group(mut self, node: SegmentNode) -> Self {
        self.filters.push(node);
        self
    }

    /// Adds the negation of everything built by `inner`, joined with its own logic.
    pub fn exclude(self, inner: SegmentBuilder) -> Self {
        let definition = inner.build();
        let node = match definition.logic {
            LogicalOperator::And => SegmentNode::And(definition.filters),
            LogicalOperator::Or => SegmentNode::Or(definition.filters),
        };
        self.group(SegmentNode::not(node))
    }

    pub fn build(self) -> SegmentDefinition {
        SegmentDefinition {
            logic: self.logic,
            filters: self.filters,
        }
    }
}
