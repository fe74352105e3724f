//! Segment compiler: validates a user-authored definition against the field
//! allow-list and produces an evaluable predicate plus its query fragment.

use chrono::{DateTime, Utc};
use crm_core::config::SegmentationConfig;
use crm_core::{CompileError, Contact, ContactStatus};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::definition::{Filter, LogicalOperator, SegmentDefinition, SegmentNode};
use crate::fields::{Field, Operator};
use crate::predicates::{Condition, Predicate};
use crate::query::{ParameterizedQuery, QueryFragment};

pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Output of a successful compilation. `query` is derived from `predicate`,
/// so both always select the same contacts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledSegment {
    pub predicate: Predicate,
    pub query: QueryFragment,
}

impl CompiledSegment {
    fn new(predicate: Predicate) -> Self {
        let query = QueryFragment::from(&predicate);
        Self { predicate, query }
    }

    pub fn matches(&self, contact: &Contact) -> bool {
        self.predicate.matches(contact)
    }

    pub fn filter<'a>(&self, contacts: &'a [Contact]) -> Vec<&'a Contact> {
        contacts.iter().filter(|c| self.matches(c)).collect()
    }

    pub fn count_matches(&self, contacts: &[Contact]) -> usize {
        contacts.iter().filter(|c| self.matches(c)).count()
    }

    pub fn to_parameterized(&self) -> ParameterizedQuery {
        self.query.to_parameterized()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SegmentCompiler {
    max_depth: usize,
}

impl SegmentCompiler {
    /// `max_depth` counts the root group as level one.
    pub fn new(max_depth: usize) -> Self {
        Self {
            max_depth: max_depth.max(1),
        }
    }

    pub fn from_config(config: &SegmentationConfig) -> Self {
        Self::new(config.max_depth)
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn compile(&self, definition: &SegmentDefinition) -> Result<CompiledSegment, CompileError> {
        let result = self.compile_root(definition).map(CompiledSegment::new);
        match &result {
            Ok(compiled) => {
                metrics::counter!("segment.compile.accepted").increment(1);
                debug!(query = %compiled.to_parameterized().text, "Segment compiled");
            }
            Err(e) => {
                metrics::counter!("segment.compile.rejected").increment(1);
                warn!(error = %e, "Segment definition rejected");
            }
        }
        result
    }

    fn compile_root(&self, definition: &SegmentDefinition) -> Result<Predicate, CompileError> {
        if definition.filters.is_empty() {
            return Ok(Predicate::MatchAll);
        }
        let mut children = self.compile_children(&definition.filters, 1)?;
        if children.len() == 1 {
            return Ok(children.remove(0));
        }
        Ok(match definition.logic {
            LogicalOperator::And => Predicate::And(children),
            LogicalOperator::Or => Predicate::Or(children),
        })
    }

    fn compile_children(
        &self,
        nodes: &[SegmentNode],
        depth: usize,
    ) -> Result<Vec<Predicate>, CompileError> {
        nodes.iter().map(|n| self.compile_node(n, depth)).collect()
    }

    /// `depth` is the level of the group containing `node`.
    fn compile_node(&self, node: &SegmentNode, depth: usize) -> Result<Predicate, CompileError> {
        let nested = || {
            let level = depth + 1;
            if level > self.max_depth {
                Err(CompileError::DepthExceeded {
                    max_depth: self.max_depth,
                })
            } else {
                Ok(level)
            }
        };

        match node {
            SegmentNode::Filter(filter) => compile_filter(filter).map(Predicate::Condition),
            SegmentNode::And(children) => {
                Ok(Predicate::And(self.compile_children(children, nested()?)?))
            }
            SegmentNode::Or(children) => {
                Ok(Predicate::Or(self.compile_children(children, nested()?)?))
            }
            SegmentNode::Not(inner) => {
                let level = nested()?;
                Ok(Predicate::Not(Box::new(self.compile_node(inner, level)?)))
            }
        }
    }
}

impl Default for SegmentCompiler {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DEPTH)
    }
}

/// Compiles with the default depth bound.
pub fn compile(definition: &SegmentDefinition) -> Result<CompiledSegment, CompileError> {
    SegmentCompiler::default().compile(definition)
}

fn compile_filter(filter: &Filter) -> Result<Condition, CompileError> {
    let field = Field::parse(&filter.field)
        .ok_or_else(|| CompileError::UnknownField(filter.field.clone()))?;
    let operator = Operator::parse(&filter.operator)
        .filter(|op| field.supports(*op))
        .ok_or_else(|| CompileError::UnsupportedOperator {
            field: field.as_str().to_string(),
            operator: filter.operator.clone(),
        })?;

    let value = &filter.value;
    let condition = match (field, operator) {
        (Field::Status, Operator::Equals) => Condition::StatusEquals(status(field, value)?),
        (Field::Status, Operator::In) => {
            let mut list = array(field, value, "a list of contact statuses")?
                .iter()
                .map(|v| status(field, v))
                .collect::<Result<Vec<_>, _>>()?;
            list.sort();
            list.dedup();
            Condition::StatusIn(list)
        }
        (Field::Tags, Operator::ContainsAny) => Condition::TagsContainAny(tags(field, value)?),
        (Field::Tags, Operator::ContainsAll) => Condition::TagsContainAll(tags(field, value)?),
        (Field::EngagementScore, Operator::Gte) => Condition::ScoreAtLeast(number(field, value)?),
        (Field::EngagementScore, Operator::Lte) => Condition::ScoreAtMost(number(field, value)?),
        (Field::EngagementScore, Operator::Between) => {
            let (lo, hi) = range(field, value, number)?;
            Condition::ScoreBetween(lo, hi)
        }
        (Field::CompanyId, Operator::Equals) => Condition::CompanyEquals(uuid(field, value)?),
        (Field::CreatedAt, Operator::Before) => Condition::CreatedBefore(timestamp(field, value)?),
        (Field::CreatedAt, Operator::After) => Condition::CreatedAfter(timestamp(field, value)?),
        (Field::CreatedAt, Operator::Between) => {
            let (start, end) = range(field, value, timestamp)?;
            Condition::CreatedBetween(start, end)
        }
        (Field::EmailDomain, Operator::Equals) => {
            Condition::EmailDomainEquals(domain(field, value)?)
        }
        (Field::EmailDomain, Operator::Suffix) => {
            Condition::EmailDomainSuffix(domain(field, value)?)
        }
        _ => {
            // `supports` already rejected every other pairing.
            return Err(CompileError::UnsupportedOperator {
                field: field.as_str().to_string(),
                operator: filter.operator.clone(),
            });
        }
    };
    Ok(condition)
}

// ─── Value coercion ─────────────────────────────────────────────────────

fn mismatch(field: Field, expected: &str, found: &Value) -> CompileError {
    CompileError::TypeMismatch {
        field: field.as_str().to_string(),
        expected: expected.to_string(),
        found: found.to_string(),
    }
}

fn text<'a>(field: Field, value: &'a Value, expected: &str) -> Result<&'a str, CompileError> {
    value.as_str().ok_or_else(|| mismatch(field, expected, value))
}

fn array<'a>(field: Field, value: &'a Value, expected: &str) -> Result<&'a [Value], CompileError> {
    value
        .as_array()
        .map(Vec::as_slice)
        .ok_or_else(|| mismatch(field, expected, value))
}

fn status(field: Field, value: &Value) -> Result<ContactStatus, CompileError> {
    let expected = "a contact status";
    text(field, value, expected)?
        .parse()
        .map_err(|_| mismatch(field, expected, value))
}

fn tags(field: Field, value: &Value) -> Result<Vec<String>, CompileError> {
    let expected = "a list of tag strings";
    let mut list = array(field, value, expected)?
        .iter()
        .map(|v| text(field, v, expected).map(|t| t.trim().to_lowercase()))
        .collect::<Result<Vec<_>, _>>()?;
    list.sort();
    list.dedup();
    Ok(list)
}

fn number(field: Field, value: &Value) -> Result<f64, CompileError> {
    value
        .as_f64()
        .filter(|n| n.is_finite())
        .ok_or_else(|| mismatch(field, "a number", value))
}

fn uuid(field: Field, value: &Value) -> Result<Uuid, CompileError> {
    let expected = "a company id (UUID)";
    Uuid::parse_str(text(field, value, expected)?).map_err(|_| mismatch(field, expected, value))
}

fn timestamp(field: Field, value: &Value) -> Result<DateTime<Utc>, CompileError> {
    let expected = "an RFC 3339 timestamp";
    DateTime::parse_from_rfc3339(text(field, value, expected)?)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| mismatch(field, expected, value))
}

fn domain(field: Field, value: &Value) -> Result<String, CompileError> {
    let expected = "a non-empty domain";
    let normalized = text(field, value, expected)?
        .trim()
        .trim_start_matches('@')
        .trim_start_matches('.')
        .to_lowercase();
    if normalized.is_empty() {
        return Err(mismatch(field, expected, value));
    }
    Ok(normalized)
}

/// A `[lo, hi]` pair with `lo <= hi`.
fn range<T: PartialOrd>(
    field: Field,
    value: &Value,
    parse: fn(Field, &Value) -> Result<T, CompileError>,
) -> Result<(T, T), CompileError> {
    let expected = "a [low, high] pair with low <= high";
    match array(field, value, expected)? {
        [lo, hi] => {
            let (lo, hi) = (parse(field, lo)?, parse(field, hi)?);
            if lo <= hi {
                Ok((lo, hi))
            } else {
                Err(mismatch(field, expected, value))
            }
        }
        _ => Err(mismatch(field, expected, value)),
    }
}
