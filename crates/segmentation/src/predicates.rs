//! Typed predicates produced by the compiler and their in-memory evaluation.

use chrono::{DateTime, Utc};
use crm_core::{Contact, ContactStatus};
use serde::Serialize;
use uuid::Uuid;

use crate::fields::{Field, Operator};
use crate::query::QueryParam;

/// A single validated field test. List-valued conditions are sorted and
/// de-duplicated by the compiler.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    StatusEquals(ContactStatus),
    StatusIn(Vec<ContactStatus>),
    TagsContainAny(Vec<String>),
    TagsContainAll(Vec<String>),
    ScoreAtLeast(f64),
    ScoreAtMost(f64),
    ScoreBetween(f64, f64),
    CompanyEquals(Uuid),
    CreatedBefore(DateTime<Utc>),
    CreatedAfter(DateTime<Utc>),
    CreatedBetween(DateTime<Utc>, DateTime<Utc>),
    EmailDomainEquals(String),
    EmailDomainSuffix(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    MatchAll,
    Condition(Condition),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
}

impl Condition {
    pub fn field(&self) -> Field {
        match self {
            Condition::StatusEquals(_) | Condition::StatusIn(_) => Field::Status,
            Condition::TagsContainAny(_) | Condition::TagsContainAll(_) => Field::Tags,
            Condition::ScoreAtLeast(_)
            | Condition::ScoreAtMost(_)
            | Condition::ScoreBetween(..) => Field::EngagementScore,
            Condition::CompanyEquals(_) => Field::CompanyId,
            Condition::CreatedBefore(_)
            | Condition::CreatedAfter(_)
            | Condition::CreatedBetween(..) => Field::CreatedAt,
            Condition::EmailDomainEquals(_) | Condition::EmailDomainSuffix(_) => Field::EmailDomain,
        }
    }

    pub fn operator(&self) -> Operator {
        match self {
            Condition::StatusEquals(_)
            | Condition::CompanyEquals(_)
            | Condition::EmailDomainEquals(_) => Operator::Equals,
            Condition::StatusIn(_) => Operator::In,
            Condition::TagsContainAny(_) => Operator::ContainsAny,
            Condition::TagsContainAll(_) => Operator::ContainsAll,
            Condition::ScoreAtLeast(_) => Operator::Gte,
            Condition::ScoreAtMost(_) => Operator::Lte,
            Condition::ScoreBetween(..) | Condition::CreatedBetween(..) => Operator::Between,
            Condition::CreatedBefore(_) => Operator::Before,
            Condition::CreatedAfter(_) => Operator::After,
            Condition::EmailDomainSuffix(_) => Operator::Suffix,
        }
    }

    /// Values as structured query parameters, in operator order.
    pub fn params(&self) -> Vec<QueryParam> {
        match self {
            Condition::StatusEquals(s) => vec![QueryParam::Text(s.as_str().to_string())],
            Condition::StatusIn(list) => vec![QueryParam::TextList(
                list.iter().map(|s| s.as_str().to_string()).collect(),
            )],
            Condition::TagsContainAny(tags) | Condition::TagsContainAll(tags) => {
                vec![QueryParam::TextList(tags.clone())]
            }
            Condition::ScoreAtLeast(v) | Condition::ScoreAtMost(v) => vec![QueryParam::Number(*v)],
            Condition::ScoreBetween(lo, hi) => {
                vec![QueryParam::Number(*lo), QueryParam::Number(*hi)]
            }
            Condition::CompanyEquals(id) => vec![QueryParam::Uuid(*id)],
            Condition::CreatedBefore(t) | Condition::CreatedAfter(t) => {
                vec![QueryParam::Timestamp(*t)]
            }
            Condition::CreatedBetween(start, end) => {
                vec![QueryParam::Timestamp(*start), QueryParam::Timestamp(*end)]
            }
            Condition::EmailDomainEquals(d) | Condition::EmailDomainSuffix(d) => {
                vec![QueryParam::Text(d.clone())]
            }
        }
    }

    pub fn matches(&self, contact: &Contact) -> bool {
        match self {
            Condition::StatusEquals(status) => contact.status == *status,
            Condition::StatusIn(list) => list.contains(&contact.status),
            Condition::TagsContainAny(tags) => tags.iter().any(|t| contact.has_tag(t)),
            Condition::TagsContainAll(tags) => tags.iter().all(|t| contact.has_tag(t)),
            Condition::ScoreAtLeast(min) => contact.engagement_score >= *min,
            Condition::ScoreAtMost(max) => contact.engagement_score <= *max,
            Condition::ScoreBetween(lo, hi) => {
                contact.engagement_score >= *lo && contact.engagement_score <= *hi
            }
            Condition::CompanyEquals(id) => contact.company_id == Some(*id),
            Condition::CreatedBefore(t) => contact.created_at < *t,
            Condition::CreatedAfter(t) => contact.created_at > *t,
            Condition::CreatedBetween(start, end) => {
                contact.created_at >= *start && contact.created_at <= *end
            }
            Condition::EmailDomainEquals(domain) => {
                contact.email_domain().as_deref() == Some(domain.as_str())
            }
            Condition::EmailDomainSuffix(suffix) => contact
                .email_domain()
                .is_some_and(|domain| domain_has_suffix(&domain, suffix)),
        }
    }
}

/// Label-aware suffix match: `example.com` matches `example.com` and
/// `mail.example.com` but not `badexample.com`.
pub fn domain_has_suffix(domain: &str, suffix: &str) -> bool {
    domain == suffix
        || domain
            .strip_suffix(suffix)
            .is_some_and(|rest| rest.ends_with('.'))
}

impl Predicate {
    pub fn matches(&self, contact: &Contact) -> bool {
        match self {
            Predicate::MatchAll => true,
            Predicate::Condition(condition) => condition.matches(contact),
            Predicate::And(children) => children.iter().all(|p| p.matches(contact)),
            Predicate::Or(children) => children.iter().any(|p| p.matches(contact)),
            Predicate::Not(inner) => !inner.matches(contact),
        }
    }
}
