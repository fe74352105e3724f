//! Allow-listed segment fields and the operators each one accepts.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Status,
    Tags,
    EngagementScore,
    CompanyId,
    CreatedAt,
    EmailDomain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Equals,
    In,
    ContainsAny,
    ContainsAll,
    Gte,
    Lte,
    Between,
    Before,
    After,
    Suffix,
}

impl Field {
    pub const ALL: [Field; 6] = [
        Field::Status,
        Field::Tags,
        Field::EngagementScore,
        Field::CompanyId,
        Field::CreatedAt,
        Field::EmailDomain,
    ];

    /// Column name handed to the query executor.
    pub fn as_str(self) -> &'static str {
        match self {
            Field::Status => "status",
            Field::Tags => "tags",
            Field::EngagementScore => "engagement_score",
            Field::CompanyId => "company_id",
            Field::CreatedAt => "created_at",
            Field::EmailDomain => "email_domain",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        let wanted = name.trim().to_ascii_lowercase();
        Field::ALL.into_iter().find(|f| f.as_str() == wanted)
    }

    pub fn operators(self) -> &'static [Operator] {
        match self {
            Field::Status => &[Operator::Equals, Operator::In],
            Field::Tags => &[Operator::ContainsAny, Operator::ContainsAll],
            Field::EngagementScore => &[Operator::Gte, Operator::Lte, Operator::Between],
            Field::CompanyId => &[Operator::Equals],
            Field::CreatedAt => &[Operator::Before, Operator::After, Operator::Between],
            Field::EmailDomain => &[Operator::Equals, Operator::Suffix],
        }
    }

    pub fn supports(self, operator: Operator) -> bool {
        self.operators().contains(&operator)
    }
}

impl Operator {
    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Equals => "equals",
            Operator::In => "in",
            Operator::ContainsAny => "contains_any",
            Operator::ContainsAll => "contains_all",
            Operator::Gte => "gte",
            Operator::Lte => "lte",
            Operator::Between => "between",
            Operator::Before => "before",
            Operator::After => "after",
            Operator::Suffix => "suffix",
        }
    }

    /// Accepts the canonical names plus the spellings the campaign builder UI emits
    /// (`in-set`, `>=`, `suffix-match`, ...).
    pub fn parse(name: &str) -> Option<Self> {
        let normalized = name.trim().to_ascii_lowercase().replace('-', "_");
        let op = match normalized.as_str() {
            "equals" | "eq" | "=" => Operator::Equals,
            "in" | "in_set" => Operator::In,
            "contains_any" => Operator::ContainsAny,
            "contains_all" => Operator::ContainsAll,
            "gte" | ">=" => Operator::Gte,
            "lte" | "<=" => Operator::Lte,
            "between" => Operator::Between,
            "before" => Operator::Before,
            "after" => Operator::After,
            "suffix" | "suffix_match" => Operator::Suffix,
            _ => return None,
        };
        Some(op)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
