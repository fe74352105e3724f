//! Normalized query fragments handed to the persistence query executor.
//!
//! Field names only ever come from the [`Field`] allow-list and every value
//! travels as a [`QueryParam`]; rendered text contains placeholders only.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::fields::{Field, Operator};
use crate::predicates::Predicate;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum QueryParam {
    Text(String),
    TextList(Vec<String>),
    Number(f64),
    Timestamp(DateTime<Utc>),
    Uuid(Uuid),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryClause {
    pub field: Field,
    pub operator: Operator,
    pub params: Vec<QueryParam>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryFragment {
    MatchAll,
    Clause(QueryClause),
    And(Vec<QueryFragment>),
    Or(Vec<QueryFragment>),
    Not(Box<QueryFragment>),
}

/// Placeholder text plus the bound parameters, `$1` first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterizedQuery {
    pub text: String,
    pub params: Vec<QueryParam>,
}

impl From<&Predicate> for QueryFragment {
    fn from(predicate: &Predicate) -> Self {
        match predicate {
            Predicate::MatchAll => QueryFragment::MatchAll,
            Predicate::Condition(condition) => QueryFragment::Clause(QueryClause {
                field: condition.field(),
                operator: condition.operator(),
                params: condition.params(),
            }),
            Predicate::And(children) => {
                QueryFragment::And(children.iter().map(QueryFragment::from).collect())
            }
            Predicate::Or(children) => {
                QueryFragment::Or(children.iter().map(QueryFragment::from).collect())
            }
            Predicate::Not(inner) => QueryFragment::Not(Box::new(QueryFragment::from(&**inner))),
        }
    }
}

impl QueryFragment {
    pub fn to_parameterized(&self) -> ParameterizedQuery {
        let mut params = Vec::new();
        let text = self.render(&mut params);
        ParameterizedQuery { text, params }
    }

    fn render(&self, params: &mut Vec<QueryParam>) -> String {
        match self {
            QueryFragment::MatchAll => "TRUE".to_string(),
            QueryFragment::Clause(clause) => clause.render(params),
            QueryFragment::And(children) => join(children, " AND ", "TRUE", params),
            QueryFragment::Or(children) => join(children, " OR ", "FALSE", params),
            QueryFragment::Not(inner) => format!("NOT ({})", inner.render(params)),
        }
    }
}

fn join(
    children: &[QueryFragment],
    separator: &str,
    empty: &str,
    params: &mut Vec<QueryParam>,
) -> String {
    if children.is_empty() {
        return empty.to_string();
    }
    let parts: Vec<String> = children.iter().map(|c| c.render(params)).collect();
    format!("({})", parts.join(separator))
}

fn bind(params: &mut Vec<QueryParam>, param: QueryParam) -> String {
    params.push(param);
    format!("${}", params.len())
}

impl QueryClause {
    fn render(&self, params: &mut Vec<QueryParam>) -> String {
        let column = self.field.as_str();
        let mut values = self.params.iter().cloned();
        let mut next = |params: &mut Vec<QueryParam>| {
            // Clause arity is fixed by the compiler; a missing value renders as NULL.
            match values.next() {
                Some(p) => bind(params, p),
                None => "NULL".to_string(),
            }
        };

        match self.operator {
            Operator::Equals => format!("{column} = {}", next(params)),
            Operator::In => format!("{column} IN {}", next(params)),
            Operator::ContainsAny => format!("{column} CONTAINSANY {}", next(params)),
            Operator::ContainsAll => format!("{column} CONTAINSALL {}", next(params)),
            Operator::Gte => format!("{column} >= {}", next(params)),
            Operator::Lte => format!("{column} <= {}", next(params)),
            Operator::Before => format!("{column} < {}", next(params)),
            Operator::After => format!("{column} > {}", next(params)),
            Operator::Between => {
                let lo = next(params);
                let hi = next(params);
                format!("({column} >= {lo} AND {column} <= {hi})")
            }
            Operator::Suffix => {
                let exact = self.params.first().cloned();
                let dotted = match &exact {
                    Some(QueryParam::Text(s)) => Some(QueryParam::Text(format!(".{s}"))),
                    _ => None,
                };
                let exact = exact.map_or_else(|| "NULL".to_string(), |p| bind(params, p));
                let dotted = dotted.map_or_else(|| "NULL".to_string(), |p| bind(params, p));
                format!("({column} = {exact} OR string::ends_with({column}, {dotted}))")
            }
        }
    }
}
