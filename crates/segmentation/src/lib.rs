//! Segment predicate compiler: turns user-authored filter trees into
//! injection-safe, deterministic predicates and query fragments for
//! campaign targeting.

pub mod builder;
pub mod compiler;
pub mod definition;
pub mod fields;
pub mod predicates;
pub mod query;

pub use builder::SegmentBuilder;
pub use compiler::{compile, CompiledSegment, SegmentCompiler};
pub use definition::{Filter, LogicalOperator, SegmentDefinition, SegmentNode};
pub use fields::{Field, Operator};
pub use predicates::{Condition, Predicate};
pub use query::{ParameterizedQuery, QueryFragment, QueryParam};
