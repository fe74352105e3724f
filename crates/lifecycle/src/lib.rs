//! Contact lifecycle: table-driven status transitions with confirmation
//! gates and optimistic-concurrency checks.

pub mod retry;
pub mod state_machine;

pub use retry::{ConflictAware, ConflictRetry};
pub use state_machine::{
    attempt_transition, status_change, ContactStateMachine, StateTransition, StatusChange,
    TransitionRule, TransitionTable,
};
