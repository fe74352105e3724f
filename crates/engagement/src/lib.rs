//! Engagement scoring: turns a contact's interaction ledger into a bounded,
//! time-decayed score, a velocity trend, and the interaction types driving it.

pub mod config;
pub mod level;
pub mod scorer;

pub use config::EngagementConfig;
pub use level::{EngagementLevel, EngagementTrend};
pub use scorer::{evaluate, score, top_types, velocity, EngagementScore, Velocity};
