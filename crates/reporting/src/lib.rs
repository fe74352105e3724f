//! Campaign reporting: funnel aggregation over targeting edges.

pub mod funnel;

pub use funnel::{
    aggregate, aggregate_by_campaign, report, FunnelReport, FunnelStage, FunnelStageKind,
};
