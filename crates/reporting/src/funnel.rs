//! Funnel analysis. Reduces campaign targeting edges into ordered
//! Targeted, Opened, Clicked, Converted stage counts.

use crm_core::CampaignTargetingEdge;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunnelStageKind {
    Targeted,
    Opened,
    Clicked,
    Converted,
}

impl FunnelStageKind {
    /// Reporting order.
    pub const ORDER: [FunnelStageKind; 4] = [
        FunnelStageKind::Targeted,
        FunnelStageKind::Opened,
        FunnelStageKind::Clicked,
        FunnelStageKind::Converted,
    ];

    fn reached(self, edge: &CampaignTargetingEdge) -> bool {
        match self {
            FunnelStageKind::Targeted => true,
            FunnelStageKind::Opened => edge.opened,
            FunnelStageKind::Clicked => edge.clicked,
            FunnelStageKind::Converted => edge.converted,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunnelStage {
    pub name: FunnelStageKind,
    pub count: u64,
    pub percentage_of_targeted: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunnelReport {
    pub campaign_id: Option<Uuid>,
    pub stages: Vec<FunnelStage>,
    /// Converted as a percentage of targeted.
    pub overall_conversion_rate: f64,
    /// `step_conversion[i]` is stage `i + 1` as a percentage of stage `i`.
    pub step_conversion: Vec<f64>,
}

impl FunnelReport {
    fn from_stages(campaign_id: Option<Uuid>, stages: Vec<FunnelStage>) -> Self {
        let overall_conversion_rate = stages
            .last()
            .map_or(0.0, |s| s.percentage_of_targeted);
        let step_conversion = stages
            .windows(2)
            .map(|pair| percentage(pair[1].count, pair[0].count))
            .collect();
        Self {
            campaign_id,
            stages,
            overall_conversion_rate,
            step_conversion,
        }
    }

    pub fn count(&self, kind: FunnelStageKind) -> u64 {
        self.stages
            .iter()
            .find(|s| s.name == kind)
            .map_or(0, |s| s.count)
    }

    /// Whether no stage exceeds the one before it. Reported, never enforced.
    pub fn is_monotonic(&self) -> bool {
        self.stages.windows(2).all(|pair| pair[1].count <= pair[0].count)
    }
}

/// `part / whole * 100`, or 0 when `whole` is 0.
fn percentage(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

/// Four stages in fixed order, whatever the order of `edges`.
pub fn aggregate(edges: &[CampaignTargetingEdge]) -> Vec<FunnelStage> {
    let counts = FunnelStageKind::ORDER
        .map(|kind| edges.iter().filter(|e| kind.reached(e)).count() as u64);
    let targeted = counts[0];

    debug!(
        targeted,
        opened = counts[1],
        clicked = counts[2],
        converted = counts[3],
        "Funnel aggregated"
    );

    FunnelStageKind::ORDER
        .into_iter()
        .zip(counts)
        .map(|(name, count)| FunnelStage {
            name,
            count,
            percentage_of_targeted: percentage(count, targeted),
        })
        .collect()
}

/// Funnel over all edges together.
pub fn report(edges: &[CampaignTargetingEdge]) -> FunnelReport {
    FunnelReport::from_stages(None, aggregate(edges))
}

/// One funnel per campaign, ordered by campaign id.
pub fn aggregate_by_campaign(edges: &[CampaignTargetingEdge]) -> Vec<FunnelReport> {
    let mut grouped: BTreeMap<Uuid, Vec<CampaignTargetingEdge>> = BTreeMap::new();
    for edge in edges {
        grouped.entry(edge.campaign_id).or_default().push(edge.clone());
    }

    grouped
        .into_iter()
        .map(|(campaign_id, edges)| {
            FunnelReport::from_stages(Some(campaign_id), aggregate(&edges))
        })
        .collect()
}
