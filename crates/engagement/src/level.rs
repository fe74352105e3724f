use serde::{Deserialize, Serialize};

/// Coarse buckets over the 0–100 engagement score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngagementLevel {
    Cold,     // 0-20
    Warming,  // 21-40
    Engaged,  // 41-60
    Hot,      // 61-80
    Champion, // 81-100
}

impl EngagementLevel {
    pub fn from_score(score: f64) -> Self {
        match score.clamp(0.0, 100.0) as u32 {
            0..=20 => EngagementLevel::Cold,
            21..=40 => EngagementLevel::Warming,
            41..=60 => EngagementLevel::Engaged,
            61..=80 => EngagementLevel::Hot,
            _ => EngagementLevel::Champion,
        }
    }

    pub fn recommended_action(&self) -> &'static str {
        match self {
            EngagementLevel::Cold => "Run a re-engagement sequence or drop from active lists",
            EngagementLevel::Warming => "Nurture with useful content",
            EngagementLevel::Engaged => "Invite to events or offer a demo",
            EngagementLevel::Hot => "Reach out directly and book a call",
            EngagementLevel::Champion => "Ask for a referral or a case study",
        }
    }
}

/// Direction of recent engagement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngagementTrend {
    Declining,
    Stable,
    Improving,
}

impl EngagementTrend {
    /// Classifies a change in period score against a symmetric tolerance band.
    pub fn classify(recent_change: f64, tolerance: f64) -> Self {
        if recent_change > tolerance {
            EngagementTrend::Improving
        } else if recent_change < -tolerance {
            EngagementTrend::Declining
        } else {
            EngagementTrend::Stable
        }
    }
}
