//! Time-decayed engagement scoring over an interaction ledger.
//!
//! Each interaction contributes `weight * 0.5^(age_days / half_life_days)`.
//! All functions here are total over a validated [`EngagementConfig`].

use chrono::{DateTime, Utc};
use crm_core::{Interaction, InteractionType};
use serde::Serialize;
use tracing::debug;

use crate::config::EngagementConfig;
use crate::level::{EngagementLevel, EngagementTrend};

pub const MAX_SCORE: f64 = 100.0;

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Result of scoring one contact's ledger.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngagementScore {
    pub score: f64,
    pub velocity: f64,
    pub recent_change: f64,
    pub top_types: Vec<(InteractionType, f64)>,
    pub level: EngagementLevel,
    pub trend: EngagementTrend,
}

/// Sub-scores of the three velocity periods, most recent first.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Velocity {
    pub period_scores: [f64; 3],
    pub recent_change: f64,
    pub older_change: f64,
    pub velocity: f64,
}

/// Age in fractional days. Future timestamps count as age zero.
fn age_days(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let millis = (now - timestamp).num_milliseconds() as f64;
    (millis / MILLIS_PER_DAY).max(0.0)
}

fn decayed(weight: f64, age_days: f64, half_life_days: f64) -> f64 {
    weight * 0.5_f64.powf(age_days / half_life_days)
}

fn clamp_score(raw: f64) -> f64 {
    if raw.is_nan() {
        0.0
    } else {
        raw.clamp(0.0, MAX_SCORE)
    }
}

/// Decayed contribution of one interaction, or `None` when it falls outside
/// the lookback window.
pub fn contribution(
    interaction: &Interaction,
    config: &EngagementConfig,
    now: DateTime<Utc>,
) -> Option<f64> {
    let age = age_days(interaction.timestamp, now);
    if let Some(lookback) = config.lookback_days() {
        if age > f64::from(lookback) {
            return None;
        }
    }
    Some(decayed(
        config.weight(interaction.interaction_type),
        age,
        config.half_life_days(),
    ))
}

/// Sum of decayed contributions, clamped to `[0, 100]`.
pub fn score(interactions: &[Interaction], config: &EngagementConfig, now: DateTime<Utc>) -> f64 {
    let raw: f64 = interactions
        .iter()
        .filter_map(|i| contribution(i, config, now))
        .sum();
    clamp_score(raw)
}

/// Second difference of period scores across the velocity window.
///
/// The window is split into three equal periods ordered most-recent-first. Each
/// period is scored on its own, then
/// `velocity = (p0 - p1) - (p1 - p2)`.
pub fn velocity(
    interactions: &[Interaction],
    config: &EngagementConfig,
    now: DateTime<Utc>,
) -> Velocity {
    let window = f64::from(config.velocity_window_days());
    let period_len = window / 3.0;
    let mut raw = [0.0_f64; 3];

    for interaction in interactions {
        let age = age_days(interaction.timestamp, now);
        if age > window {
            continue;
        }
        // The final period is closed so an interaction exactly `window` days old still counts.
        let period = ((age / period_len).floor() as usize).min(2);
        raw[period] += decayed(
            config.weight(interaction.interaction_type),
            age,
            config.half_life_days(),
        );
    }

    let period_scores = raw.map(clamp_score);
    let recent_change = period_scores[0] - period_scores[1];
    let older_change = period_scores[1] - period_scores[2];

    Velocity {
        period_scores,
        recent_change,
        older_change,
        velocity: recent_change - older_change,
    }
}

/// Interaction types ranked by total decayed contribution, highest first.
///
/// Ties fall back to [`InteractionType::ALL`] order. Only types present in
/// the window are listed.
pub fn top_types(
    interactions: &[Interaction],
    config: &EngagementConfig,
    now: DateTime<Utc>,
    top_n: usize,
) -> Vec<(InteractionType, f64)> {
    let mut totals = [0.0_f64; InteractionType::COUNT];
    let mut seen = [false; InteractionType::COUNT];

    for interaction in interactions {
        if let Some(value) = contribution(interaction, config, now) {
            let idx = interaction.interaction_type.ordinal();
            totals[idx] += value;
            seen[idx] = true;
        }
    }

    let mut ranked: Vec<(InteractionType, f64)> = InteractionType::ALL
        .into_iter()
        .filter(|t| seen[t.ordinal()])
        .map(|t| (t, totals[t.ordinal()]))
        .collect();

    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.ordinal().cmp(&b.0.ordinal())));
    ranked.truncate(top_n);
    ranked
}

/// Score, velocity, top types, and derived level and trend in one pass over the config.
pub fn evaluate(
    interactions: &[Interaction],
    config: &EngagementConfig,
    now: DateTime<Utc>,
    top_n: usize,
) -> EngagementScore {
    let score = score(interactions, config, now);
    let velocity = velocity(interactions, config, now);
    let top_types = top_types(interactions, config, now, top_n);

    debug!(
        interactions = interactions.len(),
        score,
        velocity = velocity.velocity,
        recent_change = velocity.recent_change,
        "Engagement scored"
    );

    EngagementScore {
        score,
        velocity: velocity.velocity,
        recent_change: velocity.recent_change,
        top_types,
        level: EngagementLevel::from_score(score),
        trend: EngagementTrend::classify(velocity.recent_change, config.trend_tolerance()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;
    use std::collections::HashMap;
    use uuid::Uuid;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn at(interaction_type: InteractionType, days_ago: i64) -> Interaction {
        Interaction::new(Uuid::nil(), interaction_type, now() - Duration::days(days_ago))
    }

    fn single_weight(
        t: InteractionType,
        w: f64,
        half_life: f64,
        lookback: Option<u32>,
    ) -> EngagementConfig {
        let weights: HashMap<_, _> = [(t, w)].into_iter().collect();
        EngagementConfig::new(&weights, half_life, lookback).unwrap()
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_empty_interactions_score_zero() {
        let config = EngagementConfig::default();
        let result = evaluate(&[], &config, now(), 3);
        assert_eq!(result.score, 0.0);
        assert_eq!(result.velocity, 0.0);
        assert!(result.top_types.is_empty());
        assert_eq!(result.level, EngagementLevel::Cold);
        assert_eq!(result.trend, EngagementTrend::Stable);
    }

    #[test]
    fn test_half_life_decay() {
        let config = single_weight(InteractionType::EmailOpen, 3.0, 15.0, None);
        let interactions = vec![
            at(InteractionType::EmailOpen, 0),
            at(InteractionType::EmailOpen, 30),
        ];
        assert_close(score(&interactions, &config, now()), 3.75);
    }

    #[test]
    fn test_recent_interaction_contributes_more() {
        let config = EngagementConfig::default();
        let recent = contribution(&at(InteractionType::EmailOpen, 1), &config, now()).unwrap();
        let old = contribution(&at(InteractionType::EmailOpen, 60), &config, now()).unwrap();
        assert!(recent > old, "recent {recent} should exceed old {old}");
    }

    #[test]
    fn test_future_timestamp_counts_as_now() {
        let config = single_weight(InteractionType::Call, 10.0, 7.0, None);
        let future =
            Interaction::new(Uuid::nil(), InteractionType::Call, now() + Duration::days(3));
        assert_close(contribution(&future, &config, now()).unwrap(), 10.0);
    }

    #[test]
    fn test_score_is_clamped_to_100() {
        let config = EngagementConfig::default();
        let interactions: Vec<_> = (0..50).map(|d| at(InteractionType::EventAttend, d)).collect();
        assert_eq!(score(&interactions, &config, now()), MAX_SCORE);
    }

    #[test]
    fn test_huge_weights_never_overflow() {
        let config = single_weight(InteractionType::Note, f64::MAX, 30.0, None);
        let interactions: Vec<_> = (0..4).map(|_| at(InteractionType::Note, 0)).collect();
        assert_eq!(score(&interactions, &config, now()), MAX_SCORE);
    }

    #[test]
    fn test_lookback_excludes_old_interactions() {
        let config = single_weight(InteractionType::EmailClick, 5.0, 30.0, Some(30));
        let interactions = vec![
            at(InteractionType::EmailClick, 30),
            at(InteractionType::EmailClick, 31),
        ];
        assert_close(score(&interactions, &config, now()), 2.5);
    }

    #[test]
    fn test_accelerating_velocity_is_positive() {
        let config = EngagementConfig::default();
        let mut interactions = vec![];
        for d in 0..5 {
            interactions.push(at(InteractionType::EmailClick, d));
        }
        for d in 20..22 {
            interactions.push(at(InteractionType::EmailClick, d));
        }
        interactions.push(at(InteractionType::EmailClick, 35));

        let v = velocity(&interactions, &config, now());
        assert!(v.velocity > 0.0, "velocity {} should be positive", v.velocity);
    }

    #[test]
    fn test_decelerating_velocity_is_negative() {
        let config = EngagementConfig::default();
        let mut interactions = vec![];
        for d in 0..2 {
            interactions.push(at(InteractionType::EmailClick, d));
        }
        for d in 20..25 {
            interactions.push(at(InteractionType::EmailClick, d));
        }
        for d in 35..40 {
            interactions.push(at(InteractionType::EmailClick, d));
        }

        let v = velocity(&interactions, &config, now());
        assert!(v.velocity < 0.0, "velocity {} should be negative", v.velocity);
    }

    #[test]
    fn test_velocity_periods_follow_lookback() {
        let config = single_weight(InteractionType::Task, 1.0, 1000.0, Some(30));
        let interactions = vec![
            at(InteractionType::Task, 5),
            at(InteractionType::Task, 15),
            at(InteractionType::Task, 30),
            at(InteractionType::Task, 31),
        ];
        let v = velocity(&interactions, &config, now());
        assert!(v.period_scores.iter().all(|&p| p > 0.0));
        let [p0, p1, p2] = v.period_scores;
        assert_close(v.velocity, p0 - 2.0 * p1 + p2);
    }

    #[test]
    fn test_top_types_ranked_with_deterministic_ties() {
        let config = EngagementConfig::default();
        let interactions = vec![
            at(InteractionType::EmailSent, 0),
            at(InteractionType::EmailSent, 1),
            at(InteractionType::Call, 0),
            at(InteractionType::EventAttend, 0),
            at(InteractionType::EmailClick, 0),
        ];

        let top = top_types(&interactions, &config, now(), 3);
        assert_eq!(top.len(), 3);
        // Call and EventAttend tie at 15.0; EventAttend is declared first.
        assert_eq!(top[0].0, InteractionType::EventAttend);
        assert_eq!(top[1].0, InteractionType::Call);
        assert_eq!(top[2].0, InteractionType::EmailClick);
    }

    #[test]
    fn test_trend_reflects_recent_change() {
        let config = EngagementConfig::default();
        let interactions: Vec<_> = (0..6).map(|d| at(InteractionType::EventAttend, d)).collect();
        let result = evaluate(&interactions, &config, now(), 1);
        assert_eq!(result.trend, EngagementTrend::Improving);
        assert!(result.recent_change > config.trend_tolerance());
    }

    fn interaction_type() -> impl Strategy<Value = InteractionType> {
        (0..InteractionType::COUNT).prop_map(|i| InteractionType::ALL[i])
    }

    fn weight() -> impl Strategy<Value = f64> {
        prop_oneof![0.0..100.0f64, Just(0.0), Just(f64::MAX)]
    }

    fn ledger() -> impl Strategy<Value = Vec<(InteractionType, i64)>> {
        proptest::collection::vec((interaction_type(), -30i64..3650), 0..60)
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 96, .. ProptestConfig::default() })]

        #[test]
        fn test_score_stays_within_bounds(
            weights in proptest::collection::vec(weight(), InteractionType::COUNT),
            half_life in 0.01..3650.0f64,
            lookback in proptest::option::of(1u32..400),
            entries in ledger(),
        ) {
            let table: HashMap<_, _> = InteractionType::ALL.into_iter().zip(weights).collect();
            let config = EngagementConfig::new(&table, half_life, lookback).unwrap();
            let interactions: Vec<_> = entries.iter().map(|&(t, d)| at(t, d)).collect();

            let result = score(&interactions, &config, now());
            prop_assert!(result.is_finite());
            prop_assert!((0.0..=MAX_SCORE).contains(&result), "score {} out of range", result);
        }

        #[test]
        fn test_older_interaction_never_outweighs_newer(
            t in interaction_type(),
            w in 0.0..1000.0f64,
            half_life in 0.01..3650.0f64,
            newer in 0i64..3650,
            gap in 0i64..3650,
        ) {
            let config = single_weight(t, w, half_life, None);
            let recent = contribution(&at(t, newer), &config, now()).unwrap();
            let old = contribution(&at(t, newer + gap), &config, now()).unwrap();
            prop_assert!(old <= recent, "older {} exceeds newer {}", old, recent);
        }
    }
}
