//! Pure decay and pruning rules.

use chrono::{DateTime, Duration, Utc};
use mnemo_types::config::DecayConfig;
use mnemo_types::entity::{Entity, clamp_confidence};

/// What one decay pass should do to an entity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DecayDecision {
    /// Touched within the grace period.
    Exempt,
    /// The change would be smaller than the minimum step.
    Unchanged,
    /// Store this new confidence.
    Decay(f32),
}

/// Decide how to decay `entity` at `now`.
///
/// Elapsed days are counted from the later of `updated_at` and
/// `last_decayed_at`, so a pass never re-applies decay already stored and a
/// second pass with no intervening mutation is a no-op.
pub fn decide_decay(entity: &Entity, now: DateTime<Utc>, config: &DecayConfig) -> DecayDecision {
    if now - entity.updated_at < Duration::days(config.grace_period_days) {
        return DecayDecision::Exempt;
    }

    let reference = entity
        .last_decayed_at
        .map_or(entity.updated_at, |decayed| decayed.max(entity.updated_at));
    let elapsed_days = (now - reference).num_seconds().max(0) as f64 / 86_400.0;

    let factor = (1.0 - config.decay_rate).clamp(0.0, 1.0).powf(elapsed_days);
    let current = entity.confidence;
    let decayed = clamp_confidence((f64::from(current) * factor) as f32);

    if (current - decayed).abs() < config.min_change {
        DecayDecision::Unchanged
    } else {
        DecayDecision::Decay(decayed)
    }
}

/// Few mentions, no relationships, and low confidence.
pub fn is_prunable(entity: &Entity, config: &DecayConfig) -> bool {
    entity.stats.total_mentions < config.prune_max_mentions
        && entity.relationships.is_empty()
        && entity.confidence < config.prune_max_confidence
}

#[cfg(test)]
mod tests {
    use super::*;
    use mnemo_types::entity::{EntityType, MIN_CONFIDENCE};
    use uuid::Uuid;

    fn entity_updated_days_ago(days: i64, confidence: f32) -> (Entity, DateTime<Utc>) {
        let now = Utc::now();
        let mut e = Entity::new(Uuid::nil(), "Legacy API", EntityType::Technology);
        e.updated_at = now - Duration::days(days);
        e.confidence = confidence;
        (e, now)
    }

    #[test]
    fn test_grace_period_exempt() {
        let config = DecayConfig::default();
        let (e, now) = entity_updated_days_ago(6, 1.0);
        assert_eq!(decide_decay(&e, now, &config), DecayDecision::Exempt);
    }

    #[test]
    fn test_decay_follows_exponential() {
        let config = DecayConfig::default();
        let (e, now) = entity_updated_days_ago(30, 1.0);
        let DecayDecision::Decay(c) = decide_decay(&e, now, &config) else {
            panic!("expected decay");
        };
        let expected = 0.99_f64.powi(30) as f32;
        assert!((c - expected).abs() < 1e-4);
    }

    #[test]
    fn test_decay_floors_at_min_confidence() {
        let config = DecayConfig::default();
        let (e, now) = entity_updated_days_ago(2000, 0.5);
        assert_eq!(decide_decay(&e, now, &config), DecayDecision::Decay(MIN_CONFIDENCE));

        let (at_floor, now) = entity_updated_days_ago(2000, MIN_CONFIDENCE);
        assert_eq!(decide_decay(&at_floor, now, &config), DecayDecision::Unchanged);
    }

    #[test]
    fn test_out_of_range_confidence_is_clamped() {
        let config = DecayConfig::default();
        let (e, now) = entity_updated_days_ago(30, 1.5);
        assert_eq!(decide_decay(&e, now, &config), DecayDecision::Decay(1.0));

        let (e, now) = entity_updated_days_ago(30, f32::NAN);
        assert_eq!(decide_decay(&e, now, &config), DecayDecision::Decay(MIN_CONFIDENCE));
    }

    #[test]
    fn test_small_change_skipped() {
        let config = DecayConfig::default();
        // 8 days at 0.2: 0.2 * (1 - 0.99^8) ~= 0.015 -> applied
        let (e, now) = entity_updated_days_ago(8, 0.2);
        assert!(matches!(decide_decay(&e, now, &config), DecayDecision::Decay(_)));
        // 8 days at 0.11 drops below the floor step
        let (e, now) = entity_updated_days_ago(8, 0.11);
        assert_eq!(decide_decay(&e, now, &config), DecayDecision::Unchanged);
    }

    #[test]
    fn test_second_pass_is_noop() {
        let config = DecayConfig::default();
        let (mut e, now) = entity_updated_days_ago(40, 1.0);
        let DecayDecision::Decay(c) = decide_decay(&e, now, &config) else {
            panic!("expected decay");
        };
        e.confidence = c;
        e.last_decayed_at = Some(now);
        assert_eq!(decide_decay(&e, now, &config), DecayDecision::Unchanged);
    }

    #[test]
    fn test_is_prunable() {
        let config = DecayConfig::default();
        let (mut e, _) = entity_updated_days_ago(100, 0.2);
        e.stats.total_mentions = 1;
        assert!(is_prunable(&e, &config));

        e.stats.total_mentions = 2;
        assert!(!is_prunable(&e, &config));

        e.stats.total_mentions = 1;
        e.confidence = 0.3;
        assert!(!is_prunable(&e, &config));
    }
}
