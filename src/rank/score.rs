//! Pure score math. Everything here is deterministic over its inputs;
//! the engine owns the clock and the store.

use crate::domain::EngagementDelta;

#[derive(Clone, Copy, Debug)]
pub struct ScoreWeights {
    /// Recency window in days; past it an entry stops taking live bumps
    /// and starts decaying on the periodic pass.
    pub window_days: i64,
    pub comment_weight: i64,
    pub like_weight: i64,
    pub view_weight: i64,
    /// Added once at publish for administrator-authored entries.
    pub admin_bonus: i64,
    /// Decay never drives a score below this.
    pub floor: i64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            window_days: 3,
            comment_weight: 80,
            like_weight: 60,
            view_weight: 5,
            admin_bonus: 500,
            floor: 20,
        }
    }
}

impl ScoreWeights {
    pub fn window_hours(&self) -> i64 {
        self.window_days * 24
    }
}

/// Score assigned at publish: a head start that ranks a brand-new entry
/// above a window-old one with equal engagement.
pub fn initial_score(weights: &ScoreWeights, hours_since_creation: i64, admin: bool) -> i64 {
    let head_start = weights.window_hours() - hours_since_creation;
    if admin {
        head_start + weights.admin_bonus
    } else {
        head_start
    }
}

/// Additive fresh-state update.
pub fn bump(weights: &ScoreWeights, score: i64, delta: EngagementDelta) -> i64 {
    score
        + delta.comments * weights.comment_weight
        + delta.likes * weights.like_weight
        + delta.views * weights.view_weight
}

/// Re-seed for an in-window entry whose stored score is zero: the head
/// start plus its accumulated comment weight plus the incoming deltas.
pub fn seed_score(
    weights: &ScoreWeights,
    hours_since_creation: i64,
    comment_count: i64,
    delta: EngagementDelta,
) -> i64 {
    weights.window_hours() - hours_since_creation
        + (comment_count + delta.comments) * weights.comment_weight
        + delta.likes * weights.like_weight
        + delta.views * weights.view_weight
}

/// Stale-state recalibration step.
///
/// An entry that picked up a reply in the last hour takes a small penalty;
/// one with some other engagement signal in the last hour takes a larger
/// step; anything quieter is halved. Floored so stale entries stay weakly
/// discoverable instead of vanishing.
pub fn decay(
    weights: &ScoreWeights,
    score: i64,
    hours_since_reply: i64,
    hours_since_engagement: Option<i64>,
) -> i64 {
    let next = if hours_since_reply < 1 {
        score - weights.comment_weight / 10
    } else if hours_since_engagement.is_some_and(|h| h < 1) {
        score - weights.view_weight * 10
    } else {
        score / 2
    };
    next.max(weights.floor)
}
