//! Score-driven difficulty curve: obstacle speed and spawn interval.

pub(crate) const BASE_SPEED: i32 = 4;
pub(crate) const MAX_SPEED: i32 = 18;
/// Points needed for each +1 px/tick of obstacle speed.
pub(crate) const SCORE_PER_SPEED_STEP: u32 = 5;

pub(crate) const BASE_SPAWN_MS: u64 = 1000;
pub(crate) const MIN_SPAWN_MS: u64 = 350;
/// Milliseconds shaved off the spawn interval per point.
pub(crate) const SPAWN_DECAY_MS: u64 = 8;

/// Obstacle speed in world pixels per tick for a given score.
pub(crate) fn speed_for_score(score: u32) -> i32 {
    let steps = (score / SCORE_PER_SPEED_STEP).min(MAX_SPEED as u32) as i32;
    (BASE_SPEED + steps).min(MAX_SPEED)
}

/// Time between obstacle spawns for a given score.
pub(crate) fn spawn_interval_ms(score: u32) -> u64 {
    BASE_SPAWN_MS
        .saturating_sub(score as u64 * SPAWN_DECAY_MS)
        .max(MIN_SPAWN_MS)
}
