//! Tier-interval math for the scheduler (C6, §4.5).
//!
//! Every feed has a `tier ∈ [0, MAX_TIER]`; its poll interval is
//! `2^tier minutes`. Pure so the monotonicity properties (§8 #2, #3) can be
//! tested without a clock or database.

use super::*;

pub const MAX_TIER: u8 = 10;

/// Poll interval for a given tier: `2^tier` minutes, clamped to
/// `[0, MAX_TIER]`.
pub fn interval(tier: u8) -> Duration {
    let tier = tier.min(MAX_TIER);
    Duration::from_minutes(1i64 << tier)
}

/// Outcome of a single poll, used to adjust a feed's tier (§4.5).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollOutcome {
    /// Fetch succeeded and yielded at least one new item.
    NewItems,
    /// Fetch succeeded (200 or 304) but nothing new.
    NoNewItems,
    /// Fetch failed (timeout, non-2xx, parse error).
    Error,
}

/// A feed's cadence state: its tier and its run of consecutive
/// no-new-items polls.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TierState {
    pub tier: u8,
    pub unmodified: u32,
}

/// Compute the next `(tier, unmodified)` given the current state and a poll
/// outcome (§4.5, §8 property 2):
///
/// - New items: tier drops to `max(0, tier-1)`, `unmodified` resets to 0.
/// - No new items: `unmodified` increments; once it reaches
///   `max(2, tier)`, tier increments (clamped to `MAX_TIER`) and
///   `unmodified` resets to 0. Otherwise tier is unchanged.
/// - Error: as "no new items", plus one extra tier step (bounded at
///   `MAX_TIER`) to avoid retry storms.
pub fn calculate_new_tier(current: TierState, outcome: PollOutcome) -> TierState {
    match outcome {
        PollOutcome::NewItems => TierState { tier: current.tier.saturating_sub(1), unmodified: 0 },
        PollOutcome::NoNewItems => step_on_no_new_items(current, 0),
        PollOutcome::Error => step_on_no_new_items(current, 1),
    }
}

fn step_on_no_new_items(current: TierState, extra_tier_steps: u8) -> TierState {
    let unmodified = current.unmodified + 1;
    if unmodified >= (current.tier as u32).max(2) && current.tier < MAX_TIER {
        TierState { tier: (current.tier + 1 + extra_tier_steps).min(MAX_TIER), unmodified: 0 }
    } else {
        TierState { tier: (current.tier + extra_tier_steps).min(MAX_TIER), unmodified }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_doubles_per_tier() {
        assert_eq!(interval(0).to_std().as_secs(), 60);
        assert_eq!(interval(1).to_std().as_secs(), 120);
        assert_eq!(interval(10).to_std().as_secs(), 60 * 1024);
    }

    #[test]
    fn interval_clamps_above_max_tier() {
        assert_eq!(interval(50), interval(MAX_TIER));
    }

    #[test]
    fn new_items_resets_to_zero_tier_and_unmodified() {
        let next = calculate_new_tier(TierState { tier: 7, unmodified: 3 }, PollOutcome::NewItems);
        assert_eq!(next, TierState { tier: 6, unmodified: 0 });
    }

    #[test]
    fn no_new_items_below_threshold_only_bumps_unmodified() {
        // tier=3, threshold is max(2,3)=3; unmodified 0->1 stays under threshold.
        let next = calculate_new_tier(TierState { tier: 3, unmodified: 0 }, PollOutcome::NoNewItems);
        assert_eq!(next, TierState { tier: 3, unmodified: 1 });
    }

    #[test]
    fn no_new_items_at_threshold_bumps_tier_and_resets() {
        let next = calculate_new_tier(TierState { tier: 3, unmodified: 2 }, PollOutcome::NoNewItems);
        assert_eq!(next, TierState { tier: 4, unmodified: 0 });
    }

    #[test]
    fn threshold_uses_floor_of_two_for_low_tiers() {
        // tier=1, threshold is max(2,1)=2.
        let next = calculate_new_tier(TierState { tier: 1, unmodified: 1 }, PollOutcome::NoNewItems);
        assert_eq!(next, TierState { tier: 2, unmodified: 0 });
    }

    #[test]
    fn error_bumps_one_step_beyond_no_new_items_and_clamps() {
        let next = calculate_new_tier(TierState { tier: 3, unmodified: 2 }, PollOutcome::Error);
        assert_eq!(next, TierState { tier: 5, unmodified: 0 });

        let clamped = calculate_new_tier(TierState { tier: MAX_TIER, unmodified: 0 }, PollOutcome::Error);
        assert_eq!(clamped.tier, MAX_TIER);
    }

    #[test]
    fn fifteen_zero_item_fetches_from_tier_one_climb_monotonically() {
        // The §4.5 threshold rule (unmodified >= max(2,tier)) needs 46
        // no-new-items fetches to climb tier 1 -> 10, not 15 -- reaching
        // MAX_TIER in 15 steps requires an unconditional +1-per-fetch rule,
        // which contradicts the unit-level formula in §8 property 2. We
        // follow the precise, testable per-step formula and assert
        // monotonic, threshold-consistent growth instead of the terminal
        // tier narrated in §8 scenario S3 (see DESIGN.md).
        let mut state = TierState { tier: 1, unmodified: 0 };
        let mut prev_tier = state.tier;
        for _ in 0..15 {
            state = calculate_new_tier(state, PollOutcome::NoNewItems);
            assert!(state.tier >= prev_tier);
            prev_tier = state.tier;
        }
        assert_eq!(state, TierState { tier: 5, unmodified: 4 });
    }
}
