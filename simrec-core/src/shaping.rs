//! Reward shaping — turns the watched item's rating into the step reward.
//!
//! Repeat consumption is where shaping matters: rating backends tend to give
//! the same item the same score every time, so the decaying strategies scale
//! a repeat by
//!
//!   factor = q^(watch_count / elapsed)
//!
//! Where:
//!   watch_count = watch count of the latest record
//!   elapsed     = step_index difference of the last two records (at least 1)
//!
//! A first watch (a single record) is always passed through untouched.

use std::fmt;

use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::config::ShapingConfig;
use crate::memory::InteractionRecord;
use crate::rng::{self, RngStream};
use crate::types::RatingScale;

/// Shaped reward of one step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Shaped {
    /// Reward returned to the agent.
    pub reward: f64,
    /// Whether the shaper forces the episode to end.
    pub terminate: bool,
}

impl Shaped {
    fn keep(reward: f64) -> Self {
        Self {
            reward,
            terminate: false,
        }
    }
}

/// Maps `(history of the watched item, raw rating)` to a reward.
pub trait RewardShaper: fmt::Debug + Send {
    /// Shape `raw`, given the chronological records of the watched item
    /// including the one just recorded.
    fn reshape(&mut self, history: &[InteractionRecord], raw: f64) -> Shaped;

    /// Restart the random stream from `seed`. Deterministic shapers ignore this.
    fn reseed(&mut self, _seed: u64) {}
}

/// Build the shaper described by `config`.
#[must_use]
pub fn build(config: &ShapingConfig, scale: RatingScale, seed: u64) -> Box<dyn RewardShaper> {
    match config {
        ShapingConfig::Identity => Box::new(IdentityShaping),
        ShapingConfig::ExpDecay { q } => Box::new(ExpDecayShaping { q: *q, scale }),
        ShapingConfig::RandomRewatch { q } => Box::new(RandomRewatchShaping::new(*q, seed)),
        ShapingConfig::TerminateOnRepeat => Box::new(TerminateOnRepeatShaping),
    }
}

/// `q^(watch_count / elapsed)` for a repeat, `None` for a first watch.
#[must_use]
pub fn repeat_factor(history: &[InteractionRecord], q: f64) -> Option<f64> {
    let [.., previous, latest] = history else {
        return None;
    };
    let elapsed = latest.step_index.saturating_sub(previous.step_index).max(1);
    Some(q.powf(f64::from(latest.watch_count) / elapsed as f64))
}

/// Reward equals the rating.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityShaping;

impl RewardShaper for IdentityShaping {
    fn reshape(&mut self, _history: &[InteractionRecord], raw: f64) -> Shaped {
        Shaped::keep(raw)
    }
}

/// Repeats are scaled by the decay factor and floored onto the rating grid.
#[derive(Debug, Clone, Copy)]
pub struct ExpDecayShaping {
    /// Decay base.
    pub q: f64,
    /// Grid the decayed reward is floored onto.
    pub scale: RatingScale,
}

impl RewardShaper for ExpDecayShaping {
    fn reshape(&mut self, history: &[InteractionRecord], raw: f64) -> Shaped {
        match repeat_factor(history, self.q) {
            Some(factor) => Shaped::keep(self.scale.snap_floor(raw * factor)),
            None => Shaped::keep(raw),
        }
    }
}

/// Repeats keep their reward with probability equal to the decay factor,
/// otherwise earn nothing.
#[derive(Debug, Clone)]
pub struct RandomRewatchShaping {
    q: f64,
    rng: ChaCha8Rng,
}

impl RandomRewatchShaping {
    /// Create the shaper.
    #[must_use]
    pub fn new(q: f64, seed: u64) -> Self {
        Self {
            q,
            rng: rng::seeded(seed, RngStream::Shaping),
        }
    }
}

impl RewardShaper for RandomRewatchShaping {
    fn reshape(&mut self, history: &[InteractionRecord], raw: f64) -> Shaped {
        match repeat_factor(history, self.q) {
            Some(factor) if self.rng.gen_bool(factor.clamp(0.0, 1.0)) => Shaped::keep(raw),
            Some(_) => Shaped::keep(0.0),
            None => Shaped::keep(raw),
        }
    }

    fn reseed(&mut self, seed: u64) {
        self.rng = rng::seeded(seed, RngStream::Shaping);
    }
}

/// Any repeat ends the episode with zero reward.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminateOnRepeatShaping;

impl RewardShaper for TerminateOnRepeatShaping {
    fn reshape(&mut self, history: &[InteractionRecord], raw: f64) -> Shaped {
        if history.len() > 1 {
            Shaped {
                reward: 0.0,
                terminate: true,
            }
        } else {
            Shaped::keep(raw)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(step_index: u64, watch_count: u32) -> InteractionRecord {
        InteractionRecord {
            rating: 10.0,
            step_index,
            watch_count,
        }
    }

    #[test]
    fn first_watch_passes_through() {
        let history = [record(1, 1)];
        let mut decay = ExpDecayShaping {
            q: 0.1,
            scale: RatingScale::default(),
        };
        assert_eq!(decay.reshape(&history, 7.0), Shaped::keep(7.0));
        assert_eq!(
            TerminateOnRepeatShaping.reshape(&history, 7.0),
            Shaped::keep(7.0)
        );
        let mut rewatch = RandomRewatchShaping::new(0.0, 42);
        assert_eq!(rewatch.reshape(&history, 7.0), Shaped::keep(7.0));
    }

    #[test]
    fn exp_decay_of_consecutive_second_watch() {
        // 10 · 0.1^(2/1) = 0.1, floored to the unit grid.
        let history = [record(1, 1), record(2, 2)];
        let mut decay = ExpDecayShaping {
            q: 0.1,
            scale: RatingScale::default(),
        };
        let shaped = decay.reshape(&history, 10.0);
        assert!(shaped.reward.abs() < f64::EPSILON);
        assert!(!shaped.terminate);
    }

    #[test]
    fn exp_decay_softens_with_elapsed_steps() {
        // 10 · 0.5^(2/4) ≈ 7.07 → 7
        let history = [record(1, 1), record(5, 2)];
        let mut decay = ExpDecayShaping {
            q: 0.5,
            scale: RatingScale::default(),
        };
        assert!(
            (decay.reshape(&history, 10.0).reward - 7.0).abs() < f64::EPSILON
        );
    }

    #[test]
    fn terminate_on_repeat_zeroes_and_stops() {
        let history = [record(1, 1), record(3, 2)];
        let shaped = TerminateOnRepeatShaping.reshape(&history, 9.0);
        assert_eq!(
            shaped,
            Shaped {
                reward: 0.0,
                terminate: true
            }
        );
    }

    #[test]
    fn random_rewatch_extremes() {
        let history = [record(1, 1), record(2, 2)];
        let mut never = RandomRewatchShaping::new(0.0, 42);
        let mut always = RandomRewatchShaping::new(1.0, 42);
        for _ in 0..50 {
            assert!(never.reshape(&history, 8.0).reward.abs() < f64::EPSILON);
            assert!(
                (always.reshape(&history, 8.0).reward - 8.0).abs() < f64::EPSILON
            );
        }
    }

    #[test]
    fn repeat_factor_uses_at_least_one_elapsed_step() {
        let history = [record(4, 1), record(4, 2)];
        let factor = repeat_factor(&history, 0.5).expect("repeat");
        assert!((factor - 0.25).abs() < 1e-12);
    }
}
