//! Rating perturbation — bounded noise on the selected ratings.
//!
//! One noise sample is drawn per slot, rated or not, so the stream advances
//! by the slate size regardless of the values. A rating of 0 (not watched)
//! is never changed, and a perturbed rating that would not stay positive
//! falls back to the original.

use std::fmt;

use rand::distributions::{Distribution, WeightedIndex};
use rand_chacha::ChaCha8Rng;
use rand_distr::Normal;

use crate::config::PerturbationConfig;
use crate::error::{Result, SimError};
use crate::rng::{self, RngStream};
use crate::types::RatingScale;

/// Adds noise to ratings in place.
pub trait PerturbationPolicy: fmt::Debug + Send {
    /// Perturb every positive rating of `ratings`.
    fn perturb(&mut self, ratings: &mut [f64]);

    /// Restart the random stream from `seed`.
    fn reseed(&mut self, seed: u64);
}

/// Build the perturbation policy described by `config`.
///
/// # Errors
/// `Config` if the jitter weights or the Gaussian parameters are invalid.
pub fn build(
    config: &PerturbationConfig,
    scale: RatingScale,
    seed: u64,
) -> Result<Box<dyn PerturbationPolicy>> {
    Ok(match config {
        PerturbationConfig::None => Box::new(IdentityPerturbation),
        PerturbationConfig::Jitter { probabilities } => {
            Box::new(JitterPerturbation::new(*probabilities, scale, seed)?)
        }
        PerturbationConfig::Gaussian { mean, std } => {
            Box::new(GaussianPerturbation::new(*mean, *std, scale, seed)?)
        }
    })
}

/// Apply one noise sample to one rating.
fn apply(scale: &RatingScale, rating: f64, noise: f64) -> f64 {
    if rating <= 0.0 {
        return rating;
    }
    let snapped = scale.snap_nearest(rating + noise);
    if snapped > 0.0 { snapped } else { rating }
}

/// Ratings pass through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityPerturbation;

impl PerturbationPolicy for IdentityPerturbation {
    fn perturb(&mut self, _ratings: &mut [f64]) {}

    fn reseed(&mut self, _seed: u64) {}
}

/// Shift each rating by −1, 0 or +1.
#[derive(Debug, Clone)]
pub struct JitterPerturbation {
    shifts: WeightedIndex<f64>,
    scale: RatingScale,
    rng: ChaCha8Rng,
}

impl JitterPerturbation {
    const SHIFTS: [f64; 3] = [-1.0, 0.0, 1.0];

    /// Create the policy with the weights of −1, 0 and +1.
    ///
    /// # Errors
    /// `Config` if the weights are negative or sum to zero.
    pub fn new(probabilities: [f64; 3], scale: RatingScale, seed: u64) -> Result<Self> {
        let shifts = WeightedIndex::new(probabilities)
            .map_err(|e| SimError::Config(format!("invalid jitter probabilities: {e}")))?;
        Ok(Self {
            shifts,
            scale,
            rng: rng::seeded(seed, RngStream::Perturbation),
        })
    }
}

impl PerturbationPolicy for JitterPerturbation {
    fn perturb(&mut self, ratings: &mut [f64]) {
        for rating in ratings.iter_mut() {
            let shift = Self::SHIFTS[self.shifts.sample(&mut self.rng)];
            *rating = apply(&self.scale, *rating, shift);
        }
    }

    fn reseed(&mut self, seed: u64) {
        self.rng = rng::seeded(seed, RngStream::Perturbation);
    }
}

/// Add `N(mean, std)` noise to each rating.
#[derive(Debug, Clone)]
pub struct GaussianPerturbation {
    noise: Normal<f64>,
    scale: RatingScale,
    rng: ChaCha8Rng,
}

impl GaussianPerturbation {
    /// Create the policy.
    ///
    /// # Errors
    /// `Config` if `std` is negative or not finite.
    pub fn new(mean: f64, std: f64, scale: RatingScale, seed: u64) -> Result<Self> {
        if !std.is_finite() || std < 0.0 {
            return Err(SimError::Config(format!(
                "gaussian perturbation std must be finite and >= 0, got {std}"
            )));
        }
        let noise = Normal::new(mean, std)
            .map_err(|e| SimError::Config(format!("invalid gaussian perturbation: {e}")))?;
        Ok(Self {
            noise,
            scale,
            rng: rng::seeded(seed, RngStream::Perturbation),
        })
    }
}

impl PerturbationPolicy for GaussianPerturbation {
    fn perturb(&mut self, ratings: &mut [f64]) {
        for rating in ratings.iter_mut() {
            let noise = self.noise.sample(&mut self.rng);
            *rating = apply(&self.scale, *rating, noise);
        }
    }

    fn reseed(&mut self, seed: u64) {
        self.rng = rng::seeded(seed, RngStream::Perturbation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn on_grid(scale: &RatingScale, value: f64) -> bool {
        let steps = value / scale.step;
        (steps - steps.round()).abs() < 1e-9 && scale.contains(value)
    }

    #[test]
    fn zero_ratings_are_untouched() {
        let mut policy =
            GaussianPerturbation::new(0.0, 3.0, RatingScale::default(), 42).expect("policy");
        for _ in 0..200 {
            let mut ratings = [0.0, 7.0, 0.0];
            policy.perturb(&mut ratings);
            assert!(ratings[0].abs() < f64::EPSILON);
            assert!(ratings[2].abs() < f64::EPSILON);
        }
    }

    #[test]
    fn results_stay_on_the_grid() {
        let scale = RatingScale {
            min: 1.0,
            max: 10.0,
            step: 0.5,
        };
        let mut gaussian = GaussianPerturbation::new(0.0, 2.0, scale, 7).expect("policy");
        let mut jitter = JitterPerturbation::new([0.3, 0.4, 0.3], scale, 7).expect("policy");
        for _ in 0..500 {
            let mut ratings = [1.0, 5.5, 10.0];
            gaussian.perturb(&mut ratings);
            assert!(ratings.iter().all(|r| on_grid(&scale, *r)));
            let mut ratings = [1.0, 5.5, 10.0];
            jitter.perturb(&mut ratings);
            assert!(ratings.iter().all(|r| on_grid(&scale, *r)));
        }
    }

    #[test]
    fn jitter_moves_at_most_one() {
        let mut policy =
            JitterPerturbation::new([0.1, 0.8, 0.1], RatingScale::default(), 42).expect("policy");
        for _ in 0..500 {
            let mut ratings = [5.0];
            policy.perturb(&mut ratings);
            assert!(
                [4.0, 5.0, 6.0].iter().any(|r| (r - ratings[0]).abs() < f64::EPSILON)
            );
        }
    }

    #[test]
    fn non_positive_result_keeps_original() {
        let scale = RatingScale {
            min: -5.0,
            max: 10.0,
            step: 1.0,
        };
        let mut policy = JitterPerturbation::new([1.0, 0.0, 0.0], scale, 1).expect("policy");
        let mut ratings = [1.0];
        policy.perturb(&mut ratings);
        assert!((ratings[0] - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn reseed_replays_the_sequence() {
        let mut policy =
            GaussianPerturbation::new(0.0, 1.0, RatingScale::default(), 3).expect("policy");
        let mut first = [5.0; 16];
        policy.perturb(&mut first);
        policy.reseed(3);
        let mut second = [5.0; 16];
        policy.perturb(&mut second);
        assert_eq!(first, second);
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        assert!(
            JitterPerturbation::new([0.0, 0.0, 0.0], RatingScale::default(), 0).is_err()
        );
        assert!(
            GaussianPerturbation::new(0.0, -1.0, RatingScale::default(), 0).is_err()
        );
        assert!(
            GaussianPerturbation::new(0.0, f64::NAN, RatingScale::default(), 0).is_err()
        );
        assert!(
            GaussianPerturbation::new(0.0, 0.0, RatingScale::default(), 0).is_ok()
        );
    }
}
