//! Engine-owned PRNG plumbing: seed resolution, the Beta(a,b) sampler built
//! from two Gammas, and the discrete-distribution draw used by every
//! collapsed-Gibbs update.
//!
//! Every random draw an engine makes (initial topic assignment, per-token
//! resampling, hyperparameter resampling) comes from one
//! [`rand::rngs::StdRng`] seeded once at construction, so that identical
//! seed + corpus + hyperparameters reproduce a bit-identical trajectory.
//! No other source of randomness is permitted.

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Gamma};

/// Resolve a run's seed: an explicit `--seed` wins, otherwise fall back to
/// OS entropy. Centralized so the CLI and tests share one tie-breaking rule.
#[must_use]
pub fn resolve_seed(explicit: Option<u64>) -> u64 {
    explicit.unwrap_or_else(rand::random)
}

/// Construct the engine-owned generator for a resolved seed.
#[must_use]
pub fn seeded_rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// Draw `X ~ Gamma(a, 1)`, `Y ~ Gamma(b, 1)`, return `X / (X + Y) ∈ (0, 1)`.
///
/// Callers are responsible for keeping `a, b` away from the degenerate
/// `<= 0` regime; this function applies no clamping of its own.
pub fn sample_beta(a: f64, b: f64, rng: &mut StdRng) -> f64 {
    let ga = Gamma::new(a, 1.0).expect("Gamma shape parameter `a` must be positive");
    let gb = Gamma::new(b, 1.0).expect("Gamma shape parameter `b` must be positive");
    let x = ga.sample(rng);
    let y = gb.sample(rng);
    x / (x + y)
}

/// Draw from `Gamma(shape, scale)` under the shape/scale convention (not
/// shape/rate), matching the hyperparameter resampling formulas used to
/// resample α and γ.
pub fn sample_gamma(shape: f64, scale: f64, rng: &mut StdRng) -> f64 {
    let g = Gamma::new(shape, scale).expect("Gamma shape/scale parameters must be positive");
    g.sample(rng)
}

/// Sample an index in `[0, weights.len())` proportional to `weights`.
///
/// `weights` need not be normalized and may contain zeros (as long as at
/// least one entry is strictly positive); this is the single discrete-
/// sampling kernel both engines funnel their posterior draws through.
///
/// # Panics
/// Panics if `weights` is empty or every entry is non-positive. Both
/// indicate a broken sufficient-statistic invariant upstream; numerical
/// underflow here is an `InvariantViolation`, not a soft error.
pub fn sample_discrete(weights: &[f64], rng: &mut StdRng) -> usize {
    use rand::Rng;

    let total: f64 = weights.iter().sum();
    crate::invariant!(
        total.is_finite() && total > 0.0,
        "discrete distribution has non-positive or non-finite total mass ({total}); weights={weights:?}"
    );

    let mut draw = rng.random_range(0.0..total);
    for (i, &w) in weights.iter().enumerate() {
        if draw < w {
            return i;
        }
        draw -= w;
    }
    // Floating-point rounding can leave `draw` fractionally positive after the
    // last subtraction; fall back to the last weight-bearing index.
    weights
        .iter()
        .rposition(|&w| w > 0.0)
        .unwrap_or(weights.len() - 1)
}

/// Digamma function (logarithmic derivative of Gamma), used by the
/// asymmetric-alpha fixed-point update. Delegates to `statrs` for standard
/// double precision.
#[must_use]
pub fn digamma(x: f64) -> f64 {
    statrs::function::gamma::digamma(x)
}
