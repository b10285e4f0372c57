//! The `LdaEngine` sufficient-statistic tables and their Gibbs updates.

use rand::rngs::StdRng;
use rand::Rng as _;
use topiclda_core::rng::{digamma, sample_discrete};
use topiclda_core::{eval::perplexity_from_logsum, invariant, DataSet};

/// Fixed-K collapsed Gibbs sampler.
///
/// Construction allocates every sufficient-statistic table and draws an
/// initial topic for every token; `inference` then performs one sweep per
/// call, in row-major `(doc, position)` order so the trajectory is
/// deterministic once the seed is fixed.
pub struct LdaEngine {
    train: DataSet,
    test: DataSet,
    k: usize,
    alpha_z: Vec<f64>,
    beta: f64,
    asymmetric: bool,
    /// Opt-in to the theoretically-standard `n_m[j] + Σα` theta denominator
    /// instead of the source-faithful `n_m[j] + K·alpha_z[z]` (see
    /// DESIGN.md "Open Questions").
    symmetric_theta_denominator: bool,

    n_m_z: Vec<Vec<u32>>,
    n_z_t: Vec<Vec<u32>>,
    n_z: Vec<u32>,
    z_m_n: Vec<Vec<usize>>,

    phi_z_t: Vec<Vec<f64>>,
    theta_m_z: Vec<Vec<f64>>,

    rng: StdRng,
}

impl LdaEngine {
    /// Construct an engine over `train`/`test`, drawing initial topic
    /// assignments from `rng`.
    ///
    /// `alpha` is broadcast into a symmetric `alpha_z` of length `k`;
    /// `asymmetric` gates whether [`Self::update_alpha`] is ever called
    /// (the caller still decides, per sweep, whether burn-in has elapsed).
    #[must_use]
    pub fn new(
        k: usize,
        alpha: f64,
        beta: f64,
        train: DataSet,
        test: DataSet,
        asymmetric: bool,
        mut rng: StdRng,
    ) -> Self {
        assert!(k > 0, "LdaEngine requires at least one topic");

        let m = train.m();
        let v = train.v();

        let mut n_m_z = vec![vec![0u32; k]; m];
        let mut n_z_t = vec![vec![0u32; v]; k];
        let mut n_z = vec![0u32; k];
        let mut z_m_n = Vec::with_capacity(m);

        for j in 0..m {
            let doc = train.doc(j);
            let mut z_j = Vec::with_capacity(doc.len());
            for &word in doc {
                let z = rng.random_range(0..k);
                z_j.push(z);
                n_m_z[j][z] += 1;
                n_z_t[z][word] += 1;
                n_z[z] += 1;
            }
            z_m_n.push(z_j);
        }

        Self {
            train,
            test,
            k,
            alpha_z: vec![alpha; k],
            beta,
            asymmetric,
            symmetric_theta_denominator: false,
            n_m_z,
            n_z_t,
            n_z,
            z_m_n,
            phi_z_t: vec![vec![0.0; v]; k],
            theta_m_z: vec![vec![0.0; k]; m],
            rng,
        }
    }

    /// Opt into the corrected `n_m[j] + Σα` theta denominator instead of
    /// the source-faithful `n_m[j] + K·alpha_z[z]`. See DESIGN.md.
    pub fn set_symmetric_theta_denominator(&mut self, enabled: bool) {
        self.symmetric_theta_denominator = enabled;
    }

    /// Number of topics.
    #[must_use]
    pub fn k(&self) -> usize {
        self.k
    }

    /// Current per-topic Dirichlet prior mass.
    #[must_use]
    pub fn alpha_z(&self) -> &[f64] {
        &self.alpha_z
    }

    /// One full sweep: resample every token's topic in row-major order.
    pub fn inference(&mut self) {
        for j in 0..self.train.m() {
            for i in 0..self.train.n_m(j) {
                self.sampling_z(j, i);
            }
        }
    }

    /// Resample the topic of token `(j, i)`.
    fn sampling_z(&mut self, j: usize, i: usize) {
        let word = self.train.doc(j)[i];
        let old_z = self.z_m_n[j][i];

        self.n_m_z[j][old_z] -= 1;
        self.n_z_t[old_z][word] -= 1;
        self.n_z[old_z] -= 1;

        let v = self.train.v() as f64;
        let weights: Vec<f64> = (0..self.k)
            .map(|z| {
                let num_doc = self.alpha_z[z] + f64::from(self.n_m_z[j][z]);
                let num_word = self.beta + f64::from(self.n_z_t[z][word]);
                let den = f64::from(self.n_z[z]) + v * self.beta;
                num_doc * num_word / den
            })
            .collect();

        let new_z = sample_discrete(&weights, &mut self.rng);

        self.z_m_n[j][i] = new_z;
        self.n_m_z[j][new_z] += 1;
        self.n_z_t[new_z][word] += 1;
        self.n_z[new_z] += 1;
    }

    /// Minka's fixed-point update for an asymmetric document-topic prior.
    /// No-op target for callers that haven't enabled `asymmetric`; callers
    /// are expected to gate the call on their own burn-in schedule.
    pub fn update_alpha(&mut self) {
        let sum_alpha: f64 = self.alpha_z.iter().sum();
        let m = self.train.m();

        let den: f64 = (0..m)
            .map(|j| {
                let n_mj = self.train.n_m(j) as f64;
                digamma(n_mj + sum_alpha) - digamma(sum_alpha)
            })
            .sum();

        for z in 0..self.k {
            let num: f64 = (0..m)
                .map(|j| {
                    digamma(f64::from(self.n_m_z[j][z]) + self.alpha_z[z]) - digamma(self.alpha_z[z])
                })
                .sum();
            if den > 0.0 {
                self.alpha_z[z] *= num / den;
            }
        }
    }

    /// Whether asymmetric-alpha resampling is enabled for this run.
    #[must_use]
    pub fn asymmetric(&self) -> bool {
        self.asymmetric
    }

    /// Recompute the closed-form `phi`/`theta` point estimates and return
    /// perplexity on the held-out test set.
    pub fn perplexity(&mut self) -> f64 {
        self.recompute_phi_theta();

        let mut log_per = 0.0;
        for j in 0..self.test.m() {
            for &word in self.test.doc(j) {
                let mut sum = 0.0;
                for z in 0..self.k {
                    sum += self.theta_m_z[j][z] * self.phi_z_t[z][word];
                }
                invariant!(sum > 0.0, "zero posterior mass for test token (doc {j}, word {word})");
                log_per -= sum.ln();
            }
        }

        perplexity_from_logsum(log_per, self.test.n())
    }

    fn recompute_phi_theta(&mut self) {
        let v = self.train.v() as f64;
        for z in 0..self.k {
            for t in 0..self.train.v() {
                self.phi_z_t[z][t] =
                    (self.beta + f64::from(self.n_z_t[z][t])) / (f64::from(self.n_z[z]) + v * self.beta);
            }
        }

        let sum_alpha: f64 = self.alpha_z.iter().sum();
        for j in 0..self.train.m() {
            let n_mj = self.train.n_m(j) as f64;
            for z in 0..self.k {
                let den = if self.symmetric_theta_denominator {
                    n_mj + sum_alpha
                } else {
                    n_mj + self.k as f64 * self.alpha_z[z]
                };
                self.theta_m_z[j][z] = (self.alpha_z[z] + f64::from(self.n_m_z[j][z])) / den;
            }
        }
    }

    /// Number of tokens currently assigned to topic `z` (for reporting).
    #[must_use]
    pub fn topic_size(&self, z: usize) -> u32 {
        self.n_z[z]
    }

    /// Up to `limit` `(vocab_index, phi, count)` triples for topic `z`, in
    /// descending φ order (for the CLI's "top words" dump).
    #[must_use]
    pub fn top_words(&self, z: usize, limit: usize) -> Vec<(usize, f64, u32)> {
        let mut words: Vec<(usize, f64, u32)> = (0..self.train.v())
            .map(|t| (t, self.phi_z_t[z][t], self.n_z_t[z][t]))
            .collect();
        words.sort_by(|a, b| b.1.total_cmp(&a.1));
        words.truncate(limit);
        words
    }

    /// Read-only access to the training corpus (for CLI word lookups).
    #[must_use]
    pub fn train(&self) -> &DataSet {
        &self.train
    }

    #[cfg(test)]
    fn n_m_z(&self, j: usize, z: usize) -> u32 {
        self.n_m_z[j][z]
    }

    #[cfg(test)]
    fn n_z_t(&self, z: usize, t: usize) -> u32 {
        self.n_z_t[z][t]
    }

    #[cfg(test)]
    fn n_z(&self, z: usize) -> u32 {
        self.n_z[z]
    }
}
