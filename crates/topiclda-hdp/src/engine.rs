//! The Chinese Restaurant Franchise sufficient-statistic tables and their
//! Gibbs updates.

use rand::rngs::StdRng;
use rand::Rng as _;
use topiclda_core::rng::{sample_beta, sample_discrete, sample_gamma};
use topiclda_core::{eval::perplexity_from_logsum, invariant, DataSet};

/// Nonparametric collapsed Gibbs sampler for HDP-LDA.
///
/// Restaurants are documents, tables seat customers (tokens), and dishes
/// are topics shared across restaurants. Table and dish slots are a
/// dynamic arena: a removed table/dish's index is reused by the next
/// `get_empty_table`/`get_new_dish` scan before the arena grows, so `K`
/// (the dish-slot count) and each document's table-slot count only ever
/// grow, while the *live* dish/table count governed by `dishes`/`tables`
/// can shrink back to zero.
pub struct HdpLdaEngine {
    train: DataSet,
    test: DataSet,

    alpha: f64,
    alpha_shape: f64,
    alpha_scale: f64,
    beta: f64,
    gamma: f64,
    gamma_shape: f64,
    gamma_scale: f64,

    /// `tables[j][t]` is whether table `t` of restaurant `j` is in use.
    tables: Vec<Vec<bool>>,
    /// `dishes[k]` is whether dish slot `k` currently holds a live topic.
    dishes: Vec<bool>,
    /// Dish-slot arena size (`dishes.len()`), not the live topic count.
    k: usize,

    /// `t_j_i[j][i]` is the table token `i` of document `j` is seated at,
    /// or `None` before its first assignment.
    t_j_i: Vec<Vec<Option<usize>>>,

    n_j_t: Vec<Vec<u32>>,
    n_j_t_v: Vec<Vec<Vec<u32>>>,

    n_k: Vec<u32>,
    n_k_v: Vec<Vec<u32>>,

    k_j_t: Vec<Vec<usize>>,

    /// Total live table count across all restaurants.
    m: usize,
    m_k: Vec<u32>,

    phi_k_v: Vec<Vec<f64>>,
    theta_j_k: Vec<Vec<f64>>,

    rng: StdRng,
}

impl HdpLdaEngine {
    /// Construct an engine with zero dishes and zero tables. The very
    /// first `inference()` sweep allocates everything: every token starts
    /// with `t_j_i[j][i] == None`, so `sampling_t` takes the "new table"
    /// branch for each one without any separate random-initialization pass.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        train: DataSet,
        test: DataSet,
        alpha: f64,
        alpha_shape: f64,
        alpha_scale: f64,
        beta: f64,
        gamma: f64,
        gamma_shape: f64,
        gamma_scale: f64,
        rng: StdRng,
    ) -> Self {
        invariant!(
            test.m() <= train.m(),
            "test set has more documents ({}) than the training set ({})",
            test.m(),
            train.m()
        );

        let m_docs = train.m();
        let t_j_i = (0..m_docs).map(|j| vec![None; train.n_m(j)]).collect();

        Self {
            tables: vec![Vec::new(); m_docs],
            dishes: Vec::new(),
            k: 0,
            t_j_i,
            n_j_t: vec![Vec::new(); m_docs],
            n_j_t_v: vec![Vec::new(); m_docs],
            n_k: Vec::new(),
            n_k_v: Vec::new(),
            k_j_t: vec![Vec::new(); m_docs],
            m: 0,
            m_k: Vec::new(),
            phi_k_v: Vec::new(),
            theta_j_k: vec![Vec::new(); m_docs],
            train,
            test,
            alpha,
            alpha_shape,
            alpha_scale,
            beta,
            gamma,
            gamma_shape,
            gamma_scale,
            rng,
        }
    }

    /// Current concentration parameter for the per-document (bottom-level)
    /// Dirichlet process.
    #[must_use]
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Current concentration parameter for the shared (top-level) Dirichlet
    /// process.
    #[must_use]
    pub fn gamma(&self) -> f64 {
        self.gamma
    }

    /// Number of dish slots currently holding a live topic.
    #[must_use]
    pub fn count_topics(&self) -> usize {
        self.dishes.iter().filter(|&&alive| alive).count()
    }

    /// Number of live tables in restaurant `j`.
    #[must_use]
    pub fn count_tables(&self, j: usize) -> usize {
        self.tables[j].iter().filter(|&&alive| alive).count()
    }

    /// One full sweep: resample every token's table, then every live
    /// table's dish, then resample both hyperparameters.
    pub fn inference(&mut self) {
        for j in 0..self.train.m() {
            for i in 0..self.train.n_m(j) {
                self.sampling_t(j, i);
            }
        }

        for j in 0..self.train.m() {
            for t in 0..self.tables[j].len() {
                if self.tables[j][t] {
                    self.sampling_k(j, t);
                }
            }
        }

        self.update_gamma();
        self.update_alpha();
    }

    /// Resample the table assignment of token `(j, i)`.
    fn sampling_t(&mut self, j: usize, i: usize) {
        let old_t = self.t_j_i[j][i];
        let word = self.train.doc(j)[i];

        if let Some(old_t) = old_t {
            let old_k = self.k_j_t[j][old_t];
            self.n_k[old_k] -= 1;
            self.n_k_v[old_k][word] -= 1;
            self.n_j_t[j][old_t] -= 1;
            self.n_j_t_v[j][old_t][word] -= 1;

            if self.n_j_t[j][old_t] == 0 {
                self.remove_table(j, old_t);
            }
        }

        let v = self.train.v() as f64;
        let f_k: Vec<f64> = (0..self.k)
            .map(|k| (self.beta + f64::from(self.n_k_v[k][word])) / (v * self.beta + f64::from(self.n_k[k])))
            .collect();

        let mut p_x = 0.0;
        for k in 0..self.k {
            p_x += f64::from(self.m_k[k]) * f_k[k];
        }
        p_x += self.gamma / v;
        p_x /= self.gamma + self.m as f64;

        let num_tables = self.tables[j].len();
        let mut p_t = vec![0.0; num_tables + 1];
        for t in 0..num_tables {
            p_t[t] = f64::from(self.n_j_t[j][t]) * f_k[self.k_j_t[j][t]];
        }
        p_t[num_tables] = self.alpha * p_x;

        let mut new_t = sample_discrete(&p_t, &mut self.rng);

        if new_t == num_tables {
            let mut p_k = vec![0.0; self.k + 1];
            for k in 0..self.k {
                p_k[k] = f64::from(self.m_k[k]) * f_k[k];
            }
            p_k[self.k] = self.gamma / v;

            let mut new_k = sample_discrete(&p_k, &mut self.rng);
            if new_k == self.k {
                new_k = self.assign_new_dish();
            }

            new_t = self.add_new_table(j, new_k);
        }

        let new_k = self.k_j_t[j][new_t];
        self.t_j_i[j][i] = Some(new_t);
        self.n_j_t[j][new_t] += 1;
        self.n_k[new_k] += 1;
        self.n_k_v[new_k][word] += 1;
        self.n_j_t_v[j][new_t][word] += 1;
    }

    /// Resample the dish assigned to table `t` of restaurant `j`.
    fn sampling_k(&mut self, j: usize, t: usize) {
        let old_k = self.k_j_t[j][t];
        let n_jt = self.n_j_t[j][t];

        self.n_k[old_k] -= n_jt;
        for word in 0..self.train.v() {
            self.n_k_v[old_k][word] -= self.n_j_t_v[j][t][word];
        }
        self.m_k[old_k] -= 1;
        if self.m_k[old_k] == 0 {
            self.remove_dish(old_k);
        }

        let v = self.train.v() as f64;
        let mut f_k = vec![0.0; self.k + 1];
        let mut max_f_k = f64::MIN;

        for k in 0..self.k {
            if self.m_k[k] == 0 {
                // Weighted by m_k[k] == 0 downstream either way; the value
                // itself is never read off the log-domain max.
                f_k[k] = 1.0;
                continue;
            }
            let mut numer = 0.0;
            let mut denom = 0.0;
            for n in 0..n_jt {
                denom += (v * self.beta + f64::from(self.n_k[k]) + f64::from(n)).ln();
            }
            for word in 0..self.train.v() {
                for n in 0..self.n_j_t_v[j][t][word] {
                    numer += (self.beta + f64::from(self.n_k_v[k][word]) + f64::from(n)).ln();
                }
            }
            f_k[k] = numer - denom;
            max_f_k = max_f_k.max(f_k[k]);
        }

        // f_k for a brand-new dish.
        let mut numer = 0.0;
        let mut denom = 0.0;
        for n in 0..n_jt {
            denom += (v * self.beta + f64::from(n)).ln();
        }
        for word in 0..self.train.v() {
            for n in 0..self.n_j_t_v[j][t][word] {
                numer += (self.beta + f64::from(n)).ln();
            }
        }
        f_k[self.k] = numer - denom;
        max_f_k = max_f_k.max(f_k[self.k]);

        for k in 0..self.k {
            if self.m_k[k] != 0 {
                f_k[k] = (f_k[k] - max_f_k).exp();
            }
        }
        f_k[self.k] = (f_k[self.k] - max_f_k).exp();

        let mut p_k = vec![0.0; self.k + 1];
        for k in 0..self.k {
            p_k[k] = f64::from(self.m_k[k]) * f_k[k];
        }
        p_k[self.k] = self.gamma * f_k[self.k];

        let mut new_k = sample_discrete(&p_k, &mut self.rng);
        if new_k == self.k {
            new_k = self.assign_new_dish();
        }

        self.k_j_t[j][t] = new_k;
        self.m_k[new_k] += 1;
        self.n_k[new_k] += n_jt;
        for word in 0..self.train.v() {
            self.n_k_v[new_k][word] += self.n_j_t_v[j][t][word];
        }
    }

    fn remove_table(&mut self, j: usize, t: usize) {
        let k = self.k_j_t[j][t];
        self.tables[j][t] = false;
        self.m -= 1;
        self.m_k[k] -= 1;
        if self.m_k[k] == 0 {
            self.remove_dish(k);
        }
    }

    fn remove_dish(&mut self, k: usize) {
        self.dishes[k] = false;
    }

    fn get_new_dish(&self) -> usize {
        self.dishes
            .iter()
            .position(|&alive| !alive)
            .unwrap_or(self.dishes.len())
    }

    fn assign_new_dish(&mut self) -> usize {
        let new_k = self.get_new_dish();
        if new_k == self.k {
            self.dishes.push(false);
            self.k = self.dishes.len();
            self.m_k.push(0);
            self.n_k.push(0);
            self.n_k_v.push(vec![0u32; self.train.v()]);
        }
        self.dishes[new_k] = true;
        new_k
    }

    fn get_empty_table(&self, j: usize) -> usize {
        self.tables[j]
            .iter()
            .position(|&alive| !alive)
            .unwrap_or(self.tables[j].len())
    }

    fn add_new_table(&mut self, j: usize, k: usize) -> usize {
        let new_t = self.get_empty_table(j);
        if new_t == self.tables[j].len() {
            self.tables[j].push(false);
            self.k_j_t[j].push(0);
            self.n_j_t[j].push(0);
            self.n_j_t_v[j].push(vec![0u32; self.train.v()]);
        }
        self.tables[j][new_t] = true;
        self.k_j_t[j][new_t] = k;
        self.m += 1;
        self.m_k[k] += 1;
        new_t
    }

    /// Resample `alpha` via Escobar & West's auxiliary-variable scheme
    /// (20 fixed-point steps, matching the reference implementation).
    fn update_alpha(&mut self) {
        for _ in 0..20 {
            let mut sum_log_w = 0.0;
            let mut sum_s = 0.0;
            for j in 0..self.train.m() {
                let n_mj = self.train.n_m(j) as f64;
                let w = sample_beta(self.alpha + 1.0, n_mj, &mut self.rng);
                sum_log_w += w.ln();

                let p = n_mj / (n_mj + self.alpha);
                if self.rng.random_bool(p.clamp(0.0, 1.0)) {
                    sum_s += 1.0;
                }
            }
            self.alpha = sample_gamma(
                self.alpha_shape + self.m as f64 - sum_s,
                1.0 / (self.alpha_scale - sum_log_w),
                &mut self.rng,
            );
        }
    }

    /// Resample `gamma` via Teh et al.'s auxiliary-variable scheme.
    fn update_gamma(&mut self) {
        let eta = sample_beta(self.gamma + 1.0, self.m as f64, &mut self.rng);
        let log_eta = eta.ln();
        let topics = self.count_topics() as f64;

        let scale = 1.0 / (self.gamma_scale - log_eta);
        let pi = (self.gamma_shape + topics - 1.0)
            / (self.gamma_shape + topics - 1.0 + self.m as f64 * (self.gamma_scale - log_eta));

        let g1 = sample_gamma(self.gamma_shape + topics, scale, &mut self.rng);
        let g2 = sample_gamma(self.gamma_shape + topics - 1.0, scale, &mut self.rng);
        self.gamma = pi * g1 + (1.0 - pi) * g2;
    }

    /// Recompute the closed-form `phi`/`theta` point estimates (including
    /// the "new dish" bucket at index `K`) and return perplexity on the
    /// held-out test set.
    pub fn perplexity(&mut self) -> f64 {
        self.recompute_phi_theta();

        let mut log_per = 0.0;
        for j in 0..self.test.m() {
            for &word in self.test.doc(j) {
                let mut sum = 0.0;
                for k in 0..self.k {
                    if self.dishes[k] {
                        sum += self.theta_j_k[j][k] * self.phi_k_v[k][word];
                    }
                }
                sum += self.theta_j_k[j][self.k] * self.phi_k_v[self.k][word];
                invariant!(
                    sum > 0.0,
                    "zero posterior mass for test token (doc {j}, word {word})"
                );
                log_per -= sum.ln();
            }
        }

        perplexity_from_logsum(log_per, self.test.n())
    }

    fn recompute_phi_theta(&mut self) {
        let v = self.train.v();
        let v_f = v as f64;

        self.phi_k_v = vec![Vec::new(); self.k + 1];
        for k in 0..self.k {
            if self.dishes[k] {
                self.phi_k_v[k] = (0..v)
                    .map(|word| (self.beta + f64::from(self.n_k_v[k][word])) / (v_f * self.beta + f64::from(self.n_k[k])))
                    .collect();
            }
        }
        self.phi_k_v[self.k] = vec![1.0 / v_f; v];

        self.theta_j_k = vec![vec![0.0; self.k + 1]; self.train.m()];
        for j in 0..self.train.m() {
            for t in 0..self.tables[j].len() {
                if self.tables[j][t] {
                    let k = self.k_j_t[j][t];
                    self.theta_j_k[j][k] += f64::from(self.n_j_t[j][t]);
                }
            }
            let n_mj = self.train.n_m(j) as f64;
            for k in 0..self.k {
                if self.dishes[k] {
                    self.theta_j_k[j][k] += self.alpha * f64::from(self.m_k[k]) / (self.gamma + self.m as f64);
                    self.theta_j_k[j][k] /= n_mj + self.alpha;
                }
            }
            self.theta_j_k[j][self.k] = self.alpha * self.gamma / (self.gamma + self.m as f64);
            self.theta_j_k[j][self.k] /= n_mj + self.alpha;
        }
    }

    /// Indices of currently-live dish slots, in slot order.
    #[must_use]
    pub fn active_topics(&self) -> Vec<usize> {
        (0..self.k).filter(|&k| self.dishes[k]).collect()
    }

    /// Token count currently assigned to dish `k`.
    #[must_use]
    pub fn topic_size(&self, k: usize) -> u32 {
        self.n_k[k]
    }

    /// Up to `limit` `(vocab_index, phi, count)` triples for dish `k`, in
    /// descending φ order (for the CLI's "top words" dump). Only valid for
    /// a live dish slot; a dead one has no meaningful `phi_k_v` row until
    /// the next [`Self::perplexity`] call recomputes it.
    #[must_use]
    pub fn top_words(&self, k: usize, limit: usize) -> Vec<(usize, f64, u32)> {
        let has_phi = self.phi_k_v.get(k).is_some_and(|row| !row.is_empty());
        if !has_phi {
            return Vec::new();
        }
        let mut words: Vec<(usize, f64, u32)> = (0..self.train.v())
            .map(|word| (word, self.phi_k_v[k][word], self.n_k_v[k][word]))
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
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use topiclda_core::rng::seeded_rng;

    fn dataset_from(contents: &str) -> DataSet {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("ds.txt");
        let mut f = std::fs::File::create(&path).expect("create");
        f.write_all(contents.as_bytes()).expect("write");
        DataSet::load(&path).expect("load")
    }

    fn toy() -> (DataSet, DataSet) {
        let corpus = "2\n4\n10\n1 1 2\n1 2 2\n2 3 3\n2 4 3\n";
        (dataset_from(corpus), dataset_from(corpus))
    }

    fn engine(seed: u64) -> HdpLdaEngine {
        let (train, test) = toy();
        HdpLdaEngine::new(train, test, 1.0, 1.0, 1.0, 0.5, 1.0, 1.0, 1.0, seeded_rng(seed))
    }

    #[test]
    fn starts_with_no_dishes_or_tables() {
        let e = engine(1);
        assert_eq!(e.count_topics(), 0);
        assert_eq!(e.m, 0);
    }

    #[test]
    fn first_sweep_allocates_tables_and_dishes() {
        let mut e = engine(1);
        e.inference();
        assert!(e.count_topics() > 0);
        let total_tables: usize = (0..e.train.m()).map(|j| e.count_tables(j)).sum();
        assert!(total_tables > 0);
    }

    #[test]
    fn count_conservation_holds_after_many_sweeps() {
        let mut e = engine(7);
        for _ in 0..15 {
            e.inference();

            let total_n_k: u32 = e.n_k.iter().sum();
            let total_tokens: u32 = e
                .train
                .docs()
                .iter()
                .map(|d| d.len() as u32)
                .sum();
            assert_eq!(total_n_k, total_tokens);

            for k in 0..e.k {
                let sum_v: u32 = e.n_k_v[k].iter().sum();
                assert_eq!(sum_v, e.n_k[k]);
            }
            for j in 0..e.train.m() {
                for t in 0..e.tables[j].len() {
                    let sum_v: u32 = e.n_j_t_v[j][t].iter().sum();
                    assert_eq!(sum_v, e.n_j_t[j][t]);
                }
            }

            let live_m_k: u32 = (0..e.k).filter(|&k| e.dishes[k]).map(|k| e.m_k[k]).sum();
            assert_eq!(live_m_k as usize, e.m);
        }
    }

    #[test]
    fn same_seed_same_trajectory() {
        let mut e1 = engine(42);
        let mut e2 = engine(42);
        let mut p1 = Vec::new();
        let mut p2 = Vec::new();
        for _ in 0..5 {
            e1.inference();
            p1.push(e1.perplexity());
            e2.inference();
            p2.push(e2.perplexity());
        }
        assert_eq!(p1, p2);
    }

    #[test]
    fn dead_dish_slots_are_reused_before_growing() {
        let mut e = engine(3);
        for _ in 0..20 {
            e.inference();
            // `get_new_dish` always names a slot within the current arena:
            // either a dead one (< k) or exactly k itself (grow-by-one).
            // Either way it must never skip ahead of the arena size.
            assert!(e.get_new_dish() <= e.k);
            // Every live dish slot is really live; every index beyond the
            // arena can't appear as a `dishes` entry at all.
            assert_eq!(e.dishes.len(), e.k);
            assert!(e.count_topics() <= e.k);
        }
    }
}
