//! Cross-module checks: a loaded corpus and the perplexity finalizer used
//! together the way both engines use them.

use std::io::Write;

use proptest::prelude::*;
use topiclda_core::eval::perplexity_from_logsum;
use topiclda_core::rng::{sample_discrete, seeded_rng};
use topiclda_core::DataSet;

#[track_caller]
fn write_corpus(contents: &str) -> DataSet {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("corpus.txt");
    let mut f = std::fs::File::create(&path).expect("create");
    f.write_all(contents.as_bytes()).expect("write");
    DataSet::load(&path).expect("load")
}

#[test]
fn loaded_corpus_token_total_matches_document_lengths() {
    let ds = write_corpus("3\n5\n9\n1 1 3\n2 2 2\n3 3 1\n3 5 3\n");
    let total: usize = (0..ds.m()).map(|j| ds.n_m(j)).sum();
    assert_eq!(total, ds.n());
}

#[test]
fn uniform_perplexity_over_a_loaded_corpus_is_consistent_with_its_own_scale() {
    // A stand-in accumulation: every test token gets equal posterior mass
    // 1/V, which is exactly the "unseen word" floor both engines fall
    // back to (β/(n_z + Vβ) as n_z -> 0).
    let ds = write_corpus("2\n4\n4\n1 1 1\n1 2 1\n2 3 1\n2 4 1\n");
    let v = ds.v() as f64;
    let log_per: f64 = (0..ds.n()).map(|_| -(1.0 / v).ln()).sum();
    let perplexity = perplexity_from_logsum(log_per, ds.n());
    assert!((perplexity - v).abs() < 1e-9);
}

proptest! {
    /// `sample_discrete` run over weights derived from a loaded corpus's
    /// document lengths always returns a valid document index.
    #[test]
    fn sample_discrete_over_corpus_weights_stays_in_range(seed in any::<u64>()) {
        let ds = write_corpus("3\n2\n6\n1 1 2\n2 2 2\n3 1 2\n");
        let weights: Vec<f64> = (0..ds.m()).map(|j| ds.n_m(j) as f64 + 0.1).collect();
        let mut rng = seeded_rng(seed);
        for _ in 0..20 {
            let idx = sample_discrete(&weights, &mut rng);
            prop_assert!(idx < ds.m());
        }
    }
}
