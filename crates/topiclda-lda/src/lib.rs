//! Fixed-K collapsed Gibbs sampler for Latent Dirichlet Allocation.
//!
//! See [`LdaEngine`] for the entry point. The sufficient-statistic tables
//! and the single-token resampling step mirror the historical reference
//! implementation this crate was distilled from; the asymmetric-alpha
//! fixed-point update follows Minka's "Estimating a Dirichlet distribution".

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

mod engine;

pub use engine::LdaEngine;
