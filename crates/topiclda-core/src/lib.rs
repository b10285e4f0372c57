//! Shared building blocks for the `topiclda` workspace.
//!
//! This crate owns nothing that is specific to LDA or HDP-LDA: it is the
//! corpus loader, the error taxonomy, the engine-owned PRNG plumbing
//! (seed resolution, the Beta-via-two-Gammas sampler, digamma), and the
//! perplexity arithmetic both engines fold their per-token log-likelihood
//! into.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

pub mod dataset;
pub mod error;
pub mod eval;
pub mod rng;

pub use dataset::DataSet;
pub use error::EngineError;
