//! Nonparametric collapsed Gibbs sampler for HDP-LDA via the Chinese
//! Restaurant Franchise.
//!
//! See [`HdpLdaEngine`] for the entry point. Dish and table counts grow and
//! shrink during inference; dead slots are reused by index rather than
//! compacted, matching the historical reference implementation this crate
//! was distilled from. Hyperparameter resampling follows Escobar & West /
//! Teh's auxiliary-variable scheme.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

mod engine;

pub use engine::HdpLdaEngine;
