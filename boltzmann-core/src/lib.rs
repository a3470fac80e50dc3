//! Core functionality for Boltzmann sampling of recursive data.
//!
//! This crate turns a sum-of-products description of a type into an algebraic
//! system, solves that system numerically for generating-function oracles,
//! and samples values whose sizes follow the Boltzmann distribution. Ceiled
//! rejection sampling and the pointing transform narrow the sizes to a
//! target window, and aliases cut off types that would otherwise expand
//! forever.

pub mod alias;
pub mod cache;
pub mod data;
pub mod dynamic;
pub mod error;
pub mod generator;
pub mod oracle;
pub mod parallel;
pub mod pointed;
pub mod random;
pub mod rejection;
pub mod sampler;
pub mod schema;
pub mod structure;
pub mod system;

// Re-export the main types
pub use alias::*;
pub use cache::*;
pub use data::*;
pub use dynamic::*;
pub use error::*;
pub use generator::*;
pub use oracle::*;
pub use parallel::*;
pub use pointed::*;
pub use random::*;
pub use rejection::*;
pub use sampler::*;
pub use schema::*;
pub use structure::*;
pub use system::*;
