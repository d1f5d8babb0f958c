//! The five independent evidence analyzers.
//!
//! None of them depends on another's output and each is a total function
//! over its inputs, so they fan out concurrently and fan in at the scorer.

pub mod fields;
pub mod logo;
pub mod metadata;
pub mod qr;
pub mod tamper;
