#![deny(clippy::all)]
#![warn(clippy::pedantic)]

//! Benchmark harness for nmhoist.
//!
//! Run benchmarks with: `cargo bench -p nmhoist-bench`
//!
//! The crate only holds criterion benchmarks of the optimizer and the plan
//! builder on synthetic trees.
