//! The forecast core: three pure transforms run in order.
//!
//! estimate (price series -> parameters) -> simulate (parameters -> ensemble)
//! -> summarize (ensemble -> order statistics).
//!
//! None of them performs I/O or keeps state between calls.

pub mod estimator;
pub mod simulator;
pub mod summary;

pub use estimator::estimate;
pub use simulator::simulate;
pub use summary::summarize;
