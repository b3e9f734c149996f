//! Strategy evaluation (C2, §4.2).

pub mod engine;
pub mod store;
pub mod strategies;
pub mod strategy;

pub use engine::{SignalEngine, SignalEngineConfig};
pub use store::{SignalFilter, SignalStore};
pub use strategy::Strategy;
