//! Pre-trade validation, sizing, order submission, and edge monitoring (C5, §4.5).

pub mod broker;
pub mod edge_monitor;
pub mod engine;
pub mod sizing;

pub use broker::{Account, BrokerBridge, BrokerOrder, HttpBrokerBridge, OrderAck, OrderType};
pub use edge_monitor::{AlertCode, EdgeMonitor, EdgeMonitorConfig, EdgeSnapshot, TradeOutcome};
pub use engine::{ExecutionEngine, ExecutionResult};
pub use sizing::{r_multiple, size_position, SizingInput, SizingOutput};
