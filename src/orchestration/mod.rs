//! Orchestration pipeline (C3, §4.3): fuses recalled experience, planner
//! output, and tool results into a persisted trade decision.

pub mod memory_client;
pub mod pipeline;
pub mod planner_client;
pub mod reflection;
pub mod tools;

pub use memory_client::MemoryClient;
pub use pipeline::{OrchestrationPipeline, RunRequest};
pub use planner_client::PlannerClient;
pub use reflection::ReflectionJob;
pub use tools::{HttpToolRunner, ToolRunner};
