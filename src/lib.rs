// Modules
pub mod benchmarks;
pub mod collector;
pub mod config;
pub mod consts;
pub mod docs;
pub mod evolution;
pub mod handlers;
pub mod messages;
pub mod transport;
pub mod web_app;
pub mod worker;

pub use benchmarks::{default_registry, BenchmarkRegistry, BenchmarkSpec};
pub use config::{RunConfig, RunnerStrategy, ServiceConfig};
pub use evolution::aggregator::{AggregateSummary, Aggregator};
pub use evolution::runner::{run_optimization, RunError, RunReport};
pub use messages::{PartitionResult, WorkUnit};
