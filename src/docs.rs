use crate::config::{RunConfig, RunnerStrategy};
use crate::evolution::aggregator::AggregateSummary;
use crate::evolution::partitioner::PopulationSampling;
use crate::evolution::runner::RunReport;
use crate::handlers::{BenchmarkInfo, ErrorResponse};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::handle_optimize,
        crate::handlers::handle_benchmarks,
        crate::handlers::handle_health
    ),
    components(
        schemas(
            RunConfig,
            RunnerStrategy,
            PopulationSampling,
            RunReport,
            AggregateSummary,
            BenchmarkInfo,
            ErrorResponse
        )
    ),
    tags(
        (name = "Optimization", description = "Distributed crayfish optimisation runs"),
        (name = "Service", description = "Liveness")
    )
)]
pub struct ApiDoc;
