use crayfish::benchmarks::BenchmarkRegistry;
use crayfish::config::{RunConfig, RunnerStrategy};
use crayfish::evolution::runner::run_optimization;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::{fs::File, io::Write, time::Instant};
use tokio::task;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .compact()
        .init();

    let population_size = 500;
    let partitions = 20;
    let iterations = 500;
    let seed = 42; // a classic
    let functions = ["F1", "F5", "F9", "F10", "F16", "F17", "F18"];

    let registry = Arc::new(BenchmarkRegistry::standard());
    // The runs share the machine, so each gets a slice of it.
    let per_run_threads = (num_cpus::get() / 2).max(1);

    println!("Starting experiment: ");
    let start = Instant::now();

    stream::iter(functions)
        .map(|function_name| {
            println!("Run on {function_name} was launched");
            let registry = Arc::clone(&registry);
            let mut config =
                RunConfig::new(population_size, partitions, iterations, function_name);
            config.seed = Some(seed);
            config.max_concurrency = per_run_threads;
            config.runner = RunnerStrategy::Local;

            async move {
                let report = run_optimization(config, registry).await?;

                // offload blocking file I/O
                let filename = format!("coa_result_{}.json", function_name);
                let json = serde_json::to_string_pretty(&report)?;
                task::spawn_blocking(move || {
                    let mut f = File::create(&filename)?;
                    f.write_all(json.as_bytes())?;
                    Ok::<_, std::io::Error>(())
                })
                .await??;

                anyhow::Ok(report)
            }
        })
        .buffer_unordered(2)
        .for_each(|res| async {
            match res {
                Ok(report) => {
                    println!(
                        "→ {}: overall best fitness = {:.6}, partitions seen = {}/{}, time = {} ms",
                        report.function_name,
                        report.summary.overall_best_fitness,
                        report.summary.results_seen,
                        report.partitions,
                        report.elapsed_ms
                    );
                }
                Err(e) => eprintln!("experiment failed: {e:#}"),
            }
        })
        .await;

    let elapsed = start.elapsed();
    println!("Total experiment time: {:.2?}", elapsed);

    Ok(())
}
