mod demos;

use clap::Parser;
use demos::Demo;
use pipeline::RuntimeConfig;

/// Runs one of the dataflow pipeline runtime's bundled demo pipelines.
#[derive(Parser, Debug)]
#[command(name = "pipeline-cli", about = "Run a pipeline demo")]
struct Cli {
    /// Which demo pipeline to run.
    #[arg(value_enum)]
    demo: Demo,

    /// Render the alternate-screen stage visualizer while running.
    #[arg(long)]
    graph: bool,

    /// Bounded capacity for each stage's input queue.
    #[arg(long, default_value_t = pipeline::DEFAULT_QUEUE_CAPACITY)]
    queue_capacity: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(
            |_| tracing_subscriber::EnvFilter::new("info"),
        ))
        .init();

    let cli = Cli::parse();
    let config = RuntimeConfig {
        default_queue_capacity: cli.queue_capacity,
        with_visualizer: cli.graph,
    };

    println!("running demo: {:?}", cli.demo);
    let report = cli.demo.run(config).await;
    println!("graceful shutdown: {}", report.graceful);
    if !report.stages_timed_out.is_empty() {
        println!("stages that had to be force-stopped: {:?}", report.stages_timed_out);
    }

    std::process::exit(report.exit_code());
}
