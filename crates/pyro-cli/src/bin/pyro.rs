use anyhow::Context;
use clap::{ArgAction, Parser};
use std::path::PathBuf;
use tracing::info;

use pyro_cli::{case_from_config, init_tracing, save_partial_history, Driver};
use pyro_data::{write_history, RunConfig};
use pyro_optimizer::StrategyRegistry;
use pyro_types::RunOptions;

/// Parallel black-box optimization of simulator parameters.
#[derive(Parser, Debug)]
#[command(name = "pyro", version, about)]
struct Cli {
    /// JSON run configuration.
    config: PathBuf,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Number of parallel evaluation workers.
    #[arg(short = 'n', long, value_parser = clap::value_parser!(u64).range(1..))]
    num_jobs: Option<u64>,

    /// Maximum number of optimizer iterations.
    #[arg(short = 'm', long)]
    max_iter: Option<usize>,

    /// Number of sampled initial points.
    #[arg(short = 'i', long, value_parser = clap::value_parser!(u64).range(1..))]
    num_initial: Option<u64>,

    /// Candidates proposed per iteration.
    #[arg(short = 'p', long, value_parser = clap::value_parser!(u64).range(1..))]
    num_points: Option<u64>,

    /// Optimizer strategy name.
    #[arg(short = 'o', long)]
    optimizer: Option<String>,

    /// Resume from a recorded design table.
    #[arg(short = 'd', long)]
    initial_design_file: Option<PathBuf>,

    /// Seed for reproducible sampling.
    #[arg(long, env = "PYRO_SEED")]
    seed: Option<u64>,
}

impl Cli {
    fn apply(&self, run: &mut RunOptions) {
        if let Some(n) = self.num_jobs {
            run.num_jobs = n as usize;
        }
        if let Some(n) = self.max_iter {
            run.max_iter = n;
        }
        if let Some(n) = self.num_initial {
            run.num_initial = n as usize;
        }
        if let Some(n) = self.num_points {
            run.num_points = Some(n as usize);
        }
        if let Some(name) = &self.optimizer {
            run.optimizer_name = name.clone();
        }
        if let Some(path) = &self.initial_design_file {
            run.initial_design_file = Some(path.clone());
        }
        if let Some(seed) = self.seed {
            run.seed = Some(seed);
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = RunConfig::from_file(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    cli.apply(&mut config.run);
    config.run.validate()?;

    let case = case_from_config(&config)?;
    case.print_info();

    let output_dir = config.run.output_dir.clone();
    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("creating {}", output_dir.display()))?;

    let names = case.param_names();
    let driver = Driver::new(StrategyRegistry::with_defaults());
    let outcome = driver
        .run_until(&case, &config.run, async {
            if tokio::signal::ctrl_c().await.is_err() {
                std::future::pending::<()>().await;
            }
        })
        .await;
    let report = match outcome {
        Ok(report) => report,
        Err(e) => {
            save_partial_history(&output_dir, &names, &e)?;
            return Err(e.into());
        }
    };

    print!("{}", report.summary(&names));

    write_history(output_dir.join("history.csv"), &names, &report.outcome.history)?;
    let result_path = output_dir.join("result.json");
    std::fs::write(&result_path, serde_json::to_string_pretty(&report)?)?;
    info!("Wrote {}", result_path.display());

    Ok(())
}
