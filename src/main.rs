//! Waferflow: wafer yield analytics CLI
//!
//! Runs the mung, visualize, evaluate and experiment stages over the SECOM
//! label and measurement files.

use std::time::Instant;

use anyhow::Result;
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;

use waferflow::cli::{Cli, Commands};
use waferflow::pipeline::{
    evaluate_data, mung_data, run_experiment, run_stage, visualize_data, PipelineConfig, Stage,
};
use waferflow::report::RunSummary;
use waferflow::utils::{
    print_banner, print_completion, print_config, print_step_header, print_step_time,
};

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .init();
}

fn stages_for(command: &Commands) -> Vec<Stage> {
    match command {
        Commands::Run => vec![Stage::Mung, Stage::Visualize, Stage::Evaluate],
        Commands::Mung => vec![Stage::Mung],
        Commands::Visualize => vec![Stage::Visualize],
        Commands::Evaluate => vec![Stage::Evaluate],
        Commands::Experiment { .. } => vec![Stage::Experiment],
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config: PipelineConfig = cli.pipeline_config();
    config.validate()?;
    let command = cli.command();

    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    log::debug!("configuration: {:?}", config);

    print_banner(env!("CARGO_PKG_VERSION"));
    print_config(&config);

    let mut summary = RunSummary::new();
    for (idx, stage) in stages_for(&command).into_iter().enumerate() {
        print_step_header(idx + 1, &stage.to_string());
        let step_start = Instant::now();

        let report = run_stage(stage, config.failure_policy, || match stage {
            Stage::Mung => mung_data(&config, &mut rng).map(|_| ()),
            Stage::Visualize => visualize_data(&config).map(|_| ()),
            Stage::Evaluate => evaluate_data(&config, &mut rng).map(|_| ()),
            Stage::Experiment => {
                let (model, experiment) = command
                    .experiment_config()
                    .ok_or_else(|| anyhow::anyhow!("Experiment stage needs experiment settings"))?;
                run_experiment(&config, &experiment, model).map(|_| ())
            }
        })?;

        print_step_time(step_start.elapsed());
        summary.record(report);
    }

    summary.display();
    print_completion(summary.failed_count());

    if summary.failed_count() > 0 {
        std::process::exit(1);
    }
    Ok(())
}
