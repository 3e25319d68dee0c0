use anyhow::Context;
use evalgrid_core::engine::preflight;
use evalgrid_core::prompt::FilePromptSource;
use evalgrid_core::report::console::{default_progress_sink, print_summary};
use evalgrid_core::scoring::summarize;
use evalgrid_core::{load_config, save_outputs, Runner};

use super::args::Cli;
use crate::exit_codes;

pub async fn run(cli: Cli) -> anyhow::Result<i32> {
    let cfg = load_config(&cli.config)?;

    if cli.validate {
        preflight(&FilePromptSource::new(), &cfg).await?;
        eprintln!(
            "Config OK: {} scenario(s) x {} replication(s) x {} model(s) = {} call(s)",
            cfg.scenarios.len(),
            cfg.replications,
            cfg.models.len(),
            cfg.total_calls()
        );
        return Ok(exit_codes::SUCCESS);
    }

    let runner = Runner::from_config(&cfg)?;
    let progress = default_progress_sink(cfg.total_calls());
    let records = runner.run_experiment(&cfg, progress).await?;

    let dir = save_outputs(&records, &cli.output_root)
        .with_context(|| format!("writing results under {}", cli.output_root.display()))?;
    print_summary(&summarize(&records));
    println!("Saved outputs to: {}", dir.display());

    Ok(exit_codes::SUCCESS)
}
