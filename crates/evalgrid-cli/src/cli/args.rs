use std::path::PathBuf;

use clap::Parser;
use evalgrid_core::report::DEFAULT_OUTPUT_ROOT;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "evalgrid",
    version,
    about = "Run a grid of chat-completion calls over scenarios, replications and models"
)]
pub struct Cli {
    /// Experiment YAML file
    #[arg(long)]
    pub config: PathBuf,

    /// Directory under which a timestamped run directory is created
    #[arg(long, default_value = DEFAULT_OUTPUT_ROOT)]
    pub output_root: PathBuf,

    /// Load the config and render every prompt, then exit without calling the API
    #[arg(long)]
    pub validate: bool,
}
