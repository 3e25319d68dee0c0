//! Result sink: output directory, `results.jsonl`, `summary.csv`, console.

pub mod console;
pub mod jsonl;
pub mod progress;
pub mod summary;

use std::path::{Path, PathBuf};

use crate::error::{HarnessError, HarnessResult};
use crate::model::ResultRecord;

pub const RESULTS_FILE: &str = "results.jsonl";
pub const SUMMARY_FILE: &str = "summary.csv";
pub const DEFAULT_OUTPUT_ROOT: &str = "outputs";

/// Create `<root>/<YYYYMMDD-HHMMSS>`. A run started in the same second as an
/// existing directory gets a numeric suffix instead of reusing it.
pub fn make_output_dir(root: &Path) -> HarnessResult<PathBuf> {
    let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S").to_string();
    let mut dir = root.join(&stamp);
    let mut n = 1;
    while dir.exists() {
        dir = root.join(format!("{}-{}", stamp, n));
        n += 1;
    }
    std::fs::create_dir_all(&dir).map_err(|e| HarnessError::output(&dir, e))?;
    Ok(dir)
}

/// Write every record and the condensed summary into a fresh directory
/// under `root`. Returns the directory.
pub fn save_outputs(records: &[ResultRecord], root: &Path) -> HarnessResult<PathBuf> {
    let dir = make_output_dir(root)?;
    jsonl::write_jsonl(&dir.join(RESULTS_FILE), records)?;
    summary::write_summary_csv(&dir.join(SUMMARY_FILE), records)?;
    tracing::info!(dir = %dir.display(), records = records.len(), "saved outputs");
    Ok(dir)
}
