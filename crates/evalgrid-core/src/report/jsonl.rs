use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::{HarnessError, HarnessResult};
use crate::model::ResultRecord;

/// One JSON object per line, in run order.
pub fn write_jsonl(path: &Path, records: &[ResultRecord]) -> HarnessResult<()> {
    let file = File::create(path).map_err(|e| HarnessError::output(path, e))?;
    let mut w = BufWriter::new(file);
    for r in records {
        serde_json::to_writer(&mut w, r).map_err(|e| HarnessError::output(path, e))?;
        w.write_all(b"\n").map_err(|e| HarnessError::output(path, e))?;
    }
    w.flush().map_err(|e| HarnessError::output(path, e))?;
    Ok(())
}

/// Read records back, e.g. for post-hoc analysis.
pub fn read_jsonl(path: &Path) -> HarnessResult<Vec<ResultRecord>> {
    let text = std::fs::read_to_string(path).map_err(|e| HarnessError::output(path, e))?;
    text.lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str(l).map_err(|e| HarnessError::output(path, e)))
        .collect()
}
