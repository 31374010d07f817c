//! Plain text outputs of the processing pipeline
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use log::info;
use plinth_algorithms::analysis::AnalysisReport;

/// File name of the floor height written by [write_zmean]
pub const ZMEAN_FILE_NAME: &str = "zmean.txt";
/// File name of the report written by [write_analysis_report]
pub const ANALYSIS_REPORT_FILE_NAME: &str = "analysis_report.txt";

/// Writes the mean floor height `zmean` as a bare number (always with a decimal point) into `zmean.txt` inside `output_dir`. Returns the path
/// of the written file
pub fn write_zmean<P: AsRef<Path>>(output_dir: P, zmean: f64) -> Result<PathBuf> {
    let path = output_dir.as_ref().join(ZMEAN_FILE_NAME);
    std::fs::write(&path, format!("{:?}", zmean))
        .with_context(|| format!("Could not write {}", path.display()))?;
    info!("Saved floor zmean to {}", path.display());
    Ok(path)
}

/// Writes `report` into `analysis_report.txt` inside `output_dir`. Returns the path of the written file
pub fn write_analysis_report<P: AsRef<Path>>(output_dir: P, report: &AnalysisReport) -> Result<PathBuf> {
    let path = output_dir.as_ref().join(ANALYSIS_REPORT_FILE_NAME);
    let mut writer = BufWriter::new(
        File::create(&path).with_context(|| format!("Could not create {}", path.display()))?,
    );
    writeln!(writer, "=== POINT CLOUD ANALYSIS REPORT ===")?;
    writeln!(writer)?;
    writeln!(writer, "{}", report)?;
    writer.flush()?;
    info!("Saved analysis report to {}", path.display());
    Ok(path)
}
