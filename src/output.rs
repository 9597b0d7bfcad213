use std::path::Path;

use crate::error::Result;
use crate::pipeline::AnalysisReport;
use crate::simulation::SimulationResult;

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Save one row per collateral and threshold to CSV.
pub fn save_thresholds_csv(report: &AnalysisReport, path: &Path) -> Result<()> {
    ensure_parent(path)?;
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record([
        "ticker",
        "pair",
        "threshold",
        "onchain_name",
        "period_days",
        "alpha",
        "analytical",
        "historical",
        "risk_adjustment",
        "suggested_pct",
    ])?;

    for r in report.reports() {
        for t in &r.thresholds {
            wtr.write_record(&[
                r.ticker.clone(),
                r.pair.clone(),
                t.kind.name().to_string(),
                t.kind.onchain_name().to_string(),
                t.period_days.to_string(),
                format!("{:.4}", t.alpha),
                format!("{:.6}", t.analytical),
                format!("{:.6}", t.historical),
                format!("{:.6}", t.risk_adjustment),
                t.suggested_percent().to_string(),
            ])?;
        }
    }

    wtr.flush()?;
    Ok(())
}

/// Save the full report, failures included, as pretty JSON.
pub fn save_report_json(report: &AnalysisReport, path: &Path) -> Result<()> {
    ensure_parent(path)?;
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Save simulated paths to CSV: one row per step, one column per path.
pub fn save_paths_csv(result: &SimulationResult, path: &Path) -> Result<()> {
    ensure_parent(path)?;
    let mut wtr = csv::Writer::from_path(path)?;

    let mut header = vec!["step".to_string()];
    header.extend((0..result.n_paths()).map(|i| format!("path_{}", i)));
    wtr.write_record(&header)?;

    for step in 0..=result.total_steps() {
        let mut row = vec![step.to_string()];
        row.extend(result.paths.iter().map(|p| format!("{:.8}", p[step])));
        wtr.write_record(&row)?;
    }

    wtr.flush()?;
    Ok(())
}

/// Save everything an analysis run produces to a directory.
pub fn save_all(report: &AnalysisReport, output_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(output_dir)?;
    save_thresholds_csv(report, &output_dir.join("thresholds.csv"))?;
    save_report_json(report, &output_dir.join("report.json"))?;
    Ok(())
}
