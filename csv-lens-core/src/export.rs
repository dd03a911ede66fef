use crate::compare::ReportComparison;
use crate::report::{ColumnReport, ProfileReport};
use csv_lens_common::{CsvLensError, Result};
use std::io::Write;
use std::path::Path;

fn fmt_opt(v: Option<f64>) -> String {
    v.map_or_else(|| "-".to_string(), |x| format!("{x:.4}"))
}

// --- headless text summary ---

pub fn write_summary<W: Write>(out: &mut W, report: &ProfileReport) -> Result<()> {
    writeln!(out, "{:<16} {}", "Sources:", report.sources.join(", "))?;
    writeln!(out, "{:<16} {}", "Rows:", report.rows_read)?;
    writeln!(out, "{:<16} {}", "Profiled:", report.rows_profiled)?;
    writeln!(out, "{:<16} {}", "Parse errors:", report.parse_errors)?;
    writeln!(out, "{:<16} {}", "Type errors:", report.type_errors)?;
    let names: Vec<&str> = report.columns.iter().map(|c| c.name.as_str()).collect();
    writeln!(out, "{:<16} {}", "Columns:", names.join(", "))?;
    if report.truncated {
        writeln!(out, "{:<16} scan stopped early, figures are partial", "Truncated:")?;
    }

    let numeric: Vec<&ColumnReport> = report.numeric_columns().collect();
    if !numeric.is_empty() {
        writeln!(out)?;
        writeln!(
            out,
            "{:<20} {:>10} {:>14} {:>14} {:>14} {:>14} {:>14} {:>14}",
            "column", "count", "mean", "std", "min", "p50", "max", "variance"
        )?;
        for col in numeric {
            if let Some(n) = &col.numeric {
                writeln!(
                    out,
                    "{:<20} {:>10} {:>14} {:>14} {:>14} {:>14} {:>14} {:>14}",
                    col.name,
                    n.count,
                    fmt_opt(n.mean),
                    fmt_opt(n.stddev),
                    fmt_opt(n.min),
                    fmt_opt(n.p50),
                    fmt_opt(n.max),
                    fmt_opt(n.population_variance),
                )?;
            }
        }
    }

    for col in report.categorical_columns() {
        let Some(top) = &col.top_values else { continue };
        writeln!(out)?;
        let marker = if top.approximate { " (approximate)" } else { "" };
        writeln!(
            out,
            "{}: ~{} distinct, {} missing{}",
            col.name, col.distinct_estimate, col.missing, marker
        )?;
        for entry in &top.top_values {
            writeln!(out, "  {:<32} {:>10} {:>7.2}%", entry.value, entry.count, entry.percentage)?;
        }
    }
    Ok(())
}

pub fn print_summary(report: &ProfileReport) -> Result<()> {
    let stdout = std::io::stdout();
    let mut lock = stdout.lock();
    write_summary(&mut lock, report)
}

// --- JSON export ---

pub fn export_json(output_path: &Path, report: &ProfileReport) -> Result<()> {
    let file = std::fs::File::create(output_path)?;
    serde_json::to_writer_pretty(file, report).map_err(|e| CsvLensError::Other(e.to_string()))?;
    Ok(())
}

pub fn export_comparison_json(output_path: &Path, comparison: &ReportComparison) -> Result<()> {
    let file = std::fs::File::create(output_path)?;
    serde_json::to_writer_pretty(file, comparison)
        .map_err(|e| CsvLensError::Other(e.to_string()))?;
    Ok(())
}

// --- CSV export ---

pub fn write_csv<W: Write>(out: W, report: &ProfileReport) -> Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record([
        "column_name",
        "kind",
        "missing",
        "type_errors",
        "distinct_estimate",
        "count",
        "mean",
        "stddev",
        "min",
        "max",
        "top_values",
    ])?;
    for col in &report.columns {
        let num = |f: fn(&crate::profile::NumericSummary) -> Option<f64>| {
            col.numeric
                .as_ref()
                .and_then(f)
                .map(|v| v.to_string())
                .unwrap_or_default()
        };
        let count = match (&col.numeric, &col.top_values) {
            (Some(n), _) => n.count,
            (None, Some(t)) => t.total_count,
            (None, None) => 0,
        };
        let top = col
            .top_values
            .as_ref()
            .map(|t| {
                t.top_values
                    .iter()
                    .map(|e| format!("{}:{}", e.value, e.count))
                    .collect::<Vec<_>>()
                    .join("|")
            })
            .unwrap_or_default();
        writer.write_record([
            col.name.clone(),
            col.kind.to_string(),
            col.missing.to_string(),
            col.type_errors.to_string(),
            col.distinct_estimate.to_string(),
            count.to_string(),
            num(|n| n.mean),
            num(|n| n.stddev),
            num(|n| n.min),
            num(|n| n.max),
            top,
        ])?;
    }
    writer.flush()?;
    Ok(())
}

pub fn export_csv(output_path: &Path, report: &ProfileReport) -> Result<()> {
    let file = std::fs::File::create(output_path)?;
    write_csv(file, report)
}
