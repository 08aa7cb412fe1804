use crate::models::EvaluationResults;
use crate::stats::Metric;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
pub enum OutputFormat {
    Plain,
    Json,
}

/// Print evaluation results in the specified format
pub fn print_results(results: &EvaluationResults, format: OutputFormat) {
    match format {
        OutputFormat::Plain => print!("{}", render_plain(results)),
        OutputFormat::Json => match serde_json::to_string_pretty(results) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("Error serializing results to JSON: {}", e),
        },
    }
}

/// Statistics table followed by a one-line summary of placeholders
pub fn render_plain(results: &EvaluationResults) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "📊 STATISTICS ({} iterations)", results.iterations);
    let _ = writeln!(out, "-------------");
    let _ = writeln!(
        out,
        "{:<22} {:>8} {:>8} {:>8} {:>8} {:>8} {:>8}  {}",
        "Metric", "Mean", "Median", "StdDev", "Min", "Max", "Range", "Mode"
    );
    let _ = writeln!(out, "{}", "-".repeat(90));

    for metric in Metric::ALL {
        let Some(summary) = results.statistics.get(&metric) else {
            continue;
        };
        let mode = summary
            .mode
            .iter()
            .map(|value| format!("{:.2}", value))
            .collect::<Vec<_>>()
            .join(", ");

        let _ = writeln!(
            out,
            "{:<22} {:>8.2} {:>8.2} {:>8.2} {:>8.2} {:>8.2} {:>8.2}  {}",
            metric.name(),
            summary.mean,
            summary.median,
            summary.standard_deviation,
            summary.min,
            summary.max,
            summary.range,
            mode
        );
    }

    let placeholders = results.placeholder_count();
    let _ = writeln!(out);
    if placeholders > 0 {
        let _ = writeln!(
            out,
            "⚠️  {} of {} iterations failed and were scored as zero",
            placeholders,
            results.raw_results.len()
        );
    } else {
        let _ = writeln!(out, "All {} iterations succeeded", results.raw_results.len());
    }

    out
}
