//! JSON report for the aggregated trading signal.
//!
//! Wraps the [`SignalAggregate`] with crawl metadata and writes it pretty-
//! printed for downstream consumption.

use crate::models::SignalAggregate;
use crate::utils::{crawl_stamp, file_stamp};
use serde::Serialize;
use std::error::Error;
use tokio::fs;
use tracing::{info, instrument};

/// The on-disk report shape.
#[derive(Debug, Serialize)]
pub struct SignalReport<'a> {
    pub stock_code: &'a str,
    pub generated_at: String,
    /// Total posts extracted this session (the aggregate analyzes a subset).
    pub posts_total: usize,
    pub aggregate: &'a SignalAggregate,
}

/// Write the signal report to
/// `{out_dir}/guba_signal_{stock_code}_{timestamp}.json`.
#[instrument(level = "info", skip(aggregate), fields(out_dir = %out_dir))]
pub async fn write_report(
    aggregate: &SignalAggregate,
    posts_total: usize,
    out_dir: &str,
    stock_code: &str,
) -> Result<String, Box<dyn Error>> {
    let report = SignalReport {
        stock_code,
        generated_at: crawl_stamp(),
        posts_total,
        aggregate,
    };
    let json = serde_json::to_string_pretty(&report)?;

    fs::create_dir_all(out_dir).await?;
    let path = format!(
        "{}/guba_signal_{}_{}.json",
        out_dir.trim_end_matches('/'),
        stock_code,
        file_stamp()
    );
    fs::write(&path, json).await?;
    info!(
        path = %path,
        signal = %aggregate.overall_signal,
        confidence = aggregate.overall_confidence,
        "Wrote signal report"
    );
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Signal;

    #[test]
    fn test_report_serializes_wire_forms() {
        let aggregate = SignalAggregate {
            overall_signal: Signal::Buy,
            overall_confidence: 0.82,
            votes: Vec::new(),
        };
        let report = SignalReport {
            stock_code: "002594",
            generated_at: "2026-08-08 09:00:00".to_string(),
            posts_total: 42,
            aggregate: &aggregate,
        };
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"overall_signal\":\"buy\""));
        assert!(json.contains("\"stock_code\":\"002594\""));
        assert!(json.contains("\"posts_total\":42"));
    }
}
