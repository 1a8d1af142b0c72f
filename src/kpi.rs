//! KPI extraction
//!
//! Descriptive statistics per numeric column, formatted for display, plus
//! keyword-driven insight notes (financial metrics, variability).

use crate::error::{InsightError, Result};
use crate::stats;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

const FINANCIAL_KEYWORDS: &[&str] = &[
    "sales", "revenue", "price", "amount", "cost", "value", "profit", "income", "budget",
    "spend", "transaction", "order", "purchase", "total", "net", "gross",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KpiReport {
    pub kpis: Vec<ColumnKpi>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnKpi {
    pub column: String,
    /// Ordered (stat name, formatted value) pairs.
    pub stats: Vec<(String, String)>,
    pub insights: Vec<String>,
}

fn is_financial_metric(name: &str) -> bool {
    let lower = name.to_lowercase();
    FINANCIAL_KEYWORDS.iter().any(|k| lower.contains(k))
}

fn variability_note(mean: f64, sd: f64) -> Option<&'static str> {
    if mean == 0.0 {
        return None;
    }
    let cv = sd / mean.abs();
    if cv > 1.0 {
        Some("high variability")
    } else if cv < 0.1 {
        Some("low variability")
    } else {
        None
    }
}

pub fn extract_kpis(df: &DataFrame) -> Result<KpiReport> {
    if df.height() == 0 {
        return Err(InsightError::Execution("Dataset is empty".to_string()));
    }

    let mut kpis = Vec::new();
    for name in df.get_column_names() {
        let series = df.column(name)?;
        if !stats::is_numeric(series) {
            continue;
        }
        let values = stats::numeric_values(series)?;
        if values.is_empty() {
            continue;
        }

        let mean = stats::mean(&values).unwrap_or(0.0);
        let sd = stats::std_dev(&values).unwrap_or(0.0);
        let min = stats::min(&values).unwrap_or(0.0);
        let max = stats::max(&values).unwrap_or(0.0);

        let column_stats = vec![
            ("count".to_string(), format!("{}", values.len())),
            ("mean".to_string(), stats::format_thousands(mean)),
            ("std".to_string(), stats::format_thousands(sd)),
            ("min".to_string(), stats::format_thousands(min)),
            ("max".to_string(), stats::format_thousands(max)),
        ];

        let mut insights = Vec::new();
        if is_financial_metric(name) {
            insights.push(format!("'{}' looks like a key financial metric.", name));
        }
        if let Some(note) = variability_note(mean, sd) {
            insights.push(format!("'{}' shows {}.", name, note));
        }

        kpis.push(ColumnKpi {
            column: name.to_string(),
            stats: column_stats,
            insights,
        });
    }

    Ok(KpiReport {
        kpis,
        message: "KPI extraction completed.".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_columns_only() {
        let df = df![
            "revenue" => [100.0, 200.0, 300.0],
            "region" => ["w", "e", "n"],
        ]
        .unwrap();
        let report = extract_kpis(&df).unwrap();
        assert_eq!(report.kpis.len(), 1);
        assert_eq!(report.kpis[0].column, "revenue");
    }

    #[test]
    fn test_stats_are_formatted_with_separators() {
        let df = df!["amount" => [1000000.0, 3000000.0]].unwrap();
        let report = extract_kpis(&df).unwrap();
        let mean = report.kpis[0]
            .stats
            .iter()
            .find(|(k, _)| k == "mean")
            .map(|(_, v)| v.clone())
            .unwrap();
        assert_eq!(mean, "2,000,000.00");
    }

    #[test]
    fn test_financial_keyword_insight() {
        let df = df!["total_sales" => [1.0, 2.0, 3.0]].unwrap();
        let report = extract_kpis(&df).unwrap();
        assert!(report.kpis[0]
            .insights
            .iter()
            .any(|i| i.contains("financial metric")));
    }

    #[test]
    fn test_zero_mean_does_not_divide() {
        let df = df!["delta" => [-1.0, 1.0, -1.0, 1.0]].unwrap();
        let report = extract_kpis(&df).unwrap();
        // Mean is zero; the variability rule must be skipped, not crash.
        assert!(report.kpis[0].insights.iter().all(|i| !i.contains("variability")));
    }

    #[test]
    fn test_empty_frame_is_an_error() {
        let df = DataFrame::empty();
        assert!(extract_kpis(&df).is_err());
    }
}
