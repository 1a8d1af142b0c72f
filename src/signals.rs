//! Proactive signal detection
//!
//! Rule-based data quality and structure signals, each evaluated
//! independently over the dataset and emitted only when triggered.

use crate::error::Result;
use crate::stats;
use itertools::Itertools;
use polars::prelude::*;

const HIGH_CARDINALITY_THRESHOLD: usize = 50;
const LOW_VARIANCE_THRESHOLD: f64 = 1e-3;
const HIGH_CORRELATION_THRESHOLD: f64 = 0.9;
const NULL_HEAVY_FRACTION: f64 = 0.5;

pub const NO_SIGNALS_TEXT: &str = "No major signals detected.";

/// Evaluate all signal rules against the dataset.
pub fn detect_signals(df: &DataFrame) -> Result<Vec<String>> {
    let mut signals = Vec::new();
    let height = df.height();
    let names: Vec<String> = df.get_column_names().iter().map(|s| s.to_string()).collect();

    // 1. Identifier-like columns: every value distinct.
    let mut id_cols = Vec::new();
    for name in &names {
        let series = df.column(name)?;
        if height > 0 && series.n_unique()? == height {
            id_cols.push(name.clone());
        }
    }
    if !id_cols.is_empty() {
        signals.push(format!("Possible identifier columns: {}", id_cols.join(", ")));
    }

    // 2. High-cardinality text columns.
    let mut high_card = Vec::new();
    for name in &names {
        let series = df.column(name)?;
        if series.dtype() == &DataType::String && series.n_unique()? > HIGH_CARDINALITY_THRESHOLD {
            high_card.push(name.clone());
        }
    }
    if !high_card.is_empty() {
        signals.push(format!(
            "High-cardinality categorical columns: {}",
            high_card.join(", ")
        ));
    }

    // 3. Low-variance numeric columns.
    let mut low_var = Vec::new();
    for name in &names {
        let series = df.column(name)?;
        if !stats::is_numeric(series) {
            continue;
        }
        let values = stats::numeric_values(series)?;
        if let Some(sd) = stats::std_dev(&values) {
            if sd < LOW_VARIANCE_THRESHOLD {
                low_var.push(name.clone());
            }
        }
    }
    if !low_var.is_empty() {
        signals.push(format!("Low-variance numeric columns: {}", low_var.join(", ")));
    }

    // 4. Highly correlated numeric pairs, each unordered pair once.
    let numeric_names: Vec<&String> = names
        .iter()
        .filter(|n| df.column(n).map(|s| stats::is_numeric(s)).unwrap_or(false))
        .collect();
    let mut correlated = Vec::new();
    for pair in numeric_names.iter().combinations(2) {
        let (a, b) = (pair[0], pair[1]);
        if let Some(r) = stats::pearson(df.column(a)?, df.column(b)?)? {
            if r.abs() > HIGH_CORRELATION_THRESHOLD {
                correlated.push(format!("{} / {} (corr={:.2})", a, b, r));
            }
        }
    }
    if !correlated.is_empty() {
        signals.push(format!("Highly correlated pairs: {}", correlated.join(", ")));
    }

    // 5. Null-heavy columns.
    let mut null_heavy = Vec::new();
    for name in &names {
        let series = df.column(name)?;
        if height > 0 && series.null_count() as f64 / height as f64 > NULL_HEAVY_FRACTION {
            null_heavy.push(name.clone());
        }
    }
    if !null_heavy.is_empty() {
        signals.push(format!(
            "Columns with >50% missing values: {}",
            null_heavy.join(", ")
        ));
    }

    Ok(signals)
}

/// Signals joined for display and prompting, or the fixed all-clear line.
pub fn signals_text(df: &DataFrame) -> Result<String> {
    let signals = detect_signals(df)?;
    if signals.is_empty() {
        Ok(NO_SIGNALS_TEXT.to_string())
    } else {
        Ok(signals.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_rule_requires_all_distinct() {
        let with_key = df![
            "order_id" => [1i64, 2, 3, 4],
            "region" => ["west", "east", "west", "east"],
        ]
        .unwrap();
        let signals = detect_signals(&with_key).unwrap();
        let id_line = signals.iter().find(|s| s.contains("identifier")).unwrap();
        assert!(id_line.contains("order_id"));
        assert!(!id_line.contains("region"));

        let without_key = df![
            "region" => ["west", "east", "west", "east"],
            "tier" => ["a", "a", "b", "b"],
        ]
        .unwrap();
        let signals = detect_signals(&without_key).unwrap();
        assert!(!signals.iter().any(|s| s.contains("identifier")));
    }

    #[test]
    fn test_constant_column_is_low_variance() {
        let df = df![
            "constant" => [5.0, 5.0, 5.0, 5.0, 5.0],
            "region" => ["a", "b", "c", "d", "e"],
        ]
        .unwrap();
        let signals = detect_signals(&df).unwrap();
        assert!(signals
            .iter()
            .any(|s| s.contains("Low-variance") && s.contains("constant")));
    }

    #[test]
    fn test_correlated_pair_reported_once() {
        let xs: Vec<f64> = (0..20).map(|i| i as f64).collect();
        let ys: Vec<f64> = xs.iter().map(|x| x * 2.0 + 1.0).collect();
        let df = df!["x" => xs, "y" => ys].unwrap();
        let signals = detect_signals(&df).unwrap();
        let corr_lines: Vec<_> = signals.iter().filter(|s| s.contains("correlated")).collect();
        assert_eq!(corr_lines.len(), 1);
        assert_eq!(corr_lines[0].matches("corr=").count(), 1);
    }

    #[test]
    fn test_null_heavy_column() {
        let df = df![
            "mostly_null" => [Some(1i64), None, None, None],
            "full" => [1i64, 2, 3, 4],
        ]
        .unwrap();
        let signals = detect_signals(&df).unwrap();
        let line = signals.iter().find(|s| s.contains("missing")).unwrap();
        assert!(line.contains("mostly_null"));
        assert!(!line.contains("full"));
    }

    #[test]
    fn test_no_signals_fixed_text() {
        let df = df![
            "region" => ["west", "east", "west", "east"],
            "flag" => ["y", "n", "y", "n"],
        ]
        .unwrap();
        assert_eq!(signals_text(&df).unwrap(), NO_SIGNALS_TEXT);
    }
}
