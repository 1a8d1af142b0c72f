//! Exploratory data analysis
//!
//! Produces a structured report (shape, missingness, categorical value
//! counts) plus a list of plain-text observations that the smarter layers
//! (chart planning, narrative summary) build on.

use crate::error::Result;
use crate::stats;
use itertools::Itertools;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

const HIGH_UNIQUE_FRACTION: f64 = 0.8;
const SKEW_THRESHOLD: f64 = 1.0;
const STRONG_CORRELATION: f64 = 0.7;
const TOP_VALUES: usize = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdaReport {
    pub rows: usize,
    pub columns: usize,
    pub missing: Vec<MissingCount>,
    pub overall_missing_pct: f64,
    pub categorical_counts: Vec<CategoricalCounts>,
    pub observations: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissingCount {
    pub column: String,
    pub count: usize,
    pub pct: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoricalCounts {
    pub column: String,
    pub top_values: Vec<(String, usize)>,
}

pub fn perform_eda(df: &DataFrame) -> Result<EdaReport> {
    let (rows, columns) = df.shape();
    let names: Vec<String> = df.get_column_names().iter().map(|s| s.to_string()).collect();
    let mut observations = Vec::new();

    observations.push(format!("Rows: {}, Columns: {}", rows, columns));

    // Missing values.
    let mut missing = Vec::new();
    let mut total_missing = 0usize;
    for name in &names {
        let count = df.column(name)?.null_count();
        total_missing += count;
        if count > 0 {
            missing.push(MissingCount {
                column: name.clone(),
                count,
                pct: if rows > 0 {
                    count as f64 / rows as f64 * 100.0
                } else {
                    0.0
                },
            });
        }
    }
    let total_cells = rows * columns;
    let overall_missing_pct = if total_cells > 0 {
        total_missing as f64 / total_cells as f64 * 100.0
    } else {
        0.0
    };
    if missing.is_empty() {
        observations.push("The dataset is complete with no missing values.".to_string());
    } else {
        observations.push(format!(
            "{} cells ({:.2}%) are missing across {} column(s).",
            total_missing,
            overall_missing_pct,
            missing.len()
        ));
    }

    // Categorical value counts with per-column observations.
    let mut categorical_counts = Vec::new();
    for name in &names {
        let series = df.column(name)?;
        if series.dtype() != &DataType::String {
            continue;
        }
        let unique = series.n_unique()?;
        let top_values = stats::top_value_counts(series, TOP_VALUES)?;
        categorical_counts.push(CategoricalCounts {
            column: name.clone(),
            top_values,
        });

        if unique == 2 {
            observations.push(format!("'{}' appears to be a binary flag.", name));
        } else if rows > 0 && unique as f64 > rows as f64 * HIGH_UNIQUE_FRACTION {
            observations.push(format!(
                "'{}' has a very high number of unique values ({}), suggesting an identifier or free-form text.",
                name, unique
            ));
        } else if rows > 0 && (unique as f64) < rows as f64 * 0.1 && unique > 2 {
            observations.push(format!(
                "'{}' has a manageable number of categories ({}), suitable for group-by analysis.",
                name, unique
            ));
        }
    }
    if categorical_counts.is_empty() {
        observations.push("No categorical columns found; the dataset appears primarily numerical.".to_string());
    }

    // Numeric observations: variability, skew, correlation.
    let numeric_names: Vec<String> = names
        .iter()
        .filter(|n| df.column(n).map(stats::is_numeric).unwrap_or(false))
        .cloned()
        .collect();

    for name in &numeric_names {
        let values = stats::numeric_values(df.column(name)?)?;
        let mean = stats::mean(&values);
        let sd = stats::std_dev(&values);
        if let (Some(mean), Some(sd)) = (mean, sd) {
            if mean != 0.0 && sd / mean.abs() > 1.0 {
                observations.push(format!(
                    "'{}' shows high variability (std > mean); a histogram or box plot might help.",
                    name
                ));
            }
        }
        if let Some(skew) = stats::skewness(&values) {
            if skew.abs() > SKEW_THRESHOLD {
                observations.push(format!(
                    "'{}' is highly skewed (skew = {:.2}); consider a box plot or transformation.",
                    name, skew
                ));
            }
        }
    }

    for pair in numeric_names.iter().combinations(2) {
        let (a, b) = (pair[0], pair[1]);
        if let Some(r) = stats::pearson(df.column(a)?, df.column(b)?)? {
            if r.abs() > STRONG_CORRELATION {
                observations.push(format!(
                    "'{}' and '{}' are strongly correlated (r = {:.2}); a scatter plot could visualize this.",
                    a, b, r
                ));
            }
        }
    }

    Ok(EdaReport {
        rows,
        columns,
        missing,
        overall_missing_pct,
        categorical_counts,
        observations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_and_missing() {
        let df = df![
            "a" => [Some(1i64), None, Some(3)],
            "b" => ["x", "y", "z"],
        ]
        .unwrap();
        let report = perform_eda(&df).unwrap();
        assert_eq!((report.rows, report.columns), (3, 2));
        assert_eq!(report.missing.len(), 1);
        assert_eq!(report.missing[0].column, "a");
        assert!((report.overall_missing_pct - 100.0 / 6.0).abs() < 0.01);
    }

    #[test]
    fn test_binary_flag_observation() {
        let df = df!["flag" => ["yes", "no", "yes", "no", "yes", "no"]].unwrap();
        let report = perform_eda(&df).unwrap();
        assert!(report.observations.iter().any(|o| o.contains("binary flag")));
    }

    #[test]
    fn test_constant_numeric_column_does_not_panic() {
        let df = df!["constant" => [5.0, 5.0, 5.0, 5.0, 5.0]].unwrap();
        let report = perform_eda(&df).unwrap();
        // Constant column: no skew observation, no variability observation,
        // and crucially no divide-by-zero on the zero std.
        assert!(!report.observations.iter().any(|o| o.contains("skewed")));
    }

    #[test]
    fn test_correlation_observation() {
        let xs: Vec<f64> = (0..30).map(|i| i as f64).collect();
        let ys: Vec<f64> = xs.iter().map(|x| x * 3.0).collect();
        let df = df!["x" => xs, "y" => ys].unwrap();
        let report = perform_eda(&df).unwrap();
        assert!(report
            .observations
            .iter()
            .any(|o| o.contains("strongly correlated")));
    }

    #[test]
    fn test_categorical_top_values() {
        let df = df!["region" => ["w", "w", "w", "e", "e", "n"]].unwrap();
        let report = perform_eda(&df).unwrap();
        let counts = &report.categorical_counts[0];
        assert_eq!(counts.top_values[0], ("w".to_string(), 3));
    }
}
