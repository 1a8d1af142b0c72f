//! Schema summarizer
//!
//! Renders a dataset's column names, dtypes and a few sample values as
//! compact text for LLM prompts. Kept deliberately small: prompts pay per
//! token, so the summary shows at most three distinct values per column and
//! two sample rows.

use crate::error::Result;
use crate::stats::any_value_to_display;
use polars::prelude::*;
use rand::seq::SliceRandom;

const SAMPLE_VALUES_PER_COLUMN: usize = 3;
const SAMPLE_ROWS: usize = 2;

/// One line per column: "- `name` (dtype): e.g., a, b, c".
pub fn schema_lines(df: &DataFrame) -> Result<String> {
    let mut lines = Vec::new();
    for name in df.get_column_names() {
        let series = df.column(name)?;
        // First-seen distinct non-null values, capped per column.
        let mut samples: Vec<String> = Vec::new();
        for idx in 0..series.len() {
            if samples.len() >= SAMPLE_VALUES_PER_COLUMN {
                break;
            }
            let value = series.get(idx)?;
            if matches!(value, AnyValue::Null) {
                continue;
            }
            let rendered = any_value_to_display(&value);
            if !samples.contains(&rendered) {
                samples.push(rendered);
            }
        }
        lines.push(format!(
            "- `{}` ({}): e.g., {}",
            name,
            series.dtype(),
            samples.join(", ")
        ));
    }
    Ok(lines.join("\n"))
}

/// Schema lines plus a couple of randomly sampled rows, the block embedded
/// into code-generation and regeneration prompts.
pub fn summarize_schema(df: &DataFrame) -> Result<String> {
    let mut out = format!("Dataset schema:\n{}", schema_lines(df)?);

    if df.height() > 0 {
        let mut indices: Vec<usize> = (0..df.height()).collect();
        indices.shuffle(&mut rand::thread_rng());
        indices.truncate(SAMPLE_ROWS.min(df.height()));
        indices.sort_unstable();

        let names = df.get_column_names();
        let mut rows = Vec::new();
        for idx in indices {
            let mut cells = Vec::new();
            for name in &names {
                let value = df.column(name)?.get(idx)?;
                cells.push(format!("{}={}", name, any_value_to_display(&value)));
            }
            rows.push(cells.join(", "));
        }
        out.push_str("\n\nSample rows:\n");
        out.push_str(&rows.join("\n"));
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_frame() -> DataFrame {
        df![
            "region" => ["west", "east", "west", "north"],
            "revenue" => [100.0, 250.5, 90.0, 310.0],
        ]
        .unwrap()
    }

    #[test]
    fn test_schema_lines_contain_columns_and_samples() {
        let text = schema_lines(&sample_frame()).unwrap();
        assert!(text.contains("`region`"));
        assert!(text.contains("`revenue`"));
        assert!(text.contains("west"));
    }

    #[test]
    fn test_sample_values_capped_at_three() {
        let df = df!["id" => [1i64, 2, 3, 4, 5, 6]].unwrap();
        let text = schema_lines(&df).unwrap();
        let samples = text.split("e.g., ").nth(1).unwrap();
        assert_eq!(samples.split(", ").count(), 3);
    }

    #[test]
    fn test_summarize_includes_sample_rows() {
        let text = summarize_schema(&sample_frame()).unwrap();
        assert!(text.contains("Sample rows:"));
        assert!(text.contains("region="));
    }

    #[test]
    fn test_empty_frame_has_no_sample_rows() {
        let df = DataFrame::empty();
        let text = summarize_schema(&df).unwrap();
        assert!(!text.contains("Sample rows:"));
    }
}
