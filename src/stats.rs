//! Column statistics helpers shared by the EDA, KPI, signal and chart
//! modules. Everything here is computed on materialized f64 values rather
//! than through feature-gated polars aggregations, so the numerics are easy
//! to audit and the behavior on empty/constant columns is explicit.

use crate::error::Result;
use polars::prelude::*;
use std::collections::HashMap;

/// Non-null values of a column cast to f64.
pub fn numeric_values(series: &Series) -> Result<Vec<f64>> {
    let casted = series.cast(&DataType::Float64)?;
    let ca = casted.f64()?;
    Ok(ca.into_iter().flatten().collect())
}

pub fn is_numeric(series: &Series) -> bool {
    series.dtype().is_numeric()
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (ddof = 1), matching the conventions of the
/// dataframe libraries this engine's reports are compared against.
pub fn std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(var.sqrt())
}

pub fn min(values: &[f64]) -> Option<f64> {
    values.iter().copied().fold(None, |acc, v| match acc {
        None => Some(v),
        Some(a) => Some(a.min(v)),
    })
}

pub fn max(values: &[f64]) -> Option<f64> {
    values.iter().copied().fold(None, |acc, v| match acc {
        None => Some(v),
        Some(a) => Some(a.max(v)),
    })
}

/// Fisher-Pearson skewness coefficient. Returns `None` when the column is
/// too short or has zero spread, so constant columns never divide by zero.
pub fn skewness(values: &[f64]) -> Option<f64> {
    if values.len() < 3 {
        return None;
    }
    let m = mean(values)?;
    let n = values.len() as f64;
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / n;
    let sd = variance.sqrt();
    if sd == 0.0 {
        return None;
    }
    let m3 = values.iter().map(|v| (v - m).powi(3)).sum::<f64>() / n;
    Some(m3 / sd.powi(3))
}

/// Pearson correlation over rows where both columns are non-null.
pub fn pearson(a: &Series, b: &Series) -> Result<Option<f64>> {
    let ca = a.cast(&DataType::Float64)?;
    let cb = b.cast(&DataType::Float64)?;
    let (ca, cb) = (ca.f64()?, cb.f64()?);

    let pairs: Vec<(f64, f64)> = ca
        .into_iter()
        .zip(cb.into_iter())
        .filter_map(|(x, y)| match (x, y) {
            (Some(x), Some(y)) => Some((x, y)),
            _ => None,
        })
        .collect();

    if pairs.len() < 2 {
        return Ok(None);
    }

    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|(_, y)| y).sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in &pairs {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x == 0.0 || var_y == 0.0 {
        return Ok(None);
    }
    Ok(Some(cov / (var_x.sqrt() * var_y.sqrt())))
}

/// Percentile over a pre-sorted slice (linear interpolation).
pub fn percentile(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    if sorted.len() == 1 {
        return Some(sorted[0]);
    }
    let rank = p.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        return Some(sorted[lo]);
    }
    let frac = rank - lo as f64;
    Some(sorted[lo] * (1.0 - frac) + sorted[hi] * frac)
}

/// Top-k most frequent values of a column rendered as strings.
///
/// Ties break on the value text so the ordering is deterministic.
pub fn top_value_counts(series: &Series, k: usize) -> Result<Vec<(String, usize)>> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for idx in 0..series.len() {
        let value = series.get(idx)?;
        if matches!(value, AnyValue::Null) {
            continue;
        }
        *counts.entry(any_value_to_display(&value)).or_insert(0) += 1;
    }

    let mut entries: Vec<(String, usize)> = counts.into_iter().collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    entries.truncate(k);
    Ok(entries)
}

/// Render an AnyValue without the quoting polars applies to strings.
pub fn any_value_to_display(value: &AnyValue) -> String {
    match value {
        AnyValue::Null => "null".to_string(),
        AnyValue::String(s) => s.to_string(),
        AnyValue::StringOwned(s) => s.to_string(),
        other => other.to_string(),
    }
}

/// Format a number with thousands separators and two decimals: 1234567.8
/// becomes "1,234,567.80".
pub fn format_thousands(value: f64) -> String {
    let negative = value < 0.0;
    let abs = value.abs();
    let whole = abs.trunc() as u64;
    let frac = ((abs - abs.trunc()) * 100.0).round() as u64;
    // Rounding can carry into the whole part (e.g. 9.999 -> 10.00).
    let (whole, frac) = if frac >= 100 { (whole + 1, 0) } else { (whole, frac) };

    let digits = whole.to_string();
    let mut grouped = String::new();
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    format!("{}{}.{:02}", if negative { "-" } else { "" }, grouped, frac)
}
