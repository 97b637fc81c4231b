use thiserror::Error;

use crate::model::{Metric, WeatherRecord, WeatherTable};

/// A computation that needs at least one row was run on an empty table. This
/// is a contract violation on the caller's side, not an expected runtime
/// condition.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("cannot compute the {metric} average over an empty table")]
pub struct EmptyTableError {
    pub metric: Metric,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Highest,
    Lowest,
}

/// The `n` rows ranking highest (or lowest) by the given metric.
///
/// The sort is stable, so rows with equal values keep their table order.
/// Rows that do not carry the metric (optional provider fields) are left out
/// of the ranking.
pub fn top_n<'a>(
    table: &'a WeatherTable,
    metric: Metric,
    n: usize,
    direction: Direction,
) -> Vec<&'a WeatherRecord> {
    let mut ranked: Vec<(&WeatherRecord, f64)> = table
        .rows
        .iter()
        .filter_map(|row| metric.value_of(row).map(|value| (row, value)))
        .collect();

    ranked.sort_by(|a, b| match direction {
        Direction::Highest => b.1.total_cmp(&a.1),
        Direction::Lowest => a.1.total_cmp(&b.1),
    });

    ranked.into_iter().take(n).map(|(row, _)| row).collect()
}

/// Arithmetic mean of the metric over all rows that carry it.
pub fn average(table: &WeatherTable, metric: Metric) -> Result<f64, EmptyTableError> {
    let values: Vec<f64> =
        table.rows.iter().filter_map(|row| metric.value_of(row)).collect();

    if values.is_empty() {
        return Err(EmptyTableError { metric });
    }

    Ok(values.iter().sum::<f64>() / values.len() as f64)
}

/// Rows whose condition description contains the pattern, case-insensitively.
/// An empty result is valid.
pub fn filter_by_condition<'a>(table: &'a WeatherTable, pattern: &str) -> Vec<&'a WeatherRecord> {
    let needle = pattern.to_lowercase();

    table.rows.iter().filter(|row| row.condition.to_lowercase().contains(&needle)).collect()
}
