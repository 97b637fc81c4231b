use crate::model::{Metric, WeatherTable};

/// One row of a comparison projection: the city plus one value per selected
/// metric, in the projection's column order.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonRow {
    pub city: String,
    pub values: Vec<Option<f64>>,
}

/// A comparison-ready projection of the aggregated table. The city column is
/// always retained; `metrics` describes the remaining columns.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub metrics: Vec<Metric>,
    pub rows: Vec<ComparisonRow>,
}

impl Comparison {
    /// True when there is nothing to compare (no rows or no metric columns).
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() || self.metrics.is_empty()
    }
}

/// Project the table onto a city subset and a metric subset.
///
/// Rows keep the table's order; selected cities not present in the table are
/// silently omitted. Duplicate metric selections collapse to a single
/// column. Empty selections produce an empty projection rather than an
/// error.
pub fn compare(
    table: &WeatherTable,
    selected_cities: &[String],
    selected_metrics: &[Metric],
) -> Comparison {
    let mut metrics: Vec<Metric> = Vec::new();
    for metric in selected_metrics {
        if !metrics.contains(metric) {
            metrics.push(*metric);
        }
    }

    let rows = table
        .rows
        .iter()
        .filter(|row| selected_cities.iter().any(|city| city == &row.city))
        .map(|row| ComparisonRow {
            city: row.city.clone(),
            values: metrics.iter().map(|metric| metric.value_of(row)).collect(),
        })
        .collect();

    Comparison { metrics, rows }
}
