use std::collections::HashSet;

use thiserror::Error;

use crate::model::CityQuery;

/// Rejected input batch. Raised before any network activity happens.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("no usable city names after trimming and deduplication")]
    EmptyBatch,

    #[error("batch of {got} cities exceeds the maximum of {max}")]
    BatchTooLarge { got: usize, max: usize },
}

/// Clean a raw list of city names into a validated batch.
///
/// Trims whitespace, drops entries that are empty after trimming and
/// deduplicates case-sensitively while preserving first-seen order. The
/// resulting order is what the aggregator preserves in its row order.
pub fn normalize<S: AsRef<str>>(
    raw_names: &[S],
    max_batch: usize,
) -> Result<Vec<CityQuery>, ValidationError> {
    let mut seen = HashSet::new();
    let mut queries = Vec::new();

    for raw in raw_names {
        let trimmed = raw.as_ref().trim();
        if trimmed.is_empty() {
            continue;
        }
        if seen.insert(trimmed.to_string()) {
            queries.push(CityQuery::new(trimmed.to_string()));
        }
    }

    if queries.is_empty() {
        return Err(ValidationError::EmptyBatch);
    }
    if queries.len() > max_batch {
        return Err(ValidationError::BatchTooLarge { got: queries.len(), max: max_batch });
    }

    Ok(queries)
}
