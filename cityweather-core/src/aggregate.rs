use futures::stream::{self, StreamExt};
use tracing::info;

use crate::model::{CityQuery, FetchFailure, WeatherTable};
use crate::provider::{FetchOptions, WeatherProvider};

/// Upper bound on in-flight provider calls during fan-out.
const MAX_IN_FLIGHT: usize = 8;

/// Fan the provider out over a normalized batch of cities and collect the
/// outcomes into one table plus a failure list.
///
/// Individual city failures never abort the batch. Row order follows the
/// input query order restricted to the cities that succeeded. When every
/// city fails the table is empty and the caller decides how to surface that.
pub async fn aggregate(
    queries: &[CityQuery],
    provider: &dyn WeatherProvider,
    opts: &FetchOptions,
) -> (WeatherTable, Vec<FetchFailure>) {
    let in_flight = MAX_IN_FLIGHT.min(queries.len().max(1));

    let results: Vec<_> = stream::iter(queries)
        .map(|query| provider.fetch_current(query, opts))
        .buffered(in_flight)
        .collect()
        .await;

    let mut table = WeatherTable::new(opts.units);
    let mut failures = Vec::new();
    for result in results {
        match result {
            Ok(record) => table.rows.push(record),
            Err(failure) => failures.push(failure),
        }
    }

    info!(rows = table.len(), failures = failures.len(), "aggregation complete");
    (table, failures)
}
