use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tracing::debug;

use crate::model::{CityQuery, FetchFailure, ForecastEntry, Units, WeatherRecord};
use crate::provider::{FetchOptions, WeatherProvider};

/// One cache slot per city/units/language combination within a time bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    city: String,
    units: Units,
    language: String,
    bucket: i64,
}

/// Wraps a provider so repeated fetches for the same city, units and language
/// within one time bucket are served from memory.
///
/// Only successful outcomes are cached; a failure goes back to the inner
/// provider on the next call. The host injects this wrapper explicitly; the
/// client itself never caches.
#[derive(Debug)]
pub struct CachedProvider<P> {
    inner: P,
    bucket: Duration,
    current: Mutex<HashMap<CacheKey, WeatherRecord>>,
    forecasts: Mutex<HashMap<CacheKey, Vec<ForecastEntry>>>,
}

impl<P> CachedProvider<P> {
    pub fn new(inner: P, bucket: Duration) -> Self {
        Self {
            inner,
            bucket,
            current: Mutex::new(HashMap::new()),
            forecasts: Mutex::new(HashMap::new()),
        }
    }

    fn key(&self, query: &CityQuery, opts: &FetchOptions) -> CacheKey {
        let seconds = self.bucket.num_seconds().max(1);

        CacheKey {
            city: query.name().to_string(),
            units: opts.units,
            language: opts.language.clone(),
            bucket: Utc::now().timestamp() / seconds,
        }
    }
}

#[async_trait]
impl<P: WeatherProvider> WeatherProvider for CachedProvider<P> {
    async fn fetch_current(
        &self,
        query: &CityQuery,
        opts: &FetchOptions,
    ) -> Result<WeatherRecord, FetchFailure> {
        let key = self.key(query, opts);

        if let Some(hit) =
            self.current.lock().unwrap_or_else(|e| e.into_inner()).get(&key).cloned()
        {
            debug!(city = query.name(), "serving current conditions from cache");
            return Ok(hit);
        }

        let record = self.inner.fetch_current(query, opts).await?;
        self.current.lock().unwrap_or_else(|e| e.into_inner()).insert(key, record.clone());

        Ok(record)
    }

    async fn fetch_forecast(
        &self,
        query: &CityQuery,
        opts: &FetchOptions,
    ) -> Result<Vec<ForecastEntry>, FetchFailure> {
        let key = self.key(query, opts);

        if let Some(hit) =
            self.forecasts.lock().unwrap_or_else(|e| e.into_inner()).get(&key).cloned()
        {
            debug!(city = query.name(), "serving forecast from cache");
            return Ok(hit);
        }

        let entries = self.inner.fetch_forecast(query, opts).await?;
        self.forecasts.lock().unwrap_or_else(|e| e.into_inner()).insert(key, entries.clone());

        Ok(entries)
    }
}
