use crate::{
    Config,
    model::{CityQuery, FetchFailure, ForecastEntry, Units, WeatherRecord},
    provider::openweather::OpenWeatherProvider,
};
use async_trait::async_trait;
use std::fmt::Debug;

pub mod openweather;

/// Per-call fetch parameters. Units and language are passed through verbatim
/// to the provider; output labels follow the requested unit system.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub units: Units,
    pub language: String,
}

impl FetchOptions {
    pub fn new(units: Units, language: impl Into<String>) -> Self {
        Self { units, language: language.into() }
    }
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self { units: Units::Metric, language: "en".to_string() }
    }
}

/// A source of per-city weather data. One outbound request per call, no
/// retries; every fault is reported as a per-city [`FetchFailure`] value
/// rather than unwinding the caller.
#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    async fn fetch_current(
        &self,
        query: &CityQuery,
        opts: &FetchOptions,
    ) -> Result<WeatherRecord, FetchFailure>;

    /// The next 24 hours of forecast slots for one city.
    async fn fetch_forecast(
        &self,
        query: &CityQuery,
        opts: &FetchOptions,
    ) -> Result<Vec<ForecastEntry>, FetchFailure>;
}

/// Construct the OpenWeather provider from config.
pub fn provider_from_config(config: &Config) -> anyhow::Result<OpenWeatherProvider> {
    let api_key = config.api_key().ok_or_else(|| {
        anyhow::anyhow!(
            "No API key configured.\n\
             Hint: run `cityweather configure` and enter your OpenWeather API key."
        )
    })?;

    Ok(OpenWeatherProvider::new(api_key.to_owned()))
}
