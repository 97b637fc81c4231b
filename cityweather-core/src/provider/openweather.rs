use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveTime, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;

use crate::model::{CityQuery, FailureReason, FetchFailure, ForecastEntry, WeatherRecord};

use super::{FetchOptions, WeatherProvider};

const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org/data/2.5";

/// The forecast endpoint reports three-hour steps; eight slots cover the
/// next 24 hours.
const FORECAST_SLOTS: usize = 8;

#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    api_key: String,
    http: Client,
    base_url: String,
}

impl OpenWeatherProvider {
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL.to_string())
    }

    /// Point the provider at a different host. Tests use this to target a
    /// local mock server.
    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        Self { api_key, http: Client::new(), base_url }
    }

    /// One outbound GET, no retry. Every transport or status fault becomes a
    /// per-city failure value.
    async fn get_json(
        &self,
        path: &str,
        query: &CityQuery,
        opts: &FetchOptions,
    ) -> Result<String, FetchFailure> {
        let url = format!("{}/{}", self.base_url, path);

        let res = self
            .http
            .get(&url)
            .query(&[
                ("q", query.name()),
                ("appid", self.api_key.as_str()),
                ("units", opts.units.as_str()),
                ("lang", opts.language.as_str()),
            ])
            .send()
            .await
            .map_err(|e| {
                debug!(city = query.name(), error = %e, "request failed to send");
                FetchFailure::new(query.name(), FailureReason::NetworkError)
            })?;

        let status = res.status();
        let body = res.text().await.map_err(|e| {
            debug!(city = query.name(), error = %e, "failed to read response body");
            FetchFailure::new(query.name(), FailureReason::NetworkError)
        })?;

        if status.is_success() {
            Ok(body)
        } else {
            debug!(city = query.name(), %status, "provider returned error status");
            Err(FetchFailure::new(query.name(), reason_for_status(status)))
        }
    }
}

fn reason_for_status(status: StatusCode) -> FailureReason {
    match status {
        StatusCode::NOT_FOUND => FailureReason::NotFound,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => FailureReason::AuthFailed,
        StatusCode::TOO_MANY_REQUESTS => FailureReason::RateLimited,
        _ => FailureReason::NetworkError,
    }
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    feels_like: Option<f64>,
    humidity: i64,
    pressure: f64,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    description: String,
}

#[derive(Debug, Deserialize)]
struct OwWind {
    speed: f64,
}

#[derive(Debug, Deserialize)]
struct OwSys {
    sunrise: i64,
    sunset: i64,
}

#[derive(Debug, Deserialize)]
struct OwCoord {
    lat: f64,
    lon: f64,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    name: String,
    dt: i64,
    timezone: i32,
    main: OwMain,
    weather: Vec<OwWeather>,
    wind: OwWind,
    visibility: Option<u32>,
    sys: OwSys,
    coord: OwCoord,
}

#[derive(Debug, Deserialize)]
struct OwForecastMain {
    temp: f64,
    humidity: i64,
}

#[derive(Debug, Deserialize)]
struct OwForecastEntry {
    dt: i64,
    main: OwForecastMain,
}

#[derive(Debug, Deserialize)]
struct OwForecastResponse {
    list: Vec<OwForecastEntry>,
}

/// Shift a provider timestamp into the city's own local offset. This is the
/// offset the provider reports for the city, not the host timezone.
fn local_time_of_day(ts: i64, offset: FixedOffset) -> Result<NaiveTime, FailureReason> {
    let utc = DateTime::from_timestamp(ts, 0).ok_or(FailureReason::MalformedResponse)?;
    Ok(utc.with_timezone(&offset).time())
}

fn record_from_current(parsed: OwCurrentResponse) -> Result<WeatherRecord, FailureReason> {
    let offset =
        FixedOffset::east_opt(parsed.timezone).ok_or(FailureReason::MalformedResponse)?;

    let observed_at = DateTime::from_timestamp(parsed.dt, 0)
        .ok_or(FailureReason::MalformedResponse)?
        .with_timezone(&offset);

    let humidity = u8::try_from(parsed.main.humidity)
        .ok()
        .filter(|h| *h <= 100)
        .ok_or(FailureReason::MalformedResponse)?;

    if !(-90.0..=90.0).contains(&parsed.coord.lat)
        || !(-180.0..=180.0).contains(&parsed.coord.lon)
    {
        return Err(FailureReason::MalformedResponse);
    }

    let condition = parsed
        .weather
        .into_iter()
        .next()
        .map(|w| w.description)
        .ok_or(FailureReason::MalformedResponse)?;

    Ok(WeatherRecord {
        city: parsed.name,
        temperature: parsed.main.temp,
        feels_like: parsed.main.feels_like,
        humidity,
        wind_speed: parsed.wind.speed,
        pressure: parsed.main.pressure,
        visibility: parsed.visibility,
        condition,
        observed_at,
        sunrise: local_time_of_day(parsed.sys.sunrise, offset)?,
        sunset: local_time_of_day(parsed.sys.sunset, offset)?,
        latitude: parsed.coord.lat,
        longitude: parsed.coord.lon,
    })
}

fn forecast_entry(parsed: OwForecastEntry) -> Result<ForecastEntry, FailureReason> {
    let time = DateTime::<Utc>::from_timestamp(parsed.dt, 0)
        .ok_or(FailureReason::MalformedResponse)?;

    let humidity = u8::try_from(parsed.main.humidity)
        .ok()
        .filter(|h| *h <= 100)
        .ok_or(FailureReason::MalformedResponse)?;

    Ok(ForecastEntry { time, temperature: parsed.main.temp, humidity })
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
    async fn fetch_current(
        &self,
        query: &CityQuery,
        opts: &FetchOptions,
    ) -> Result<WeatherRecord, FetchFailure> {
        let body = self.get_json("weather", query, opts).await?;

        let parsed: OwCurrentResponse = serde_json::from_str(&body).map_err(|e| {
            debug!(city = query.name(), error = %e, "failed to parse current weather payload");
            FetchFailure::new(query.name(), FailureReason::MalformedResponse)
        })?;

        debug!(city = query.name(), "fetched current conditions");
        record_from_current(parsed).map_err(|reason| FetchFailure::new(query.name(), reason))
    }

    async fn fetch_forecast(
        &self,
        query: &CityQuery,
        opts: &FetchOptions,
    ) -> Result<Vec<ForecastEntry>, FetchFailure> {
        let body = self.get_json("forecast", query, opts).await?;

        let parsed: OwForecastResponse = serde_json::from_str(&body).map_err(|e| {
            debug!(city = query.name(), error = %e, "failed to parse forecast payload");
            FetchFailure::new(query.name(), FailureReason::MalformedResponse)
        })?;

        parsed
            .list
            .into_iter()
            .take(FORECAST_SLOTS)
            .map(forecast_entry)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|reason| FetchFailure::new(query.name(), reason))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize;
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn query(name: &str) -> CityQuery {
        normalize(&[name], 1).expect("valid city name").remove(0)
    }

    fn current_body(timezone: i32) -> String {
        json!({
            "coord": {"lon": -6.2672, "lat": 53.344},
            "weather": [{"description": "light rain"}],
            "main": {"temp": 11.6, "feels_like": 11.0, "humidity": 87, "pressure": 1012.0},
            "visibility": 10000,
            "wind": {"speed": 6.17},
            "dt": 1_700_000_000,
            "sys": {"sunrise": 1_699_947_000, "sunset": 1_699_980_000},
            "timezone": timezone,
            "name": "Dublin"
        })
        .to_string()
    }

    #[tokio::test]
    async fn parses_successful_current_response() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/weather")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(current_body(0))
            .create_async()
            .await;

        let provider = OpenWeatherProvider::with_base_url("KEY".to_string(), server.url());
        let record = provider
            .fetch_current(&query("Dublin"), &FetchOptions::default())
            .await
            .expect("fetch should succeed");

        assert_eq!(record.city, "Dublin");
        assert_eq!(record.temperature, 11.6);
        assert_eq!(record.feels_like, Some(11.0));
        assert_eq!(record.humidity, 87);
        assert_eq!(record.pressure, 1012.0);
        assert_eq!(record.visibility, Some(10_000));
        assert_eq!(record.condition, "light rain");
        assert_eq!(record.latitude, 53.344);

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn derives_local_time_from_city_offset() {
        let mut server = Server::new_async().await;
        // dt 1700000000 is 22:13:20 UTC; a +1h offset puts the city at 23:13.
        server
            .mock("GET", "/weather")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(current_body(3600))
            .create_async()
            .await;

        let provider = OpenWeatherProvider::with_base_url("KEY".to_string(), server.url());
        let record = provider
            .fetch_current(&query("Dublin"), &FetchOptions::default())
            .await
            .expect("fetch should succeed");

        assert_eq!(record.observed_at.offset().local_minus_utc(), 3600);
        assert_eq!(record.observed_at.format("%H:%M:%S").to_string(), "23:13:20");
        // sunrise 1699947000 is 07:30:00 UTC, so 08:30 city-local
        assert_eq!(record.sunrise.format("%H:%M:%S").to_string(), "08:30:00");
    }

    #[tokio::test]
    async fn passes_units_and_language_through_verbatim() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/weather")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("q".into(), "Dublin".into()),
                Matcher::UrlEncoded("appid".into(), "KEY".into()),
                Matcher::UrlEncoded("units".into(), "imperial".into()),
                Matcher::UrlEncoded("lang".into(), "de".into()),
            ]))
            .with_status(200)
            .with_body(current_body(0))
            .create_async()
            .await;

        let provider = OpenWeatherProvider::with_base_url("KEY".to_string(), server.url());
        let opts = FetchOptions::new(crate::model::Units::Imperial, "de");
        provider.fetch_current(&query("Dublin"), &opts).await.expect("fetch should succeed");

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn maps_404_to_not_found() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/weather")
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body(r#"{"cod":"404","message":"city not found"}"#)
            .create_async()
            .await;

        let provider = OpenWeatherProvider::with_base_url("KEY".to_string(), server.url());
        let failure = provider
            .fetch_current(&query("Nowhereville"), &FetchOptions::default())
            .await
            .unwrap_err();

        assert_eq!(failure.city, "Nowhereville");
        assert_eq!(failure.reason, FailureReason::NotFound);
    }

    #[tokio::test]
    async fn maps_401_to_auth_failed() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/weather")
            .match_query(Matcher::Any)
            .with_status(401)
            .create_async()
            .await;

        let provider = OpenWeatherProvider::with_base_url("BAD".to_string(), server.url());
        let failure =
            provider.fetch_current(&query("Dublin"), &FetchOptions::default()).await.unwrap_err();

        assert_eq!(failure.reason, FailureReason::AuthFailed);
    }

    #[tokio::test]
    async fn maps_429_to_rate_limited() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/weather")
            .match_query(Matcher::Any)
            .with_status(429)
            .create_async()
            .await;

        let provider = OpenWeatherProvider::with_base_url("KEY".to_string(), server.url());
        let failure =
            provider.fetch_current(&query("Dublin"), &FetchOptions::default()).await.unwrap_err();

        assert_eq!(failure.reason, FailureReason::RateLimited);
    }

    #[tokio::test]
    async fn maps_unparseable_payload_to_malformed_response() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/weather")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("not json at all")
            .create_async()
            .await;

        let provider = OpenWeatherProvider::with_base_url("KEY".to_string(), server.url());
        let failure =
            provider.fetch_current(&query("Dublin"), &FetchOptions::default()).await.unwrap_err();

        assert_eq!(failure.reason, FailureReason::MalformedResponse);
    }

    #[tokio::test]
    async fn rejects_out_of_range_humidity() {
        let mut server = Server::new_async().await;
        let body = current_body(0).replace("\"humidity\":87", "\"humidity\":150");
        server
            .mock("GET", "/weather")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(body)
            .create_async()
            .await;

        let provider = OpenWeatherProvider::with_base_url("KEY".to_string(), server.url());
        let failure =
            provider.fetch_current(&query("Dublin"), &FetchOptions::default()).await.unwrap_err();

        assert_eq!(failure.reason, FailureReason::MalformedResponse);
    }

    #[tokio::test]
    async fn forecast_keeps_the_first_eight_slots() {
        let mut server = Server::new_async().await;

        let list: Vec<_> = (0..12)
            .map(|i| {
                json!({
                    "dt": 1_700_000_000 + i * 10_800,
                    "main": {"temp": 10.0 + i as f64, "humidity": 80}
                })
            })
            .collect();
        server
            .mock("GET", "/forecast")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(json!({ "list": list }).to_string())
            .create_async()
            .await;

        let provider = OpenWeatherProvider::with_base_url("KEY".to_string(), server.url());
        let entries = provider
            .fetch_forecast(&query("Dublin"), &FetchOptions::default())
            .await
            .expect("forecast should succeed");

        assert_eq!(entries.len(), 8);
        assert_eq!(entries[0].temperature, 10.0);
        assert_eq!(entries[7].temperature, 17.0);
        // three-hour steps
        assert_eq!((entries[1].time - entries[0].time).num_hours(), 3);
    }

    #[tokio::test]
    async fn forecast_failures_use_the_same_taxonomy() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/forecast")
            .match_query(Matcher::Any)
            .with_status(404)
            .create_async()
            .await;

        let provider = OpenWeatherProvider::with_base_url("KEY".to_string(), server.url());
        let failure = provider
            .fetch_forecast(&query("Nowhereville"), &FetchOptions::default())
            .await
            .unwrap_err();

        assert_eq!(failure.reason, FailureReason::NotFound);
    }
}
