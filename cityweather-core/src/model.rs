use chrono::{DateTime, FixedOffset, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// Unit system passed through verbatim to the weather provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Units {
    Metric,
    Imperial,
}

impl Units {
    pub fn as_str(&self) -> &'static str {
        match self {
            Units::Metric => "metric",
            Units::Imperial => "imperial",
        }
    }

    pub const fn all() -> &'static [Units] {
        &[Units::Metric, Units::Imperial]
    }

    pub fn temperature_suffix(&self) -> &'static str {
        match self {
            Units::Metric => "°C",
            Units::Imperial => "°F",
        }
    }

    pub fn wind_speed_suffix(&self) -> &'static str {
        match self {
            Units::Metric => "m/s",
            Units::Imperial => "mph",
        }
    }
}

impl std::fmt::Display for Units {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for Units {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.to_lowercase();

        match lower.as_str() {
            "metric" => Ok(Units::Metric),
            "imperial" => Ok(Units::Imperial),
            _ => Err(anyhow::anyhow!(
                "Unknown unit system '{value}'. Supported systems: metric, imperial."
            )),
        }
    }
}

/// A numeric column of the aggregated table. Rankings, averages and
/// comparison projections are all keyed by this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    Temperature,
    FeelsLike,
    Humidity,
    WindSpeed,
    Pressure,
    Visibility,
}

impl Metric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Temperature => "temperature",
            Metric::FeelsLike => "feels-like",
            Metric::Humidity => "humidity",
            Metric::WindSpeed => "wind-speed",
            Metric::Pressure => "pressure",
            Metric::Visibility => "visibility",
        }
    }

    pub const fn all() -> &'static [Metric] {
        &[
            Metric::Temperature,
            Metric::FeelsLike,
            Metric::Humidity,
            Metric::WindSpeed,
            Metric::Pressure,
            Metric::Visibility,
        ]
    }

    /// Column header for display/export, suffixed with the unit the table
    /// was fetched in, e.g. "Temperature (°C)".
    pub fn label(&self, units: Units) -> String {
        match self {
            Metric::Temperature => format!("Temperature ({})", units.temperature_suffix()),
            Metric::FeelsLike => format!("Feels Like ({})", units.temperature_suffix()),
            Metric::Humidity => "Humidity (%)".to_string(),
            Metric::WindSpeed => format!("Wind Speed ({})", units.wind_speed_suffix()),
            Metric::Pressure => "Pressure (hPa)".to_string(),
            Metric::Visibility => "Visibility (m)".to_string(),
        }
    }

    /// The value of this column in one row. `None` when the provider did not
    /// report the underlying optional field.
    pub fn value_of(&self, record: &WeatherRecord) -> Option<f64> {
        match self {
            Metric::Temperature => Some(record.temperature),
            Metric::FeelsLike => record.feels_like,
            Metric::Humidity => Some(f64::from(record.humidity)),
            Metric::WindSpeed => Some(record.wind_speed),
            Metric::Pressure => Some(record.pressure),
            Metric::Visibility => record.visibility.map(f64::from),
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for Metric {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.to_lowercase();

        match lower.as_str() {
            "temperature" => Ok(Metric::Temperature),
            "feels-like" => Ok(Metric::FeelsLike),
            "humidity" => Ok(Metric::Humidity),
            "wind-speed" => Ok(Metric::WindSpeed),
            "pressure" => Ok(Metric::Pressure),
            "visibility" => Ok(Metric::Visibility),
            _ => Err(anyhow::anyhow!(
                "Unknown metric '{value}'. Supported metrics: temperature, feels-like, \
                 humidity, wind-speed, pressure, visibility."
            )),
        }
    }
}

/// A single validated city name: non-empty, trimmed, deduplicated within its
/// batch by the normalizer. Built per aggregation call and discarded after.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CityQuery {
    name: String,
}

impl CityQuery {
    pub(crate) fn new(name: String) -> Self {
        Self { name }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Display for CityQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// Normalized outcome of one successful fetch. Observation time, sunrise and
/// sunset are in the city's own local offset, not the host timezone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherRecord {
    pub city: String,
    pub temperature: f64,
    pub feels_like: Option<f64>,
    pub humidity: u8,
    pub wind_speed: f64,
    pub pressure: f64,
    pub visibility: Option<u32>,
    pub condition: String,
    pub observed_at: DateTime<FixedOffset>,
    pub sunrise: NaiveTime,
    pub sunset: NaiveTime,
    pub latitude: f64,
    pub longitude: f64,
}

/// Why a city could not be fetched. Terminal for that aggregation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    NotFound,
    AuthFailed,
    RateLimited,
    NetworkError,
    MalformedResponse,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::NotFound => "not-found",
            FailureReason::AuthFailed => "auth-failed",
            FailureReason::RateLimited => "rate-limited",
            FailureReason::NetworkError => "network-error",
            FailureReason::MalformedResponse => "malformed-response",
        }
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-city fetch failure, collected alongside successes by the aggregator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchFailure {
    pub city: String,
    pub reason: FailureReason,
}

impl FetchFailure {
    pub fn new(city: impl Into<String>, reason: FailureReason) -> Self {
        Self { city: city.into(), reason }
    }
}

impl std::fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.city, self.reason)
    }
}

/// Ordered collection of fetched records, one row per city that succeeded,
/// rebuilt on every aggregation call. Downstream consumers treat it as
/// read-only.
#[derive(Debug, Clone, Serialize)]
pub struct WeatherTable {
    pub units: Units,
    pub rows: Vec<WeatherRecord>,
}

impl WeatherTable {
    pub fn new(units: Units) -> Self {
        Self { units, rows: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// City names in row order.
    pub fn cities(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().map(|row| row.city.as_str())
    }
}

/// One slot of the 24-hour forecast (the provider reports three-hour steps).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastEntry {
    pub time: DateTime<Utc>,
    pub temperature: f64,
    pub humidity: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_as_str_roundtrip() {
        for metric in Metric::all() {
            let s = metric.as_str();
            let parsed = Metric::try_from(s).expect("roundtrip should succeed");
            assert_eq!(*metric, parsed);
        }
    }

    #[test]
    fn unknown_metric_error() {
        let err = Metric::try_from("doesnotexist").unwrap_err();
        assert!(err.to_string().contains("Unknown metric"));
    }

    #[test]
    fn units_as_str_roundtrip() {
        for units in Units::all() {
            let s = units.as_str();
            let parsed = Units::try_from(s).expect("roundtrip should succeed");
            assert_eq!(*units, parsed);
        }
    }

    #[test]
    fn unknown_units_error() {
        let err = Units::try_from("kelvin").unwrap_err();
        assert!(err.to_string().contains("Unknown unit system"));
    }

    #[test]
    fn metric_label_follows_unit_system() {
        assert_eq!(Metric::Temperature.label(Units::Metric), "Temperature (°C)");
        assert_eq!(Metric::Temperature.label(Units::Imperial), "Temperature (°F)");
        assert_eq!(Metric::WindSpeed.label(Units::Imperial), "Wind Speed (mph)");
        assert_eq!(Metric::Humidity.label(Units::Imperial), "Humidity (%)");
    }

    #[test]
    fn metric_value_of_reads_optional_fields() {
        let record = WeatherRecord {
            city: "Dublin".to_string(),
            temperature: 14.2,
            feels_like: None,
            humidity: 81,
            wind_speed: 5.1,
            pressure: 1011.0,
            visibility: None,
            condition: "light rain".to_string(),
            observed_at: chrono::DateTime::from_timestamp(1_700_000_000, 0)
                .expect("valid timestamp")
                .fixed_offset(),
            sunrise: NaiveTime::from_hms_opt(7, 42, 0).expect("valid time"),
            sunset: NaiveTime::from_hms_opt(16, 30, 0).expect("valid time"),
            latitude: 53.35,
            longitude: -6.26,
        };

        assert_eq!(Metric::Temperature.value_of(&record), Some(14.2));
        assert_eq!(Metric::Humidity.value_of(&record), Some(81.0));
        assert_eq!(Metric::FeelsLike.value_of(&record), None);
        assert_eq!(Metric::Visibility.value_of(&record), None);
    }
}
