//! Core library for the `cityweather` tools.
//!
//! This crate defines:
//! - City batch normalization and validation
//! - Configuration & credentials handling
//! - Abstraction over the weather provider, plus an injectable cache
//! - Fan-out aggregation with per-city failure isolation
//! - Derived insights (rankings, averages, condition filters) and
//!   comparison projections over the aggregated table
//!
//! It is used by `cityweather-cli`, but can also be reused by other binaries
//! or services. Rendering, polling and file export stay with the consumer.

pub mod aggregate;
pub mod cache;
pub mod compare;
pub mod config;
pub mod insight;
pub mod model;
pub mod normalize;
pub mod provider;

pub use aggregate::aggregate;
pub use cache::CachedProvider;
pub use compare::{Comparison, ComparisonRow, compare};
pub use config::Config;
pub use insight::{Direction, EmptyTableError, average, filter_by_condition, top_n};
pub use model::{
    CityQuery, FailureReason, FetchFailure, ForecastEntry, Metric, Units, WeatherRecord,
    WeatherTable,
};
pub use normalize::{ValidationError, normalize};
pub use provider::{
    FetchOptions, WeatherProvider, openweather::OpenWeatherProvider, provider_from_config,
};
