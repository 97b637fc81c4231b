use anyhow::Context;
use clap::{Parser, Subcommand};

use cityweather_core::{
    CachedProvider, CityQuery, Comparison, Config, Direction, FetchFailure, FetchOptions, Metric,
    Units, WeatherProvider, WeatherRecord, WeatherTable, aggregate, average, compare,
    filter_by_condition, normalize, provider_from_config, top_n,
};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "cityweather", version, about = "Multi-city weather dashboard CLI")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Configure the OpenWeather API key and default unit system.
    Configure,

    /// Fetch current weather for one or more cities and print a table.
    Show {
        /// City names, e.g. "Dublin" "Paris".
        #[arg(required = true)]
        cities: Vec<String>,

        /// Unit system: metric or imperial. Defaults to the configured one.
        #[arg(long)]
        units: Option<String>,

        /// Language tag for condition descriptions, e.g. "en".
        #[arg(long)]
        lang: Option<String>,

        /// Keep only the top N cities by this metric, e.g. "temperature".
        #[arg(long)]
        top: Option<String>,

        /// Rank lowest instead of highest (with --top).
        #[arg(long)]
        lowest: bool,

        /// Number of rows to keep with --top.
        #[arg(short, long, default_value_t = 3)]
        n: usize,

        /// Keep only rows whose condition matches this keyword, e.g. "rain".
        #[arg(long)]
        condition: Option<String>,

        /// Also print the batch average of this metric.
        #[arg(long)]
        avg: Option<String>,

        /// Re-fetch and reprint every N seconds (Ctrl-C to stop).
        #[arg(long, value_name = "SECONDS")]
        refresh: Option<u64>,
    },

    /// Show the next 24 hours of forecast for a single city.
    Forecast {
        /// City name.
        city: String,

        /// Unit system: metric or imperial. Defaults to the configured one.
        #[arg(long)]
        units: Option<String>,

        /// Language tag, e.g. "en".
        #[arg(long)]
        lang: Option<String>,
    },

    /// Compare selected metrics across cities.
    Compare {
        /// City names to compare.
        #[arg(required = true)]
        cities: Vec<String>,

        /// Metrics to include, e.g. "temperature" "humidity".
        #[arg(long, required = true, num_args = 1..)]
        metrics: Vec<String>,
    },
}

/// View options for `show`, parsed up front so bad flags fail before any
/// network activity.
#[derive(Debug)]
struct ShowView {
    top: Option<Metric>,
    lowest: bool,
    n: usize,
    condition: Option<String>,
    avg: Option<Metric>,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Configure => configure(),
            Command::Show { cities, units, lang, top, lowest, n, condition, avg, refresh } => {
                let view = ShowView {
                    top: top.as_deref().map(Metric::try_from).transpose()?,
                    lowest,
                    n,
                    condition,
                    avg: avg.as_deref().map(Metric::try_from).transpose()?,
                };
                show(&cities, units, lang, view, refresh).await
            }
            Command::Forecast { city, units, lang } => forecast(&city, units, lang).await,
            Command::Compare { cities, metrics } => compare_cities(&cities, &metrics).await,
        }
    }
}

fn configure() -> anyhow::Result<()> {
    let mut config = Config::load()?;

    let api_key = inquire::Password::new("OpenWeather API key:")
        .without_confirmation()
        .prompt()
        .context("Failed to read API key")?;
    if api_key.trim().is_empty() {
        anyhow::bail!("API key must not be empty");
    }

    let units_choice = inquire::Select::new("Default unit system:", vec!["metric", "imperial"])
        .prompt()
        .context("Failed to read unit selection")?;

    config.set_api_key(api_key.trim().to_string());
    config.set_units(Units::try_from(units_choice)?);
    config.save()?;

    println!("Saved configuration to {}", Config::config_file_path()?.display());
    Ok(())
}

/// Build fetch options from the config, letting flags override the defaults.
fn options(
    config: &Config,
    units: Option<String>,
    lang: Option<String>,
) -> anyhow::Result<FetchOptions> {
    let units = match units {
        Some(s) => Units::try_from(s.as_str())?,
        None => config.units()?,
    };
    let language = lang.unwrap_or_else(|| config.language().to_string());

    Ok(FetchOptions::new(units, language))
}

async fn show(
    cities: &[String],
    units: Option<String>,
    lang: Option<String>,
    view: ShowView,
    refresh: Option<u64>,
) -> anyhow::Result<()> {
    let config = Config::load()?;
    let provider = provider_from_config(&config)?;
    let opts = options(&config, units, lang)?;
    let queries = normalize(cities, config.max_cities())?;

    match refresh {
        None => show_once(&queries, &provider, &opts, &view).await,
        Some(secs) => {
            let secs = secs.max(1);
            // One bucket per refresh interval: repeated fetches inside an
            // interval are served from memory, each tick gets fresh data.
            let cached = CachedProvider::new(provider, chrono::Duration::seconds(secs as i64));

            loop {
                show_once(&queries, &cached, &opts, &view).await?;
                tokio::time::sleep(std::time::Duration::from_secs(secs)).await;
                println!();
            }
        }
    }
}

async fn show_once(
    queries: &[CityQuery],
    provider: &dyn WeatherProvider,
    opts: &FetchOptions,
    view: &ShowView,
) -> anyhow::Result<()> {
    let (table, failures) = aggregate(queries, provider, opts).await;

    if table.is_empty() {
        println!("No weather data available.");
        print_failures(&failures);
        return Ok(());
    }

    let mut rows: Vec<&WeatherRecord> = table.rows.iter().collect();

    if let Some(pattern) = view.condition.as_deref() {
        rows = filter_by_condition(&table, pattern);
        if rows.is_empty() {
            println!("No cities currently report \"{pattern}\".");
            print_failures(&failures);
            return Ok(());
        }
    }

    if let Some(metric) = view.top {
        let direction = if view.lowest { Direction::Lowest } else { Direction::Highest };
        let ranked = top_n(&table, metric, view.n, direction);
        // intersect with any condition filter, keeping the ranking order
        rows = ranked
            .into_iter()
            .filter(|r| rows.iter().any(|kept| kept.city == r.city))
            .collect();
    }

    print_rows(&table, &rows);

    if let Some(metric) = view.avg {
        match average(&table, metric) {
            Ok(value) => println!("\nAverage {}: {:.2}", metric.label(table.units), value),
            Err(e) => println!("\n{e}"),
        }
    }

    print_failures(&failures);
    Ok(())
}

async fn forecast(city: &str, units: Option<String>, lang: Option<String>) -> anyhow::Result<()> {
    let config = Config::load()?;
    let provider = provider_from_config(&config)?;
    let opts = options(&config, units, lang)?;

    let queries = normalize(&[city], 1)?;
    let entries = match provider.fetch_forecast(&queries[0], &opts).await {
        Ok(entries) => entries,
        Err(failure) => anyhow::bail!("Could not fetch data for {failure}"),
    };

    if entries.is_empty() {
        println!("No forecast data available for {city}.");
        return Ok(());
    }

    println!("{:<18} {:>12} {:>9}", "Time (UTC)", temp_header(opts.units), "Hum (%)");
    for entry in entries {
        println!(
            "{:<18} {:>12.1} {:>9}",
            entry.time.format("%Y-%m-%d %H:%M"),
            entry.temperature,
            entry.humidity,
        );
    }

    Ok(())
}

async fn compare_cities(cities: &[String], metrics: &[String]) -> anyhow::Result<()> {
    let config = Config::load()?;
    let provider = provider_from_config(&config)?;
    let opts = options(&config, None, None)?;

    let metrics = metrics
        .iter()
        .map(|m| Metric::try_from(m.as_str()))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let queries = normalize(cities, config.max_cities())?;
    let (table, failures) = aggregate(&queries, &provider, &opts).await;

    let selected: Vec<String> = table.cities().map(str::to_string).collect();
    let comparison = compare(&table, &selected, &metrics);

    if comparison.is_empty() {
        println!("Nothing to compare.");
    } else {
        print_comparison(table.units, &comparison);
    }

    print_failures(&failures);
    Ok(())
}

fn temp_header(units: Units) -> String {
    format!("Temp ({})", units.temperature_suffix())
}

fn print_rows(table: &WeatherTable, rows: &[&WeatherRecord]) {
    let units = table.units;

    println!(
        "{:<18} {:>10} {:>8} {:>11} {:>9} {:>9} {:>9}  {:<17} {}",
        "City",
        temp_header(units),
        "Hum (%)",
        format!("Wind ({})", units.wind_speed_suffix()),
        "P (hPa)",
        "Sunrise",
        "Sunset",
        "Local time",
        "Condition",
    );

    for row in rows {
        println!(
            "{:<18} {:>10.1} {:>8} {:>11.1} {:>9.0} {:>9} {:>9}  {:<17} {}",
            row.city,
            row.temperature,
            row.humidity,
            row.wind_speed,
            row.pressure,
            row.sunrise.format("%H:%M"),
            row.sunset.format("%H:%M"),
            row.observed_at.format("%Y-%m-%d %H:%M"),
            row.condition,
        );
    }
}

fn print_comparison(units: Units, comparison: &Comparison) {
    print!("{:<18}", "City");
    for metric in &comparison.metrics {
        print!(" {:>18}", metric.label(units));
    }
    println!();

    for row in &comparison.rows {
        print!("{:<18}", row.city);
        for value in &row.values {
            match value {
                Some(v) => print!(" {v:>18.1}"),
                None => print!(" {:>18}", "-"),
            }
        }
        println!();
    }
}

fn print_failures(failures: &[FetchFailure]) {
    if failures.is_empty() {
        return;
    }

    println!();
    for failure in failures {
        println!("warning: {failure}");
    }
}
