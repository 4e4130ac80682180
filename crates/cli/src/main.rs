use anyhow::{anyhow, Context, Result};
use catalog::{CatalogRow, FieldValue, ItemId, ReferenceCatalog};
use clap::{Parser, Subcommand};
use colored::Colorize;
use server::config::{DEFAULT_TOP_K, MAX_RATING, MAX_TOP_K, MIN_RATING};
use server::{QueryLimits, RatingQuery, RecommendationService, Recommendations, ServiceConfig};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::warn;

/// Column shown as the place's name when present
const NAME_COLUMN: &str = "Place_Name";

/// place-recs - Tourism place recommendations from a single rating
#[derive(Parser)]
#[command(name = "place-recs")]
#[command(about = "Recommend tourism places from a single item rating", long_about = None)]
struct Cli {
    /// Path to the place catalog CSV
    #[arg(short, long, env = "PLACE_RECS_CATALOG", default_value = "data/tourism_with_id.csv")]
    catalog: PathBuf,

    /// Catalog column holding the item identifier
    #[arg(long, env = "PLACE_RECS_ID_COLUMN", default_value = "Place_Id")]
    id_column: String,

    /// Address of the ranking model sidecar
    #[arg(long, env = "PLACE_RECS_MODEL_ADDR", default_value = "http://localhost:50051")]
    model_addr: String,

    /// Deadline for a single model call, in milliseconds
    #[arg(long, env = "PLACE_RECS_MODEL_TIMEOUT_MS", default_value_t = 2000)]
    model_timeout_ms: u64,

    /// How long to wait when connecting to the model, in milliseconds
    #[arg(long, default_value_t = 5000)]
    connect_timeout_ms: u64,

    /// Lowest rating the model accepts
    #[arg(long, default_value_t = MIN_RATING)]
    min_rating: f64,

    /// Highest rating the model accepts
    #[arg(long, default_value_t = MAX_RATING)]
    max_rating: f64,

    /// Largest number of recommendations a request may ask for
    #[arg(long, default_value_t = MAX_TOP_K)]
    max_top_k: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve POST /predict over HTTP
    Serve {
        /// Address to listen on
        #[arg(long, env = "PLACE_RECS_BIND", default_value = "127.0.0.1:5000")]
        bind: SocketAddr,
    },

    /// Get recommendations for one rated place
    Recommend {
        /// Identifier of the rated place
        #[arg(long)]
        item: String,

        /// Rating given to the place
        #[arg(long)]
        rating: f64,

        /// Number of recommendations to return
        #[arg(long, default_value_t = DEFAULT_TOP_K)]
        top_k: usize,
    },

    /// Show one catalog row
    Lookup {
        /// Identifier of the place
        #[arg(long)]
        item: String,
    },

    /// Search the catalog (case-insensitive substring match)
    Search {
        /// Column to search in
        #[arg(long, default_value = NAME_COLUMN)]
        column: String,

        /// Text to look for
        #[arg(long)]
        query: String,

        /// Maximum number of matches to print
        #[arg(long, default_value = "20")]
        limit: usize,
    },

    /// Run benchmark to test performance
    Benchmark {
        /// Number of requests to make
        #[arg(long, default_value = "100")]
        requests: usize,

        /// Number of concurrent requests
        #[arg(long, default_value = "10")]
        concurrent: usize,
    },
}

impl Cli {
    /// Turn flags into the service configuration
    fn service_config(&self, bind: Option<SocketAddr>) -> Result<ServiceConfig> {
        let defaults = ServiceConfig::default();
        let limits = QueryLimits {
            default_top_k: DEFAULT_TOP_K.min(self.max_top_k),
            max_top_k: self.max_top_k,
            min_rating: self.min_rating,
            max_rating: self.max_rating,
        };
        limits
            .check()
            .map_err(|reason| anyhow!("Invalid limits: {}", reason))?;

        Ok(ServiceConfig {
            catalog_path: self.catalog.clone(),
            id_column: self.id_column.clone(),
            model_addr: self.model_addr.clone(),
            model_timeout: Duration::from_millis(self.model_timeout_ms),
            model_connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            bind_addr: bind.unwrap_or(defaults.bind_addr),
            limits,
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Serve { bind } => {
            let config = cli.service_config(Some(*bind))?;
            handle_serve(config).await?
        }
        Commands::Recommend {
            item,
            rating,
            top_k,
        } => {
            let config = cli.service_config(None)?;
            handle_recommend(config, item, *rating, *top_k).await?
        }
        Commands::Lookup { item } => handle_lookup(&load_catalog(&cli)?, item)?,
        Commands::Search {
            column,
            query,
            limit,
        } => handle_search(&load_catalog(&cli)?, column, query, *limit)?,
        Commands::Benchmark {
            requests,
            concurrent,
        } => {
            let config = cli.service_config(None)?;
            handle_benchmark(config, *requests, *concurrent).await?
        }
    }

    Ok(())
}

/// Load only the catalog, for commands that never call the model
fn load_catalog(cli: &Cli) -> Result<ReferenceCatalog> {
    println!("Loading catalog from {}...", cli.catalog.display());
    let start = Instant::now();
    let catalog = ReferenceCatalog::load(&cli.catalog, &cli.id_column)
        .context("Failed to load place catalog")?;
    println!(
        "{} Loaded {} places in {:?}",
        "✓".green(),
        catalog.len(),
        start.elapsed()
    );
    Ok(catalog)
}

fn parse_item(raw: &str) -> Result<ItemId> {
    ItemId::parse(raw).ok_or_else(|| anyhow!("Item identifier must not be empty"))
}

/// Handle the 'serve' command
async fn handle_serve(config: ServiceConfig) -> Result<()> {
    let service = RecommendationService::from_config(&config).await?;
    server::http::serve(&config, service).await
}

/// Handle the 'recommend' command
async fn handle_recommend(
    config: ServiceConfig,
    item: &str,
    rating: f64,
    top_k: usize,
) -> Result<()> {
    // Validate before connecting to anything
    let query = RatingQuery::new(parse_item(item)?, rating, top_k, &config.limits)?;

    let service = RecommendationService::from_config(&config).await?;
    if !service.catalog().contains(&query.item) {
        warn!("Item {} is not in the catalog; asking the model anyway", query.item);
    }

    let recommendations = service.recommend(&query).await?;
    print_recommendations(&recommendations);
    Ok(())
}

/// Handle the 'lookup' command
fn handle_lookup(catalog: &ReferenceCatalog, item: &str) -> Result<()> {
    let id = parse_item(item)?;
    let row = catalog
        .lookup(&id)
        .ok_or_else(|| anyhow!("Place {} not found", id))?;

    println!("{}", format!("Place {}", id).bold().blue());
    for (column, value) in row.fields() {
        if !value.is_null() {
            println!("{}{}: {}", "• ".green(), column, value);
        }
    }
    Ok(())
}

/// Handle the 'search' command
fn handle_search(catalog: &ReferenceCatalog, column: &str, query: &str, limit: usize) -> Result<()> {
    if !catalog.columns().iter().any(|c| c == column) {
        return Err(anyhow!(
            "Unknown column '{}'. Available: {}",
            column,
            catalog.columns().join(", ")
        ));
    }

    let matches = catalog.search(column, query);
    println!(
        "{}",
        format!("Search results for '{}' in {} ({} matches):", query, column, matches.len())
            .bold()
            .blue()
    );
    for row in matches.iter().take(limit) {
        println!("{}: {}", row.id, display_name(row));
    }
    Ok(())
}

/// Handle the 'benchmark' command
async fn handle_benchmark(config: ServiceConfig, requests: usize, concurrent: usize) -> Result<()> {
    if requests == 0 || concurrent == 0 {
        return Err(anyhow!("requests and concurrent must both be at least 1"));
    }

    let service = RecommendationService::from_config(&config).await?;
    let item_ids: Vec<ItemId> = service.catalog().item_ids().cloned().collect();
    if item_ids.is_empty() {
        return Err(anyhow!("Catalog is empty, nothing to benchmark"));
    }

    // Random (item, rating) pairs drawn from the catalog
    let limits = config.limits;
    let queries = (0..requests)
        .map(|_| {
            let item = item_ids[rand::random_range(0..item_ids.len())].clone();
            let rating = rand::random_range(limits.min_rating..=limits.max_rating)
                .round()
                .clamp(limits.min_rating, limits.max_rating);
            RatingQuery::new(item, rating, limits.default_top_k, &limits)
        })
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let semaphore = Arc::new(Semaphore::new(concurrent));
    let wall_clock = Instant::now();
    let mut handles = Vec::with_capacity(requests);
    for query in queries {
        let permit = semaphore.clone().acquire_owned().await?;
        let service = service.clone();
        handles.push(tokio::spawn(async move {
            let start = Instant::now();
            let result = service.recommend(&query).await;
            drop(permit);
            (start.elapsed(), result.is_ok())
        }));
    }

    let mut timings = Vec::with_capacity(requests);
    let mut failures = 0usize;
    for handle in handles {
        let (elapsed, ok) = handle.await?;
        if !ok {
            failures += 1;
        }
        timings.push(elapsed);
    }
    let total_time = wall_clock.elapsed();

    timings.sort();
    let total_latency: Duration = timings.iter().sum();
    let avg_latency = total_latency / (timings.len() as u32);
    let throughput = requests as f64 / total_time.as_secs_f64();

    println!("{}", "Benchmark results:".bold().blue());
    println!("Requests: {} ({} failed, concurrency {})", requests, failures, concurrent);
    println!("Total time: {:?}", total_time);
    println!("Average latency: {:?}", avg_latency);
    println!("P50 latency: {:?}", percentile(&timings, 0.50));
    println!("P95 latency: {:?}", percentile(&timings, 0.95));
    println!("P99 latency: {:?}", percentile(&timings, 0.99));
    println!("Throughput: {:.2} requests/second", throughput);

    Ok(())
}

/// Nearest-rank percentile over sorted timings
fn percentile(sorted: &[Duration], p: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let idx = ((sorted.len() as f64 * p) as usize).min(sorted.len() - 1);
    sorted[idx]
}

/// Best human-readable label for a row
fn display_name(row: &CatalogRow) -> String {
    match row.get(NAME_COLUMN) {
        Some(FieldValue::Null) | None => row
            .fields()
            .find_map(|(_, v)| v.as_text().map(str::to_string))
            .unwrap_or_else(|| row.id.to_string()),
        Some(value) => value.to_string(),
    }
}

/// Helper function to format and print recommendations
fn print_recommendations(recommendations: &Recommendations) {
    println!("{}", "Recommended places:".bold().blue());
    if recommendations.is_empty() {
        println!("  (no recommendations)");
        return;
    }
    for (rank, result) in recommendations.iter().enumerate() {
        let extras: Vec<String> = ["Category", "City"]
            .iter()
            .filter_map(|c| result.detail.get(c).and_then(FieldValue::as_text))
            .map(str::to_string)
            .collect();
        println!(
            "{}. [{}] {} ({}) - Score: {:.3}",
            (rank + 1).to_string().green(),
            result.item_id,
            display_name(&result.detail),
            extras.join(", "),
            result.probability
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentile() {
        let timings: Vec<Duration> = (1..=100).map(Duration::from_millis).collect();
        assert_eq!(percentile(&timings, 0.50), Duration::from_millis(51));
        assert_eq!(percentile(&timings, 0.99), Duration::from_millis(100));
        assert_eq!(percentile(&[], 0.5), Duration::ZERO);
    }

    #[test]
    fn test_service_config_from_flags() {
        let cli = Cli::try_parse_from([
            "place-recs",
            "--catalog",
            "places.csv",
            "--model-timeout-ms",
            "250",
            "recommend",
            "--item",
            "7",
            "--rating",
            "4",
        ])
        .unwrap();

        let config = cli.service_config(None).unwrap();
        assert_eq!(config.catalog_path, PathBuf::from("places.csv"));
        assert_eq!(config.model_timeout, Duration::from_millis(250));
        assert_eq!(config.limits, QueryLimits::default());
    }

    #[test]
    fn test_service_config_rejects_inverted_ratings() {
        let cli = Cli::try_parse_from([
            "place-recs",
            "--min-rating",
            "5",
            "--max-rating",
            "1",
            "lookup",
            "--item",
            "7",
        ])
        .unwrap();
        assert!(cli.service_config(None).is_err());
    }
}
