// CLI Interface
//
// *La Passerelle* (The Bridge) - the `tchaller` command line: search, serve, seed, analytics

use anyhow::{Context, Result as AnyhowResult};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::TchallerConfig;
use crate::search::types::{ResponseBundle, SearchRequest};
use crate::search::SearchEngine;
use crate::server::TchallerServer;
use crate::storage::{PlaceStore, SearchAnalytics, SeedData, MAX_WINDOW_DAYS};

/// Tchaller - Conversational place search
#[derive(Parser, Debug)]
#[command(name = "tchaller")]
#[command(author = "Tchaller Contributors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Find places nearby from plain-language questions", long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to ./tchaller.toml when present)
    #[arg(global = true, long = "config", short = 'c')]
    pub config: Option<PathBuf>,

    /// Database path, overrides the configuration
    #[arg(global = true, long = "db")]
    pub db_path: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(global = true, long = "verbose", short = 'v')]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one conversational search
    Search {
        /// Search query, e.g. "restaurant pas cher ce soir"
        #[arg(value_name = "QUERY")]
        query: String,

        /// Requester latitude
        #[arg(long = "lat", requires = "lon", allow_negative_numbers = true)]
        lat: Option<f64>,

        /// Requester longitude
        #[arg(long = "lon", requires = "lat", allow_negative_numbers = true)]
        lon: Option<f64>,

        /// Search radius in meters (defaults to the configured radius)
        #[arg(long = "radius")]
        radius: Option<f64>,

        /// Maximum number of results (defaults to the configured limit)
        #[arg(long = "limit")]
        limit: Option<usize>,

        /// Print the full response bundle as JSON
        #[arg(long = "json")]
        json: bool,

        /// Seed for reproducible phrasing
        #[arg(long = "seed")]
        seed: Option<u64>,
    },

    /// Start the HTTP API
    Serve {
        /// Host address to bind to
        #[arg(long = "host")]
        host: Option<String>,

        /// Port to listen on
        #[arg(long = "port")]
        port: Option<u16>,
    },

    /// Load categories, activity types, zones and places from a JSON file
    Seed {
        /// Seed file
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Show search analytics
    Analytics {
        /// Window for popular queries, in days
        #[arg(
            long = "days",
            default_value = "7",
            value_parser = clap::value_parser!(i64).range(1..=MAX_WINDOW_DAYS)
        )]
        days: i64,

        /// Number of popular queries to show
        #[arg(long = "limit", default_value = "10")]
        limit: usize,
    },
}

impl Cli {
    /// Run the CLI
    pub async fn run(self) -> AnyhowResult<()> {
        let mut config = TchallerConfig::load(self.config.as_deref())?;
        if let Some(db_path) = &self.db_path {
            config.storage.db_path = db_path.to_string_lossy().into_owned();
        }

        init_logging_impl(self.verbose, &config.server.log_level);

        match self.command {
            Commands::Search {
                query,
                lat,
                lon,
                radius,
                limit,
                json,
                seed,
            } => {
                if seed.is_some() {
                    config.response.seed = seed;
                }
                let mut request = SearchRequest::new(query)
                    .with_radius(radius.unwrap_or(config.search.default_radius_m))
                    .with_limit(limit.unwrap_or(config.search.default_limit));
                if let (Some(lat), Some(lon)) = (lat, lon) {
                    request = request.with_location(lat, lon);
                }
                cmd_search_impl(config, request, json).await
            }
            Commands::Serve { host, port } => {
                if let Some(host) = host {
                    config.server.host = host;
                }
                if let Some(port) = port {
                    config.server.port = port;
                }
                cmd_serve_impl(config).await
            }
            Commands::Seed { file } => cmd_seed_impl(&config, &file),
            Commands::Analytics { days, limit } => cmd_analytics_impl(&config, days, limit),
        }
    }
}

/// Initialize logging implementation
///
/// `RUST_LOG` wins; otherwise `--verbose` selects debug and the configured
/// level applies.
fn init_logging_impl(verbose: bool, log_level: &str) {
    let fallback = if verbose { "debug" } else { log_level };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Open the configured store
fn open_store(config: &TchallerConfig) -> AnyhowResult<PlaceStore> {
    PlaceStore::from_config(config.storage.clone())
        .with_context(|| format!("Failed to open database: {}", config.storage.db_path))
}

/// Run a search against the configured store
fn run_search(config: &TchallerConfig, request: &SearchRequest) -> AnyhowResult<ResponseBundle> {
    config.validate().map_err(anyhow::Error::msg).context("Invalid configuration")?;
    request.validate().context("Invalid search request")?;

    let store = Arc::new(open_store(config)?);
    let engine = SearchEngine::new(store.clone(), store)
        .with_weights(config.ranking.clone())
        .with_response_config(config.response.clone());

    Ok(engine.search(request))
}

/// Search command implementation
async fn cmd_search_impl(
    config: TchallerConfig,
    request: SearchRequest,
    json: bool,
) -> AnyhowResult<()> {
    info!("Searching for: {}", request.query);

    let bundle = tokio::task::spawn_blocking(move || run_search(&config, &request))
        .await
        .context("Search task failed")??;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&bundle).context("Failed to encode response")?
        );
        return Ok(());
    }

    println!("\n{}\n", bundle.response);
    for (i, result) in bundle.results.iter().enumerate() {
        let place = &result.candidate.place;
        let distance = result
            .candidate
            .distance
            .map(|d| format!("{:.0} m", d))
            .unwrap_or_else(|| "-".to_string());
        println!("{}. {} ({})", i + 1, place.name, distance);
        if let Some(category) = &result.candidate.category_name {
            println!("   Category: {}", category);
        }
        println!("   Score: {:.1}", result.relevance_score);
    }
    println!(
        "\nIntent: {} | {} result(s) | {:.1}ms",
        bundle.intent, bundle.total_results, bundle.elapsed_ms
    );
    if !bundle.suggestions.is_empty() {
        println!("Suggestions: {}", bundle.suggestions.join(" / "));
    }

    Ok(())
}

/// Serve command implementation
async fn cmd_serve_impl(config: TchallerConfig) -> AnyhowResult<()> {
    let server = TchallerServer::new(config).context("Failed to create server")?;

    println!("\nTchaller API\n");
    println!("Server starting on {}\n", server.server_url());
    println!("Available endpoints:");
    println!("  POST /api/search           - Conversational search (JSON body)");
    println!("  GET  /api/search           - Conversational search (query string)");
    println!("  GET  /api/search/popular   - Popular queries");
    println!("  GET  /api/search/analytics - Search analytics");
    println!("  GET  /api/health           - Health check");
    println!("\nPress Ctrl+C to stop the server\n");

    server.start().await.context("Server error")?;
    Ok(())
}

/// Seed command implementation
fn cmd_seed_impl(config: &TchallerConfig, file: &std::path::Path) -> AnyhowResult<()> {
    let data = SeedData::from_json_file(file)
        .with_context(|| format!("Failed to read seed file: {}", file.display()))?;
    let store = open_store(config)?;
    let summary = store.seed(&data).context("Seeding failed")?;

    println!("\n✓ Seeding complete!");
    println!("  Categories: {}", summary.categories);
    println!("  Activity types: {}", summary.activity_types);
    println!("  Zones: {}", summary.zones);
    println!("  Places: {}", summary.places);
    Ok(())
}

/// Analytics command implementation
fn cmd_analytics_impl(config: &TchallerConfig, days: i64, limit: usize) -> AnyhowResult<()> {
    let store = open_store(config)?;
    let analytics: SearchAnalytics = store.analytics().context("Failed to compute analytics")?;
    let popular = store
        .popular_queries(days, limit)
        .context("Failed to load popular queries")?;

    println!("\nTchaller Search Analytics\n");
    println!("  Total searches: {}", analytics.total_searches);
    println!("  Unique users: {}", analytics.unique_users);
    println!("  Average response time: {:.1}ms", analytics.average_response_time_ms);
    println!("  Success rate: {:.1}%", analytics.success_rate);

    println!("\nIntents (last 7 days):");
    for (intent, count) in &analytics.search_intents {
        println!("  {}: {}", intent, count);
    }

    println!("\nPopular queries (last {} days):", days);
    if popular.is_empty() {
        println!("  (none)");
    }
    for (i, query) in popular.iter().enumerate() {
        println!("  {}. {} ({})", i + 1, query.query, query.count);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::types::Place;
    use tempfile::TempDir;

    #[test]
    fn test_parse_search_command() {
        let cli = Cli::try_parse_from([
            "tchaller", "search", "pharmacie de garde", "--lat", "6.17", "--lon", "1.23", "--json",
        ])
        .unwrap();

        match cli.command {
            Commands::Search {
                query, lat, lon, json, ..
            } => {
                assert_eq!(query, "pharmacie de garde");
                assert_eq!(lat, Some(6.17));
                assert_eq!(lon, Some(1.23));
                assert!(json);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_latitude_requires_longitude() {
        assert!(Cli::try_parse_from(["tchaller", "search", "bar", "--lat", "6.17"]).is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["tchaller", "analytics", "--db", "x.db", "-v"]).unwrap();
        assert_eq!(cli.db_path, Some(PathBuf::from("x.db")));
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Analytics { days: 7, limit: 10 }));
    }

    #[test]
    fn test_analytics_window_is_bounded() {
        for days in ["0", "100000000"] {
            assert!(Cli::try_parse_from(["tchaller", "analytics", "--days", days]).is_err());
        }
        let cli = Cli::try_parse_from(["tchaller", "analytics", "--days", "3650"]).unwrap();
        assert!(matches!(cli.command, Commands::Analytics { days: 3650, .. }));
    }

    #[test]
    fn test_seed_then_search() {
        let dir = TempDir::new().unwrap();
        let mut config = TchallerConfig::default();
        config.storage.db_path = dir.path().join("t.db").to_string_lossy().into_owned();
        config.response.seed = Some(3);

        let seed_path = dir.path().join("seed.json");
        let data = SeedData {
            places: vec![Place::new(1, "Maquis Chez Tante Adjo", 6.171, 1.231)],
            ..Default::default()
        };
        std::fs::write(&seed_path, serde_json::to_string(&data).unwrap()).unwrap();
        cmd_seed_impl(&config, &seed_path).unwrap();

        let request = SearchRequest::new("tante adjo").with_location(6.17, 1.23);
        let bundle = run_search(&config, &request).unwrap();
        assert_eq!(bundle.total_results, 1);
        assert_eq!(bundle.results[0].candidate.place.name, "Maquis Chez Tante Adjo");

        cmd_analytics_impl(&config, 7, 5).unwrap();
    }

    #[test]
    fn test_invalid_request_is_an_error() {
        let dir = TempDir::new().unwrap();
        let mut config = TchallerConfig::default();
        config.storage.db_path = dir.path().join("t.db").to_string_lossy().into_owned();

        assert!(run_search(&config, &SearchRequest::new("")).is_err());
    }
}
