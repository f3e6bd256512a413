mod aggregator;
mod config;
mod discover;
mod domain;
mod error;
mod extractor;
mod fetch;
mod journal;
mod parser;
mod progress;
mod records;
mod reconcile;
mod registry;
mod seed;
mod websites;

use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};

use crate::config::Settings;
use crate::fetch::{FetchOptions, HttpFetcher};
use crate::records::{MenuItem, PriceObservation};
use crate::registry::{Registry, RestRegistry};

#[derive(Parser)]
#[command(name = "menu_enricher", about = "Restaurant menu discovery, extraction and registry enrichment")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List distinct registry websites into the seed file
    Seed,
    /// Probe known menu paths under every seed site
    Discover,
    /// Extract menu items from candidate pages
    Extract,
    /// Derive a median price and bucket per candidate page
    Prices,
    /// Upsert extracted items onto matching restaurants
    UpsertItems,
    /// Patch restaurants with their domain's majority price bucket
    UpsertBuckets,
    /// Export restaurants without a website to CSV
    ExportMissing,
    /// Import hand-filled websites from the exported CSV
    ImportWebsites,
    /// Registry and artifact sanity check
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = Settings::load()?;

    let result = match cli.command {
        Commands::Seed => {
            let registry = RestRegistry::new(&settings.registry()?)?;
            let path = settings.path(config::SEED_FILE);
            let n = seed::write_seed(&registry, &path).await?;
            println!("Wrote {} sites to {}", n, path.display());
            Ok(())
        }
        Commands::Discover => {
            let roots = seed::read_roots(&settings.path(config::SEED_FILE))?;
            if roots.is_empty() {
                println!("No sites in the seed list. Run 'seed' first.");
            }
            let fetcher = Arc::new(http(&settings, settings.probe_delay_ms)?);
            let out = settings.path(config::GUESSED_CANDIDATES_FILE);
            println!("Probing {} sites x {} paths...", roots.len(), discover::PROBE_PATHS.len());
            let stats = discover::discover(fetcher, roots, &out, settings.concurrency).await?;
            println!(
                "Probed {} URLs on {} sites, {} candidates -> {}",
                stats.probed,
                stats.sites,
                stats.hits,
                out.display()
            );
            Ok(())
        }
        Commands::Extract => {
            let candidates = journal::read_candidates(&settings.candidate_paths())?;
            let fetcher = Arc::new(http(&settings, settings.extract_delay_ms)?);
            let out = settings.path(config::ITEMS_FILE);
            println!("Extracting items from {} candidates...", candidates.len());
            let stats = extractor::extract_items(fetcher, candidates, &out, settings.concurrency).await?;
            println!(
                "Checked {} candidates ({} third-party skipped, {} fetched), wrote {} items -> {}",
                stats.checked,
                stats.third_party,
                stats.fetched,
                stats.items,
                out.display()
            );
            Ok(())
        }
        Commands::Prices => {
            let candidates = journal::read_candidates(&settings.candidate_paths())?;
            let fetcher = Arc::new(http(&settings, settings.price_delay_ms)?);
            let out = settings.path(config::PRICES_FILE);
            println!("Pricing {} candidates...", candidates.len());
            let stats = aggregator::aggregate_prices(
                fetcher,
                candidates,
                settings.price_range(),
                &out,
                settings.concurrency,
            )
            .await?;
            println!(
                "Checked {} candidates ({} third-party, {} off-domain), derived {} prices -> {}",
                stats.checked,
                stats.third_party,
                stats.foreign,
                stats.derived,
                out.display()
            );
            if stats.derived == 0 {
                println!("No prices derived. Menus may be rendered client-side or carry no $ amounts.");
            } else {
                for obs in aggregator::sample(&out, 5)? {
                    println!("  {:<6} {:>7.2}  {}", obs.price_bucket.as_str(), obs.median_price, obs.menu_url);
                }
            }
            Ok(())
        }
        Commands::UpsertItems => {
            let registry = RestRegistry::new(&settings.registry()?)?;
            let items: Vec<MenuItem> = journal::read_jsonl(&settings.path(config::ITEMS_FILE))?;
            println!("Assigning {} extracted items...", items.len());
            let stats = reconcile::assign_items(&registry, items, settings.batch_size).await?;
            println!(
                "{} of {} domains matched; upserted {} of {} rows ({} batches failed)",
                stats.matched_domains,
                stats.domains,
                stats.accepted,
                stats.prepared,
                stats.failed_batches
            );
            Ok(())
        }
        Commands::UpsertBuckets => {
            let registry = RestRegistry::new(&settings.registry()?)?;
            let observations: Vec<PriceObservation> =
                journal::read_jsonl(&settings.path(config::PRICES_FILE))?;
            let stats = reconcile::assign_buckets(&registry, &observations).await?;
            println!(
                "{} domains with a bucket; updated {} of {} restaurants",
                stats.domains, stats.updated, stats.attempted
            );
            Ok(())
        }
        Commands::ExportMissing => {
            let registry = RestRegistry::new(&settings.registry()?)?;
            let path = settings.path(config::MISSING_WEBSITES_FILE);
            let n = websites::export_missing(&registry, &path).await?;
            println!("Wrote {} rows to {}", n, path.display());
            Ok(())
        }
        Commands::ImportWebsites => {
            let registry = RestRegistry::new(&settings.registry()?)?;
            let path = settings.path(config::MISSING_WEBSITES_FILE);
            let n = websites::import_websites(&registry, &path).await?;
            if n > 0 {
                println!("Updated {} websites", n);
            }
            Ok(())
        }
        Commands::Stats => print_stats(&settings).await,
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", progress::format_duration(elapsed));
    }

    result
}

fn http(settings: &Settings, delay_ms: u64) -> anyhow::Result<HttpFetcher> {
    Ok(HttpFetcher::new(FetchOptions {
        user_agent: settings.user_agent.clone(),
        probe_timeout: Duration::from_secs(settings.probe_timeout_secs),
        fetch_timeout: Duration::from_secs(settings.fetch_timeout_secs),
        per_host_delay: Duration::from_millis(delay_ms),
    })?)
}

async fn print_stats(settings: &Settings) -> anyhow::Result<()> {
    let registry = RestRegistry::new(&settings.registry()?)?;
    let range = registry.website_count().await?;
    println!("Restaurants with website: {}", range);

    for file in [
        config::SEED_FILE,
        config::CRAWLED_CANDIDATES_FILE,
        config::GUESSED_CANDIDATES_FILE,
        config::ITEMS_FILE,
        config::PRICES_FILE,
    ] {
        let count = journal::count_lines(&settings.path(file))?
            .map(|n| n.to_string())
            .unwrap_or_else(|| "missing".into());
        println!("{:<32} {}", file, count);
    }

    for path in settings.candidate_paths() {
        let lines = journal::head(&path, 5)?;
        if lines.is_empty() {
            continue;
        }
        println!("\n--- {} ---", path.display());
        for line in lines {
            println!("  {}", line);
        }
    }
    Ok(())
}
