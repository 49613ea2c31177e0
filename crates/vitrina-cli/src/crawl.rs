//! Command handlers for the CLI.
//!
//! These wire config, site catalog, store, pipeline, and browser together.
//! A crawl's per-request failures are handled inside the crawl loop; only
//! setup problems and session death surface here.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use vitrina_core::config::load_app_config;
use vitrina_core::sites::load_sites;
use vitrina_db::{
    connect_pool, run_migrations, MemoryProductStore, PgProductStore, PoolConfig, ProductStore,
};
use vitrina_pipeline::ProductPipeline;
use vitrina_scraper::session::{CdpConfig, CdpSession};
use vitrina_scraper::{run_crawl, CrawlOptions, ExtractorRegistry, RenderMiddleware, Timing};

pub(crate) async fn run(
    site_id: &str,
    region_code: &str,
    url: Option<String>,
    dry_run: bool,
    max_requests: Option<usize>,
) -> anyhow::Result<()> {
    let config = load_app_config().context("loading configuration")?;
    let sites = load_sites(&config.sites_path).context("loading site catalog")?;
    let site = sites
        .site(site_id)
        .with_context(|| format!("site '{site_id}' not in catalog"))?
        .clone();
    let region = site
        .region(region_code)
        .with_context(|| format!("site '{site_id}' has no region '{region_code}'"))?
        .clone();

    // The memory store backs --dry-run so a crawl can be inspected without
    // touching Postgres.
    let memory = Arc::new(MemoryProductStore::new());
    let store: Arc<dyn ProductStore> = if dry_run {
        memory.clone()
    } else {
        let pool = connect_pool(
            &config.database_url,
            PoolConfig {
                max_connections: config.db_max_connections,
                min_connections: config.db_min_connections,
                acquire_timeout_secs: config.db_acquire_timeout_secs,
            },
        )
        .await
        .context("connecting to database")?;
        Arc::new(PgProductStore::new(pool))
    };

    let mut pipeline = ProductPipeline::new(store, region.currency.clone());

    let timing = Timing::from_config(&config);
    let session = CdpSession::launch(&CdpConfig {
        headless: config.browser_headless,
        user_agent: config.browser_user_agent.clone(),
        ..CdpConfig::default()
    })
    .await
    .context("launching browser")?;
    let mut middleware = RenderMiddleware::new(
        Box::new(session),
        &ExtractorRegistry::builtin(),
        site.clone(),
        &region,
        timing,
        config.max_consecutive_failures,
    );

    let options = CrawlOptions {
        delay: Duration::from_millis(config.inter_request_delay_ms),
        single_url: url,
        max_requests,
        max_images_per_color: config.max_images_per_color,
    };

    let crawl_result = run_crawl(&mut middleware, &site, &region, &mut pipeline, &options).await;
    if let Err(close_err) = middleware.close().await {
        tracing::warn!(error = %close_err, "browser did not shut down cleanly");
    }
    let stats = crawl_result.context("crawl failed")?;

    let pipeline_stats = pipeline.stats();
    println!(
        "crawl finished: {} requests ({} menus, {} categories), {} products delivered, {} aborted, {} skipped",
        stats.requests,
        stats.menus,
        stats.categories,
        stats.products_delivered,
        stats.aborted_requests,
        stats.skipped
    );
    println!(
        "pipeline: {} inserted, {} updated, {} unchanged, {} duplicates, {} failures",
        pipeline_stats.inserted,
        pipeline_stats.updated,
        pipeline_stats.unchanged,
        pipeline_stats.duplicates,
        pipeline_stats.failures
    );

    if dry_run {
        for record in memory.products() {
            let price = record
                .current_price_amount
                .map_or_else(|| "-".to_string(), |amount| amount.to_string());
            println!(
                "{} | {} | {} {} | discount: {}% | colors: {}",
                record.url,
                record.name.as_deref().unwrap_or("-"),
                price,
                record.currency.as_deref().unwrap_or(""),
                record.discount_percentage,
                record.images_by_color.len()
            );
        }
    }

    Ok(())
}

pub(crate) fn list_sites() -> anyhow::Result<()> {
    let config = load_app_config().context("loading configuration")?;
    let sites = load_sites(&config.sites_path).context("loading site catalog")?;
    let registry = ExtractorRegistry::builtin();
    let registered = registry.registered();

    for site in &sites.sites {
        let status = if registered.contains(&site.id) {
            "extractor registered"
        } else {
            "no extractor (generic rendering only)"
        };
        println!("{} ({}) — {}", site.id, site.display_name, status);
        for region in &site.regions {
            println!(
                "  region {}: {} [{}]",
                region.code,
                region.start_url,
                region.currency.as_deref().unwrap_or("no currency")
            );
        }
    }
    Ok(())
}

pub(crate) async fn migrate() -> anyhow::Result<()> {
    let config = load_app_config().context("loading configuration")?;
    let pool = connect_pool(
        &config.database_url,
        PoolConfig {
            max_connections: config.db_max_connections,
            min_connections: config.db_min_connections,
            acquire_timeout_secs: config.db_acquire_timeout_secs,
        },
    )
    .await
    .context("connecting to database")?;

    let applied = run_migrations(&pool).await.context("running migrations")?;
    println!("applied {applied} migrations");
    Ok(())
}
