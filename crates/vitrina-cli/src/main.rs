use clap::{Parser, Subcommand};

mod crawl;

#[derive(Debug, Parser)]
#[command(name = "vitrina")]
#[command(about = "Retail catalog crawler and price tracker")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Crawl one site in one region and persist what it finds.
    Crawl {
        /// Site id from the catalog (e.g. `zara`).
        #[arg(long)]
        site: String,
        /// Region code within the site (e.g. `co`).
        #[arg(long, default_value = "co")]
        region: String,
        /// Crawl a single product URL instead of the full site.
        #[arg(long)]
        url: Option<String>,
        /// Keep everything in memory and print results instead of writing
        /// to the database.
        #[arg(long)]
        dry_run: bool,
        /// Stop after this many rendered pages.
        #[arg(long)]
        max_requests: Option<usize>,
    },
    /// List configured sites and their regions.
    Sites,
    /// Apply pending database migrations.
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("VITRINA_LOG_LEVEL")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Crawl {
            site,
            region,
            url,
            dry_run,
            max_requests,
        } => crawl::run(&site, &region, url, dry_run, max_requests).await,
        Commands::Sites => crawl::list_sites(),
        Commands::Migrate => crawl::migrate().await,
    }
}
