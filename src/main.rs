use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use podfeed::config::FEED_URL_ENV;
use podfeed::util::{strip_control_chars, truncate_chars};
use podfeed::{CancelToken, Config, Episode, FeedPipeline};

/// Get the default config path (~/.config/podfeed/config.toml)
fn default_config_path() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home)
        .join(".config")
        .join("podfeed")
        .join("config.toml"))
}

#[derive(Parser, Debug)]
#[command(name = "podfeed", about = "Fetch a podcast's episode list with source fallback")]
struct Args {
    /// Config file (defaults to ~/.config/podfeed/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Feed URL, overriding the config file and $PODFEED_FEED_URL
    #[arg(long, value_name = "URL")]
    feed_url: Option<String>,

    /// Show at most this many episodes
    #[arg(long, value_name = "N")]
    limit: Option<usize>,

    /// Print episodes as JSON
    #[arg(long)]
    json: bool,
}

fn print_table(episodes: &[Episode]) {
    if episodes.is_empty() {
        println!("No episodes found.");
        return;
    }
    for (i, ep) in episodes.iter().enumerate() {
        println!(
            "{:>3}. {:<60} {:>8}  {}",
            i + 1,
            truncate_chars(&strip_control_chars(&ep.title), 60),
            ep.duration,
            strip_control_chars(&ep.author)
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so --json output stays clean
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config_path = match args.config {
        Some(path) => path,
        None => default_config_path()?,
    };
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?
        .with_feed_url_override(std::env::var(FEED_URL_ENV).ok())
        .with_context(|| format!("Invalid {FEED_URL_ENV}"))?
        .with_feed_url_override(args.feed_url)
        .context("Invalid --feed-url")?;

    let pipeline = FeedPipeline::new(&config).context("Failed to build HTTP client")?;

    // Ctrl+C aborts the in-flight request and falls back like a failed fetch
    let cancel = CancelToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let mut episodes = pipeline.fetch_episodes_with_cancel(&cancel).await;
    if let Some(limit) = args.limit {
        episodes.truncate(limit);
    }

    if args.json {
        let out = serde_json::to_string_pretty(&episodes).context("Failed to serialize episodes")?;
        println!("{out}");
    } else {
        print_table(&episodes);
    }

    Ok(())
}
