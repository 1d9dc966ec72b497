//! sitewalk - drive Chrome across a site
//!
//! Results go to stdout, logs to stderr.

use browser::Launcher;
use clap::{Parser, ValueEnum};
use crawler::{ConsoleSink, CrawlConfig, CrawlMode, DeadlineOutcome};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use url::Url;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    /// Repeated timed visits to the URL
    Perf,
    /// Random same-site walk starting at the URL
    Path,
}

impl From<Mode> for CrawlMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Perf => CrawlMode::Performance,
            Mode::Path => CrawlMode::Pathfinder,
        }
    }
}

/// Explore a website with a headless browser
#[derive(Parser, Debug)]
#[command(name = "sitewalk")]
#[command(version)]
#[command(about = "Collect navigation timings or walk a site's links in Chrome", long_about = None)]
struct Cli {
    /// Target URL (performance) or seed URL (pathfinder)
    #[arg(value_name = "URL")]
    url: String,

    /// What kind of crawl to run
    #[arg(long, value_enum, env = "CRAWL_MODE", default_value_t = Mode::Perf)]
    mode: Mode,

    /// Chrome binary
    #[arg(long, env = "CHROME_EXE", default_value = "/usr/bin/google-chrome")]
    chrome: PathBuf,

    /// Run Chrome headful inside Xvfb instead of headless
    #[arg(long, env = "USE_XVFB", value_parser = clap::builder::BoolishValueParser::new())]
    xvfb: bool,

    /// Number of visits (perf) or hops (path)
    #[arg(long, env = "SPIDER_LINKS", default_value_t = 10)]
    count: usize,

    /// Global crawl budget in seconds
    #[arg(long, default_value_t = 180)]
    max_crawl_secs: u64,

    /// Seed for the pathfinder's link choice
    #[arg(long)]
    seed: Option<u64>,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

impl Cli {
    fn crawl_config(&self) -> CrawlConfig {
        CrawlConfig {
            count: self.count,
            max_crawl_time: Duration::from_secs(self.max_crawl_secs),
            seed: self.seed,
            ..CrawlConfig::default()
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logging(cli.verbose, cli.quiet);

    let target = match Url::parse(&cli.url) {
        Ok(url) => url.to_string(),
        Err(e) => {
            tracing::error!("error browsing {}:: invalid URL: {}", cli.url, e);
            return ExitCode::FAILURE;
        }
    };

    let config = cli.crawl_config();
    let mut launcher = Launcher::new()
        .use_binary(&cli.chrome)
        .use_temp_profile()
        .default_timeout(config.nav_timeout);
    if cli.xvfb {
        launcher = launcher.use_xvfb();
    }

    let mode = CrawlMode::from(cli.mode);
    let outcome = launcher
        .run(|browser| crawler::run(browser, mode, target.clone(), config, ConsoleSink::new()))
        .await;

    match outcome {
        Ok(Ok(DeadlineOutcome::Finished(()))) => ExitCode::SUCCESS,
        Ok(Ok(DeadlineOutcome::Abandoned { budget })) => {
            tracing::warn!("Crawl of {} abandoned after {:?}", target, budget);
            ExitCode::SUCCESS
        }
        Ok(Err(e)) => {
            tracing::error!("error browsing {}:: {}", target, e);
            ExitCode::FAILURE
        }
        Err(e) => {
            tracing::error!("error browsing {}:: {}", target, e);
            ExitCode::FAILURE
        }
    }
}

fn setup_logging(verbose: u8, quiet: bool) {
    let default_level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "info",
        (false, 1) => "debug",
        (false, _) => "trace",
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["sitewalk", "https://example.com/"]).unwrap();
        let config = cli.crawl_config();

        assert_eq!(config.max_crawl_time, Duration::from_secs(180));
        assert_eq!(config.loiter_timeout, Duration::from_secs(30));
        assert_eq!(config.cooldown, Duration::from_secs(3));
        assert_eq!(cli.url, "https://example.com/");
    }

    #[test]
    fn test_cli_path_mode() {
        let cli = Cli::try_parse_from([
            "sitewalk",
            "--mode",
            "path",
            "--count",
            "3",
            "--seed",
            "9",
            "https://news.example/",
        ])
        .unwrap();

        assert_eq!(CrawlMode::from(cli.mode), CrawlMode::Pathfinder);
        let config = cli.crawl_config();
        assert_eq!(config.count, 3);
        assert_eq!(config.seed, Some(9));
    }

    #[test]
    fn test_cli_requires_url() {
        assert!(Cli::try_parse_from(["sitewalk"]).is_err());
    }
}
