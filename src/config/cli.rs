use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};

/// Command-line arguments for the dojo-sync binary.
#[derive(Debug, Parser)]
#[command(name = "dojo-sync", version, about = "Fetch and cache Dojo API data")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "DOJO_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: Overrides,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// List every user.
    Users,
    /// Show one user's public profile.
    User { username: String },
    /// Rank users of a cohort, or of every cohort.
    Scoreboard {
        #[arg(long)]
        cohort: Option<String>,
    },
    /// Page through a cohort's games.
    Games(GamesArgs),
    /// List every club.
    Clubs,
    /// Show one club.
    Club { id: String },
}

#[derive(Debug, Args, Clone)]
pub struct GamesArgs {
    #[arg(long)]
    pub cohort: String,

    /// Zero-based page to print.
    #[arg(long, default_value_t = 0)]
    pub page: usize,

    /// Override `fetch.page_size` for this listing.
    #[arg(long = "page-size", value_name = "COUNT")]
    pub page_size: Option<usize>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct Overrides {
    /// Override the API base URL.
    #[arg(long = "api-base-url", value_name = "URL")]
    pub api_base_url: Option<String>,

    /// Override the API bearer token.
    #[arg(long = "api-token", env = "DOJO_API_TOKEN", value_name = "TOKEN", hide_env_values = true)]
    pub api_token: Option<String>,

    /// Override the request timeout.
    #[arg(long = "api-timeout-seconds", value_name = "SECONDS")]
    pub api_timeout_seconds: Option<u64>,

    /// Override the page limit when draining listings.
    #[arg(long = "fetch-max-pages", value_name = "COUNT")]
    pub fetch_max_pages: Option<u64>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,
}
