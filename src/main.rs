use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};
use tracing::{error, info, warn};

use v2scrape::app::{
  cleaner::run_cleaner,
  context::AppContext,
  maintenance::{run_maintenance, MaintenanceOptions},
  scheduler::{ScrapeOutcome, Scheduler},
};
use v2scrape::domain::model::{AppConfig, CleanerConfig, ScrapeConfig};
use v2scrape::domain::pipeline::{DEFAULT_DUPLICATE_FIELDS, DEFAULT_SORT_FIELDS};
use v2scrape::domain::roster::{MESSAGE_OFFSET_MAX, MESSAGE_OFFSET_MIN};
use v2scrape::infra::{
  config::{
    normalize_log_level, validate_batch_extract, validate_batch_update, validate_field_list,
    validate_timeout, ConfigError, ConfigLoader,
  },
  file_repo::FileRepo,
  html_page::HtmlPageExtractor,
  logging::{init_logging, BootError},
  reqwest_http::ReqwestHttp,
};

#[derive(Parser)]
#[command(
  author,
  version,
  about = "Scrapes public channel pages for proxy configs"
)]
struct Args {
  /// Path to config.toml (defaults to CONFIG_PATH or res/config.toml).
  #[arg(long, global = true)]
  config: Option<PathBuf>,
  /// Overrides logging.level from the config file.
  #[arg(long, global = true)]
  log_level: Option<String>,
  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Channel maintenance, then scrape, then clean.
  Run {
    #[command(flatten)]
    channels: ChannelArgs,
    #[command(flatten)]
    scrape: ScrapeArgs,
    #[command(flatten)]
    clean: CleanArgs,
  },
  /// Merge the URL list into channel state and adjust channels.
  Channels(ChannelArgs),
  /// Refresh channel info and extract configs from new posts.
  Scrape(ScrapeArgs),
  /// Normalize, filter, deduplicate and sort scraped configs.
  Clean(CleanArgs),
}

#[derive(ClapArgs, Clone)]
struct ChannelArgs {
  /// Remove unavailable and exhausted channels.
  #[arg(long)]
  delete_channels: bool,
  /// Rewind eligible channels to this many posts before their latest.
  #[arg(long, value_parser = clap::value_parser!(i64).range(MESSAGE_OFFSET_MIN..=MESSAGE_OFFSET_MAX))]
  message_offset: Option<i64>,
  /// Reset selected channels to default values before applying overrides.
  #[arg(long)]
  reset_all: bool,
  #[arg(long, allow_hyphen_values = true)]
  reset_count: Option<i64>,
  #[arg(long, allow_hyphen_values = true)]
  reset_current_id: Option<i64>,
  #[arg(long, allow_hyphen_values = true)]
  reset_last_id: Option<i64>,
  #[arg(long, allow_hyphen_values = true)]
  reset_state: Option<i64>,
  /// Expression over count, current_id, last_id and state selecting channels to reset.
  #[arg(long)]
  channel_filter: Option<String>,
  /// Apply offset and reset changes instead of only logging them.
  #[arg(long)]
  no_dry_run: bool,
  /// Overwrite channel files without keeping timestamped copies.
  #[arg(long)]
  no_backup: bool,
}

#[derive(ClapArgs, Clone)]
struct ScrapeArgs {
  /// One channel and one page at a time.
  #[arg(long)]
  sequential: bool,
  /// Pages fetched in parallel per channel (1-100).
  #[arg(long)]
  batch_extract: Option<usize>,
  /// Channels refreshed in parallel (1-1000).
  #[arg(long)]
  batch_update: Option<usize>,
  /// HTTP timeout in seconds (0.1-100).
  #[arg(long)]
  timeout: Option<f64>,
}

#[derive(ClapArgs, Clone)]
struct CleanArgs {
  /// Keep raw matches as scraped.
  #[arg(long)]
  no_normalize: bool,
  /// Keep only configs for which this expression is true.
  #[arg(long)]
  filter: Option<String>,
  /// Drop configs repeating these fields.
  #[arg(long, num_args = 0..=1, default_missing_value = DEFAULT_DUPLICATE_FIELDS)]
  duplicate: Option<String>,
  /// Sort configs by these fields.
  #[arg(long, num_args = 0..=1, default_missing_value = DEFAULT_SORT_FIELDS)]
  sort: Option<String>,
  #[arg(long)]
  reverse: bool,
}

impl ChannelArgs {
  fn options(&self) -> MaintenanceOptions {
    let overrides = [
      ("count", self.reset_count),
      ("current_id", self.reset_current_id),
      ("last_id", self.reset_last_id),
      ("state", self.reset_state),
    ]
    .into_iter()
    .filter_map(|(field, v)| v.map(|v| (field.to_string(), v)))
    .collect();

    MaintenanceOptions {
      delete_channels: self.delete_channels,
      message_offset: self.message_offset,
      reset_to_defaults: self.reset_all,
      overrides,
      channel_filter: self.channel_filter.clone(),
      dry_run: !self.no_dry_run,
      backup: !self.no_backup,
    }
  }
}

impl ScrapeArgs {
  fn apply(&self, scrape: &mut ScrapeConfig) -> Result<(), ConfigError> {
    if self.sequential {
      scrape.sequential = true;
    }
    if let Some(n) = self.batch_extract {
      scrape.batch_extract = validate_batch_extract(n)?;
    }
    if let Some(n) = self.batch_update {
      scrape.batch_update = validate_batch_update(n)?;
    }
    if let Some(t) = self.timeout {
      scrape.timeout = validate_timeout(t)?;
    }
    Ok(())
  }
}

impl CleanArgs {
  fn apply(&self, cleaner: &mut CleanerConfig) -> Result<(), ConfigError> {
    if self.no_normalize {
      cleaner.normalize = false;
    }
    if let Some(f) = self.filter.as_deref().map(str::trim).filter(|f| !f.is_empty()) {
      cleaner.filter = Some(f.to_string());
    }
    if let Some(fields) = &self.duplicate {
      cleaner.duplicate = validate_field_list("--duplicate", fields)?;
    }
    if let Some(fields) = &self.sort {
      cleaner.sort = validate_field_list("--sort", fields)?;
    }
    if self.reverse {
      cleaner.reverse = true;
    }
    Ok(())
  }
}

fn fatal(e: impl std::fmt::Display) -> BootError {
  BootError::Fatal(e.to_string())
}

#[tokio::main]
async fn main() -> Result<(), BootError> {
  let args = Args::parse();
  let cfg_path = pick_config_path(args.config.clone());
  let mut cfg = ConfigLoader::load(&cfg_path).await.map_err(fatal)?;
  if let Some(level) = &args.log_level {
    cfg.log_level = normalize_log_level(level).map_err(fatal)?;
  }

  let mut maintenance = None;
  let mut scrape = false;
  let mut clean = false;
  match &args.command {
    Command::Run { channels, scrape: s, clean: c } => {
      maintenance = Some(channels.options());
      s.apply(&mut cfg.scrape).map_err(fatal)?;
      c.apply(&mut cfg.cleaner).map_err(fatal)?;
      scrape = true;
      clean = true;
    }
    Command::Channels(c) => maintenance = Some(c.options()),
    Command::Scrape(s) => {
      s.apply(&mut cfg.scrape).map_err(fatal)?;
      scrape = true;
    }
    Command::Clean(c) => {
      c.apply(&mut cfg.cleaner).map_err(fatal)?;
      clean = true;
    }
  }

  init_logging(&cfg.log_level)?;
  info!(
    config = %cfg_path.display(),
    channels = %cfg.paths.channels.display(),
    sequential = cfg.scrape.sequential,
    "Loaded config"
  );

  let ctx = build_context(cfg)?;

  if let Some(opts) = maintenance {
    run_maintenance(&ctx.repo, &opts).await.map_err(|e| {
      error!(error = %e, "Channel maintenance failed");
      BootError::Fatal(e)
    })?;
  }
  if scrape {
    let outcome = Scheduler::scrape_until(&ctx, ctrl_c()).await.map_err(|e| {
      error!(error = %e, "Scrape failed");
      BootError::Fatal(e)
    })?;
    if outcome == ScrapeOutcome::Interrupted {
      info!("Exit from the program");
      return Ok(());
    }
  }
  if clean {
    run_cleaner(&ctx.repo, &ctx.cfg.cleaner).await.map_err(|e| {
      error!(error = %e, "Cleaning failed");
      BootError::Fatal(e)
    })?;
  }

  Ok(())
}

fn build_context(
  cfg: AppConfig,
) -> Result<AppContext<FileRepo, ReqwestHttp, HtmlPageExtractor>, BootError> {
  let repo = FileRepo::new(cfg.paths.clone());
  let http = ReqwestHttp::new(&cfg.scrape.user_agent, cfg.scrape.timeout).map_err(fatal)?;
  let page = HtmlPageExtractor::new();
  Ok(AppContext {
    cfg,
    repo,
    http,
    page,
  })
}

/// Resolves on Ctrl-C. If the handler cannot be installed it never resolves.
async fn ctrl_c() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    warn!(error = %e, "Cannot listen for Ctrl-C");
    std::future::pending::<()>().await;
  }
}

fn pick_config_path(arg: Option<PathBuf>) -> PathBuf {
  if let Some(p) = arg {
    return p;
  }

  // CLI flag wins; fall back to CONFIG_PATH, then the repo-local default.
  if let Ok(p) = std::env::var("CONFIG_PATH") {
    if !p.trim().is_empty() {
      return PathBuf::from(p);
    }
  }

  PathBuf::from("res/config.toml")
}
