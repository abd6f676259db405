mod extraction;
mod lookup;

use std::future::Future;

use futures::{stream, StreamExt};
use tracing::{debug, info};

pub use extraction::{extract_channel, fetch_page_configs, page_ids};
pub use lookup::{get_first_post_id, get_last_post_id};

use crate::app::context::AppContext;
use crate::domain::channel::{
    get_normalized_current_id, is_channel_available, ChannelRecord, DEFAULT_CURRENT_ID,
};
use crate::domain::roster::{build_report, get_sorted_keys, log_report, ChannelMap, ChannelReport};
use crate::ports::{http::Http, page::PageExtractor, repo::Repo};

pub struct Scheduler;

/// How a guarded scrape ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrapeOutcome {
    Finished,
    Interrupted,
}

impl Scheduler {
    /// Refreshes `last_id`/`state` of every channel, `width` channels at a time.
    /// Each group is polled concurrently and finishes before the next starts.
    pub async fn update_channels<H, P>(http: &H, page: &P, channels: &mut ChannelMap, width: usize)
    where
        H: Http + ?Sized,
        P: PageExtractor + ?Sized,
    {
        let width = width.max(1);
        let total = channels.len();
        info!(count = total, batch = width, "Updating channel info");

        let mut entries = channels.iter_mut();
        let mut done = 0usize;
        loop {
            let group: Vec<(&String, &mut ChannelRecord)> = entries.by_ref().take(width).collect();
            if group.is_empty() {
                break;
            }
            done += group.len();

            stream::iter(group)
                .map(|(name, record)| update_channel(http, page, name, record))
                .buffer_unordered(width)
                .collect::<Vec<_>>()
                .await;

            debug!(done, total, "Channel update group complete");
        }
        info!(count = total, "Channel info updated");
    }

    /// Update pass, status report, then extraction over channels with posts
    /// left, fewest remaining first. State is saved after every channel.
    pub async fn run_scrape<R, H, P>(
        ctx: &AppContext<R, H, P>,
        channels: &mut ChannelMap,
    ) -> Result<ChannelReport, String>
    where
        R: Repo,
        H: Http,
        P: PageExtractor,
    {
        let scrape = &ctx.cfg.scrape;
        Self::update_channels(&ctx.http, &ctx.page, channels, scrape.update_width()).await;

        let report = build_report(channels);
        log_report(&report);

        let width = scrape.extract_width();
        let mut total = 0usize;
        for name in get_sorted_keys(channels, true, false) {
            let Some(record) = channels.get_mut(&name) else {
                continue;
            };
            total += extract_channel(&ctx.repo, &ctx.http, &ctx.page, &name, record, width).await?;
            ctx.repo.save_channels(channels).await?;
        }
        info!(count = total, "Extraction complete");
        Ok(report)
    }

    /// Loads channel state and scrapes until done or until `cancel` resolves.
    /// State is saved on every path; `cancel` wins when both are ready.
    pub async fn scrape_until<R, H, P, F>(
        ctx: &AppContext<R, H, P>,
        cancel: F,
    ) -> Result<ScrapeOutcome, String>
    where
        R: Repo,
        H: Http,
        P: PageExtractor,
        F: Future<Output = ()>,
    {
        let mut channels = ctx.repo.load_channels().await?;

        let outcome = tokio::select! {
            biased;
            _ = cancel => {
                info!("Scrape interrupted, saving channel state");
                Ok(ScrapeOutcome::Interrupted)
            }
            r = Self::run_scrape(ctx, &mut channels) => r.map(|_| ScrapeOutcome::Finished),
        };

        ctx.repo.save_channels(&channels).await?;
        outcome
    }
}

async fn update_channel<H, P>(http: &H, page: &P, name: &str, record: &mut ChannelRecord)
where
    H: Http + ?Sized,
    P: PageExtractor + ?Sized,
{
    let last_id = get_last_post_id(http, page, name).await;
    if let Some(previous) = record.apply_last_post_id(last_id) {
        info!(channel = %name, old = previous, new = last_id, "| <UU> |");
    }

    if !is_channel_available(record) {
        return;
    }
    if get_normalized_current_id(record) == DEFAULT_CURRENT_ID {
        record.current_id = get_first_post_id(http, page, name).await;
    }
    record.current_id = get_normalized_current_id(record);
}
