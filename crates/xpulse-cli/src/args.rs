use chrono::NaiveDate;
use clap::Args;
use xpulse_fetcher::SearchFilters;

/// Options shared by every command that fetches from the content API.
#[derive(Debug, Clone, Args)]
pub(crate) struct FetchArgs {
    /// Items to fetch per subject (1-200)
    #[arg(long, default_value_t = 50, value_parser = clap::value_parser!(u16).range(1..=200))]
    pub max_items: u16,

    /// Keep replies in the results
    #[arg(long)]
    pub include_replies: bool,

    /// Extra text every result must contain
    #[arg(long)]
    pub content: Option<String>,

    /// Handle every result must mention
    #[arg(long)]
    pub mention: Option<String>,

    /// Earliest post date (YYYY-MM-DD)
    #[arg(long)]
    pub since: Option<NaiveDate>,

    /// Latest post date (YYYY-MM-DD)
    #[arg(long)]
    pub until: Option<NaiveDate>,

    /// Drop posts with fewer impressions
    #[arg(long)]
    pub min_impressions: Option<u64>,

    /// Drop posts below this engagement rate, in percent
    #[arg(long)]
    pub min_engagement_rate: Option<f64>,
}

impl FetchArgs {
    pub(crate) fn max_items(&self) -> usize {
        usize::from(self.max_items)
    }

    /// # Errors
    ///
    /// Returns an error when `--since` is after `--until` or the engagement
    /// threshold is negative.
    pub(crate) fn filters(&self) -> anyhow::Result<SearchFilters> {
        if let (Some(since), Some(until)) = (self.since, self.until) {
            if since > until {
                anyhow::bail!("--since ({since}) must not be after --until ({until})");
            }
        }
        if self.min_engagement_rate.is_some_and(|r| r < 0.0 || r.is_nan()) {
            anyhow::bail!("--min-engagement-rate must be a non-negative percentage");
        }
        Ok(SearchFilters {
            include_replies: self.include_replies,
            content: self.content.clone(),
            mention: self.mention.clone(),
            since: self.since,
            until: self.until,
            min_impressions: self.min_impressions,
            min_engagement_rate: self.min_engagement_rate,
        })
    }
}
