use serde_json::json;
use tokio_util::sync::CancellationToken;
use xpulse_batch::BatchConfig;
use xpulse_core::{AppConfig, NewRequest, RequestCounters, RequestKind, RequestStore};
use xpulse_fetcher::{ContentApiClient, Subject};
use xpulse_ingest::parse_author_list;

use crate::args::FetchArgs;
use crate::runner::{self, FetchOptions};
use crate::store::open_store;

/// Fetches the recent posts of every author named in `text`.
///
/// # Errors
///
/// Returns an error if no handle survives parsing, the API key is missing,
/// or the run ends `failed`.
pub(crate) async fn run_authors(
    config: &AppConfig,
    text: &str,
    fetch: &FetchArgs,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let list = parse_author_list(text);
    for token in &list.rejected {
        eprintln!("skipping '{token}': not a handle or profile URL");
    }
    if list.authors.is_empty() {
        anyhow::bail!("no valid author handles in input");
    }

    let filters = fetch.filters()?;
    let client = ContentApiClient::from_app_config(config)?;
    let store = open_store(config).await?;

    let inputs = json!({
        "usernames": list.authors,
        "max_items": fetch.max_items(),
        "filters": filters,
    });
    let request = store
        .insert(NewRequest::new(RequestKind::Profiles, inputs))
        .await?;

    let subjects: Vec<Subject> = list.authors.into_iter().map(Subject::Author).collect();
    let counters = RequestCounters {
        profiles: subjects.len(),
        ..RequestCounters::default()
    };
    let options = FetchOptions {
        max_items: fetch.max_items(),
        filters,
        cancel,
    };

    let report = runner::fetch_into_request(
        &store,
        &client,
        request.id,
        &subjects,
        &options,
        BatchConfig::from_app_config(config),
        counters,
    )
    .await?;

    runner::print_run_summary(request.id, &report);
    Ok(())
}
