use std::path::Path;

use tokio_util::sync::CancellationToken;
use xpulse_batch::BatchConfig;
use xpulse_core::{AppConfig, RequestCounters, RequestKind, RequestStore};
use xpulse_fetcher::{ContentApiClient, Subject};
use xpulse_ingest::{
    parse_source_bytes, register_requests, ChildJob, JobTree, ReferenceInputs,
};

use super::parse::{ensure_importable, print_parse_report};
use crate::args::FetchArgs;
use crate::runner::{self, FetchOptions, TrackedRun};
use crate::store::open_store;

/// Imports a CSV upload: registers its requests, then fetches every work
/// item with one controller run each.
///
/// A mixed upload's parent request is tracked as its own run with one step
/// per child, so it ends `completed` only when every child does.
///
/// # Errors
///
/// Returns an error if the upload is not importable, the API key is
/// missing, or any child run ends `failed`.
pub(crate) async fn run_import(
    config: &AppConfig,
    file: &Path,
    fetch: &FetchArgs,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let raw = super::read_upload(file).await?;
    let parsed = parse_source_bytes(&raw);
    let validation = parsed.validate(config.max_batch_urls);
    print_parse_report(&parsed, &validation);
    ensure_importable(&validation)?;

    let filters = fetch.filters()?;
    let client = ContentApiClient::from_app_config(config)?;
    let store = open_store(config).await?;

    let tree = register_requests(&store, &parsed).await?;
    println!("registered request {} ({})", tree.parent_id, tree.parent_kind);

    let options = FetchOptions {
        max_items: fetch.max_items(),
        filters,
        cancel,
    };
    let totals = import_tree(
        &store,
        &client,
        &tree,
        &options,
        BatchConfig::from_app_config(config),
    )
    .await?;

    println!(
        "import {} finished: {} profiles, {} posts, {} items",
        tree.parent_id, totals.profiles, totals.posts, totals.items_fetched
    );
    Ok(())
}

/// Runs every work item of `tree` in order and returns the summed counters.
///
/// When a work item fails, it and every item after it are left `failed`,
/// along with the parent, so no request of the upload stays `queued`.
async fn import_tree<S: RequestStore>(
    store: &S,
    client: &ContentApiClient,
    tree: &JobTree,
    options: &FetchOptions,
    batch: BatchConfig,
) -> anyhow::Result<RequestCounters> {
    let jobs = tree.work_items();
    let mut parent = if tree.children.is_empty() {
        None
    } else {
        Some(TrackedRun::start(store, tree.parent_id, jobs.len()).await?)
    };

    let mut totals = RequestCounters::default();
    for (index, job) in jobs.iter().copied().enumerate() {
        match import_job(store, client, job, options, batch).await {
            Ok(counters) => {
                totals.profiles += counters.profiles;
                totals.posts += counters.posts;
                totals.items_fetched += counters.items_fetched;
                if let Some(run) = parent.as_mut() {
                    run.record(1, Vec::new()).await;
                }
            }
            Err(e) => {
                let message = format!("{} request {}: {e:#}", job.kind, job.id);
                runner::fail_request_best_effort(store, job.id, &message).await;
                let aborted = format!("parent import aborted: {message}");
                for pending in &jobs[index + 1..] {
                    runner::fail_request_best_effort(store, pending.id, &aborted).await;
                }
                if let Some(mut run) = parent.take() {
                    run.record(0, vec![message.clone()]).await;
                    run.fail(&message).await;
                }
                anyhow::bail!(message);
            }
        }
    }

    if let Some(run) = parent {
        run.complete(totals).await?;
    }
    Ok(totals)
}

/// Fetches one work item and returns its final counters.
async fn import_job<S: RequestStore>(
    store: &S,
    client: &ContentApiClient,
    job: ChildJob,
    options: &FetchOptions,
    batch: BatchConfig,
) -> anyhow::Result<RequestCounters> {
    let request = store
        .get(job.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("request {} disappeared before its run", job.id))?;
    let inputs: ReferenceInputs = serde_json::from_value(request.inputs)?;

    let (subjects, counters) = subjects_for(job.kind, inputs)?;
    let report =
        runner::fetch_into_request(store, client, job.id, &subjects, options, batch, counters)
            .await?;
    runner::print_run_summary(job.id, &report);

    Ok(RequestCounters {
        items_fetched: store.count_items(job.id).await?,
        ..counters
    })
}

/// Subjects of a stored upload request. Posts are looked up one id per
/// subject so a bad id fails alone.
fn subjects_for(
    kind: RequestKind,
    inputs: ReferenceInputs,
) -> anyhow::Result<(Vec<Subject>, RequestCounters)> {
    match kind {
        RequestKind::Profiles => {
            let subjects: Vec<Subject> =
                inputs.usernames.into_iter().map(Subject::Author).collect();
            let counters = RequestCounters {
                profiles: subjects.len(),
                ..RequestCounters::default()
            };
            Ok((subjects, counters))
        }
        RequestKind::Posts => {
            let subjects: Vec<Subject> = inputs
                .post_ids
                .into_iter()
                .map(|id| Subject::Posts(vec![id]))
                .collect();
            let counters = RequestCounters {
                posts: subjects.len(),
                ..RequestCounters::default()
            };
            Ok((subjects, counters))
        }
        other => anyhow::bail!("{other} requests are not created by uploads"),
    }
}
