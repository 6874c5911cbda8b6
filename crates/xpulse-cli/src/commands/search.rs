use serde_json::json;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use xpulse_core::{AppConfig, NewRequest, RequestCounters, RequestKind, RequestStore};
use xpulse_fetcher::{fetch_multiple_subjects, ContentApiClient, FetchMessage, Subject};

use crate::args::FetchArgs;
use crate::runner::TrackedRun;
use crate::store::open_store;

/// Runs one keyword search per entry of `keywords`, streaming items to
/// stderr as they arrive.
///
/// # Errors
///
/// Returns an error if the API key is missing, the run is cancelled, every
/// search fails, or results cannot be stored.
pub(crate) async fn run_search(
    config: &AppConfig,
    keywords: &[String],
    concurrency: usize,
    fetch: &FetchArgs,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let subjects: Vec<Subject> = keywords
        .iter()
        .map(|k| k.trim())
        .filter(|k| !k.is_empty())
        .map(|k| Subject::Keywords(k.to_owned()))
        .collect();
    if subjects.is_empty() {
        anyhow::bail!("no search terms given");
    }

    let filters = fetch.filters()?;
    let client = ContentApiClient::from_app_config(config)?;
    let store = open_store(config).await?;

    let request = store
        .insert(NewRequest::new(
            RequestKind::Search,
            json!({
                "keywords": keywords,
                "max_items": fetch.max_items(),
                "filters": filters,
            }),
        ))
        .await?;
    let mut run = TrackedRun::start(&store, request.id, 1).await?;

    let (tx, mut rx) = mpsc::channel(64);
    let printer = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            match message {
                FetchMessage::Partial { subject, item } => {
                    eprintln!("{subject}: {}", item.url());
                }
                FetchMessage::Complete { items } => {
                    eprintln!("search finished with {} items", items.len());
                }
            }
        }
    });

    let subject_count = subjects.len();
    let fetched = tokio::select! {
        report = fetch_multiple_subjects(
            &client,
            subjects,
            fetch.max_items(),
            &filters,
            concurrency,
            Some(&tx),
        ) => Some(report),
        () = cancel.cancelled() => None,
    };
    drop(tx);
    printer.await?;

    let Some(report) = fetched else {
        run.fail("cancelled").await;
        anyhow::bail!("search cancelled");
    };

    if report.failures.len() == subject_count {
        let message = report
            .failures
            .first()
            .map_or_else(|| "search failed".to_owned(), |f| f.error.clone());
        run.fail(&message).await;
        anyhow::bail!(message);
    }

    let stored = match store.upsert_items(request.id, &report.items).await {
        Ok(n) => n,
        Err(e) => {
            let message = format!("failed to store search results: {e}");
            run.fail(&message).await;
            anyhow::bail!(message);
        }
    };

    let errors: Vec<String> = report
        .failures
        .iter()
        .map(|f| format!("{}: {}", f.subject, f.error))
        .collect();
    run.record(subject_count - errors.len(), errors).await;

    let items_fetched = store.count_items(request.id).await.unwrap_or(stored);
    let progress = run
        .complete(RequestCounters {
            items_fetched,
            ..RequestCounters::default()
        })
        .await?;

    println!(
        "request {}: {} of {} searches succeeded, {items_fetched} items",
        request.id, progress.stats.success_count, subject_count
    );
    for failure in &report.failures {
        println!("  failed: {}: {}", failure.subject, failure.error);
    }
    Ok(())
}
