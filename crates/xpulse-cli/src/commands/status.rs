use serde_json::json;
use uuid::Uuid;
use xpulse_core::{AnalyticsRequest, AppConfig, RequestStore};
use xpulse_ingest::load_job_tree;

use crate::store::open_store;

/// Prints a stored request, its children, and how many items each holds.
///
/// # Errors
///
/// Returns an error when no database is configured or the request does not
/// exist.
pub(crate) async fn run_status(config: &AppConfig, id: Uuid, as_json: bool) -> anyhow::Result<()> {
    let store = open_store(config).await?;
    if !store.is_persistent() {
        anyhow::bail!("status needs DATABASE_URL; without it requests only live for one command");
    }

    let entries = collect_entries(&store, id).await?;

    if as_json {
        let report: Vec<_> = entries
            .iter()
            .map(|(r, items)| json!({"request": r, "items": items}))
            .collect();
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for (depth, (r, items)) in entries.iter().enumerate() {
            print_request(r, *items, depth > 0);
        }
    }
    Ok(())
}

/// The request followed by its children, each with its stored item count.
async fn collect_entries<S: RequestStore>(
    store: &S,
    id: Uuid,
) -> anyhow::Result<Vec<(AnalyticsRequest, usize)>> {
    let tree = load_job_tree(store, id).await?;

    let mut entries = Vec::with_capacity(tree.children.len() + 1);
    for request_id in std::iter::once(id).chain(tree.children.iter().map(|c| c.id)) {
        let request = store
            .get(request_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("request {request_id} not found"))?;
        let items = store.count_items(request_id).await?;
        entries.push((request, items));
    }
    Ok(entries)
}

fn print_request(request: &AnalyticsRequest, items: usize, child: bool) {
    let indent = if child { "  " } else { "" };
    println!(
        "{indent}{} [{}] {} ({items} items)",
        request.id,
        request.kind,
        request.status.state()
    );
    if let Some(stats) = request.status.stats() {
        println!(
            "{indent}  {}/{} batches, {} ok, {} failed, {} ms",
            stats.completed_batches,
            stats.total_batches,
            stats.success_count,
            stats.failure_count,
            stats.processing_time_ms
        );
    }
    if let Some(error) = request.status.error() {
        println!("{indent}  error: {error}");
    }
}

#[cfg(test)]
mod tests {
    use xpulse_core::{MemoryRequestStore, RequestKind};
    use xpulse_ingest::{parse_source, register_requests};

    use super::*;

    #[tokio::test]
    async fn mixed_upload_lists_parent_then_children() {
        let store = MemoryRequestStore::new();
        let parsed = parse_source("https://x.com/alice\nhttps://x.com/bob/status/9\n");
        let tree = register_requests(&store, &parsed).await.unwrap();

        let entries = collect_entries(&store, tree.parent_id).await.unwrap();
        let kinds: Vec<RequestKind> = entries.iter().map(|(r, _)| r.kind).collect();
        assert_eq!(
            kinds,
            [RequestKind::Mixed, RequestKind::Profiles, RequestKind::Posts]
        );
        assert_eq!(entries[0].0.id, tree.parent_id);
        assert!(entries.iter().all(|(_, items)| *items == 0));
    }

    #[tokio::test]
    async fn homogeneous_upload_lists_only_the_request() {
        let store = MemoryRequestStore::new();
        let parsed = parse_source("https://x.com/alice\nhttps://x.com/bob\n");
        let tree = register_requests(&store, &parsed).await.unwrap();

        let entries = collect_entries(&store, tree.parent_id).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].0.kind, RequestKind::Profiles);
    }

    #[tokio::test]
    async fn unknown_request_is_reported() {
        let store = MemoryRequestStore::new();
        let id = Uuid::new_v4();
        let err = collect_entries(&store, id).await.unwrap_err();
        assert_eq!(err.to_string(), format!("request {id} not found"));
    }
}
